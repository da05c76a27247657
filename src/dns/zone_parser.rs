// Zone-file reader: one independent pattern scan per record kind over the whole text.
use crate::dns::record_types::{Record, RecordData, Soa, ZoneFile};
use crate::error::{Result, ZoneError};
use regex::{Captures, Regex};
use std::io::ErrorKind;
use std::path::Path;
use std::sync::LazyLock;
use tokio::fs;
use tracing::debug;

macro_rules! pattern {
    ($name:ident, $re:expr) => {
        static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($re).expect("valid regex"));
    };
}

pattern!(TTL_RE, r"(?m)^\$TTL\s+(\d+)");

// Multi-line form with a "; Serial" comment after the serial, the rest located loosely.
pattern!(
    SOA_COMMENTED_RE,
    r"(?is)@\s+IN\s+SOA\s+(\S+)\s+(\S+)\s+\(\s*(\d+)\s*;\s*Serial.*?(\d+).*?(\d+).*?(\d+).*?(\d+).*?\)"
);
pattern!(
    SOA_COMPACT_RE,
    r"(?is)@\s+IN\s+SOA\s+(\S+)\s+(\S+)\s+\(\s*(\d+)\s+(\d+)\s+(\d+)\s+(\d+)\s+(\d+)\s*\)"
);

// IN is optional for NS, TXT and SRV only.
pattern!(NS_RE, r"(?m)^(\S+)\s+(?:IN\s+)?NS\s+(\S+)(.*)$");
pattern!(A_RE, r"(?m)^(\S+)\s+IN\s+A\s+(\d+\.\d+\.\d+\.\d+)(.*)$");
pattern!(AAAA_RE, r"(?m)^(\S+)\s+IN\s+AAAA\s+([0-9a-fA-F:]+)(.*)$");
pattern!(MX_RE, r"(?m)^(\S+)\s+IN\s+MX\s+(\d+)\s+(\S+)(.*)$");
pattern!(TXT_RE, r#"(?m)^(\S+)\s+(?:IN\s+)?TXT\s+"([^"]+)"(.*)$"#);
// Only quoted segments may sit inside the parentheses, so `)` within a segment is data.
pattern!(
    TXT_MULTI_RE,
    r#"(?m)^(\S+)\s+(?:IN\s+)?TXT\s+\(((?:\s*"[^"]*")*)\s*\)"#
);
pattern!(QUOTED_RE, r#""([^"]*)""#);
pattern!(SRV_RE, r"(?m)^(\S+)\s+(?:IN\s+)?SRV\s+(\d+)\s+(\d+)\s+(\d+)\s+(\S+)(.*)$");
pattern!(CNAME_RE, r"(?m)^(\S+)\s+IN\s+CNAME\s+(\S+)(.*)$");
pattern!(PTR_RE, r"(?m)^(\d+)\s+IN\s+PTR\s+(\S+)(.*)$");

pub async fn parse_zone_file(path: &Path) -> Result<ZoneFile> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(ZoneError::FileNotFound(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };

    let zone = parse_zone_text(path, &content)?;
    debug!("Parsed {} records from {}", zone.records.len(), path.display());
    Ok(zone)
}

pub fn parse_zone_text(path: &Path, content: &str) -> Result<ZoneFile> {
    let mut records = Vec::new();
    records.extend(parse_ns_records(content));
    records.extend(parse_a_records(content));
    records.extend(parse_aaaa_records(content));
    records.extend(parse_mx_records(content));
    records.extend(parse_txt_records(content));
    records.extend(parse_srv_records(content));
    records.extend(parse_cname_records(content));
    records.extend(parse_ptr_records(content));

    Ok(ZoneFile {
        path: path.to_path_buf(),
        ttl: parse_ttl(content),
        soa: parse_soa(content)?,
        records,
    })
}

pub fn parse_ttl(content: &str) -> Option<u32> {
    TTL_RE
        .captures(content)
        .and_then(|caps| caps[1].parse().ok())
}

/// `Ok(None)` when neither SOA layout is present; `Err` when a layout matched
/// but a numeric field does not fit.
pub fn parse_soa(content: &str) -> Result<Option<Soa>> {
    let caps = match SOA_COMMENTED_RE
        .captures(content)
        .or_else(|| SOA_COMPACT_RE.captures(content))
    {
        Some(caps) => caps,
        None => return Ok(None),
    };

    let field = |idx: usize, label: &str| -> Result<u32> {
        caps[idx]
            .parse()
            .map_err(|_| ZoneError::Parse(format!("SOA {} out of range: {}", label, &caps[idx])))
    };

    Ok(Some(Soa {
        primary_ns: caps[1].to_string(),
        admin_email: caps[2].to_string(),
        serial: caps[3]
            .parse()
            .map_err(|_| ZoneError::Parse(format!("SOA serial out of range: {}", &caps[3])))?,
        refresh: field(4, "refresh")?,
        retry: field(5, "retry")?,
        expire: field(6, "expire")?,
        minimum: field(7, "minimum")?,
    }))
}

/// Comment text after the first `;` in what follows the record's fields.
fn trailing_comment(rest: &str) -> Option<String> {
    rest.split_once(';')
        .map(|(_, comment)| comment.trim())
        .filter(|comment| !comment.is_empty())
        .map(str::to_string)
}

fn record(data: RecordData, caps: &Captures, rest_group: usize) -> Record {
    Record {
        data,
        comment: caps.get(rest_group).and_then(|m| trailing_comment(m.as_str())),
    }
}

pub fn parse_ns_records(content: &str) -> Vec<Record> {
    NS_RE
        .captures_iter(content)
        .map(|caps| {
            let data = RecordData::NS {
                name: caps[1].to_string(),
                nameserver: caps[2].to_string(),
            };
            record(data, &caps, 3)
        })
        .collect()
}

pub fn parse_a_records(content: &str) -> Vec<Record> {
    A_RE.captures_iter(content)
        .map(|caps| {
            let data = RecordData::A {
                name: caps[1].to_string(),
                ipv4: caps[2].to_string(),
            };
            record(data, &caps, 3)
        })
        .collect()
}

pub fn parse_aaaa_records(content: &str) -> Vec<Record> {
    AAAA_RE
        .captures_iter(content)
        .map(|caps| {
            let data = RecordData::AAAA {
                name: caps[1].to_string(),
                ipv6: caps[2].to_string(),
            };
            record(data, &caps, 3)
        })
        .collect()
}

pub fn parse_mx_records(content: &str) -> Vec<Record> {
    MX_RE
        .captures_iter(content)
        .filter_map(|caps| {
            let data = RecordData::MX {
                name: caps[1].to_string(),
                priority: caps[2].parse().ok()?,
                mailserver: caps[3].to_string(),
            };
            Some(record(data, &caps, 4))
        })
        .collect()
}

/// Single-line quoted TXT first, then the parenthesized form whose quoted
/// segments are concatenated in file order.
pub fn parse_txt_records(content: &str) -> Vec<Record> {
    let mut records: Vec<Record> = TXT_RE
        .captures_iter(content)
        .map(|caps| {
            let data = RecordData::TXT {
                name: caps[1].to_string(),
                text: caps[2].to_string(),
            };
            record(data, &caps, 3)
        })
        .collect();

    for caps in TXT_MULTI_RE.captures_iter(content) {
        let text: String = QUOTED_RE
            .captures_iter(&caps[2])
            .map(|part| part[1].to_string())
            .collect();
        records.push(Record::new(RecordData::TXT {
            name: caps[1].to_string(),
            text,
        }));
    }

    records
}

pub fn parse_srv_records(content: &str) -> Vec<Record> {
    SRV_RE
        .captures_iter(content)
        .filter_map(|caps| {
            let data = RecordData::SRV {
                name: caps[1].to_string(),
                priority: caps[2].parse().ok()?,
                weight: caps[3].parse().ok()?,
                port: caps[4].parse().ok()?,
                target: caps[5].to_string(),
            };
            Some(record(data, &caps, 6))
        })
        .collect()
}

pub fn parse_cname_records(content: &str) -> Vec<Record> {
    CNAME_RE
        .captures_iter(content)
        .map(|caps| {
            let data = RecordData::CNAME {
                name: caps[1].to_string(),
                target: caps[2].to_string(),
            };
            record(data, &caps, 3)
        })
        .collect()
}

pub fn parse_ptr_records(content: &str) -> Vec<Record> {
    PTR_RE
        .captures_iter(content)
        .map(|caps| {
            let data = RecordData::PTR {
                ip_octet: caps[1].to_string(),
                fqdn: caps[2].to_string(),
            };
            record(data, &caps, 3)
        })
        .collect()
}
