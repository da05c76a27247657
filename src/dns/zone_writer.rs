use crate::dns::record_types::{DnsRecordType, Record, RecordData, Soa};
use crate::error::Result;
use std::path::Path;
use tokio::fs;
use tracing::debug;

pub const DEFAULT_TTL: u32 = 86400;

/// TXT values longer than this many characters (not bytes) are written in the
/// parenthesized form, one quoted chunk of at most this many characters per line.
pub const TXT_CHUNK_LEN: usize = 200;

/// Group order in generated files.
pub const SECTION_ORDER: [DnsRecordType; 8] = [
    DnsRecordType::NS,
    DnsRecordType::A,
    DnsRecordType::AAAA,
    DnsRecordType::MX,
    DnsRecordType::CNAME,
    DnsRecordType::TXT,
    DnsRecordType::SRV,
    DnsRecordType::PTR,
];

pub fn format_record(record: &Record) -> String {
    let comment = record
        .comment
        .as_deref()
        .map(|c| format!(" ; {}", c))
        .unwrap_or_default();

    match &record.data {
        RecordData::A { name, ipv4 } => format!("{:<15} IN A {}{}", name, ipv4, comment),
        RecordData::AAAA { name, ipv6 } => format!("{:<15} IN AAAA {}{}", name, ipv6, comment),
        RecordData::MX {
            name,
            priority,
            mailserver,
        } => format!("{:<15} IN MX {} {}{}", name, priority, mailserver, comment),
        RecordData::TXT { name, text } => {
            if text.chars().count() > TXT_CHUNK_LEN {
                let chars: Vec<char> = text.chars().collect();
                let parts: Vec<String> = chars
                    .chunks(TXT_CHUNK_LEN)
                    .map(|chunk| format!("  \"{}\"", chunk.iter().collect::<String>()))
                    .collect();
                format!("{} IN TXT (\n{}\n)", name, parts.join("\n"))
            } else {
                format!("{} TXT \"{}\"{}", name, text, comment)
            }
        }
        RecordData::SRV {
            name,
            priority,
            weight,
            port,
            target,
        } => format!(
            "{} SRV {} {} {} {}{}",
            name, priority, weight, port, target, comment
        ),
        RecordData::CNAME { name, target } => {
            format!("{:<15} IN CNAME {}{}", name, target, comment)
        }
        RecordData::PTR { ip_octet, fqdn } => {
            format!("{:<15} IN PTR {}{}", ip_octet, fqdn, comment)
        }
        RecordData::NS { name, nameserver } => format!("{} IN NS {}{}", name, nameserver, comment),
    }
}

/// Deterministic zone text: `$TTL`, the SOA one field per line, then one
/// banner-headed group per record kind in [`SECTION_ORDER`], preserving the
/// relative order of records within each group.
pub fn serialize_zone(ttl: Option<u32>, soa: &Soa, records: &[Record]) -> String {
    let mut lines = vec![
        format!("$TTL {}", ttl.unwrap_or(DEFAULT_TTL)),
        format!("@   IN SOA  {} {} (", soa.primary_ns, soa.admin_email),
        format!("            {}", soa.serial),
        format!("            {}", soa.refresh),
        format!("            {}", soa.retry),
        format!("            {}", soa.expire),
        format!("            {} )", soa.minimum),
        String::new(),
    ];

    // Kinds in first-seen order, each with its records.
    let mut groups: Vec<(DnsRecordType, Vec<&Record>)> = Vec::new();
    for record in records {
        let kind = record.record_type();
        match groups.iter_mut().find(|(k, _)| *k == kind) {
            Some((_, members)) => members.push(record),
            None => groups.push((kind, vec![record])),
        }
    }

    let ordered = SECTION_ORDER
        .iter()
        .filter_map(|kind| groups.iter().find(|(k, _)| k == kind))
        .chain(groups.iter().filter(|(k, _)| !SECTION_ORDER.contains(k)));

    for (kind, members) in ordered {
        lines.push(format!("; --- {} Records ---", kind));
        lines.extend(members.iter().map(|r| format_record(r)));
        lines.push(String::new());
    }

    lines.join("\n")
}

/// Overwrites the file in place so its ownership and mode are kept.
pub async fn write_zone_file(
    path: &Path,
    ttl: Option<u32>,
    soa: &Soa,
    records: &[Record],
) -> Result<()> {
    let content = serialize_zone(ttl, soa, records);
    fs::write(path, content).await?;
    debug!("Wrote {} records to {}", records.len(), path.display());
    Ok(())
}
