use crate::dns::validators::*;
use crate::error::{Result, ZoneError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum DnsRecordType {
    A,
    AAAA,
    MX,
    TXT,
    SRV,
    CNAME,
    PTR,
    NS,
}

impl DnsRecordType {
    pub const ALL: [DnsRecordType; 8] = [
        DnsRecordType::A,
        DnsRecordType::AAAA,
        DnsRecordType::MX,
        DnsRecordType::TXT,
        DnsRecordType::SRV,
        DnsRecordType::CNAME,
        DnsRecordType::PTR,
        DnsRecordType::NS,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DnsRecordType::A => "A",
            DnsRecordType::AAAA => "AAAA",
            DnsRecordType::MX => "MX",
            DnsRecordType::TXT => "TXT",
            DnsRecordType::SRV => "SRV",
            DnsRecordType::CNAME => "CNAME",
            DnsRecordType::PTR => "PTR",
            DnsRecordType::NS => "NS",
        }
    }
}

impl FromStr for DnsRecordType {
    type Err = ZoneError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "A" => Ok(DnsRecordType::A),
            "AAAA" => Ok(DnsRecordType::AAAA),
            "MX" => Ok(DnsRecordType::MX),
            "TXT" => Ok(DnsRecordType::TXT),
            "SRV" => Ok(DnsRecordType::SRV),
            "CNAME" => Ok(DnsRecordType::CNAME),
            "PTR" => Ok(DnsRecordType::PTR),
            "NS" => Ok(DnsRecordType::NS),
            _ => Err(ZoneError::Validation(format!("Unsupported record type: {}", s))),
        }
    }
}

impl fmt::Display for DnsRecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific payload of a resource record. The JSON shape is
/// `{"type": "MX", "name": "@", "priority": 10, "mailserver": "mail"}`.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RecordData {
    A {
        name: String,
        ipv4: String,
    },
    AAAA {
        name: String,
        ipv6: String,
    },
    MX {
        name: String,
        priority: u16,
        mailserver: String,
    },
    TXT {
        name: String,
        text: String,
    },
    SRV {
        name: String,
        priority: u16,
        weight: u16,
        port: u16,
        target: String,
    },
    CNAME {
        name: String,
        target: String,
    },
    PTR {
        ip_octet: String,
        fqdn: String,
    },
    NS {
        name: String,
        nameserver: String,
    },
}

impl RecordData {
    pub fn record_type(&self) -> DnsRecordType {
        match self {
            RecordData::A { .. } => DnsRecordType::A,
            RecordData::AAAA { .. } => DnsRecordType::AAAA,
            RecordData::MX { .. } => DnsRecordType::MX,
            RecordData::TXT { .. } => DnsRecordType::TXT,
            RecordData::SRV { .. } => DnsRecordType::SRV,
            RecordData::CNAME { .. } => DnsRecordType::CNAME,
            RecordData::PTR { .. } => DnsRecordType::PTR,
            RecordData::NS { .. } => DnsRecordType::NS,
        }
    }

    /// Owner of the record; the octet key for PTR records.
    pub fn owner(&self) -> &str {
        match self {
            RecordData::A { name, .. }
            | RecordData::AAAA { name, .. }
            | RecordData::MX { name, .. }
            | RecordData::TXT { name, .. }
            | RecordData::SRV { name, .. }
            | RecordData::CNAME { name, .. }
            | RecordData::NS { name, .. } => name,
            RecordData::PTR { ip_octet, .. } => ip_octet,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    #[serde(flatten)]
    pub data: RecordData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Record {
    pub fn new(data: RecordData) -> Self {
        Self { data, comment: None }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn record_type(&self) -> DnsRecordType {
        self.data.record_type()
    }

    /// Kind and every kind-specific field equal; the comment is ignored.
    pub fn matches(&self, other: &Record) -> bool {
        self.data == other.data
    }

    /// Structural checks run before any mutation. Pure: touches nothing on disk.
    pub fn validate(&self, supported: &[DnsRecordType]) -> Result<()> {
        let kind = self.record_type();
        if !supported.contains(&kind) {
            return Err(ZoneError::Validation(format!("Unsupported record type: {}", kind)));
        }

        match &self.data {
            RecordData::A { name, ipv4 } => {
                require_owner(kind, name)?;
                if !validate_dotted_quad(ipv4) {
                    return Err(ZoneError::Validation("Invalid IPv4 address format".into()));
                }
            }
            RecordData::AAAA { name, ipv6 } => {
                require_owner(kind, name)?;
                if !validate_ipv6_token(ipv6) {
                    return Err(ZoneError::Validation("Invalid IPv6 address format".into()));
                }
            }
            RecordData::MX { name, mailserver, .. } => {
                require_owner(kind, name)?;
                require_target(kind, "mailserver", mailserver)?;
            }
            RecordData::TXT { name, text } => {
                require_owner(kind, name)?;
                if !validate_txt_payload(text) {
                    return Err(ZoneError::Validation(
                        "TXT record requires non-empty text without double quotes".into(),
                    ));
                }
            }
            RecordData::SRV { name, target, .. } => {
                require_owner(kind, name)?;
                require_target(kind, "target", target)?;
            }
            RecordData::CNAME { name, target } => {
                require_owner(kind, name)?;
                require_target(kind, "target", target)?;
            }
            RecordData::PTR { ip_octet, fqdn } => {
                if !validate_ptr_octet(ip_octet) {
                    return Err(ZoneError::Validation("PTR record requires a numeric ip_octet".into()));
                }
                require_target(kind, "fqdn", fqdn)?;
            }
            RecordData::NS { name, nameserver } => {
                require_owner(kind, name)?;
                require_target(kind, "nameserver", nameserver)?;
            }
        }

        if let Some(comment) = &self.comment {
            if comment.contains('\n') {
                return Err(ZoneError::Validation("Comment must be a single line".into()));
            }
        }

        Ok(())
    }
}

fn require_owner(kind: DnsRecordType, name: &str) -> Result<()> {
    if validate_owner_name(name) {
        Ok(())
    } else {
        Err(ZoneError::Validation(format!("{} record requires a valid name", kind)))
    }
}

fn require_target(kind: DnsRecordType, field: &str, value: &str) -> Result<()> {
    if validate_owner_name(value) {
        Ok(())
    } else {
        Err(ZoneError::Validation(format!("{} record requires a valid {}", kind, field)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Soa {
    pub primary_ns: String,
    pub admin_email: String,
    pub serial: u64,
    pub refresh: u32,
    pub retry: u32,
    pub expire: u32,
    pub minimum: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ZoneFile {
    pub path: PathBuf,
    pub ttl: Option<u32>,
    pub soa: Option<Soa>,
    pub records: Vec<Record>,
}

impl ZoneFile {
    pub fn count_of(&self, kind: DnsRecordType) -> usize {
        self.records.iter().filter(|r| r.record_type() == kind).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a(name: &str, ip: &str) -> Record {
        Record::new(RecordData::A {
            name: name.to_string(),
            ipv4: ip.to_string(),
        })
    }

    #[test]
    fn test_matches_ignores_comment() {
        let plain = a("www", "10.0.0.5");
        let commented = a("www", "10.0.0.5").with_comment("web frontend");
        assert!(plain.matches(&commented));
        assert!(commented.matches(&plain));
        assert!(!plain.matches(&a("www", "10.0.0.6")));
    }

    #[test]
    fn test_matches_requires_same_kind() {
        let cname = Record::new(RecordData::CNAME {
            name: "www".into(),
            target: "web".into(),
        });
        let ns = Record::new(RecordData::NS {
            name: "www".into(),
            nameserver: "web".into(),
        });
        assert!(!cname.matches(&ns));
    }

    #[test]
    fn test_record_json_shape() {
        let json = serde_json::json!({
            "type": "SRV",
            "name": "_sip._tcp",
            "priority": 10,
            "weight": 60,
            "port": 5060,
            "target": "sip.example.com.",
            "comment": "voip"
        });
        let record: Record = serde_json::from_value(json).unwrap();
        assert_eq!(record.record_type(), DnsRecordType::SRV);
        assert_eq!(record.comment.as_deref(), Some("voip"));

        let back = serde_json::to_value(a("mail", "10.0.0.9")).unwrap();
        assert_eq!(back["type"], "A");
        assert_eq!(back["ipv4"], "10.0.0.9");
        assert!(back.get("comment").is_none());
    }

    #[test]
    fn test_record_type_parse() {
        assert_eq!("aaaa".parse::<DnsRecordType>().unwrap(), DnsRecordType::AAAA);
        assert!("SOA".parse::<DnsRecordType>().is_err());
        assert_eq!(DnsRecordType::CNAME.to_string(), "CNAME");
    }

    #[test]
    fn test_record_validation() {
        let all = DnsRecordType::ALL;
        assert!(a("www", "10.0.0.5").validate(&all).is_ok());
        // dotted-quad shape only, octet range is not checked
        assert!(a("www", "999.0.0.5").validate(&all).is_ok());
        assert!(a("www", "not-an-ip").validate(&all).is_err());
        assert!(a("", "10.0.0.5").validate(&all).is_err());

        let only_a = [DnsRecordType::A];
        let txt = Record::new(RecordData::TXT {
            name: "@".into(),
            text: "v=spf1 -all".into(),
        });
        assert!(matches!(txt.validate(&only_a), Err(ZoneError::Validation(_))));
        assert!(txt.validate(&all).is_ok());

        let bad_ptr = Record::new(RecordData::PTR {
            ip_octet: "ten".into(),
            fqdn: "host.example.com.".into(),
        });
        assert!(bad_ptr.validate(&all).is_err());
    }
}
