// named.conf zone registry: read zone blocks, append new ones.
use crate::error::{Result, ZoneError};
use regex::Regex;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

static BLOCK_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("valid regex"));
static LINE_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)(//|#).*$").expect("valid regex"));
static ZONE_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"zone\s+"([^"]+)"\s+(?:IN\s+)?\{"#).expect("valid regex"));
static TYPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"type\s+(\w+)\s*;").expect("valid regex"));
static FILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"file\s+"([^"]+)"\s*;"#).expect("valid regex"));
static ALLOW_UPDATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"allow-update\s*\{([^}]*)\}").expect("valid regex"));
static ALLOW_TRANSFER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"allow-transfer\s*\{([^}]*)\}").expect("valid regex"));

const SPECIAL_ZONES: [&str; 3] = [
    "localhost",
    "0.0.127.in-addr.arpa",
    "1.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.ip6.arpa",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneCategory {
    Forward,
    Reverse,
    Special,
}

impl ZoneCategory {
    pub fn of(zone_name: &str) -> Self {
        if SPECIAL_ZONES.contains(&zone_name) {
            ZoneCategory::Special
        } else if zone_name.ends_with(".in-addr.arpa") || zone_name.ends_with(".ip6.arpa") {
            ZoneCategory::Reverse
        } else {
            ZoneCategory::Forward
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RegistryZoneEntry {
    pub name: String,
    pub zone_type: Option<String>,
    pub file: Option<PathBuf>,
    pub allow_update: Vec<String>,
    pub allow_transfer: Vec<String>,
    pub category: ZoneCategory,
}

impl RegistryZoneEntry {
    pub fn is_master(&self) -> bool {
        self.zone_type.as_deref() == Some("master")
    }

    pub fn file_basename(&self) -> Option<String> {
        self.file
            .as_ref()
            .and_then(|f| f.file_name())
            .map(|f| f.to_string_lossy().into_owned())
    }
}

/// Reader/appender for the daemon's master configuration file. Nothing is
/// cached: every lookup re-reads the file.
#[derive(Debug, Clone)]
pub struct ZoneRegistry {
    conf_path: PathBuf,
    zone_dir: PathBuf,
}

impl ZoneRegistry {
    pub fn new(conf_path: impl Into<PathBuf>, zone_dir: impl Into<PathBuf>) -> Self {
        Self {
            conf_path: conf_path.into(),
            zone_dir: zone_dir.into(),
        }
    }

    pub fn conf_path(&self) -> &Path {
        &self.conf_path
    }

    async fn read(&self) -> Result<String> {
        match fs::read_to_string(&self.conf_path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(ZoneError::FileNotFound(self.conf_path.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn parse(&self) -> Result<Vec<RegistryZoneEntry>> {
        let content = self.read().await?;
        let zones = parse_registry_text(&content, &self.zone_dir);
        debug!("Found {} zone blocks in {}", zones.len(), self.conf_path.display());
        Ok(zones)
    }

    pub async fn master_zones(&self) -> Result<Vec<RegistryZoneEntry>> {
        Ok(self
            .parse()
            .await?
            .into_iter()
            .filter(RegistryZoneEntry::is_master)
            .collect())
    }

    pub async fn zone_by_name(&self, name: &str) -> Result<Option<RegistryZoneEntry>> {
        Ok(self.parse().await?.into_iter().find(|z| z.name == name))
    }

    pub async fn zone_by_file(&self, basename: &str) -> Result<Option<RegistryZoneEntry>> {
        Ok(self
            .parse()
            .await?
            .into_iter()
            .find(|z| z.file_basename().as_deref() == Some(basename)))
    }

    /// Raw substring test for `zone "<name>"`, comments included. A name that
    /// is a prefix of another quoted name cannot collide because the closing
    /// quote is part of the needle, but a commented-out block still counts.
    pub async fn contains_zone(&self, name: &str) -> Result<bool> {
        let content = self.read().await?;
        Ok(content.contains(&zone_needle(name)))
    }

    pub async fn add_zone_entry(&self, name: &str, file: &str, zone_type: &str) -> Result<()> {
        let block = format!(
            "\nzone \"{}\" {{\n    type {};\n    file \"{}\";\n    allow-update {{ none; }};\n}};\n",
            name, zone_type, file
        );
        self.append_block(name, &block).await
    }

    /// Append a pre-rendered block after writing `<conf>.backup`. Fails with
    /// `AlreadyExists` when the substring check finds the zone.
    pub async fn append_block(&self, name: &str, block: &str) -> Result<()> {
        let content = self.read().await?;
        if content.contains(&zone_needle(name)) {
            return Err(ZoneError::AlreadyExists(format!(
                "Zone {} already exists in {}",
                name,
                self.conf_path.display()
            )));
        }

        let backup = backup_path(&self.conf_path);
        fs::write(&backup, &content).await?;

        let mut file = fs::OpenOptions::new()
            .append(true)
            .open(&self.conf_path)
            .await?;
        file.write_all(block.as_bytes()).await?;
        file.flush().await?;

        info!(
            "Registered zone {} in {} (backup at {})",
            name,
            self.conf_path.display(),
            backup.display()
        );
        Ok(())
    }
}

fn zone_needle(name: &str) -> String {
    format!("zone \"{}\"", name)
}

fn backup_path(conf: &Path) -> PathBuf {
    let mut name = conf.as_os_str().to_os_string();
    name.push(".backup");
    PathBuf::from(name)
}

pub fn strip_comments(content: &str) -> String {
    let without_blocks = BLOCK_COMMENT.replace_all(content, "");
    LINE_COMMENT.replace_all(&without_blocks, "").into_owned()
}

/// Every `zone "<name>" [IN] { ... };` block, with its body delimited by
/// brace counting from the opening brace.
pub fn parse_registry_text(content: &str, zone_dir: &Path) -> Vec<RegistryZoneEntry> {
    let content = strip_comments(content);
    let mut zones = Vec::new();

    for caps in ZONE_HEADER.captures_iter(&content) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let body_start = whole.end();
        let Some(body_len) = matching_brace(&content[body_start..]) else {
            continue;
        };
        let body = &content[body_start..body_start + body_len];
        zones.push(parse_zone_block(name.as_str(), body, zone_dir));
    }

    zones
}

/// Byte length up to (not including) the brace that closes an already-open block.
fn matching_brace(body: &str) -> Option<usize> {
    let mut depth = 1usize;
    for (idx, ch) in body.char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_zone_block(name: &str, body: &str, zone_dir: &Path) -> RegistryZoneEntry {
    let file = FILE_RE.captures(body).map(|caps| {
        let path = PathBuf::from(&caps[1]);
        if path.is_absolute() {
            path
        } else {
            zone_dir.join(path)
        }
    });

    RegistryZoneEntry {
        name: name.to_string(),
        zone_type: TYPE_RE.captures(body).map(|caps| caps[1].to_string()),
        file,
        allow_update: address_list(&ALLOW_UPDATE_RE, body),
        allow_transfer: address_list(&ALLOW_TRANSFER_RE, body),
        category: ZoneCategory::of(name),
    }
}

fn address_list(re: &Regex, body: &str) -> Vec<String> {
    re.captures(body)
        .map(|caps| {
            caps[1]
                .split(|c: char| c.is_whitespace() || c == ';')
                .filter(|item| !item.is_empty() && *item != "none")
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
