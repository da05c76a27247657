use crate::config::{Settings, ZonesConfig};
use crate::daemon::{CheckReport, CommandRunner, NamedController};
use crate::dns::audit::{AuditAction, AuditFact, AuditSink};
use crate::dns::locks::ZoneLocks;
use crate::dns::record_types::{DnsRecordType, Record, ZoneFile};
use crate::dns::registry::{ZoneCategory, ZoneRegistry};
use crate::dns::serial::{current_serial, next_serial};
use crate::dns::validators::validate_zone_name;
use crate::dns::zone_parser::parse_zone_file;
use crate::dns::zone_writer::write_zone_file;
use crate::error::{Result, ZoneError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tracing::{info, warn};

const ID_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneKind {
    Forward,
    Reverse,
}

impl FromStr for ZoneKind {
    type Err = ZoneError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "forward" => Ok(ZoneKind::Forward),
            "reverse" => Ok(ZoneKind::Reverse),
            _ => Err(ZoneError::Validation("Invalid zone type".into())),
        }
    }
}

impl fmt::Display for ZoneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZoneKind::Forward => write!(f, "forward"),
            ZoneKind::Reverse => write!(f, "reverse"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MutationOutcome {
    pub zone_file: String,
    pub serial: u64,
}

/// Result of `create_zone`. `Partial` means the zone file exists on disk
/// but the registry could not be updated.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ZoneCreation {
    Complete {
        zone: String,
        file: String,
        warnings: Vec<String>,
    },
    Partial {
        zone: String,
        file: String,
        warning: String,
    },
}

impl ZoneCreation {
    pub fn file(&self) -> &str {
        match self {
            ZoneCreation::Complete { file, .. } | ZoneCreation::Partial { file, .. } => file,
        }
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, ZoneCreation::Partial { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ZoneSummary {
    pub name: String,
    pub category: ZoneCategory,
    pub file: String,
    pub path: PathBuf,
}

/// Record and zone mutations against the on-disk zone files.
///
/// Every operation re-reads from disk. Mutations on the same zone file are
/// serialized through [`ZoneLocks`]; each terminal outcome is reported to the
/// audit sink exactly once.
pub struct ZoneManager {
    zones: ZonesConfig,
    registry: ZoneRegistry,
    controller: Arc<NamedController>,
    runner: Arc<dyn CommandRunner>,
    audit: Arc<dyn AuditSink>,
    locks: ZoneLocks,
}

impl ZoneManager {
    pub fn new(
        settings: &Settings,
        runner: Arc<dyn CommandRunner>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let controller = Arc::new(NamedController::new(
            runner.clone(),
            settings.daemon.clone(),
            settings.zones.registry_path.clone(),
            audit.clone(),
        ));

        Self {
            zones: settings.zones.clone(),
            registry: ZoneRegistry::new(&settings.zones.registry_path, &settings.zones.zone_dir),
            controller,
            runner,
            audit,
            locks: ZoneLocks::new(),
        }
    }

    pub fn registry(&self) -> &ZoneRegistry {
        &self.registry
    }

    pub fn controller(&self) -> &NamedController {
        &self.controller
    }

    /// Reduces a caller-supplied zone file identifier to its base name and
    /// places it inside the zone directory.
    pub fn resolve_zone_path(&self, zone_file: &str) -> Result<(String, PathBuf)> {
        let basename = Path::new(zone_file)
            .file_name()
            .and_then(|name| name.to_str())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ZoneError::Validation(format!("Invalid zone file name: {}", zone_file)))?;

        Ok((basename.to_string(), self.zones.zone_dir.join(basename)))
    }

    pub fn validate_record(&self, record: &Record) -> Result<()> {
        record.validate(&self.zones.supported_record_types)
    }

    pub async fn list_zones(&self) -> Result<Vec<ZoneSummary>> {
        let mut zones = Vec::new();
        for entry in self.registry.master_zones().await? {
            if entry.category == ZoneCategory::Special {
                continue;
            }
            let (Some(path), Some(file)) = (entry.file.clone(), entry.file_basename()) else {
                continue;
            };
            if !fs::try_exists(&path).await.unwrap_or(false) {
                continue;
            }
            zones.push(ZoneSummary {
                name: entry.name,
                category: entry.category,
                file,
                path,
            });
        }
        Ok(zones)
    }

    pub async fn get_zone_records(&self, zone_file: &str) -> Result<ZoneFile> {
        let (basename, _) = self.resolve_zone_path(zone_file)?;
        let entry = self
            .registry
            .zone_by_file(&basename)
            .await?
            .ok_or_else(|| ZoneError::ZoneNotFound(basename.clone()))?;
        let path = entry.file.ok_or(ZoneError::ZoneNotFound(basename))?;
        parse_zone_file(&path).await
    }

    pub async fn add_record(&self, zone_file: &str, record: Record, user: &str) -> Result<MutationOutcome> {
        let details = serde_json::to_value(&record).ok();
        let record_type = record.record_type();

        let result = match self.validate_record(&record) {
            Ok(()) => {
                self.apply(zone_file, move |records| {
                    records.push(record);
                    Ok(())
                })
                .await
            }
            Err(e) => Err(e),
        };

        self.finish(AuditAction::AddRecord, user, zone_file, record_type, details, result)
            .await
    }

    /// Replaces the first record matching `old` with `new`.
    pub async fn update_record(
        &self,
        zone_file: &str,
        old: Record,
        new: Record,
        user: &str,
    ) -> Result<MutationOutcome> {
        let details = Some(json!({ "old": old, "new": new }));
        let record_type = new.record_type();

        let result = match self.validate_record(&new) {
            Ok(()) => {
                self.apply(zone_file, move |records| {
                    let slot = records
                        .iter_mut()
                        .find(|r| r.matches(&old))
                        .ok_or(ZoneError::RecordNotFound)?;
                    *slot = new;
                    Ok(())
                })
                .await
            }
            Err(e) => Err(e),
        };

        self.finish(AuditAction::UpdateRecord, user, zone_file, record_type, details, result)
            .await
    }

    /// Removes the first record matching `record`.
    pub async fn delete_record(&self, zone_file: &str, record: Record, user: &str) -> Result<MutationOutcome> {
        let details = serde_json::to_value(&record).ok();
        let record_type = record.record_type();

        let result = self
            .apply(zone_file, move |records| {
                let idx = records
                    .iter()
                    .position(|r| r.matches(&record))
                    .ok_or(ZoneError::RecordNotFound)?;
                records.remove(idx);
                Ok(())
            })
            .await;

        self.finish(AuditAction::DeleteRecord, user, zone_file, record_type, details, result)
            .await
    }

    /// Parse, mutate, bump the serial and rewrite, all under the zone lock.
    /// Nothing is written unless every step before the write succeeds.
    async fn apply<F>(&self, zone_file: &str, mutate: F) -> Result<MutationOutcome>
    where
        F: FnOnce(&mut Vec<Record>) -> Result<()>,
    {
        let (basename, path) = self.resolve_zone_path(zone_file)?;
        let _guard = self.locks.acquire(&path).await;

        let mut zone = parse_zone_file(&path).await?;
        mutate(&mut zone.records)?;

        let mut soa = zone.soa.ok_or(ZoneError::MissingSoa)?;
        soa.serial = next_serial(soa.serial, current_serial());

        write_zone_file(&path, zone.ttl, &soa, &zone.records).await?;
        info!("Updated {} (serial {})", basename, soa.serial);

        Ok(MutationOutcome {
            zone_file: basename,
            serial: soa.serial,
        })
    }

    async fn finish(
        &self,
        action: AuditAction,
        user: &str,
        zone_file: &str,
        record_type: DnsRecordType,
        details: Option<serde_json::Value>,
        result: Result<MutationOutcome>,
    ) -> Result<MutationOutcome> {
        let fact = match &result {
            Ok(outcome) => {
                let fact = AuditFact::success(user, action)
                    .zone(zone_file)
                    .record_type(record_type);
                let mut details = details.unwrap_or_else(|| json!({}));
                if let Some(map) = details.as_object_mut() {
                    map.insert("serial".into(), json!(outcome.serial));
                }
                fact.details(details)
            }
            Err(e) => {
                warn!("{} on {} failed: {}", action.as_str(), zone_file, e);
                AuditFact::failure(user, action, e)
                    .zone(zone_file)
                    .record_type(record_type)
            }
        };
        self.audit.record(fact).await;
        result
    }

    /// Writes a bootstrap zone file and declares it in the registry.
    ///
    /// Setting the file owner and reconfiguring the daemon are advisory: their
    /// failures become warnings. A registry append failure after the file was
    /// written yields [`ZoneCreation::Partial`].
    pub async fn create_zone(
        &self,
        name: &str,
        kind: ZoneKind,
        user: &str,
        allow_transfer: Option<&str>,
        also_notify: Option<&str>,
    ) -> Result<ZoneCreation> {
        let result = self
            .create_zone_inner(name, kind, allow_transfer, also_notify)
            .await;

        let fact = match &result {
            Ok(ZoneCreation::Complete { file, warnings, .. }) => {
                AuditFact::success(user, AuditAction::CreateZone)
                    .zone(name)
                    .details(json!({ "file": file, "kind": kind, "warnings": warnings }))
            }
            Ok(ZoneCreation::Partial { file, warning, .. }) => {
                AuditFact::success(user, AuditAction::CreateZone)
                    .zone(name)
                    .details(json!({ "file": file, "kind": kind, "warning": warning }))
            }
            Err(e) => AuditFact::failure(user, AuditAction::CreateZone, e).zone(name),
        };
        self.audit.record(fact).await;
        result
    }

    async fn create_zone_inner(
        &self,
        name: &str,
        kind: ZoneKind,
        allow_transfer: Option<&str>,
        also_notify: Option<&str>,
    ) -> Result<ZoneCreation> {
        if !validate_zone_name(name) {
            return Err(ZoneError::Validation("Invalid zone name".into()));
        }

        let suffix = match kind {
            ZoneKind::Forward => &self.zones.forward_suffix,
            ZoneKind::Reverse => &self.zones.reverse_suffix,
        };
        let file = format!("{}{}", name, suffix);
        let path = self.zones.zone_dir.join(&file);

        let guard = self.locks.acquire(&path).await;
        if fs::try_exists(&path).await? {
            return Err(ZoneError::AlreadyExists(format!("Zone file {} already exists", file)));
        }

        fs::write(&path, zone_template(name, current_serial())).await?;
        info!("Created zone file {}", path.display());

        let mut warnings = Vec::new();

        if let Some(account) = &self.zones.service_account {
            if let Err(e) = self.set_owner(&path, account).await {
                warn!("Could not set owner of {} to {}: {}", path.display(), account, e);
                warnings.push(format!("Could not set owner to {}: {}", account, e));
            }
        }

        let transfer = parse_ip_list(allow_transfer, &self.zones.default_allow_transfer);
        let notify = parse_ip_list(also_notify, &self.zones.default_also_notify);
        let block = render_zone_block(name, &file, &transfer, &notify);

        let appended = self.registry.append_block(name, &block).await;
        drop(guard);

        match appended {
            Ok(()) => {
                if let Err(e) = self.controller.reconfig().await {
                    warn!("Daemon reconfiguration after creating {} failed: {}", name, e);
                    warnings.push(format!("Daemon reconfiguration failed: {}", e));
                }
            }
            Err(ZoneError::AlreadyExists(_)) => {
                info!("Zone {} already declared, registry left unchanged", name);
                warnings.push(format!(
                    "Zone {} already declared in {}; registry left unchanged",
                    name,
                    self.registry.conf_path().display()
                ));
            }
            Err(e) => {
                warn!("Zone file {} created but registry update failed: {}", file, e);
                return Ok(ZoneCreation::Partial {
                    zone: name.to_string(),
                    warning: format!("File created but registry update failed: {}", e),
                    file,
                });
            }
        }

        Ok(ZoneCreation::Complete {
            zone: name.to_string(),
            file,
            warnings,
        })
    }

    pub async fn check_zone(&self, name: &str) -> Result<CheckReport> {
        let entry = self
            .registry
            .zone_by_name(name)
            .await?
            .ok_or_else(|| ZoneError::ZoneNotFound(name.to_string()))?;
        let path = entry
            .file
            .ok_or_else(|| ZoneError::ZoneNotFound(name.to_string()))?;
        if !fs::try_exists(&path).await? {
            return Err(ZoneError::FileNotFound(path));
        }
        self.controller.check_zone(name, &path).await
    }

    async fn set_owner(&self, path: &Path, account: &str) -> Result<()> {
        let uid = self.lookup_id(account, "-u").await?;
        let gid = self.lookup_id(account, "-g").await?;

        #[cfg(unix)]
        std::os::unix::fs::chown(path, Some(uid), Some(gid))?;
        #[cfg(not(unix))]
        let _ = (path, uid, gid);

        Ok(())
    }

    async fn lookup_id(&self, account: &str, flag: &str) -> Result<u32> {
        let output = self
            .runner
            .run(Path::new("id"), &[flag, account], ID_LOOKUP_TIMEOUT)
            .await?;
        if !output.success() {
            return Err(ZoneError::Process(output.stderr.trim().to_string()));
        }
        output
            .stdout
            .trim()
            .parse()
            .map_err(|_| ZoneError::Parse(format!("Unexpected id output: {}", output.stdout.trim())))
    }
}

/// Splits a `;`/newline separated address list. Absent or blank input
/// falls back to `defaults`.
pub fn parse_ip_list(input: Option<&str>, defaults: &[String]) -> Vec<String> {
    match input.map(str::trim) {
        Some(raw) if !raw.is_empty() => raw
            .split([';', '\n'])
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
            .map(str::to_string)
            .collect(),
        _ => defaults.to_vec(),
    }
}

pub fn zone_template(name: &str, serial: u64) -> String {
    format!(
        "$TTL 86400
@   IN  SOA ns1.{name}. admin.{name}. (
        {serial}  ; Serial
        3600        ; Refresh
        1800        ; Retry
        604800      ; Expire
        86400 )     ; Minimum TTL

; Name Servers
@   IN  NS  ns1.{name}.
@   IN  NS  ns2.{name}.

; A Records
ns1 IN  A   127.0.0.1
ns2 IN  A   127.0.0.1
@   IN  A   127.0.0.1
"
    )
}

/// Registry block for a new master zone. An empty transfer list renders as
/// `{ none; }`; an empty notify list omits `also-notify`.
pub fn render_zone_block(name: &str, file: &str, allow_transfer: &[String], also_notify: &[String]) -> String {
    let mut block = format!(
        "\nzone \"{}\" IN {{\n    type master;\n    file \"{}\";\n    allow-update {{ none; }};\n",
        name, file
    );

    if allow_transfer.is_empty() {
        block.push_str("    allow-transfer { none; };\n");
    } else {
        block.push_str(&format!("    allow-transfer {{\n{}    }};\n", address_lines(allow_transfer)));
    }

    if !also_notify.is_empty() {
        block.push_str(&format!("    also-notify {{\n{}    }};\n", address_lines(also_notify)));
    }

    block.push_str("};\n");
    block
}

fn address_lines(addresses: &[String]) -> String {
    addresses
        .iter()
        .map(|ip| format!("        {};\n", ip))
        .collect()
}
