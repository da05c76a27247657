use crate::dns::record_types::DnsRecordType;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerConfig,
    pub zones: ZonesConfig,
    pub daemon: DaemonConfig,
    pub propagation: PropagationConfig,
    pub agent: AgentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ZonesConfig {
    pub zone_dir: PathBuf,
    pub registry_path: PathBuf,
    pub forward_suffix: String,
    pub reverse_suffix: String,
    pub supported_record_types: Vec<DnsRecordType>,
    /// Owner given to newly created zone files; `None` skips the chown.
    pub service_account: Option<String>,
    pub default_allow_transfer: Vec<String>,
    pub default_also_notify: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub rndc_path: PathBuf,
    pub systemctl_path: PathBuf,
    pub checkconf_path: PathBuf,
    pub checkzone_path: PathBuf,
    pub service_name: String,
    pub max_reload_attempts: u32,
    pub reload_timeout_secs: u64,
    pub restart_timeout_secs: u64,
    pub check_timeout_secs: u64,
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PropagationConfig {
    pub secondaries: Vec<String>,
    pub port: u16,
    pub secret: String,
    pub debounce_secs: u64,
    pub push_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub bind_address: String,
    pub port: u16,
    pub secret: String,
    pub slave_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl Default for ZonesConfig {
    fn default() -> Self {
        Self {
            zone_dir: PathBuf::from("/var/named"),
            registry_path: PathBuf::from("/etc/named.conf"),
            forward_suffix: ".hosts".to_string(),
            reverse_suffix: ".rev".to_string(),
            supported_record_types: DnsRecordType::ALL.to_vec(),
            service_account: Some("named".to_string()),
            default_allow_transfer: Vec::new(),
            default_also_notify: Vec::new(),
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            rndc_path: PathBuf::from("/usr/sbin/rndc"),
            systemctl_path: PathBuf::from("/usr/bin/systemctl"),
            checkconf_path: PathBuf::from("/usr/sbin/named-checkconf"),
            checkzone_path: PathBuf::from("/usr/sbin/named-checkzone"),
            service_name: "named".to_string(),
            max_reload_attempts: 5,
            reload_timeout_secs: 10,
            restart_timeout_secs: 30,
            check_timeout_secs: 10,
            retry_delay_ms: 1000,
        }
    }
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            secondaries: Vec::new(),
            port: 5000,
            secret: String::new(),
            debounce_secs: 5,
            push_timeout_secs: 5,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 5000,
            secret: String::new(),
            slave_dir: PathBuf::from("/var/named/slaves"),
        }
    }
}

impl DaemonConfig {
    pub fn reload_timeout(&self) -> Duration {
        Duration::from_secs(self.reload_timeout_secs)
    }

    pub fn restart_timeout(&self) -> Duration {
        Duration::from_secs(self.restart_timeout_secs)
    }

    pub fn check_timeout(&self) -> Duration {
        Duration::from_secs(self.check_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl PropagationConfig {
    pub fn debounce_window(&self) -> Duration {
        Duration::from_secs(self.debounce_secs)
    }

    pub fn push_timeout(&self) -> Duration {
        Duration::from_secs(self.push_timeout_secs)
    }

    /// `http://<host>:<port>` for every configured secondary.
    pub fn endpoints(&self) -> Vec<String> {
        self.secondaries
            .iter()
            .map(|host| format!("http://{}:{}", host, self.port))
            .collect()
    }
}

impl Settings {
    pub fn load(config_path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("BINDADMIN")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("propagation.secondaries")
                    .with_list_parse_key("zones.default_allow_transfer")
                    .with_list_parse_key("zones.default_also_notify")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.daemon.max_reload_attempts == 0 {
            anyhow::bail!("daemon.max_reload_attempts must be at least 1");
        }

        if self.zones.forward_suffix.is_empty() || self.zones.reverse_suffix.is_empty() {
            anyhow::bail!("Zone file suffixes must not be empty");
        }

        if self.zones.forward_suffix == self.zones.reverse_suffix {
            anyhow::bail!("Forward and reverse zone suffixes must differ");
        }

        if !self.propagation.secondaries.is_empty() && self.propagation.secret.is_empty() {
            anyhow::bail!("propagation.secret is required when secondaries are configured");
        }

        if self.zones.supported_record_types.is_empty() {
            anyhow::bail!("zones.supported_record_types must list at least one record type");
        }

        Ok(())
    }

    /// Checks that only matter when running the secondary sync agent.
    pub fn validate_agent(&self) -> Result<()> {
        if self.agent.secret.is_empty() {
            anyhow::bail!("agent.secret is required to run the sync agent");
        }
        Ok(())
    }
}
