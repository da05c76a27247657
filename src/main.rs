use anyhow::{Context, Result};
use bindadmin::api;
use bindadmin::config::Settings;
use bindadmin::daemon::{CommandRunner, SystemCommandRunner};
use bindadmin::dns::audit::{AuditSink, TracingAuditSink};
use bindadmin::dns::{Record, ZoneKind, ZoneManager};
use bindadmin::sync::{SecondaryNotifier, ZoneWatcher};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "bindadmin")]
#[command(about = "BIND zone management, reload control and secondary propagation", long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config/bindadmin.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Watch the zone directory and push sync triggers to secondaries
    Watch,
    /// Serve the secondary sync endpoint
    Agent,
    /// List master zones declared in the registry
    Zones,
    /// Print the parsed contents of a zone file
    Records { zone_file: String },
    /// Add a record given as JSON, e.g. '{"type":"A","name":"www","ipv4":"10.0.0.5"}'
    AddRecord { zone_file: String, record: String },
    /// Replace the record matching OLD with NEW
    UpdateRecord {
        zone_file: String,
        old: String,
        new: String,
    },
    /// Delete the first record matching the given JSON
    DeleteRecord { zone_file: String, record: String },
    /// Create a zone file and declare it in the registry
    CreateZone {
        name: String,
        #[arg(long, default_value = "forward")]
        kind: String,
        /// Semicolon or newline separated addresses
        #[arg(long)]
        allow_transfer: Option<String>,
        #[arg(long)]
        also_notify: Option<String>,
    },
    /// Reload one zone via rndc
    Reload { zone: String },
    /// Restart the name server service
    Restart,
    /// Run named-checkconf against the registry file
    CheckConfig,
    /// Run named-checkzone for one declared zone
    CheckZone { zone: String },
    /// Print the effective configuration with secrets masked
    ShowConfig,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_record(raw: &str) -> Result<Record> {
    serde_json::from_str(raw).with_context(|| format!("Invalid record JSON: {}", raw))
}

fn acting_user() -> String {
    std::env::var("USER").unwrap_or_else(|_| "cli".to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let settings = Settings::load(&args.config)?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("bindadmin={},audit=info", settings.server.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    settings.validate()?;
    let settings = Arc::new(settings);

    let runner: Arc<dyn CommandRunner> = Arc::new(SystemCommandRunner);
    let audit: Arc<dyn AuditSink> = Arc::new(TracingAuditSink);
    let manager = ZoneManager::new(&settings, runner.clone(), audit.clone());
    let user = acting_user();

    match args.command {
        Command::Watch => {
            let notifier = SecondaryNotifier::from_config(&settings.propagation)?;
            let watcher = ZoneWatcher::new(&settings, notifier);
            let cancel = CancellationToken::new();

            let shutdown = cancel.clone();
            tokio::spawn(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!("Failed to listen for shutdown signal: {}", e);
                }
                info!("Shutdown requested");
                shutdown.cancel();
            });

            watcher.run(cancel).await?;
        }
        Command::Agent => {
            settings.validate_agent()?;
            api::server::start(settings.clone(), runner, audit).await?;
        }
        Command::Zones => print_json(&manager.list_zones().await?)?,
        Command::Records { zone_file } => print_json(&manager.get_zone_records(&zone_file).await?)?,
        Command::AddRecord { zone_file, record } => {
            let record = parse_record(&record)?;
            print_json(&manager.add_record(&zone_file, record, &user).await?)?;
        }
        Command::UpdateRecord { zone_file, old, new } => {
            let (old, new) = (parse_record(&old)?, parse_record(&new)?);
            print_json(&manager.update_record(&zone_file, old, new, &user).await?)?;
        }
        Command::DeleteRecord { zone_file, record } => {
            let record = parse_record(&record)?;
            print_json(&manager.delete_record(&zone_file, record, &user).await?)?;
        }
        Command::CreateZone {
            name,
            kind,
            allow_transfer,
            also_notify,
        } => {
            let kind: ZoneKind = kind.parse()?;
            let created = manager
                .create_zone(
                    &name,
                    kind,
                    &user,
                    allow_transfer.as_deref(),
                    also_notify.as_deref(),
                )
                .await?;
            print_json(&created)?;
        }
        Command::Reload { zone } => print_json(&manager.controller().reload_zone(&zone, &user).await?)?,
        Command::Restart => {
            manager.controller().restart_service(&user).await?;
            info!("Name server restarted");
        }
        Command::CheckConfig => {
            let report = manager.controller().check_config().await?;
            print_json(&report)?;
            if !report.valid {
                anyhow::bail!("Configuration check failed");
            }
        }
        Command::CheckZone { zone } => {
            let report = manager.check_zone(&zone).await?;
            print_json(&report)?;
            if !report.valid {
                anyhow::bail!("Zone check failed for {}", zone);
            }
        }
        Command::ShowConfig => {
            let mut shown = (*settings).clone();
            mask(&mut shown.propagation.secret);
            mask(&mut shown.agent.secret);
            print!("{}", toml::to_string_pretty(&shown)?);
        }
    }

    Ok(())
}

fn mask(secret: &mut String) {
    if !secret.is_empty() {
        *secret = "********".to_string();
    }
}
