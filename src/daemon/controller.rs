use crate::config::DaemonConfig;
use crate::daemon::command::{CommandOutput, CommandRunner};
use crate::dns::audit::{AuditAction, AuditFact, AuditSink};
use crate::error::{Result, ZoneError};
use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// rndc prints one of these when the daemon accepted the reload.
const RELOAD_CONFIRMATIONS: [&str; 2] = ["zone reload up-to-date", "zone reload queued"];

pub fn is_reload_success_output(stdout: &str) -> bool {
    RELOAD_CONFIRMATIONS
        .iter()
        .any(|marker| stdout.contains(marker))
}

#[derive(Debug, Clone, Serialize)]
pub struct ReloadOutcome {
    pub zone: String,
    /// 1-based attempt that produced the confirmation.
    pub attempt: u32,
    pub output: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub valid: bool,
    pub stdout: String,
    pub stderr: String,
}

impl From<CommandOutput> for CheckReport {
    fn from(output: CommandOutput) -> Self {
        Self {
            valid: output.success(),
            stdout: output.stdout,
            stderr: output.stderr,
        }
    }
}

/// Drives the name-server daemon through its control utilities.
pub struct NamedController {
    runner: Arc<dyn CommandRunner>,
    config: DaemonConfig,
    registry_path: PathBuf,
    audit: Arc<dyn AuditSink>,
}

impl NamedController {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        config: DaemonConfig,
        registry_path: impl Into<PathBuf>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            runner,
            config,
            registry_path: registry_path.into(),
            audit,
        }
    }

    pub fn config(&self) -> &DaemonConfig {
        &self.config
    }

    /// Asks the daemon to reload one zone.
    ///
    /// Each attempt is bounded by the reload timeout. A timed-out attempt or
    /// one whose output lacks a confirmation is retried after the retry delay,
    /// up to `max_reload_attempts` in total. Any other failure to run the
    /// utility aborts immediately. Exactly one audit fact is emitted.
    pub async fn reload_zone(&self, zone: &str, user: &str) -> Result<ReloadOutcome> {
        let max_attempts = self.config.max_reload_attempts.max(1);
        let rndc = self.config.rndc_path.as_path();

        for attempt in 1..=max_attempts {
            match self
                .runner
                .run(rndc, &["reload", zone], self.config.reload_timeout())
                .await
            {
                Ok(output) if is_reload_success_output(&output.stdout) => {
                    info!("Reloaded zone {} on attempt {}", zone, attempt);
                    let outcome = ReloadOutcome {
                        zone: zone.to_string(),
                        attempt,
                        output: output.stdout.trim().to_string(),
                    };
                    self.audit
                        .record(
                            AuditFact::success(user, AuditAction::ReloadZone)
                                .zone(zone)
                                .details(json!({
                                    "attempt": attempt,
                                    "output": outcome.output,
                                })),
                        )
                        .await;
                    return Ok(outcome);
                }
                Ok(output) => {
                    warn!(
                        "Reload of {} not confirmed (attempt {}/{}): {}",
                        zone,
                        attempt,
                        max_attempts,
                        output.stdout.trim()
                    );
                }
                Err(ZoneError::Timeout { seconds, .. }) => {
                    warn!(
                        "Reload of {} timed out after {}s (attempt {}/{})",
                        zone, seconds, attempt, max_attempts
                    );
                }
                Err(e) => {
                    error!("Reload of {} failed: {}", zone, e);
                    self.audit
                        .record(AuditFact::failure(user, AuditAction::ReloadZone, &e).zone(zone))
                        .await;
                    return Err(e);
                }
            }

            if attempt < max_attempts {
                tokio::time::sleep(self.config.retry_delay()).await;
            }
        }

        let err = ZoneError::Process(format!(
            "Failed to reload zone {} after {} attempts",
            zone, max_attempts
        ));
        error!("{}", err);
        self.audit
            .record(AuditFact::failure(user, AuditAction::ReloadZone, &err).zone(zone))
            .await;
        Err(err)
    }

    /// Restarts the daemon via the service manager. Exit status 0 is success.
    pub async fn restart_service(&self, user: &str) -> Result<String> {
        let service = self.config.service_name.as_str();
        let result = self
            .runner
            .run(
                &self.config.systemctl_path,
                &["restart", service],
                self.config.restart_timeout(),
            )
            .await
            .and_then(|output| {
                if output.success() {
                    Ok(output.stdout)
                } else {
                    let stderr = output.stderr.trim();
                    Err(ZoneError::Process(if stderr.is_empty() {
                        format!("Failed to restart {} service", service)
                    } else {
                        stderr.to_string()
                    }))
                }
            });

        match result {
            Ok(stdout) => {
                info!("Restarted {} service", service);
                self.audit
                    .record(
                        AuditFact::success(user, AuditAction::RestartService)
                            .details(json!({ "service": service })),
                    )
                    .await;
                Ok(stdout)
            }
            Err(e) => {
                error!("Restart of {} failed: {}", service, e);
                self.audit
                    .record(AuditFact::failure(user, AuditAction::RestartService, &e))
                    .await;
                Err(e)
            }
        }
    }

    /// Makes the daemon re-read its configuration so new zone declarations load.
    pub async fn reconfig(&self) -> Result<()> {
        let output = self
            .runner
            .run(
                &self.config.rndc_path,
                &["reconfig"],
                self.config.reload_timeout(),
            )
            .await?;

        if output.success() {
            info!("Daemon configuration reloaded");
            Ok(())
        } else {
            Err(ZoneError::Process(format!(
                "rndc reconfig failed: {}",
                output.stderr.trim()
            )))
        }
    }

    pub async fn check_config(&self) -> Result<CheckReport> {
        let registry = self.registry_path.to_string_lossy();
        let output = self
            .runner
            .run(
                &self.config.checkconf_path,
                &[registry.as_ref()],
                self.config.check_timeout(),
            )
            .await?;
        Ok(output.into())
    }

    pub async fn check_zone(&self, zone: &str, path: &Path) -> Result<CheckReport> {
        let file = path.to_string_lossy();
        let output = self
            .runner
            .run(
                &self.config.checkzone_path,
                &[zone, file.as_ref()],
                self.config.check_timeout(),
            )
            .await?;
        Ok(output.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daemon::command::testing::{exit, ScriptedRunner};
    use crate::dns::audit::{AuditStatus, MemoryAuditSink};

    fn fast_config() -> DaemonConfig {
        DaemonConfig {
            rndc_path: PathBuf::from("rndc"),
            systemctl_path: PathBuf::from("systemctl"),
            checkconf_path: PathBuf::from("named-checkconf"),
            checkzone_path: PathBuf::from("named-checkzone"),
            retry_delay_ms: 1,
            ..DaemonConfig::default()
        }
    }

    fn controller(runner: Arc<ScriptedRunner>, audit: Arc<MemoryAuditSink>) -> NamedController {
        NamedController::new(runner, fast_config(), "/etc/named.conf", audit)
    }

    fn timeout() -> ZoneError {
        ZoneError::Timeout {
            command: "rndc reload example.com".into(),
            seconds: 10,
        }
    }

    #[test]
    fn test_reload_confirmation_markers() {
        assert!(is_reload_success_output("zone reload queued\n"));
        assert!(is_reload_success_output("zone reload up-to-date"));
        assert!(!is_reload_success_output("rndc: 'reload' failed: not found"));
        assert!(!is_reload_success_output(""));
    }

    #[tokio::test]
    async fn test_reload_succeeds_after_retries() {
        let runner = Arc::new(ScriptedRunner::new(vec![
            Err(timeout()),
            Ok(exit(0, "zone refresh pending", "")),
            Ok(exit(0, "zone reload queued", "")),
        ]));
        let audit = Arc::new(MemoryAuditSink::new());
        let ctl = controller(runner.clone(), audit.clone());

        let outcome = ctl.reload_zone("example.com", "alice").await.unwrap();
        assert_eq!(outcome.attempt, 3);
        assert_eq!(runner.calls().len(), 3);
        assert_eq!(runner.calls()[0], "rndc reload example.com");

        let facts = audit.facts();
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].status, AuditStatus::Success);
        assert_eq!(facts[0].details.as_ref().unwrap()["attempt"], 3);
    }

    #[tokio::test]
    async fn test_reload_gives_up_after_max_attempts() {
        let runner = Arc::new(ScriptedRunner::always(exit(0, "something else", "")));
        let audit = Arc::new(MemoryAuditSink::new());
        let ctl = controller(runner.clone(), audit.clone());

        let err = ctl.reload_zone("example.com", "alice").await.unwrap_err();
        assert!(err.to_string().contains("5 attempts"));
        assert_eq!(runner.calls().len(), 5);

        let facts = audit.facts();
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].status, AuditStatus::Failure);
    }

    #[tokio::test]
    async fn test_reload_timeouts_are_bounded() {
        let runner = Arc::new(ScriptedRunner::new((0..10).map(|_| Err(timeout())).collect()));
        let audit = Arc::new(MemoryAuditSink::new());
        let ctl = controller(runner.clone(), audit);

        assert!(ctl.reload_zone("example.com", "alice").await.is_err());
        assert_eq!(runner.calls().len(), 5);
    }

    #[tokio::test]
    async fn test_reload_aborts_on_unexpected_error() {
        let runner = Arc::new(ScriptedRunner::new(vec![Err(ZoneError::Process(
            "Failed to start rndc".into(),
        ))]));
        let audit = Arc::new(MemoryAuditSink::new());
        let ctl = controller(runner.clone(), audit.clone());

        let err = ctl.reload_zone("example.com", "alice").await.unwrap_err();
        assert!(matches!(err, ZoneError::Process(_)));
        assert_eq!(runner.calls().len(), 1);
        assert_eq!(audit.facts().len(), 1);
    }

    #[tokio::test]
    async fn test_restart_reports_stderr() {
        let runner = Arc::new(ScriptedRunner::new(vec![
            Ok(exit(0, "", "")),
            Ok(exit(1, "", "Job for named.service failed")),
        ]));
        let audit = Arc::new(MemoryAuditSink::new());
        let ctl = controller(runner.clone(), audit.clone());

        assert!(ctl.restart_service("ops").await.is_ok());
        let err = ctl.restart_service("ops").await.unwrap_err();
        assert_eq!(err.to_string(), "Process error: Job for named.service failed");
        assert_eq!(runner.calls()[0], "systemctl restart named");

        let statuses: Vec<AuditStatus> = audit.facts().iter().map(|f| f.status).collect();
        assert_eq!(statuses, vec![AuditStatus::Success, AuditStatus::Failure]);
    }

    #[tokio::test]
    async fn test_check_reports() {
        let runner = Arc::new(ScriptedRunner::new(vec![
            Ok(exit(0, "", "")),
            Ok(exit(1, "", "example.com.hosts:4: unknown RR type 'AX'")),
        ]));
        let audit = Arc::new(MemoryAuditSink::new());
        let ctl = controller(runner.clone(), audit);

        assert!(ctl.check_config().await.unwrap().valid);
        let report = ctl
            .check_zone("example.com", Path::new("/var/named/example.com.hosts"))
            .await
            .unwrap();
        assert!(!report.valid);
        assert!(report.stderr.contains("unknown RR type"));
        assert_eq!(
            runner.calls(),
            vec![
                "named-checkconf /etc/named.conf".to_string(),
                "named-checkzone example.com /var/named/example.com.hosts".to_string(),
            ]
        );
    }
}
