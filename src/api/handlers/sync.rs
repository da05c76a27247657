use crate::api::models::{SyncRequest, SyncResponse};
use crate::api::server::AgentState;
use crate::daemon::NamedController;
use crate::error::{Result, ZoneError};
use actix_web::{web, HttpRequest, HttpResponse};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tracing::{info, warn};

const AGENT_USER: &str = "sync-agent";

/// Secondary-side handling of a sync trigger: drop the cached copy of the
/// zone so the daemon re-transfers it, then restart the daemon.
pub struct SyncAgent {
    secret_digest: Vec<u8>,
    slave_dir: PathBuf,
    controller: Arc<NamedController>,
}

impl SyncAgent {
    pub fn new(secret: &str, slave_dir: impl Into<PathBuf>, controller: Arc<NamedController>) -> Self {
        Self {
            secret_digest: Sha256::digest(secret.as_bytes()).to_vec(),
            slave_dir: slave_dir.into(),
            controller,
        }
    }

    pub fn slave_dir(&self) -> &PathBuf {
        &self.slave_dir
    }

    fn secret_matches(&self, supplied: Option<&str>) -> bool {
        match supplied {
            Some(secret) => Sha256::digest(secret.as_bytes()).as_slice() == self.secret_digest.as_slice(),
            None => false,
        }
    }

    /// Checks run in order: body present, secret, filename. Nothing is
    /// touched on disk until all three pass.
    pub async fn apply(&self, request: Option<SyncRequest>, peer: &str) -> Result<SyncResponse> {
        let request = request.ok_or_else(|| ZoneError::BadRequest("No data provided".into()))?;

        if !self.secret_matches(request.secret.as_deref()) {
            warn!("Invalid secret attempt from {}", peer);
            return Err(ZoneError::Unauthorized);
        }

        let filename = request
            .filename
            .filter(|f| !f.is_empty())
            .ok_or_else(|| ZoneError::BadRequest("Filename missing".into()))?;
        let file = sanitize_filename(&filename)
            .ok_or_else(|| ZoneError::BadRequest(format!("Invalid filename: {}", filename)))?;

        info!("Received sync request for {}", file);
        let path = self.slave_dir.join(&file);
        match fs::remove_file(&path).await {
            Ok(()) => info!("Deleted file: {}", path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("File not found (already deleted?): {}", path.display())
            }
            Err(e) => return Err(e.into()),
        }

        self.controller.restart_service(AGENT_USER).await?;

        Ok(SyncResponse {
            success: true,
            message: "Sync complete".to_string(),
            file,
        })
    }
}

/// Last path component, with both `/` and `\` treated as separators.
pub fn sanitize_filename(filename: &str) -> Option<String> {
    filename
        .rsplit(['/', '\\'])
        .next()
        .map(str::trim)
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .map(str::to_string)
}

pub async fn sync_zone(
    state: web::Data<AgentState>,
    req: HttpRequest,
    body: Option<web::Json<SyncRequest>>,
) -> actix_web::Result<HttpResponse> {
    let peer = req
        .peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let response = state
        .agent
        .apply(body.map(web::Json::into_inner), &peer)
        .await?;
    Ok(HttpResponse::Ok().json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::server::configure;
    use crate::config::DaemonConfig;
    use crate::daemon::command::testing::{exit, ScriptedRunner};
    use crate::dns::audit::MemoryAuditSink;
    use actix_web::{http::StatusCode, test, App};
    use serde_json::json;
    use tempfile::TempDir;

    struct Harness {
        dir: TempDir,
        runner: Arc<ScriptedRunner>,
        state: web::Data<AgentState>,
    }

    fn harness(runner: ScriptedRunner) -> Harness {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("example.com.hosts"), "cached").unwrap();

        let runner = Arc::new(runner);
        let daemon = DaemonConfig {
            systemctl_path: PathBuf::from("systemctl"),
            ..DaemonConfig::default()
        };
        let controller = Arc::new(NamedController::new(
            runner.clone(),
            daemon,
            "/etc/named.conf",
            Arc::new(MemoryAuditSink::new()),
        ));
        let agent = SyncAgent::new("correct", dir.path(), controller);
        Harness {
            dir,
            runner,
            state: web::Data::new(AgentState { agent }),
        }
    }

    #[actix_web::test]
    async fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("example.com.hosts").as_deref(), Some("example.com.hosts"));
        assert_eq!(sanitize_filename("../../etc/passwd").as_deref(), Some("passwd"));
        assert_eq!(sanitize_filename("..\\..\\boot.ini").as_deref(), Some("boot.ini"));
        assert_eq!(sanitize_filename("zones/"), None);
        assert_eq!(sanitize_filename(".."), None);
    }

    #[actix_web::test]
    async fn test_wrong_secret_is_rejected_without_side_effects() {
        let h = harness(ScriptedRunner::always(exit(0, "", "")));
        let app = test::init_service(App::new().app_data(h.state.clone()).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/sync")
            .set_json(json!({ "filename": "example.com.hosts", "secret": "wrong" }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(h.dir.path().join("example.com.hosts").exists());
        assert!(h.runner.calls().is_empty());
    }

    #[actix_web::test]
    async fn test_missing_filename_and_body() {
        let h = harness(ScriptedRunner::always(exit(0, "", "")));
        let app = test::init_service(App::new().app_data(h.state.clone()).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/sync")
            .set_json(json!({ "secret": "correct" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post().uri("/sync").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        assert!(h.runner.calls().is_empty());
    }

    #[actix_web::test]
    async fn test_sync_deletes_and_restarts() {
        let h = harness(ScriptedRunner::always(exit(0, "", "")));
        let app = test::init_service(App::new().app_data(h.state.clone()).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/sync")
            .set_json(json!({ "filename": "../example.com.hosts", "secret": "correct" }))
            .to_request();
        let resp: SyncResponse = test::call_and_read_body_json(&app, req).await;

        assert!(resp.success);
        assert_eq!(resp.file, "example.com.hosts");
        assert!(!h.dir.path().join("example.com.hosts").exists());
        assert_eq!(h.runner.calls(), vec!["systemctl restart named".to_string()]);

        // Already gone: still a restart, still 200.
        let req = test::TestRequest::post()
            .uri("/sync")
            .set_json(json!({ "filename": "example.com.hosts", "secret": "correct" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
        assert_eq!(h.runner.calls().len(), 2);
    }

    #[actix_web::test]
    async fn test_restart_failure_is_server_error() {
        let h = harness(ScriptedRunner::new(vec![Ok(exit(1, "", "Job for named.service failed"))]));
        let app = test::init_service(App::new().app_data(h.state.clone()).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/sync")
            .set_json(json!({ "filename": "example.com.hosts", "secret": "correct" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("named.service"));
    }
}
