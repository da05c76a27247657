use crate::api::models::HealthResponse;
use crate::api::server::AgentState;
use actix_web::{web, HttpResponse};
use chrono::Utc;

pub async fn health(state: web::Data<AgentState>) -> actix_web::Result<HttpResponse> {
    let response = HealthResponse {
        status: "healthy".to_string(),
        slave_dir: state.agent.slave_dir().clone(),
        timestamp: Utc::now(),
    };

    Ok(HttpResponse::Ok().json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::sync::SyncAgent;
    use crate::api::server::configure;
    use crate::config::DaemonConfig;
    use crate::daemon::NamedController;
    use crate::dns::audit::MemoryAuditSink;
    use crate::daemon::command::testing::ScriptedRunner;
    use actix_web::{test, App};
    use std::sync::Arc;

    #[actix_web::test]
    async fn test_health_reports_slave_dir() {
        let controller = Arc::new(NamedController::new(
            Arc::new(ScriptedRunner::default()),
            DaemonConfig::default(),
            "/etc/named.conf",
            Arc::new(MemoryAuditSink::new()),
        ));
        let state = web::Data::new(AgentState {
            agent: SyncAgent::new("s3cret", "/var/named/slaves", controller),
        });
        let app = test::init_service(App::new().app_data(state).configure(configure)).await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["slave_dir"], "/var/named/slaves");
    }
}
