use crate::api::handlers;
use crate::api::handlers::sync::SyncAgent;
use crate::config::Settings;
use crate::daemon::{CommandRunner, NamedController};
use crate::dns::audit::AuditSink;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info};

pub struct AgentState {
    pub agent: SyncAgent,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/sync", web::post().to(handlers::sync::sync_zone))
        .route("/health", web::get().to(handlers::system::health));
}

/// Serves the secondary sync endpoint until the server is stopped.
pub async fn start(
    settings: Arc<Settings>,
    runner: Arc<dyn CommandRunner>,
    audit: Arc<dyn AuditSink>,
) -> Result<()> {
    let bind = (settings.agent.bind_address.clone(), settings.agent.port);
    info!("Starting sync agent on {}:{}", bind.0, bind.1);

    let controller = Arc::new(NamedController::new(
        runner,
        settings.daemon.clone(),
        settings.zones.registry_path.clone(),
        audit,
    ));
    let state = web::Data::new(AgentState {
        agent: SyncAgent::new(&settings.agent.secret, &settings.agent.slave_dir, controller),
    });

    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(middleware::Logger::default())
            .wrap(middleware::NormalizePath::trim())
            .configure(configure)
    })
    .bind(bind)?
    .run();

    info!("Sync agent listening, slave directory {}", settings.agent.slave_dir.display());

    match server.await {
        Ok(_) => {
            info!("Sync agent shutdown gracefully");
            Ok(())
        }
        Err(e) => {
            error!("Sync agent error: {}", e);
            Err(anyhow::anyhow!("Sync agent failed: {}", e))
        }
    }
}
