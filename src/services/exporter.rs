use actix_web::dev::ServerHandle;
use actix_web::{web, App, HttpResponse, HttpServer};
use log::{error, info, warn};
use prometheus::Registry;

use crate::metrics::encode_registry;
use crate::utils::error::CollectorError;

#[derive(Clone)]
struct ExporterState {
    registry: Registry,
}

/// Serves the registry in Prometheus text format on `GET /metrics`.
pub struct MetricsExporter {
    registry: Registry,
    server_handle: Option<ServerHandle>,
}

impl MetricsExporter {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            server_handle: None,
        }
    }

    pub async fn start(&mut self, port: u16) -> Result<(), CollectorError> {
        info!("🌐 Starting metrics exporter on port {}", port);

        let state = web::Data::new(ExporterState {
            registry: self.registry.clone(),
        });

        let server = HttpServer::new(move || App::new().app_data(state.clone()).configure(routes))
            .workers(1)
            .bind(("0.0.0.0", port))
            .map_err(|e| {
                CollectorError::ConfigError(format!("Cannot bind exporter port {}: {}", port, e))
            })?
            .run();

        self.server_handle = Some(server.handle());

        tokio::spawn(async move {
            if let Err(e) = server.await {
                error!("❌ Metrics exporter error: {}", e);
            }
        });

        info!("✅ Metrics exporter listening on 0.0.0.0:{}/metrics", port);
        Ok(())
    }

    pub async fn stop(&mut self) {
        if let Some(handle) = self.server_handle.take() {
            tokio::select! {
                _ = handle.stop(true) => {
                    info!("✅ Metrics exporter stopped gracefully");
                }
                _ = tokio::time::sleep(tokio::time::Duration::from_secs(5)) => {
                    warn!("⚠️  Metrics exporter shutdown timeout, forcing stop");
                    handle.stop(false).await;
                }
            }
        }
    }
}

fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/metrics", web::get().to(metrics))
        .route("/health", web::get().to(health_check));
}

async fn metrics(state: web::Data<ExporterState>) -> HttpResponse {
    match encode_registry(&state.registry) {
        Ok(body) => HttpResponse::Ok()
            .content_type(prometheus::TEXT_FORMAT)
            .body(body),
        Err(e) => {
            error!("❌ Failed to encode metrics: {}", e);
            HttpResponse::InternalServerError().body(e.to_string())
        }
    }
}

async fn health_check() -> HttpResponse {
    HttpResponse::Ok().body("OK")
}
