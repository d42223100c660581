//! HTTP server for the Prometheus metrics endpoint.

use std::net::SocketAddr;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::collector::SharedCollector;
use crate::error::ExporterError;

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    collector: SharedCollector,
    metrics_path: String,
}

/// Create the HTTP router.
fn create_router(collector: SharedCollector, metrics_path: &str) -> Router {
    let state = AppState {
        collector,
        metrics_path: metrics_path.to_string(),
    };

    Router::new()
        .route("/", get(landing_handler))
        .route(metrics_path, get(metrics_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Handler for the metrics endpoint. Scrapes nginx on every request.
async fn metrics_handler(State(state): State<AppState>) -> Response {
    let body = state.collector.collect().await;

    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
        .into_response()
}

async fn landing_handler(State(state): State<AppState>) -> Html<String> {
    Html(format!(
        "<html>\n\
         <head><title>Nginx VTS Exporter</title></head>\n\
         <body>\n\
         <h1>Nginx VTS Exporter</h1>\n\
         <p><a href=\"{0}\">Metrics</a></p>\n\
         </body>\n\
         </html>\n",
        state.metrics_path
    ))
}

/// HTTP server bound to its listen address.
pub struct HttpServer {
    collector: SharedCollector,
    listener: TcpListener,
    metrics_path: String,
}

impl HttpServer {
    /// Bind the listen address. Failing to bind is fatal to the exporter.
    pub async fn bind(
        collector: SharedCollector,
        listen_addr: SocketAddr,
        metrics_path: String,
    ) -> Result<Self, ExporterError> {
        let listener = TcpListener::bind(listen_addr)
            .await
            .map_err(|source| ExporterError::ListenerBindFailure {
                addr: listen_addr,
                source,
            })?;

        Ok(Self {
            collector,
            listener,
            metrics_path,
        })
    }

    /// Address actually bound, which differs from the requested one for port 0.
    pub fn local_addr(&self) -> Result<SocketAddr, ExporterError> {
        self.listener.local_addr().map_err(ExporterError::Server)
    }

    /// Run the HTTP server until the shutdown signal is received.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<(), ExporterError> {
        let router = create_router(self.collector, &self.metrics_path);

        info!(
            addr = ?self.listener.local_addr().ok(),
            path = %self.metrics_path,
            "HTTP server listening"
        );

        // Run server with graceful shutdown
        axum::serve(self.listener, router)
            .with_graceful_shutdown(async move {
                loop {
                    if shutdown.changed().await.is_err() {
                        break;
                    }
                    if *shutdown.borrow() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await
            .map_err(ExporterError::Server)?;

        info!("HTTP server stopped");
        Ok(())
    }
}
