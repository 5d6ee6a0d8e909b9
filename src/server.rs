use crate::config::AppConfig;
use crate::credentials::CredentialLoader;
use crate::embed::EmbedWidget;
use crate::pages::PageRegistry;
use crate::telemetry::TelemetrySink;
use axum::Router;
use axum::http::{HeaderValue, header};
use axum::routing::{get, post};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub pages: Arc<PageRegistry>,
    pub loader: Arc<dyn CredentialLoader>,
    pub widget: Arc<dyn EmbedWidget>,
    pub telemetry: Arc<dyn TelemetrySink>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        loader: Arc<dyn CredentialLoader>,
        widget: Arc<dyn EmbedWidget>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            pages: Arc::new(PageRegistry::new()),
            loader,
            widget,
            telemetry,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/", get(crate::api::index))
        .route("/api/pages/{id}/view", get(crate::api::get_view))
        .route("/api/pages/{id}/events", post(crate::api::post_event))
        .route("/api/pages/{id}/unmount", post(crate::api::unmount_page))
        .route("/sdk/embed.js", get(crate::api::serve_sdk))
        .route("/healthz", get(crate::api::healthz))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http());
    if state.config.enable_cors {
        router = router.layer(CorsLayer::permissive());
    }
    router.with_state(state)
}

pub async fn run(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let pages = state.pages.clone();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    pages.unmount_all().await;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(?err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
