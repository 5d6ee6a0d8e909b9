use crate::embed::{WidgetEvent, handle_widget_event};
use crate::render::{render_page, render_view};
use crate::server::AppState;
use crate::telemetry::set_page_telemetry_ctx;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use tracing::{error, warn};
use uuid::Uuid;

const SDK_OVERRIDE_PATH: &str = "assets/embed.js";

/// Mounts a page and returns its shell; the credential fetch runs in the background.
pub async fn index(State(state): State<AppState>) -> Response {
    state
        .pages
        .prune_expired(state.config.page_ttl, state.config.ready_page_ttl)
        .await;
    let (page_id, slot) = state.pages.mount(state.loader.clone()).await;
    set_page_telemetry_ctx(page_id);
    let view = slot.snapshot().await;
    match render_page(page_id, &view, state.widget.as_ref(), &state.config) {
        Ok(html) => Html(html).into_response(),
        Err(err) => {
            error!(%page_id, ?err, "failed to render page shell");
            state.pages.unmount(&page_id).await;
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

pub async fn get_view(State(state): State<AppState>, Path(page_id): Path<Uuid>) -> Response {
    let Some(slot) = state.pages.get(&page_id).await else {
        return (StatusCode::NOT_FOUND, "unknown page").into_response();
    };
    let view = slot.snapshot().await;
    Json(render_view(&view, state.widget.as_ref())).into_response()
}

pub async fn post_event(
    State(state): State<AppState>,
    Path(page_id): Path<Uuid>,
    Json(event): Json<WidgetEvent>,
) -> Response {
    set_page_telemetry_ctx(page_id);
    let Some(slot) = state.pages.get(&page_id).await else {
        return (StatusCode::NOT_FOUND, "unknown page").into_response();
    };
    match handle_widget_event(page_id, &slot, event, state.telemetry.as_ref()).await {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(err) => {
            warn!(%page_id, %err, "widget event rejected");
            (StatusCode::CONFLICT, err.to_string()).into_response()
        }
    }
}

pub async fn unmount_page(State(state): State<AppState>, Path(page_id): Path<Uuid>) -> StatusCode {
    state.pages.unmount(&page_id).await;
    StatusCode::NO_CONTENT
}

pub async fn serve_sdk() -> impl IntoResponse {
    let script = match tokio::fs::read_to_string(SDK_OVERRIDE_PATH).await {
        Ok(script) => script,
        Err(_) => crate::sdk::sdk_script(),
    };
    let mut resp = Response::new(script);
    resp.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/javascript"),
    );
    resp
}

pub async fn healthz() -> &'static str {
    "ok"
}
