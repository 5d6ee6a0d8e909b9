use async_trait::async_trait;
use greentic_telemetry::init::TelemetryConfig;
use greentic_telemetry::init_telemetry;
use greentic_telemetry::{TelemetryCtx, set_current_telemetry_ctx};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

const SERVICE_NAME: &str = "powerbi-embed-gui";

#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn record_event(&self, event: TelemetryEvent);
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub event_type: String,
    pub page_id: Uuid,
    pub timestamp_ms: i64,
    pub metadata: serde_json::Value,
}

impl TelemetryEvent {
    pub fn now(event_type: impl Into<String>, page_id: Uuid, metadata: serde_json::Value) -> Self {
        Self {
            event_type: event_type.into(),
            page_id,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            metadata,
        }
    }
}

/// Tag the current task with the page being served.
pub fn set_page_telemetry_ctx(page_id: Uuid) {
    let ctx = TelemetryCtx::new(SERVICE_NAME.to_string())
        .with_session(page_id.to_string())
        .with_provider("powerbi".to_string());
    set_current_telemetry_ctx(ctx);
}

/// Sink backed by greentic-telemetry; events are emitted through `tracing`.
pub struct GreenticTelemetrySink;

impl GreenticTelemetrySink {
    pub fn init() {
        let _ = init_telemetry(TelemetryConfig {
            service_name: SERVICE_NAME.into(),
        });
    }
}

#[async_trait]
impl TelemetrySink for GreenticTelemetrySink {
    async fn record_event(&self, event: TelemetryEvent) {
        info!(
            target: "powerbi_embed_gui.telemetry",
            event_type = %event.event_type,
            page_id = %event.page_id,
            timestamp = event.timestamp_ms,
            metadata = %event.metadata,
            "embed telemetry event"
        );
    }
}
