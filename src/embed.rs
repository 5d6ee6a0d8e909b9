use crate::boundary::{crash_report, safe_stringify};
use crate::credentials::CredentialBundle;
use crate::telemetry::{TelemetryEvent, TelemetrySink};
use crate::view::{TransitionError, ViewSlot, WriteOutcome};
use anyhow::Context;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const NO_DETAIL: &str = "embed widget reported an error without detail";

/// `powerbi-client` `models.TokenType`.
#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TokenType {
    Aad = 0,
    Embed = 1,
}

/// `powerbi-client` `models.BackgroundType`. There is no value 2.
#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BackgroundType {
    Default = 0,
    Transparent = 1,
}

impl Serialize for TokenType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

impl Serialize for BackgroundType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VisualType {
    Report,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaneSettings {
    pub expanded: bool,
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Panes {
    pub filters: PaneSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedSettings {
    pub panes: Panes,
    pub background: BackgroundType,
}

/// Configuration object passed to `powerbi.embed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedConfiguration {
    #[serde(rename = "type")]
    pub visual_type: VisualType,
    pub id: String,
    pub embed_url: String,
    pub access_token: String,
    pub token_type: TokenType,
    pub settings: EmbedSettings,
}

impl EmbedConfiguration {
    pub fn for_bundle(bundle: &CredentialBundle) -> Self {
        Self {
            visual_type: VisualType::Report,
            id: bundle.report_id.clone(),
            embed_url: bundle.embed_url.clone(),
            access_token: bundle.token.clone(),
            token_type: TokenType::Embed,
            settings: EmbedSettings {
                panes: Panes {
                    filters: PaneSettings {
                        expanded: false,
                        visible: false,
                    },
                },
                background: BackgroundType::Transparent,
            },
        }
    }
}

/// Produces the markup that hosts the third-party widget.
pub trait EmbedWidget: Send + Sync {
    fn render(&self, config: &EmbedConfiguration) -> anyhow::Result<String>;
}

/// Emits a `powerbi-client` container plus its configuration; the bootstrap
/// script calls `powerbi.embed` on it in the browser.
pub struct PowerBiWidget;

impl EmbedWidget for PowerBiWidget {
    fn render(&self, config: &EmbedConfiguration) -> anyhow::Result<String> {
        let json = serde_json::to_string(config).context("serializing embed configuration")?;
        // Keeps `</script>` inside string values from closing the tag.
        let json = json.replace('<', "\\u003c");
        Ok(format!(
            "<div class=\"embed-container\"></div><script type=\"application/json\" class=\"embed-config\">{json}</script>"
        ))
    }
}

/// Callbacks reported by the widget in the browser.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum WidgetEvent {
    Loaded,
    Rendered,
    Error {
        #[serde(default)]
        detail: Option<Value>,
    },
    /// `powerbi.embed` itself threw.
    Fault {
        #[serde(default)]
        detail: Option<Value>,
    },
}

impl WidgetEvent {
    fn name(&self) -> &'static str {
        match self {
            WidgetEvent::Loaded => "loaded",
            WidgetEvent::Rendered => "rendered",
            WidgetEvent::Error { .. } => "error",
            WidgetEvent::Fault { .. } => "fault",
        }
    }
}

/// Turns an `error` event payload into the message shown to the user.
pub fn describe_widget_error(detail: Option<&Value>) -> String {
    match detail {
        None | Some(Value::Null) => NO_DETAIL.to_string(),
        Some(detail) => safe_stringify(detail),
    }
}

pub async fn handle_widget_event(
    page_id: Uuid,
    slot: &ViewSlot,
    event: WidgetEvent,
    telemetry: &dyn TelemetrySink,
) -> Result<(), TransitionError> {
    let event_type = format!("embed.{}", event.name());
    let (message, metadata) = match event {
        WidgetEvent::Loaded => {
            info!(%page_id, "Report loaded");
            (None, Value::Null)
        }
        WidgetEvent::Rendered => {
            info!(%page_id, "Report rendered");
            (None, Value::Null)
        }
        WidgetEvent::Error { detail } => {
            let message = describe_widget_error(detail.as_ref());
            warn!(%page_id, error = %message, "PowerBI error");
            (Some(message), detail.unwrap_or(Value::Null))
        }
        WidgetEvent::Fault { detail } => {
            let detail = detail.unwrap_or(Value::Null);
            let message = crash_report(&detail);
            error!(%page_id, %detail, "PowerBI embed render error");
            (Some(message), detail)
        }
    };

    telemetry
        .record_event(TelemetryEvent::now(event_type, page_id, metadata))
        .await;

    let Some(message) = message else {
        return Ok(());
    };
    if slot.fail_widget(message).await? == WriteOutcome::Discarded {
        debug!(%page_id, "widget error after unmount; ignored");
    }
    Ok(())
}
