//! Fault isolation around widget rendering.
//!
//! Anything the widget raises while producing its markup, whether an error or
//! a panic, is turned into readable text and logged. Callers show that text in
//! place of the widget instead of failing the whole page.

use serde_json::{Value, json};
use std::any::Any;
use std::backtrace::BacktraceStatus;
use std::panic::{self, AssertUnwindSafe};
use tracing::error;

pub const CRASH_PREFIX: &str = "embed widget crashed:";

/// Pretty-prints a JSON value, falling back to the compact form.
pub fn safe_stringify(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Describes an error as `{name, message, causes, stack}`.
pub fn describe_error(err: &anyhow::Error) -> Value {
    let causes: Vec<String> = err.chain().skip(1).map(|c| c.to_string()).collect();
    let mut described = json!({
        "name": "RenderError",
        "message": err.to_string(),
    });
    if !causes.is_empty() {
        described["causes"] = json!(causes);
    }
    let backtrace = err.backtrace();
    if backtrace.status() == BacktraceStatus::Captured {
        described["stack"] = json!(backtrace.to_string());
    }
    described
}

fn describe_panic(payload: &(dyn Any + Send)) -> Value {
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    };
    json!({ "name": "panic", "message": message })
}

pub fn crash_report(detail: &Value) -> String {
    format!("{CRASH_PREFIX}\n{}", safe_stringify(detail))
}

/// Runs a widget render, converting failures into a crash report.
pub fn guard_render<F>(render: F) -> Result<String, String>
where
    F: FnOnce() -> anyhow::Result<String>,
{
    let detail = match panic::catch_unwind(AssertUnwindSafe(render)) {
        Ok(Ok(html)) => return Ok(html),
        Ok(Err(err)) => describe_error(&err),
        Err(payload) => describe_panic(&*payload),
    };
    let report = crash_report(&detail);
    error!(detail = %detail, "embed widget render error");
    Err(report)
}
