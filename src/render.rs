use crate::boundary::guard_render;
use crate::config::AppConfig;
use crate::embed::{EmbedConfiguration, EmbedWidget};
use crate::view::ViewState;
use kuchiki::NodeRef;
use kuchiki::traits::*;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

const LOADING_HTML: &str = "<div class=\"embed-loading\">Loading...</div>";

const PAGE_SHELL: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Power BI Embed</title>
<style>
html, body { margin: 0; height: 100%; }
body { font-family: system-ui, sans-serif; }
main { display: flex; flex-direction: column; box-sizing: border-box; height: 100vh; padding: 16px; }
h1 { margin: 0 0 12px; font-size: 1.5rem; }
#embed-root { flex: 1; min-height: 0; }
.embed-frame { width: 100%; height: 100%; border: 1px solid #ddd; box-sizing: border-box; }
.embed-container, .embed-container iframe { width: 100%; height: 100%; border: 0; }
.embed-error { color: crimson; white-space: pre-wrap; margin: 0; }
</style>
</head>
<body>
<main id="embed-page">
<h1>Power BI Embed</h1>
<div id="embed-root"></div>
</main>
<script id="powerbi-client"></script>
<script src="/sdk/embed.js"></script>
</body>
</html>
"#;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("html manipulation failed: {0}")]
    Html(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewKind {
    Loading,
    Error,
    Ready,
}

/// HTML for the `#embed-root` region plus what it represents.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedView {
    pub kind: ViewKind,
    pub html: String,
}

fn error_view(message: &str) -> RenderedView {
    let text = NodeRef::new_text(message).to_string();
    RenderedView {
        kind: ViewKind::Error,
        html: format!("<pre class=\"embed-error\" role=\"alert\">{text}</pre>"),
    }
}

/// Renders one view state. The widget only runs for a complete bundle, and
/// always inside the fault boundary.
pub fn render_view(state: &ViewState, widget: &dyn EmbedWidget) -> RenderedView {
    match state {
        ViewState::Loading => RenderedView {
            kind: ViewKind::Loading,
            html: LOADING_HTML.to_string(),
        },
        ViewState::Error { message } => error_view(message),
        ViewState::Ready(bundle) => {
            let config = EmbedConfiguration::for_bundle(bundle);
            match guard_render(|| widget.render(&config)) {
                Ok(widget_html) => RenderedView {
                    kind: ViewKind::Ready,
                    html: format!("<div class=\"embed-frame\">{widget_html}</div>"),
                },
                Err(report) => error_view(&report),
            }
        }
    }
}

/// Full page document for a freshly mounted page.
pub fn render_page(
    page_id: Uuid,
    state: &ViewState,
    widget: &dyn EmbedWidget,
    config: &AppConfig,
) -> Result<String, RenderError> {
    let document = kuchiki::parse_html().one(PAGE_SHELL);
    set_attribute(&document, "#embed-page", "data-page-id", page_id.to_string())?;
    set_attribute(
        &document,
        "#embed-page",
        "data-poll-ms",
        config.view_poll_interval.as_millis().to_string(),
    )?;
    set_attribute(
        &document,
        "#powerbi-client",
        "src",
        config.powerbi_client_url.clone(),
    )?;
    let view = render_view(state, widget);
    replace_inner_html(&document, "#embed-root", &view.html)?;
    Ok(document.to_string())
}

fn set_attribute(
    document: &NodeRef,
    selector: &str,
    name: &str,
    value: String,
) -> Result<(), RenderError> {
    let node = document
        .select_first(selector)
        .map_err(|_| RenderError::Html(format!("query selector {selector} matched nothing")))?;
    node.attributes.borrow_mut().insert(name, value);
    Ok(())
}

fn replace_inner_html(document: &NodeRef, selector: &str, new_html: &str) -> Result<(), RenderError> {
    let target = document
        .select_first(selector)
        .map_err(|_| RenderError::Html(format!("query selector {selector} matched nothing")))?;
    let node = target.as_node();
    let existing: Vec<_> = node.children().collect();
    for child in existing {
        child.detach();
    }

    let wrapper_html = format!("<div id=\"__embed_view_wrapper\">{new_html}</div>");
    let fragment_doc = kuchiki::parse_html().one(wrapper_html);
    let wrapper = fragment_doc
        .select_first("#__embed_view_wrapper")
        .map_err(|_| RenderError::Html("view wrapper missing".to_string()))?;
    let children: Vec<_> = wrapper.as_node().children().collect();
    for child in children {
        node.append(child);
    }
    Ok(())
}
