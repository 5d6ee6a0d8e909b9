pub fn sdk_script() -> String {
    r#"// Power BI embed bootstrap: mirrors the server-side view and drives the widget.
(function(global) {
  const page = document.getElementById("embed-page");
  const root = document.getElementById("embed-root");
  if (!page || !root) return;

  const base = "/api/pages/" + encodeURIComponent(page.dataset.pageId);
  const pollMs = Number(page.dataset.pollMs) || 250;
  let embedded = false;
  let stopped = false;

  function describe(value) {
    if (value instanceof Error) {
      return { name: value.name, message: value.message, stack: value.stack };
    }
    return value === undefined ? null : value;
  }

  async function post(path, body) {
    try {
      const res = await fetch(base + path, {
        method: "POST",
        headers: { "Content-Type": "application/json" },
        body: JSON.stringify(body),
      });
      return res.ok;
    } catch (err) {
      console.warn("embed: failed to post", path, err);
      return false;
    }
  }

  // Used when the server can no longer record the error for this page.
  function showLocalError(text) {
    stopped = true;
    const panel = document.createElement("pre");
    panel.className = "embed-error";
    panel.setAttribute("role", "alert");
    panel.textContent = text;
    root.replaceChildren(panel);
  }

  async function report(event, fallbackText) {
    const recorded = await post("/events", event);
    if (recorded) {
      refresh();
    } else {
      showLocalError(fallbackText);
    }
  }

  function schedule() {
    if (!stopped) setTimeout(refresh, pollMs);
  }

  async function refresh() {
    if (stopped) return;
    let view;
    try {
      const res = await fetch(base + "/view", { cache: "no-store" });
      if (!res.ok) {
        showLocalError("embed page is no longer available (" + res.status + "); reload to retry");
        return;
      }
      view = await res.json();
    } catch (err) {
      console.warn("embed: failed to load view", err);
      schedule();
      return;
    }
    if (view.kind === "loading") {
      root.innerHTML = view.html;
      schedule();
    } else if (view.kind === "error") {
      stopped = true;
      root.innerHTML = view.html;
    } else if (!embedded) {
      root.innerHTML = view.html;
      embed();
    }
  }

  function embed() {
    const container = root.querySelector(".embed-container");
    const configNode = root.querySelector("script.embed-config");
    embedded = true;
    if (!container || !configNode) {
      const err = new Error("embed container or configuration missing from view");
      report({ event: "fault", detail: describe(err) }, "embed widget crashed:\n" + err.message);
      return;
    }
    try {
      const config = JSON.parse(configNode.textContent);
      const widget = global.powerbi.embed(container, config);
      widget.on("loaded", function() {
        console.log("Report loaded");
        post("/events", { event: "loaded" });
      });
      widget.on("rendered", function() {
        console.log("Report rendered");
        post("/events", { event: "rendered" });
      });
      widget.on("error", function(event) {
        const detail = describe(event ? event.detail : undefined);
        console.log("PowerBI error", detail);
        report(
          { event: "error", detail: detail },
          detail === null ? "embed widget reported an error without detail" : JSON.stringify(detail, null, 2)
        );
      });
    } catch (err) {
      console.error("PowerBI embed render error:", err);
      const detail = describe(err);
      report({ event: "fault", detail: detail }, "embed widget crashed:\n" + JSON.stringify(detail, null, 2));
    }
  }

  global.addEventListener("pagehide", function() {
    stopped = true;
    navigator.sendBeacon(base + "/unmount");
  });

  refresh();
})(window);
"#
    .to_string()
}
