//! [`Driver`] implementation over CDP.
//!
//! Element handles are indices into a page-side registry
//! (`window.__oneclock.els`); every element operation runs as injected JS
//! against that registry. Frame context is a path of iframe registry
//! indices, resolved on each call, which keeps same-origin frame documents
//! reachable without switching CDP sessions.

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType,
};
use chromiumoxide::cdp::browser_protocol::target::CloseTargetParams;
use chromiumoxide::page::ScreenshotParams;
use tracing::debug;

use oneclock_core::driver::{
    By, Driver, ElementId, Key, Modifier, ScriptArg, WindowHandle,
};
use oneclock_core::error::DriverError;

use crate::cdp::CdpClient;

/// Shared JS prelude: registry bootstrap plus resolution of the current
/// frame document from the frame path.
const PRELUDE: &str = r#"
if (!window.__oneclock) { window.__oneclock = { els: [] }; }
const __reg = window.__oneclock;
const __doc = (function(path) {
    let doc = document;
    for (const i of path) {
        const f = __reg.els[i];
        if (!f || !f.contentDocument) return null;
        doc = f.contentDocument;
    }
    return doc;
})(__FRAME_PATH__);
"#;

pub struct HeadlessDriver {
    client: CdpClient,
    frame_path: Vec<u64>,
}

impl HeadlessDriver {
    /// Launch a fresh browser session with no cookies.
    pub async fn launch(headless: bool) -> Result<Self, DriverError> {
        let client = CdpClient::launch(headless)
            .await
            .map_err(|e| DriverError::Other(format!("browser launch failed: {e}")))?;
        Ok(Self {
            client,
            frame_path: Vec::new(),
        })
    }

    fn expr(&self, body: &str, args: &[ScriptArg]) -> String {
        let prelude = PRELUDE.replace(
            "__FRAME_PATH__",
            &serde_json::to_string(&self.frame_path).unwrap_or_else(|_| "[]".into()),
        );
        let args_expr: Vec<String> = args
            .iter()
            .map(|a| match a {
                ScriptArg::Value(v) => v.to_string(),
                ScriptArg::Element(el) => format!("window.__oneclock.els[{}]", el.0),
            })
            .collect();
        format!(
            "(function() {{\n{prelude}\nreturn (function() {{\n{body}\n;return null;\n}}).apply(null, [{}]);\n}})()",
            args_expr.join(", ")
        )
    }

    async fn eval(
        &self,
        body: &str,
        args: &[ScriptArg],
    ) -> Result<serde_json::Value, DriverError> {
        let expression = self.expr(body, args);
        let result = self
            .client
            .page
            .evaluate(expression)
            .await
            .map_err(|e| classify(&e.to_string()))?;
        result
            .into_value::<serde_json::Value>()
            .map_err(|e| DriverError::Script(format!("result decode failed: {e}")))
    }

    /// Element op helper: binds `el` (checked for staleness) before `body`.
    async fn eval_el(
        &self,
        el: ElementId,
        body: &str,
        extra: Vec<ScriptArg>,
    ) -> Result<serde_json::Value, DriverError> {
        let guarded = format!(
            "const el = arguments[0];\nif (!el || !el.isConnected) throw new Error('stale element');\n{body}"
        );
        let mut args = vec![ScriptArg::Element(el)];
        args.extend(extra);
        self.eval(&guarded, &args).await
    }

    async fn key_event(
        &self,
        r#type: DispatchKeyEventType,
        key: &str,
        text: Option<&str>,
        modifiers: i64,
    ) -> Result<(), DriverError> {
        let mut builder = DispatchKeyEventParams::builder()
            .r#type(r#type)
            .key(key)
            .modifiers(modifiers);
        if let Some(text) = text {
            builder = builder.text(text);
        }
        let params = builder
            .build()
            .map_err(|e| DriverError::Other(format!("bad key event: {e:?}")))?;
        self.client
            .page
            .execute(params)
            .await
            .map_err(|e| DriverError::Other(format!("key dispatch failed: {e}")))?;
        Ok(())
    }

    async fn tap_key(&self, key: &str, modifiers: i64) -> Result<(), DriverError> {
        self.key_event(DispatchKeyEventType::KeyDown, key, None, modifiers)
            .await?;
        self.key_event(DispatchKeyEventType::KeyUp, key, None, modifiers)
            .await
    }

    async fn focus(&self, el: ElementId) -> Result<(), DriverError> {
        self.eval_el(el, "el.focus();", vec![]).await?;
        Ok(())
    }

    fn handle_of(page: &chromiumoxide::Page) -> WindowHandle {
        WindowHandle(format!("{:?}", page.target_id()))
    }

    async fn page_for(
        &self,
        handle: &WindowHandle,
    ) -> Result<chromiumoxide::Page, DriverError> {
        let pages = self
            .client
            .browser
            .pages()
            .await
            .map_err(|e| DriverError::Other(format!("listing pages failed: {e}")))?;
        for page in pages {
            if Self::handle_of(&page) == *handle {
                return Ok(page);
            }
        }
        Err(DriverError::NoSuchWindow(handle.0.clone()))
    }
}

/// CDP evaluation failures carry the JS exception text; sort them into the
/// error taxonomy the core reacts to.
fn classify(message: &str) -> DriverError {
    if message.contains("stale element") {
        DriverError::Stale
    } else if message.contains("Session closed") || message.contains("browser closed") {
        DriverError::SessionGone
    } else {
        DriverError::Script(message.to_string())
    }
}

fn find_js(by: &By) -> (String, serde_json::Value) {
    match by {
        By::Id(v) => (
            "return __doc.getElementById(arguments[0]);".into(),
            v.clone().into(),
        ),
        By::Name(v) => (
            "return __doc.querySelector(`[name=\"${arguments[0]}\"]`);".into(),
            v.clone().into(),
        ),
        By::Css(v) => (
            "return __doc.querySelector(arguments[0]);".into(),
            v.clone().into(),
        ),
        By::XPath(v) => (
            "return __doc.evaluate(arguments[0], __doc, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue;"
                .into(),
            v.clone().into(),
        ),
        By::LinkText(v) => (
            "return Array.from(__doc.querySelectorAll('a')).find(a => (a.textContent || '').trim() === arguments[0]);"
                .into(),
            v.clone().into(),
        ),
        By::PartialLinkText(v) => (
            "return Array.from(__doc.querySelectorAll('a')).find(a => (a.textContent || '').includes(arguments[0]));"
                .into(),
            v.clone().into(),
        ),
    }
}

#[async_trait]
impl Driver for HeadlessDriver {
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError> {
        self.frame_path.clear();
        self.client
            .page
            .goto(url)
            .await
            .map_err(|e| DriverError::Navigation(e.to_string()))?;
        Ok(())
    }

    async fn refresh(&mut self) -> Result<(), DriverError> {
        self.frame_path.clear();
        self.client
            .page
            .reload()
            .await
            .map_err(|e| DriverError::Navigation(e.to_string()))?;
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String, DriverError> {
        self.client
            .page
            .url()
            .await
            .map_err(|e| DriverError::Other(format!("url read failed: {e}")))?
            .ok_or_else(|| DriverError::NoSuchWindow("page has no url".into()))
    }

    async fn page_source(&mut self) -> Result<String, DriverError> {
        let value = self
            .eval(
                "if (!__doc || !__doc.documentElement) return '';\nreturn __doc.documentElement.outerHTML;",
                &[],
            )
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn find(&mut self, by: &By) -> Result<ElementId, DriverError> {
        let (snippet, query) = find_js(by);
        let body = format!(
            "if (!__doc) return null;\nconst target = (function() {{ {snippet} }})();\nif (!target) return null;\n__reg.els.push(target);\nreturn __reg.els.length - 1;"
        );
        // The inner function shadows `arguments`; bind the query first.
        let body = format!("const q = arguments[0];\n{}", body.replace("arguments[0]", "q"));
        let value = self.eval(&body, &[ScriptArg::Value(query)]).await?;
        match value.as_u64() {
            Some(idx) => Ok(ElementId(idx)),
            None => Err(DriverError::NotFound(format!("{by:?}"))),
        }
    }

    async fn click(&mut self, el: ElementId) -> Result<(), DriverError> {
        // The visibility check approximates a trusted click's preconditions.
        self.eval_el(
            el,
            "const r = el.getBoundingClientRect();\nif (r.width === 0 || r.height === 0) throw new Error('not interactable');\nel.scrollIntoView({ block: 'center' });\nel.click();",
            vec![],
        )
        .await
        .map_err(|e| match e {
            DriverError::Script(m) if m.contains("not interactable") => {
                DriverError::NotInteractable(m)
            }
            other => other,
        })?;
        Ok(())
    }

    async fn type_text(&mut self, el: ElementId, text: &str) -> Result<(), DriverError> {
        self.focus(el).await?;
        for ch in text.chars() {
            let s = ch.to_string();
            self.key_event(DispatchKeyEventType::Char, &s, Some(&s), 0)
                .await?;
        }
        Ok(())
    }

    async fn press_key(&mut self, el: ElementId, key: Key) -> Result<(), DriverError> {
        self.focus(el).await?;
        let name = match key {
            Key::Enter => "Enter",
            Key::Escape => "Escape",
            Key::Tab => "Tab",
            Key::Backspace => "Backspace",
        };
        self.tap_key(name, 0).await
    }

    async fn key_chord(
        &mut self,
        el: ElementId,
        modifier: Modifier,
        key: char,
    ) -> Result<(), DriverError> {
        self.focus(el).await?;
        // CDP modifier bitmask: alt=1, ctrl=2, meta=4, shift=8.
        let flags = match modifier {
            Modifier::Control => 2,
            Modifier::Command => 4,
        };
        self.tap_key(&key.to_string(), flags).await
    }

    async fn clear(&mut self, el: ElementId) -> Result<(), DriverError> {
        self.eval_el(
            el,
            "el.value = '';\nel.dispatchEvent(new Event('input', { bubbles: true }));",
            vec![],
        )
        .await?;
        Ok(())
    }

    async fn select_option(&mut self, el: ElementId, value: &str) -> Result<(), DriverError> {
        let found = self
            .eval_el(
                el,
                "const val = arguments[1];\nconst opt = Array.from(el.options || []).find(o => o.value === val);\nif (!opt) return false;\nel.value = val;\nel.dispatchEvent(new Event('change', { bubbles: true }));\nreturn true;",
                vec![ScriptArg::Value(value.into())],
            )
            .await?;
        if found.as_bool() != Some(true) {
            return Err(DriverError::NotFound(format!("option value {value}")));
        }
        Ok(())
    }

    async fn attr(&mut self, el: ElementId, name: &str) -> Result<Option<String>, DriverError> {
        let value = self
            .eval_el(
                el,
                "const n = arguments[1];\nconst v = (n in el) ? el[n] : el.getAttribute(n);\nif (v === null || v === undefined || v === false) return null;\nif (v === true) return 'true';\nreturn String(v);",
                vec![ScriptArg::Value(name.into())],
            )
            .await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn text(&mut self, el: ElementId) -> Result<String, DriverError> {
        let value = self
            .eval_el(el, "return el.innerText || el.textContent || '';", vec![])
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn tag_name(&mut self, el: ElementId) -> Result<String, DriverError> {
        let value = self
            .eval_el(el, "return el.tagName.toLowerCase();", vec![])
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn is_displayed(&mut self, el: ElementId) -> Result<bool, DriverError> {
        let value = self
            .eval_el(
                el,
                "const r = el.getBoundingClientRect();\nconst s = getComputedStyle(el);\nreturn r.width > 0 && r.height > 0 && s.visibility !== 'hidden' && s.display !== 'none';",
                vec![],
            )
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn is_enabled(&mut self, el: ElementId) -> Result<bool, DriverError> {
        let value = self.eval_el(el, "return !el.disabled;", vec![]).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn execute_script(
        &mut self,
        js: &str,
        args: Vec<ScriptArg>,
    ) -> Result<serde_json::Value, DriverError> {
        self.eval(js, &args).await
    }

    async fn send_escape(&mut self) -> Result<(), DriverError> {
        self.tap_key("Escape", 0).await
    }

    async fn frames(&mut self) -> Result<Vec<ElementId>, DriverError> {
        let value = self
            .eval(
                "if (!__doc) return [];\nreturn Array.from(__doc.querySelectorAll('iframe')).map(f => { __reg.els.push(f); return __reg.els.length - 1; });",
                &[],
            )
            .await?;
        Ok(value
            .as_array()
            .map(|a| {
                a.iter()
                    .filter_map(|v| v.as_u64())
                    .map(ElementId)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn enter_frame(&mut self, frame: ElementId) -> Result<(), DriverError> {
        // Cross-origin frame documents are unreachable from page script.
        let reachable = self
            .eval_el(frame, "return !!el.contentDocument;", vec![])
            .await?;
        if reachable.as_bool() != Some(true) {
            return Err(DriverError::NoSuchFrame);
        }
        self.frame_path.push(frame.0);
        Ok(())
    }

    async fn leave_frame(&mut self) -> Result<(), DriverError> {
        self.frame_path.clear();
        Ok(())
    }

    async fn window_handles(&mut self) -> Result<Vec<WindowHandle>, DriverError> {
        let pages = self
            .client
            .browser
            .pages()
            .await
            .map_err(|e| DriverError::Other(format!("listing pages failed: {e}")))?;
        let mut handles = Vec::with_capacity(pages.len());
        for page in &pages {
            handles.push(Self::handle_of(page));
        }
        Ok(handles)
    }

    async fn current_window(&mut self) -> Result<WindowHandle, DriverError> {
        Ok(Self::handle_of(&self.client.page))
    }

    async fn switch_to_window(&mut self, handle: &WindowHandle) -> Result<(), DriverError> {
        let page = self.page_for(handle).await?;
        page.bring_to_front()
            .await
            .map_err(|e| DriverError::Other(format!("bring to front failed: {e}")))?;
        debug!(handle = %handle.0, "switched window");
        self.client.page = page;
        self.frame_path.clear();
        Ok(())
    }

    async fn close_window(&mut self) -> Result<(), DriverError> {
        let target_id = self.client.page.target_id().clone();
        self.client
            .page
            .execute(CloseTargetParams::new(target_id))
            .await
            .map_err(|e| DriverError::Other(format!("close target failed: {e}")))?;
        Ok(())
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, DriverError> {
        self.client
            .page
            .screenshot(ScreenshotParams::builder().build())
            .await
            .map_err(|e| DriverError::Other(format!("screenshot failed: {e}")))
    }

    async fn quit(&mut self) -> Result<(), DriverError> {
        self.client
            .close()
            .await
            .map_err(|e| DriverError::Other(format!("browser close failed: {e}")))
    }
}
