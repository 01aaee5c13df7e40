//! Interaction primitives that survive the portal's quirks.
//!
//! These never propagate driver errors upward. A click that fails both ways
//! just reports `false`; a value that cannot be asserted is left for the
//! caller's detectors to notice.

use tracing::debug;

use crate::driver::{Driver, ElementId, Key, Modifier, ScriptArg};

/// Script-dispatched click, used when the native click is intercepted.
pub const CLICK_JS: &str = "arguments[0].click();";

/// Framework-aware value assignment. Controlled inputs ignore plain typing,
/// so this goes through the prototype setter and replays the event stream
/// the page's framework listens for.
pub const SET_VALUE_JS: &str = r#"
const el = arguments[0];
const val = arguments[1];
el.focus();
const setter = Object.getOwnPropertyDescriptor(window.HTMLInputElement.prototype, 'value')?.set;
if (setter) setter.call(el, val);
else el.value = val;
el.dispatchEvent(new Event('input', { bubbles: true }));
el.dispatchEvent(new Event('change', { bubbles: true }));
el.dispatchEvent(new KeyboardEvent('keyup', { bubbles: true }));
el.dispatchEvent(new KeyboardEvent('keydown', { bubbles: true }));
el.blur();
"#;

/// Click the first clickable element whose text matches a pattern.
/// `arguments[0]` is a regex source string, `arguments[1]` a CSS selector
/// list to search.
pub const CLICK_BY_TEXT_JS: &str = r#"
const pattern = new RegExp(arguments[0], 'i');
const sel = arguments[1];
const target = Array.from(document.querySelectorAll(sel)).find(el => pattern.test(el.textContent || ''));
if (target) { target.click(); return true; }
return false;
"#;

/// Native click with a scripted fallback. True when either path succeeded.
pub async fn click<D: Driver + ?Sized>(driver: &mut D, el: ElementId) -> bool {
    if driver.click(el).await.is_ok() {
        return true;
    }
    match driver
        .execute_script(CLICK_JS, vec![ScriptArg::Element(el)])
        .await
    {
        Ok(_) => true,
        Err(e) => {
            debug!(error = %e, "both click paths failed");
            false
        }
    }
}

/// Click the first element under `selectors` whose text matches `pattern`
/// (case-insensitive). Runs entirely in page script.
pub async fn click_by_text<D: Driver + ?Sized>(
    driver: &mut D,
    pattern: &str,
    selectors: &str,
) -> bool {
    driver
        .execute_script(
            CLICK_BY_TEXT_JS,
            vec![
                ScriptArg::Value(pattern.into()),
                ScriptArg::Value(selectors.into()),
            ],
        )
        .await
        .ok()
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

/// Put `value` into an input, working around controlled (framework-managed)
/// fields.
///
/// Clears via select-all keystrokes, types natively, reads the value back,
/// and only falls back to the scripted setter when the typed value did not
/// stick. Idempotent: asserting the same value twice leaves one copy.
pub async fn set_value<D: Driver + ?Sized>(driver: &mut D, el: ElementId, value: &str) {
    let _ = driver.click(el).await;

    // Select-all then delete. Command for macOS sessions, Control elsewhere,
    // plain clear() as the last resort.
    let cleared = async {
        if driver.key_chord(el, Modifier::Command, 'a').await.is_ok() {
            return driver.press_key(el, Key::Backspace).await.is_ok();
        }
        if driver.key_chord(el, Modifier::Control, 'a').await.is_ok() {
            return driver.press_key(el, Key::Backspace).await.is_ok();
        }
        false
    }
    .await;
    if !cleared {
        let _ = driver.clear(el).await;
    }

    // Native keystrokes first; some pages only enable their submit button
    // off trusted input events.
    if let Err(e) = driver.type_text(el, value).await {
        debug!(error = %e, "typing into input failed");
    }

    let current = driver
        .attr(el, "value")
        .await
        .ok()
        .flatten()
        .unwrap_or_default();
    if current.trim() == value.trim() {
        return;
    }

    debug!("typed value did not stick, using scripted setter");
    if let Err(e) = driver
        .execute_script(
            SET_VALUE_JS,
            vec![ScriptArg::Element(el), ScriptArg::Value(value.into())],
        )
        .await
    {
        debug!(error = %e, "scripted value assignment failed");
    }
}
