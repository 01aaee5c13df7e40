//! The browser capability the workflow is written against.
//!
//! The core never talks to a browser directly; everything goes through the
//! [`Driver`] trait so the login flow can be exercised against a scripted
//! fake in tests and against headless Chromium in production.

use async_trait::async_trait;

use crate::error::DriverError;

/// A single element-lookup strategy with its query value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum By {
    Id(String),
    Name(String),
    Css(String),
    XPath(String),
    LinkText(String),
    PartialLinkText(String),
}

impl By {
    pub fn id(v: impl Into<String>) -> Self {
        By::Id(v.into())
    }
    pub fn name(v: impl Into<String>) -> Self {
        By::Name(v.into())
    }
    pub fn css(v: impl Into<String>) -> Self {
        By::Css(v.into())
    }
    pub fn xpath(v: impl Into<String>) -> Self {
        By::XPath(v.into())
    }
    pub fn link_text(v: impl Into<String>) -> Self {
        By::LinkText(v.into())
    }
    pub fn partial_link_text(v: impl Into<String>) -> Self {
        By::PartialLinkText(v.into())
    }
}

/// Opaque handle to an element resolved by the driver.
///
/// Handles become stale when the page navigates; drivers report that as
/// [`DriverError::Stale`] and callers re-locate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(pub u64);

/// Opaque handle to a browser window or tab.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub String);

/// Non-text keys used by the flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    Escape,
    Tab,
    Backspace,
}

/// Modifier for key chords (select-all during field clearing).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    Command,
    Control,
}

/// Argument passed to [`Driver::execute_script`].
///
/// The script source is a function body and each arg is bound to
/// `arguments[n]`, elements as live DOM nodes.
#[derive(Debug, Clone)]
pub enum ScriptArg {
    Value(serde_json::Value),
    Element(ElementId),
}

/// The browser-automation surface the login workflow consumes.
///
/// All methods are single-shot: no implicit waiting. Polling and retries are
/// the caller's job (see [`crate::locator`] and [`crate::poll`]).
#[async_trait]
pub trait Driver: Send {
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError>;
    async fn refresh(&mut self) -> Result<(), DriverError>;
    async fn current_url(&mut self) -> Result<String, DriverError>;
    /// Source of the document in the current frame context.
    async fn page_source(&mut self) -> Result<String, DriverError>;

    async fn find(&mut self, by: &By) -> Result<ElementId, DriverError>;

    async fn click(&mut self, el: ElementId) -> Result<(), DriverError>;
    async fn type_text(&mut self, el: ElementId, text: &str) -> Result<(), DriverError>;
    async fn press_key(&mut self, el: ElementId, key: Key) -> Result<(), DriverError>;
    async fn key_chord(
        &mut self,
        el: ElementId,
        modifier: Modifier,
        key: char,
    ) -> Result<(), DriverError>;
    async fn clear(&mut self, el: ElementId) -> Result<(), DriverError>;
    /// Select an option of a `<select>` element by its `value` attribute.
    async fn select_option(&mut self, el: ElementId, value: &str) -> Result<(), DriverError>;

    /// Property-or-attribute read, `None` when absent.
    async fn attr(&mut self, el: ElementId, name: &str) -> Result<Option<String>, DriverError>;
    async fn text(&mut self, el: ElementId) -> Result<String, DriverError>;
    async fn tag_name(&mut self, el: ElementId) -> Result<String, DriverError>;
    async fn is_displayed(&mut self, el: ElementId) -> Result<bool, DriverError>;
    async fn is_enabled(&mut self, el: ElementId) -> Result<bool, DriverError>;

    async fn execute_script(
        &mut self,
        js: &str,
        args: Vec<ScriptArg>,
    ) -> Result<serde_json::Value, DriverError>;

    /// Send Escape at page level (dismisses native passkey dialogs).
    async fn send_escape(&mut self) -> Result<(), DriverError>;

    /// The iframe elements of the current frame context.
    async fn frames(&mut self) -> Result<Vec<ElementId>, DriverError>;
    async fn enter_frame(&mut self, frame: ElementId) -> Result<(), DriverError>;
    /// Return to the top-level document.
    async fn leave_frame(&mut self) -> Result<(), DriverError>;

    async fn window_handles(&mut self) -> Result<Vec<WindowHandle>, DriverError>;
    async fn current_window(&mut self) -> Result<WindowHandle, DriverError>;
    async fn switch_to_window(&mut self, handle: &WindowHandle) -> Result<(), DriverError>;
    /// Close the current window; the caller must switch away afterwards.
    async fn close_window(&mut self) -> Result<(), DriverError>;

    /// PNG screenshot of the current viewport.
    async fn screenshot(&mut self) -> Result<Vec<u8>, DriverError>;

    async fn quit(&mut self) -> Result<(), DriverError>;
}
