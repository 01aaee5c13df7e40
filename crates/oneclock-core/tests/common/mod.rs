//! Scripted in-memory driver for exercising the login flow without a
//! browser. Pages are flat tables of elements; behavior is injected through
//! one-shot click effects that mutate the fake's state.

use std::collections::{BTreeMap, HashMap, VecDeque};

use async_trait::async_trait;
use oneclock_core::actions::{CLICK_BY_TEXT_JS, CLICK_JS, SET_VALUE_JS};
use oneclock_core::driver::{
    By, Driver, ElementId, Key, Modifier, ScriptArg, WindowHandle,
};
use oneclock_core::error::DriverError;
use oneclock_core::login::{CLICK_ANCESTOR_ANCHOR_JS, IDP_FALLBACK_JS, OPEN_TAB_JS};

/// What happened to the fake, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Navigate(String),
    Refresh,
    Click(u64),
    ScriptClick(u64),
    SetValueScript(u64, String),
    ClickByText(String),
    Type(u64, String),
    PressKey(u64, Key),
    Chord(u64, Modifier, char),
    Clear(u64),
    SelectOption(u64, String),
    Escape,
    EnterFrame(u64),
    LeaveFrame,
    SwitchWindow(String),
    CloseWindow(String),
    OpenTab(String),
    Screenshot,
    Quit,
}

#[derive(Debug, Clone)]
pub struct FakeElement {
    pub matches: Vec<By>,
    pub tag: String,
    pub text: String,
    pub attrs: HashMap<String, String>,
    pub displayed: bool,
    pub enabled: bool,
    /// Present only inside this frame; `None` means the top document.
    pub frame: Option<u64>,
    /// Present only in this window; `None` means every window.
    pub window: Option<String>,
    pub present: bool,
    /// When set, the element can be located only this many times before it
    /// behaves as gone (models content the portal tears down).
    pub find_budget: Option<u32>,
    pub native_click_fails: bool,
    /// When false, typed text does not land in the value property
    /// (controlled-input behavior).
    pub typing_sticks: bool,
}

impl Default for FakeElement {
    fn default() -> Self {
        Self {
            matches: Vec::new(),
            tag: "div".into(),
            text: String::new(),
            attrs: HashMap::new(),
            displayed: true,
            enabled: true,
            frame: None,
            window: None,
            present: true,
            find_budget: None,
            native_click_fails: false,
            typing_sticks: true,
        }
    }
}

impl FakeElement {
    pub fn with_id(dom_id: &str) -> Self {
        Self {
            matches: vec![By::id(dom_id)],
            ..Default::default()
        }
    }

    pub fn value(&self) -> String {
        self.attrs.get("value").cloned().unwrap_or_default()
    }
}

type Effect = Box<dyn FnOnce(&mut FakeDriver) + Send>;

pub struct FakeDriver {
    pub elements: BTreeMap<u64, FakeElement>,
    pub events: Vec<Event>,
    pub url: String,
    /// Per-window URL overrides; the plain `url` covers the rest.
    pub window_urls: HashMap<String, String>,
    /// Page source of the top document and of each frame.
    pub top_source: String,
    pub frame_sources: HashMap<u64, String>,
    pub current_frame: Option<u64>,
    pub windows: Vec<String>,
    pub current_window: String,
    /// Simulates the portal having closed our window.
    pub window_dead: bool,
    /// Window that `window.open` will create, once.
    pub new_window_on_open: Option<String>,
    /// Element the IdP JS fallback would find and click.
    pub idp_fallback_target: Option<u64>,
    /// img element id -> wrapping anchor element id.
    pub ancestor_anchor: HashMap<u64, u64>,
    click_effects: HashMap<u64, VecDeque<Effect>>,
}

impl std::fmt::Debug for FakeDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeDriver").finish_non_exhaustive()
    }
}

impl FakeDriver {
    pub fn new() -> Self {
        Self {
            elements: BTreeMap::new(),
            events: Vec::new(),
            url: "https://portal.example/start".into(),
            window_urls: HashMap::new(),
            top_source: String::new(),
            frame_sources: HashMap::new(),
            current_frame: None,
            windows: vec!["w0".into()],
            current_window: "w0".into(),
            window_dead: false,
            new_window_on_open: None,
            idp_fallback_target: None,
            ancestor_anchor: HashMap::new(),
            click_effects: HashMap::new(),
        }
    }

    pub fn add(&mut self, id: u64, el: FakeElement) -> &mut Self {
        self.elements.insert(id, el);
        self
    }

    /// Queue an effect to run the next time element `id` is clicked through
    /// any path.
    pub fn on_click(&mut self, id: u64, effect: impl FnOnce(&mut FakeDriver) + Send + 'static) {
        self.click_effects
            .entry(id)
            .or_default()
            .push_back(Box::new(effect));
    }

    /// Make the clock page detectable in the current state.
    pub fn add_clock_page(&mut self, id: u64) {
        self.add(id, FakeElement::with_id("TL_RPTD_TIME_PUNCH_TYPE$0"));
    }

    pub fn clicks_of(&self, id: u64) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, Event::Click(i) | Event::ScriptClick(i) if *i == id))
            .count()
    }

    fn fire_click(&mut self, id: u64) {
        let effect = self
            .click_effects
            .get_mut(&id)
            .and_then(|queue| queue.pop_front());
        if let Some(effect) = effect {
            effect(self);
        }
    }

    fn visible_in_context(&self, el: &FakeElement) -> bool {
        el.present
            && el.frame == self.current_frame
            && el
                .window
                .as_ref()
                .map(|w| *w == self.current_window)
                .unwrap_or(true)
    }

    fn get(&self, id: ElementId) -> Result<&FakeElement, DriverError> {
        self.elements
            .get(&id.0)
            .filter(|el| self.visible_in_context(el))
            .ok_or(DriverError::Stale)
    }

    fn get_mut(&mut self, id: ElementId) -> Result<&mut FakeElement, DriverError> {
        let visible = self
            .elements
            .get(&id.0)
            .map(|el| self.visible_in_context(el))
            .unwrap_or(false);
        if !visible {
            return Err(DriverError::Stale);
        }
        Ok(self.elements.get_mut(&id.0).unwrap())
    }

    fn script_arg_element(args: &[ScriptArg]) -> Option<u64> {
        args.iter().find_map(|a| match a {
            ScriptArg::Element(el) => Some(el.0),
            _ => None,
        })
    }

    fn script_arg_string(args: &[ScriptArg], n: usize) -> String {
        args.iter()
            .filter_map(|a| match a {
                ScriptArg::Value(v) => v.as_str().map(str::to_string),
                _ => None,
            })
            .nth(n)
            .unwrap_or_default()
    }
}

#[async_trait]
impl Driver for FakeDriver {
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError> {
        self.events.push(Event::Navigate(url.into()));
        self.url = url.into();
        Ok(())
    }

    async fn refresh(&mut self) -> Result<(), DriverError> {
        self.events.push(Event::Refresh);
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String, DriverError> {
        if self.window_dead {
            return Err(DriverError::NoSuchWindow(self.current_window.clone()));
        }
        Ok(self
            .window_urls
            .get(&self.current_window)
            .cloned()
            .unwrap_or_else(|| self.url.clone()))
    }

    async fn page_source(&mut self) -> Result<String, DriverError> {
        Ok(match self.current_frame {
            Some(f) => self.frame_sources.get(&f).cloned().unwrap_or_default(),
            None => self.top_source.clone(),
        })
    }

    async fn find(&mut self, by: &By) -> Result<ElementId, DriverError> {
        let hit = self.elements.iter().find_map(|(id, el)| {
            let found = self.visible_in_context(el)
                && el.find_budget != Some(0)
                && el.matches.contains(by);
            found.then_some(*id)
        });
        if let Some(id) = hit {
            if let Some(budget) = &mut self.elements.get_mut(&id).unwrap().find_budget {
                *budget -= 1;
            }
            return Ok(ElementId(id));
        }
        Err(DriverError::NotFound(format!("{by:?}")))
    }

    async fn click(&mut self, el: ElementId) -> Result<(), DriverError> {
        let fails = self.get(el)?.native_click_fails;
        self.events.push(Event::Click(el.0));
        if fails {
            return Err(DriverError::NotInteractable("native click".into()));
        }
        self.fire_click(el.0);
        Ok(())
    }

    async fn type_text(&mut self, el: ElementId, text: &str) -> Result<(), DriverError> {
        self.events.push(Event::Type(el.0, text.into()));
        let target = self.get_mut(el)?;
        if target.typing_sticks {
            let mut value = target.value();
            value.push_str(text);
            target.attrs.insert("value".into(), value);
        }
        Ok(())
    }

    async fn press_key(&mut self, el: ElementId, key: Key) -> Result<(), DriverError> {
        self.events.push(Event::PressKey(el.0, key));
        if key == Key::Backspace {
            let target = self.get_mut(el)?;
            if target.typing_sticks {
                target.attrs.insert("value".into(), String::new());
            }
        } else {
            self.get(el)?;
        }
        Ok(())
    }

    async fn key_chord(
        &mut self,
        el: ElementId,
        modifier: Modifier,
        key: char,
    ) -> Result<(), DriverError> {
        self.get(el)?;
        self.events.push(Event::Chord(el.0, modifier, key));
        Ok(())
    }

    async fn clear(&mut self, el: ElementId) -> Result<(), DriverError> {
        self.events.push(Event::Clear(el.0));
        self.get_mut(el)?.attrs.insert("value".into(), String::new());
        Ok(())
    }

    async fn select_option(&mut self, el: ElementId, value: &str) -> Result<(), DriverError> {
        self.events.push(Event::SelectOption(el.0, value.into()));
        self.get_mut(el)?.attrs.insert("value".into(), value.into());
        Ok(())
    }

    async fn attr(&mut self, el: ElementId, name: &str) -> Result<Option<String>, DriverError> {
        Ok(self.get(el)?.attrs.get(name).cloned())
    }

    async fn text(&mut self, el: ElementId) -> Result<String, DriverError> {
        Ok(self.get(el)?.text.clone())
    }

    async fn tag_name(&mut self, el: ElementId) -> Result<String, DriverError> {
        Ok(self.get(el)?.tag.clone())
    }

    async fn is_displayed(&mut self, el: ElementId) -> Result<bool, DriverError> {
        Ok(self.get(el)?.displayed)
    }

    async fn is_enabled(&mut self, el: ElementId) -> Result<bool, DriverError> {
        Ok(self.get(el)?.enabled)
    }

    async fn execute_script(
        &mut self,
        js: &str,
        args: Vec<ScriptArg>,
    ) -> Result<serde_json::Value, DriverError> {
        if js == CLICK_JS {
            let id = Self::script_arg_element(&args)
                .ok_or_else(|| DriverError::Script("click without element".into()))?;
            self.get(ElementId(id))?;
            self.events.push(Event::ScriptClick(id));
            self.fire_click(id);
            return Ok(serde_json::Value::Null);
        }
        if js == SET_VALUE_JS {
            let id = Self::script_arg_element(&args)
                .ok_or_else(|| DriverError::Script("set value without element".into()))?;
            let value = Self::script_arg_string(&args, 0);
            self.events.push(Event::SetValueScript(id, value.clone()));
            self.get_mut(ElementId(id))?
                .attrs
                .insert("value".into(), value);
            return Ok(serde_json::Value::Null);
        }
        if js == CLICK_BY_TEXT_JS {
            let pattern = Self::script_arg_string(&args, 0);
            self.events.push(Event::ClickByText(pattern.clone()));
            let target = self.elements.iter().find_map(|(id, el)| {
                let hit = self.visible_in_context(el)
                    && pattern
                        .split('|')
                        .any(|p| el.text.to_lowercase().contains(&p.to_lowercase()));
                hit.then_some(*id)
            });
            if let Some(id) = target {
                self.fire_click(id);
                return Ok(serde_json::Value::Bool(true));
            }
            return Ok(serde_json::Value::Bool(false));
        }
        if js == CLICK_ANCESTOR_ANCHOR_JS {
            let id = Self::script_arg_element(&args)
                .ok_or_else(|| DriverError::Script("anchor click without element".into()))?;
            if let Some(anchor) = self.ancestor_anchor.get(&id).copied() {
                self.events.push(Event::ScriptClick(anchor));
                self.fire_click(anchor);
                return Ok(serde_json::Value::Bool(true));
            }
            return Ok(serde_json::Value::Bool(false));
        }
        if js == IDP_FALLBACK_JS {
            if let Some(id) = self.idp_fallback_target {
                self.events.push(Event::ScriptClick(id));
                self.fire_click(id);
                return Ok(serde_json::Value::Bool(true));
            }
            return Ok(serde_json::Value::Bool(false));
        }
        if js == OPEN_TAB_JS {
            let url = Self::script_arg_string(&args, 0);
            self.events.push(Event::OpenTab(url));
            if let Some(w) = self.new_window_on_open.take() {
                self.windows.push(w);
            }
            return Ok(serde_json::Value::Null);
        }
        Err(DriverError::Script(format!("unscripted js: {js}")))
    }

    async fn send_escape(&mut self) -> Result<(), DriverError> {
        self.events.push(Event::Escape);
        Ok(())
    }

    async fn frames(&mut self) -> Result<Vec<ElementId>, DriverError> {
        Ok(self
            .elements
            .iter()
            .filter(|(_, el)| self.visible_in_context(el) && el.tag == "iframe")
            .map(|(id, _)| ElementId(*id))
            .collect())
    }

    async fn enter_frame(&mut self, frame: ElementId) -> Result<(), DriverError> {
        if self.get(frame)?.tag != "iframe" {
            return Err(DriverError::NoSuchFrame);
        }
        self.events.push(Event::EnterFrame(frame.0));
        self.current_frame = Some(frame.0);
        Ok(())
    }

    async fn leave_frame(&mut self) -> Result<(), DriverError> {
        self.events.push(Event::LeaveFrame);
        self.current_frame = None;
        Ok(())
    }

    async fn window_handles(&mut self) -> Result<Vec<WindowHandle>, DriverError> {
        Ok(self.windows.iter().cloned().map(WindowHandle).collect())
    }

    async fn current_window(&mut self) -> Result<WindowHandle, DriverError> {
        Ok(WindowHandle(self.current_window.clone()))
    }

    async fn switch_to_window(&mut self, handle: &WindowHandle) -> Result<(), DriverError> {
        if !self.windows.contains(&handle.0) {
            return Err(DriverError::NoSuchWindow(handle.0.clone()));
        }
        self.events.push(Event::SwitchWindow(handle.0.clone()));
        self.current_window = handle.0.clone();
        self.window_dead = false;
        Ok(())
    }

    async fn close_window(&mut self) -> Result<(), DriverError> {
        self.events
            .push(Event::CloseWindow(self.current_window.clone()));
        self.windows.retain(|w| *w != self.current_window);
        self.window_dead = true;
        Ok(())
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, DriverError> {
        self.events.push(Event::Screenshot);
        Ok(Vec::new())
    }

    async fn quit(&mut self) -> Result<(), DriverError> {
        self.events.push(Event::Quit);
        Ok(())
    }
}

/// Config with near-zero pacing so tests run instantly on a real clock and
/// deterministically on a paused one.
pub fn fast_config() -> oneclock_core::AuthConfig {
    use std::time::Duration;
    let mut cfg = oneclock_core::AuthConfig::new("gburdell3", "hunter2");
    let quick = Duration::from_millis(1);
    cfg.mfa_timeout = Duration::from_secs(120);
    cfg.tick_interval = Duration::from_secs(2);
    cfg.pacing = oneclock_core::Pacing {
        quick_probe: quick,
        short_probe: quick,
        option_timeout: quick,
        input_timeout: quick,
        cred_timeout: quick,
        submit_timeout: quick,
        idp_wait: quick,
        key_settle: quick,
        pre_type: quick,
        post_trust: quick,
        menu_settle: quick,
        verify_timeout: Duration::from_millis(10),
        verify_interval: quick,
        post_auth_settle: quick,
        refresh_settle: quick,
        empty_page_settle: quick,
        new_tab_settle: quick,
        new_tab_load: quick,
        nav_check_interval: quick,
        punch_settle: quick,
        submit_settle: quick,
    };
    cfg
}
