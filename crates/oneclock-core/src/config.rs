//! Run configuration. Everything tunable lives here so the flow itself
//! carries no magic numbers.

use std::path::PathBuf;
use std::time::Duration;

use crate::selectors::CLOCK_PAGE_URL;

/// Settings for one login run.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub clock_url: String,
    pub username: String,
    pub password: String,
    /// Wall-clock budget for the MFA negotiation loop.
    pub mfa_timeout: Duration,
    /// Delay between negotiation ticks.
    pub tick_interval: Duration,
    /// Consecutive same-URL ticks before declaring the flow stuck.
    pub stuck_ticks: u32,
    /// Where failure artifacts land. `None` disables dumping.
    pub dump_dir: Option<PathBuf>,
    pub pacing: Pacing,
}

impl AuthConfig {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            clock_url: CLOCK_PAGE_URL.to_string(),
            username: username.into(),
            password: password.into(),
            mfa_timeout: Duration::from_secs(120),
            tick_interval: Duration::from_secs(2),
            stuck_ticks: 10,
            dump_dir: None,
            pacing: Pacing::default(),
        }
    }
}

/// Settle delays and per-step lookup budgets.
///
/// The defaults are tuned against the live portal; tests shrink them or run
/// under a paused clock.
#[derive(Debug, Clone)]
pub struct Pacing {
    /// Speculative lookups that usually miss.
    pub quick_probe: Duration,
    /// In-frame probes, kept tight because frames multiply the cost.
    pub short_probe: Duration,
    /// Menu options on Duo screens.
    pub option_timeout: Duration,
    /// Passcode input after a menu navigation.
    pub input_timeout: Duration,
    /// Credential fields on the institution login page.
    pub cred_timeout: Duration,
    /// Punch controls on the clock page.
    pub submit_timeout: Duration,
    /// Links on the identity-provider selection page.
    pub idp_wait: Duration,
    /// After a page-level Escape.
    pub key_settle: Duration,
    /// Before typing the passcode.
    pub pre_type: Duration,
    /// After answering the device-trust prompt, waiting out the redirect.
    pub post_trust: Duration,
    /// After picking a Duo menu option.
    pub menu_settle: Duration,
    /// Budget for the Verify button to become enabled.
    pub verify_timeout: Duration,
    pub verify_interval: Duration,
    /// After the negotiation loop reports success.
    pub post_auth_settle: Duration,
    /// After a recovery refresh.
    pub refresh_settle: Duration,
    /// After refreshing a near-empty page.
    pub empty_page_settle: Duration,
    /// After opening the fallback tab.
    pub new_tab_settle: Duration,
    /// Extra load time for the fallback tab before the first check.
    pub new_tab_load: Duration,
    pub nav_check_interval: Duration,
    /// After selecting a punch type.
    pub punch_settle: Duration,
    /// After clicking Submit.
    pub submit_settle: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            quick_probe: Duration::from_secs(2),
            short_probe: Duration::from_secs(1),
            option_timeout: Duration::from_secs(3),
            input_timeout: Duration::from_secs(6),
            cred_timeout: Duration::from_secs(25),
            submit_timeout: Duration::from_secs(10),
            idp_wait: Duration::from_secs(5),
            key_settle: Duration::from_millis(300),
            pre_type: Duration::from_millis(400),
            post_trust: Duration::from_secs(3),
            menu_settle: Duration::from_millis(500),
            verify_timeout: Duration::from_secs(10),
            verify_interval: Duration::from_millis(500),
            post_auth_settle: Duration::from_secs(6),
            refresh_settle: Duration::from_secs(3),
            empty_page_settle: Duration::from_secs(2),
            new_tab_settle: Duration::from_secs(3),
            new_tab_load: Duration::from_secs(4),
            nav_check_interval: Duration::from_secs(2),
            punch_settle: Duration::from_secs(1),
            submit_settle: Duration::from_secs(2),
        }
    }
}
