//! The MFA negotiation loop.
//!
//! One logical task polls the browser: check for the fatal gateway page,
//! check for the clock page, otherwise run the Duo handlers (top-level
//! first, then inside candidate iframes). The loop ends on success, the
//! wall-clock budget, or a stuck URL.

use tracing::debug;

use crate::artifacts::dump;
use crate::clock::is_on_clock_page;
use crate::config::AuthConfig;
use crate::driver::{By, Driver};
use crate::duo::handlers;
use crate::error::AuthError;
use crate::passcode::PasscodeSource;
use crate::poll::Poller;
use crate::selectors::FATAL_PROXY_URL_MARKER;

/// Run until the clock page shows up or the attempt is dead.
pub async fn negotiate<D: Driver + ?Sized>(
    driver: &mut D,
    cfg: &AuthConfig,
    passcode: &PasscodeSource,
) -> Result<(), AuthError> {
    let dump_dir = cfg.dump_dir.as_deref();
    let mut last_url = driver.current_url().await.unwrap_or_default();
    let mut stuck_count = 0u32;
    let poller = Poller::new(cfg.mfa_timeout, cfg.tick_interval);
    let mut tick = 0u32;

    loop {
        tick += 1;

        // The federation gateway sometimes answers the Duo callback with a
        // bare 400 page. Nothing recovers that session; restart clean.
        if let Ok(url) = driver.current_url().await {
            if url.contains(FATAL_PROXY_URL_MARKER) {
                let page = driver.page_source().await.unwrap_or_default();
                if page.contains("HTTP ERROR 400") || page.contains("Bad Request") {
                    dump(driver, dump_dir, "idpproxy_400").await;
                    return Err(AuthError::RestartRequired);
                }
            }
        }

        if is_on_clock_page(driver).await {
            debug!(tick, "clock page reached");
            return Ok(());
        }

        try_duo_screens(driver, cfg, passcode).await;

        let current_url = driver.current_url().await.unwrap_or_default();
        if tick % 5 == 0 {
            debug!(tick, url = %current_url, "still negotiating");
        }
        if current_url == last_url {
            stuck_count += 1;
            if stuck_count >= cfg.stuck_ticks {
                dump(driver, dump_dir, "stuck_state").await;
                return Err(AuthError::Stuck {
                    ticks: stuck_count,
                    url: current_url,
                });
            }
        } else {
            stuck_count = 0;
            last_url = current_url;
        }

        if poller.expired() {
            dump(driver, dump_dir, "duo_timeout").await;
            return Err(AuthError::Timeout {
                budget: cfg.mfa_timeout,
            });
        }
        poller.wait().await;
    }
}

/// One pass over everything Duo might be showing. Returns true when any
/// handler acted. Driver failures here are treated as "screen not there".
pub async fn try_duo_screens<D: Driver + ?Sized>(
    driver: &mut D,
    cfg: &AuthConfig,
    passcode: &PasscodeSource,
) -> bool {
    let pacing = &cfg.pacing;

    handlers::dismiss_passkey_dialog(driver, pacing).await;

    if handlers::handle_touchid_canceled(driver, pacing).await
        || handlers::handle_device_trust(driver, pacing).await
        || handlers::handle_other_options_page(driver, pacing).await
    {
        return true;
    }

    if handlers::enter_passcode(driver, pacing, passcode).await {
        return true;
    }

    // The prompt often renders inside an iframe.
    let frames = driver.frames().await.unwrap_or_default();

    if frames.is_empty() {
        // A frameless near-empty document usually means a stalled redirect.
        if body_text_len(driver).await < 100 {
            debug!("page appears empty, refreshing");
            if driver.refresh().await.is_ok() {
                tokio::time::sleep(pacing.empty_page_settle).await;
                return true;
            }
        }
        return false;
    }

    for frame in frames {
        let src = driver
            .attr(frame, "src")
            .await
            .ok()
            .flatten()
            .unwrap_or_default()
            .to_lowercase();
        if !(src.contains("duo") || src.is_empty() || src.contains("about:blank")) {
            continue;
        }
        if driver.enter_frame(frame).await.is_err() {
            continue;
        }
        // No early exits between here and leave_frame: the top-level
        // context must be restored on every path.
        handlers::handle_device_trust(driver, pacing).await;
        let acted = handlers::enter_passcode(driver, pacing, passcode).await;
        let _ = driver.leave_frame().await;
        if acted {
            return true;
        }
    }
    false
}

async fn body_text_len<D: Driver + ?Sized>(driver: &mut D) -> usize {
    let Ok(body) = driver.find(&By::css("body")).await else {
        return usize::MAX;
    };
    match driver.text(body).await {
        Ok(text) => text.trim().len(),
        Err(_) => usize::MAX,
    }
}
