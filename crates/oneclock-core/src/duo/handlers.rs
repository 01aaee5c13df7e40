//! Handlers for the individual screens Duo can put in the way.
//!
//! Each handler is safe to call speculatively: it detects its screen first,
//! returns `false` untouched when the screen is absent, and reports `true`
//! only after it acted. Detection is text over the page source, because the
//! prompt's DOM changes more often than its copy.

use tokio::time::sleep;
use tracing::debug;

use crate::actions::{self, click_by_text, set_value};
use crate::config::Pacing;
use crate::driver::{Driver, Key};
use crate::locator::find_first;
use crate::passcode::{mask_code, PasscodeSource};
use crate::selectors;

/// Nudge any native passkey / WebAuthn dialog out of the way with Escape.
/// Harmless when no dialog is up.
pub async fn dismiss_passkey_dialog<D: Driver + ?Sized>(driver: &mut D, pacing: &Pacing) {
    if driver.send_escape().await.is_ok() {
        sleep(pacing.key_settle).await;
    }
}

/// "Is this your device?" remember-me prompt.
///
/// Answers No first. Trusting the device routes through a gateway endpoint
/// that intermittently serves HTTP 400, so No is the reliable path; Yes is
/// only a fallback when no No button exists.
pub async fn handle_device_trust<D: Driver + ?Sized>(driver: &mut D, pacing: &Pacing) -> bool {
    let page = match driver.page_source().await {
        Ok(p) => p,
        Err(_) => return false,
    };
    if !page.contains("Is this your device?") {
        return false;
    }
    debug!("detected device trust prompt");

    for (locator, answer) in [
        (selectors::device_trust_no(), "No"),
        (selectors::device_trust_yes(), "Yes"),
    ] {
        if let Ok(btn) = find_first(driver, &locator, pacing.quick_probe, true).await {
            if actions::click(driver, btn).await {
                debug!(answer, "answered device trust prompt");
                // Let the redirect happen on its own, without refreshing.
                sleep(pacing.post_trust).await;
                return true;
            }
        }
    }
    false
}

/// "Couldn't use Touch ID" dead end. Clicking "Other options" gets us back
/// to the method menu.
pub async fn handle_touchid_canceled<D: Driver + ?Sized>(driver: &mut D, pacing: &Pacing) -> bool {
    let page = match driver.page_source().await {
        Ok(p) => p,
        Err(_) => return false,
    };
    if !page.contains("Couldn't use Touch ID") && !page.contains("Touch ID has been canceled") {
        return false;
    }
    debug!("detected Touch ID canceled page");

    if let Ok(option) = find_first(
        driver,
        &selectors::touchid_other_options(),
        pacing.short_probe,
        true,
    )
    .await
    {
        if actions::click(driver, option).await {
            return true;
        }
    }
    click_by_text(driver, "Other options", "button, a").await
}

/// "Other options to log in" method menu. Picks the Duo Mobile passcode
/// entry.
pub async fn handle_other_options_page<D: Driver + ?Sized>(
    driver: &mut D,
    pacing: &Pacing,
) -> bool {
    let page = match driver.page_source().await {
        Ok(p) => p,
        Err(_) => return false,
    };
    if !page.contains("Other options to log in") {
        return false;
    }
    debug!("detected method menu, choosing passcode entry");

    if let Ok(option) = find_first(
        driver,
        &selectors::passcode_option(),
        pacing.quick_probe,
        true,
    )
    .await
    {
        if actions::click(driver, option).await {
            sleep(pacing.menu_settle).await;
            return true;
        }
    }
    if click_by_text(driver, "Duo Mobile passcode", "button, a, div, li").await {
        sleep(pacing.menu_settle).await;
        return true;
    }
    false
}

/// Steer the current document to the passcode screen and submit a code from
/// `source`.
///
/// Skips the menu steps when the passcode input is already on screen. The
/// code is generated only once the input is located, so HOTP counters are
/// not burned on screens that never take a code. Returns `true` once a
/// submit was attempted (Verify clicked or Enter sent), `false` when we
/// never got a code into a passcode field.
pub async fn enter_passcode<D: Driver + ?Sized>(
    driver: &mut D,
    pacing: &Pacing,
    source: &PasscodeSource,
) -> bool {
    dismiss_passkey_dialog(driver, pacing).await;

    let already_there = find_first(
        driver,
        &selectors::passcode_input(),
        pacing.quick_probe,
        false,
    )
    .await
    .is_ok();

    if !already_there {
        // "Other options" link, then the passcode method.
        let clicked = match find_first(
            driver,
            &selectors::other_options(),
            pacing.option_timeout,
            true,
        )
        .await
        {
            Ok(option) => actions::click(driver, option).await,
            Err(_) => click_by_text(driver, "Other options", "button, a").await,
        };
        if !clicked {
            return false;
        }

        match find_first(
            driver,
            &selectors::passcode_option(),
            pacing.option_timeout,
            true,
        )
        .await
        {
            Ok(option) => {
                let _ = actions::click(driver, option).await;
            }
            Err(_) => {
                let _ =
                    click_by_text(driver, "Duo Mobile passcode|Passcode", "button, a, div, span")
                        .await;
            }
        }
    }

    // Re-locate after any menu navigation.
    let Ok(input) = find_first(
        driver,
        &selectors::passcode_input(),
        pacing.input_timeout,
        false,
    )
    .await
    else {
        debug!("no passcode input after menu navigation");
        return false;
    };

    let code = match source.generate().await {
        Ok(code) => code,
        Err(e) => {
            debug!(error = %e, "passcode generation failed");
            return false;
        }
    };
    if code.is_empty() {
        // No automated passcode configured; leave the prompt for a manual
        // approval on the phone.
        return false;
    }
    debug!(code = %mask_code(&code), "entering passcode");

    sleep(pacing.pre_type).await;
    set_value(driver, input, &code).await;
    sleep(pacing.key_settle).await;

    // A controlled input sometimes swallows the first assertion and leaves
    // Verify disabled; re-assert once.
    if let Ok(btn) = find_first(driver, &selectors::verify_button(), pacing.quick_probe, false).await
    {
        if is_disabled(driver, btn).await {
            debug!("verify still disabled, re-asserting passcode");
            set_value(driver, input, &code).await;
            sleep(pacing.key_settle).await;
        }
    }

    // Wait for Verify to enable, then click it.
    let poller = crate::poll::Poller::new(pacing.verify_timeout, pacing.verify_interval);
    loop {
        if let Ok(btn) =
            find_first(driver, &selectors::verify_button(), pacing.quick_probe, false).await
        {
            if !is_disabled(driver, btn).await && actions::click(driver, btn).await {
                debug!("verify clicked");
                return true;
            }
        }
        if poller.expired() {
            break;
        }
        poller.wait().await;
    }

    // Last resort: submit off the input itself.
    debug!("verify never enabled, sending Enter");
    let _ = driver.press_key(input, Key::Enter).await;
    true
}

async fn is_disabled<D: Driver + ?Sized>(driver: &mut D, el: crate::driver::ElementId) -> bool {
    if matches!(driver.attr(el, "disabled").await, Ok(Some(_))) {
        return true;
    }
    matches!(
        driver.attr(el, "aria-disabled").await,
        Ok(Some(v)) if v.eq_ignore_ascii_case("true")
    )
}
