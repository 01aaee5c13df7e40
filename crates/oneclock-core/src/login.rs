//! Login orchestration: portal entry, IdP selection, credentials, MFA, and
//! the post-auth stabilization dance.

use std::future::Future;

use tokio::time::sleep;
use tracing::debug;

use crate::actions;
use crate::artifacts::dump;
use crate::config::AuthConfig;
use crate::driver::{Driver, ScriptArg, WindowHandle};
use crate::duo::negotiate;
use crate::error::{AuthError, DriverError};
use crate::locator::find_first;
use crate::passcode::PasscodeSource;
use crate::selectors;

/// Click the anchor wrapping an element (IdP tiles are often an image
/// inside a link).
pub const CLICK_ANCESTOR_ANCHOR_JS: &str = r#"
const a = arguments[0].closest('a');
if (a) { a.click(); return true; }
return false;
"#;

/// Find and click the IdP link by text, title, or image alt.
pub const IDP_FALLBACK_JS: &str = r#"
const pattern = new RegExp(arguments[0], 'i');
const links = Array.from(document.querySelectorAll('a'));
const target = links.find(a => pattern.test(a.textContent || '')
    || pattern.test(a.getAttribute('title') || '')
    || (a.querySelector('img') && pattern.test(a.querySelector('img').alt || '')));
if (target) { target.click(); return true; }
return false;
"#;

pub const OPEN_TAB_JS: &str = "window.open(arguments[0], '_blank');";

/// Full login: navigate, pick the IdP, submit credentials, ride out Duo,
/// then stabilize onto the clock page.
///
/// The named failure modes dump their own artifacts at the point of
/// detection; an unclassified driver failure dumps here, so no abort leaves
/// the operator without a snapshot.
pub async fn login<D: Driver + ?Sized>(
    driver: &mut D,
    cfg: &AuthConfig,
    passcode: &PasscodeSource,
) -> Result<(), AuthError> {
    match login_flow(driver, cfg, passcode).await {
        Err(e @ AuthError::Driver(_)) => {
            dump(driver, cfg.dump_dir.as_deref(), "unhandled_error").await;
            Err(e)
        }
        other => other,
    }
}

async fn login_flow<D: Driver + ?Sized>(
    driver: &mut D,
    cfg: &AuthConfig,
    passcode: &PasscodeSource,
) -> Result<(), AuthError> {
    driver.navigate(&cfg.clock_url).await.map_err(AuthError::from)?;
    select_idp(driver, cfg).await?;
    submit_credentials(driver, cfg).await?;

    println!("Script will wait for you to authenticate on Duo...");
    negotiate(driver, cfg, passcode).await?;

    stabilize(driver, cfg).await
}

/// Run [`login`] with a one-shot restart policy.
///
/// `factory` produces a fresh cookie-less driver. When the first attempt
/// asks for a restart (fatal gateway page), the browser is torn down and
/// the whole flow runs once more from scratch; a second fatal outcome is
/// final. Returns the live driver on success.
pub async fn login_with_restart<D, F, Fut>(
    factory: F,
    cfg: &AuthConfig,
    passcode: &PasscodeSource,
) -> Result<D, AuthError>
where
    D: Driver,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<D, DriverError>>,
{
    let mut attempt = 0;
    loop {
        let mut driver = factory().await?;
        match login(&mut driver, cfg, passcode).await {
            Ok(()) => return Ok(driver),
            Err(e) if e.wants_restart() && attempt == 0 => {
                debug!("fatal gateway page, restarting with a fresh session");
                let _ = driver.quit().await;
                attempt += 1;
            }
            Err(e) => {
                let _ = driver.quit().await;
                return Err(e);
            }
        }
    }
}

/// Pick the institution on the federation selection page. Skipped entirely
/// when the username field is already up (some sessions land straight on
/// the institution login).
async fn select_idp<D: Driver + ?Sized>(driver: &mut D, cfg: &AuthConfig) -> Result<(), AuthError> {
    let pacing = &cfg.pacing;

    if find_first(driver, &selectors::username_field(), pacing.quick_probe, false)
        .await
        .is_ok()
    {
        debug!("already on the institution login page");
        return Ok(());
    }

    let clicked = match find_first(driver, &selectors::idp_option(), pacing.idp_wait, true).await {
        Ok(el) => {
            // An image match needs its wrapping anchor clicked instead.
            let is_img = driver
                .tag_name(el)
                .await
                .map(|t| t.eq_ignore_ascii_case("img"))
                .unwrap_or(false);
            if is_img {
                driver
                    .execute_script(CLICK_ANCESTOR_ANCHOR_JS, vec![ScriptArg::Element(el)])
                    .await
                    .ok()
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false)
            } else {
                actions::click(driver, el).await
            }
        }
        Err(_) => driver
            .execute_script(IDP_FALLBACK_JS, vec![ScriptArg::Value("Georgia Tech".into())])
            .await
            .ok()
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
    };

    if !clicked {
        dump(driver, cfg.dump_dir.as_deref(), "select_gt_not_found").await;
        println!("Unable to find the institution option on the selection page.");
        println!("This usually means the IdP selection DOM changed.");
        let _ = driver.quit().await;
        return Err(AuthError::IdpNotFound);
    }

    // The institution login page confirms the selection worked.
    find_first(driver, &selectors::username_field(), pacing.idp_wait, false)
        .await
        .map_err(|_| AuthError::IdpNotFound)?;
    Ok(())
}

async fn submit_credentials<D: Driver + ?Sized>(
    driver: &mut D,
    cfg: &AuthConfig,
) -> Result<(), AuthError> {
    let pacing = &cfg.pacing;

    let username =
        find_first(driver, &selectors::username_field(), pacing.cred_timeout, false).await?;
    let password =
        find_first(driver, &selectors::password_field(), pacing.cred_timeout, false).await?;

    driver.clear(username).await.map_err(AuthError::from)?;
    driver
        .type_text(username, &cfg.username)
        .await
        .map_err(AuthError::from)?;
    driver.clear(password).await.map_err(AuthError::from)?;
    driver
        .type_text(password, &cfg.password)
        .await
        .map_err(AuthError::from)?;

    let submit =
        find_first(driver, &selectors::login_submit(), pacing.submit_timeout, true).await?;
    driver.click(submit).await.map_err(AuthError::from)?;
    Ok(())
}

/// After Duo reports done, get the browser actually sitting on the clock
/// page. The portal's redirect chain is slow and sometimes stalls outright.
async fn stabilize<D: Driver + ?Sized>(driver: &mut D, cfg: &AuthConfig) -> Result<(), AuthError> {
    let pacing = &cfg.pacing;

    switch_to_valid_window(driver).await;

    println!("Waiting for the portal to finish authentication...");
    sleep(pacing.post_auth_settle).await;

    for attempt in 0..3 {
        if crate::clock::is_on_clock_page(driver).await {
            debug!("clock page confirmed after login");
            return Ok(());
        }
        debug!(attempt = attempt + 1, "clock page not up yet, refreshing");
        switch_to_valid_window(driver).await;
        let _ = driver.refresh().await;
        sleep(pacing.refresh_settle).await;
    }

    println!("Portal redirect seems stuck, trying direct navigation...");
    if direct_navigation_fallback(driver, cfg).await {
        return Ok(());
    }

    dump(driver, cfg.dump_dir.as_deref(), "post_auth_no_clock").await;
    println!("Authentication redirect failed. Will restart from the beginning...");
    Err(AuthError::RestartRequired)
}

/// The current window can be gone (the portal closes its own tabs during
/// the redirect chain). Re-attach to the most recent live one.
async fn switch_to_valid_window<D: Driver + ?Sized>(driver: &mut D) {
    if driver.current_url().await.is_ok() {
        return;
    }
    if let Ok(handles) = driver.window_handles().await {
        debug!(count = handles.len(), "current window invalid, switching");
        if let Some(last) = handles.last() {
            let _ = driver.switch_to_window(last).await;
        }
    }
}

/// Open the clock URL in a fresh tab. The session cookie is already in
/// place after Duo, so a direct hit usually lands even when the redirect
/// chain is stuck. Closes the stuck original tab on success.
async fn direct_navigation_fallback<D: Driver + ?Sized>(driver: &mut D, cfg: &AuthConfig) -> bool {
    let pacing = &cfg.pacing;

    let Ok(original) = driver.current_window().await else {
        return false;
    };
    let before: Vec<WindowHandle> = driver.window_handles().await.unwrap_or_default();

    if driver
        .execute_script(OPEN_TAB_JS, vec![ScriptArg::Value(cfg.clock_url.clone().into())])
        .await
        .is_err()
    {
        return false;
    }
    sleep(pacing.new_tab_settle).await;

    let after = driver.window_handles().await.unwrap_or_default();
    let Some(new_tab) = after.iter().find(|h| !before.contains(h)).cloned() else {
        debug!("no new tab was opened");
        return false;
    };
    if driver.switch_to_window(&new_tab).await.is_err() {
        return false;
    }
    sleep(pacing.new_tab_load).await;

    for check in 0..3 {
        if crate::clock::is_on_clock_page(driver).await {
            println!("Direct navigation successful!");
            // Drop the stuck original tab, then make sure we are back on
            // the good one.
            if driver.switch_to_window(&original).await.is_ok() {
                let _ = driver.close_window().await;
            }
            let _ = driver.switch_to_window(&new_tab).await;
            return true;
        }
        debug!(check = check + 1, "direct navigation not on clock page yet");
        sleep(pacing.nav_check_interval).await;
    }

    // The new tab is no better; put things back the way they were.
    let _ = driver.close_window().await;
    let _ = driver.switch_to_window(&original).await;
    false
}
