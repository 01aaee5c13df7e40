//! Actions on the web clock page itself: punching, keep-alive, and the
//! guard popups PeopleSoft throws in.

use tokio::time::sleep;
use tracing::debug;

use crate::actions;
use crate::artifacts::dump;
use crate::config::AuthConfig;
use crate::driver::{By, Driver, Key};
use crate::locator::find_first;
use crate::notify::notify;
use crate::selectors::{
    self, CLOCK_PAGE_IDS, DOUBLE_CLOCK_BACK_ID, DOUBLE_CLOCK_OK_ID, LAST_ACTION_IDS,
    TIMEOUT_DIALOG_BUTTON_ID,
};

/// Punch direction, carrying the dropdown option value the portal uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Punch {
    In,
    Out,
}

impl Punch {
    pub fn option_value(self) -> &'static str {
        match self {
            Punch::In => "1",
            Punch::Out => "2",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Punch::In => "In",
            Punch::Out => "Out",
        }
    }
}

/// True when any of the known clock-page elements is present. Single-shot
/// lookups, because callers poll this.
pub async fn is_on_clock_page<D: Driver + ?Sized>(driver: &mut D) -> bool {
    for id in CLOCK_PAGE_IDS {
        if driver.find(&By::id(id)).await.is_ok() {
            debug!(id, "clock page element present");
            return true;
        }
    }
    false
}

/// Text of the "last action" readout, empty when absent (old and new UI).
pub async fn last_action_text<D: Driver + ?Sized>(driver: &mut D) -> String {
    for id in LAST_ACTION_IDS {
        if let Ok(el) = driver.find(&By::id(id)).await {
            if let Ok(text) = driver.text(el).await {
                let text = text.trim().to_string();
                if !text.is_empty() {
                    return text;
                }
            }
        }
    }
    String::new()
}

pub async fn is_already_clocked_out<D: Driver + ?Sized>(driver: &mut D) -> bool {
    let last = last_action_text(driver).await.to_lowercase();
    !last.is_empty() && last.contains("out")
}

/// Submit one punch. Fail-soft: dumps artifacts and notifies the operator
/// on failure instead of erroring out, so the schedule loop can decide what
/// to do next.
pub async fn punch<D: Driver + ?Sized>(driver: &mut D, cfg: &AuthConfig, punch: Punch) -> bool {
    let dump_dir = cfg.dump_dir.as_deref();

    // Clocking out twice corrupts the timecard more often than it fixes it.
    if punch == Punch::Out && is_already_clocked_out(driver).await {
        notify(
            "Already clocked out",
            "NOTICE: You're already marked as clocked Out. This usually means the last \
             session didn't stop cleanly or you already clocked out. Please verify your timecard.",
            true,
        )
        .await;
        return false;
    }

    let submitted = submit_punch(driver, cfg, punch).await;
    if submitted {
        let last = last_action_text(driver).await;
        debug!(last_action = %last, "punch submitted");
        println!("You Have Clocked {}!", punch.name());
        return true;
    }

    let last = last_action_text(driver).await;
    dump(
        driver,
        dump_dir,
        &format!("clock_{}_failed", punch.name().to_lowercase()),
    )
    .await;
    println!("Failed to Clock {}", punch.name());
    if !last.is_empty() {
        println!("Last action text: {last}");
    }
    notify(
        &format!("Clock {} failed", punch.name()),
        "Clock action failed. Please check the terminal output and verify your timecard.",
        true,
    )
    .await;
    println!("NOTICE: Please Manually Clock to Avoid Issues");
    false
}

async fn submit_punch<D: Driver + ?Sized>(driver: &mut D, cfg: &AuthConfig, punch: Punch) -> bool {
    let pacing = &cfg.pacing;

    let Ok(dropdown) = find_first(
        driver,
        &selectors::punch_dropdown(),
        pacing.cred_timeout,
        true,
    )
    .await
    else {
        debug!("punch dropdown not found");
        return false;
    };
    if driver
        .select_option(dropdown, punch.option_value())
        .await
        .is_err()
    {
        return false;
    }
    debug!(punch = punch.name(), "selected punch type");
    sleep(pacing.punch_settle).await;

    let Ok(submit) = find_first(
        driver,
        &selectors::submit_button(),
        pacing.submit_timeout,
        true,
    )
    .await
    else {
        debug!("submit button not found");
        return false;
    };
    if !actions::click(driver, submit).await {
        return false;
    }
    sleep(pacing.submit_settle).await;
    true
}

/// Keep the PeopleSoft session alive: refresh, and if the inactivity
/// warning dialog appeared, acknowledge it.
pub async fn prevent_timeout<D: Driver + ?Sized>(driver: &mut D, cfg: &AuthConfig) -> bool {
    if let Err(e) = driver.refresh().await {
        debug!(error = %e, "keep-alive refresh failed");
        dump(driver, cfg.dump_dir.as_deref(), "prevent_timeout_error").await;
        notify(
            "Clock manager error",
            "Timeout prevention failed. Please check your session and timecard.",
            true,
        )
        .await;
        return false;
    }

    if let Ok(button) = driver.find(&By::id(TIMEOUT_DIALOG_BUTTON_ID)).await {
        if driver.press_key(button, Key::Enter).await.is_ok() {
            println!("Timeout Prevented");
        }
    }
    true
}

/// Dismiss the duplicate-punch confirmation popup when it shows up.
/// Confirms the warning, then backs out of the page it lands on.
pub async fn dismiss_double_clock<D: Driver + ?Sized>(driver: &mut D) -> bool {
    let Ok(ok_button) = driver.find(&By::id(DOUBLE_CLOCK_OK_ID)).await else {
        return false;
    };
    if driver.press_key(ok_button, Key::Enter).await.is_err() {
        return false;
    }
    if let Ok(back) = driver.find(&By::id(DOUBLE_CLOCK_BACK_ID)).await {
        let _ = driver.press_key(back, Key::Enter).await;
    }
    println!("You were about to double clock, we prevented that.");
    true
}
