//! Locator tables for every page the workflow touches.
//!
//! Candidates are ranked: stable element ids first, then structural CSS,
//! then text-matching XPath as a last resort. The portal ships two UI
//! vintages of the clock page, so several tables carry both.

use crate::driver::By;
use crate::locator::Locator;

/// Deep link straight to the web clock component.
pub const CLOCK_PAGE_URL: &str = "https://selfservice.hprod.onehcm.usg.edu/psc/hprodsssso/HCMSS/HRMS/c/TL_EMPLOYEE_FL.TL_RPT_TIME_FLU.GBL?Action=U&EMPLJOB=0";

/// URL fragment of the federation gateway that serves fatal 400 pages.
pub const FATAL_PROXY_URL_MARKER: &str = "idpproxy.usg.edu/asimba/profiles/saml2";

/// Element ids whose presence means we are looking at the clock page.
/// New-UI punch dropdown, old-UI punch groupbox, and the Submit button.
pub const CLOCK_PAGE_IDS: [&str; 3] = [
    "TL_RPTD_TIME_PUNCH_TYPE$0",
    "TL_RPTD_SFF_WK_GROUPBOX$PIMG",
    "TL_WEB_CLOCK_WK_TL_SAVE_PB",
];

/// Ids of the "last action" readout, new UI then old UI.
pub const LAST_ACTION_IDS: [&str; 2] = ["TL_WEB_CLOCK_WK_DESCR50_1", "TL_RPTD_SFF_WK_DESCR50_1"];

/// Id of the button on the session-timeout warning dialog.
pub const TIMEOUT_DIALOG_BUTTON_ID: &str = "BOR_INSTALL_VW$0_row_0";

/// Ids of the duplicate-punch confirmation popup and its back button.
pub const DOUBLE_CLOCK_OK_ID: &str = "#ICOK";
pub const DOUBLE_CLOCK_BACK_ID: &str = "PT_WORK_PT_BUTTON_BACK";

pub fn idp_option() -> Locator {
    Locator::new(vec![
        By::link_text("Georgia Tech"),
        By::partial_link_text("Georgia Tech"),
        By::css("a[title*='Georgia Tech' i]"),
        By::css("a img[alt*='Georgia Tech' i]"),
        By::xpath("//*[@id='https_idp_gatech_edu_idp_shibboleth']//a"),
        By::xpath("//*[@id='https_idp_gatech_edu_idp_shibboleth']"),
        By::xpath("//a[contains(@href,'gatech') or contains(@href,'gatech.edu') or contains(.,'Georgia Tech') or contains(.,'Georgia Institute') or .//img[contains(@alt,'Georgia') or contains(@src,'gatech')]]"),
        By::xpath("//button[contains(.,'Georgia Tech') or contains(.,'Georgia Institute') or contains(.,'Gatech')]"),
    ])
}

pub fn username_field() -> Locator {
    Locator::new(vec![By::name("username"), By::id("username")])
}

pub fn password_field() -> Locator {
    Locator::new(vec![By::name("password"), By::id("password")])
}

pub fn login_submit() -> Locator {
    Locator::new(vec![
        By::name("submit"),
        By::css("button[type='submit']"),
        By::css("input[type='submit']"),
    ])
}

pub fn passcode_input() -> Locator {
    Locator::new(vec![
        By::id("passcode-input"),
        By::name("passcode-input"),
        By::css("#passcode-input"),
        By::css("input[name='passcode-input']"),
        By::css("input.passcode-input"),
        By::name("passcode"),
        By::id("passcode"),
        By::css("input[name='passcode']"),
        By::css("input[aria-label='Passcode']"),
        By::css("input[inputmode='numeric']"),
    ])
}

pub fn verify_button() -> Locator {
    Locator::new(vec![
        By::css("button[data-testid='verify-button']"),
        By::css("button.verify-button"),
        By::xpath("//button[@type='submit' and normalize-space()='Verify']"),
        By::xpath("//button[contains(.,'Verify')]"),
        By::css("button[type='submit']"),
        By::xpath("//button[contains(.,'Log in')]"),
    ])
}

pub fn other_options() -> Locator {
    Locator::new(vec![
        By::link_text("Other options"),
        By::partial_link_text("Other options"),
        By::xpath("//button[contains(.,'Other options')]"),
        By::xpath("//a[contains(.,'Other options')]"),
        By::css(".other-options-link"),
    ])
}

pub fn passcode_option() -> Locator {
    Locator::new(vec![
        By::xpath("//button[contains(.,'Duo Mobile passcode')]"),
        By::xpath("//a[contains(.,'Duo Mobile passcode')]"),
        By::xpath("//button[contains(.,'Passcode')]"),
        By::xpath("//a[contains(.,'Passcode')]"),
    ])
}

pub fn device_trust_no() -> Locator {
    Locator::new(vec![
        By::xpath("//button[contains(.,'No')]"),
        By::xpath("//a[contains(.,'No')]"),
        By::css("button.negative"),
    ])
}

pub fn device_trust_yes() -> Locator {
    Locator::new(vec![
        By::xpath("//button[contains(.,'Yes')]"),
        By::css("button.positive"),
    ])
}

pub fn touchid_other_options() -> Locator {
    Locator::new(vec![
        By::link_text("Other options"),
        By::partial_link_text("Other options"),
    ])
}

pub fn punch_dropdown() -> Locator {
    Locator::new(vec![
        By::id("TL_RPTD_TIME_PUNCH_TYPE$0"),
        By::css("select[id*='PUNCH_TYPE']"),
        By::xpath("//select[contains(@id,'PUNCH_TYPE')]"),
    ])
}

pub fn submit_button() -> Locator {
    Locator::new(vec![
        By::id("TL_WEB_CLOCK_WK_TL_SAVE_PB"),
        By::xpath("//a[@id='TL_WEB_CLOCK_WK_TL_SAVE_PB']"),
        By::xpath("//a[contains(@class,'ps-button') and contains(.,'Submit')]"),
        By::xpath("//*[self::a or self::button][normalize-space()='Submit']"),
    ])
}
