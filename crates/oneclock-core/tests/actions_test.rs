mod common;

use common::{Event, FakeDriver, FakeElement};
use oneclock_core::actions::{click, click_by_text, set_value};
use oneclock_core::driver::{By, ElementId};

#[tokio::test]
async fn click_prefers_the_native_path() {
    let mut driver = FakeDriver::new();
    driver.add(1, FakeElement::with_id("btn"));

    assert!(click(&mut driver, ElementId(1)).await);
    assert_eq!(driver.events, vec![Event::Click(1)]);
}

#[tokio::test]
async fn click_falls_back_to_script_when_native_fails() {
    let mut driver = FakeDriver::new();
    driver.add(
        1,
        FakeElement {
            matches: vec![By::id("btn")],
            native_click_fails: true,
            ..Default::default()
        },
    );

    assert!(click(&mut driver, ElementId(1)).await);
    assert_eq!(driver.events, vec![Event::Click(1), Event::ScriptClick(1)]);
}

#[tokio::test]
async fn click_on_a_gone_element_reports_false() {
    let mut driver = FakeDriver::new();
    assert!(!click(&mut driver, ElementId(99)).await);
}

#[tokio::test]
async fn set_value_types_natively_when_the_value_sticks() {
    let mut driver = FakeDriver::new();
    driver.add(
        1,
        FakeElement {
            matches: vec![By::id("passcode-input")],
            tag: "input".into(),
            ..Default::default()
        },
    );

    set_value(&mut driver, ElementId(1), "123456").await;
    assert_eq!(driver.elements[&1].value(), "123456");
    assert!(
        !driver
            .events
            .iter()
            .any(|e| matches!(e, Event::SetValueScript(..))),
        "scripted setter should not run when typing sticks"
    );
}

#[tokio::test]
async fn set_value_uses_the_scripted_setter_for_controlled_inputs() {
    let mut driver = FakeDriver::new();
    driver.add(
        1,
        FakeElement {
            matches: vec![By::id("passcode-input")],
            tag: "input".into(),
            typing_sticks: false,
            ..Default::default()
        },
    );

    set_value(&mut driver, ElementId(1), "123456").await;
    assert!(driver
        .events
        .contains(&Event::SetValueScript(1, "123456".into())));
    assert_eq!(driver.elements[&1].value(), "123456");
}

#[tokio::test]
async fn set_value_is_idempotent() {
    let mut driver = FakeDriver::new();
    driver.add(
        1,
        FakeElement {
            matches: vec![By::id("passcode-input")],
            tag: "input".into(),
            ..Default::default()
        },
    );

    set_value(&mut driver, ElementId(1), "123456").await;
    set_value(&mut driver, ElementId(1), "123456").await;
    assert_eq!(driver.elements[&1].value(), "123456");
}

#[tokio::test]
async fn click_by_text_matches_any_alternative() {
    let mut driver = FakeDriver::new();
    driver.add(
        1,
        FakeElement {
            text: "Enter a Passcode instead".into(),
            ..Default::default()
        },
    );
    assert!(click_by_text(&mut driver, "Duo Mobile passcode|Passcode", "button, a").await);
    assert!(!click_by_text(&mut driver, "Other options", "button, a").await);
}
