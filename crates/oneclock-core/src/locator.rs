//! Ranked element lookup.
//!
//! Portal pages come in several vintages, so every interesting element is
//! described by an ordered list of candidate queries. The first candidate
//! that resolves wins; a candidate that never resolves within its share of
//! the budget is skipped silently.

use std::time::Duration;

use tracing::debug;

use crate::driver::{By, Driver, ElementId};
use crate::error::DriverError;
use crate::poll::Poller;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Ordered, non-empty list of lookup candidates.
#[derive(Debug, Clone)]
pub struct Locator {
    candidates: Vec<By>,
}

impl Locator {
    /// Panics if `candidates` is empty; locator tables are static and an
    /// empty one is a programming error.
    pub fn new(candidates: Vec<By>) -> Self {
        assert!(!candidates.is_empty(), "locator needs at least one candidate");
        Self { candidates }
    }

    pub fn candidates(&self) -> &[By] {
        &self.candidates
    }
}

impl From<By> for Locator {
    fn from(by: By) -> Self {
        Locator::new(vec![by])
    }
}

/// Try each candidate in order, polling up to `timeout` per candidate.
///
/// When `clickable` is set the element must also be displayed and enabled.
/// Returns the last underlying error once every candidate is exhausted.
pub async fn find_first<D: Driver + ?Sized>(
    driver: &mut D,
    locator: &Locator,
    timeout: Duration,
    clickable: bool,
) -> Result<ElementId, DriverError> {
    let mut last_err = None;
    for by in locator.candidates() {
        let poller = Poller::new(timeout, POLL_INTERVAL);
        loop {
            match probe(driver, by, clickable).await {
                Ok(Some(el)) => return Ok(el),
                Ok(None) => {}
                Err(e) => last_err = Some(e),
            }
            if poller.expired() {
                break;
            }
            poller.wait().await;
        }
        debug!(?by, "locator candidate exhausted");
    }
    Err(last_err.unwrap_or_else(|| {
        DriverError::NotFound(format!("{:?}", locator.candidates()))
    }))
}

async fn probe<D: Driver + ?Sized>(
    driver: &mut D,
    by: &By,
    clickable: bool,
) -> Result<Option<ElementId>, DriverError> {
    let el = driver.find(by).await?;
    if clickable && !(driver.is_displayed(el).await? && driver.is_enabled(el).await?) {
        return Ok(None);
    }
    Ok(Some(el))
}
