use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failures surfaced by a [`crate::driver::Driver`] implementation.
///
/// Helpers in this crate treat most of these as transient: a missing element
/// means "try the next candidate", not "abort the run".
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("element not found: {0}")]
    NotFound(String),

    #[error("element not interactable: {0}")]
    NotInteractable(String),

    #[error("stale element reference")]
    Stale,

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("script execution failed: {0}")]
    Script(String),

    #[error("no such window: {0}")]
    NoSuchWindow(String),

    #[error("no such frame")]
    NoSuchFrame,

    #[error("browser session is gone")]
    SessionGone,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Terminal failures of a login attempt.
///
/// `RestartRequired` is the only variant the orchestrator retries on, and it
/// retries exactly once with a fresh cookie-less browser session.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("timed out after {budget:?} waiting for Duo / the portal to finish login")]
    Timeout { budget: Duration },

    #[error("no progress for {ticks} ticks (url stuck at {url})")]
    Stuck { ticks: u32, url: String },

    #[error("fatal gateway error page detected, full restart required")]
    RestartRequired,

    #[error("identity provider option not found on the selection page")]
    IdpNotFound,

    #[error(transparent)]
    Driver(#[from] DriverError),
}

impl AuthError {
    /// True when a fresh browser session may recover the failure.
    pub fn wants_restart(&self) -> bool {
        matches!(self, AuthError::RestartRequired)
    }
}

/// Failures while producing a one-time passcode.
#[derive(Debug, Error)]
pub enum PasscodeError {
    #[error("invalid otpauth URI: {0}")]
    InvalidUri(String),

    #[error("secret is not valid base32")]
    InvalidSecret,

    #[error("unsupported OTP algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("unsupported digit count: {0}")]
    UnsupportedDigits(u32),

    #[error("counter file {path}: {source}")]
    CounterFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
