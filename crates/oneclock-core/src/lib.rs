//! Core automation for the OneUSG web time clock: the driver capability
//! trait, the federated login / Duo MFA negotiation state machine, and the
//! clock-page actions. Browser-specific code lives in the companion
//! `oneclock-h` crate.

pub mod actions;
pub mod artifacts;
pub mod clock;
pub mod config;
pub mod driver;
pub mod duo;
pub mod error;
pub mod locator;
pub mod login;
pub mod notify;
pub mod passcode;
pub mod poll;
pub mod selectors;

pub use clock::Punch;
pub use config::{AuthConfig, Pacing};
pub use driver::{By, Driver, ElementId, Key, Modifier, ScriptArg, WindowHandle};
pub use error::{AuthError, DriverError, PasscodeError};
pub use locator::Locator;
pub use login::{login, login_with_restart};
pub use passcode::PasscodeSource;
pub use selectors::CLOCK_PAGE_URL;
