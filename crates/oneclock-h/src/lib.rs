//! Headless-Chromium implementation of the `oneclock-core` driver trait.

pub mod cdp;
pub mod driver;

pub use cdp::CdpClient;
pub use driver::HeadlessDriver;
