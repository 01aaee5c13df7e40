//! The Duo Universal Prompt leg of the login flow.
//!
//! `handlers` holds the individual detect-then-act units for each screen
//! Duo can show; `negotiate` runs them in a polling loop until the portal
//! comes back or the attempt is declared dead.

pub mod handlers;
pub mod negotiate;

pub use negotiate::negotiate;
