//! Testing utilities for ProjectHub applications
//!
//! Alba-style endpoint testing without running a server. See
//! [`Scenario`] for the cookie and origin helpers.

mod scenario;

pub use scenario::{Scenario, ScenarioAssert, delete, get, post, preflight, put};
