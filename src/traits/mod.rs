//! Trait definitions for extensible components
//!
//! These traits allow the session backend to be swapped without touching
//! the session manager or the request gates.

pub mod session;

pub use session::{SessionRecord, SessionStore};
