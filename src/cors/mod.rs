//! Cross-origin policy gate.
//!
//! Decides which browser origin may call the API with credentials, answers
//! preflight requests, and tells the session layer whether a cookie arriving
//! from a given origin may be honored.

mod config;
mod layer;
mod policy;

pub use config::{CorsConfig, CorsConfigBuilder};
pub use layer::build_cors_layer;
pub use policy::{CorsPolicy, OriginRule};
