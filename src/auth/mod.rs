//! API key authentication.
//!
//! A single static key, read from the environment at startup, guards every
//! archive route.  Callers present it as a query parameter or a header.

pub mod api_key;
pub mod middleware;

pub use api_key::ApiKeyGate;
