//! HTTP layer.
//!
//! axum router exposing the archive operations as JSON endpoints, plus the
//! unauthenticated hello, health and metrics routes.

pub mod handler;
