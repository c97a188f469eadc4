//! `AgroSmart` dashboard client library.
//!
//! HTTP client for the `AgroSmart` server and the plain-text renderers used
//! by the `agrosmart` binary.

pub mod client;
pub mod render;
