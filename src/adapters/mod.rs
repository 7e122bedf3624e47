//! Infrastructure adapters. Implement outbound ports and expose the HTTP API.
//!
//! Chat-completion provider, SQLite storage, axum router. Map errors to DomainError.

pub mod ai;
pub mod http;
pub mod persistence;
