//! Cross-cutting helpers shared by the binary and adapters.

pub mod config;

pub use self::config::AppConfig;
