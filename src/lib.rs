//! learn-assist: course Q&A, announcements and AI study help behind a small HTTP API.
//! Hexagonal layout: domain, ports, use cases, adapters.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod shared;
pub mod usecases;
