//! Persistence adapters. SQLite storage for questions, answers, announcements and profiles.

pub mod sqlite_repo;

pub use sqlite_repo::SqliteRepo;
