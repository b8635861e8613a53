//! Durable resume state (namespaced key-value store on SQLite via sqlx).
//!
//! Holds one resume record per in-flight job and one ordered list of
//! records for queued-but-not-started jobs. Job instances are never
//! persisted directly; their descriptors are.

pub mod db;
pub mod records;
pub mod types;

#[cfg(test)]
mod tests;

pub use db::*;
pub use records::*;
pub use types::*;
