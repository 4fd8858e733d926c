//! Integration test crate for the reward ledger.
//!
//! This crate has no library code. It only contains integration tests
//! that drive the ledger end to end across the workspace crates, against
//! both the in-memory store and SQLite.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p accrue-integration-tests
//! ```
