//! Cooldown-gated inventory valuation.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod credentials;
pub mod duration;
pub mod engine;
pub mod report;
pub mod sources;
pub mod storage;
pub mod types;
