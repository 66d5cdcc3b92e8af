//! Shared test utilities for metrika-export integration tests.
//!
//! This module provides:
//! - `FakeLogsApi`, a scripted in-memory stand-in for the Logs API
//! - `TestHarness` wiring the fake, an in-memory store and an exporter
//! - builders for export content and log requests

pub mod builders;
pub mod fake_api;
pub mod harness;

pub use builders::*;
pub use fake_api::FakeLogsApi;
pub use harness::TestHarness;
