//! Deterministic, pure logic shared by the test runner.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data and return deterministic outputs suitable for tests.

pub mod classifier;
pub mod invocation;
pub mod types;
pub mod verdict;
