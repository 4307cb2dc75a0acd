//! Watch-driven SuperCollider unit-test runner.
//!
//! This crate supervises the external test runner, streams and classifies its
//! output, and derives one pass/fail verdict per run even when the process exit
//! code cannot be trusted. The architecture keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (line classification, verdict
//!   aggregation, invocation construction). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting adapters (pty sessions, console, notifications,
//!   config, file matching). Each sits behind a trait so tests can script it.
//!
//! Orchestration modules ([`executor`], [`controller`], [`watch`]) coordinate
//! core logic with I/O to implement CLI commands.

pub mod controller;
pub mod core;
pub mod executor;
pub mod exit_codes;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod watch;
