//! I/O adapters for the test runner.

pub mod config;
pub mod console;
pub mod matcher;
pub mod notification;
pub mod process;
