//! Common utilities shared across the KPI metrics crates.

#![warn(clippy::pedantic)]

/// Module for common configuration
pub mod config;

/// Module for tracing subscriber setup
pub mod logging;
