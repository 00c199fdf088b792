//! OpSignal Common - Shared utilities and types
//!
//! This crate provides common functionality used across all OpSignal components:
//! - Error types and handling
//! - Configuration management
//! - Signal and filter type definitions
//! - Metrics and observability

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod filter;
pub mod metrics;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use filter::{FilterParams, SignalFilter};
pub use types::*;
