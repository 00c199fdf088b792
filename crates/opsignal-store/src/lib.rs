//! OpSignal Store
//!
//! Durable, tenant-scoped, append-only storage for telemetry signals.
//! One sled tree per tenant keeps tenant isolation structural: a scan over
//! tenant A's tree can never surface tenant B's records.

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod engine;

pub use engine::SignalStore;
