//! OpSignal Query Engine
//!
//! Serves dynamically-filtered retrieval, grouped summaries and time-bucketed
//! histograms over the signal store. All three query shapes are driven by the
//! same `SignalFilter` predicate, so filter semantics cannot diverge between
//! raw rows and aggregates.

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod engine;

pub use engine::{QueryEngine, SignalSource};
