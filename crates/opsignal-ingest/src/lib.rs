//! OpSignal Ingestion Pipeline
//!
//! Validates and persists batches of incoming signals under an authenticated
//! agent identity. Records fail independently: a single bad or unpersistable
//! record is logged and skipped, never aborting the rest of the batch.

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod pipeline;

pub use pipeline::{IngestPipeline, SignalSink};
