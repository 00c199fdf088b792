//! OpSignal API Layer
//!
//! REST API (Actix-Web) for agent ingestion and dashboard analytics queries.

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod rest;

pub use rest::RestServer;
