//! OpSignal Security
//!
//! The authentication seam consumed by the API layer:
//! - agent API keys (SHA-256 digests provisioned in config) resolve to the
//!   `(agent_id, customer_id)` identity used to stamp ingested signals;
//! - dashboard session tokens (HS256 JWTs) resolve to the
//!   `(user_id, company_id, role)` identity whose company scopes every read.
//!
//! Account and key CRUD live outside this system.

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod jwt;
mod manager;

pub use jwt::SessionTokenCodec;
pub use manager::SecurityManager;
