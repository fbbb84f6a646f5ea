//! Client Pulse - feedback and feature tracking backend
//!
//! Users register through an emailed one-time code, file rated feedback
//! against features, and developers triage that feedback and curate the
//! feature catalog. Everything is exposed as a JSON REST API.

pub mod account;
pub mod api;
pub mod auth;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod features;
pub mod feedback;
pub mod jobs;
pub mod mailer;
pub mod metrics;
pub mod options;
pub mod otp;
pub mod rate_limit;
pub mod server;

pub use config::ServerConfig;
pub use context::AppContext;
pub use error::{PulseError, PulseResult};
