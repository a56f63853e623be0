//! # Collab Auth Library
//!
//! OAuth authorization-code login with a CSRF state cookie and session
//! issuance, plus the session lookup used by the rest of the application.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod oauth;
pub mod repositories;
pub mod server;
pub mod session;
pub mod telemetry;
pub use migration;
