//! The `beekeeperd` daemon.
//!
//! This crate wires the cleanup engine from configuration and drives it:
//! - Configuration loading from TOML and environment variables
//! - Construction of storage, metadata store and record handlers
//! - Periodic cleanup and retention loops

pub mod config;
pub mod scheduler;
pub mod state;

pub use config::load_config;
pub use state::AppState;
