//! HTTP server
//!
//! Loads configuration, scans the master directory and serves the groups
//! found there until shut down.

pub mod config;
pub mod listener;

pub use config::{write_template, ServerConfig};
pub use listener::ImageServer;
