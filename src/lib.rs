//! Simple Configuration Server
//!
//! Serves configuration files and rendered templates over HTTP while keeping
//! secret values in a directory tree separate from version-controlled
//! configuration, and authorizing every access by identity, source network,
//! and requested path.

// Core subsystems
pub mod config;
pub mod documents;
pub mod environments;
pub mod http;
pub mod references;
pub mod templates;

// Cross-cutting concerns
pub mod audit;
pub mod errors;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::ServerConfig;
pub use errors::Error;
pub use http::server::{AppState, HttpServer};
