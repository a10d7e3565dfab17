//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate documents → Pre-render endpoints → Serve
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup validation error is fatal
//! - Every endpoint is exercised once before traffic is accepted, so a
//!   broken overlay or template surfaces at deploy time, not at 3am

pub mod startup;

pub use startup::{enumerate_endpoints, validate_startup};
