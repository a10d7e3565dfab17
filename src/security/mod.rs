//! Authentication, authorization, and abuse protection.
//!
//! # Data Flow
//! ```text
//! request (credential, source address, path)
//!     → networks.rs   (global whitelist, per-identity CIDR containment)
//!     → rate_limit.rs (failed-auth throttling per source address)
//!     → access_control.rs (identity lookup, path pattern matching)
//!     → AccessDecision
//! ```

pub mod access_control;
pub mod networks;
pub mod path_pattern;
pub mod rate_limit;

pub use access_control::{AccessController, AccessDecision, Identity};
pub use networks::NetworkWhitelist;
pub use path_pattern::PathPattern;
pub use rate_limit::RateLimiter;
