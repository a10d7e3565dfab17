//! Typed references between documents.
//!
//! # Data Flow
//! ```text
//! tagged YAML node (!scs-common, !scs-secret, ...)
//!     → reference.rs (parse "path#fragment")
//!     → registry.rs (tag name → resolver implementation)
//!     → resolver.rs (fetch target, address fragment, recurse, track cycles)
//!     → plain value + per-request secret-use trace
//! ```

pub mod reference;
pub mod registry;
pub mod resolver;

pub use reference::{tag_name, Reference, RefKind};
pub use registry::TagRegistry;
pub use resolver::{ReferenceResolver, Resolution};
