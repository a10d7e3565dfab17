//! Document loading and caching.

pub mod store;

pub use store::{DirKind, DocumentStore};
