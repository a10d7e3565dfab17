//! Environment overlays and their merge semantics.
//!
//! # Data Flow
//! ```text
//! endpoint path "a/b/name"
//!     → merger.rs (overlay chain: scs-env.yaml → a/ → a/b/ → a/b/name.*)
//!     → overlay.rs (per-file shape validation)
//!     → deep merge, least → most specific
//!     → EffectiveEnvironment (references still unresolved, cacheable)
//! ```

pub mod merger;
pub mod overlay;

pub use merger::{deep_merge, overlay_chain, EnvironmentMerger};
pub use overlay::{EffectiveEnvironment, RequestSection, ResponseSection, TemplateSection};
