//! Template rendering.

pub mod context;
pub mod engine;

pub use context::build_context;
pub use engine::{RenderOptions, TemplateEngine};
