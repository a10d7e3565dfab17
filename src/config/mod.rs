//! Server configuration subsystem.
//!
//! # Data Flow
//! ```text
//! scs-configuration.yaml
//!     → loader.rs (parse & deserialize)
//!     → semantic checks (directories exist, whitelist sanity)
//!     → ServerConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart. Caches are
//!   invalidated only by restart as well (stated operational limitation).
//! - All fields have defaults to allow minimal configs.

pub mod loader;
pub mod schema;

pub use loader::{load_config, ConfigError};
pub use schema::AuthConfig;
pub use schema::DirectoryConfig;
pub use schema::ServerConfig;
pub use schema::TemplatesConfig;
