//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from the
//! `scs-configuration.yaml` file.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the configuration server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address, limits).
    pub listener: ListenerConfig,

    /// Locations of the config, common, and secrets directory trees.
    pub directories: DirectoryConfig,

    /// Environment-overlay loading behaviour.
    pub environments: EnvironmentsConfig,

    /// Template rendering behaviour.
    pub templates: TemplatesConfig,

    /// Authentication and authorization settings.
    pub auth: AuthConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Optional extension tag resolvers.
    pub extensions: ExtensionsConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:5000").
    pub bind_address: String,

    /// Total request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5000".to_string(),
            request_timeout_secs: 30,
            max_body_size: 2 * 1024 * 1024,
        }
    }
}

/// Locations of the three document trees served by the store.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// Endpoint files and scs-env.yaml overlays.
    pub config: PathBuf,

    /// Documents addressable through !scs-common references.
    pub common: PathBuf,

    /// Documents addressable through !scs-secret references (optional).
    pub secrets: Option<PathBuf>,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            config: PathBuf::from("config"),
            common: PathBuf::from("common"),
            secrets: None,
        }
    }
}

/// Environment-overlay loading behaviour.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EnvironmentsConfig {
    /// Cache merged environments per endpoint path. When disabled, overlays
    /// are reloaded and re-merged on every request (useful while editing
    /// configuration interactively, at an I/O cost).
    pub cache: bool,

    /// Fail startup if any common/secrets document contains a mapping key
    /// with an embedded dot. Disabling this makes such keys permanently
    /// unaddressable via reference fragments.
    pub reject_keys_containing_dots: bool,
}

impl Default for EnvironmentsConfig {
    fn default() -> Self {
        Self {
            cache: true,
            reject_keys_containing_dots: true,
        }
    }
}

/// Template rendering behaviour.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TemplatesConfig {
    /// Cache compiled templates per endpoint path.
    pub cache: bool,

    /// Render every templating-enabled endpoint once at startup using its
    /// statically-known context. Endpoints whose context depends on
    /// request-supplied values will fail this check.
    pub validate_on_startup: bool,

    /// Global default rendering options, overridable per endpoint.
    pub rendering_options: serde_yaml::Mapping,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            cache: true,
            validate_on_startup: true,
            rendering_options: serde_yaml::Mapping::new(),
        }
    }
}

/// Authentication and authorization settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Path of the YAML file listing identities and their permissions.
    pub users_file: PathBuf,

    /// Global network policy.
    pub networks: NetworksConfig,

    /// Failed authentication attempts allowed per source address within the
    /// rate-limit window before further attempts are rejected.
    pub max_auth_fails_per_15_min: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            users_file: PathBuf::from("scs-users.yaml"),
            networks: NetworksConfig::default(),
            max_auth_fails_per_15_min: 10,
        }
    }
}

/// Global network policy. Every identity's allowed networks must be a
/// subset of the whitelist; validated once at load time.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworksConfig {
    /// Require every whitelisted network to be a private range.
    pub private_only: bool,

    /// IPs or CIDR ranges allowed to reach the server at all.
    pub whitelist: Vec<String>,
}

impl Default for NetworksConfig {
    fn default() -> Self {
        Self {
            private_only: false,
            whitelist: vec!["127.0.0.1".to_string()],
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Extension tag resolvers enabled by name from the built-in registry.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ExtensionsConfig {
    /// Additional tag constructors. Unknown names fail configuration
    /// loading.
    pub constructors: Vec<ConstructorConfig>,
}

/// One extension tag constructor declaration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConstructorConfig {
    /// Registry name, e.g. "scs-simple-value".
    pub name: String,

    /// Constructor-specific options.
    #[serde(default)]
    pub options: serde_yaml::Mapping,
}
