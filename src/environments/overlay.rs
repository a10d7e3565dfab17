//! Overlay document schema.
//!
//! An overlay contributes `template`, `request`, and `response` settings to
//! every endpoint in its scope. Files are validated for shape when loaded;
//! defaults are applied only after the whole chain has been merged, so that
//! an absent key in a specific overlay never shadows a less specific one.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

/// Shape-check target for a single overlay file. Field values stay raw so
/// that tagged reference nodes survive untouched.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OverlayShape {
    template: Option<TemplateShape>,
    request: Option<RequestShape>,
    response: Option<ResponseShape>,
}

impl Default for OverlayShape {
    fn default() -> Self {
        Self {
            template: None,
            request: None,
            response: None,
        }
    }
}

impl OverlayShape {
    /// An overlay that contributes nothing is a configuration error, not a
    /// silent no-op. A section that is present but sets nothing counts as
    /// contributing nothing.
    pub fn is_empty(&self) -> bool {
        let template_empty = self.template.as_ref().map_or(true, |t| {
            t.context.is_empty() && t.rendering_options.is_empty() && t.enabled.is_none()
        });
        let request_empty = self
            .request
            .as_ref()
            .map_or(true, |r| r.methods.is_none() && r.schema.is_none());
        let response_empty = self
            .response
            .as_ref()
            .map_or(true, |r| r.status.is_none() && r.headers.is_empty());
        template_empty && request_empty && response_empty
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct TemplateShape {
    context: serde_yaml::Mapping,
    rendering_options: serde_yaml::Mapping,
    enabled: Option<bool>,
}

impl Default for TemplateShape {
    fn default() -> Self {
        Self {
            context: serde_yaml::Mapping::new(),
            rendering_options: serde_yaml::Mapping::new(),
            enabled: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RequestShape {
    methods: Option<Vec<String>>,
    schema: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ResponseShape {
    status: Option<u16>,
    headers: BTreeMap<String, Value>,
}

/// The fully merged, per-endpoint configuration. Produced by deserializing
/// the merged overlay chain; defaults fill anything no overlay set.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EffectiveEnvironment {
    /// Template context and rendering behaviour.
    pub template: TemplateSection,
    /// Accepted methods and the optional POST-body schema.
    pub request: RequestSection,
    /// Response status and headers.
    pub response: ResponseSection,
}

/// The `template` section of an effective environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateSection {
    /// Name → literal or reference; resolved per request.
    pub context: serde_yaml::Mapping,
    /// Per-endpoint rendering option overrides.
    pub rendering_options: serde_yaml::Mapping,
    /// When false, the endpoint body is served verbatim.
    pub enabled: bool,
}

impl Default for TemplateSection {
    fn default() -> Self {
        Self {
            context: serde_yaml::Mapping::new(),
            rendering_options: serde_yaml::Mapping::new(),
            enabled: true,
        }
    }
}

/// The `request` section of an effective environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestSection {
    /// HTTP methods the endpoint accepts.
    pub methods: Vec<String>,
    /// Optional JSON-schema contract for POST bodies.
    pub schema: Option<Value>,
}

impl Default for RequestSection {
    fn default() -> Self {
        Self {
            methods: vec!["GET".to_string()],
            schema: None,
        }
    }
}

/// The `response` section of an effective environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseSection {
    /// Response status code.
    pub status: u16,
    /// Response headers; replaces the default content type entirely.
    pub headers: BTreeMap<String, String>,
}

impl Default for ResponseSection {
    fn default() -> Self {
        Self {
            status: 200,
            headers: BTreeMap::new(),
        }
    }
}
