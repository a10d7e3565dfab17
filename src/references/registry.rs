//! Registry of tag resolvers.
//!
//! Maps a YAML tag name to the resolver that produces its value. Built-in
//! tags are always present; additional constructors are enabled by name from
//! the `extensions.constructors` configuration section, and unknown names
//! fail configuration loading.

use std::collections::HashMap;
use std::sync::Arc;

use serde_yaml::Value;

use crate::config::loader::ConfigError;
use crate::config::schema::ConstructorConfig;
use crate::errors::Error;
use crate::references::reference::{Reference, RefKind};
use crate::references::resolver::{ReferenceResolver, Resolution};

/// Resolves the value of one tagged YAML node.
pub trait TagResolver: Send + Sync {
    /// Produce the plain value for a node carrying this resolver's tag.
    fn resolve(
        &self,
        node: &Value,
        resolver: &ReferenceResolver,
        trace: &mut Resolution,
    ) -> Result<Value, Error>;
}

/// Tag name → resolver, populated at startup.
#[derive(Clone)]
pub struct TagRegistry {
    resolvers: HashMap<String, Arc<dyn TagResolver>>,
}

impl TagRegistry {
    /// Registry with the built-in tags: `scs-common`, `scs-secret`, and
    /// `scs-expand-env`.
    pub fn builtin() -> Self {
        let mut registry = Self {
            resolvers: HashMap::new(),
        };
        registry.register("scs-common", Arc::new(CommonTag));
        registry.register("scs-secret", Arc::new(SecretTag));
        registry.register("scs-expand-env", Arc::new(ExpandEnvTag));
        registry
    }

    /// Registry with built-ins plus the constructors declared in the
    /// configuration. Unknown names are a configuration error.
    pub fn from_config(constructors: &[ConstructorConfig]) -> Result<Self, ConfigError> {
        let mut registry = Self::builtin();
        for constructor in constructors {
            match constructor.name.as_str() {
                // Already registered; declaring it again is harmless.
                "scs-expand-env" => {}
                "scs-simple-value" => {
                    let resolver = SimpleValueTag::from_options(&constructor.options)
                        .map_err(|e| ConfigError::Validation(vec![e]))?;
                    let tag = resolver.tag.clone();
                    registry.register(&tag, Arc::new(resolver));
                }
                other => {
                    return Err(ConfigError::Validation(vec![format!(
                        "Cannot find extensions.constructors: {other}"
                    )]));
                }
            }
        }
        Ok(registry)
    }

    fn register(&mut self, name: &str, resolver: Arc<dyn TagResolver>) {
        self.resolvers.insert(name.to_string(), resolver);
    }

    /// Look up the resolver for a tag name (without the leading `!`).
    pub fn get(&self, name: &str) -> Option<&Arc<dyn TagResolver>> {
        self.resolvers.get(name)
    }
}

fn node_as_str<'a>(tag: &str, node: &'a Value) -> Result<&'a str, Error> {
    node.as_str().ok_or_else(|| Error::EnvFormat {
        path: format!("!{tag} node"),
        detail: "expected a string value".to_string(),
    })
}

/// `!scs-common path#fragment`
struct CommonTag;

impl TagResolver for CommonTag {
    fn resolve(
        &self,
        node: &Value,
        resolver: &ReferenceResolver,
        trace: &mut Resolution,
    ) -> Result<Value, Error> {
        let raw = node_as_str("scs-common", node)?;
        let reference = Reference::parse(RefKind::Common, raw);
        resolver.resolve_reference(&reference, trace)
    }
}

/// `!scs-secret path#fragment`
struct SecretTag;

impl TagResolver for SecretTag {
    fn resolve(
        &self,
        node: &Value,
        resolver: &ReferenceResolver,
        trace: &mut Resolution,
    ) -> Result<Value, Error> {
        let raw = node_as_str("scs-secret", node)?;
        let reference = Reference::parse(RefKind::Secret, raw);
        resolver.resolve_reference(&reference, trace)
    }
}

/// `!scs-expand-env ${VAR}`, substituting process environment variables.
struct ExpandEnvTag;

impl TagResolver for ExpandEnvTag {
    fn resolve(
        &self,
        node: &Value,
        _resolver: &ReferenceResolver,
        _trace: &mut Resolution,
    ) -> Result<Value, Error> {
        let raw = node_as_str("scs-expand-env", node)?;
        Ok(Value::String(expand_env_vars(raw)?))
    }
}

/// Substitute every `${NAME}` occurrence; a missing variable is an
/// unresolvable reference.
fn expand_env_vars(input: &str) -> Result<String, Error> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                let value =
                    std::env::var(name).map_err(|_| Error::UnresolvableReference {
                        reference: format!("environment variable {name}"),
                    })?;
                out.push_str(&value);
                rest = &after[end + 1..];
            }
            None => {
                // Unterminated pattern; keep it verbatim.
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    Ok(out)
}

/// Fixed-value replacement for an arbitrary tag, declared via
/// `extensions.constructors` with `{tag, value}` options. Intended for
/// validating configuration trees outside production.
struct SimpleValueTag {
    tag: String,
    value: Value,
}

impl SimpleValueTag {
    fn from_options(options: &serde_yaml::Mapping) -> Result<Self, String> {
        let tag = options
            .get("tag")
            .and_then(Value::as_str)
            .ok_or("scs-simple-value requires a 'tag' option")?;
        let value = options
            .get("value")
            .cloned()
            .ok_or("scs-simple-value requires a 'value' option")?;
        Ok(Self {
            tag: tag.trim_start_matches('!').to_string(),
            value,
        })
    }
}

impl TagResolver for SimpleValueTag {
    fn resolve(
        &self,
        _node: &Value,
        _resolver: &ReferenceResolver,
        _trace: &mut Resolution,
    ) -> Result<Value, Error> {
        Ok(self.value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("SCS_TEST_REGISTRY_VAR", "resolved");
        assert_eq!(
            expand_env_vars("pre-${SCS_TEST_REGISTRY_VAR}-post").unwrap(),
            "pre-resolved-post"
        );
    }

    #[test]
    fn test_expand_missing_var_fails() {
        let err = expand_env_vars("${SCS_TEST_REGISTRY_MISSING}").unwrap_err();
        assert!(matches!(err, Error::UnresolvableReference { .. }));
    }

    #[test]
    fn test_expand_unterminated_kept_verbatim() {
        assert_eq!(expand_env_vars("${UNTERMINATED").unwrap(), "${UNTERMINATED");
    }

    #[test]
    fn test_unknown_constructor_rejected() {
        let constructors = vec![ConstructorConfig {
            name: "scs-does-not-exist".to_string(),
            options: serde_yaml::Mapping::new(),
        }];
        assert!(TagRegistry::from_config(&constructors).is_err());
    }

    #[test]
    fn test_simple_value_constructor() {
        let options: serde_yaml::Mapping =
            serde_yaml::from_str("tag: '!cloud-param'\nvalue: placeholder\n").unwrap();
        let constructors = vec![ConstructorConfig {
            name: "scs-simple-value".to_string(),
            options,
        }];
        let registry = TagRegistry::from_config(&constructors).unwrap();
        assert!(registry.get("cloud-param").is_some());
    }
}
