//! Rendering-context construction.
//!
//! The context starts from client-supplied POST-body values (when the
//! endpoint declares a schema) and is then overwritten by the configured
//! `template.context` keys, so explicitly configured values always win over
//! anything a client sends.

use serde_json::{Map, Value as JsonValue};
use serde_yaml::Mapping;

use crate::errors::Error;

/// Build the rendering context from the resolved configured context and an
/// optional request body.
pub fn build_context(
    configured: &Mapping,
    body: Option<&Map<String, JsonValue>>,
) -> Result<Map<String, JsonValue>, Error> {
    let mut context = Map::new();

    if let Some(body) = body {
        for (key, value) in body {
            context.insert(key.clone(), value.clone());
        }
    }

    for (key, value) in configured {
        let name = key.as_str().ok_or_else(|| Error::EnvFormat {
            path: "template.context".to_string(),
            detail: "context keys must be strings".to_string(),
        })?;
        let json = serde_json::to_value(value).map_err(|e| Error::EnvFormat {
            path: "template.context".to_string(),
            detail: e.to_string(),
        })?;
        context.insert(name.to_string(), json);
    }

    Ok(context)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(text: &str) -> Mapping {
        serde_yaml::from_str(text).unwrap()
    }

    #[test]
    fn test_configured_keys_win_over_body() {
        let configured = mapping("host: server-side\n");
        let body: Map<String, JsonValue> = serde_json::from_str(
            r#"{"host": "client-side", "extra": "kept"}"#,
        )
        .unwrap();

        let context = build_context(&configured, Some(&body)).unwrap();
        assert_eq!(context["host"], "server-side");
        assert_eq!(context["extra"], "kept");
    }

    #[test]
    fn test_no_body() {
        let configured = mapping("k: v\n");
        let context = build_context(&configured, None).unwrap();
        assert_eq!(context.len(), 1);
        assert_eq!(context["k"], "v");
    }

    #[test]
    fn test_non_string_key_rejected() {
        let configured = mapping("1: v\n");
        assert!(build_context(&configured, None).is_err());
    }
}
