//! Reference resolution with cycle detection.
//!
//! # Responsibilities
//! - Walk a YAML value and replace every tagged node with its resolved value
//! - Fetch reference targets through the document store
//! - Detect cyclic reference chains with an explicit resolution stack
//! - Record which secret references were exposed, for the audit stream
//!
//! # Design Decisions
//! - Cycles are tracked via in-progress `(kind, path, fragment)` keys rather
//!   than recursion depth, so a cycle reports the offending chain instead of
//!   overflowing the stack.
//! - Secret documents may not contain further references; a secret value is
//!   returned as-is and its id recorded in the resolution trace.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_yaml::Value;

use crate::documents::DocumentStore;
use crate::errors::Error;
use crate::references::reference::{tag_name, Reference, RefKind};
use crate::references::registry::TagRegistry;

/// Per-request resolution state: the in-progress reference stack and the
/// set of secret ids exposed so far.
#[derive(Debug, Default)]
pub struct Resolution {
    stack: Vec<String>,
    secrets: BTreeSet<String>,
}

impl Resolution {
    /// Fresh trace for one request (or one startup validation pass).
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids of all secret references resolved through this trace, in
    /// deterministic order.
    pub fn secrets_used(&self) -> Vec<String> {
        self.secrets.iter().cloned().collect()
    }
}

/// Resolves tagged nodes against the document store.
pub struct ReferenceResolver {
    store: Arc<DocumentStore>,
    registry: TagRegistry,
}

impl ReferenceResolver {
    /// Create a resolver over the given store and tag registry.
    pub fn new(store: Arc<DocumentStore>, registry: TagRegistry) -> Self {
        Self { store, registry }
    }

    /// Recursively resolve every tagged node in `value` to a plain value.
    pub fn resolve(&self, value: &Value, trace: &mut Resolution) -> Result<Value, Error> {
        match value {
            Value::Tagged(tagged) => {
                let name = tag_name(&tagged.tag);
                let resolver = self
                    .registry
                    .get(&name)
                    .ok_or(Error::UnknownTag { tag: name.clone() })?
                    .clone();
                resolver.resolve(&tagged.value, self, trace)
            }
            Value::Mapping(mapping) => {
                let mut out = serde_yaml::Mapping::with_capacity(mapping.len());
                for (key, val) in mapping {
                    out.insert(key.clone(), self.resolve(val, trace)?);
                }
                Ok(Value::Mapping(out))
            }
            Value::Sequence(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.resolve(item, trace)?);
                }
                Ok(Value::Sequence(out))
            }
            other => Ok(other.clone()),
        }
    }

    /// Resolve one reference to its plain value, recursing into nested
    /// references for common targets.
    pub fn resolve_reference(
        &self,
        reference: &Reference,
        trace: &mut Resolution,
    ) -> Result<Value, Error> {
        let key = reference.qualified_id();
        if trace.stack.contains(&key) {
            let mut chain = trace.stack.clone();
            chain.push(key);
            return Err(Error::CyclicReference {
                chain: chain.join(" -> "),
            });
        }
        trace.stack.push(key);
        let result = self.resolve_target(reference, trace);
        trace.stack.pop();
        result
    }

    fn resolve_target(
        &self,
        reference: &Reference,
        trace: &mut Resolution,
    ) -> Result<Value, Error> {
        let doc = self
            .store
            .load(reference.kind.dir_kind(), &reference.target_path)?;
        let node = reference.address(&doc)?;

        match reference.kind {
            RefKind::Common => self.resolve(node, trace),
            RefKind::Secret => {
                // Secret files support only the gen-secret rewrite, which the
                // store already applied; any other tag is a config mistake.
                if let Some(tag) = first_tag(node) {
                    return Err(Error::UnknownTag { tag });
                }
                trace.secrets.insert(reference.id());
                Ok(node.clone())
            }
        }
    }
}

/// First tag found anywhere in the value, if any.
fn first_tag(value: &Value) -> Option<String> {
    match value {
        Value::Tagged(tagged) => Some(tag_name(&tagged.tag)),
        Value::Mapping(mapping) => mapping.iter().find_map(|(_, v)| first_tag(v)),
        Value::Sequence(items) => items.iter().find_map(first_tag),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::DirKind;
    use std::fs;
    use std::path::Path;

    fn setup(dir: &Path) -> ReferenceResolver {
        for sub in ["config", "common", "secrets"] {
            fs::create_dir_all(dir.join(sub)).unwrap();
        }
        let store = Arc::new(DocumentStore::new(
            dir.join("config"),
            dir.join("common"),
            Some(dir.join("secrets")),
            true,
            true,
        ));
        ReferenceResolver::new(store, TagRegistry::builtin())
    }

    #[test]
    fn test_resolves_nested_common_references() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("common")).unwrap();
        fs::write(
            tmp.path().join("common/outer.yaml"),
            "host: !scs-common inner.yaml#host\n",
        )
        .unwrap();
        fs::write(tmp.path().join("common/inner.yaml"), "host: db.local\n").unwrap();
        let resolver = setup(tmp.path());

        let mut trace = Resolution::new();
        let reference = Reference::parse(RefKind::Common, "outer.yaml#host");
        let value = resolver.resolve_reference(&reference, &mut trace).unwrap();
        assert_eq!(value.as_str(), Some("db.local"));
        assert!(trace.secrets_used().is_empty());
    }

    #[test]
    fn test_secret_resolution_is_traced() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("secrets")).unwrap();
        fs::write(
            tmp.path().join("secrets/db.yaml"),
            "- password: pw1\n- password: pw2\n",
        )
        .unwrap();
        let resolver = setup(tmp.path());

        let mut trace = Resolution::new();
        let reference = Reference::parse(RefKind::Secret, "db.yaml#[0].password");
        let value = resolver.resolve_reference(&reference, &mut trace).unwrap();
        assert_eq!(value.as_str(), Some("pw1"));
        assert_eq!(trace.secrets_used(), vec!["db.yaml#[0].password"]);
    }

    #[test]
    fn test_cycle_detected_with_chain() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("common")).unwrap();
        fs::write(tmp.path().join("common/a.yaml"), "v: !scs-common b.yaml#v\n").unwrap();
        fs::write(tmp.path().join("common/b.yaml"), "v: !scs-common a.yaml#v\n").unwrap();
        let resolver = setup(tmp.path());

        let mut trace = Resolution::new();
        let reference = Reference::parse(RefKind::Common, "a.yaml#v");
        let err = resolver.resolve_reference(&reference, &mut trace).unwrap_err();
        match err {
            Error::CyclicReference { chain } => {
                assert!(chain.contains("a.yaml#v"));
                assert!(chain.contains("b.yaml#v"));
            }
            other => panic!("expected cycle error, got {other:?}"),
        }
    }

    #[test]
    fn test_secret_value_absent_from_error_text() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("secrets")).unwrap();
        fs::write(tmp.path().join("secrets/db.yaml"), "- password: pw1\n").unwrap();
        let resolver = setup(tmp.path());

        // Fragment lookup fails next to an existing secret value; the error
        // text must not contain the value.
        let mut trace = Resolution::new();
        let reference = Reference::parse(RefKind::Secret, "db.yaml#[0].passwort");
        let err = resolver.resolve_reference(&reference, &mut trace).unwrap_err();
        let text = format!("{err} {err:?}");
        assert!(!text.contains("pw1"));
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let resolver = setup(tmp.path());
        let value: Value = serde_yaml::from_str("v: !scs-bogus something\n").unwrap();
        let mut trace = Resolution::new();
        let err = resolver.resolve(&value, &mut trace).unwrap_err();
        assert!(matches!(err, Error::UnknownTag { .. }));
    }

    #[test]
    fn test_missing_fragment_never_returns_null() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("common")).unwrap();
        fs::write(tmp.path().join("common/c.yaml"), "a: 1\n").unwrap();
        let resolver = setup(tmp.path());

        let mut trace = Resolution::new();
        let reference = Reference::parse(RefKind::Common, "c.yaml#missing");
        assert!(matches!(
            resolver.resolve_reference(&reference, &mut trace),
            Err(Error::UnresolvableReference { .. })
        ));
    }
}
