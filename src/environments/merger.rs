//! Overlay chain discovery and merging.
//!
//! # Responsibilities
//! - Discover the ordered overlay chain for an endpoint path
//! - Deep-merge overlays, least specific first
//! - Cache merged environments per path (single-flight population)
//!
//! # Design Decisions
//! - Mappings merge recursively; sequences and scalars are replaced wholly
//!   by the more specific overlay. This asymmetry is the documented contract
//!   for predictable overrides.
//! - The cached value keeps references unresolved; resolution happens per
//!   request, inside the authorization boundary.
//! - Cache entries are populated under the map's shard lock, so concurrent
//!   first requests for one path compute the merge at most once.

use std::sync::Arc;

use dashmap::DashMap;
use serde_yaml::Value;

use crate::documents::{DirKind, DocumentStore};
use crate::environments::overlay::{EffectiveEnvironment, OverlayShape};
use crate::errors::Error;

/// Filename suffix that marks a file as an overlay rather than an endpoint.
pub const OVERLAY_SUFFIX: &str = "scs-env.yaml";

/// Relative paths of every overlay that can apply to the endpoint at
/// `relative_path`, ordered root → most specific.
pub fn overlay_chain(relative_path: &str) -> Vec<String> {
    let mut chain = vec![OVERLAY_SUFFIX.to_string()];
    let parts: Vec<&str> = relative_path.split('/').collect();
    let mut base = String::new();
    for part in &parts[..parts.len().saturating_sub(1)] {
        base.push_str(part);
        base.push('/');
        chain.push(format!("{base}{OVERLAY_SUFFIX}"));
    }
    chain.push(format!("{relative_path}.{OVERLAY_SUFFIX}"));
    chain
}

/// Merge two values: mappings merge recursively by key, anything else is
/// replaced by the right (more specific) value.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Mapping(mut base_map), Value::Mapping(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Mapping(base_map)
        }
        (_, overlay) => overlay,
    }
}

/// Discovers and merges the overlay chain for endpoint paths.
pub struct EnvironmentMerger {
    store: Arc<DocumentStore>,
    cache: Option<DashMap<String, Arc<Value>>>,
}

impl EnvironmentMerger {
    /// Create a merger; `cache_enabled` controls whether merge results are
    /// reused across requests.
    pub fn new(store: Arc<DocumentStore>, cache_enabled: bool) -> Self {
        Self {
            store,
            cache: cache_enabled.then(DashMap::new),
        }
    }

    /// The merged (still unresolved) environment for an endpoint path.
    pub fn effective(&self, relative_path: &str) -> Result<Arc<Value>, Error> {
        let Some(cache) = &self.cache else {
            return Ok(Arc::new(self.compute(relative_path)?));
        };
        match cache.entry(relative_path.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(entry) => Ok(entry.get().clone()),
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                let merged = Arc::new(self.compute(relative_path)?);
                entry.insert(merged.clone());
                Ok(merged)
            }
        }
    }

    fn compute(&self, relative_path: &str) -> Result<Value, Error> {
        let mut merged = Value::Mapping(serde_yaml::Mapping::new());
        for overlay_path in overlay_chain(relative_path) {
            if !self.store.exists(DirKind::Config, &overlay_path) {
                continue;
            }
            let overlay = self.load_overlay(&overlay_path)?;
            merged = deep_merge(merged, overlay);
        }
        Ok(merged)
    }

    fn load_overlay(&self, overlay_path: &str) -> Result<Value, Error> {
        let raw = self.store.load(DirKind::Config, overlay_path)?;
        let shape: OverlayShape =
            serde_yaml::from_value(Value::clone(&raw)).map_err(|e| Error::EnvFormat {
                path: overlay_path.to_string(),
                detail: e.to_string(),
            })?;
        if shape.is_empty() {
            return Err(Error::EnvFormat {
                path: overlay_path.to_string(),
                detail: "overlay has no effective keys".to_string(),
            });
        }
        Ok(Value::clone(&raw))
    }

    /// Deserialize a merged (and by then resolved) environment value into
    /// its typed form, applying schema defaults.
    pub fn typed(relative_path: &str, merged: Value) -> Result<EffectiveEnvironment, Error> {
        serde_yaml::from_value(merged).map_err(|e| Error::EnvFormat {
            path: relative_path.to_string(),
            detail: e.to_string(),
        })
    }
}
