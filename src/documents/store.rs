//! The document store.
//!
//! # Responsibilities
//! - Load parsed YAML documents from the config, common, and secrets trees
//! - Cache parsed documents (toggleable, for interactive config editing)
//! - Reject path traversal before touching the filesystem
//! - Validate that mapping keys contain no dots (fragment addressability)
//! - Rewrite `!scs-gen-secret` nodes in secrets files and resave them
//!
//! # Design Decisions
//! - Documents are immutable once loaded; the gen-secret resave is the only
//!   mutation path and runs under a store-level lock, serialized against
//!   concurrent loads of the same tree.
//! - Raw endpoint bodies are read as bytes, not parsed; only overlays and
//!   referenced documents go through the YAML parser.

use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_yaml::Value;

use crate::errors::Error;
use crate::references::tag_name;

/// Which of the three directory trees a document lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirKind {
    /// Endpoint files and scs-env.yaml overlays.
    Config,
    /// Documents addressable through !scs-common references.
    Common,
    /// Documents addressable through !scs-secret references.
    Secrets,
}

impl DirKind {
    fn label(self) -> &'static str {
        match self {
            DirKind::Config => "config",
            DirKind::Common => "common",
            DirKind::Secrets => "secrets",
        }
    }
}

/// Loads and caches parsed YAML documents from the three directory trees.
pub struct DocumentStore {
    config_dir: PathBuf,
    common_dir: PathBuf,
    secrets_dir: Option<PathBuf>,
    cache_enabled: bool,
    reject_dotted_keys: bool,
    cache: DashMap<(DirKind, String), Arc<Value>>,
    resave_lock: Mutex<()>,
}

impl DocumentStore {
    /// Create a store over the given directory roots.
    pub fn new(
        config_dir: PathBuf,
        common_dir: PathBuf,
        secrets_dir: Option<PathBuf>,
        cache_enabled: bool,
        reject_dotted_keys: bool,
    ) -> Self {
        Self {
            config_dir,
            common_dir,
            secrets_dir,
            cache_enabled,
            reject_dotted_keys,
            cache: DashMap::new(),
            resave_lock: Mutex::new(()),
        }
    }

    fn root(&self, kind: DirKind) -> Result<&Path, Error> {
        match kind {
            DirKind::Config => Ok(&self.config_dir),
            DirKind::Common => Ok(&self.common_dir),
            DirKind::Secrets => self.secrets_dir.as_deref().ok_or_else(|| {
                Error::UnresolvableReference {
                    reference: "secrets directory is not configured".to_string(),
                }
            }),
        }
    }

    /// Resolve a relative path inside a tree, rejecting traversal.
    pub fn full_path(&self, kind: DirKind, relative: &str) -> Result<PathBuf, Error> {
        let rel = Path::new(relative);
        let traverses = rel.components().any(|c| {
            matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_))
        });
        if traverses {
            return Err(Error::UnresolvableReference {
                reference: format!("{}:{relative}", kind.label()),
            });
        }
        Ok(self.root(kind)?.join(rel))
    }

    /// Whether a file exists at the given relative path inside a tree.
    pub fn exists(&self, kind: DirKind, relative: &str) -> bool {
        self.full_path(kind, relative)
            .map(|p| p.is_file())
            .unwrap_or(false)
    }

    /// The root of the config tree.
    pub fn config_root(&self) -> &Path {
        &self.config_dir
    }

    /// Load a parsed YAML document by tree and relative path.
    ///
    /// Secrets documents pass through the gen-secret rewrite before being
    /// returned; common and secrets documents are checked for dotted mapping
    /// keys when that validation is enabled.
    pub fn load(&self, kind: DirKind, relative: &str) -> Result<Arc<Value>, Error> {
        let key = (kind, relative.to_string());
        if self.cache_enabled {
            if let Some(doc) = self.cache.get(&key) {
                return Ok(doc.clone());
            }
        }

        let doc = Arc::new(self.load_uncached(kind, relative)?);
        if self.cache_enabled {
            self.cache.insert(key, doc.clone());
        }
        Ok(doc)
    }

    fn load_uncached(&self, kind: DirKind, relative: &str) -> Result<Value, Error> {
        let path = self.full_path(kind, relative)?;
        if !path.is_file() {
            return Err(Error::UnresolvableReference {
                reference: format!("{}:{relative}", kind.label()),
            });
        }
        let content = std::fs::read_to_string(&path).map_err(|source| Error::Io {
            path: path.clone(),
            source,
        })?;
        let mut value: Value =
            serde_yaml::from_str(&content).map_err(|source| Error::YamlSyntax {
                path: path.clone(),
                source,
            })?;

        if kind == DirKind::Secrets {
            self.rewrite_generated_secrets(&path, &mut value)?;
        }
        if self.reject_dotted_keys
            && kind != DirKind::Config
            && contains_dotted_keys(&value)
        {
            return Err(Error::DottedKey { path });
        }

        Ok(value)
    }

    /// Read the raw bytes of an endpoint file from the config tree.
    pub fn read_endpoint(&self, relative: &str) -> Result<Vec<u8>, Error> {
        let path = self.full_path(DirKind::Config, relative)?;
        std::fs::read(&path).map_err(|source| Error::Io { path, source })
    }

    /// Replace `!scs-gen-secret` nodes with freshly generated tokens and
    /// resave the file when any were present. Writes are serialized through
    /// the store lock; this path only runs for secrets documents.
    fn rewrite_generated_secrets(&self, path: &Path, value: &mut Value) -> Result<(), Error> {
        if !generate_secrets(value) {
            return Ok(());
        }
        let _guard = self.resave_lock.lock().unwrap_or_else(|e| e.into_inner());
        let serialized = serde_yaml::to_string(value).map_err(|source| Error::YamlSyntax {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, serialized).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), "Generated secrets persisted");
        Ok(())
    }
}

/// Replace every `!scs-gen-secret` node in place. Returns true if any node
/// was replaced.
fn generate_secrets(value: &mut Value) -> bool {
    match value {
        Value::Tagged(tagged) if tag_name(&tagged.tag) == "scs-gen-secret" => {
            *value = Value::String(generate_token());
            true
        }
        Value::Mapping(mapping) => {
            let mut changed = false;
            for (_, v) in mapping.iter_mut() {
                changed |= generate_secrets(v);
            }
            changed
        }
        Value::Sequence(items) => {
            let mut changed = false;
            for item in items.iter_mut() {
                changed |= generate_secrets(item);
            }
            changed
        }
        _ => false,
    }
}

fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let len = rng.gen_range(32..=64);
    (&mut rng)
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Whether any mapping key in the document contains a literal dot.
pub fn contains_dotted_keys(value: &Value) -> bool {
    match value {
        Value::Mapping(mapping) => mapping.iter().any(|(k, v)| {
            matches!(k, Value::String(s) if s.contains('.')) || contains_dotted_keys(v)
        }),
        Value::Sequence(items) => items.iter().any(contains_dotted_keys),
        Value::Tagged(tagged) => contains_dotted_keys(&tagged.value),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn store(dir: &Path, cache: bool) -> DocumentStore {
        DocumentStore::new(
            dir.join("config"),
            dir.join("common"),
            Some(dir.join("secrets")),
            cache,
            true,
        )
    }

    fn setup(dir: &Path) {
        for sub in ["config", "common", "secrets"] {
            fs::create_dir_all(dir.join(sub)).unwrap();
        }
    }

    #[test]
    fn test_load_and_cache() {
        let tmp = tempfile::tempdir().unwrap();
        setup(tmp.path());
        fs::write(tmp.path().join("common/global.yaml"), "name: scs\n").unwrap();

        let store = store(tmp.path(), true);
        let doc = store.load(DirKind::Common, "global.yaml").unwrap();
        assert_eq!(doc.get("name").unwrap().as_str(), Some("scs"));

        // A second load must come from the cache even if the file changes.
        fs::write(tmp.path().join("common/global.yaml"), "name: other\n").unwrap();
        let doc = store.load(DirKind::Common, "global.yaml").unwrap();
        assert_eq!(doc.get("name").unwrap().as_str(), Some("scs"));
    }

    #[test]
    fn test_traversal_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        setup(tmp.path());
        let store = store(tmp.path(), true);
        assert!(store.load(DirKind::Common, "../secrets/db.yaml").is_err());
        assert!(!store.exists(DirKind::Config, "../x"));
    }

    #[test]
    fn test_dotted_keys_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        setup(tmp.path());
        fs::write(tmp.path().join("common/bad.yaml"), "a.b: 1\n").unwrap();

        let store = store(tmp.path(), false);
        let err = store.load(DirKind::Common, "bad.yaml").unwrap_err();
        assert!(matches!(err, Error::DottedKey { .. }));
    }

    #[test]
    fn test_gen_secret_rewrites_file() {
        let tmp = tempfile::tempdir().unwrap();
        setup(tmp.path());
        let secret_file = tmp.path().join("secrets/app.yaml");
        fs::write(&secret_file, "password: !scs-gen-secret ''\n").unwrap();

        let store = store(tmp.path(), false);
        let doc = store.load(DirKind::Secrets, "app.yaml").unwrap();
        let generated = doc.get("password").unwrap().as_str().unwrap().to_string();
        assert!(generated.len() >= 32);

        // The file on disk now carries the generated value and reloads to
        // the same token.
        let on_disk = fs::read_to_string(&secret_file).unwrap();
        assert!(on_disk.contains(&generated));
        let doc = store.load(DirKind::Secrets, "app.yaml").unwrap();
        assert_eq!(doc.get("password").unwrap().as_str().unwrap(), generated);
    }

    #[test]
    fn test_missing_document_is_unresolvable() {
        let tmp = tempfile::tempdir().unwrap();
        setup(tmp.path());
        let store = store(tmp.path(), true);
        let err = store.load(DirKind::Common, "absent.yaml").unwrap_err();
        assert!(matches!(err, Error::UnresolvableReference { .. }));
    }
}
