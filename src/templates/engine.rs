//! Template compilation and rendering.
//!
//! # Responsibilities
//! - Maintain the global rendering options from the server configuration
//! - Apply per-endpoint rendering-option overrides
//! - Cache compiled templates per endpoint path (context varies per request,
//!   compilation is reused)
//!
//! # Design Decisions
//! - The template language itself is a black box (minijinja); this module
//!   only maps recognized option keys onto it. Unrecognized keys are logged
//!   and ignored.
//! - Endpoints with option overrides render through a fresh engine, since
//!   options are fixed at engine level; only override-free endpoints hit the
//!   compiled-template cache.

use std::path::PathBuf;
use std::sync::Mutex;

use minijinja::{Environment, UndefinedBehavior};
use serde_yaml::Mapping;

use crate::errors::Error;

/// Rendering options recognized by the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Remove the newline after a block tag.
    pub trim_blocks: bool,
    /// Strip leading whitespace before a block tag.
    pub lstrip_blocks: bool,
    /// Keep a single trailing newline at the end of the template.
    pub keep_trailing_newline: bool,
    /// Fail rendering on undefined variables instead of emitting nothing.
    pub strict_undefined: bool,
}

impl RenderOptions {
    /// Apply overrides from a rendering-options mapping. Unknown keys and
    /// non-boolean values are logged at WARN and ignored.
    pub fn with_overrides(mut self, options: &Mapping) -> Self {
        for (key, value) in options {
            let (Some(name), Some(enabled)) = (key.as_str(), value.as_bool()) else {
                tracing::warn!(option = ?key, "Ignoring malformed rendering option");
                continue;
            };
            match name {
                "trim_blocks" => self.trim_blocks = enabled,
                "lstrip_blocks" => self.lstrip_blocks = enabled,
                "keep_trailing_newline" => self.keep_trailing_newline = enabled,
                "strict_undefined" => self.strict_undefined = enabled,
                other => {
                    tracing::warn!(option = other, "Ignoring unrecognized rendering option");
                }
            }
        }
        self
    }
}

/// Renders endpoint bodies with per-endpoint options and a compiled cache.
pub struct TemplateEngine {
    config_root: PathBuf,
    defaults: RenderOptions,
    cache: Option<Mutex<Environment<'static>>>,
}

impl TemplateEngine {
    /// Create an engine rooted at the config directory with the global
    /// default rendering options.
    pub fn new(config_root: PathBuf, default_options: &Mapping, cache_enabled: bool) -> Self {
        let defaults = RenderOptions::default().with_overrides(default_options);
        let cache = cache_enabled.then(|| Mutex::new(build_environment(defaults)));
        Self {
            config_root,
            defaults,
            cache,
        }
    }

    /// Read the raw bytes of an endpoint body.
    pub fn endpoint_source(&self, relative_path: &str) -> Result<Vec<u8>, Error> {
        let path = self.config_root.join(relative_path);
        std::fs::read(&path).map_err(|source| Error::Io { path, source })
    }

    /// Render the endpoint at `relative_path` with the given context.
    ///
    /// `endpoint_options` come from the effective environment and override
    /// the global defaults (mapping-merge precedence).
    pub fn render(
        &self,
        relative_path: &str,
        endpoint_options: &Mapping,
        context: &serde_json::Value,
    ) -> Result<String, Error> {
        if endpoint_options.is_empty() {
            if let Some(cache) = &self.cache {
                return self.render_cached(cache, relative_path, context);
            }
        }

        let options = self.defaults.with_overrides(endpoint_options);
        let mut environment = build_environment(options);
        let source = self.template_source(relative_path)?;
        add_template(&mut environment, relative_path, source)?;
        render_template(&environment, relative_path, context)
    }

    fn render_cached(
        &self,
        cache: &Mutex<Environment<'static>>,
        relative_path: &str,
        context: &serde_json::Value,
    ) -> Result<String, Error> {
        let mut environment = cache.lock().unwrap_or_else(|e| e.into_inner());
        if environment.get_template(relative_path).is_err() {
            let source = self.template_source(relative_path)?;
            add_template(&mut environment, relative_path, source)?;
        }
        render_template(&environment, relative_path, context)
    }

    fn template_source(&self, relative_path: &str) -> Result<String, Error> {
        let bytes = self.endpoint_source(relative_path)?;
        String::from_utf8(bytes).map_err(|_| Error::EnvFormat {
            path: relative_path.to_string(),
            detail: "template body is not valid UTF-8".to_string(),
        })
    }
}

fn build_environment(options: RenderOptions) -> Environment<'static> {
    let mut environment = Environment::new();
    environment.set_trim_blocks(options.trim_blocks);
    environment.set_lstrip_blocks(options.lstrip_blocks);
    environment.set_keep_trailing_newline(options.keep_trailing_newline);
    environment.set_undefined_behavior(if options.strict_undefined {
        UndefinedBehavior::Strict
    } else {
        UndefinedBehavior::Lenient
    });
    environment
}

fn add_template(
    environment: &mut Environment<'static>,
    relative_path: &str,
    source: String,
) -> Result<(), Error> {
    environment
        .add_template_owned(relative_path.to_string(), source)
        .map_err(|source| Error::TemplateRender {
            path: relative_path.to_string(),
            source,
        })
}

fn render_template(
    environment: &Environment<'static>,
    relative_path: &str,
    context: &serde_json::Value,
) -> Result<String, Error> {
    let template =
        environment
            .get_template(relative_path)
            .map_err(|source| Error::TemplateRender {
                path: relative_path.to_string(),
                source,
            })?;
    template.render(context).map_err(|source| Error::TemplateRender {
        path: relative_path.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn engine(dir: &std::path::Path, defaults: &str, cache: bool) -> TemplateEngine {
        let options: Mapping = serde_yaml::from_str(defaults).unwrap();
        TemplateEngine::new(dir.to_path_buf(), &options, cache)
    }

    fn ctx(text: &str) -> serde_json::Value {
        serde_json::from_str(text).unwrap()
    }

    #[test]
    fn test_render_basic() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("greeting"), "hello {{ name }}").unwrap();
        let engine = engine(tmp.path(), "{}", true);

        let out = engine
            .render("greeting", &Mapping::new(), &ctx(r#"{"name":"world"}"#))
            .unwrap();
        assert_eq!(out, "hello world");
    }

    #[test]
    fn test_render_idempotent_with_cache() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("cfg"), "v={{ v }}").unwrap();
        let engine = engine(tmp.path(), "{}", true);

        let first = engine
            .render("cfg", &Mapping::new(), &ctx(r#"{"v":"1"}"#))
            .unwrap();
        // The compiled template is reused even after the file changes.
        fs::write(tmp.path().join("cfg"), "changed").unwrap();
        let second = engine
            .render("cfg", &Mapping::new(), &ctx(r#"{"v":"1"}"#))
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_syntax_error_classified() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("broken"), "{% if %}").unwrap();
        let engine = engine(tmp.path(), "{}", false);

        let err = engine
            .render("broken", &Mapping::new(), &ctx("{}"))
            .unwrap_err();
        assert!(matches!(err, Error::TemplateRender { .. }));
    }

    #[test]
    fn test_strict_undefined_option() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("cfg"), "{{ missing }}").unwrap();
        let engine = engine(tmp.path(), "{}", false);

        // Lenient by default.
        assert!(engine.render("cfg", &Mapping::new(), &ctx("{}")).is_ok());

        let strict: Mapping = serde_yaml::from_str("strict_undefined: true\n").unwrap();
        let err = engine.render("cfg", &strict, &ctx("{}")).unwrap_err();
        assert!(matches!(err, Error::TemplateRender { .. }));
    }

    #[test]
    fn test_endpoint_override_beats_global_default() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("cfg"), "line\n").unwrap();
        // Globally keep the trailing newline, endpoint turns it off.
        let engine = engine(tmp.path(), "keep_trailing_newline: true\n", true);

        let global = engine.render("cfg", &Mapping::new(), &ctx("{}")).unwrap();
        assert_eq!(global, "line\n");

        let overrides: Mapping =
            serde_yaml::from_str("keep_trailing_newline: false\n").unwrap();
        let overridden = engine.render("cfg", &overrides, &ctx("{}")).unwrap();
        assert_eq!(overridden, "line");
    }
}
