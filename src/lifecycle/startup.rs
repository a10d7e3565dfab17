//! Startup orchestration and validation.
//!
//! # Responsibilities
//! - Enumerate every endpoint under the config directory
//! - Sweep common and secrets documents for unaddressable keys
//! - Merge, resolve, and render every endpoint once before serving
//!
//! # Design Decisions
//! - Endpoints whose rendering depends on request-supplied values fail the
//!   pre-render under strict undefined handling; disable
//!   `templates.validate_on_startup` only when that trade-off is wanted.

use std::path::{Path, PathBuf};

use crate::config::{ConfigError, ServerConfig};
use crate::documents::store::contains_dotted_keys;
use crate::environments::merger::OVERLAY_SUFFIX;
use crate::environments::EnvironmentMerger;
use crate::http::AppState;
use crate::references::Resolution;
use crate::templates::build_context;

/// Relative paths of every endpoint file under `config_root`, overlay
/// files excluded.
pub fn enumerate_endpoints(config_root: &Path) -> std::io::Result<Vec<String>> {
    let mut endpoints = Vec::new();
    walk(config_root, config_root, &mut endpoints)?;
    endpoints.sort();
    Ok(endpoints)
}

fn walk(root: &Path, dir: &Path, endpoints: &mut Vec<String>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            walk(root, &path, endpoints)?;
            continue;
        }
        let Some(relative) = relative_str(root, &path) else {
            continue;
        };
        if relative.ends_with(OVERLAY_SUFFIX) {
            continue;
        }
        endpoints.push(relative);
    }
    Ok(())
}

fn relative_str(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in relative.components() {
        parts.push(component.as_os_str().to_str()?.to_string());
    }
    Some(parts.join("/"))
}

/// Validate every document and endpoint before traffic is accepted.
pub fn validate_startup(config: &ServerConfig, state: &AppState) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    if config.environments.reject_keys_containing_dots {
        sweep_dotted_keys(&config.directories.common, &mut errors);
        if let Some(secrets) = &config.directories.secrets {
            sweep_dotted_keys(secrets, &mut errors);
        }
    }

    let endpoints = enumerate_endpoints(&config.directories.config).map_err(ConfigError::Io)?;
    for endpoint in &endpoints {
        if let Err(detail) = validate_endpoint(config, state, endpoint) {
            errors.push(format!("{endpoint}: {detail}"));
        }
    }

    if errors.is_empty() {
        tracing::info!(endpoints = endpoints.len(), "Startup validation passed");
        Ok(())
    } else {
        Err(ConfigError::Validation(errors))
    }
}

fn validate_endpoint(
    config: &ServerConfig,
    state: &AppState,
    endpoint: &str,
) -> Result<(), String> {
    let merged = state
        .merger
        .effective(endpoint)
        .map_err(|err| err.to_string())?;
    let mut trace = Resolution::new();
    let resolved = state
        .resolver
        .resolve(&merged, &mut trace)
        .map_err(|err| err.to_string())?;
    let env = EnvironmentMerger::typed(endpoint, resolved).map_err(|err| err.to_string())?;

    if let Some(schema) = &env.request.schema {
        let schema_json = serde_json::to_value(schema)
            .map_err(|err| format!("request schema is not valid JSON: {err}"))?;
        jsonschema::validator_for(&schema_json)
            .map_err(|err| format!("request schema does not compile: {err}"))?;
    }

    if env.template.enabled && config.templates.validate_on_startup {
        let context =
            build_context(&env.template.context, None).map_err(|err| err.to_string())?;
        state
            .engine
            .render(
                endpoint,
                &env.template.rendering_options,
                &serde_json::Value::Object(context),
            )
            .map_err(|err| err.to_string())?;
    }

    Ok(())
}

/// Parse every YAML document under `dir` and reject mapping keys with
/// embedded dots, which reference fragments cannot address.
fn sweep_dotted_keys(dir: &Path, errors: &mut Vec<String>) {
    let mut files = Vec::new();
    if let Err(err) = collect_files(dir, &mut files) {
        errors.push(format!("cannot list {}: {err}", dir.display()));
        return;
    }
    for file in files {
        let content = match std::fs::read_to_string(&file) {
            Ok(content) => content,
            Err(err) => {
                errors.push(format!("cannot read {}: {err}", file.display()));
                continue;
            }
        };
        match serde_yaml::from_str::<serde_yaml::Value>(&content) {
            Ok(value) => {
                if contains_dotted_keys(&value) {
                    errors.push(format!(
                        "{} has variable names containing dots",
                        file.display()
                    ));
                }
            }
            Err(err) => {
                errors.push(format!("cannot parse {}: {err}", file.display()));
            }
        }
    }
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, files)?;
        } else {
            files.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn state_for(dir: &Path) -> (ServerConfig, AppState) {
        let mut config = ServerConfig::default();
        config.directories.config = dir.join("config");
        config.directories.common = dir.join("common");
        config.auth.users_file = dir.join("scs-users.yaml");
        fs::create_dir_all(&config.directories.config).unwrap();
        fs::create_dir_all(&config.directories.common).unwrap();
        fs::write(&config.auth.users_file, "[]\n").unwrap();
        let state = AppState::from_config(&config).unwrap();
        (config, state)
    }

    #[test]
    fn test_enumerate_skips_overlays() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("db")).unwrap();
        fs::write(root.join("scs-env.yaml"), "").unwrap();
        fs::write(root.join("db/scs-env.yaml"), "").unwrap();
        fs::write(root.join("db/primary.yml"), "").unwrap();
        fs::write(root.join("db/primary.yml.scs-env.yaml"), "").unwrap();
        fs::write(root.join("motd"), "").unwrap();

        let endpoints = enumerate_endpoints(root).unwrap();
        assert_eq!(endpoints, vec!["db/primary.yml", "motd"]);
    }

    #[test]
    fn test_validation_passes_for_well_formed_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let (config, state) = state_for(tmp.path());
        fs::write(
            config.directories.config.join("greeting"),
            "hello {{ name }}\n",
        )
        .unwrap();
        fs::write(
            config.directories.config.join("greeting.scs-env.yaml"),
            "template:\n  context:\n    name: world\n",
        )
        .unwrap();

        validate_startup(&config, &state).unwrap();
    }

    #[test]
    fn test_validation_rejects_broken_template() {
        let tmp = tempfile::tempdir().unwrap();
        let (config, state) = state_for(tmp.path());
        fs::write(
            config.directories.config.join("broken"),
            "{% if unclosed %}\n",
        )
        .unwrap();
        fs::write(
            config.directories.config.join("broken.scs-env.yaml"),
            "template:\n  context:\n    unclosed: true\n",
        )
        .unwrap();

        let result = validate_startup(&config, &state);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_validation_rejects_dotted_keys_in_common() {
        let tmp = tempfile::tempdir().unwrap();
        let (config, state) = state_for(tmp.path());
        fs::write(
            config.directories.common.join("hosts.yaml"),
            "db.local: 10.0.0.5\n",
        )
        .unwrap();

        let result = validate_startup(&config, &state);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }
}
