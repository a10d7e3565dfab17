//! HTTP server setup and the request pipeline.
//!
//! # Responsibilities
//! - Create the Axum router for the `/configs/` tree
//! - Wire up middleware (tracing, timeout, body limit, request ID)
//! - Authorize each request before any document is touched
//! - Resolve the effective environment, render, and shape the response
//!
//! # Pipeline
//! ```text
//! source whitelist → rate limit → credential → identity networks
//!     → path patterns → existence checks → effective environment
//!     → method check → body validation → reference resolution
//!     → render → response shaping → audit
//! ```
//! Resolution happens after authorization, so a secret is only ever read
//! on behalf of an identity allowed to see the endpoint that uses it.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Bytes;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::audit::{self, AuditEvent};
use crate::config::{ConfigError, ServerConfig};
use crate::documents::{DirKind, DocumentStore};
use crate::environments::merger::OVERLAY_SUFFIX;
use crate::environments::{EffectiveEnvironment, EnvironmentMerger};
use crate::http::error::ApiError;
use crate::http::request::request_id;
use crate::observability::metrics;
use crate::references::{ReferenceResolver, Resolution, TagRegistry};
use crate::security::{AccessController, AccessDecision, NetworkWhitelist, RateLimiter};
use crate::templates::{build_context, TemplateEngine};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<DocumentStore>,
    pub merger: Arc<EnvironmentMerger>,
    pub resolver: Arc<ReferenceResolver>,
    pub engine: Arc<TemplateEngine>,
    pub access: Arc<AccessController>,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    /// Build all subsystems from the loaded configuration.
    pub fn from_config(config: &ServerConfig) -> Result<Self, ConfigError> {
        let store = Arc::new(DocumentStore::new(
            config.directories.config.clone(),
            config.directories.common.clone(),
            config.directories.secrets.clone(),
            config.environments.cache,
            config.environments.reject_keys_containing_dots,
        ));
        let registry = TagRegistry::from_config(&config.extensions.constructors)?;
        let resolver = Arc::new(ReferenceResolver::new(store.clone(), registry));
        let merger = Arc::new(EnvironmentMerger::new(
            store.clone(),
            config.environments.cache,
        ));
        let engine = Arc::new(TemplateEngine::new(
            config.directories.config.clone(),
            &config.templates.rendering_options,
            config.templates.cache,
        ));

        let whitelist = NetworkWhitelist::parse(
            &config.auth.networks.whitelist,
            config.auth.networks.private_only,
        )
        .map_err(|detail| ConfigError::Validation(vec![detail]))?;
        let access = Arc::new(AccessController::load(
            &config.auth.users_file,
            whitelist,
            config.auth.networks.private_only,
            &resolver,
        )?);
        let limiter = Arc::new(RateLimiter::new(config.auth.max_auth_fails_per_15_min));

        Ok(Self {
            store,
            merger,
            resolver,
            engine,
            access,
            limiter,
        })
    }
}

/// HTTP server for the configuration endpoints.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a server over the given state.
    pub fn new(config: &ServerConfig, state: AppState) -> Self {
        Self {
            router: Self::build_router(config, state),
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ServerConfig, state: AppState) -> Router {
        Router::new()
            .route("/configs/{*path}", any(configs_handler))
            .with_state(state)
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                Duration::from_secs(config.listener.request_timeout_secs),
            ))
            .layer(RequestBodyLimitLayer::new(config.listener.max_body_size))
            .layer(axum::middleware::from_fn(request_id))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Handler for the `/configs/` tree.
async fn configs_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(path): Path<String>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let start = Instant::now();
    let source = addr.ip();
    let method_str = method.to_string();

    let response = serve_config(&state, source, &path, &method, &headers, &body)
        .await
        .unwrap_or_else(IntoResponse::into_response);

    metrics::record_request(&method_str, response.status().as_u16(), start);
    response
}

async fn serve_config(
    state: &AppState,
    source: std::net::IpAddr,
    path: &str,
    method: &Method,
    headers: &HeaderMap,
    body: &Bytes,
) -> Result<Response, ApiError> {
    // Sources outside the global whitelist are refused before anything
    // else runs, including the rate limiter.
    if !state.access.source_allowed(source) {
        return Err(ApiError::unauthorized_ip());
    }

    let full_path = format!("/configs/{path}");

    if state.limiter.is_limited(source) {
        audit::record(AuditEvent::RateLimited {
            source,
            path: &full_path,
        });
        return Err(ApiError::rate_limited());
    }

    let token = bearer_token(headers);
    let identity = match state.access.authorize(token, source, &full_path) {
        AccessDecision::Allowed { identity } => identity,
        AccessDecision::Unauthenticated => {
            state.limiter.record_failure(source);
            metrics::record_auth_failure();
            audit::record(AuditEvent::Unauthenticated {
                source,
                path: &full_path,
            });
            return Err(ApiError::unauthenticated());
        }
        AccessDecision::UnauthorizedIp { identity } => {
            audit::record(AuditEvent::UnauthorizedIp {
                identity: &identity,
                source,
                path: &full_path,
            });
            return Err(ApiError::unauthorized_ip());
        }
        AccessDecision::UnauthorizedPath { identity } => {
            audit::record(AuditEvent::UnauthorizedPath {
                identity: &identity,
                source,
                path: &full_path,
            });
            return Err(ApiError::unauthorized_path());
        }
    };

    // Overlay files and anything escaping the config root are not
    // endpoints; both hide behind a plain 404.
    if path.split('/').any(|part| part == "..") || path.ends_with(OVERLAY_SUFFIX) {
        return Err(ApiError::not_found());
    }
    if !state.store.exists(DirKind::Config, path) {
        return Err(ApiError::not_found());
    }

    let merged = state.merger.effective(path).map_err(|err| {
        tracing::error!(path, error = %err, "Failed to merge environment overlays");
        ApiError::from(&err)
    })?;

    let mut trace = Resolution::new();
    let resolved = state
        .resolver
        .resolve(&merged, &mut trace)
        .map_err(|err| {
            tracing::error!(path, error = %err, "Failed to resolve environment references");
            ApiError::from(&err)
        })?;
    let env = EnvironmentMerger::typed(path, resolved).map_err(|err| {
        tracing::error!(path, error = %err, "Merged environment has invalid format");
        ApiError::from(&err)
    })?;

    if !method_allowed(method, &env.request.methods) {
        return Err(ApiError::method_not_allowed());
    }

    let body_map = match *method {
        Method::POST => Some(validated_body(body, &env)?),
        _ => None,
    };

    let context = build_context(&env.template.context, body_map.as_ref()).map_err(|err| {
        tracing::error!(path, error = %err, "Failed to build rendering context");
        ApiError::from(&err)
    })?;

    let body_bytes = if env.template.enabled {
        let rendered = state
            .engine
            .render(
                path,
                &env.template.rendering_options,
                &serde_json::Value::Object(context),
            )
            .map_err(|err| {
                tracing::error!(path, error = %err, "Template rendering failed");
                ApiError::from(&err)
            })?;
        rendered.into_bytes()
    } else {
        state.store.read_endpoint(path).map_err(|err| {
            tracing::error!(path, error = %err, "Failed to read endpoint body");
            ApiError::from(&err)
        })?
    };

    audit::record(AuditEvent::ConfigLoaded {
        identity: &identity,
        source,
        path: &full_path,
    });
    let secrets = trace.secrets_used();
    if !secrets.is_empty() {
        metrics::record_secrets_served(secrets.len());
        audit::record(AuditEvent::SecretsLoaded {
            identity: &identity,
            source,
            path: &full_path,
            secret_ids: &secrets,
        });
    }

    shape_response(&env, method, body_bytes)
}

/// Extract the bearer credential from the Authorization header.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// HEAD is accepted wherever GET is, per HTTP semantics.
fn method_allowed(method: &Method, allowed: &[String]) -> bool {
    let name = if *method == Method::HEAD {
        Method::GET
    } else {
        method.clone()
    };
    allowed.iter().any(|m| m.eq_ignore_ascii_case(name.as_str()))
}

/// Parse and, when a schema is configured, validate a POST body. The body
/// must be a JSON object so its keys can join the rendering context.
fn validated_body(
    body: &Bytes,
    env: &EffectiveEnvironment,
) -> Result<serde_json::Map<String, serde_json::Value>, ApiError> {
    let parsed: serde_json::Value = serde_json::from_slice(body)
        .map_err(|_| ApiError::bad_request("The request body is not valid JSON"))?;

    if let Some(schema) = &env.request.schema {
        let schema_json = serde_json::to_value(schema).map_err(|err| {
            tracing::error!(error = %err, "Configured request schema is not valid JSON");
            ApiError::internal()
        })?;
        let validator = jsonschema::validator_for(&schema_json).map_err(|err| {
            tracing::error!(error = %err, "Configured request schema failed to compile");
            ApiError::internal()
        })?;
        // The schema passed through reference resolution, so violation text
        // can cite resolved values. Full detail goes to the log only.
        if let Err(violation) = validator.validate(&parsed) {
            tracing::warn!(error = %violation, "Request body failed schema validation");
            return Err(ApiError::request_body_invalid(
                "The request body does not match the schema configured for this endpoint",
            ));
        }
    }

    match parsed {
        serde_json::Value::Object(map) => Ok(map),
        _ => Err(ApiError::bad_request(
            "The request body must be a JSON object",
        )),
    }
}

/// Apply the configured status and headers. Headers from the environment
/// replace the default content type; a HEAD response keeps the headers and
/// drops the body.
fn shape_response(
    env: &EffectiveEnvironment,
    method: &Method,
    body: Vec<u8>,
) -> Result<Response, ApiError> {
    let status = StatusCode::from_u16(env.response.status).map_err(|_| {
        tracing::error!(status = env.response.status, "Configured status code is invalid");
        ApiError::internal()
    })?;

    let mut response = if *method == Method::HEAD {
        status.into_response()
    } else {
        (status, body).into_response()
    };

    if env.response.headers.is_empty() {
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
    } else {
        for (name, value) in &env.response.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                tracing::error!(header = name.as_str(), "Configured header name is invalid");
                ApiError::internal()
            })?;
            let value = HeaderValue::from_str(value).map_err(|_| {
                tracing::error!(header = %name, "Configured header value is invalid");
                ApiError::internal()
            })?;
            response.headers_mut().insert(name, value);
        }
    }

    Ok(response)
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to install Ctrl+C handler");
        return;
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc123"),
        );
        assert_eq!(bearer_token(&headers), Some("abc123"));

        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Basic abc123"),
        );
        assert_eq!(bearer_token(&headers), None);

        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_method_allowed_treats_head_as_get() {
        let allowed = vec!["GET".to_string()];
        assert!(method_allowed(&Method::GET, &allowed));
        assert!(method_allowed(&Method::HEAD, &allowed));
        assert!(!method_allowed(&Method::POST, &allowed));
    }

    #[test]
    fn test_post_body_must_be_object() {
        let env = EffectiveEnvironment::default();
        let err = validated_body(&Bytes::from_static(b"[1, 2]"), &env).unwrap_err();
        assert_eq!(err.id, "bad-request");
    }

    #[test]
    fn test_post_body_schema_violation() {
        let mut env = EffectiveEnvironment::default();
        env.request.schema = Some(
            serde_yaml::from_str(
                "type: object\nrequired: [username]\nproperties:\n  username:\n    type: string\n",
            )
            .unwrap(),
        );
        let err = validated_body(&Bytes::from_static(b"{}"), &env).unwrap_err();
        assert_eq!(err.id, "request-body-invalid");
    }

    #[test]
    fn test_schema_violation_message_never_cites_schema_values() {
        // Schemas are resolved before validation, so a const guard may hold
        // a secret value; the violation message must stay generic.
        let mut env = EffectiveEnvironment::default();
        env.request.schema = Some(
            serde_yaml::from_str(
                "type: object\nproperties:\n  token:\n    const: super-secret-value\n",
            )
            .unwrap(),
        );
        let err =
            validated_body(&Bytes::from_static(br#"{"token": "wrong"}"#), &env).unwrap_err();
        assert_eq!(err.id, "request-body-invalid");
        assert!(!err.message.contains("super-secret-value"));
        assert!(!err.message.contains("wrong"));
    }
}
