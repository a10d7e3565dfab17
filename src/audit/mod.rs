//! Audit event stream.
//!
//! Every security-relevant outcome is emitted as a structured event on the
//! `audit` target, carrying the source address and (where known) the
//! identity. Credentials never appear in events; only secret reference ids
//! are logged when secrets are served.

use std::net::IpAddr;

/// One security-relevant occurrence.
#[derive(Debug)]
pub enum AuditEvent<'a> {
    /// A request passed all checks and a configuration was served.
    ConfigLoaded {
        identity: &'a str,
        source: IpAddr,
        path: &'a str,
    },
    /// Secret references were resolved while serving a configuration.
    SecretsLoaded {
        identity: &'a str,
        source: IpAddr,
        path: &'a str,
        secret_ids: &'a [String],
    },
    /// The presented credential matched no identity.
    Unauthenticated { source: IpAddr, path: &'a str },
    /// The source address hit the failed-authentication limit.
    RateLimited { source: IpAddr, path: &'a str },
    /// A known identity connected from outside its allowed networks.
    UnauthorizedIp {
        identity: &'a str,
        source: IpAddr,
        path: &'a str,
    },
    /// A known identity requested a path outside its allowed patterns.
    UnauthorizedPath {
        identity: &'a str,
        source: IpAddr,
        path: &'a str,
    },
}

/// Emit the event on the audit stream.
pub fn record(event: AuditEvent<'_>) {
    match event {
        AuditEvent::ConfigLoaded {
            identity,
            source,
            path,
        } => {
            tracing::info!(
                target: "audit",
                event = "config-loaded",
                identity,
                source = %source,
                path,
                "configuration served"
            );
        }
        AuditEvent::SecretsLoaded {
            identity,
            source,
            path,
            secret_ids,
        } => {
            tracing::info!(
                target: "audit",
                event = "secrets-loaded",
                identity,
                source = %source,
                path,
                secrets = ?secret_ids,
                "secret references served"
            );
        }
        AuditEvent::Unauthenticated { source, path } => {
            tracing::warn!(
                target: "audit",
                event = "unauthenticated",
                source = %source,
                path,
                "credential matched no identity"
            );
        }
        AuditEvent::RateLimited { source, path } => {
            tracing::warn!(
                target: "audit",
                event = "auth-rate-limited",
                source = %source,
                path,
                "source exceeded failed-authentication limit"
            );
        }
        AuditEvent::UnauthorizedIp {
            identity,
            source,
            path,
        } => {
            tracing::warn!(
                target: "audit",
                event = "unauthorized-ip",
                identity,
                source = %source,
                path,
                "source address outside identity networks"
            );
        }
        AuditEvent::UnauthorizedPath {
            identity,
            source,
            path,
        } => {
            tracing::warn!(
                target: "audit",
                event = "unauthorized-path",
                identity,
                source = %source,
                path,
                "path outside identity permissions"
            );
        }
    }
}
