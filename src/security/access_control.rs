//! Identity store and per-request authorization.
//!
//! # Responsibilities
//! - Load the users file, resolving secret references for tokens
//! - Enforce the global network whitelist before anything else runs
//! - Match bearer tokens against identities in constant time
//! - Check per-identity network and path permissions
//!
//! # Design Decisions
//! - Token comparison scans every identity even after a match, so response
//!   timing does not depend on which identity (if any) matched.
//! - Per-identity networks must be a subset of the global whitelist; the
//!   check runs at load time and a violation refuses startup.

use std::net::IpAddr;
use std::path::Path;

use serde::Deserialize;
use subtle::ConstantTimeEq;

use crate::config::ConfigError;
use crate::references::{ReferenceResolver, Resolution};
use crate::security::networks::NetworkWhitelist;
use crate::security::path_pattern::PathPattern;

/// One entry from the users file, after secret references were resolved.
#[derive(Debug, Deserialize)]
struct UserRecord {
    id: String,
    token: String,
    has_access: AccessGrants,
}

#[derive(Debug, Deserialize)]
struct AccessGrants {
    to_paths: Vec<String>,
    from_networks: Vec<String>,
}

/// A loaded identity with compiled permissions.
pub struct Identity {
    pub id: String,
    token: Vec<u8>,
    path_patterns: Vec<PathPattern>,
    networks: NetworkWhitelist,
}

impl Identity {
    fn path_allowed(&self, path: &str) -> bool {
        self.path_patterns.iter().any(|p| p.matches(path))
    }
}

/// Outcome of authorizing one request.
#[derive(Debug, PartialEq, Eq)]
pub enum AccessDecision {
    /// Token matched and both network and path checks passed.
    Allowed { identity: String },
    /// No identity matched the presented token.
    Unauthenticated,
    /// Token matched but the source address is outside the identity's
    /// networks.
    UnauthorizedIp { identity: String },
    /// Token matched but no path pattern covers the requested path.
    UnauthorizedPath { identity: String },
}

/// Holds all identities and the global network whitelist.
pub struct AccessController {
    identities: Vec<Identity>,
    whitelist: NetworkWhitelist,
}

impl AccessController {
    /// Load identities from the users file and compile their permissions.
    ///
    /// Token fields may use secret references; they are resolved through
    /// `resolver` before the records are deserialized.
    pub fn load(
        users_file: &Path,
        whitelist: NetworkWhitelist,
        private_only: bool,
        resolver: &ReferenceResolver,
    ) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(users_file)?;
        let raw: serde_yaml::Value = serde_yaml::from_str(&content)?;
        let mut trace = Resolution::new();
        let resolved = resolver.resolve(&raw, &mut trace).map_err(|err| {
            ConfigError::Validation(vec![format!(
                "cannot resolve references in {}: {err}",
                users_file.display()
            )])
        })?;
        let records: Vec<UserRecord> = serde_yaml::from_value(resolved)?;

        let mut errors = Vec::new();
        let mut identities = Vec::with_capacity(records.len());
        for record in records {
            let networks =
                match NetworkWhitelist::parse(&record.has_access.from_networks, private_only) {
                    Ok(networks) => networks,
                    Err(err) => {
                        errors.push(format!("user {}: {err}", record.id));
                        continue;
                    }
                };
            if !networks.is_subset_of(&whitelist) {
                errors.push(format!(
                    "user {}: from_networks is not a subset of auth.networks.whitelist",
                    record.id
                ));
            }
            identities.push(Identity {
                id: record.id,
                token: record.token.into_bytes(),
                path_patterns: record
                    .has_access
                    .to_paths
                    .iter()
                    .map(|p| PathPattern::new(p))
                    .collect(),
                networks,
            });
        }
        if !errors.is_empty() {
            return Err(ConfigError::Validation(errors));
        }

        Ok(Self {
            identities,
            whitelist,
        })
    }

    #[cfg(test)]
    fn new(identities: Vec<Identity>, whitelist: NetworkWhitelist) -> Self {
        Self {
            identities,
            whitelist,
        }
    }

    /// Whether the global whitelist admits this source at all. Sources
    /// outside it are dropped before rate limiting or credential checks.
    pub fn source_allowed(&self, source: IpAddr) -> bool {
        self.whitelist.contains(source)
    }

    /// Authorize one request. The token is the raw bearer credential, or
    /// `None` when the request carried no usable Authorization header.
    pub fn authorize(&self, token: Option<&str>, source: IpAddr, path: &str) -> AccessDecision {
        let presented = match token {
            Some(token) => token.as_bytes(),
            None => return AccessDecision::Unauthenticated,
        };

        // Scan every identity regardless of earlier matches.
        let mut matched: Option<usize> = None;
        for (index, identity) in self.identities.iter().enumerate() {
            if identity.token.len() == presented.len()
                && bool::from(identity.token.ct_eq(presented))
            {
                matched.get_or_insert(index);
            }
        }
        let identity = match matched {
            Some(index) => &self.identities[index],
            None => return AccessDecision::Unauthenticated,
        };

        if !identity.networks.contains(source) {
            return AccessDecision::UnauthorizedIp {
                identity: identity.id.clone(),
            };
        }
        if !identity.path_allowed(path) {
            return AccessDecision::UnauthorizedPath {
                identity: identity.id.clone(),
            };
        }
        AccessDecision::Allowed {
            identity: identity.id.clone(),
        }
    }
}
