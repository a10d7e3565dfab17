//! Request-path error taxonomy.
//!
//! Every error that can surface while serving a request maps to a stable
//! `(status, id, message)` triple. Display impls cite file paths, reference
//! targets, and fragments only; resolved values (which may be secrets) are
//! never formatted into an error message.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while resolving and rendering configuration endpoints.
#[derive(Debug, Error)]
pub enum Error {
    /// A document or endpoint file could not be read from disk.
    #[error("could not read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A YAML document failed to parse.
    #[error("the YAML syntax in {path} could not be parsed")]
    YamlSyntax {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// An overlay or merged environment does not match the expected shape.
    #[error("invalid environment format in {path}: {detail}")]
    EnvFormat { path: String, detail: String },

    /// A document contains a mapping key with an embedded dot, which makes
    /// it unaddressable by reference fragments.
    #[error("the file {path} has variable names containing dots")]
    DottedKey { path: PathBuf },

    /// A reference target is missing, or its fragment addresses nothing.
    #[error("the reference {reference} could not be resolved")]
    UnresolvableReference { reference: String },

    /// A chain of references loops back on itself.
    #[error("cyclic reference detected: {chain}")]
    CyclicReference { chain: String },

    /// A tagged node uses a tag with no registered resolver.
    #[error("no resolver registered for tag !{tag}")]
    UnknownTag { tag: String },

    /// Template rendering failed (syntax error, strict-undefined variable).
    #[error("rendering the template at {path} failed")]
    TemplateRender {
        path: String,
        #[source]
        source: minijinja::Error,
    },
}

impl Error {
    /// Stable error identifier returned to clients in the JSON body.
    pub fn id(&self) -> &'static str {
        match self {
            Error::YamlSyntax { .. } => "env-syntax-error",
            Error::EnvFormat { .. } | Error::DottedKey { .. } => "env-format-error",
            Error::UnresolvableReference { .. } | Error::CyclicReference { .. } => {
                "unresolvable-reference"
            }
            Error::UnknownTag { .. } => "env-format-error",
            Error::TemplateRender { .. } => "template-rendering-error",
            Error::Io { .. } => "internal-server-error",
        }
    }

    /// Generic, non-leaking message paired with [`Error::id`].
    pub fn public_message(&self) -> &'static str {
        match self {
            Error::YamlSyntax { .. } => "The YAML syntax in an env file could not be parsed",
            Error::EnvFormat { .. } | Error::DottedKey { .. } | Error::UnknownTag { .. } => {
                "An env file was provided in an invalid format"
            }
            Error::UnresolvableReference { .. } | Error::CyclicReference { .. } => {
                "A reference in an env file could not be resolved"
            }
            Error::TemplateRender { .. } => {
                "An error occured while trying to render the template"
            }
            Error::Io { .. } => "An internal server error occured",
        }
    }
}
