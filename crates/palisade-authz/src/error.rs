//! Error types for the authorization crate.

use std::path::PathBuf;

use palisade_router::TemplateError;
use thiserror::Error;

/// Result type for policy loading and compilation.
pub type PolicyResult<T> = Result<T, PolicyError>;

/// Errors raised while loading or compiling a policy document.
///
/// All of these are startup failures.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PolicyError {
    /// The policy file could not be read.
    #[error("failed to read policy file {path}: {source}")]
    Read {
        /// Path to the policy file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The policy file extension is neither `.toml` nor `.json`.
    #[error("unsupported policy format: {0}")]
    UnsupportedFormat(String),

    /// The policy file is not valid TOML.
    #[error("invalid TOML policy: {0}")]
    Toml(#[from] toml::de::Error),

    /// The policy file is not valid JSON.
    #[error("invalid JSON policy: {0}")]
    Json(#[from] serde_json::Error),

    /// A route template failed to compile.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// A method name is not a standard HTTP method.
    #[error("unknown HTTP method '{0}'")]
    UnknownMethod(String),

    /// A role key is not one of the known roles.
    #[error("unknown role '{0}'")]
    UnknownRole(String),

    /// An ownership rule names a placeholder its template does not declare.
    #[error("rule '{template}' checks ownership of '{param}', which the template does not declare")]
    UnknownOwnershipParam {
        /// The rule's template.
        template: String,
        /// The missing placeholder.
        param: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PolicyError::UnknownOwnershipParam {
            template: "GET /api/users/{id}".to_string(),
            param: "userId".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "rule 'GET /api/users/{id}' checks ownership of 'userId', which the template does not declare"
        );
        assert_eq!(
            PolicyError::UnknownRole("root".to_string()).to_string(),
            "unknown role 'root'"
        );
    }
}
