//! RS256 bearer token verification.
//!
//! The verifier holds one RSA public key, loaded once at startup, and turns
//! a compact JWS into an [`Identity`]. Signature, expiry and not-before are
//! checked by `jsonwebtoken`; the claim shape is checked here.
//!
//! Accepted claims:
//!
//! | Claim | Required | Meaning |
//! |---|---|---|
//! | `user_id` | one of `user_id`/`sub` | subject, integer or string |
//! | `sub` | one of `user_id`/`sub` | subject, string |
//! | `role` | yes | `user`, `moderator` or `admin` |
//! | `exp` | yes | expiry, seconds since epoch |
//! | `nbf` | no | not-before, seconds since epoch |
//! | `type` | no | must be `full_auth` when present |
//! | `iss` | only if an issuer is configured | expected issuer |
//!
//! Every failure is reported as a [`TokenError`] for logging, but callers
//! must collapse all of them into a single client-facing rejection.

use std::fmt;
use std::path::Path;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::error::KeyError;
use crate::identity::{Identity, Role};

/// The only `type` claim value accepted as an access token.
pub const FULL_AUTH_TOKEN_TYPE: &str = "full_auth";

/// Why a token was refused.
///
/// The variants exist for diagnostics only; none of them should reach the
/// client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// The token is not a well-formed compact JWS, or its claims are not JSON.
    #[error("malformed token")]
    Malformed,
    /// The signature does not verify against the configured key.
    #[error("invalid signature")]
    BadSignature,
    /// The header names an algorithm other than RS256.
    #[error("unexpected signing algorithm")]
    WrongAlgorithm,
    /// The `exp` claim is in the past.
    #[error("token expired")]
    Expired,
    /// The `nbf` claim is in the future.
    #[error("token not yet valid")]
    NotYetValid,
    /// The `iss` claim does not match the configured issuer.
    #[error("unexpected issuer")]
    WrongIssuer,
    /// A required claim is absent.
    #[error("missing claim '{0}'")]
    MissingClaim(String),
    /// The `role` claim is not a known role.
    #[error("unknown role '{0}'")]
    UnknownRole(String),
    /// The `type` claim marks a token that is not an access token.
    #[error("token type '{0}' cannot be used for access")]
    WrongTokenType(String),
}

impl TokenError {
    /// Returns a short label for metrics.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Malformed => "malformed",
            Self::BadSignature => "signature",
            Self::WrongAlgorithm => "algorithm",
            Self::Expired => "expired",
            Self::NotYetValid => "not_yet_valid",
            Self::WrongIssuer => "issuer",
            Self::MissingClaim(_) => "missing_claim",
            Self::UnknownRole(_) => "unknown_role",
            Self::WrongTokenType(_) => "token_type",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature => Self::BadSignature,
            ErrorKind::InvalidAlgorithm | ErrorKind::MissingAlgorithm => Self::WrongAlgorithm,
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::ImmatureSignature => Self::NotYetValid,
            ErrorKind::InvalidIssuer => Self::WrongIssuer,
            ErrorKind::MissingRequiredClaim(claim) => Self::MissingClaim(claim.clone()),
            _ => Self::Malformed,
        }
    }
}

/// The subject may be issued as a number or a string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SubjectClaim {
    Number(i64),
    Text(String),
}

impl SubjectClaim {
    fn into_string(self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    user_id: Option<SubjectClaim>,
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default, rename = "type")]
    token_type: Option<String>,
}

/// Verifies RS256 bearer tokens against a preloaded public key.
///
/// # Example
///
/// ```no_run
/// use palisade_core::TokenVerifier;
///
/// let verifier = TokenVerifier::from_pem_file("../secrets/jwtRS256.key.pub")?
///     .with_issuer("user-service")
///     .with_leeway(5);
///
/// match verifier.verify("eyJ...") {
///     Ok(identity) => println!("caller {}", identity),
///     Err(e) => println!("refused: {}", e),
/// }
/// # Ok::<(), palisade_core::KeyError>(())
/// ```
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    /// Creates a verifier from a PEM-encoded RSA public key.
    pub fn from_pem(pem: &[u8]) -> Result<Self, KeyError> {
        let key = DecodingKey::from_rsa_pem(pem).map_err(KeyError::Parse)?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_required_spec_claims(&["exp"]);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.validate_aud = false;
        validation.leeway = 0;

        Ok(Self { key, validation })
    }

    /// Reads and parses the public key at `path`.
    pub fn from_pem_file(path: impl AsRef<Path>) -> Result<Self, KeyError> {
        let path = path.as_ref();
        let pem = std::fs::read(path).map_err(|source| KeyError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let verifier = Self::from_pem(&pem)?;
        info!(path = %path.display(), "token verification key loaded");
        Ok(verifier)
    }

    /// Requires the `iss` claim to be present and equal to `issuer`.
    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.validation.set_issuer(&[issuer.into()]);
        self.validation.set_required_spec_claims(&["exp", "iss"]);
        self
    }

    /// Allows `exp` and `nbf` to be off by up to `seconds`.
    #[must_use]
    pub fn with_leeway(mut self, seconds: u64) -> Self {
        self.validation.leeway = seconds;
        self
    }

    /// Verifies `token` and derives the caller identity from its claims.
    pub fn verify(&self, token: &str) -> Result<Identity, TokenError> {
        let data = decode::<Claims>(token, &self.key, &self.validation)?;
        let claims = data.claims;

        if let Some(token_type) = claims.token_type {
            if token_type != FULL_AUTH_TOKEN_TYPE {
                return Err(TokenError::WrongTokenType(token_type));
            }
        }

        let subject = claims
            .user_id
            .map(SubjectClaim::into_string)
            .or(claims.sub)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| TokenError::MissingClaim("user_id".to_string()))?;

        let role_tag = claims
            .role
            .ok_or_else(|| TokenError::MissingClaim("role".to_string()))?;
        let role: Role = role_tag
            .parse()
            .map_err(|_| TokenError::UnknownRole(role_tag.clone()))?;

        Ok(Identity::new(subject, role))
    }
}

impl fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("algorithms", &self.validation.algorithms)
            .field("leeway", &self.validation.leeway)
            .finish_non_exhaustive()
    }
}
