//! Caller roles and verified identity.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The role carried by every authenticated caller.
///
/// Role tags are lowercase on the wire (`"user"`, `"moderator"`, `"admin"`)
/// and matching is exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A regular end user.
    User,
    /// A content moderator.
    Moderator,
    /// An administrator.
    Admin,
}

impl Role {
    /// Returns the wire tag for this role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Moderator => "moderator",
            Self::Admin => "admin",
        }
    }

    /// Returns every role.
    #[must_use]
    pub const fn all() -> [Role; 3] {
        [Self::User, Self::Moderator, Self::Admin]
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A role tag that is not one of the known roles.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "moderator" => Ok(Self::Moderator),
            "admin" => Ok(Self::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// The caller identity derived from a verified token.
///
/// An `Identity` is built fresh for each request and never outlives it.
///
/// # Example
///
/// ```
/// use palisade_core::{Identity, Role};
///
/// let identity = Identity::new("42", Role::User);
/// assert_eq!(identity.subject_id(), "42");
/// assert_eq!(identity.role(), Role::User);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    subject_id: String,
    role: Role,
}

impl Identity {
    /// Creates an identity.
    #[must_use]
    pub fn new(subject_id: impl Into<String>, role: Role) -> Self {
        Self {
            subject_id: subject_id.into(),
            role,
        }
    }

    /// Returns the subject identifier, compared as a string for ownership.
    #[must_use]
    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    /// Returns the caller's role.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.role, self.subject_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trips_through_str() {
        for role in Role::all() {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn test_role_parse_is_exact() {
        assert!("Admin".parse::<Role>().is_err());
        assert!("superuser".parse::<Role>().is_err());
        assert!("".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_serde_uses_lowercase_tags() {
        assert_eq!(serde_json::to_string(&Role::Moderator).unwrap(), r#""moderator""#);
        assert_eq!(serde_json::from_str::<Role>(r#""admin""#).unwrap(), Role::Admin);
    }

    #[test]
    fn test_identity_display() {
        let identity = Identity::new("7", Role::Moderator);
        assert_eq!(identity.to_string(), "moderator:7");
    }
}
