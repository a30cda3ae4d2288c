//! Declarative policy documents.
//!
//! A [`PolicyDocument`] is the serialized form of the permission table and
//! the public routes. It is loaded from TOML or JSON, validated, and then
//! compiled into a [`CompiledPolicy`] that the request path consults.
//!
//! ```toml
//! [[public]]
//! method = "POST"
//! path = "/api/users/login"
//!
//! [roles.admin]
//! allow_all = true
//!
//! [[roles.user.rules]]
//! method = "GET"
//! path = "/api/users/{userId}/progress"
//! ownership = { param = "userId" }
//!
//! [[roles.user.rules]]
//! method = "GET"
//! path = "/api/users/profile"
//! ownership = "identity"
//! ```

use std::path::Path;

use http::Method;
use indexmap::IndexMap;
use palisade_core::Role;
use palisade_router::RouteTemplate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{PolicyError, PolicyResult};
use crate::evaluator::PolicyEvaluator;
use crate::policy::{Ownership, PermissionRule, PolicyTable, PublicRouteSet};

/// A method and path template pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteSpec {
    /// HTTP method, case-insensitive.
    pub method: String,
    /// Path template with `{name}` placeholders.
    pub path: String,
}

/// Ownership keywords accepted in a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnershipKeyword {
    /// No ownership requirement.
    None,
    /// The backend scopes by the forwarded identity.
    Identity,
}

/// The ownership field of a rule: a keyword or `{ param = "..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OwnershipSpec {
    /// `"none"` or `"identity"`.
    Keyword(OwnershipKeyword),
    /// The named placeholder must equal the caller's subject id.
    Param {
        /// Placeholder name.
        param: String,
    },
}

impl Default for OwnershipSpec {
    fn default() -> Self {
        Self::Keyword(OwnershipKeyword::None)
    }
}

impl OwnershipSpec {
    fn compile(&self) -> Ownership {
        match self {
            Self::Keyword(OwnershipKeyword::None) => Ownership::None,
            Self::Keyword(OwnershipKeyword::Identity) => Ownership::SelfViaIdentity,
            Self::Param { param } => Ownership::SelfViaParam(param.clone()),
        }
    }
}

/// One permission rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSpec {
    /// HTTP method, case-insensitive.
    pub method: String,
    /// Path template with `{name}` placeholders.
    pub path: String,
    /// Ownership requirement, `none` when omitted.
    #[serde(default)]
    pub ownership: OwnershipSpec,
}

/// The permissions held by one role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RolePolicy {
    /// Admit every request for this role.
    pub allow_all: bool,
    /// Ordered rules; the first match governs.
    pub rules: Vec<RuleSpec>,
}

/// A declarative policy.
///
/// An empty document denies every protected request and has no public
/// routes. [`PolicyDocument::builtin`] returns the policy the gateway ships
/// with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyDocument {
    /// Routes reachable without an identity.
    pub public: Vec<RouteSpec>,
    /// Role name to permissions, in declaration order.
    pub roles: IndexMap<String, RolePolicy>,
}

/// The compiled form of a [`PolicyDocument`].
#[derive(Debug, Clone, Default)]
pub struct CompiledPolicy {
    /// Role permissions.
    pub table: PolicyTable,
    /// Public routes.
    pub public: PublicRouteSet,
}

impl CompiledPolicy {
    /// Converts into an evaluator.
    #[must_use]
    pub fn into_evaluator(self) -> PolicyEvaluator {
        PolicyEvaluator::new(self.table, self.public)
    }
}

impl PolicyDocument {
    /// Loads a policy from a `.toml` or `.json` file.
    pub fn from_file(path: impl AsRef<Path>) -> PolicyResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| PolicyError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");
        match extension {
            "toml" => Self::from_toml_str(&content),
            "json" => Self::from_json_str(&content),
            _ => Err(PolicyError::UnsupportedFormat(extension.to_string())),
        }
    }

    /// Parses a TOML policy.
    pub fn from_toml_str(content: &str) -> PolicyResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Parses a JSON policy.
    pub fn from_json_str(content: &str) -> PolicyResult<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Validates and compiles the document.
    ///
    /// Fails on unknown methods, unknown role names, malformed templates and
    /// ownership params that the rule's template does not declare.
    pub fn compile(&self) -> PolicyResult<CompiledPolicy> {
        let mut public = PublicRouteSet::new();
        for route in &self.public {
            public.push(parse_template(&route.method, &route.path)?);
        }

        let mut table = PolicyTable::new();
        for (name, policy) in &self.roles {
            let role: Role = name
                .parse()
                .map_err(|_| PolicyError::UnknownRole(name.clone()))?;

            if policy.allow_all {
                table.push(role, PermissionRule::Wildcard);
            }
            for rule in &policy.rules {
                let template = parse_template(&rule.method, &rule.path)?;
                table.push(role, PermissionRule::rule(template, rule.ownership.compile())?);
            }
        }

        info!(
            public_routes = public.len(),
            rules = table.len(),
            roles = self.roles.len(),
            "compiled policy"
        );

        Ok(CompiledPolicy { table, public })
    }

    /// The default policy for the learning platform's services.
    #[must_use]
    pub fn builtin() -> Self {
        let public = [
            ("POST", "/api/users/register"),
            ("POST", "/api/users/login"),
            ("POST", "/api/users/login/2fa"),
            ("GET", "/api/content/courses"),
            ("GET", "/api/content/courses/featured"),
            ("GET", "/api/content/courses/{courseId}"),
            ("GET", "/api/content/courses/{courseId}/reviews"),
            ("GET", "/api/gamification/leaderboard"),
        ]
        .into_iter()
        .map(|(method, path)| RouteSpec {
            method: method.to_string(),
            path: path.to_string(),
        })
        .collect();

        let shared_writes = [
            "/api/content/reviews",
            "/api/ugc/submit",
            "/api/ugc/report",
            "/api/qna/query",
            "/api/qna/generate-quiz",
        ];
        let writes = || {
            shared_writes
                .iter()
                .map(|path| rule("POST", path, OwnershipSpec::default()))
        };

        let owned = |param: &str| OwnershipSpec::Param {
            param: param.to_string(),
        };

        let mut moderator: Vec<RuleSpec> = [
            "/api/users/{userId}/progress",
            "/api/users/{userId}/full-profile",
            "/api/gamification/users/{userId}/stats",
        ]
        .into_iter()
        .map(|path| rule("GET", path, OwnershipSpec::default()))
        .collect();
        moderator.extend(writes());

        let mut user = vec![
            rule(
                "GET",
                "/api/users/profile",
                OwnershipSpec::Keyword(OwnershipKeyword::Identity),
            ),
            rule("GET", "/api/users/{userId}/progress", owned("userId")),
            rule("POST", "/api/users/{userId}/progress", owned("userId")),
            rule("GET", "/api/users/{userId}/full-profile", owned("userId")),
            rule(
                "GET",
                "/api/gamification/users/{userId}/stats",
                owned("userId"),
            ),
        ];
        user.extend(writes());

        let mut roles = IndexMap::new();
        roles.insert(
            Role::Admin.as_str().to_string(),
            RolePolicy {
                allow_all: true,
                rules: Vec::new(),
            },
        );
        roles.insert(
            Role::Moderator.as_str().to_string(),
            RolePolicy {
                allow_all: false,
                rules: moderator,
            },
        );
        roles.insert(
            Role::User.as_str().to_string(),
            RolePolicy {
                allow_all: false,
                rules: user,
            },
        );

        Self { public, roles }
    }
}

fn rule(method: &str, path: &str, ownership: OwnershipSpec) -> RuleSpec {
    RuleSpec {
        method: method.to_string(),
        path: path.to_string(),
        ownership,
    }
}

fn parse_template(method: &str, path: &str) -> PolicyResult<RouteTemplate> {
    Ok(RouteTemplate::parse(parse_method(method)?, path)?)
}

fn parse_method(method: &str) -> PolicyResult<Method> {
    match method.to_ascii_uppercase().as_str() {
        "GET" => Ok(Method::GET),
        "POST" => Ok(Method::POST),
        "PUT" => Ok(Method::PUT),
        "DELETE" => Ok(Method::DELETE),
        "PATCH" => Ok(Method::PATCH),
        "HEAD" => Ok(Method::HEAD),
        "OPTIONS" => Ok(Method::OPTIONS),
        "TRACE" => Ok(Method::TRACE),
        "CONNECT" => Ok(Method::CONNECT),
        _ => Err(PolicyError::UnknownMethod(method.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_compiles() {
        let compiled = PolicyDocument::builtin().compile().unwrap();
        assert_eq!(compiled.public.len(), 8);
        assert!(compiled.table.has_wildcard(Role::Admin));
        assert!(!compiled.table.has_wildcard(Role::User));
        assert_eq!(compiled.table.rules(Role::Moderator).len(), 8);
        assert_eq!(compiled.table.rules(Role::User).len(), 10);
    }

    #[test]
    fn test_empty_document_denies_everything() {
        let compiled = PolicyDocument::default().compile().unwrap();
        assert!(compiled.table.is_empty());
        assert!(compiled.public.is_empty());
    }

    #[test]
    fn test_parse_method_is_case_insensitive() {
        assert_eq!(parse_method("get").unwrap(), Method::GET);
        assert_eq!(parse_method("Patch").unwrap(), Method::PATCH);
        assert!(matches!(
            parse_method("BREW"),
            Err(PolicyError::UnknownMethod(m)) if m == "BREW"
        ));
    }

    #[test]
    fn test_ownership_defaults_to_none() {
        let doc = PolicyDocument::from_toml_str(
            r#"
            [[roles.user.rules]]
            method = "POST"
            path = "/api/qna/query"
            "#,
        )
        .unwrap();
        assert_eq!(doc.roles["user"].rules[0].ownership, OwnershipSpec::default());
    }

    #[test]
    fn test_ownership_forms() {
        let doc = PolicyDocument::from_json_str(
            r#"{
                "roles": {
                    "user": {
                        "rules": [
                            {"method": "GET", "path": "/a", "ownership": "identity"},
                            {"method": "GET", "path": "/b/{id}", "ownership": {"param": "id"}},
                            {"method": "GET", "path": "/c", "ownership": "none"}
                        ]
                    }
                }
            }"#,
        )
        .unwrap();
        let rules = &doc.roles["user"].rules;
        assert_eq!(rules[0].ownership.compile(), Ownership::SelfViaIdentity);
        assert_eq!(
            rules[1].ownership.compile(),
            Ownership::SelfViaParam("id".to_string())
        );
        assert_eq!(rules[2].ownership.compile(), Ownership::None);
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        let doc = PolicyDocument::from_toml_str(
            r#"
            [roles.superuser]
            allow_all = true
            "#,
        )
        .unwrap();
        assert!(matches!(
            doc.compile(),
            Err(PolicyError::UnknownRole(role)) if role == "superuser"
        ));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let result = PolicyDocument::from_toml_str(
            r#"
            [roles.user]
            allow_everything = true
            "#,
        );
        assert!(matches!(result, Err(PolicyError::Toml(_))));
    }
}
