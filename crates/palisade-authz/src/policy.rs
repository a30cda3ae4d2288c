//! Compiled permission tables and public-route exceptions.
//!
//! Both structures are built once at startup and shared read-only behind
//! `Arc` for the life of the process.

use std::collections::HashMap;

use http::Method;
use palisade_core::Role;
use palisade_router::{Params, RouteSet, RouteTemplate};

use crate::error::{PolicyError, PolicyResult};

/// How a matched rule relates the caller to the resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ownership {
    /// Any holder of the role may call.
    None,
    /// The named placeholder must equal the caller's subject id.
    SelfViaParam(String),
    /// The route has no id segment; the backend scopes the resource to the
    /// forwarded identity.
    SelfViaIdentity,
}

/// One entry in a role's permission list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionRule {
    /// Admits every request for the role.
    Wildcard,
    /// Admits requests matching the template, subject to ownership.
    Rule {
        /// The route this rule covers.
        template: RouteTemplate,
        /// The ownership requirement.
        ownership: Ownership,
    },
}

impl PermissionRule {
    /// Builds a templated rule, checking that an ownership placeholder exists.
    pub fn rule(template: RouteTemplate, ownership: Ownership) -> PolicyResult<Self> {
        if let Ownership::SelfViaParam(param) = &ownership {
            if !template.has_param(param) {
                return Err(PolicyError::UnknownOwnershipParam {
                    template: template.to_string(),
                    param: param.clone(),
                });
            }
        }
        Ok(Self::Rule {
            template,
            ownership,
        })
    }
}

/// The result of scanning a role's ordered rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatch<'a> {
    /// The rule's template.
    pub template: &'a RouteTemplate,
    /// The rule's ownership requirement.
    pub ownership: &'a Ownership,
    /// Placeholder bindings from the request path.
    pub params: Params<'a>,
}

/// Role to ordered permission rules.
///
/// A wildcard anywhere in a role's list short-circuits before the ordered
/// rules are scanned. Otherwise the earliest matching rule governs.
///
/// # Example
///
/// ```
/// use http::Method;
/// use palisade_authz::{Ownership, PermissionRule, PolicyTable};
/// use palisade_core::Role;
/// use palisade_router::RouteTemplate;
///
/// let mut table = PolicyTable::new();
/// table.push(Role::Admin, PermissionRule::Wildcard);
/// table.push(
///     Role::User,
///     PermissionRule::rule(
///         RouteTemplate::parse(Method::GET, "/api/users/{userId}/progress").unwrap(),
///         Ownership::SelfViaParam("userId".to_string()),
///     )
///     .unwrap(),
/// );
///
/// assert!(table.has_wildcard(Role::Admin));
/// let hit = table.first_match(Role::User, &Method::GET, "/api/users/5/progress").unwrap();
/// assert_eq!(hit.params.get("userId"), Some("5"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct PolicyTable {
    roles: HashMap<Role, Vec<PermissionRule>>,
}

impl PolicyTable {
    /// Creates an empty table. Every role is denied everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a rule to a role's list.
    pub fn push(&mut self, role: Role, rule: PermissionRule) {
        self.roles.entry(role).or_default().push(rule);
    }

    /// Returns a role's rules in declaration order.
    #[must_use]
    pub fn rules(&self, role: Role) -> &[PermissionRule] {
        self.roles.get(&role).map_or(&[], Vec::as_slice)
    }

    /// Returns true if the role holds a wildcard.
    #[must_use]
    pub fn has_wildcard(&self, role: Role) -> bool {
        self.rules(role)
            .iter()
            .any(|rule| matches!(rule, PermissionRule::Wildcard))
    }

    /// Returns the earliest templated rule for `role` matching the request.
    #[must_use]
    pub fn first_match<'a>(
        &'a self,
        role: Role,
        method: &Method,
        path: &'a str,
    ) -> Option<RuleMatch<'a>> {
        self.rules(role).iter().find_map(|rule| match rule {
            PermissionRule::Wildcard => None,
            PermissionRule::Rule {
                template,
                ownership,
            } => template.matches(method, path).map(|params| RuleMatch {
                template,
                ownership,
                params,
            }),
        })
    }

    /// Returns the total number of rules across all roles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.roles.values().map(Vec::len).sum()
    }

    /// Returns true if no role has any rule.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Whether a request needs an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    /// Matches a public route: no identity required, tokens ignored.
    Public,
    /// Everything else.
    Protected,
}

impl Access {
    /// Returns a label for logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Protected => "protected",
        }
    }
}

/// Routes that require no identity.
///
/// A request matching one of these is never evaluated against the
/// [`PolicyTable`].
#[derive(Debug, Clone, Default)]
pub struct PublicRouteSet {
    routes: RouteSet<()>,
}

impl PublicRouteSet {
    /// Creates an empty set; every route is protected.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a public route.
    pub fn push(&mut self, template: RouteTemplate) {
        self.routes.push(template, ());
    }

    /// Classifies a request.
    #[must_use]
    pub fn classify(&self, method: &Method, path: &str) -> Access {
        if self.routes.contains(method, path) {
            Access::Public
        } else {
            Access::Protected
        }
    }

    /// Iterates over the public templates in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &RouteTemplate> {
        self.routes.iter().map(|(template, _)| template)
    }

    /// Returns the number of public routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns true if there are no public routes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl FromIterator<RouteTemplate> for PublicRouteSet {
    fn from_iter<I: IntoIterator<Item = RouteTemplate>>(iter: I) -> Self {
        Self {
            routes: iter.into_iter().map(|template| (template, ())).collect(),
        }
    }
}
