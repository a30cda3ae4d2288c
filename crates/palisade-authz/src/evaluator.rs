//! Authorization decisions.
//!
//! [`decide`] is a pure function of the policy table, the request line and
//! the caller. [`PolicyEvaluator`] bundles a compiled table with its public
//! routes so the pipeline can hold both behind one `Arc`.

use http::Method;
use palisade_core::{Identity, Rejection};
use tracing::debug;

use crate::policy::{Access, Ownership, PolicyTable, PublicRouteSet};

/// Why a request was admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdmitReason {
    /// The route is public.
    Public,
    /// The caller's role holds a wildcard.
    Wildcard,
    /// A rule without ownership matched.
    Rule,
    /// An ownership rule matched and the path id equals the caller's id.
    Owner,
    /// A self-scoped rule matched; the backend scopes by identity.
    SelfScoped,
}

impl AdmitReason {
    /// Returns the metrics label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Wildcard => "wildcard",
            Self::Rule => "rule",
            Self::Owner => "owner",
            Self::SelfScoped => "self_scoped",
        }
    }
}

/// Why a request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DenyReason {
    /// A protected route was reached without an identity.
    Unauthenticated,
    /// No rule for the caller's role matches.
    NoMatchingRule,
    /// An ownership rule matched but the ids differ.
    NotOwner,
}

impl DenyReason {
    /// Returns the metrics label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::NoMatchingRule => "no_matching_rule",
            Self::NotOwner => "not_owner",
        }
    }

    /// Returns the client-facing rejection.
    #[must_use]
    pub const fn rejection(self) -> Rejection {
        match self {
            Self::Unauthenticated => Rejection::MissingCredentials,
            Self::NoMatchingRule => Rejection::Forbidden,
            Self::NotOwner => Rejection::NotOwner,
        }
    }
}

/// The outcome of evaluating one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    /// Forward the request.
    Admit(AdmitReason),
    /// Refuse the request.
    Deny(DenyReason),
}

impl Decision {
    /// Returns true if the request is admitted.
    #[must_use]
    pub const fn is_admit(&self) -> bool {
        matches!(self, Self::Admit(_))
    }

    /// Returns the metrics label for the reason.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Admit(reason) => reason.as_str(),
            Self::Deny(reason) => reason.as_str(),
        }
    }
}

/// Decides whether `identity` may perform `method path`.
///
/// Public routes are admitted regardless of identity. On protected routes a
/// missing identity is denied, a wildcard admits, and otherwise the earliest
/// matching rule for the role governs. Path values are compared to the
/// subject id as exact strings.
///
/// # Example
///
/// ```
/// use http::Method;
/// use palisade_authz::{decide, Access, Decision, DenyReason, PolicyDocument};
/// use palisade_core::{Identity, Role};
///
/// let policy = PolicyDocument::builtin().compile().unwrap();
/// let caller = Identity::new("42", Role::User);
///
/// let decision = decide(
///     &policy.table,
///     &Method::GET,
///     "/api/users/43/progress",
///     Some(&caller),
///     Access::Protected,
/// );
/// assert_eq!(decision, Decision::Deny(DenyReason::NotOwner));
/// ```
#[must_use]
pub fn decide(
    table: &PolicyTable,
    method: &Method,
    path: &str,
    identity: Option<&Identity>,
    access: Access,
) -> Decision {
    if access == Access::Public {
        return Decision::Admit(AdmitReason::Public);
    }

    let Some(identity) = identity else {
        return Decision::Deny(DenyReason::Unauthenticated);
    };

    let role = identity.role();
    if table.has_wildcard(role) {
        return Decision::Admit(AdmitReason::Wildcard);
    }

    let Some(hit) = table.first_match(role, method, path) else {
        return Decision::Deny(DenyReason::NoMatchingRule);
    };

    match hit.ownership {
        Ownership::None => Decision::Admit(AdmitReason::Rule),
        Ownership::SelfViaIdentity => Decision::Admit(AdmitReason::SelfScoped),
        Ownership::SelfViaParam(param) => {
            if hit.params.get(param) == Some(identity.subject_id()) {
                Decision::Admit(AdmitReason::Owner)
            } else {
                Decision::Deny(DenyReason::NotOwner)
            }
        }
    }
}

/// A compiled policy: the permission table plus its public routes.
#[derive(Debug, Clone, Default)]
pub struct PolicyEvaluator {
    table: PolicyTable,
    public: PublicRouteSet,
}

impl PolicyEvaluator {
    /// Creates an evaluator.
    #[must_use]
    pub fn new(table: PolicyTable, public: PublicRouteSet) -> Self {
        Self { table, public }
    }

    /// Returns the permission table.
    #[must_use]
    pub fn table(&self) -> &PolicyTable {
        &self.table
    }

    /// Returns the public routes.
    #[must_use]
    pub fn public_routes(&self) -> &PublicRouteSet {
        &self.public
    }

    /// Classifies a request as public or protected.
    #[must_use]
    pub fn classify(&self, method: &Method, path: &str) -> Access {
        self.public.classify(method, path)
    }

    /// Evaluates a request that has already been classified.
    pub fn evaluate(
        &self,
        method: &Method,
        path: &str,
        identity: Option<&Identity>,
        access: Access,
    ) -> Decision {
        let decision = decide(&self.table, method, path, identity, access);
        debug!(
            %method,
            path,
            access = access.as_str(),
            subject = identity.map(Identity::subject_id),
            allowed = decision.is_admit(),
            reason = decision.reason(),
            "authorization decision"
        );
        decision
    }
}
