//! The proxy target table: which backend serves which path prefix.
//!
//! Prefixes match on whole segments, so `/api/users` serves `/api/users` and
//! `/api/users/1` but not `/api/usersettings`. No prefix may be a
//! whole-segment prefix of another, which makes resolution unambiguous.

use http::Uri;
use tracing::info;

use crate::config::RouteSettings;
use crate::error::{GatewayError, GatewayResult};

/// One backend and the prefix it serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyTarget {
    name: String,
    prefix: String,
    target: String,
}

impl ProxyTarget {
    /// Compiles a `[[routes]]` entry.
    pub fn new(route: &RouteSettings) -> GatewayResult<Self> {
        let prefix = route.prefix.trim_end_matches('/');
        if !prefix.starts_with('/') {
            return Err(GatewayError::route(
                &route.name,
                "prefix must start with '/' and name at least one segment",
            ));
        }
        if prefix.contains(['?', '#']) || prefix.contains("//") {
            return Err(GatewayError::route(
                &route.name,
                format!("invalid prefix '{}'", route.prefix),
            ));
        }

        let uri: Uri = route.target.parse().map_err(|e| {
            GatewayError::route(&route.name, format!("invalid target URL: {e}"))
        })?;
        if !matches!(uri.scheme_str(), Some("http" | "https")) || uri.authority().is_none() {
            return Err(GatewayError::route(
                &route.name,
                "target must be an absolute http:// or https:// URL",
            ));
        }
        if uri.query().is_some() {
            return Err(GatewayError::route(
                &route.name,
                "target must not carry a query string",
            ));
        }

        Ok(Self {
            name: route.name.clone(),
            prefix: prefix.to_string(),
            target: route.target.trim_end_matches('/').to_string(),
        })
    }

    /// The route name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The normalized prefix, without a trailing slash.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The backend base URL, without a trailing slash.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Returns the rest of `path` if this target's prefix covers it.
    ///
    /// The remainder is empty or starts with `/`.
    pub fn strip<'p>(&self, path: &'p str) -> Option<&'p str> {
        segment_prefix(&self.prefix, path)
    }

    /// Builds the backend URL for a stripped remainder and the original query.
    pub fn upstream_url(&self, remainder: &str, query: Option<&str>) -> String {
        let path = if remainder.is_empty() { "/" } else { remainder };
        match query {
            Some(query) => format!("{}{path}?{query}", self.target),
            None => format!("{}{path}", self.target),
        }
    }
}

fn segment_prefix<'p>(prefix: &str, path: &'p str) -> Option<&'p str> {
    let rest = path.strip_prefix(prefix)?;
    (rest.is_empty() || rest.starts_with('/')).then_some(rest)
}

/// All proxy targets, resolved by whole-segment prefix.
#[derive(Debug, Clone, Default)]
pub struct ProxyTable {
    targets: Vec<ProxyTarget>,
}

impl ProxyTable {
    /// Compiles the route settings, rejecting bad URLs and overlapping prefixes.
    pub fn new(routes: &[RouteSettings]) -> GatewayResult<Self> {
        let mut targets: Vec<ProxyTarget> = Vec::with_capacity(routes.len());

        for route in routes {
            let target = ProxyTarget::new(route)?;

            if let Some(existing) = targets.iter().find(|t| {
                segment_prefix(&t.prefix, &target.prefix).is_some()
                    || segment_prefix(&target.prefix, &t.prefix).is_some()
            }) {
                return Err(GatewayError::route(
                    &route.name,
                    format!(
                        "prefix '{}' overlaps '{}' of route '{}'",
                        target.prefix, existing.prefix, existing.name
                    ),
                ));
            }

            targets.push(target);
        }

        Ok(Self { targets })
    }

    /// Finds the target serving `path` and the remainder after its prefix.
    pub fn resolve<'p>(&self, path: &'p str) -> Option<(&ProxyTarget, &'p str)> {
        self.targets
            .iter()
            .find_map(|target| target.strip(path).map(|rest| (target, rest)))
    }

    /// Logs the table at startup.
    pub fn log_summary(&self) {
        for target in &self.targets {
            info!(
                route = target.name(),
                prefix = target.prefix(),
                upstream = target.target(),
                "proxy route registered"
            );
        }
    }

    /// Iterates the targets in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &ProxyTarget> {
        self.targets.iter()
    }

    /// Returns the number of targets.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Returns `true` if there are no targets.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
