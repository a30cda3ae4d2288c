//! Ordered collections of templates with first-match semantics.

use http::Method;

use crate::params::Params;
use crate::template::RouteTemplate;

/// A successful lookup in a [`RouteSet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch<'a, T> {
    /// The template that matched.
    pub template: &'a RouteTemplate,
    /// The value attached to the template.
    pub value: &'a T,
    /// Placeholder bindings.
    pub params: Params<'a>,
}

/// Templates with attached values, searched in declaration order.
///
/// When more than one template matches a request, the earliest-declared
/// one wins.
///
/// # Example
///
/// ```rust
/// use http::Method;
/// use palisade_router::{RouteSet, RouteTemplate};
///
/// let mut routes = RouteSet::new();
/// routes.push(RouteTemplate::parse(Method::GET, "/api/users/profile").unwrap(), "profile");
/// routes.push(RouteTemplate::parse(Method::GET, "/api/users/{userId}").unwrap(), "by-id");
///
/// let hit = routes.first_match(&Method::GET, "/api/users/profile").unwrap();
/// assert_eq!(*hit.value, "profile");
///
/// let hit = routes.first_match(&Method::GET, "/api/users/7").unwrap();
/// assert_eq!(*hit.value, "by-id");
/// assert_eq!(hit.params.get("userId"), Some("7"));
/// ```
#[derive(Debug, Clone)]
pub struct RouteSet<T> {
    entries: Vec<(RouteTemplate, T)>,
}

impl<T> RouteSet<T> {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Appends a template. Later entries have lower precedence.
    pub fn push(&mut self, template: RouteTemplate, value: T) {
        self.entries.push((template, value));
    }

    /// Returns the first entry matching `(method, path)`.
    #[must_use]
    pub fn first_match<'a>(&'a self, method: &Method, path: &'a str) -> Option<RouteMatch<'a, T>> {
        self.entries.iter().find_map(|(template, value)| {
            template.matches(method, path).map(|params| RouteMatch {
                template,
                value,
                params,
            })
        })
    }

    /// Returns true if any entry matches `(method, path)`.
    #[must_use]
    pub fn contains(&self, method: &Method, path: &str) -> bool {
        self.entries
            .iter()
            .any(|(template, _)| template.matches(method, path).is_some())
    }

    /// Iterates over entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&RouteTemplate, &T)> {
        self.entries.iter().map(|(template, value)| (template, value))
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the set has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for RouteSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<(RouteTemplate, T)> for RouteSet<T> {
    fn from_iter<I: IntoIterator<Item = (RouteTemplate, T)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(method: Method, pattern: &str) -> RouteTemplate {
        RouteTemplate::parse(method, pattern).unwrap()
    }

    #[test]
    fn test_empty_set_matches_nothing() {
        let routes: RouteSet<()> = RouteSet::new();
        assert!(routes.is_empty());
        assert!(routes.first_match(&Method::GET, "/").is_none());
        assert!(!routes.contains(&Method::GET, "/"));
    }

    #[test]
    fn test_earliest_declared_wins() {
        let routes: RouteSet<u8> = vec![
            (template(Method::GET, "/api/users/{userId}"), 1),
            (template(Method::GET, "/api/users/profile"), 2),
        ]
        .into_iter()
        .collect();

        let hit = routes.first_match(&Method::GET, "/api/users/profile").unwrap();
        assert_eq!(*hit.value, 1);
        assert_eq!(hit.params.get("userId"), Some("profile"));
        assert_eq!(hit.template.pattern(), "/api/users/{userId}");
    }

    #[test]
    fn test_method_distinguishes_entries() {
        let mut routes = RouteSet::new();
        routes.push(template(Method::GET, "/api/users/{userId}/progress"), "read");
        routes.push(template(Method::POST, "/api/users/{userId}/progress"), "write");

        let hit = routes.first_match(&Method::POST, "/api/users/3/progress").unwrap();
        assert_eq!(*hit.value, "write");
        assert!(routes.first_match(&Method::DELETE, "/api/users/3/progress").is_none());
    }

    #[test]
    fn test_iter_in_declaration_order() {
        let mut routes = RouteSet::new();
        routes.push(template(Method::GET, "/a"), 'a');
        routes.push(template(Method::GET, "/b"), 'b');

        let values: Vec<char> = routes.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec!['a', 'b']);
        assert_eq!(routes.len(), 2);
    }
}
