//! Route template compilation and matching.

use http::Method;

use crate::params::Params;
use crate::TemplateError;

/// One `/`-delimited piece of a compiled template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Must equal the path segment exactly.
    Literal(String),
    /// Matches any single non-empty segment and binds it under this name.
    Param(String),
}

/// An HTTP method plus a compiled path pattern.
///
/// Templates are written with `{name}` placeholders that occupy a whole
/// segment, for example `/api/users/{userId}/progress`. Compilation splits
/// the pattern once; matching then walks segments without allocating.
///
/// # Example
///
/// ```rust
/// use http::Method;
/// use palisade_router::RouteTemplate;
///
/// let template = RouteTemplate::parse(Method::GET, "/api/users/{userId}/progress").unwrap();
///
/// let params = template.matches(&Method::GET, "/api/users/42/progress").unwrap();
/// assert_eq!(params.get("userId"), Some("42"));
///
/// assert!(template.matches(&Method::POST, "/api/users/42/progress").is_none());
/// assert!(template.matches(&Method::GET, "/api/users/42").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTemplate {
    method: Method,
    pattern: String,
    segments: Vec<Segment>,
}

impl RouteTemplate {
    /// Compiles a template for the given method.
    ///
    /// The pattern must start with `/`. Placeholder names must be non-empty,
    /// made of ASCII alphanumerics or `_`, and unique within the template.
    pub fn parse(method: Method, pattern: &str) -> Result<Self, TemplateError> {
        let Some(rest) = pattern.strip_prefix('/') else {
            return Err(TemplateError::MissingLeadingSlash {
                pattern: pattern.to_string(),
            });
        };

        let mut segments = Vec::new();
        for raw in rest.split('/') {
            segments.push(parse_segment(pattern, raw, &segments)?);
        }

        Ok(Self {
            method,
            pattern: pattern.to_string(),
            segments,
        })
    }

    /// Returns the HTTP method this template matches.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the pattern as written.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Returns the compiled segments.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Returns true if the template declares a placeholder with this name.
    #[must_use]
    pub fn has_param(&self, name: &str) -> bool {
        self.segments
            .iter()
            .any(|segment| matches!(segment, Segment::Param(n) if n == name))
    }

    /// Matches a concrete request path, returning the placeholder bindings.
    ///
    /// `path` is the raw path without the query string. Segment counts must
    /// be equal, so a trailing slash produces an extra empty segment and
    /// does not match.
    #[must_use]
    pub fn matches<'a>(&'a self, method: &Method, path: &'a str) -> Option<Params<'a>> {
        if *method != self.method {
            return None;
        }

        let rest = path.strip_prefix('/')?;
        let mut params = Params::new();
        let mut parts = rest.split('/');

        for segment in &self.segments {
            let part = parts.next()?;
            match segment {
                Segment::Literal(literal) => {
                    if literal != part {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    if part.is_empty() {
                        return None;
                    }
                    params.push(name, part);
                }
            }
        }

        if parts.next().is_some() {
            return None;
        }

        Some(params)
    }
}

impl std::fmt::Display for RouteTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.pattern)
    }
}

fn parse_segment(pattern: &str, raw: &str, seen: &[Segment]) -> Result<Segment, TemplateError> {
    let opens = raw.contains('{');
    let closes = raw.contains('}');

    if !opens && !closes {
        return Ok(Segment::Literal(raw.to_string()));
    }

    let name = raw
        .strip_prefix('{')
        .and_then(|inner| inner.strip_suffix('}'))
        .filter(|inner| !inner.contains('{') && !inner.contains('}'))
        .ok_or_else(|| TemplateError::PartialPlaceholder {
            pattern: pattern.to_string(),
            segment: raw.to_string(),
        })?;

    if name.is_empty() {
        return Err(TemplateError::EmptyParamName {
            pattern: pattern.to_string(),
        });
    }

    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(TemplateError::InvalidParamName {
            pattern: pattern.to_string(),
            name: name.to_string(),
        });
    }

    if seen
        .iter()
        .any(|segment| matches!(segment, Segment::Param(n) if n == name))
    {
        return Err(TemplateError::DuplicateParam {
            pattern: pattern.to_string(),
            name: name.to_string(),
        });
    }

    Ok(Segment::Param(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get(pattern: &str) -> RouteTemplate {
        RouteTemplate::parse(Method::GET, pattern).unwrap()
    }

    #[test]
    fn test_literal_match() {
        let template = get("/api/content/courses");
        let params = template.matches(&Method::GET, "/api/content/courses").unwrap();
        assert!(params.is_empty());
        assert!(template.matches(&Method::GET, "/api/content/course").is_none());
    }

    #[test]
    fn test_param_binds_single_segment() {
        let template = get("/api/content/courses/{courseId}/reviews");
        let params = template
            .matches(&Method::GET, "/api/content/courses/abc-1/reviews")
            .unwrap();
        assert_eq!(params.get("courseId"), Some("abc-1"));
    }

    #[test]
    fn test_param_does_not_span_segments() {
        let template = get("/api/content/courses/{courseId}");
        assert!(template
            .matches(&Method::GET, "/api/content/courses/a/b")
            .is_none());
    }

    #[test]
    fn test_empty_segment_does_not_bind() {
        let template = get("/api/users/{userId}/progress");
        assert!(template.matches(&Method::GET, "/api/users//progress").is_none());
    }

    #[test]
    fn test_trailing_slash_is_a_different_path() {
        let template = get("/api/content/courses");
        assert!(template.matches(&Method::GET, "/api/content/courses/").is_none());
    }

    #[test]
    fn test_method_must_be_equal() {
        let template = RouteTemplate::parse(Method::POST, "/api/ugc/submit").unwrap();
        assert!(template.matches(&Method::POST, "/api/ugc/submit").is_some());
        assert!(template.matches(&Method::GET, "/api/ugc/submit").is_none());
    }

    #[test]
    fn test_literal_comparison_is_exact() {
        let template = get("/api/users/profile");
        assert!(template.matches(&Method::GET, "/api/users/Profile").is_none());
        assert!(template.matches(&Method::GET, "/api/users/profile%20").is_none());
    }

    #[test]
    fn test_root_template() {
        let template = get("/");
        assert!(template.matches(&Method::GET, "/").is_some());
        assert!(template.matches(&Method::GET, "/x").is_none());
    }

    #[test]
    fn test_path_without_leading_slash_never_matches() {
        let template = get("/health");
        assert!(template.matches(&Method::GET, "health").is_none());
    }

    #[test]
    fn test_has_param() {
        let template = get("/api/users/{userId}/progress");
        assert!(template.has_param("userId"));
        assert!(!template.has_param("id"));
    }

    #[test]
    fn test_display() {
        let template = get("/api/users/{userId}");
        assert_eq!(template.to_string(), "GET /api/users/{userId}");
    }

    #[test]
    fn test_rejects_missing_leading_slash() {
        let err = RouteTemplate::parse(Method::GET, "api/users").unwrap_err();
        assert!(matches!(err, TemplateError::MissingLeadingSlash { .. }));
    }

    #[test]
    fn test_rejects_partial_placeholder() {
        let err = RouteTemplate::parse(Method::GET, "/files/img-{id}").unwrap_err();
        assert!(matches!(err, TemplateError::PartialPlaceholder { .. }));

        let err = RouteTemplate::parse(Method::GET, "/files/{id").unwrap_err();
        assert!(matches!(err, TemplateError::PartialPlaceholder { .. }));
    }

    #[test]
    fn test_rejects_empty_and_invalid_names() {
        let err = RouteTemplate::parse(Method::GET, "/users/{}").unwrap_err();
        assert!(matches!(err, TemplateError::EmptyParamName { .. }));

        let err = RouteTemplate::parse(Method::GET, "/users/{user-id}").unwrap_err();
        assert!(matches!(err, TemplateError::InvalidParamName { .. }));
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let err = RouteTemplate::parse(Method::GET, "/users/{id}/friends/{id}").unwrap_err();
        assert!(matches!(err, TemplateError::DuplicateParam { ref name, .. } if name == "id"));
    }
}
