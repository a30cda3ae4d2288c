//! Path parameter extraction and storage.
//!
//! This module provides storage for placeholder bindings produced by a
//! template match. Bindings borrow from both the template and the matched
//! path, and use a small-vector optimization so that the common cases
//! (1-4 placeholders) never touch the heap.

use smallvec::SmallVec;

/// Maximum number of parameters stored inline (stack allocated).
const INLINE_PARAMS: usize = 4;

/// Placeholder bindings extracted from a route match.
///
/// Parameters are stored as `(name, value)` pairs in template order.
///
/// # Example
///
/// ```rust
/// use palisade_router::Params;
///
/// let mut params = Params::new();
/// params.push("userId", "123");
/// params.push("courseId", "c-9");
///
/// assert_eq!(params.get("userId"), Some("123"));
/// assert_eq!(params.get("courseId"), Some("c-9"));
/// assert_eq!(params.get("unknown"), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Params<'a> {
    /// Storage for parameter (name, value) pairs
    inner: SmallVec<[(&'a str, &'a str); INLINE_PARAMS]>,
}

impl<'a> Params<'a> {
    /// Creates a new empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a binding to the set.
    pub fn push(&mut self, name: &'a str, value: &'a str) {
        self.inner.push((name, value));
    }

    /// Returns the value bound to a placeholder by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&'a str> {
        self.inner
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| *v)
    }

    /// Returns true if there are no bindings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns the number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns an iterator over the bindings.
    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a str)> + '_ {
        self.inner.iter().copied()
    }
}
