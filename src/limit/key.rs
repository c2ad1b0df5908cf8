//! Composite key construction.

/// A key identifying the principal being limited.
///
/// The limiter itself takes any opaque string; this type is a convenience
/// for callers limiting on composites (tenant + route, api key + method),
/// serialized in a consistent order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LimitKey {
    /// Namespace for the key, e.g. the service or domain name.
    pub scope: String,
    /// Ordered labeled parts of the composite.
    pub parts: Vec<(String, String)>,
}

impl LimitKey {
    /// Create a key with the given scope and no parts.
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            parts: Vec::new(),
        }
    }

    /// Append a labeled part.
    pub fn part(mut self, label: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push((label.into(), value.into()));
        self
    }
}

impl std::fmt::Display for LimitKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .parts
            .iter()
            .map(|(label, value)| format!("{}={}", label, value))
            .collect();
        write!(f, "{}:{}", self.scope, parts.join(","))
    }
}
