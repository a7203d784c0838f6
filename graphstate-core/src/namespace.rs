use std::fmt;

use crate::error::StoreError;

/// Joins namespace segments into the single stored field. Segments may not
/// contain it.
pub const NAMESPACE_SEPARATOR: &str = "/";

/// Ordered path scoping memory records, e.g. `["user-42", "memories"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Namespace {
    segments: Vec<String>,
}

impl Namespace {
    pub fn new<I, S>(segments: I) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(StoreError::InvalidNamespace(
                "namespace must have at least one segment".to_string(),
            ));
        }

        for segment in &segments {
            if segment.trim().is_empty() {
                return Err(StoreError::InvalidNamespace(format!(
                    "namespace segments must not be empty: {segments:?}"
                )));
            }
            if segment.contains(NAMESPACE_SEPARATOR) {
                return Err(StoreError::InvalidNamespace(format!(
                    "namespace segment {segment:?} contains the separator '{NAMESPACE_SEPARATOR}'"
                )));
            }
        }

        Ok(Self { segments })
    }

    /// Inverse of [`Namespace::joined`].
    pub fn parse(joined: &str) -> Result<Self, StoreError> {
        Self::new(joined.split(NAMESPACE_SEPARATOR))
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn joined(&self) -> String {
        self.segments.join(NAMESPACE_SEPARATOR)
    }

    pub fn starts_with(&self, prefix: &Namespace) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    pub fn child(&self, segment: impl Into<String>) -> Result<Self, StoreError> {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self::new(segments)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.joined())
    }
}
