//! Structured names for hook points.
//!
//! Names are assigned by the owning registry during setup and reflect the
//! hook point's position in the module tree, e.g. `blocks.3.attn.hook_q`.
//! The layer index is extracted once, when the name is built, so asking a
//! hook point for its layer is a field access rather than a parse.

use core::fmt;

use crate::error::{HookError, Result};

/// A dotted path identifying a hook point within its registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HookName {
    /// The full dotted string, kept for cheap borrowing.
    full: String,
    /// Number of path segments.
    depth: usize,
    /// Byte offset where the first segment ends.
    prefix_end: usize,
    /// The layer index, when the second segment is numeric.
    layer: Option<usize>,
}

impl HookName {
    /// Builds a name from its path segments.
    ///
    /// The layer index is recorded when there are at least two segments and
    /// the second one parses as an unsigned integer.
    #[must_use]
    pub fn from_segments<S: AsRef<str>>(segments: &[S]) -> Self {
        let full = segments
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(".");
        let prefix_end = segments.first().map_or(0, |s| s.as_ref().len());
        let layer = segments
            .get(1)
            .and_then(|segment| segment.as_ref().parse::<usize>().ok());

        Self {
            full,
            depth: segments.len(),
            prefix_end,
            layer,
        }
    }

    /// Parses a dotted string into a name.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        let segments: Vec<&str> = name.split('.').collect();
        Self::from_segments(&segments)
    }

    /// Returns the dotted string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.full
    }

    /// Returns the first path segment.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.full[..self.prefix_end]
    }

    /// Returns the number of path segments.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Returns the segments after the layer index, joined by dots.
    ///
    /// `None` when the name carries no layer index.
    #[must_use]
    pub fn suffix(&self) -> Option<&str> {
        self.layer?;
        let mut parts = self.full.splitn(3, '.');
        parts.next();
        parts.next();
        Some(parts.next().unwrap_or(""))
    }

    /// Returns the layer index, if the name follows `<prefix>.<layer>.<rest>`.
    #[must_use]
    pub fn layer(&self) -> Option<usize> {
        self.layer
    }

    /// Returns the layer index or a [`HookError::MalformedName`].
    ///
    /// # Errors
    ///
    /// Fails if the name has fewer than two segments or its second segment
    /// is not numeric.
    pub fn try_layer(&self) -> Result<usize> {
        self.layer
            .ok_or_else(|| HookError::MalformedName(self.full.clone()))
    }
}

impl fmt::Display for HookName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full)
    }
}

impl AsRef<str> for HookName {
    fn as_ref(&self) -> &str {
        &self.full
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_from_second_segment() {
        let name = HookName::parse("blocks.3.attn");
        assert_eq!(name.layer(), Some(3));
        assert_eq!(name.try_layer().unwrap(), 3);
        assert_eq!(name.prefix(), "blocks");
        assert_eq!(name.suffix(), Some("attn"));
        assert_eq!(name.depth(), 3);
    }

    #[test]
    fn two_segment_name_has_empty_suffix() {
        let name = HookName::from_segments(&["blocks", "12"]);
        assert_eq!(name.as_str(), "blocks.12");
        assert_eq!(name.layer(), Some(12));
        assert_eq!(name.suffix(), Some(""));
    }

    #[test]
    fn names_without_layer_are_malformed() {
        for raw in ["embed", "blocks.attn.hook_q", "ln_final.hook_scale", "blocks.-1.x"] {
            let name = HookName::parse(raw);
            assert!(
                matches!(name.try_layer(), Err(HookError::MalformedName(n)) if n == raw),
                "{raw} should not resolve to a layer"
            );
            assert_eq!(name.suffix(), None);
        }
    }

    #[test]
    fn display_round_trips_the_dotted_form() {
        let name = HookName::from_segments(&["blocks", "0", "mlp", "hook_post"]);
        assert_eq!(name.to_string(), "blocks.0.mlp.hook_post");
        assert_eq!(HookName::parse(name.as_str()), name);
    }
}
