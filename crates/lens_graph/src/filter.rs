//! Name filters for selecting hook points.
//!
//! Every registry operation that targets hook points takes something that
//! converts into a [`NameFilter`]:
//!
//! - a single name (`"blocks.0.hook_resid_pre"`) → [`NameFilter::Exact`]
//! - a collection of names (`["embed", "unembed"]`) → [`NameFilter::Set`]
//! - a closure over names → [`NameFilter::predicate`]
//! - `None` → [`NameFilter::All`]
//!
//! Exact filters are strict: an exact name that the registry does not know is
//! an error. Sets and predicates are selectors: matching zero hook points is
//! fine.
//!
//! # Example
//!
//! ```ignore
//! use lens_graph::filter::NameFilter;
//!
//! let resid = NameFilter::predicate(|name| name.ends_with("hook_resid_pre"));
//! let pair: NameFilter = ["blocks.0.hook_q", "blocks.0.hook_k"].into();
//! assert!(resid.matches("blocks.7.hook_resid_pre"));
//! assert!(!pair.matches("blocks.0.hook_v"));
//! ```

use core::fmt;
use std::sync::Arc;

use hashbrown::HashSet;

/// Boolean function over hook point names.
pub type NamePredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Selects hook points by name.
#[derive(Clone, Default)]
pub enum NameFilter {
    /// Every hook point.
    #[default]
    All,
    /// Exactly one hook point, which must exist.
    Exact(String),
    /// Any hook point whose name is in the set.
    Set(HashSet<String>),
    /// Any hook point whose name satisfies the predicate.
    Predicate(NamePredicate),
}

impl NameFilter {
    /// Builds a filter from a closure over names.
    #[must_use]
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        NameFilter::Predicate(Arc::new(f))
    }

    /// Builds a filter matching any of `names`.
    #[must_use]
    pub fn set<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        NameFilter::Set(names.into_iter().map(Into::into).collect())
    }

    /// Returns `true` if `name` is selected.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        match self {
            NameFilter::All => true,
            NameFilter::Exact(exact) => exact == name,
            NameFilter::Set(names) => names.contains(name),
            NameFilter::Predicate(f) => f(name),
        }
    }

    /// Returns the name if this is an exact filter.
    #[must_use]
    pub fn as_exact(&self) -> Option<&str> {
        match self {
            NameFilter::Exact(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Debug for NameFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameFilter::All => f.write_str("All"),
            NameFilter::Exact(name) => f.debug_tuple("Exact").field(name).finish(),
            NameFilter::Set(names) => {
                let mut sorted: Vec<_> = names.iter().collect();
                sorted.sort();
                f.debug_tuple("Set").field(&sorted).finish()
            }
            NameFilter::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl From<&str> for NameFilter {
    fn from(name: &str) -> Self {
        NameFilter::Exact(name.to_string())
    }
}

impl From<String> for NameFilter {
    fn from(name: String) -> Self {
        NameFilter::Exact(name)
    }
}

impl From<&String> for NameFilter {
    fn from(name: &String) -> Self {
        NameFilter::Exact(name.clone())
    }
}

impl From<Vec<String>> for NameFilter {
    fn from(names: Vec<String>) -> Self {
        NameFilter::set(names)
    }
}

impl From<Vec<&str>> for NameFilter {
    fn from(names: Vec<&str>) -> Self {
        NameFilter::set(names)
    }
}

impl From<&[&str]> for NameFilter {
    fn from(names: &[&str]) -> Self {
        NameFilter::set(names.iter().copied())
    }
}

impl<const N: usize> From<[&str; N]> for NameFilter {
    fn from(names: [&str; N]) -> Self {
        NameFilter::set(names)
    }
}

impl From<HashSet<String>> for NameFilter {
    fn from(names: HashSet<String>) -> Self {
        NameFilter::Set(names)
    }
}

impl From<NamePredicate> for NameFilter {
    fn from(f: NamePredicate) -> Self {
        NameFilter::Predicate(f)
    }
}

impl<T: Into<NameFilter>> From<Option<T>> for NameFilter {
    fn from(filter: Option<T>) -> Self {
        filter.map_or(NameFilter::All, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_matches_one_name() {
        let filter: NameFilter = "blocks.0.hook_q".into();
        assert!(filter.matches("blocks.0.hook_q"));
        assert!(!filter.matches("blocks.0.hook_k"));
        assert_eq!(filter.as_exact(), Some("blocks.0.hook_q"));
    }

    #[test]
    fn set_matches_members() {
        let filter: NameFilter = vec!["a", "c"].into();
        assert!(filter.matches("a"));
        assert!(!filter.matches("b"));
        assert!(filter.matches("c"));
        assert_eq!(filter.as_exact(), None);
    }

    #[test]
    fn predicate_filter() {
        let filter = NameFilter::predicate(|name| name.starts_with("blocks.0"));
        assert!(filter.matches("blocks.0.hook_resid_pre"));
        assert!(!filter.matches("blocks.1.hook_resid_pre"));
        assert_eq!(format!("{filter:?}"), "Predicate(..)");
    }

    #[test]
    fn none_means_all() {
        let filter: NameFilter = None::<&str>.into();
        assert!(filter.matches("anything"));
        let filter: NameFilter = Some("embed").into();
        assert_eq!(filter.as_exact(), Some("embed"));
    }

    #[test]
    fn set_debug_is_sorted() {
        let filter: NameFilter = ["z", "a"].into();
        assert_eq!(format!("{filter:?}"), r#"Set(["a", "z"])"#);
    }
}
