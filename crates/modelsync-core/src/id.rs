#![forbid(unsafe_code)]

//! Opaque node identity.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// The opaque key identifying an addressable node in a model tree.
///
/// Ids are arbitrary strings supplied by the host's [`Model`] type. They are
/// cheap to clone (`Arc<str>` inside) and hashable, so they can be fanned
/// out across index buckets and delta sets without copying the text.
///
/// Uniqueness across live nodes is the host's responsibility: a duplicate id
/// silently conflates the nodes under one subscription bucket.
///
/// [`Model`]: crate::model::Model
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelId(Arc<str>);

impl ModelId {
    /// The id's textual form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ModelId {
    fn from(value: &str) -> Self {
        Self(Arc::from(value))
    }
}

impl From<String> for ModelId {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

impl From<Arc<str>> for ModelId {
    fn from(value: Arc<str>) -> Self {
        Self(value)
    }
}

impl Borrow<str> for ModelId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModelId({:?})", &*self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahash::AHashSet;

    #[test]
    fn equality_and_hash_by_text() {
        let a = ModelId::from("node-1");
        let b = ModelId::from(String::from("node-1"));
        let c = ModelId::from("node-2");
        assert_eq!(a, b);
        assert_ne!(a, c);

        let mut set = AHashSet::new();
        set.insert(a.clone());
        set.insert(b);
        set.insert(c);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn lookup_by_str_borrow() {
        let mut set = AHashSet::new();
        set.insert(ModelId::from("x"));
        assert!(set.contains("x"));
        assert!(!set.contains("y"));
    }

    #[test]
    fn clone_is_cheap_and_equal() {
        let a = ModelId::from("shared");
        let b = a.clone();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "shared");
    }

    #[test]
    fn display_and_debug() {
        let id = ModelId::from("root");
        assert_eq!(id.to_string(), "root");
        assert_eq!(format!("{id:?}"), "ModelId(\"root\")");
    }
}
