//! Tags name the outputs of a multi-output problem: the objective, each
//! constraint, or one local sub-output of either.

use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;

use serde::{Deserialize, Serialize};

use crate::errors::UtilError;

/// Tag used when a caller does not name one.
pub const OBJECTIVE: &str = "OBJECTIVE";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(String);

impl Tag {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn objective() -> Self {
        Self(OBJECTIVE.to_owned())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Tag {
    fn from(name: &str) -> Self {
        Self(name.to_owned())
    }
}

impl From<String> for Tag {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl Borrow<str> for Tag {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for Tag {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Tag {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A tag optionally narrowed to one local sub-output.
///
/// Equality and hashing are structural over both fields.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LocalizedTag {
    global_tag: Tag,
    local_index: Option<usize>,
}

impl LocalizedTag {
    #[must_use]
    pub fn new(global_tag: impl Into<Tag>, local_index: Option<usize>) -> Self {
        Self {
            global_tag: global_tag.into(),
            local_index,
        }
    }

    /// Accepts either a plain tag (no local index) or an existing
    /// `LocalizedTag` (returned unchanged).
    #[must_use]
    pub fn from_tag(tag: impl Into<Self>) -> Self {
        tag.into()
    }

    #[must_use]
    pub fn global_tag(&self) -> &Tag {
        &self.global_tag
    }

    #[must_use]
    pub fn local_index(&self) -> Option<usize> {
        self.local_index
    }

    #[must_use]
    pub fn is_local(&self) -> bool {
        self.local_index.is_some()
    }
}

impl From<Tag> for LocalizedTag {
    fn from(global_tag: Tag) -> Self {
        Self::new(global_tag, None)
    }
}

impl From<&str> for LocalizedTag {
    fn from(global_tag: &str) -> Self {
        Self::new(global_tag, None)
    }
}

impl From<String> for LocalizedTag {
    fn from(global_tag: String) -> Self {
        Self::new(global_tag, None)
    }
}

impl std::fmt::Debug for LocalizedTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LocalizedTag(global_tag='{}', local_index=", self.global_tag)?;
        match self.local_index {
            Some(index) => write!(f, "{index})"),
            None => f.write_str("None)"),
        }
    }
}

impl std::fmt::Display for LocalizedTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// Associative containers keyed by [`Tag`] that can be searched by tag name.
pub trait TagMapping {
    type Value;

    fn get_tagged(&self, tag: &str) -> Option<(&Tag, &Self::Value)>;
}

impl<V> TagMapping for BTreeMap<Tag, V> {
    type Value = V;

    fn get_tagged(&self, tag: &str) -> Option<(&Tag, &V)> {
        self.get_key_value(tag)
    }
}

impl<V, S: BuildHasher> TagMapping for HashMap<Tag, V, S> {
    type Value = V;

    fn get_tagged(&self, tag: &str) -> Option<(&Tag, &V)> {
        self.get_key_value(tag)
    }
}

/// Returns the first of `tags` present in `mapping`, with its value.
///
/// An empty `tags` slice searches for [`OBJECTIVE`]. A missing mapping yields
/// `(None, None)`; a present mapping with none of the candidates is an error
/// listing every candidate tried.
pub fn get_value_for_tag<'m, M>(
    mapping: Option<&'m M>,
    tags: &[&str],
) -> Result<(Option<Tag>, Option<&'m M::Value>), UtilError>
where
    M: TagMapping + ?Sized,
{
    let Some(mapping) = mapping else {
        return Ok((None, None));
    };

    let candidates: &[&str] = if tags.is_empty() { &[OBJECTIVE] } else { tags };

    match candidates.iter().find_map(move |tag| mapping.get_tagged(tag)) {
        Some((tag, value)) => {
            tracing::trace!(stage = "tag", %tag, "resolved tag");
            Ok((Some(tag.clone()), Some(value)))
        }
        None => {
            tracing::debug!(stage = "tag", ?candidates, "no candidate tag in mapping");
            Err(UtilError::TagNotFound {
                tags: candidates.iter().map(|tag| (*tag).to_owned()).collect(),
            })
        }
    }
}
