//! Group: the ordered set of property locators a rule depends on.
//!
//! A [`Group`] is a plain value. It owns no connection resource and is
//! compared structurally, so it can key the per-group vote and
//! service-ownership maps directly.

use serde::{Deserialize, Serialize};

/// One (object path, interface, property) locator.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Member {
    pub path: String,
    pub interface: String,
    pub property: String,
}

impl Member {
    #[must_use]
    pub fn new(
        path: impl Into<String>,
        interface: impl Into<String>,
        property: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            interface: interface.into(),
            property: property.into(),
        }
    }
}

impl std::fmt::Display for Member {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}.{}", self.path, self.interface, self.property)
    }
}

/// An immutable, ordered sequence of [`Member`]s.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Group(Vec<Member>);

impl Group {
    #[must_use]
    pub fn new(members: Vec<Member>) -> Self {
        Self(members)
    }

    #[must_use]
    pub fn members(&self) -> &[Member] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Member> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Member> for Group {
    fn from_iter<I: IntoIterator<Item = Member>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Group {
    type Item = &'a Member;
    type IntoIter = std::slice::Iter<'a, Member>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
