//! Principals and groups
//!
//! A [`Principal`] is the already-authenticated caller as loaded for one
//! request. Group membership is resolved elsewhere and arrives here as a flat
//! set of names.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// Stable principal identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(pub Uuid);

impl PrincipalId {
    /// Generate a new random id
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PrincipalId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The acting principal for one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Identifier
    pub id: PrincipalId,
    /// Display name, unique per principal
    pub username: String,
    /// Administrator flag
    #[serde(default)]
    pub is_admin: bool,
    /// Names of the groups this principal belongs to
    #[serde(default)]
    pub groups: BTreeSet<String>,
}

impl Principal {
    /// Create a non-admin principal without groups
    #[must_use]
    pub fn new(id: PrincipalId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            is_admin: false,
            groups: BTreeSet::new(),
        }
    }

    /// Set the admin flag
    #[inline]
    #[must_use]
    pub fn with_admin(mut self, is_admin: bool) -> Self {
        self.is_admin = is_admin;
        self
    }

    /// Add group memberships
    #[must_use]
    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups.extend(groups.into_iter().map(Into::into));
        self
    }

    /// Check membership by group name
    #[inline]
    #[must_use]
    pub fn in_group(&self, name: &str) -> bool {
        self.groups.contains(name)
    }

    /// Reference form used inside ACLs
    #[must_use]
    pub fn to_ref(&self) -> PrincipalRef {
        PrincipalRef::new(self.id, self.username.clone())
    }
}

/// Reference to a principal as stored in an ACL
///
/// Identity is the id alone; the username is carried for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrincipalRef {
    /// Identifier
    pub id: PrincipalId,
    /// Display name at the time the snapshot was taken
    pub username: String,
}

impl PrincipalRef {
    /// Create a reference
    #[must_use]
    pub fn new(id: PrincipalId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
        }
    }
}

impl PartialEq for PrincipalRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PrincipalRef {}

impl Hash for PrincipalRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// A named group; names are unique and case-sensitive
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Group {
    /// Group name
    pub name: String,
}

impl Group {
    /// Create a group reference by name
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}
