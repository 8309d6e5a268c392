//! The canonical five-field access-control descriptor

use crate::principal::{Group, PrincipalId, PrincipalRef};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Ownership and sharing rules attached to an authorizable resource
///
/// Every loader produces exactly this shape and the evaluator consumes only
/// this shape. Each set deduplicates by identity: principal id for the
/// principal sets, group name for the group sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControlled {
    /// Owner; always present
    pub author: PrincipalRef,
    /// Principals granted edit access
    #[serde(default)]
    pub editors: IndexSet<PrincipalRef>,
    /// Principals granted view access
    #[serde(default)]
    pub viewers: IndexSet<PrincipalRef>,
    /// Groups granted edit access
    #[serde(default)]
    pub edit_groups: IndexSet<Group>,
    /// Groups granted view access
    #[serde(default)]
    pub view_groups: IndexSet<Group>,
}

impl AccessControlled {
    /// ACL owned by `author` with no further grants
    #[must_use]
    pub fn owned_by(author: PrincipalRef) -> Self {
        Self {
            author,
            editors: IndexSet::new(),
            viewers: IndexSet::new(),
            edit_groups: IndexSet::new(),
            view_groups: IndexSet::new(),
        }
    }

    /// Add editors
    #[must_use]
    pub fn with_editors(mut self, editors: impl IntoIterator<Item = PrincipalRef>) -> Self {
        self.editors.extend(editors);
        self
    }

    /// Add viewers
    #[must_use]
    pub fn with_viewers(mut self, viewers: impl IntoIterator<Item = PrincipalRef>) -> Self {
        self.viewers.extend(viewers);
        self
    }

    /// Add edit groups by name
    #[must_use]
    pub fn with_edit_groups<S: Into<String>>(mut self, groups: impl IntoIterator<Item = S>) -> Self {
        self.edit_groups.extend(groups.into_iter().map(Group::new));
        self
    }

    /// Add view groups by name
    #[must_use]
    pub fn with_view_groups<S: Into<String>>(mut self, groups: impl IntoIterator<Item = S>) -> Self {
        self.view_groups.extend(groups.into_iter().map(Group::new));
        self
    }

    /// True if `id` owns this resource
    #[inline]
    #[must_use]
    pub fn is_author(&self, id: PrincipalId) -> bool {
        self.author.id == id
    }

    /// True if `id` is listed as an editor
    #[must_use]
    pub fn lists_editor(&self, id: PrincipalId) -> bool {
        self.editors.iter().any(|p| p.id == id)
    }

    /// True if `id` is listed as a viewer
    #[must_use]
    pub fn lists_viewer(&self, id: PrincipalId) -> bool {
        self.viewers.iter().any(|p| p.id == id)
    }

    /// True if the named group may view
    #[must_use]
    pub fn grants_view_to_group(&self, name: &str) -> bool {
        self.view_groups.iter().any(|g| g.name == name)
    }

    /// True if the sharing fields (everything but the author) differ
    #[must_use]
    pub fn sharing_differs(&self, other: &AccessControlled) -> bool {
        !(same_members(&self.editors, &other.editors)
            && same_members(&self.viewers, &other.viewers)
            && same_members(&self.edit_groups, &other.edit_groups)
            && same_members(&self.view_groups, &other.view_groups))
    }
}

fn same_members<T: std::hash::Hash + Eq>(a: &IndexSet<T>, b: &IndexSet<T>) -> bool {
    a.len() == b.len() && a.iter().all(|item| b.contains(item))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(name: &str) -> PrincipalRef {
        PrincipalRef::new(PrincipalId::new(), name)
    }

    #[test]
    fn sets_deduplicate_by_identity() {
        let bob = person("bob");
        let bob_again = PrincipalRef::new(bob.id, "bob (old name)");

        let acl = AccessControlled::owned_by(person("alice"))
            .with_editors([bob.clone(), bob_again])
            .with_view_groups(["Public", "Public"]);

        assert_eq!(acl.editors.len(), 1);
        assert_eq!(acl.view_groups.len(), 1);
        assert!(acl.lists_editor(bob.id));
        assert!(acl.grants_view_to_group("Public"));
    }

    #[test]
    fn sharing_comparison_ignores_order() {
        let alice = person("alice");
        let a = AccessControlled::owned_by(alice.clone()).with_edit_groups(["A", "B"]);
        let b = AccessControlled::owned_by(alice.clone()).with_edit_groups(["B", "A"]);
        let c = AccessControlled::owned_by(alice).with_edit_groups(["A"]);

        assert!(!a.sharing_differs(&b));
        assert!(a.sharing_differs(&c));
    }
}
