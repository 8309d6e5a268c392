//! Orphan pruning
//!
//! After a delete or an update that replaces links, links held by no
//! surviving record and comments whose target is gone are removed. Pruning
//! runs after the primary commit and is not transactional with it.

use crate::error::StoreError;
use crate::store::{OrphanSet, ReferenceSnapshot, RoadmapStore};
use serde::{Deserialize, Serialize};

/// Counts of records removed by one pruning pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PruneReport {
    /// Links removed
    pub links_removed: usize,
    /// Comments removed
    pub comments_removed: usize,
}

impl PruneReport {
    /// Total records removed
    #[inline]
    #[must_use]
    pub fn total(&self) -> usize {
        self.links_removed + self.comments_removed
    }
}

/// Select unreferenced links and comments on missing targets
#[must_use]
pub fn find_orphans(snapshot: &ReferenceSnapshot) -> OrphanSet {
    let links = snapshot
        .links
        .iter()
        .filter(|id| !snapshot.referenced_links.contains(id))
        .copied()
        .collect();

    let comments = snapshot
        .comments
        .iter()
        .filter(|(_, target)| !snapshot.live_resources.contains(target))
        .map(|(id, _)| *id)
        .collect();

    OrphanSet { links, comments }
}

/// Scan the store and remove orphans
///
/// # Errors
/// Any store failure while scanning or removing.
pub async fn prune_orphans<S>(store: &S) -> Result<PruneReport, StoreError>
where
    S: RoadmapStore + ?Sized,
{
    let snapshot = store.reference_snapshot().await?;
    let orphans = find_orphans(&snapshot);
    if orphans.is_empty() {
        return Ok(PruneReport::default());
    }

    store.remove_orphans(&orphans).await?;

    let report = PruneReport {
        links_removed: orphans.links.len(),
        comments_removed: orphans.comments.len(),
    };
    tracing::debug!(
        links = report.links_removed,
        comments = report.comments_removed,
        "pruned orphans"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CommentId, GoalId, LinkId, ResourceRef, RoadmapId};

    #[test]
    fn unreferenced_links_and_dangling_comments_are_orphans() {
        let kept = LinkId::new();
        let dropped = LinkId::new();
        let live_goal = ResourceRef::Goal(GoalId::new());
        let dead_goal = ResourceRef::Goal(GoalId::new());
        let live_comment = CommentId::new();
        let dead_comment = CommentId::new();

        let snapshot = ReferenceSnapshot {
            links: vec![kept, dropped],
            referenced_links: [kept].into_iter().collect(),
            comments: vec![(live_comment, live_goal), (dead_comment, dead_goal)],
            live_resources: [live_goal, ResourceRef::Roadmap(RoadmapId::new())]
                .into_iter()
                .collect(),
        };

        let orphans = find_orphans(&snapshot);
        assert_eq!(orphans.links, vec![dropped]);
        assert_eq!(orphans.comments, vec![dead_comment]);
    }

    #[test]
    fn clean_snapshot_has_no_orphans() {
        let link = LinkId::new();
        let snapshot = ReferenceSnapshot {
            links: vec![link],
            referenced_links: [link].into_iter().collect(),
            ..ReferenceSnapshot::default()
        };
        assert!(find_orphans(&snapshot).is_empty());
    }
}
