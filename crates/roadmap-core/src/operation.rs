//! Mutation requests and their inputs
//!
//! Sharing is expressed as usernames and group names; the store resolves
//! them into principal and group references when the write is prepared.

use crate::types::{
    ActionId, GoalId, MetaRoadmapId, ResourceKind, ResourceRef, RoadmapId, RoadmapType, Timestamp,
};
use roadmap_access::AccessLevel;
use serde::{Deserialize, Serialize};

/// Sharing rules as submitted by a client
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SharingInput {
    /// Usernames granted edit access
    pub editors: Vec<String>,
    /// Usernames granted view access
    pub viewers: Vec<String>,
    /// Group names granted edit access
    pub edit_groups: Vec<String>,
    /// Group names granted view access
    pub view_groups: Vec<String>,
}

/// External reference as submitted by a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkInput {
    /// Target URL
    pub url: String,
    /// Optional caption
    #[serde(default)]
    pub description: Option<String>,
}

/// Fields of a meta-roadmap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaRoadmapInput {
    /// Name
    pub name: String,
    /// Description
    #[serde(default)]
    pub description: String,
    /// Scope
    #[serde(default)]
    pub kind: RoadmapType,
    /// Responsible actor
    #[serde(default)]
    pub actor: Option<String>,
    /// Parent meta-roadmap
    #[serde(default)]
    pub parent: Option<MetaRoadmapId>,
    /// Sharing; `None` keeps the current rules on update
    #[serde(default)]
    pub sharing: Option<SharingInput>,
    /// Reference links; replace the current set on update
    #[serde(default)]
    pub links: Vec<LinkInput>,
}

/// Fields of a roadmap; `goals` are created alongside it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoadmapInput {
    /// Reporting period label
    pub period: Option<String>,
    /// Description
    pub description: Option<String>,
    /// Sharing; `None` keeps the current rules on update
    pub sharing: Option<SharingInput>,
    /// Goals created in the same commit
    pub goals: Vec<GoalInput>,
}

/// Fields of a goal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalInput {
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Description
    #[serde(default)]
    pub description: Option<String>,
    /// Indicator being tracked
    pub indicator_parameter: String,
    /// Unit of the data series
    pub data_unit: String,
    /// One cell per year from the configured first year; blank = no value
    pub data_series: Vec<String>,
    /// Reference links; replace the current set on update
    #[serde(default)]
    pub links: Vec<LinkInput>,
}

/// Fields of an action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionInput {
    /// Name
    pub name: String,
    /// Description
    #[serde(default)]
    pub description: Option<String>,
    /// First year the action runs
    #[serde(default)]
    pub start_year: Option<u16>,
    /// Last year the action runs
    #[serde(default)]
    pub end_year: Option<u16>,
    /// Reference links; replace the current set on update
    #[serde(default)]
    pub links: Vec<LinkInput>,
}

/// One mutating request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MutationRequest {
    /// Create a meta-roadmap, optionally under a parent
    CreateMetaRoadmap {
        /// Fields
        input: MetaRoadmapInput,
    },
    /// Update a meta-roadmap
    UpdateMetaRoadmap {
        /// Target
        id: MetaRoadmapId,
        /// Fields
        input: MetaRoadmapInput,
        /// Freshness token
        #[serde(default)]
        timestamp: Option<Timestamp>,
    },
    /// Delete a meta-roadmap and everything below it
    DeleteMetaRoadmap {
        /// Target
        id: MetaRoadmapId,
    },
    /// Create a roadmap and its nested goals
    CreateRoadmap {
        /// Parent meta-roadmap
        meta_roadmap: MetaRoadmapId,
        /// Fields
        input: RoadmapInput,
    },
    /// Update a roadmap, appending any nested goals
    UpdateRoadmap {
        /// Target
        id: RoadmapId,
        /// Fields
        input: RoadmapInput,
        /// Freshness token
        #[serde(default)]
        timestamp: Option<Timestamp>,
    },
    /// Delete a roadmap and everything below it
    DeleteRoadmap {
        /// Target
        id: RoadmapId,
    },
    /// Create a goal with its data series and links
    CreateGoal {
        /// Parent roadmap
        roadmap: RoadmapId,
        /// Fields
        input: GoalInput,
    },
    /// Update a goal, replacing its data series and links
    UpdateGoal {
        /// Target
        id: GoalId,
        /// Fields
        input: GoalInput,
        /// Freshness token
        #[serde(default)]
        timestamp: Option<Timestamp>,
    },
    /// Delete a goal and its actions
    DeleteGoal {
        /// Target
        id: GoalId,
    },
    /// Create an action under a goal
    CreateAction {
        /// Parent goal
        goal: GoalId,
        /// Fields
        input: ActionInput,
    },
    /// Update an action, replacing its links
    UpdateAction {
        /// Target
        id: ActionId,
        /// Fields
        input: ActionInput,
        /// Freshness token
        #[serde(default)]
        timestamp: Option<Timestamp>,
    },
    /// Delete an action
    DeleteAction {
        /// Target
        id: ActionId,
    },
    /// Comment on a resource
    CreateComment {
        /// Resource commented on
        target: ResourceRef,
        /// Body
        text: String,
    },
}

/// What a request does to its target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verb {
    /// Creates a new record
    Create,
    /// Replaces an existing record
    Update,
    /// Removes a record
    Delete,
}

impl MutationRequest {
    /// Kind of the record created, updated or deleted
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::CreateMetaRoadmap { .. }
            | Self::UpdateMetaRoadmap { .. }
            | Self::DeleteMetaRoadmap { .. } => ResourceKind::MetaRoadmap,
            Self::CreateRoadmap { .. } | Self::UpdateRoadmap { .. } | Self::DeleteRoadmap { .. } => {
                ResourceKind::Roadmap
            }
            Self::CreateGoal { .. } | Self::UpdateGoal { .. } | Self::DeleteGoal { .. } => {
                ResourceKind::Goal
            }
            Self::CreateAction { .. } | Self::UpdateAction { .. } | Self::DeleteAction { .. } => {
                ResourceKind::Action
            }
            Self::CreateComment { .. } => ResourceKind::Comment,
        }
    }

    /// Create, update or delete
    #[must_use]
    pub fn verb(&self) -> Verb {
        match self {
            Self::CreateMetaRoadmap { .. }
            | Self::CreateRoadmap { .. }
            | Self::CreateGoal { .. }
            | Self::CreateAction { .. }
            | Self::CreateComment { .. } => Verb::Create,
            Self::UpdateMetaRoadmap { .. }
            | Self::UpdateRoadmap { .. }
            | Self::UpdateGoal { .. }
            | Self::UpdateAction { .. } => Verb::Update,
            Self::DeleteMetaRoadmap { .. }
            | Self::DeleteRoadmap { .. }
            | Self::DeleteGoal { .. }
            | Self::DeleteAction { .. } => Verb::Delete,
        }
    }

    /// Operation name for logs and metrics
    #[must_use]
    pub fn op_name(&self) -> &'static str {
        match self {
            Self::CreateMetaRoadmap { .. } => "create_meta_roadmap",
            Self::UpdateMetaRoadmap { .. } => "update_meta_roadmap",
            Self::DeleteMetaRoadmap { .. } => "delete_meta_roadmap",
            Self::CreateRoadmap { .. } => "create_roadmap",
            Self::UpdateRoadmap { .. } => "update_roadmap",
            Self::DeleteRoadmap { .. } => "delete_roadmap",
            Self::CreateGoal { .. } => "create_goal",
            Self::UpdateGoal { .. } => "update_goal",
            Self::DeleteGoal { .. } => "delete_goal",
            Self::CreateAction { .. } => "create_action",
            Self::UpdateAction { .. } => "update_action",
            Self::DeleteAction { .. } => "delete_action",
            Self::CreateComment { .. } => "create_comment",
        }
    }

    /// Resource whose ACL governs the request, if any
    ///
    /// Creates are governed by their parent; a top-level meta-roadmap has
    /// no governing resource.
    #[must_use]
    pub fn governing_target(&self) -> Option<ResourceRef> {
        match self {
            Self::CreateMetaRoadmap { input } => input.parent.map(ResourceRef::MetaRoadmap),
            Self::UpdateMetaRoadmap { id, .. } | Self::DeleteMetaRoadmap { id } => {
                Some(ResourceRef::MetaRoadmap(*id))
            }
            Self::CreateRoadmap { meta_roadmap, .. } => Some(ResourceRef::MetaRoadmap(*meta_roadmap)),
            Self::UpdateRoadmap { id, .. } | Self::DeleteRoadmap { id } => {
                Some(ResourceRef::Roadmap(*id))
            }
            Self::CreateGoal { roadmap, .. } => Some(ResourceRef::Roadmap(*roadmap)),
            Self::UpdateGoal { id, .. } | Self::DeleteGoal { id } => Some(ResourceRef::Goal(*id)),
            Self::CreateAction { goal, .. } => Some(ResourceRef::Goal(*goal)),
            Self::UpdateAction { id, .. } | Self::DeleteAction { id } => {
                Some(ResourceRef::Action(*id))
            }
            Self::CreateComment { target, .. } => Some(*target),
        }
    }

    /// Minimum level the governing ACL must grant
    ///
    /// Deleting a meta-roadmap or roadmap additionally accepts authorship
    /// along the hierarchy in place of `Admin`.
    #[must_use]
    pub fn required_level(&self) -> AccessLevel {
        match self {
            Self::CreateComment { .. } => AccessLevel::View,
            Self::DeleteMetaRoadmap { .. } | Self::DeleteRoadmap { .. } => AccessLevel::Admin,
            _ => AccessLevel::Edit,
        }
    }

    /// Freshness token for updates
    #[must_use]
    pub fn timestamp(&self) -> Option<Timestamp> {
        match self {
            Self::UpdateMetaRoadmap { timestamp, .. }
            | Self::UpdateRoadmap { timestamp, .. }
            | Self::UpdateGoal { timestamp, .. }
            | Self::UpdateAction { timestamp, .. } => *timestamp,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_round_trips_through_tagged_json() {
        let json = serde_json::json!({
            "op": "create_goal",
            "roadmap": RoadmapId::new(),
            "input": {
                "indicator_parameter": "Emissions|CO2",
                "data_unit": "kt",
                "data_series": ["1", "", "2.5"]
            }
        });

        let request: MutationRequest = serde_json::from_value(json).unwrap();
        assert_eq!(request.kind(), ResourceKind::Goal);
        assert_eq!(request.verb(), Verb::Create);
        assert_eq!(request.required_level(), AccessLevel::Edit);
        assert!(request.timestamp().is_none());
    }

    #[test]
    fn top_level_meta_roadmap_has_no_governing_target() {
        let request = MutationRequest::CreateMetaRoadmap {
            input: MetaRoadmapInput {
                name: "Sweden 2045".into(),
                description: String::new(),
                kind: RoadmapType::Other,
                actor: None,
                parent: None,
                sharing: None,
                links: vec![],
            },
        };
        assert!(request.governing_target().is_none());
    }

    #[test]
    fn comments_need_view_and_deletes_of_documents_need_admin() {
        let comment = MutationRequest::CreateComment {
            target: ResourceRef::Roadmap(RoadmapId::new()),
            text: "hi".into(),
        };
        assert_eq!(comment.required_level(), AccessLevel::View);

        let delete = MutationRequest::DeleteRoadmap { id: RoadmapId::new() };
        assert_eq!(delete.required_level(), AccessLevel::Admin);
        assert_eq!(delete.verb(), Verb::Delete);
    }
}
