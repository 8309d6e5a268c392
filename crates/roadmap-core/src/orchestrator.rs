//! Mutation orchestrator
//!
//! Every mutating request runs the same pipeline regardless of resource
//! kind: validate, authenticate, resolve the governing ACL, evaluate policy,
//! check freshness (updates only), commit, then prune orphans. A failure at
//! any step ends the request; nothing is retried.

use crate::config::{ConfigError, OrchestratorConfig};
use crate::error::MutationError;
use crate::freshness::check_freshness;
use crate::hierarchy::{ancestry_contains, require_national_clearance, resolve, Resolved};
use crate::operation::{GoalInput, LinkInput, MutationRequest, Verb};
use crate::pruning::{prune_orphans, PruneReport};
use crate::session::Session;
use crate::stage::{MutationStage, StageTrail};
use crate::store::{Changeset, RoadmapStore};
use crate::types::{
    Action, ActionId, Comment, CommentId, Entity, Goal, GoalId, Link, LinkId, MetaRoadmap,
    MetaRoadmapId, MutationId, ResourceRef, Roadmap, RoadmapId, Timestamp,
};
use crate::validation::{validate_goal, validate_request};
use chrono::Utc;
use indexmap::IndexSet;
use roadmap_access::{
    authorize, evaluate, AccessControlled, AccessDenied, AccessLevel, Principal, PrincipalRef,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::Instrument;

/// Result of a successful mutation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MutationOutcome {
    /// Request identifier
    pub mutation_id: MutationId,
    /// Operation name
    pub op: &'static str,
    /// What the request did
    pub verb: Verb,
    /// Record created, updated or deleted; for comments, the record
    /// commented on
    pub target: ResourceRef,
    /// Hierarchy records inserted, including nested goals
    pub created: Vec<ResourceRef>,
    /// Comment inserted, if any
    pub comment: Option<CommentId>,
    /// HTTP status the transport layer answers with
    pub status: u16,
    /// Page to redirect to
    pub location: String,
    /// New stamp of the target; `None` after a delete
    pub last_modified: Option<Timestamp>,
    /// Pruning result; `None` if pruning did not run or failed
    pub pruned: Option<PruneReport>,
    /// Lifecycle stages passed
    pub stages: Vec<MutationStage>,
}

/// Prepared write plus what to report about it
struct Plan {
    changes: Changeset,
    target: ResourceRef,
    created: Vec<ResourceRef>,
    comment: Option<CommentId>,
    location: String,
}

/// Authorizes and applies mutations against a [`RoadmapStore`]
pub struct MutationOrchestrator<S> {
    store: Arc<S>,
    config: OrchestratorConfig,
}

impl<S> MutationOrchestrator<S>
where
    S: RoadmapStore,
{
    /// Create an orchestrator over `store`
    ///
    /// # Errors
    /// [`ConfigError`] if the configuration is inconsistent.
    pub fn new(store: Arc<S>, config: OrchestratorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { store, config })
    }

    /// Create an orchestrator with default limits
    #[must_use]
    pub fn with_defaults(store: Arc<S>) -> Self {
        Self {
            store,
            config: OrchestratorConfig::default(),
        }
    }

    /// Underlying store
    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Run one mutating request
    ///
    /// # Errors
    /// The [`MutationError`] of the first failing step. `BadSession` is
    /// returned after the session has been destroyed.
    pub async fn mutate(
        &self,
        session: &dyn Session,
        request: MutationRequest,
    ) -> Result<MutationOutcome, MutationError> {
        let mutation_id = MutationId::new();
        let kind = request.kind();
        let op = request.op_name();
        let span = tracing::info_span!(
            "mutation",
            id = %mutation_id,
            op,
            principal = tracing::field::Empty,
        );

        let result = self
            .run(mutation_id, session, request)
            .instrument(span.clone())
            .await;

        span.in_scope(|| match &result {
            Ok(outcome) => tracing::info!(
                target = %outcome.target,
                status = outcome.status,
                "mutation committed"
            ),
            Err(err @ MutationError::Internal(_)) => tracing::error!(error = %err, "mutation failed"),
            Err(err) => tracing::warn!(error = %err, status = err.status_code(), "mutation rejected"),
        });

        let outcome = match &result {
            Ok(_) => "ok",
            Err(err) => err.kind(),
        };
        metrics::counter!(
            "roadmap_mutations_total",
            "kind" => kind.as_str(),
            "outcome" => outcome
        )
        .increment(1);

        result
    }

    async fn run(
        &self,
        mutation_id: MutationId,
        session: &dyn Session,
        request: MutationRequest,
    ) -> Result<MutationOutcome, MutationError> {
        let mut trail = StageTrail::start();
        validate_request(&request, &self.config)?;

        let principal = self
            .principal_for(session)
            .await?
            .ok_or(MutationError::Unauthenticated)?;
        tracing::Span::current().record("principal", principal.username.as_str());
        trail.advance(MutationStage::Authenticated)?;

        let governing = match request.governing_target() {
            Some(target) => Some(
                resolve(self.store.as_ref(), target)
                    .await
                    .map_err(MutationError::from_load)?,
            ),
            None => None,
        };
        trail.advance(MutationStage::AclResolved)?;

        require_national_clearance(national_scope(&request, governing.as_ref()), Some(&principal))?;
        check_policy(&request, governing.as_ref(), &principal)?;
        let acl = self
            .prepare_acl(&request, governing.as_ref(), &principal)
            .await?;
        trail.advance(MutationStage::PolicyEvaluated)?;

        let verb = request.verb();
        if verb == Verb::Update {
            let stored = governing
                .as_ref()
                .map(|g| g.entity.last_modified())
                .ok_or_else(|| MutationError::Internal("update without a stored record".into()))?;
            check_freshness(stored, request.timestamp()).map_err(|conflict| {
                tracing::warn!(
                    stored = %conflict.stored,
                    client = ?conflict.client,
                    "stale update rejected"
                );
                MutationError::StaleData
            })?;
            trail.advance(MutationStage::FreshnessChecked)?;
        }

        let op = request.op_name();
        let plan = self.plan(request, governing, &principal, acl)?;
        let receipt = self
            .store
            .commit(plan.changes)
            .await
            .map_err(MutationError::from_commit)?;
        trail.advance(MutationStage::Committed)?;

        let pruned = if verb == Verb::Create {
            None
        } else {
            let report = self.prune().await;
            trail.advance(MutationStage::Pruned)?;
            report
        };

        Ok(MutationOutcome {
            mutation_id,
            op,
            verb,
            target: plan.target,
            created: plan.created,
            comment: plan.comment,
            status: if verb == Verb::Create { 201 } else { 200 },
            location: plan.location,
            last_modified: (verb != Verb::Delete).then_some(receipt.stamp),
            pruned,
            stages: trail.stages().to_vec(),
        })
    }

    /// Read a record; requires at least `View` on its governing ACL
    ///
    /// # Errors
    /// `AccessDenied` for missing records and insufficient access;
    /// `BadSession` for a contradicted admin claim.
    pub async fn fetch(
        &self,
        session: &dyn Session,
        target: ResourceRef,
    ) -> Result<Entity, MutationError> {
        let principal = self.principal_for(session).await?;
        let resolved = resolve(self.store.as_ref(), target)
            .await
            .map_err(MutationError::from_load)?;
        authorize(&resolved.acl, principal.as_ref(), AccessLevel::View)?;
        Ok(resolved.entity)
    }

    /// Level `principal` holds on `target`
    ///
    /// # Errors
    /// `AccessDenied` if the target does not exist.
    pub async fn access_level(
        &self,
        principal: Option<&Principal>,
        target: ResourceRef,
    ) -> Result<AccessLevel, MutationError> {
        let resolved = resolve(self.store.as_ref(), target)
            .await
            .map_err(MutationError::from_load)?;
        Ok(evaluate(&resolved.acl, principal))
    }

    /// Fresh principal behind a session, `None` for anonymous callers
    ///
    /// A session whose principal record is missing, or whose admin claim the
    /// record does not back, is destroyed.
    async fn principal_for(&self, session: &dyn Session) -> Result<Option<Principal>, MutationError> {
        let Some(claims) = session.claims() else {
            return Ok(None);
        };
        let principal = self
            .store
            .load_principal(claims.principal_id)
            .await
            .map_err(MutationError::from_load)?;

        let Some(principal) = principal else {
            tracing::warn!(
                principal = %claims.principal_id,
                "session principal no longer exists, destroying session"
            );
            session.destroy().await;
            return Err(MutationError::BadSession);
        };
        if claims.is_admin && !principal.is_admin {
            tracing::warn!(
                principal = %claims.principal_id,
                "admin claim not backed by principal record, destroying session"
            );
            session.destroy().await;
            return Err(MutationError::BadSession);
        }
        Ok(Some(principal))
    }

    /// Resolve submitted sharing and vet parent changes
    ///
    /// Returns the ACL to store, or `None` to keep the current one.
    async fn prepare_acl(
        &self,
        request: &MutationRequest,
        governing: Option<&Resolved>,
        principal: &Principal,
    ) -> Result<Option<AccessControlled>, MutationError> {
        match request {
            MutationRequest::CreateMetaRoadmap { input } => {
                self.resolve_sharing(principal.to_ref(), input.sharing.as_ref())
                    .await
            }
            MutationRequest::CreateRoadmap { input, .. } => {
                self.resolve_sharing(principal.to_ref(), input.sharing.as_ref())
                    .await
            }
            MutationRequest::UpdateMetaRoadmap { id, input, .. } => {
                let stored = governing.map(|g| &g.acl).ok_or_else(missing_record)?;
                let current_parent = match governing.map(|g| &g.entity) {
                    Some(Entity::MetaRoadmap(meta)) => meta.parent,
                    _ => return Err(missing_record()),
                };
                let may_restructure = principal.is_admin || stored.is_author(principal.id);

                if input.parent != current_parent {
                    if !may_restructure {
                        tracing::warn!("only the author or an admin may move a meta-roadmap");
                        return Err(MutationError::AccessDenied);
                    }
                    if let Some(parent) = input.parent {
                        self.check_new_parent(*id, parent, principal).await?;
                    }
                }
                self.resolve_changed_sharing(stored, input.sharing.as_ref(), may_restructure)
                    .await
            }
            MutationRequest::UpdateRoadmap { input, .. } => {
                let stored = governing.map(|g| &g.acl).ok_or_else(missing_record)?;
                let may_restructure = principal.is_admin || stored.is_author(principal.id);
                self.resolve_changed_sharing(stored, input.sharing.as_ref(), may_restructure)
                    .await
            }
            _ => Ok(None),
        }
    }

    async fn resolve_sharing(
        &self,
        author: PrincipalRef,
        sharing: Option<&crate::operation::SharingInput>,
    ) -> Result<Option<AccessControlled>, MutationError> {
        match sharing {
            Some(sharing) => self
                .store
                .resolve_sharing(author, sharing)
                .await
                .map(Some)
                .map_err(MutationError::from_load),
            None => Ok(None),
        }
    }

    async fn resolve_changed_sharing(
        &self,
        stored: &AccessControlled,
        sharing: Option<&crate::operation::SharingInput>,
        may_restructure: bool,
    ) -> Result<Option<AccessControlled>, MutationError> {
        let Some(acl) = self.resolve_sharing(stored.author.clone(), sharing).await? else {
            return Ok(None);
        };
        if stored.sharing_differs(&acl) && !may_restructure {
            tracing::warn!("only the author or an admin may change sharing");
            return Err(MutationError::AccessDenied);
        }
        Ok(Some(acl))
    }

    async fn check_new_parent(
        &self,
        id: MetaRoadmapId,
        parent: MetaRoadmapId,
        principal: &Principal,
    ) -> Result<(), MutationError> {
        let resolved = resolve(self.store.as_ref(), ResourceRef::MetaRoadmap(parent))
            .await
            .map_err(MutationError::from_load)?;
        authorize(&resolved.acl, Some(principal), AccessLevel::Edit)?;

        if ancestry_contains(self.store.as_ref(), parent, id)
            .await
            .map_err(MutationError::from_load)?
        {
            return Err(MutationError::invalid(
                "parent would make the meta-roadmap its own ancestor",
            ));
        }
        Ok(())
    }

    async fn prune(&self) -> Option<PruneReport> {
        match prune_orphans(self.store.as_ref()).await {
            Ok(report) => {
                metrics::counter!("roadmap_orphans_pruned_total")
                    .increment(u64::try_from(report.total()).unwrap_or(u64::MAX));
                Some(report)
            }
            Err(err) => {
                tracing::error!(error = %err, "orphan pruning failed");
                None
            }
        }
    }

    fn goal_from(
        &self,
        id: GoalId,
        roadmap: RoadmapId,
        author: PrincipalRef,
        input: &GoalInput,
        last_modified: Timestamp,
    ) -> Result<(Goal, Vec<Link>), MutationError> {
        let data_series = validate_goal(input, &self.config)?;
        let (links, link_ids) = materialize_links(&input.links);
        let goal = Goal {
            id,
            roadmap,
            author,
            name: input.name.as_deref().map(str::trim).map(str::to_string),
            description: input.description.clone(),
            indicator_parameter: input.indicator_parameter.trim().to_string(),
            data_series,
            links: link_ids,
            last_modified,
        };
        Ok((goal, links))
    }

    /// Build the changeset for an authorized request
    #[allow(clippy::too_many_lines)]
    fn plan(
        &self,
        request: MutationRequest,
        governing: Option<Resolved>,
        principal: &Principal,
        acl: Option<AccessControlled>,
    ) -> Result<Plan, MutationError> {
        let now = Utc::now();
        let author = principal.to_ref();

        if let MutationRequest::CreateMetaRoadmap { input } = request {
            let (links, link_ids) = materialize_links(&input.links);
            let meta = MetaRoadmap {
                id: MetaRoadmapId::new(),
                name: input.name.trim().to_string(),
                description: input.description,
                kind: input.kind,
                actor: input.actor,
                parent: input.parent,
                acl: acl.unwrap_or_else(|| AccessControlled::owned_by(author)),
                links: link_ids,
                last_modified: now,
            };
            let target = ResourceRef::MetaRoadmap(meta.id);
            return Ok(Plan {
                location: format!("/metaRoadmap/{}", meta.id),
                changes: Changeset {
                    inserts: vec![Entity::MetaRoadmap(meta)],
                    links,
                    ..Changeset::new()
                },
                target,
                created: vec![target],
                comment: None,
            });
        }

        let governing = governing.ok_or_else(missing_record)?;
        let roadmap_of_target = governing.roadmap;

        match (request, governing.entity) {
            (
                MutationRequest::UpdateMetaRoadmap {
                    input, timestamp, ..
                },
                Entity::MetaRoadmap(stored),
            ) => {
                let (links, link_ids) = materialize_links(&input.links);
                let target = ResourceRef::MetaRoadmap(stored.id);
                let updated = MetaRoadmap {
                    id: stored.id,
                    name: input.name.trim().to_string(),
                    description: input.description,
                    kind: input.kind,
                    actor: input.actor,
                    parent: input.parent,
                    acl: acl.unwrap_or(stored.acl),
                    links: link_ids,
                    last_modified: stored.last_modified,
                };
                Ok(Plan {
                    location: format!("/metaRoadmap/{}", stored.id),
                    changes: Changeset {
                        updates: vec![Entity::MetaRoadmap(updated)],
                        links,
                        ..Changeset::new()
                            .guarded_by(target, timestamp.unwrap_or(stored.last_modified))
                    },
                    target,
                    created: vec![],
                    comment: None,
                })
            }
            (MutationRequest::DeleteMetaRoadmap { .. }, Entity::MetaRoadmap(stored)) => Ok(Plan {
                location: stored
                    .parent
                    .map_or_else(|| "/".to_string(), |p| format!("/metaRoadmap/{p}")),
                changes: Changeset {
                    delete: Some(ResourceRef::MetaRoadmap(stored.id)),
                    ..Changeset::new()
                },
                target: ResourceRef::MetaRoadmap(stored.id),
                created: vec![],
                comment: None,
            }),
            (MutationRequest::CreateRoadmap { input, .. }, Entity::MetaRoadmap(meta)) => {
                let roadmap = Roadmap {
                    id: RoadmapId::new(),
                    meta_roadmap: meta.id,
                    period: input.period,
                    description: input.description,
                    acl: acl.unwrap_or_else(|| AccessControlled::owned_by(author.clone())),
                    last_modified: now,
                };
                let target = ResourceRef::Roadmap(roadmap.id);
                let mut changes = Changeset::new();
                let mut created = vec![target];
                for goal_input in &input.goals {
                    let (goal, links) =
                        self.goal_from(GoalId::new(), roadmap.id, author.clone(), goal_input, now)?;
                    created.push(ResourceRef::Goal(goal.id));
                    changes.inserts.push(Entity::Goal(goal));
                    changes.links.extend(links);
                }
                let location = format!("/roadmap/{}", roadmap.id);
                changes.inserts.insert(0, Entity::Roadmap(roadmap));
                Ok(Plan {
                    changes,
                    target,
                    created,
                    comment: None,
                    location,
                })
            }
            (
                MutationRequest::UpdateRoadmap {
                    input, timestamp, ..
                },
                Entity::Roadmap(stored),
            ) => {
                let target = ResourceRef::Roadmap(stored.id);
                let mut changes =
                    Changeset::new().guarded_by(target, timestamp.unwrap_or(stored.last_modified));
                let mut created = vec![];
                for goal_input in &input.goals {
                    let (goal, links) =
                        self.goal_from(GoalId::new(), stored.id, author.clone(), goal_input, now)?;
                    created.push(ResourceRef::Goal(goal.id));
                    changes.inserts.push(Entity::Goal(goal));
                    changes.links.extend(links);
                }
                let location = format!("/roadmap/{}", stored.id);
                changes.updates.push(Entity::Roadmap(Roadmap {
                    period: input.period,
                    description: input.description,
                    acl: acl.unwrap_or(stored.acl),
                    ..stored
                }));
                Ok(Plan {
                    changes,
                    target,
                    created,
                    comment: None,
                    location,
                })
            }
            (MutationRequest::DeleteRoadmap { .. }, Entity::Roadmap(stored)) => Ok(Plan {
                location: format!("/metaRoadmap/{}", stored.meta_roadmap),
                changes: Changeset {
                    delete: Some(ResourceRef::Roadmap(stored.id)),
                    ..Changeset::new()
                },
                target: ResourceRef::Roadmap(stored.id),
                created: vec![],
                comment: None,
            }),
            (MutationRequest::CreateGoal { input, .. }, Entity::Roadmap(roadmap)) => {
                let (goal, links) = self.goal_from(GoalId::new(), roadmap.id, author, &input, now)?;
                let target = ResourceRef::Goal(goal.id);
                Ok(Plan {
                    location: format!("/roadmap/{}/goal/{}", roadmap.id, goal.id),
                    changes: Changeset {
                        inserts: vec![Entity::Goal(goal)],
                        links,
                        ..Changeset::new()
                    },
                    target,
                    created: vec![target],
                    comment: None,
                })
            }
            (
                MutationRequest::UpdateGoal {
                    input, timestamp, ..
                },
                Entity::Goal(stored),
            ) => {
                let target = ResourceRef::Goal(stored.id);
                let (goal, links) = self.goal_from(
                    stored.id,
                    stored.roadmap,
                    stored.author,
                    &input,
                    stored.last_modified,
                )?;
                Ok(Plan {
                    location: format!("/roadmap/{}/goal/{}", goal.roadmap, goal.id),
                    changes: Changeset {
                        updates: vec![Entity::Goal(goal)],
                        links,
                        ..Changeset::new()
                            .guarded_by(target, timestamp.unwrap_or(stored.last_modified))
                    },
                    target,
                    created: vec![],
                    comment: None,
                })
            }
            (MutationRequest::DeleteGoal { .. }, Entity::Goal(stored)) => Ok(Plan {
                location: format!("/roadmap/{}", stored.roadmap),
                changes: Changeset {
                    delete: Some(ResourceRef::Goal(stored.id)),
                    ..Changeset::new()
                },
                target: ResourceRef::Goal(stored.id),
                created: vec![],
                comment: None,
            }),
            (MutationRequest::CreateAction { input, .. }, Entity::Goal(goal)) => {
                let (links, link_ids) = materialize_links(&input.links);
                let action = Action {
                    id: ActionId::new(),
                    goal: goal.id,
                    author,
                    name: input.name.trim().to_string(),
                    description: input.description,
                    start_year: input.start_year,
                    end_year: input.end_year,
                    links: link_ids,
                    last_modified: now,
                };
                let target = ResourceRef::Action(action.id);
                Ok(Plan {
                    location: action_location(goal.roadmap, goal.id, action.id),
                    changes: Changeset {
                        inserts: vec![Entity::Action(action)],
                        links,
                        ..Changeset::new()
                    },
                    target,
                    created: vec![target],
                    comment: None,
                })
            }
            (
                MutationRequest::UpdateAction {
                    input, timestamp, ..
                },
                Entity::Action(stored),
            ) => {
                let (links, link_ids) = materialize_links(&input.links);
                let target = ResourceRef::Action(stored.id);
                let roadmap = roadmap_of_target.ok_or_else(missing_record)?;
                let location = action_location(roadmap, stored.goal, stored.id);
                let guard = timestamp.unwrap_or(stored.last_modified);
                let updated = Action {
                    name: input.name.trim().to_string(),
                    description: input.description,
                    start_year: input.start_year,
                    end_year: input.end_year,
                    links: link_ids,
                    ..stored
                };
                Ok(Plan {
                    changes: Changeset {
                        updates: vec![Entity::Action(updated)],
                        links,
                        ..Changeset::new().guarded_by(target, guard)
                    },
                    target,
                    created: vec![],
                    comment: None,
                    location,
                })
            }
            (MutationRequest::DeleteAction { .. }, Entity::Action(stored)) => {
                let roadmap = roadmap_of_target.ok_or_else(missing_record)?;
                Ok(Plan {
                    location: format!("/roadmap/{roadmap}/goal/{}", stored.goal),
                    changes: Changeset {
                        delete: Some(ResourceRef::Action(stored.id)),
                        ..Changeset::new()
                    },
                    target: ResourceRef::Action(stored.id),
                    created: vec![],
                    comment: None,
                })
            }
            (MutationRequest::CreateComment { target, text }, entity) => {
                let comment = Comment {
                    id: CommentId::new(),
                    target,
                    author,
                    text: text.trim().to_string(),
                    created_at: now,
                };
                Ok(Plan {
                    location: page_of(&entity, roadmap_of_target),
                    comment: Some(comment.id),
                    changes: Changeset {
                        comments: vec![comment],
                        ..Changeset::new()
                    },
                    target,
                    created: vec![],
                })
            }
            (request, entity) => Err(MutationError::Internal(format!(
                "{} resolved to unexpected {}",
                request.op_name(),
                entity.resource_ref()
            ))),
        }
    }
}

/// Whether the request touches a national-scope document
fn national_scope(request: &MutationRequest, governing: Option<&Resolved>) -> bool {
    let stored = governing.is_some_and(|g| g.national);
    match request {
        MutationRequest::CreateMetaRoadmap { input } => input.kind.is_national(),
        MutationRequest::UpdateMetaRoadmap { input, .. } => stored || input.kind.is_national(),
        MutationRequest::CreateRoadmap { .. } | MutationRequest::UpdateRoadmap { .. } => stored,
        _ => false,
    }
}

/// Compare the resolved level with what the request needs
fn check_policy(
    request: &MutationRequest,
    governing: Option<&Resolved>,
    principal: &Principal,
) -> Result<(), MutationError> {
    // A top-level meta-roadmap has no governing ACL; authentication suffices.
    let Some(resolved) = governing else {
        return Ok(());
    };

    match request {
        MutationRequest::DeleteMetaRoadmap { .. } | MutationRequest::DeleteRoadmap { .. } => {
            let level = evaluate(&resolved.acl, Some(principal));
            if level.satisfies(AccessLevel::Admin) || resolved.authored_in_lineage(principal.id) {
                Ok(())
            } else {
                Err(AccessDenied {
                    required: AccessLevel::Admin,
                    resolved: level,
                }
                .into())
            }
        }
        _ => {
            let level = authorize(&resolved.acl, Some(principal), request.required_level())?;
            tracing::debug!(%level, "policy satisfied");
            Ok(())
        }
    }
}

fn materialize_links(inputs: &[LinkInput]) -> (Vec<Link>, IndexSet<LinkId>) {
    let links: Vec<Link> = inputs
        .iter()
        .map(|input| Link {
            id: LinkId::new(),
            url: input.url.trim().to_string(),
            description: input.description.clone(),
        })
        .collect();
    let ids = links.iter().map(|link| link.id).collect();
    (links, ids)
}

fn action_location(roadmap: RoadmapId, goal: GoalId, action: ActionId) -> String {
    format!("/roadmap/{roadmap}/goal/{goal}/action/{action}")
}

fn page_of(entity: &Entity, roadmap: Option<RoadmapId>) -> String {
    match (entity, roadmap) {
        (Entity::MetaRoadmap(m), _) => format!("/metaRoadmap/{}", m.id),
        (Entity::Roadmap(r), _) => format!("/roadmap/{}", r.id),
        (Entity::Goal(g), _) => format!("/roadmap/{}/goal/{}", g.roadmap, g.id),
        (Entity::Action(a), Some(roadmap)) => action_location(roadmap, a.goal, a.id),
        (Entity::Action(a), None) => format!("/goal/{}/action/{}", a.goal, a.id),
    }
}

fn missing_record() -> MutationError {
    MutationError::Internal("governing record missing after resolution".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::operation::ActionInput;
    use crate::session::{Anonymous, MockSession, SessionClaims};
    use crate::store::{CommitReceipt, MockRoadmapStore};
    use crate::types::DataSeries;
    use roadmap_access::PrincipalId;

    struct Tree {
        editor: Principal,
        roadmap: Roadmap,
        goal: Goal,
        action: Action,
    }

    fn tree() -> Tree {
        let owner = Principal::new(PrincipalId::new(), "owner");
        let editor = Principal::new(PrincipalId::new(), "editor").with_groups(["Editors"]);
        let roadmap = Roadmap {
            id: RoadmapId::new(),
            meta_roadmap: MetaRoadmapId::new(),
            period: None,
            description: None,
            acl: AccessControlled::owned_by(owner.to_ref()).with_edit_groups(["Editors"]),
            last_modified: Utc::now(),
        };
        let goal = Goal {
            id: GoalId::new(),
            roadmap: roadmap.id,
            author: owner.to_ref(),
            name: None,
            description: None,
            indicator_parameter: "Emissions".into(),
            data_series: DataSeries {
                unit: "kt".into(),
                first_year: 2020,
                values: vec![Some(1.0)],
            },
            links: IndexSet::new(),
            last_modified: Utc::now(),
        };
        let action = Action {
            id: ActionId::new(),
            goal: goal.id,
            author: owner.to_ref(),
            name: "Expand rail".into(),
            description: None,
            start_year: None,
            end_year: None,
            links: IndexSet::new(),
            last_modified: Utc::now(),
        };
        Tree {
            editor,
            roadmap,
            goal,
            action,
        }
    }

    fn session_for(principal: &Principal, claims_admin: bool) -> MockSession {
        let claims = SessionClaims {
            principal_id: principal.id,
            is_admin: claims_admin,
        };
        let mut session = MockSession::new();
        session.expect_claims().return_const(Some(claims));
        session
    }

    fn store_serving(tree: &Tree) -> MockRoadmapStore {
        let mut store = MockRoadmapStore::new();
        let editor = tree.editor.clone();
        store
            .expect_load_principal()
            .returning(move |_| Ok(Some(editor.clone())));
        let action = tree.action.clone();
        store
            .expect_load_action()
            .returning(move |_| Ok(action.clone()));
        let goal = tree.goal.clone();
        store.expect_load_goal().returning(move |_| Ok(goal.clone()));
        let roadmap = tree.roadmap.clone();
        store
            .expect_load_roadmap()
            .returning(move |_| Ok(roadmap.clone()));
        store
    }

    #[tokio::test]
    async fn contradicted_admin_claim_destroys_session_before_any_acl_load() {
        let tree = tree();
        let mut store = MockRoadmapStore::new();
        let editor = tree.editor.clone();
        store
            .expect_load_principal()
            .times(1)
            .returning(move |_| Ok(Some(editor.clone())));
        // No load_* or commit expectations: any such call fails the test.

        let mut session = session_for(&tree.editor, true);
        session.expect_destroy().times(1).returning(|| ());

        let orchestrator = MutationOrchestrator::with_defaults(Arc::new(store));
        let err = orchestrator
            .mutate(&session, MutationRequest::DeleteAction { id: tree.action.id })
            .await
            .unwrap_err();

        assert_eq!(err, MutationError::BadSession);
        assert!(err.forces_logout());
    }

    #[tokio::test]
    async fn admin_claim_for_missing_principal_is_a_bad_session() {
        let mut store = MockRoadmapStore::new();
        store.expect_load_principal().returning(|_| Ok(None));
        let ghost = Principal::new(PrincipalId::new(), "ghost");
        let mut session = session_for(&ghost, true);
        session.expect_destroy().times(1).returning(|| ());

        let orchestrator = MutationOrchestrator::with_defaults(Arc::new(store));
        let err = orchestrator
            .mutate(&session, MutationRequest::DeleteGoal { id: GoalId::new() })
            .await
            .unwrap_err();
        assert_eq!(err, MutationError::BadSession);
    }

    #[tokio::test]
    async fn deleted_principal_without_admin_claim_is_a_bad_session() {
        let mut store = MockRoadmapStore::new();
        store.expect_load_principal().returning(|_| Ok(None));
        store.expect_load_goal().never();
        let ghost = Principal::new(PrincipalId::new(), "ghost");
        let mut session = session_for(&ghost, false);
        session.expect_destroy().times(1).returning(|| ());

        let orchestrator = MutationOrchestrator::with_defaults(Arc::new(store));
        let err = orchestrator
            .mutate(&session, MutationRequest::DeleteGoal { id: GoalId::new() })
            .await
            .unwrap_err();
        assert_eq!(err, MutationError::BadSession);
        assert!(err.forces_logout());
    }

    #[tokio::test]
    async fn anonymous_mutation_is_unauthenticated_without_store_access() {
        let orchestrator = MutationOrchestrator::with_defaults(Arc::new(MockRoadmapStore::new()));
        let err = orchestrator
            .mutate(&Anonymous, MutationRequest::DeleteGoal { id: GoalId::new() })
            .await
            .unwrap_err();
        assert_eq!(err, MutationError::Unauthenticated);
    }

    #[tokio::test]
    async fn invalid_input_is_rejected_before_authentication() {
        let orchestrator = MutationOrchestrator::with_defaults(Arc::new(MockRoadmapStore::new()));
        let request = MutationRequest::CreateAction {
            goal: GoalId::new(),
            input: ActionInput {
                name: String::new(),
                description: None,
                start_year: None,
                end_year: None,
                links: vec![],
            },
        };
        let err = orchestrator.mutate(&Anonymous, request).await.unwrap_err();
        assert!(matches!(err, MutationError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn pruning_failure_does_not_fail_the_mutation() {
        let tree = tree();
        let mut store = store_serving(&tree);
        store
            .expect_commit()
            .times(1)
            .returning(|_| Ok(CommitReceipt { stamp: Utc::now() }));
        store
            .expect_reference_snapshot()
            .times(1)
            .returning(|| Err(StoreError::Backend("index unavailable".into())));

        let session = session_for(&tree.editor, false);
        let orchestrator = MutationOrchestrator::with_defaults(Arc::new(store));
        let outcome = orchestrator
            .mutate(&session, MutationRequest::DeleteAction { id: tree.action.id })
            .await
            .unwrap();

        assert_eq!(outcome.status, 200);
        assert_eq!(outcome.pruned, None);
        assert_eq!(outcome.stages.last(), Some(&MutationStage::Pruned));
        assert_eq!(
            outcome.location,
            format!("/roadmap/{}/goal/{}", tree.roadmap.id, tree.goal.id)
        );
    }

    #[tokio::test]
    async fn stale_update_never_reaches_commit() {
        let tree = tree();
        let store = store_serving(&tree);
        let session = session_for(&tree.editor, false);
        let orchestrator = MutationOrchestrator::with_defaults(Arc::new(store));

        let request = MutationRequest::UpdateAction {
            id: tree.action.id,
            input: ActionInput {
                name: "Electrify buses".into(),
                description: None,
                start_year: None,
                end_year: None,
                links: vec![],
            },
            timestamp: Some(tree.action.last_modified - chrono::Duration::seconds(1)),
        };
        let err = orchestrator.mutate(&session, request).await.unwrap_err();
        assert_eq!(err, MutationError::StaleData);
    }

    #[tokio::test]
    async fn commit_race_surfaces_as_referential_failure() {
        let tree = tree();
        let mut store = store_serving(&tree);
        let goal = tree.goal.id;
        store
            .expect_commit()
            .returning(move |_| Err(StoreError::NotFound(ResourceRef::Goal(goal))));

        let session = session_for(&tree.editor, false);
        let orchestrator = MutationOrchestrator::with_defaults(Arc::new(store));
        let request = MutationRequest::CreateAction {
            goal: tree.goal.id,
            input: ActionInput {
                name: "Bike lanes".into(),
                description: None,
                start_year: Some(2025),
                end_year: Some(2030),
                links: vec![],
            },
        };
        let err = orchestrator.mutate(&session, request).await.unwrap_err();
        assert!(matches!(err, MutationError::ReferentialFailure(_)));
    }

    #[test]
    fn inconsistent_config_is_rejected() {
        let config = OrchestratorConfig::new().with_series_window(2050, 2020);
        assert!(MutationOrchestrator::new(Arc::new(MockRoadmapStore::new()), config).is_err());
    }
}
