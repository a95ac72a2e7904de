//! Transactional owner of the tag store, the grant table and the event log.
//!
//! Every mutating operation follows the same sequence: permission check,
//! mutation, event append, persistence. A failure at any step leaves the
//! state as it was and records nothing.

use crate::acl::{AccessControl, DenialPolicy, Grant, GrantTable, ObjectKind, ObjectRef, Principal};
use crate::error::{Error, Result};
use crate::events::{Event, EventBus, EventLog, EventVerb, LiveEvent};
use crate::permissions::Permission;
use crate::statistics::{Namespace, StatisticResult};
use crate::storage::{DataDir, Document, Tag, TagPatch, TagStore};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Everything persisted in one snapshot.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct HubState {
    pub store: TagStore,
    pub grants: GrantTable,
    pub events: EventLog,
}

/// Event a successful mutation asks the hub to record.
struct PendingEvent {
    verb: EventVerb,
    target: ObjectRef,
    action_object: Option<ObjectRef>,
    /// Drop the target's grants once its watchers are resolved.
    purge_target: bool,
}

impl PendingEvent {
    fn new(verb: EventVerb, target: ObjectRef) -> Self {
        Self {
            verb,
            target,
            action_object: None,
            purge_target: false,
        }
    }

    fn with_action_object(mut self, object: ObjectRef) -> Self {
        self.action_object = Some(object);
        self
    }

    fn purging_target(mut self) -> Self {
        self.purge_target = true;
        self
    }
}

pub struct Hub {
    state: HubState,
    data_dir: Option<DataDir>,
    bus: EventBus,
    statistics: Namespace,
}

impl Hub {
    /// Hub without persistence.
    pub fn in_memory() -> Self {
        Self {
            state: HubState::default(),
            data_dir: None,
            bus: EventBus::new(),
            statistics: Namespace::default(),
        }
    }

    /// Hub persisted under `dir`, loading the previous snapshot if any.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = DataDir::open(dir)?;
        let state = data_dir.load::<HubState>()?.unwrap_or_default();
        tracing::info!(
            dir = %data_dir.path().display(),
            tags = state.store.tag_count(),
            documents = state.store.document_count(),
            grants = state.grants.len(),
            events = state.events.len(),
            "loaded hub state"
        );
        Ok(Self {
            state,
            data_dir: Some(data_dir),
            bus: EventBus::new(),
            statistics: Namespace::default(),
        })
    }

    pub fn state(&self) -> &HubState {
        &self.state
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LiveEvent> {
        self.bus.subscribe()
    }

    /// Install configured global grants. These are not audited.
    pub fn bootstrap_grants(&mut self, grants: impl IntoIterator<Item = Grant>) -> Result<usize> {
        let mut added = 0;
        for grant in grants {
            if grant.object.is_some() {
                return Err(Error::validation("bootstrap grants must be global"));
            }
            if self.state.grants.grant(grant) {
                added += 1;
            }
        }
        if added > 0 {
            self.flush()?;
        }
        Ok(added)
    }

    fn flush(&self) -> Result<()> {
        match &self.data_dir {
            Some(dir) => dir.save(&self.state),
            None => Ok(()),
        }
    }

    /// Apply `op`, record its event and persist, all or nothing.
    fn commit<T>(
        &mut self,
        actor: &Principal,
        op: impl FnOnce(&mut HubState) -> Result<(T, PendingEvent)>,
    ) -> Result<T> {
        // Checkpoint and snapshot both cover the whole state, event log
        // included, so a persisted write costs O(state).
        let checkpoint = self.data_dir.as_ref().map(|_| self.state.clone());
        let (value, pending) = match op(&mut self.state) {
            Ok(done) => done,
            Err(err) => {
                if let Some(state) = checkpoint {
                    self.state = state;
                }
                return Err(err);
            }
        };
        // Watchers are fixed here, before a delete purges the target's grants.
        let watchers = self
            .state
            .grants
            .holders_of(Permission::EventsView, pending.target);
        if pending.purge_target {
            self.state.grants.purge_object(pending.target);
        }
        let event = self.state.events.record(
            &actor.user_id,
            pending.verb,
            pending.target,
            pending.action_object,
        );
        if let Err(err) = self.flush() {
            tracing::error!(error = %err, verb = event.verb.as_str(), "persisting state failed, rolling back");
            if let Some(state) = checkpoint {
                self.state = state;
            }
            return Err(err);
        }
        tracing::info!(
            verb = event.verb.as_str(),
            actor = %event.actor,
            target = %event.target,
            "event recorded"
        );
        self.bus.send(LiveEvent::new(event, watchers));
        Ok(value)
    }

    fn exists(&self, object: ObjectRef) -> bool {
        match object.kind {
            ObjectKind::Tag => self.state.store.get_tag(object.id).is_some(),
            ObjectKind::Document => self.state.store.get_document(object.id).is_some(),
        }
    }

    fn visible_tag(&self, principal: &Principal, permission: Permission, id: Uuid) -> Result<&Tag> {
        let tag = self.state.store.get_tag(id).ok_or(Error::NotFound)?;
        self.state.grants.check(
            principal,
            permission,
            Some(ObjectRef::tag(id)),
            DenialPolicy::HideExistence,
        )?;
        Ok(tag)
    }

    fn visible_document(
        &self,
        principal: &Principal,
        permission: Permission,
        id: Uuid,
    ) -> Result<&Document> {
        let doc = self.state.store.get_document(id).ok_or(Error::NotFound)?;
        self.state.grants.check(
            principal,
            permission,
            Some(ObjectRef::document(id)),
            DenialPolicy::HideExistence,
        )?;
        Ok(doc)
    }

    /// Composite check over a document and a tag. Both must exist and the
    /// principal must hold `permission` on each of them.
    fn check_pair(
        &self,
        principal: &Principal,
        permission: Permission,
        document: Uuid,
        tag: Uuid,
    ) -> Result<()> {
        if self.state.store.get_document(document).is_none()
            || self.state.store.get_tag(tag).is_none()
        {
            return Err(Error::NotFound);
        }
        self.state.grants.check_all(
            principal,
            &[
                (permission, ObjectRef::document(document)),
                (permission, ObjectRef::tag(tag)),
            ],
            DenialPolicy::HideExistence,
        )
    }

    fn filter_tags<'a>(
        &self,
        principal: &Principal,
        tags: impl IntoIterator<Item = &'a Tag>,
    ) -> Vec<Tag> {
        tags.into_iter()
            .filter(|t| {
                self.state
                    .grants
                    .has_permission(principal, Permission::TagView, Some(ObjectRef::tag(t.id)))
            })
            .cloned()
            .collect()
    }

    fn filter_documents<'a>(
        &self,
        principal: &Principal,
        docs: impl IntoIterator<Item = &'a Document>,
    ) -> Vec<Document> {
        docs.into_iter()
            .filter(|d| {
                self.state.grants.has_permission(
                    principal,
                    Permission::DocumentView,
                    Some(ObjectRef::document(d.id)),
                )
            })
            .cloned()
            .collect()
    }

    // ---- tags ----

    /// Tags the principal may view.
    pub fn list_tags(&self, principal: &Principal) -> Vec<Tag> {
        self.filter_tags(principal, self.state.store.tags())
    }

    pub fn create_tag(
        &mut self,
        principal: &Principal,
        label: &str,
        color: Option<&str>,
    ) -> Result<Tag> {
        self.authorize_global(principal, Permission::TagCreate)?;
        self.commit(principal, |state| {
            let tag = state.store.create_tag(label, color)?.clone();
            let target = ObjectRef::tag(tag.id);
            Ok((tag, PendingEvent::new(EventVerb::TagCreated, target)))
        })
    }

    pub fn get_tag(&self, principal: &Principal, id: Uuid) -> Result<Tag> {
        self.visible_tag(principal, Permission::TagView, id).cloned()
    }

    /// Full replace. `label` must be supplied; an omitted color resets to the default.
    pub fn replace_tag(
        &mut self,
        principal: &Principal,
        id: Uuid,
        label: Option<&str>,
        color: Option<&str>,
    ) -> Result<Tag> {
        self.visible_tag(principal, Permission::TagEdit, id)?;
        let label = label.ok_or_else(|| Error::validation("label is required"))?;
        self.commit(principal, |state| {
            let tag = state.store.replace_tag(id, label, color)?.clone();
            Ok((tag, PendingEvent::new(EventVerb::TagEdited, ObjectRef::tag(id))))
        })
    }

    /// Partial update of the supplied fields.
    pub fn update_tag(&mut self, principal: &Principal, id: Uuid, patch: &TagPatch) -> Result<Tag> {
        self.visible_tag(principal, Permission::TagEdit, id)?;
        self.commit(principal, |state| {
            let tag = state.store.update_tag(id, patch)?.clone();
            Ok((tag, PendingEvent::new(EventVerb::TagEdited, ObjectRef::tag(id))))
        })
    }

    pub fn delete_tag(&mut self, principal: &Principal, id: Uuid) -> Result<()> {
        self.visible_tag(principal, Permission::TagDelete, id)?;
        self.commit(principal, |state| {
            state.store.delete_tag(id)?;
            let event = PendingEvent::new(EventVerb::TagDeleted, ObjectRef::tag(id));
            Ok(((), event.purging_target()))
        })
    }

    /// Documents a tag is attached to. The tag itself must be viewable;
    /// documents are filtered by `document_view`.
    pub fn tag_documents(&self, principal: &Principal, tag: Uuid) -> Result<Vec<Document>> {
        self.visible_tag(principal, Permission::TagView, tag)?;
        Ok(self.filter_documents(principal, self.state.store.tag_documents(tag)))
    }

    // ---- documents ----

    pub fn list_documents(&self, principal: &Principal) -> Vec<Document> {
        self.filter_documents(principal, self.state.store.documents())
    }

    pub fn create_document(&mut self, principal: &Principal, label: &str) -> Result<Document> {
        self.authorize_global(principal, Permission::DocumentCreate)?;
        self.commit(principal, |state| {
            let doc = state.store.create_document(label)?.clone();
            let target = ObjectRef::document(doc.id);
            Ok((doc, PendingEvent::new(EventVerb::DocumentCreated, target)))
        })
    }

    pub fn get_document(&self, principal: &Principal, id: Uuid) -> Result<Document> {
        self.visible_document(principal, Permission::DocumentView, id)
            .cloned()
    }

    pub fn delete_document(&mut self, principal: &Principal, id: Uuid) -> Result<()> {
        self.visible_document(principal, Permission::DocumentDelete, id)?;
        self.commit(principal, |state| {
            state.store.delete_document(id)?;
            let event = PendingEvent::new(EventVerb::DocumentDeleted, ObjectRef::document(id));
            Ok(((), event.purging_target()))
        })
    }

    /// Tags attached to a document. Needs `tag_view` on the document, then
    /// filters the tags by `tag_view`.
    pub fn document_tags(&self, principal: &Principal, document: Uuid) -> Result<Vec<Tag>> {
        self.visible_document(principal, Permission::TagView, document)?;
        Ok(self.filter_tags(principal, self.state.store.document_tags(document)))
    }

    /// Attach a tag to a document. Re-attaching succeeds without changing state.
    pub fn attach_tag(&mut self, principal: &Principal, document: Uuid, tag: Uuid) -> Result<Tag> {
        self.check_pair(principal, Permission::TagAttach, document, tag)?;
        self.commit(principal, |state| {
            state.store.attach(tag, document)?;
            let tag = state.store.get_tag(tag).cloned().ok_or(Error::NotFound)?;
            let event = PendingEvent::new(EventVerb::TagAttach, ObjectRef::tag(tag.id))
                .with_action_object(ObjectRef::document(document));
            Ok((tag, event))
        })
    }

    /// A tag seen through its association with a document.
    pub fn document_tag(&self, principal: &Principal, document: Uuid, tag: Uuid) -> Result<Tag> {
        self.check_pair(principal, Permission::TagView, document, tag)?;
        if !self.state.store.is_attached(tag, document) {
            return Err(Error::NotFound);
        }
        self.state.store.get_tag(tag).cloned().ok_or(Error::NotFound)
    }

    pub fn remove_tag(&mut self, principal: &Principal, document: Uuid, tag: Uuid) -> Result<()> {
        self.check_pair(principal, Permission::TagRemove, document, tag)?;
        self.commit(principal, |state| {
            state.store.remove(tag, document)?;
            let event = PendingEvent::new(EventVerb::TagRemoved, ObjectRef::tag(tag))
                .with_action_object(ObjectRef::document(document));
            Ok(((), event))
        })
    }

    // ---- access control ----

    /// Check `permission` on an existing object, hiding objects the
    /// principal cannot act on.
    pub fn authorize(
        &self,
        principal: &Principal,
        permission: Permission,
        object: ObjectRef,
    ) -> Result<()> {
        if !self.exists(object) {
            return Err(Error::NotFound);
        }
        self.state
            .grants
            .check(principal, permission, Some(object), DenialPolicy::HideExistence)
    }

    /// Check a global permission, reporting denial as forbidden.
    pub fn authorize_global(&self, principal: &Principal, permission: Permission) -> Result<()> {
        self.state
            .grants
            .check(principal, permission, None, DenialPolicy::Forbid)
    }

    pub fn grants_for(&self, principal: &Principal, object: ObjectRef) -> Result<Vec<Grant>> {
        self.authorize(principal, Permission::AclView, object)?;
        Ok(self.state.grants.for_object(Some(object)))
    }

    /// Grant a permission on an object. Global grants come from configuration only.
    pub fn grant(&mut self, principal: &Principal, grant: Grant) -> Result<Grant> {
        let object = grant
            .object
            .ok_or_else(|| Error::validation("grant must name an object"))?;
        self.authorize(principal, Permission::AclEdit, object)?;
        if grant.holder.name().trim().is_empty() {
            return Err(Error::validation("grant holder must not be empty"));
        }
        self.commit(principal, |state| {
            state.grants.grant(grant.clone());
            Ok((grant, PendingEvent::new(EventVerb::AclGranted, object)))
        })
    }

    pub fn revoke(&mut self, principal: &Principal, grant: &Grant) -> Result<()> {
        let object = grant
            .object
            .ok_or_else(|| Error::validation("grant must name an object"))?;
        self.authorize(principal, Permission::AclEdit, object)?;
        self.commit(principal, |state| {
            if !state.grants.revoke(grant) {
                return Err(Error::NotFound);
            }
            Ok(((), PendingEvent::new(EventVerb::AclRevoked, object)))
        })
    }

    // ---- events ----

    fn check_events_view(&self, principal: &Principal, object: ObjectRef) -> Result<()> {
        self.state.grants.check(
            principal,
            Permission::EventsView,
            Some(object),
            DenialPolicy::HideExistence,
        )
    }

    /// Events targeting an object, newest first. Events outlive their
    /// object, so only the permission is checked.
    pub fn events_for(&self, principal: &Principal, object: ObjectRef) -> Result<Vec<Event>> {
        self.check_events_view(principal, object)?;
        Ok(self.state.events.for_target(object).into_iter().cloned().collect())
    }

    pub fn latest_event(&self, principal: &Principal, object: ObjectRef) -> Result<Event> {
        self.check_events_view(principal, object)?;
        self.state
            .events
            .latest_for(object)
            .cloned()
            .ok_or(Error::NotFound)
    }

    // ---- statistics ----

    pub fn statistics(&self, principal: &Principal) -> Result<Vec<(&'static str, &'static str)>> {
        self.authorize_global(principal, Permission::StatisticsView)?;
        Ok(self.statistics.iter().map(|s| (s.slug, s.label)).collect())
    }

    pub fn execute_statistic(&self, principal: &Principal, slug: &str) -> Result<StatisticResult> {
        self.authorize_global(principal, Permission::StatisticsView)?;
        let statistic = self.statistics.get(slug).ok_or(Error::NotFound)?;
        statistic.execute(&self.state)
    }
}
