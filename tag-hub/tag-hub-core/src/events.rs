use crate::acl::{Holder, ObjectRef, Principal};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum EventVerb {
    TagCreated,
    TagEdited,
    TagDeleted,
    TagAttach,
    TagRemoved,
    DocumentCreated,
    DocumentDeleted,
    AclGranted,
    AclRevoked,
}

impl EventVerb {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventVerb::TagCreated => "tag_created",
            EventVerb::TagEdited => "tag_edited",
            EventVerb::TagDeleted => "tag_deleted",
            EventVerb::TagAttach => "tag_attach",
            EventVerb::TagRemoved => "tag_removed",
            EventVerb::DocumentCreated => "document_created",
            EventVerb::DocumentDeleted => "document_deleted",
            EventVerb::AclGranted => "acl_granted",
            EventVerb::AclRevoked => "acl_revoked",
        }
    }
}

/// Immutable audit record of a successful mutation.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
    pub id: Uuid,
    pub verb: EventVerb,
    pub actor: String,
    pub target: ObjectRef,
    #[serde(default)]
    pub action_object: Option<ObjectRef>,
    pub timestamp: DateTime<Utc>,
}

/// Append-only event log with a per-target index.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Event>", into = "Vec<Event>")]
pub struct EventLog {
    entries: Vec<Event>,
    by_target: HashMap<ObjectRef, Vec<usize>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        actor: &str,
        verb: EventVerb,
        target: ObjectRef,
        action_object: Option<ObjectRef>,
    ) -> Event {
        let event = Event {
            id: Uuid::new_v4(),
            verb,
            actor: actor.to_string(),
            target,
            action_object,
            timestamp: Utc::now(),
        };
        self.push(event.clone());
        event
    }

    fn push(&mut self, event: Event) {
        self.by_target
            .entry(event.target)
            .or_default()
            .push(self.entries.len());
        self.entries.push(event);
    }

    /// Most recent event whose target is `target`.
    pub fn latest_for(&self, target: ObjectRef) -> Option<&Event> {
        self.by_target
            .get(&target)
            .and_then(|idx| idx.last())
            .map(|&i| &self.entries[i])
    }

    /// Events for `target`, newest first.
    pub fn for_target(&self, target: ObjectRef) -> Vec<&Event> {
        self.by_target
            .get(&target)
            .map(|idx| idx.iter().rev().map(|&i| &self.entries[i]).collect())
            .unwrap_or_default()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<Vec<Event>> for EventLog {
    fn from(entries: Vec<Event>) -> Self {
        let mut log = EventLog::new();
        for e in entries {
            log.push(e);
        }
        log
    }
}

impl From<EventLog> for Vec<Event> {
    fn from(log: EventLog) -> Self {
        log.entries
    }
}

/// A committed event together with the holders allowed to watch it,
/// resolved against the grants in force when it was committed.
#[derive(Clone, Debug)]
pub struct LiveEvent {
    pub event: Event,
    watchers: Arc<HashSet<Holder>>,
}

impl LiveEvent {
    pub fn new(event: Event, watchers: HashSet<Holder>) -> Self {
        Self {
            event,
            watchers: Arc::new(watchers),
        }
    }

    pub fn visible_to(&self, principal: &Principal) -> bool {
        principal.superuser || principal.holders().any(|h| self.watchers.contains(&h))
    }
}

/// Broadcasts committed events to in-process subscribers.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<LiveEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(100);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LiveEvent> {
        self.tx.subscribe()
    }

    pub fn send(&self, event: LiveEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_and_history_are_per_target() {
        let mut log = EventLog::new();
        let t1 = ObjectRef::tag(Uuid::new_v4());
        let t2 = ObjectRef::tag(Uuid::new_v4());
        let d = ObjectRef::document(Uuid::new_v4());
        log.record("alice", EventVerb::TagCreated, t1, None);
        log.record("alice", EventVerb::TagCreated, t2, None);
        log.record("bob", EventVerb::TagAttach, t1, Some(d));

        let latest = log.latest_for(t1).unwrap();
        assert_eq!(latest.verb, EventVerb::TagAttach);
        assert_eq!(latest.action_object, Some(d));
        assert_eq!(log.latest_for(t2).unwrap().verb, EventVerb::TagCreated);
        assert!(log.latest_for(d).is_none());

        let history: Vec<_> = log.for_target(t1).iter().map(|e| e.verb).collect();
        assert_eq!(history, vec![EventVerb::TagAttach, EventVerb::TagCreated]);
    }

    #[test]
    fn index_rebuilt_after_deserialize() {
        let mut log = EventLog::new();
        let t = ObjectRef::tag(Uuid::new_v4());
        log.record("alice", EventVerb::TagCreated, t, None);
        log.record("alice", EventVerb::TagEdited, t, None);
        let json = serde_json::to_string(&log).unwrap();
        let back: EventLog = serde_json::from_str(&json).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back.latest_for(t).unwrap().verb, EventVerb::TagEdited);
    }

    #[tokio::test]
    async fn bus_delivers_to_subscribers() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let mut log = EventLog::new();
        let event = log.record("alice", EventVerb::TagCreated, ObjectRef::tag(Uuid::new_v4()), None);
        bus.send(LiveEvent::new(event.clone(), HashSet::from([Holder::role("auditors")])));

        let live = rx.recv().await.unwrap();
        assert_eq!(live.event, event);
        assert!(live.visible_to(&Principal::user("eve").with_roles(["auditors"])));
        assert!(live.visible_to(&Principal::superuser("root")));
        assert!(!live.visible_to(&Principal::user("auditors")));
    }
}
