pub mod acl;
pub mod auth;
pub mod error;
pub mod events;
pub mod hub;
pub mod permissions;
pub mod statistics;
pub mod storage;

pub use acl::{
    AccessControl, DenialPolicy, Grant, GrantTable, Holder, ObjectKind, ObjectRef, Principal,
};
pub use error::{Error, Result};
pub use events::{Event, EventBus, EventLog, EventVerb, LiveEvent};
pub use hub::{Hub, HubState};
pub use permissions::Permission;
