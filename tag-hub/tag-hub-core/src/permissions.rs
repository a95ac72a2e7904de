//! Registry of permission atoms.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    TagCreate,
    TagDelete,
    TagEdit,
    TagView,
    TagAttach,
    TagRemove,
    DocumentCreate,
    DocumentDelete,
    DocumentView,
    AclView,
    AclEdit,
    EventsView,
    StatisticsView,
}

impl Permission {
    pub const ALL: [Permission; 13] = [
        Permission::TagCreate,
        Permission::TagDelete,
        Permission::TagEdit,
        Permission::TagView,
        Permission::TagAttach,
        Permission::TagRemove,
        Permission::DocumentCreate,
        Permission::DocumentDelete,
        Permission::DocumentView,
        Permission::AclView,
        Permission::AclEdit,
        Permission::EventsView,
        Permission::StatisticsView,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::TagCreate => "tag_create",
            Permission::TagDelete => "tag_delete",
            Permission::TagEdit => "tag_edit",
            Permission::TagView => "tag_view",
            Permission::TagAttach => "tag_attach",
            Permission::TagRemove => "tag_remove",
            Permission::DocumentCreate => "document_create",
            Permission::DocumentDelete => "document_delete",
            Permission::DocumentView => "document_view",
            Permission::AclView => "acl_view",
            Permission::AclEdit => "acl_edit",
            Permission::EventsView => "events_view",
            Permission::StatisticsView => "statistics_view",
        }
    }

    /// Human readable label shown in listings.
    pub fn label(&self) -> &'static str {
        match self {
            Permission::TagCreate => "Create new tags",
            Permission::TagDelete => "Delete tags",
            Permission::TagEdit => "Edit tags",
            Permission::TagView => "View tags",
            Permission::TagAttach => "Attach tags to documents",
            Permission::TagRemove => "Remove tags from documents",
            Permission::DocumentCreate => "Create documents",
            Permission::DocumentDelete => "Delete documents",
            Permission::DocumentView => "View documents",
            Permission::AclView => "View access control lists",
            Permission::AclEdit => "Edit access control lists",
            Permission::EventsView => "Access the events of an object",
            Permission::StatisticsView => "View statistics",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown permission: {0}")]
pub struct UnknownPermission(pub String);

impl FromStr for Permission {
    type Err = UnknownPermission;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownPermission(s.to_string()))
    }
}
