//! Object-level access control.
//!
//! Grants tie a holder (a user id or a role name) to a permission, either
//! globally or on one object. A global grant acts as a wildcard over every
//! object. Lookups go through an index keyed by object so instance checks do
//! not scan the whole table.

use crate::error::{Error, Result};
use crate::permissions::Permission;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Tag,
    Document,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Tag => "tag",
            ObjectKind::Document => "document",
        }
    }
}

impl std::str::FromStr for ObjectKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "tag" | "tags" => Ok(ObjectKind::Tag),
            "document" | "documents" => Ok(ObjectKind::Document),
            other => Err(Error::validation(format!("unknown object kind: {other}"))),
        }
    }
}

/// Reference to a concrete object instance.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef {
    pub kind: ObjectKind,
    pub id: Uuid,
}

impl ObjectRef {
    pub fn tag(id: Uuid) -> Self {
        Self {
            kind: ObjectKind::Tag,
            id,
        }
    }

    pub fn document(id: Uuid) -> Self {
        Self {
            kind: ObjectKind::Document,
            id,
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.id)
    }
}

/// Who a grant is recorded against. Users and roles are separate
/// namespaces, so a user id never matches a role of the same name.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Holder {
    User(String),
    Role(String),
}

impl Holder {
    pub fn user(name: impl Into<String>) -> Self {
        Holder::User(name.into())
    }

    pub fn role(name: impl Into<String>) -> Self {
        Holder::Role(name.into())
    }

    pub fn name(&self) -> &str {
        match self {
            Holder::User(name) | Holder::Role(name) => name,
        }
    }
}

/// Bare names are user ids.
impl From<&str> for Holder {
    fn from(name: &str) -> Self {
        Holder::user(name)
    }
}

impl From<String> for Holder {
    fn from(name: String) -> Self {
        Holder::User(name)
    }
}

impl fmt::Display for Holder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Holder::User(name) => write!(f, "user:{name}"),
            Holder::Role(name) => write!(f, "role:{name}"),
        }
    }
}

/// The authenticated caller of an operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    pub roles: Vec<String>,
    pub superuser: bool,
}

impl Principal {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            roles: Vec::new(),
            superuser: false,
        }
    }

    pub fn superuser(user_id: impl Into<String>) -> Self {
        Self {
            superuser: true,
            ..Self::user(user_id)
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    /// Every holder grants may be recorded against for this principal.
    pub fn holders(&self) -> impl Iterator<Item = Holder> + '_ {
        std::iter::once(Holder::user(self.user_id.as_str()))
            .chain(self.roles.iter().map(|r| Holder::role(r.as_str())))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Grant {
    pub holder: Holder,
    pub permission: Permission,
    #[serde(default)]
    pub object: Option<ObjectRef>,
}

impl Grant {
    pub fn global(holder: impl Into<Holder>, permission: Permission) -> Self {
        Self {
            holder: holder.into(),
            permission,
            object: None,
        }
    }

    pub fn on(holder: impl Into<Holder>, permission: Permission, object: ObjectRef) -> Self {
        Self {
            holder: holder.into(),
            permission,
            object: Some(object),
        }
    }
}

impl std::str::FromStr for Grant {
    type Err = Error;

    /// Parses the `user:<id>:<permission>` / `role:<name>:<permission>`
    /// form used for bootstrap grants.
    fn from_str(s: &str) -> Result<Self> {
        let malformed =
            || Error::validation(format!("expected user:<id>:<permission> or role:<name>:<permission>, got {s:?}"));
        let (holder, perm) = s.rsplit_once(':').ok_or_else(malformed)?;
        let (kind, name) = holder.split_once(':').ok_or_else(malformed)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::validation("grant holder must not be empty"));
        }
        let holder = match kind.trim() {
            "user" => Holder::user(name),
            "role" => Holder::role(name),
            _ => return Err(malformed()),
        };
        let permission = perm
            .trim()
            .parse::<Permission>()
            .map_err(|e| Error::validation(e.to_string()))?;
        Ok(Grant::global(holder, permission))
    }
}

/// How a failed check is reported to the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DenialPolicy {
    /// Actions with no object to hide (create, statistics) report forbidden.
    Forbid,
    /// Object-scoped actions report not-found so existence is not leaked.
    HideExistence,
}

impl DenialPolicy {
    pub fn denial(self) -> Error {
        match self {
            DenialPolicy::Forbid => Error::PermissionDenied,
            DenialPolicy::HideExistence => Error::NotFound,
        }
    }
}

/// Evaluates permissions for a principal.
pub trait AccessControl {
    fn has_permission(
        &self,
        principal: &Principal,
        permission: Permission,
        object: Option<ObjectRef>,
    ) -> bool;

    fn check(
        &self,
        principal: &Principal,
        permission: Permission,
        object: Option<ObjectRef>,
        policy: DenialPolicy,
    ) -> Result<()> {
        if self.has_permission(principal, permission, object) {
            Ok(())
        } else {
            tracing::debug!(
                user = %principal.user_id,
                %permission,
                object = ?object,
                "permission check failed"
            );
            Err(policy.denial())
        }
    }

    /// Composite check: every `(permission, object)` pair must pass.
    fn check_all(
        &self,
        principal: &Principal,
        requirements: &[(Permission, ObjectRef)],
        policy: DenialPolicy,
    ) -> Result<()> {
        for (permission, object) in requirements {
            self.check(principal, *permission, Some(*object), policy)?;
        }
        Ok(())
    }
}

type GrantKey = (Holder, Permission);

/// Grant table indexed by object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Grant>", into = "Vec<Grant>")]
pub struct GrantTable {
    global: HashSet<GrantKey>,
    by_object: HashMap<ObjectRef, HashSet<GrantKey>>,
}

impl GrantTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a grant. Returns false when it already existed.
    pub fn grant(&mut self, grant: Grant) -> bool {
        let key = (grant.holder, grant.permission);
        match grant.object {
            None => self.global.insert(key),
            Some(obj) => self.by_object.entry(obj).or_default().insert(key),
        }
    }

    /// Remove a grant. Returns false when it did not exist.
    pub fn revoke(&mut self, grant: &Grant) -> bool {
        let key = (grant.holder.clone(), grant.permission);
        match grant.object {
            None => self.global.remove(&key),
            Some(obj) => {
                let Some(set) = self.by_object.get_mut(&obj) else {
                    return false;
                };
                let removed = set.remove(&key);
                if set.is_empty() {
                    self.by_object.remove(&obj);
                }
                removed
            }
        }
    }

    /// Drop every grant on an object, used when the object is deleted.
    pub fn purge_object(&mut self, object: ObjectRef) -> usize {
        self.by_object.remove(&object).map_or(0, |set| set.len())
    }

    /// Grants recorded on one object (or the global grants for `None`), sorted.
    pub fn for_object(&self, object: Option<ObjectRef>) -> Vec<Grant> {
        let set = match object {
            None => Some(&self.global),
            Some(obj) => self.by_object.get(&obj),
        };
        let mut out: Vec<Grant> = set
            .into_iter()
            .flatten()
            .map(|(holder, permission)| Grant {
                holder: holder.clone(),
                permission: *permission,
                object,
            })
            .collect();
        out.sort();
        out
    }

    /// Holders that can exercise `permission` on `object`, global grants included.
    pub fn holders_of(&self, permission: Permission, object: ObjectRef) -> HashSet<Holder> {
        self.global
            .iter()
            .chain(self.by_object.get(&object).into_iter().flatten())
            .filter(|(_, p)| *p == permission)
            .map(|(holder, _)| holder.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.global.len() + self.by_object.values().map(HashSet::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn holds(set: Option<&HashSet<GrantKey>>, principal: &Principal, permission: Permission) -> bool {
        let Some(set) = set else { return false };
        principal
            .holders()
            .any(|h| set.contains(&(h, permission)))
    }
}

impl AccessControl for GrantTable {
    fn has_permission(
        &self,
        principal: &Principal,
        permission: Permission,
        object: Option<ObjectRef>,
    ) -> bool {
        if principal.superuser {
            return true;
        }
        if Self::holds(Some(&self.global), principal, permission) {
            return true;
        }
        match object {
            Some(obj) => Self::holds(self.by_object.get(&obj), principal, permission),
            None => false,
        }
    }
}

impl From<Vec<Grant>> for GrantTable {
    fn from(grants: Vec<Grant>) -> Self {
        let mut table = GrantTable::new();
        for g in grants {
            table.grant(g);
        }
        table
    }
}

impl From<GrantTable> for Vec<Grant> {
    fn from(table: GrantTable) -> Self {
        let mut out = table.for_object(None);
        let mut objects: Vec<ObjectRef> = table.by_object.keys().copied().collect();
        objects.sort();
        for obj in objects {
            out.extend(table.for_object(Some(obj)));
        }
        out
    }
}
