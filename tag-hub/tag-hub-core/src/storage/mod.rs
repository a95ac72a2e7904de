//! In-memory tag and document records with JSON snapshot persistence.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use uuid::Uuid;


pub const DEFAULT_COLOR: &str = "#000000";
pub const MAX_LABEL_LEN: usize = 128;
const SNAPSHOT_FILE: &str = "state.json";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
    pub id: Uuid,
    pub label: String,
    pub color: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    documents: BTreeSet<Uuid>,
}

impl Tag {
    pub fn document_ids(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.documents.iter().copied()
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub fn is_attached_to(&self, document: Uuid) -> bool {
        self.documents.contains(&document)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    pub id: Uuid,
    pub label: String,
    pub created_at: DateTime<Utc>,
}

/// Partial tag update. `None` leaves the field untouched.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct TagPatch {
    pub label: Option<String>,
    pub color: Option<String>,
}

fn validate_label(label: &str) -> Result<String> {
    let label = label.trim();
    if label.is_empty() {
        return Err(Error::validation("label must not be empty"));
    }
    if label.chars().count() > MAX_LABEL_LEN {
        return Err(Error::validation(format!(
            "label must be at most {MAX_LABEL_LEN} characters"
        )));
    }
    Ok(label.to_string())
}

fn validate_color(color: &str) -> Result<String> {
    let color = color.trim();
    let valid = color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit());
    if !valid {
        return Err(Error::validation(format!(
            "color must look like #RRGGBB, got {color:?}"
        )));
    }
    Ok(color.to_string())
}

/// Tags, documents and the association between them.
///
/// The association is stored on the tag side; the reverse view of a
/// document's tags is computed from it.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TagStore {
    tags: HashMap<Uuid, Tag>,
    documents: HashMap<Uuid, Document>,
}

impl TagStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_tag(&mut self, label: &str, color: Option<&str>) -> Result<&Tag> {
        let label = validate_label(label)?;
        let color = validate_color(color.unwrap_or(DEFAULT_COLOR))?;
        let id = Uuid::new_v4();
        let tag = Tag {
            id,
            label,
            color,
            created_at: Utc::now(),
            documents: BTreeSet::new(),
        };
        Ok(self.tags.entry(id).or_insert(tag))
    }

    pub fn get_tag(&self, id: Uuid) -> Option<&Tag> {
        self.tags.get(&id)
    }

    /// All tags ordered by label, then id.
    pub fn tags(&self) -> Vec<&Tag> {
        let mut out: Vec<&Tag> = self.tags.values().collect();
        out.sort_by(|a, b| a.label.cmp(&b.label).then(a.id.cmp(&b.id)));
        out
    }

    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }

    /// Full replace: `label` is required, a missing color resets to the default.
    pub fn replace_tag(&mut self, id: Uuid, label: &str, color: Option<&str>) -> Result<&Tag> {
        let label = validate_label(label)?;
        let color = validate_color(color.unwrap_or(DEFAULT_COLOR))?;
        let tag = self.tags.get_mut(&id).ok_or(Error::NotFound)?;
        tag.label = label;
        tag.color = color;
        Ok(tag)
    }

    /// Partial update: only supplied fields change.
    pub fn update_tag(&mut self, id: Uuid, patch: &TagPatch) -> Result<&Tag> {
        let label = patch.label.as_deref().map(validate_label).transpose()?;
        let color = patch.color.as_deref().map(validate_color).transpose()?;
        let tag = self.tags.get_mut(&id).ok_or(Error::NotFound)?;
        if let Some(label) = label {
            tag.label = label;
        }
        if let Some(color) = color {
            tag.color = color;
        }
        Ok(tag)
    }

    /// Remove a tag; its document associations go with it.
    pub fn delete_tag(&mut self, id: Uuid) -> Result<Tag> {
        self.tags.remove(&id).ok_or(Error::NotFound)
    }

    pub fn create_document(&mut self, label: &str) -> Result<&Document> {
        let label = validate_label(label)?;
        let id = Uuid::new_v4();
        let doc = Document {
            id,
            label,
            created_at: Utc::now(),
        };
        Ok(self.documents.entry(id).or_insert(doc))
    }

    pub fn get_document(&self, id: Uuid) -> Option<&Document> {
        self.documents.get(&id)
    }

    /// All documents ordered by label, then id.
    pub fn documents(&self) -> Vec<&Document> {
        let mut out: Vec<&Document> = self.documents.values().collect();
        out.sort_by(|a, b| a.label.cmp(&b.label).then(a.id.cmp(&b.id)));
        out
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// Remove a document and detach it from every tag.
    pub fn delete_document(&mut self, id: Uuid) -> Result<Document> {
        let doc = self.documents.remove(&id).ok_or(Error::NotFound)?;
        for tag in self.tags.values_mut() {
            tag.documents.remove(&id);
        }
        Ok(doc)
    }

    /// Attach `tag` to `document`. Returns false when it was already attached.
    pub fn attach(&mut self, tag: Uuid, document: Uuid) -> Result<bool> {
        if !self.documents.contains_key(&document) {
            return Err(Error::NotFound);
        }
        let tag = self.tags.get_mut(&tag).ok_or(Error::NotFound)?;
        Ok(tag.documents.insert(document))
    }

    /// Detach `tag` from `document`. A pair that is not attached is not found.
    pub fn remove(&mut self, tag: Uuid, document: Uuid) -> Result<()> {
        let tag = self.tags.get_mut(&tag).ok_or(Error::NotFound)?;
        if tag.documents.remove(&document) {
            Ok(())
        } else {
            Err(Error::NotFound)
        }
    }

    pub fn is_attached(&self, tag: Uuid, document: Uuid) -> bool {
        self.tags
            .get(&tag)
            .is_some_and(|t| t.is_attached_to(document))
    }

    /// Tags attached to a document, ordered like [`TagStore::tags`].
    pub fn document_tags(&self, document: Uuid) -> Vec<&Tag> {
        self.tags()
            .into_iter()
            .filter(|t| t.is_attached_to(document))
            .collect()
    }

    /// Documents a tag is attached to, ordered like [`TagStore::documents`].
    pub fn tag_documents(&self, tag: Uuid) -> Vec<&Document> {
        let Some(tag) = self.tags.get(&tag) else {
            return Vec::new();
        };
        let mut out: Vec<&Document> = tag
            .documents
            .iter()
            .filter_map(|id| self.documents.get(id))
            .collect();
        out.sort_by(|a, b| a.label.cmp(&b.label).then(a.id.cmp(&b.id)));
        out
    }
}

/// Directory holding the persisted state snapshot.
#[derive(Clone, Debug)]
pub struct DataDir {
    dir: PathBuf,
}

impl DataDir {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    fn snapshot_path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILE)
    }

    /// Load the last snapshot, or `None` when nothing was saved yet.
    pub fn load<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        let path = self.snapshot_path();
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&data)?))
    }

    /// Write the snapshot through a temp file so readers never see a torn file.
    pub fn save<T: Serialize>(&self, value: &T) -> Result<()> {
        let path = self.snapshot_path();
        let tmp = self.dir.join(format!("{SNAPSHOT_FILE}.tmp"));
        let data = serde_json::to_vec(value)?;
        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}
