use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Public location where tracked files are stored.
pub const PUBLIC_URI: &str = "public://neo-file";

/// Location under the config sync directory that mirrors [`PUBLIC_URI`].
pub const CONFIG_URI: &str = "config://files";

/// Snapshot name prefix for config file records: `<namespace>.<entity-type>.`
pub const CONFIG_PREFIX: &str = "config_file.config_file.";

/// Longest id kept verbatim before it is shortened and hash-suffixed.
pub const MAX_ID_LENGTH: usize = 238;

const SHORTENED_ID_LENGTH: usize = 200;
const HASH_SUFFIX_LENGTH: usize = 10;

/// Kind of a dependency declared on a config file record.
///
/// Variants are declared alphabetically so the derived ordering matches the
/// order of their serialized names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    Config,
    Content,
    Module,
    Theme,
}

impl DependencyKind {
    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "config" => Some(DependencyKind::Config),
            "content" => Some(DependencyKind::Content),
            "module" => Some(DependencyKind::Module),
            "theme" => Some(DependencyKind::Theme),
            _ => None,
        }
    }
}

/// Dependency names grouped by kind. Kinds iterate in ascending order and the
/// names of each kind are unique and sorted case-insensitively.
pub type Dependents = BTreeMap<DependencyKind, Vec<String>>;

/// Lifecycle status of a managed file entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Temporary,
    Permanent,
}

/// A managed file entity: the host's record of a file living at `uri`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagedFile {
    pub id: String,
    pub uri: String,
    pub filename: String,
    pub mime_type: String,
    pub byte_size: u64,
    #[serde(default)]
    pub owner_id: Option<String>,
    pub status: FileStatus,
    pub created_at: DateTime<Utc>,
    pub changed_at: DateTime<Utc>,
}

impl ManagedFile {
    pub fn is_permanent(&self) -> bool {
        self.status == FileStatus::Permanent
    }
}

/// A file tracked as a configuration object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigFileRecord {
    pub id: String,
    pub filename: String,
    pub uri: String,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub parent_type: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub parent_field: Option<String>,
    /// Changed time (unix seconds) of the public file at the last save
    #[serde(default)]
    pub changed: Option<i64>,
    #[serde(default)]
    pub dependents: Dependents,
}

impl ConfigFileRecord {
    /// Build an unsaved record for a freshly uploaded file.
    pub fn from_upload(file: &ManagedFile) -> Self {
        let filename = crate::filesystem::basename(&file.uri).to_string();

        Self {
            id: derive_id(&filename),
            filename,
            uri: file.uri.clone(),
            owner_id: file.owner_id.clone(),
            parent_type: None,
            parent_id: None,
            parent_field: None,
            changed: None,
            dependents: Dependents::new(),
        }
    }

    /// Location of the config-tracked copy of this file.
    pub fn config_uri(&self) -> String {
        self.uri.replacen(PUBLIC_URI, CONFIG_URI, 1)
    }

    /// Whether `uri` lies below [`PUBLIC_URI`], so the config copy is a distinct file.
    pub fn has_public_uri(&self) -> bool {
        self.uri
            .strip_prefix(PUBLIC_URI)
            .is_some_and(|rest| rest.len() > 1 && rest.starts_with('/'))
    }

    /// Name of this record's config snapshot, without the `.yml` extension.
    pub fn config_name(&self) -> String {
        format!("{CONFIG_PREFIX}{}", self.id)
    }

    pub fn set_parent(&mut self, parent_type: &str, parent_id: &str, parent_field: Option<&str>) {
        self.parent_type = Some(parent_type.to_string());
        self.parent_id = Some(parent_id.to_string());
        self.parent_field = parent_field.map(|f| f.to_string());
    }

    pub fn has_parent(&self) -> bool {
        self.parent_type.is_some() && self.parent_id.is_some()
    }

    /// Record a dependent, keeping kinds and names in their canonical order.
    pub fn add_dependent(&mut self, kind: DependencyKind, name: &str) -> &mut Self {
        let names = self.dependents.entry(kind).or_default();
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
            names.sort_by_key(|n| n.to_lowercase());
        }
        self
    }

    /// Dependencies exported alongside the record.
    pub fn dependencies(&self) -> Dependents {
        self.dependents.clone()
    }
}

/// Derive a stable record id from a filename.
///
/// The name is lower-cased, runs of characters outside `[a-z0-9_]` become a
/// single `_`, and overly long results are shortened with a hash suffix.
pub fn derive_id(filename: &str) -> String {
    let lowered = filename.to_ascii_lowercase();

    let mut id = String::with_capacity(lowered.len());
    for c in lowered.chars() {
        let c = if c.is_ascii_lowercase() || c.is_ascii_digit() {
            c
        } else {
            '_'
        };
        if c == '_' && id.ends_with('_') {
            continue;
        }
        id.push(c);
    }

    if id.len() > MAX_ID_LENGTH {
        let digest = ring::digest::digest(&ring::digest::SHA256, id.as_bytes());
        let hash: String = digest
            .as_ref()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect();
        id = format!(
            "{}__{}",
            &id[..SHORTENED_ID_LENGTH],
            &hash[..HASH_SUFFIX_LENGTH]
        );
    }

    id
}
