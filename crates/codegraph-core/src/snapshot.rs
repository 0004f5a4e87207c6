// ABOUTME: Snapshot: an immutable, atomically committed analysis result set.
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type SnapshotId = Uuid;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GitMetadata {
    pub commit: Option<String>,
    pub branch: Option<String>,
    pub tag: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotCounts {
    pub functions: u64,
    pub edges: u64,
    pub types: u64,
    pub members: u64,
    pub relationships: u64,
    pub unresolved: u64,
    pub skipped_files: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: SnapshotId,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub label: Option<String>,
    pub source_root: String,
    pub config_hash: String,
    pub git: GitMetadata,
    pub counts: SnapshotCounts,
}

impl Snapshot {
    pub fn new(source_root: impl Into<String>, config_hash: impl Into<String>, label: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: chrono::Utc::now(),
            label,
            source_root: source_root.into(),
            config_hash: config_hash.into(),
            git: GitMetadata::default(),
            counts: SnapshotCounts::default(),
        }
    }
}
