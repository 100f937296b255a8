use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;

/// Days a snapshot stays restorable.
pub const DEFAULT_TTL_DAYS: i64 = 7;

/// Before/after record enabling reversal of one mutating action.
/// Append-only: never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationSnapshot {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub task_id: String,
    pub pattern_id: String,
    pub file_path: Option<PathBuf>,
    pub original_content: String,
    pub modified_content: String,
    pub description: String,
    /// Sum of both payload lengths.
    pub size: usize,
    /// Hex sha-256 of original followed by modified content.
    pub fingerprint: String,
}

impl OperationSnapshot {
    #[must_use]
    pub fn new(
        task_id: &str,
        pattern_id: &str,
        file_path: Option<PathBuf>,
        original_content: String,
        modified_content: String,
        description: &str,
    ) -> Self {
        let size = original_content.len() + modified_content.len();
        let fingerprint = fingerprint_of(&original_content, &modified_content);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            task_id: task_id.to_string(),
            pattern_id: pattern_id.to_string(),
            file_path,
            original_content,
            modified_content,
            description: description.to_string(),
            size,
            fingerprint,
        }
    }

    /// Pure function of the clock: expired once `now - created_at`
    /// exceeds the ttl.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        now - self.created_at > ttl
    }
}

#[must_use]
pub fn fingerprint_of(original: &str, modified: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(original.as_bytes());
    hasher.update(modified.as_bytes());
    hex::encode(hasher.finalize())
}
