//! Conversation memory persistence.
//!
//! An append-only log of query/response pairs with timestamps and optional
//! metadata, serializable to a JSON array and restorable from it. Only the
//! persistence half lives here; in-process conversational buffering belongs
//! to whatever agent framework sits on top.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, VellumError};

/// One recorded interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub query: String,
    pub response: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Append-only conversation log.
///
/// Insertion order is chronological order; existing records are never
/// mutated.
#[derive(Debug, Default)]
pub struct ConversationMemory {
    records: Vec<MemoryRecord>,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record stamped with the current time.
    pub fn append(&mut self, query: &str, response: &str, metadata: Option<serde_json::Value>) {
        self.records.push(MemoryRecord {
            query: query.to_string(),
            response: response.to_string(),
            timestamp: Utc::now(),
            metadata,
        });
    }

    /// Serialize the full ordered log to `destination`, overwriting any
    /// existing content.
    pub fn save(&self, destination: &Path) -> Result<()> {
        if let Some(parent) = destination.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| VellumError::storage(parent, e))?;
            }
        }
        let json = serde_json::to_string_pretty(&self.records)
            .map_err(|e| VellumError::storage(destination, e))?;
        std::fs::write(destination, json).map_err(|e| VellumError::storage(destination, e))
    }

    /// Replace the in-memory log with the records persisted at `source`,
    /// preserving their original order and timestamps.
    pub fn load(&mut self, source: &Path) -> Result<()> {
        if !source.exists() {
            return Err(VellumError::NotFound {
                path: source.to_path_buf(),
            });
        }
        let raw =
            std::fs::read_to_string(source).map_err(|e| VellumError::storage(source, e))?;
        let records: Vec<MemoryRecord> =
            serde_json::from_str(&raw).map_err(|e| VellumError::storage(source, e))?;

        self.records.clear();
        self.records = records;
        Ok(())
    }

    /// Empty the log. Irreversible.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// The last `k` records in chronological order (all records if fewer
    /// than `k` exist).
    ///
    /// This is a recency heuristic, not a relevance ranking; a replacement
    /// that scores records against the current query can drop in here.
    pub fn recent(&self, k: usize) -> &[MemoryRecord] {
        let start = self.records.len().saturating_sub(k);
        &self.records[start..]
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_append_preserves_insertion_order() {
        let mut memory = ConversationMemory::new();
        memory.append("q1", "r1", None);
        memory.append("q2", "r2", Some(serde_json::json!({"source": "test"})));
        memory.append("q3", "r3", None);

        assert_eq!(memory.len(), 3);
        let queries: Vec<&str> = memory.recent(10).iter().map(|r| r.query.as_str()).collect();
        assert_eq!(queries, vec!["q1", "q2", "q3"]);
        assert!(memory.recent(10)[0].timestamp <= memory.recent(10)[2].timestamp);
    }

    #[test]
    fn test_recent_returns_last_k_in_chronological_order() {
        let mut memory = ConversationMemory::new();
        for i in 0..5 {
            memory.append(&format!("q{}", i), "r", None);
        }

        let last_two: Vec<&str> = memory.recent(2).iter().map(|r| r.query.as_str()).collect();
        assert_eq!(last_two, vec!["q3", "q4"]);

        // k larger than the log returns everything.
        assert_eq!(memory.recent(100).len(), 5);
    }

    #[test]
    fn test_save_load_roundtrip_preserves_records_and_timestamps() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("memory.json");

        let mut memory = ConversationMemory::new();
        for i in 0..5 {
            memory.append(
                &format!("question {}", i),
                &format!("answer {}", i),
                if i % 2 == 0 {
                    Some(serde_json::json!({"turn": i}))
                } else {
                    None
                },
            );
        }
        let original: Vec<MemoryRecord> = memory.recent(5).to_vec();
        memory.save(&path).unwrap();

        let mut restored = ConversationMemory::new();
        restored.append("stale", "should be replaced", None);
        restored.load(&path).unwrap();

        assert_eq!(restored.len(), 5);
        assert_eq!(restored.recent(5), &original[..]);
    }

    #[test]
    fn test_load_missing_file_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let mut memory = ConversationMemory::new();
        let err = memory.load(&tmp.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, VellumError::NotFound { .. }));
    }

    #[test]
    fn test_save_overwrites_existing_content() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("memory.json");

        let mut memory = ConversationMemory::new();
        memory.append("first", "r", None);
        memory.save(&path).unwrap();

        memory.clear();
        memory.append("second", "r", None);
        memory.save(&path).unwrap();

        let mut restored = ConversationMemory::new();
        restored.load(&path).unwrap();
        assert_eq!(restored.len(), 1);
        assert_eq!(restored.recent(1)[0].query, "second");
    }

    #[test]
    fn test_clear_empties_the_log() {
        let mut memory = ConversationMemory::new();
        memory.append("q", "r", None);
        memory.clear();
        assert!(memory.is_empty());
        assert!(memory.recent(3).is_empty());
    }
}
