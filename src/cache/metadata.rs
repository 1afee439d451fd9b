//! On-disk index shape for the filing cache (§6 `cache_metadata.json`).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub file_name: String,
    pub size_bytes: u64,
    pub stored_at: chrono::DateTime<chrono::Utc>,
    pub last_accessed: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub entries: HashMap<String, CacheEntry>,
    pub total_bytes: u64,
}

impl CacheMetadata {
    /// Keys sorted by `last_accessed` ascending — the eviction order for
    /// reclaiming space, oldest access first.
    pub fn keys_by_lru(&self) -> Vec<String> {
        let mut entries: Vec<&CacheEntry> = self.entries.values().collect();
        entries.sort_by_key(|e| e.last_accessed);
        entries.into_iter().map(|e| e.key.clone()).collect()
    }
}
