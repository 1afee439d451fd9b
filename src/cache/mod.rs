//! Filing cache (§4.B): a size-capped, LRU-evicted disk cache for raw filing
//! bytes fetched through the EDGAR client.
//!
//! Grounded on the teacher's own atomic-write discipline (temp file, then
//! rename) applied to both the payload files and the `cache_metadata.json`
//! index. The index is guarded by a single `tokio::sync::Mutex`, matching
//! the "single writer at a time" rule for cache metadata mutation (§5).

mod metadata;

pub use metadata::{CacheEntry, CacheMetadata};

use crate::error::{EngineError, EngineResult};
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

/// Eviction continues past the budget down to this fraction of `max_bytes`
/// (§4.B), rather than stopping the instant the store drops back to 100%.
const EVICTION_TARGET_RATIO: f64 = 0.9;

#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub entry_count: usize,
    pub total_bytes: u64,
}

pub struct FilingCache {
    dir: PathBuf,
    max_bytes: u64,
    index: Mutex<CacheMetadata>,
}

impl FilingCache {
    const INDEX_FILE: &'static str = "cache_metadata.json";

    /// Opens (or creates) the cache directory and loads its index. Entries
    /// whose payload file is missing are dropped from the index — a
    /// best-effort repair of a prior unclean shutdown rather than a failure.
    pub async fn open(dir: impl AsRef<Path>, max_bytes: u64) -> EngineResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await?;

        let index_path = dir.join(Self::INDEX_FILE);
        let mut metadata = match fs::read(&index_path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
            Err(_) => CacheMetadata::default(),
        };

        let mut stale_keys = Vec::new();
        for (key, entry) in metadata.entries.iter() {
            if fs::metadata(dir.join(&entry.file_name)).await.is_err() {
                stale_keys.push(key.clone());
            }
        }
        for key in stale_keys {
            if let Some(entry) = metadata.entries.remove(&key) {
                metadata.total_bytes = metadata.total_bytes.saturating_sub(entry.size_bytes);
            }
        }

        let cache = Self {
            dir,
            max_bytes,
            index: Mutex::new(metadata),
        };
        cache.persist_index().await?;
        Ok(cache)
    }

    /// Returns the cached payload for `key`, touching its `last_accessed`
    /// timestamp, or `None` on a cache miss.
    pub async fn lookup(&self, key: &str) -> Option<Vec<u8>> {
        let file_name = {
            let mut index = self.index.lock().await;
            let entry = index.entries.get_mut(key)?;
            entry.last_accessed = Utc::now();
            entry.file_name.clone()
        };

        match fs::read(self.dir.join(&file_name)).await {
            Ok(bytes) => {
                let _ = self.persist_index().await;
                Some(bytes)
            }
            Err(_) => {
                // Payload vanished out from under the index; drop the entry.
                let mut index = self.index.lock().await;
                if let Some(entry) = index.entries.remove(key) {
                    index.total_bytes = index.total_bytes.saturating_sub(entry.size_bytes);
                }
                None
            }
        }
    }

    /// Writes `bytes` under `key`, evicting the least-recently-accessed
    /// entries first if the store would exceed `max_bytes`.
    pub async fn store(&self, key: &str, bytes: &[u8]) -> EngineResult<()> {
        let file_name = sanitize_key(key);
        let final_path = self.dir.join(&file_name);
        let tmp_path = self.dir.join(format!("{file_name}.tmp"));

        fs::write(&tmp_path, bytes)
            .await
            .map_err(|e| EngineError::CacheWriteFailed(e.to_string()))?;
        fs::rename(&tmp_path, &final_path)
            .await
            .map_err(|e| EngineError::CacheWriteFailed(e.to_string()))?;

        let size_bytes = bytes.len() as u64;
        {
            let mut index = self.index.lock().await;
            if let Some(old) = index.entries.remove(key) {
                index.total_bytes = index.total_bytes.saturating_sub(old.size_bytes);
            }
            index.entries.insert(
                key.to_string(),
                CacheEntry {
                    key: key.to_string(),
                    file_name,
                    size_bytes,
                    stored_at: Utc::now(),
                    last_accessed: Utc::now(),
                },
            );
            index.total_bytes += size_bytes;
            self.evict_over_budget(&mut index).await;
        }
        self.persist_index().await?;
        Ok(())
    }

    async fn evict_over_budget(&self, index: &mut CacheMetadata) {
        if index.total_bytes <= self.max_bytes {
            return;
        }
        let target_bytes = (self.max_bytes as f64 * EVICTION_TARGET_RATIO) as u64;
        let lru_keys = index.keys_by_lru();
        let mut iter = lru_keys.into_iter();
        while index.total_bytes > target_bytes {
            let Some(key) = iter.next() else { break };
            if let Some(entry) = index.entries.remove(&key) {
                index.total_bytes = index.total_bytes.saturating_sub(entry.size_bytes);
                let _ = fs::remove_file(self.dir.join(&entry.file_name)).await;
            }
        }
    }

    pub async fn clear(&self, key: &str) -> EngineResult<()> {
        let mut index = self.index.lock().await;
        if let Some(entry) = index.entries.remove(key) {
            index.total_bytes = index.total_bytes.saturating_sub(entry.size_bytes);
            let _ = fs::remove_file(self.dir.join(&entry.file_name)).await;
        }
        drop(index);
        self.persist_index().await
    }

    pub async fn clear_all(&self) -> EngineResult<()> {
        let mut index = self.index.lock().await;
        for entry in index.entries.values() {
            let _ = fs::remove_file(self.dir.join(&entry.file_name)).await;
        }
        *index = CacheMetadata::default();
        drop(index);
        self.persist_index().await
    }

    pub async fn stats(&self) -> CacheStats {
        let index = self.index.lock().await;
        CacheStats {
            entry_count: index.entries.len(),
            total_bytes: index.total_bytes,
        }
    }

    async fn persist_index(&self) -> EngineResult<()> {
        let index = self.index.lock().await;
        let bytes = serde_json::to_vec_pretty(&*index)?;
        drop(index);

        let final_path = self.dir.join(Self::INDEX_FILE);
        let tmp_path = self.dir.join(format!("{}.tmp", Self::INDEX_FILE));
        fs::write(&tmp_path, bytes)
            .await
            .map_err(|e| EngineError::CacheWriteFailed(e.to_string()))?;
        fs::rename(&tmp_path, &final_path)
            .await
            .map_err(|e| EngineError::CacheWriteFailed(e.to_string()))?;
        Ok(())
    }
}

fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn stores_and_looks_up_a_payload() {
        let dir = tempdir().unwrap();
        let cache = FilingCache::open(dir.path(), 1024 * 1024).await.unwrap();

        cache.store("0000320193/10-K/doc.htm", b"hello").await.unwrap();
        let found = cache.lookup("0000320193/10-K/doc.htm").await;
        assert_eq!(found, Some(b"hello".to_vec()));

        let stats = cache.stats().await;
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.total_bytes, 5);
    }

    #[tokio::test]
    async fn lookup_miss_returns_none() {
        let dir = tempdir().unwrap();
        let cache = FilingCache::open(dir.path(), 1024).await.unwrap();
        assert_eq!(cache.lookup("missing").await, None);
    }

    #[tokio::test]
    async fn evicts_least_recently_accessed_when_over_budget() {
        let dir = tempdir().unwrap();
        // max_bytes=12, 90% target=10: three 5-byte entries overflow the
        // budget, and eviction must stop once back at or under the target
        // rather than at the 12-byte cap itself.
        let cache = FilingCache::open(dir.path(), 12).await.unwrap();

        cache.store("a", b"hello").await.unwrap();
        cache.store("b", b"world").await.unwrap();
        cache.store("c", b"there").await.unwrap();

        let stats = cache.stats().await;
        assert_eq!(stats.entry_count, 2);
        assert!(stats.total_bytes <= 10);
        assert_eq!(cache.lookup("a").await, None);
        assert_eq!(cache.lookup("b").await, Some(b"world".to_vec()));
        assert_eq!(cache.lookup("c").await, Some(b"there".to_vec()));
    }

    #[tokio::test]
    async fn survives_restart_with_index_reloaded() {
        let dir = tempdir().unwrap();
        {
            let cache = FilingCache::open(dir.path(), 1024).await.unwrap();
            cache.store("k", b"payload").await.unwrap();
        }
        let reopened = FilingCache::open(dir.path(), 1024).await.unwrap();
        assert_eq!(reopened.lookup("k").await, Some(b"payload".to_vec()));
    }

    #[tokio::test]
    async fn drops_entries_whose_payload_file_is_missing_on_open() {
        let dir = tempdir().unwrap();
        {
            let cache = FilingCache::open(dir.path(), 1024).await.unwrap();
            cache.store("k", b"payload").await.unwrap();
        }
        fs::remove_file(dir.path().join("k")).await.unwrap();

        let reopened = FilingCache::open(dir.path(), 1024).await.unwrap();
        assert_eq!(reopened.stats().await.entry_count, 0);
    }
}
