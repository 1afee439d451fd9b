//! Profile Store (§4.H): persists unified profiles and their secondary
//! collections (relationship edges, financial relationships, key-person
//! interlocks, failures).
//!
//! Modeled as a `ProfileStore` trait so the aggregator and batch controller
//! depend on an interface rather than a concrete database — no teacher crate
//! in the pack commits to one persistence engine for this document shape, so
//! the production implementation, `FileProfileStore`, persists each
//! collection as newline-delimited JSON under a configured directory using
//! the same temp-file-then-rename discipline the filing cache uses (§4.B):
//! the idiom reused where the spec is silent on mechanism.

use crate::aggregator::profile::UnifiedProfile;
use crate::config::StoreSettings;
use crate::error::{EngineError, EngineResult};
use crate::relationships::{FinancialRelationships, RelationshipEdge};
use crate::validator::FailureRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

/// One company a key person is associated with, as recorded in that
/// person's interlock record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterlockCompany {
    pub cik: String,
    pub ticker: String,
    pub roles: Vec<String>,
}

/// A person who appears across more than one company's `key_persons`
/// rollup (§4.H "key-person interlocks, keyed by canonical person name") —
/// the structure that lets the store answer "which companies share a
/// director or officer".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeyPersonInterlock {
    pub person_name: String,
    pub companies: Vec<InterlockCompany>,
}

/// Upsert-by-key persistence surface for every collection the engine writes
/// (§4.H). Every method is infallible in the "never loses data" sense but
/// can fail on I/O, in which case the caller (aggregator or batch
/// controller) records the failure rather than retrying indefinitely.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Upserts by `profile.cik`, replacing — never partially mutating — any
    /// existing profile for that company (§3 "Profiles are ... replaced
    /// (never partially mutated) on re-aggregation").
    async fn upsert_profile(&self, profile: &UnifiedProfile) -> EngineResult<()>;

    async fn get_profile(&self, cik: &str) -> EngineResult<Option<UnifiedProfile>>;

    async fn list_profiles(&self) -> EngineResult<Vec<UnifiedProfile>>;

    /// Upserts each edge keyed by `(from_cik, to_cik, relationship_type)`;
    /// an existing edge's `mention_count` accumulates and its confidence is
    /// replaced only if the new value is higher.
    async fn upsert_relationship_edges(&self, edges: &[RelationshipEdge]) -> EngineResult<()>;

    /// Upserts keyed by `cik`, replacing the prior record for that company.
    async fn upsert_financial_relationships(&self, record: &FinancialRelationships) -> EngineResult<()>;

    /// Upserts keyed by canonical person name, merging `company` into the
    /// existing record's company list (or creating a new one).
    async fn upsert_key_person_interlock(
        &self,
        person_name: &str,
        company: InterlockCompany,
    ) -> EngineResult<()>;

    /// Records or updates a failure, keyed by ticker; a second failure for
    /// the same ticker increments `retry_count` rather than duplicating the
    /// record.
    async fn upsert_failure(&self, record: FailureRecord) -> EngineResult<()>;

    /// Clears the failure record for `ticker`, called when a profile for its
    /// cik is next persisted successfully (§4.G).
    async fn clear_failure(&self, ticker: &str) -> EngineResult<()>;

    async fn list_failures(&self) -> EngineResult<Vec<FailureRecord>>;
}

/// Newline-delimited-JSON file store. One file per collection, each
/// collection guarded by its own mutex so writes to `profiles` don't block
/// writes to `failures`.
pub struct FileProfileStore {
    dir: PathBuf,
    settings: StoreSettings,
    profiles_lock: Mutex<()>,
    relationships_lock: Mutex<()>,
    financial_relationships_lock: Mutex<()>,
    interlocks_lock: Mutex<()>,
    failures_lock: Mutex<()>,
}

impl FileProfileStore {
    pub async fn open(settings: StoreSettings) -> EngineResult<Self> {
        let dir = PathBuf::from(&settings.dir);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| EngineError::Storage(e.to_string()))?;
        Ok(Self {
            dir,
            settings,
            profiles_lock: Mutex::new(()),
            relationships_lock: Mutex::new(()),
            financial_relationships_lock: Mutex::new(()),
            interlocks_lock: Mutex::new(()),
            failures_lock: Mutex::new(()),
        })
    }

    fn path_for(&self, collection: &str) -> PathBuf {
        self.dir.join(format!("{collection}.ndjson"))
    }
}

async fn read_collection<T: DeserializeOwned>(path: &Path) -> EngineResult<Vec<T>> {
    match fs::read_to_string(path).await {
        Ok(content) => content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(EngineError::from))
            .collect(),
        Err(_) => Ok(Vec::new()),
    }
}

async fn write_collection<T: Serialize>(path: &Path, items: &[T]) -> EngineResult<()> {
    let mut buf = String::new();
    for item in items {
        buf.push_str(&serde_json::to_string(item)?);
        buf.push('\n');
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = path.with_file_name(format!("{file_name}.tmp"));

    fs::write(&tmp_path, buf)
        .await
        .map_err(|e| EngineError::Storage(e.to_string()))?;
    fs::rename(&tmp_path, path)
        .await
        .map_err(|e| EngineError::Storage(e.to_string()))?;
    Ok(())
}

#[async_trait]
impl ProfileStore for FileProfileStore {
    async fn upsert_profile(&self, profile: &UnifiedProfile) -> EngineResult<()> {
        let path = self.path_for(&self.settings.profiles_collection);
        let _guard = self.profiles_lock.lock().await;

        let mut profiles: Vec<UnifiedProfile> = read_collection(&path).await?;
        match profiles.iter_mut().find(|p| p.cik == profile.cik) {
            Some(existing) => *existing = profile.clone(),
            None => profiles.push(profile.clone()),
        }
        write_collection(&path, &profiles).await
    }

    async fn get_profile(&self, cik: &str) -> EngineResult<Option<UnifiedProfile>> {
        let path = self.path_for(&self.settings.profiles_collection);
        let _guard = self.profiles_lock.lock().await;
        let profiles: Vec<UnifiedProfile> = read_collection(&path).await?;
        Ok(profiles.into_iter().find(|p| p.cik == cik))
    }

    async fn list_profiles(&self) -> EngineResult<Vec<UnifiedProfile>> {
        let path = self.path_for(&self.settings.profiles_collection);
        let _guard = self.profiles_lock.lock().await;
        read_collection(&path).await
    }

    async fn upsert_relationship_edges(&self, edges: &[RelationshipEdge]) -> EngineResult<()> {
        if edges.is_empty() {
            return Ok(());
        }
        let path = self.path_for(&self.settings.company_relationships_collection);
        let _guard = self.relationships_lock.lock().await;

        let mut stored: Vec<RelationshipEdge> = read_collection(&path).await?;
        for edge in edges {
            let existing = stored.iter_mut().find(|e| {
                e.from_cik == edge.from_cik
                    && e.to_cik == edge.to_cik
                    && e.relationship_type == edge.relationship_type
            });
            match existing {
                Some(current) => {
                    current.mention_count += edge.mention_count;
                    current.first_mentioned = current.first_mentioned.min(edge.first_mentioned);
                    current.last_mentioned = current.last_mentioned.max(edge.last_mentioned);
                    if edge.confidence > current.confidence {
                        current.confidence = edge.confidence;
                        current.source_accession = edge.source_accession.clone();
                    }
                }
                None => stored.push(edge.clone()),
            }
        }
        write_collection(&path, &stored).await
    }

    async fn upsert_financial_relationships(&self, record: &FinancialRelationships) -> EngineResult<()> {
        let path = self.path_for(&self.settings.financial_relationships_collection);
        let _guard = self.financial_relationships_lock.lock().await;

        let mut stored: Vec<FinancialRelationships> = read_collection(&path).await?;
        match stored.iter_mut().find(|r| r.cik == record.cik) {
            Some(existing) => *existing = record.clone(),
            None => stored.push(record.clone()),
        }
        write_collection(&path, &stored).await
    }

    async fn upsert_key_person_interlock(
        &self,
        person_name: &str,
        company: InterlockCompany,
    ) -> EngineResult<()> {
        let path = self.path_for(&self.settings.key_person_interlocks_collection);
        let _guard = self.interlocks_lock.lock().await;

        let mut stored: Vec<KeyPersonInterlock> = read_collection(&path).await?;
        match stored.iter_mut().find(|i| i.person_name == person_name) {
            Some(existing) => match existing.companies.iter_mut().find(|c| c.cik == company.cik) {
                Some(existing_company) => {
                    for role in company.roles {
                        if !existing_company.roles.contains(&role) {
                            existing_company.roles.push(role);
                        }
                    }
                }
                None => existing.companies.push(company),
            },
            None => stored.push(KeyPersonInterlock {
                person_name: person_name.to_string(),
                companies: vec![company],
            }),
        }
        write_collection(&path, &stored).await
    }

    async fn upsert_failure(&self, record: FailureRecord) -> EngineResult<()> {
        let path = self.path_for(&self.settings.failures_collection);
        let _guard = self.failures_lock.lock().await;

        let mut stored: Vec<FailureRecord> = read_collection(&path).await?;
        match stored.iter_mut().find(|f| f.ticker == record.ticker) {
            Some(existing) => *existing = record,
            None => stored.push(record),
        }
        write_collection(&path, &stored).await
    }

    async fn clear_failure(&self, ticker: &str) -> EngineResult<()> {
        let path = self.path_for(&self.settings.failures_collection);
        let _guard = self.failures_lock.lock().await;

        let mut stored: Vec<FailureRecord> = read_collection(&path).await?;
        let before = stored.len();
        stored.retain(|f| f.ticker != ticker);
        if stored.len() == before {
            return Ok(());
        }
        write_collection(&path, &stored).await
    }

    async fn list_failures(&self) -> EngineResult<Vec<FailureRecord>> {
        let path = self.path_for(&self.settings.failures_collection);
        let _guard = self.failures_lock.lock().await;
        read_collection(&path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Cik;
    use crate::error::FailureReason;
    use crate::relationships::RelationshipType;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn settings(dir: &Path) -> StoreSettings {
        StoreSettings {
            dir: dir.to_string_lossy().into_owned(),
            ..StoreSettings::default()
        }
    }

    #[tokio::test]
    async fn upserts_profile_by_cik() {
        let dir = tempdir().unwrap();
        let store = FileProfileStore::open(settings(dir.path())).await.unwrap();
        let cik = Cik::new("320193");

        let mut profile = UnifiedProfile::empty(&cik, "AAPL", "Apple Inc.");
        store.upsert_profile(&profile).await.unwrap();
        profile.company_info.name = "Apple Incorporated".to_string();
        store.upsert_profile(&profile).await.unwrap();

        let all = store.list_profiles().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].company_info.name, "Apple Incorporated");
    }

    #[tokio::test]
    async fn relationship_edge_upsert_increments_mention_count() {
        let dir = tempdir().unwrap();
        let store = FileProfileStore::open(settings(dir.path())).await.unwrap();

        let edge = RelationshipEdge {
            from_cik: "0000320193".to_string(),
            to_cik: "0000789019".to_string(),
            to_company: "Microsoft".to_string(),
            to_ticker: Some("MSFT".to_string()),
            relationship_type: RelationshipType::Supplier,
            confidence: 0.6,
            source_accession: "acc-1".to_string(),
            mention_count: 1,
            first_mentioned: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            last_mentioned: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        };
        store.upsert_relationship_edges(&[edge.clone()]).await.unwrap();

        let mut second = edge.clone();
        second.confidence = 0.9;
        second.source_accession = "acc-2".to_string();
        store.upsert_relationship_edges(&[second]).await.unwrap();

        let path = dir.path().join("company_relationships.ndjson");
        let stored: Vec<RelationshipEdge> = read_collection(&path).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].mention_count, 2);
        assert_eq!(stored[0].confidence, 0.9);
    }

    #[tokio::test]
    async fn failure_cleared_on_successful_retry() {
        let dir = tempdir().unwrap();
        let store = FileProfileStore::open(settings(dir.path())).await.unwrap();

        let record = FailureRecord::new("AAPL", FailureReason::TimeoutError, "timed out");
        store.upsert_failure(record).await.unwrap();
        assert_eq!(store.list_failures().await.unwrap().len(), 1);

        store.clear_failure("AAPL").await.unwrap();
        assert!(store.list_failures().await.unwrap().is_empty());
    }
}
