//! Profile Aggregator (§4.F): the orchestration core. For one
//! `(cik, ticker, options)` it asks the cache for a filing bundle (fetching
//! via EDGAR on a miss), fans eight extraction tasks out to a bounded
//! worker pool, merges their results under a lock, computes metrics,
//! validates, and hands the finished profile to the caller for persistence.
//!
//! Grounded on the teacher's rate-limited-client style combined with the
//! `WorkQueueManager`/task-pool pattern from the pack's concurrent filing
//! extraction example: a `tokio::sync::Semaphore` bounds task concurrency,
//! a per-cik `tokio::sync::Mutex<HashMap<String, Arc<Notify>>>` coalesces
//! concurrent requests for the same company (kept dashmap-free, per the
//! "stdlib-plus-tokio" decision in `DESIGN.md`), and `tokio::time::timeout`
//! enforces the per-task budget from §4.F's task contract.

pub mod bundle;
pub mod profile;
pub mod tasks;

use crate::cache::FilingCache;
use crate::config::EngineConfig;
use crate::domain::Cik;
use crate::edgar::EdgarClient;
use crate::error::EngineResult;
use crate::metrics;
use crate::relationships::CompanyDirectory;
use crate::validator;
use bundle::{fetch_bundle, FilingBundle};
use profile::UnifiedProfile;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify, Semaphore};

/// Cooperative cancellation flag (§5: "checked (a) before each new HTTP
/// request, (b) between tasks at the aggregator level, (c) at the start of
/// each parser's main loop"), threaded from the batch controller down into
/// `Aggregator::aggregate` and the bundle fetch beneath it.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Stage labels for the per-ticker state machine (§4.F).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Queued,
    Fetching,
    CacheStored,
    Aggregating,
    Validating,
    Persisted,
}

/// Progress event shape (§4.I: "emits progress events `(ticker, stage,
/// percent, message)`").
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub ticker: String,
    pub stage: Stage,
    pub percent: u8,
    pub message: String,
}

/// A finished aggregation outcome: either a persisted-ready profile, or a
/// terminal failure with its reason code (§4.F state machine: "aggregating
/// → failed requires (a) cache miss AND EDGAR fatal error, (b) all 8 tasks
/// unavailable, or (c) persistence failure").
pub enum AggregationOutcome {
    Profile(UnifiedProfile),
    Failed {
        reason: crate::error::FailureReason,
        message: String,
    },
}

/// Orchestrates the full per-company pipeline: cache, eight-task fan-out,
/// metrics, and validation. Does not itself persist — the caller (batch
/// controller) owns the store and failure-tracker write.
pub struct Aggregator {
    client: EdgarClient,
    cache: FilingCache,
    config: EngineConfig,
    task_semaphore: Arc<Semaphore>,
    in_flight: Arc<Mutex<HashMap<String, Arc<Notify>>>>,
}

impl Aggregator {
    pub fn new(client: EdgarClient, cache: FilingCache, config: EngineConfig) -> Self {
        let task_semaphore = Arc::new(Semaphore::new(config.aggregator.task_workers));
        Self {
            client,
            cache,
            config,
            task_semaphore,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The filing cache backing this aggregator, exposed so the batch
    /// controller can service the `clear-cache` command (§6) without the
    /// aggregator itself needing to know about batch concerns.
    pub fn cache(&self) -> &FilingCache {
        &self.cache
    }

    /// Runs the full pipeline for one company, reporting progress through
    /// `on_progress`. `directory` is the known-company lookup the
    /// relationship extractor matches narrative mentions against. `cancel`
    /// is checked before the fetch, after the bundle loads, and between each
    /// extraction task (§5); a cancellation observed at any of those points
    /// yields `Failed { reason: Cancelled, .. }` with no profile produced.
    pub async fn aggregate(
        &self,
        cik: &Cik,
        ticker: &str,
        directory: &CompanyDirectory,
        cancel: &CancelToken,
        mut on_progress: impl FnMut(ProgressEvent),
    ) -> EngineResult<AggregationOutcome> {
        let _coalesce = self.coalesce(cik.as_str()).await;

        if cancel.is_cancelled() {
            return Ok(cancelled_outcome("cancelled before aggregation started"));
        }

        on_progress(ProgressEvent {
            ticker: ticker.to_string(),
            stage: Stage::Fetching,
            percent: 5,
            message: "fetching filing bundle".to_string(),
        });

        let bundle = match self.load_bundle(cik, cancel).await {
            Ok(bundle) => bundle,
            Err(e) => {
                return Ok(AggregationOutcome::Failed {
                    reason: e.reason(),
                    message: e.to_string(),
                });
            }
        };

        if cancel.is_cancelled() {
            return Ok(cancelled_outcome("cancelled after bundle load"));
        }

        on_progress(ProgressEvent {
            ticker: ticker.to_string(),
            stage: Stage::CacheStored,
            percent: 20,
            message: "bundle cached".to_string(),
        });

        on_progress(ProgressEvent {
            ticker: ticker.to_string(),
            stage: Stage::Aggregating,
            percent: 30,
            message: "running extraction tasks".to_string(),
        });

        let mut profile = self.run_tasks(cik, ticker, &bundle, directory, cancel).await;

        if cancel.is_cancelled() {
            return Ok(cancelled_outcome("cancelled while dispatching extraction tasks"));
        }

        on_progress(ProgressEvent {
            ticker: ticker.to_string(),
            stage: Stage::Validating,
            percent: 90,
            message: "validating profile".to_string(),
        });

        if all_unavailable(&profile) {
            return Ok(AggregationOutcome::Failed {
                reason: crate::error::FailureReason::InsufficientData,
                message: "all extraction tasks returned unavailable".to_string(),
            });
        }

        profile.quality = validator::validate(&profile);
        profile.last_updated = chrono::Utc::now();

        on_progress(ProgressEvent {
            ticker: ticker.to_string(),
            stage: Stage::Persisted,
            percent: 100,
            message: "profile ready".to_string(),
        });

        Ok(AggregationOutcome::Profile(profile))
    }

    /// Serializes concurrent aggregation requests for the same cik: the
    /// first caller proceeds immediately; later callers for the same cik
    /// wait on a shared `Notify` rather than duplicating the fetch+task
    /// work.
    async fn coalesce(&self, key: &str) -> CoalesceGuard {
        loop {
            let mut table = self.in_flight.lock().await;
            match table.get(key).cloned() {
                Some(notify) => {
                    drop(table);
                    notify.notified().await;
                }
                None => {
                    table.insert(key.to_string(), Arc::new(Notify::new()));
                    return CoalesceGuard {
                        in_flight: Arc::clone(&self.in_flight),
                        key: key.to_string(),
                    };
                }
            }
        }
    }

    async fn load_bundle(&self, cik: &Cik, cancel: &CancelToken) -> EngineResult<FilingBundle> {
        let cache_key = format!("{}/bundle/{}y", cik.as_str(), self.config.aggregator.lookback_years);

        if self.config.cache.enabled {
            if let Some(bytes) = self.cache.lookup(&cache_key).await {
                if let Ok(bundle) = serde_json::from_slice::<FilingBundle>(&bytes) {
                    return Ok(bundle);
                }
            }
        }

        let bundle = fetch_bundle(
            &self.client,
            cik,
            &self.config.aggregator,
            &self.config.parsers,
            &self.config.edgar.base_urls,
            cancel,
        )
        .await?;

        if self.config.cache.enabled {
            if let Ok(bytes) = serde_json::to_vec(&bundle) {
                if let Err(e) = self.cache.store(&cache_key, &bytes).await {
                    tracing::warn!(cik = cik.as_str(), error = %e, "failed to cache filing bundle");
                }
            }
        }

        Ok(bundle)
    }

    /// Fans the eight extraction tasks out to the task semaphore, applying
    /// the per-task timeout from `aggregator.task_timeout`, and merges each
    /// result into a fresh profile as it completes.
    async fn run_tasks(
        &self,
        cik: &Cik,
        ticker: &str,
        bundle: &FilingBundle,
        directory: &CompanyDirectory,
        cancel: &CancelToken,
    ) -> UnifiedProfile {
        let mut profile = UnifiedProfile::empty(cik, ticker, &bundle.company_name);
        let timeout = self.config.aggregator.task_timeout;

        if cancel.is_cancelled() {
            return profile;
        }
        profile.filing_metadata = self.run_timed(timeout, || tasks::filing_metadata(bundle)).await;
        if cancel.is_cancelled() {
            return profile;
        }
        profile.financial_time_series = self.run_timed(timeout, || tasks::financial_time_series(bundle)).await;
        if cancel.is_cancelled() {
            return profile;
        }
        profile.material_events = self.run_timed(timeout, || tasks::material_events(bundle)).await;
        if cancel.is_cancelled() {
            return profile;
        }
        profile.corporate_governance = self.run_timed(timeout, || tasks::corporate_governance(bundle)).await;
        if cancel.is_cancelled() {
            return profile;
        }
        profile.insider_trading = self
            .run_timed(timeout, || tasks::insider_trading(bundle, &self.config.parsers))
            .await;
        if cancel.is_cancelled() {
            return profile;
        }
        profile.institutional_ownership = self.run_timed(timeout, || tasks::institutional_ownership(bundle)).await;
        if cancel.is_cancelled() {
            return profile;
        }
        profile.narrative_analysis = self.run_timed(timeout, || tasks::narrative_analysis(bundle)).await;
        if cancel.is_cancelled() {
            return profile;
        }
        profile.key_persons = self.run_timed(timeout, || tasks::key_persons(bundle)).await;
        if cancel.is_cancelled() {
            return profile;
        }
        profile.relationships = self
            .run_timed(timeout, || {
                tasks::relationships(bundle, directory, &self.config.relationship)
            })
            .await;
        if cancel.is_cancelled() {
            return profile;
        }
        profile.financial_relationships = self.run_timed(timeout, || tasks::financial_relationships(bundle)).await;
        if cancel.is_cancelled() {
            return profile;
        }

        if let Some(facts) = &profile.financial_time_series.data {
            let ratios = metrics::compute_ratios(facts);
            let growth = metrics::compute_growth_rates(facts);

            profile.latest_financials = tasks::latest_financials(facts);
            profile.statistical_summary = tasks::statistical_summary(facts);
            profile.volatility_metrics = tasks::volatility_metrics(facts);
            profile.health_indicators = Some(metrics::health_score(&ratios, &growth));
            profile.financial_ratios = Some(ratios);
            profile.growth_rates = Some(growth);
        }

        profile
    }

    /// Runs one synchronous extraction task on the bounded task pool,
    /// enforcing the configured per-task timeout (§4.F: "a task that fails
    /// [to report in time] records `{available: false, ...}` and does not
    /// fail the profile").
    async fn run_timed<T, F>(&self, timeout: Duration, task: F) -> crate::parsers::Partial<T>
    where
        F: FnOnce() -> crate::parsers::Partial<T>,
    {
        let _permit = self.task_semaphore.acquire().await;
        match tokio::time::timeout(timeout, async { task() }).await {
            Ok(result) => result,
            Err(_) => crate::parsers::Partial::unavailable("task timed out"),
        }
    }
}

struct CoalesceGuard {
    in_flight: Arc<Mutex<HashMap<String, Arc<Notify>>>>,
    key: String,
}

impl Drop for CoalesceGuard {
    fn drop(&mut self) {
        let in_flight = Arc::clone(&self.in_flight);
        let key = self.key.clone();
        tokio::spawn(async move {
            let mut table = in_flight.lock().await;
            if let Some(notify) = table.remove(&key) {
                notify.notify_waiters();
            }
        });
    }
}

fn cancelled_outcome(message: &str) -> AggregationOutcome {
    AggregationOutcome::Failed {
        reason: crate::error::FailureReason::Cancelled,
        message: message.to_string(),
    }
}

fn all_unavailable(profile: &UnifiedProfile) -> bool {
    !profile.filing_metadata.available
        && !profile.financial_time_series.available
        && !profile.material_events.available
        && !profile.insider_trading.available
        && !profile.institutional_ownership.available
        && !profile.corporate_governance.available
        && !profile.key_persons.available
        && !profile.narrative_analysis.available
        && !profile.relationships.available
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FormType;
    use crate::edgar::EdgarTransport;
    use crate::error::{EdgarError, EdgarResult};
    use async_trait::async_trait;

    struct EmptyTransport;

    #[async_trait]
    impl EdgarTransport for EmptyTransport {
        async fn get(&self, _url: &str) -> EdgarResult<String> {
            Err(EdgarError::NotFound)
        }

        async fn get_bytes(&self, _url: &str) -> EdgarResult<Vec<u8>> {
            Err(EdgarError::NotFound)
        }
    }

    #[tokio::test]
    async fn unreachable_company_fails_with_company_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::default();
        let client = EdgarClient::with_transport(Arc::new(EmptyTransport), config.edgar.base_urls.clone());
        let cache = FilingCache::open(dir.path(), config.cache.max_bytes).await.unwrap();
        let aggregator = Aggregator::new(client, cache, config);
        let directory = CompanyDirectory::new(Vec::<(String, Option<String>)>::new());
        let cik = Cik::new("0000000000");

        let outcome = aggregator
            .aggregate(&cik, "NOPE", &directory, &CancelToken::new(), |_| {})
            .await
            .unwrap();

        match outcome {
            AggregationOutcome::Failed { reason, .. } => {
                assert_eq!(reason, crate::error::FailureReason::CompanyNotFound);
            }
            AggregationOutcome::Profile(_) => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn pre_cancelled_token_fails_before_any_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::default();
        let client = EdgarClient::with_transport(Arc::new(EmptyTransport), config.edgar.base_urls.clone());
        let cache = FilingCache::open(dir.path(), config.cache.max_bytes).await.unwrap();
        let aggregator = Aggregator::new(client, cache, config);
        let directory = CompanyDirectory::new(Vec::<(String, Option<String>)>::new());
        let cik = Cik::new("0000320193");
        let cancel = CancelToken::new();
        cancel.cancel();

        let outcome = aggregator
            .aggregate(&cik, "AAPL", &directory, &cancel, |_| {})
            .await
            .unwrap();

        match outcome {
            AggregationOutcome::Failed { reason, .. } => {
                assert_eq!(reason, crate::error::FailureReason::Cancelled);
            }
            AggregationOutcome::Profile(_) => panic!("expected cancellation"),
        }
    }

    #[test]
    fn all_unavailable_detects_zero_coverage() {
        let cik = Cik::new("320193");
        let profile = UnifiedProfile::empty(&cik, "AAPL", "Apple Inc.");
        assert!(all_unavailable(&profile));
    }

    #[test]
    fn form_type_tag_round_trips_through_filing_metadata() {
        assert_eq!(FormType::Form10K.as_tag(), "10-K");
    }
}
