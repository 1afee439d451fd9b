//! Batch Controller (§4.I): a single queue of `(cik, ticker)` work items
//! processed with a configurable ticker concurrency, persisting each
//! finished profile and surfacing progress over an `mpsc` channel.
//!
//! Grounded on the "task + channel pattern" redesign flag (§9): a fixed pool
//! of ticker workers pulls off a shared `Mutex<VecDeque<_>>` queue (the
//! same dashmap-free, stdlib-plus-tokio discipline the aggregator's in-flight
//! table uses), each publishing `ProgressEvent`s onto an
//! `mpsc::UnboundedSender` the caller drains independently of `start()`'s
//! return. Ticker-to-CIK resolution is not a modeled component (§1 scope);
//! callers supply both, and the controller remembers the pairing so
//! `retry_failed` can look a bare ticker back up to its CIK.

use crate::aggregator::{AggregationOutcome, Aggregator, CancelToken, ProgressEvent};
use crate::domain::Cik;
use crate::error::{EngineResult, ExitCode, FailureReason};
use crate::relationships::CompanyDirectory;
use crate::store::{InterlockCompany, ProfileStore};
use crate::validator::{FailureRecord, Grade};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

/// One unit of queued work: a company identity already resolved to a CIK.
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub cik: Cik,
    pub ticker: String,
}

/// Outcome of one `start()` run (§6 exit-code taxonomy).
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: bool,
}

impl BatchSummary {
    pub fn exit_code(self) -> ExitCode {
        if self.cancelled {
            ExitCode::Cancelled
        } else if self.failed > 0 {
            ExitCode::PartialSuccess
        } else {
            ExitCode::Success
        }
    }
}

const PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Owns the work queue, the progress channel, and the pause/cancel flags
/// shared by every ticker worker spawned out of `start()`.
pub struct BatchController {
    aggregator: Arc<Aggregator>,
    store: Arc<dyn ProfileStore>,
    directory: Arc<CompanyDirectory>,
    ticker_concurrency: usize,
    queue: Arc<Mutex<VecDeque<BatchItem>>>,
    known_ciks: Arc<Mutex<HashMap<String, Cik>>>,
    paused: Arc<AtomicBool>,
    cancel: CancelToken,
    progress_tx: mpsc::UnboundedSender<ProgressEvent>,
    progress_rx: Mutex<Option<mpsc::UnboundedReceiver<ProgressEvent>>>,
}

impl BatchController {
    pub fn new(
        aggregator: Arc<Aggregator>,
        store: Arc<dyn ProfileStore>,
        directory: CompanyDirectory,
        ticker_concurrency: usize,
    ) -> Self {
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        Self {
            aggregator,
            store,
            directory: Arc::new(directory),
            ticker_concurrency,
            queue: Arc::new(Mutex::new(VecDeque::new())),
            known_ciks: Arc::new(Mutex::new(HashMap::new())),
            paused: Arc::new(AtomicBool::new(false)),
            cancel: CancelToken::new(),
            progress_tx,
            progress_rx: Mutex::new(Some(progress_rx)),
        }
    }

    /// Takes the progress receiver, if it hasn't already been taken. Callers
    /// drain this concurrently with `start()` to observe per-ticker
    /// `(ticker, stage, percent, message)` events as they happen.
    pub async fn subscribe(&self) -> Option<mpsc::UnboundedReceiver<ProgressEvent>> {
        self.progress_rx.lock().await.take()
    }

    /// Enqueues one ticker for aggregation, remembering its CIK so a later
    /// `retry_failed` can resolve the ticker back to a company without a
    /// separate lookup.
    pub async fn add_ticker(&self, cik: Cik, ticker: impl Into<String>) {
        let ticker = ticker.into();
        self.known_ciks.lock().await.insert(ticker.clone(), cik.clone());
        self.queue.lock().await.push_back(BatchItem { cik, ticker });
    }

    /// Drains the queue with `ticker_concurrency` concurrent workers. Returns
    /// once the queue is empty or the batch is cancelled; `pause`/`cancel`
    /// take effect between items, never mid-aggregation (§5 "Cancellation is
    /// cooperative").
    pub async fn start(&self) -> EngineResult<BatchSummary> {
        let mut handles = Vec::with_capacity(self.ticker_concurrency);
        for _ in 0..self.ticker_concurrency {
            let aggregator = Arc::clone(&self.aggregator);
            let store = Arc::clone(&self.store);
            let directory = Arc::clone(&self.directory);
            let queue = Arc::clone(&self.queue);
            let paused = Arc::clone(&self.paused);
            let cancel = self.cancel.clone();
            let progress_tx = self.progress_tx.clone();

            handles.push(tokio::spawn(async move {
                worker_loop(aggregator, store, directory, queue, paused, cancel, progress_tx).await
            }));
        }

        let mut summary = BatchSummary::default();
        for handle in handles {
            if let Ok((succeeded, failed)) = handle.await {
                summary.succeeded += succeeded;
                summary.failed += failed;
            }
        }
        summary.cancelled = self.cancel.is_cancelled();
        Ok(summary)
    }

    /// Suspends workers before their next queue pop. In-flight aggregations
    /// finish normally.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    /// Cooperative cancel: workers stop pulling new items, and the
    /// `CancelToken` passed into any in-flight `aggregate()` call causes it
    /// to stop between tasks rather than complete and persist (§5).
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Re-enqueues every ticker currently in the failure tracker (§4.I
    /// "retry all failed tickers"). Tickers this controller never saw via
    /// `add_ticker` are skipped — there is no other component to resolve
    /// them to a CIK.
    pub async fn retry_failed(&self) -> EngineResult<usize> {
        let failures = self.store.list_failures().await?;
        let known = self.known_ciks.lock().await;
        let mut queued = 0;
        for failure in failures {
            if let Some(cik) = known.get(&failure.ticker) {
                self.queue.lock().await.push_back(BatchItem {
                    cik: cik.clone(),
                    ticker: failure.ticker,
                });
                queued += 1;
            }
        }
        Ok(queued)
    }

    /// Re-enqueues every persisted profile whose quality grade is `D` or
    /// worse (§4.I "retry all profiles with quality grade ≤ D").
    pub async fn retry_problematic(&self) -> EngineResult<usize> {
        let profiles = self.store.list_profiles().await?;
        let mut queued = 0;
        for profile in profiles {
            if matches!(profile.quality.grade, Grade::D | Grade::F) {
                let cik = Cik::new(&profile.cik);
                self.queue.lock().await.push_back(BatchItem {
                    cik,
                    ticker: profile.company_info.ticker,
                });
                queued += 1;
            }
        }
        Ok(queued)
    }

    /// Clears every cached filing bundle (§6 `clear-cache` command).
    pub async fn clear_cache(&self) -> EngineResult<()> {
        self.aggregator.cache().clear_all().await
    }
}

async fn worker_loop(
    aggregator: Arc<Aggregator>,
    store: Arc<dyn ProfileStore>,
    directory: Arc<CompanyDirectory>,
    queue: Arc<Mutex<VecDeque<BatchItem>>>,
    paused: Arc<AtomicBool>,
    cancel: CancelToken,
    progress_tx: mpsc::UnboundedSender<ProgressEvent>,
) -> (usize, usize) {
    let mut succeeded = 0usize;
    let mut failed = 0usize;

    loop {
        if cancel.is_cancelled() {
            break;
        }
        while paused.load(Ordering::SeqCst) {
            if cancel.is_cancelled() {
                return (succeeded, failed);
            }
            tokio::time::sleep(PAUSE_POLL_INTERVAL).await;
        }

        let item = queue.lock().await.pop_front();
        let Some(item) = item else { break };

        let tx = progress_tx.clone();
        let outcome = aggregator
            .aggregate(&item.cik, &item.ticker, &directory, &cancel, |event| {
                let _ = tx.send(event);
            })
            .await;

        match outcome {
            Ok(AggregationOutcome::Profile(profile)) => match persist(&store, &profile).await {
                Ok(()) => succeeded += 1,
                Err(e) => {
                    failed += 1;
                    record_failure(&store, &item.ticker, FailureReason::ProfileSaveError, e.to_string()).await;
                }
            },
            Ok(AggregationOutcome::Failed { reason, message }) => {
                failed += 1;
                record_failure(&store, &item.ticker, reason, message).await;
            }
            Err(e) => {
                failed += 1;
                record_failure(&store, &item.ticker, e.reason(), e.to_string()).await;
            }
        }
    }

    (succeeded, failed)
}

/// The "Persist" step of the pipeline (spec §4.F step 6): upsert the profile
/// and every secondary collection it contributed to, then clear any prior
/// failure record for this company.
async fn persist(store: &Arc<dyn ProfileStore>, profile: &crate::aggregator::profile::UnifiedProfile) -> EngineResult<()> {
    store.upsert_profile(profile).await?;

    if let Some(edges) = &profile.relationships.data {
        store.upsert_relationship_edges(edges).await?;
    }
    if let Some(record) = &profile.financial_relationships.data {
        store.upsert_financial_relationships(record).await?;
    }
    if let Some(summary) = &profile.key_persons.data {
        for person in &summary.people {
            store
                .upsert_key_person_interlock(
                    &person.name,
                    InterlockCompany {
                        cik: profile.cik.clone(),
                        ticker: profile.company_info.ticker.clone(),
                        roles: person.roles.clone(),
                    },
                )
                .await?;
        }
    }
    store.clear_failure(&profile.company_info.ticker).await?;
    Ok(())
}

async fn record_failure(store: &Arc<dyn ProfileStore>, ticker: &str, reason: FailureReason, message: String) {
    let record = FailureRecord::new(ticker.to_string(), reason, message);
    if let Err(e) = store.upsert_failure(record).await {
        tracing::warn!(ticker, error = %e, "failed to record failure");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FilingCache;
    use crate::config::EngineConfig;
    use crate::edgar::{EdgarClient, EdgarTransport};
    use crate::error::{EdgarError, EdgarResult};
    use crate::store::FileProfileStore;
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

    async fn controller(dir: &std::path::Path) -> BatchController {
        let mut config = EngineConfig::default();
        config.store.dir = dir.join("store").to_string_lossy().into_owned();

        let client = EdgarClient::with_transport(Arc::new(EmptyTransport), config.edgar.base_urls.clone());
        let cache = FilingCache::open(dir.join("cache"), config.cache.max_bytes).await.unwrap();
        let store: Arc<dyn ProfileStore> = Arc::new(FileProfileStore::open(config.store.clone()).await.unwrap());
        let aggregator = Arc::new(Aggregator::new(client, cache, config));

        BatchController::new(aggregator, store, CompanyDirectory::default(), 2)
    }

    #[tokio::test]
    async fn unresolvable_ticker_lands_in_failure_tracker() {
        let dir = tempfile::tempdir().unwrap();
        let controller = controller(dir.path()).await;

        controller.add_ticker(Cik::new("0"), "NOPE").await;
        let summary = controller.start().await.unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.succeeded, 0);
        assert_eq!(summary.exit_code(), ExitCode::PartialSuccess);

        let failures = controller.store.list_failures().await.unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].ticker, "NOPE");
    }

    #[tokio::test]
    async fn retry_failed_requeues_only_known_tickers() {
        let dir = tempfile::tempdir().unwrap();
        let controller = controller(dir.path()).await;

        controller.add_ticker(Cik::new("0"), "NOPE").await;
        controller.start().await.unwrap();

        let requeued = controller.retry_failed().await.unwrap();
        assert_eq!(requeued, 1);
        assert_eq!(controller.queue.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn cancel_before_start_processes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let controller = controller(dir.path()).await;

        controller.add_ticker(Cik::new("0"), "NOPE").await;
        controller.cancel();
        let summary = controller.start().await.unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.succeeded + summary.failed, 0);
    }
}
