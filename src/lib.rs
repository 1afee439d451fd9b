//! # profile-engine
//!
//! Aggregates SEC EDGAR filings for a company into a single, persistent
//! **Unified Profile**: structured financial time series, parsed filing
//! artifacts (insider transactions, institutional ownership, governance,
//! material events, key persons), and derived analytics (ratios, growth
//! rates, health scores, cross-company relationships).
//!
//! ## Pipeline
//!
//! `BatchController` (component I) queues `(cik, ticker)` work and drives it
//! through `Aggregator` (F), which asks `FilingCache` (B) for a bundle —
//! fetching through `EdgarClient` (A) on a miss — fans the bundle out across
//! the form `parsers` (C) and `relationships` extractor (D), derives
//! `metrics` (E), and hands the merged profile to `validator` (G) for
//! scoring before the controller persists it through `store` (H).
//!
//! ## Basic usage
//!
//! ```no_run
//! use profile_engine::{Aggregator, CancelToken, CompanyDirectory, EdgarClient, EngineConfig, FilingCache};
//! use profile_engine::domain::Cik;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EngineConfig::from_env()?;
//!     let client = EdgarClient::new(&config.edgar)?;
//!     let cache = FilingCache::open(&config.cache.dir, config.cache.max_bytes).await?;
//!     let aggregator = Aggregator::new(client, cache, config);
//!
//!     let directory = CompanyDirectory::default();
//!     let cik = Cik::new("320193");
//!     let cancel = CancelToken::new();
//!     let outcome = aggregator
//!         .aggregate(&cik, "AAPL", &directory, &cancel, |event| println!("{:?}", event))
//!         .await?;
//!
//!     let _ = outcome;
//!     Ok(())
//! }
//! ```

pub mod aggregator;
pub mod batch;
pub mod cache;
pub mod config;
pub mod domain;
pub mod edgar;
pub mod error;
pub mod metrics;
pub mod parsers;
pub mod relationships;
pub mod store;
pub mod validator;

pub use aggregator::profile::UnifiedProfile;
pub use aggregator::{AggregationOutcome, Aggregator, CancelToken, ProgressEvent, Stage};
pub use batch::{BatchController, BatchItem, BatchSummary};
pub use cache::{CacheStats, FilingCache};
pub use config::EngineConfig;
pub use domain::{Cik, Company, FilingReference, FormType};
pub use edgar::{EdgarClient, EdgarTransport};
pub use error::{EdgarError, EngineError, EngineResult, ExitCode, FailureReason};
pub use relationships::CompanyDirectory;
pub use store::{FileProfileStore, ProfileStore};
pub use validator::{FailureRecord, Grade, Quality};

/// Current crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
