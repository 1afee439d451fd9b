//! Rate-limited HTTP access to EDGAR's submissions, XBRL company-facts, and
//! archive endpoints.
//!
//! Grounded directly on the upstream client library's `Edgar` struct: a
//! `governor` token bucket, a `reqwest::Client` carrying a required
//! `User-Agent`, and exponential backoff with jitter on retry. The retry
//! loop itself is factored out behind the `EdgarTransport` trait so the
//! aggregator's tests can swap in an in-memory double instead of hitting
//! the live network (§8).

use crate::config::{EdgarSettings, EdgarUrls};
use crate::domain::Cik;
use crate::error::{EdgarError, EdgarResult};
use async_trait::async_trait;
use governor::{
    Quota, RateLimiter, clock::DefaultClock, middleware::NoOpMiddleware, state::InMemoryState,
    state::NotKeyed,
};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use super::facts::CompanyFacts;
use super::submissions::{RecentFilings, Submission};

const INITIAL_BACKOFF_MS: u64 = 200;
const MAX_BACKOFF: Duration = Duration::from_secs(5);

type Governor = RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

/// Low-level transport seam: fetch text or bytes from a URL with whatever
/// rate limiting and retry policy the implementation provides.
///
/// Production code uses `HttpTransport`. Tests substitute a fixture-backed
/// double that implements the same trait, so the higher-level parsing and
/// pagination logic in `EdgarClient` runs unchanged against either.
#[async_trait]
pub trait EdgarTransport: Send + Sync {
    async fn get(&self, url: &str) -> EdgarResult<String>;
    async fn get_bytes(&self, url: &str) -> EdgarResult<Vec<u8>>;
}

/// Production transport: `reqwest` + `governor`, following the same
/// retry/backoff contract as the upstream client.
pub struct HttpTransport {
    client: reqwest::Client,
    rate_limiter: Arc<Governor>,
    max_retries: u32,
}

impl HttpTransport {
    pub fn new(settings: &EdgarSettings) -> EdgarResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&settings.contact)
                .map_err(|e| EdgarError::ConfigError(format!("invalid contact string: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| EdgarError::ConfigError(format!("failed to build HTTP client: {e}")))?;

        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_second(
            NonZeroU32::new(settings.rate_per_second)
                .ok_or_else(|| EdgarError::ConfigError("rate_per_second must be > 0".into()))?,
        )));

        Ok(Self {
            client,
            rate_limiter,
            max_retries: settings.max_retries,
        })
    }

    /// `(2^retry × 200ms) ± 20%` jitter, capped at 5s regardless of `retry`
    /// or how many retries the caller is configured for (§4.A).
    fn calculate_backoff(retry: u32) -> Duration {
        let backoff_ms = INITIAL_BACKOFF_MS.saturating_mul(2_u64.saturating_pow(retry));
        let jitter = (backoff_ms as f64 * 0.2 * (fastrand::f64() - 0.5)) as i64;
        let backoff = Duration::from_millis((backoff_ms as i64 + jitter).max(0) as u64);
        backoff.min(MAX_BACKOFF)
    }
}

#[async_trait]
impl EdgarTransport for HttpTransport {
    async fn get(&self, url: &str) -> EdgarResult<String> {
        let mut retries = 0;
        loop {
            self.rate_limiter.until_ready().await;
            let response = self.client.get(url).send().await;
            match response {
                Ok(resp) => match resp.status() {
                    reqwest::StatusCode::OK => return Ok(resp.text().await?),
                    reqwest::StatusCode::NOT_FOUND => return Err(EdgarError::NotFound),
                    reqwest::StatusCode::TOO_MANY_REQUESTS => {
                        if retries >= self.max_retries {
                            return Err(EdgarError::RateLimited);
                        }
                        let wait = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|h| h.to_str().ok())
                            .and_then(|s| s.parse::<u64>().ok())
                            .map(Duration::from_secs)
                            .unwrap_or_else(|| Self::calculate_backoff(retries));
                        tracing::warn!(url, attempt = retries + 1, ?wait, "rate limited, retrying");
                        sleep(wait).await;
                        retries += 1;
                    }
                    status if status.is_server_error() => {
                        if retries >= self.max_retries {
                            return Err(EdgarError::Upstream(status.to_string()));
                        }
                        let wait = Self::calculate_backoff(retries);
                        tracing::warn!(url, %status, attempt = retries + 1, ?wait, "upstream error, retrying");
                        sleep(wait).await;
                        retries += 1;
                    }
                    status => {
                        return Err(EdgarError::InvalidResponse(format!(
                            "unexpected status {status} for {url}"
                        )));
                    }
                },
                Err(e) => {
                    if retries >= self.max_retries {
                        return Err(if e.is_timeout() {
                            EdgarError::Timeout
                        } else {
                            EdgarError::Network(e)
                        });
                    }
                    let wait = Self::calculate_backoff(retries);
                    tracing::warn!(url, attempt = retries + 1, ?wait, "request failed, retrying");
                    sleep(wait).await;
                    retries += 1;
                }
            }
        }
    }

    async fn get_bytes(&self, url: &str) -> EdgarResult<Vec<u8>> {
        let mut retries = 0;
        loop {
            self.rate_limiter.until_ready().await;
            let response = self.client.get(url).send().await;
            match response {
                Ok(resp) => match resp.status() {
                    reqwest::StatusCode::OK => return Ok(resp.bytes().await?.to_vec()),
                    reqwest::StatusCode::NOT_FOUND => return Err(EdgarError::NotFound),
                    reqwest::StatusCode::TOO_MANY_REQUESTS => {
                        if retries >= self.max_retries {
                            return Err(EdgarError::RateLimited);
                        }
                        sleep(Self::calculate_backoff(retries)).await;
                        retries += 1;
                    }
                    status => {
                        return Err(EdgarError::InvalidResponse(format!(
                            "unexpected status {status} for {url}"
                        )));
                    }
                },
                Err(e) => {
                    if retries >= self.max_retries {
                        return Err(EdgarError::Network(e));
                    }
                    sleep(Self::calculate_backoff(retries)).await;
                    retries += 1;
                }
            }
        }
    }
}

/// High-level EDGAR operations (§4.A): submissions with pagination merge,
/// XBRL company facts, and archive document fetch. Delegates transport
/// concerns to an `EdgarTransport`, so it is agnostic to whether that's the
/// live network or a test double.
pub struct EdgarClient {
    transport: Arc<dyn EdgarTransport>,
    base_urls: EdgarUrls,
}

impl EdgarClient {
    pub fn new(settings: &EdgarSettings) -> EdgarResult<Self> {
        Ok(Self {
            transport: Arc::new(HttpTransport::new(settings)?),
            base_urls: settings.base_urls.clone(),
        })
    }

    pub fn with_transport(transport: Arc<dyn EdgarTransport>, base_urls: EdgarUrls) -> Self {
        Self {
            transport,
            base_urls,
        }
    }

    /// Fetches a company's submissions payload and merges in any
    /// continuation chunks referenced by `filings.files`, so callers always
    /// see the full recent-filings history in one value.
    pub async fn get_submissions(&self, cik: &Cik) -> EdgarResult<Submission> {
        let url = format!(
            "{}/submissions/CIK{}.json",
            self.base_urls.data,
            cik.as_str()
        );
        let body = self.transport.get(&url).await?;
        let mut submission: Submission = serde_json::from_str(&body)?;

        let files = submission.filings.files.clone();
        for file in files {
            let chunk_url = format!("{}/submissions/{}", self.base_urls.data, file.name);
            let chunk_body = match self.transport.get(&chunk_url).await {
                Ok(b) => b,
                Err(EdgarError::NotFound) => continue,
                Err(e) => return Err(e),
            };
            let chunk: RecentFilings = serde_json::from_str(&chunk_body)?;
            submission.filings.recent.extend(chunk);
        }

        Ok(submission)
    }

    pub async fn get_company_facts(&self, cik: &Cik) -> EdgarResult<CompanyFacts> {
        let url = format!(
            "{}/api/xbrl/companyfacts/CIK{}.json",
            self.base_urls.data,
            cik.as_str()
        );
        let body = self.transport.get(&url).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Fetches a single document out of a filing's archive directory, e.g.
    /// `{archives}/data/{cik}/{accession_no_dashes}/{filename}`.
    pub async fn fetch_archive(
        &self,
        cik: &Cik,
        accession_no_dashes: &str,
        filename: &str,
    ) -> EdgarResult<Vec<u8>> {
        let url = format!(
            "{}/data/{}/{}/{}",
            self.base_urls.archives,
            cik.as_trimmed(),
            accession_no_dashes,
            filename
        );
        self.transport.get_bytes(&url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FakeTransport {
        responses: Mutex<std::collections::HashMap<String, String>>,
    }

    #[async_trait]
    impl EdgarTransport for FakeTransport {
        async fn get(&self, url: &str) -> EdgarResult<String> {
            self.responses
                .lock()
                .unwrap()
                .get(url)
                .cloned()
                .ok_or(EdgarError::NotFound)
        }

        async fn get_bytes(&self, url: &str) -> EdgarResult<Vec<u8>> {
            self.get(url).await.map(|s| s.into_bytes())
        }
    }

    fn base_urls() -> EdgarUrls {
        EdgarUrls {
            archives: "https://archives.test".to_string(),
            data: "https://data.test".to_string(),
            files: "https://files.test".to_string(),
        }
    }

    #[tokio::test]
    fn merges_continuation_filing_files() {
        let primary = serde_json::json!({
            "cik": "0000320193",
            "entityType": "operating",
            "sic": "3571",
            "sicDescription": "Electronic Computers",
            "ownerOrg": null,
            "insiderTransactionForOwnerExists": 0,
            "insiderTransactionForIssuerExists": 0,
            "name": "Apple Inc.",
            "tickers": ["AAPL"],
            "exchanges": ["Nasdaq"],
            "ein": null,
            "lei": null,
            "description": null,
            "website": null,
            "investorWebsite": null,
            "investmentCompany": null,
            "category": null,
            "fiscalYearEnd": "0930",
            "stateOfIncorporation": "CA",
            "stateOfIncorporationDescription": "CA",
            "addresses": {
                "mailing": {"street1": "1 Infinite Loop", "street2": null, "city": "Cupertino", "stateOrCountry": "CA", "zipCode": "95014", "stateOrCountryDescription": null, "isForeignLocation": null, "foreignStateTerritory": null, "country": null, "countryCode": null},
                "business": {"street1": "1 Infinite Loop", "street2": null, "city": "Cupertino", "stateOrCountry": "CA", "zipCode": "95014", "stateOrCountryDescription": null, "isForeignLocation": null, "foreignStateTerritory": null, "country": null, "countryCode": null}
            },
            "phone": "408-996-1010",
            "flags": "",
            "formerNames": [],
            "filings": {
                "recent": {
                    "accessionNumber": ["0000320193-24-000001"],
                    "filingDate": ["2024-01-01"],
                    "reportDate": ["2023-12-31"],
                    "acceptanceDateTime": ["2024-01-01T00:00:00.000Z"],
                    "act": ["34"],
                    "form": ["10-K"],
                    "fileNumber": ["001-36743"],
                    "filmNumber": ["24000001"],
                    "items": [""],
                    "size": [1000],
                    "isXBRL": [1],
                    "isInlineXBRL": [1],
                    "primaryDocument": ["doc.htm"],
                    "primaryDocDescription": [""]
                },
                "files": [
                    {"name": "CIK0000320193-submissions-001.json", "filingCount": 1, "filingFrom": "2020-01-01", "filingTo": "2023-01-01"}
                ]
            }
        });

        let continuation = serde_json::json!({
            "accessionNumber": ["0000320193-22-000001"],
            "filingDate": ["2022-01-01"],
            "reportDate": ["2021-12-31"],
            "acceptanceDateTime": ["2022-01-01T00:00:00.000Z"],
            "act": ["34"],
            "form": ["10-K"],
            "fileNumber": ["001-36743"],
            "filmNumber": ["22000001"],
            "items": [""],
            "size": [900],
            "isXBRL": [1],
            "isInlineXBRL": [1],
            "primaryDocument": ["doc2.htm"],
            "primaryDocDescription": [""]
        });

        let mut responses = std::collections::HashMap::new();
        responses.insert(
            "https://data.test/submissions/CIK0000320193.json".to_string(),
            primary.to_string(),
        );
        responses.insert(
            "https://data.test/submissions/CIK0000320193-submissions-001.json".to_string(),
            continuation.to_string(),
        );

        let transport = Arc::new(FakeTransport {
            responses: Mutex::new(responses),
        });
        let client = EdgarClient::with_transport(transport, base_urls());

        let rt = tokio::runtime::Runtime::new().unwrap();
        let submission = rt
            .block_on(client.get_submissions(&Cik::new("320193")))
            .unwrap();

        assert_eq!(submission.filings.recent.accession_number.len(), 2);
        assert_eq!(
            submission.filings.recent.accession_number[1],
            "0000320193-22-000001"
        );
    }

    #[test]
    fn backoff_grows_exponentially_with_jitter() {
        let b0 = HttpTransport::calculate_backoff(0);
        let b1 = HttpTransport::calculate_backoff(1);
        assert!(b0.as_millis() >= 160 && b0.as_millis() <= 240);
        assert!(b1.as_millis() >= 320 && b1.as_millis() <= 480);
    }

    #[test]
    fn backoff_is_capped_at_five_seconds_regardless_of_retry_count() {
        let b = HttpTransport::calculate_backoff(10);
        assert_eq!(b, Duration::from_secs(5));
    }
}
