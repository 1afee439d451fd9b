//! Filing bundle assembly (§3 "Filing Bundle", §4.F step 1): the set of raw
//! documents fetched for one `(cik, lookback_years)` pair, serialized as the
//! opaque payload the filing cache stores and retrieves.
//!
//! 8-K filings are kept as references only — §4.C.5 is explicit that the
//! reference parser "does not fetch document bodies" — so no document text
//! is downloaded for that form type, only its metadata.

use super::CancelToken;
use crate::config::{AggregatorSettings, EdgarUrls, ParserSettings};
use crate::domain::{Cik, FilingReference, FormType};
use crate::edgar::EdgarClient;
use crate::error::{EdgarError, EngineError, EngineResult};
use chrono::{Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};

/// One fetched document alongside the filing reference it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundledDocument {
    pub reference: FilingReference,
    pub text: String,
}

/// Everything the form parsers and relationship extractor need for one
/// company: the raw company-facts JSON plus every fetched filing document
/// within the lookback window, capped per form type by `ParserSettings`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilingBundle {
    pub cik: String,
    pub company_name: String,
    pub tickers: Vec<String>,
    pub facts_json: Option<String>,
    pub documents: Vec<BundledDocument>,
    /// 8-K references, metadata only (§4.C.5).
    pub form8k_references: Vec<FilingReference>,
}

impl FilingBundle {
    pub fn documents_of(&self, form_type: &FormType) -> Vec<&BundledDocument> {
        self.documents
            .iter()
            .filter(|d| &d.reference.form_type == form_type)
            .collect()
    }
}

fn cap_for(form_type: &FormType, parsers: &ParserSettings) -> usize {
    match form_type {
        FormType::Form4 => parsers.form4_max,
        FormType::Def14A => parsers.def14a_max,
        FormType::Sc13D | FormType::Sc13G => parsers.sc13_max,
        FormType::Form10K | FormType::Form10Q => parsers.reports_per_form,
        _ => usize::MAX,
    }
}

/// Fetches the submissions index, XBRL facts, and the capped set of recent
/// filing documents for `cik`, returning one serializable bundle.
///
/// A cache miss on company facts is tolerated (§4.A: `get_company_facts`
/// "may be absent"); a fatal failure to retrieve submissions is not, and is
/// propagated so the aggregator can classify it per §4.F's state machine.
pub async fn fetch_bundle(
    client: &EdgarClient,
    cik: &Cik,
    aggregator: &AggregatorSettings,
    parsers: &ParserSettings,
    _base_urls: &EdgarUrls,
    cancel: &CancelToken,
) -> EngineResult<FilingBundle> {
    if cancel.is_cancelled() {
        return Err(EngineError::Cancelled);
    }

    let submission = client.get_submissions(cik).await?;
    let all_refs = submission.filings.recent.to_references(cik);

    let cutoff = Utc::now().date_naive() - ChronoDuration::days(365 * aggregator.lookback_years as i64);
    let in_window: Vec<FilingReference> = all_refs
        .into_iter()
        .filter(|r| r.filed_date >= cutoff)
        .collect();

    let mut by_form: std::collections::HashMap<FormType, Vec<FilingReference>> =
        std::collections::HashMap::new();
    for r in in_window {
        by_form.entry(r.form_type.clone()).or_default().push(r);
    }
    for refs in by_form.values_mut() {
        refs.sort_by(|a, b| b.filed_date.cmp(&a.filed_date));
    }

    let mut documents = Vec::new();
    let mut form8k_references = Vec::new();

    for (form_type, mut refs) in by_form {
        if form_type == FormType::Form8K {
            form8k_references.append(&mut refs);
            continue;
        }
        let cap = cap_for(&form_type, parsers);
        refs.truncate(cap);
        for reference in refs {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            let Some(doc_path) = reference.primary_document_path.clone() else {
                continue;
            };
            let accession_no_dashes = reference.accession_no_dashes();
            match client
                .fetch_archive(cik, &accession_no_dashes, &doc_path)
                .await
            {
                Ok(bytes) => documents.push(BundledDocument {
                    reference,
                    text: String::from_utf8_lossy(&bytes).into_owned(),
                }),
                Err(EdgarError::NotFound) => continue,
                Err(e) => return Err(EngineError::Edgar(e)),
            }
        }
    }

    if cancel.is_cancelled() {
        return Err(EngineError::Cancelled);
    }

    let facts_json = match client.get_company_facts(cik).await {
        Ok(facts) => serde_json::to_string(&facts).ok(),
        Err(EdgarError::NotFound) => None,
        Err(e) => {
            tracing::warn!(cik = cik.as_str(), error = %e, "company facts unavailable");
            None
        }
    };

    Ok(FilingBundle {
        cik: cik.as_str().to_string(),
        company_name: submission.name,
        tickers: submission.tickers,
        facts_json,
        documents,
        form8k_references,
    })
}
