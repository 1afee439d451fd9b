//! Per-ticker extraction tasks (§4.F step 2): one pure function per profile
//! key, each fed the same `FilingBundle` plus whatever settings it needs. The
//! orchestrator runs these on its task pool; every one of them is infallible
//! at the API boundary, returning a `Partial<T>` rather than a `Result`.

use crate::config::{ParserSettings, RelationshipSettings};
use crate::domain::FormType;
use crate::metrics;
use crate::parsers::{self, Partial};
use crate::relationships::{self, CompanyDirectory, RelationshipEdge};
use chrono::{NaiveDate, Utc};

use super::bundle::FilingBundle;
use super::profile::{
    FilingMetadata, Form4RollUp, LatestFinancials, NarrativeRollUp, Sc13RollUp,
    StatisticalSummaries, VolatilityMetrics,
};

/// Component A rollup (§4.F task `filing_metadata`): a coarse summary of
/// what's in the fetched bundle.
pub fn filing_metadata(bundle: &FilingBundle) -> Partial<FilingMetadata> {
    let mut form_types_seen: Vec<String> = Vec::new();
    let mut earliest: Option<NaiveDate> = None;
    let mut latest: Option<NaiveDate> = None;
    let mut total_filings = 0usize;

    let all_refs = bundle
        .documents
        .iter()
        .map(|d| &d.reference)
        .chain(bundle.form8k_references.iter());

    for reference in all_refs {
        total_filings += 1;
        let tag = reference.form_type.as_tag().to_string();
        if !form_types_seen.contains(&tag) {
            form_types_seen.push(tag);
        }
        earliest = Some(earliest.map_or(reference.filed_date, |e| e.min(reference.filed_date)));
        latest = Some(latest.map_or(reference.filed_date, |l| l.max(reference.filed_date)));
    }

    if total_filings == 0 {
        return Partial::unavailable("no filings in lookback window");
    }

    Partial::available(FilingMetadata {
        total_filings,
        form_types_seen,
        earliest_filed: earliest,
        latest_filed: latest,
    })
}

/// Component F/financial time series (§4.E): parses the bundle's cached
/// company-facts JSON, if any was fetched.
pub fn financial_time_series(bundle: &FilingBundle) -> Partial<parsers::XbrlFacts> {
    match &bundle.facts_json {
        Some(raw) => parsers::parse_xbrl_facts(raw),
        None => Partial::unavailable("company facts not available"),
    }
}

/// Latest non-null value per metric (§4.E "Latest financials"), read off the
/// parsed time series rather than refetched.
pub fn latest_financials(facts: &parsers::XbrlFacts) -> Option<LatestFinancials> {
    let latest_of = |series: &[parsers::FinancialDataPoint]| series.iter().max_by_key(|p| p.period_end);

    let revenue = latest_of(&facts.revenue);
    let net_income = latest_of(&facts.net_income);
    let total_assets = latest_of(&facts.total_assets);
    let total_liabilities = latest_of(&facts.total_liabilities);
    let equity = latest_of(&facts.equity);
    let cash = latest_of(&facts.cash);
    let operating_income = latest_of(&facts.operating_income);
    let current_assets = latest_of(&facts.current_assets);
    let current_liabilities = latest_of(&facts.current_liabilities);
    let long_term_debt = latest_of(&facts.long_term_debt);
    let gross_profit = latest_of(&facts.gross_profit);
    let cost_of_revenue = latest_of(&facts.cost_of_revenue);
    let operating_cash_flow = latest_of(&facts.operating_cash_flow);
    let eps_diluted = latest_of(&facts.eps_diluted);

    let as_of = [
        revenue.map(|p| p.period_end),
        net_income.map(|p| p.period_end),
        total_assets.map(|p| p.period_end),
    ]
    .into_iter()
    .flatten()
    .max();

    as_of?;

    Some(LatestFinancials {
        revenue: revenue.map(|p| p.value),
        net_income: net_income.map(|p| p.value),
        total_assets: total_assets.map(|p| p.value),
        total_liabilities: total_liabilities.map(|p| p.value),
        equity: equity.map(|p| p.value),
        cash: cash.map(|p| p.value),
        operating_income: operating_income.map(|p| p.value),
        current_assets: current_assets.map(|p| p.value),
        current_liabilities: current_liabilities.map(|p| p.value),
        long_term_debt: long_term_debt.map(|p| p.value),
        gross_profit: gross_profit.map(|p| p.value),
        cost_of_revenue: cost_of_revenue.map(|p| p.value),
        operating_cash_flow: operating_cash_flow.map(|p| p.value),
        eps_diluted: eps_diluted.map(|p| p.value),
        as_of,
    })
}

/// Statistical summaries, per metric, over every series the ratios engine
/// also reads (§4.E: "per metric").
pub fn statistical_summary(facts: &parsers::XbrlFacts) -> Option<StatisticalSummaries> {
    let values_of = |series: &[parsers::FinancialDataPoint]| -> Vec<f64> {
        series.iter().map(|p| p.value).collect()
    };

    let summaries = StatisticalSummaries {
        revenue: metrics::compute_statistics(&values_of(&facts.revenue)),
        net_income: metrics::compute_statistics(&values_of(&facts.net_income)),
        total_assets: metrics::compute_statistics(&values_of(&facts.total_assets)),
        total_liabilities: metrics::compute_statistics(&values_of(&facts.total_liabilities)),
        equity: metrics::compute_statistics(&values_of(&facts.equity)),
        operating_income: metrics::compute_statistics(&values_of(&facts.operating_income)),
        gross_profit: metrics::compute_statistics(&values_of(&facts.gross_profit)),
        cash: metrics::compute_statistics(&values_of(&facts.cash)),
    };

    let any_present = summaries.revenue.is_some()
        || summaries.net_income.is_some()
        || summaries.total_assets.is_some()
        || summaries.total_liabilities.is_some()
        || summaries.equity.is_some()
        || summaries.operating_income.is_some()
        || summaries.gross_profit.is_some()
        || summaries.cash.is_some();

    any_present.then_some(summaries)
}

/// Volatility and trend over the revenue series (§4.E).
pub fn volatility_metrics(facts: &parsers::XbrlFacts) -> Option<VolatilityMetrics> {
    let revenue_values: Vec<f64> = facts.revenue.iter().map(|p| p.value).collect();
    let revenue_volatility = metrics::volatility(&revenue_values);
    let revenue_trend = metrics::trend(&facts.revenue);
    if revenue_volatility.is_none() && revenue_trend.is_none() {
        return None;
    }
    Some(VolatilityMetrics {
        revenue_volatility,
        revenue_trend,
    })
}

/// Component G/material events (§4.C.5): reference-only 8-K activity
/// summary, computed off filing metadata alone.
pub fn material_events(bundle: &FilingBundle) -> Partial<parsers::Form8KActivity> {
    parsers::summarize_form8k_activity(&bundle.form8k_references, Utc::now().date_naive())
}

/// Component C/corporate governance (§4.C.4): parses the most recently filed
/// DEF 14A in the bundle, if any.
pub fn corporate_governance(bundle: &FilingBundle) -> Partial<parsers::Def14ASummary> {
    let docs = bundle.documents_of(&FormType::Def14A);
    match docs.into_iter().max_by_key(|d| d.reference.filed_date) {
        Some(doc) => parsers::parse_def14a(&doc.text),
        None => Partial::unavailable("no DEF 14A filings in lookback window"),
    }
}

/// Component B/insider trading (§4.C.2): parses every capped Form 4 in the
/// bundle and folds them into one rollup with a combined net position.
pub fn insider_trading(bundle: &FilingBundle, _parsers: &ParserSettings) -> Partial<Form4RollUp> {
    let docs = bundle.documents_of(&FormType::Form4);
    if docs.is_empty() {
        return Partial::unavailable("no Form 4 filings in lookback window");
    }

    let mut filings = Vec::new();
    let mut warnings = Vec::new();
    for doc in docs {
        let result = parsers::parse_form4(&doc.text);
        warnings.extend(result.warnings);
        if let Some(summary) = result.data {
            filings.push(summary);
        }
    }

    if filings.is_empty() {
        return Partial::unavailable("no Form 4 filings could be parsed");
    }

    let net_shares: f64 = filings.iter().map(|f| f.net_shares).sum();
    let net_value: f64 = filings.iter().map(|f| f.net_value).sum();
    let signal = Some(parsers::InsiderSignal::from_net_value(net_value));

    let rollup = Form4RollUp {
        filings,
        net_shares,
        net_value,
        signal,
    };

    if warnings.is_empty() {
        Partial::available(rollup)
    } else {
        Partial::available_with_warnings(rollup, warnings)
    }
}

/// Component D/institutional ownership (§4.C.3): parses every capped SC
/// 13D/G filing in the bundle.
pub fn institutional_ownership(bundle: &FilingBundle) -> Partial<Sc13RollUp> {
    let mut docs: Vec<_> = bundle.documents_of(&FormType::Sc13D);
    docs.extend(bundle.documents_of(&FormType::Sc13G));
    if docs.is_empty() {
        return Partial::unavailable("no SC 13D/G filings in lookback window");
    }

    let mut filings = Vec::new();
    let mut warnings = Vec::new();
    for doc in docs {
        let is_13d = doc.reference.form_type == FormType::Sc13D;
        let result = parsers::parse_sc13(&doc.text, is_13d);
        warnings.extend(result.warnings);
        if let Some(summary) = result.data {
            filings.push(summary);
        }
    }

    if filings.is_empty() {
        return Partial::unavailable("no SC 13D/G filings could be parsed");
    }

    let activist_filings = filings.iter().filter(|f| f.is_activist).count();
    let rollup = Sc13RollUp {
        filings,
        activist_filings,
    };
    if warnings.is_empty() {
        Partial::available(rollup)
    } else {
        Partial::available_with_warnings(rollup, warnings)
    }
}

/// Component E/narrative analysis (§4.C.6): parses every capped 10-K/10-Q
/// report in the bundle, aggregating keyword counts across all of them.
pub fn narrative_analysis(bundle: &FilingBundle) -> Partial<NarrativeRollUp> {
    let mut docs: Vec<_> = bundle.documents_of(&FormType::Form10K);
    docs.extend(bundle.documents_of(&FormType::Form10Q));
    if docs.is_empty() {
        return Partial::unavailable("no 10-K/10-Q filings in lookback window");
    }

    let mut reports = Vec::new();
    let mut warnings = Vec::new();
    for doc in docs {
        let result = parsers::parse_narrative(&doc.text);
        warnings.extend(result.warnings);
        if let Some(summary) = result.data {
            reports.push(summary);
        }
    }

    if reports.is_empty() {
        return Partial::unavailable("no 10-K/10-Q filings could be parsed");
    }

    let total_word_count = reports.iter().map(|r| r.word_count).sum();
    let total_risk_keyword_count = reports.iter().map(|r| r.risk_keyword_count).sum();
    let total_litigation_mention_count = reports.iter().map(|r| r.litigation_mention_count).sum();

    let rollup = NarrativeRollUp {
        reports,
        total_word_count,
        total_risk_keyword_count,
        total_litigation_mention_count,
    };
    if warnings.is_empty() {
        Partial::available(rollup)
    } else {
        Partial::available_with_warnings(rollup, warnings)
    }
}

/// Component C/key persons (§4.C.7): parses every DEF 14A and Form 4 in the
/// bundle directly — per §4.F, "`key_persons` reads cached raw filing
/// bundles, not other tasks' outputs" — and folds the results together,
/// keyed by name, within the recency window.
pub fn key_persons(bundle: &FilingBundle) -> Partial<parsers::KeyPersonsSummary> {
    let as_of = Utc::now().date_naive();

    let def14a_filings: Vec<(parsers::Def14ASummary, NaiveDate)> = bundle
        .documents_of(&FormType::Def14A)
        .into_iter()
        .filter_map(|doc| parsers::parse_def14a(&doc.text).data.map(|s| (s, doc.reference.filed_date)))
        .collect();

    let form4_filings: Vec<(parsers::Form4Summary, NaiveDate)> = bundle
        .documents_of(&FormType::Form4)
        .into_iter()
        .filter_map(|doc| parsers::parse_form4(&doc.text).data.map(|s| (s, doc.reference.filed_date)))
        .collect();

    if def14a_filings.is_empty() && form4_filings.is_empty() {
        return Partial::unavailable("no governance or insider filings to derive key persons from");
    }

    let summary = parsers::aggregate_key_persons(
        &def14a_filings,
        &form4_filings,
        as_of,
        parsers::DEFAULT_RECENCY_WINDOW_MONTHS,
    );
    Partial::available(summary)
}

/// Component D/relationship extraction (§4.D): runs the mention-then-
/// classify pipeline and the financial-relationship extractor over every
/// 10-K/10-Q narrative document in the bundle, deduplicating edges by
/// `(to_cik, relationship_type)` keeping the highest-confidence one.
pub fn relationships(
    bundle: &FilingBundle,
    directory: &CompanyDirectory,
    settings: &RelationshipSettings,
) -> Partial<Vec<RelationshipEdge>> {
    let mut docs: Vec<_> = bundle.documents_of(&FormType::Form10K);
    docs.extend(bundle.documents_of(&FormType::Form10Q));
    if docs.is_empty() {
        return Partial::unavailable("no narrative filings to extract relationships from");
    }

    let mut by_key: std::collections::HashMap<(String, &'static str), RelationshipEdge> =
        std::collections::HashMap::new();

    for doc in &docs {
        let edges = relationships::extract_relationships(
            &bundle.cik,
            &doc.text,
            directory,
            &doc.reference.accession,
            doc.reference.filed_date,
            settings.fuzzy_threshold,
            settings.min_confidence,
        );
        for edge in edges {
            let key = (edge.to_cik.clone(), edge.relationship_type.as_str());
            by_key
                .entry(key)
                .and_modify(|existing| {
                    existing.mention_count += 1;
                    existing.first_mentioned = existing.first_mentioned.min(edge.first_mentioned);
                    existing.last_mentioned = existing.last_mentioned.max(edge.last_mentioned);
                    if edge.confidence > existing.confidence {
                        let mention_count = existing.mention_count;
                        let first_mentioned = existing.first_mentioned;
                        let last_mentioned = existing.last_mentioned;
                        *existing = edge.clone();
                        existing.mention_count = mention_count;
                        existing.first_mentioned = first_mentioned;
                        existing.last_mentioned = last_mentioned;
                    }
                })
                .or_insert(edge);
        }
    }

    if by_key.is_empty() {
        return Partial::unavailable("no relationships found above confidence threshold");
    }

    let mut edges: Vec<RelationshipEdge> = by_key.into_values().collect();
    edges.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap());
    Partial::available(edges)
}

/// Component D.3/financial relationships (§4.D.3): runs the concentration
/// extractor over the combined text of every narrative document, since
/// customer-concentration disclosures live in a single company's 10-K.
pub fn financial_relationships(
    bundle: &FilingBundle,
) -> Partial<relationships::FinancialRelationships> {
    let mut docs: Vec<_> = bundle.documents_of(&FormType::Form10K);
    docs.extend(bundle.documents_of(&FormType::Form10Q));
    if docs.is_empty() {
        return Partial::unavailable("no narrative filings to extract financial relationships from");
    }

    let combined_text = docs
        .iter()
        .map(|d| d.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    let record = relationships::extract_financial_relationships(&bundle.cik, &combined_text);
    if record.top_customers.is_empty() && record.suppliers.is_empty() {
        return Partial::unavailable("no customer or supplier disclosures found");
    }
    Partial::available(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::bundle::BundledDocument;
    use crate::domain::{Cik, FilingReference};

    fn reference(form_type: FormType, filed: &str) -> FilingReference {
        FilingReference {
            cik: Cik::new("320193"),
            accession: "0000320193-24-000001".to_string(),
            form_type,
            filed_date: NaiveDate::parse_from_str(filed, "%Y-%m-%d").unwrap(),
            report_date: None,
            primary_document_path: Some("doc.htm".to_string()),
        }
    }

    #[test]
    fn empty_bundle_has_unavailable_filing_metadata() {
        let bundle = FilingBundle::default();
        let result = filing_metadata(&bundle);
        assert!(!result.available);
    }

    #[test]
    fn filing_metadata_counts_documents_and_8k_references() {
        let mut bundle = FilingBundle {
            cik: "0000320193".to_string(),
            ..Default::default()
        };
        bundle.documents.push(BundledDocument {
            reference: reference(FormType::Form10K, "2024-02-01"),
            text: "body".to_string(),
        });
        bundle.form8k_references.push(reference(FormType::Form8K, "2024-03-01"));

        let result = filing_metadata(&bundle).data.unwrap();
        assert_eq!(result.total_filings, 2);
        assert!(result.form_types_seen.contains(&"10-K".to_string()));
        assert!(result.form_types_seen.contains(&"8-K".to_string()));
        assert_eq!(result.earliest_filed, NaiveDate::from_ymd_opt(2024, 2, 1));
        assert_eq!(result.latest_filed, NaiveDate::from_ymd_opt(2024, 3, 1));
    }

    #[test]
    fn no_form4_documents_is_unavailable() {
        let bundle = FilingBundle::default();
        let result = insider_trading(&bundle, &ParserSettings::default());
        assert!(!result.available);
    }

    #[test]
    fn material_events_reads_8k_references_only() {
        let mut bundle = FilingBundle::default();
        bundle.form8k_references.push(reference(FormType::Form8K, "2024-01-01"));
        let result = material_events(&bundle);
        assert!(result.available);
        assert_eq!(result.data.unwrap().total_filings, 1);
    }
}
