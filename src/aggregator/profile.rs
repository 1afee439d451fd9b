//! The Unified Profile document (§3 "Unified Profile", §6 profile document
//! shape): the single aggregate produced per company by the aggregator.
//!
//! Every extractor contributes exactly one field here, wrapped in
//! `Partial<T>` so the `available` discriminant is always present — the
//! per-profile invariant from §3 that "every extractor key is present...
//! missing is never allowed".

use crate::domain::Cik;
use crate::metrics::{GrowthRates, HealthScore, Ratios, StatisticalSummary, TrendResult};
use crate::parsers::{
    Def14ASummary, Form4Summary, Form8KActivity, InsiderSignal, KeyPersonsSummary,
    NarrativeSummary, Partial, Sc13Summary, XbrlFacts,
};
use crate::relationships::{FinancialRelationships, RelationshipEdge};
use crate::validator::Quality;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyInfo {
    pub cik: String,
    pub ticker: String,
    pub name: String,
}

/// Component A/filing-index rollup (§4.F task `filing_metadata`): a coarse
/// summary of what's in the fetched bundle, not a re-statement of every
/// reference.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilingMetadata {
    pub total_filings: usize,
    pub form_types_seen: Vec<String>,
    pub earliest_filed: Option<NaiveDate>,
    pub latest_filed: Option<NaiveDate>,
}

/// Per-metric most recent non-null value whose period end is on or before
/// the aggregation time (§4.E "Latest financials").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LatestFinancials {
    pub revenue: Option<f64>,
    pub net_income: Option<f64>,
    pub total_assets: Option<f64>,
    pub total_liabilities: Option<f64>,
    pub equity: Option<f64>,
    pub cash: Option<f64>,
    pub operating_income: Option<f64>,
    pub current_assets: Option<f64>,
    pub current_liabilities: Option<f64>,
    pub long_term_debt: Option<f64>,
    pub gross_profit: Option<f64>,
    pub cost_of_revenue: Option<f64>,
    pub operating_cash_flow: Option<f64>,
    pub eps_diluted: Option<f64>,
    pub as_of: Option<NaiveDate>,
}

/// Statistical summary (§4.E) per metric that has enough history to compute one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatisticalSummaries {
    pub revenue: Option<StatisticalSummary>,
    pub net_income: Option<StatisticalSummary>,
    pub total_assets: Option<StatisticalSummary>,
    pub total_liabilities: Option<StatisticalSummary>,
    pub equity: Option<StatisticalSummary>,
    pub operating_income: Option<StatisticalSummary>,
    pub gross_profit: Option<StatisticalSummary>,
    pub cash: Option<StatisticalSummary>,
}

/// Volatility/trend (§4.E) computed over the revenue series — the metric the
/// health score's growth component also reads off of.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VolatilityMetrics {
    pub revenue_volatility: Option<f64>,
    pub revenue_trend: Option<TrendResult>,
}

/// Insider-trading rollup (§4.C.2, §4.C.7): one `Form4Summary` per parsed
/// Form 4 document, plus the combined net position and signal across all of
/// them — the figure the key-persons aggregator and relationship extractor
/// both treat as "the" insider sentiment for this company.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Form4RollUp {
    pub filings: Vec<Form4Summary>,
    pub net_shares: f64,
    pub net_value: f64,
    pub signal: Option<InsiderSignal>,
}

/// Institutional-ownership rollup (§4.C.3): one `Sc13Summary` per parsed
/// SC 13D/G filing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sc13RollUp {
    pub filings: Vec<Sc13Summary>,
    pub activist_filings: usize,
}

/// Narrative rollup (§4.C.6): one `NarrativeSummary` per 10-K/10-Q report
/// parsed, plus totals across the reports aggregated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NarrativeRollUp {
    pub reports: Vec<NarrativeSummary>,
    pub total_word_count: usize,
    pub total_risk_keyword_count: usize,
    pub total_litigation_mention_count: usize,
}

/// The aggregate document per company (§3 "Unified Profile", §6 "Profile
/// document shape"). Field order matches the spec's top-level key list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedProfile {
    pub cik: String,
    pub company_info: CompanyInfo,
    pub filing_metadata: Partial<FilingMetadata>,
    pub financial_time_series: Partial<XbrlFacts>,
    pub latest_financials: Option<LatestFinancials>,
    pub financial_ratios: Option<Ratios>,
    pub growth_rates: Option<GrowthRates>,
    pub health_indicators: Option<HealthScore>,
    pub material_events: Partial<Form8KActivity>,
    pub insider_trading: Partial<Form4RollUp>,
    pub institutional_ownership: Partial<Sc13RollUp>,
    pub corporate_governance: Partial<Def14ASummary>,
    pub key_persons: Partial<KeyPersonsSummary>,
    pub narrative_analysis: Partial<NarrativeRollUp>,
    pub relationships: Partial<Vec<RelationshipEdge>>,
    pub financial_relationships: Partial<FinancialRelationships>,
    pub statistical_summary: Option<StatisticalSummaries>,
    pub volatility_metrics: Option<VolatilityMetrics>,
    pub quality: Quality,
    pub generated_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl UnifiedProfile {
    /// A freshly created profile with every extractor key present but
    /// unavailable — the shape the aggregator starts from before any task
    /// writes its key, and the shape a zero-filings company ends with
    /// unchanged (§8 "Company with zero filings").
    pub fn empty(cik: &Cik, ticker: &str, name: &str) -> Self {
        let now = Utc::now();
        Self {
            cik: cik.as_str().to_string(),
            company_info: CompanyInfo {
                cik: cik.as_str().to_string(),
                ticker: ticker.to_string(),
                name: name.to_string(),
            },
            filing_metadata: Partial::unavailable("not yet computed"),
            financial_time_series: Partial::unavailable("not yet computed"),
            latest_financials: None,
            financial_ratios: None,
            growth_rates: None,
            health_indicators: None,
            material_events: Partial::unavailable("not yet computed"),
            insider_trading: Partial::unavailable("not yet computed"),
            institutional_ownership: Partial::unavailable("not yet computed"),
            corporate_governance: Partial::unavailable("not yet computed"),
            key_persons: Partial::unavailable("not yet computed"),
            narrative_analysis: Partial::unavailable("not yet computed"),
            relationships: Partial::unavailable("not yet computed"),
            financial_relationships: Partial::unavailable("not yet computed"),
            statistical_summary: None,
            volatility_metrics: None,
            quality: Quality::default(),
            generated_at: now,
            last_updated: now,
        }
    }
}
