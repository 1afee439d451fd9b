//! Quality Gate (§4.G): a deterministic validator pass over a finished
//! `UnifiedProfile`, plus the failure-tracker record type persisted when a
//! ticker fails terminally.
//!
//! The validator never blocks persistence — a profile with validation issues
//! is still written to the store with its score and issues attached (§8
//! scenario 2: "profile persisted, quality.grade ∈ {B, C} due to
//! incompleteness, no failure record").

use crate::aggregator::profile::UnifiedProfile;
use crate::error::FailureReason;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const INCOMPLETE_DEDUCTION: f64 = 10.0;
const INCOMPLETE_FLOOR: f64 = 40.0;
const INCONSISTENT_DEDUCTION: f64 = 15.0;
const OUT_OF_ORDER_DEDUCTION: f64 = 10.0;
const IMPROPER_DEDUCTION: f64 = 20.0;

const GRADE_A_PLUS_MIN: f64 = 95.0;
const GRADE_A_MIN: f64 = 85.0;
const GRADE_B_MIN: f64 = 75.0;
const GRADE_C_MIN: f64 = 65.0;
const GRADE_D_MIN: f64 = 50.0;

/// A metric value is treated as absurd above this magnitude (§4.G "currency
/// magnitudes non-absurd (< 1e13 per metric per period)").
const MAX_PLAUSIBLE_MAGNITUDE: f64 = 1e13;
/// Plausible band for the ratios the metrics engine computes (§4.G's
/// "ROE ∈ [-5, +5]" example, applied to every ratio we carry).
const RATIO_BAND: (f64, f64) = (-5.0, 5.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueCategory {
    Incomplete,
    Inconsistent,
    OutOfOrder,
    Improper,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub category: IssueCategory,
    pub message: String,
}

impl Issue {
    fn new(category: IssueCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "A+")]
    APlus,
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    fn from_score(score: f64) -> Self {
        if score >= GRADE_A_PLUS_MIN {
            Grade::APlus
        } else if score >= GRADE_A_MIN {
            Grade::A
        } else if score >= GRADE_B_MIN {
            Grade::B
        } else if score >= GRADE_C_MIN {
            Grade::C
        } else if score >= GRADE_D_MIN {
            Grade::D
        } else {
            Grade::F
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quality {
    pub score: f64,
    pub grade: Grade,
    pub issues: Vec<Issue>,
}

impl Default for Quality {
    fn default() -> Self {
        Self {
            score: 100.0,
            grade: Grade::APlus,
            issues: Vec::new(),
        }
    }
}

/// Failure record (§4.G, §4.H "keyed by ticker"): created on any terminal
/// failure, updated (retry_count incremented) on retry, cleared when a
/// profile for the same cik is next persisted successfully.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    pub ticker: String,
    pub reason_code: FailureReason,
    pub message: String,
    pub stack: Option<String>,
    pub context: Option<String>,
    pub retry_count: u32,
    pub timestamp: DateTime<Utc>,
}

impl FailureRecord {
    pub fn new(ticker: impl Into<String>, reason_code: FailureReason, message: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            reason_code,
            message: message.into(),
            stack: None,
            context: None,
            retry_count: 0,
            timestamp: Utc::now(),
        }
    }

    /// Merges a retry of the same failure, bumping the count rather than
    /// replacing the record wholesale.
    pub fn retry(mut self, reason_code: FailureReason, message: impl Into<String>) -> Self {
        self.reason_code = reason_code;
        self.message = message.into();
        self.retry_count += 1;
        self.timestamp = Utc::now();
        self
    }
}

/// Runs the deterministic validator pass over a finished profile (§4.G),
/// returning the score/grade/issues triple to attach as `profile.quality`.
pub fn validate(profile: &UnifiedProfile) -> Quality {
    let mut issues = Vec::new();

    check_completeness(profile, &mut issues);
    check_consistency(profile, &mut issues);
    check_order(profile, &mut issues);
    check_proper_values(profile, &mut issues);

    let score = score_from_issues(&issues);
    let grade = Grade::from_score(score);

    Quality { score, grade, issues }
}

fn check_completeness(profile: &UnifiedProfile, issues: &mut Vec<Issue>) {
    macro_rules! check_partial {
        ($field:expr, $name:expr) => {
            if !$field.available {
                issues.push(Issue::new(
                    IssueCategory::Incomplete,
                    format!("{} is unavailable", $name),
                ));
            }
        };
    }

    check_partial!(profile.filing_metadata, "filing_metadata");
    check_partial!(profile.financial_time_series, "financial_time_series");
    check_partial!(profile.material_events, "material_events");
    check_partial!(profile.insider_trading, "insider_trading");
    check_partial!(profile.institutional_ownership, "institutional_ownership");
    check_partial!(profile.corporate_governance, "corporate_governance");
    check_partial!(profile.key_persons, "key_persons");
    check_partial!(profile.narrative_analysis, "narrative_analysis");
    check_partial!(profile.relationships, "relationships");
    check_partial!(profile.financial_relationships, "financial_relationships");
}

fn check_consistency(profile: &UnifiedProfile, issues: &mut Vec<Issue>) {
    if let Some(latest) = &profile.latest_financials {
        for (label, value) in [
            ("total_assets", latest.total_assets),
            ("revenue", latest.revenue),
        ] {
            if let Some(v) = value {
                if v < 0.0 {
                    issues.push(Issue::new(
                        IssueCategory::Inconsistent,
                        format!("{label} is negative: {v}"),
                    ));
                }
            }
        }
    }

    if let Some(ratios) = &profile.financial_ratios {
        for (label, value) in [
            ("roe", ratios.roe),
            ("roa", ratios.roa),
            ("debt_to_equity", ratios.debt_to_equity),
            ("net_margin", ratios.net_margin),
            ("operating_margin", ratios.operating_margin),
            ("gross_margin", ratios.gross_margin),
            ("asset_turnover", ratios.asset_turnover),
            ("equity_multiplier", ratios.equity_multiplier),
        ] {
            if let Some(v) = value {
                if v < RATIO_BAND.0 || v > RATIO_BAND.1 {
                    issues.push(Issue::new(
                        IssueCategory::Inconsistent,
                        format!("{label} outside plausible band: {v}"),
                    ));
                }
            }
        }
    }
}

fn check_order(profile: &UnifiedProfile, issues: &mut Vec<Issue>) {
    if let Some(facts) = &profile.financial_time_series.data {
        for (label, series) in [
            ("revenue", &facts.revenue),
            ("net_income", &facts.net_income),
            ("total_assets", &facts.total_assets),
            ("total_liabilities", &facts.total_liabilities),
            ("equity", &facts.equity),
            ("cash", &facts.cash),
            ("operating_income", &facts.operating_income),
            ("current_assets", &facts.current_assets),
            ("current_liabilities", &facts.current_liabilities),
            ("long_term_debt", &facts.long_term_debt),
            ("gross_profit", &facts.gross_profit),
            ("cost_of_revenue", &facts.cost_of_revenue),
            ("operating_cash_flow", &facts.operating_cash_flow),
            ("eps_diluted", &facts.eps_diluted),
        ] {
            if !series.windows(2).all(|w| w[0].period_end < w[1].period_end) {
                issues.push(Issue::new(
                    IssueCategory::OutOfOrder,
                    format!("{label} time series is not strictly ascending by period end"),
                ));
            }
        }
    }

    if profile.generated_at > Utc::now() {
        issues.push(Issue::new(
            IssueCategory::OutOfOrder,
            "generated_at is in the future",
        ));
    }
}

fn check_proper_values(profile: &UnifiedProfile, issues: &mut Vec<Issue>) {
    if let Some(facts) = &profile.financial_time_series.data {
        for (label, series) in [
            ("revenue", &facts.revenue),
            ("net_income", &facts.net_income),
            ("total_assets", &facts.total_assets),
            ("total_liabilities", &facts.total_liabilities),
            ("equity", &facts.equity),
            ("cash", &facts.cash),
            ("operating_income", &facts.operating_income),
            ("current_assets", &facts.current_assets),
            ("current_liabilities", &facts.current_liabilities),
            ("long_term_debt", &facts.long_term_debt),
            ("gross_profit", &facts.gross_profit),
            ("cost_of_revenue", &facts.cost_of_revenue),
            ("operating_cash_flow", &facts.operating_cash_flow),
            ("eps_diluted", &facts.eps_diluted),
        ] {
            for point in series.iter() {
                if point.value.abs() >= MAX_PLAUSIBLE_MAGNITUDE {
                    issues.push(Issue::new(
                        IssueCategory::Improper,
                        format!("{label} magnitude implausible: {}", point.value),
                    ));
                    break;
                }
            }
        }
    }
}

fn score_from_issues(issues: &[Issue]) -> f64 {
    let mut score = 100.0;
    let incomplete_count = issues
        .iter()
        .filter(|i| i.category == IssueCategory::Incomplete)
        .count() as f64;
    let inconsistent_count = issues
        .iter()
        .filter(|i| i.category == IssueCategory::Inconsistent)
        .count() as f64;
    let out_of_order_count = issues
        .iter()
        .filter(|i| i.category == IssueCategory::OutOfOrder)
        .count() as f64;
    let improper_count = issues
        .iter()
        .filter(|i| i.category == IssueCategory::Improper)
        .count() as f64;

    let incomplete_deduction = (incomplete_count * INCOMPLETE_DEDUCTION).min(100.0 - INCOMPLETE_FLOOR);
    score -= incomplete_deduction;
    score -= inconsistent_count * INCONSISTENT_DEDUCTION;
    score -= out_of_order_count * OUT_OF_ORDER_DEDUCTION;
    score -= improper_count * IMPROPER_DEDUCTION;

    score.max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Cik;

    #[test]
    fn fresh_empty_profile_is_fully_incomplete_but_floored() {
        let cik = Cik::new("320193");
        let profile = UnifiedProfile::empty(&cik, "AAPL", "Apple Inc.");
        let quality = validate(&profile);
        // 10 extractor keys unavailable: 10 * 10 = 100 deduction, capped so the
        // incompleteness component alone never pushes the score below the
        // documented floor of 40.
        assert_eq!(quality.score, 40.0);
        assert_eq!(quality.grade, Grade::F);
    }

    #[test]
    fn future_generated_at_is_out_of_order() {
        let cik = Cik::new("320193");
        let mut profile = UnifiedProfile::empty(&cik, "AAPL", "Apple Inc.");
        profile.generated_at = Utc::now() + chrono::Duration::days(1);
        let quality = validate(&profile);
        assert!(
            quality
                .issues
                .iter()
                .any(|i| i.category == IssueCategory::OutOfOrder)
        );
    }

    #[test]
    fn failure_record_retry_increments_count() {
        let record = FailureRecord::new("AAPL", FailureReason::NoFilings, "no filings found");
        let retried = record.retry(FailureReason::NoFilings, "still no filings");
        assert_eq!(retried.retry_count, 1);
    }
}
