//! 8-K reference parser (§4.C.5): which disclosure items a current report
//! covers (`parse`, text-based), plus the reference-only activity summary
//! the aggregator's `material_events` task actually uses — "this parser does
//! not fetch document bodies" (§4.C.5), so `summarize_activity` works
//! entirely off `FilingReference` metadata: counts, a 90-day recent count,
//! per-quarter frequency, and clustering-based risk/positive-catalyst flags.

use super::Partial;
use crate::domain::FilingReference;
use chrono::{Datelike, NaiveDate};
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::BTreeMap;
use std::sync::OnceLock;

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Form8KSummary {
    pub items: Vec<String>,
}

/// Item 5.02 (officer/director changes) and 1.01 (material agreements) are
/// the two items the relationship extractor treats as signal-bearing.
pub const ITEM_OFFICER_DIRECTOR_CHANGES: &str = "5.02";
pub const ITEM_MATERIAL_AGREEMENT: &str = "1.01";

/// One quarter's 8-K filing count, keyed `YYYY-QN`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct QuarterCount {
    pub quarter: String,
    pub count: usize,
}

/// Reference-only 8-K activity rollup (§4.C.5): counts, recency, frequency,
/// and the two flag categories the spec names — "risk flags (filings-per-
/// window thresholds and clustering)" and "positive-catalyst flags (steady
/// disclosure pattern)".
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Form8KActivity {
    pub total_filings: usize,
    pub recent_90_day_count: usize,
    pub quarterly_counts: Vec<QuarterCount>,
    pub risk_flag: bool,
    pub positive_catalyst_flag: bool,
}

const RECENT_WINDOW_DAYS: i64 = 90;
/// Eight or more 8-Ks inside the recent window reads as clustering — a
/// company in genuine distress files far more frequently than a steady one.
const HIGH_FREQUENCY_RISK_THRESHOLD: usize = 8;
/// A company filing 1-3 8-Ks in every one of at least this many quarters is
/// disclosing steadily rather than erratically.
const STEADY_QUARTERS_MIN: usize = 4;
const STEADY_QUARTER_MAX_COUNT: usize = 3;

/// Summarizes 8-K activity from filing references alone — no document bodies
/// are fetched or read, matching §4.C.5's contract.
pub fn summarize_activity(refs: &[FilingReference], as_of: NaiveDate) -> Partial<Form8KActivity> {
    if refs.is_empty() {
        return Partial::unavailable("no 8-K filings in lookback window");
    }

    let total_filings = refs.len();
    let recent_90_day_count = refs
        .iter()
        .filter(|r| (as_of - r.filed_date).num_days() <= RECENT_WINDOW_DAYS)
        .count();

    let mut by_quarter: BTreeMap<String, usize> = BTreeMap::new();
    for r in refs {
        let quarter = r.filed_date.month0() / 3 + 1;
        let key = format!("{}-Q{}", r.filed_date.year(), quarter);
        *by_quarter.entry(key).or_insert(0) += 1;
    }
    let quarterly_counts: Vec<QuarterCount> = by_quarter
        .into_iter()
        .map(|(quarter, count)| QuarterCount { quarter, count })
        .collect();

    let risk_flag = recent_90_day_count >= HIGH_FREQUENCY_RISK_THRESHOLD;
    let positive_catalyst_flag = !risk_flag
        && quarterly_counts.len() >= STEADY_QUARTERS_MIN
        && quarterly_counts
            .iter()
            .all(|q| q.count >= 1 && q.count <= STEADY_QUARTER_MAX_COUNT);

    Partial::available(Form8KActivity {
        total_filings,
        recent_90_day_count,
        quarterly_counts,
        risk_flag,
        positive_catalyst_flag,
    })
}

fn item_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Item\s+(\d\.\d{2})").unwrap())
}

pub(super) fn parse(raw: &str) -> Partial<Form8KSummary> {
    let document = Html::parse_document(raw);
    let body_selector = Selector::parse("body").unwrap();
    let text: String = document
        .select(&body_selector)
        .next()
        .map(|b| b.text().collect::<Vec<_>>().join(" "))
        .unwrap_or_else(|| raw.to_string());

    let mut items: Vec<String> = Vec::new();
    for caps in item_regex().captures_iter(&text) {
        let item = caps[1].to_string();
        if !items.contains(&item) {
            items.push(item);
        }
    }

    if items.is_empty() {
        return Partial::unavailable("no item numbers found in 8-K body");
    }

    Partial::available(Form8KSummary { items })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_unique_items_in_order() {
        let html = "<html><body>Item 5.02 Departure of Directors. Item 1.01 Entry into a Material Definitive Agreement. Item 5.02 again.</body></html>";
        let result = parse(html);
        assert!(result.available);
        let summary = result.data.unwrap();
        assert_eq!(summary.items, vec!["5.02".to_string(), "1.01".to_string()]);
    }

    #[test]
    fn no_items_is_unavailable() {
        let result = parse("<html><body>Nothing relevant.</body></html>");
        assert!(!result.available);
    }

    fn reference(filed: &str) -> FilingReference {
        use crate::domain::{Cik, FormType};
        FilingReference {
            cik: Cik::new("320193"),
            accession: "0000320193-24-000001".to_string(),
            form_type: FormType::Form8K,
            filed_date: NaiveDate::parse_from_str(filed, "%Y-%m-%d").unwrap(),
            report_date: None,
            primary_document_path: Some("doc.htm".to_string()),
        }
    }

    #[test]
    fn empty_references_are_unavailable() {
        let as_of = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert!(!summarize_activity(&[], as_of).available);
    }

    #[test]
    fn high_frequency_window_flags_risk() {
        let as_of = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let refs: Vec<FilingReference> = (0..8)
            .map(|i| reference(&format!("2024-04-{:02}", i + 1)))
            .collect();
        let result = summarize_activity(&refs, as_of);
        let activity = result.data.unwrap();
        assert_eq!(activity.recent_90_day_count, 8);
        assert!(activity.risk_flag);
        assert!(!activity.positive_catalyst_flag);
    }

    #[test]
    fn steady_one_per_quarter_flags_positive_catalyst() {
        let as_of = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        let refs = vec![
            reference("2023-02-01"),
            reference("2023-05-01"),
            reference("2023-08-01"),
            reference("2023-11-01"),
        ];
        let result = summarize_activity(&refs, as_of);
        let activity = result.data.unwrap();
        assert!(activity.positive_catalyst_flag);
        assert!(!activity.risk_flag);
    }
}
