//! Financial relationship extraction (§4.D.3): customer/supplier revenue
//! concentration figures pulled from narrative disclosures, plus the
//! Herfindahl-Hirschman Index (HHI) over whatever concentration percentages
//! were found — the standard measure of how concentrated a company's
//! customer base is.

use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CustomerConcentration {
    pub label: String,
    pub percent_of_revenue: f64,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SupplierMention {
    pub label: String,
    pub confidence: f64,
}

/// Concentration classification bands over the HHI (§4.D.3: thresholds 1500, 2500).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ConcentrationLevel {
    Low,
    Moderate,
    High,
}

const HHI_MODERATE_MIN: f64 = 1500.0;
const HHI_HIGH_MIN: f64 = 2500.0;

fn concentration_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)(customer [a-z0-9]+|one customer|a single customer)[^.]{0,80}accounted for[^0-9]{0,20}(\d{1,3}(?:\.\d+)?)\s*%",
        )
        .unwrap()
    })
}

fn supplier_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?:suppliers include|supply agreements? with|sourced from)\s+([A-Z][\w&.,' -]{2,60})").unwrap()
    })
}

/// Extracts every "Customer X accounted for N% of revenue"-shaped sentence
/// from narrative text.
pub fn extract_customer_concentration(text: &str) -> Vec<CustomerConcentration> {
    concentration_regex()
        .captures_iter(text)
        .filter_map(|caps| {
            let percent: f64 = caps[2].parse().ok()?;
            Some(CustomerConcentration {
                label: caps[1].trim().to_string(),
                percent_of_revenue: percent,
            })
        })
        .collect()
}

/// Extracts supplier names from enumerated-list phrasing (§4.D.3, confidence ≥0.75).
pub fn extract_suppliers(text: &str) -> Vec<SupplierMention> {
    const SUPPLIER_MENTION_CONFIDENCE: f64 = 0.75;
    supplier_regex()
        .captures_iter(text)
        .map(|caps| SupplierMention {
            label: caps[1].trim().trim_end_matches(['.', ',']).to_string(),
            confidence: SUPPLIER_MENTION_CONFIDENCE,
        })
        .collect()
}

/// Herfindahl-Hirschman Index over a set of percentage shares (0-100),
/// computed as the sum of squared percentages. Ranges from near 0 (many
/// small, evenly split customers) to 10,000 (a single customer holds 100%).
pub fn herfindahl_hirschman_index(percentages: &[f64]) -> f64 {
    percentages.iter().map(|p| p * p).sum()
}

pub fn classify_concentration(hhi: f64) -> ConcentrationLevel {
    if hhi >= HHI_HIGH_MIN {
        ConcentrationLevel::High
    } else if hhi >= HHI_MODERATE_MIN {
        ConcentrationLevel::Moderate
    } else {
        ConcentrationLevel::Low
    }
}

/// Sum of the five largest percentage shares, a simpler companion metric to HHI.
pub fn top5_concentration_ratio(percentages: &[f64]) -> f64 {
    let mut sorted = percentages.to_vec();
    sorted.sort_by(|a, b| b.partial_cmp(a).unwrap());
    sorted.into_iter().take(5).sum()
}
