//! Shared identity types used across every component.
//!
//! `Company` and `FilingReference` are the two immutable identity records the
//! rest of the crate keys off of. Everything downstream — cache entries,
//! parsed partials, profile documents, relationship edges — refers back to a
//! company by its CIK rather than holding its own copy of the company record.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// SEC Central Index Key, rendered canonically as a 10-digit zero-padded string.
///
/// CIKs are accepted from callers as bare integers, ticker-resolved values, or
/// already-padded strings; `Cik::new` normalizes all of those into the one
/// canonical representation used as a map/store key everywhere else.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cik(String);

impl Cik {
    /// Normalizes any numeric-looking string into a 10-digit zero-padded CIK.
    pub fn new(raw: &str) -> Self {
        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
        Cik(format!("{:0>10}", digits))
    }

    pub fn from_u64(cik: u64) -> Self {
        Cik(format!("{:010}", cik))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// CIK with leading zeros stripped, as used in archive URL paths.
    pub fn as_trimmed(&self) -> &str {
        self.0.trim_start_matches('0')
    }
}

impl fmt::Display for Cik {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable company identity. CIK is the canonical key; ticker and name are
/// descriptive and may be refreshed on re-lookup, but a `Company` value itself
/// is never partially mutated once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub cik: Cik,
    pub ticker: String,
    pub name: String,
}

impl Company {
    pub fn new(cik: Cik, ticker: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            cik,
            ticker: ticker.into(),
            name: name.into(),
        }
    }
}

/// SEC filing form type, modeled as a closed set of recognized tags plus an
/// open fallback for anything the parser registry doesn't know about.
///
/// `FormType::Other` is what lets an unrecognized tag flow through the
/// registry interface (§9) as a routed, rather than rejected, value: the
/// registry just won't find a parser for it and returns an unavailable
/// partial instead of failing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormType {
    #[serde(rename = "10-K")]
    Form10K,
    #[serde(rename = "10-Q")]
    Form10Q,
    #[serde(rename = "8-K")]
    Form8K,
    #[serde(rename = "4")]
    Form4,
    #[serde(rename = "SC 13D")]
    Sc13D,
    #[serde(rename = "SC 13G")]
    Sc13G,
    #[serde(rename = "DEF 14A")]
    Def14A,
    Other(String),
}

impl FormType {
    pub fn parse_tag(tag: &str) -> Self {
        match tag.trim() {
            "10-K" | "10-K/A" => FormType::Form10K,
            "10-Q" | "10-Q/A" => FormType::Form10Q,
            "8-K" | "8-K/A" => FormType::Form8K,
            "4" | "4/A" => FormType::Form4,
            "SC 13D" | "SC 13D/A" => FormType::Sc13D,
            "SC 13G" | "SC 13G/A" => FormType::Sc13G,
            "DEF 14A" => FormType::Def14A,
            other => FormType::Other(other.to_string()),
        }
    }

    pub fn as_tag(&self) -> &str {
        match self {
            FormType::Form10K => "10-K",
            FormType::Form10Q => "10-Q",
            FormType::Form8K => "8-K",
            FormType::Form4 => "4",
            FormType::Sc13D => "SC 13D",
            FormType::Sc13G => "SC 13G",
            FormType::Def14A => "DEF 14A",
            FormType::Other(tag) => tag,
        }
    }
}

impl fmt::Display for FormType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// A single filing's identity, immutable once observed from a submissions
/// payload. Belongs to exactly one `Company` via `cik`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilingReference {
    pub cik: Cik,
    /// Format `NNNNNNNNNN-NN-NNNNNN`.
    pub accession: String,
    pub form_type: FormType,
    pub filed_date: NaiveDate,
    pub report_date: Option<NaiveDate>,
    pub primary_document_path: Option<String>,
}

impl FilingReference {
    /// Accession number with dashes stripped, as used in archive directory paths.
    pub fn accession_no_dashes(&self) -> String {
        self.accession.replace('-', "")
    }
}

/// Normalizes a loosely formatted date string to `YYYY-MM-DD`, per §4.C's
/// "date strings normalized" contract. Returns `None` rather than erroring —
/// callers fold this into a parser warning instead of failing the document.
pub fn normalize_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    for fmt in ["%Y-%m-%d", "%Y%m%d", "%m/%d/%Y", "%m-%d-%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(d);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cik_normalizes_bare_integers() {
        assert_eq!(Cik::new("320193").as_str(), "0000320193");
    }

    #[test]
    fn cik_normalizes_already_padded() {
        assert_eq!(Cik::new("0000320193").as_str(), "0000320193");
    }

    #[test]
    fn cik_trims_for_archive_paths() {
        let cik = Cik::new("320193");
        assert_eq!(cik.as_trimmed(), "320193");
    }

    #[test]
    fn form_type_routes_amendments_to_base_tag() {
        assert_eq!(FormType::parse_tag("10-K/A"), FormType::Form10K);
        assert_eq!(FormType::parse_tag("SC 13D/A"), FormType::Sc13D);
    }

    #[test]
    fn unknown_form_type_falls_back_to_other() {
        assert_eq!(
            FormType::parse_tag("S-1"),
            FormType::Other("S-1".to_string())
        );
    }

    #[test]
    fn normalize_date_accepts_several_formats() {
        assert_eq!(
            normalize_date("2024-01-05"),
            NaiveDate::from_ymd_opt(2024, 1, 5)
        );
        assert_eq!(
            normalize_date("01/05/2024"),
            NaiveDate::from_ymd_opt(2024, 1, 5)
        );
        assert_eq!(normalize_date("not a date"), None);
    }
}
