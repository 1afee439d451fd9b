//! Schedule 13D/13G (beneficial ownership) parser (§4.C.3).
//!
//! These filings are HTML documents; `scraper` strips markup down to plain
//! text, and a small set of regexes pull the cover-page numbers (percent of
//! class, shares owned) and classify intent by scanning Item 4's narrative
//! for activist language. A 13G filer attests to passive intent by form, so
//! `is_activist` is never set for one regardless of text content.

use super::Partial;
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::OnceLock;

const ACTIVIST_KEYWORDS: &[&str] = &[
    "board representation",
    "strategic alternatives",
    "enhance shareholder value",
    "replace the board",
    "special meeting",
    "unlock value",
];

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Sc13Summary {
    pub filer_name: Option<String>,
    pub subject_company: Option<String>,
    pub percent_of_class: Option<f64>,
    pub shares_owned: Option<f64>,
    pub is_activist: bool,
}

fn percent_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)percent of class[^0-9]{0,40}(\d{1,3}(?:\.\d+)?)\s*%").unwrap())
}

fn shares_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)aggregate amount[^0-9]{0,60}([\d,]+)\s*(?:shares)?").unwrap()
    })
}

pub(super) fn parse(raw: &str, is_13d: bool) -> Partial<Sc13Summary> {
    let document = Html::parse_document(raw);
    let body_selector = Selector::parse("body").unwrap();
    let text: String = document
        .select(&body_selector)
        .next()
        .map(|b| b.text().collect::<Vec<_>>().join(" "))
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Partial::unavailable("document contained no extractable text");
    }

    let mut warnings = Vec::new();

    let percent_of_class = percent_regex()
        .captures(&text)
        .and_then(|c| c[1].parse().ok());
    if percent_of_class.is_none() {
        warnings.push("percent of class not found".to_string());
    }

    let shares_owned = shares_regex()
        .captures(&text)
        .and_then(|c| c[1].replace(',', "").parse().ok());
    if shares_owned.is_none() {
        warnings.push("aggregate shares owned not found".to_string());
    }

    let lower = text.to_lowercase();
    let is_activist = is_13d && ACTIVIST_KEYWORDS.iter().any(|kw| lower.contains(kw));

    if percent_of_class.is_none() && shares_owned.is_none() {
        return Partial::unavailable("no ownership figures recognized in document");
    }

    Partial::available_with_warnings(
        Sc13Summary {
            filer_name: None,
            subject_company: None,
            percent_of_class,
            shares_owned,
            is_activist,
        },
        warnings,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(body: &str) -> String {
        format!("<html><body>{body}</body></html>")
    }

    #[test]
    fn extracts_percent_and_shares() {
        let html = fixture(
            "Item 13. Percent of Class Represented by Amount in Row (11): 7.5% \
             Aggregate Amount Beneficially Owned: 1,250,000 shares",
        );
        let result = parse(&html, false);
        assert!(result.available);
        let summary = result.data.unwrap();
        assert_eq!(summary.percent_of_class, Some(7.5));
        assert_eq!(summary.shares_owned, Some(1_250_000.0));
        assert!(!summary.is_activist);
    }

    #[test]
    fn flags_activist_intent_only_for_13d() {
        let html = fixture(
            "Percent of Class: 9.9% Aggregate Amount: 500,000 \
             The filer intends to seek board representation and push for strategic alternatives.",
        );
        let d_result = parse(&html, true);
        assert!(d_result.data.unwrap().is_activist);

        let g_result = parse(&html, false);
        assert!(!g_result.data.unwrap().is_activist);
    }

    #[test]
    fn empty_document_is_unavailable() {
        let result = parse("<html><body></body></html>", false);
        assert!(!result.available);
    }
}
