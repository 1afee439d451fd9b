//! 10-K/10-Q narrative parser (§4.C.6): coarse keyword-frequency signals
//! over the free-text body, rather than full natural-language extraction.

use super::Partial;
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::OnceLock;

const RISK_KEYWORDS: &[&str] = &[
    "risk factor",
    "material weakness",
    "going concern",
    "adverse effect",
    "uncertain",
];
const LITIGATION_KEYWORDS: &[&str] = &["litigation", "lawsuit", "legal proceeding"];

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct NarrativeSummary {
    pub word_count: usize,
    pub risk_keyword_count: usize,
    pub litigation_mention_count: usize,
}

fn word_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\w+\b").unwrap())
}

fn count_occurrences(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}

pub(super) fn parse(raw: &str) -> Partial<NarrativeSummary> {
    let document = Html::parse_document(raw);
    let body_selector = Selector::parse("body").unwrap();
    let text: String = document
        .select(&body_selector)
        .next()
        .map(|b| b.text().collect::<Vec<_>>().join(" "))
        .unwrap_or_else(|| raw.to_string());

    if text.trim().is_empty() {
        return Partial::unavailable("document contained no extractable text");
    }

    let lower = text.to_lowercase();
    let word_count = word_regex().find_iter(&text).count();
    let risk_keyword_count: usize = RISK_KEYWORDS
        .iter()
        .map(|kw| count_occurrences(&lower, kw))
        .sum();
    let litigation_mention_count: usize = LITIGATION_KEYWORDS
        .iter()
        .map(|kw| count_occurrences(&lower, kw))
        .sum();

    Partial::available(NarrativeSummary {
        word_count,
        risk_keyword_count,
        litigation_mention_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_words_and_keywords() {
        let html = "<html><body>We face material weakness and going concern uncertainty. \
            There is ongoing litigation related to a patent lawsuit.</body></html>";
        let result = parse(html);
        assert!(result.available);
        let summary = result.data.unwrap();
        assert!(summary.word_count > 10);
        assert!(summary.risk_keyword_count >= 2);
        assert!(summary.litigation_mention_count >= 2);
    }

    #[test]
    fn empty_document_is_unavailable() {
        let result = parse("<html><body></body></html>");
        assert!(!result.available);
    }
}
