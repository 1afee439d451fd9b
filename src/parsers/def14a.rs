//! DEF 14A (proxy statement) parser (§4.C.4): director and officer names,
//! feeding the key-persons aggregator, plus the say-on-pay vote result when
//! present.

use super::Partial;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::BTreeSet;
use std::sync::OnceLock;

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Def14ASummary {
    pub directors: Vec<String>,
    pub executive_officers: Vec<String>,
    pub say_on_pay_support_percent: Option<f64>,
}

fn person_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"([A-Z][a-zA-Z'.-]+(?: [A-Z]\.)? [A-Z][a-zA-Z'.-]+),?\s+(Director|Chief [A-Za-z]+ Officer|President|Chairman)")
            .unwrap()
    })
}

fn say_on_pay_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)approved[^.]{0,60}compensation[^.]{0,60}(\d{1,3}(?:\.\d+)?)\s*%").unwrap()
    })
}

pub(super) fn parse(raw: &str) -> Partial<Def14ASummary> {
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

    let mut directors = BTreeSet::new();
    let mut executive_officers = BTreeSet::new();

    for caps in person_regex().captures_iter(&text) {
        let name = caps[1].to_string();
        let title = &caps[2];
        if title == "Director" {
            directors.insert(name);
        } else {
            executive_officers.insert(name);
        }
    }

    let say_on_pay_support_percent = say_on_pay_regex()
        .captures(&text)
        .and_then(|c| c[1].parse().ok());

    if directors.is_empty() && executive_officers.is_empty() {
        return Partial::unavailable("no director or officer names recognized");
    }

    Partial::available(Def14ASummary {
        directors: directors.into_iter().collect(),
        executive_officers: executive_officers.into_iter().collect(),
        say_on_pay_support_percent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_directors_and_officers_with_titles() {
        let html = "<html><body>\
            Jane A. Smith, Director since 2019. \
            John Doe, Chief Executive Officer of the Company. \
            The board's advisory vote on compensation was approved with 94.2% support.\
        </body></html>";

        let result = parse(html);
        assert!(result.available);
        let summary = result.data.unwrap();
        assert!(summary.directors.contains(&"Jane A. Smith".to_string()));
        assert!(summary.executive_officers.contains(&"John Doe".to_string()));
        assert_eq!(summary.say_on_pay_support_percent, Some(94.2));
    }

    #[test]
    fn no_recognizable_names_is_unavailable() {
        let result = parse("<html><body>No relevant content here.</body></html>");
        assert!(!result.available);
    }
}
