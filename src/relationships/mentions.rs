//! Company mention detection (§4.D.1): scans narrative text for references
//! to other known companies, scoring each hit by how closely the matched
//! text tracks the directory's canonical name.

use regex::Regex;
use std::collections::HashMap;

/// One entry in the known-companies directory: its canonical display name,
/// ticker (if any), CIK, and any alternate names it's referred to by in
/// narrative text — the identifier relationship edges are keyed on, per §3's
/// `(source_cik, target_cik, relationship_type)` edge key.
#[derive(Debug, Clone)]
pub struct DirectoryCompany {
    pub name: String,
    pub ticker: Option<String>,
    pub cik: String,
    pub aliases: Vec<String>,
}

/// Read-only lookup of known companies, loaded once and shared (via `Arc`)
/// across every extraction call rather than rebuilt per filing.
#[derive(Debug, Clone, Default)]
pub struct CompanyDirectory {
    /// lowercased canonical name -> directory entry
    by_name: HashMap<String, DirectoryCompany>,
}

impl CompanyDirectory {
    /// Builds a directory from `(name, ticker)` pairs, synthesizing a
    /// placeholder CIK. Prefer `with_ciks` when real CIKs are known; this
    /// constructor exists for call sites (and existing tests) that only
    /// care about name/ticker matching.
    pub fn new(companies: impl IntoIterator<Item = (String, Option<String>)>) -> Self {
        Self::with_ciks(
            companies
                .into_iter()
                .map(|(name, ticker)| (name, ticker, String::new())),
        )
    }

    pub fn with_ciks(companies: impl IntoIterator<Item = (String, Option<String>, String)>) -> Self {
        Self::with_aliases(
            companies
                .into_iter()
                .map(|(name, ticker, cik)| (name, ticker, cik, Vec::new())),
        )
    }

    /// Builds a directory from `(name, ticker, cik, aliases)` tuples, the
    /// constructor alias matching (0.95 tier) actually needs.
    pub fn with_aliases(
        companies: impl IntoIterator<Item = (String, Option<String>, String, Vec<String>)>,
    ) -> Self {
        let mut by_name = HashMap::new();
        for (name, ticker, cik, aliases) in companies {
            by_name.insert(
                name.to_lowercase(),
                DirectoryCompany {
                    name,
                    ticker,
                    cik,
                    aliases,
                },
            );
        }
        Self { by_name }
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }
}

#[derive(Debug, Clone)]
pub struct CompanyMention {
    pub company_name: String,
    pub ticker: Option<String>,
    pub cik: String,
    pub confidence: f64,
    pub context: String,
}

/// Token-overlap ratio between two already-lowercased strings: shared tokens
/// divided by the larger token count. Cheap stand-in for a full fuzzy-string
/// dependency, adequate for company-name matching where word order rarely
/// varies ("Acme Corp" vs "Acme Corporation").
fn token_overlap(a: &str, b: &str) -> f64 {
    let a_tokens: Vec<&str> = a.split_whitespace().collect();
    let b_tokens: Vec<&str> = b.split_whitespace().collect();
    if a_tokens.is_empty() || b_tokens.is_empty() {
        return 0.0;
    }
    let shared = a_tokens.iter().filter(|t| b_tokens.contains(t)).count();
    shared as f64 / a_tokens.len().max(b_tokens.len()) as f64
}

const CONTEXT_WINDOW_CHARS: usize = 120;

/// Match-tier confidences (§4.D.1): exact canonical-name match, ticker
/// match (`$TICKER` or a standalone uppercase token), alias match, and a
/// fuzzy token-overlap match scaled into its own band below the other three.
const EXACT_NAME_CONFIDENCE: f64 = 0.99;
const TICKER_MATCH_CONFIDENCE: f64 = 0.98;
const ALIAS_MATCH_CONFIDENCE: f64 = 0.95;
const FUZZY_MATCH_MIN: f64 = 0.80;
const FUZZY_MATCH_MAX: f64 = 0.95;

/// Finds mentions of any directory company within `text`, keeping matches at
/// or above `fuzzy_threshold`. Tries, in order, an exact canonical-name
/// match, a ticker match, an alias match, and finally a fuzzy token-overlap
/// match — the first tier that hits wins (§4.D.1).
pub fn find_mentions(
    text: &str,
    directory: &CompanyDirectory,
    fuzzy_threshold: f64,
) -> Vec<CompanyMention> {
    let lower_text = text.to_lowercase();
    let mut mentions = Vec::new();

    for (lower_name, company) in &directory.by_name {
        if let Some(pos) = lower_text.find(lower_name.as_str()) {
            record_mention(&mut mentions, text, pos, lower_name.len(), company, EXACT_NAME_CONFIDENCE);
            continue;
        }

        if let Some(ticker) = &company.ticker {
            if let Some(m) = ticker_regex(ticker).and_then(|re| re.find(text)) {
                record_mention(&mut mentions, text, m.start(), m.len(), company, TICKER_MATCH_CONFIDENCE);
                continue;
            }
        }

        let alias_hit = company.aliases.iter().find_map(|alias| {
            let lower_alias = alias.to_lowercase();
            lower_text.find(lower_alias.as_str()).map(|pos| (pos, lower_alias.len()))
        });
        if let Some((pos, len)) = alias_hit {
            record_mention(&mut mentions, text, pos, len, company, ALIAS_MATCH_CONFIDENCE);
            continue;
        }

        // All named tiers failed; fall back to a coarser token-overlap pass
        // using the first significant word of the name as an anchor.
        let Some(anchor) = lower_name.split_whitespace().next() else {
            continue;
        };
        if anchor.len() < 4 {
            continue;
        }
        if let Some(pos) = lower_text.find(anchor) {
            let window_end = (pos + CONTEXT_WINDOW_CHARS).min(lower_text.len());
            let window = &lower_text[pos..window_end];
            let similarity = token_overlap(lower_name, window);
            if similarity >= fuzzy_threshold {
                let confidence = scale_fuzzy_confidence(similarity, fuzzy_threshold);
                record_mention(&mut mentions, text, pos, anchor.len(), company, confidence);
            }
        }
    }

    // Keep only the highest-confidence mention per company (dedup by CIK/name).
    let mut best: HashMap<String, CompanyMention> = HashMap::new();
    for mention in mentions {
        let key = if mention.cik.is_empty() {
            mention.company_name.clone()
        } else {
            mention.cik.clone()
        };
        best.entry(key)
            .and_modify(|existing| {
                if mention.confidence > existing.confidence {
                    *existing = mention.clone();
                }
            })
            .or_insert(mention);
    }
    best.into_values().collect()
}

/// Matches `$TICKER` or a standalone uppercase occurrence of `ticker` in the
/// original (non-lowercased) text — a bare lowercase substring match would
/// false-positive on ordinary English words that happen to equal a ticker.
fn ticker_regex(ticker: &str) -> Option<Regex> {
    let escaped = regex::escape(ticker);
    Regex::new(&format!(r"\${escaped}\b|(?:^|[^A-Za-z0-9]){escaped}(?:[^A-Za-z0-9]|$)")).ok()
}

/// Scales a raw token-overlap similarity in `[threshold, 1.0]` linearly into
/// the fuzzy-match confidence band (§4.D.1: "0.80-0.95, scaled linearly from
/// threshold to 1.0").
fn scale_fuzzy_confidence(similarity: f64, threshold: f64) -> f64 {
    if threshold >= 1.0 {
        return FUZZY_MATCH_MAX;
    }
    let t = ((similarity - threshold) / (1.0 - threshold)).clamp(0.0, 1.0);
    FUZZY_MATCH_MIN + t * (FUZZY_MATCH_MAX - FUZZY_MATCH_MIN)
}

fn record_mention(
    mentions: &mut Vec<CompanyMention>,
    text: &str,
    pos: usize,
    match_len: usize,
    company: &DirectoryCompany,
    confidence: f64,
) {
    let start = pos.saturating_sub(CONTEXT_WINDOW_CHARS / 2);
    let end = (pos + match_len + CONTEXT_WINDOW_CHARS / 2).min(text.len());
    let context = text
        .get(start.min(text.len())..end)
        .unwrap_or("")
        .to_string();
    mentions.push(CompanyMention {
        company_name: company.name.clone(),
        ticker: company.ticker.clone(),
        cik: company.cik.clone(),
        confidence,
        context,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_name_match_has_near_full_confidence() {
        let directory = CompanyDirectory::new(vec![("Acme Corp".to_string(), Some("ACME".to_string()))]);
        let mentions = find_mentions("We rely heavily on Acme Corp as our primary supplier.", &directory, 0.8);
        assert_eq!(mentions.len(), 1);
        assert_eq!(mentions[0].confidence, 0.99);
        assert_eq!(mentions[0].ticker.as_deref(), Some("ACME"));
    }

    #[test]
    fn no_mention_found_in_unrelated_text() {
        let directory = CompanyDirectory::new(vec![("Acme Corp".to_string(), None)]);
        let mentions = find_mentions("Nothing relevant in this sentence.", &directory, 0.8);
        assert!(mentions.is_empty());
    }

    #[test]
    fn ticker_match_scores_below_exact_name() {
        let directory =
            CompanyDirectory::with_ciks(vec![("Acme Corporation".to_string(), Some("ACME".to_string()), "0001".to_string())]);
        let mentions = find_mentions("Our largest supplier is $ACME, per the agreement.", &directory, 0.8);
        assert_eq!(mentions.len(), 1);
        assert_eq!(mentions[0].confidence, 0.98);
        assert_eq!(mentions[0].cik, "0001");
    }

    #[test]
    fn alias_match_scores_below_ticker() {
        let directory = CompanyDirectory::with_aliases(vec![(
            "Acme Corporation".to_string(),
            None,
            "0001".to_string(),
            vec!["Acme Co".to_string()],
        )]);
        let mentions = find_mentions("We have long purchased parts from Acme Co for resale.", &directory, 0.8);
        assert_eq!(mentions.len(), 1);
        assert_eq!(mentions[0].confidence, 0.95);
    }

    #[test]
    fn fuzzy_match_is_scaled_into_its_own_band() {
        let directory = CompanyDirectory::new(vec![("Acme Global Holdings".to_string(), None)]);
        let mentions = find_mentions("Acme Global has been a longstanding vendor.", &directory, 0.2);
        assert_eq!(mentions.len(), 1);
        assert!(mentions[0].confidence >= FUZZY_MATCH_MIN && mentions[0].confidence <= FUZZY_MATCH_MAX);
    }
}
