//! Key persons aggregator (§4.C.7): merges director/officer names out of
//! DEF 14A filings and reporting-person names out of Form 4 filings into one
//! deduplicated roster, keeping only people mentioned within a recency
//! window.
//!
//! §9's open question on the exact recency window is resolved in
//! `DESIGN.md` as 24 months, matching the upstream pack's general
//! "trailing two fiscal years" framing for insider activity.

use super::{Def14ASummary, Form4Summary};
use chrono::{Datelike, NaiveDate};
use std::collections::HashMap;

pub const DEFAULT_RECENCY_WINDOW_MONTHS: u32 = 24;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct KeyPerson {
    pub name: String,
    pub roles: Vec<String>,
    pub mention_count: usize,
    pub most_recent_mention: NaiveDate,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct KeyPersonsSummary {
    pub people: Vec<KeyPerson>,
}

struct Mention<'a> {
    name: &'a str,
    role: &'a str,
    date: NaiveDate,
}

/// Aggregates key-person mentions as of `as_of`, dropping anyone whose most
/// recent mention falls outside `recency_window_months`.
pub fn aggregate(
    def14a_filings: &[(Def14ASummary, NaiveDate)],
    form4_filings: &[(Form4Summary, NaiveDate)],
    as_of: NaiveDate,
    recency_window_months: u32,
) -> KeyPersonsSummary {
    let mut mentions: Vec<Mention> = Vec::new();

    for (summary, filed_date) in def14a_filings {
        for name in &summary.directors {
            mentions.push(Mention {
                name,
                role: "Director",
                date: *filed_date,
            });
        }
        for name in &summary.executive_officers {
            mentions.push(Mention {
                name,
                role: "Executive Officer",
                date: *filed_date,
            });
        }
    }

    for (summary, filed_date) in form4_filings {
        for transaction in &summary.transactions {
            let role = if transaction.is_officer {
                "Officer"
            } else if transaction.is_director {
                "Director"
            } else if transaction.is_ten_percent_owner {
                "10% Owner"
            } else {
                "Reporting Person"
            };
            mentions.push(Mention {
                name: &transaction.reporting_person,
                role,
                date: *filed_date,
            });
        }
    }

    let cutoff = subtract_months(as_of, recency_window_months);

    let mut by_name: HashMap<&str, KeyPerson> = HashMap::new();
    for mention in &mentions {
        if mention.date < cutoff {
            continue;
        }
        let entry = by_name.entry(mention.name).or_insert_with(|| KeyPerson {
            name: mention.name.to_string(),
            roles: Vec::new(),
            mention_count: 0,
            most_recent_mention: mention.date,
        });
        if !entry.roles.iter().any(|r| r == mention.role) {
            entry.roles.push(mention.role.to_string());
        }
        entry.mention_count += 1;
        if mention.date > entry.most_recent_mention {
            entry.most_recent_mention = mention.date;
        }
    }

    let mut people: Vec<KeyPerson> = by_name.into_values().collect();
    people.sort_by(|a, b| b.most_recent_mention.cmp(&a.most_recent_mention).then(a.name.cmp(&b.name)));

    KeyPersonsSummary { people }
}

fn subtract_months(date: NaiveDate, months: u32) -> NaiveDate {
    let total_months = date.year() as i64 * 12 + date.month() as i64 - 1 - months as i64;
    let year = (total_months.div_euclid(12)) as i32;
    let month = (total_months.rem_euclid(12)) as u32 + 1;
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::form4::InsiderTransaction;

    fn def14a(directors: &[&str], officers: &[&str]) -> Def14ASummary {
        Def14ASummary {
            directors: directors.iter().map(|s| s.to_string()).collect(),
            executive_officers: officers.iter().map(|s| s.to_string()).collect(),
            say_on_pay_support_percent: None,
        }
    }

    fn form4(name: &str, is_officer: bool) -> Form4Summary {
        use crate::parsers::form4::TransactionKind;
        Form4Summary {
            issuer_name: None,
            transactions: vec![InsiderTransaction {
                reporting_person: name.to_string(),
                is_officer,
                is_director: false,
                is_ten_percent_owner: false,
                transaction_date: None,
                transaction_code: "S".to_string(),
                kind: TransactionKind::Sale,
                shares: 100.0,
                price_per_share: Some(10.0),
                acquired_or_disposed: 'D',
                is_large_transaction: false,
            }],
            net_shares: -100.0,
            net_value: -1000.0,
            signal: None,
        }
    }

    #[test]
    fn merges_director_and_form4_mentions_for_same_person() {
        let as_of = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let def14a_filings = vec![(def14a(&["Jane Smith"], &[]), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())];
        let form4_filings = vec![(form4("Jane Smith", false), NaiveDate::from_ymd_opt(2024, 4, 1).unwrap())];

        let summary = aggregate(&def14a_filings, &form4_filings, as_of, DEFAULT_RECENCY_WINDOW_MONTHS);
        assert_eq!(summary.people.len(), 1);
        assert_eq!(summary.people[0].mention_count, 2);
        assert!(summary.people[0].roles.contains(&"Director".to_string()));
    }

    #[test]
    fn drops_mentions_outside_recency_window() {
        let as_of = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let old_mention = vec![(def14a(&["Old Director"], &[]), NaiveDate::from_ymd_opt(2019, 1, 1).unwrap())];

        let summary = aggregate(&old_mention, &[], as_of, DEFAULT_RECENCY_WINDOW_MONTHS);
        assert!(summary.people.is_empty());
    }
}
