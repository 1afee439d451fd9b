//! Form 4 (insider transactions) parser (§4.C.2).
//!
//! Form 4 filings are submitted as flat, mostly non-nested XML. Rather than
//! pull in a full XML dependency for one form family, this walks the
//! document with `regex` the way the pack's HTML-era examples pull fields
//! out of semi-structured text: one pattern per tag, scoped to each
//! `<nonDerivativeTransaction>`/`<derivativeTransaction>` block.

use super::Partial;
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// A transaction is flagged "large" above this notional value, the signal
/// threshold the relationship extractor's financial-relationship pass reads
/// off of (§4.C.2, §4.D.3).
const LARGE_TRANSACTION_THRESHOLD_USD: f64 = 1_000_000.0;

/// Net-value bands for the insider signal (§4.C.2), in whole USD.
const STRONG_SIGNAL_THRESHOLD_USD: f64 = 1_000_000.0;
const SIGNAL_THRESHOLD_USD: f64 = 100_000.0;

/// SEC transaction-code family, collapsed to the kinds §4.C.2 names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    Purchase,
    Sale,
    OptionExercise,
    Award,
    Other,
}

impl TransactionKind {
    fn from_code(code: &str) -> Self {
        match code {
            "P" => TransactionKind::Purchase,
            "S" => TransactionKind::Sale,
            "M" => TransactionKind::OptionExercise,
            "A" | "G" => TransactionKind::Award,
            _ => TransactionKind::Other,
        }
    }
}

/// Net insider sentiment derived from net transaction value (§4.C.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InsiderSignal {
    StrongBullish,
    Bullish,
    Neutral,
    Bearish,
    StrongBearish,
}

impl InsiderSignal {
    pub fn from_net_value(net_value: f64) -> Self {
        if net_value > STRONG_SIGNAL_THRESHOLD_USD {
            InsiderSignal::StrongBullish
        } else if net_value > SIGNAL_THRESHOLD_USD {
            InsiderSignal::Bullish
        } else if net_value >= -SIGNAL_THRESHOLD_USD {
            InsiderSignal::Neutral
        } else if net_value >= -STRONG_SIGNAL_THRESHOLD_USD {
            InsiderSignal::Bearish
        } else {
            InsiderSignal::StrongBearish
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsiderTransaction {
    pub reporting_person: String,
    pub is_officer: bool,
    pub is_director: bool,
    pub is_ten_percent_owner: bool,
    pub transaction_date: Option<NaiveDate>,
    pub transaction_code: String,
    pub kind: TransactionKind,
    pub shares: f64,
    pub price_per_share: Option<f64>,
    pub acquired_or_disposed: char,
    pub is_large_transaction: bool,
}

impl InsiderTransaction {
    /// Signed notional value: positive for an acquisition, negative for a
    /// disposal. An option exercise (`M`) with no cash price reported
    /// contributes zero, per §4.C.2 — it still counts toward `net_shares`.
    fn signed_value(&self) -> f64 {
        let Some(price) = self.price_per_share else {
            return 0.0;
        };
        if self.kind == TransactionKind::OptionExercise && price == 0.0 {
            return 0.0;
        }
        let notional = self.shares * price;
        match self.acquired_or_disposed {
            'D' => -notional,
            _ => notional,
        }
    }

    fn signed_shares(&self) -> f64 {
        match self.acquired_or_disposed {
            'D' => -self.shares,
            _ => self.shares,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Form4Summary {
    pub issuer_name: Option<String>,
    pub transactions: Vec<InsiderTransaction>,
    pub net_shares: f64,
    pub net_value: f64,
    pub signal: Option<InsiderSignal>,
}

fn tag_regex(tag: &str) -> Regex {
    Regex::new(&format!(r"(?s)<{tag}[^>]*>\s*(?:<value>)?([^<]*?)(?:</value>)?\s*</{tag}>"))
        .expect("static tag pattern is valid")
}

fn extract(body: &str, tag: &str) -> Option<String> {
    tag_regex(tag)
        .captures(body)
        .map(|c| c[1].trim().to_string())
        .filter(|s| !s.is_empty())
}

fn transaction_blocks(body: &str) -> Vec<&str> {
    static BLOCK_RE: OnceLock<Regex> = OnceLock::new();
    let re = BLOCK_RE.get_or_init(|| {
        Regex::new(r"(?s)<(nonDerivativeTransaction|derivativeTransaction)>.*?</\1>").unwrap()
    });
    re.find_iter(body).map(|m| m.as_str()).collect()
}

pub(super) fn parse(raw: &str) -> Partial<Form4Summary> {
    let reporting_person = extract(raw, "rptOwnerName");
    let Some(reporting_person) = reporting_person else {
        return Partial::unavailable("no reporting owner name found");
    };

    let is_officer = extract(raw, "isOfficer").as_deref() == Some("1")
        || extract(raw, "isOfficer").as_deref() == Some("true");
    let is_director = extract(raw, "isDirector").as_deref() == Some("1")
        || extract(raw, "isDirector").as_deref() == Some("true");
    let is_ten_percent_owner = extract(raw, "isTenPercentOwner").as_deref() == Some("1")
        || extract(raw, "isTenPercentOwner").as_deref() == Some("true");
    let issuer_name = extract(raw, "issuerName");

    let mut warnings = Vec::new();
    let mut transactions = Vec::new();

    for block in transaction_blocks(raw) {
        let Some(code) = extract(block, "transactionCode") else {
            warnings.push("transaction block missing transactionCode".to_string());
            continue;
        };
        let Some(shares) = extract(block, "transactionShares").and_then(|s| s.parse().ok()) else {
            warnings.push(format!("transaction {code} missing share count"));
            continue;
        };
        let price_per_share = extract(block, "transactionPricePerShare").and_then(|s| s.parse().ok());
        let acquired_or_disposed = extract(block, "transactionAcquiredDisposedCode")
            .and_then(|s| s.chars().next())
            .unwrap_or('A');
        let transaction_date = extract(block, "transactionDate")
            .and_then(|d| crate::domain::normalize_date(&d));

        let is_large_transaction = price_per_share
            .map(|p| p * shares >= LARGE_TRANSACTION_THRESHOLD_USD)
            .unwrap_or(false);
        let kind = TransactionKind::from_code(&code);

        transactions.push(InsiderTransaction {
            reporting_person: reporting_person.clone(),
            is_officer,
            is_director,
            is_ten_percent_owner,
            transaction_date,
            transaction_code: code,
            kind,
            shares,
            price_per_share,
            acquired_or_disposed,
            is_large_transaction,
        });
    }

    if transactions.is_empty() {
        return Partial::unavailable("no parseable transactions in Form 4 document");
    }

    let net_shares: f64 = transactions.iter().map(InsiderTransaction::signed_shares).sum();
    let net_value: f64 = transactions.iter().map(InsiderTransaction::signed_value).sum();
    let signal = Some(InsiderSignal::from_net_value(net_value));

    Partial::available_with_warnings(
        Form4Summary {
            issuer_name,
            transactions,
            net_shares,
            net_value,
            signal,
        },
        warnings,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(shares: &str, price: &str) -> String {
        format!(
            r#"<ownershipDocument>
                <issuer><issuerName>Example Corp</issuerName></issuer>
                <reportingOwner>
                    <rptOwnerName>Jane Doe</rptOwnerName>
                    <reportingOwnerRelationship>
                        <isOfficer>1</isOfficer>
                        <isDirector>0</isDirector>
                        <isTenPercentOwner>0</isTenPercentOwner>
                    </reportingOwnerRelationship>
                </reportingOwner>
                <nonDerivativeTable>
                    <nonDerivativeTransaction>
                        <transactionDate><value>2024-03-01</value></transactionDate>
                        <transactionCoding><transactionCode>S</transactionCode></transactionCoding>
                        <transactionAmounts>
                            <transactionShares><value>{shares}</value></transactionShares>
                            <transactionPricePerShare><value>{price}</value></transactionPricePerShare>
                            <transactionAcquiredDisposedCode><value>D</value></transactionAcquiredDisposedCode>
                        </transactionAmounts>
                    </nonDerivativeTransaction>
                </nonDerivativeTable>
            </ownershipDocument>"#
        )
    }

    #[test]
    fn parses_a_single_sale_transaction() {
        let result = parse(&fixture("5000", "50.0"));
        assert!(result.available);
        let summary = result.data.unwrap();
        assert_eq!(summary.issuer_name.as_deref(), Some("Example Corp"));
        assert_eq!(summary.transactions.len(), 1);
        let tx = &summary.transactions[0];
        assert_eq!(tx.reporting_person, "Jane Doe");
        assert!(tx.is_officer);
        assert!(!tx.is_director);
        assert_eq!(tx.transaction_code, "S");
        assert_eq!(tx.acquired_or_disposed, 'D');
        assert!(!tx.is_large_transaction);
    }

    #[test]
    fn flags_large_transactions_above_threshold() {
        let result = parse(&fixture("50000", "50.0"));
        let summary = result.data.unwrap();
        assert!(summary.transactions[0].is_large_transaction);
    }

    #[test]
    fn missing_reporting_owner_is_unavailable() {
        let result = parse("<ownershipDocument></ownershipDocument>");
        assert!(!result.available);
    }

    #[test]
    fn net_value_and_signal_reflect_a_large_sale() {
        let result = parse(&fixture("50000", "50.0"));
        let summary = result.data.unwrap();
        assert_eq!(summary.net_value, -2_500_000.0);
        assert_eq!(summary.signal, Some(InsiderSignal::StrongBearish));
    }

    fn option_exercise_fixture() -> String {
        r#"<ownershipDocument>
            <issuer><issuerName>Example Corp</issuerName></issuer>
            <reportingOwner>
                <rptOwnerName>Jane Doe</rptOwnerName>
                <reportingOwnerRelationship>
                    <isOfficer>1</isOfficer>
                </reportingOwnerRelationship>
            </reportingOwner>
            <derivativeTable>
                <derivativeTransaction>
                    <transactionDate><value>2024-03-01</value></transactionDate>
                    <transactionCoding><transactionCode>M</transactionCode></transactionCoding>
                    <transactionAmounts>
                        <transactionShares><value>1000</value></transactionShares>
                        <transactionPricePerShare><value>0</value></transactionPricePerShare>
                        <transactionAcquiredDisposedCode><value>A</value></transactionAcquiredDisposedCode>
                    </transactionAmounts>
                </derivativeTransaction>
            </derivativeTable>
        </ownershipDocument>"#
            .to_string()
    }

    #[test]
    fn option_exercise_without_cash_price_is_neutral() {
        let result = parse(&option_exercise_fixture());
        let summary = result.data.unwrap();
        assert_eq!(summary.transactions[0].kind, TransactionKind::OptionExercise);
        assert_eq!(summary.net_value, 0.0);
        assert_eq!(summary.net_shares, 1000.0);
        assert_eq!(summary.signal, Some(InsiderSignal::Neutral));
    }
}
