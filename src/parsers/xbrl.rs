//! XBRL facts parser (§4.C.1): turns a company-facts payload into a small
//! set of named financial time series, picking each metric's first matching
//! tag out of a fallback chain.
//!
//! The fallback-chain idea is grounded on the GAAP field-mapping table used
//! by the pack's concurrent-extraction example, which keeps a list of
//! alternate tag names per metric (e.g. revenue reported under
//! `RevenueFromContractWithCustomerExcludingAssessedTax` in newer filings,
//! `SalesRevenueNet` or bare `Revenues` in older ones) and walks it in order.

use super::Partial;
use crate::edgar::{CompanyFacts, DataPoint};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialDataPoint {
    pub period_end: NaiveDate,
    pub value: f64,
    pub fiscal_year: Option<i32>,
    pub fiscal_period: Option<String>,
    pub form: String,
    pub accession: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct XbrlFacts {
    pub revenue: Vec<FinancialDataPoint>,
    pub net_income: Vec<FinancialDataPoint>,
    pub total_assets: Vec<FinancialDataPoint>,
    pub total_liabilities: Vec<FinancialDataPoint>,
    pub equity: Vec<FinancialDataPoint>,
    pub cash: Vec<FinancialDataPoint>,
    pub operating_income: Vec<FinancialDataPoint>,
    pub current_assets: Vec<FinancialDataPoint>,
    pub current_liabilities: Vec<FinancialDataPoint>,
    pub long_term_debt: Vec<FinancialDataPoint>,
    pub gross_profit: Vec<FinancialDataPoint>,
    pub cost_of_revenue: Vec<FinancialDataPoint>,
    pub operating_cash_flow: Vec<FinancialDataPoint>,
    pub eps_diluted: Vec<FinancialDataPoint>,
}

/// Per-metric fallback chains, ordered most-specific/modern tag first
/// (§4.C.1's 12 recognized metrics, plus the two extra series the engine
/// carries for reference: operating cash flow and diluted EPS).
const REVENUE_TAGS: &[&str] = &[
    "RevenueFromContractWithCustomerExcludingAssessedTax",
    "RevenueFromContractWithCustomerIncludingAssessedTax",
    "SalesRevenueNet",
    "Revenues",
];
const NET_INCOME_TAGS: &[&str] = &["NetIncomeLoss", "ProfitLoss"];
const ASSETS_TAGS: &[&str] = &["Assets"];
const LIABILITIES_TAGS: &[&str] = &["Liabilities"];
const EQUITY_TAGS: &[&str] = &[
    "StockholdersEquity",
    "StockholdersEquityIncludingPortionAttributableToNoncontrollingInterest",
];
const CASH_TAGS: &[&str] = &[
    "CashAndCashEquivalentsAtCarryingValue",
    "CashAndCashEquivalentsAtCarryingValueIncludingDiscontinuedOperations",
];
const OPERATING_INCOME_TAGS: &[&str] = &["OperatingIncomeLoss"];
const CURRENT_ASSETS_TAGS: &[&str] = &["AssetsCurrent"];
const CURRENT_LIABILITIES_TAGS: &[&str] = &["LiabilitiesCurrent"];
const LONG_TERM_DEBT_TAGS: &[&str] = &["LongTermDebtNoncurrent", "LongTermDebt"];
const GROSS_PROFIT_TAGS: &[&str] = &["GrossProfit"];
const COST_OF_REVENUE_TAGS: &[&str] = &[
    "CostOfRevenue",
    "CostOfGoodsAndServicesSold",
    "CostOfGoodsSold",
];
const OPERATING_CASH_FLOW_TAGS: &[&str] = &["NetCashProvidedByUsedInOperatingActivities"];
const EPS_DILUTED_TAGS: &[&str] = &["EarningsPerShareDiluted"];

pub(super) fn parse_company_facts_json(raw: &str) -> Partial<XbrlFacts> {
    let facts: CompanyFacts = match serde_json::from_str(raw) {
        Ok(f) => f,
        Err(e) => return Partial::unavailable(format!("invalid company facts JSON: {e}")),
    };

    let mut warnings = Vec::new();
    let mut result = XbrlFacts::default();

    result.revenue = extract_series(&facts, REVENUE_TAGS, "revenue", &mut warnings);
    result.net_income = extract_series(&facts, NET_INCOME_TAGS, "net income", &mut warnings);
    result.total_assets = extract_series(&facts, ASSETS_TAGS, "total assets", &mut warnings);
    result.total_liabilities =
        extract_series(&facts, LIABILITIES_TAGS, "total liabilities", &mut warnings);
    result.equity = extract_series(&facts, EQUITY_TAGS, "equity", &mut warnings);
    result.cash = extract_series(&facts, CASH_TAGS, "cash", &mut warnings);
    result.operating_income =
        extract_series(&facts, OPERATING_INCOME_TAGS, "operating income", &mut warnings);
    result.current_assets =
        extract_series(&facts, CURRENT_ASSETS_TAGS, "current assets", &mut warnings);
    result.current_liabilities = extract_series(
        &facts,
        CURRENT_LIABILITIES_TAGS,
        "current liabilities",
        &mut warnings,
    );
    result.long_term_debt =
        extract_series(&facts, LONG_TERM_DEBT_TAGS, "long-term debt", &mut warnings);
    result.gross_profit = extract_series(&facts, GROSS_PROFIT_TAGS, "gross profit", &mut warnings);
    result.cost_of_revenue =
        extract_series(&facts, COST_OF_REVENUE_TAGS, "cost of revenue", &mut warnings);
    result.operating_cash_flow = extract_series(
        &facts,
        OPERATING_CASH_FLOW_TAGS,
        "operating cash flow",
        &mut warnings,
    );
    result.eps_diluted = extract_series(&facts, EPS_DILUTED_TAGS, "diluted EPS", &mut warnings);

    if result.revenue.is_empty()
        && result.net_income.is_empty()
        && result.total_assets.is_empty()
    {
        return Partial::unavailable("no recognized XBRL financial tags found");
    }

    Partial::available_with_warnings(result, warnings)
}

fn extract_series(
    facts: &CompanyFacts,
    tags: &[&str],
    metric_name: &str,
    warnings: &mut Vec<String>,
) -> Vec<FinancialDataPoint> {
    match facts.taxonomies.find_first(tags) {
        Some((_, fact)) => fact
            .units
            .get("USD")
            .or_else(|| fact.units.get("USD/shares"))
            .or_else(|| fact.units.values().next())
            .map(|points| dedup_latest_filed(points))
            .unwrap_or_default(),
        None => {
            warnings.push(format!("no tag in fallback chain matched for {metric_name}"));
            Vec::new()
        }
    }
}

/// Resolves duplicate `period_end` values to the entry from the
/// **latest-filed** source filing (§4.C.1), then returns the series ordered
/// ascending by period end (§3 "all period maps ordered ascending").
fn dedup_latest_filed(points: &[DataPoint]) -> Vec<FinancialDataPoint> {
    let mut best: HashMap<NaiveDate, &DataPoint> = HashMap::new();
    for point in points {
        let Some(period_end) = crate::domain::normalize_date(&point.end) else {
            continue;
        };
        match best.get(&period_end) {
            Some(existing) if existing.filed >= point.filed => {}
            _ => {
                best.insert(period_end, point);
            }
        }
    }
    let mut result: Vec<FinancialDataPoint> =
        best.into_values().filter_map(to_financial_point).collect();
    result.sort_by_key(|p| p.period_end);
    result
}

fn to_financial_point(point: &DataPoint) -> Option<FinancialDataPoint> {
    Some(FinancialDataPoint {
        period_end: crate::domain::normalize_date(&point.end)?,
        value: point.as_f64()?,
        fiscal_year: point.fy,
        fiscal_period: point.fp.clone(),
        form: point.form.clone(),
        accession: point.accn.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> String {
        serde_json::json!({
            "cik": 320193,
            "entityName": "Apple Inc.",
            "facts": {
                "us-gaap": {
                    "SalesRevenueNet": {
                        "label": "Revenue",
                        "units": {
                            "USD": [
                                {"end": "2023-12-31", "val": 1000000, "accn": "0000320193-24-000001", "fy": 2024, "fp": "FY", "form": "10-K", "filed": "2024-01-01"}
                            ]
                        }
                    },
                    "NetIncomeLoss": {
                        "units": {
                            "USD": [
                                {"end": "2023-12-31", "val": 200000, "accn": "0000320193-24-000001", "fy": 2024, "fp": "FY", "form": "10-K", "filed": "2024-01-01"}
                            ]
                        }
                    }
                },
                "dei": {}
            }
        })
        .to_string()
    }

    #[test]
    fn extracts_revenue_via_fallback_chain() {
        let result = parse_company_facts_json(&fixture());
        assert!(result.available);
        let facts = result.data.unwrap();
        assert_eq!(facts.revenue.len(), 1);
        assert_eq!(facts.revenue[0].value, 1000000.0);
        assert_eq!(facts.net_income[0].value, 200000.0);
        assert!(facts.total_assets.is_empty());
    }

    #[test]
    fn invalid_json_is_unavailable_not_an_error() {
        let result = parse_company_facts_json("not json");
        assert!(!result.available);
        assert!(result.data.is_none());
    }

    #[test]
    fn duplicate_period_end_resolves_to_latest_filed() {
        let raw = serde_json::json!({
            "cik": 320193,
            "entityName": "Apple Inc.",
            "facts": {
                "us-gaap": {
                    "SalesRevenueNet": {
                        "units": {
                            "USD": [
                                {"end": "2023-12-31", "val": 900000, "accn": "a1", "fy": 2024, "fp": "FY", "form": "10-K", "filed": "2024-01-01"},
                                {"end": "2023-12-31", "val": 1000000, "accn": "a2", "fy": 2024, "fp": "FY", "form": "10-K/A", "filed": "2024-03-01"}
                            ]
                        }
                    }
                },
                "dei": {}
            }
        })
        .to_string();

        let result = parse_company_facts_json(&raw);
        let facts = result.data.unwrap();
        assert_eq!(facts.revenue.len(), 1);
        assert_eq!(facts.revenue[0].value, 1000000.0);
        assert_eq!(facts.revenue[0].accession, "a2");
    }

    #[test]
    fn missing_all_known_tags_is_unavailable() {
        let empty = serde_json::json!({
            "cik": 1, "entityName": "X", "facts": {"us-gaap": {}, "dei": {}}
        })
        .to_string();
        let result = parse_company_facts_json(&empty);
        assert!(!result.available);
    }
}
