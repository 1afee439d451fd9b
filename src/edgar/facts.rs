//! XBRL company facts (`/api/xbrl/companyfacts/CIK##########.json`), adapted
//! from the upstream client's `company.rs`. Trimmed to the fields the XBRL
//! facts parser (§4.C.1) actually consumes — ticker lookups, mutual funds,
//! frames, and single-concept endpoints are out of scope here.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyFacts {
    pub cik: u64,
    #[serde(rename = "entityName")]
    pub entity_name: String,
    #[serde(rename = "facts")]
    pub taxonomies: TaxonomyGroups,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxonomyGroups {
    #[serde(rename = "us-gaap", default)]
    pub us_gaap: HashMap<String, Fact>,
    #[serde(default)]
    pub dei: HashMap<String, Fact>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fact {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub units: HashMap<String, Vec<DataPoint>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPoint {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    pub end: String,
    pub val: serde_json::Value,
    pub accn: String,
    #[serde(default)]
    pub fy: Option<i32>,
    #[serde(default)]
    pub fp: Option<String>,
    pub form: String,
    pub filed: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame: Option<String>,
}

impl DataPoint {
    /// Coerces `val` to `f64`, the shape every XBRL numeric fact actually
    /// uses; non-numeric facts (rare, mostly DEI text fields) return `None`.
    pub fn as_f64(&self) -> Option<f64> {
        self.val.as_f64()
    }
}

impl TaxonomyGroups {
    /// Looks up a concept by tag, trying each taxonomy in `tags` order and
    /// returning the first match. This is the mechanism behind the XBRL
    /// parser's per-metric fallback chains (§4.C.1).
    pub fn find_first<'a>(&'a self, tags: &[&str]) -> Option<(&'a str, &'a Fact)> {
        tags.iter().find_map(|&tag| {
            self.us_gaap
                .get(tag)
                .map(|f| (tag, f))
                .or_else(|| self.dei.get(tag).map(|f| (tag, f)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fact(values: &[(&str, f64)]) -> Fact {
        let mut units = HashMap::new();
        units.insert(
            "USD".to_string(),
            values
                .iter()
                .map(|(end, val)| DataPoint {
                    start: None,
                    end: end.to_string(),
                    val: serde_json::json!(val),
                    accn: "0000320193-24-000001".to_string(),
                    fy: Some(2024),
                    fp: Some("FY".to_string()),
                    form: "10-K".to_string(),
                    filed: "2024-01-01".to_string(),
                    frame: None,
                })
                .collect(),
        );
        Fact {
            label: None,
            description: None,
            units,
        }
    }

    #[test]
    fn find_first_walks_fallback_chain_in_order() {
        let mut taxonomy = TaxonomyGroups {
            us_gaap: HashMap::new(),
            dei: HashMap::new(),
        };
        taxonomy
            .us_gaap
            .insert("SalesRevenueNet".to_string(), fact(&[("2024-01-01", 100.0)]));

        let found = taxonomy.find_first(&[
            "RevenueFromContractWithCustomerExcludingAssessedTax",
            "SalesRevenueNet",
            "Revenues",
        ]);
        assert_eq!(found.unwrap().0, "SalesRevenueNet");
    }

    #[test]
    fn find_first_returns_none_when_no_tag_matches() {
        let taxonomy = TaxonomyGroups {
            us_gaap: HashMap::new(),
            dei: HashMap::new(),
        };
        assert!(taxonomy.find_first(&["Revenues"]).is_none());
    }
}
