//! Relationship extractor (§4.D): finds mentions of other known companies
//! in a filing's narrative text, classifies what kind of relationship each
//! mention describes, and separately extracts customer-concentration
//! figures into an HHI summary.

mod context;
mod financial;
mod mentions;

use chrono::NaiveDate;

pub use context::RelationshipType;
pub use financial::{
    ConcentrationLevel, CustomerConcentration, SupplierMention, classify_concentration,
    extract_customer_concentration, extract_suppliers, herfindahl_hirschman_index,
    top5_concentration_ratio,
};
pub use mentions::{CompanyDirectory, CompanyMention, DirectoryCompany, find_mentions};

/// Per-company financial-relationship record (§4.D.3), upserted keyed by `cik`.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct FinancialRelationships {
    pub cik: String,
    pub top_customers: Vec<CustomerConcentration>,
    pub suppliers: Vec<SupplierMention>,
    pub concentration_hhi: Option<f64>,
    pub concentration_level: Option<ConcentrationLevel>,
    pub top5_concentration_ratio: Option<f64>,
}

/// Runs the financial-relationship sub-extractor (§4.D.3) over one company's
/// narrative text, computing concentration metrics over whatever customer
/// percentages were found.
pub fn extract_financial_relationships(cik: &str, narrative_text: &str) -> FinancialRelationships {
    let top_customers = extract_customer_concentration(narrative_text);
    let suppliers = extract_suppliers(narrative_text);

    if top_customers.is_empty() {
        return FinancialRelationships {
            cik: cik.to_string(),
            suppliers,
            ..Default::default()
        };
    }

    let percentages: Vec<f64> = top_customers.iter().map(|c| c.percent_of_revenue).collect();
    let hhi = herfindahl_hirschman_index(&percentages);

    FinancialRelationships {
        cik: cik.to_string(),
        top_customers,
        suppliers,
        concentration_hhi: Some(hhi),
        concentration_level: Some(classify_concentration(hhi)),
        top5_concentration_ratio: Some(top5_concentration_ratio(&percentages)),
    }
}

/// One edge in the company relationship graph: `from` is the filer, `to` is
/// the mentioned company, scored by how confident both the mention match and
/// the relationship-type classification are.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RelationshipEdge {
    pub from_cik: String,
    pub to_cik: String,
    pub to_company: String,
    pub to_ticker: Option<String>,
    pub relationship_type: RelationshipType,
    pub confidence: f64,
    pub source_accession: String,
    /// Number of source mentions folded into this edge. Starts at 1 per
    /// extraction; the store increments it on upsert of an already-known
    /// `(from_cik, to_cik, relationship_type)` triple (§4.H).
    pub mention_count: u32,
    /// Filed date of the first source filing this edge was ever seen in;
    /// never changed once set.
    pub first_mentioned: NaiveDate,
    /// Filed date of the most recent source filing this edge was seen in;
    /// the store extends this forward on upsert, never backward (§4.D
    /// "extend `last_mentioned`").
    pub last_mentioned: NaiveDate,
}

/// Runs the full mention-then-classify pipeline over one filing's narrative
/// text, keeping only edges whose combined confidence clears
/// `min_confidence`.
pub fn extract_relationships(
    from_cik: &str,
    narrative_text: &str,
    directory: &CompanyDirectory,
    source_accession: &str,
    filed_date: NaiveDate,
    fuzzy_threshold: f64,
    min_confidence: f64,
) -> Vec<RelationshipEdge> {
    find_mentions(narrative_text, directory, fuzzy_threshold)
        .into_iter()
        .filter(|mention| mention.cik != from_cik)
        .filter_map(|mention| {
            let (relationship_type, type_confidence) = context::classify(&mention.context)?;
            let combined = mention.confidence * type_confidence;
            if combined < min_confidence {
                return None;
            }
            Some(RelationshipEdge {
                from_cik: from_cik.to_string(),
                to_cik: mention.cik,
                to_company: mention.company_name,
                to_ticker: mention.ticker,
                relationship_type,
                confidence: combined,
                source_accession: source_accession.to_string(),
                mention_count: 1,
                first_mentioned: filed_date,
                last_mentioned: filed_date,
            })
        })
        .collect()
}
