//! Relationship-type classification (§4.D.2): given the text surrounding a
//! company mention, decides what kind of relationship it describes using a
//! fixed pattern bank, most-specific pattern first.

/// The canonical relationship-type set (§3 Data Model).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum RelationshipType {
    Supplier,
    Customer,
    Competitor,
    Partner,
    Investor,
    Subsidiary,
    Parent,
}

impl RelationshipType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::Supplier => "supplier",
            RelationshipType::Customer => "customer",
            RelationshipType::Competitor => "competitor",
            RelationshipType::Partner => "partner",
            RelationshipType::Investor => "investor",
            RelationshipType::Subsidiary => "subsidiary",
            RelationshipType::Parent => "parent",
        }
    }
}

/// Each entry is (type, confidence if matched, keyword list). Checked in
/// order; the first matching keyword wins, so more specific relationship
/// phrasing should be listed ahead of generic phrasing.
const PATTERN_BANK: &[(RelationshipType, f64, &[&str])] = &[
    (RelationshipType::Parent, 0.95, &["is the parent company of", "parent of"]),
    (RelationshipType::Subsidiary, 0.95, &["wholly owned subsidiary", "subsidiary of"]),
    (RelationshipType::Investor, 0.85, &["is an investor in", "equity investment in", "invested in us"]),
    (RelationshipType::Customer, 0.80, &["our customer", "accounted for", "purchased from us", "sold to"]),
    (RelationshipType::Supplier, 0.80, &["our supplier", "our vendor", "purchased from", "supply agreement with"]),
    (RelationshipType::Competitor, 0.75, &["our competitor", "compete with", "competes with us"]),
    (RelationshipType::Partner, 0.70, &["strategic partnership", "joint venture with", "strategic alliance"]),
];

/// Classifies the relationship type implied by `context`, returning the
/// matched type and the pattern bank's confidence for it, or `None` if no
/// pattern matched.
pub fn classify(context: &str) -> Option<(RelationshipType, f64)> {
    let lower = context.to_lowercase();
    PATTERN_BANK
        .iter()
        .find(|(_, _, keywords)| keywords.iter().any(|kw| lower.contains(kw)))
        .map(|(rel_type, confidence, _)| (*rel_type, *confidence))
}
