//! Company submissions payload (`/submissions/CIK##########.json`), adapted
//! from the upstream client's `filings.rs`. Kept close to the original field
//! set — entity metadata plus the "recent filings" parallel-array table —
//! since the aggregator's fetch tasks (§4.F) consume the whole submission,
//! not just a filtered slice.

use crate::domain::{Cik, FilingReference, FormType, normalize_date};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Submission {
    pub cik: String,
    #[serde(rename = "entityType")]
    pub entity_type: String,
    pub sic: String,
    #[serde(rename = "sicDescription")]
    pub sic_description: String,
    pub name: String,
    pub tickers: Vec<String>,
    pub exchanges: Vec<Option<String>>,
    pub ein: Option<String>,
    pub description: Option<String>,
    pub website: Option<String>,
    pub category: Option<String>,
    #[serde(rename = "fiscalYearEnd")]
    pub fiscal_year_end: Option<String>,
    #[serde(rename = "stateOfIncorporation")]
    pub state_of_incorporation: String,
    pub addresses: Addresses,
    pub phone: String,
    #[serde(rename = "formerNames")]
    pub former_names: Vec<FormerName>,
    pub filings: FilingsData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Addresses {
    pub mailing: Address,
    pub business: Address,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Address {
    pub street1: String,
    pub street2: Option<String>,
    pub city: String,
    #[serde(rename = "stateOrCountry")]
    pub state_or_country: Option<String>,
    #[serde(rename = "zipCode")]
    pub zip_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FormerName {
    pub name: String,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilingsData {
    pub recent: RecentFilings,
    pub files: Vec<FilingFile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilingFile {
    pub name: String,
    #[serde(rename = "filingCount")]
    pub filing_count: u64,
    #[serde(rename = "filingFrom")]
    pub filing_from: String,
    #[serde(rename = "filingTo")]
    pub filing_to: String,
}

/// "Recent filings" table, represented by SEC as parallel arrays rather than
/// a list of objects. `extend` merges a continuation chunk's arrays onto the
/// end of this one, preserving index alignment.
#[derive(Debug, Clone, Deserialize)]
pub struct RecentFilings {
    #[serde(rename = "accessionNumber")]
    pub accession_number: Vec<String>,
    #[serde(rename = "filingDate")]
    pub filing_date: Vec<String>,
    #[serde(rename = "reportDate")]
    pub report_date: Option<Vec<String>>,
    #[serde(rename = "acceptanceDateTime")]
    pub acceptance_date_time: Vec<String>,
    pub act: Option<Vec<String>>,
    pub form: Vec<String>,
    #[serde(rename = "fileNumber")]
    pub file_number: Option<Vec<String>>,
    #[serde(rename = "filmNumber")]
    pub film_number: Option<Vec<String>>,
    pub items: Option<Vec<String>>,
    pub size: Vec<u64>,
    #[serde(rename = "isXBRL")]
    pub is_xbrl: Vec<i32>,
    #[serde(rename = "isInlineXBRL")]
    pub is_inline_xbrl: Vec<i32>,
    #[serde(rename = "primaryDocument")]
    pub primary_document: Vec<String>,
    #[serde(rename = "primaryDocDescription")]
    pub primary_doc_description: Option<Vec<String>>,
}

impl RecentFilings {
    pub fn len(&self) -> usize {
        self.accession_number.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accession_number.is_empty()
    }

    /// Appends a continuation chunk's rows onto this table, index for index.
    pub fn extend(&mut self, other: RecentFilings) {
        self.accession_number.extend(other.accession_number);
        self.filing_date.extend(other.filing_date);
        extend_optional_vec(&mut self.report_date, other.report_date, other.size.len());
        self.acceptance_date_time
            .extend(other.acceptance_date_time);
        extend_optional_vec(&mut self.act, other.act, other.size.len());
        self.form.extend(other.form);
        extend_optional_vec(&mut self.file_number, other.file_number, other.size.len());
        extend_optional_vec(&mut self.film_number, other.film_number, other.size.len());
        extend_optional_vec(&mut self.items, other.items, other.size.len());
        let size_len = other.size.len();
        self.size.extend(other.size);
        extend_optional_vec(
            &mut self.primary_doc_description,
            other.primary_doc_description,
            size_len,
        );
        self.is_xbrl.extend(other.is_xbrl);
        self.is_inline_xbrl.extend(other.is_inline_xbrl);
        self.primary_document.extend(other.primary_document);
    }

    /// Converts every row into a `FilingReference` for the company identified
    /// by `cik`. Rows with an unparseable filing date are skipped rather than
    /// failing the whole conversion.
    pub fn to_references(&self, cik: &Cik) -> Vec<FilingReference> {
        (0..self.len())
            .filter_map(|i| {
                let filed_date = normalize_date(&self.filing_date[i])?;
                let report_date = self
                    .report_date
                    .as_ref()
                    .and_then(|v| v.get(i))
                    .and_then(|d| normalize_date(d));
                Some(FilingReference {
                    cik: cik.clone(),
                    accession: self.accession_number[i].clone(),
                    form_type: FormType::parse_tag(&self.form[i]),
                    filed_date,
                    report_date,
                    primary_document_path: self.primary_document.get(i).cloned(),
                })
            })
            .collect()
    }
}

fn extend_optional_vec<T: Clone>(target: &mut Option<Vec<T>>, other: Option<Vec<T>>, _len: usize) {
    match (target.as_mut(), other) {
        (Some(t), Some(o)) => t.extend(o),
        (None, Some(o)) => *target = Some(o),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(accession: &str) -> RecentFilings {
        RecentFilings {
            accession_number: vec![accession.to_string()],
            filing_date: vec!["2024-01-01".to_string()],
            report_date: Some(vec!["2023-12-31".to_string()]),
            acceptance_date_time: vec!["2024-01-01T00:00:00.000Z".to_string()],
            act: Some(vec!["34".to_string()]),
            form: vec!["10-K".to_string()],
            file_number: None,
            film_number: None,
            items: None,
            size: vec![1000],
            is_xbrl: vec![1],
            is_inline_xbrl: vec![1],
            primary_document: vec!["doc.htm".to_string()],
            primary_doc_description: None,
        }
    }

    #[test]
    fn extend_appends_rows_in_order() {
        let mut base = sample("0000320193-24-000001");
        base.extend(sample("0000320193-23-000002"));
        assert_eq!(base.len(), 2);
        assert_eq!(base.accession_number[1], "0000320193-23-000002");
        assert_eq!(base.form[1], "10-K");
    }

    #[test]
    fn to_references_parses_form_type_and_dates() {
        let filings = sample("0000320193-24-000001");
        let cik = Cik::new("320193");
        let refs = filings.to_references(&cik);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].form_type, FormType::Form10K);
        assert_eq!(refs[0].accession, "0000320193-24-000001");
    }
}
