//! Form parsers (§4.C): one module per form family, each exposing a pure
//! `parse` function plus a `FormParser` registry entry. Every parser is
//! infallible at the API boundary — malformed or missing input becomes an
//! unavailable `Partial` with a warning, never a propagated `Result::Err`
//! (the "exceptions for non-fatal parser failures → result values" redesign
//! in §9).

mod def14a;
mod form4;
mod form8k;
mod key_persons;
mod narrative;
mod sc13;
mod xbrl;

pub use def14a::Def14ASummary;
pub use form4::{Form4Summary, InsiderSignal, InsiderTransaction, TransactionKind};
pub use form8k::{Form8KActivity, Form8KSummary, QuarterCount, summarize_activity as summarize_form8k_activity};
pub use key_persons::{DEFAULT_RECENCY_WINDOW_MONTHS, KeyPerson, KeyPersonsSummary, aggregate as aggregate_key_persons};
pub use narrative::NarrativeSummary;
pub use sc13::Sc13Summary;
pub use xbrl::{FinancialDataPoint, XbrlFacts};

use crate::domain::FormType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The result of attempting to parse one filing document: either the
/// extracted data plus zero or more non-fatal warnings, or an unavailable
/// result explaining why nothing could be extracted.
///
/// Every profile top-level key is one of these (§3 "every extractor key is
/// present with `available` ∈ {true, false} — missing is never allowed").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Partial<T> {
    pub data: Option<T>,
    pub available: bool,
    pub warnings: Vec<String>,
}

impl<T> Partial<T> {
    pub fn available(data: T) -> Self {
        Self {
            data: Some(data),
            available: true,
            warnings: Vec::new(),
        }
    }

    pub fn available_with_warnings(data: T, warnings: Vec<String>) -> Self {
        Self {
            data: Some(data),
            available: true,
            warnings,
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            data: None,
            available: false,
            warnings: vec![reason.into()],
        }
    }
}

/// Tagged union over every parser's output, so the registry can return a
/// uniform type regardless of which form a document is.
#[derive(Debug, Clone)]
pub enum ParsedDocument {
    Xbrl(XbrlFacts),
    Form4(Form4Summary),
    Sc13(Sc13Summary),
    Def14A(Def14ASummary),
    Form8K(Form8KSummary),
    Narrative(NarrativeSummary),
    KeyPersons(KeyPersonsSummary),
}

/// A registered parser for one form family.
pub trait FormParser: Send + Sync {
    fn form_type(&self) -> FormType;
    fn parse(&self, raw: &str) -> Partial<ParsedDocument>;
}

struct Xbrl;
impl FormParser for Xbrl {
    fn form_type(&self) -> FormType {
        FormType::Other("XBRL".to_string())
    }
    fn parse(&self, raw: &str) -> Partial<ParsedDocument> {
        xbrl::parse_company_facts_json(raw).map_partial(ParsedDocument::Xbrl)
    }
}

struct Form4;
impl FormParser for Form4 {
    fn form_type(&self) -> FormType {
        FormType::Form4
    }
    fn parse(&self, raw: &str) -> Partial<ParsedDocument> {
        form4::parse(raw).map_partial(ParsedDocument::Form4)
    }
}

struct Sc13 {
    is_13d: bool,
}
impl FormParser for Sc13 {
    fn form_type(&self) -> FormType {
        if self.is_13d {
            FormType::Sc13D
        } else {
            FormType::Sc13G
        }
    }
    fn parse(&self, raw: &str) -> Partial<ParsedDocument> {
        sc13::parse(raw, self.is_13d).map_partial(ParsedDocument::Sc13)
    }
}

struct Def14A;
impl FormParser for Def14A {
    fn form_type(&self) -> FormType {
        FormType::Def14A
    }
    fn parse(&self, raw: &str) -> Partial<ParsedDocument> {
        def14a::parse(raw).map_partial(ParsedDocument::Def14A)
    }
}

struct Form8K;
impl FormParser for Form8K {
    fn form_type(&self) -> FormType {
        FormType::Form8K
    }
    fn parse(&self, raw: &str) -> Partial<ParsedDocument> {
        form8k::parse(raw).map_partial(ParsedDocument::Form8K)
    }
}

struct Narrative10K;
impl FormParser for Narrative10K {
    fn form_type(&self) -> FormType {
        FormType::Form10K
    }
    fn parse(&self, raw: &str) -> Partial<ParsedDocument> {
        narrative::parse(raw).map_partial(ParsedDocument::Narrative)
    }
}

struct Narrative10Q;
impl FormParser for Narrative10Q {
    fn form_type(&self) -> FormType {
        FormType::Form10Q
    }
    fn parse(&self, raw: &str) -> Partial<ParsedDocument> {
        narrative::parse(raw).map_partial(ParsedDocument::Narrative)
    }
}

impl<T> Partial<T> {
    fn map_partial<U>(self, wrap: impl FnOnce(T) -> U) -> Partial<U> {
        Partial {
            data: self.data.map(wrap),
            available: self.available,
            warnings: self.warnings,
        }
    }
}

/// Builds the registry mapping each recognized form type to its parser.
/// `FormType::Other` values never match an entry here; the caller falls back
/// to `Partial::unavailable("unsupported form type")` (§9 plugin-registry
/// redesign — unsupported forms are routed, not rejected).
pub fn registry() -> HashMap<FormType, Box<dyn FormParser>> {
    let mut map: HashMap<FormType, Box<dyn FormParser>> = HashMap::new();
    map.insert(FormType::Form4, Box::new(Form4));
    map.insert(FormType::Sc13D, Box::new(Sc13 { is_13d: true }));
    map.insert(FormType::Sc13G, Box::new(Sc13 { is_13d: false }));
    map.insert(FormType::Def14A, Box::new(Def14A));
    map.insert(FormType::Form8K, Box::new(Form8K));
    map.insert(FormType::Form10K, Box::new(Narrative10K));
    map.insert(FormType::Form10Q, Box::new(Narrative10Q));
    map
}

/// Parses an XBRL company-facts payload directly (bypasses the form-type
/// registry, since it isn't keyed by a single filing's form tag).
pub fn parse_xbrl_facts(raw: &str) -> Partial<XbrlFacts> {
    xbrl::parse_company_facts_json(raw)
}

/// Typed per-document parse entry points, used by the aggregator's tasks
/// (§4.F) where the caller needs the concrete summary type rather than the
/// registry's `ParsedDocument` enum.
pub fn parse_form4(raw: &str) -> Partial<Form4Summary> {
    form4::parse(raw)
}

pub fn parse_sc13(raw: &str, is_13d: bool) -> Partial<Sc13Summary> {
    sc13::parse(raw, is_13d)
}

pub fn parse_def14a(raw: &str) -> Partial<Def14ASummary> {
    def14a::parse(raw)
}

pub fn parse_narrative(raw: &str) -> Partial<NarrativeSummary> {
    narrative::parse(raw)
}
