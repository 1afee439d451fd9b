//! EDGAR client: rate-limited HTTP access to the SEC's submissions, XBRL
//! company-facts, and archive endpoints (§4.A).

mod client;
mod facts;
mod submissions;

pub use client::{EdgarClient, EdgarTransport};
pub use facts::{CompanyFacts, DataPoint, Fact, TaxonomyGroups};
pub use submissions::{
    Address, Addresses, FilingFile, FilingsData, FormerName, RecentFilings, Submission,
};
