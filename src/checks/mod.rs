//! The phishing-detection check pipeline (spec §3, §4.E–§4.H)
//!
//! Every check implements [`PhishingCheck`] and is stateless; IMAP
//! session and store state never leak into a check — [`crate::analyzer`]
//! resolves everything a check needs to look up (blacklist membership,
//! trusted-link-domain membership, active campaign brands) into a
//! [`CheckInputs`] snapshot before running the fixed check order, since
//! store access is async and the pipeline itself is not.

pub mod auth_header;
pub mod blacklist;
pub mod brand_impersonation;
pub mod ip_url;
pub mod link_mismatch;
pub mod return_path;
pub mod suspicious_tld;

use std::collections::BTreeSet;

use crate::email::{AnalysisContext, ParsedEmail};
use crate::models::CheckResult;

/// Store-backed facts resolved once per message before the check pipeline
/// runs (spec §4.H: BlacklistCheck collects all candidate domains and
/// performs a single `checkDomains` call; LinkMismatchCheck and
/// BrandImpersonationCheck likewise need single-shot store answers).
#[derive(Debug, Clone, Default)]
pub struct CheckInputs {
    /// Subset of `{fromDomain, returnPathDomain, linkDomains...}` that are
    /// on the blacklist.
    pub blacklisted_domains: BTreeSet<String>,
    /// Base domains of link hrefs that are in `TrustedLinkDomainStore`.
    pub trusted_link_domains: BTreeSet<String>,
    /// Lowercased brand names with an active Safeonweb campaign.
    pub active_campaign_brands: BTreeSet<String>,
}

/// A single heuristic in the phishing-detection pipeline.
///
/// `analyze` never fails: a check that cannot reach external state (e.g.
/// a store lookup) treats that as "no finding" rather than propagating an
/// error, so one check's trouble never blocks the rest of the pipeline.
pub trait PhishingCheck {
    fn name(&self) -> &'static str;

    fn analyze(&self, email: &ParsedEmail, ctx: &AnalysisContext, inputs: &CheckInputs) -> Vec<CheckResult>;
}
