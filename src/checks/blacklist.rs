//! BlacklistCheck — domain blacklist membership (spec §4.H.3)
//!
//! The actual `checkDomains` lookup happens once per message in
//! [`crate::analyzer`]; this check only reads the resolved
//! [`crate::checks::CheckInputs::blacklisted_domains`] set.

use crate::checks::{CheckInputs, PhishingCheck};
use crate::email::{AnalysisContext, ParsedEmail};
use crate::models::CheckResult;

pub struct BlacklistCheck;

impl PhishingCheck for BlacklistCheck {
    fn name(&self) -> &'static str {
        "BlacklistCheck"
    }

    fn analyze(&self, _email: &ParsedEmail, _ctx: &AnalysisContext, inputs: &CheckInputs) -> Vec<CheckResult> {
        inputs
            .blacklisted_domains
            .iter()
            .map(|domain| {
                CheckResult::new(self.name(), 5, format!("Domain {domain} found in phishing blacklist"))
            })
            .collect()
    }
}

/// Collect the candidate domains a message should be checked against:
/// `fromDomain`, `returnPathDomain`, and every link domain, lowercased.
pub fn candidate_domains(email: &ParsedEmail, ctx: &AnalysisContext) -> Vec<String> {
    let mut domains = std::collections::BTreeSet::new();
    if !email.from_domain.is_empty() {
        domains.insert(email.from_domain.clone());
    }
    if let Some(return_path_domain) = &email.return_path_domain {
        domains.insert(return_path_domain.clone());
    }
    domains.extend(ctx.link_domains.iter().cloned());
    domains.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn email() -> ParsedEmail {
        ParsedEmail::new(
            None,
            "user@evil.example".to_owned(),
            None,
            None,
            None,
            None,
            None,
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            vec![],
        )
    }

    #[test]
    fn emits_five_points_per_blacklisted_domain() {
        let mut inputs = CheckInputs::default();
        inputs.blacklisted_domains.insert("evil.example".to_owned());
        inputs.blacklisted_domains.insert("also-evil.example".to_owned());

        let results = BlacklistCheck.analyze(&email(), &AnalysisContext::default(), &inputs);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.points == 5));
    }

    #[test]
    fn no_blacklisted_domains_yields_no_results() {
        let results = BlacklistCheck.analyze(&email(), &AnalysisContext::default(), &CheckInputs::default());
        assert!(results.is_empty());
    }

    #[test]
    fn candidate_domains_collects_from_return_path_and_links() {
        let email = ParsedEmail::new(
            None,
            "user@a.example".to_owned(),
            Some("bounce@b.example".to_owned()),
            None,
            None,
            None,
            None,
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            vec![],
        );
        let mut ctx = AnalysisContext::default();
        ctx.link_domains.insert("c.example".to_owned());

        let domains = candidate_domains(&email, &ctx);
        assert_eq!(domains, vec!["a.example", "b.example", "c.example"]);
    }
}
