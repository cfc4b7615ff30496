//! SuspiciousTLDCheck — sender/link domains on known abused TLDs
//! (spec §4.H.6)

use std::collections::BTreeSet;

use crate::checks::{CheckInputs, PhishingCheck};
use crate::domain::tld;
use crate::email::{AnalysisContext, ParsedEmail};
use crate::models::CheckResult;

const SUSPICIOUS_TLDS: &[&str] = &[
    "tk", "ml", "ga", "cf", "gq", "xyz", "top", "club", "work", "buzz", "surf", "rest", "icu",
    "cam", "fit", "bid", "loan",
];

pub struct SuspiciousTLDCheck;

impl PhishingCheck for SuspiciousTLDCheck {
    fn name(&self) -> &'static str {
        "SuspiciousTLDCheck"
    }

    fn analyze(&self, email: &ParsedEmail, ctx: &AnalysisContext, _inputs: &CheckInputs) -> Vec<CheckResult> {
        let mut results = Vec::new();

        // "Sender domain" spans both the From and envelope return-path
        // domains: a forged From can still hide a suspicious-TLD return
        // path (spec §8 scenario 3).
        let mut sender_domains: Vec<&str> = vec![email.from_domain.as_str()];
        if let Some(return_path_domain) = email.return_path_domain.as_deref() {
            sender_domains.push(return_path_domain);
        }
        let mut seen_sender: BTreeSet<String> = BTreeSet::new();
        for domain in sender_domains {
            let lowered = domain.to_ascii_lowercase();
            if lowered.is_empty() || seen_sender.contains(&lowered) {
                continue;
            }
            if let Some(sender_tld) = tld(&lowered)
                && SUSPICIOUS_TLDS.contains(&sender_tld.as_str())
            {
                results.push(CheckResult::new(self.name(), 2, format!(".{sender_tld} in sender domain")));
                seen_sender.insert(lowered);
            }
        }

        let mut seen: BTreeSet<String> = BTreeSet::new();
        for domain in &ctx.link_domains {
            let lowered = domain.to_ascii_lowercase();
            if seen.contains(&lowered) {
                continue;
            }
            if let Some(link_tld) = tld(&lowered)
                && SUSPICIOUS_TLDS.contains(&link_tld.as_str())
            {
                results.push(CheckResult::new(self.name(), 2, format!(".{link_tld} in link domain")));
                seen.insert(lowered);
            }
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn email(from: &str) -> ParsedEmail {
        email_with_return_path(from, None)
    }

    fn email_with_return_path(from: &str, return_path: Option<&str>) -> ParsedEmail {
        ParsedEmail::new(
            None,
            from.to_owned(),
            return_path.map(str::to_owned),
            None,
            None,
            None,
            None,
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            vec![],
        )
    }

    #[test]
    fn flags_suspicious_sender_tld() {
        let results = SuspiciousTLDCheck.analyze(
            &email("user@phish.xyz"),
            &AnalysisContext::default(),
            &CheckInputs::default(),
        );
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].points, 2);
    }

    #[test]
    fn flags_suspicious_link_domains() {
        let mut ctx = AnalysisContext::default();
        ctx.link_domains.insert("bad.top".to_owned());
        ctx.link_domains.insert("other.club".to_owned());

        let results = SuspiciousTLDCheck.analyze(&email("user@example.com"), &ctx, &CheckInputs::default());
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn flags_suspicious_return_path_tld() {
        let results = SuspiciousTLDCheck.analyze(
            &email_with_return_path("security@paypal.com", Some("x@evil.xyz")),
            &AnalysisContext::default(),
            &CheckInputs::default(),
        );
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].reason, ".xyz in sender domain");
    }

    #[test]
    fn safe_tlds_yield_no_results() {
        let results = SuspiciousTLDCheck.analyze(
            &email("user@example.com"),
            &AnalysisContext::default(),
            &CheckInputs::default(),
        );
        assert!(results.is_empty());
    }
}
