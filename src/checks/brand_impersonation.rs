//! BrandImpersonationCheck — display name vs. sender domain mismatch
//! (spec §4.H.7)

use crate::checks::{CheckInputs, PhishingCheck};
use crate::email::{AnalysisContext, ParsedEmail};
use crate::models::{CheckResult, sender_email_from, sender_name_from};

pub struct BrandImpersonationCheck;

impl PhishingCheck for BrandImpersonationCheck {
    fn name(&self) -> &'static str {
        "BrandImpersonationCheck"
    }

    fn analyze(&self, email: &ParsedEmail, ctx: &AnalysisContext, inputs: &CheckInputs) -> Vec<CheckResult> {
        let display_name = sender_name_from(&email.from);
        if display_name.is_empty() {
            return Vec::new();
        }
        let Some(sender_email) = sender_email_from(&email.from) else {
            return Vec::new();
        };

        let words = display_name_words(&display_name);
        if words.is_empty() {
            return Vec::new();
        }

        let local_part = sender_email.split('@').next().unwrap_or("").to_ascii_lowercase();

        if words.iter().any(|w| email.from_domain.contains(w.as_str())) {
            return Vec::new();
        }
        if words.iter().any(|w| local_part.contains(w.as_str())) {
            return Vec::new();
        }

        let mut results = vec![CheckResult::new(
            self.name(),
            3,
            format!("Display name {display_name} does not match sender domain {}", email.from_domain),
        )];

        if !ctx.links.is_empty() {
            let any_link_matches = ctx
                .link_domains
                .iter()
                .any(|domain| words.iter().any(|w| domain.contains(w.as_str())));
            if !any_link_matches {
                results.push(CheckResult::new(
                    self.name(),
                    2,
                    format!("No links point to {display_name}"),
                ));
            }
        }

        if words.iter().any(|w| inputs.active_campaign_brands.contains(w)) {
            results.push(CheckResult::new(
                self.name(),
                2,
                format!("Active Safeonweb phishing campaign targets {display_name}"),
            ));
        }

        results
    }
}

/// Words of length >= 3, letters-only, lowercased.
fn display_name_words(display_name: &str) -> Vec<String> {
    display_name
        .split(|c: char| !c.is_alphabetic())
        .filter(|w| w.len() >= 3)
        .map(|w| w.to_ascii_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn email(from: &str) -> ParsedEmail {
        ParsedEmail::new(
            None,
            from.to_owned(),
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
    fn flags_mismatched_display_name_with_no_links() {
        let results = BrandImpersonationCheck.analyze(
            &email("\"ARGENTA\" <digipass@tradebulls.in>"),
            &AnalysisContext::default(),
            &CheckInputs::default(),
        );
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].points, 3);
        assert_eq!(
            results[0].reason,
            "Display name ARGENTA does not match sender domain tradebulls.in"
        );
    }

    #[test]
    fn campaign_boost_adds_two_points() {
        let mut inputs = CheckInputs::default();
        inputs.active_campaign_brands.insert("argenta".to_owned());

        let results = BrandImpersonationCheck.analyze(
            &email("\"ARGENTA\" <digipass@tradebulls.in>"),
            &AnalysisContext::default(),
            &inputs,
        );
        assert_eq!(results.len(), 2);
        assert_eq!(results.iter().map(|r| r.points).sum::<u32>(), 5);
    }

    #[test]
    fn personal_address_matching_display_name_is_not_impersonation() {
        let results = BrandImpersonationCheck.analyze(
            &email("\"John Smith\" <john.smith@gmail.com>"),
            &AnalysisContext::default(),
            &CheckInputs::default(),
        );
        assert!(results.is_empty());
    }

    #[test]
    fn display_name_matching_domain_is_not_impersonation() {
        let results = BrandImpersonationCheck.analyze(
            &email("\"PayPal\" <service@paypal.com>"),
            &AnalysisContext::default(),
            &CheckInputs::default(),
        );
        assert!(results.is_empty());
    }

    #[test]
    fn bare_address_with_no_display_name_is_skipped() {
        let results = BrandImpersonationCheck.analyze(
            &email("user@example.com"),
            &AnalysisContext::default(),
            &CheckInputs::default(),
        );
        assert!(results.is_empty());
    }
}
