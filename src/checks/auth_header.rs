//! AuthHeaderCheck — SPF/DKIM/DMARC outcomes from `Authentication-Results`
//! (spec §4.H.1)

use std::sync::LazyLock;

use regex::Regex;

use crate::checks::PhishingCheck;
use crate::email::{AnalysisContext, ParsedEmail};
use crate::checks::CheckInputs;
use crate::models::CheckResult;

const PROTOCOLS: &[&str] = &["spf", "dkim", "dmarc"];

fn protocol_regex(proto: &str) -> Regex {
    Regex::new(&format!(r"{proto}=([a-z]+)")).expect("static pattern")
}

static SPF_RE: LazyLock<Regex> = LazyLock::new(|| protocol_regex("spf"));
static DKIM_RE: LazyLock<Regex> = LazyLock::new(|| protocol_regex("dkim"));
static DMARC_RE: LazyLock<Regex> = LazyLock::new(|| protocol_regex("dmarc"));

fn regex_for(proto: &str) -> &'static Regex {
    match proto {
        "spf" => &SPF_RE,
        "dkim" => &DKIM_RE,
        _ => &DMARC_RE,
    }
}

pub struct AuthHeaderCheck;

impl PhishingCheck for AuthHeaderCheck {
    fn name(&self) -> &'static str {
        "AuthHeaderCheck"
    }

    fn analyze(&self, email: &ParsedEmail, _ctx: &AnalysisContext, _inputs: &CheckInputs) -> Vec<CheckResult> {
        let Some(header) = email.authentication_results.as_deref() else {
            return Vec::new();
        };
        let lowered = header.to_ascii_lowercase();

        let mut results = Vec::new();
        for proto in PROTOCOLS {
            let Some(status) = regex_for(proto)
                .captures(&lowered)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_owned())
            else {
                continue;
            };

            match status.as_str() {
                "pass" | "neutral" => {}
                "fail" | "softfail" => results.push(CheckResult::new(
                    self.name(),
                    3,
                    format!("{proto} {status} — sender authentication failed"),
                )),
                "none" => results.push(CheckResult::new(self.name(), 3, format!("{proto} not found"))),
                "temperror" | "permerror" => results.push(CheckResult::new(
                    self.name(),
                    2,
                    format!("{proto} could not be verified"),
                )),
                _ => {}
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn email_with_auth(value: Option<&str>) -> ParsedEmail {
        ParsedEmail::new(
            None,
            "user@example.com".to_owned(),
            None,
            value.map(str::to_owned),
            None,
            None,
            None,
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            vec![],
        )
    }

    #[test]
    fn all_pass_yields_no_results() {
        let email = email_with_auth(Some("mx.google.com; spf=pass; dkim=pass; dmarc=pass"));
        let ctx = AnalysisContext::default();
        assert!(AuthHeaderCheck.analyze(&email, &ctx, &CheckInputs::default()).is_empty());
    }

    #[test]
    fn missing_header_yields_no_results() {
        let email = email_with_auth(None);
        let ctx = AnalysisContext::default();
        assert!(AuthHeaderCheck.analyze(&email, &ctx, &CheckInputs::default()).is_empty());
    }

    #[test]
    fn fail_emits_three_points_per_protocol() {
        let email = email_with_auth(Some("spf=fail; dkim=fail; dmarc=fail"));
        let ctx = AnalysisContext::default();
        let results = AuthHeaderCheck.analyze(&email, &ctx, &CheckInputs::default());
        assert_eq!(results.len(), 3);
        assert_eq!(results.iter().map(|r| r.points).sum::<u32>(), 9);
    }

    #[test]
    fn none_status_emits_not_found_reason() {
        let email = email_with_auth(Some("spf=none"));
        let ctx = AnalysisContext::default();
        let results = AuthHeaderCheck.analyze(&email, &ctx, &CheckInputs::default());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].points, 3);
        assert_eq!(results[0].reason, "spf not found");
    }

    #[test]
    fn temperror_emits_two_points() {
        let email = email_with_auth(Some("dkim=temperror"));
        let ctx = AnalysisContext::default();
        let results = AuthHeaderCheck.analyze(&email, &ctx, &CheckInputs::default());
        assert_eq!(results[0].points, 2);
    }
}
