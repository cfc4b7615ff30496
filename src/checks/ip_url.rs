//! IPURLCheck — bare-IP URLs in links or body text (spec §4.H.5)

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::checks::{CheckInputs, PhishingCheck};
use crate::email::{AnalysisContext, ParsedEmail};
use crate::models::CheckResult;

static IP_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://(?:\d{1,3}\.){3}\d{1,3}(?::\d+)?(?:/[^\s\x22\x27<>]*)?").unwrap()
});

const MAX_DISPLAY_LEN: usize = 60;

pub struct IPURLCheck;

impl PhishingCheck for IPURLCheck {
    fn name(&self) -> &'static str {
        "IPURLCheck"
    }

    fn analyze(&self, email: &ParsedEmail, ctx: &AnalysisContext, _inputs: &CheckInputs) -> Vec<CheckResult> {
        let from_links: Vec<String> = ctx
            .links
            .iter()
            .filter(|link| IP_URL_RE.is_match(&link.href))
            .map(|link| link.href.clone())
            .collect();

        let urls: BTreeSet<String> = if !from_links.is_empty() {
            from_links.into_iter().collect()
        } else if let Some(text) = &email.text_body {
            IP_URL_RE.find_iter(text).map(|m| m.as_str().to_owned()).collect()
        } else {
            BTreeSet::new()
        };

        urls.into_iter()
            .map(|url| CheckResult::new(self.name(), 4, format!("IP-address URL found: {}", truncate(&url))))
            .collect()
    }
}

fn truncate(url: &str) -> String {
    if url.chars().count() > MAX_DISPLAY_LEN {
        format!("{}…", url.chars().take(MAX_DISPLAY_LEN).collect::<String>())
    } else {
        url.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::Link;
    use chrono::{TimeZone, Utc};

    fn email_with_text(text: Option<&str>) -> ParsedEmail {
        ParsedEmail::new(
            None,
            "user@example.com".to_owned(),
            None,
            None,
            None,
            None,
            text.map(str::to_owned),
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            vec![],
        )
    }

    #[test]
    fn detects_ip_url_in_html_links() {
        let mut ctx = AnalysisContext::default();
        ctx.links.push(Link {
            href: "http://192.168.1.100/steal".to_owned(),
            display_text: "click".to_owned(),
            domain: Some("192.168.1.100".to_owned()),
        });
        let results = IPURLCheck.analyze(&email_with_text(None), &ctx, &CheckInputs::default());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].points, 4);
    }

    #[test]
    fn falls_back_to_text_body_when_no_html_hits() {
        let email = email_with_text(Some("Visit http://10.0.0.1/login now"));
        let results = IPURLCheck.analyze(&email, &AnalysisContext::default(), &CheckInputs::default());
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn does_not_fall_back_when_html_already_has_hits() {
        let mut ctx = AnalysisContext::default();
        ctx.links.push(Link {
            href: "http://192.168.1.100/a".to_owned(),
            display_text: "x".to_owned(),
            domain: None,
        });
        let email = email_with_text(Some("http://10.0.0.1/other"));
        let results = IPURLCheck.analyze(&email, &ctx, &CheckInputs::default());
        assert_eq!(results.len(), 1);
        assert!(results[0].reason.contains("192.168.1.100"));
    }

    #[test]
    fn truncates_long_urls() {
        let long_path = "a".repeat(80);
        let url = format!("http://192.168.1.1/{long_path}");
        let email = email_with_text(Some(&url));
        let results = IPURLCheck.analyze(&email, &AnalysisContext::default(), &CheckInputs::default());
        assert!(results[0].reason.ends_with('…'));
    }

    #[test]
    fn no_ip_urls_yields_no_results() {
        let email = email_with_text(Some("Visit https://example.com"));
        assert!(
            IPURLCheck
                .analyze(&email, &AnalysisContext::default(), &CheckInputs::default())
                .is_empty()
        );
    }
}
