//! LinkMismatchCheck — displayed URL vs. actual destination (spec §4.H.4)

use crate::checks::{CheckInputs, PhishingCheck};
use crate::domain::base_domain;
use crate::email::{AnalysisContext, Link, ParsedEmail};
use crate::models::CheckResult;

/// Base domains of well-known email service providers that rewrite
/// outbound links for click tracking. A mismatch against one of these is
/// structural, not malicious (spec §4.H.4, glossary "ESP tracking
/// domain").
const ESP_TRACKING_DOMAINS: &[&str] = &[
    "list-manage.com",    // Mailchimp
    "mailchimp.com",
    "mailjet.com",        // Mailjet
    "sendgrid.net",        // SendGrid
    "mandrillapp.com",    // Mandrill
    "mailgun.org",         // Mailgun
    "mailerlite.com",      // MailerLite
    "createsend.com",      // Campaign Monitor
    "cmail20.com",
    "constantcontact.com", // Constant Contact
    "ctctcdn.com",
    "hubspotlinks.com",    // HubSpot
    "hs-sites.com",
    "sendinblue.com",      // Brevo
    "brevo.com",
    "amazonses.com",       // Amazon SES
    "outlook.com",         // Microsoft Safe Links (safelinks.protection.outlook.com)
    "goo.gl",              // Google link shorteners
    "c.gle",
    "retarus.com",         // Retarus
    "proofpoint.com",      // Proofpoint
    "pphosted.com",
    "barracudanetworks.com", // Barracuda
    "mimecast.com",        // Mimecast
];

pub struct LinkMismatchCheck;

impl PhishingCheck for LinkMismatchCheck {
    fn name(&self) -> &'static str {
        "LinkMismatchCheck"
    }

    fn analyze(&self, email: &ParsedEmail, ctx: &AnalysisContext, inputs: &CheckInputs) -> Vec<CheckResult> {
        let sender_base = base_domain(&email.from_domain);

        ctx.links
            .iter()
            .filter(|link| looks_like_url(&link.display_text))
            .filter_map(|link| self.check_link(link, &sender_base, inputs))
            .collect()
    }
}

impl LinkMismatchCheck {
    fn check_link(&self, link: &Link, sender_base: &str, inputs: &CheckInputs) -> Option<CheckResult> {
        let href_host = extract_host(&link.href)?;
        let display_host = extract_host(&link.display_text)?;

        if is_malformed(&href_host) || is_malformed(&display_host) {
            return None;
        }

        let href_base = base_domain(&href_host);
        let display_base = base_domain(&display_host);

        if href_base == display_base {
            return None;
        }
        if ESP_TRACKING_DOMAINS.contains(&href_base.as_str()) {
            return None;
        }
        if inputs.trusted_link_domains.contains(&href_base) {
            return None;
        }
        if !sender_base.is_empty() && href_base == sender_base {
            return None;
        }

        Some(CheckResult::new(
            self.name(),
            4,
            format!("Link displays {display_host} but points to {href_host}"),
        ))
    }
}

/// A display-text string "looks like a URL" if it starts with a scheme or
/// contains a dot, has no whitespace, and is longer than 4 characters.
fn looks_like_url(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return true;
    }
    text.len() > 4 && text.contains('.') && !text.chars().any(char::is_whitespace)
}

/// Strip a leading quoted-printable `3D`/`3d` artifact, prepend `https://`
/// if there is no scheme, then extract the lowercased host.
fn extract_host(raw: &str) -> Option<String> {
    let stripped = raw.strip_prefix("3D").or_else(|| raw.strip_prefix("3d")).unwrap_or(raw);
    let with_scheme = if stripped.contains("://") {
        stripped.to_owned()
    } else {
        format!("https://{stripped}")
    };
    let without_scheme = with_scheme.split("://").nth(1).unwrap_or(&with_scheme);
    let host = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();
    if host.is_empty() { None } else { Some(host) }
}

/// A host is malformed if it has no dot, or any label contains characters
/// besides ASCII alphanumerics and hyphens.
fn is_malformed(host: &str) -> bool {
    if !host.contains('.') {
        return true;
    }
    host.split('.')
        .any(|label| label.is_empty() || !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'))
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

    fn ctx_with_link(href: &str, display_text: &str) -> AnalysisContext {
        let mut ctx = AnalysisContext::default();
        ctx.links.push(Link {
            href: href.to_owned(),
            display_text: display_text.to_owned(),
            domain: None,
        });
        ctx
    }

    #[test]
    fn flags_href_display_mismatch() {
        let ctx = ctx_with_link("https://evil-site.com/paypal-login", "https://paypal.com/verify");
        let results = LinkMismatchCheck.analyze(&email("user@other.example"), &ctx, &CheckInputs::default());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].points, 4);
    }

    #[test]
    fn matching_base_domains_emit_nothing() {
        let ctx = ctx_with_link("https://example.com/path", "https://example.com/other");
        let results = LinkMismatchCheck.analyze(&email("user@other.example"), &ctx, &CheckInputs::default());
        assert!(results.is_empty());
    }

    #[test]
    fn esp_tracking_domain_is_suppressed() {
        let ctx = ctx_with_link("https://list-manage.com/track", "https://example.com/offer");
        let results = LinkMismatchCheck.analyze(&email("marketing@example.com"), &ctx, &CheckInputs::default());
        assert!(results.is_empty());
    }

    #[test]
    fn trusted_link_domain_is_suppressed() {
        let ctx = ctx_with_link("https://cdn.example/track", "https://other.example/page");
        let mut inputs = CheckInputs::default();
        inputs.trusted_link_domains.insert("cdn.example".to_owned());
        let results = LinkMismatchCheck.analyze(&email("user@unrelated.example"), &ctx, &inputs);
        assert!(results.is_empty());
    }

    #[test]
    fn same_organization_as_sender_is_suppressed() {
        let ctx = ctx_with_link("https://mail.paypal.com/x", "https://paypal.com/y");
        let results = LinkMismatchCheck.analyze(&email("security@paypal.com"), &ctx, &CheckInputs::default());
        assert!(results.is_empty());
    }

    #[test]
    fn malformed_host_is_suppressed() {
        let ctx = ctx_with_link("https://not_a_host/a", "https://example.com/b");
        let results = LinkMismatchCheck.analyze(&email("user@other.example"), &ctx, &CheckInputs::default());
        assert!(results.is_empty());
    }

    #[test]
    fn display_text_not_looking_like_url_is_ignored() {
        let ctx = ctx_with_link("https://evil.example/a", "Click here");
        let results = LinkMismatchCheck.analyze(&email("user@other.example"), &ctx, &CheckInputs::default());
        assert!(results.is_empty());
    }

    #[test]
    fn strips_quoted_printable_3d_artifact() {
        let ctx = ctx_with_link("https://evil.example/a", "3Dhttps://paypal.com/b");
        let results = LinkMismatchCheck.analyze(&email("user@other.example"), &ctx, &CheckInputs::default());
        assert_eq!(results.len(), 1);
        assert!(results[0].reason.contains("paypal.com"));
    }
}
