//! Normalized email representation and derived analysis context
//!
//! [`ParsedEmail`] is the immutable input to the check pipeline
//! ([`crate::checks`]); [`AnalysisContext`] is derived from it once per
//! message and shared read-only across every check.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::extract_domain;

/// A normalized, decoded email ready for analysis.
///
/// Transfer-decoding of `html_body`/`text_body` has already happened by the
/// time this type is built (the IMAP fetch layer or the MIME parser did
/// it) — see [`crate::raw_headers`] and [`crate::mime`].
#[derive(Debug, Clone)]
pub struct ParsedEmail {
    /// Globally unique identifier. Falls back to a fresh UUID if the
    /// `Message-ID` header is missing.
    ///
    /// # Known limitation
    ///
    /// The UUID fallback makes verdict identity unstable across repeated
    /// scans of the same message — spec §9 leaves this undecided and the
    /// original system accepts it as-is.
    pub message_id: String,
    pub from: String,
    pub from_domain: String,
    pub return_path: Option<String>,
    pub return_path_domain: Option<String>,
    pub authentication_results: Option<String>,
    pub subject: Option<String>,
    pub html_body: Option<String>,
    pub text_body: Option<String>,
    pub received_date: DateTime<Utc>,
    /// Case-preserving header map, unfolded from RFC-2822 continuations
    /// (see [`crate::raw_headers::parse_raw_headers`]).
    pub headers: Vec<(String, String)>,
}

impl ParsedEmail {
    /// Build a `ParsedEmail` from already-decoded parts. `message_id_header`
    /// is the raw `Message-ID` header value, if present.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        message_id_header: Option<String>,
        from: String,
        return_path: Option<String>,
        authentication_results: Option<String>,
        subject: Option<String>,
        html_body: Option<String>,
        text_body: Option<String>,
        received_date: DateTime<Utc>,
        headers: Vec<(String, String)>,
    ) -> Self {
        let from_domain = extract_domain(&from).unwrap_or_default();
        let return_path_domain = return_path.as_deref().and_then(extract_domain);

        Self {
            message_id: message_id_header
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            from,
            from_domain,
            return_path,
            return_path_domain,
            authentication_results,
            subject,
            html_body,
            text_body,
            received_date,
            headers,
        }
    }

    /// Case-insensitive header lookup, first match wins.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A single `<a href="...">...</a>` extracted from an HTML body.
#[derive(Debug, Clone)]
pub struct Link {
    pub href: String,
    pub display_text: String,
    pub domain: Option<String>,
}

/// Derived, per-message analysis context.
///
/// Built once from [`ParsedEmail::html_body`] and shared read-only across
/// every [`crate::checks::PhishingCheck`]. If `html_body` is absent or
/// unparseable the context is simply empty — link extraction never fails
/// the analysis (spec §3 invariant).
#[derive(Debug, Clone, Default)]
pub struct AnalysisContext {
    pub links: Vec<Link>,
    pub link_domains: std::collections::BTreeSet<String>,
}

impl AnalysisContext {
    pub fn from(email: &ParsedEmail) -> Self {
        let Some(html) = email.html_body.as_deref() else {
            return Self::default();
        };

        let links = extract_links(html);
        let link_domains = links
            .iter()
            .filter_map(|l| l.domain.clone())
            .collect();

        Self {
            links,
            link_domains,
        }
    }
}

/// Tag-by-tag scan for `<a href="...">...</a>` elements.
///
/// Not a full HTML parser: it tolerates malformed markup by skipping
/// whatever it cannot confidently parse rather than failing, matching the
/// "never a fatal error" contract on [`AnalysisContext`].
fn extract_links(html: &str) -> Vec<Link> {
    let mut links = Vec::new();
    let bytes = html.as_bytes();
    let mut i = 0;

    while let Some(tag_start) = find_ci(bytes, i, b"<a") {
        let is_word_boundary = bytes
            .get(tag_start + 2)
            .map(|b| !b.is_ascii_alphanumeric())
            .unwrap_or(true);
        if !is_word_boundary {
            i = tag_start + 2;
            continue;
        }

        let Some(tag_end) = find_byte(bytes, tag_start, b'>') else {
            break;
        };
        let tag_source = &html[tag_start..=tag_end];

        let Some(href) = extract_attr(tag_source, "href") else {
            i = tag_end + 1;
            continue;
        };

        let Some(content_end) = find_ci(bytes, tag_end + 1, b"</a") else {
            i = tag_end + 1;
            continue;
        };

        let display_raw = &html[tag_end + 1..content_end];
        let display_text = strip_tags(display_raw).trim().to_owned();
        let domain = host_of(&href);

        links.push(Link {
            href,
            display_text,
            domain,
        });

        i = content_end + 3;
    }

    links
}

/// Extract `name="value"` or `name='value'` from a tag's source text,
/// case-insensitive on the attribute name.
fn extract_attr(tag_source: &str, name: &str) -> Option<String> {
    let lower = tag_source.to_ascii_lowercase();
    let needle = format!("{name}=");
    let mut search_from = 0;
    while let Some(rel) = lower[search_from..].find(&needle) {
        let pos = search_from + rel;
        let before_ok = tag_source[..pos]
            .chars()
            .last()
            .map(|c| c.is_whitespace() || c == '<')
            .unwrap_or(true);
        let value_start = pos + needle.len();
        if before_ok {
            let rest = &tag_source[value_start..];
            let quote = rest.chars().next();
            return match quote {
                Some(q @ ('"' | '\'')) => {
                    let rest = &rest[1..];
                    rest.find(q).map(|end| rest[..end].trim().to_owned())
                }
                _ => rest
                    .split_whitespace()
                    .next()
                    .map(|v| v.trim_end_matches('>').to_owned()),
            };
        }
        search_from = value_start;
    }
    None
}

/// Strip nested tags from anchor display text (e.g. `<b>text</b>`).
fn strip_tags(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;
    for ch in input.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out
}

fn strip_scheme(href: &str) -> String {
    href.split("://").nth(1).unwrap_or(href).to_owned()
}

fn host_of(href: &str) -> Option<String> {
    let without_scheme = strip_scheme(href);
    let host = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();
    if host.is_empty() { None } else { Some(host) }
}

fn find_byte(haystack: &[u8], from: usize, needle: u8) -> Option<usize> {
    haystack[from..].iter().position(|&b| b == needle).map(|p| from + p)
}

fn find_ci(haystack: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    if from > haystack.len() || needle.is_empty() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle))
        .map(|p| from + p)
}

/// Convert header tuples into a lowercase-keyed map (first value wins).
pub fn header_map(headers: &[(String, String)]) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for (k, v) in headers {
        map.entry(k.to_ascii_lowercase()).or_insert_with(|| v.clone());
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn email_with_html(html: &str) -> ParsedEmail {
        ParsedEmail::new(
            None,
            "user@example.com".to_owned(),
            None,
            None,
            None,
            Some(html.to_owned()),
            None,
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            vec![],
        )
    }

    #[test]
    fn message_id_falls_back_to_uuid_when_missing() {
        let email = email_with_html("");
        assert_eq!(email.message_id.len(), 36);
    }

    #[test]
    fn extracts_single_link() {
        let email = email_with_html(r#"<a href="https://example.com/a">Click here</a>"#);
        let ctx = AnalysisContext::from(&email);
        assert_eq!(ctx.links.len(), 1);
        assert_eq!(ctx.links[0].href, "https://example.com/a");
        assert_eq!(ctx.links[0].display_text, "Click here");
        assert_eq!(ctx.links[0].domain.as_deref(), Some("example.com"));
    }

    #[test]
    fn extracts_multiple_links_and_dedups_domains() {
        let email = email_with_html(
            r#"<a href="https://a.example.com/x">one</a><a href="https://a.example.com/y">two</a>"#,
        );
        let ctx = AnalysisContext::from(&email);
        assert_eq!(ctx.links.len(), 2);
        assert_eq!(ctx.link_domains.len(), 1);
    }

    #[test]
    fn empty_html_yields_empty_context() {
        let email = email_with_html("");
        let ctx = AnalysisContext::from(&email);
        assert!(ctx.links.is_empty());
    }

    #[test]
    fn missing_html_body_yields_empty_context() {
        let mut email = email_with_html("<a href=\"https://x.com\">x</a>");
        email.html_body = None;
        let ctx = AnalysisContext::from(&email);
        assert!(ctx.links.is_empty());
    }
}
