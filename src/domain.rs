//! Email-address and hostname domain helpers
//!
//! Shared by [`crate::email::ParsedEmail`] construction and several
//! [`crate::checks`] (return-path mismatch, blacklist, link mismatch,
//! brand impersonation).

/// Two-part ccTLDs whose registrable domain needs three labels instead of
/// two (e.g. `example.co.uk`, not `co.uk`).
const TWO_PART_TLDS: &[&str] = &[
    "co.uk", "com.au", "co.nz", "co.za", "com.br", "co.jp", "co.in",
];

/// Extract the lowercased domain from a raw `From`/`Return-Path` header
/// value.
///
/// 1. If the string contains `<...>`, the local-part/domain is taken from
///    the substring between the *last* `<` and *last* `>`.
/// 2. The domain is everything after the last `@`, lowercased and trimmed.
///
/// Returns `None` if there is no `@` or the resulting domain is empty.
pub fn extract_domain(raw: &str) -> Option<String> {
    let addr_part = match (raw.rfind('<'), raw.rfind('>')) {
        (Some(open), Some(close)) if open < close => &raw[open + 1..close],
        _ => raw,
    };

    let at = addr_part.rfind('@')?;
    let domain = addr_part[at + 1..].trim().to_ascii_lowercase();
    if domain.is_empty() { None } else { Some(domain) }
}

/// Reduce a hostname to its registrable (base) domain.
///
/// Splits on `.`; if there are three or more labels and the last two form
/// one of the known two-part TLDs, the last three labels are returned,
/// otherwise the last two.
pub fn base_domain(domain: &str) -> String {
    let labels: Vec<&str> = domain.split('.').filter(|l| !l.is_empty()).collect();
    if labels.len() < 2 {
        return domain.to_ascii_lowercase();
    }

    let last_two = format!(
        "{}.{}",
        labels[labels.len() - 2],
        labels[labels.len() - 1]
    )
    .to_ascii_lowercase();

    if labels.len() >= 3 && TWO_PART_TLDS.contains(&last_two.as_str()) {
        labels[labels.len() - 3..].join(".").to_ascii_lowercase()
    } else {
        last_two
    }
}

/// Final label of a hostname, lowercased — used by the suspicious-TLD
/// check.
pub fn tld(domain: &str) -> Option<String> {
    domain
        .rsplit('.')
        .next()
        .filter(|s| !s.is_empty())
        .map(|s| s.to_ascii_lowercase())
}
