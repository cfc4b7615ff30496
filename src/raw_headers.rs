//! Raw RFC-822 header block parsing
//!
//! Used whenever the bulk envelope response lacks `Authentication-Results`
//! or `Return-Path` and the monitor/scan subsystem has to fall back to
//! fetching and parsing the message's raw header block directly (spec
//! §4.I step 4, §4.J phase 3).

/// Parse a raw header block into ordered, case-preserving key/value pairs.
///
/// 1. Split at the first blank line (`\r\n\r\n` or `\n\n`) — everything
///    before it is the header block.
/// 2. Unfold continuation lines: a line starting with a space or tab is
///    joined to the previous line with a single space.
/// 3. Split on newlines; for each line, everything before the first `:` is
///    the key, the rest is the value. Both are trimmed. Lines with an
///    empty key are dropped.
///
/// Never fails — malformed input yields a best-effort (possibly empty)
/// map, per spec §7's non-fatal parse-error policy.
pub fn parse_raw_headers(raw: &[u8]) -> Vec<(String, String)> {
    let text = String::from_utf8_lossy(raw);
    let header_block = header_block_of(&text);
    let unfolded = unfold(header_block);

    unfolded
        .lines()
        .filter_map(|line| {
            let colon = line.find(':')?;
            let key = line[..colon].trim();
            if key.is_empty() {
                return None;
            }
            let value = line[colon + 1..].trim();
            Some((key.to_owned(), value.to_owned()))
        })
        .collect()
}

fn header_block_of(text: &str) -> &str {
    if let Some(idx) = text.find("\r\n\r\n") {
        &text[..idx]
    } else if let Some(idx) = text.find("\n\n") {
        &text[..idx]
    } else {
        text
    }
}

/// Join continuation lines (leading space/tab) to the previous line with a
/// single space, normalizing `\r\n` to `\n` in the process.
fn unfold(header_block: &str) -> String {
    let mut out = String::with_capacity(header_block.len());
    for line in header_block.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if (line.starts_with(' ') || line.starts_with('\t')) && !out.is_empty() {
            out.push(' ');
            out.push_str(line.trim_start());
        } else {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(line);
        }
    }
    out
}

/// Case-insensitive lookup over parsed header tuples, first match wins.
pub fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}
