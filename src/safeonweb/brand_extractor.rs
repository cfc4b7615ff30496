//! Brand-name extraction from Safeonweb RSS item titles (spec §4.D)
//!
//! Titles follow a handful of fixed Dutch/English phrasings naming the
//! impersonated brand. Patterns are tried in order, first match wins; the
//! captured text is then truncated at the first stop word/punctuation and
//! split on `en`/`and` to surface multi-brand titles.

use std::sync::LazyLock;

use regex::Regex;

struct Pattern {
    regex: Regex,
}

static PATTERNS: LazyLock<Vec<Pattern>> = LazyLock::new(|| {
    vec![
        Pattern {
            regex: Regex::new(r"(?i)in naam van\s+(?:(?:de|het)\s+)?(.+)").unwrap(),
        },
        Pattern {
            regex: Regex::new(r"(?i)\bnamens\s+(?:(?:de|het)\s+)?(.+)").unwrap(),
        },
        Pattern {
            regex: Regex::new(r"(?i)in the name of\s+(?:the\s+)?(.+)").unwrap(),
        },
        Pattern {
            regex: Regex::new(
                r"(?i)(?:die\s+)?\bvan\s+(?:(?:de|het)\s+)?(.+?)\s+(?:lijken te komen|te komen|komen)\b",
            )
            .unwrap(),
        },
        Pattern {
            regex: Regex::new(r"(?i)\b(?:appear|seem) to come from\s+(?:the\s+)?(.+)").unwrap(),
        },
    ]
});

/// Stop words that terminate a brand-name capture when found as a whole
/// word (case-insensitive): English verbs, Dutch verbs, stray punctuation
/// — typically introducing a trailing clause rather than a second brand.
static STOP_WORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:are|is|was|were|has|have|had|worden|wordt|zijn|gaan|komt)\b").unwrap()
});

const STOP_PUNCTUATION: &[char] = &[':', '-', '–', '—'];

/// Extract the brand name(s) impersonated in an RSS item's title. Returns
/// an empty vector if no known phrasing matches.
pub fn extract_brands(title: &str) -> Vec<String> {
    let Some(captured) = PATTERNS.iter().find_map(|p| {
        p.regex
            .captures(title)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_owned())
    }) else {
        return Vec::new();
    };

    let truncated = truncate_at_stop(&captured);
    split_multi_brand(&truncated)
}

fn truncate_at_stop(text: &str) -> String {
    let mut end = text.len();
    if let Some(m) = STOP_WORD_RE.find(text)
        && m.start() < end
    {
        end = m.start();
    }
    for punct in STOP_PUNCTUATION {
        if let Some(idx) = text.find(*punct)
            && idx < end
        {
            end = idx;
        }
    }

    text[..end].trim_matches(|c: char| c.is_whitespace() || STOP_PUNCTUATION.contains(&c)).to_owned()
}

fn split_multi_brand(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    text.split(|c: char| c == '/')
        .flat_map(|part| part.split_whitespace_then_en_and())
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

trait SplitEnAnd {
    fn split_whitespace_then_en_and(&self) -> Vec<String>;
}

impl SplitEnAnd for str {
    fn split_whitespace_then_en_and(&self) -> Vec<String> {
        let words: Vec<&str> = self.split_whitespace().collect();
        let mut parts = Vec::new();
        let mut current = Vec::new();
        for word in words {
            if word.eq_ignore_ascii_case("en") || word.eq_ignore_ascii_case("and") {
                if !current.is_empty() {
                    parts.push(current.join(" "));
                    current.clear();
                }
            } else {
                current.push(word);
            }
        }
        if !current.is_empty() {
            parts.push(current.join(" "));
        }
        parts
    }
}
