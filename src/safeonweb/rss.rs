//! Streaming RSS 2.0 parser for the Safeonweb feed
//!
//! Only `<item>/<title>` and `<item>/<pubDate>` are extracted; every other
//! element is ignored. Malformed `pubDate` values fall back to the current
//! time rather than dropping the item (spec §4.D: a feed entry is only
//! useful if its brand is extracted, not if its date is exact).

use chrono::{DateTime, Utc};
use quick_xml::Reader;
use quick_xml::events::Event;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RssItem {
    pub title: String,
    pub pub_date: String,
}

/// Parse an RSS 2.0 document, returning every `<item>` with a non-empty
/// title. Never fails: unparseable XML yields whatever items were
/// successfully read before the error.
pub fn parse_feed(xml: &str) -> Vec<RssItem> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut items = Vec::new();
    let mut in_item = false;
    let mut current_tag: Option<Vec<u8>> = None;
    let mut title = String::new();
    let mut pub_date = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(tag)) => {
                let name = tag.name().as_ref().to_vec();
                if name == b"item" {
                    in_item = true;
                    title.clear();
                    pub_date.clear();
                }
                current_tag = Some(name);
            }
            Ok(Event::Text(text)) if in_item => {
                let decoded = text
                    .decode()
                    .ok()
                    .and_then(|s| quick_xml::escape::unescape(&s).ok().map(|u| u.into_owned()))
                    .unwrap_or_default();
                match current_tag.as_deref() {
                    Some(b"title") => title.push_str(&decoded),
                    Some(b"pubDate") => pub_date.push_str(&decoded),
                    _ => {}
                }
            }
            Ok(Event::End(tag)) => {
                if tag.name().as_ref() == b"item" {
                    if !title.trim().is_empty() {
                        items.push(RssItem {
                            title: title.trim().to_owned(),
                            pub_date: pub_date.trim().to_owned(),
                        });
                    }
                    in_item = false;
                }
                current_tag = None;
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
    }

    items
}

/// Parse an RFC-822 `pubDate` value, falling back to the current time if
/// it doesn't parse.
pub fn parse_pub_date(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc2822(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <title>Safeonweb alerts</title>
  <item>
    <title>Phishing in naam van Argenta</title>
    <pubDate>Mon, 01 Jun 2026 10:00:00 +0000</pubDate>
  </item>
  <item>
    <title>Phishing namens bpost</title>
    <pubDate>Tue, 02 Jun 2026 08:30:00 +0000</pubDate>
  </item>
</channel></rss>"#;

    #[test]
    fn parses_items_with_title_and_pub_date() {
        let items = parse_feed(FEED);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Phishing in naam van Argenta");
        assert_eq!(items[1].pub_date, "Tue, 02 Jun 2026 08:30:00 +0000");
    }

    #[test]
    fn ignores_channel_level_title() {
        let items = parse_feed(FEED);
        assert!(items.iter().all(|i| i.title != "Safeonweb alerts"));
    }

    #[test]
    fn malformed_xml_yields_best_effort_items() {
        let items = parse_feed("<rss><channel><item><title>Partial</title>");
        assert!(items.is_empty() || items[0].title == "Partial");
    }

    #[test]
    fn parse_pub_date_falls_back_to_now_on_invalid_input() {
        let parsed = parse_pub_date("not a date");
        assert!((Utc::now() - parsed).num_seconds() < 5);
    }

    #[test]
    fn parse_pub_date_parses_valid_rfc2822() {
        let parsed = parse_pub_date("Mon, 01 Jun 2026 10:00:00 +0000");
        assert_eq!(parsed.to_rfc3339(), "2026-06-01T10:00:00+00:00");
    }
}
