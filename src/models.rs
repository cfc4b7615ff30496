//! Verdict and scoring types shared across the check pipeline and storage
//! layer.

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

/// A single heuristic finding emitted by one [`crate::checks::PhishingCheck`].
///
/// Immutable once constructed; `points` is always non-negative.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckResult {
    pub check_name: String,
    pub points: u32,
    pub reason: String,
}

impl CheckResult {
    pub fn new(check_name: impl Into<String>, points: u32, reason: impl Into<String>) -> Self {
        Self {
            check_name: check_name.into(),
            points,
            reason: reason.into(),
        }
    }
}

/// Action a user (or the engine, on their behalf) has taken on a verdict.
///
/// Stored as the literal lowerCamelCase strings named in spec §3 so the
/// on-disk representation matches the spec exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionTaken {
    None,
    Flagged,
    MovedToJunk,
    MarkedSafe,
}

impl ActionTaken {
    fn as_str(self) -> &'static str {
        match self {
            ActionTaken::None => "none",
            ActionTaken::Flagged => "flagged",
            ActionTaken::MovedToJunk => "movedToJunk",
            ActionTaken::MarkedSafe => "markedSafe",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "none" => Some(ActionTaken::None),
            "flagged" => Some(ActionTaken::Flagged),
            "movedToJunk" => Some(ActionTaken::MovedToJunk),
            "markedSafe" => Some(ActionTaken::MarkedSafe),
            _ => None,
        }
    }
}

impl ToSql for ActionTaken {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ActionTaken {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        ActionTaken::parse(text).ok_or_else(|| {
            FromSqlError::Other(format!("unknown actionTaken value: {text}").into())
        })
    }
}

/// Derived classification of a verdict's aggregate score.
///
/// `[0,2] -> clean`, `[3,5] -> suspicious`, `[6,..) -> phishing`. Never
/// stored — always computed from `score`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreatLevel {
    Clean,
    Suspicious,
    Phishing,
}

impl ThreatLevel {
    pub fn from_score(score: u32) -> Self {
        match score {
            0..=2 => ThreatLevel::Clean,
            3..=5 => ThreatLevel::Suspicious,
            _ => ThreatLevel::Phishing,
        }
    }
}

/// The persisted result of analyzing a single message.
#[derive(Debug, Clone)]
pub struct Verdict {
    pub message_id: String,
    pub score: u32,
    pub reasons: Vec<CheckResult>,
    pub timestamp: DateTime<Utc>,
    pub action_taken: Option<ActionTaken>,
    pub from: String,
    pub subject: Option<String>,
    pub received_date: DateTime<Utc>,
    pub imap_uid: Option<u32>,
}

impl Verdict {
    pub fn threat_level(&self) -> ThreatLevel {
        ThreatLevel::from_score(self.score)
    }

    /// Display name parsed from `from`: the text before the last `<`,
    /// stripped of surrounding quotes/whitespace. Empty if `from` has no
    /// angle-bracketed address.
    pub fn sender_name(&self) -> String {
        sender_name_from(&self.from)
    }

    /// The bare `local@domain` address parsed from `from`.
    pub fn sender_email(&self) -> Option<String> {
        sender_email_from(&self.from)
    }
}

/// Extract the display name portion of a `From` header value.
pub fn sender_name_from(from: &str) -> String {
    match from.rfind('<') {
        Some(idx) => from[..idx].trim().trim_matches('"').trim().to_owned(),
        None => String::new(),
    }
}

/// Extract the bare email address from a `From` header value.
pub fn sender_email_from(from: &str) -> Option<String> {
    let (open, close) = (from.rfind('<')?, from.rfind('>')?);
    if open < close {
        Some(from[open + 1..close].trim().to_owned())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threat_level_boundaries_classify_correctly() {
        assert!(matches!(ThreatLevel::from_score(0), ThreatLevel::Clean));
        assert!(matches!(ThreatLevel::from_score(2), ThreatLevel::Clean));
        assert!(matches!(ThreatLevel::from_score(3), ThreatLevel::Suspicious));
        assert!(matches!(ThreatLevel::from_score(5), ThreatLevel::Suspicious));
        assert!(matches!(ThreatLevel::from_score(6), ThreatLevel::Phishing));
        assert!(matches!(ThreatLevel::from_score(100), ThreatLevel::Phishing));
    }

    #[test]
    fn action_taken_round_trips_through_string_form() {
        for variant in [
            ActionTaken::None,
            ActionTaken::Flagged,
            ActionTaken::MovedToJunk,
            ActionTaken::MarkedSafe,
        ] {
            assert_eq!(ActionTaken::parse(variant.as_str()), Some(variant));
        }
    }

    #[test]
    fn sender_name_and_email_parse_from_display_form() {
        let from = "\"ARGENTA\" <digipass@tradebulls.in>";
        assert_eq!(sender_name_from(from), "ARGENTA");
        assert_eq!(
            sender_email_from(from).as_deref(),
            Some("digipass@tradebulls.in")
        );
    }

    #[test]
    fn sender_name_is_empty_for_bare_address() {
        assert_eq!(sender_name_from("user@example.com"), "");
        assert_eq!(sender_email_from("user@example.com"), None);
    }
}
