//! BlacklistUpdater — HTTP fetch, parse, and bulk-replace (spec §4.F)

use chrono::{DateTime, Utc};

use crate::errors::{AppError, AppResult};
use crate::store::BlacklistStore;

/// The `source` label this updater's fetched domains are stored under.
const SOURCE: &str = "remote-feed";

pub struct BlacklistUpdater {
    store: BlacklistStore,
    client: reqwest::Client,
    refresh_interval_hours: u64,
}

impl BlacklistUpdater {
    pub fn new(store: BlacklistStore, refresh_interval_hours: u64) -> Self {
        Self {
            store,
            client: reqwest::Client::new(),
            refresh_interval_hours,
        }
    }

    /// True if the blacklist has no `SOURCE` entries yet, or its
    /// `lastUpdated` is stale relative to the configured refresh
    /// interval (default 12 hours — spec §9 open question).
    pub async fn needs_refresh(&self) -> AppResult<bool> {
        let last_updated = self.store.last_updated_for_source(SOURCE).await?;
        let Some(last_updated) = last_updated else {
            return Ok(true);
        };
        Ok(is_stale(last_updated, self.refresh_interval_hours))
    }

    /// Fetch the plaintext domain list from `url`, parse it, and replace
    /// the blacklist's `SOURCE` rows in one transaction. On fetch failure
    /// the existing blacklist is left untouched; the error is returned to
    /// the caller.
    pub async fn refresh(&self, url: &str) -> AppResult<usize> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::Network(e.to_string()))?;
        let text = response
            .error_for_status()
            .map_err(|e| AppError::Network(e.to_string()))?
            .text()
            .await
            .map_err(|e| AppError::Network(e.to_string()))?;

        let domains = parse_domain_list(&text);
        self.store.replace_all(SOURCE, &domains).await?;
        Ok(domains.len())
    }
}

fn is_stale(last_updated: DateTime<Utc>, refresh_interval_hours: u64) -> bool {
    let elapsed = Utc::now() - last_updated;
    elapsed > chrono::Duration::hours(refresh_interval_hours as i64)
}

/// Split `text` into trimmed, lowercased domain tokens, skipping blank
/// lines and `#`-prefixed comments.
pub fn parse_domain_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_ascii_lowercase)
        .collect()
}
