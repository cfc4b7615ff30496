//! CampaignUpdater — fetches the Safeonweb RSS feed, extracts impersonated
//! brands from each item's title, and persists them (spec §4.D)

use crate::errors::{AppError, AppResult};
use crate::safeonweb::{extract_brands, parse_feed};
use crate::safeonweb::rss::parse_pub_date;
use crate::store::campaign::CampaignBrand;
use crate::store::SafeonwebCampaignStore;

pub struct CampaignUpdater {
    store: SafeonwebCampaignStore,
    client: reqwest::Client,
}

impl CampaignUpdater {
    pub fn new(store: SafeonwebCampaignStore) -> Self {
        Self {
            store,
            client: reqwest::Client::new(),
        }
    }

    /// Fetch `url`, parse its RSS items, extract a brand from each title
    /// that matches a known phrasing, and insert the results. Returns the
    /// number of `(brand, title)` rows inserted (duplicates are skipped by
    /// the store, not counted).
    pub async fn refresh(&self, url: &str) -> AppResult<usize> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::Network(e.to_string()))?;
        let xml = response
            .error_for_status()
            .map_err(|e| AppError::Network(e.to_string()))?
            .text()
            .await
            .map_err(|e| AppError::Network(e.to_string()))?;

        let items = parse_feed(&xml);
        let mut brands = Vec::new();
        for item in &items {
            let published_date = parse_pub_date(&item.pub_date);
            for brand in extract_brands(&item.title) {
                brands.push(CampaignBrand {
                    brand,
                    published_date,
                    article_title: item.title.clone(),
                });
            }
        }

        let count = brands.len();
        self.store.insert_brands(&brands).await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::Mutex;

    use super::*;

    #[tokio::test]
    async fn refresh_extracts_and_stores_brands_from_feed() {
        // Exercises the parse+extract+persist wiring directly against a feed
        // string rather than a live HTTP server.
        let xml = r#"<rss version="2.0"><channel>
          <item><title>Phishing in naam van Argenta</title><pubDate>Mon, 01 Jun 2026 10:00:00 +0000</pubDate></item>
          <item><title>General security advisory</title><pubDate>Tue, 02 Jun 2026 08:30:00 +0000</pubDate></item>
        </channel></rss>"#;

        let items = parse_feed(xml);
        let mut brands = Vec::new();
        for item in &items {
            let published_date = parse_pub_date(&item.pub_date);
            for brand in extract_brands(&item.title) {
                brands.push(CampaignBrand {
                    brand,
                    published_date,
                    article_title: item.title.clone(),
                });
            }
        }
        assert_eq!(brands.len(), 1);
        assert_eq!(brands[0].brand, "argenta");

        let conn = crate::db::open(":memory:").unwrap();
        let store = SafeonwebCampaignStore::new(Arc::new(Mutex::new(conn)), 90);
        store.insert_brands(&brands).await.unwrap();
        assert!(store.is_active_campaign_brand("argenta").await.unwrap());
    }
}
