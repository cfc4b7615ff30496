//! Safeonweb phishing-campaign brand persistence (spec §4.D)

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};

use crate::errors::AppResult;

use super::SharedConnection;

/// A single Safeonweb RSS entry, already reduced to its impersonated brand.
#[derive(Debug, Clone)]
pub struct CampaignBrand {
    pub brand: String,
    pub published_date: DateTime<Utc>,
    pub article_title: String,
}

#[derive(Clone)]
pub struct SafeonwebCampaignStore {
    conn: SharedConnection,
    retention_days: i64,
}

impl SafeonwebCampaignStore {
    pub fn new(conn: SharedConnection, retention_days: i64) -> Self {
        Self { conn, retention_days }
    }

    /// Lowercased brand names with at least one entry published within the
    /// retention window (default 90 days).
    pub async fn active_brands(&self) -> AppResult<Vec<String>> {
        let cutoff = (Utc::now() - chrono::Duration::days(self.retention_days)).to_rfc3339();
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT brand FROM safeonweb_campaigns WHERE publishedDate > ?1 ORDER BY brand",
        )?;
        let rows = stmt.query_map(params![cutoff], |row| row.get(0))?;
        rows.collect::<Result<_, _>>().map_err(Into::into)
    }

    pub async fn is_active_campaign_brand(&self, brand: &str) -> AppResult<bool> {
        let cutoff = (Utc::now() - chrono::Duration::days(self.retention_days)).to_rfc3339();
        let conn = self.conn.lock().await;
        conn.query_row(
            "SELECT 1 FROM safeonweb_campaigns WHERE brand = ?1 AND publishedDate > ?2 LIMIT 1",
            params![brand.to_ascii_lowercase(), cutoff],
            |row| row.get::<_, i64>(0),
        )
        .optional()
        .map(|v| v.is_some())
        .map_err(Into::into)
    }

    /// Insert brands parsed from a fresh RSS fetch, skipping any
    /// `(brand, articleTitle)` pair already on file.
    pub async fn insert_brands(&self, brands: &[CampaignBrand]) -> AppResult<()> {
        let conn = self.conn.lock().await;
        let now = Utc::now().to_rfc3339();
        let mut stmt = conn.prepare(
            "INSERT OR IGNORE INTO safeonweb_campaigns (brand, publishedDate, fetchedDate, articleTitle)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for entry in brands {
            stmt.execute(params![
                entry.brand.to_ascii_lowercase(),
                entry.published_date.to_rfc3339(),
                now,
                entry.article_title,
            ])?;
        }
        Ok(())
    }

    /// Delete campaign rows older than the retention window. Returns the
    /// number of rows removed.
    pub async fn purge_expired(&self) -> AppResult<usize> {
        let cutoff = (Utc::now() - chrono::Duration::days(self.retention_days)).to_rfc3339();
        let conn = self.conn.lock().await;
        let deleted = conn.execute(
            "DELETE FROM safeonweb_campaigns WHERE publishedDate <= ?1",
            params![cutoff],
        )?;
        Ok(deleted)
    }

    /// The most recent `fetchedDate`, or `None` if the table is empty.
    pub async fn last_fetched(&self) -> AppResult<Option<DateTime<Utc>>> {
        let conn = self.conn.lock().await;
        let value: Option<String> = conn
            .query_row(
                "SELECT fetchedDate FROM safeonweb_campaigns ORDER BY fetchedDate DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.and_then(|v| DateTime::parse_from_rfc3339(&v).ok()).map(|dt| dt.with_timezone(&Utc)))
    }

    pub async fn count(&self) -> AppResult<i64> {
        let conn = self.conn.lock().await;
        conn.query_row("SELECT count(*) FROM safeonweb_campaigns", [], |row| row.get(0))
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::TimeZone;
    use tokio::sync::Mutex;

    use super::*;

    fn store(retention_days: i64) -> SafeonwebCampaignStore {
        let conn = crate::db::open(":memory:").unwrap();
        SafeonwebCampaignStore::new(Arc::new(Mutex::new(conn)), retention_days)
    }

    #[tokio::test]
    async fn active_brands_excludes_expired_entries() {
        let store = store(90);
        store
            .insert_brands(&[
                CampaignBrand {
                    brand: "Argenta".to_owned(),
                    published_date: Utc::now() - chrono::Duration::days(10),
                    article_title: "Fresh phishing wave".to_owned(),
                },
                CampaignBrand {
                    brand: "OldBank".to_owned(),
                    published_date: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
                    article_title: "Stale".to_owned(),
                },
            ])
            .await
            .unwrap();

        let active = store.active_brands().await.unwrap();
        assert_eq!(active, vec!["argenta"]);
        assert!(store.is_active_campaign_brand("argenta").await.unwrap());
        assert!(!store.is_active_campaign_brand("oldbank").await.unwrap());
    }

    #[tokio::test]
    async fn insert_brands_ignores_duplicate_brand_and_title_pairs() {
        let store = store(90);
        let entry = CampaignBrand {
            brand: "Argenta".to_owned(),
            published_date: Utc::now(),
            article_title: "Same Article".to_owned(),
        };
        store.insert_brands(&[entry.clone(), entry]).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn purge_expired_removes_only_stale_rows() {
        let store = store(90);
        store
            .insert_brands(&[
                CampaignBrand {
                    brand: "fresh".to_owned(),
                    published_date: Utc::now(),
                    article_title: "a".to_owned(),
                },
                CampaignBrand {
                    brand: "stale".to_owned(),
                    published_date: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
                    article_title: "b".to_owned(),
                },
            ])
            .await
            .unwrap();

        let deleted = store.purge_expired().await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
