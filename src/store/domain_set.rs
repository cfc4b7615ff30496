//! Domain allow/block/trust lists
//!
//! [`BlacklistStore`], [`AllowlistStore`], and [`TrustedLinkDomainStore`]
//! all follow the same shape (a set of lowercased domains with a
//! membership check, add, remove, and enumerate) but carry different
//! metadata columns, so each gets its own small struct rather than a
//! shared generic (spec §4.C).

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};

use crate::errors::AppResult;

use super::SharedConnection;

#[derive(Clone)]
pub struct BlacklistStore {
    conn: SharedConnection,
}

impl BlacklistStore {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    pub async fn is_blacklisted(&self, domain: &str) -> AppResult<bool> {
        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row(
            "SELECT count(*) FROM blacklist WHERE domain = ?1",
            params![domain.to_ascii_lowercase()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub async fn add(&self, domain: &str, source: &str) -> AppResult<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO blacklist (domain, source, lastUpdated) VALUES (?1, ?2, ?3)
             ON CONFLICT(domain) DO UPDATE SET source = excluded.source, lastUpdated = excluded.lastUpdated",
            params![domain.to_ascii_lowercase(), source, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub async fn remove(&self, domain: &str) -> AppResult<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "DELETE FROM blacklist WHERE domain = ?1",
            params![domain.to_ascii_lowercase()],
        )?;
        Ok(())
    }

    pub async fn all_domains(&self) -> AppResult<Vec<String>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare("SELECT domain FROM blacklist ORDER BY domain")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<Result<_, _>>().map_err(Into::into)
    }

    /// Replace every row whose `source` matches with the freshly fetched
    /// list, in one transaction (spec §4.K: delete-by-source then batch
    /// insert so a failed fetch never leaves a half-written table).
    pub async fn replace_all(&self, source: &str, domains: &[String]) -> AppResult<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM blacklist WHERE source = ?1", params![source])?;
        let now = Utc::now().to_rfc3339();
        {
            let mut stmt = tx.prepare(
                "INSERT INTO blacklist (domain, source, lastUpdated) VALUES (?1, ?2, ?3)
                 ON CONFLICT(domain) DO UPDATE SET source = excluded.source, lastUpdated = excluded.lastUpdated",
            )?;
            for domain in domains {
                stmt.execute(params![domain.to_ascii_lowercase(), source, now])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Most recent `lastUpdated` among rows with the given `source`, used
    /// by [`crate::blacklist_updater::BlacklistUpdater`] to decide whether
    /// a refresh is due.
    pub async fn last_updated_for_source(&self, source: &str) -> AppResult<Option<DateTime<Utc>>> {
        let conn = self.conn.lock().await;
        let value: Option<String> = conn
            .query_row(
                "SELECT lastUpdated FROM blacklist WHERE source = ?1 ORDER BY lastUpdated DESC LIMIT 1",
                params![source],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.and_then(|v| DateTime::parse_from_rfc3339(&v).ok()).map(|dt| dt.with_timezone(&Utc)))
    }

    /// Check several domains in one query, returning only the ones found
    /// on the blacklist.
    pub async fn check_domains(&self, domains: &[String]) -> AppResult<Vec<String>> {
        if domains.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn.lock().await;
        let placeholders = domains.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!("SELECT domain FROM blacklist WHERE domain IN ({placeholders})");
        let mut stmt = conn.prepare(&sql)?;
        let lowered: Vec<String> = domains.iter().map(|d| d.to_ascii_lowercase()).collect();
        let params = rusqlite::params_from_iter(lowered.iter());
        let rows = stmt.query_map(params, |row| row.get(0))?;
        rows.collect::<Result<_, _>>().map_err(Into::into)
    }
}

#[derive(Clone)]
pub struct AllowlistStore {
    conn: SharedConnection,
}

impl AllowlistStore {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    pub async fn is_allowed(&self, domain: &str) -> AppResult<bool> {
        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row(
            "SELECT count(*) FROM allowlist WHERE domain = ?1",
            params![domain.to_ascii_lowercase()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub async fn add(&self, domain: &str, added_by_user: bool) -> AppResult<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO allowlist (domain, addedByUser, timestamp) VALUES (?1, ?2, ?3)
             ON CONFLICT(domain) DO UPDATE SET addedByUser = excluded.addedByUser",
            params![domain.to_ascii_lowercase(), added_by_user, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub async fn remove(&self, domain: &str) -> AppResult<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "DELETE FROM allowlist WHERE domain = ?1",
            params![domain.to_ascii_lowercase()],
        )?;
        Ok(())
    }

    pub async fn all_domains(&self) -> AppResult<Vec<String>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare("SELECT domain FROM allowlist ORDER BY domain")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<Result<_, _>>().map_err(Into::into)
    }
}

#[derive(Clone)]
pub struct TrustedLinkDomainStore {
    conn: SharedConnection,
}

impl TrustedLinkDomainStore {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    pub async fn is_trusted(&self, domain: &str) -> AppResult<bool> {
        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row(
            "SELECT count(*) FROM trusted_link_domains WHERE domain = ?1",
            params![domain.to_ascii_lowercase()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub async fn add(&self, domain: &str) -> AppResult<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO trusted_link_domains (domain, timestamp) VALUES (?1, ?2)
             ON CONFLICT(domain) DO NOTHING",
            params![domain.to_ascii_lowercase(), Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub async fn remove(&self, domain: &str) -> AppResult<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "DELETE FROM trusted_link_domains WHERE domain = ?1",
            params![domain.to_ascii_lowercase()],
        )?;
        Ok(())
    }

    pub async fn all_domains(&self) -> AppResult<Vec<String>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare("SELECT domain FROM trusted_link_domains ORDER BY domain")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<Result<_, _>>().map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::Mutex;

    use super::*;

    fn shared_conn() -> SharedConnection {
        Arc::new(Mutex::new(crate::db::open(":memory:").unwrap()))
    }

    #[tokio::test]
    async fn blacklist_add_remove_and_membership() {
        let store = BlacklistStore::new(shared_conn());
        assert!(!store.is_blacklisted("evil.example").await.unwrap());
        store.add("Evil.Example", "manual").await.unwrap();
        assert!(store.is_blacklisted("evil.example").await.unwrap());
        store.remove("evil.example").await.unwrap();
        assert!(!store.is_blacklisted("evil.example").await.unwrap());
    }

    #[tokio::test]
    async fn blacklist_replace_all_is_scoped_to_source() {
        let store = BlacklistStore::new(shared_conn());
        store.add("manual-entry.example", "manual").await.unwrap();
        store
            .replace_all("feed", &["a.example".to_owned(), "b.example".to_owned()])
            .await
            .unwrap();

        let all = store.all_domains().await.unwrap();
        assert_eq!(all, vec!["a.example", "b.example", "manual-entry.example"]);

        store.replace_all("feed", &["c.example".to_owned()]).await.unwrap();
        let all = store.all_domains().await.unwrap();
        assert_eq!(all, vec!["c.example", "manual-entry.example"]);
    }

    #[tokio::test]
    async fn blacklist_last_updated_for_source_reflects_replace_all() {
        let store = BlacklistStore::new(shared_conn());
        assert!(store.last_updated_for_source("feed").await.unwrap().is_none());
        store.replace_all("feed", &["a.example".to_owned()]).await.unwrap();
        assert!(store.last_updated_for_source("feed").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn blacklist_check_domains_returns_only_matches() {
        let store = BlacklistStore::new(shared_conn());
        store.add("bad.example", "manual").await.unwrap();
        let hits = store
            .check_domains(&["bad.example".to_owned(), "good.example".to_owned()])
            .await
            .unwrap();
        assert_eq!(hits, vec!["bad.example"]);
    }

    #[tokio::test]
    async fn allowlist_tracks_user_added_flag() {
        let store = AllowlistStore::new(shared_conn());
        store.add("trusted.example", true).await.unwrap();
        assert!(store.is_allowed("trusted.example").await.unwrap());
        assert_eq!(store.all_domains().await.unwrap(), vec!["trusted.example"]);
    }

    #[tokio::test]
    async fn trusted_link_domain_store_is_idempotent_on_add() {
        let store = TrustedLinkDomainStore::new(shared_conn());
        store.add("cdn.example").await.unwrap();
        store.add("cdn.example").await.unwrap();
        assert_eq!(store.all_domains().await.unwrap(), vec!["cdn.example"]);
    }
}
