//! Pending status repository implementation

use std::collections::HashSet;

use libsql::{Connection, Row};

use crate::error::Result;
use crate::models::{StatusKey, SyncStatus};

/// Trait for pending status storage operations (async)
#[allow(async_fn_in_trait)]
pub trait SyncStatusRepository {
    /// Insert or replace statuses; replaced rows lose their selection
    async fn insert_statuses(&self, statuses: &[SyncStatus]) -> Result<()>;

    /// Claim up to `limit` unselected rows and return every selected row
    async fn select_for_processing(&self, limit: usize) -> Result<Vec<SyncStatus>>;

    /// Every pending row, selected or not
    async fn pending(&self) -> Result<Vec<SyncStatus>>;

    /// Number of pending rows
    async fn pending_count(&self) -> Result<usize>;

    /// Articles with a pending read change
    async fn pending_read_article_ids(&self) -> Result<HashSet<String>>;

    /// Articles with a pending starred change
    async fn pending_starred_article_ids(&self) -> Result<HashSet<String>>;

    /// Drop selected rows of the given articles after a successful send
    async fn delete_selected_for_processing(&self, article_ids: &[String]) -> Result<()>;

    /// Release selected rows of the given articles after a failed send
    async fn reset_selected_for_processing(&self, article_ids: &[String]) -> Result<()>;

    /// Release every selected row (start-up recovery after a crash mid-send)
    async fn reset_all_selected(&self) -> Result<()>;
}

/// libSQL implementation of `SyncStatusRepository`
#[derive(Clone)]
pub struct LibSqlSyncStatusRepository {
    conn: Connection,
}

impl LibSqlSyncStatusRepository {
    /// Create a new repository with the given connection
    #[must_use]
    pub fn new(conn: &Connection) -> Self {
        Self { conn: conn.clone() }
    }

    fn status_from_row(row: &Row) -> Result<SyncStatus> {
        let key: String = row.get(1)?;
        Ok(SyncStatus {
            article_id: row.get(0)?,
            key: key.parse()?,
            flag: row.get::<i64>(2)? != 0,
            selected: row.get::<i64>(3)? != 0,
        })
    }

    async fn collect(&self, sql: &str) -> Result<Vec<SyncStatus>> {
        let mut rows = self.conn.query(sql, ()).await?;
        let mut statuses = Vec::new();
        while let Some(row) = rows.next().await? {
            statuses.push(Self::status_from_row(&row)?);
        }
        Ok(statuses)
    }

    async fn article_ids_with_key(&self, key: StatusKey) -> Result<HashSet<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT DISTINCT article_id FROM sync_status WHERE key = ?",
                [key.as_str()],
            )
            .await?;

        let mut ids = HashSet::new();
        while let Some(row) = rows.next().await? {
            ids.insert(row.get::<String>(0)?);
        }
        Ok(ids)
    }

    /// Run one statement per article id inside a transaction
    async fn for_each_article(&self, sql: &str, article_ids: &[String]) -> Result<()> {
        if article_ids.is_empty() {
            return Ok(());
        }

        self.conn.execute("BEGIN TRANSACTION", ()).await?;
        for article_id in article_ids {
            if let Err(e) = self.conn.execute(sql, [article_id.as_str()]).await {
                self.conn.execute("ROLLBACK", ()).await.ok();
                return Err(e.into());
            }
        }
        if let Err(e) = self.conn.execute("COMMIT", ()).await {
            self.conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
        Ok(())
    }
}

impl SyncStatusRepository for LibSqlSyncStatusRepository {
    async fn insert_statuses(&self, statuses: &[SyncStatus]) -> Result<()> {
        if statuses.is_empty() {
            return Ok(());
        }

        self.conn.execute("BEGIN TRANSACTION", ()).await?;
        for status in statuses {
            let result = self
                .conn
                .execute(
                    "INSERT INTO sync_status (article_id, key, flag, selected)
                     VALUES (?, ?, ?, 0)
                     ON CONFLICT(article_id, key)
                     DO UPDATE SET flag = excluded.flag, selected = 0",
                    libsql::params![
                        status.article_id.as_str(),
                        status.key.as_str(),
                        i64::from(status.flag)
                    ],
                )
                .await;
            if let Err(e) = result {
                self.conn.execute("ROLLBACK", ()).await.ok();
                return Err(e.into());
            }
        }
        if let Err(e) = self.conn.execute("COMMIT", ()).await {
            self.conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }

        tracing::debug!(count = statuses.len(), "Stored pending statuses");
        Ok(())
    }

    async fn select_for_processing(&self, limit: usize) -> Result<Vec<SyncStatus>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.conn
            .execute(
                "UPDATE sync_status SET selected = 1
                 WHERE rowid IN (
                     SELECT rowid FROM sync_status
                     WHERE selected = 0
                     ORDER BY article_id, key
                     LIMIT ?
                 )",
                [limit],
            )
            .await?;

        self.collect(
            "SELECT article_id, key, flag, selected FROM sync_status
             WHERE selected = 1
             ORDER BY article_id, key",
        )
        .await
    }

    async fn pending(&self) -> Result<Vec<SyncStatus>> {
        self.collect(
            "SELECT article_id, key, flag, selected FROM sync_status
             ORDER BY article_id, key",
        )
        .await
    }

    async fn pending_count(&self) -> Result<usize> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM sync_status", ())
            .await?;
        let count: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };
        Ok(usize::try_from(count).unwrap_or_default())
    }

    async fn pending_read_article_ids(&self) -> Result<HashSet<String>> {
        self.article_ids_with_key(StatusKey::Read).await
    }

    async fn pending_starred_article_ids(&self) -> Result<HashSet<String>> {
        self.article_ids_with_key(StatusKey::Starred).await
    }

    async fn delete_selected_for_processing(&self, article_ids: &[String]) -> Result<()> {
        self.for_each_article(
            "DELETE FROM sync_status WHERE selected = 1 AND article_id = ?",
            article_ids,
        )
        .await
    }

    async fn reset_selected_for_processing(&self, article_ids: &[String]) -> Result<()> {
        self.for_each_article(
            "UPDATE sync_status SET selected = 0 WHERE article_id = ?",
            article_ids,
        )
        .await
    }

    async fn reset_all_selected(&self) -> Result<()> {
        self.conn
            .execute("UPDATE sync_status SET selected = 0 WHERE selected = 1", ())
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use pretty_assertions::assert_eq;

    async fn setup() -> (Database, LibSqlSyncStatusRepository) {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlSyncStatusRepository::new(db.connection());
        (db, repo)
    }

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| (*value).to_string()).collect()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_insert_replaces_flag_and_clears_selection() {
        let (_db, repo) = setup().await;
        repo.insert_statuses(&[SyncStatus::new("a1", StatusKey::Read, true)])
            .await
            .unwrap();
        repo.select_for_processing(10).await.unwrap();

        repo.insert_statuses(&[SyncStatus::new("a1", StatusKey::Read, false)])
            .await
            .unwrap();

        let pending = repo.pending().await.unwrap();
        assert_eq!(pending, vec![SyncStatus::new("a1", StatusKey::Read, false)]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_select_for_processing_claims_in_blocks() {
        let (_db, repo) = setup().await;
        let statuses = (0..5)
            .map(|i| SyncStatus::new(format!("a{i}"), StatusKey::Starred, true))
            .collect::<Vec<_>>();
        repo.insert_statuses(&statuses).await.unwrap();

        let first = repo.select_for_processing(3).await.unwrap();
        assert_eq!(first.len(), 3);
        assert!(first.iter().all(|status| status.selected));

        repo.delete_selected_for_processing(&ids(&["a0", "a1", "a2"]))
            .await
            .unwrap();
        let second = repo.select_for_processing(3).await.unwrap();
        assert_eq!(second.len(), 2);
        assert_eq!(repo.pending_count().await.unwrap(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_reset_releases_selection() {
        let (_db, repo) = setup().await;
        repo.insert_statuses(&[
            SyncStatus::new("a1", StatusKey::Read, true),
            SyncStatus::new("a2", StatusKey::Read, true),
        ])
        .await
        .unwrap();
        repo.select_for_processing(10).await.unwrap();

        repo.reset_selected_for_processing(&ids(&["a1"]))
            .await
            .unwrap();
        let selected = repo
            .pending()
            .await
            .unwrap()
            .into_iter()
            .filter(|status| status.selected)
            .map(|status| status.article_id)
            .collect::<Vec<_>>();
        assert_eq!(selected, ids(&["a2"]));

        repo.reset_all_selected().await.unwrap();
        assert!(repo
            .pending()
            .await
            .unwrap()
            .iter()
            .all(|status| !status.selected));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pending_ids_by_key() {
        let (_db, repo) = setup().await;
        repo.insert_statuses(&[
            SyncStatus::new("a1", StatusKey::Read, true),
            SyncStatus::new("a2", StatusKey::Starred, false),
            SyncStatus::new("a3", StatusKey::Deleted, true),
        ])
        .await
        .unwrap();

        let read = repo.pending_read_article_ids().await.unwrap();
        let starred = repo.pending_starred_article_ids().await.unwrap();
        assert_eq!(read, HashSet::from(["a1".to_string()]));
        assert_eq!(starred, HashSet::from(["a2".to_string()]));
    }
}
