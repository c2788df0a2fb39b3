use std::path::Path;

use zonesync_core::db::{LibSqlSyncStatusRepository, SyncStatusRepository};
use zonesync_core::models::{StatusKey, SyncStatus};

use crate::cli::StatusCommands;
use crate::commands::common::{normalize_article_id, open_database};
use crate::error::CliError;

pub async fn run_status(command: &StatusCommands, db_path: &Path) -> Result<(), CliError> {
    match command {
        StatusCommands::Mark {
            article_id,
            key,
            off,
        } => {
            let status = mark_status(article_id, (*key).into(), !*off, db_path).await?;
            println!("{}", format_status_line(&status));
        }
        StatusCommands::Pending { json } => {
            let statuses = pending_statuses(db_path).await?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&statuses)?);
            } else if statuses.is_empty() {
                println!("No pending status changes.");
            } else {
                for status in &statuses {
                    println!("{}", format_status_line(status));
                }
            }
        }
    }
    Ok(())
}

pub async fn mark_status(
    article_id: &str,
    key: StatusKey,
    flag: bool,
    db_path: &Path,
) -> Result<SyncStatus, CliError> {
    let article_id = normalize_article_id(article_id)?;
    let db = open_database(db_path).await?;
    let repo = LibSqlSyncStatusRepository::new(db.connection());

    let status = SyncStatus::new(article_id, key, flag);
    repo.insert_statuses(std::slice::from_ref(&status)).await?;
    Ok(status)
}

pub async fn pending_statuses(db_path: &Path) -> Result<Vec<SyncStatus>, CliError> {
    let db = open_database(db_path).await?;
    let repo = LibSqlSyncStatusRepository::new(db.connection());
    Ok(repo.pending().await?)
}

pub fn format_status_line(status: &SyncStatus) -> String {
    let flag = if status.flag { "on" } else { "off" };
    let selected = if status.selected { "  (sending)" } else { "" };
    format!("{}  {:<8} {flag}{selected}", status.article_id, status.key.as_str())
}
