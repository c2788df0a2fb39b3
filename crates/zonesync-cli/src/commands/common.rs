use std::env;
use std::path::{Path, PathBuf};

use zonesync_core::db::{Database, LibSqlKeyValueStore};
use zonesync_core::{ChangeTokenStore, SyncConfig, ZoneIdentity};

use crate::cli::ZoneArgs;
use crate::error::CliError;

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("ZONESYNC_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("zonesync")
        .join("zonesync.db")
}

pub async fn open_database(path: &Path) -> Result<Database, CliError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(Database::open(path).await?)
}

pub fn load_sync_config() -> Result<SyncConfig, CliError> {
    Ok(SyncConfig::from_env()?)
}

pub fn zone_identity(args: &ZoneArgs) -> Result<ZoneIdentity, CliError> {
    let name = args.zone.trim();
    let owner = args.owner.trim();
    if name.is_empty() || owner.is_empty() {
        return Err(CliError::EmptyZone);
    }
    Ok(ZoneIdentity::new(name, owner))
}

pub fn token_store(
    db: &Database,
    config: &SyncConfig,
) -> ChangeTokenStore<LibSqlKeyValueStore> {
    ChangeTokenStore::new(
        LibSqlKeyValueStore::new(db.connection()),
        config.token_key_prefix.clone(),
    )
}

pub fn normalize_article_id(id: &str) -> Result<String, CliError> {
    let normalized = id.trim();
    if normalized.is_empty() {
        return Err(CliError::EmptyArticleId);
    }
    Ok(normalized.to_string())
}
