use std::path::Path;

use crate::cli::{TokenCommands, ZoneArgs};
use crate::commands::common::{load_sync_config, open_database, token_store, zone_identity};
use crate::error::CliError;

pub async fn run_token(command: &TokenCommands, db_path: &Path) -> Result<(), CliError> {
    match command {
        TokenCommands::Show(args) => {
            let line = show_token(args, db_path).await?;
            println!("{line}");
        }
        TokenCommands::Reset(args) => {
            let zone = zone_identity(args)?;
            let db = open_database(db_path).await?;
            let config = load_sync_config()?;
            token_store(&db, &config).set(&zone, None).await?;
            println!("Cleared change token for {zone}");
        }
        TokenCommands::Migrate(args) => {
            let zone = zone_identity(args)?;
            let db = open_database(db_path).await?;
            let config = load_sync_config()?;
            let migrated = token_store(&db, &config)
                .migrate_legacy_if_present(&zone)
                .await?;
            if migrated {
                println!("Migrated legacy change token for {zone}");
            } else {
                println!("No legacy change token for {zone}");
            }
        }
    }
    Ok(())
}

pub async fn show_token(args: &ZoneArgs, db_path: &Path) -> Result<String, CliError> {
    let zone = zone_identity(args)?;
    let db = open_database(db_path).await?;
    let config = load_sync_config()?;
    let line = match token_store(&db, &config).get(&zone).await? {
        Some(token) => format!(
            "{zone}: {} ({} bytes)",
            hex::encode(token.as_bytes()),
            token.as_bytes().len()
        ),
        None => format!("{zone}: no change token stored"),
    };
    Ok(line)
}
