use anyhow::{Result, anyhow};

use crate::core::AppConfig;
use crate::core::db::{async_db, migrate_db};

pub async fn run(db: bool) -> Result<()> {
    if !db {
        return Err(anyhow!("Missing value for migrate \"--db\""));
    }

    let config = AppConfig::from_env()?;
    println!("Migrating db...");
    let conn = async_db(&config.db_path).await?;
    conn.call(|conn| Ok(migrate_db(conn)?)).await?;
    conn.close().await?;
    println!("Finished migrating db");

    Ok(())
}
