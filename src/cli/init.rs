use std::fs;

use anyhow::{Result, anyhow};

use crate::core::AppConfig;
use crate::core::db::{async_db, initialize_db};

pub async fn run(db: bool) -> Result<()> {
    if !db {
        return Err(anyhow!("Missing value for init \"--db\""));
    }

    let config = AppConfig::from_env()?;
    println!("Initializing db...");
    fs::create_dir_all(&config.db_path)?;

    let conn = async_db(&config.db_path).await?;
    conn.call(|conn| Ok(initialize_db(conn)?)).await?;
    conn.close().await?;
    println!("Finished initializing db at {}", config.db_path);

    Ok(())
}
