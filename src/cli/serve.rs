use anyhow::Result;

use super::init_tracing;
use crate::api;
use crate::core::{AppConfig, AppContext};

pub async fn run(host: String, port: String) -> Result<()> {
    init_tracing();
    let config = AppConfig::from_env()?;
    let ctx = AppContext::open(config).await?;
    api::serve(host, port, ctx).await
}
