use vitral_core::config::AppConfig;

use crate::commands::{open_database, run_with_config, CommandResult, Failure};

pub fn run() -> CommandResult {
    run_with_config("migrate", apply)
}

async fn apply(config: AppConfig) -> Result<CommandResult, Failure> {
    let pool = open_database(&config).await?;
    pool.close().await;
    Ok(CommandResult::success("migrate", "applied pending migrations"))
}
