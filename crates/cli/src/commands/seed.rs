use serde_json::json;

use vitral_core::config::AppConfig;
use vitral_db::CatalogSeed;

use crate::commands::{open_database, run_with_config, CommandResult, Failure};

pub fn run() -> CommandResult {
    run_with_config("seed", load_catalog)
}

async fn load_catalog(config: AppConfig) -> Result<CommandResult, Failure> {
    let pool = open_database(&config).await?;

    let seeded = CatalogSeed::load(&pool)
        .await
        .map_err(|error| Failure::new("seed_execution", error.to_string(), 6))?;
    let verification = CatalogSeed::verify(&pool)
        .await
        .map_err(|error| Failure::new("seed_verification", error.to_string(), 6))?;
    pool.close().await;

    if !verification.all_present {
        let failed_checks = verification
            .checks
            .iter()
            .filter_map(|(check, passed)| (!passed).then_some(*check))
            .collect::<Vec<_>>();
        return Err(Failure::new("seed_verification", verification_message(&failed_checks), 6));
    }

    Ok(CommandResult::success_with_data(
        "seed",
        format!(
            "demo catalog loaded: {} models, {} glass types, {} services",
            seeded.models, seeded.glass_types, seeded.services
        ),
        Some(json!({
            "models": seeded.models,
            "glass_types": seeded.glass_types,
            "services": seeded.services,
        })),
    ))
}

fn verification_message(failed_checks: &[&str]) -> String {
    if failed_checks.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed_checks.join(", "))
    }
}
