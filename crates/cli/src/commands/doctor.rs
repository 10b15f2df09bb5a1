use serde::Serialize;

use vitral_core::config::{AppConfig, LoadOptions};
use vitral_db::migrations;
use vitral_db::repositories::SqlCatalogRepository;
use vitral_db::{connect_with_settings, DbPool};

use crate::commands::build_runtime;

const DATABASE_CHECKS: [&str; 3] = ["database_connectivity", "migrations", "catalog"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str, reason: &str) -> Self {
        Self { name, status: CheckStatus::Skipped, details: format!("skipped: {reason}") }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

impl DoctorReport {
    fn from_checks(checks: Vec<DoctorCheck>) -> Self {
        let failed = checks.iter().filter(|check| check.status != CheckStatus::Pass).count();
        let (overall_status, summary) = if failed == 0 {
            (CheckStatus::Pass, "doctor: ready to price and quote".to_string())
        } else {
            (CheckStatus::Fail, format!("doctor: {failed} check(s) need attention"))
        };

        Self { overall_status, summary, checks }
    }
}

/// Readiness report: config, tenant settings, notification channel, then
/// database, schema and catalog. Never applies migrations or writes rows.
pub fn run(json_output: bool) -> String {
    let report = DoctorReport::from_checks(collect_checks());

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
            )
        });
    }

    render_human(&report)
}

fn collect_checks() -> Vec<DoctorCheck> {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            let mut checks = vec![DoctorCheck::fail("config_validation", error.to_string())];
            checks.extend(
                ["tenant_settings", "notification_channel"]
                    .into_iter()
                    .chain(DATABASE_CHECKS)
                    .map(|name| DoctorCheck::skipped(name, "configuration did not load")),
            );
            return checks;
        }
    };

    let mut checks = vec![
        DoctorCheck::pass("config_validation", "configuration loaded and validated"),
        check_tenant_settings(&config),
        check_notification_channel(&config),
    ];

    match build_runtime() {
        Ok(runtime) => checks.extend(runtime.block_on(check_database(&config))),
        Err(failure) => checks.extend(
            DATABASE_CHECKS.map(|name| DoctorCheck::skipped(name, &failure.message)),
        ),
    }

    checks
}

fn check_tenant_settings(config: &AppConfig) -> DoctorCheck {
    let tenant = &config.tenant;
    DoctorCheck::pass(
        "tenant_settings",
        format!(
            "quotes in {} valid for {} day(s); carts up to {} item(s)",
            tenant.currency, tenant.quote_validity_days, tenant.max_cart_items
        ),
    )
}

fn check_notification_channel(config: &AppConfig) -> DoctorCheck {
    let notifications = &config.notifications;
    let details = match (notifications.enabled, notifications.webhook_url.as_deref()) {
        (false, _) => "vendor notifications disabled; sends are recorded only".to_string(),
        (true, Some(url)) => format!(
            "webhook `{url}` ({}, timeout {}s)",
            if notifications.webhook_token.is_some() { "bearer token set" } else { "no token" },
            notifications.timeout_secs
        ),
        (true, None) => "vendor notifications go to the log".to_string(),
    };

    DoctorCheck::pass("notification_channel", details)
}

async fn check_database(config: &AppConfig) -> Vec<DoctorCheck> {
    // One connection, so an in-memory URL is inspected as a single database.
    let pool = match connect_with_settings(&config.database.url, 1, config.database.timeout_secs)
        .await
    {
        Ok(pool) => pool,
        Err(error) => {
            return vec![
                DoctorCheck::fail(
                    "database_connectivity",
                    format!("failed to connect to database: {error}"),
                ),
                DoctorCheck::skipped("migrations", "database unreachable"),
                DoctorCheck::skipped("catalog", "database unreachable"),
            ];
        }
    };

    let mut checks = vec![DoctorCheck::pass(
        "database_connectivity",
        format!("connected using `{}`", config.database.url),
    )];

    let schema = check_migrations(&pool).await;
    let schema_current = schema.status == CheckStatus::Pass;
    checks.push(schema);
    checks.push(if schema_current {
        check_catalog(&pool).await
    } else {
        DoctorCheck::skipped("catalog", "schema is not current")
    });

    pool.close().await;
    checks
}

async fn check_migrations(pool: &DbPool) -> DoctorCheck {
    match migrations::status(pool).await {
        Ok(status) if status.is_current() => DoctorCheck::pass(
            "migrations",
            format!("{} of {} migration(s) applied", status.applied, status.known),
        ),
        Ok(status) => DoctorCheck::fail(
            "migrations",
            format!(
                "{} of {} migration(s) applied; run `vitral migrate`",
                status.applied, status.known
            ),
        ),
        Err(error) => DoctorCheck::fail("migrations", format!("failed to read ledger: {error}")),
    }
}

async fn check_catalog(pool: &DbPool) -> DoctorCheck {
    match SqlCatalogRepository::new(pool.clone()).quotable_model_count().await {
        Ok(0) => DoctorCheck::fail(
            "catalog",
            "no published model has a compatible glass type; run `vitral seed` or load a catalog",
        ),
        Ok(count) => DoctorCheck::pass(
            "catalog",
            format!("{count} published model(s) with compatible glass"),
        ),
        Err(error) => DoctorCheck::fail("catalog", error.to_string()),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![report.summary.clone()];

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}
