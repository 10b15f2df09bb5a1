pub mod config;
pub mod doctor;
pub mod migrate;
pub mod price;
pub mod quote;
pub mod seed;

use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Runtime;

use vitral_core::config::{AppConfig, LoadOptions};
use vitral_core::errors::{ApplicationError, ErrorKind, InterfaceError};
use vitral_db::{connect_with_settings, migrations, DbPool};

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::success_with_data(command, message, None)
    }

    pub fn success_with_data(
        command: &str,
        message: impl Into<String>,
        data: Option<Value>,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    fn from_failure(command: &str, failure: Failure) -> Self {
        Self::failure(command, failure.error_class, failure.message, failure.exit_code)
    }
}

/// Error class, message and exit code of a failed command step.
#[derive(Debug)]
pub(crate) struct Failure {
    pub error_class: &'static str,
    pub message: String,
    pub exit_code: u8,
}

impl Failure {
    pub(crate) fn new(error_class: &'static str, message: impl Into<String>, exit_code: u8) -> Self {
        Self { error_class, message: message.into(), exit_code }
    }
}

impl From<ApplicationError> for Failure {
    fn from(error: ApplicationError) -> Self {
        // Operators see the detailed message, not the end-user wording.
        let InterfaceError { kind, message, .. } = InterfaceError::from(error);
        match kind {
            ErrorKind::InvalidArgument => Self::new("invalid_argument", message, 6),
            ErrorKind::NotFound => Self::new("not_found", message, 6),
            ErrorKind::PermissionDenied => Self::new("permission_denied", message, 6),
            ErrorKind::InvalidState => Self::new("invalid_state", message, 6),
            ErrorKind::Internal => Self::new("internal", message, 4),
        }
    }
}

pub(crate) fn load_config() -> Result<AppConfig, Failure> {
    AppConfig::load(LoadOptions::default()).map_err(|error| {
        Failure::new("config_validation", format!("configuration issue: {error}"), 2)
    })
}

pub(crate) fn build_runtime() -> Result<Runtime, Failure> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        Failure::new("runtime_init", format!("failed to initialize async runtime: {error}"), 3)
    })
}

/// Connects with the configured pool settings and applies pending migrations.
pub(crate) async fn open_database(config: &AppConfig) -> Result<DbPool, Failure> {
    let pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(|error| Failure::new("db_connectivity", error.to_string(), 4))?;

    migrations::run_pending(&pool)
        .await
        .map_err(|error| Failure::new("migration", error.to_string(), 5))?;

    Ok(pool)
}

/// Loads config, builds a runtime and runs `body`, folding every failure into a payload.
pub(crate) fn run_with_config<F, Fut>(command: &str, body: F) -> CommandResult
where
    F: FnOnce(AppConfig) -> Fut,
    Fut: std::future::Future<Output = Result<CommandResult, Failure>>,
{
    let config = match load_config() {
        Ok(config) => config,
        Err(failure) => return CommandResult::from_failure(command, failure),
    };

    let runtime = match build_runtime() {
        Ok(runtime) => runtime,
        Err(failure) => return CommandResult::from_failure(command, failure),
    };

    match runtime.block_on(body(config)) {
        Ok(result) => result,
        Err(failure) => CommandResult::from_failure(command, failure),
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}
