use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cpq::metadata::TenantSettings;
use crate::cpq::validation::MAX_CART_ITEMS;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub tenant: TenantConfig,
    pub notifications: NotificationConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct TenantConfig {
    pub currency: String,
    pub quote_validity_days: u32,
    pub max_cart_items: usize,
}

#[derive(Clone, Debug)]
pub struct NotificationConfig {
    pub enabled: bool,
    pub vendor_email: Option<String>,
    pub webhook_url: Option<String>,
    pub webhook_token: Option<SecretString>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub currency: Option<String>,
    pub quote_validity_days: Option<u32>,
    pub notifications_enabled: Option<bool>,
    pub webhook_url: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://vitral.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            tenant: TenantConfig {
                currency: "COP".to_string(),
                quote_validity_days: 15,
                max_cart_items: MAX_CART_ITEMS,
            },
            notifications: NotificationConfig {
                enabled: false,
                vendor_email: None,
                webhook_url: None,
                webhook_token: None,
                timeout_secs: 10,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("vitral.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// Tenant parameters handed to the quote metadata calculator and lifecycle service.
    pub fn tenant_settings(&self) -> TenantSettings {
        TenantSettings {
            currency: self.tenant.currency.clone(),
            quote_validity_days: self.tenant.quote_validity_days,
            max_cart_items: self.tenant.max_cart_items,
        }
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(tenant) = patch.tenant {
            if let Some(currency) = tenant.currency {
                self.tenant.currency = currency;
            }
            if let Some(quote_validity_days) = tenant.quote_validity_days {
                self.tenant.quote_validity_days = quote_validity_days;
            }
            if let Some(max_cart_items) = tenant.max_cart_items {
                self.tenant.max_cart_items = max_cart_items;
            }
        }

        if let Some(notifications) = patch.notifications {
            if let Some(enabled) = notifications.enabled {
                self.notifications.enabled = enabled;
            }
            if let Some(vendor_email) = notifications.vendor_email {
                self.notifications.vendor_email = Some(vendor_email);
            }
            if let Some(webhook_url) = notifications.webhook_url {
                self.notifications.webhook_url = Some(webhook_url);
            }
            if let Some(webhook_token) = notifications.webhook_token {
                self.notifications.webhook_token = Some(webhook_token.into());
            }
            if let Some(timeout_secs) = notifications.timeout_secs {
                self.notifications.timeout_secs = timeout_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("VITRAL_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("VITRAL_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("VITRAL_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("VITRAL_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("VITRAL_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("VITRAL_TENANT_CURRENCY") {
            self.tenant.currency = value;
        }
        if let Some(value) = read_env("VITRAL_TENANT_QUOTE_VALIDITY_DAYS") {
            self.tenant.quote_validity_days =
                parse_u32("VITRAL_TENANT_QUOTE_VALIDITY_DAYS", &value)?;
        }
        if let Some(value) = read_env("VITRAL_TENANT_MAX_CART_ITEMS") {
            self.tenant.max_cart_items = parse_usize("VITRAL_TENANT_MAX_CART_ITEMS", &value)?;
        }

        if let Some(value) = read_env("VITRAL_NOTIFICATIONS_ENABLED") {
            self.notifications.enabled = parse_bool("VITRAL_NOTIFICATIONS_ENABLED", &value)?;
        }
        if let Some(value) = read_env("VITRAL_NOTIFICATIONS_VENDOR_EMAIL") {
            self.notifications.vendor_email = Some(value);
        }
        if let Some(value) = read_env("VITRAL_NOTIFICATIONS_WEBHOOK_URL") {
            self.notifications.webhook_url = Some(value);
        }
        if let Some(value) = read_env("VITRAL_NOTIFICATIONS_WEBHOOK_TOKEN") {
            self.notifications.webhook_token = Some(value.into());
        }
        if let Some(value) = read_env("VITRAL_NOTIFICATIONS_TIMEOUT_SECS") {
            self.notifications.timeout_secs =
                parse_u64("VITRAL_NOTIFICATIONS_TIMEOUT_SECS", &value)?;
        }

        let log_level = read_env("VITRAL_LOGGING_LEVEL").or_else(|| read_env("VITRAL_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("VITRAL_LOGGING_FORMAT").or_else(|| read_env("VITRAL_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(currency) = overrides.currency {
            self.tenant.currency = currency;
        }
        if let Some(quote_validity_days) = overrides.quote_validity_days {
            self.tenant.quote_validity_days = quote_validity_days;
        }
        if let Some(enabled) = overrides.notifications_enabled {
            self.notifications.enabled = enabled;
        }
        if let Some(webhook_url) = overrides.webhook_url {
            self.notifications.webhook_url = Some(webhook_url);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_tenant(&self.tenant)?;
        validate_notifications(&self.notifications)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("vitral.toml"), PathBuf::from("config/vitral.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_tenant(tenant: &TenantConfig) -> Result<(), ConfigError> {
    let currency = tenant.currency.as_str();
    if currency.len() != 3 || !currency.chars().all(|ch| ch.is_ascii_uppercase()) {
        return Err(ConfigError::Validation(format!(
            "tenant.currency must be a 3-letter uppercase ISO 4217 code (got `{currency}`)"
        )));
    }

    if tenant.quote_validity_days == 0 || tenant.quote_validity_days > 365 {
        return Err(ConfigError::Validation(
            "tenant.quote_validity_days must be in range 1..=365".to_string(),
        ));
    }

    if tenant.max_cart_items == 0 {
        return Err(ConfigError::Validation(
            "tenant.max_cart_items must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_notifications(notifications: &NotificationConfig) -> Result<(), ConfigError> {
    if let Some(url) = &notifications.webhook_url {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "notifications.webhook_url must start with http:// or https://".to_string(),
            ));
        }
    }

    if let Some(email) = &notifications.vendor_email {
        if !email.contains('@') {
            return Err(ConfigError::Validation(format!(
                "notifications.vendor_email `{email}` is not an email address"
            )));
        }
    }

    let has_token = notifications
        .webhook_token
        .as_ref()
        .map(|token| !token.expose_secret().trim().is_empty())
        .unwrap_or(false);
    if has_token && notifications.webhook_url.is_none() {
        return Err(ConfigError::Validation(
            "notifications.webhook_token is set but notifications.webhook_url is missing"
                .to_string(),
        ));
    }

    if notifications.timeout_secs == 0 || notifications.timeout_secs > 120 {
        return Err(ConfigError::Validation(
            "notifications.timeout_secs must be in range 1..=120".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn invalid_override(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| invalid_override(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| invalid_override(key, value))
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| invalid_override(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| invalid_override(key, value))
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    tenant: Option<TenantPatch>,
    notifications: Option<NotificationPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct TenantPatch {
    currency: Option<String>,
    quote_validity_days: Option<u32>,
    max_cart_items: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct NotificationPatch {
    enabled: Option<bool>,
    vendor_email: Option<String>,
    webhook_url: Option<String>,
    webhook_token: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
