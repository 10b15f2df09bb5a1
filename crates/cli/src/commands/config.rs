use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::ExposeSecret;
use serde_json::{json, Map, Value};

use vitral_core::config::{AppConfig, LoadOptions};

use crate::commands::CommandResult;

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let notifications = &config.notifications;
    let webhook_token =
        notifications.webhook_token.as_ref().map(|token| redact_token(token.expose_secret()));

    let fields = vec![
        ("database.url", config.database.url.clone(), &["VITRAL_DATABASE_URL"][..]),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["VITRAL_DATABASE_MAX_CONNECTIONS"][..],
        ),
        (
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["VITRAL_DATABASE_TIMEOUT_SECS"][..],
        ),
        ("tenant.currency", config.tenant.currency.clone(), &["VITRAL_TENANT_CURRENCY"][..]),
        (
            "tenant.quote_validity_days",
            config.tenant.quote_validity_days.to_string(),
            &["VITRAL_TENANT_QUOTE_VALIDITY_DAYS"][..],
        ),
        (
            "tenant.max_cart_items",
            config.tenant.max_cart_items.to_string(),
            &["VITRAL_TENANT_MAX_CART_ITEMS"][..],
        ),
        (
            "notifications.enabled",
            notifications.enabled.to_string(),
            &["VITRAL_NOTIFICATIONS_ENABLED"][..],
        ),
        (
            "notifications.vendor_email",
            notifications.vendor_email.clone().unwrap_or_else(|| "<unset>".to_string()),
            &["VITRAL_NOTIFICATIONS_VENDOR_EMAIL"][..],
        ),
        (
            "notifications.webhook_url",
            notifications.webhook_url.clone().unwrap_or_else(|| "<unset>".to_string()),
            &["VITRAL_NOTIFICATIONS_WEBHOOK_URL"][..],
        ),
        (
            "notifications.webhook_token",
            webhook_token.unwrap_or_else(|| "<unset>".to_string()),
            &["VITRAL_NOTIFICATIONS_WEBHOOK_TOKEN"][..],
        ),
        (
            "notifications.timeout_secs",
            notifications.timeout_secs.to_string(),
            &["VITRAL_NOTIFICATIONS_TIMEOUT_SECS"][..],
        ),
        (
            "logging.level",
            config.logging.level.clone(),
            &["VITRAL_LOGGING_LEVEL", "VITRAL_LOG_LEVEL"][..],
        ),
        (
            "logging.format",
            format!("{:?}", config.logging.format).to_ascii_lowercase(),
            &["VITRAL_LOGGING_FORMAT", "VITRAL_LOG_FORMAT"][..],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    let mut data = Map::new();
    for (key, value, env_keys) in fields {
        let origin = source(key, env_keys);
        lines.push(render_line(key, &value, &origin));
        data.insert(key.to_string(), json!({ "value": value, "source": origin }));
    }

    CommandResult::success_with_data("config", lines.join("\n"), Some(Value::Object(data)))
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("vitral.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/vitral.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<toml::Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<toml::Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&toml::Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &toml::Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: &str) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use super::{contains_path, redact_token};

    #[test]
    fn tokens_keep_only_their_prefix() {
        assert_eq!(redact_token("whk-0123456789"), "whk-***");
        assert_eq!(redact_token("opaque"), "<redacted>");
        assert_eq!(redact_token("   "), "<empty>");
    }

    #[test]
    fn dotted_paths_resolve_inside_toml_tables() {
        let doc: toml::Value =
            "[tenant]\ncurrency = \"USD\"\n".parse().expect("toml document");
        assert!(contains_path(&doc, "tenant.currency"));
        assert!(!contains_path(&doc, "tenant.quote_validity_days"));
    }
}
