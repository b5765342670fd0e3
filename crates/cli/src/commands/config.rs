use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use pairadox_core::config::{resolve_config_path, AppConfig, LoadOptions};
use toml::Value;

struct ConfigField {
    key_path: &'static str,
    env_keys: &'static [&'static str],
    value: String,
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = resolve_config_path(None);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in effective_fields(&config) {
        let source = field_source(
            field.key_path,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key_path, &field.value, source));
    }

    lines.join("\n")
}

fn effective_fields(config: &AppConfig) -> Vec<ConfigField> {
    let origins = if config.server.cors_allowed_origins.is_empty() {
        "<none>".to_string()
    } else {
        config.server.cors_allowed_origins.join(", ")
    };

    vec![
        ConfigField {
            key_path: "database.url",
            env_keys: &["PAIRADOX_DATABASE_URL"],
            value: config.database.url.clone(),
        },
        ConfigField {
            key_path: "database.max_connections",
            env_keys: &["PAIRADOX_DATABASE_MAX_CONNECTIONS"],
            value: config.database.max_connections.to_string(),
        },
        ConfigField {
            key_path: "database.timeout_secs",
            env_keys: &["PAIRADOX_DATABASE_TIMEOUT_SECS"],
            value: config.database.timeout_secs.to_string(),
        },
        ConfigField {
            key_path: "server.bind_address",
            env_keys: &["PAIRADOX_SERVER_BIND_ADDRESS"],
            value: config.server.bind_address.clone(),
        },
        ConfigField {
            key_path: "server.port",
            env_keys: &["PAIRADOX_SERVER_PORT"],
            value: config.server.port.to_string(),
        },
        ConfigField {
            key_path: "server.graceful_shutdown_secs",
            env_keys: &["PAIRADOX_SERVER_GRACEFUL_SHUTDOWN_SECS"],
            value: config.server.graceful_shutdown_secs.to_string(),
        },
        ConfigField {
            key_path: "server.cors_allowed_origins",
            env_keys: &["PAIRADOX_SERVER_CORS_ALLOWED_ORIGINS"],
            value: origins,
        },
        ConfigField {
            key_path: "catalog.max_upload_bytes",
            env_keys: &["PAIRADOX_CATALOG_MAX_UPLOAD_BYTES"],
            value: config.catalog.max_upload_bytes.to_string(),
        },
        ConfigField {
            key_path: "catalog.restore_on_startup",
            env_keys: &["PAIRADOX_CATALOG_RESTORE_ON_STARTUP"],
            value: config.catalog.restore_on_startup.to_string(),
        },
        ConfigField {
            key_path: "logging.level",
            env_keys: &["PAIRADOX_LOGGING_LEVEL", "PAIRADOX_LOG_LEVEL"],
            value: config.logging.level.clone(),
        },
        ConfigField {
            key_path: "logging.format",
            env_keys: &["PAIRADOX_LOGGING_FORMAT", "PAIRADOX_LOG_FORMAT"],
            value: format!("{:?}", config.logging.format),
        },
    ]
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("config file"));
            return format!("file ({})", file_path.display());
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
