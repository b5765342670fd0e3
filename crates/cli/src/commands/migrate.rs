use pairadox_core::config::{AppConfig, LoadOptions};
use pairadox_db::{connect_with_settings, migrations};

use crate::commands::CommandResult;

const COMMAND: &str = "migrate";

/// Brings the catalog schema up to date and names the versions it applied.
pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let applied = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        let pending = migrations::pending_versions(&pool).await.map_err(|error| {
            ("migration", format!("failed to read migration history: {error}"), 5u8)
        })?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;
        pool.close().await;
        Ok::<Vec<i64>, (&'static str, String, u8)>(pending)
    });

    match applied {
        Ok(versions) => CommandResult::success(COMMAND, describe_applied(&versions)),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure(COMMAND, error_class, message, exit_code)
        }
    }
}

fn describe_applied(versions: &[i64]) -> String {
    if versions.is_empty() {
        return "catalog schema already up to date".to_string();
    }
    let listed: Vec<String> = versions.iter().map(i64::to_string).collect();
    format!("applied {} migration(s): {}", versions.len(), listed.join(", "))
}
