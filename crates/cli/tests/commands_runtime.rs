use std::env;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, OnceLock};

use pairadox_cli::commands::predict::PredictArgs;
use pairadox_cli::commands::{config, doctor, migrate, predict};
use serde_json::Value;

const CATALOG: &str = "\
code;label;market;segment;category;family;price;origin;premium
A;Cola BRAND 1 0.5L;Food;Drinks;Soda;F1;100;RO;no
B;Cola BRAND 1 1L;Food;Drinks;Soda;F1;100;RO;no
C;Lemonade BRAND 1;Food;Drinks;Soda;F2;500;RO;no
D;Lemonade BRAND 2;Food;Drinks;Soda;F2;100;RO;no
";

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[("PAIRADOX_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_reports_applied_versions_then_up_to_date() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite://{}", dir.path().join("migrate.db").display());

    with_env(&[("PAIRADOX_DATABASE_URL", &url)], || {
        let first = migrate::run();
        assert_eq!(first.exit_code, 0, "{}", first.output);
        assert_eq!(parse_payload(&first.output)["message"], "applied 1 migration(s): 1");

        let second = migrate::run();
        assert_eq!(second.exit_code, 0, "{}", second.output);
        assert_eq!(parse_payload(&second.output)["message"], "catalog schema already up to date");
    });
}

#[test]
fn migrate_returns_config_failure_for_invalid_env() {
    with_env(&[("PAIRADOX_DATABASE_MAX_CONNECTIONS", "many")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn config_reports_env_sources() {
    with_env(
        &[("PAIRADOX_DATABASE_URL", "sqlite::memory:"), ("PAIRADOX_SERVER_PORT", "9123")],
        || {
            let output = config::run();

            assert!(output.contains("- database.url = sqlite::memory: (source: env (PAIRADOX_DATABASE_URL))"));
            assert!(output.contains("- server.port = 9123 (source: env (PAIRADOX_SERVER_PORT))"));
            assert!(output.contains("- catalog.restore_on_startup = true (source: default)"));
        },
    );
}

#[test]
fn doctor_passes_after_migrate_on_file_database() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite://{}", dir.path().join("doctor.db").display());

    with_env(&[("PAIRADOX_DATABASE_URL", &url)], || {
        let before = doctor::run(true);
        assert_eq!(before.exit_code, 1, "schema should be reported as pending");
        let report = parse_payload(&before.output);
        assert_eq!(report["overall_status"], "fail");
        assert_eq!(check_status(&report, "database_connectivity"), "pass");
        assert_eq!(check_status(&report, "schema_migrations"), "fail");

        assert_eq!(migrate::run().exit_code, 0);

        let after = doctor::run(true);
        assert_eq!(after.exit_code, 0, "expected all checks to pass: {}", after.output);
        let report = parse_payload(&after.output);
        assert_eq!(report["overall_status"], "pass");
    });
}

#[test]
fn doctor_skips_database_checks_when_config_fails() {
    with_env(&[("PAIRADOX_SERVER_PORT", "not-a-port")], || {
        let result = doctor::run(false);

        assert_eq!(result.exit_code, 1);
        assert!(result.output.contains("- [fail] config_validation"));
        assert!(result.output.contains("- [skip] database_connectivity"));
        assert!(result.output.contains("- [skip] schema_migrations"));
    });
}

#[test]
fn predict_ranks_substitutes_from_catalog_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let catalog = write_catalog(dir.path());

    let result = predict::run(&PredictArgs {
        catalog,
        product: "A".to_string(),
        feedback: Vec::new(),
    });
    assert_eq!(result.exit_code, 0, "unexpected failure: {}", result.output);

    let prediction = parse_payload(&result.output);
    assert_eq!(prediction["product_id"], "A");
    assert_eq!(prediction["substitutes"], serde_json::json!(["B", "C"]));
    assert_eq!(prediction["confidences"]["B"], 100.0);
    assert_eq!(prediction["confidences"]["C"], 30.0);
}

#[test]
fn predict_replays_feedback_before_ranking() {
    let dir = tempfile::tempdir().expect("tempdir");
    let catalog = write_catalog(dir.path());

    let result = predict::run(&PredictArgs {
        catalog,
        product: "A".to_string(),
        feedback: vec!["A=C".to_string(), "A=C".to_string()],
    });
    assert_eq!(result.exit_code, 0, "unexpected failure: {}", result.output);

    let prediction = parse_payload(&result.output);
    assert_eq!(prediction["confidences"]["C"], 100.0);
    assert_eq!(prediction["confidences"]["B"], 0.0);
}

#[test]
fn predict_reports_error_classes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let catalog = write_catalog(dir.path());

    let unknown = predict::run(&PredictArgs {
        catalog: catalog.clone(),
        product: "Z".to_string(),
        feedback: Vec::new(),
    });
    assert_eq!(unknown.exit_code, 5);
    assert_eq!(parse_payload(&unknown.output)["error_class"], "not_found");

    let bad_feedback = predict::run(&PredictArgs {
        catalog,
        product: "A".to_string(),
        feedback: vec!["A->C".to_string()],
    });
    assert_eq!(bad_feedback.exit_code, 2);
    assert_eq!(parse_payload(&bad_feedback.output)["error_class"], "invalid_argument");

    let missing = predict::run(&PredictArgs {
        catalog: dir.path().join("missing.csv"),
        product: "A".to_string(),
        feedback: Vec::new(),
    });
    assert_eq!(missing.exit_code, 3);
    assert_eq!(parse_payload(&missing.output)["error_class"], "catalog_read");

    let malformed = dir.path().join("malformed.csv");
    fs::write(&malformed, "code;label;market\nA;Cola;Food\n").expect("write malformed");
    let result = predict::run(&PredictArgs {
        catalog: malformed,
        product: "A".to_string(),
        feedback: Vec::new(),
    });
    assert_eq!(result.exit_code, 4);
    assert_eq!(parse_payload(&result.output)["error_class"], "catalog_format");

    let mislabeled = dir.path().join("catalog.xlsx");
    fs::write(&mislabeled, CATALOG).expect("write mislabeled");
    let result = predict::run(&PredictArgs {
        catalog: mislabeled,
        product: "A".to_string(),
        feedback: Vec::new(),
    });
    assert_eq!(result.exit_code, 4);
    let payload = parse_payload(&result.output);
    assert!(payload["message"].as_str().unwrap_or_default().contains("unreadable workbook"));
}

fn write_catalog(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("catalog.csv");
    fs::write(&path, CATALOG).expect("write catalog");
    path
}

fn check_status(report: &Value, name: &str) -> String {
    report["checks"]
        .as_array()
        .expect("checks array")
        .iter()
        .find(|check| check["name"] == name)
        .and_then(|check| check["status"].as_str())
        .unwrap_or_default()
        .to_string()
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "PAIRADOX_DATABASE_URL",
        "PAIRADOX_DATABASE_MAX_CONNECTIONS",
        "PAIRADOX_DATABASE_TIMEOUT_SECS",
        "PAIRADOX_SERVER_BIND_ADDRESS",
        "PAIRADOX_SERVER_PORT",
        "PAIRADOX_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "PAIRADOX_SERVER_CORS_ALLOWED_ORIGINS",
        "PAIRADOX_CATALOG_MAX_UPLOAD_BYTES",
        "PAIRADOX_CATALOG_RESTORE_ON_STARTUP",
        "PAIRADOX_LOGGING_LEVEL",
        "PAIRADOX_LOGGING_FORMAT",
        "PAIRADOX_LOG_LEVEL",
        "PAIRADOX_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
