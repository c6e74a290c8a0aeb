//! CLI integration tests

use std::path::Path;
use std::process::{Command, Output};

/// Run the built binary with an isolated home directory
fn run_cli(home: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_estimator"))
        .args(args)
        .env("HOME", home)
        .env_remove("ESTIMATOR_API_URL")
        .output()
        .expect("Failed to execute command")
}

const TRAINING_CSV: &str = "zona,habitaciones,banos,precio\n\
    Centro,2,1,250000\n\
    Centro,3,2,320000\n\
    Retiro,1,1,180000\n\
    Retiro,2,2,260000\n\
    Salamanca,3,2,450000\n\
    Salamanca,4,3,600000\n";

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let home = tempfile::TempDir::new().unwrap();
    let output = run_cli(home.path(), &["--help"]);

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(
        stdout.contains("Property Price Estimator"),
        "Should show app name"
    );
    for command in ["predict", "retrain", "upload-model", "status", "train", "zones"] {
        assert!(stdout.contains(command), "Should show {} command", command);
    }
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let home = tempfile::TempDir::new().unwrap();
    let output = run_cli(home.path(), &["--version"]);

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("estimator"), "Should show binary name");
}

/// Test predict subcommand help
#[test]
fn test_predict_help() {
    let home = tempfile::TempDir::new().unwrap();
    let output = run_cli(home.path(), &["predict", "--help"]);

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Predict help should succeed");
    for option in ["--zona", "--habitaciones", "--banos", "--tipovivienda", "--metros"] {
        assert!(stdout.contains(option), "Should show {} option", option);
    }
}

/// Test that predict requires its features
#[test]
fn test_predict_missing_argument() {
    let home = tempfile::TempDir::new().unwrap();
    let output = run_cli(home.path(), &["predict", "--zona", "Centro", "--banos", "1"]);

    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "Missing argument should fail");
    assert!(stderr.contains("--habitaciones"), "Should name the missing option");
}

/// Test that retrain takes exactly one source
#[test]
fn test_retrain_sources_conflict() {
    let home = tempfile::TempDir::new().unwrap();

    let none = run_cli(home.path(), &["retrain"]);
    assert!(!none.status.success(), "Retrain without a source should fail");

    let both = run_cli(
        home.path(),
        &["retrain", "--file", "rows.csv", "--record", "{}"],
    );
    assert!(!both.status.success(), "Retrain with two sources should fail");
}

/// Test that an unknown schema is rejected by the argument parser
#[test]
fn test_train_unknown_schema() {
    let home = tempfile::TempDir::new().unwrap();
    let output = run_cli(
        home.path(),
        &["train", "--data", "rows.csv", "--output", "m.json", "--schema", "v3"],
    );

    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(stderr.contains("unknown schema"), "Should explain the schema error");
}

/// Test offline training end to end
#[test]
fn test_train_offline() {
    let home = tempfile::TempDir::new().unwrap();
    let data = home.path().join("rows.csv");
    let model = home.path().join("model").join("model.json");
    std::fs::write(&data, TRAINING_CSV).unwrap();

    let output = run_cli(
        home.path(),
        &[
            "--format",
            "json",
            "train",
            "--data",
            data.to_str().unwrap(),
            "--output",
            model.to_str().unwrap(),
            "--schema",
            "basic",
            "--algorithm",
            "mean",
        ],
    );

    assert!(
        output.status.success(),
        "Train should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(model.exists(), "Artifact should be written");

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["metadata"]["schema"], "basic");
    assert_eq!(report["metadata"]["evaluation"], "holdout");
    assert_eq!(report["metadata"]["training_rows"], 4);
    assert_eq!(report["metadata"]["evaluation_rows"], 2);
}

/// Test that a dataset without required columns fails offline training
#[test]
fn test_train_missing_columns() {
    let home = tempfile::TempDir::new().unwrap();
    let data = home.path().join("rows.csv");
    let model = home.path().join("model.json");
    std::fs::write(&data, TRAINING_CSV).unwrap();

    let output = run_cli(
        home.path(),
        &[
            "train",
            "--data",
            data.to_str().unwrap(),
            "--output",
            model.to_str().unwrap(),
        ],
    );

    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(stderr.contains("tipovivienda"), "Should name missing columns");
    assert!(!model.exists(), "No artifact should be written");
}

/// Test zone listing from a GeoJSON map
#[test]
fn test_zones_geojson() {
    let home = tempfile::TempDir::new().unwrap();
    let map = home.path().join("madrid.geojson");
    std::fs::write(
        &map,
        r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","properties":{"NOMBRE":"Tetuán"}},
            {"type":"Feature","properties":{"NOMBRE":"Arganzuela"}}
        ]}"#,
    )
    .unwrap();

    let output = run_cli(
        home.path(),
        &["--format", "json", "zones", "--geojson", map.to_str().unwrap()],
    );

    assert!(output.status.success());
    let zones: Vec<String> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(zones, vec!["Arganzuela", "Tetuán"]);
}

/// Test predict against a stubbed service
#[test]
fn test_predict_against_service() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/predict")
        .match_query(mockito::Matcher::AllOf(vec![
            mockito::Matcher::UrlEncoded("zona".into(), "Centro".into()),
            mockito::Matcher::UrlEncoded("habitaciones".into(), "2".into()),
            mockito::Matcher::UrlEncoded("banos".into(), "1".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"zona":"Centro","habitaciones":2,"banos":1,"prediccion_precio":250000.0,
                "mensaje":"El precio estimado es 250000.00 €","rango_min":249000,
                "rango_max":251000,"mae":10000.0,"confianza":0.95}"#,
        )
        .create();

    let home = tempfile::TempDir::new().unwrap();
    let output = run_cli(
        home.path(),
        &[
            "--api-url",
            &server.url(),
            "predict",
            "--zona",
            "Centro",
            "--habitaciones",
            "2",
            "--banos",
            "1",
        ],
    );

    mock.assert();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("249.000 €"), "Should show the range: {}", stdout);
}

/// Test that service errors are reported with a failing exit code
#[test]
fn test_status_service_error() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/model")
        .with_status(500)
        .with_body(r#"{"error":"model unavailable: no model loaded","kind":"model_unavailable"}"#)
        .create();

    let home = tempfile::TempDir::new().unwrap();
    let output = run_cli(home.path(), &["--api-url", &server.url(), "status"]);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!output.status.success());
    assert!(stderr.contains("no model loaded"), "Should surface the reason: {}", stderr);
}

/// Test that the config file supplies the API URL
#[test]
fn test_config_file_api_url() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/model")
        .with_status(200)
        .with_body(r#"{"state":"unloaded"}"#)
        .create();

    let home = tempfile::TempDir::new().unwrap();
    let config_dir = home.path().join(".config").join("estimator");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(
        config_dir.join("config.json"),
        format!(r#"{{"api_url": "{}", "default_format": "json"}}"#, server.url()),
    )
    .unwrap();

    let output = run_cli(home.path(), &["status"]);

    mock.assert();
    assert!(output.status.success());
    let status: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(status["state"], "unloaded");
}
