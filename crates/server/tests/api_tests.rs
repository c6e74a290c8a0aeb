//! Integration tests for the estimator HTTP API

use axum::{
    body::Body,
    http::{header, HeaderValue, Request, StatusCode},
    Router,
};
use estimator_lib::{
    regressor::{Algorithm, FittedRegressor, MeanRegressor},
    training::{Evaluation, RetrainConfig, RetrainMode},
    ArtifactMetadata, ArtifactStore, FeatureSchema, ModelArtifact, ModelLifecycle,
    PredictionService, RetrainService, StructuredLogger,
};
use estimator_server::api::{create_router, AppState, CHECKSUM_HEADER};
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const CHAMBERI: &str =
    "/predict?zona=Chamber%C3%AD&habitaciones=3&banos=2&tipovivienda=Piso&metros=90";

const TWO_ROWS: &str = "zona,habitaciones,banos,tipovivienda,metros,precio\n\
                        Chamberí,3,2,Piso,90,290000\n\
                        Chamberí,3,2,Piso,95,310000\n";

struct TestApp {
    router: Router,
    _dir: TempDir,
}

async fn setup_with_limit(max_upload_bytes: usize) -> TestApp {
    let dir = TempDir::new().unwrap();
    let lifecycle = ModelLifecycle::new(
        ArtifactStore::new(dir.path().join("model.json")),
        PredictionService::new(),
        RetrainService::new(RetrainConfig {
            algorithm: Algorithm::Mean,
            ..Default::default()
        }),
        StructuredLogger::new("api-test"),
    );
    lifecycle.load_from_store().await;
    lifecycle.health().set_ready(true);

    let state = Arc::new(AppState::new(lifecycle, max_upload_bytes));
    TestApp {
        router: create_router(state),
        _dir: dir,
    }
}

async fn setup() -> TestApp {
    setup_with_limit(16 * 1024 * 1024).await
}

fn stub(value: f64, mae: f64) -> Vec<u8> {
    ModelArtifact::new(
        FittedRegressor::Mean(MeanRegressor::constant(value)),
        mae,
        ArtifactMetadata::new(
            FeatureSchema::Full,
            Algorithm::Mean,
            RetrainMode::Fresh,
            Evaluation::Holdout,
            100,
            25,
        ),
    )
    .unwrap()
    .to_bytes()
    .unwrap()
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

async fn get(app: &TestApp, uri: &str) -> (StatusCode, Value) {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

async fn post(
    app: &TestApp,
    uri: &str,
    content_type: &str,
    body: Vec<u8>,
) -> (StatusCode, Value) {
    send(
        app,
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap(),
    )
    .await
}

async fn upload_stub(app: &TestApp, value: f64, mae: f64) {
    let (status, body) = post(app, "/upload_model", "application/json", stub(value, mae)).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
}

fn multipart(file_name: &str, content: &str) -> (String, Vec<u8>) {
    let boundary = "estimator-test-boundary";
    let body = format!(
        "--{b}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n\
         {c}\r\n\
         --{b}--\r\n",
        b = boundary,
        f = file_name,
        c = content
    );
    (
        format!("multipart/form-data; boundary={}", boundary),
        body.into_bytes(),
    )
}

#[tokio::test]
async fn test_home_lists_parameters() {
    let app = setup().await;
    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let html = String::from_utf8(body.to_vec()).unwrap();
    assert!(html.contains("/predict"));
    assert!(html.contains("metros"));
}

#[tokio::test]
async fn test_predict_without_model_is_500() {
    let app = setup().await;
    let (status, body) = get(&app, CHAMBERI).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["kind"], "model_unavailable");
}

#[tokio::test]
async fn test_end_to_end_prediction() {
    let app = setup().await;
    upload_stub(&app, 300_000.0, 20_000.0).await;

    let (status, body) = get(&app, CHAMBERI).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["zona"], "Chamberí");
    assert_eq!(body["habitaciones"], 3);
    assert_eq!(body["banos"], 2);
    assert_eq!(body["tipovivienda"], "Piso");
    assert_eq!(body["metros"], 90);
    assert_eq!(body["prediccion_precio"], 300_000.0);
    assert_eq!(body["rango_min"], 298_000);
    assert_eq!(body["rango_max"], 302_000);
    assert_eq!(body["confianza"], 0.95);

    let mensaje = body["mensaje"].as_str().unwrap();
    assert!(mensaje.contains("298000"));
    assert!(mensaje.contains("302000"));
}

#[tokio::test]
async fn test_missing_parameter_is_400() {
    let app = setup().await;
    upload_stub(&app, 300_000.0, 20_000.0).await;

    let (status, body) = get(
        &app,
        "/predict?zona=Chamber%C3%AD&habitaciones=3&tipovivienda=Piso&metros=90",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_request");
    assert_eq!(body["fields"][0], "banos (missing)");
}

#[tokio::test]
async fn test_malformed_parameters_all_reported() {
    let app = setup().await;
    upload_stub(&app, 300_000.0, 20_000.0).await;

    let (status, body) = get(
        &app,
        "/predict?zona=Centro&habitaciones=tres&banos=2&tipovivienda=Piso&metros=0",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let fields = body["fields"].as_array().unwrap();
    assert_eq!(fields.len(), 2);
}

#[tokio::test]
async fn test_repeated_query_key_is_json_error() {
    let app = setup().await;
    upload_stub(&app, 300_000.0, 20_000.0).await;

    let (status, body) = get(&app, &format!("{}&banos=3", CHAMBERI)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_request");
    assert!(body["error"].as_str().unwrap().contains("banos"));
}

#[tokio::test]
async fn test_predict_is_idempotent() {
    let app = setup().await;
    upload_stub(&app, 287_654.32, 12_345.0).await;
    assert_eq!(get(&app, CHAMBERI).await, get(&app, CHAMBERI).await);
}

#[tokio::test]
async fn test_retrain_narrows_band() {
    let app = setup().await;
    upload_stub(&app, 300_000.0, 20_000.0).await;

    let (_, before) = get(&app, CHAMBERI).await;
    assert_eq!(
        before["rango_max"].as_i64().unwrap() - before["rango_min"].as_i64().unwrap(),
        4_000
    );

    let (status, body) = post(&app, "/retrain", "text/csv", TWO_ROWS.into()).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["nuevo_mae"], 10_000.0);
    assert_eq!(body["mae_anterior"], 20_000.0);
    assert_eq!(body["mae_optimista"], true);
    assert_eq!(body["modo"], "fresh");

    let (_, after) = get(&app, CHAMBERI).await;
    assert_eq!(
        after["rango_max"].as_i64().unwrap() - after["rango_min"].as_i64().unwrap(),
        2_000
    );
}

#[tokio::test]
async fn test_retrain_without_precio_changes_nothing() {
    let app = setup().await;
    upload_stub(&app, 300_000.0, 20_000.0).await;
    let before = get(&app, CHAMBERI).await;

    let csv = "zona,habitaciones,banos,tipovivienda,metros\nChamberí,3,2,Piso,90\n";
    let (status, body) = post(&app, "/retrain", "text/csv", csv.into()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_dataset");
    assert!(body["error"].as_str().unwrap().contains("precio"));

    assert_eq!(get(&app, CHAMBERI).await, before);
    let (_, status_body) = get(&app, "/model").await;
    assert_eq!(status_body["mae"], 20_000.0);
}

#[tokio::test]
async fn test_retrain_with_json_records() {
    let app = setup().await;
    let records = serde_json::json!([
        {"zona": "Chamberí", "habitaciones": 3, "banos": 2, "tipovivienda": "Piso", "metros": 90, "precio": 290000},
        {"zona": "Chamberí", "habitaciones": "3", "banos": "2", "tipovivienda": "Piso", "metros": "95", "precio": "310000"}
    ]);
    let (status, body) = post(
        &app,
        "/retrain",
        "application/json",
        records.to_string().into_bytes(),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["mae_anterior"], Value::Null);
    assert_eq!(body["filas_entrenamiento"], 2);
}

#[tokio::test]
async fn test_retrain_with_multipart_file() {
    let app = setup().await;
    let (content_type, body) = multipart("pisos.csv", TWO_ROWS);
    let (status, response) = post(&app, "/retrain", &content_type, body).await;
    assert_eq!(status, StatusCode::OK, "{}", response);
    assert_eq!(response["nuevo_mae"], 10_000.0);

    let (status, _) = get(&app, CHAMBERI).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_retrain_unsupported_content_type() {
    let app = setup().await;
    let (status, body) = post(&app, "/retrain", "image/png", vec![0, 1, 2]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_dataset");
}

#[tokio::test]
async fn test_retrain_body_limit() {
    let app = setup_with_limit(64).await;
    let (status, _) = post(&app, "/retrain", "text/csv", TWO_ROWS.repeat(4).into()).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_malformed_upload_keeps_previous_model() {
    let app = setup().await;
    upload_stub(&app, 300_000.0, 20_000.0).await;

    let (status, body) = post(
        &app,
        "/upload_model",
        "application/json",
        br#"{"format_version": 1, "mae": 10.0}"#.to_vec(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_artifact");

    let (_, prediction) = get(&app, CHAMBERI).await;
    assert_eq!(prediction["mae"], 20_000.0);
}

#[tokio::test]
async fn test_upload_checksum_mismatch() {
    let app = setup().await;
    let bytes = stub(300_000.0, 20_000.0);

    let (status, body) = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/upload_model")
            .header(CHECKSUM_HEADER, "0000")
            .body(Body::from(bytes))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("checksum"));

    let (_, status_body) = get(&app, "/model").await;
    assert_eq!(status_body["state"], "unloaded");
}

#[tokio::test]
async fn test_upload_non_ascii_checksum_header() {
    let app = setup().await;
    upload_stub(&app, 300_000.0, 20_000.0).await;

    let (status, body) = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/upload_model")
            .header(
                CHECKSUM_HEADER,
                HeaderValue::from_bytes(b"\xffdeadbeef").unwrap(),
            )
            .body(Body::from(stub(250_000.0, 5_000.0)))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_artifact");
    assert!(body["error"].as_str().unwrap().contains("checksum"));

    let (_, status_body) = get(&app, "/model").await;
    assert_eq!(status_body["mae"], 20_000.0);
}

#[tokio::test]
async fn test_update_model_alias_and_multipart_upload() {
    let app = setup().await;
    let artifact = String::from_utf8(stub(250_000.0, 5_000.0)).unwrap();
    let (content_type, body) = multipart("model.json", &artifact);

    let (status, response) = post(&app, "/update-model", &content_type, body).await;
    assert_eq!(status, StatusCode::OK, "{}", response);
    assert_eq!(response["mae"], 5_000.0);
    assert_eq!(response["fingerprint"].as_str().unwrap().len(), 64);

    let (_, status_body) = get(&app, "/model").await;
    assert_eq!(status_body["state"], "ready");
    assert_eq!(status_body["fingerprint"], response["fingerprint"]);
    assert_eq!(status_body["metadata"]["schema"], "full");
}

#[tokio::test]
async fn test_healthz_degraded_without_model() {
    let app = setup().await;
    let (status, body) = get(&app, "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["components"]["model"]["status"], "degraded");

    upload_stub(&app, 300_000.0, 20_000.0).await;
    let (_, body) = get(&app, "/healthz").await;
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_readyz_ready_after_startup() {
    let app = setup().await;
    let (status, body) = get(&app, "/readyz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ready"], true);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup().await;
    upload_stub(&app, 300_000.0, 20_000.0).await;
    get(&app, CHAMBERI).await;

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("estimator_predictions_total"));
    assert!(text.contains("estimator_model_loaded"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_predictions_during_swaps() {
    let app = Arc::new(setup().await);
    upload_stub(&app, 100_000.0, 10_000.0).await;

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let app = Arc::clone(&app);
            tokio::spawn(async move {
                for _ in 0..50 {
                    let (status, body) = get(&app, CHAMBERI).await;
                    assert_eq!(status, StatusCode::OK);
                    let estimate = body["prediccion_precio"].as_f64().unwrap();
                    let mae = body["mae"].as_f64().unwrap();
                    // every uploaded model predicts exactly 10 * mae
                    assert_eq!(estimate, mae * 10.0);
                }
            })
        })
        .collect();

    for k in 1..=5 {
        let mae = 2_000.0 * k as f64;
        upload_stub(&app, mae * 10.0, mae).await;
    }

    for reader in readers {
        reader.await.unwrap();
    }
}
