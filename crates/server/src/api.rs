//! HTTP API: prediction, retraining, model upload, health and metrics

use axum::{
    body::Bytes,
    extract::{
        rejection::QueryRejection, DefaultBodyLimit, FromRequest, Multipart, Query, Request,
        State,
    },
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use estimator_lib::{
    health::ComponentStatus, DatasetIssue, EstimatorError, FeatureSchema, ModelLifecycle,
    RawFeatureRequest, TrainingDataset,
};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

/// Header carrying the expected SHA-256 of an uploaded artifact
pub const CHECKSUM_HEADER: &str = "x-artifact-sha256";

/// Multipart field holding an uploaded file
const FILE_FIELD: &str = "file";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub lifecycle: ModelLifecycle,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(lifecycle: ModelLifecycle, max_upload_bytes: usize) -> Self {
        Self {
            lifecycle,
            max_upload_bytes,
        }
    }
}

/// Error body: `{"error", "kind", "fields"}`
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<Vec<String>>,
}

/// Everything a handler can fail with
#[derive(Debug)]
pub enum ApiError {
    Estimator(EstimatorError),
    /// The body could not be read at all (too large, aborted, bad multipart)
    Body { status: StatusCode, message: String },
    /// The query string could not be decoded (bad escapes, repeated keys)
    Query(QueryRejection),
}

impl From<EstimatorError> for ApiError {
    fn from(e: EstimatorError) -> Self {
        ApiError::Estimator(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Estimator(e) => {
                let status = if e.is_client_error() {
                    StatusCode::BAD_REQUEST
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                };
                let body = ErrorBody {
                    error: e.to_string(),
                    kind: e.kind(),
                    fields: e
                        .field_issues()
                        .map(|issues| issues.iter().map(ToString::to_string).collect()),
                };
                (status, Json(body)).into_response()
            }
            ApiError::Body { status, message } => {
                let body = ErrorBody {
                    error: message,
                    kind: "invalid_body",
                    fields: None,
                };
                (status, Json(body)).into_response()
            }
            ApiError::Query(rejection) => {
                let body = ErrorBody {
                    error: rejection.body_text(),
                    kind: "invalid_request",
                    fields: None,
                };
                (rejection.status(), Json(body)).into_response()
            }
        }
    }
}

/// Usage page
async fn home(State(state): State<Arc<AppState>>) -> Html<String> {
    let full = state.lifecycle.schema() == FeatureSchema::Full;
    let mut params = String::from(
        "<li><b>zona</b> (str)</li>\
         <li><b>habitaciones</b> (int)</li>\
         <li><b>banos</b> (int)</li>",
    );
    let mut example = String::from("/predict?zona=Chamberí&habitaciones=3&banos=2");
    if full {
        params.push_str("<li><b>tipovivienda</b> (str)</li><li><b>metros</b> (int)</li>");
        example.push_str("&tipovivienda=Piso&metros=90");
    }

    Html(format!(
        "<h2>API para Predicción de Precio de Viviendas 🏡 </h2>\
         <p>Usa el endpoint <code>/predict</code> con los parámetros:</p>\
         <ul>{}</ul>\
         <p>Ejemplo: <code>{}</code></p>\
         <p>Reentrena con <code>POST /retrain</code> (CSV o JSON con la columna <b>precio</b>) \
         o sube un modelo con <code>POST /upload_model</code>.</p>",
        params, example
    ))
}

#[derive(Debug, Serialize)]
struct PredictResponse {
    zona: String,
    habitaciones: u32,
    banos: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tipovivienda: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metros: Option<u32>,
    prediccion_precio: f64,
    mensaje: String,
    rango_min: i64,
    rango_max: i64,
    mae: f64,
    confianza: f64,
}

async fn predict(
    State(state): State<Arc<AppState>>,
    query: Result<Query<RawFeatureRequest>, QueryRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let Query(request) = query.map_err(ApiError::Query)?;
    let result = state.lifecycle.predict(&request).await?;
    Ok(Json(PredictResponse {
        zona: result.inputs.zona,
        habitaciones: result.inputs.habitaciones,
        banos: result.inputs.banos,
        tipovivienda: result.inputs.tipovivienda,
        metros: result.inputs.metros,
        prediccion_precio: result.point_estimate,
        mensaje: result.message,
        rango_min: result.range.low,
        rango_max: result.range.high,
        mae: result.mae,
        confianza: result.confidence,
    }))
}

#[derive(Debug, Serialize)]
struct RetrainResponse {
    mensaje: String,
    nuevo_mae: f64,
    mae_anterior: Option<f64>,
    mae_optimista: bool,
    filas_entrenamiento: usize,
    filas_evaluacion: usize,
    modo: &'static str,
}

/// How a retrain body is encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DatasetFormat {
    Csv,
    Json,
}

async fn retrain(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<RetrainResponse>, ApiError> {
    let (bytes, format) = match content_type(request.headers()).as_str() {
        "multipart/form-data" => {
            let (bytes, is_json) = read_file_field(request).await?;
            let format = if is_json {
                DatasetFormat::Json
            } else {
                DatasetFormat::Csv
            };
            (bytes, format)
        }
        "application/json" => (read_body(request).await?, DatasetFormat::Json),
        "" | "text/csv" | "application/csv" | "text/plain" => {
            (read_body(request).await?, DatasetFormat::Csv)
        }
        other => {
            return Err(EstimatorError::from(DatasetIssue::Unreadable(format!(
                "unsupported content type '{}', \
                 send text/csv, application/json or multipart/form-data",
                other
            )))
            .into())
        }
    };

    let schema = state.lifecycle.schema();
    let dataset = tokio::task::spawn_blocking(move || parse_dataset(&bytes, format, schema))
        .await
        .map_err(|e| EstimatorError::RetrainFailed(format!("dataset parsing aborted: {}", e)))??;

    info!(rows = dataset.len(), ?format, "Retrain requested");
    let outcome = state.lifecycle.retrain(dataset).await?;
    let artifact = &outcome.artifact;
    let metadata = artifact.metadata();

    let mut mensaje = String::from("Modelo reentrenado y activado correctamente.");
    if artifact.mae_optimistic() {
        mensaje.push_str(
            " Atención: el conjunto de datos es demasiado pequeño para reservar una partición \
             de evaluación; el MAE se ha medido sobre las filas de entrenamiento y es optimista.",
        );
    }

    Ok(Json(RetrainResponse {
        mensaje,
        nuevo_mae: artifact.mae(),
        mae_anterior: outcome.previous_mae,
        mae_optimista: artifact.mae_optimistic(),
        filas_entrenamiento: metadata.training_rows,
        filas_evaluacion: metadata.evaluation_rows,
        modo: metadata.mode.as_str(),
    }))
}

fn parse_dataset(
    bytes: &[u8],
    format: DatasetFormat,
    schema: FeatureSchema,
) -> Result<TrainingDataset, EstimatorError> {
    match format {
        DatasetFormat::Csv => TrainingDataset::from_csv(bytes, schema),
        DatasetFormat::Json => {
            let value: serde_json::Value = serde_json::from_slice(bytes)
                .map_err(|e| DatasetIssue::Unreadable(format!("invalid JSON: {}", e)))?;
            TrainingDataset::from_json(&value, schema)
        }
    }
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    mensaje: String,
    mae: f64,
    fingerprint: String,
}

async fn upload_model(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<UploadResponse>, ApiError> {
    let expected = match request.headers().get(CHECKSUM_HEADER) {
        Some(value) => Some(
            value
                .to_str()
                .map_err(|_| {
                    EstimatorError::InvalidArtifact(
                        "checksum header is not valid ASCII hex".to_string(),
                    )
                })?
                .to_string(),
        ),
        None => None,
    };

    let bytes = if content_type(request.headers()) == "multipart/form-data" {
        read_file_field(request).await?.0
    } else {
        read_body(request).await?
    };

    let artifact = state
        .lifecycle
        .activate_upload(bytes.to_vec(), expected.as_deref())
        .await?;

    Ok(Json(UploadResponse {
        mensaje: "Modelo actualizado correctamente.".to_string(),
        mae: artifact.mae(),
        fingerprint: artifact.fingerprint().to_string(),
    }))
}

async fn model_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.lifecycle.status().await)
}

/// 200 while at least degraded, 503 when a component is unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.lifecycle.health().health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.lifecycle.health().readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    )
        .into_response()
}

/// Media type without parameters, lowercased
fn content_type(headers: &HeaderMap) -> String {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_ascii_lowercase())
        .unwrap_or_default()
}

async fn read_body(request: Request) -> Result<Bytes, ApiError> {
    Bytes::from_request(request, &())
        .await
        .map_err(|rejection| ApiError::Body {
            status: rejection.status(),
            message: rejection.body_text(),
        })
}

/// Bytes of the `file` field, and whether it looks like JSON
async fn read_file_field(request: Request) -> Result<(Bytes, bool), ApiError> {
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|rejection| ApiError::Body {
            status: rejection.status(),
            message: rejection.body_text(),
        })?;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let is_json = field.content_type() == Some("application/json")
            || field
                .file_name()
                .is_some_and(|name| name.to_ascii_lowercase().ends_with(".json"));
        let bytes = field.bytes().await.map_err(multipart_error)?;
        return Ok((bytes, is_json));
    }

    Err(ApiError::Body {
        status: StatusCode::BAD_REQUEST,
        message: format!("multipart body has no '{}' field", FILE_FIELD),
    })
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::Body {
        status: e.status(),
        message: e.body_text(),
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let limit = state.max_upload_bytes;
    Router::new()
        .route("/", get(home))
        .route("/predict", get(predict))
        .route("/retrain", post(retrain))
        .route("/upload_model", post(upload_model))
        .route("/update-model", post(upload_model))
        .route("/model", get(model_status))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .layer(DefaultBodyLimit::max(limit))
        .with_state(state)
}

/// Start the API server, stopping when `shutdown` resolves
pub async fn serve(
    address: &str,
    port: u16,
    state: Arc<AppState>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("{}:{}", address, port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
