//! API client for the price estimator service

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use url::Url;

/// Header carrying the expected SHA-256 of an uploaded artifact
pub const CHECKSUM_HEADER: &str = "x-artifact-sha256";

/// API client for the estimator service
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).context("Invalid path")
    }

    /// GET with query parameters
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let request = self.client.get(self.url(path)?).query(query);
        Self::send(request).await
    }

    /// POST a raw body with the given content type and extra headers
    pub async fn post_bytes<T: DeserializeOwned>(
        &self,
        path: &str,
        content_type: &str,
        body: Vec<u8>,
        headers: &[(&str, String)],
    ) -> Result<T> {
        let mut request = self
            .client
            .post(self.url(path)?)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body);
        for (name, value) in headers {
            request = request.header(*name, value);
        }
        Self::send(request).await
    }

    async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
        let response = request.send().await.context("Failed to send request")?;
        let response = Self::check(response).await?;
        response.json().await.context("Failed to parse response")
    }

    /// Turn a non-success response into an error carrying the service's reason
    async fn check(response: Response) -> Result<Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorResponse>(&body) {
            Ok(error) => anyhow::bail!("API error ({}): {}", status, error.describe()),
            Err(_) => anyhow::bail!("API error ({}): {}", status, body),
        }
    }
}

// API response types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    pub zona: String,
    pub habitaciones: u32,
    pub banos: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tipovivienda: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metros: Option<u32>,
    pub prediccion_precio: f64,
    pub mensaje: String,
    pub rango_min: i64,
    pub rango_max: i64,
    pub mae: f64,
    pub confianza: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrainResponse {
    pub mensaje: String,
    pub nuevo_mae: f64,
    pub mae_anterior: Option<f64>,
    pub mae_optimista: bool,
    pub filas_entrenamiento: usize,
    pub filas_evaluacion: usize,
    pub modo: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub mensaje: String,
    pub mae: f64,
    pub fingerprint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelStatus {
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mae: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mae_optimistic: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ModelMetadata>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub schema: String,
    pub algorithm: String,
    pub mode: String,
    pub evaluation: String,
    pub training_rows: usize,
    pub evaluation_rows: usize,
    pub trained_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
}

impl ErrorResponse {
    fn describe(&self) -> String {
        match &self.fields {
            Some(fields) if !fields.is_empty() => {
                format!("{} [{}]", self.kind, fields.join(", "))
            }
            _ => self.error.clone(),
        }
    }
}
