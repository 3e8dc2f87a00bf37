//! HTTP adapter: a small axum service around [`process_async`].
//!
//! ## Routes
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | `POST` | `/api/invert` | multipart upload: `pdf` (file), `mode` (text, default `reading`) |
//! | `OPTIONS` | any | answered by the CORS layer: 200 with permissive headers |
//! | `GET` | `/health` | liveness |
//!
//! A successful upload is answered with the inverted PDF as
//! `application/pdf`. Failures carry a JSON body `{"error": "..."}` and a
//! status derived from [`ErrorKind`]:
//!
//! | Failure | Status |
//! |---------|--------|
//! | malformed multipart, missing `pdf`, unknown `mode` | 400 |
//! | not a PDF / corrupt / encrypted | 400 |
//! | PDF with zero pages | 422 |
//! | upload over the body limit | 413 |
//! | anything else | 500 |
//!
//! ```bash
//! curl -F pdf=@paper.pdf -F mode=presentation \
//!   http://localhost:3000/api/invert -o paper_inverted.pdf
//! ```

use crate::config::{InversionConfig, Mode};
use crate::convert::process_async;
use crate::error::{ErrorKind, InvertError};
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::header::{self, HeaderName, HeaderValue};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Default request body cap: 100 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// Multipart field carrying the PDF.
const PDF_FIELD: &str = "pdf";
/// Multipart field carrying the mode name.
const MODE_FIELD: &str = "mode";

const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Header reporting the page count of the returned PDF.
pub const PAGE_COUNT_HEADER: &str = "x-page-count";
/// Header reporting the DPI the pages were rendered at.
pub const RENDER_DPI_HEADER: &str = "x-render-dpi";

/// Shared state handed to every request.
#[derive(Debug, Clone)]
pub struct ServerState {
    /// Base configuration. Each request clones it and sets its own mode.
    pub config: Arc<InversionConfig>,
    pub max_upload_bytes: usize,
}

impl ServerState {
    pub fn new(config: InversionConfig) -> Self {
        Self {
            config: Arc::new(config),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }
}

/// Build the application router.
pub fn router(state: ServerState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS, Method::GET])
        .allow_headers([header::CONTENT_TYPE])
        .expose_headers([
            header::CONTENT_DISPOSITION,
            HeaderName::from_static(PAGE_COUNT_HEADER),
            HeaderName::from_static(RENDER_DPI_HEADER),
        ]);

    Router::new()
        .route("/api/invert", post(invert_upload))
        .route("/health", get(health_check))
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Error body returned for every failed request.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// A failure on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

impl From<InvertError> for ApiError {
    fn from(err: InvertError) -> Self {
        let status = match err.kind() {
            ErrorKind::InvalidDocument => StatusCode::BAD_REQUEST,
            ErrorKind::EmptyDocument => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Processing => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        Self {
            status: rejection.status(),
            message: format!("Invalid multipart request: {}", rejection.body_text()),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self {
            status: err.status(),
            message: format!("Failed to read multipart body: {}", err.body_text()),
        }
    }
}

/// The parts of the upload the handler cares about.
#[derive(Debug, Default)]
struct Upload {
    pdf: Option<Vec<u8>>,
    file_name: Option<String>,
    mode: Option<String>,
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload, ApiError> {
    let mut upload = Upload::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(PDF_FIELD) => {
                upload.file_name = field.file_name().map(str::to_string);
                upload.pdf = Some(field.bytes().await?.to_vec());
            }
            Some(MODE_FIELD) => {
                upload.mode = Some(field.text().await?);
            }
            other => debug!("Ignoring multipart field {:?}", other),
        }
    }
    Ok(upload)
}

/// `POST /api/invert`
async fn invert_upload(
    State(state): State<ServerState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let upload = read_upload(multipart?).await.inspect_err(|e| {
        warn!(status = %e.status, "Rejected upload: {}", e.message);
    })?;

    let pdf = match upload.pdf {
        Some(bytes) if !bytes.is_empty() => bytes,
        _ => {
            warn!("Rejected upload without PDF data");
            return Err(ApiError::bad_request("No PDF data found"));
        }
    };

    let mode = match upload.mode.as_deref().map(str::trim) {
        None | Some("") => Mode::default(),
        Some(name) => name.parse::<Mode>().map_err(|e| {
            warn!("Rejected upload with unknown mode {:?}", name);
            ApiError::bad_request(e.to_string())
        })?,
    };

    info!(bytes = pdf.len(), %mode, "Inverting uploaded PDF");

    let mut config = (*state.config).clone();
    config.mode = mode;

    let output = process_async(pdf, config).await.map_err(|e| {
        let api = ApiError::from(e);
        warn!(status = %api.status, "Inversion failed: {}", api.message);
        api
    })?;

    let disposition = format!(
        "attachment; filename=\"{}_inverted.pdf\"",
        download_stem(upload.file_name.as_deref())
    );
    let headers = [
        (header::CONTENT_TYPE, HeaderValue::from_static(PDF_CONTENT_TYPE)),
        (
            header::CONTENT_DISPOSITION,
            HeaderValue::from_str(&disposition)
                .unwrap_or_else(|_| HeaderValue::from_static("attachment")),
        ),
        (
            HeaderName::from_static(PAGE_COUNT_HEADER),
            HeaderValue::from(output.stats.page_count),
        ),
        (
            HeaderName::from_static(RENDER_DPI_HEADER),
            HeaderValue::from(output.stats.effective_dpi),
        ),
    ];

    Ok((StatusCode::OK, headers, output.pdf).into_response())
}

/// `GET /health`
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// File stem for the download name, restricted to header-safe characters.
fn download_stem(file_name: Option<&str>) -> String {
    let stem = file_name
        .map(std::path::Path::new)
        .and_then(|p| p.file_stem())
        .and_then(|s| s.to_str())
        .unwrap_or("");
    let cleaned: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim().is_empty() {
        "document".to_string()
    } else {
        cleaned
    }
}
