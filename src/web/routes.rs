//! HTTP routes for the web server
//!
//! Upload page, PDF validation, report download, configuration and health
//! endpoints. Every error is answered with a JSON body carrying a stable
//! `code` string.

use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, Multipart, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use base64::Engine;
use image::{DynamicImage, ImageFormat};
use rust_embed::RustEmbed;
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::server::ServerConfig;
use super::REPORT_FILENAME_PREFIX;
use crate::config::Config;
use crate::page_number::{PageNumberError, PageValidator, RegionSpec, ValidationReport};
use crate::report;
use crate::util::{format_file_size, has_pdf_extension};

/// Static files served by the upload page
#[derive(RustEmbed)]
#[folder = "assets/"]
struct Assets;

/// Application state shared across handlers
pub struct AppState {
    pub validator: Arc<PageValidator>,
    pub config: Arc<Config>,
    pub upload_dir: PathBuf,
    pub max_file_size: Option<u64>,
    pub version: String,
}

impl AppState {
    pub fn new(validator: Arc<PageValidator>, config: Config, server: &ServerConfig) -> Self {
        Self {
            validator,
            config: Arc::new(config),
            upload_dir: server.upload_dir.clone(),
            max_file_size: server.upload_limit,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Build the application router
pub fn app_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(index))
        .route("/favicon.ico", get(favicon))
        .route("/api/validate", post(validate_upload))
        .route("/api/report/download", post(download_report))
        .route("/api/config", get(get_config))
        .route("/api/health", get(health_check))
}

// ============================================================
// Pages
// ============================================================

async fn index() -> Result<Html<String>, AppError> {
    let page = Assets::get("index.html")
        .ok_or_else(|| AppError::internal("Upload page is missing from the build"))?;
    Ok(Html(String::from_utf8_lossy(&page.data).into_owned()))
}

async fn favicon() -> StatusCode {
    StatusCode::NO_CONTENT
}

// ============================================================
// Validation
// ============================================================

/// Per-page entry of a validation response
#[derive(Debug, Serialize)]
pub struct PagePayload {
    pub page_index: usize,
    pub actual_number: u32,
    pub detected_number: Option<u32>,
    pub is_valid: bool,
    /// PNG data URI of the inspected region
    pub cropped_image_b64: Option<String>,
}

/// Validation response
#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub filename: String,
    pub upload_time: String,
    pub file_size: String,
    pub total_pages: usize,
    pub correct_pages: usize,
    pub error_pages: usize,
    pub success_rate: f64,
    pub validation_results: Vec<PagePayload>,
    pub issues: Vec<String>,
    /// Text report, ready for `/api/report/download`
    pub report_content: String,
}

struct Upload {
    filename: String,
    data: Bytes,
}

/// Upload a PDF and validate its page numbers.
///
/// Multipart fields: `file` (required), `region` (optional JSON object or
/// `x,w,y,h` list), `dpi` (optional).
async fn validate_upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<ValidateResponse>, AppError> {
    let mut upload: Option<Upload> = None;
    let mut region: Option<RegionSpec> = None;
    let mut dpi: Option<u32> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| state.multipart_error(e))? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await.map_err(|e| state.multipart_error(e))?;
                upload = Some(Upload { filename, data });
            }
            Some("region") => {
                let text = field.text().await.map_err(|e| state.multipart_error(e))?;
                if !text.trim().is_empty() {
                    region = Some(parse_region(&text)?);
                }
            }
            Some("dpi") => {
                let text = field.text().await.map_err(|e| state.multipart_error(e))?;
                if !text.trim().is_empty() {
                    let value = text.trim().parse::<u32>().map_err(|_| {
                        AppError::bad_request("INVALID_DPI", format!("Invalid DPI: {}", text))
                    })?;
                    dpi = Some(value);
                }
            }
            _ => {}
        }
    }

    let upload = upload
        .filter(|u| !u.filename.is_empty())
        .ok_or_else(|| AppError::bad_request("NO_FILE", "No file selected"))?;

    if !has_pdf_extension(&upload.filename) {
        return Err(AppError::bad_request(
            "INVALID_FORMAT",
            "Only the following file types are supported: .pdf",
        ));
    }

    let file_size = upload.data.len() as u64;
    if let Some(max) = state.max_file_size {
        if file_size > max {
            return Err(state.file_too_large());
        }
    }

    info!(
        filename = %upload.filename,
        size = %format_file_size(Some(file_size)),
        "Validating upload"
    );

    let validator = Arc::clone(&state.validator);
    let upload_dir = state.upload_dir.clone();
    let dpi = dpi.unwrap_or(state.config.ocr.default_dpi);
    let data = upload.data;

    let (report, pages) = tokio::task::spawn_blocking(move || {
        let report = validate_staged(&validator, &upload_dir, &data, dpi, region.as_ref())?;
        let pages = page_payloads(&report);
        Ok::<_, AppError>((report, pages))
    })
    .await
    .map_err(|e| AppError::internal(format!("Validation task failed: {}", e)))??;

    info!(
        filename = %upload.filename,
        success_rate = report.success_rate,
        "Upload validated"
    );

    Ok(Json(ValidateResponse {
        filename: upload.filename,
        upload_time: chrono::Local::now().to_rfc3339(),
        file_size: format_file_size(Some(file_size)),
        total_pages: report.total_pages,
        correct_pages: report.correct_pages,
        error_pages: report.error_pages,
        success_rate: report.success_rate,
        report_content: report::render(&report),
        issues: report.issues,
        validation_results: pages,
    }))
}

/// Stage the upload in `upload_dir` and validate it.
///
/// The staged copy is removed when this returns, on every path.
fn validate_staged(
    validator: &PageValidator,
    upload_dir: &std::path::Path,
    data: &[u8],
    dpi: u32,
    region: Option<&RegionSpec>,
) -> Result<ValidationReport, AppError> {
    std::fs::create_dir_all(upload_dir)?;

    let prefix = chrono::Local::now().format("%Y%m%d_%H%M%S_").to_string();
    let mut staged = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".pdf")
        .tempfile_in(upload_dir)?;
    staged.write_all(data)?;
    staged.flush()?;

    let report = validator.validate_page_numbers(staged.path(), dpi, region)?;
    Ok(report)
}

fn page_payloads(report: &ValidationReport) -> Vec<PagePayload> {
    report
        .results
        .iter()
        .map(|result| PagePayload {
            page_index: result.page_index,
            actual_number: result.expected_number,
            detected_number: result.detected_number,
            is_valid: result.is_valid,
            cropped_image_b64: result.cropped_image.as_ref().and_then(crop_data_uri),
        })
        .collect()
}

/// Encode an image as a PNG data URI
pub fn crop_data_uri(image: &DynamicImage) -> Option<String> {
    let mut png = Vec::new();
    if let Err(e) = image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png) {
        warn!("Failed to encode crop preview: {}", e);
        return None;
    }
    Some(format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(png)
    ))
}

/// Region field: a JSON object with the four fractions, or `x,w,y,h`
fn parse_region(text: &str) -> Result<RegionSpec, AppError> {
    let invalid = |reason: String| {
        AppError::bad_request("INVALID_REGION", format!("Invalid region: {}", reason))
    };

    let spec = match serde_json::from_str::<RegionSpec>(text) {
        Ok(spec) => spec,
        Err(json_error) => text
            .parse::<RegionSpec>()
            .map_err(|_| invalid(json_error.to_string()))?,
    };
    spec.validate().map_err(|e| invalid(e.to_string()))?;
    Ok(spec)
}

// ============================================================
// Report download
// ============================================================

#[derive(Debug, Deserialize)]
struct DownloadRequest {
    report_content: Option<String>,
}

/// File name offered for a downloaded report
pub fn report_filename(now: chrono::DateTime<chrono::Local>) -> String {
    format!("{}{}.txt", REPORT_FILENAME_PREFIX, now.format("%Y%m%d_%H%M%S"))
}

async fn download_report(body: Bytes) -> Result<Response, AppError> {
    let content = serde_json::from_slice::<DownloadRequest>(&body)
        .ok()
        .and_then(|request| request.report_content)
        .ok_or_else(|| AppError::bad_request("NO_DATA", "No report data provided"))?;

    let filename = report_filename(chrono::Local::now());
    info!(%filename, "Serving report download");

    Ok((
        [
            (
                header::CONTENT_TYPE,
                "text/plain; charset=utf-8".to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        content,
    )
        .into_response())
}

// ============================================================
// Config and health
// ============================================================

/// Configuration response
#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    pub max_file_size: Option<u64>,
    pub max_file_size_formatted: String,
    pub version: String,
    pub default_dpi: u32,
    pub default_region: RegionSpec,
    pub ocr_language: String,
}

async fn get_config(State(state): State<Arc<AppState>>) -> Json<ConfigResponse> {
    Json(ConfigResponse {
        max_file_size: state.max_file_size,
        max_file_size_formatted: format_file_size(state.max_file_size),
        version: state.version.clone(),
        default_dpi: state.config.ocr.default_dpi,
        default_region: state.validator.settings().default_region,
        ocr_language: state.config.ocr.language.clone(),
    })
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub ocr_backend: String,
    pub tools: ToolStatus,
}

#[derive(Debug, Serialize)]
pub struct ToolStatus {
    pub poppler: bool,
    pub tesseract: bool,
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let tesseract = match &state.config.ocr.tesseract_path {
        Some(path) => path.is_file(),
        None => which::which("tesseract").is_ok(),
    };
    let tools = ToolStatus {
        poppler: which::which("pdftoppm").is_ok(),
        tesseract,
    };

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        ocr_backend: state.validator.ocr_backend().to_string(),
        tools,
    })
}

// ============================================================
// Errors
// ============================================================

/// API error with an HTTP status and a stable code
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    /// Formatted upload limit, only for `FILE_TOO_LARGE`
    pub max_size: Option<String>,
}

impl AppError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            max_size: None,
        }
    }

    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }

    pub fn file_too_large(max_file_size: Option<u64>) -> Self {
        let formatted = format_file_size(max_file_size);
        Self {
            max_size: Some(formatted.clone()),
            ..Self::new(
                StatusCode::PAYLOAD_TOO_LARGE,
                "FILE_TOO_LARGE",
                format!("File exceeds the upload limit ({})", formatted),
            )
        }
    }
}

impl AppState {
    fn file_too_large(&self) -> AppError {
        AppError::file_too_large(self.max_file_size)
    }

    fn multipart_error(&self, e: MultipartError) -> AppError {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            self.file_too_large()
        } else {
            AppError::bad_request("INVALID_REQUEST", e.body_text())
        }
    }
}

impl From<PageNumberError> for AppError {
    fn from(e: PageNumberError) -> Self {
        match &e {
            PageNumberError::Configuration { .. } => {
                error!("OCR configuration error: {}", e);
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CONFIGURATION_ERROR",
                    e.to_string(),
                )
            }
            PageNumberError::DocumentNotFound { .. } => {
                Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", e.to_string())
            }
            PageNumberError::RenderFailed { .. } => {
                error!("Render failure: {}", e);
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "RENDER_ERROR",
                    e.to_string(),
                )
            }
            PageNumberError::InvalidDpi(_) => Self::bad_request("INVALID_DPI", e.to_string()),
            PageNumberError::IoError(_) => {
                error!("Validation IO error: {}", e);
                Self::internal("Internal server error")
            }
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        error!("Upload staging failed: {}", e);
        Self::internal("Internal server error")
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: String,
            code: &'static str,
            #[serde(skip_serializing_if = "Option::is_none")]
            max_size: Option<String>,
        }

        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
                code: self.code,
                max_size: self.max_size,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use image::{Rgb, RgbImage};
    use std::path::PathBuf;

    #[test]
    fn test_parse_region_json() {
        let spec =
            parse_region(r#"{"x_start":0.4,"width":0.2,"y_start":0.85,"height":0.1}"#).unwrap();
        assert_eq!(spec, RegionSpec::new(0.4, 0.2, 0.85, 0.1));
    }

    #[test]
    fn test_parse_region_list() {
        let spec = parse_region("0.1, 0.8, 0.0, 0.1").unwrap();
        assert_eq!(spec, RegionSpec::new(0.1, 0.8, 0.0, 0.1));
    }

    #[test]
    fn test_parse_region_invalid() {
        let err = parse_region(r#"{"x_start":0.4}"#).unwrap_err();
        assert_eq!(err.code, "INVALID_REGION");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let err =
            parse_region(r#"{"x_start":1.4,"width":0.2,"y_start":0.85,"height":0.1}"#).unwrap_err();
        assert_eq!(err.code, "INVALID_REGION");
    }

    #[test]
    fn test_crop_data_uri() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 2, Rgb([1, 2, 3])));
        let uri = crop_data_uri(&image).unwrap();
        assert!(uri.starts_with("data:image/png;base64,"));

        let encoded = uri.trim_start_matches("data:image/png;base64,");
        let png = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (4, 2));
    }

    #[test]
    fn test_report_filename() {
        let now = chrono::Local
            .with_ymd_and_hms(2024, 3, 9, 14, 5, 7)
            .single()
            .unwrap();
        assert_eq!(report_filename(now), "pdf_page_report_20240309_140507.txt");
    }

    #[test]
    fn test_error_mapping() {
        let err = AppError::from(PageNumberError::DocumentNotFound {
            path: PathBuf::from("x.pdf"),
            reason: "bad".to_string(),
        });
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.code, "NOT_FOUND");

        let err = AppError::from(PageNumberError::Configuration {
            dependency: "Tesseract OCR".to_string(),
            reason: "missing".to_string(),
            remedy: "install".to_string(),
        });
        assert_eq!(err.code, "CONFIGURATION_ERROR");

        let err = AppError::from(PageNumberError::RenderFailed {
            page_index: 1,
            reason: "boom".to_string(),
        });
        assert_eq!(err.code, "RENDER_ERROR");
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_file_too_large_carries_limit() {
        let err = AppError::file_too_large(Some(1024 * 1024));
        assert_eq!(err.status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(err.max_size.as_deref(), Some("1.0 MB"));
        assert!(err.message.contains("1.0 MB"));
    }

    #[test]
    fn test_tool_status_serialize() {
        let status = ToolStatus {
            poppler: true,
            tesseract: false,
        };
        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("\"poppler\":true"));
        assert!(json.contains("\"tesseract\":false"));
    }

    #[test]
    fn test_embedded_index_page() {
        let page = Assets::get("index.html").unwrap();
        let html = String::from_utf8_lossy(&page.data);
        assert!(html.contains("/api/validate"));
    }
}
