//! Web server module for pdf-page-validator
//!
//! Serves an upload page and a small JSON API around [`PageValidator`].
//!
//! # Endpoints
//!
//! - `GET /` - upload page
//! - `POST /api/validate` - multipart upload, returns per-page results
//! - `POST /api/report/download` - text report as an attachment
//! - `GET /api/config` - upload limit and defaults
//! - `GET /api/health` - external tool availability
//!
//! # Usage
//!
//! ```bash
//! cargo build --features web
//! pdf-page-validator serve --port 5000
//! ```
//!
//! [`PageValidator`]: crate::page_number::PageValidator

mod routes;
mod server;
mod shutdown;

pub use routes::{
    app_routes, crop_data_uri, report_filename, AppError, AppState, ConfigResponse,
    HealthResponse, PagePayload, ToolStatus, ValidateResponse,
};
pub use server::{ServerConfig, ServerError, WebServer};
pub use shutdown::wait_for_shutdown_signal;

/// Extra body bytes allowed on top of the file limit for multipart framing
pub const MULTIPART_OVERHEAD: u64 = 64 * 1024;

/// File name prefix of downloaded reports
pub const REPORT_FILENAME_PREFIX: &str = "pdf_page_report_";
