//! Web server implementation
//!
//! Provides the main server struct and configuration.

use axum::extract::DefaultBodyLimit;
use axum::Router;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::routes::{app_routes, AppState};
use super::shutdown::wait_for_shutdown_signal;
use super::MULTIPART_OVERHEAD;
use crate::config::{Config, ServerSettings, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_UPLOAD_DIR};
use crate::page_number::PageValidator;
use crate::util::format_file_size;

/// Server error types
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid bind address: {0}")]
    InvalidAddress(#[from] std::net::AddrParseError),

    #[error("Server IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Server configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,
    /// Address to bind to
    pub bind: String,
    /// Maximum upload size in bytes, unlimited when `None`
    pub upload_limit: Option<u64>,
    /// Staging directory for uploads
    pub upload_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_HOST.to_string(),
            upload_limit: None,
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
        }
    }
}

impl ServerConfig {
    /// Server config from the `[server]` section
    pub fn from_settings(settings: &ServerSettings) -> Self {
        Self {
            port: settings.port,
            bind: settings.host.clone(),
            upload_limit: settings.max_file_size,
            upload_dir: settings.upload_dir.clone(),
        }
    }

    /// Create a new server config with the given port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Create a new server config with the given bind address
    pub fn with_bind(mut self, bind: impl Into<String>) -> Self {
        self.bind = bind.into();
        self
    }

    /// Create a new server config with the given upload limit
    pub fn with_upload_limit(mut self, limit: Option<u64>) -> Self {
        self.upload_limit = limit;
        self
    }

    /// Create a new server config with the given upload directory
    pub fn with_upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.upload_dir = dir.into();
        self
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        let ip: IpAddr = self.bind.parse()?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Web server instance
pub struct WebServer {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl WebServer {
    /// Create a server around an already constructed validator
    pub fn new(config: ServerConfig, validator: Arc<PageValidator>, app_config: Config) -> Self {
        let state = Arc::new(AppState::new(validator, app_config, &config));
        Self { config, state }
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the router
    pub fn router(&self) -> Router {
        let body_limit = match self.config.upload_limit {
            Some(limit) => {
                let limit = usize::try_from(limit.saturating_add(MULTIPART_OVERHEAD))
                    .unwrap_or(usize::MAX);
                DefaultBodyLimit::max(limit)
            }
            None => DefaultBodyLimit::disable(),
        };

        app_routes()
            .layer(body_limit)
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Run the server until Ctrl-C
    pub async fn run(&self) -> Result<(), ServerError> {
        let addr = self.config.socket_addr()?;
        std::fs::create_dir_all(&self.config.upload_dir)?;
        let router = self.router();

        info!(
            %addr,
            upload_dir = %self.config.upload_dir.display(),
            max_upload = %format_file_size(self.config.upload_limit),
            "Starting server"
        );
        println!("Starting server on http://{}", addr);
        println!("Endpoints:");
        println!("  GET  /                     - Upload page");
        println!("  POST /api/validate         - Upload and validate a PDF");
        println!("  POST /api/report/download  - Download a text report");
        println!("  GET  /api/config           - Server limits and defaults");
        println!("  GET  /api/health           - Health check");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router)
            .with_graceful_shutdown(wait_for_shutdown_signal())
            .await?;

        info!("Server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 5000);
        assert_eq!(config.bind, "127.0.0.1");
        assert_eq!(config.upload_limit, None);
        assert_eq!(config.upload_dir, PathBuf::from("uploads"));
    }

    #[test]
    fn test_server_config_builder() {
        let config = ServerConfig::default()
            .with_port(3000)
            .with_bind("0.0.0.0")
            .with_upload_limit(Some(100 * 1024 * 1024))
            .with_upload_dir("/tmp/uploads");

        assert_eq!(config.port, 3000);
        assert_eq!(config.bind, "0.0.0.0");
        assert_eq!(config.upload_limit, Some(100 * 1024 * 1024));
        assert_eq!(config.upload_dir, PathBuf::from("/tmp/uploads"));
    }

    #[test]
    fn test_server_config_from_settings() {
        let settings = ServerSettings {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_file_size: Some(1024),
            ..ServerSettings::default()
        };
        let config = ServerConfig::from_settings(&settings);
        assert_eq!(config.port, 8000);
        assert_eq!(config.bind, "0.0.0.0");
        assert_eq!(config.upload_limit, Some(1024));
    }

    #[test]
    fn test_server_config_socket_addr() {
        let config = ServerConfig::default();
        let addr = config.socket_addr().unwrap();
        assert_eq!(addr.port(), 5000);
        assert_eq!(addr.ip().to_string(), "127.0.0.1");

        let v6 = ServerConfig::default().with_bind("::1").socket_addr().unwrap();
        assert!(v6.is_ipv6());

        let bad = ServerConfig::default().with_bind("not an address");
        assert!(bad.socket_addr().is_err());
    }
}
