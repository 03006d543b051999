//! Configuration
//!
//! Settings come from three layers, later layers winning:
//!
//! 1. a TOML file (`./pdf-page-validator.toml`, then
//!    `<config_dir>/pdf-page-validator/config.toml`)
//! 2. environment variables (`PDF_DPI`, `TESSERACT_PATH`, ...)
//! 3. command-line flags, applied with [`Config::merge_with_cli`]
//!
//! The page number region is stored in the legacy "distance from bottom"
//! form and converted to a [`RegionSpec`] with
//! [`RegionConfig::to_region_spec`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::ocr::DEFAULT_OCR_LANGUAGE;
use crate::page_number::{
    RegionError, RegionSpec, DEFAULT_DPI, DEFAULT_FOOTER_HEIGHT,
    DEFAULT_FOOTER_Y_START_FROM_BOTTOM, DEFAULT_WIDTH, DEFAULT_X_START, MAX_DPI, MIN_DPI,
};

/// File name looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "pdf-page-validator.toml";

/// Directory below the platform config dir
pub const APP_CONFIG_DIR: &str = "pdf-page-validator";

/// Default debug crop directory
pub const DEFAULT_CROP_DIR: &str = "debug_crops";

/// Default upload directory for the web server
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";

/// Default bind address
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default port
pub const DEFAULT_PORT: u16 = 5000;

// ============================================================
// Error Types
// ============================================================

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid value for {key}: '{value}' ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Invalid page number region: {0}")]
    Region(#[from] RegionError),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

// ============================================================
// Sections
// ============================================================

/// OCR settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Explicit Tesseract executable; searched on `PATH` when unset
    pub tesseract_path: Option<PathBuf>,
    /// Tesseract language code
    pub language: String,
    /// Render resolution
    pub default_dpi: u32,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            tesseract_path: None,
            language: DEFAULT_OCR_LANGUAGE.to_string(),
            default_dpi: DEFAULT_DPI,
        }
    }
}

/// Page number search region, legacy footer form
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    pub x_start: f64,
    pub width: f64,
    /// Gap between the page bottom and the bottom edge of the region
    pub footer_y_start_from_bottom: f64,
    pub footer_height: f64,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            x_start: DEFAULT_X_START,
            width: DEFAULT_WIDTH,
            footer_y_start_from_bottom: DEFAULT_FOOTER_Y_START_FROM_BOTTOM,
            footer_height: DEFAULT_FOOTER_HEIGHT,
        }
    }
}

impl RegionConfig {
    /// Convert to the canonical top-left form
    pub fn to_region_spec(&self) -> RegionSpec {
        RegionSpec::from_footer(
            self.x_start,
            self.width,
            self.footer_y_start_from_bottom,
            self.footer_height,
        )
    }

    fn validate(&self) -> Result<()> {
        let fields = [
            ("region.x_start", self.x_start),
            ("region.width", self.width),
            (
                "region.footer_y_start_from_bottom",
                self.footer_y_start_from_bottom,
            ),
            ("region.footer_height", self.footer_height),
        ];
        for (key, value) in fields {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: value.to_string(),
                    reason: "must be within [0, 1]".to_string(),
                });
            }
        }
        self.to_region_spec().validate()?;
        Ok(())
    }
}

/// Debug output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Save every inspected crop as PNG
    pub save_crops: bool,
    pub crop_dir: PathBuf,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            save_crops: false,
            crop_dir: PathBuf::from(DEFAULT_CROP_DIR),
        }
    }
}

/// Web server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Where uploads are staged while they are validated
    pub upload_dir: PathBuf,
    /// Upload limit in bytes; unlimited when unset
    pub max_file_size: Option<u64>,
    /// Verbose request logging
    pub debug: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            max_file_size: None,
            debug: false,
        }
    }
}

impl ServerSettings {
    /// Check that the server can bind to `host`.
    pub fn validate(&self) -> Result<()> {
        self.host
            .parse::<std::net::IpAddr>()
            .map(|_| ())
            .map_err(|_| ConfigError::InvalidValue {
                key: "server.host".to_string(),
                value: self.host.clone(),
                reason: "must be an IP address".to_string(),
            })
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. `info` or `pdf_page_validator=debug`
    pub level: String,
    /// Log to this file instead of stderr
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

// ============================================================
// Config
// ============================================================

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ocr: OcrConfig,
    pub region: RegionConfig,
    pub debug: DebugConfig,
    pub server: ServerSettings,
    pub logging: LoggingConfig,
}

impl Config {
    /// Candidate config files in lookup order
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join(APP_CONFIG_DIR).join("config.toml"));
        }
        paths
    }

    /// Load the first config file found (or defaults), then apply the
    /// environment
    pub fn load() -> Result<Self> {
        let mut config = match Self::search_paths().into_iter().find(|p| p.is_file()) {
            Some(path) => Self::read_file(&path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load an explicit config file, then apply the environment
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::read_file(path.as_ref())?;
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document without consulting the environment
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<string>"),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("TESSERACT_PATH") {
            self.ocr.tesseract_path = (!path.trim().is_empty()).then(|| PathBuf::from(path));
        }
        if let Some(language) = lookup("PDF_OCR_LANGUAGE") {
            self.ocr.language = language;
        }
        if let Some(dpi) = lookup("PDF_DPI") {
            self.ocr.default_dpi = parse_env("PDF_DPI", &dpi)?;
        }

        if let Some(value) = lookup("PDF_CROP_X_START") {
            self.region.x_start = parse_env("PDF_CROP_X_START", &value)?;
        }
        if let Some(value) = lookup("PDF_CROP_WIDTH") {
            self.region.width = parse_env("PDF_CROP_WIDTH", &value)?;
        }
        if let Some(value) = lookup("PDF_FOOTER_Y_START") {
            self.region.footer_y_start_from_bottom = parse_env("PDF_FOOTER_Y_START", &value)?;
        }
        if let Some(value) = lookup("PDF_FOOTER_HEIGHT") {
            self.region.footer_height = parse_env("PDF_FOOTER_HEIGHT", &value)?;
        }

        if let Some(value) = lookup("PDF_DEBUG_CROPS") {
            self.debug.save_crops = parse_flag(&value);
        }

        if let Some(host) = lookup("PDF_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PDF_PORT") {
            self.server.port = parse_env("PDF_PORT", &port)?;
        }
        if let Some(dir) = lookup("PDF_UPLOAD_FOLDER") {
            self.server.upload_dir = PathBuf::from(dir);
        }
        if let Some(size) = lookup("PDF_MAX_FILE_SIZE") {
            self.server.max_file_size = parse_max_file_size(&size)?;
        }
        if let Some(value) = lookup("PDF_DEBUG") {
            self.server.debug = parse_flag(&value);
        }

        if let Some(level) = lookup("PDF_LOG_LEVEL") {
            self.logging.level = level.to_lowercase();
        }
        if let Some(file) = lookup("PDF_LOG_FILE") {
            self.logging.file = (!file.trim().is_empty()).then(|| PathBuf::from(file));
        }

        Ok(())
    }

    /// Reject values the validator cannot work with
    pub fn validate(&self) -> Result<()> {
        if !(MIN_DPI..=MAX_DPI).contains(&self.ocr.default_dpi) {
            return Err(ConfigError::InvalidValue {
                key: "ocr.default_dpi".to_string(),
                value: self.ocr.default_dpi.to_string(),
                reason: format!("must be between {} and {}", MIN_DPI, MAX_DPI),
            });
        }
        if self.ocr.language.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "ocr.language".to_string(),
                value: self.ocr.language.clone(),
                reason: "must not be empty".to_string(),
            });
        }
        self.region.validate()
    }

    /// Merge command-line overrides into a copy of this configuration.
    ///
    /// CLI values take precedence over file and environment values.
    pub fn merge_with_cli(&self, cli: &CliOverrides) -> Self {
        let mut config = self.clone();

        if let Some(dpi) = cli.dpi {
            config.ocr.default_dpi = dpi;
        }
        if let Some(path) = &cli.tesseract_path {
            config.ocr.tesseract_path = Some(path.clone());
        }
        if let Some(language) = &cli.language {
            config.ocr.language = language.clone();
        }
        if let Some(save) = cli.save_crops {
            config.debug.save_crops = save;
        }
        if let Some(dir) = &cli.crop_dir {
            config.debug.crop_dir = dir.clone();
        }
        if let Some(host) = &cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }
        if let Some(level) = &cli.log_level {
            config.logging.level = level.clone();
        }

        config
    }

    /// Pretty TOML rendering, as shown by `info`
    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_else(|e| format!("# unable to render: {}", e))
    }
}

/// Values given on the command line
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliOverrides {
    pub dpi: Option<u32>,
    pub tesseract_path: Option<PathBuf>,
    pub language: Option<String>,
    pub save_crops: Option<bool>,
    pub crop_dir: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
}

impl CliOverrides {
    /// Create empty overrides
    pub fn new() -> Self {
        Self::default()
    }
}

fn parse_env<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: e.to_string(),
        })
}

fn parse_flag(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

/// `PDF_MAX_FILE_SIZE`: a byte count, or `NONE` for unlimited
fn parse_max_file_size(value: &str) -> Result<Option<u64>> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
        return parse_env("PDF_MAX_FILE_SIZE", value).map(Some);
    }
    Err(ConfigError::InvalidValue {
        key: "PDF_MAX_FILE_SIZE".to_string(),
        value: value.to_string(),
        reason: "expected a byte count or NONE".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.ocr.language, "eng");
        assert_eq!(config.ocr.default_dpi, 100);
        assert!(config.ocr.tesseract_path.is_none());
        assert!(!config.debug.save_crops);
        assert_eq!(config.debug.crop_dir, PathBuf::from("debug_crops"));
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.server.max_file_size, None);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_region_conversion() {
        let spec = Config::default().region.to_region_spec();
        assert_eq!(spec, RegionSpec::default());
        assert!((spec.y_start - 0.89).abs() < 1e-9);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            [ocr]
            language = "deu"

            [region]
            footer_height = 0.1
            footer_y_start_from_bottom = 0.0
            "#,
        )
        .unwrap();

        assert_eq!(config.ocr.language, "deu");
        assert_eq!(config.ocr.default_dpi, 100);
        let spec = config.region.to_region_spec();
        assert!((spec.y_start - 0.9).abs() < 1e-9);
        assert_eq!(spec.height, 0.1);
        assert_eq!(spec.x_start, 0.40);
    }

    #[test]
    fn test_toml_rejects_out_of_range_region() {
        let err = Config::from_toml_str("[region]\nwidth = 1.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "region.width"));
    }

    #[test]
    fn test_toml_rejects_region_below_page() {
        let err = Config::from_toml_str(
            "[region]\nfooter_height = 0.6\nfooter_y_start_from_bottom = 0.6\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Region(_)));
    }

    #[test]
    fn test_toml_rejects_zero_dpi() {
        let err = Config::from_toml_str("[ocr]\ndefault_dpi = 0\n").unwrap_err();
        assert!(err.to_string().contains("ocr.default_dpi"));
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(
            Config::from_toml_str("[ocr\nlanguage ="),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server]\nport = 8080\n").unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.server.port, 8080);

        let missing = Config::load_from_path(dir.path().join("absent.toml"));
        assert!(matches!(missing, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env_from(env(&[
                ("TESSERACT_PATH", "/opt/tesseract/bin/tesseract"),
                ("PDF_OCR_LANGUAGE", "fra"),
                ("PDF_DPI", "150"),
                ("PDF_CROP_X_START", "0.3"),
                ("PDF_FOOTER_HEIGHT", "0.1"),
                ("PDF_DEBUG_CROPS", "True"),
                ("PDF_PORT", "8000"),
                ("PDF_MAX_FILE_SIZE", "1048576"),
                ("PDF_LOG_LEVEL", "DEBUG"),
            ]))
            .unwrap();

        assert_eq!(
            config.ocr.tesseract_path,
            Some(PathBuf::from("/opt/tesseract/bin/tesseract"))
        );
        assert_eq!(config.ocr.language, "fra");
        assert_eq!(config.ocr.default_dpi, 150);
        assert_eq!(config.region.x_start, 0.3);
        assert_eq!(config.region.footer_height, 0.1);
        assert!(config.debug.save_crops);
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.max_file_size, Some(1_048_576));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_env_max_file_size_none() {
        let mut config = Config::default();
        config.server.max_file_size = Some(10);
        config
            .apply_env_from(env(&[("PDF_MAX_FILE_SIZE", "NONE")]))
            .unwrap();
        assert_eq!(config.server.max_file_size, None);

        let err = config
            .apply_env_from(env(&[("PDF_MAX_FILE_SIZE", "500MB")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_env_invalid_number() {
        let mut config = Config::default();
        let err = config
            .apply_env_from(env(&[("PDF_DPI", "high")]))
            .unwrap_err();
        assert!(err.to_string().contains("PDF_DPI"));
    }

    #[test]
    fn test_env_flags_accept_only_true() {
        let mut config = Config::default();
        config
            .apply_env_from(env(&[("PDF_DEBUG_CROPS", "yes"), ("PDF_DEBUG", "TRUE")]))
            .unwrap();
        assert!(!config.debug.save_crops);
        assert!(config.server.debug);
    }

    #[test]
    fn test_empty_tesseract_path_means_search() {
        let mut config = Config::default();
        config.ocr.tesseract_path = Some(PathBuf::from("/somewhere"));
        config
            .apply_env_from(env(&[("TESSERACT_PATH", "")]))
            .unwrap();
        assert!(config.ocr.tesseract_path.is_none());
    }

    #[test]
    fn test_merge_with_cli() {
        let base = Config::default();
        let overrides = CliOverrides {
            dpi: Some(300),
            language: Some("jpn".to_string()),
            save_crops: Some(true),
            crop_dir: Some(PathBuf::from("/tmp/crops")),
            port: Some(9000),
            ..CliOverrides::new()
        };

        let merged = base.merge_with_cli(&overrides);
        assert_eq!(merged.ocr.default_dpi, 300);
        assert_eq!(merged.ocr.language, "jpn");
        assert!(merged.debug.save_crops);
        assert_eq!(merged.debug.crop_dir, PathBuf::from("/tmp/crops"));
        assert_eq!(merged.server.port, 9000);
        // Untouched values survive
        assert_eq!(merged.server.host, "127.0.0.1");
        assert_eq!(merged.region, base.region);
    }

    #[test]
    fn test_server_host_validation() {
        let mut config = Config::default();
        assert!(config.server.validate().is_ok());

        config.server.host = "::1".to_string();
        assert!(config.server.validate().is_ok());

        let merged = config.merge_with_cli(&CliOverrides {
            host: Some("not an address".to_string()),
            ..CliOverrides::new()
        });
        let err = merged.server.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "server.host"));
    }

    #[test]
    fn test_empty_overrides_change_nothing() {
        let base = Config::default();
        assert_eq!(base.merge_with_cli(&CliOverrides::new()), base);
    }

    #[test]
    fn test_toml_rendering_roundtrips() {
        let mut config = Config::default();
        config.server.max_file_size = Some(1024);
        let rendered = config.to_toml_string();
        assert!(rendered.contains("[ocr]"));
        assert_eq!(Config::from_toml_str(&rendered).unwrap(), config);
    }

    #[test]
    fn test_search_paths_start_local() {
        let paths = Config::search_paths();
        assert_eq!(paths[0], PathBuf::from(LOCAL_CONFIG_FILE));
    }
}
