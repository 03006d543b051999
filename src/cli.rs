//! CLI argument definitions using clap derive

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::CliOverrides;
use crate::page_number::RegionSpec;

/// Exit codes for CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success
    Success = 0,
    /// General error
    GeneralError = 1,
    /// Invalid arguments or configuration
    InvalidArgs = 2,
    /// Input file not found or not a readable PDF
    InputNotFound = 3,
    /// Report could not be written
    OutputError = 4,
    /// Validation failed while processing pages
    ProcessingError = 5,
    /// Validation succeeded but some page numbers do not match (`--strict`)
    PageMismatch = 6,
    /// Tesseract or Poppler missing
    ExternalToolError = 7,
}

impl ExitCode {
    /// Numeric process exit code
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Short description
    pub fn description(self) -> &'static str {
        match self {
            ExitCode::Success => "Success",
            ExitCode::GeneralError => "General error",
            ExitCode::InvalidArgs => "Invalid arguments",
            ExitCode::InputNotFound => "Input not found",
            ExitCode::OutputError => "Output error",
            ExitCode::ProcessingError => "Processing error",
            ExitCode::PageMismatch => "Page numbers do not match",
            ExitCode::ExternalToolError => "External tool error",
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.code()
    }
}

/// Verify printed page numbers of scanned PDFs with OCR
#[derive(Parser, Debug)]
#[command(name = "pdf-page-validator")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate the page numbers of a PDF
    Validate(ValidateArgs),
    /// Show tool availability and effective configuration
    Info(InfoArgs),
    /// Start the web upload server
    #[cfg(feature = "web")]
    Serve(ServeArgs),
}

/// Arguments for the validate command
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// PDF file to validate
    #[arg(value_name = "PDF")]
    pub input: PathBuf,

    /// Write the text report (and a CSV next to it) instead of printing it
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Render resolution [default: from config, 100]
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=1200))]
    pub dpi: Option<u32>,

    /// Tesseract executable
    #[arg(long, value_name = "PATH")]
    pub tesseract_path: Option<PathBuf>,

    /// OCR language, e.g. eng or eng+deu
    #[arg(long, value_name = "LANG")]
    pub lang: Option<String>,

    /// Search region as X_START,WIDTH,Y_START,HEIGHT fractions (top-left origin)
    #[arg(long, value_name = "X,W,Y,H")]
    pub region: Option<RegionSpec>,

    /// Config file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Save every inspected crop as PNG
    #[arg(long)]
    pub save_crops: bool,

    /// Directory for saved crops
    #[arg(long, value_name = "DIR")]
    pub crop_dir: Option<PathBuf>,

    /// Mark pages that fail to render as invalid instead of aborting
    #[arg(long)]
    pub continue_on_render_error: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Exit with a non-zero code when any page number does not match
    #[arg(long)]
    pub strict: bool,

    /// Verbose output (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only print errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl ValidateArgs {
    /// Values that override the loaded configuration
    pub fn cli_overrides(&self) -> CliOverrides {
        CliOverrides {
            dpi: self.dpi,
            tesseract_path: self.tesseract_path.clone(),
            language: self.lang.clone(),
            save_crops: self.save_crops.then_some(true),
            crop_dir: self.crop_dir.clone(),
            ..CliOverrides::new()
        }
    }
}

/// Arguments for the info command
#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Config file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Arguments for the serve command
#[cfg(feature = "web")]
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind [default: from config, 127.0.0.1]
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Port to listen on [default: from config, 5000]
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Config file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[cfg(feature = "web")]
impl ServeArgs {
    /// Values that override the loaded configuration
    pub fn cli_overrides(&self) -> CliOverrides {
        CliOverrides {
            host: self.bind.clone(),
            port: self.port,
            ..CliOverrides::new()
        }
    }
}
