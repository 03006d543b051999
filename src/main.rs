//! pdf-page-validator - Verify printed page numbers of scanned PDFs
//!
//! CLI entry point

use anyhow::Context;
use clap::Parser;
use pdf_page_validator::{
    exit_code_for, logging, report,
    // CLI
    Cli, Commands, ExitCode, InfoArgs, ValidateArgs,
    // Config
    Config,
    // Validation
    OutputMode, PageProgressBar, PageValidator, RenderFailurePolicy, ValidatorSettings,
};
use std::path::Path;

#[cfg(feature = "web")]
use pdf_page_validator::{ServeArgs, ServerConfig, WebServer};

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate(args) => run_validate(&args),
        Commands::Info(args) => run_info(&args),
        #[cfg(feature = "web")]
        Commands::Serve(args) => run_serve(&args),
    };

    let code = match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::GeneralError
        }
    };
    std::process::exit(code.code());
}

/// Load the explicit config file, or search the default locations.
///
/// An explicit file that cannot be loaded is an error; a broken file found
/// by searching only produces a warning.
fn load_config(path: Option<&Path>) -> Result<Config, ExitCode> {
    match path {
        Some(path) => Config::load_from_path(path).map_err(|e| {
            eprintln!("Error: {}", e);
            ExitCode::InvalidArgs
        }),
        None => Ok(Config::load().unwrap_or_else(|e| {
            eprintln!("Warning: {}; using defaults", e);
            Config::default()
        })),
    }
}

// ============ Validate Command ============

fn run_validate(args: &ValidateArgs) -> anyhow::Result<ExitCode> {
    if !args.input.exists() {
        eprintln!("Error: Input file does not exist: {}", args.input.display());
        return Ok(ExitCode::InputNotFound);
    }

    let file_config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(code) => return Ok(code),
    };

    // CLI takes precedence over file and environment
    let config = file_config.merge_with_cli(&args.cli_overrides());
    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return Ok(ExitCode::InvalidArgs);
    }

    let level = logging::level_for_flags(&config.logging.level, args.quiet, args.verbose);
    logging::init(&level, config.logging.file.as_deref()).context("Failed to open log file")?;

    let mut settings = ValidatorSettings::from_config(&config);
    // Crops are only needed by the web preview
    settings.retain_crops = false;
    if args.continue_on_render_error {
        settings.render_failure = RenderFailurePolicy::MarkPageInvalid;
    }

    let validator = match PageValidator::from_config_with_settings(&config, settings) {
        Ok(validator) => validator,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(exit_code_for(&e));
        }
    };

    let progress = PageProgressBar::new(OutputMode::from_flags(args.quiet, args.verbose));
    let result = match validator.validate_with_progress(
        &args.input,
        config.ocr.default_dpi,
        args.region.as_ref(),
        &progress,
    ) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(exit_code_for(&e));
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }

    match &args.output {
        Some(destination) => match report::write(&result, destination) {
            Ok(text_path) => {
                if !args.quiet {
                    println!("Report saved to: {}", text_path.display());
                    println!(
                        "Details saved to: {}",
                        report::csv_path_for(&text_path).display()
                    );
                }
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                return Ok(ExitCode::OutputError);
            }
        },
        None if !args.json => println!("{}", report::render(&result)),
        None => {}
    }

    if args.strict && !result.all_valid() {
        return Ok(ExitCode::PageMismatch);
    }
    Ok(ExitCode::Success)
}

// ============ Info Command ============

fn run_info(args: &InfoArgs) -> anyhow::Result<ExitCode> {
    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(code) => return Ok(code),
    };

    println!("pdf-page-validator v{}", env!("CARGO_PKG_VERSION"));
    println!();

    // System Information
    println!("System Information:");
    println!("  Platform: {}", std::env::consts::OS);
    println!("  Arch: {}", std::env::consts::ARCH);
    println!("  CPUs: {}", num_cpus::get());

    // External Tools
    println!();
    println!("External Tools:");
    match &config.ocr.tesseract_path {
        Some(path) => check_binary_with_version(path, "Tesseract", &["--version"]),
        None => check_tool_with_version("tesseract", "Tesseract", &["--version"]),
    }
    check_tool_with_version("pdftoppm", "Poppler", &["-v"]);

    // Config File Locations
    println!();
    println!("Config File Locations:");
    for path in Config::search_paths() {
        let marker = if path.is_file() { "found" } else { "absent" };
        println!("  {} ({})", path.display(), marker);
    }

    // Effective configuration
    println!();
    println!("Effective Configuration:");
    println!(
        "  Max upload size: {}",
        pdf_page_validator::util::format_file_size(config.server.max_file_size)
    );
    println!("  Default region: {}", config.region.to_region_spec());
    println!();
    for line in config.to_toml_string().lines() {
        println!("  {}", line);
    }

    Ok(ExitCode::Success)
}

fn check_tool_with_version(cmd: &str, name: &str, version_args: &[&str]) {
    match which::which(cmd) {
        Ok(path) => check_binary_with_version(&path, name, version_args),
        Err(_) => println!("  {}: Not found", name),
    }
}

fn check_binary_with_version(path: &Path, name: &str, version_args: &[&str]) {
    let Ok(output) = std::process::Command::new(path).args(version_args).output() else {
        println!("  {}: Not runnable ({})", name, path.display());
        return;
    };

    // pdftoppm prints its version on stderr
    let banner = if output.stdout.is_empty() {
        String::from_utf8_lossy(&output.stderr).into_owned()
    } else {
        String::from_utf8_lossy(&output.stdout).into_owned()
    };
    let first_line = banner.lines().next().unwrap_or("").trim();

    if !first_line.is_empty() && first_line.len() < 80 {
        println!("  {}: {} ({})", name, first_line, path.display());
    } else {
        println!("  {}: {} (found)", name, path.display());
    }
}

// ============ Serve Command (Web Server) ============

#[cfg(feature = "web")]
fn run_serve(args: &ServeArgs) -> anyhow::Result<ExitCode> {
    use std::sync::Arc;

    let file_config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(code) => return Ok(code),
    };
    let config = file_config.merge_with_cli(&args.cli_overrides());
    if let Err(e) = config.validate().and_then(|()| config.server.validate()) {
        eprintln!("Error: {}", e);
        return Ok(ExitCode::InvalidArgs);
    }

    let level = if config.server.debug {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    };
    logging::init(&level, config.logging.file.as_deref()).context("Failed to open log file")?;

    // Built once; a missing OCR engine stops the server from starting
    let validator = match PageValidator::from_config(&config) {
        Ok(validator) => Arc::new(validator),
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(exit_code_for(&e));
        }
    };

    let server_config = ServerConfig::from_settings(&config.server);
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let server = WebServer::new(server_config, validator, config);
        server.run().await
    })?;

    Ok(ExitCode::Success)
}
