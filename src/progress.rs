//! Progress reporting for page validation.
//!
//! The validator announces each finished page through [`ValidationProgress`];
//! the CLI renders that as an `indicatif` bar on stderr so that stdout stays
//! free for the report.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::page_number::{PageResult, ValidationReport};

/// Output verbosity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// No output
    Quiet,
    /// Normal output (progress bar only)
    #[default]
    Normal,
    /// Verbose output (one line per page)
    Verbose,
    /// Very verbose (one line per page, including valid pages)
    VeryVerbose,
}

impl OutputMode {
    /// Create OutputMode from the `-q` flag and `-v` count
    pub fn from_flags(quiet: bool, verbosity: u8) -> Self {
        if quiet {
            return OutputMode::Quiet;
        }
        match verbosity {
            0 => OutputMode::Normal,
            1 => OutputMode::Verbose,
            _ => OutputMode::VeryVerbose,
        }
    }

    /// Check if output should be shown at this mode
    pub fn should_show(&self, required: OutputMode) -> bool {
        use OutputMode::*;
        match (self, required) {
            (Quiet, _) => false,
            (Normal, Quiet | Normal) => true,
            (Verbose, Quiet | Normal | Verbose) => true,
            (VeryVerbose, _) => true,
            _ => false,
        }
    }
}

/// Receives validation progress, one call per page in page order
pub trait ValidationProgress: Send + Sync {
    /// Called once the page count is known
    fn on_start(&self, _total_pages: usize) {}

    /// Called after each page has been judged
    fn on_page(&self, _result: &PageResult) {}

    /// Called after the report has been assembled
    fn on_complete(&self, _report: &ValidationReport) {}
}

/// Progress sink that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ValidationProgress for NoProgress {}

/// Template for the page progress bar
const PROGRESS_TEMPLATE: &str = "  {prefix} [{bar:40}] {pos:>4}/{len:4} {msg}";

/// Terminal progress bar for page validation
pub struct PageProgressBar {
    bar: ProgressBar,
    mode: OutputMode,
}

impl PageProgressBar {
    /// Create a progress bar drawn on stderr, hidden in quiet mode
    pub fn new(mode: OutputMode) -> Self {
        let bar = if mode.should_show(OutputMode::Normal) {
            ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::stderr())
        } else {
            ProgressBar::hidden()
        };

        // A malformed template only loses the styling
        if let Ok(style) = ProgressStyle::with_template(PROGRESS_TEMPLATE) {
            bar.set_style(style.progress_chars("=>-"));
        }
        bar.set_prefix("Validating");

        Self { bar, mode }
    }

    /// Output mode in use
    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Pages handled so far
    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    /// Total pages, once known
    pub fn length(&self) -> Option<u64> {
        self.bar.length()
    }
}

impl ValidationProgress for PageProgressBar {
    fn on_start(&self, total_pages: usize) {
        self.bar.set_length(total_pages as u64);
        self.bar.set_position(0);
    }

    fn on_page(&self, result: &PageResult) {
        self.bar.inc(1);

        let required = if result.is_valid {
            OutputMode::VeryVerbose
        } else {
            OutputMode::Verbose
        };
        if self.mode.should_show(required) {
            let line = match result.issue() {
                Some(issue) => format!("  ✗ {}", issue),
                None => format!("  ✓ page {}", result.page_number()),
            };
            self.bar.println(line);
        }
    }

    fn on_complete(&self, report: &ValidationReport) {
        self.bar.finish_with_message(format!(
            "{}/{} pages correct",
            report.correct_pages, report.total_pages
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // PROG-001: quiet flag wins over verbosity
    #[test]
    fn test_output_mode_from_flags() {
        assert_eq!(OutputMode::from_flags(false, 0), OutputMode::Normal);
        assert_eq!(OutputMode::from_flags(false, 1), OutputMode::Verbose);
        assert_eq!(OutputMode::from_flags(false, 5), OutputMode::VeryVerbose);
        assert_eq!(OutputMode::from_flags(true, 2), OutputMode::Quiet);
    }

    // PROG-002: verbosity ordering
    #[test]
    fn test_should_show() {
        assert!(!OutputMode::Quiet.should_show(OutputMode::Normal));
        assert!(OutputMode::Normal.should_show(OutputMode::Normal));
        assert!(!OutputMode::Normal.should_show(OutputMode::Verbose));
        assert!(OutputMode::Verbose.should_show(OutputMode::Verbose));
        assert!(!OutputMode::Verbose.should_show(OutputMode::VeryVerbose));
        assert!(OutputMode::VeryVerbose.should_show(OutputMode::Verbose));
    }

    // PROG-003: bar tracks pages
    #[test]
    fn test_progress_bar_counts_pages() {
        let progress = PageProgressBar::new(OutputMode::Quiet);
        progress.on_start(3);
        assert_eq!(progress.length(), Some(3));

        progress.on_page(&PageResult::new(0, Some(1), None));
        progress.on_page(&PageResult::new(1, None, None));
        assert_eq!(progress.position(), 2);

        let report = ValidationReport::from_results(vec![
            PageResult::new(0, Some(1), None),
            PageResult::new(1, None, None),
        ]);
        progress.on_complete(&report);
    }

    // PROG-004: restarting resets the position
    #[test]
    fn test_progress_bar_restart() {
        let progress = PageProgressBar::new(OutputMode::Quiet);
        progress.on_start(2);
        progress.on_page(&PageResult::new(0, Some(1), None));
        progress.on_start(5);
        assert_eq!(progress.position(), 0);
        assert_eq!(progress.length(), Some(5));
    }

    #[test]
    fn test_no_progress_is_silent() {
        let progress = NoProgress;
        progress.on_start(1);
        progress.on_page(&PageResult::new(0, Some(1), None));
        progress.on_complete(&ValidationReport::from_results(Vec::new()));
    }
}
