use crate::application::dto::Verbosity;
use crate::ports::outbound::ProgressReporter;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use owo_colors::{OwoColorize, Stream};
use std::time::Duration;

const SPINNER_TEMPLATE: &str = "{spinner:.green} {msg}";

/// StderrProgressReporter adapter for reporting progress to stderr
///
/// Writes to stderr so it doesn't interfere with the SBOM on stdout. While
/// scanning, a spinner shows the latest message; it is hidden when stderr
/// is not a terminal. Colours are only used on terminals as well.
pub struct StderrProgressReporter {
    verbosity: Verbosity,
    spinner: ProgressBar,
}

impl StderrProgressReporter {
    pub fn new(verbosity: Verbosity) -> Self {
        let spinner = if verbosity >= Verbosity::Info {
            let spinner = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
            let style = ProgressStyle::with_template(SPINNER_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner.enable_steady_tick(Duration::from_millis(100));
            spinner
        } else {
            ProgressBar::hidden()
        };

        Self { verbosity, spinner }
    }

    fn print(&self, line: String) {
        if self.spinner.is_hidden() {
            eprintln!("{}", line);
        } else {
            self.spinner.suspend(|| eprintln!("{}", line));
        }
    }
}

impl Default for StderrProgressReporter {
    fn default() -> Self {
        Self::new(Verbosity::default())
    }
}

impl Drop for StderrProgressReporter {
    fn drop(&mut self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for StderrProgressReporter {
    fn report(&self, message: &str) {
        if self.verbosity < Verbosity::Info {
            return;
        }
        self.spinner.set_message(message.to_string());
        if self.verbosity >= Verbosity::Verbose {
            self.print(message.to_string());
        }
    }

    fn report_verbose(&self, message: &str) {
        if self.verbosity >= Verbosity::Verbose {
            self.print(format!(
                "{}",
                message.if_supports_color(Stream::Stderr, |text| text.dimmed())
            ));
        }
    }

    fn report_error(&self, message: &str) {
        if self.verbosity >= Verbosity::Warn {
            self.print(format!(
                "{}",
                message.if_supports_color(Stream::Stderr, |text| text.yellow())
            ));
        }
    }

    fn report_completion(&self, message: &str) {
        self.spinner.finish_and_clear();
        if self.verbosity >= Verbosity::Info {
            eprintln!(
                "{}",
                message.if_supports_color(Stream::Stderr, |text| text.green())
            );
        }
    }
}
