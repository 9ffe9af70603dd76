//! Status messages and error display
//!
//! Commands print data to stdout through a printer or the exporter;
//! everything meant for the person at the terminal (confirmations,
//! warnings, errors) goes to stderr through these helpers.

use console::Style;
use std::io::Write;

use crate::error::{self, CliError};
use crate::infra::IoStreams;

/// Status message prefixes
pub mod status {
    /// Success prefix (green checkmark)
    pub const SUCCESS: &str = "✓";

    /// Error prefix (red X)
    pub const ERROR: &str = "✗";

    /// Warning prefix
    pub const WARNING: &str = "!";

    /// Info prefix
    pub const INFO: &str = "-";
}

/// Colours that switch off with the streams
#[derive(Debug, Clone, Copy)]
pub struct ColorScheme {
    enabled: bool,
}

impl ColorScheme {
    /// Scheme for the given streams
    pub fn new(io: &IoStreams) -> Self {
        Self {
            enabled: io.color_enabled(),
        }
    }

    fn paint(&self, style: Style, text: &str) -> String {
        if self.enabled {
            style.force_styling(true).apply_to(text).to_string()
        } else {
            text.to_string()
        }
    }

    /// Green
    pub fn green(&self, text: &str) -> String {
        self.paint(Style::new().green(), text)
    }

    /// Yellow
    pub fn yellow(&self, text: &str) -> String {
        self.paint(Style::new().yellow(), text)
    }

    /// Red
    pub fn red(&self, text: &str) -> String {
        self.paint(Style::new().red(), text)
    }

    /// Dimmed
    pub fn gray(&self, text: &str) -> String {
        self.paint(Style::new().dim(), text)
    }

    /// Bold
    pub fn bold(&self, text: &str) -> String {
        self.paint(Style::new().bold(), text)
    }

    /// Cyan
    pub fn cyan(&self, text: &str) -> String {
        self.paint(Style::new().cyan(), text)
    }

    /// Green checkmark
    pub fn success_icon(&self) -> String {
        self.green(status::SUCCESS)
    }

    /// Yellow warning mark
    pub fn warning_icon(&self) -> String {
        self.yellow(status::WARNING)
    }

    /// Red cross
    pub fn failure_icon(&self) -> String {
        self.red(status::ERROR)
    }
}

/// Print `✓ message` to stderr when it is a terminal
pub fn success(io: &IoStreams, message: &str) {
    if io.is_stderr_tty() || io.is_stdout_tty() {
        let cs = ColorScheme::new(io);
        let _ = writeln!(io.err(), "{} {}", cs.success_icon(), message);
    }
}

/// Print `! message` to stderr
pub fn warning(io: &IoStreams, message: &str) {
    let cs = ColorScheme::new(io);
    let _ = writeln!(io.err(), "{} {}", cs.warning_icon(), message);
}

/// Print an error that ended the command
///
/// The innermost message is shown unless `debug` is set, in which case every
/// cause is printed on its own line. Flag errors also print the usage block.
/// Cancellation prints nothing beyond a newline.
pub fn display_error(io: &IoStreams, err: &anyhow::Error, debug: bool) {
    let mut stderr = io.err();
    if error::is_cancel(err) {
        let _ = writeln!(stderr);
        return;
    }
    if debug {
        let _ = writeln!(stderr, "error: {err}");
        for cause in err.chain().skip(1) {
            let _ = writeln!(stderr, "  caused by: {cause}");
        }
    } else {
        let message = err
            .chain()
            .find_map(|c| c.downcast_ref::<CliError>().map(ToString::to_string))
            .unwrap_or_else(|| innermost(err));
        let _ = writeln!(stderr, "error: {message}");
    }
    if let Some(CliError::Flag {
        usage: Some(usage), ..
    }) = error::find_cli_error(err)
    {
        let _ = writeln!(stderr, "\n{}", usage.trim_end());
    }
}

fn innermost(err: &anyhow::Error) -> String {
    err.chain()
        .last()
        .map(ToString::to_string)
        .unwrap_or_else(|| err.to_string())
}
