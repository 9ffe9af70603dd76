//! Human-facing output
//!
//! Every printer takes rows cell by cell. [`TablePrinter`] aligns columns to
//! the terminal, [`ListPrinter`] prints `Key: Value` records and
//! [`JsonPrinter`] emits an array of objects. The `--json` exporter is a
//! separate pipeline (see [`crate::cli::exporter`]).

mod json;
mod list;
mod table;

pub use json::JsonPrinter;
pub use list::ListPrinter;
pub use table::TablePrinter;

use chrono::{DateTime, Utc};
use clap::{Args, ValueEnum};
use console::Style;
use std::io;
use std::sync::Arc;

use crate::infra::IoStreams;

/// Printer selection for `--format`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Aligned columns
    #[default]
    Table,
    /// One `Key: Value` block per record
    List,
    /// Array of objects keyed by column name
    Json,
}

/// The `--format` flag
#[derive(Args, Debug, Clone, Default)]
pub struct FormatArgs {
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

/// Per-cell rendering options
#[derive(Debug, Clone)]
pub struct FieldOpts {
    /// Style applied when colour is enabled
    pub color: Option<Style>,
    /// Whether the table printer may shorten this cell
    pub truncate: bool,
}

impl Default for FieldOpts {
    fn default() -> Self {
        Self {
            color: None,
            truncate: true,
        }
    }
}

impl FieldOpts {
    /// Options with a colour
    pub fn color(style: Style) -> Self {
        Self {
            color: Some(style),
            ..Self::default()
        }
    }

    /// Options for a cell that must never be shortened
    pub fn no_truncate() -> Self {
        Self {
            truncate: false,
            ..Self::default()
        }
    }
}

/// A buffered cell
#[derive(Debug, Clone)]
pub(crate) struct Cell {
    pub text: String,
    pub opts: FieldOpts,
}

/// A relative-time value; printers decide how to show it
pub(crate) fn time_text(now: DateTime<Utc>, t: DateTime<Utc>, relative: bool) -> String {
    if relative {
        crate::core::timeago::fuzzy_ago(now, t)
    } else {
        t.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
    }
}

/// Row-oriented output
pub trait Printer {
    /// Declare the header row
    fn add_columns(&mut self, names: &[&str]);

    /// Append a cell with options to the current row
    fn add_field_with(&mut self, value: &str, opts: FieldOpts);

    /// Append a plain cell to the current row
    fn add_field(&mut self, value: &str) {
        self.add_field_with(value, FieldOpts::default());
    }

    /// Append a "x ago" cell
    fn add_time_field(&mut self, now: DateTime<Utc>, t: DateTime<Utc>, color: Option<Style>);

    /// Finish the current row
    fn end_row(&mut self);

    /// Write everything buffered and reset
    fn render(&mut self) -> io::Result<()>;
}

/// Build the printer for a format
pub fn new_printer(io: Arc<IoStreams>, format: OutputFormat) -> Box<dyn Printer> {
    match format {
        OutputFormat::Table => Box::new(TablePrinter::new(io)),
        OutputFormat::List => Box::new(ListPrinter::new(io)),
        OutputFormat::Json => Box::new(JsonPrinter::new(io)),
    }
}

/// Apply a style when colour is on
pub(crate) fn paint(io: &IoStreams, text: &str, style: Option<&Style>) -> String {
    match style {
        Some(style) if io.color_enabled() => style.clone().force_styling(true).apply_to(text).to_string(),
        _ => text.to_string(),
    }
}
