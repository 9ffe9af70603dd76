//! `Key: Value` record printer

use chrono::{DateTime, Utc};
use console::Style;
use std::io::{self, Write};
use std::sync::Arc;

use super::{paint, time_text, Cell, FieldOpts, Printer};
use crate::infra::IoStreams;

/// One block of `Key: Value` lines per row, blank line between rows
pub struct ListPrinter {
    io: Arc<IoStreams>,
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
    current: Vec<Cell>,
}

impl ListPrinter {
    /// Create a printer writing to `io`
    pub fn new(io: Arc<IoStreams>) -> Self {
        Self {
            io,
            columns: Vec::new(),
            rows: Vec::new(),
            current: Vec::new(),
        }
    }

    fn key(&self, index: usize) -> String {
        self.columns
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("col{index}"))
    }
}

impl Printer for ListPrinter {
    fn add_columns(&mut self, names: &[&str]) {
        self.columns = names.iter().map(|n| n.to_string()).collect();
    }

    fn add_field_with(&mut self, value: &str, opts: FieldOpts) {
        self.current.push(Cell {
            text: value.to_string(),
            opts,
        });
    }

    fn add_time_field(&mut self, now: DateTime<Utc>, t: DateTime<Utc>, color: Option<Style>) {
        let text = time_text(now, t, true);
        self.add_field_with(
            &text,
            FieldOpts {
                color,
                truncate: false,
            },
        );
    }

    fn end_row(&mut self) {
        if !self.current.is_empty() {
            self.rows.push(std::mem::take(&mut self.current));
        }
    }

    fn render(&mut self) -> io::Result<()> {
        self.end_row();
        let rows = std::mem::take(&mut self.rows);
        let mut out = self.io.out();
        for (n, row) in rows.iter().enumerate() {
            if n > 0 {
                writeln!(out)?;
            }
            for (i, cell) in row.iter().enumerate() {
                let value = paint(&self.io, &cell.text, cell.opts.color.as_ref());
                writeln!(out, "{}: {}", self.key(i), value)?;
            }
        }
        out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_are_blank_line_separated() {
        let (io, streams) = IoStreams::test();
        let mut p = ListPrinter::new(Arc::new(io));
        p.add_columns(&["Name", "Url"]);
        p.add_field("web");
        p.add_field("https://x/web");
        p.end_row();
        p.add_field("api");
        p.add_field("https://x/api");
        p.add_field("extra");
        p.render().unwrap();
        assert_eq!(
            streams.out.contents(),
            "Name: web\nUrl: https://x/web\n\nName: api\nUrl: https://x/api\ncol2: extra\n"
        );
    }
}
