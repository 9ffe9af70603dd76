//! Column-aligned table printer

use chrono::{DateTime, Utc};
use console::{measure_text_width, truncate_str, Style};
use std::io::{self, Write};
use std::sync::Arc;

use super::{paint, time_text, Cell, FieldOpts, Printer};
use crate::infra::IoStreams;

const SEPARATOR: &str = "  ";
const ELLIPSIS: &str = "...";

/// Width-aware table on a terminal, tab-separated values otherwise
///
/// The header row, truncation and colour only apply when stdout is a TTY.
pub struct TablePrinter {
    io: Arc<IoStreams>,
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
    current: Vec<Cell>,
}

impl TablePrinter {
    /// Create a printer writing to `io`
    pub fn new(io: Arc<IoStreams>) -> Self {
        Self {
            io,
            columns: Vec::new(),
            rows: Vec::new(),
            current: Vec::new(),
        }
    }

    fn column_widths(&self, header: bool) -> Vec<usize> {
        let count = self
            .rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(if header { self.columns.len() } else { 0 }))
            .max()
            .unwrap_or(0);
        let mut widths = vec![0usize; count];
        if header {
            for (i, name) in self.columns.iter().enumerate() {
                widths[i] = widths[i].max(measure_text_width(name));
            }
        }
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(measure_text_width(&cell.text));
            }
        }
        widths
    }

    /// Shrink truncatable columns until the row fits `max`
    fn fit(&self, mut widths: Vec<usize>, max: usize) -> Vec<usize> {
        let separators = SEPARATOR.len() * widths.len().saturating_sub(1);
        let available = max.saturating_sub(separators);
        let total: usize = widths.iter().sum();
        if total <= available || widths.is_empty() {
            return widths;
        }

        let fixed: Vec<bool> = (0..widths.len())
            .map(|i| self.rows.iter().any(|r| r.get(i).is_some_and(|c| !c.opts.truncate)))
            .collect();
        let fixed_total: usize = widths
            .iter()
            .zip(&fixed)
            .filter(|(_, f)| **f)
            .map(|(w, _)| *w)
            .sum();
        let mut remaining = available.saturating_sub(fixed_total);
        let mut flexible: Vec<usize> = (0..widths.len()).filter(|i| !fixed[*i]).collect();

        // Columns narrower than an even share keep their width
        loop {
            if flexible.is_empty() {
                break;
            }
            let share = remaining / flexible.len();
            let (narrow, wide): (Vec<usize>, Vec<usize>) =
                flexible.iter().partition(|i| widths[**i] <= share);
            if narrow.is_empty() {
                let mut extra = remaining - share * wide.len();
                for i in &wide {
                    let bonus = usize::from(extra > 0);
                    extra = extra.saturating_sub(1);
                    widths[*i] = (share + bonus).max(ELLIPSIS.len() + 1);
                }
                break;
            }
            for i in &narrow {
                remaining = remaining.saturating_sub(widths[*i]);
            }
            flexible = wide;
        }
        widths
    }

    fn render_tty(&self, out: &mut impl Write) -> io::Result<()> {
        let header = !self.columns.is_empty();
        let widths = self.fit(self.column_widths(header), self.io.terminal_width());
        let header_style = Style::new().bold();

        if header {
            let cells: Vec<Cell> = self
                .columns
                .iter()
                .map(|c| Cell {
                    text: c.to_uppercase(),
                    opts: FieldOpts::color(header_style.clone()),
                })
                .collect();
            self.write_row(out, &cells, &widths)?;
        }
        for row in &self.rows {
            self.write_row(out, row, &widths)?;
        }
        Ok(())
    }

    fn write_row(&self, out: &mut impl Write, row: &[Cell], widths: &[usize]) -> io::Result<()> {
        let last = row.len().saturating_sub(1);
        let mut line = String::new();
        for (i, cell) in row.iter().enumerate() {
            let width = widths.get(i).copied().unwrap_or(0);
            let text = if cell.opts.truncate && measure_text_width(&cell.text) > width {
                truncate_str(&cell.text, width.max(ELLIPSIS.len()), ELLIPSIS).into_owned()
            } else {
                cell.text.clone()
            };
            let pad = width.saturating_sub(measure_text_width(&text));
            line.push_str(&paint(&self.io, &text, cell.opts.color.as_ref()));
            if i < last {
                line.push_str(&" ".repeat(pad));
                line.push_str(SEPARATOR);
            }
        }
        writeln!(out, "{}", line.trim_end())
    }

    fn render_plain(&self, out: &mut impl Write) -> io::Result<()> {
        for row in &self.rows {
            let line: Vec<&str> = row.iter().map(|c| c.text.as_str()).collect();
            writeln!(out, "{}", line.join("\t"))?;
        }
        Ok(())
    }
}

impl Printer for TablePrinter {
    fn add_columns(&mut self, names: &[&str]) {
        self.columns = names.iter().map(|n| n.to_string()).collect();
    }

    fn add_field_with(&mut self, value: &str, opts: FieldOpts) {
        self.current.push(Cell {
            text: value.replace(['\n', '\r', '\t'], " "),
            opts,
        });
    }

    fn add_time_field(&mut self, now: DateTime<Utc>, t: DateTime<Utc>, color: Option<Style>) {
        let text = time_text(now, t, self.io.is_stdout_tty());
        self.add_field_with(
            &text,
            FieldOpts {
                color,
                truncate: true,
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
        let mut out = self.io.out();
        if self.io.is_stdout_tty() {
            self.render_tty(&mut out)?;
        } else {
            self.render_plain(&mut out)?;
        }
        out.flush()?;
        drop(out);
        self.rows.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn printer(tty: bool, width: usize) -> (TablePrinter, crate::infra::iostreams::TestStreams) {
        let (io, streams) = IoStreams::test();
        let io = io.with_tty(false, tty, false).with_width(width);
        (TablePrinter::new(Arc::new(io)), streams)
    }

    #[test]
    fn test_tty_aligns_columns_with_header() {
        let (mut p, streams) = printer(true, 80);
        p.add_columns(&["ID", "Title"]);
        p.add_field("1");
        p.add_field("First");
        p.end_row();
        p.add_field("200");
        p.add_field("Second");
        p.end_row();
        p.render().unwrap();
        assert_eq!(
            streams.out.contents(),
            "ID   TITLE\n1    First\n200  Second\n"
        );
    }

    #[test]
    fn test_non_tty_is_tab_separated_without_header() {
        let (mut p, streams) = printer(false, 10);
        p.add_columns(&["ID", "Title"]);
        p.add_field("1");
        p.add_field("A rather long title that is not truncated");
        p.render().unwrap();
        assert_eq!(
            streams.out.contents(),
            "1\tA rather long title that is not truncated\n"
        );
    }

    #[test]
    fn test_non_tty_has_no_ansi_even_with_colour() {
        let (io, streams) = IoStreams::test();
        let mut p = TablePrinter::new(Arc::new(io.with_color(false)));
        p.add_field_with("green", FieldOpts::color(Style::new().green()));
        p.render().unwrap();
        assert!(!streams.out.contents().contains('\u{1b}'));
    }

    #[test]
    fn test_wide_cells_are_truncated_on_tty() {
        let (mut p, streams) = printer(true, 20);
        p.add_field("1");
        p.add_field("abcdefghijklmnopqrstuvwxyz");
        p.render().unwrap();
        let out = streams.out.contents();
        let line = out.lines().next().unwrap();
        assert!(measure_text_width(line) <= 20, "{line:?}");
        assert!(line.ends_with(ELLIPSIS));
        assert!(line.starts_with("1  "));
    }

    #[test]
    fn test_fitting_cells_are_left_intact_on_wide_tty() {
        let (mut p, streams) = printer(true, 200);
        p.add_columns(&["Name", "URL"]);
        p.add_field("website");
        p.add_field("https://dev.azure.com/contoso");
        p.end_row();
        p.add_field("a");
        p.add_field("b");
        p.render().unwrap();
        assert_eq!(
            streams.out.contents(),
            "NAME     URL\nwebsite  https://dev.azure.com/contoso\na        b\n"
        );
    }

    #[test]
    fn test_render_resets_rows() {
        let (mut p, streams) = printer(false, 80);
        p.add_field("a");
        p.render().unwrap();
        p.render().unwrap();
        assert_eq!(streams.out.contents(), "a\n");
    }
}
