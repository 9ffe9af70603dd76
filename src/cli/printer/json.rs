//! Array-of-objects printer

use chrono::{DateTime, Utc};
use console::Style;
use serde_json::{Map, Value};
use std::io::{self, Write};
use std::sync::Arc;

use super::{time_text, FieldOpts, Printer};
use crate::cli::exporter::write_json;
use crate::infra::IoStreams;

/// Rows become objects keyed by column name, emitted as one JSON array
pub struct JsonPrinter {
    io: Arc<IoStreams>,
    columns: Vec<String>,
    rows: Vec<Value>,
    current: Map<String, Value>,
    cell: usize,
}

impl JsonPrinter {
    /// Create a printer writing to `io`
    pub fn new(io: Arc<IoStreams>) -> Self {
        Self {
            io,
            columns: Vec::new(),
            rows: Vec::new(),
            current: Map::new(),
            cell: 0,
        }
    }

    fn push(&mut self, value: Value) {
        let index = self.cell;
        self.cell += 1;
        let key = self
            .columns
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("col{index}"));
        self.current.insert(key, value);
    }
}

impl Printer for JsonPrinter {
    fn add_columns(&mut self, names: &[&str]) {
        self.columns = names.iter().map(|n| n.to_string()).collect();
    }

    fn add_field_with(&mut self, value: &str, _opts: FieldOpts) {
        self.push(Value::String(value.to_string()));
    }

    fn add_time_field(&mut self, now: DateTime<Utc>, t: DateTime<Utc>, _color: Option<Style>) {
        self.push(Value::String(time_text(now, t, false)));
    }

    fn end_row(&mut self) {
        if !self.current.is_empty() {
            self.rows.push(Value::Object(std::mem::take(&mut self.current)));
        }
        self.cell = 0;
    }

    fn render(&mut self) -> io::Result<()> {
        self.end_row();
        let rows = Value::Array(std::mem::take(&mut self.rows));
        let mut out = self.io.out();
        write_json(&mut out, &rows, self.io.color_enabled())?;
        out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_is_valid_json() {
        let (io, streams) = IoStreams::test();
        let mut p = JsonPrinter::new(Arc::new(io));
        p.add_columns(&["ID", "Title"]);
        p.add_field("1");
        p.add_field("quote \" and \\ backslash");
        p.end_row();
        p.add_field("2");
        p.render().unwrap();

        let parsed: Value = serde_json::from_str(&streams.out.contents()).unwrap();
        assert_eq!(
            parsed,
            serde_json::json!([
                {"ID": "1", "Title": "quote \" and \\ backslash"},
                {"ID": "2"}
            ])
        );
    }

    #[test]
    fn test_repeated_column_name_keeps_later_keys_aligned() {
        let (io, streams) = IoStreams::test();
        let mut p = JsonPrinter::new(Arc::new(io));
        p.add_columns(&["Name", "Name", "Kind"]);
        p.add_field("a");
        p.add_field("b");
        p.add_field("c");
        p.end_row();
        p.add_field("d");
        p.render().unwrap();

        let parsed: Value = serde_json::from_str(&streams.out.contents()).unwrap();
        assert_eq!(
            parsed,
            serde_json::json!([{"Name": "b", "Kind": "c"}, {"Name": "d"}])
        );
    }

    #[test]
    fn test_empty_render_is_empty_array() {
        let (io, streams) = IoStreams::test();
        JsonPrinter::new(Arc::new(io)).render().unwrap();
        assert_eq!(streams.out.contents().trim(), "[]");
    }
}
