//! The `--json` / `--jq` / `--template` pipeline
//!
//! A leaf that opts in flattens [`ExportArgs`] into its arguments, declares
//! the field names of its view type and hands the view to
//! [`Exporter::write`]. The value is projected onto the requested fields,
//! then run through the jq expression, then through the template.

mod jq;
mod template;

use clap::Args;
use serde::Serialize;
use serde_json::Value;
use std::io::{self, Write};
use thiserror::Error;

use crate::error::CliError;
use crate::infra::IoStreams;

/// Exporter failures
#[derive(Error, Debug)]
pub enum ExportError {
    /// Field not declared by the command
    #[error("unknown JSON field: {field:?}\nAvailable fields:\n{}", indent(.allowed))]
    UnknownField { field: String, allowed: Vec<String> },

    /// jq expression failed to compile or run
    #[error("jq: {0}")]
    Jq(String),

    /// Template failed to compile or render
    #[error("template: {0}")]
    Template(String),
}

fn indent(fields: &[String]) -> String {
    fields
        .iter()
        .map(|f| format!("  {f}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Output flags shared by every exporting leaf
#[derive(Args, Debug, Clone, Default)]
pub struct ExportArgs {
    /// Output JSON with the specified fields
    #[arg(
        long,
        value_name = "FIELDS",
        num_args = 0..=1,
        default_missing_value = "",
        value_delimiter = ','
    )]
    pub json: Option<Vec<String>>,

    /// Filter JSON output using a jq expression
    #[arg(short = 'q', long, value_name = "EXPRESSION", requires = "json")]
    pub jq: Option<String>,

    /// Format JSON output using a template
    #[arg(short = 't', long, value_name = "TEMPLATE", requires = "json")]
    pub template: Option<String>,
}

impl ExportArgs {
    /// Whether `--json` was given without field names
    pub fn wants_field_list(&self) -> bool {
        self.json
            .as_ref()
            .is_some_and(|fields| fields.iter().all(|f| f.trim().is_empty()))
    }
}

/// Sorted field list printed for a bare `--json`
pub fn field_list(fields: &[&str]) -> String {
    let mut sorted: Vec<&str> = fields.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    let mut text = String::new();
    for field in sorted {
        text.push_str(field);
        text.push('\n');
    }
    text
}

/// A configured export
#[derive(Debug, Clone)]
pub struct Exporter {
    fields: Vec<String>,
    jq: Option<String>,
    template: Option<String>,
}

impl Exporter {
    /// Exporter for the given flags, or `None` when `--json` is absent
    ///
    /// Unknown field names are flag errors listing what `allowed` offers.
    pub fn from_args(args: &ExportArgs, allowed: &[&str]) -> anyhow::Result<Option<Self>> {
        let Some(requested) = &args.json else {
            return Ok(None);
        };
        let mut fields = Vec::new();
        for field in requested.iter().map(|f| f.trim()).filter(|f| !f.is_empty()) {
            if !allowed.contains(&field) {
                let mut valid: Vec<String> = allowed.iter().map(|f| f.to_string()).collect();
                valid.sort();
                let err = ExportError::UnknownField {
                    field: field.to_string(),
                    allowed: valid,
                };
                return Err(CliError::flag(err.to_string()).into());
            }
            if !fields.iter().any(|f| f == field) {
                fields.push(field.to_string());
            }
        }
        Ok(Some(Self {
            fields,
            jq: args.jq.clone(),
            template: args.template.clone(),
        }))
    }

    /// Requested fields, in request order
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Whether a field was requested; leaves use it to skip extra API calls
    pub fn wants(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }

    /// Keep only the requested fields of an object or array of objects
    pub fn project(&self, value: Value) -> Value {
        match value {
            Value::Array(items) => Value::Array(items.into_iter().map(|v| self.project(v)).collect()),
            Value::Object(mut map) => {
                let mut projected = serde_json::Map::new();
                for field in &self.fields {
                    if let Some(v) = map.remove(field) {
                        projected.insert(field.clone(), v);
                    }
                }
                Value::Object(projected)
            }
            other => other,
        }
    }

    /// Project, filter and print `data`
    pub fn write<T: Serialize + ?Sized>(&self, io: &IoStreams, data: &T) -> anyhow::Result<()> {
        let value = self.project(serde_json::to_value(data)?);

        let values = match &self.jq {
            Some(expr) => jq::evaluate(expr, value)?,
            None => vec![value],
        };

        // Build the whole output before writing so a failure prints nothing
        let mut text = String::new();
        if let Some(source) = &self.template {
            for value in &values {
                text.push_str(&template::render(io, source, value)?);
            }
        } else if self.jq.is_some() {
            for value in &values {
                match value {
                    Value::String(s) => text.push_str(s),
                    other => text.push_str(&serde_json::to_string(other)?),
                }
                text.push('\n');
            }
        } else {
            let mut buf = Vec::new();
            for value in &values {
                write_json(&mut buf, value, io.color_enabled())?;
            }
            text = String::from_utf8_lossy(&buf).into_owned();
        }

        let mut out = io.out();
        out.write_all(text.as_bytes())?;
        out.flush()?;
        Ok(())
    }
}

mod palette {
    use console::Style;

    pub fn delimiter() -> Style {
        Style::new().bold().force_styling(true)
    }

    pub fn key() -> Style {
        Style::new().blue().bold().force_styling(true)
    }

    pub fn string() -> Style {
        Style::new().green().force_styling(true)
    }

    pub fn null() -> Style {
        Style::new().dim().force_styling(true)
    }
}

/// Pretty-print JSON with two-space indentation, colourised on request
pub fn write_json(out: &mut impl Write, value: &Value, color: bool) -> io::Result<()> {
    if !color {
        serde_json::to_writer_pretty(&mut *out, value)?;
        return writeln!(out);
    }
    let mut text = String::new();
    colorize(value, 0, &mut text);
    writeln!(out, "{text}")
}

fn colorize(value: &Value, depth: usize, text: &mut String) {
    let pad = "  ".repeat(depth + 1);
    let close_pad = "  ".repeat(depth);
    match value {
        Value::Object(map) if !map.is_empty() => {
            text.push_str(&palette::delimiter().apply_to("{").to_string());
            text.push('\n');
            for (i, (key, v)) in map.iter().enumerate() {
                text.push_str(&pad);
                let key = Value::String(key.clone()).to_string();
                text.push_str(&palette::key().apply_to(key).to_string());
                text.push_str(&palette::delimiter().apply_to(":").to_string());
                text.push(' ');
                colorize(v, depth + 1, text);
                if i + 1 < map.len() {
                    text.push_str(&palette::delimiter().apply_to(",").to_string());
                }
                text.push('\n');
            }
            text.push_str(&close_pad);
            text.push_str(&palette::delimiter().apply_to("}").to_string());
        }
        Value::Array(items) if !items.is_empty() => {
            text.push_str(&palette::delimiter().apply_to("[").to_string());
            text.push('\n');
            for (i, v) in items.iter().enumerate() {
                text.push_str(&pad);
                colorize(v, depth + 1, text);
                if i + 1 < items.len() {
                    text.push_str(&palette::delimiter().apply_to(",").to_string());
                }
                text.push('\n');
            }
            text.push_str(&close_pad);
            text.push_str(&palette::delimiter().apply_to("]").to_string());
        }
        Value::Object(_) => text.push_str(&palette::delimiter().apply_to("{}").to_string()),
        Value::Array(_) => text.push_str(&palette::delimiter().apply_to("[]").to_string()),
        Value::String(_) => text.push_str(&palette::string().apply_to(value.to_string()).to_string()),
        Value::Null => text.push_str(&palette::null().apply_to("null").to_string()),
        other => text.push_str(&other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const FIELDS: &[&str] = &["title", "id", "url"];

    fn args(json: Option<&str>, jq: Option<&str>, template: Option<&str>) -> ExportArgs {
        ExportArgs {
            json: json.map(|j| j.split(',').map(str::to_string).collect()),
            jq: jq.map(str::to_string),
            template: template.map(str::to_string),
        }
    }

    #[test]
    fn test_field_list_is_sorted() {
        assert_eq!(field_list(FIELDS), "id\ntitle\nurl\n");
        assert!(args(Some(""), None, None).wants_field_list());
        assert!(!args(Some("id"), None, None).wants_field_list());
    }

    #[test]
    fn test_unknown_field_is_flag_error() {
        let err = Exporter::from_args(&args(Some("id,nope"), None, None), FIELDS).unwrap_err();
        assert!(matches!(
            crate::error::find_cli_error(&err),
            Some(CliError::Flag { .. })
        ));
        assert!(err.to_string().contains("unknown JSON field: \"nope\""));
    }

    #[test]
    fn test_absent_json_flag_disables_export() {
        assert!(Exporter::from_args(&ExportArgs::default(), FIELDS).unwrap().is_none());
    }

    #[test]
    fn test_projection_keeps_requested_fields() {
        let exporter = Exporter::from_args(&args(Some("id,title"), None, None), FIELDS)
            .unwrap()
            .unwrap();
        let projected = exporter.project(json!([{"id": 1, "title": "a", "url": "u"}]));
        assert_eq!(projected, json!([{"id": 1, "title": "a"}]));
    }

    #[test]
    fn test_write_plain_json() {
        let (io, streams) = IoStreams::test();
        let exporter = Exporter::from_args(&args(Some("id"), None, None), FIELDS)
            .unwrap()
            .unwrap();
        exporter.write(&io, &json!({"id": 3, "title": "x"})).unwrap();
        let parsed: Value = serde_json::from_str(&streams.out.contents()).unwrap();
        assert_eq!(parsed, json!({"id": 3}));
    }

    #[test]
    fn test_jq_then_raw_strings() {
        let (io, streams) = IoStreams::test();
        let exporter = Exporter::from_args(&args(Some("id,title"), Some(".[].title"), None), FIELDS)
            .unwrap()
            .unwrap();
        exporter
            .write(&io, &json!([{"id": 1, "title": "a"}, {"id": 2, "title": "b"}]))
            .unwrap();
        assert_eq!(streams.out.contents(), "a\nb\n");
    }

    #[test]
    fn test_colour_output_is_still_json_once_stripped() {
        let value = json!({"a": [1, "two", null], "b": {}});
        let mut buf = Vec::new();
        write_json(&mut buf, &value, true).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains('\u{1b}'));
        let stripped = console::strip_ansi_codes(&text);
        assert_eq!(serde_json::from_str::<Value>(&stripped).unwrap(), value);
    }
}
