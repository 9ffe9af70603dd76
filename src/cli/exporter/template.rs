//! `--template` rendering
//!
//! Templates use Jinja syntax. The exported value is available as `data`;
//! when it is an object its keys are also top-level names.

use chrono::{DateTime, Utc};
use console::{measure_text_width, truncate_str, Style};
use minijinja::value::Rest;
use minijinja::{Environment, Error, ErrorKind, Value};
use parking_lot::Mutex;
use serde_json::Value as Json;
use std::sync::Arc;

use super::ExportError;
use crate::core::timeago;
use crate::infra::IoStreams;

fn style(name: &str) -> Style {
    Style::from_dotted_str(name).force_styling(true)
}

fn parse_time(value: &str) -> Result<DateTime<Utc>, Error> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::new(ErrorKind::InvalidOperation, format!("invalid time {value:?}: {e}")))
}

fn render_rows(rows: &[Vec<String>]) -> String {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut widths = vec![0usize; columns];
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(measure_text_width(cell));
        }
    }
    let mut text = String::new();
    for row in rows {
        let mut line = String::new();
        for (i, cell) in row.iter().enumerate() {
            line.push_str(cell);
            if i + 1 < row.len() {
                line.push_str(&" ".repeat(widths[i] - measure_text_width(cell) + 2));
            }
        }
        text.push_str(line.trim_end());
        text.push('\n');
    }
    text
}

fn environment(color: bool, tty: bool) -> Environment<'static> {
    let mut env = Environment::new();
    let rows: Arc<Mutex<Vec<Vec<String>>>> = Arc::default();

    env.add_function("autocolor", move |name: String, text: String| -> String {
        if color {
            style(&name).apply_to(text).to_string()
        } else {
            text
        }
    });
    env.add_function("color", |name: String, text: String| -> String {
        style(&name).apply_to(text).to_string()
    });
    env.add_function("join", |sep: String, items: Vec<Value>| -> String {
        items
            .iter()
            .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
            .collect::<Vec<_>>()
            .join(&sep)
    });
    env.add_function("pluck", |field: String, items: Vec<Value>| -> Result<Vec<Value>, Error> {
        items.iter().map(|item| item.get_attr(&field)).collect()
    });
    let row_sink = Arc::clone(&rows);
    env.add_function("tablerow", move |cells: Rest<Value>| -> String {
        let row = cells
            .iter()
            .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
            .collect();
        row_sink.lock().push(row);
        String::new()
    });
    env.add_function("tablerender", move || -> String {
        let rows = std::mem::take(&mut *rows.lock());
        render_rows(&rows)
    });
    env.add_function("timeago", |time: String| -> Result<String, Error> {
        Ok(timeago::fuzzy_ago(Utc::now(), parse_time(&time)?))
    });
    env.add_function("timefmt", |format: String, time: String| -> Result<String, Error> {
        Ok(parse_time(&time)?.format(&format).to_string())
    });
    env.add_function("truncate", |length: usize, text: String| -> String {
        if measure_text_width(&text) <= length {
            return text;
        }
        truncate_str(&text, length.max(3), "...").into_owned()
    });
    env.add_function("hyperlink", move |url: String, text: String| -> String {
        if tty {
            format!("\u{1b}]8;;{url}\u{1b}\\{text}\u{1b}]8;;\u{1b}\\")
        } else {
            format!("{text} ({url})")
        }
    });
    env
}

/// Render `source` with `data` in scope
pub fn render(io: &IoStreams, source: &str, data: &Json) -> Result<String, ExportError> {
    let env = environment(io.color_enabled(), io.is_stdout_tty());
    let mut context = serde_json::Map::new();
    if let Json::Object(map) = data {
        context.extend(map.clone());
    }
    context.insert("data".to_string(), data.clone());
    env.render_str(source, Json::Object(context))
        .map_err(|e| ExportError::Template(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(source: &str, data: Json) -> String {
        let (io, _) = IoStreams::test();
        render(&io, source, &data).unwrap()
    }

    #[test]
    fn test_object_keys_are_top_level() {
        assert_eq!(run("#{{ id }} {{ title }}", json!({"id": 7, "title": "fix"})), "#7 fix");
    }

    #[test]
    fn test_join_and_pluck() {
        let data = json!([{"name": "bug"}, {"name": "p1"}]);
        assert_eq!(run("{{ join(', ', pluck('name', data)) }}", data), "bug, p1");
    }

    #[test]
    fn test_tablerow_aligns_columns() {
        let data = json!([{"id": 1, "title": "a"}, {"id": 200, "title": "b"}]);
        let out = run(
            "{% for pr in data %}{{ tablerow(pr.id, pr.title) }}{% endfor %}{{ tablerender() }}",
            data,
        );
        assert_eq!(out, "1    a\n200  b\n");
    }

    #[test]
    fn test_autocolor_is_plain_without_colour() {
        assert_eq!(run("{{ autocolor('green', 'ok') }}", json!({})), "ok");
        assert!(run("{{ color('green', 'ok') }}", json!({})).contains('\u{1b}'));
    }

    #[test]
    fn test_time_functions() {
        let data = json!({"t": "2024-03-01T10:00:00Z"});
        assert_eq!(run("{{ timefmt('%Y-%m-%d', t) }}", data.clone()), "2024-03-01");
        assert!(run("{{ timeago(t) }}", data).ends_with("ago"));
    }

    #[test]
    fn test_truncate_and_hyperlink_off_tty() {
        assert_eq!(run("{{ truncate(6, 'abcdefghij') }}", json!({})), "abc...");
        assert_eq!(run("{{ truncate(10, 'abcdefghij') }}", json!({})), "abcdefghij");
        assert_eq!(run("{{ truncate(1, 'abcdefghij') }}", json!({})), "...");
        assert_eq!(
            run("{{ hyperlink('https://x', 'x') }}", json!({})),
            "x (https://x)"
        );
    }
}
