use serde_json::Value;

use crate::cli::OutputFormat;
use crate::error::CliError;

pub fn render(payload: &Value, format: OutputFormat, pretty: bool) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => {
            let text = if pretty {
                serde_json::to_string_pretty(payload)?
            } else {
                serde_json::to_string(payload)?
            };
            println!("{text}");
        }
        OutputFormat::Table => print!("{}", render_table(payload)),
    }
    Ok(())
}

/// Objects print as aligned `key: value` lines; arrays of objects print as
/// columns named after the first element's keys.
pub fn render_table(payload: &Value) -> String {
    let mut out = String::new();
    match payload {
        Value::Object(map) => {
            let width = map.keys().map(String::len).max().unwrap_or(0);
            for (key, value) in map {
                match value {
                    Value::Array(items) if items.iter().all(Value::is_object) => {
                        out.push_str(&format!("{key}:\n"));
                        for line in render_rows(items).lines() {
                            out.push_str(&format!("  {line}\n"));
                        }
                    }
                    _ => out.push_str(&format!("{key:<width$} : {}\n", cell(value))),
                }
            }
        }
        Value::Array(items) => out.push_str(&render_rows(items)),
        other => out.push_str(&format!("{}\n", cell(other))),
    }
    out
}

fn render_rows(items: &[Value]) -> String {
    let Some(Value::Object(first)) = items.first() else {
        return String::from("(none)\n");
    };
    let columns: Vec<&String> = first.keys().collect();
    let rows: Vec<Vec<String>> = items
        .iter()
        .map(|item| {
            columns
                .iter()
                .map(|column| item.get(column.as_str()).map(cell).unwrap_or_default())
                .collect()
        })
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, column)| {
            rows.iter()
                .map(|row| row[i].len())
                .chain(std::iter::once(column.len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    let header: Vec<String> = columns
        .iter()
        .zip(&widths)
        .map(|(column, width)| format!("{column:<width$}"))
        .collect();
    out.push_str(header.join("  ").trim_end());
    out.push('\n');
    for row in rows {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(value, width)| format!("{value:<width$}"))
            .collect();
        out.push_str(line.join("  ").trim_end());
        out.push('\n');
    }
    out
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::from("-"),
        Value::String(text) => text.clone(),
        Value::Number(number) => match number.as_f64() {
            Some(float) if number.is_f64() => format!("{float:.6}"),
            _ => number.to_string(),
        },
        other => other.to_string(),
    }
}
