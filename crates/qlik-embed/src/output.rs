//! Output formatting: table, JSON, YAML, plain.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde, plain emits one line per item.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use qlik_embed_core::{DisplayModel, EmbedState};

use crate::cli::{ColorMode, OutputFormat};

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: &ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

/// Short state name, colored by outcome.
pub fn state_label(state: &EmbedState, color: bool) -> String {
    let name = match state {
        EmbedState::Idle => "idle",
        EmbedState::Authenticating => "authenticating",
        EmbedState::Redirecting { .. } => "redirecting",
        EmbedState::ManualAuthRequired { .. } => "manual-auth-required",
        EmbedState::Connecting => "connecting",
        EmbedState::Ready => "ready",
        EmbedState::Failed { .. } => "failed",
        EmbedState::Closed => "closed",
    };
    if !color {
        return name.into();
    }
    match state {
        EmbedState::Ready => name.green().to_string(),
        EmbedState::Failed { .. } | EmbedState::ManualAuthRequired { .. } => {
            name.red().to_string()
        }
        EmbedState::Redirecting { .. } => name.yellow().to_string(),
        _ => name.dimmed().to_string(),
    }
}

/// One-line summary of what a slot shows.
pub fn model_summary(model: &DisplayModel, color: bool) -> String {
    match model {
        DisplayModel::Kpi { value, .. } => value.clone(),
        DisplayModel::Table { rows, .. } | DisplayModel::List { rows, .. } => {
            format!("{} rows", rows.len())
        }
        DisplayModel::Empty { .. } => "-".into(),
        DisplayModel::Error { message } if color => message.red().to_string(),
        DisplayModel::Error { message } => message.clone(),
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list of serde-serializable + tabled items in the chosen format.
///
/// - `table`: uses the `Tabled` derive to build a pretty table
/// - `json` / `json-compact`: serializes the original data via serde
/// - `yaml`: serializes via serde_yaml
/// - `plain`: calls `line_fn` on each item to emit one line per item
pub fn render_list<T, R>(
    format: &OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    line_fn: impl Fn(&T) -> String,
) -> String
where
    T: serde::Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            render_table(&rows)
        }
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => data.iter().map(&line_fn).collect::<Vec<_>>().join("\n"),
    }
}

/// Render a single serde-serializable item in the chosen format.
///
/// Table rendering uses a custom `detail_fn` that returns a pre-formatted
/// string, since single-item views don't use `Tabled` derive.
pub fn render_single<T>(
    format: &OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    line_fn: impl Fn(&T) -> String,
) -> String
where
    T: serde::Serialize,
{
    match format {
        OutputFormat::Table => detail_fn(data),
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => line_fn(data),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Format-specific renderers ────────────────────────────────────────

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

fn render_json<T: serde::Serialize + ?Sized>(data: &T, compact: bool) -> String {
    let rendered = if compact {
        serde_json::to_string(data)
    } else {
        serde_json::to_string_pretty(data)
    };
    rendered.expect("serialization should not fail")
}

fn render_yaml<T: serde::Serialize + ?Sized>(data: &T) -> String {
    serde_yaml::to_string(data).expect("serialization should not fail")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(serde::Serialize, Tabled)]
    struct Item {
        id: String,
    }

    #[test]
    fn plain_is_one_line_per_item() {
        let items = vec![Item { id: "a".into() }, Item { id: "b".into() }];
        let out = render_list(
            &OutputFormat::Plain,
            &items,
            |i| Item { id: i.id.clone() },
            |i| i.id.clone(),
        );
        assert_eq!(out, "a\nb");
    }

    #[test]
    fn compact_json_is_single_line() {
        let out = render_single(
            &OutputFormat::JsonCompact,
            &EmbedState::Ready,
            |_| String::new(),
            |_| String::new(),
        );
        assert_eq!(out, r#"{"state":"ready"}"#);
    }

    #[test]
    fn summaries_without_color() {
        let kpi = DisplayModel::Kpi {
            value: "42".into(),
            label: "Sales".into(),
        };
        assert_eq!(model_summary(&kpi, false), "42");
        assert_eq!(
            state_label(&EmbedState::Failed { message: "x".into() }, false),
            "failed"
        );
    }
}
