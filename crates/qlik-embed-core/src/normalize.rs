//! Layout normalization.
//!
//! Reduces a raw `qLayout` to a [`DisplayModel`]. Rules apply in priority
//! order:
//!
//! 1. `qkpi` → [`DisplayModel::Kpi`] from `qValue.qText`, else `qValue.qNum`,
//!    else `"N/A"`.
//! 2. `qHyperCube.qDataPages[0].qMatrix` of exactly one cell → `Kpi`.
//! 3. The same matrix with more than one row or column →
//!    [`DisplayModel::Table`] of the first [`MAX_ROWS`] rows.
//! 4. `qListObject.qDataPages[0].qMatrix` with rows → [`DisplayModel::List`].
//! 5. Anything else → [`DisplayModel::Empty`].
//!
//! The transform is total: absent or oddly typed fields degrade to `Empty`
//! (or to empty text / no number inside a row), never to an error.

use serde_json::Value;

use crate::model::{Cell, DisplayModel, Row, slot_id};

/// Row cap for tables and lists.
pub const MAX_ROWS: usize = 10;

const NOT_AVAILABLE: &str = "N/A";

/// Normalize the layout of `object_id` shown at `slot_index`.
pub fn normalize(layout: &Value, object_id: &str, slot_index: usize) -> DisplayModel {
    let label = title(layout, object_id);
    let slot = slot_id(slot_index);

    if let Some(kpi) = layout.get("qkpi").filter(|v| !v.is_null()) {
        return DisplayModel::Kpi {
            value: display_value(kpi.get("qValue")),
            label,
        };
    }

    if let Some(matrix) = first_page(layout, "qHyperCube") {
        if let [row] = matrix {
            if let Some([cell]) = row.as_array().map(Vec::as_slice) {
                return DisplayModel::Kpi {
                    value: display_value(Some(cell)),
                    label,
                };
            }
        }
        let widest = matrix
            .iter()
            .map(|r| r.as_array().map_or(0, Vec::len))
            .max()
            .unwrap_or(0);
        if matrix.len() > 1 || widest > 1 {
            return DisplayModel::Table {
                rows: keyed_rows(matrix, &format!("{slot}-row-"), &format!("{slot}-cell-")),
                label,
            };
        }
    }

    if let Some(matrix) = first_page(layout, "qListObject").filter(|m| !m.is_empty()) {
        return DisplayModel::List {
            rows: keyed_rows(
                matrix,
                &format!("{slot}-list-row-"),
                &format!("{slot}-list-cell-"),
            ),
            label,
        };
    }

    DisplayModel::Empty { label }
}

/// `qMeta.title` when present and non-empty, else `Object {id}`.
fn title(layout: &Value, object_id: &str) -> String {
    layout
        .pointer("/qMeta/title")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .map_or_else(|| format!("Object {object_id}"), String::from)
}

/// `{container}.qDataPages[0].qMatrix` as a slice of rows.
fn first_page<'a>(layout: &'a Value, container: &str) -> Option<&'a [Value]> {
    layout
        .get(container)?
        .get("qDataPages")?
        .get(0)?
        .get("qMatrix")?
        .as_array()
        .map(Vec::as_slice)
}

fn keyed_rows(matrix: &[Value], row_prefix: &str, cell_prefix: &str) -> Vec<Row> {
    matrix
        .iter()
        .take(MAX_ROWS)
        .enumerate()
        .map(|(r, row)| Row {
            row_key: format!("{row_prefix}{r}"),
            cells: row
                .as_array()
                .map(Vec::as_slice)
                .unwrap_or_default()
                .iter()
                .enumerate()
                .map(|(c, cell)| Cell {
                    text: cell_text(cell).unwrap_or_default().to_string(),
                    numeric: cell_number(cell),
                    cell_key: format!("{cell_prefix}{r}-{c}"),
                })
                .collect(),
        })
        .collect()
}

fn cell_text(cell: &Value) -> Option<&str> {
    cell.get("qText").and_then(Value::as_str).filter(|t| !t.is_empty())
}

/// `qNum` as a finite number. The engine sends the string `"NaN"` for
/// cells without a numeric value.
fn cell_number(cell: &Value) -> Option<f64> {
    cell.get("qNum").and_then(Value::as_f64).filter(|n| n.is_finite())
}

fn display_value(value: Option<&Value>) -> String {
    let Some(value) = value else {
        return NOT_AVAILABLE.to_string();
    };
    if let Some(text) = cell_text(value) {
        return text.to_string();
    }
    cell_number(value).map_or_else(|| NOT_AVAILABLE.to_string(), format_number)
}

/// Magnitudes at or above this print in scientific notation.
const SCIENTIFIC_ABOVE: f64 = 1e15;
/// Non-zero magnitudes below this print in scientific notation.
const SCIENTIFIC_BELOW: f64 = 1e-4;
const MAX_FRACTION_DIGITS: usize = 6;

/// Bounded rendering for a number the engine sent without text.
fn format_number(n: f64) -> String {
    let magnitude = n.abs();
    if magnitude >= SCIENTIFIC_ABOVE || (f64::MIN_POSITIVE..SCIENTIFIC_BELOW).contains(&magnitude) {
        return format!("{n:e}");
    }
    let fixed = format!("{n:.MAX_FRACTION_DIGITS$}");
    match fixed.trim_end_matches('0').trim_end_matches('.') {
        "-0" => "0".to_string(),
        trimmed => trimmed.to_string(),
    }
}
