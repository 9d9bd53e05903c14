use serde::Serialize;
use strum::IntoStaticStr;

/// Slot identifier used as the prefix of every row and cell key.
pub fn slot_id(slot_index: usize) -> String {
    format!("slot-{slot_index}")
}

/// What one slot shows.
#[derive(Debug, Clone, PartialEq, Serialize, IntoStaticStr)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DisplayModel {
    /// A single headline value.
    Kpi { value: String, label: String },
    /// At most ten rows of a multi-cell cube page.
    Table { rows: Vec<Row>, label: String },
    /// At most ten rows of a list object page.
    List { rows: Vec<Row>, label: String },
    Empty { label: String },
    Error { message: String },
}

impl DisplayModel {
    pub fn kind(&self) -> &'static str {
        self.into()
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            Self::Kpi { label, .. }
            | Self::Table { label, .. }
            | Self::List { label, .. }
            | Self::Empty { label } => Some(label),
            Self::Error { .. } => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    pub row_key: String,
    pub cells: Vec<Cell>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cell {
    pub text: String,
    pub numeric: Option<f64>,
    pub cell_key: String,
}

/// One fixed-position entry of the ordered slot sequence.
///
/// `slot_index` and `object_id` are set when the connection opens and
/// never change; only `display_model` is replaced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectSubscription {
    pub slot_index: usize,
    pub object_id: String,
    pub display_model: DisplayModel,
}

impl ObjectSubscription {
    /// Placeholder shown before the first layout arrives.
    pub fn pending(slot_index: usize, object_id: &str) -> Self {
        Self {
            slot_index,
            object_id: object_id.to_string(),
            display_model: DisplayModel::Empty {
                label: format!("Object {object_id}"),
            },
        }
    }

    pub fn slot_id(&self) -> String {
        slot_id(self.slot_index)
    }
}
