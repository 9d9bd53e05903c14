// ── Change notifier ──
//
// Receives per-slot updates as messages from the connection's listener
// tasks and writes the normalized result into exactly one slot.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::model::DisplayModel;
use crate::normalize::normalize;
use crate::store::SlotBoard;

/// A fresh result for one slot.
#[derive(Debug, Clone)]
pub enum SlotUpdate {
    /// The engine reported a change and the layout was re-fetched.
    Changed {
        slot_index: usize,
        object_id: String,
        layout: Value,
    },
    /// The re-fetch failed.
    FetchFailed {
        slot_index: usize,
        object_id: String,
        message: String,
    },
}

pub struct ChangeNotifier {
    board: Arc<SlotBoard>,
}

impl ChangeNotifier {
    pub(crate) fn new(board: Arc<SlotBoard>) -> Self {
        Self { board }
    }

    /// Normalize and store one update. Returns whether a slot was written.
    pub fn apply(&self, update: SlotUpdate) -> bool {
        if self.board.is_closed() {
            trace!("connection closed, ignoring update");
            return false;
        }
        let (slot_index, object_id, model) = match update {
            SlotUpdate::Changed {
                slot_index,
                object_id,
                layout,
            } => {
                let model = normalize(&layout, &object_id, slot_index);
                (slot_index, object_id, model)
            }
            SlotUpdate::FetchFailed {
                slot_index,
                object_id,
                message,
            } => (slot_index, object_id, DisplayModel::Error { message }),
        };
        debug!(slot_index, object_id, kind = model.kind(), "slot updated");
        self.board.replace(slot_index, &object_id, model)
    }

    /// Apply updates until the channel closes or `cancel` fires.
    pub async fn run(self, mut updates: mpsc::UnboundedReceiver<SlotUpdate>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                update = updates.recv() => match update {
                    Some(update) => {
                        self.apply(update);
                    }
                    None => break,
                }
            }
        }
        trace!("change notifier exiting");
    }
}
