// ── Reactive slot board ──
//
// Fixed-length, fixed-order sequence of slots with push-based change
// notification via a `watch` channel. Length, order and each slot's
// object id are set at construction; only display models are replaced.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::model::{DisplayModel, ObjectSubscription};

pub(crate) struct SlotBoard {
    /// Full snapshot, replaced copy-on-write on every applied update.
    snapshot: watch::Sender<Arc<Vec<ObjectSubscription>>>,

    /// Cancelled on teardown. Checked under the channel lock so no update
    /// can land after `close` returns.
    closed: CancellationToken,
}

impl SlotBoard {
    /// One pending slot per object id, in the given order.
    pub(crate) fn new(object_ids: &[String]) -> Self {
        let slots = object_ids
            .iter()
            .enumerate()
            .map(|(i, id)| ObjectSubscription::pending(i, id))
            .collect();
        let (snapshot, _) = watch::channel(Arc::new(slots));
        Self {
            snapshot,
            closed: CancellationToken::new(),
        }
    }

    /// Get the current snapshot (cheap `Arc` clone).
    pub(crate) fn snapshot(&self) -> Arc<Vec<ObjectSubscription>> {
        self.snapshot.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Arc<Vec<ObjectSubscription>>> {
        self.snapshot.subscribe()
    }

    /// Replace the display model of the slot at `slot_index`, provided it
    /// holds `object_id`. Returns `false` when nothing was applied: board
    /// closed, no such slot, or a different object in it.
    ///
    /// Subscribers are woken only if the model actually changed.
    pub(crate) fn replace(&self, slot_index: usize, object_id: &str, model: DisplayModel) -> bool {
        let mut applied = false;
        self.snapshot.send_if_modified(|slots| {
            if self.closed.is_cancelled() {
                debug!(slot_index, "board closed, dropping update");
                return false;
            }
            match slots.get(slot_index) {
                Some(slot) if slot.object_id == object_id => {
                    applied = true;
                    if slot.display_model == model {
                        return false;
                    }
                }
                Some(slot) => {
                    warn!(slot_index, expected = %slot.object_id, got = object_id, "update for wrong slot");
                    return false;
                }
                None => {
                    warn!(slot_index, object_id, "update for unknown slot");
                    return false;
                }
            }
            if let Some(slot) = Arc::make_mut(slots).get_mut(slot_index) {
                slot.display_model = model;
            }
            true
        });
        applied
    }

    /// Refuse all further updates and end every [`SlotStream`](crate::stream::SlotStream).
    pub(crate) fn close(&self) {
        self.snapshot.send_if_modified(|_| {
            self.closed.cancel();
            false
        });
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Fires once the board is closed.
    pub(crate) fn closed_signal(&self) -> CancellationToken {
        self.closed.clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.snapshot.borrow().len()
    }
}
