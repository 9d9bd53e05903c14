// ── Reactive slot streams ──
//
// Subscription type for consuming slot updates from a live connection.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::model::ObjectSubscription;

/// Full ordered slot sequence.
pub type Slots = Arc<Vec<ObjectSubscription>>;

/// A subscription to the slots of one connection.
///
/// Provides point-in-time snapshot access and reactive change
/// notification via [`changed`](Self::changed).
pub struct SlotStream {
    current: Slots,
    receiver: watch::Receiver<Slots>,
    closed: CancellationToken,
}

impl SlotStream {
    pub(crate) fn new(receiver: watch::Receiver<Slots>, closed: CancellationToken) -> Self {
        let current = receiver.borrow().clone();
        Self {
            current,
            receiver,
            closed,
        }
    }

    /// Get the snapshot captured at creation time (or at the last `changed()`).
    pub fn current(&self) -> &Slots {
        &self.current
    }

    /// Wait for the next change, returning the new snapshot.
    /// Returns `None` once the connection is closed, locally or by the
    /// engine.
    pub async fn changed(&mut self) -> Option<Slots> {
        tokio::select! {
            biased;
            changed = self.receiver.changed() => changed.ok()?,
            () = self.closed.cancelled() => return None,
        }
        let snap = self.receiver.borrow_and_update().clone();
        self.current = snap.clone();
        Some(snap)
    }
}
