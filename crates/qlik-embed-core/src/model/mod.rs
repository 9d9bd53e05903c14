// ── Domain model ──
//
// The uniform display model every remote layout is reduced to, and the
// fixed-position slots that hold it.

mod display;

pub use display::{Cell, DisplayModel, ObjectSubscription, Row, slot_id};
