//! Sample History Ring
//!
//! Bounded circular history of the most recent decoded readings. Appends
//! never block and never fail: once the ring wraps, the oldest unread slots
//! are overwritten (last-N-wins).

mod buffer;

pub use buffer::{HistoryRing, DEFAULT_STORAGE_SIZE};
