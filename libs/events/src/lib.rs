//! # cadence-events
//!
//! The two message shapes that cross the schedule core's boundary.
//!
//! ## Change notices (downstream)
//!
//! Every committed mutation emits one [`ChangeNotice`]. Notices are
//! signal-only: they say *what kind* of thing changed and *which* record, never
//! the new values. Observers re-derive their view from current state.
//!
//! ## Confirmation messages (upstream, out-of-band)
//!
//! The durable store publishes a per-day change feed. Each
//! [`ConfirmationMessage`] lists the engagements a durable write touched; the
//! core treats any message touching a confirming engagement as its
//! acknowledgment.

mod envelope;
mod error;
mod types;

pub use envelope::*;
pub use error::EventError;
pub use types::*;
