//! Pitchside client session layer.
//!
//! Headless counterpart to the server room: connects over WebSocket after a
//! health probe, keeps the link alive with a heartbeat, queues outbound
//! messages while disconnected, and reconnects with capped exponential
//! backoff. Server traffic is surfaced to registered event listeners; the
//! rendering layer consumes those events and is out of scope here.

pub mod backoff;
pub mod error;
pub mod events;
pub mod session;

pub use error::ClientError;
pub use events::{EventKind, SessionEvent};
pub use session::{ClientSession, SessionConfig, SessionState};
