//! Host-side ring transport for the isplink coprocessor.
//!
//! This is the core of isplink: the machinery that moves command frames
//! from caller threads into per-stream shared-memory rings, and response
//! frames from those rings back to the callers that are waiting on them.
//!
//! - [`RingChannel`] — wraparound-aware frame insert/drain over one ring
//! - [`PayloadPool`] — fixed-slot arena for out-of-line command payloads
//! - [`PendingCommandTable`] — correlation of in-flight commands
//! - [`Transport`] — the public send API (fire-and-forget or blocking)
//! - one dispatcher thread per stream draining responses and resolving
//!   or fanning out what it finds
//!
//! The command-send path across *all* streams is serialized by a single
//! lock; that is a known firmware-interface constraint, not an accident.

pub mod dispatch;
pub mod error;
pub mod events;
pub mod pending;
pub mod pool;
pub mod ring;
pub mod transport;

pub use error::{RingError, SendError};
pub use events::{EventCallback, EventKind};
pub use pending::{
    PayloadHolder, PendingCommand, PendingCommandTable, PendingHandle, WaitOutcome, Waiter,
};
pub use pool::{PayloadPool, PayloadSlot};
pub use ring::RingChannel;
pub use transport::{StreamRings, Transport, TransportConfig};
