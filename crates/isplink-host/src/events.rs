use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use isplink_frame::{kinds, INLINE_WORDS};

/// Non-completion response kinds forwarded to the upper layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A frame-control request (start/stop/drop) finished.
    FrameControlComplete,
    /// Per-frame statistics and metadata.
    FrameInfo,
    /// Asynchronous firmware error report.
    FirmwareError,
    /// Periodic liveness beacon.
    Heartbeat,
}

impl EventKind {
    /// Map a wire response kind to an event kind. `None` for command
    /// completions (handled by the pending table) and unknown kinds.
    pub fn from_response_kind(kind: u32) -> Option<Self> {
        match kind {
            kinds::FRAME_CONTROL_COMPLETE => Some(Self::FrameControlComplete),
            kinds::FRAME_INFO => Some(Self::FrameInfo),
            kinds::FIRMWARE_ERROR => Some(Self::FirmwareError),
            kinds::HEARTBEAT => Some(Self::Heartbeat),
            _ => None,
        }
    }
}

/// Upper-layer event sink: `(channel_id, event_kind, result_words)`.
///
/// Invoked on the dispatcher thread for the channel that owns the
/// stream; callbacks must not block for long or they stall that
/// stream's response draining.
pub type EventCallback = Arc<dyn Fn(u16, EventKind, &[u32; INLINE_WORDS]) + Send + Sync>;

/// Per-channel callback registrations.
#[derive(Default)]
pub(crate) struct CallbackRegistry {
    callbacks: RwLock<HashMap<u16, EventCallback>>,
}

impl CallbackRegistry {
    pub(crate) fn register(&self, channel_id: u16, callback: EventCallback) {
        let mut callbacks = self
            .callbacks
            .write()
            .expect("callback registry lock poisoned");
        callbacks.insert(channel_id, callback);
    }

    pub(crate) fn get(&self, channel_id: u16) -> Option<EventCallback> {
        let callbacks = self
            .callbacks
            .read()
            .expect("callback registry lock poisoned");
        callbacks.get(&channel_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_is_not_an_event() {
        assert!(EventKind::from_response_kind(kinds::COMMAND_COMPLETE).is_none());
        assert!(EventKind::from_response_kind(0xdead).is_none());
    }

    #[test]
    fn event_kinds_map_one_to_one() {
        assert_eq!(
            EventKind::from_response_kind(kinds::FRAME_INFO),
            Some(EventKind::FrameInfo)
        );
        assert_eq!(
            EventKind::from_response_kind(kinds::HEARTBEAT),
            Some(EventKind::Heartbeat)
        );
    }

    #[test]
    fn registry_returns_registered_callback() {
        let registry = CallbackRegistry::default();
        assert!(registry.get(1).is_none());

        let hits = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        registry.register(
            1,
            Arc::new(move |_, _, _| {
                counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            }),
        );

        let cb = registry.get(1).expect("callback should be registered");
        cb(1, EventKind::FrameInfo, &[0; INLINE_WORDS]);
        assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
