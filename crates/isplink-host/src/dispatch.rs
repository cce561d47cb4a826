use std::sync::atomic::Ordering;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use isplink_frame::{kinds, response_kind_name, ResponseFrame, FRAME_SIZE};
use tracing::{debug, error, trace, warn};

use crate::error::RingError;
use crate::events::EventKind;
use crate::pending::WaitOutcome;
use crate::ring::RingChannel;
use crate::transport::Shared;

/// Per-stream wakeup signal, raised by the interrupt collaborator via
/// `Transport::signal_stream`. Auto-reset: one wake consumes one raise.
pub(crate) struct StreamSignal {
    raised: Mutex<bool>,
    cv: Condvar,
}

impl StreamSignal {
    pub(crate) fn new() -> Self {
        Self {
            raised: Mutex::new(false),
            cv: Condvar::new(),
        }
    }

    pub(crate) fn raise(&self) {
        let mut raised = self.raised.lock().expect("stream signal lock poisoned");
        *raised = true;
        self.cv.notify_one();
    }

    /// Wait until raised or `poll_interval` elapses; either way the
    /// dispatcher does a drain pass afterwards.
    pub(crate) fn wait(&self, poll_interval: Duration) {
        let mut raised = self.raised.lock().expect("stream signal lock poisoned");
        if !*raised {
            let (guard, _timed_out) = self
                .cv
                .wait_timeout(raised, poll_interval)
                .expect("stream signal lock poisoned");
            raised = guard;
        }
        *raised = false;
    }
}

/// Dispatcher loop: one long-lived worker per stream.
///
/// Waits on the stream's wakeup signal (with a bounded poll interval so
/// missed interrupts only delay, never lose, responses), then drains the
/// response ring and resolves or fans out every frame found.
pub(crate) fn run(
    stream_id: u16,
    ring: RingChannel,
    shared: Arc<Shared>,
    signal: Arc<StreamSignal>,
) {
    let mut frame_buf = [0u8; FRAME_SIZE];
    loop {
        signal.wait(shared.config.poll_interval);
        if shared.stop.load(Ordering::SeqCst) {
            return;
        }

        loop {
            match ring.try_read(&mut frame_buf) {
                Ok(false) => break,
                Ok(true) => handle_frame(stream_id, &shared, &frame_buf),
                Err(err @ RingError::Corrupt { .. }) => {
                    // Register corruption is fatal to this ring; the
                    // transport owner decides what happens to the device.
                    error!(stream = stream_id, %err, "response ring corrupt, dispatcher stopping");
                    return;
                }
                Err(err) => {
                    error!(stream = stream_id, %err, "response ring read failed, dispatcher stopping");
                    return;
                }
            }
        }
    }
}

fn handle_frame(stream_id: u16, shared: &Shared, frame_buf: &[u8]) {
    // Checksum and length are gated here; the ring layer moves raw bytes.
    let response = match ResponseFrame::decode(frame_buf) {
        Ok(frame) => frame,
        Err(err) => {
            warn!(stream = stream_id, %err, "dropping response frame");
            return;
        }
    };

    match response.response_kind {
        kinds::COMMAND_COMPLETE => resolve_completion(stream_id, shared, response),
        other => match EventKind::from_response_kind(other) {
            Some(kind) => {
                if kind == EventKind::Heartbeat {
                    trace!(stream = stream_id, "firmware heartbeat");
                }
                fan_out(stream_id, shared, kind, &response);
            }
            None => {
                debug!(
                    stream = stream_id,
                    kind = other,
                    "ignoring unknown response kind"
                );
            }
        },
    }
}

fn resolve_completion(stream_id: u16, shared: &Shared, response: ResponseFrame) {
    // Completions echo the finished command's kind in the first result
    // word; together with the sequence that is the pending-table key.
    let command_kind = response.inline_result[0];
    match shared.pending.remove_by_key(response.sequence, command_kind) {
        Some(command) => {
            shared.release_payload(command.payload);
            match command.waiter {
                Some(waiter) => waiter.signal(WaitOutcome::Resolved(response)),
                // Fire-and-forget: entry discarded, nobody to wake.
                None => trace!(
                    stream = stream_id,
                    sequence = response.sequence,
                    "async command completed"
                ),
            }
        }
        None => {
            debug!(
                stream = stream_id,
                sequence = response.sequence,
                kind = format_args!("{:#x}", command_kind),
                "no matching pending command"
            );
        }
    }
}

fn fan_out(stream_id: u16, shared: &Shared, kind: EventKind, response: &ResponseFrame) {
    match shared.callbacks.get(stream_id) {
        Some(callback) => callback(stream_id, kind, &response.inline_result),
        None => trace!(
            stream = stream_id,
            kind = response_kind_name(response.response_kind),
            "no callback registered, event dropped"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_is_auto_reset() {
        let signal = StreamSignal::new();
        signal.raise();
        // First wait consumes the raise without sleeping the full interval.
        let started = std::time::Instant::now();
        signal.wait(Duration::from_secs(5));
        assert!(started.elapsed() < Duration::from_secs(1));

        // Second wait has nothing pending and times out at the poll interval.
        let started = std::time::Instant::now();
        signal.wait(Duration::from_millis(20));
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn raise_wakes_a_parked_waiter() {
        let signal = Arc::new(StreamSignal::new());
        let waiter = Arc::clone(&signal);
        let thread = std::thread::spawn(move || {
            waiter.wait(Duration::from_secs(5));
        });
        std::thread::sleep(Duration::from_millis(10));
        signal.raise();
        thread.join().unwrap();
    }
}
