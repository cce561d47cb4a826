use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use isplink_frame::ResponseFrame;
use isplink_mmio::ExternalBuffer;

use crate::pool::PayloadSlot;

/// Out-of-line payload owned by a pending command, reclaimed when the
/// command resolves.
#[derive(Debug)]
pub enum PayloadHolder {
    /// A slot from the transport's payload pool.
    Pool(PayloadSlot),
    /// A buffer from the external memory provider.
    External(ExternalBuffer),
}

/// How a synchronous wait ended.
#[derive(Debug)]
pub enum WaitOutcome {
    /// The firmware completed the command.
    Resolved(ResponseFrame),
    /// The stream was torn down while the command was outstanding.
    TornDown,
}

/// Single-shot wait cell for one synchronous command.
///
/// Auto-reset semantics: the stored outcome is consumed by the single
/// waiter. The first signal wins; later signals are ignored.
#[derive(Debug, Default)]
pub struct Waiter {
    state: Mutex<Option<WaitOutcome>>,
    cv: Condvar,
}

impl Waiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the outcome and wake the waiter. No-op if already signaled.
    pub fn signal(&self, outcome: WaitOutcome) {
        let mut state = self.state.lock().expect("waiter lock poisoned");
        if state.is_none() {
            *state = Some(outcome);
            self.cv.notify_one();
        }
    }

    /// Block until signaled or `timeout` elapses.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<WaitOutcome> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock().expect("waiter lock poisoned");
        while state.is_none() {
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let (guard, _timed_out) = self
                .cv
                .wait_timeout(state, deadline - now)
                .expect("waiter lock poisoned");
            state = guard;
        }
        state.take()
    }

    /// Take the outcome if one was already delivered, without blocking.
    pub fn take(&self) -> Option<WaitOutcome> {
        self.state.lock().expect("waiter lock poisoned").take()
    }
}

/// One in-flight command and the resources tied to it.
#[derive(Debug)]
pub struct PendingCommand {
    pub sequence: u32,
    pub command_kind: u32,
    pub stream_id: u16,
    /// Present for synchronous senders; fire-and-forget entries have none.
    pub waiter: Option<std::sync::Arc<Waiter>>,
    /// Out-of-line payload to reclaim on resolution.
    pub payload: Option<PayloadHolder>,
}

/// Opaque handle for timeout-driven forced removal of one's own entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingHandle(u64);

struct TableEntry {
    token: u64,
    command: PendingCommand,
}

struct TableInner {
    entries: Vec<TableEntry>,
    next_token: u64,
}

/// Single source of truth correlating in-flight commands to their
/// eventual resolution.
///
/// Entries stay in send order; removal is by key, by stream, or by
/// handle. All mutation is serialized by one table-wide lock, separate
/// from the send-side lock.
pub struct PendingCommandTable {
    inner: Mutex<TableInner>,
}

impl PendingCommandTable {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(TableInner {
                entries: Vec::new(),
                next_token: 1,
            }),
        }
    }

    /// Append an entry; returns the handle for forced removal.
    ///
    /// At most one entry may exist per (sequence, command_kind) pair;
    /// the sequence allocator guarantees this as long as entries are
    /// removed exactly once.
    pub fn insert(&self, command: PendingCommand) -> PendingHandle {
        let mut inner = self.inner.lock().expect("pending table lock poisoned");
        debug_assert!(
            !inner
                .entries
                .iter()
                .any(|e| e.command.sequence == command.sequence
                    && e.command.command_kind == command.command_kind),
            "duplicate pending key ({}, {:#x})",
            command.sequence,
            command.command_kind
        );
        let token = inner.next_token;
        inner.next_token += 1;
        inner.entries.push(TableEntry { token, command });
        PendingHandle(token)
    }

    /// Remove the entry matching a response, if any. `None` means a
    /// late, duplicate, or unexpected response.
    pub fn remove_by_key(&self, sequence: u32, command_kind: u32) -> Option<PendingCommand> {
        let mut inner = self.inner.lock().expect("pending table lock poisoned");
        let pos = inner
            .entries
            .iter()
            .position(|e| e.command.sequence == sequence && e.command.command_kind == command_kind)?;
        Some(inner.entries.remove(pos).command)
    }

    /// Drain every entry for a stream (teardown path).
    pub fn remove_by_stream(&self, stream_id: u16) -> Vec<PendingCommand> {
        let mut inner = self.inner.lock().expect("pending table lock poisoned");
        let mut drained = Vec::new();
        let mut i = 0;
        while i < inner.entries.len() {
            if inner.entries[i].command.stream_id == stream_id {
                drained.push(inner.entries.remove(i).command);
            } else {
                i += 1;
            }
        }
        drained
    }

    /// Forcibly remove one's own entry (synchronous timeout path).
    pub fn remove_by_handle(&self, handle: PendingHandle) -> Option<PendingCommand> {
        let mut inner = self.inner.lock().expect("pending table lock poisoned");
        let pos = inner.entries.iter().position(|e| e.token == handle.0)?;
        Some(inner.entries.remove(pos).command)
    }

    /// Number of outstanding entries.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .expect("pending table lock poisoned")
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PendingCommandTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn entry(sequence: u32, command_kind: u32, stream_id: u16) -> PendingCommand {
        PendingCommand {
            sequence,
            command_kind,
            stream_id,
            waiter: None,
            payload: None,
        }
    }

    #[test]
    fn remove_by_key_finds_the_right_entry() {
        let table = PendingCommandTable::new();
        table.insert(entry(1, 0x10, 0));
        table.insert(entry(2, 0x10, 0));
        table.insert(entry(3, 0x20, 1));

        let cmd = table.remove_by_key(2, 0x10).expect("entry should exist");
        assert_eq!(cmd.sequence, 2);
        assert_eq!(table.len(), 2);

        // Same key again is a miss, not a panic.
        assert!(table.remove_by_key(2, 0x10).is_none());
        // Matching sequence but wrong kind is a miss.
        assert!(table.remove_by_key(3, 0x10).is_none());
    }

    #[test]
    fn remove_by_stream_drains_only_that_stream() {
        let table = PendingCommandTable::new();
        table.insert(entry(1, 0x10, 1));
        table.insert(entry(2, 0x10, 2));
        table.insert(entry(3, 0x11, 1));

        let drained = table.remove_by_stream(1);
        assert_eq!(
            drained.iter().map(|c| c.sequence).collect::<Vec<_>>(),
            vec![1, 3]
        );
        assert_eq!(table.len(), 1);
        assert!(table.remove_by_key(2, 0x10).is_some());
    }

    #[test]
    fn remove_by_handle_targets_own_entry() {
        let table = PendingCommandTable::new();
        let h1 = table.insert(entry(1, 0x10, 0));
        let h2 = table.insert(entry(2, 0x10, 0));

        assert_eq!(table.remove_by_handle(h1).unwrap().sequence, 1);
        assert!(table.remove_by_handle(h1).is_none());
        assert_eq!(table.remove_by_handle(h2).unwrap().sequence, 2);
        assert!(table.is_empty());
    }

    #[test]
    fn at_most_one_entry_per_key() {
        let table = PendingCommandTable::new();
        for seq in 1..=100u32 {
            table.insert(entry(seq, 0x10, 0));
        }
        for seq in (1..=100u32).step_by(2) {
            assert!(table.remove_by_key(seq, 0x10).is_some());
        }
        // Every key resolves at most once.
        for seq in 1..=100u32 {
            let first = table.remove_by_key(seq, 0x10);
            let second = table.remove_by_key(seq, 0x10);
            assert!(second.is_none());
            if seq % 2 == 1 {
                assert!(first.is_none());
            }
        }
        assert!(table.is_empty());
    }

    #[test]
    fn waiter_delivers_signal() {
        let waiter = Arc::new(Waiter::new());
        let signaler = Arc::clone(&waiter);
        let thread = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            signaler.signal(WaitOutcome::Resolved(ResponseFrame {
                sequence: 5,
                response_kind: isplink_frame::COMMAND_COMPLETE,
                inline_result: [0; isplink_frame::INLINE_WORDS],
            }));
        });

        match waiter.wait_timeout(Duration::from_secs(2)) {
            Some(WaitOutcome::Resolved(frame)) => assert_eq!(frame.sequence, 5),
            other => panic!("unexpected outcome: {other:?}"),
        }
        thread.join().unwrap();
    }

    #[test]
    fn waiter_times_out_without_signal() {
        let waiter = Waiter::new();
        let started = Instant::now();
        assert!(waiter.wait_timeout(Duration::from_millis(30)).is_none());
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn waiter_first_signal_wins() {
        let waiter = Waiter::new();
        waiter.signal(WaitOutcome::TornDown);
        waiter.signal(WaitOutcome::Resolved(ResponseFrame {
            sequence: 1,
            response_kind: isplink_frame::COMMAND_COMPLETE,
            inline_result: [0; isplink_frame::INLINE_WORDS],
        }));
        assert!(matches!(waiter.take(), Some(WaitOutcome::TornDown)));
        assert!(waiter.take().is_none());
    }
}
