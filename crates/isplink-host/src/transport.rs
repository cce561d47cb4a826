use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use bytes::BytesMut;
use isplink_frame::{
    CommandFrame, IndirectPackage, ResponseFrame, SequenceAllocator, FRAME_SIZE, INLINE_CAPACITY,
};
use isplink_mmio::MemoryProvider;
use tracing::{debug, info};

use crate::dispatch::{self, StreamSignal};
use crate::error::{RingError, SendError};
use crate::events::{CallbackRegistry, EventCallback};
use crate::pending::{PayloadHolder, PendingCommand, PendingCommandTable, WaitOutcome, Waiter};
use crate::pool::PayloadPool;
use crate::ring::RingChannel;

/// Grace period for the timeout/resolution race: if the dispatcher has
/// already removed our entry when the deadline fires, its signal arrives
/// within this window.
const RESOLVE_GRACE: Duration = Duration::from_millis(20);

/// Tunables for the send path and the dispatchers.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// How many times `send` retries a full command ring before giving up.
    pub retry_budget: u32,
    /// Sleep between ring-insert retries.
    pub retry_interval: Duration,
    /// Dispatcher wakeup interval when no interrupt arrives.
    pub poll_interval: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            retry_budget: 8,
            retry_interval: Duration::from_millis(1),
            poll_interval: Duration::from_millis(10),
        }
    }
}

/// The ring pair for one stream.
pub struct StreamRings {
    pub stream_id: u16,
    /// Host-to-firmware command ring.
    pub command: RingChannel,
    /// Firmware-to-host response ring.
    pub response: RingChannel,
}

/// State shared between the facade and the dispatcher threads.
pub(crate) struct Shared {
    pub(crate) config: TransportConfig,
    pub(crate) pending: PendingCommandTable,
    pub(crate) callbacks: CallbackRegistry,
    pub(crate) stop: AtomicBool,
    sequences: SequenceAllocator,
    pool: PayloadPool,
    provider: Arc<dyn MemoryProvider>,
    /// Command rings indexed in lockstep with `stream_ids`.
    command_rings: Vec<RingChannel>,
    stream_ids: Vec<u16>,
    signals: Vec<Arc<StreamSignal>>,
    /// One send lock across every stream's command ring. The firmware
    /// interface requires whole-frame insert ordering across streams;
    /// this is the transport's documented contention point.
    send_lock: Mutex<()>,
}

impl Shared {
    pub(crate) fn release_payload(&self, payload: Option<PayloadHolder>) {
        match payload {
            Some(PayloadHolder::Pool(slot)) => self.pool.release(slot),
            Some(PayloadHolder::External(buffer)) => self.provider.free(buffer),
            None => {}
        }
    }

    fn stream_index(&self, stream_id: u16) -> Result<usize, SendError> {
        self.stream_ids
            .iter()
            .position(|id| *id == stream_id)
            .ok_or(SendError::UnknownStream(stream_id))
    }
}

/// The public send API over the per-stream rings.
///
/// Owns one dispatcher thread per configured stream. Callers send
/// commands fire-and-forget ([`send_async`]) or blocking with a timeout
/// ([`send_sync`]); the dispatchers resolve responses back to them.
///
/// [`send_async`]: Transport::send_async
/// [`send_sync`]: Transport::send_sync
pub struct Transport {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Transport {
    /// Start the transport over pre-built ring pairs and spawn one
    /// dispatcher per stream.
    pub fn start(
        streams: Vec<StreamRings>,
        pool: PayloadPool,
        provider: Arc<dyn MemoryProvider>,
        config: TransportConfig,
    ) -> Self {
        let mut command_rings = Vec::with_capacity(streams.len());
        let mut stream_ids = Vec::with_capacity(streams.len());
        let mut signals = Vec::with_capacity(streams.len());
        let mut response_rings = Vec::with_capacity(streams.len());
        for rings in streams {
            debug_assert!(
                !stream_ids.contains(&rings.stream_id),
                "duplicate stream {}",
                rings.stream_id
            );
            stream_ids.push(rings.stream_id);
            command_rings.push(rings.command);
            response_rings.push(rings.response);
            signals.push(Arc::new(StreamSignal::new()));
        }

        let shared = Arc::new(Shared {
            config,
            pending: PendingCommandTable::new(),
            callbacks: CallbackRegistry::default(),
            stop: AtomicBool::new(false),
            sequences: SequenceAllocator::new(),
            pool,
            provider,
            command_rings,
            stream_ids: stream_ids.clone(),
            signals: signals.clone(),
            send_lock: Mutex::new(()),
        });

        let mut workers = Vec::with_capacity(response_rings.len());
        for ((stream_id, ring), signal) in stream_ids
            .into_iter()
            .zip(response_rings)
            .zip(signals)
        {
            let shared = Arc::clone(&shared);
            let worker = std::thread::Builder::new()
                .name(format!("isplink-rx-{stream_id}"))
                .spawn(move || dispatch::run(stream_id, ring, shared, signal))
                .expect("dispatcher thread spawn failed");
            workers.push(worker);
        }

        info!(streams = shared.stream_ids.len(), "transport started");
        Self {
            shared,
            workers: Mutex::new(workers),
        }
    }

    /// Send a command without waiting for its response.
    ///
    /// Returns the assigned sequence number. The eventual completion
    /// discards the pending entry and reclaims any out-of-line payload;
    /// nothing is reported back to the caller.
    pub fn send_async(
        &self,
        stream_id: u16,
        command_kind: u32,
        args: &[u8],
    ) -> Result<u32, SendError> {
        let (sequence, _handle) = self.send_inner(stream_id, command_kind, args, None)?;
        Ok(sequence)
    }

    /// Send a command and block until its completion or `timeout`.
    ///
    /// On success the inline result bytes are copied into `response_out`
    /// (bounded by its length) and the copied length is returned. On
    /// timeout the pending entry and its resources are reclaimed; the
    /// frame already in the ring is not retracted, and a late response
    /// is discarded as a correlation miss.
    pub fn send_sync(
        &self,
        stream_id: u16,
        command_kind: u32,
        args: &[u8],
        timeout: Duration,
        response_out: &mut [u8],
    ) -> Result<usize, SendError> {
        let waiter = Arc::new(Waiter::new());
        let (sequence, handle) =
            self.send_inner(stream_id, command_kind, args, Some(Arc::clone(&waiter)))?;

        match waiter.wait_timeout(timeout) {
            Some(WaitOutcome::Resolved(response)) => Ok(copy_result(&response, response_out)),
            Some(WaitOutcome::TornDown) => Err(SendError::TornDown(stream_id)),
            None => {
                if let Some(command) = self.shared.pending.remove_by_handle(handle) {
                    self.shared.release_payload(command.payload);
                    debug!(sequence, stream = stream_id, "synchronous command timed out");
                    return Err(SendError::Timeout(timeout));
                }
                // The dispatcher removed our entry right at the deadline;
                // its signal is imminent.
                match waiter.wait_timeout(RESOLVE_GRACE) {
                    Some(WaitOutcome::Resolved(response)) => {
                        Ok(copy_result(&response, response_out))
                    }
                    Some(WaitOutcome::TornDown) => Err(SendError::TornDown(stream_id)),
                    None => Err(SendError::Timeout(timeout)),
                }
            }
        }
    }

    fn send_inner(
        &self,
        stream_id: u16,
        command_kind: u32,
        args: &[u8],
        waiter: Option<Arc<Waiter>>,
    ) -> Result<(u32, crate::pending::PendingHandle), SendError> {
        let shared = &*self.shared;
        let index = shared.stream_index(stream_id)?;
        if shared.stop.load(Ordering::SeqCst) {
            return Err(SendError::TornDown(stream_id));
        }

        let sequence = shared.sequences.next();
        let (inline_args, payload) = if args.len() <= INLINE_CAPACITY {
            (CommandFrame::args_from_bytes(args)?, None)
        } else {
            let holder = self.acquire_payload(args)?;
            let package = IndirectPackage {
                addr: match &holder {
                    PayloadHolder::Pool(slot) => slot.device_addr(),
                    PayloadHolder::External(buffer) => buffer.device_addr,
                },
                size: args.len() as u32,
            };
            (package.encode_args(), Some(holder))
        };

        let frame = CommandFrame {
            sequence,
            command_kind,
            inline_args,
            stream_id,
        };
        let mut wire = BytesMut::with_capacity(FRAME_SIZE);
        frame.encode(&mut wire);

        let handle = shared.pending.insert(PendingCommand {
            sequence,
            command_kind,
            stream_id,
            waiter,
            payload,
        });

        let ring = &shared.command_rings[index];
        let insert_result = {
            let _send_guard = shared.send_lock.lock().expect("send lock poisoned");
            let mut attempt = 1;
            loop {
                match ring.try_insert(&wire) {
                    Ok(()) => break Ok(()),
                    Err(RingError::Busy) if attempt < shared.config.retry_budget => {
                        attempt += 1;
                        std::thread::sleep(shared.config.retry_interval);
                    }
                    Err(RingError::Busy) => break Err(SendError::Busy { attempts: attempt }),
                    Err(other) => break Err(SendError::Ring(other)),
                }
            }
        };

        if let Err(err) = insert_result {
            // Roll back: the command never entered the ring.
            if let Some(command) = shared.pending.remove_by_handle(handle) {
                shared.release_payload(command.payload);
            }
            debug!(sequence, stream = stream_id, %err, "command insert failed");
            return Err(err);
        }

        Ok((sequence, handle))
    }

    fn acquire_payload(&self, args: &[u8]) -> Result<PayloadHolder, SendError> {
        let shared = &*self.shared;
        if args.len() <= shared.pool.slot_size() {
            match shared.pool.acquire() {
                Ok(slot) => {
                    slot.write(args).map_err(SendError::Ring)?;
                    return Ok(PayloadHolder::Pool(slot));
                }
                Err(RingError::OutOfSlots) => {
                    debug!("payload pool exhausted, falling back to external allocation");
                }
                Err(other) => return Err(SendError::Ring(other)),
            }
        }
        let buffer = shared.provider.alloc(args.len())?;
        buffer.region.write_at(0, args)?;
        Ok(PayloadHolder::External(buffer))
    }

    /// Register the event callback for a channel's stream.
    pub fn register_callback(&self, channel_id: u16, callback: EventCallback) {
        self.shared.callbacks.register(channel_id, callback);
    }

    /// Interrupt-source entry point: wake the dispatcher for a stream.
    pub fn signal_stream(&self, stream_id: u16) {
        match self.shared.stream_index(stream_id) {
            Ok(index) => self.shared.signals[index].raise(),
            Err(_) => debug!(stream = stream_id, "signal for unknown stream ignored"),
        }
    }

    /// Drain every outstanding command for a stream, releasing each
    /// entry's resources and waking any synchronous waiters with
    /// [`SendError::TornDown`].
    pub fn teardown_stream(&self, stream_id: u16) {
        let drained = self.shared.pending.remove_by_stream(stream_id);
        let count = drained.len();
        for command in drained {
            self.shared.release_payload(command.payload);
            if let Some(waiter) = command.waiter {
                waiter.signal(WaitOutcome::TornDown);
            }
        }
        if count > 0 {
            info!(stream = stream_id, count, "drained pending commands on teardown");
        }
    }

    /// Stop and join all dispatcher threads. Idempotent; also runs on drop.
    pub fn shutdown(&self) {
        self.shared.stop.store(true, Ordering::SeqCst);
        for signal in &self.shared.signals {
            signal.raise();
        }
        let workers = std::mem::take(
            &mut *self.workers.lock().expect("worker list lock poisoned"),
        );
        for worker in workers {
            if worker.join().is_err() {
                tracing::error!("dispatcher thread panicked");
            }
        }
    }

    /// The pending-command table (diagnostics and tests).
    pub fn pending(&self) -> &PendingCommandTable {
        &self.shared.pending
    }

    /// The indirect payload pool (diagnostics and tests).
    pub fn payload_pool(&self) -> &PayloadPool {
        &self.shared.pool
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn copy_result(response: &ResponseFrame, out: &mut [u8]) -> usize {
    let bytes = response.result_bytes();
    let n = out.len().min(bytes.len());
    out[..n].copy_from_slice(&bytes[..n]);
    n
}
