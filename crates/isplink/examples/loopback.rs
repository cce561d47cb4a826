//! Loopback demo — a fake firmware thread echoes commands back as
//! completions over in-memory rings.
//!
//! Run with:
//!   cargo run --example loopback

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use isplink::frame::{
    CommandFrame, ResponseFrame, COMMAND_COMPLETE, FRAME_SIZE, GLOBAL, INLINE_WORDS, STREAM1,
};
use isplink::host::{PayloadPool, RingChannel, StreamRings, Transport, TransportConfig};
use isplink::mmio::{
    command_ring_regs, response_ring_regs, HeapMemoryProvider, HeapRegion, MemRegisterBank,
    RegisterBank, ShmRegion,
};

const RING_BYTES: usize = 8 * FRAME_SIZE;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let bank: Arc<dyn RegisterBank> = Arc::new(MemRegisterBank::new());

    // Host-side ring pairs plus firmware-side attachments to the same
    // registers and memory.
    let mut streams = Vec::new();
    let mut firmware_rings = Vec::new();
    for (i, stream_id) in [GLOBAL, STREAM1].into_iter().enumerate() {
        let cmd_region: Arc<dyn ShmRegion> = Arc::new(HeapRegion::new(RING_BYTES));
        let rsp_region: Arc<dyn ShmRegion> = Arc::new(HeapRegion::new(RING_BYTES));
        let device_base = 0x1000_0000 + (i as u64) * 0x1_0000;

        let command = RingChannel::init(
            Arc::clone(&bank),
            command_ring_regs(stream_id),
            Arc::clone(&cmd_region),
            device_base,
        )?;
        let response = RingChannel::init(
            Arc::clone(&bank),
            response_ring_regs(stream_id),
            Arc::clone(&rsp_region),
            device_base + RING_BYTES as u64,
        )?;

        firmware_rings.push((
            stream_id,
            RingChannel::attach(Arc::clone(&bank), command_ring_regs(stream_id), cmd_region)?,
            RingChannel::attach(Arc::clone(&bank), response_ring_regs(stream_id), rsp_region)?,
        ));
        streams.push(StreamRings {
            stream_id,
            command,
            response,
        });
    }

    let pool_region = Arc::new(HeapRegion::new(8 * 256));
    let pool = PayloadPool::new(pool_region, 0x2000_0000, 8, 256)?;
    let provider = Arc::new(HeapMemoryProvider::new());

    let transport = Arc::new(Transport::start(
        streams,
        pool,
        provider,
        TransportConfig::default(),
    ));

    // Fake firmware: drain command rings, echo each command back as a
    // completion, and ring the host's doorbell.
    let stop = Arc::new(AtomicBool::new(false));
    let firmware = {
        let transport = Arc::clone(&transport);
        let stop = Arc::clone(&stop);
        std::thread::spawn(move || {
            let mut buf = [0u8; FRAME_SIZE];
            while !stop.load(Ordering::SeqCst) {
                for (stream_id, cmd_ring, rsp_ring) in &firmware_rings {
                    while cmd_ring.try_read(&mut buf).unwrap_or(false) {
                        let Ok(command) = CommandFrame::decode(&buf) else {
                            continue;
                        };
                        let mut inline_result = [0u32; INLINE_WORDS];
                        inline_result[0] = command.command_kind;
                        inline_result[1..].copy_from_slice(&command.inline_args[..INLINE_WORDS - 1]);
                        let response = ResponseFrame {
                            sequence: command.sequence,
                            response_kind: COMMAND_COMPLETE,
                            inline_result,
                        };
                        let _ = rsp_ring.try_insert(&response.to_bytes());
                        transport.signal_stream(*stream_id);
                    }
                }
                std::thread::sleep(Duration::from_millis(1));
            }
        })
    };

    let mut response = [0u8; 48];
    for kind in [0x10u32, 0x11, 0x12] {
        let n = transport.send_sync(
            STREAM1,
            kind,
            b"loopback-args",
            Duration::from_secs(1),
            &mut response,
        )?;
        eprintln!("command {kind:#x} completed, {n} result bytes");
    }

    let sequence = transport.send_async(GLOBAL, 0x20, b"fire-and-forget")?;
    eprintln!("async command accepted with sequence {sequence}");
    std::thread::sleep(Duration::from_millis(50));

    stop.store(true, Ordering::SeqCst);
    firmware.join().expect("firmware thread should finish");
    transport.shutdown();
    Ok(())
}
