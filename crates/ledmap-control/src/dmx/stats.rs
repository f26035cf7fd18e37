//! Network statistics
//!
//! Counters are bumped from the sending thread and read from whoever
//! reports them, so they are plain atomics. Only the window start needs
//! a lock, and only readers and `reset` take it.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use super::delta::FrameKind;

/// Bytes accounted per packet: UDP/IP overhead plus header and a full payload
pub const PACKET_SIZE_ESTIMATE: u64 = 572;

/// Reference link speed for the load percentage
pub const REFERENCE_LINK_MBPS: f64 = 1000.0;

/// Transmission counters
#[derive(Debug)]
pub struct NetworkStats {
    packets_sent: AtomicU64,
    bytes_sent: AtomicU64,
    full_frames: AtomicU64,
    delta_frames: AtomicU64,
    rejected_frames: AtomicU64,
    send_errors: AtomicU64,
    window_start: Mutex<Instant>,
}

/// Point-in-time view of [`NetworkStats`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NetworkStatsSnapshot {
    pub packets_sent: u64,
    pub packets_per_sec: f64,
    pub bytes_sent: u64,
    pub bytes_per_sec: f64,
    pub mbps: f64,
    pub network_load_percent: f64,
    pub full_frames: u64,
    pub delta_frames: u64,
    pub rejected_frames: u64,
    pub send_errors: u64,
}

impl Default for NetworkStats {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkStats {
    pub fn new() -> Self {
        Self {
            packets_sent: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            full_frames: AtomicU64::new(0),
            delta_frames: AtomicU64::new(0),
            rejected_frames: AtomicU64::new(0),
            send_errors: AtomicU64::new(0),
            window_start: Mutex::new(Instant::now()),
        }
    }

    pub fn record_packet(&self) {
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent
            .fetch_add(PACKET_SIZE_ESTIMATE, Ordering::Relaxed);
    }

    pub fn record_frame(&self, kind: FrameKind) {
        let counter = match kind {
            FrameKind::Full => &self.full_frames,
            FrameKind::Delta => &self.delta_frames,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_send_error(&self) {
        self.send_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Zero every counter and restart the rate window
    pub fn reset(&self) {
        let mut window_start = self.window_start.lock();
        for counter in [
            &self.packets_sent,
            &self.bytes_sent,
            &self.full_frames,
            &self.delta_frames,
            &self.rejected_frames,
            &self.send_errors,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        *window_start = Instant::now();
    }

    /// Rates are averaged over the time since creation or the last reset
    pub fn snapshot(&self) -> NetworkStatsSnapshot {
        let elapsed = self.window_start.lock().elapsed().as_secs_f64();
        let packets_sent = self.packets_sent.load(Ordering::Relaxed);
        let bytes_sent = self.bytes_sent.load(Ordering::Relaxed);

        let (packets_per_sec, bytes_per_sec) = if elapsed > 0.0 {
            (packets_sent as f64 / elapsed, bytes_sent as f64 / elapsed)
        } else {
            (0.0, 0.0)
        };
        let mbps = bytes_per_sec * 8.0 / 1_000_000.0;

        NetworkStatsSnapshot {
            packets_sent,
            packets_per_sec,
            bytes_sent,
            bytes_per_sec,
            mbps,
            network_load_percent: mbps / REFERENCE_LINK_MBPS * 100.0,
            full_frames: self.full_frames.load(Ordering::Relaxed),
            delta_frames: self.delta_frames.load(Ordering::Relaxed),
            rejected_frames: self.rejected_frames.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
        }
    }
}
