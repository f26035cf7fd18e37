//! Art-Net transmitter
//!
//! Owns the per-universe output state and decides which source may reach
//! the wire. Three sources compete:
//!
//! - **Test**: static patterns and blackout, re-sent by a hold thread at
//!   about 40 Hz until released with [`ArtNetTransmitter::resume_video_mode`]
//! - **Replay**: recorded DMX played back by a session
//! - **Video**: live frames from the active playback session
//!
//! Test beats Replay beats Video. All sends go through one mutex, so frame
//! N is fully on the wire (or fully rejected) before frame N+1 starts.

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ledmap_core::config::FPS_RANGE;
use ledmap_core::{BitDepth, ChannelOrderMap, DeltaEncodingConfig, LedConfig, PointLayout};

use super::artnet::{build_artdmx_packet, Universe, MAX_DMX_LEN};
use super::delta::{DeltaEncoder, EncodedFrame};
use super::patterns::TestPattern;
use super::stats::{NetworkStats, NetworkStatsSnapshot};
use super::transport::{DmxTransport, UdpTransport};
use crate::error::{ControlError, Result};
use crate::worker::Worker;

/// Re-send interval of the hold thread
pub const HOLD_INTERVAL: Duration = Duration::from_millis(25);

const HOLD_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Highest Art-Net port address
const MAX_UNIVERSE: u32 = 0x7FFF;

/// Origin of a frame handed to [`ArtNetTransmitter::send_frame`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameSource {
    Video,
    Replay,
}

/// Source currently holding the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Priority {
    Test,
    Replay,
    /// Nothing holds the wire; live frames pass
    #[default]
    Video,
}

/// Identifies a playback session; 0 is never issued
pub type SessionId = u64;

/// Everything the transmitter needs to know about the output
#[derive(Debug, Clone)]
pub struct TransmitterConfig {
    pub target: SocketAddr,
    pub start_universe: u16,
    pub channels_per_universe: usize,
    /// Length of a full DMX frame
    pub frame_len: usize,
    /// Bytes per point
    pub point_stride: usize,
    /// Bytes per channel value
    pub value_width: usize,
    pub bit_depth: BitDepth,
    /// Frame offset of every point, used by reordering and test patterns
    pub point_offsets: Vec<usize>,
    pub channel_orders: ChannelOrderMap,
    pub delta: DeltaEncodingConfig,
    pub fps: u32,
}

impl TransmitterConfig {
    /// Output for a mapped point layout
    pub fn from_layout(config: &LedConfig, layout: &PointLayout) -> Result<Self> {
        Ok(Self {
            target: config.target_addr()?,
            start_universe: config.start_universe,
            channels_per_universe: layout.options.channels_per_universe,
            frame_len: layout.total_channels,
            point_stride: layout.options.channels_per_point,
            value_width: config.bit_depth.bytes_per_value(),
            bit_depth: config.bit_depth,
            point_offsets: layout.mappings.iter().map(|m| m.frame_offset).collect(),
            channel_orders: config.universe_configs.clone(),
            delta: config.delta_encoding,
            fps: config.fps,
        })
    }

    /// Output for `points` points packed back to back
    pub fn packed(config: &LedConfig, points: usize) -> Result<Self> {
        let stride = config.channels_per_point();
        Ok(Self {
            target: config.target_addr()?,
            start_universe: config.start_universe,
            channels_per_universe: config.channels_per_universe(),
            frame_len: points * stride,
            point_stride: stride,
            value_width: config.bit_depth.bytes_per_value(),
            bit_depth: config.bit_depth,
            point_offsets: (0..points).map(|i| i * stride).collect(),
            channel_orders: config.universe_configs.clone(),
            delta: config.delta_encoding,
            fps: config.fps,
        })
    }

    pub fn universe_count(&self) -> usize {
        self.frame_len.div_ceil(self.channels_per_universe.max(1))
    }

    fn validate(&self) -> Result<()> {
        if !(1..=MAX_DMX_LEN).contains(&self.channels_per_universe) {
            return Err(ControlError::InvalidParameter(format!(
                "channels_per_universe {} outside 1..=512",
                self.channels_per_universe
            )));
        }
        if self.point_stride < 3 * self.value_width {
            return Err(ControlError::InvalidParameter(format!(
                "{} bytes per point cannot hold a color triple",
                self.point_stride
            )));
        }
        let last = u32::from(self.start_universe) + self.universe_count() as u32;
        if last > MAX_UNIVERSE + 1 {
            return Err(ControlError::InvalidParameter(format!(
                "{} universes from {} exceed the Art-Net port address range",
                self.universe_count(),
                self.start_universe
            )));
        }
        Ok(())
    }
}

struct TransmissionState {
    active_priority: Priority,
    active_session: Option<SessionId>,
    encoder: DeltaEncoder,
    last_frame: Vec<u8>,
    hold_frame: Vec<u8>,
    universes: Vec<Universe>,
    wire: Vec<u8>,
    packet: Vec<u8>,
}

impl TransmissionState {
    fn accepts(&self, source: FrameSource) -> bool {
        match self.active_priority {
            Priority::Test => false,
            Priority::Replay => source == FrameSource::Replay,
            Priority::Video => true,
        }
    }

    fn set_priority(&mut self, priority: Priority) {
        if self.active_priority != priority {
            tracing::debug!("Art-Net priority {:?} -> {:?}", self.active_priority, priority);
            self.active_priority = priority;
        }
    }
}

struct Shared {
    transport: Arc<dyn DmxTransport>,
    config: TransmitterConfig,
    reorder: bool,
    state: Mutex<TransmissionState>,
    stats: NetworkStats,
    fps: AtomicU32,
    closed: AtomicBool,
}

impl Shared {
    /// Arbitrated path: delta bookkeeping, then the wire
    fn transmit(&self, state: &mut TransmissionState, data: &[u8]) {
        state.last_frame.clear();
        state.last_frame.extend_from_slice(data);

        let encoded = state.encoder.encode(data);
        self.stats.record_frame(encoded.kind());
        if let EncodedFrame::Delta(delta) = &encoded {
            tracing::trace!(
                "Delta frame {}: {} bytes / {} pixels changed",
                state.encoder.frame_counter(),
                delta.changes.len(),
                delta.changed_pixels
            );
        }

        let TransmissionState {
            universes,
            wire,
            packet,
            ..
        } = state;
        self.send_universes(universes, wire, packet, data);
    }

    /// Re-send the held pattern. Returns `false` once the hold is released.
    fn send_hold(&self) -> bool {
        let mut state = self.state.lock();
        if state.active_priority != Priority::Test || self.closed.load(Ordering::Acquire) {
            return false;
        }
        let TransmissionState {
            universes,
            wire,
            packet,
            hold_frame,
            ..
        } = &mut *state;
        self.send_universes(universes, wire, packet, hold_frame);
        true
    }

    /// One ArtDMX packet per universe, in channel order of each universe.
    ///
    /// A failed send drops that packet only; it is logged and counted.
    fn send_universes(
        &self,
        universes: &mut [Universe],
        wire: &mut Vec<u8>,
        packet: &mut Vec<u8>,
        data: &[u8],
    ) {
        wire.clear();
        wire.extend_from_slice(data);
        if self.reorder {
            self.reorder_points(universes, wire);
        }

        for (universe, chunk) in universes
            .iter_mut()
            .zip(wire.chunks(self.config.channels_per_universe))
        {
            let sequence = universe.next_sequence();
            build_artdmx_packet(packet, universe.number, sequence, chunk);
            match self.transport.send(packet, universe.target) {
                Ok(_) => {
                    self.stats.record_packet();
                    tracing::trace!(
                        "Sent Art-Net DMX packet for universe {} (seq {})",
                        universe.number,
                        sequence
                    );
                }
                Err(e) => {
                    self.stats.record_send_error();
                    tracing::warn!(
                        "Art-Net send for universe {} to {} failed: {}",
                        universe.number,
                        universe.target,
                        e
                    );
                }
            }
        }
    }

    fn reorder_points(&self, universes: &[Universe], wire: &mut [u8]) {
        let cpu = self.config.channels_per_universe;
        let stride = self.config.point_stride;
        let width = self.config.value_width;
        for &offset in &self.config.point_offsets {
            let Some(universe) = universes.get(offset / cpu) else {
                continue;
            };
            if let Some(point) = wire.get_mut(offset..offset + stride) {
                universe.channel_order.apply_pixels(point, stride, width);
            }
        }
    }
}

struct HoldThread {
    stop: Sender<()>,
    worker: Worker,
}

/// Sends DMX frames to Art-Net universes
pub struct ArtNetTransmitter {
    shared: Arc<Shared>,
    hold: Mutex<Option<HoldThread>>,
}

impl ArtNetTransmitter {
    pub fn new(config: TransmitterConfig, transport: Arc<dyn DmxTransport>) -> Result<Self> {
        config.validate()?;

        let fps = config.fps.clamp(*FPS_RANGE.start(), *FPS_RANGE.end());
        let universes: Vec<Universe> = (0..config.universe_count())
            .map(|index| {
                let number = config.start_universe + index as u16;
                Universe::new(
                    number,
                    config.target,
                    config.channel_orders.order_for(number),
                    fps,
                )
            })
            .collect();
        let reorder = universes
            .iter()
            .any(|u| u.channel_order != ledmap_core::ChannelOrder::Rgb);

        tracing::info!(
            "Art-Net transmitter: {} universes from {} -> {} at {} fps",
            universes.len(),
            config.start_universe,
            config.target,
            fps
        );

        let state = TransmissionState {
            active_priority: Priority::Video,
            active_session: None,
            encoder: DeltaEncoder::new(&config.delta, config.bit_depth, config.point_stride)
                .with_point_offsets(config.point_offsets.clone()),
            last_frame: Vec::with_capacity(config.frame_len),
            hold_frame: vec![0; config.frame_len],
            universes,
            wire: Vec::with_capacity(config.frame_len),
            packet: Vec::with_capacity(super::artnet::HEADER_LEN + MAX_DMX_LEN),
        };

        Ok(Self {
            shared: Arc::new(Shared {
                transport,
                config,
                reorder,
                state: Mutex::new(state),
                stats: NetworkStats::new(),
                fps: AtomicU32::new(fps),
                closed: AtomicBool::new(false),
            }),
            hold: Mutex::new(None),
        })
    }

    /// Transmitter on a broadcast-capable UDP socket
    pub fn with_udp(config: TransmitterConfig) -> Result<Self> {
        let transport = UdpTransport::bind()?;
        Self::new(config, Arc::new(transport))
    }

    pub fn config(&self) -> &TransmitterConfig {
        &self.shared.config
    }

    /// Send a frame if its source currently may use the wire.
    ///
    /// Returns `false` when arbitration rejects it; that is normal while a
    /// test pattern or replay holds the output.
    pub fn send_frame(&self, data: &[u8], source: FrameSource) -> bool {
        let mut state = self.shared.state.lock();
        if self.shared.closed.load(Ordering::Acquire) || !state.accepts(source) {
            self.shared.stats.record_rejected();
            tracing::trace!(
                "Rejected {:?} frame while {:?} holds the wire",
                source,
                state.active_priority
            );
            return false;
        }
        self.shared.transmit(&mut state, data);
        true
    }

    /// Like [`send_frame`](Self::send_frame), but only for the active session.
    ///
    /// The session check and the send happen under the same lock, so once
    /// [`deactivate_session`](Self::deactivate_session) returns no frame of
    /// that session can reach the wire.
    pub fn send_session_frame(&self, session: SessionId, data: &[u8], source: FrameSource) -> bool {
        let mut state = self.shared.state.lock();
        if state.active_session != Some(session) {
            self.shared.stats.record_rejected();
            tracing::trace!("Rejected frame from inactive session {}", session);
            return false;
        }
        if self.shared.closed.load(Ordering::Acquire) || !state.accepts(source) {
            self.shared.stats.record_rejected();
            return false;
        }
        self.shared.transmit(&mut state, data);
        true
    }

    /// Make `session` the only session allowed to send
    pub fn activate_session(&self, session: SessionId) {
        let mut state = self.shared.state.lock();
        tracing::debug!(
            "Session channel {:?} -> {}",
            state.active_session,
            session
        );
        state.active_session = Some(session);
    }

    /// Close the session channel if `session` holds it
    pub fn deactivate_session(&self, session: SessionId) -> bool {
        let mut state = self.shared.state.lock();
        if state.active_session == Some(session) {
            state.active_session = None;
            tracing::debug!("Session channel {} closed", session);
            true
        } else {
            false
        }
    }

    pub fn active_session(&self) -> Option<SessionId> {
        self.shared.state.lock().active_session
    }

    /// Hold a test pattern on every universe until released
    pub fn test_pattern(&self, pattern: TestPattern) -> Result<()> {
        let mut hold = self.hold.lock();
        {
            let mut state = self.shared.state.lock();
            let config = &self.shared.config;
            pattern.fill(&mut state.hold_frame, &config.point_offsets, config.value_width);
            state.set_priority(Priority::Test);
        }
        tracing::info!("Holding test pattern '{}'", pattern);
        self.start_hold(&mut hold)
    }

    /// Hold all channels at zero until released
    pub fn blackout(&self) -> Result<()> {
        let mut hold = self.hold.lock();
        {
            let mut state = self.shared.state.lock();
            state.hold_frame.fill(0);
            state.set_priority(Priority::Test);
        }
        tracing::info!("Holding blackout");
        self.start_hold(&mut hold)
    }

    /// Release any test or replay hold
    pub fn resume_video_mode(&self) {
        let mut hold = self.hold.lock();
        let previous = {
            let mut state = self.shared.state.lock();
            let previous = state.active_priority;
            state.set_priority(Priority::Video);
            previous
        };
        stop_hold(hold.take());
        drop(hold);
        if previous != Priority::Video {
            tracing::info!("Resumed video mode (was {:?})", previous);
        }
    }

    /// Let replay frames through and keep video frames out.
    ///
    /// Returns `false` if a test pattern holds the wire.
    pub fn enter_replay_mode(&self) -> bool {
        let mut state = self.shared.state.lock();
        if state.active_priority == Priority::Test {
            return false;
        }
        state.set_priority(Priority::Replay);
        true
    }

    pub fn active_priority(&self) -> Priority {
        self.shared.state.lock().active_priority
    }

    /// Set the refresh rate of every universe; returns the clamped value
    pub fn set_fps(&self, fps: u32) -> u32 {
        let fps = fps.clamp(*FPS_RANGE.start(), *FPS_RANGE.end());
        self.shared.fps.store(fps, Ordering::Relaxed);
        let mut state = self.shared.state.lock();
        for universe in &mut state.universes {
            universe.set_refresh_rate(fps);
        }
        tracing::info!("Art-Net refresh rate set to {} fps", fps);
        fps
    }

    pub fn get_fps(&self) -> u32 {
        self.shared.fps.load(Ordering::Relaxed)
    }

    pub fn get_network_stats(&self) -> NetworkStatsSnapshot {
        self.shared.stats.snapshot()
    }

    pub fn reset_network_stats(&self) {
        self.shared.stats.reset();
    }

    /// Last frame accepted for transmission
    pub fn last_frame(&self) -> Vec<u8> {
        self.shared.state.lock().last_frame.clone()
    }

    /// Delta baseline, `None` before the first accepted frame
    pub fn last_sent_frame(&self) -> Option<Vec<u8>> {
        self.shared
            .state
            .lock()
            .encoder
            .last_sent_frame()
            .map(<[u8]>::to_vec)
    }

    pub fn frame_counter(&self) -> u64 {
        self.shared.state.lock().encoder.frame_counter()
    }

    pub fn universes(&self) -> Vec<Universe> {
        self.shared.state.lock().universes.clone()
    }

    /// Stop the hold thread and leave every universe dark.
    ///
    /// Idempotent; also runs on drop.
    pub fn shutdown(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut hold = self.hold.lock();
        stop_hold(hold.take());

        let mut state = self.shared.state.lock();
        state.active_session = None;
        state.set_priority(Priority::Video);
        let blank = vec![0u8; self.shared.config.frame_len];
        let TransmissionState {
            universes,
            wire,
            packet,
            ..
        } = &mut *state;
        self.shared.send_universes(universes, wire, packet, &blank);
        tracing::info!("Art-Net transmitter shut down");
    }

    /// Make sure a hold thread is running. The caller holds the `hold` lock
    /// across the priority change; lock order is `hold` then `state`.
    fn start_hold(&self, hold: &mut Option<HoldThread>) -> Result<()> {
        if let Some(thread) = hold.as_ref() {
            if !thread.worker.is_finished() {
                return Ok(());
            }
        }
        if let Some(stale) = hold.take() {
            stale.worker.join_timeout(HOLD_JOIN_TIMEOUT);
        }

        let (stop, stop_rx) = bounded::<()>(1);
        let shared = self.shared.clone();
        let worker = Worker::spawn("artnet-hold", move || {
            tracing::debug!("Hold thread started");
            while shared.send_hold() {
                match stop_rx.recv_timeout(HOLD_INTERVAL) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            tracing::debug!("Hold thread stopped");
        })?;
        *hold = Some(HoldThread { stop, worker });
        Ok(())
    }
}

fn stop_hold(thread: Option<HoldThread>) {
    if let Some(thread) = thread {
        let _ = thread.stop.try_send(());
        thread.worker.join_timeout(HOLD_JOIN_TIMEOUT);
    }
}

impl Drop for ArtNetTransmitter {
    fn drop(&mut self) {
        self.shutdown();
    }
}
