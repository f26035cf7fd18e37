use ledmap_control::dmx::{parse_artdmx, PACKET_SIZE_ESTIMATE};
use ledmap_control::{
    ArtNetTransmitter, DmxTransport, FrameSource, Priority, TestPattern, TransmitterConfig,
};
use ledmap_core::{ChannelOrder, LedConfig};
use parking_lot::Mutex;
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Keeps every packet instead of sending it
#[derive(Default)]
struct RecordingTransport {
    packets: Mutex<Vec<(SocketAddr, Vec<u8>)>>,
}

impl RecordingTransport {
    fn count(&self) -> usize {
        self.packets.lock().len()
    }

    fn take(&self) -> Vec<(SocketAddr, Vec<u8>)> {
        std::mem::take(&mut *self.packets.lock())
    }

    fn wait_for(&self, count: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while self.count() < count && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
    }
}

impl DmxTransport for RecordingTransport {
    fn send(&self, packet: &[u8], target: SocketAddr) -> io::Result<usize> {
        self.packets.lock().push((target, packet.to_vec()));
        Ok(packet.len())
    }
}

fn transmitter(config: &LedConfig, points: usize) -> (ArtNetTransmitter, Arc<RecordingTransport>) {
    let recorder = Arc::new(RecordingTransport::default());
    let transport: Arc<dyn DmxTransport> = recorder.clone();
    let tx = ArtNetTransmitter::new(TransmitterConfig::packed(config, points).unwrap(), transport)
        .unwrap();
    (tx, recorder)
}

#[test]
fn test_statistics_after_hundred_frames() {
    let (tx, recorder) = transmitter(&LedConfig::default(), 200);
    let mut frame = vec![0u8; 600];
    for i in 0..100u8 {
        frame[0] = i;
        assert!(tx.send_frame(&frame, FrameSource::Video));
    }

    let stats = tx.get_network_stats();
    assert_eq!(stats.packets_sent, 200);
    assert_eq!(stats.bytes_sent, 200 * PACKET_SIZE_ESTIMATE);
    assert_eq!(stats.bytes_sent, 200 * 572);
    assert_eq!(stats.full_frames + stats.delta_frames, 100);
    assert_eq!(stats.send_errors, 0);
    assert_eq!(recorder.count(), 200);
}

#[test]
fn test_packets_split_by_universe() {
    let mut config = LedConfig::default();
    config.start_universe = 10;
    let (tx, recorder) = transmitter(&config, 200);

    let frame: Vec<u8> = (0..600).map(|i| (i % 251) as u8).collect();
    tx.send_frame(&frame, FrameSource::Video);

    let packets = recorder.take();
    assert_eq!(packets.len(), 2);
    let first = parse_artdmx(&packets[0].1).unwrap();
    let second = parse_artdmx(&packets[1].1).unwrap();
    assert_eq!(first.universe, 10);
    assert_eq!(first.sequence, 1);
    assert_eq!(first.data, &frame[..510]);
    assert_eq!(second.universe, 11);
    assert_eq!(second.data, &frame[510..]);
    assert_eq!(packets[0].0, "255.255.255.255:6454".parse().unwrap());
}

#[test]
fn test_channel_order_applied_per_universe() {
    let mut config = LedConfig::default();
    config.universe_configs.set(0, ChannelOrder::Grb);
    config.universe_configs.set(1, ChannelOrder::Bgr);
    let (tx, recorder) = transmitter(&config, 171);

    let mut frame = vec![0u8; 513];
    frame[..3].copy_from_slice(&[10, 20, 30]);
    frame[510..].copy_from_slice(&[1, 2, 3]);
    tx.send_frame(&frame, FrameSource::Video);

    let packets = recorder.take();
    let first = parse_artdmx(&packets[0].1).unwrap();
    let second = parse_artdmx(&packets[1].1).unwrap();
    assert_eq!(&first.data[..3], &[20, 10, 30]);
    // Three bytes padded to four on the wire
    assert_eq!(second.data, &[3, 2, 1, 0]);

    // Reordering happens on the wire copy only
    assert_eq!(&tx.last_frame()[..3], &[10, 20, 30]);
}

#[test]
fn test_video_rejected_during_replay() {
    let (tx, _recorder) = transmitter(&LedConfig::default(), 10);
    assert!(tx.enter_replay_mode());

    let replay = vec![7u8; 30];
    assert!(tx.send_frame(&replay, FrameSource::Replay));
    let counter = tx.frame_counter();

    assert!(!tx.send_frame(&[200u8; 30], FrameSource::Video));
    assert_eq!(tx.last_sent_frame().unwrap(), replay);
    assert_eq!(tx.last_frame(), replay);
    assert_eq!(tx.frame_counter(), counter);
    assert_eq!(tx.get_network_stats().rejected_frames, 1);
}

#[test]
fn test_test_pattern_owns_the_wire() {
    let (tx, recorder) = transmitter(&LedConfig::default(), 200);
    let first = vec![1u8; 600];
    assert!(tx.send_frame(&first, FrameSource::Video));

    tx.test_pattern(TestPattern::Green).unwrap();
    assert_eq!(tx.active_priority(), Priority::Test);
    for _ in 0..50 {
        assert!(!tx.send_frame(&[99u8; 600], FrameSource::Video));
        assert!(!tx.send_frame(&[98u8; 600], FrameSource::Replay));
    }
    assert_eq!(tx.last_sent_frame().unwrap(), first);

    // The hold thread keeps re-sending the pattern
    recorder.wait_for(2 + 4);
    let packets = recorder.take();
    for (_, packet) in &packets[2..] {
        let dmx = parse_artdmx(packet).unwrap();
        assert_eq!(&dmx.data[..3], &[0, 255, 0]);
    }

    tx.resume_video_mode();
    assert_eq!(tx.active_priority(), Priority::Video);
    recorder.take();
    thread::sleep(Duration::from_millis(60));
    assert_eq!(recorder.count(), 0, "hold thread kept sending after release");
    assert!(tx.send_frame(&[5u8; 600], FrameSource::Video));
}

#[test]
fn test_blackout_holds_zero_frame() {
    let (tx, recorder) = transmitter(&LedConfig::default(), 200);
    tx.send_frame(&[255u8; 600], FrameSource::Video);
    let counter = tx.frame_counter();
    recorder.take();

    tx.blackout().unwrap();
    recorder.wait_for(4);
    for (_, packet) in recorder.take() {
        assert!(parse_artdmx(&packet).unwrap().data.iter().all(|&b| b == 0));
    }
    // Blackout leaves the delta state alone
    assert_eq!(tx.frame_counter(), counter);
    tx.resume_video_mode();
    assert_eq!(tx.frame_counter(), counter);
}

#[test]
fn test_session_channel() {
    let (tx, _recorder) = transmitter(&LedConfig::default(), 10);
    let frame = [3u8; 30];

    assert!(!tx.send_session_frame(1, &frame, FrameSource::Video));
    tx.activate_session(1);
    assert!(tx.send_session_frame(1, &frame, FrameSource::Video));
    assert!(!tx.send_session_frame(2, &frame, FrameSource::Video));

    assert!(!tx.deactivate_session(2));
    assert_eq!(tx.active_session(), Some(1));
    assert!(tx.deactivate_session(1));
    assert!(!tx.send_session_frame(1, &frame, FrameSource::Video));
    assert_eq!(tx.active_session(), None);
}

#[test]
fn test_shutdown_sends_blackout() {
    let (tx, recorder) = transmitter(&LedConfig::default(), 200);
    tx.send_frame(&[255u8; 600], FrameSource::Video);
    recorder.take();

    tx.shutdown();
    let packets = recorder.take();
    assert_eq!(packets.len(), 2);
    for (_, packet) in packets {
        assert!(parse_artdmx(&packet).unwrap().data.iter().all(|&b| b == 0));
    }
}

#[test]
fn test_udp_loopback() {
    let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
    receiver
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();
    let addr = receiver.local_addr().unwrap();

    let mut config = LedConfig::default();
    config.target_ip = addr.ip().to_string();
    config.port = addr.port();
    let tx = ArtNetTransmitter::with_udp(TransmitterConfig::packed(&config, 4).unwrap()).unwrap();
    assert!(tx.send_frame(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12], FrameSource::Video));

    let mut buf = [0u8; 600];
    let (len, _) = receiver.recv_from(&mut buf).unwrap();
    let dmx = parse_artdmx(&buf[..len]).unwrap();
    assert_eq!(dmx.universe, 0);
    assert_eq!(dmx.data, &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
}

#[test]
fn test_racing_hold_and_release_never_strands_priority() {
    let (tx, recorder) = transmitter(&LedConfig::default(), 200);
    let tx = Arc::new(tx);

    for _ in 0..5 {
        let holder = {
            let tx = tx.clone();
            thread::spawn(move || {
                for _ in 0..100 {
                    tx.test_pattern(TestPattern::Blue).unwrap();
                }
            })
        };
        let releaser = {
            let tx = tx.clone();
            thread::spawn(move || {
                for _ in 0..100 {
                    tx.resume_video_mode();
                }
            })
        };
        holder.join().unwrap();
        releaser.join().unwrap();

        // Whatever won the race, priority and hold thread agree
        recorder.take();
        thread::sleep(Duration::from_millis(100));
        if tx.active_priority() == Priority::Test {
            assert!(recorder.count() > 0, "Test priority without a hold thread");
        } else {
            assert_eq!(recorder.count(), 0);
        }
    }

    tx.test_pattern(TestPattern::Blue).unwrap();
    recorder.take();
    recorder.wait_for(4);
    assert!(recorder.count() >= 4);
    tx.resume_video_mode();
}
