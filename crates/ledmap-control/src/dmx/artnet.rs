//! Art-Net protocol implementation (Art-Net 4, ArtDMX only)
//!
//! Art-Net is a UDP-based protocol for transmitting DMX512 over Ethernet.

use std::net::SocketAddr;

use ledmap_core::ChannelOrder;

/// Packet ID at the start of every Art-Net packet
pub const ARTNET_ID: &[u8; 8] = b"Art-Net\0";
/// OpDmx opcode
pub const OP_DMX: u16 = 0x5000;
/// Protocol revision sent in ProtVer
pub const PROTOCOL_VERSION: u16 = 14;
/// Size of the ArtDMX header
pub const HEADER_LEN: usize = 18;
/// Largest DMX payload
pub const MAX_DMX_LEN: usize = 512;

/// Build an ArtDMX packet into `packet`, reusing its allocation.
///
/// Odd payloads get one trailing zero byte since Art-Net requires an even
/// length. Payloads longer than one universe are truncated.
pub fn build_artdmx_packet(packet: &mut Vec<u8>, universe: u16, sequence: u8, data: &[u8]) {
    let data = &data[..data.len().min(MAX_DMX_LEN)];
    let length = data.len() + data.len() % 2;

    packet.clear();
    packet.reserve(HEADER_LEN + length);

    // Header: "Art-Net\0"
    packet.extend_from_slice(ARTNET_ID);
    // OpCode: OpDmx (little-endian)
    packet.extend_from_slice(&OP_DMX.to_le_bytes());
    // Protocol version (big-endian)
    packet.extend_from_slice(&PROTOCOL_VERSION.to_be_bytes());
    packet.push(sequence);
    // Physical
    packet.push(0);
    // Port-Address (little-endian)
    packet.extend_from_slice(&universe.to_le_bytes());
    // Length (big-endian)
    packet.extend_from_slice(&(length as u16).to_be_bytes());

    packet.extend_from_slice(data);
    packet.resize(HEADER_LEN + length, 0);
}

/// Borrowed view of a received ArtDMX packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtDmx<'a> {
    pub sequence: u8,
    pub physical: u8,
    pub universe: u16,
    pub data: &'a [u8],
}

/// Parse an ArtDMX packet. Returns `None` for anything else.
pub fn parse_artdmx(packet: &[u8]) -> Option<ArtDmx<'_>> {
    if packet.len() < HEADER_LEN || &packet[0..8] != ARTNET_ID {
        return None;
    }
    if u16::from_le_bytes([packet[8], packet[9]]) != OP_DMX {
        return None;
    }
    let length = u16::from_be_bytes([packet[16], packet[17]]) as usize;
    let data = packet.get(HEADER_LEN..HEADER_LEN + length)?;
    Some(ArtDmx {
        sequence: packet[12],
        physical: packet[13],
        universe: u16::from_le_bytes([packet[14], packet[15]]),
        data,
    })
}

/// Per-universe output state
#[derive(Debug, Clone)]
pub struct Universe {
    pub number: u16,
    pub target: SocketAddr,
    pub channel_order: ChannelOrder,
    sequence: u8,
    refresh_rate: u32,
}

impl Universe {
    pub fn new(number: u16, target: SocketAddr, channel_order: ChannelOrder, refresh_rate: u32) -> Self {
        Self {
            number,
            target,
            channel_order,
            sequence: 0,
            refresh_rate,
        }
    }

    /// Advance the sequence counter. Runs 1..=255; 0 would disable
    /// reordering on receivers.
    pub fn next_sequence(&mut self) -> u8 {
        self.sequence = if self.sequence == u8::MAX {
            1
        } else {
            self.sequence + 1
        };
        self.sequence
    }

    /// Last sequence number sent, 0 before the first packet
    pub fn sequence(&self) -> u8 {
        self.sequence
    }

    pub fn refresh_rate(&self) -> u32 {
        self.refresh_rate
    }

    pub fn set_refresh_rate(&mut self, hz: u32) {
        self.refresh_rate = hz;
    }
}
