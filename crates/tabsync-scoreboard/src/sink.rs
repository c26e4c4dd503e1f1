//! Outbound packet pipe of a connection.

use parking_lot::Mutex;
use tabsync_proto::packets::RawPacket;

/// Where a connection's packets go once they have passed interception.
pub trait PacketSink: Send + Sync {
    fn send_packet(&self, packet: RawPacket);
}

/// Sink that keeps every packet in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    packets: Mutex<Vec<RawPacket>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything recorded so far.
    pub fn take(&self) -> Vec<RawPacket> {
        std::mem::take(&mut *self.packets.lock())
    }

    pub fn len(&self) -> usize {
        self.packets.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.lock().is_empty()
    }
}

impl PacketSink for RecordingSink {
    fn send_packet(&self, packet: RawPacket) {
        self.packets.lock().push(packet);
    }
}
