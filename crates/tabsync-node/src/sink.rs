use tabsync_proto::packets::RawPacket;
use tabsync_scoreboard::PacketSink;
use tracing::debug;

/// Stands in for a client connection: logs every packet it would send.
pub struct LoggingSink {
    player: String,
}

impl LoggingSink {
    pub fn new(player: impl Into<String>) -> Self {
        Self {
            player: player.into(),
        }
    }
}

impl PacketSink for LoggingSink {
    fn send_packet(&self, packet: RawPacket) {
        debug!(
            "-> {}: packet 0x{:02X} ({} bytes)",
            self.player,
            packet.id,
            packet.body.len()
        );
    }
}
