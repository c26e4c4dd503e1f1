//! Wire shape selection: packet ids and layouts of the two protocol
//! generations the interceptor understands.

use bytes::{Buf, BytesMut};

use crate::codec::{read_string, read_u8};
use crate::error::ProtoError;
use crate::packets::{RawPacket, ShapedPacket, TeamAction};

/// First protocol version using the flattened (modern) packet layouts.
pub const FLATTENING_PROTOCOL: i32 = 393;

/// The four scoreboard packets handled by the interceptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKind {
    SetObjective,
    SetDisplayObjective,
    SetPlayerTeam,
    SetScore,
}

/// What an outbound packet means to the interceptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketClass {
    /// Not a scoreboard packet; forwarded untouched.
    None,
    Objective,
    DisplaySlot,
    Score,
    Team(TeamAction),
}

/// Packet layout generation, chosen once per connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireShape {
    /// Pre-flattening clients: byte display slots, string render types,
    /// prefix/suffix before the team options.
    Legacy,
    /// Flattening and later: VarInt slots and colours, optional number formats.
    Modern,
}

impl WireShape {
    pub fn for_protocol(protocol: i32) -> Self {
        if protocol < FLATTENING_PROTOCOL {
            Self::Legacy
        } else {
            Self::Modern
        }
    }

    pub fn packet_id(self, kind: PacketKind) -> u32 {
        match (self, kind) {
            (Self::Legacy, PacketKind::SetDisplayObjective) => 0x3B,
            (Self::Legacy, PacketKind::SetObjective) => 0x42,
            (Self::Legacy, PacketKind::SetPlayerTeam) => 0x44,
            (Self::Legacy, PacketKind::SetScore) => 0x45,
            (Self::Modern, PacketKind::SetDisplayObjective) => 0x57,
            (Self::Modern, PacketKind::SetObjective) => 0x5E,
            (Self::Modern, PacketKind::SetPlayerTeam) => 0x60,
            (Self::Modern, PacketKind::SetScore) => 0x61,
        }
    }

    pub fn kind_of(self, id: u32) -> Option<PacketKind> {
        [
            PacketKind::SetObjective,
            PacketKind::SetDisplayObjective,
            PacketKind::SetPlayerTeam,
            PacketKind::SetScore,
        ]
        .into_iter()
        .find(|kind| self.packet_id(*kind) == id)
    }

    /// Classify a packet by id. Team packets additionally have their action
    /// read from the header.
    pub fn classify(self, packet: &RawPacket) -> Result<PacketClass, ProtoError> {
        let Some(kind) = self.kind_of(packet.id) else {
            return Ok(PacketClass::None);
        };
        Ok(match kind {
            PacketKind::SetObjective => PacketClass::Objective,
            PacketKind::SetDisplayObjective => PacketClass::DisplaySlot,
            PacketKind::SetScore => PacketClass::Score,
            PacketKind::SetPlayerTeam => {
                let mut body = &packet.body[..];
                read_string(&mut body)?;
                PacketClass::Team(TeamAction::from_id(read_u8(&mut body)?)?)
            }
        })
    }

    pub fn encode<P: ShapedPacket>(self, packet: &P) -> RawPacket {
        let mut buf = BytesMut::new();
        packet.encode_shaped(self, &mut buf);
        RawPacket::new(self.packet_id(P::KIND), buf.freeze())
    }

    /// Decode a packet body that must be consumed completely.
    pub fn decode<P: ShapedPacket>(self, packet: &RawPacket) -> Result<P, ProtoError> {
        let expected = self.packet_id(P::KIND);
        if packet.id != expected {
            return Err(ProtoError::UnknownPacketId(packet.id));
        }
        let mut body = &packet.body[..];
        let decoded = P::decode_shaped(self, &mut body)?;
        if body.has_remaining() {
            return Err(ProtoError::TrailingBytes(body.remaining()));
        }
        Ok(decoded)
    }
}
