//! SetDisplayObjective: Server → Client.
//!
//! Assigns a scoreboard objective to a display slot.

use bytes::{Buf, BufMut};

use crate::codec::{read_string, read_u8, write_string, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::packets::{PacketKind, ShapedPacket, WireShape};
use crate::types::VarInt;

/// Where an objective is displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisplaySlot {
    PlayerList,
    Sidebar,
    BelowName,
    /// Sidebar shown only to members of a team with the given colour (0-15).
    TeamSidebar(u8),
}

impl DisplaySlot {
    pub fn to_id(self) -> i32 {
        match self {
            Self::PlayerList => 0,
            Self::Sidebar => 1,
            Self::BelowName => 2,
            Self::TeamSidebar(color) => 3 + color as i32,
        }
    }

    pub fn from_id(id: i32) -> Result<Self, ProtoError> {
        match id {
            0 => Ok(Self::PlayerList),
            1 => Ok(Self::Sidebar),
            2 => Ok(Self::BelowName),
            3..=18 => Ok(Self::TeamSidebar((id - 3) as u8)),
            other => Err(ProtoError::InvalidData(format!(
                "unknown display slot: {other}"
            ))),
        }
    }
}

/// SetDisplayObjective packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetDisplayObjective {
    pub slot: DisplaySlot,
    /// Objective name; empty clears the slot.
    pub objective_name: String,
}

impl SetDisplayObjective {
    pub fn new(slot: DisplaySlot, objective_name: impl Into<String>) -> Self {
        Self {
            slot,
            objective_name: objective_name.into(),
        }
    }

    /// Clear a display slot (empty objective name).
    pub fn clear(slot: DisplaySlot) -> Self {
        Self {
            slot,
            objective_name: String::new(),
        }
    }
}

impl ShapedPacket for SetDisplayObjective {
    const KIND: PacketKind = PacketKind::SetDisplayObjective;

    fn encode_shaped(&self, shape: WireShape, buf: &mut impl BufMut) {
        match shape {
            WireShape::Legacy => buf.put_u8(self.slot.to_id() as u8),
            WireShape::Modern => VarInt(self.slot.to_id()).proto_encode(buf),
        }
        write_string(buf, &self.objective_name);
    }

    fn decode_shaped(shape: WireShape, buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let slot = match shape {
            WireShape::Legacy => read_u8(buf)? as i32,
            WireShape::Modern => VarInt::proto_decode(buf)?.0,
        };
        Ok(Self {
            slot: DisplaySlot::from_id(slot)?,
            objective_name: read_string(buf)?,
        })
    }
}
