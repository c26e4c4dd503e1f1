//! Scoreboard game packets managed by the interceptor, plus the raw packet
//! form exchanged with the connection pipeline.
//!
//! Packet layouts depend on the client's protocol generation; every packet
//! encodes and decodes through a [`WireShape`].

pub mod set_display_objective;
pub mod set_objective;
pub mod set_player_team;
pub mod set_score;
pub mod shape;

use bytes::{Buf, BufMut, Bytes};

use crate::error::ProtoError;

pub use set_display_objective::{DisplaySlot, SetDisplayObjective};
pub use set_objective::{ObjectiveAction, ObjectiveDisplay, RenderType, SetObjective};
pub use set_player_team::{SetPlayerTeam, TeamAction, TeamParameters};
pub use set_score::{ScoreAction, SetScore};
pub use shape::{PacketClass, PacketKind, WireShape};

/// An outbound game packet as seen by the pipeline: id plus opaque body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPacket {
    pub id: u32,
    pub body: Bytes,
}

impl RawPacket {
    pub fn new(id: u32, body: Bytes) -> Self {
        Self { id, body }
    }
}

/// A packet whose layout depends on the wire shape.
pub trait ShapedPacket: Sized {
    const KIND: PacketKind;

    fn encode_shaped(&self, shape: WireShape, buf: &mut impl BufMut);

    fn decode_shaped(shape: WireShape, buf: &mut impl Buf) -> Result<Self, ProtoError>;
}
