//! SetScore: Server → Client.
//!
//! Sets or removes one score holder's value in an objective.

use bytes::{Buf, BufMut};

use crate::codec::{read_bool, read_string, read_u8, write_bool, write_string, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::packets::{PacketKind, ShapedPacket, WireShape};
use crate::types::VarInt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreAction {
    Change,
    Remove,
}

impl ScoreAction {
    pub fn to_id(self) -> u8 {
        match self {
            Self::Change => 0,
            Self::Remove => 1,
        }
    }

    pub fn from_id(id: u8) -> Result<Self, ProtoError> {
        match id {
            0 => Ok(Self::Change),
            1 => Ok(Self::Remove),
            other => Err(ProtoError::InvalidData(format!(
                "unknown score action: {other}"
            ))),
        }
    }
}

/// SetScore packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetScore {
    /// Score holder, a player name for player scores.
    pub holder: String,
    pub action: ScoreAction,
    pub objective: String,
    pub value: i32,
    /// Fancy display of the value. Only sent to modern clients.
    pub number_format: Option<String>,
}

impl SetScore {
    pub fn change(holder: impl Into<String>, objective: impl Into<String>, value: i32) -> Self {
        Self {
            holder: holder.into(),
            action: ScoreAction::Change,
            objective: objective.into(),
            value,
            number_format: None,
        }
    }

    pub fn remove(holder: impl Into<String>, objective: impl Into<String>) -> Self {
        Self {
            holder: holder.into(),
            action: ScoreAction::Remove,
            objective: objective.into(),
            value: 0,
            number_format: None,
        }
    }

    pub fn with_number_format(mut self, format: impl Into<String>) -> Self {
        self.number_format = Some(format.into());
        self
    }
}

impl ShapedPacket for SetScore {
    const KIND: PacketKind = PacketKind::SetScore;

    fn encode_shaped(&self, shape: WireShape, buf: &mut impl BufMut) {
        write_string(buf, &self.holder);
        buf.put_u8(self.action.to_id());
        write_string(buf, &self.objective);
        if self.action == ScoreAction::Remove {
            return;
        }
        VarInt(self.value).proto_encode(buf);
        if shape == WireShape::Modern {
            write_bool(buf, self.number_format.is_some());
            if let Some(format) = &self.number_format {
                write_string(buf, format);
            }
        }
    }

    fn decode_shaped(shape: WireShape, buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let holder = read_string(buf)?;
        let action = ScoreAction::from_id(read_u8(buf)?)?;
        let objective = read_string(buf)?;
        if action == ScoreAction::Remove {
            return Ok(Self {
                holder,
                action,
                objective,
                value: 0,
                number_format: None,
            });
        }
        let value = VarInt::proto_decode(buf)?.0;
        let number_format = if shape == WireShape::Modern && read_bool(buf)? {
            Some(read_string(buf)?)
        } else {
            None
        };
        Ok(Self {
            holder,
            action,
            objective,
            value,
            number_format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_change_drops_number_format() {
        let shape = WireShape::Legacy;
        let score = SetScore::change("Steve", "TAB-BelowName", 20).with_number_format("20❤");
        let decoded: SetScore = shape.decode(&shape.encode(&score)).unwrap();
        assert_eq!(decoded.value, 20);
        assert_eq!(decoded.number_format, None);
    }

    #[test]
    fn modern_change_keeps_number_format() {
        let shape = WireShape::Modern;
        let score = SetScore::change("Steve", "TAB-YellowNumber", -3).with_number_format("low");
        let decoded: SetScore = shape.decode(&shape.encode(&score)).unwrap();
        assert_eq!(decoded, score);
    }

    #[test]
    fn remove_has_no_value() {
        let shape = WireShape::Modern;
        let pkt = shape.encode(&SetScore::remove("a", "o"));
        assert_eq!(&pkt.body[..], &[1, b'a', 1, 1, b'o']);
    }
}
