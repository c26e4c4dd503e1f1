//! SetPlayerTeam: Server → Client.
//!
//! Creates, removes or updates a scoreboard team and its member list.

use bytes::{Buf, BufMut};

use crate::codec::{ensure_remaining, read_string, read_u8, write_string, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::packets::{PacketKind, ShapedPacket, WireShape};
use crate::types::{CollisionRule, NameVisibility, VarInt, VarUInt32};

/// Team packet action byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TeamAction {
    Create,
    Remove,
    Update,
    AddEntries,
    RemoveEntries,
}

impl TeamAction {
    pub fn to_id(self) -> u8 {
        match self {
            Self::Create => 0,
            Self::Remove => 1,
            Self::Update => 2,
            Self::AddEntries => 3,
            Self::RemoveEntries => 4,
        }
    }

    pub fn from_id(id: u8) -> Result<Self, ProtoError> {
        match id {
            0 => Ok(Self::Create),
            1 => Ok(Self::Remove),
            2 => Ok(Self::Update),
            3 => Ok(Self::AddEntries),
            4 => Ok(Self::RemoveEntries),
            other => Err(ProtoError::InvalidData(format!(
                "unknown team action: {other}"
            ))),
        }
    }

    fn has_parameters(self) -> bool {
        matches!(self, Self::Create | Self::Update)
    }

    fn has_entries(self) -> bool {
        matches!(self, Self::Create | Self::AddEntries | Self::RemoveEntries)
    }
}

/// Team options bit: members can hurt each other.
pub const OPTION_FRIENDLY_FIRE: u8 = 0x01;
/// Team options bit: members see invisible teammates.
pub const OPTION_SEE_INVISIBLE: u8 = 0x02;

/// Colour value meaning "no colour".
pub const COLOR_RESET: i32 = 21;

/// Display parameters sent with `Create` and `Update`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamParameters {
    pub display_name: String,
    pub prefix: String,
    pub suffix: String,
    pub options: u8,
    pub visibility: NameVisibility,
    pub collision: CollisionRule,
    pub color: i32,
}

impl Default for TeamParameters {
    fn default() -> Self {
        Self {
            display_name: String::new(),
            prefix: String::new(),
            suffix: String::new(),
            options: 0,
            visibility: NameVisibility::Always,
            collision: CollisionRule::Always,
            color: COLOR_RESET,
        }
    }
}

impl TeamParameters {
    fn encode(&self, shape: WireShape, buf: &mut impl BufMut) {
        write_string(buf, &self.display_name);
        match shape {
            WireShape::Legacy => {
                write_string(buf, &self.prefix);
                write_string(buf, &self.suffix);
                buf.put_u8(self.options);
                write_string(buf, self.visibility.as_str());
                write_string(buf, self.collision.as_str());
                // Legacy colours are a signed byte with -1 for reset.
                let color = if self.color == COLOR_RESET { -1 } else { self.color };
                buf.put_i8(color as i8);
            }
            WireShape::Modern => {
                buf.put_u8(self.options);
                write_string(buf, self.visibility.as_str());
                write_string(buf, self.collision.as_str());
                VarInt(self.color).proto_encode(buf);
                write_string(buf, &self.prefix);
                write_string(buf, &self.suffix);
            }
        }
    }

    fn decode(shape: WireShape, buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let display_name = read_string(buf)?;
        match shape {
            WireShape::Legacy => {
                let prefix = read_string(buf)?;
                let suffix = read_string(buf)?;
                let options = read_u8(buf)?;
                let visibility = NameVisibility::from_name(&read_string(buf)?)?;
                let collision = CollisionRule::from_name(&read_string(buf)?)?;
                ensure_remaining(buf, 1)?;
                let color = match buf.get_i8() {
                    -1 => COLOR_RESET,
                    c => c as i32,
                };
                Ok(Self {
                    display_name,
                    prefix,
                    suffix,
                    options,
                    visibility,
                    collision,
                    color,
                })
            }
            WireShape::Modern => {
                let options = read_u8(buf)?;
                let visibility = NameVisibility::from_name(&read_string(buf)?)?;
                let collision = CollisionRule::from_name(&read_string(buf)?)?;
                let color = VarInt::proto_decode(buf)?.0;
                Ok(Self {
                    display_name,
                    prefix: read_string(buf)?,
                    suffix: read_string(buf)?,
                    options,
                    visibility,
                    collision,
                    color,
                })
            }
        }
    }
}

/// SetPlayerTeam packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetPlayerTeam {
    pub name: String,
    pub action: TeamAction,
    pub parameters: Option<TeamParameters>,
    /// Member names. For `Remove` these are an optional trailer written only
    /// when non-empty.
    pub entries: Vec<String>,
}

impl SetPlayerTeam {
    pub fn create(name: impl Into<String>, parameters: TeamParameters, entries: Vec<String>) -> Self {
        Self {
            name: name.into(),
            action: TeamAction::Create,
            parameters: Some(parameters),
            entries,
        }
    }

    pub fn remove(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            action: TeamAction::Remove,
            parameters: None,
            entries: Vec::new(),
        }
    }

    pub fn update(name: impl Into<String>, parameters: TeamParameters) -> Self {
        Self {
            name: name.into(),
            action: TeamAction::Update,
            parameters: Some(parameters),
            entries: Vec::new(),
        }
    }

    pub fn add_entries(name: impl Into<String>, entries: Vec<String>) -> Self {
        Self {
            name: name.into(),
            action: TeamAction::AddEntries,
            parameters: None,
            entries,
        }
    }

    pub fn remove_entries(name: impl Into<String>, entries: Vec<String>) -> Self {
        Self {
            name: name.into(),
            action: TeamAction::RemoveEntries,
            parameters: None,
            entries,
        }
    }
}

fn write_entries(buf: &mut impl BufMut, entries: &[String]) {
    VarUInt32(entries.len() as u32).proto_encode(buf);
    for entry in entries {
        write_string(buf, entry);
    }
}

fn read_entries(buf: &mut impl Buf) -> Result<Vec<String>, ProtoError> {
    let count = VarUInt32::proto_decode(buf)?.0 as usize;
    // Every entry needs at least its length byte.
    ensure_remaining(buf, count)?;
    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        entries.push(read_string(buf)?);
    }
    Ok(entries)
}

impl ShapedPacket for SetPlayerTeam {
    const KIND: PacketKind = PacketKind::SetPlayerTeam;

    fn encode_shaped(&self, shape: WireShape, buf: &mut impl BufMut) {
        write_string(buf, &self.name);
        buf.put_u8(self.action.to_id());
        if self.action.has_parameters() {
            self.parameters
                .clone()
                .unwrap_or_default()
                .encode(shape, buf);
        }
        if self.action.has_entries() || (self.action == TeamAction::Remove && !self.entries.is_empty()) {
            write_entries(buf, &self.entries);
        }
    }

    fn decode_shaped(shape: WireShape, buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let name = read_string(buf)?;
        let action = TeamAction::from_id(read_u8(buf)?)?;
        let parameters = if action.has_parameters() {
            Some(TeamParameters::decode(shape, buf)?)
        } else {
            None
        };
        let entries = if action.has_entries() || (action == TeamAction::Remove && buf.has_remaining()) {
            read_entries(buf)?
        } else {
            Vec::new()
        };
        Ok(Self {
            name,
            action,
            parameters,
            entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> TeamParameters {
        TeamParameters {
            display_name: "Red".into(),
            prefix: "[R] ".into(),
            suffix: "".into(),
            options: OPTION_FRIENDLY_FIRE | OPTION_SEE_INVISIBLE,
            visibility: NameVisibility::HideForOtherTeams,
            collision: CollisionRule::PushOwnTeam,
            color: 12,
        }
    }

    #[test]
    fn create_both_shapes() {
        for shape in [WireShape::Legacy, WireShape::Modern] {
            let team = SetPlayerTeam::create("red", params(), vec!["alice".into(), "bob".into()]);
            let decoded: SetPlayerTeam = shape.decode(&shape.encode(&team)).unwrap();
            assert_eq!(decoded, team);
        }
    }

    #[test]
    fn legacy_prefix_precedes_options() {
        let pkt = WireShape::Legacy.encode(&SetPlayerTeam::update("t", params()));
        // name "t", action 2, display "Red", then prefix "[R] "
        assert_eq!(&pkt.body[..7], &[1, b't', 2, 3, b'R', b'e', b'd']);
        assert_eq!(&pkt.body[7..12], &[4, b'[', b'R', b']', b' ']);
    }

    #[test]
    fn legacy_reset_color_is_minus_one() {
        let mut p = params();
        p.color = COLOR_RESET;
        let pkt = WireShape::Legacy.encode(&SetPlayerTeam::update("t", p));
        assert_eq!(*pkt.body.last().unwrap(), 0xFF);
        let decoded: SetPlayerTeam = WireShape::Legacy.decode(&pkt).unwrap();
        assert_eq!(decoded.parameters.unwrap().color, COLOR_RESET);
    }

    #[test]
    fn remove_with_and_without_trailer() {
        let shape = WireShape::Modern;
        let bare = shape.encode(&SetPlayerTeam::remove("t1"));
        assert_eq!(&bare.body[..], &[2, b't', b'1', 1]);
        assert!(shape.decode::<SetPlayerTeam>(&bare).unwrap().entries.is_empty());

        let mut with_entries = SetPlayerTeam::remove("t1");
        with_entries.entries = vec!["x".into()];
        let decoded: SetPlayerTeam = shape.decode(&shape.encode(&with_entries)).unwrap();
        assert_eq!(decoded.entries, vec!["x".to_string()]);
    }

    #[test]
    fn update_carries_no_entries() {
        let shape = WireShape::Modern;
        let mut team = SetPlayerTeam::update("t", params());
        team.entries = vec!["ignored".into()];
        let decoded: SetPlayerTeam = shape.decode(&shape.encode(&team)).unwrap();
        assert!(decoded.entries.is_empty());
    }

    #[test]
    fn huge_entry_count_rejected() {
        let shape = WireShape::Modern;
        let mut body = vec![1, b't', 3];
        VarUInt32(1_000_000).proto_encode(&mut body);
        let pkt = crate::packets::RawPacket::new(
            shape.packet_id(PacketKind::SetPlayerTeam),
            body.into(),
        );
        assert!(matches!(
            shape.decode::<SetPlayerTeam>(&pkt),
            Err(ProtoError::BufferTooShort { .. })
        ));
    }
}
