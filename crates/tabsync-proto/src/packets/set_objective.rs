//! SetObjective: Server → Client.
//!
//! Registers, removes or updates a scoreboard objective.

use bytes::{Buf, BufMut};

use crate::codec::{read_bool, read_string, read_u8, write_bool, write_string, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::packets::{PacketKind, ShapedPacket, WireShape};
use crate::types::VarInt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectiveAction {
    Register,
    Unregister,
    Update,
}

impl ObjectiveAction {
    pub fn to_id(self) -> u8 {
        match self {
            Self::Register => 0,
            Self::Unregister => 1,
            Self::Update => 2,
        }
    }

    pub fn from_id(id: u8) -> Result<Self, ProtoError> {
        match id {
            0 => Ok(Self::Register),
            1 => Ok(Self::Unregister),
            2 => Ok(Self::Update),
            other => Err(ProtoError::InvalidData(format!(
                "unknown objective action: {other}"
            ))),
        }
    }
}

/// How the client renders the objective's scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderType {
    #[default]
    Integer,
    Hearts,
}

impl RenderType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Hearts => "hearts",
        }
    }

    fn from_name(name: &str) -> Result<Self, ProtoError> {
        match name {
            "integer" => Ok(Self::Integer),
            "hearts" => Ok(Self::Hearts),
            other => Err(ProtoError::InvalidData(format!(
                "unknown render type: {other}"
            ))),
        }
    }

    fn from_id(id: i32) -> Result<Self, ProtoError> {
        match id {
            0 => Ok(Self::Integer),
            1 => Ok(Self::Hearts),
            other => Err(ProtoError::InvalidData(format!(
                "unknown render type id: {other}"
            ))),
        }
    }
}

/// Title and rendering of a registered objective.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectiveDisplay {
    pub title: String,
    pub render_type: RenderType,
    /// Fixed text shown instead of numbers. Only sent to modern clients.
    pub number_format: Option<String>,
}

/// SetObjective packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetObjective {
    pub name: String,
    pub action: ObjectiveAction,
    /// Present for `Register` and `Update`.
    pub display: Option<ObjectiveDisplay>,
}

impl SetObjective {
    pub fn register(name: impl Into<String>, title: impl Into<String>, render_type: RenderType) -> Self {
        Self {
            name: name.into(),
            action: ObjectiveAction::Register,
            display: Some(ObjectiveDisplay {
                title: title.into(),
                render_type,
                number_format: None,
            }),
        }
    }

    pub fn unregister(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            action: ObjectiveAction::Unregister,
            display: None,
        }
    }

    pub fn update(name: impl Into<String>, title: impl Into<String>, render_type: RenderType) -> Self {
        Self {
            action: ObjectiveAction::Update,
            ..Self::register(name, title, render_type)
        }
    }
}

impl ShapedPacket for SetObjective {
    const KIND: PacketKind = PacketKind::SetObjective;

    fn encode_shaped(&self, shape: WireShape, buf: &mut impl BufMut) {
        write_string(buf, &self.name);
        buf.put_u8(self.action.to_id());
        if self.action == ObjectiveAction::Unregister {
            return;
        }
        let default_display = ObjectiveDisplay {
            title: String::new(),
            render_type: RenderType::Integer,
            number_format: None,
        };
        let display = self.display.as_ref().unwrap_or(&default_display);
        write_string(buf, &display.title);
        match shape {
            WireShape::Legacy => write_string(buf, display.render_type.as_str()),
            WireShape::Modern => {
                VarInt(display.render_type as i32).proto_encode(buf);
                write_bool(buf, display.number_format.is_some());
                if let Some(format) = &display.number_format {
                    write_string(buf, format);
                }
            }
        }
    }

    fn decode_shaped(shape: WireShape, buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let name = read_string(buf)?;
        let action = ObjectiveAction::from_id(read_u8(buf)?)?;
        if action == ObjectiveAction::Unregister {
            return Ok(Self {
                name,
                action,
                display: None,
            });
        }
        let title = read_string(buf)?;
        let (render_type, number_format) = match shape {
            WireShape::Legacy => (RenderType::from_name(&read_string(buf)?)?, None),
            WireShape::Modern => {
                let render_type = RenderType::from_id(VarInt::proto_decode(buf)?.0)?;
                let number_format = if read_bool(buf)? {
                    Some(read_string(buf)?)
                } else {
                    None
                };
                (render_type, number_format)
            }
        };
        Ok(Self {
            name,
            action,
            display: Some(ObjectiveDisplay {
                title,
                render_type,
                number_format,
            }),
        })
    }
}
