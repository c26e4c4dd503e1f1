//! Base data types shared by the replication wire format and game packets.

use std::fmt;
use std::str::FromStr;

use bytes::{Buf, BufMut};
use thiserror::Error;

use crate::codec::{ensure_remaining, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum VarIntError {
    #[error("buffer too short")]
    BufferTooShort,
    #[error("VarInt is too long (more than {max_bytes} bytes)")]
    TooManyBytes { max_bytes: usize },
}

// ---------------------------------------------------------------------------
// VarInt (i32: two's complement LEB128, no ZigZag)
// ---------------------------------------------------------------------------

/// Signed variable-length integer as used by game packets: the raw bits of
/// the `i32` in LEB128, so negative values always take five bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarInt(pub i32);

impl VarInt {
    /// Maximum bytes a VarInt can occupy.
    pub const MAX_BYTES: usize = 5;
}

impl ProtoEncode for VarInt {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        VarUInt32(self.0 as u32).proto_encode(buf);
    }
}

impl ProtoDecode for VarInt {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(VarInt(VarUInt32::proto_decode(buf)?.0 as i32))
    }
}

impl From<i32> for VarInt {
    fn from(v: i32) -> Self {
        VarInt(v)
    }
}

impl fmt::Debug for VarInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VarInt({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// VarUInt32 (unsigned LEB128)
// ---------------------------------------------------------------------------

/// Unsigned variable-length integer (plain LEB128).
/// Used for packet ids, string lengths and list lengths in game packets.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarUInt32(pub u32);

impl VarUInt32 {
    pub const MAX_BYTES: usize = 5;
}

impl ProtoEncode for VarUInt32 {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        let mut value = self.0;
        loop {
            if value & !0x7F == 0 {
                buf.put_u8(value as u8);
                return;
            }
            buf.put_u8((value & 0x7F | 0x80) as u8);
            value >>= 7;
        }
    }
}

impl ProtoDecode for VarUInt32 {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let mut result: u32 = 0;
        let mut shift: u32 = 0;
        for i in 0..Self::MAX_BYTES {
            if !buf.has_remaining() {
                return Err(VarIntError::BufferTooShort.into());
            }
            let byte = buf.get_u8();
            result |= ((byte & 0x7F) as u32) << shift;
            if byte & 0x80 == 0 {
                return Ok(VarUInt32(result));
            }
            shift += 7;
            if i == Self::MAX_BYTES - 1 {
                return Err(VarIntError::TooManyBytes {
                    max_bytes: Self::MAX_BYTES,
                }
                .into());
            }
        }
        Err(VarIntError::BufferTooShort.into())
    }
}

impl From<u32> for VarUInt32 {
    fn from(v: u32) -> Self {
        VarUInt32(v)
    }
}

impl fmt::Debug for VarUInt32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VarUInt32({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// Uuid (two u64, big-endian)
// ---------------------------------------------------------------------------

/// 128-bit UUID, encoded as the most and least significant halves in
/// big-endian order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Uuid {
    pub most_significant: u64,
    pub least_significant: u64,
}

impl Uuid {
    pub const ZERO: Self = Self {
        most_significant: 0,
        least_significant: 0,
    };

    pub fn new(most: u64, least: u64) -> Self {
        Self {
            most_significant: most,
            least_significant: least,
        }
    }

    /// Random version 4 UUID.
    pub fn random() -> Self {
        let most: u64 = rand::random();
        let least: u64 = rand::random();
        Self {
            most_significant: (most & !0xF000) | 0x4000,
            least_significant: (least & !(0xC << 60)) | (0x8 << 60),
        }
    }

    pub fn to_bytes(&self) -> [u8; 16] {
        let mut b = [0u8; 16];
        b[..8].copy_from_slice(&self.most_significant.to_be_bytes());
        b[8..].copy_from_slice(&self.least_significant.to_be_bytes());
        b
    }
}

impl ProtoEncode for Uuid {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_u64(self.most_significant);
        buf.put_u64(self.least_significant);
    }
}

impl ProtoDecode for Uuid {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        ensure_remaining(buf, 16)?;
        Ok(Self {
            most_significant: buf.get_u64(),
            least_significant: buf.get_u64(),
        })
    }
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.to_bytes();
        write!(
            f,
            "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            bytes[0], bytes[1], bytes[2], bytes[3],
            bytes[4], bytes[5],
            bytes[6], bytes[7],
            bytes[8], bytes[9],
            bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15],
        )
    }
}

impl fmt::Debug for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Uuid({self})")
    }
}

impl FromStr for Uuid {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex: String = s.chars().filter(|c| *c != '-').collect();
        if hex.len() != 32 {
            return Err(ProtoError::InvalidData(format!("malformed UUID: {s}")));
        }
        let parse = |part: &str| {
            u64::from_str_radix(part, 16)
                .map_err(|_| ProtoError::InvalidData(format!("malformed UUID: {s}")))
        };
        Ok(Self::new(parse(&hex[..16])?, parse(&hex[16..])?))
    }
}

// ---------------------------------------------------------------------------
// NodeId
// ---------------------------------------------------------------------------

/// Identity of one node in the replication cluster, generated once per
/// process and carried in every envelope for self-message filtering.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub Uuid);

impl NodeId {
    pub fn random() -> Self {
        NodeId(Uuid::random())
    }
}

impl ProtoEncode for NodeId {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        self.0.proto_encode(buf);
    }
}

impl ProtoDecode for NodeId {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(NodeId(Uuid::proto_decode(buf)?))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// Team rules
// ---------------------------------------------------------------------------

/// Nametag visibility rule of a scoreboard team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NameVisibility {
    #[default]
    Always,
    Never,
    HideForOtherTeams,
    HideForOwnTeam,
}

impl NameVisibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Always => "always",
            Self::Never => "never",
            Self::HideForOtherTeams => "hideForOtherTeams",
            Self::HideForOwnTeam => "hideForOwnTeam",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, ProtoError> {
        match name {
            "always" => Ok(Self::Always),
            "never" => Ok(Self::Never),
            "hideForOtherTeams" => Ok(Self::HideForOtherTeams),
            "hideForOwnTeam" => Ok(Self::HideForOwnTeam),
            other => Err(ProtoError::InvalidData(format!(
                "unknown name visibility: {other}"
            ))),
        }
    }

    pub fn to_byte(self) -> u8 {
        self as u8
    }

    pub fn from_byte(b: u8) -> Result<Self, ProtoError> {
        match b {
            0 => Ok(Self::Always),
            1 => Ok(Self::Never),
            2 => Ok(Self::HideForOtherTeams),
            3 => Ok(Self::HideForOwnTeam),
            other => Err(ProtoError::InvalidData(format!(
                "unknown name visibility id: {other}"
            ))),
        }
    }
}

/// Collision rule of a scoreboard team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CollisionRule {
    #[default]
    Always,
    Never,
    PushOtherTeams,
    PushOwnTeam,
}

impl CollisionRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Always => "always",
            Self::Never => "never",
            Self::PushOtherTeams => "pushOtherTeams",
            Self::PushOwnTeam => "pushOwnTeam",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, ProtoError> {
        match name {
            "always" => Ok(Self::Always),
            "never" => Ok(Self::Never),
            "pushOtherTeams" => Ok(Self::PushOtherTeams),
            "pushOwnTeam" => Ok(Self::PushOwnTeam),
            other => Err(ProtoError::InvalidData(format!(
                "unknown collision rule: {other}"
            ))),
        }
    }
}
