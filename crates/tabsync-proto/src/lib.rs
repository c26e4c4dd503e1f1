//! Wire formats for cluster replication messages and scoreboard game packets.

pub mod codec;
pub mod envelope;
pub mod error;
pub mod messages;
pub mod packets;
pub mod types;
