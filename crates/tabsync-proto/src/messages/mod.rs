//! Replication messages exchanged between nodes.
//!
//! Each struct is the payload that follows the envelope header; the tag that
//! identifies it travels in the envelope (see [`crate::envelope`]).

pub mod join;
pub mod load;
pub mod name_tag;
pub mod quit;
pub mod score;
pub mod server_switch;
pub mod vanish;

pub use join::{PlayerJoin, Skin};
pub use load::{Load, LoadRequest};
pub use name_tag::NameTagUpdate;
pub use quit::PlayerQuit;
pub use score::ScoreUpdate;
pub use server_switch::ServerSwitch;
pub use vanish::UpdateVanishStatus;
