//! Cross-node replication of player presentation state.
//!
//! A [`ProxySync`] announces local players to the cluster over a
//! [`Transport`], keeps a [`RemoteNodeDirectory`] of players connected
//! elsewhere and fans lifecycle events out to its [`SyncFeature`]s, which
//! render the replicated state into every local player's scoreboard.

pub mod directory;
pub mod error;
pub mod features;
mod handlers;
pub mod player;
pub mod registry;
pub mod sync;
pub mod transport;

pub use directory::{ConnectionState, RemoteEntity, RemoteNodeDirectory, ScoreValue};
pub use error::{DispatchError, TransportError};
pub use player::LocalPlayer;
pub use registry::{tag, Dispatcher, MessageRegistry, SyncMessage};
pub use sync::{ProxySync, ProxySyncBuilder, SyncFeature};
pub use transport::{InboundHandler, LocalBus, Outbound, Transport};
