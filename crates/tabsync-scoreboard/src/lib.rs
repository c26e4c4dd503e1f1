//! Per-connection scoreboard state and the outbound packet interceptor that
//! keeps managed teams, objectives and display slots from being overridden.

pub mod connection;
pub mod sink;
pub mod state;

pub use connection::{PlayerConnection, ScoreboardObserver};
pub use sink::{PacketSink, RecordingSink};
pub use state::{
    CanonicalObjective, CanonicalTeam, Category, EnforcementMode, Overridden, ScoreboardState,
};
