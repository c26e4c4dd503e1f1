//! Replicated presentation features.

pub mod name_tag;
pub mod score;

pub use name_tag::{NameTag, NameTagSync};
pub use score::{ScoreKind, ScoreSync};
