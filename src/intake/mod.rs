//! The intake questionnaire — stage machine and per-user phase store.

pub mod stage;
pub mod state;

pub use stage::{Stage, Turn, transition};
pub use state::{InMemoryStageStore, Phase, StageStore};
