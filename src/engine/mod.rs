//! Race Engine Module
//!
//! Runs the countdown/racing/finished lifecycle for a field of racers and
//! hands read-only snapshots and event notifications to the presentation
//! layer.

pub mod race;
pub mod racer;
pub mod simulation;

pub use race::{FinishEntry, RaceEvent, RacePhase, RaceSession, RaceSnapshot, RacerSnapshot};
pub use racer::{Pacing, RacerState};
pub use simulation::{EngineError, RaceEngine};
