//! Multi-agent race simulation engine
//!
//! A frame-driven pacing simulator: each racer integrates progress from a
//! smoothed target speed shaped by race-phase curves, rubber-banding, jitter,
//! and rare one-tick events, while the session tracks live ranks, lead
//! changes, photo-finish range, and the append-only finish order.
//!
//! Rendering, audio, and persistence are external collaborators. They drive
//! the engine with [`RaceEngine::tick`] once per frame, read
//! [`RaceSnapshot`]s between ticks, and drain [`RaceEvent`]s for cues.
//!
//! ```no_run
//! use race_engine::{RaceEngine, RacePhase};
//!
//! let mut engine = RaceEngine::new();
//! engine.reset(&["Alice", "Bob", "Carol"])?;
//! engine.start();
//!
//! let mut now_ms = 0.0;
//! while engine.state() != Some(RacePhase::Finished) {
//!     let _snapshot = engine.tick(now_ms);
//!     for _event in engine.drain_events() {
//!         // feed audio/visual cues
//!     }
//!     now_ms += 16.0; // host frame clock
//! }
//! # Ok::<(), race_engine::EngineError>(())
//! ```

pub mod engine;

pub use engine::race::{
    FinishEntry, RaceEvent, RacePhase, RaceSession, RaceSnapshot, RacerSnapshot,
    COUNTDOWN_INTERVAL_MS, COUNTDOWN_START, PHOTO_FINISH_MAX_GAP, PHOTO_FINISH_MIN_PROGRESS,
};
pub use engine::racer::{Pacing, RacerState};
pub use engine::simulation::{EngineError, RaceEngine};
