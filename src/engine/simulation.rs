//! Simulation - engine surface driven by the host frame loop
//!
//! Owns the RNG and the current session, validates participant input, clamps
//! frame deltas, and queues notifications for external subscribers. The
//! engine never schedules anything itself; the host rendering loop calls
//! `tick` with its own timestamps.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use thiserror::Error;

use crate::engine::race::{FinishEntry, RaceEvent, RacePhase, RaceSession, RaceSnapshot};
use crate::engine::racer::Pacing;

/// Input rejected at `reset` time, before any tick is scheduled
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("a race needs at least 2 participants, got {got}")]
    InvalidParticipantCount { got: usize },
    #[error("duplicate participant name: {name}")]
    DuplicateParticipantIdentity { name: String },
}

/// Main race engine
///
/// Generic over its random source so tests can inject a seeded generator;
/// production use draws fresh entropy, making races non-reproducible by
/// design.
pub struct RaceEngine<R: Rng = SmallRng> {
    /// Active session (if any)
    session: Option<RaceSession>,
    /// Random source for base speeds, jitter, and events
    rng: R,
    /// Whether ticks are currently being consumed
    running: bool,
    /// Paused ticks are ignored without touching session state
    paused: bool,
    /// Host timestamp of the previous consumed tick (ms)
    last_tick_ms: Option<f64>,
    /// Notifications queued since the last drain
    events: Vec<RaceEvent>,
}

impl RaceEngine<SmallRng> {
    /// Create an engine with an entropy-seeded random source
    pub fn new() -> Self {
        Self::with_rng(SmallRng::from_entropy())
    }
}

impl Default for RaceEngine<SmallRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> RaceEngine<R> {
    /// Create an engine with an injected random source
    pub fn with_rng(rng: R) -> Self {
        Self {
            session: None,
            rng,
            running: false,
            paused: false,
            last_tick_ms: None,
            events: Vec::new(),
        }
    }

    /// Rebuild the session from scratch and return to countdown.
    ///
    /// Rejects fewer than 2 names or duplicate names without touching the
    /// current session. On success any in-flight run is torn down first, so
    /// stale ticks from the previous session cannot resurrect it.
    pub fn reset<S: AsRef<str>>(&mut self, names: &[S]) -> Result<(), EngineError> {
        if names.len() < 2 {
            return Err(EngineError::InvalidParticipantCount { got: names.len() });
        }
        let mut seen = HashSet::new();
        for name in names {
            if !seen.insert(name.as_ref()) {
                return Err(EngineError::DuplicateParticipantIdentity {
                    name: name.as_ref().to_owned(),
                });
            }
        }

        self.running = false;
        self.paused = false;
        self.last_tick_ms = None;
        self.events.clear();
        self.session = Some(RaceSession::new(names, &mut self.rng));
        log::info!("session reset with {} participants", names.len());
        Ok(())
    }

    /// Arm the countdown/tick loop for the current session.
    ///
    /// Idempotent: a no-op when already running, when no session exists, or
    /// when the session has already finished.
    pub fn start(&mut self) {
        let Some(session) = &self.session else {
            log::warn!("start() called with no session; ignoring");
            return;
        };
        if self.running {
            return;
        }
        if session.phase == RacePhase::Finished {
            log::warn!("start() called on a finished session; reset first");
            return;
        }

        self.running = true;
        self.paused = false;
        self.last_tick_ms = None;
        log::info!("countdown armed");
    }

    /// Advance the simulation by one frame, driven by the host timestamp.
    ///
    /// The delta since the previous tick is clamped to
    /// [0, `Pacing::MAX_FRAME_DELTA_MS`], so clock irregularities and stalled
    /// frames can never produce jumps or non-finite progress. Returns the
    /// post-tick snapshot.
    pub fn tick(&mut self, now_ms: f64) -> Option<RaceSnapshot> {
        if !self.running || self.paused {
            return self.snapshot();
        }

        let delta = match self.last_tick_ms {
            Some(prev) => (now_ms - prev).clamp(0.0, f64::from(Pacing::MAX_FRAME_DELTA_MS)),
            // first tick after start/resume only establishes the baseline
            None => 0.0,
        };
        self.last_tick_ms = Some(now_ms);

        if let Some(session) = &mut self.session {
            session.update(delta, &mut self.rng, &mut self.events);
            if session.is_finished() {
                self.running = false;
                log::info!("tick loop stopped; race complete");
            }
        }

        self.snapshot()
    }

    /// Stop consuming ticks without touching session state
    pub fn pause(&mut self) {
        if self.running {
            self.paused = true;
        }
    }

    /// Resume after a pause; the clock re-bases so the pause gap is never
    /// integrated
    pub fn resume(&mut self) {
        if self.running && self.paused {
            self.paused = false;
            self.last_tick_ms = None;
        }
    }

    /// Current session snapshot, if a session exists
    pub fn snapshot(&self) -> Option<RaceSnapshot> {
        self.session.as_ref().map(RaceSession::get_snapshot)
    }

    /// Current lifecycle phase, if a session exists
    pub fn state(&self) -> Option<RacePhase> {
        self.session.as_ref().map(|s| s.phase)
    }

    /// Finish order so far, sorted by rank
    pub fn results(&self) -> Option<Vec<FinishEntry>> {
        self.session.as_ref().map(|s| s.finish_order.clone())
    }

    /// Drain all notifications queued since the last drain
    pub fn drain_events(&mut self) -> Vec<RaceEvent> {
        std::mem::take(&mut self.events)
    }

    /// Whether the tick loop is armed
    pub fn is_running(&self) -> bool {
        self.running
    }
}
