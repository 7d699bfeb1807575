//! Racer - individual racer state and the speed model
//!
//! Each racer has progress, a live rank, and private speed scratch state.
//! The simulation updates all active racers each tick.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Complete state for a single racer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RacerState {
    /// Unique racer name
    pub name: String,
    /// Display color, opaque to the engine
    pub color: String,
    /// Race completion in [0, 100], non-decreasing within a race
    pub progress: f32,
    /// Live rank (1-based); frozen once the racer finishes
    pub current_rank: u32,
    /// Exponentially smoothed effective speed, exposed for presentation
    pub current_speed: f32,
    /// Whether the racer has crossed 100
    pub finished: bool,
    /// Per-race base speed, drawn once at session creation
    base_speed: f32,
}

impl RacerState {
    /// Create a racer seeded with a fresh base speed
    pub fn new(name: String, color: String, rank: u32, rng: &mut impl Rng) -> Self {
        Self {
            name,
            color,
            progress: 0.0,
            current_rank: rank,
            current_speed: 0.0,
            finished: false,
            base_speed: rng.gen_range(Pacing::BASE_SPEED_MIN..Pacing::BASE_SPEED_MAX),
        }
    }

    /// Base speed drawn at session creation (test/diagnostic accessor)
    pub fn base_speed(&self) -> f32 {
        self.base_speed
    }
}

/// Speed model and progress integration logic
pub struct Pacing;

impl Pacing {
    /// Frame deltas above this are clamped before integration (ms)
    pub const MAX_FRAME_DELTA_MS: f32 = 50.0;
    /// Progress gained per unit speed per millisecond
    pub const PROGRESS_SCALE: f32 = 0.004;

    pub const BASE_SPEED_MIN: f32 = 0.75;
    pub const BASE_SPEED_MAX: f32 = 1.25;
    const SPEED_FLOOR: f32 = 0.25;
    const SMOOTHING: f32 = 0.22;
    const JITTER: f32 = 0.06;

    const CATCH_UP_THRESHOLD: f32 = 4.0;
    const CATCH_UP_MAX: f32 = 0.12;

    /// One-tick event odds, rolled fresh every tick
    const BIG_BURST_CHANCE: f64 = 0.012;
    const SMALL_BURST_CHANCE: f64 = 0.03;
    const STUMBLE_CHANCE: f64 = 0.02;
    const SPRINT_CHANCE: f64 = 0.025;
    const FATIGUE_CHANCE: f64 = 0.02;

    pub const BIG_BURST_BOOST: f32 = 0.9;
    pub const SMALL_BURST_BOOST: f32 = 0.4;
    pub const STUMBLE_DIP: f32 = -0.5;
    pub const SPRINT_BOOST: f32 = 0.5;
    pub const FATIGUE_DIP: f32 = -0.35;

    /// Phase multiplier: slow start, unpredictable middle, wilder finish.
    /// Each band draws fresh from its own range every tick.
    pub fn phase_multiplier(progress: f32, rng: &mut impl Rng) -> f32 {
        let (lo, hi) = match progress {
            p if p < 3.0 => (0.55, 0.75),  // start ramp-up
            p if p < 40.0 => (0.90, 1.10), // early
            p if p < 55.0 => (0.80, 1.25), // mid
            p if p < 75.0 => (1.00, 1.30), // second wind
            p if p < 90.0 => (1.05, 1.35), // final approach
            _ => (1.10, 1.50),             // finishing kick
        };
        rng.gen_range(lo..hi)
    }

    /// Rubber-banding: once the active field spreads past a threshold, racers
    /// behind the midpoint get a bounded boost and racers ahead of it a
    /// bounded drag. The clamp keeps it compressing gaps, never inverting
    /// natural leads.
    pub fn catch_up(progress: f32, min_active: f32, max_active: f32) -> f32 {
        let spread = max_active - min_active;
        if spread <= Self::CATCH_UP_THRESHOLD {
            return 0.0;
        }
        let midpoint = (max_active + min_active) * 0.5;
        let correction = (midpoint - progress) / (spread * 0.5) * Self::CATCH_UP_MAX;
        correction.clamp(-Self::CATCH_UP_MAX, Self::CATCH_UP_MAX)
    }

    /// Roll the one-tick stochastic events: bursts and stumbles in the
    /// mid-race window, sprint-or-fatigue in the final approach. Returns the
    /// additive speed injection for this tick (0.0 most ticks).
    pub fn roll_event(progress: f32, rng: &mut impl Rng) -> f32 {
        if (40.0..75.0).contains(&progress) {
            if rng.gen_bool(Self::BIG_BURST_CHANCE) {
                return Self::BIG_BURST_BOOST;
            }
            if rng.gen_bool(Self::SMALL_BURST_CHANCE) {
                return Self::SMALL_BURST_BOOST;
            }
            if rng.gen_bool(Self::STUMBLE_CHANCE) {
                return Self::STUMBLE_DIP;
            }
        } else if (75.0..90.0).contains(&progress) {
            if rng.gen_bool(Self::SPRINT_CHANCE) {
                return Self::SPRINT_BOOST;
            }
            if rng.gen_bool(Self::FATIGUE_CHANCE) {
                return Self::FATIGUE_DIP;
            }
        }
        0.0
    }

    /// Target speed for one tick: base plus jitter, catch-up, and any event,
    /// floored so a stumble never stalls a racer, then shaped by the phase
    /// multiplier.
    pub fn target_speed(
        base_speed: f32,
        progress: f32,
        min_active: f32,
        max_active: f32,
        event: f32,
        rng: &mut impl Rng,
    ) -> f32 {
        let jitter = rng.gen_range(-Self::JITTER..Self::JITTER);
        let raw = base_speed + jitter + Self::catch_up(progress, min_active, max_active) + event;
        raw.max(Self::SPEED_FLOOR) * Self::phase_multiplier(progress, rng)
    }

    /// Exponential low-pass toward the target, preventing jittery motion
    pub fn smooth(prev_speed: f32, target_speed: f32) -> f32 {
        prev_speed + Self::SMOOTHING * (target_speed - prev_speed)
    }

    /// Integrate progress over a clamped frame delta, capped at 100
    pub fn advance(progress: f32, speed: f32, delta_ms: f32) -> f32 {
        let delta = delta_ms.clamp(0.0, Self::MAX_FRAME_DELTA_MS);
        (progress + speed * delta * Self::PROGRESS_SCALE).min(100.0)
    }

    /// Update a single racer for one tick. Finished racers are skipped
    /// entirely. Returns true when the racer crossed 100 this tick.
    pub fn update(
        state: &mut RacerState,
        min_active: f32,
        max_active: f32,
        delta_ms: f32,
        rng: &mut impl Rng,
    ) -> bool {
        if state.finished {
            return false;
        }

        let event = Self::roll_event(state.progress, rng);
        let target = Self::target_speed(
            state.base_speed,
            state.progress,
            min_active,
            max_active,
            event,
            rng,
        );
        state.current_speed = Self::smooth(state.current_speed, target);
        state.progress = Self::advance(state.progress, state.current_speed, delta_ms);

        if state.progress >= 100.0 {
            state.progress = 100.0;
            state.finished = true;
            return true;
        }
        false
    }
}
