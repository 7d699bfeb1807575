//! Race session - lifecycle, live standings, and finish recording
//!
//! Owns the ordered racer list, the countdown/racing/finished state machine,
//! and the append-only finish order. One `update` call advances everything by
//! one frame.

use std::cmp::Ordering;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::engine::racer::{Pacing, RacerState};

/// Countdown starts here and decrements once per interval
pub const COUNTDOWN_START: u32 = 3;
/// Wall-clock interval between countdown steps (ms)
pub const COUNTDOWN_INTERVAL_MS: f64 = 800.0;

/// Top active racer must be past this before a photo finish can be flagged
pub const PHOTO_FINISH_MIN_PROGRESS: f32 = 75.0;
/// Maximum top-two gap for a photo finish
pub const PHOTO_FINISH_MAX_GAP: f32 = 8.0;

/// Display colors assigned to racers by input index
const COLOR_PALETTE: [&str; 10] = [
    "#e6194b", "#3cb44b", "#ffe119", "#4363d8", "#f58231", "#911eb4", "#46f0f0", "#f032e6",
    "#bcf60c", "#008080",
];

/// Race lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RacePhase {
    Countdown,
    Racing,
    Finished,
}

/// Immutable record of one racer crossing the line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishEntry {
    pub name: String,
    pub color: String,
    pub rank: u32,
}

/// Discrete notifications for presentation/audio collaborators, drained
/// between ticks via [`RaceEngine::drain_events`](crate::RaceEngine::drain_events)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RaceEvent {
    /// The racer holding maximum progress changed identity
    LeadChange { leader: String, lead_change_count: u32 },
    /// A racer crossed 100 and was assigned its final rank
    RacerFinished(FinishEntry),
    /// Every racer has finished; carries the final rankings
    RaceFinished(Vec<FinishEntry>),
}

/// Complete race state for one session
///
/// Rebuilt wholesale on every reset; racers are never added or removed
/// mid-race. Name uniqueness is a precondition enforced by the engine
/// surface, not re-validated here.
#[derive(Debug, Clone)]
pub struct RaceSession {
    /// All racers, in caller-supplied order (stable for the race's lifetime)
    pub racers: Vec<RacerState>,
    /// Current lifecycle phase
    pub phase: RacePhase,
    /// Countdown steps remaining
    pub countdown: u32,
    /// Elapsed race time while racing (ms)
    pub elapsed_ms: f64,
    /// Name of the racer with maximum progress, once one exists
    pub leader: Option<String>,
    /// Number of leader identity changes this race
    pub lead_change_count: u32,
    /// Whether the top two active racers are in photo-finish range
    pub photo_finish: bool,
    /// Append-only finish order
    pub finish_order: Vec<FinishEntry>,
    /// Time accumulated toward the next countdown step (ms)
    countdown_elapsed_ms: f64,
}

impl RaceSession {
    /// Create a session in countdown with all racers reseeded from scratch
    pub fn new<S: AsRef<str>>(names: &[S], rng: &mut impl Rng) -> Self {
        let racers = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                RacerState::new(
                    name.as_ref().to_owned(),
                    COLOR_PALETTE[i % COLOR_PALETTE.len()].to_owned(),
                    i as u32 + 1,
                    rng,
                )
            })
            .collect();

        Self {
            racers,
            phase: RacePhase::Countdown,
            countdown: COUNTDOWN_START,
            elapsed_ms: 0.0,
            leader: None,
            lead_change_count: 0,
            photo_finish: false,
            finish_order: Vec::new(),
            countdown_elapsed_ms: 0.0,
        }
    }

    /// Advance the session by one frame delta, pushing any notifications
    /// onto `events`
    pub fn update(&mut self, delta_ms: f64, rng: &mut impl Rng, events: &mut Vec<RaceEvent>) {
        match self.phase {
            RacePhase::Countdown => {
                self.countdown_elapsed_ms += delta_ms;
                while self.countdown_elapsed_ms >= COUNTDOWN_INTERVAL_MS && self.countdown > 0 {
                    self.countdown_elapsed_ms -= COUNTDOWN_INTERVAL_MS;
                    self.countdown -= 1;
                    log::debug!("countdown: {}", self.countdown);
                }
                if self.countdown == 0 {
                    self.phase = RacePhase::Racing;
                    log::info!("race underway with {} racers", self.racers.len());
                }
            }

            RacePhase::Racing => {
                self.elapsed_ms += delta_ms;
                self.step_racers(delta_ms as f32, rng, events);
                self.update_ranks();
                self.update_leader(events);
                self.photo_finish = Self::compute_photo_finish(&self.racers);

                if self.finish_order.len() == self.racers.len() {
                    self.phase = RacePhase::Finished;
                    events.push(RaceEvent::RaceFinished(self.finish_order.clone()));
                    if let Some(winner) = self.finish_order.first() {
                        log::info!(
                            "race finished after {:.1}s, winner: {}",
                            self.elapsed_ms / 1000.0,
                            winner.name
                        );
                    }
                }
            }

            // terminal until the engine resets the whole session
            RacePhase::Finished => {}
        }
    }

    /// Speed model + integration for every active racer, recording finishes
    /// in list order (same-tick finishes deliberately resolve by original
    /// participant order)
    fn step_racers(&mut self, delta_ms: f32, rng: &mut impl Rng, events: &mut Vec<RaceEvent>) {
        let Some((min_active, max_active)) = self.active_spread() else {
            return;
        };

        for i in 0..self.racers.len() {
            let just_finished =
                Pacing::update(&mut self.racers[i], min_active, max_active, delta_ms, rng);
            if just_finished {
                self.record_finish(i, events);
            }
        }
    }

    /// Min and max progress over active racers, used for rubber-banding
    fn active_spread(&self) -> Option<(f32, f32)> {
        let mut spread: Option<(f32, f32)> = None;
        for racer in self.racers.iter().filter(|r| !r.finished) {
            spread = Some(match spread {
                None => (racer.progress, racer.progress),
                Some((min, max)) => (min.min(racer.progress), max.max(racer.progress)),
            });
        }
        spread
    }

    /// Append the next finish entry and freeze the racer's rank
    fn record_finish(&mut self, index: usize, events: &mut Vec<RaceEvent>) {
        let rank = self.finish_order.len() as u32 + 1;
        self.racers[index].current_rank = rank;

        let entry = FinishEntry {
            name: self.racers[index].name.clone(),
            color: self.racers[index].color.clone(),
            rank,
        };
        log::debug!("{} finished in position {}", entry.name, entry.rank);
        events.push(RaceEvent::RacerFinished(entry.clone()));
        self.finish_order.push(entry);
    }

    /// Recompute live ranks: finished racers keep their frozen rank, active
    /// racers sort by descending progress (stable, so ties keep list order)
    fn update_ranks(&mut self) {
        let finished_count = self.finish_order.len() as u32;

        let mut active: Vec<usize> = (0..self.racers.len())
            .filter(|&i| !self.racers[i].finished)
            .collect();
        active.sort_by(|&a, &b| {
            self.racers[b]
                .progress
                .partial_cmp(&self.racers[a].progress)
                .unwrap_or(Ordering::Equal)
        });

        for (position, &index) in active.iter().enumerate() {
            self.racers[index].current_rank = finished_count + position as u32 + 1;
        }
    }

    /// Track the racer with maximum progress over the whole field (a
    /// just-finished racer at 100 can hold the lead momentarily) and count
    /// identity changes. The initial assignment is not a lead change.
    fn update_leader(&mut self, events: &mut Vec<RaceEvent>) {
        let mut best: Option<&RacerState> = None;
        for racer in &self.racers {
            if best.map_or(true, |b| racer.progress > b.progress) {
                best = Some(racer);
            }
        }
        let Some(best) = best else {
            return;
        };

        match &self.leader {
            Some(prev) if *prev == best.name => {}
            Some(prev) => {
                log::debug!("lead change: {} -> {}", prev, best.name);
                self.leader = Some(best.name.clone());
                self.lead_change_count += 1;
                events.push(RaceEvent::LeadChange {
                    leader: best.name.clone(),
                    lead_change_count: self.lead_change_count,
                });
            }
            None => self.leader = Some(best.name.clone()),
        }
    }

    /// Photo finish: at least two active racers, the top one past the
    /// threshold, and the top-two gap inside the window. Recomputed fresh
    /// every tick, never sticky.
    fn compute_photo_finish(racers: &[RacerState]) -> bool {
        let mut active: Vec<f32> = racers
            .iter()
            .filter(|r| !r.finished)
            .map(|r| r.progress)
            .collect();
        if active.len() < 2 {
            return false;
        }
        active.sort_by(|a, b| b.partial_cmp(a).unwrap_or(Ordering::Equal));
        active[0] > PHOTO_FINISH_MIN_PROGRESS && active[0] - active[1] <= PHOTO_FINISH_MAX_GAP
    }

    /// Whether every racer has crossed the line
    pub fn is_finished(&self) -> bool {
        self.phase == RacePhase::Finished
    }

    /// Compact snapshot for the presentation layer
    pub fn get_snapshot(&self) -> RaceSnapshot {
        RaceSnapshot {
            phase: self.phase,
            countdown: self.countdown,
            elapsed_ms: self.elapsed_ms,
            racers: self.racers.iter().map(RacerSnapshot::from).collect(),
            leader: self.leader.clone(),
            lead_change_count: self.lead_change_count,
            photo_finish: self.photo_finish,
            finisher_count: self.finish_order.len() as u32,
        }
    }
}

/// Compact per-racer state for snapshot transfer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RacerSnapshot {
    pub name: String,
    pub color: String,
    pub progress: f32,
    pub rank: u32,
    pub speed: f32,
    pub finished: bool,
}

impl From<&RacerState> for RacerSnapshot {
    fn from(state: &RacerState) -> Self {
        Self {
            name: state.name.clone(),
            color: state.color.clone(),
            progress: state.progress,
            rank: state.current_rank,
            speed: state.current_speed,
            finished: state.finished,
        }
    }
}

/// Read-only view of the session handed out between ticks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceSnapshot {
    pub phase: RacePhase,
    pub countdown: u32,
    pub elapsed_ms: f64,
    pub racers: Vec<RacerSnapshot>,
    pub leader: Option<String>,
    pub lead_change_count: u32,
    pub photo_finish: bool,
    pub finisher_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn rng() -> Pcg32 {
        Pcg32::seed_from_u64(42)
    }

    fn session(names: &[&str]) -> RaceSession {
        RaceSession::new(names, &mut rng())
    }

    #[test]
    fn new_session_starts_in_countdown() {
        let session = session(&["A", "B", "C"]);
        assert_eq!(session.phase, RacePhase::Countdown);
        assert_eq!(session.countdown, COUNTDOWN_START);
        assert_eq!(session.lead_change_count, 0);
        assert!(session.leader.is_none());
        assert!(session.finish_order.is_empty());
        for (i, racer) in session.racers.iter().enumerate() {
            assert_eq!(racer.progress, 0.0);
            assert_eq!(racer.current_rank, i as u32 + 1);
            assert!(!racer.finished);
        }
    }

    #[test]
    fn countdown_decrements_once_per_interval() {
        let mut session = session(&["A", "B"]);
        let mut rng = rng();
        let mut events = Vec::new();

        for expected in [2, 1] {
            session.update(COUNTDOWN_INTERVAL_MS, &mut rng, &mut events);
            assert_eq!(session.countdown, expected);
            assert_eq!(session.phase, RacePhase::Countdown);
        }
        session.update(COUNTDOWN_INTERVAL_MS, &mut rng, &mut events);
        assert_eq!(session.countdown, 0);
        assert_eq!(session.phase, RacePhase::Racing);
    }

    #[test]
    fn countdown_accumulates_partial_intervals() {
        let mut session = session(&["A", "B"]);
        let mut rng = rng();
        let mut events = Vec::new();

        session.update(COUNTDOWN_INTERVAL_MS / 2.0, &mut rng, &mut events);
        assert_eq!(session.countdown, COUNTDOWN_START);
        session.update(COUNTDOWN_INTERVAL_MS / 2.0, &mut rng, &mut events);
        assert_eq!(session.countdown, COUNTDOWN_START - 1);
    }

    #[test]
    fn ranks_follow_progress_with_stable_ties() {
        let mut session = session(&["A", "B", "C", "D"]);
        session.racers[0].progress = 30.0;
        session.racers[1].progress = 70.0;
        session.racers[2].progress = 30.0;
        session.racers[3].progress = 55.0;
        session.update_ranks();

        assert_eq!(session.racers[1].current_rank, 1);
        assert_eq!(session.racers[3].current_rank, 2);
        // A and C tie at 30; A keeps list-order priority
        assert_eq!(session.racers[0].current_rank, 3);
        assert_eq!(session.racers[2].current_rank, 4);
    }

    #[test]
    fn finished_ranks_stay_frozen() {
        let mut session = session(&["A", "B", "C"]);
        let mut events = Vec::new();

        session.racers[2].progress = 100.0;
        session.racers[2].finished = true;
        session.record_finish(2, &mut events);
        assert_eq!(session.racers[2].current_rank, 1);

        // active racers rank after the finisher regardless of progress
        session.racers[0].progress = 90.0;
        session.racers[1].progress = 95.0;
        session.update_ranks();
        assert_eq!(session.racers[2].current_rank, 1);
        assert_eq!(session.racers[1].current_rank, 2);
        assert_eq!(session.racers[0].current_rank, 3);
    }

    #[test]
    fn leader_initial_assignment_is_not_a_change() {
        let mut session = session(&["A", "B"]);
        let mut events = Vec::new();
        session.racers[1].progress = 5.0;
        session.update_leader(&mut events);

        assert_eq!(session.leader.as_deref(), Some("B"));
        assert_eq!(session.lead_change_count, 0);
        assert!(events.is_empty());
    }

    #[test]
    fn lead_changes_count_identity_changes_only() {
        let mut session = session(&["A", "B"]);
        let mut events = Vec::new();

        session.racers[0].progress = 10.0;
        session.racers[1].progress = 5.0;
        session.update_leader(&mut events);
        session.update_leader(&mut events);
        assert_eq!(session.lead_change_count, 0);

        session.racers[1].progress = 15.0;
        session.update_leader(&mut events);
        assert_eq!(session.lead_change_count, 1);
        assert_eq!(
            events.last(),
            Some(&RaceEvent::LeadChange {
                leader: "B".to_owned(),
                lead_change_count: 1
            })
        );

        // same leader again: no further increment
        session.update_leader(&mut events);
        assert_eq!(session.lead_change_count, 1);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn photo_finish_requires_two_active_racers() {
        let mut session = session(&["A", "B"]);
        session.racers[0].progress = 100.0;
        session.racers[0].finished = true;
        session.racers[1].progress = 99.0;
        assert!(!RaceSession::compute_photo_finish(&session.racers));
    }

    #[test]
    fn photo_finish_requires_top_racer_past_threshold() {
        let mut session = session(&["A", "B"]);
        session.racers[0].progress = PHOTO_FINISH_MIN_PROGRESS - 1.0;
        session.racers[1].progress = PHOTO_FINISH_MIN_PROGRESS - 2.0;
        assert!(!RaceSession::compute_photo_finish(&session.racers));
    }

    #[test]
    fn photo_finish_requires_tight_gap() {
        let mut session = session(&["A", "B"]);
        session.racers[0].progress = 90.0;
        session.racers[1].progress = 90.0 - PHOTO_FINISH_MAX_GAP - 0.5;
        assert!(!RaceSession::compute_photo_finish(&session.racers));

        session.racers[1].progress = 90.0 - PHOTO_FINISH_MAX_GAP;
        assert!(RaceSession::compute_photo_finish(&session.racers));
    }

    #[test]
    fn photo_finish_ignores_finished_racers() {
        let mut session = session(&["A", "B", "C"]);
        session.racers[0].progress = 100.0;
        session.racers[0].finished = true;
        session.racers[1].progress = 80.0;
        session.racers[2].progress = 76.0;
        assert!(RaceSession::compute_photo_finish(&session.racers));
    }

    #[test]
    fn same_tick_finishes_resolve_by_list_order() {
        let mut session = session(&["A", "B"]);
        let mut rng = rng();
        let mut events = Vec::new();

        session.phase = RacePhase::Racing;
        for racer in &mut session.racers {
            racer.progress = 99.9;
            racer.current_speed = 5.0;
        }
        session.update(Pacing::MAX_FRAME_DELTA_MS as f64, &mut rng, &mut events);

        assert_eq!(session.phase, RacePhase::Finished);
        assert_eq!(session.finish_order.len(), 2);
        assert_eq!(session.finish_order[0].name, "A");
        assert_eq!(session.finish_order[0].rank, 1);
        assert_eq!(session.finish_order[1].name, "B");
        assert_eq!(session.finish_order[1].rank, 2);
    }

    #[test]
    fn race_finished_event_carries_full_rankings() {
        let mut session = session(&["A", "B"]);
        let mut rng = rng();
        let mut events = Vec::new();

        session.phase = RacePhase::Racing;
        for racer in &mut session.racers {
            racer.progress = 99.95;
            racer.current_speed = 5.0;
        }
        session.update(50.0, &mut rng, &mut events);

        let finished: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, RaceEvent::RacerFinished(_)))
            .collect();
        assert_eq!(finished.len(), 2);
        match events.last() {
            Some(RaceEvent::RaceFinished(rankings)) => {
                assert_eq!(rankings.len(), 2);
                assert_eq!(rankings[0].rank, 1);
                assert_eq!(rankings[1].rank, 2);
            }
            other => panic!("expected RaceFinished, got {other:?}"),
        }
    }

    #[test]
    fn finished_phase_is_terminal() {
        let mut session = session(&["A", "B"]);
        let mut rng = rng();
        let mut events = Vec::new();

        session.phase = RacePhase::Finished;
        let before = session.get_snapshot();
        session.update(50.0, &mut rng, &mut events);
        assert_eq!(session.phase, RacePhase::Finished);
        assert_eq!(session.elapsed_ms, before.elapsed_ms);
        assert!(events.is_empty());
    }

    #[test]
    fn snapshot_round_trips_through_json() {
        let mut session = session(&["A", "B", "C"]);
        session.racers[1].progress = 33.5;
        session.update_ranks();

        let json = serde_json::to_string(&session.get_snapshot()).unwrap();
        let back: RaceSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.racers.len(), 3);
        assert_eq!(back.phase, RacePhase::Countdown);
        assert_eq!(back.racers[1].progress, 33.5);
        assert_eq!(back.racers[1].rank, 1);
    }
}
