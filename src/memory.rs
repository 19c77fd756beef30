//! Memory decay engine.
//!
//! The companion's memory starts at full strength on every reset and drains
//! linearly to zero over a fixed duration. Strength only ever goes down
//! between resets; once it reaches zero the memory is dead until the next
//! explicit [`MemoryEngine::reset`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::add_duration;

/// Default time for a full memory to drain completely.
pub const DEFAULT_MEMORY_DURATION: Duration = Duration::from_secs(12);

/// Default interval between strength recomputations.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Full strength, in percent.
pub const FULL_STRENGTH: f64 = 100.0;

/// Stored memory state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemoryState {
    /// Instant of the last reset.
    pub reset_at: DateTime<Utc>,
    /// Remaining strength in `[0, 100]`.
    pub strength_percent: f64,
    /// False once strength has reached zero.
    pub alive: bool,
}

impl MemoryState {
    fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            reset_at: now,
            strength_percent: FULL_STRENGTH,
            alive: true,
        }
    }
}

/// Display tier for the memory indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryTier {
    /// Above 50%.
    Nominal,
    /// Above 20%, up to 50%.
    Warning,
    /// 20% and below.
    Critical,
}

impl MemoryTier {
    /// Tier for a strength percentage.
    #[must_use]
    pub fn for_strength(strength_percent: f64) -> Self {
        if strength_percent > 50.0 {
            Self::Nominal
        } else if strength_percent > 20.0 {
            Self::Warning
        } else {
            Self::Critical
        }
    }
}

/// What the rendering surface needs to draw the memory indicator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemoryReading {
    pub strength_percent: f64,
    pub alive: bool,
    pub tier: MemoryTier,
    /// Strength is below 10% and the indicator should pulse.
    pub pulsing: bool,
}

impl From<MemoryState> for MemoryReading {
    fn from(state: MemoryState) -> Self {
        Self {
            strength_percent: state.strength_percent,
            alive: state.alive,
            tier: MemoryTier::for_strength(state.strength_percent),
            pulsing: state.strength_percent < 10.0,
        }
    }
}

/// Time-driven memory strength.
#[derive(Debug, Clone)]
pub struct MemoryEngine {
    duration: Duration,
    state: MemoryState,
}

impl MemoryEngine {
    /// Create an engine reset at `now`.
    #[must_use]
    pub fn new(duration: Duration, now: DateTime<Utc>) -> Self {
        Self {
            duration,
            state: MemoryState::fresh(now),
        }
    }

    /// Decay duration.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Current stored state.
    #[must_use]
    pub fn state(&self) -> MemoryState {
        self.state
    }

    /// Current stored state as a display reading.
    #[must_use]
    pub fn reading(&self) -> MemoryReading {
        self.state.into()
    }

    /// Whether the stored state is still alive.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.state.alive
    }

    /// Instant at which memory is dead regardless of ticking.
    #[must_use]
    pub fn deadline(&self) -> DateTime<Utc> {
        add_duration(self.state.reset_at, self.duration)
    }

    /// `max(0, 100 - 100 * elapsed / duration)`. Instants before the reset
    /// read as full strength.
    #[must_use]
    pub fn strength_at(&self, now: DateTime<Utc>) -> f64 {
        let elapsed_ms = (now - self.state.reset_at).num_milliseconds().max(0);
        let duration_ms = self.duration.as_millis();
        if duration_ms == 0 {
            return 0.0;
        }

        #[allow(clippy::cast_precision_loss)]
        let fraction = elapsed_ms as f64 / duration_ms as f64;
        (FULL_STRENGTH - FULL_STRENGTH * fraction).clamp(0.0, FULL_STRENGTH)
    }

    /// Whether memory would still be alive at `now`.
    #[must_use]
    pub fn alive_at(&self, now: DateTime<Utc>) -> bool {
        self.strength_at(now) > 0.0
    }

    /// Recompute the stored state for `now`.
    ///
    /// Strength never rises between resets, so a tick observed out of order
    /// cannot revive a dead memory.
    pub fn tick(&mut self, now: DateTime<Utc>) -> MemoryState {
        if !self.state.alive {
            return self.state;
        }

        let strength = self.strength_at(now).min(self.state.strength_percent);
        if strength <= 0.0 {
            self.expire();
        } else {
            self.state.strength_percent = strength;
        }
        self.state
    }

    /// Force the memory dead. Used by the deadline timer.
    pub fn expire(&mut self) -> MemoryState {
        self.state.strength_percent = 0.0;
        self.state.alive = false;
        self.state
    }

    /// Restore full strength as of `now`.
    pub fn reset(&mut self, now: DateTime<Utc>) -> MemoryState {
        self.state = MemoryState::fresh(now);
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn engine() -> (MemoryEngine, DateTime<Utc>) {
        let start = DateTime::<Utc>::UNIX_EPOCH;
        (MemoryEngine::new(DEFAULT_MEMORY_DURATION, start), start)
    }

    fn at(start: DateTime<Utc>, ms: i64) -> DateTime<Utc> {
        start + TimeDelta::milliseconds(ms)
    }

    #[test]
    fn test_strength_is_linear() {
        let (engine, start) = engine();

        assert!((engine.strength_at(start) - 100.0).abs() < f64::EPSILON);
        assert!((engine.strength_at(at(start, 3_000)) - 75.0).abs() < 1e-9);
        assert!((engine.strength_at(at(start, 6_000)) - 50.0).abs() < 1e-9);
        assert!(engine.strength_at(at(start, 12_000)).abs() < f64::EPSILON);
    }

    #[test]
    fn test_strength_bounded_and_non_increasing() {
        let (engine, start) = engine();
        let mut previous = engine.strength_at(start);

        for ms in (0..20_000).step_by(37) {
            let strength = engine.strength_at(at(start, ms));
            assert!((0.0..=100.0).contains(&strength));
            assert!(strength <= previous);
            previous = strength;
        }
    }

    #[test]
    fn test_strength_before_reset_is_full() {
        let (engine, start) = engine();
        assert!((engine.strength_at(at(start, -500)) - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_alive_boundaries() {
        let (engine, start) = engine();

        assert!(engine.alive_at(start));
        assert!(engine.alive_at(at(start, 11_999)));
        assert!(!engine.alive_at(at(start, 12_000)));
        assert!(!engine.alive_at(at(start, 60_000)));
    }

    #[test]
    fn test_tick_kills_memory_at_deadline() {
        let (mut engine, start) = engine();

        let state = engine.tick(at(start, 6_000));
        assert!(state.alive);
        assert!((state.strength_percent - 50.0).abs() < 1e-9);

        let state = engine.tick(at(start, 12_050));
        assert!(!state.alive);
        assert!(state.strength_percent.abs() < f64::EPSILON);
    }

    #[test]
    fn test_tick_never_raises_strength() {
        let (mut engine, start) = engine();

        engine.tick(at(start, 9_000));
        let state = engine.tick(at(start, 3_000));
        assert!((state.strength_percent - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_expire_is_permanent_until_reset() {
        let (mut engine, start) = engine();

        engine.expire();
        let state = engine.tick(at(start, 100));
        assert!(!state.alive);
        assert!(state.strength_percent.abs() < f64::EPSILON);
    }

    #[test]
    fn test_reset_restores_full_strength() {
        let (mut engine, start) = engine();
        engine.tick(at(start, 13_000));
        assert!(!engine.is_alive());

        let now = at(start, 14_000);
        let state = engine.reset(now);
        assert!(state.alive);
        assert!((state.strength_percent - 100.0).abs() < f64::EPSILON);
        assert_eq!(state.reset_at, now);
        assert_eq!(engine.deadline(), at(start, 26_000));
    }

    #[test]
    fn test_zero_duration_is_always_dead() {
        let start = DateTime::<Utc>::UNIX_EPOCH;
        let engine = MemoryEngine::new(Duration::ZERO, start);
        assert!(!engine.alive_at(start));
    }

    #[test]
    fn test_tiers() {
        assert_eq!(MemoryTier::for_strength(100.0), MemoryTier::Nominal);
        assert_eq!(MemoryTier::for_strength(50.1), MemoryTier::Nominal);
        assert_eq!(MemoryTier::for_strength(50.0), MemoryTier::Warning);
        assert_eq!(MemoryTier::for_strength(20.5), MemoryTier::Warning);
        assert_eq!(MemoryTier::for_strength(20.0), MemoryTier::Critical);
        assert_eq!(MemoryTier::for_strength(0.0), MemoryTier::Critical);
    }

    #[test]
    fn test_reading_pulses_when_nearly_gone() {
        let (mut engine, start) = engine();
        engine.tick(at(start, 11_000));

        let reading = engine.reading();
        assert!(reading.pulsing);
        assert_eq!(reading.tier, MemoryTier::Critical);
        assert!(reading.alive);
    }
}
