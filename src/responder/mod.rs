//! Reply selection.
//!
//! The companion has no understanding of what it is told. It picks a canned
//! line, steered by two random interruptions, a handful of mood keywords and
//! whether its memory is still alive.
//!
//! # Example
//!
//! ```rust
//! use dotdotdot::responder::{Mood, ReplyKind, Responder, RngSource};
//!
//! let responder = Responder::new(0.0, 0.0);
//! let mut rng = RngSource::seeded(7);
//! let reply = responder.respond("I feel so tired", true, &mut rng);
//! assert_eq!(reply.kind, ReplyKind::Mood(Mood::Fatigue));
//! ```

pub mod pools;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Default chance that an alive reply is an identity-crisis line.
pub const DEFAULT_IDENTITY_CRISIS_PROBABILITY: f64 = 0.15;

/// Default chance that an alive reply, not already an identity crisis, is a
/// compliment.
pub const DEFAULT_COMPLIMENT_PROBABILITY: f64 = 0.20;

/// Source of uniform randomness for reply selection and reply delays.
pub trait RandomSource: Send {
    /// Uniform sample in `[0, 1)`.
    fn next_unit(&mut self) -> f64;

    /// Uniform index in `[0, len)`. `len` must be non-zero.
    fn pick_index(&mut self, len: usize) -> usize {
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let index = (self.next_unit() * len as f64) as usize;
        index.min(len.saturating_sub(1))
    }
}

/// [`RandomSource`] over any `rand` generator.
#[derive(Debug, Clone)]
pub struct RngSource<R>(R);

impl<R: Rng> RngSource<R> {
    /// Wrap an existing generator.
    pub fn new(rng: R) -> Self {
        Self(rng)
    }
}

impl RngSource<StdRng> {
    /// Deterministic generator for reproducible runs.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }

    /// Generator seeded from the operating system.
    #[must_use]
    pub fn from_os() -> Self {
        Self(StdRng::from_os_rng())
    }
}

impl<R: Rng + Send> RandomSource for RngSource<R> {
    fn next_unit(&mut self) -> f64 {
        self.0.random::<f64>()
    }

    fn pick_index(&mut self, len: usize) -> usize {
        self.0.random_range(0..len)
    }
}

/// Emotional keyword family detected in user input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    Sadness,
    Anxiety,
    Fatigue,
}

impl Mood {
    /// Detection order. The first family with a matching keyword wins.
    pub const ALL: [Mood; 3] = [Mood::Sadness, Mood::Anxiety, Mood::Fatigue];

    /// Substrings that signal this mood.
    #[must_use]
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            Mood::Sadness => &["sad", "depressed", "down"],
            Mood::Anxiety => &["anxious", "worry", "scared"],
            Mood::Fatigue => &["tired", "exhausted", "overwhelmed"],
        }
    }

    /// Lines offered for this mood.
    #[must_use]
    pub fn lines(self) -> &'static [&'static str] {
        match self {
            Mood::Sadness => &pools::SADNESS,
            Mood::Anxiety => &pools::ANXIETY,
            Mood::Fatigue => &pools::FATIGUE,
        }
    }

    /// Detect a mood by case-insensitive substring match.
    ///
    /// Matching is on raw substrings, so "download" counts as sadness.
    #[must_use]
    pub fn detect(text: &str) -> Option<Mood> {
        let lowered = text.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|mood| mood.keywords().iter().any(|kw| lowered.contains(kw)))
    }
}

/// Which rule produced a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "rule", content = "mood")]
pub enum ReplyKind {
    /// Memory was dead; drawn from the decayed union.
    Decayed,
    IdentityCrisis,
    Compliment,
    Mood(Mood),
    Supportive,
}

/// A selected reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reply {
    pub kind: ReplyKind,
    pub text: &'static str,
}

/// Reply selection policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Responder {
    identity_crisis_probability: f64,
    compliment_probability: f64,
}

impl Default for Responder {
    fn default() -> Self {
        Self::new(
            DEFAULT_IDENTITY_CRISIS_PROBABILITY,
            DEFAULT_COMPLIMENT_PROBABILITY,
        )
    }
}

impl Responder {
    /// Create a responder with the given interruption probabilities.
    #[must_use]
    pub fn new(identity_crisis_probability: f64, compliment_probability: f64) -> Self {
        Self {
            identity_crisis_probability,
            compliment_probability,
        }
    }

    /// Pick a reply to `user_text`.
    ///
    /// Callers reject empty input before getting here.
    pub fn respond(
        &self,
        user_text: &str,
        memory_alive: bool,
        rng: &mut dyn RandomSource,
    ) -> Reply {
        if !memory_alive {
            let index = rng.pick_index(pools::DECAYED_LEN);
            let text = pools::decayed_line(index).unwrap_or(pools::CONFUSED_RESTARTS[0]);
            return Reply {
                kind: ReplyKind::Decayed,
                text,
            };
        }

        if rng.next_unit() < self.identity_crisis_probability {
            return pick(ReplyKind::IdentityCrisis, &pools::IDENTITY_CRISIS, rng);
        }

        if rng.next_unit() < self.compliment_probability {
            return pick(ReplyKind::Compliment, &pools::COMPLIMENTS, rng);
        }

        if let Some(mood) = Mood::detect(user_text) {
            return pick(ReplyKind::Mood(mood), mood.lines(), rng);
        }

        pick(ReplyKind::Supportive, &pools::SUPPORTIVE, rng)
    }
}

fn pick(kind: ReplyKind, lines: &[&'static str], rng: &mut dyn RandomSource) -> Reply {
    Reply {
        kind,
        text: lines[rng.pick_index(lines.len())],
    }
}
