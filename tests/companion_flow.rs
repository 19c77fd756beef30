//! End-to-end companion scenarios on virtual time.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use dotdotdot::clock::{Clock, ManualClock};
use dotdotdot::companion::{Companion, CompanionSettings};
use dotdotdot::conversation::{IgnoreReason, Originator, SubmitOutcome};
use dotdotdot::events::CompanionEvent;
use dotdotdot::memory::MemoryTier;
use dotdotdot::responder::pools::{self, ANXIETY};
use dotdotdot::responder::{Mood, RandomSource, ReplyKind, RngSource};
use dotdotdot::scheduler::{Scheduler, VirtualScheduler};
use tokio::sync::broadcast::Receiver;

/// Replays fixed samples, then repeats the last one.
struct Scripted {
    samples: VecDeque<f64>,
    last: f64,
}

impl Scripted {
    fn new(samples: &[f64]) -> Self {
        Self {
            samples: samples.iter().copied().collect(),
            last: samples.last().copied().unwrap_or(0.0),
        }
    }
}

impl RandomSource for Scripted {
    fn next_unit(&mut self) -> f64 {
        self.samples.pop_front().unwrap_or(self.last)
    }
}

fn start(rng: Box<dyn RandomSource>) -> (Companion, Arc<VirtualScheduler>) {
    start_with(CompanionSettings::default(), rng)
}

fn start_with(
    settings: CompanionSettings,
    rng: Box<dyn RandomSource>,
) -> (Companion, Arc<VirtualScheduler>) {
    let clock = Arc::new(ManualClock::default());
    let scheduler = Arc::new(VirtualScheduler::new(clock));
    let companion = Companion::start(
        settings,
        scheduler.clock(),
        Arc::clone(&scheduler) as Arc<dyn Scheduler>,
        rng,
    );
    (companion, scheduler)
}

fn drain(receiver: &mut Receiver<CompanionEvent>) -> Vec<CompanionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}

#[test]
fn test_fresh_companion_greets_with_full_memory() {
    let (companion, _scheduler) = start(Box::new(RngSource::seeded(1)));
    let snapshot = companion.snapshot();

    assert_eq!(snapshot.messages.len(), 1);
    assert_eq!(snapshot.messages[0].originator, Originator::Companion);
    assert!(!snapshot.typing);
    assert!(snapshot.memory.alive);
    assert_eq!(snapshot.memory.tier, MemoryTier::Nominal);
    assert!((snapshot.memory.strength_percent - 100.0).abs() < f64::EPSILON);
}

#[test]
fn test_memory_drains_through_tiers() {
    let (companion, scheduler) = start(Box::new(RngSource::seeded(2)));

    scheduler.advance(Duration::from_secs(3));
    let memory = companion.memory();
    assert!((memory.strength_percent - 75.0).abs() < 1e-9);
    assert_eq!(memory.tier, MemoryTier::Nominal);

    scheduler.advance(Duration::from_secs(4));
    let memory = companion.memory();
    assert_eq!(memory.tier, MemoryTier::Warning);
    assert!(!memory.pulsing);

    scheduler.advance(Duration::from_millis(3950));
    let memory = companion.memory();
    assert_eq!(memory.tier, MemoryTier::Critical);
    assert!(memory.pulsing);
    assert!(memory.alive);
}

#[test]
fn test_deadline_expires_memory_between_ticks() {
    // Ticks land at 5 s and 10 s, never on the 12 s deadline
    let settings = CompanionSettings {
        tick_interval: Duration::from_secs(5),
        ..CompanionSettings::default()
    };
    let (companion, scheduler) = start_with(settings, Box::new(RngSource::seeded(7)));
    let mut events = companion.subscribe();

    scheduler.advance(Duration::from_millis(11_999));
    assert!(companion.memory().alive);

    scheduler.advance(Duration::from_millis(1));
    let memory = companion.memory();
    assert!(!memory.alive);
    assert!(memory.strength_percent.abs() < f64::EPSILON);
    assert_eq!(scheduler.pending(), 0);

    let events = drain(&mut events);
    assert!(events.iter().any(|e| matches!(
        e,
        CompanionEvent::MemoryTick(reading)
            if !reading.alive && reading.strength_percent.abs() < f64::EPSILON
    )));
    assert_eq!(events.last(), Some(&CompanionEvent::MemoryExpired));
}

#[test]
fn test_reply_that_outlives_memory_expires_it() {
    let settings = CompanionSettings {
        tick_interval: Duration::from_secs(5),
        reply_delay_min: Duration::from_secs(12),
        reply_delay_max: Duration::from_secs(12),
        ..CompanionSettings::default()
    };
    let (companion, scheduler) = start_with(settings, Box::new(RngSource::seeded(8)));

    // The reply is queued before the fresh deadline, both due at 12 s
    assert!(companion.submit("remember me?").is_accepted());
    companion.reset_memory();
    let mut events = companion.subscribe();

    scheduler.advance(Duration::from_secs(12));
    assert!(!companion.memory().alive);

    let events = drain(&mut events);
    let expired = events
        .iter()
        .position(|e| *e == CompanionEvent::MemoryExpired)
        .expect("memory expiry should be broadcast");
    let reply = events
        .iter()
        .position(|e| {
            matches!(
                e,
                CompanionEvent::MessageAppended {
                    reply_kind: Some(ReplyKind::Decayed),
                    ..
                }
            )
        })
        .expect("reply should be decayed");
    assert!(expired < reply);

    // Only the memory resume is left; tick and deadline were cancelled
    assert_eq!(scheduler.pending(), 1);
}

#[test]
fn test_forgotten_companion_restarts_then_remembers() {
    let (companion, scheduler) = start(Box::new(RngSource::seeded(3)));

    scheduler.advance(Duration::from_secs(13));
    let memory = companion.memory();
    assert!(!memory.alive);
    assert!(memory.strength_percent.abs() < f64::EPSILON);
    // Tick and deadline are both gone once memory is dead
    assert_eq!(scheduler.pending(), 0);

    let mut events = companion.subscribe();
    assert!(companion.submit("hello?").is_accepted());
    assert!(companion.snapshot().typing);

    scheduler.advance(Duration::from_millis(2500));
    let snapshot = companion.snapshot();
    assert!(!snapshot.typing);
    let reply = snapshot.messages.last().unwrap();
    assert_eq!(reply.originator, Originator::Companion);
    assert!(pools::decayed_lines().any(|line| line == reply.text));

    let delivered = drain(&mut events);
    assert!(delivered.iter().any(|e| matches!(
        e,
        CompanionEvent::MessageAppended {
            reply_kind: Some(ReplyKind::Decayed),
            ..
        }
    )));

    // Memory comes back one second after the decayed reply
    let resume_at = reply.created_at + chrono::TimeDelta::seconds(1);
    let remaining = (resume_at - scheduler.clock().now())
        .to_std()
        .unwrap_or(Duration::ZERO);
    scheduler.advance(remaining);

    let memory = companion.memory();
    assert!(memory.alive);
    assert!((memory.strength_percent - 100.0).abs() < f64::EPSILON);
    assert!(
        drain(&mut events)
            .iter()
            .any(|e| matches!(e, CompanionEvent::MemoryReset(_)))
    );

    // And it starts draining again
    assert_eq!(scheduler.pending(), 2);
    scheduler.advance(Duration::from_secs(6));
    assert!((companion.memory().strength_percent - 50.0).abs() < 1e-9);
}

#[test]
fn test_blank_submission_is_ignored() {
    let (companion, scheduler) = start(Box::new(RngSource::seeded(4)));
    let mut events = companion.subscribe();

    for text in ["", "   ", "\n\t"] {
        assert_eq!(
            companion.submit(text),
            SubmitOutcome::Ignored(IgnoreReason::Empty)
        );
    }

    assert_eq!(companion.snapshot().messages.len(), 1);
    assert!(!companion.snapshot().typing);
    assert_eq!(scheduler.pending(), 2);
    assert!(drain(&mut events).is_empty());
}

#[test]
fn test_submission_while_typing_is_ignored() {
    let (companion, scheduler) = start(Box::new(RngSource::seeded(5)));

    assert!(companion.submit("first").is_accepted());
    assert_eq!(
        companion.submit("second"),
        SubmitOutcome::Ignored(IgnoreReason::ReplyPending)
    );
    assert_eq!(scheduler.pending(), 3);

    scheduler.advance(Duration::from_millis(2500));
    let messages = companion.snapshot().messages;
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1].text, "first");
    assert_eq!(messages[2].originator, Originator::Companion);

    // Accepted again once the reply landed
    assert!(companion.submit("third").is_accepted());
}

#[test]
fn test_anxious_message_gets_anxiety_reply() {
    // Reply delay, no identity crisis, no compliment, first line
    let rng = Scripted::new(&[0.5, 0.9, 0.9, 0.0]);
    let (companion, scheduler) = start(Box::new(rng));
    let mut events = companion.subscribe();

    assert!(companion.submit("I feel anxious today").is_accepted());
    scheduler.advance(Duration::from_millis(2500));

    let messages = companion.snapshot().messages;
    assert_eq!(messages.last().unwrap().text, ANXIETY[0]);

    let kinds: Vec<_> = drain(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            CompanionEvent::MessageAppended { reply_kind, .. } => Some(reply_kind),
            _ => None,
        })
        .collect();
    assert_eq!(kinds, vec![None, Some(ReplyKind::Mood(Mood::Anxiety))]);
}

#[test]
fn test_user_text_keeps_whitespace() {
    let (companion, scheduler) = start(Box::new(RngSource::seeded(6)));

    assert!(companion.submit("  spaced out  ").is_accepted());
    assert_eq!(companion.input(), "");
    assert_eq!(companion.snapshot().messages[1].text, "  spaced out  ");

    scheduler.advance(Duration::from_secs(3));
    assert_eq!(companion.snapshot().messages.len(), 3);
}
