//! Conversation orchestrator.
//!
//! [`Companion`] ties the conversation log, the memory engine and the
//! responder together and owns every timer:
//!
//! - the repeating memory tick, which stops itself once memory is dead
//! - the one-shot memory deadline, so memory dies on time even if a tick is late
//! - the one-shot reply delay started by each accepted submission
//! - the one-shot memory resume scheduled after a decayed reply
//!
//! Timer bodies hold a weak reference to the shared state, so dropping the
//! last [`Companion`] handle lets pending timers fall through harmlessly.

use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info};

use crate::clock::Clock;
use crate::conversation::{Conversation, DEFAULT_GREETING, SubmitOutcome};
use crate::events::{CompanionEvent, CompanionSnapshot};
use crate::memory::{
    DEFAULT_MEMORY_DURATION, DEFAULT_TICK_INTERVAL, MemoryEngine, MemoryReading, MemoryState,
};
use crate::responder::{
    DEFAULT_COMPLIMENT_PROBABILITY, DEFAULT_IDENTITY_CRISIS_PROBABILITY, RandomSource, Reply,
    Responder,
};
use crate::scheduler::{Scheduler, TaskHandle};

/// Capacity of the event broadcast channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Tunables for a [`Companion`].
#[derive(Debug, Clone, PartialEq)]
pub struct CompanionSettings {
    /// Opening companion message. Empty for none.
    pub greeting: String,
    /// Time for memory to drain from full to zero.
    pub memory_duration: Duration,
    /// Interval between memory strength updates.
    pub tick_interval: Duration,
    /// Shortest simulated typing delay.
    pub reply_delay_min: Duration,
    /// Longest simulated typing delay.
    pub reply_delay_max: Duration,
    /// Wait after a decayed reply before memory is restored.
    pub memory_resume_delay: Duration,
    pub identity_crisis_probability: f64,
    pub compliment_probability: f64,
}

impl Default for CompanionSettings {
    fn default() -> Self {
        Self {
            greeting: DEFAULT_GREETING.to_string(),
            memory_duration: DEFAULT_MEMORY_DURATION,
            tick_interval: DEFAULT_TICK_INTERVAL,
            reply_delay_min: Duration::from_millis(1500),
            reply_delay_max: Duration::from_millis(2500),
            memory_resume_delay: Duration::from_secs(1),
            identity_crisis_probability: DEFAULT_IDENTITY_CRISIS_PROBABILITY,
            compliment_probability: DEFAULT_COMPLIMENT_PROBABILITY,
        }
    }
}

#[derive(Debug, Default)]
struct Timers {
    decay_tick: Option<TaskHandle>,
    memory_deadline: Option<TaskHandle>,
    reply: Option<TaskHandle>,
    memory_resume: Option<TaskHandle>,
}

impl Timers {
    fn replace(slot: &mut Option<TaskHandle>, handle: TaskHandle) {
        if let Some(previous) = slot.replace(handle) {
            previous.cancel();
        }
    }

    fn cancel(slot: &mut Option<TaskHandle>) {
        if let Some(handle) = slot.take() {
            handle.cancel();
        }
    }

    fn cancel_all(&mut self) {
        Self::cancel(&mut self.decay_tick);
        Self::cancel(&mut self.memory_deadline);
        Self::cancel(&mut self.reply);
        Self::cancel(&mut self.memory_resume);
    }
}

struct State {
    conversation: Conversation,
    memory: MemoryEngine,
    rng: Box<dyn RandomSource>,
    timers: Timers,
}

struct Shared {
    settings: CompanionSettings,
    responder: Responder,
    clock: Arc<dyn Clock>,
    scheduler: Arc<dyn Scheduler>,
    events: broadcast::Sender<CompanionEvent>,
    stopped: watch::Sender<bool>,
    state: Mutex<State>,
}

/// Handle to a running companion. Cheap to clone.
#[derive(Clone)]
pub struct Companion {
    shared: Arc<Shared>,
}

impl fmt::Debug for Companion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("Companion")
            .field("phase", &state.conversation.phase())
            .field("messages", &state.conversation.messages().len())
            .field("memory", &state.memory.state())
            .finish_non_exhaustive()
    }
}

impl Companion {
    /// Create a companion and start its memory timers.
    pub fn start(
        settings: CompanionSettings,
        clock: Arc<dyn Clock>,
        scheduler: Arc<dyn Scheduler>,
        rng: Box<dyn RandomSource>,
    ) -> Self {
        let now = clock.now();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (stopped, _) = watch::channel(false);
        let responder = Responder::new(
            settings.identity_crisis_probability,
            settings.compliment_probability,
        );

        let state = State {
            conversation: Conversation::with_greeting(&settings.greeting, now),
            memory: MemoryEngine::new(settings.memory_duration, now),
            rng,
            timers: Timers::default(),
        };

        let companion = Self {
            shared: Arc::new(Shared {
                settings,
                responder,
                clock,
                scheduler,
                events,
                stopped,
                state: Mutex::new(state),
            }),
        };

        {
            let mut state = companion.shared.state.lock();
            start_memory_timers(&companion.shared, &mut state);
        }

        info!(
            name: "companion.started",
            memory_duration = ?companion.shared.settings.memory_duration,
            "Companion started"
        );

        companion
    }

    /// Settings this companion runs with.
    #[must_use]
    pub fn settings(&self) -> &CompanionSettings {
        &self.shared.settings
    }

    /// Subscribe to state change events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CompanionEvent> {
        self.shared.events.subscribe()
    }

    /// Subscribe and capture a snapshot under the same lock, so no event is
    /// missed or duplicated between the two.
    #[must_use]
    pub fn subscribe_with_snapshot(
        &self,
    ) -> (CompanionSnapshot, broadcast::Receiver<CompanionEvent>) {
        let state = self.shared.state.lock();
        let receiver = self.shared.events.subscribe();
        (snapshot_of(&state), receiver)
    }

    /// Current messages, typing flag and memory reading.
    #[must_use]
    pub fn snapshot(&self) -> CompanionSnapshot {
        snapshot_of(&self.shared.state.lock())
    }

    /// Current memory reading.
    #[must_use]
    pub fn memory(&self) -> MemoryReading {
        self.shared.state.lock().memory.reading()
    }

    /// Text currently in the input box.
    #[must_use]
    pub fn input(&self) -> String {
        self.shared.state.lock().conversation.input().to_string()
    }

    /// Replace the input box contents.
    pub fn set_input(&self, text: impl Into<String>) {
        self.shared.state.lock().conversation.set_input(text);
    }

    /// Submit `text` as the user's message.
    ///
    /// Empty or whitespace-only text, or any submission while a reply is
    /// pending, is ignored: no message is appended and no timer starts.
    pub fn submit(&self, text: impl Into<String>) -> SubmitOutcome {
        let shared = &self.shared;
        let mut state = shared.state.lock();
        state.conversation.set_input(text);

        let now = shared.clock.now();
        let outcome = state.conversation.submit(now);
        let message = match &outcome {
            SubmitOutcome::Accepted(message) => message.clone(),
            SubmitOutcome::Ignored(reason) => {
                debug!(name: "companion.submit.ignored", reason = ?reason, "Submission ignored");
                return outcome;
            }
        };

        let delay = reply_delay(&shared.settings, state.rng.as_mut());
        let weak = Arc::downgrade(shared);
        let handle = shared.scheduler.schedule_once(
            delay,
            Box::new(move || {
                if let Some(shared) = weak.upgrade() {
                    deliver_reply(&shared);
                }
            }),
        );
        Timers::replace(&mut state.timers.reply, handle);

        info!(
            name: "companion.submit.accepted",
            message_id = %message.id,
            reply_delay = ?delay,
            "User message accepted"
        );

        shared.emit(CompanionEvent::MessageAppended {
            message,
            reply_kind: None,
        });
        shared.emit(CompanionEvent::Typing { active: true });
        outcome
    }

    /// Restore memory to full strength and restart its timers.
    pub fn reset_memory(&self) {
        let mut state = self.shared.state.lock();
        reset_memory(&self.shared, &mut state);
    }

    /// Cancel every timer and wake [`stopped`](Self::stopped) waiters. The
    /// conversation stays readable.
    pub fn shutdown(&self) {
        self.shared.state.lock().timers.cancel_all();
        self.shared.stopped.send_replace(true);
        info!(name: "companion.shutdown", "Companion timers cancelled");
    }

    /// Resolves once [`shutdown`](Self::shutdown) has been called.
    pub async fn stopped(&self) {
        let mut stopped = self.shared.stopped.subscribe();
        // The sender lives in `self`, so this only returns once the flag is set.
        let _ = stopped.wait_for(|stopped| *stopped).await;
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        *self.shared.stopped.borrow()
    }
}

impl Shared {
    fn emit(&self, event: CompanionEvent) {
        // No subscribers is fine; the rendering surface may not be attached.
        let _ = self.events.send(event);
    }
}

fn snapshot_of(state: &State) -> CompanionSnapshot {
    CompanionSnapshot {
        messages: state.conversation.messages().to_vec(),
        typing: state.conversation.is_typing(),
        memory: state.memory.reading(),
    }
}

fn reply_delay(settings: &CompanionSettings, rng: &mut dyn RandomSource) -> Duration {
    let min = settings.reply_delay_min;
    let max = settings.reply_delay_max.max(min);
    min + (max - min).mul_f64(rng.next_unit())
}

/// Start the decay tick and the deadline for the current memory epoch.
fn start_memory_timers(shared: &Arc<Shared>, state: &mut State) {
    let weak = Arc::downgrade(shared);
    let tick = shared.scheduler.schedule_repeating(
        shared.settings.tick_interval,
        Box::new(move || match weak.upgrade() {
            Some(shared) => tick_memory(&shared),
            None => ControlFlow::Break(()),
        }),
    );
    Timers::replace(&mut state.timers.decay_tick, tick);

    let remaining = (state.memory.deadline() - shared.clock.now())
        .to_std()
        .unwrap_or(Duration::ZERO);
    let weak = Arc::downgrade(shared);
    let deadline = shared.scheduler.schedule_once(
        remaining,
        Box::new(move || {
            if let Some(shared) = weak.upgrade() {
                expire_memory(&shared);
            }
        }),
    );
    Timers::replace(&mut state.timers.memory_deadline, deadline);
}

fn tick_memory(shared: &Shared) -> ControlFlow<()> {
    let mut state = shared.state.lock();
    if !state.memory.is_alive() {
        return ControlFlow::Break(());
    }

    let memory = state.memory.tick(shared.clock.now());
    if memory.alive {
        shared.emit(CompanionEvent::MemoryTick(memory.into()));
        ControlFlow::Continue(())
    } else {
        memory_expired(shared, &mut state, memory, "tick");
        ControlFlow::Break(())
    }
}

fn expire_memory(shared: &Shared) {
    let mut state = shared.state.lock();
    if !state.memory.is_alive() {
        return;
    }

    let memory = state.memory.expire();
    memory_expired(shared, &mut state, memory, "deadline");
}

/// Memory just died: stop its timers and tell subscribers.
fn memory_expired(shared: &Shared, state: &mut State, memory: MemoryState, source: &'static str) {
    Timers::cancel(&mut state.timers.decay_tick);
    Timers::cancel(&mut state.timers.memory_deadline);
    info!(name: "companion.memory.expired", source, "Memory faded");
    shared.emit(CompanionEvent::MemoryTick(memory.into()));
    shared.emit(CompanionEvent::MemoryExpired);
}

fn reset_memory(shared: &Arc<Shared>, state: &mut State) {
    Timers::cancel(&mut state.timers.decay_tick);
    Timers::cancel(&mut state.timers.memory_deadline);
    Timers::cancel(&mut state.timers.memory_resume);

    let memory = state.memory.reset(shared.clock.now());
    start_memory_timers(shared, state);

    info!(name: "companion.memory.reset", "Memory restored");
    shared.emit(CompanionEvent::MemoryReset(memory.into()));
}

fn deliver_reply(shared: &Arc<Shared>) {
    let mut state = shared.state.lock();
    let state = &mut *state;
    state.timers.reply = None;

    let now = shared.clock.now();
    let was_alive = state.memory.is_alive();
    let memory = state.memory.tick(now);
    let alive = memory.alive;
    if was_alive && !alive {
        memory_expired(shared, state, memory, "reply");
    }
    let user_text = state
        .conversation
        .last_user_text()
        .unwrap_or_default()
        .to_string();

    let Reply { kind, text } = shared
        .responder
        .respond(&user_text, alive, state.rng.as_mut());
    let message = state.conversation.complete_reply(text, now);

    info!(
        name: "companion.reply.delivered",
        message_id = %message.id,
        kind = ?kind,
        memory_alive = alive,
        "Companion replied"
    );

    shared.emit(CompanionEvent::MessageAppended {
        message,
        reply_kind: Some(kind),
    });
    shared.emit(CompanionEvent::Typing { active: false });

    if !alive {
        let weak = Arc::downgrade(shared);
        let handle = shared.scheduler.schedule_once(
            shared.settings.memory_resume_delay,
            Box::new(move || {
                if let Some(shared) = weak.upgrade() {
                    let mut state = shared.state.lock();
                    state.timers.memory_resume = None;
                    reset_memory(&shared, &mut state);
                }
            }),
        );
        Timers::replace(&mut state.timers.memory_resume, handle);
        debug!(
            name: "companion.memory.resume_scheduled",
            delay = ?shared.settings.memory_resume_delay,
            "Memory resume scheduled"
        );
    }
}
