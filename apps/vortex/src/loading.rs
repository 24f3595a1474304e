use parking_lot::Mutex;
use rand::Rng;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::trace;
use url::Url;

use crate::events::{EventBus, ShellEvent};

pub const PROGRESS_TICK: Duration = Duration::from_millis(200);
pub const HIDE_DELAY: Duration = Duration::from_millis(500);
/// The last stretch is reserved for the frame's own completion signal.
pub const PROGRESS_CAP: f64 = 90.0;
const MAX_INCREMENT: f64 = 15.0;
const STEP_TWO_THRESHOLD: f64 = 30.0;
const STEP_THREE_THRESHOLD: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadingPhase {
    Idle,
    Step1,
    Step2,
    Step3Active,
    Step3Complete,
}

impl LoadingPhase {
    pub fn step_index(self) -> Option<u8> {
        match self {
            LoadingPhase::Idle => None,
            LoadingPhase::Step1 => Some(1),
            LoadingPhase::Step2 => Some(2),
            LoadingPhase::Step3Active | LoadingPhase::Step3Complete => Some(3),
        }
    }

    fn is_ticking(self) -> bool {
        matches!(
            self,
            LoadingPhase::Step1 | LoadingPhase::Step2 | LoadingPhase::Step3Active
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadingSnapshot {
    pub phase: LoadingPhase,
    pub progress_percent: u8,
    pub cycle: u64,
    pub live_timers: usize,
}

struct LoadingState {
    phase: LoadingPhase,
    progress: f64,
    cycle: u64,
    tick: Option<JoinHandle<()>>,
    hide: Option<JoinHandle<()>>,
}

impl LoadingState {
    fn teardown_timers(&mut self) {
        if let Some(tick) = self.tick.take() {
            tick.abort();
        }
        if let Some(hide) = self.hide.take() {
            hide.abort();
        }
    }

    fn live_timers(&self) -> usize {
        [self.tick.as_ref(), self.hide.as_ref()]
            .into_iter()
            .flatten()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    fn percent(&self) -> u8 {
        self.progress.round().clamp(0.0, 100.0) as u8
    }
}

/// Drives the progress bar and the three status steps while a navigation is
/// in flight.
///
/// Each cycle owns at most one progress tick task and one hide-delay task.
/// `start` tears the previous cycle's tasks down before spawning new ones and
/// both task kinds re-check the cycle number under the lock, so nothing from a
/// superseded cycle can touch the current one. Must be used inside a tokio
/// runtime.
pub struct LoadingAnimationController {
    state: Arc<Mutex<LoadingState>>,
    events: EventBus,
}

impl LoadingAnimationController {
    pub fn new(events: EventBus) -> Self {
        Self {
            state: Arc::new(Mutex::new(LoadingState {
                phase: LoadingPhase::Idle,
                progress: 0.0,
                cycle: 0,
                tick: None,
                hide: None,
            })),
            events,
        }
    }

    pub fn start(&self, target_for_display: &str) -> u64 {
        let mut state = self.state.lock();
        state.teardown_timers();
        state.cycle += 1;
        state.phase = LoadingPhase::Step1;
        state.progress = 0.0;
        let cycle = state.cycle;

        self.events.publish(ShellEvent::LoadingShown {
            subtitle: loading_subtitle(target_for_display),
        });
        self.events.publish(ShellEvent::LoadingStep {
            step: 1,
            completed: false,
        });
        self.events.publish(ShellEvent::LoadingProgress { percent: 0 });

        let weak = Arc::downgrade(&self.state);
        let events = self.events.clone();
        state.tick = Some(tokio::spawn(run_progress(weak, events, cycle)));
        trace!(target: "vortex::loading", cycle, "loading cycle started");
        cycle
    }

    /// Returns `false` when there was no active cycle to complete.
    pub fn complete(&self) -> bool {
        let mut state = self.state.lock();
        if !state.phase.is_ticking() {
            return false;
        }
        let step = state.phase.step_index().unwrap_or(1);
        if let Some(tick) = state.tick.take() {
            tick.abort();
        }
        state.progress = 100.0;
        state.phase = LoadingPhase::Step3Complete;
        let cycle = state.cycle;

        self.events.publish(ShellEvent::LoadingProgress { percent: 100 });
        if step < 3 {
            self.events.publish(ShellEvent::LoadingStep {
                step,
                completed: true,
            });
        }
        self.events.publish(ShellEvent::LoadingStep {
            step: 3,
            completed: true,
        });

        let weak = Arc::downgrade(&self.state);
        let events = self.events.clone();
        state.hide = Some(tokio::spawn(run_hide_delay(weak, events, cycle)));
        trace!(target: "vortex::loading", cycle, "loading cycle completed");
        true
    }

    /// Abandons the cycle without filling the bar and hides the overlay
    /// after [`HIDE_DELAY`]. Returns `false` when nothing was showing.
    pub fn fail(&self) -> bool {
        let mut state = self.state.lock();
        if state.phase == LoadingPhase::Idle {
            return false;
        }
        state.teardown_timers();
        state.phase = LoadingPhase::Idle;
        state.progress = 0.0;
        let cycle = state.cycle;

        let weak = Arc::downgrade(&self.state);
        let events = self.events.clone();
        state.hide = Some(tokio::spawn(run_hide_delay(weak, events, cycle)));
        trace!(target: "vortex::loading", cycle, "loading cycle failed");
        true
    }

    pub fn cancel(&self) {
        let mut state = self.state.lock();
        state.teardown_timers();
        if state.phase != LoadingPhase::Idle {
            trace!(target: "vortex::loading", cycle = state.cycle, "loading cycle canceled");
        }
        state.phase = LoadingPhase::Idle;
        state.progress = 0.0;
    }

    pub fn phase(&self) -> LoadingPhase {
        self.state.lock().phase
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().phase != LoadingPhase::Idle
    }

    pub fn live_timers(&self) -> usize {
        self.state.lock().live_timers()
    }

    pub fn snapshot(&self) -> LoadingSnapshot {
        let state = self.state.lock();
        LoadingSnapshot {
            phase: state.phase,
            progress_percent: state.percent(),
            cycle: state.cycle,
            live_timers: state.live_timers(),
        }
    }
}

impl Drop for LoadingAnimationController {
    fn drop(&mut self) {
        self.state.lock().teardown_timers();
    }
}

async fn run_progress(state: Weak<Mutex<LoadingState>>, events: EventBus, cycle: u64) {
    let mut interval = tokio::time::interval(PROGRESS_TICK);
    interval.tick().await;
    loop {
        interval.tick().await;
        let increment = rand::thread_rng().gen_range(0.0..MAX_INCREMENT);
        let keep_going = {
            let Some(state) = state.upgrade() else {
                break;
            };
            let mut state = state.lock();
            if state.cycle != cycle || !state.phase.is_ticking() {
                false
            } else {
                state.progress = (state.progress + increment).min(PROGRESS_CAP);
                events.publish(ShellEvent::LoadingProgress {
                    percent: state.percent(),
                });
                if state.progress > STEP_TWO_THRESHOLD && state.phase == LoadingPhase::Step1 {
                    state.phase = LoadingPhase::Step2;
                    advance_step(&events, 1, 2);
                } else if state.progress > STEP_THREE_THRESHOLD
                    && state.phase == LoadingPhase::Step2
                {
                    state.phase = LoadingPhase::Step3Active;
                    advance_step(&events, 2, 3);
                }
                true
            }
        };
        if !keep_going {
            break;
        }
    }
}

fn advance_step(events: &EventBus, from: u8, to: u8) {
    events.publish(ShellEvent::LoadingStep {
        step: from,
        completed: true,
    });
    events.publish(ShellEvent::LoadingStep {
        step: to,
        completed: false,
    });
}

async fn run_hide_delay(state: Weak<Mutex<LoadingState>>, events: EventBus, cycle: u64) {
    tokio::time::sleep(HIDE_DELAY).await;
    let Some(state) = state.upgrade() else {
        return;
    };
    let mut state = state.lock();
    if state.cycle != cycle {
        return;
    }
    state.phase = LoadingPhase::Idle;
    state.progress = 0.0;
    // Detaches this task's own handle.
    state.hide = None;
    events.publish(ShellEvent::LoadingHidden);
}

pub fn loading_subtitle(url: &str) -> String {
    if url.is_empty() {
        return "Connecting through Vortex proxy".to_string();
    }
    match Url::parse(url) {
        Ok(parsed) => match parsed.host_str() {
            Some(host) => format!("Loading {host}..."),
            None => format!("Loading {url}..."),
        },
        Err(_) => format!("Loading {url}..."),
    }
}
