pub mod capability;
pub mod monitor;

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

use crate::events::{EventBus, ShellEvent};
use capability::{CapabilityTable, HostCall, HostHandler, HostOperation};
use monitor::{MonitorDenylist, ScriptNode, ScriptVerdict};

pub const CLOSE_PROMPT: &str = "You have unsaved work. Are you sure you want to close this tab?";
pub const NAVIGATE_PROMPT: &str =
    "You have unsaved work. Are you sure you want to navigate away from this page?";
pub const RELOAD_PROMPT: &str = "You have unsaved work. Are you sure you want to reload this page?";
pub const UNLOAD_PROMPT: &str =
    "You have unsaved changes. Are you sure you want to leave this page?";

pub fn confirmation_message(operation: HostOperation) -> &'static str {
    match operation {
        HostOperation::Close => CLOSE_PROMPT,
        HostOperation::Assign | HostOperation::Replace => NAVIGATE_PROMPT,
        HostOperation::Reload => RELOAD_PROMPT,
    }
}

/// Asks the user to confirm a guarded operation.
pub trait ConfirmPrompt: Send + Sync {
    fn confirm(&self, message: &str) -> bool;
}

/// Prompt that answers from a queue, falling back to a fixed answer, and
/// remembers every message it was shown.
#[derive(Debug)]
pub struct ScriptedPrompt {
    fallback: bool,
    answers: Mutex<VecDeque<bool>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompt {
    pub fn always(answer: bool) -> Self {
        Self {
            fallback: answer,
            answers: Mutex::new(VecDeque::new()),
            asked: Mutex::new(Vec::new()),
        }
    }

    pub fn push_answer(&self, answer: bool) {
        self.answers.lock().push_back(answer);
    }

    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().clone()
    }
}

impl ConfirmPrompt for ScriptedPrompt {
    fn confirm(&self, message: &str) -> bool {
        self.asked.lock().push(message.to_string());
        self.answers.lock().pop_front().unwrap_or(self.fallback)
    }
}

#[derive(Default)]
struct GuardState {
    /// Pre-guard occupant of each guarded slot. Non-empty iff active.
    saved: HashMap<HostOperation, Option<HostHandler>>,
    observing: bool,
}

struct GuardInner {
    table: Arc<CapabilityTable>,
    prompt: Arc<dyn ConfirmPrompt>,
    denylist: MonitorDenylist,
    events: EventBus,
    state: Mutex<GuardState>,
}

/// Reversible confirmation gate over the host operations in a
/// [`CapabilityTable`], plus the monitor-script filter.
///
/// Enabling swaps a confirming wrapper into every slot of
/// [`HostOperation::ALL`] and keeps the previous occupants. Disabling puts
/// every one of them back. A confirmed `Close` disables the guard before the
/// original close runs, so the teardown it triggers is never prompted twice.
#[derive(Clone)]
pub struct SessionGuard {
    inner: Arc<GuardInner>,
}

impl SessionGuard {
    pub fn new(
        table: Arc<CapabilityTable>,
        prompt: Arc<dyn ConfirmPrompt>,
        denylist: MonitorDenylist,
        events: EventBus,
    ) -> Self {
        Self {
            inner: Arc::new(GuardInner {
                table,
                prompt,
                denylist,
                events,
                state: Mutex::new(GuardState::default()),
            }),
        }
    }

    /// Returns `false` when the guard was already active.
    pub fn enable(&self) -> bool {
        {
            let mut state = self.inner.state.lock();
            if !state.saved.is_empty() {
                return false;
            }
            for operation in HostOperation::ALL {
                let original = self.inner.table.get(operation);
                state.saved.insert(operation, original.clone());
                self.inner
                    .table
                    .install(operation, self.wrapper(operation, original));
            }
            state.observing = true;
        }
        info!(target: "vortex::guard", "session guard enabled");
        self.inner
            .events
            .publish(ShellEvent::GuardChanged { active: true });
        true
    }

    /// Returns `false` when the guard was already inactive.
    ///
    /// Panics if the saved originals do not cover every guarded slot; that
    /// state is unreachable through `enable`.
    pub fn disable(&self) -> bool {
        disable_inner(&self.inner)
    }

    pub fn is_active(&self) -> bool {
        !self.inner.state.lock().saved.is_empty()
    }

    pub fn saved_count(&self) -> usize {
        self.inner.state.lock().saved.len()
    }

    /// Message the host should show before the page unloads.
    pub fn unload_prompt(&self) -> Option<&'static str> {
        self.is_active().then_some(UNLOAD_PROMPT)
    }

    /// Structural-observer hook for a newly inserted script node. Only
    /// filters while the guard is active.
    pub fn on_node_inserted(&self, node: &ScriptNode) -> ScriptVerdict {
        if !self.inner.state.lock().observing {
            return ScriptVerdict::Keep;
        }
        let verdict = self.inner.denylist.inspect(node);
        if let ScriptVerdict::Remove { source } = &verdict {
            info!(target: "vortex::guard", source = %source, "blocked monitoring script");
            self.inner.events.publish(ShellEvent::MonitorScriptBlocked {
                source: source.clone(),
            });
        }
        verdict
    }

    fn wrapper(&self, operation: HostOperation, original: Option<HostHandler>) -> HostHandler {
        let guard: Weak<GuardInner> = Arc::downgrade(&self.inner);
        let prompt = Arc::clone(&self.inner.prompt);
        Arc::new(move |call: HostCall| {
            if !prompt.confirm(confirmation_message(operation)) {
                debug!(target: "vortex::guard", operation = %operation, "guarded operation declined");
                return;
            }
            if operation == HostOperation::Close {
                if let Some(inner) = guard.upgrade() {
                    disable_inner(&inner);
                }
            }
            match &original {
                Some(original) => original(call),
                None => warn!(
                    target: "vortex::guard",
                    operation = %operation,
                    "confirmed operation has no original handler"
                ),
            }
        })
    }

    #[cfg(test)]
    fn forget_saved(&self, operation: HostOperation) {
        self.inner.state.lock().saved.remove(&operation);
    }
}

fn disable_inner(inner: &GuardInner) -> bool {
    {
        let mut state = inner.state.lock();
        if state.saved.is_empty() {
            return false;
        }
        let missing: Vec<HostOperation> = HostOperation::ALL
            .into_iter()
            .filter(|operation| !state.saved.contains_key(operation))
            .collect();
        assert!(
            missing.is_empty(),
            "guard restore table is incomplete, missing {missing:?}"
        );
        for (operation, original) in state.saved.drain() {
            match original {
                Some(original) => {
                    inner.table.install(operation, original);
                }
                None => {
                    inner.table.remove(operation);
                }
            }
        }
        state.observing = false;
    }
    info!(target: "vortex::guard", "session guard disabled");
    inner.events.publish(ShellEvent::GuardChanged { active: false });
    true
}
