use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Host-provided operations that can be intercepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostOperation {
    Close,
    Assign,
    Replace,
    Reload,
}

impl HostOperation {
    pub const ALL: [HostOperation; 4] = [
        HostOperation::Close,
        HostOperation::Assign,
        HostOperation::Replace,
        HostOperation::Reload,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            HostOperation::Close => "close",
            HostOperation::Assign => "assign",
            HostOperation::Replace => "replace",
            HostOperation::Reload => "reload",
        }
    }
}

impl fmt::Display for HostOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    Close,
    Assign(String),
    Replace(String),
    Reload { force: bool },
}

impl HostCall {
    pub fn operation(&self) -> HostOperation {
        match self {
            HostCall::Close => HostOperation::Close,
            HostCall::Assign(_) => HostOperation::Assign,
            HostCall::Replace(_) => HostOperation::Replace,
            HostCall::Reload { .. } => HostOperation::Reload,
        }
    }
}

pub type HostHandler = Arc<dyn Fn(HostCall) + Send + Sync>;

/// Named slots for host operations. Every call to a guarded operation goes
/// through [`CapabilityTable::invoke`], so swapping a slot is the only way
/// behavior is overridden.
#[derive(Default)]
pub struct CapabilityTable {
    slots: RwLock<HashMap<HostOperation, HostHandler>>,
}

impl CapabilityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `handler` and hands back whatever occupied the slot.
    pub fn install(&self, operation: HostOperation, handler: HostHandler) -> Option<HostHandler> {
        self.slots.write().insert(operation, handler)
    }

    pub fn remove(&self, operation: HostOperation) -> Option<HostHandler> {
        self.slots.write().remove(&operation)
    }

    pub fn get(&self, operation: HostOperation) -> Option<HostHandler> {
        self.slots.read().get(&operation).cloned()
    }

    /// Runs the handler for `call`. The slot lock is released first, so a
    /// handler may itself swap slots. Returns `false` for an empty slot.
    pub fn invoke(&self, call: HostCall) -> bool {
        let Some(handler) = self.get(call.operation()) else {
            return false;
        };
        handler(call);
        true
    }

    /// Whether the slot holds exactly `handler` (same allocation).
    pub fn holds(&self, operation: HostOperation, handler: &HostHandler) -> bool {
        self.slots
            .read()
            .get(&operation)
            .is_some_and(|installed| Arc::ptr_eq(installed, handler))
    }
}

impl fmt::Debug for CapabilityTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.slots.read();
        let mut installed: Vec<&str> = slots.keys().map(|op| op.as_str()).collect();
        installed.sort_unstable();
        f.debug_struct("CapabilityTable")
            .field("installed", &installed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn invoke_routes_to_installed_handler() {
        let table = CapabilityTable::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let handler: HostHandler = Arc::new(move |call: HostCall| {
            assert_eq!(call, HostCall::Assign("https://a.test".into()));
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(table.install(HostOperation::Assign, handler.clone()).is_none());

        assert!(table.invoke(HostCall::Assign("https://a.test".into())));
        assert!(!table.invoke(HostCall::Close));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(table.holds(HostOperation::Assign, &handler));
    }

    #[test]
    fn handler_may_swap_its_own_slot() {
        let table = Arc::new(CapabilityTable::new());
        let replacement: HostHandler = Arc::new(|_: HostCall| {});
        let swap_table = table.clone();
        let swap_to = replacement.clone();
        table.install(
            HostOperation::Close,
            Arc::new(move |_: HostCall| {
                swap_table.install(HostOperation::Close, swap_to.clone());
            }),
        );

        assert!(table.invoke(HostCall::Close));
        assert!(table.holds(HostOperation::Close, &replacement));
    }
}
