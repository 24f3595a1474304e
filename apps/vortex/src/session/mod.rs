use parking_lot::Mutex;
use serde::Serialize;
use std::sync::{Arc, Weak};
use time::OffsetDateTime;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::address_bar::{
    AddressBarController, AddressMode, SecurityIndicator, back_tooltip, display_label,
    display_title, forward_tooltip,
};
use crate::config::ShellConfig;
use crate::error::{Direction, ShellError, ShellResult};
use crate::events::{EventBus, ShellEvent};
use crate::frame::{FrameHost, FrameLoad, FrameOutcome, FrameSignal, NavigationSeq};
use crate::guard::capability::{CapabilityTable, HostCall, HostHandler, HostOperation};
use crate::guard::monitor::{MonitorDenylist, ScriptNode, ScriptVerdict};
use crate::guard::{ConfirmPrompt, SessionGuard};
use crate::history::{HistoryEntry, NavigationHistory};
use crate::keyboard::{KeyContext, KeyPress, ShellCommand, map_key};
use crate::loading::LoadingAnimationController;
use crate::proxy::ProxyEngine;
use crate::search::resolve_input;
use crate::transport::{BackendDescriptor, TransportBootstrap, TransportConnection};

pub const CONNECTION_FAILED: &str = "Connection failed";
pub const LOAD_FAILED: &str = "Failed to load page";
const REFRESH_PARAM: &str = "_refresh";

/// The page hosting the shell.
pub trait HostShell: Send + Sync {
    fn assign(&self, url: &str);
    fn replace(&self, url: &str);
    fn reload(&self, force: bool);
}

/// External collaborators a session drives.
#[derive(Clone)]
pub struct SessionDeps {
    pub connection: Arc<dyn TransportConnection>,
    pub frame: Arc<dyn FrameHost>,
    pub proxy: Arc<dyn ProxyEngine>,
    pub prompt: Arc<dyn ConfirmPrompt>,
    pub host: Arc<dyn HostShell>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PendingKind {
    Open { url: String },
    Traverse { target_index: usize },
    Refresh,
}

#[derive(Debug, Clone)]
struct PendingNavigation {
    sequence: NavigationSeq,
    kind: PendingKind,
}

struct Dispatch {
    kind: PendingKind,
    display_url: String,
    base_target: String,
    load_target: String,
}

#[derive(Default)]
struct SessionState {
    sequence: NavigationSeq,
    history: NavigationHistory,
    current_url: Option<String>,
    frame_active: bool,
    /// Proxy-encoded target of the last issued load, without cache busting.
    frame_target: Option<String>,
    pending: Option<PendingNavigation>,
    address: AddressBarController,
    busy: bool,
    teardowns: u64,
}

impl SessionState {
    fn chrome(&self) -> [ShellEvent; 2] {
        let current = self.current_url.as_deref();
        let previous = self
            .history
            .cursor()
            .and_then(|cursor| cursor.checked_sub(1))
            .and_then(|index| self.history.get(index))
            .map(HistoryEntry::as_str);
        let next = self
            .history
            .cursor()
            .and_then(|cursor| self.history.get(cursor + 1))
            .map(HistoryEntry::as_str);
        [
            ShellEvent::AddressDisplay {
                label: display_label(current),
                title: display_title(current),
                security: SecurityIndicator::for_url(current),
                security_title: SecurityIndicator::for_url(current).title().to_string(),
            },
            ShellEvent::NavigationButtons {
                can_go_back: self.history.can_go_back(),
                can_go_forward: self.history.can_go_forward(),
                back_hint: back_tooltip(previous),
                forward_hint: forward_tooltip(next),
            },
        ]
    }

    fn key_context(&self) -> KeyContext {
        KeyContext {
            frame_active: self.frame_active,
            editing: self.address.is_editing(),
            can_go_back: self.history.can_go_back(),
            can_go_forward: self.history.can_go_forward(),
        }
    }

    /// Index a back/forward step starts from: an in-flight traversal's
    /// target, else the cursor.
    fn traversal_base(&self) -> Option<usize> {
        match &self.pending {
            Some(PendingNavigation {
                kind: PendingKind::Traverse { target_index },
                ..
            }) => Some(*target_index),
            _ => self.history.cursor(),
        }
    }
}

/// Point-in-time view of a session, for status output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    pub sequence: NavigationSeq,
    pub current_url: Option<String>,
    pub frame_active: bool,
    pub busy: bool,
    pub history: Vec<String>,
    pub cursor: Option<usize>,
    pub can_go_back: bool,
    pub can_go_forward: bool,
    pub editing: bool,
    pub guard_active: bool,
    pub loading_active: bool,
}

struct SessionInner {
    search_engine: String,
    homepage: Option<String>,
    backend: BackendDescriptor,
    bootstrap: TransportBootstrap,
    loading: LoadingAnimationController,
    frame: Arc<dyn FrameHost>,
    proxy: Arc<dyn ProxyEngine>,
    table: Arc<CapabilityTable>,
    guard: SessionGuard,
    events: EventBus,
    state: Mutex<SessionState>,
}

/// The single browsing session of the shell.
///
/// Every frame load is tagged with a fresh [`NavigationSeq`]; a
/// [`FrameSignal`] whose tag is not the latest is ignored. History and the
/// address display change only when a load succeeds. Host operations
/// (closing the session, moving the hosting page) go through a
/// [`CapabilityTable`] so the [`SessionGuard`] can gate them.
///
/// Cheap to clone; clones share state. Must be used inside a tokio runtime.
#[derive(Clone)]
pub struct NavigationSession {
    inner: Arc<SessionInner>,
}

impl NavigationSession {
    pub fn new(config: &ShellConfig, deps: SessionDeps) -> ShellResult<Self> {
        config.validate()?;
        let backend = config.backend()?;
        let events = EventBus::new();
        let table = Arc::new(CapabilityTable::new());
        let guard = SessionGuard::new(
            Arc::clone(&table),
            deps.prompt,
            MonitorDenylist::from_config(&config.monitor),
            events.clone(),
        );
        let inner = Arc::new(SessionInner {
            search_engine: config.search_engine.clone(),
            homepage: config.homepage.clone(),
            backend,
            bootstrap: TransportBootstrap::new(deps.connection),
            loading: LoadingAnimationController::new(events.clone()),
            frame: deps.frame,
            proxy: deps.proxy,
            table,
            guard,
            events,
            state: Mutex::new(SessionState::default()),
        });
        install_host_operations(&inner, deps.host);
        if config.guard_on_start {
            inner.guard.enable();
        }
        Ok(Self { inner })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ShellEvent> {
        self.inner.events.subscribe()
    }

    /// Resolves `input` (URL, bare host or search terms) and loads it.
    pub async fn navigate(&self, input: &str) -> ShellResult<NavigationSeq> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ShellError::EmptyInput);
        }
        let resolved = resolve_input(input, &self.inner.search_engine);
        let target = self.inner.proxy.frame_target(&resolved);
        self.inner
            .dispatch(Dispatch {
                kind: PendingKind::Open {
                    url: resolved.clone(),
                },
                display_url: resolved,
                base_target: target.clone(),
                load_target: target,
            })
            .await
    }

    pub async fn go_back(&self) -> ShellResult<NavigationSeq> {
        self.traverse(Direction::Back).await
    }

    pub async fn go_forward(&self) -> ShellResult<NavigationSeq> {
        self.traverse(Direction::Forward).await
    }

    async fn traverse(&self, direction: Direction) -> ShellResult<NavigationSeq> {
        let (target_index, url) = {
            let state = self.inner.state.lock();
            let base = state.traversal_base();
            let target_index = match direction {
                Direction::Back => base.and_then(|base| base.checked_sub(1)),
                Direction::Forward => base.map(|base| base + 1),
            };
            let entry = target_index.and_then(|index| {
                state
                    .history
                    .get(index)
                    .map(|entry| (index, entry.as_str().to_string()))
            });
            entry.ok_or(ShellError::NoHistory(direction))?
        };
        let target = self.inner.proxy.frame_target(&url);
        self.inner
            .dispatch(Dispatch {
                kind: PendingKind::Traverse { target_index },
                display_url: url,
                base_target: target.clone(),
                load_target: target,
            })
            .await
    }

    /// Reloads the frame's current target past any cache. `Ok(None)` when
    /// nothing has been loaded yet.
    pub async fn refresh(&self) -> ShellResult<Option<NavigationSeq>> {
        let (base_target, display_url) = {
            let state = self.inner.state.lock();
            let Some(target) = state.frame_target.clone() else {
                return Ok(None);
            };
            (target, state.current_url.clone().unwrap_or_default())
        };
        let load_target = cache_busted(&base_target, unix_millis());
        self.inner
            .dispatch(Dispatch {
                kind: PendingKind::Refresh,
                display_url,
                base_target,
                load_target,
            })
            .await
            .map(Some)
    }

    /// Goes to the configured homepage, or closes the session without one.
    pub async fn navigate_home(&self) -> ShellResult<Option<NavigationSeq>> {
        match self.inner.homepage.clone() {
            Some(home) => self.navigate(&home).await.map(Some),
            None => {
                self.close_session();
                Ok(None)
            }
        }
    }

    /// Asks the host to close the session. Returns whether it closed; a
    /// guarded close the user declines leaves everything as it was.
    pub fn close_session(&self) -> bool {
        let before = self.inner.state.lock().teardowns;
        if !self.inner.table.invoke(HostCall::Close) {
            self.inner.teardown();
        }
        self.inner.state.lock().teardowns != before
    }

    /// Feeds a load outcome back from the frame. Returns `false` when the
    /// signal belonged to a superseded navigation and was dropped.
    pub fn handle_frame_signal(&self, signal: FrameSignal) -> bool {
        self.inner.settle(signal)
    }

    pub fn begin_address_edit(&self) -> bool {
        let event = {
            let mut state = self.inner.state.lock();
            let current = state.current_url.clone();
            if !state.address.begin_edit(current.as_deref()) {
                return false;
            }
            ShellEvent::AddressEditing {
                editing: true,
                value: state.address.field().to_string(),
            }
        };
        self.inner.events.publish(event);
        true
    }

    /// Typing into the address field while editing.
    pub fn update_address_field(&self, value: &str) {
        self.inner.state.lock().address.set_field(value);
    }

    /// Navigates to `raw_input` and leaves edit mode. Blank input stays in
    /// edit mode and yields `Ok(None)`.
    pub async fn commit_address_edit(&self, raw_input: &str) -> ShellResult<Option<NavigationSeq>> {
        let target = self.inner.state.lock().address.commit_edit(raw_input);
        let Some(target) = target else {
            debug!(target: "vortex::session", "ignoring blank address input");
            return Ok(None);
        };
        self.inner.events.publish(ShellEvent::AddressEditing {
            editing: false,
            value: String::new(),
        });
        self.navigate(&target).await.map(Some)
    }

    /// Leaves edit mode, discarding whatever was typed. Also what a blur does.
    pub fn end_address_edit(&self) {
        let chrome = {
            let mut state = self.inner.state.lock();
            if !state.address.is_editing() {
                return;
            }
            state.address.end_edit();
            state.chrome()
        };
        self.inner.events.publish(ShellEvent::AddressEditing {
            editing: false,
            value: String::new(),
        });
        self.inner.publish_all(chrome);
    }

    /// Runs the shortcut bound to `press`, if any, and reports which one.
    pub async fn handle_key(&self, press: &KeyPress) -> ShellResult<Option<ShellCommand>> {
        let (ctx, field) = {
            let state = self.inner.state.lock();
            (state.key_context(), state.address.field().to_string())
        };
        let Some(command) = map_key(press, &ctx) else {
            return Ok(None);
        };
        debug!(target: "vortex::session", ?command, "keyboard shortcut");
        match command {
            ShellCommand::Close => {
                self.close_session();
            }
            ShellCommand::BeginEdit => {
                self.begin_address_edit();
            }
            ShellCommand::Back => {
                self.go_back().await?;
            }
            ShellCommand::Forward => {
                self.go_forward().await?;
            }
            ShellCommand::Refresh => {
                self.refresh().await?;
            }
            ShellCommand::Home => {
                self.navigate_home().await?;
            }
            ShellCommand::CommitEdit => {
                self.commit_address_edit(&field).await?;
            }
            ShellCommand::EndEdit => self.end_address_edit(),
        }
        Ok(Some(command))
    }

    pub fn enable_guard(&self) -> bool {
        self.inner.guard.enable()
    }

    pub fn disable_guard(&self) -> bool {
        self.inner.guard.disable()
    }

    /// Navigates the hosting page away (guarded).
    pub fn leave(&self, url: &str) -> bool {
        self.inner.table.invoke(HostCall::Assign(url.to_string()))
    }

    pub fn replace_location(&self, url: &str) -> bool {
        self.inner.table.invoke(HostCall::Replace(url.to_string()))
    }

    pub fn reload_page(&self, force: bool) -> bool {
        self.inner.table.invoke(HostCall::Reload { force })
    }

    pub fn unload_prompt(&self) -> Option<&'static str> {
        self.inner.guard.unload_prompt()
    }

    pub fn on_script_inserted(&self, node: &ScriptNode) -> ScriptVerdict {
        self.inner.guard.on_node_inserted(node)
    }

    pub fn guard(&self) -> &SessionGuard {
        &self.inner.guard
    }

    pub fn loading(&self) -> &LoadingAnimationController {
        &self.inner.loading
    }

    pub fn bootstrap(&self) -> &TransportBootstrap {
        &self.inner.bootstrap
    }

    pub fn current_url(&self) -> Option<String> {
        self.inner.state.lock().current_url.clone()
    }

    pub fn current_sequence(&self) -> NavigationSeq {
        self.inner.state.lock().sequence
    }

    pub fn is_frame_active(&self) -> bool {
        self.inner.state.lock().frame_active
    }

    pub fn is_busy(&self) -> bool {
        self.inner.state.lock().busy
    }

    pub fn can_go_back(&self) -> bool {
        self.inner.state.lock().history.can_go_back()
    }

    pub fn can_go_forward(&self) -> bool {
        self.inner.state.lock().history.can_go_forward()
    }

    pub fn history(&self) -> Vec<String> {
        self.inner
            .state
            .lock()
            .history
            .entries()
            .iter()
            .map(|entry| entry.as_str().to_string())
            .collect()
    }

    pub fn address_mode(&self) -> AddressMode {
        self.inner.state.lock().address.mode()
    }

    pub fn address_field(&self) -> String {
        self.inner.state.lock().address.field().to_string()
    }

    pub fn status(&self) -> SessionStatus {
        let loading_active = self.inner.loading.is_active();
        let guard_active = self.inner.guard.is_active();
        let state = self.inner.state.lock();
        SessionStatus {
            sequence: state.sequence,
            current_url: state.current_url.clone(),
            frame_active: state.frame_active,
            busy: state.busy,
            history: state
                .history
                .entries()
                .iter()
                .map(|entry| entry.as_str().to_string())
                .collect(),
            cursor: state.history.cursor(),
            can_go_back: state.history.can_go_back(),
            can_go_forward: state.history.can_go_forward(),
            editing: state.address.is_editing(),
            guard_active,
            loading_active,
        }
    }
}

impl SessionInner {
    async fn dispatch(&self, dispatch: Dispatch) -> ShellResult<NavigationSeq> {
        let Dispatch {
            kind,
            display_url,
            base_target,
            load_target,
        } = dispatch;
        let sequence = {
            let mut state = self.state.lock();
            state.sequence = state.sequence.next();
            state.pending = Some(PendingNavigation {
                sequence: state.sequence,
                kind,
            });
            state.busy = true;
            let revealed = !state.frame_active;
            state.frame_active = true;
            if revealed {
                self.events
                    .publish(ShellEvent::FrameVisibility { active: true });
            }
            // Cycles start in sequence order.
            self.loading.start(&display_url);
            state.sequence
        };
        info!(target: "vortex::session", sequence = %sequence, url = %display_url, "navigating");
        self.events.publish(ShellEvent::NavigationBusy { busy: true });

        if let Err(err) = self.bootstrap.ensure_ready(&self.backend).await {
            let current = {
                let mut state = self.state.lock();
                let current = state.sequence == sequence;
                if current {
                    state.pending = None;
                    state.busy = false;
                }
                current
            };
            if current {
                self.loading.fail();
                self.events.publish(ShellEvent::NavigationBusy { busy: false });
                self.events.publish(ShellEvent::LoadFailed {
                    message: CONNECTION_FAILED.to_string(),
                });
            } else {
                debug!(
                    target: "vortex::session",
                    sequence = %sequence,
                    "transport failure for superseded navigation"
                );
            }
            return Err(err);
        }

        let mut state = self.state.lock();
        if state.sequence != sequence {
            debug!(
                target: "vortex::session",
                sequence = %sequence,
                latest = %state.sequence,
                "navigation superseded before frame load"
            );
            return Ok(sequence);
        }
        state.frame_target = Some(base_target);
        // Issued under the lock so loads reach the frame in sequence order.
        self.frame.load(FrameLoad {
            sequence,
            target: load_target,
        });
        Ok(sequence)
    }

    fn settle(&self, signal: FrameSignal) -> bool {
        let mut state = self.state.lock();
        let Some(pending) = state
            .pending
            .take_if(|pending| pending.sequence == signal.sequence)
        else {
            debug!(
                target: "vortex::session",
                sequence = %signal.sequence,
                latest = %state.sequence,
                "discarding stale frame signal"
            );
            return false;
        };
        state.busy = false;

        match signal.outcome {
            FrameOutcome::Loaded => {
                apply_commit(&mut state, pending.kind);
                state.current_url = state
                    .history
                    .current()
                    .map(|entry| entry.as_str().to_string());
                let chrome = state.chrome();
                drop(state);
                self.loading.complete();
                self.events.publish(ShellEvent::NavigationBusy { busy: false });
                self.publish_all(chrome);
                debug!(target: "vortex::session", sequence = %signal.sequence, "navigation committed");
            }
            FrameOutcome::Failed { reason } => {
                drop(state);
                warn!(
                    target: "vortex::session",
                    sequence = %signal.sequence,
                    reason = %reason,
                    "frame failed to load"
                );
                self.loading.fail();
                self.events.publish(ShellEvent::NavigationBusy { busy: false });
                self.events.publish(ShellEvent::LoadFailed {
                    message: LOAD_FAILED.to_string(),
                });
            }
        }
        true
    }

    /// The host-side close: resets everything the session owns.
    fn teardown(&self) {
        let chrome = {
            let mut state = self.state.lock();
            state.sequence = state.sequence.next();
            state.teardowns += 1;
            state.pending = None;
            state.busy = false;
            state.history.reset();
            state.current_url = None;
            state.frame_target = None;
            state.frame_active = false;
            state.address.end_edit();
            state.chrome()
        };
        self.loading.cancel();
        self.frame.clear();
        self.events.publish(ShellEvent::LoadingHidden);
        self.events
            .publish(ShellEvent::FrameVisibility { active: false });
        self.events.publish(ShellEvent::NavigationBusy { busy: false });
        self.events.publish(ShellEvent::AddressEditing {
            editing: false,
            value: String::new(),
        });
        self.publish_all(chrome);
        self.guard.disable();
        info!(target: "vortex::session", "session closed");
    }

    fn publish_all(&self, events: impl IntoIterator<Item = ShellEvent>) {
        for event in events {
            self.events.publish(event);
        }
    }
}

fn apply_commit(state: &mut SessionState, kind: PendingKind) {
    match kind {
        PendingKind::Open { url } => {
            if state.history.current().map(HistoryEntry::as_str) == Some(url.as_str()) {
                return;
            }
            match HistoryEntry::new(url) {
                Ok(entry) => state.history.commit(entry),
                Err(err) => warn!(target: "vortex::session", error = %err, "not committing entry"),
            }
        }
        PendingKind::Traverse { target_index } => {
            while let Some(cursor) = state.history.cursor() {
                let moved = if cursor > target_index {
                    state.history.back().is_ok()
                } else if cursor < target_index {
                    state.history.forward().is_ok()
                } else {
                    break;
                };
                if !moved {
                    break;
                }
            }
        }
        PendingKind::Refresh => {}
    }
}

fn install_host_operations(inner: &Arc<SessionInner>, host: Arc<dyn HostShell>) {
    let session: Weak<SessionInner> = Arc::downgrade(inner);
    let close: HostHandler = Arc::new(move |_: HostCall| {
        if let Some(inner) = session.upgrade() {
            inner.teardown();
        }
    });
    let shell = Arc::clone(&host);
    let assign: HostHandler = Arc::new(move |call: HostCall| {
        if let HostCall::Assign(url) = call {
            shell.assign(&url);
        }
    });
    let shell = Arc::clone(&host);
    let replace: HostHandler = Arc::new(move |call: HostCall| {
        if let HostCall::Replace(url) = call {
            shell.replace(&url);
        }
    });
    let reload: HostHandler = Arc::new(move |call: HostCall| {
        if let HostCall::Reload { force } = call {
            host.reload(force);
        }
    });
    inner.table.install(HostOperation::Close, close);
    inner.table.install(HostOperation::Assign, assign);
    inner.table.install(HostOperation::Replace, replace);
    inner.table.install(HostOperation::Reload, reload);
}

fn unix_millis() -> i128 {
    OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000
}

fn cache_busted(target: &str, millis: i128) -> String {
    let separator = if target.contains('?') { '&' } else { '?' };
    format!("{target}{separator}{REFRESH_PARAM}={millis}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_buster_picks_separator() {
        assert_eq!(cache_busted("/service/a", 42), "/service/a?_refresh=42");
        assert_eq!(cache_busted("/service/a?x=1", 42), "/service/a?x=1&_refresh=42");
    }

    #[test]
    fn traversal_commit_walks_cursor_to_target() {
        let mut state = SessionState::default();
        for url in ["https://a.test/", "https://b.test/", "https://c.test/"] {
            state.history.commit(HistoryEntry::new(url).unwrap());
        }
        apply_commit(&mut state, PendingKind::Traverse { target_index: 0 });
        assert_eq!(state.history.cursor(), Some(0));
        apply_commit(&mut state, PendingKind::Traverse { target_index: 2 });
        assert_eq!(state.history.cursor(), Some(2));
    }

    #[test]
    fn reopening_current_entry_does_not_duplicate() {
        let mut state = SessionState::default();
        let open = |url: &str| PendingKind::Open { url: url.into() };
        apply_commit(&mut state, open("https://a.test/"));
        apply_commit(&mut state, open("https://a.test/"));
        assert_eq!(state.history.len(), 1);
        apply_commit(&mut state, open("https://b.test/"));
        assert_eq!(state.history.len(), 2);
    }

    #[test]
    fn chrome_reports_neighbours() {
        let mut state = SessionState::default();
        for url in ["https://a.test/", "https://b.test/", "https://c.test/"] {
            state.history.commit(HistoryEntry::new(url).unwrap());
        }
        state.history.back().unwrap();
        state.current_url = Some("https://b.test/".into());
        let [display, buttons] = state.chrome();
        assert_eq!(
            display,
            ShellEvent::AddressDisplay {
                label: "b.test/".into(),
                title: "https://b.test/".into(),
                security: SecurityIndicator::Secure,
                security_title: "Secure HTTPS connection".into(),
            }
        );
        assert_eq!(
            buttons,
            ShellEvent::NavigationButtons {
                can_go_back: true,
                can_go_forward: true,
                back_hint: "Go back to a.test".into(),
                forward_hint: "Go forward to c.test".into(),
            }
        );
    }
}
