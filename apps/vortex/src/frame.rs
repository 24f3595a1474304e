use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;

/// Tag carried by every frame load. Strictly increasing per session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct NavigationSeq(u64);

impl NavigationSeq {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for NavigationSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameLoad {
    pub sequence: NavigationSeq,
    /// Proxy-encoded target, ready to assign to the frame.
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    Loaded,
    Failed { reason: String },
}

/// What the frame reports back once a load settles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSignal {
    pub sequence: NavigationSeq,
    pub outcome: FrameOutcome,
}

impl FrameSignal {
    pub fn loaded(sequence: NavigationSeq) -> Self {
        Self {
            sequence,
            outcome: FrameOutcome::Loaded,
        }
    }

    pub fn failed(sequence: NavigationSeq, reason: impl Into<String>) -> Self {
        Self {
            sequence,
            outcome: FrameOutcome::Failed {
                reason: reason.into(),
            },
        }
    }
}

/// The embedded rendering surface.
///
/// `load` is called with the session's state lock held, so implementations
/// must report their [`FrameSignal`] later rather than from inside `load`.
pub trait FrameHost: Send + Sync {
    fn load(&self, request: FrameLoad);
    fn clear(&self);
}

/// Records every request; never signals on its own.
#[derive(Debug, Default)]
pub struct RecordingFrame {
    loads: Mutex<Vec<FrameLoad>>,
    clears: AtomicUsize,
}

impl RecordingFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loads(&self) -> Vec<FrameLoad> {
        self.loads.lock().clone()
    }

    pub fn last_load(&self) -> Option<FrameLoad> {
        self.loads.lock().last().cloned()
    }

    pub fn clear_count(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }
}

impl FrameHost for RecordingFrame {
    fn load(&self, request: FrameLoad) {
        self.loads.lock().push(request);
    }

    fn clear(&self) {
        self.clears.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameRequest {
    Load(FrameLoad),
    Clear,
}

/// Forwards requests to a channel so an async driver can settle them.
#[derive(Debug)]
pub struct ChannelFrame {
    tx: mpsc::UnboundedSender<FrameRequest>,
}

impl ChannelFrame {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<FrameRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl FrameHost for ChannelFrame {
    fn load(&self, request: FrameLoad) {
        let _ = self.tx.send(FrameRequest::Load(request));
    }

    fn clear(&self) {
        let _ = self.tx.send(FrameRequest::Clear);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_orders_and_displays() {
        let first = NavigationSeq::default().next();
        let second = first.next();
        assert!(second > first);
        assert_eq!(second.get(), 2);
        assert_eq!(second.to_string(), "#2");
    }

    #[test]
    fn channel_frame_forwards_requests() {
        let (frame, mut rx) = ChannelFrame::new();
        let load = FrameLoad {
            sequence: NavigationSeq::new(3),
            target: "/service/x".into(),
        };
        frame.load(load.clone());
        frame.clear();
        assert_eq!(rx.try_recv().unwrap(), FrameRequest::Load(load));
        assert_eq!(rx.try_recv().unwrap(), FrameRequest::Clear);
    }
}
