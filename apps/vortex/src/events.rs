use serde::Serialize;
use tokio::sync::broadcast;

use crate::address_bar::SecurityIndicator;

/// Signals from the shell core to whatever renders it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShellEvent {
    FrameVisibility {
        active: bool,
    },
    LoadingShown {
        subtitle: String,
    },
    LoadingProgress {
        percent: u8,
    },
    LoadingStep {
        step: u8,
        completed: bool,
    },
    LoadingHidden,
    NavigationBusy {
        busy: bool,
    },
    LoadFailed {
        message: String,
    },
    AddressDisplay {
        label: String,
        title: String,
        security: SecurityIndicator,
        security_title: String,
    },
    AddressEditing {
        editing: bool,
        value: String,
    },
    NavigationButtons {
        can_go_back: bool,
        can_go_forward: bool,
        back_hint: String,
        forward_hint: String,
    },
    GuardChanged {
        active: bool,
    },
    MonitorScriptBlocked {
        source: String,
    },
}

const EVENT_CAPACITY: usize = 256;

/// Fan-out of [`ShellEvent`]s. Publishing with no subscribers is fine.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ShellEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ShellEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: ShellEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Drains whatever is currently buffered on `rx` without waiting.
pub fn drain(rx: &mut broadcast::Receiver<ShellEvent>) -> Vec<ShellEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_reaches_every_subscriber() {
        let bus = EventBus::new();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();
        bus.publish(ShellEvent::NavigationBusy { busy: true });

        assert_eq!(drain(&mut first), vec![ShellEvent::NavigationBusy { busy: true }]);
        assert_eq!(drain(&mut second), vec![ShellEvent::NavigationBusy { busy: true }]);
    }

    #[test]
    fn events_serialize_with_a_type_tag() {
        let json = serde_json::to_value(ShellEvent::LoadingStep {
            step: 2,
            completed: false,
        })
        .expect("serialize event");
        assert_eq!(json["type"], "loading_step");
        assert_eq!(json["step"], 2);
    }
}
