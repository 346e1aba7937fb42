//! Session event hub — fan-out of kernel-side events to live subscribers.
//!
//! One broadcast channel serves the whole process; subscribers filter by
//! session id. WebSocket connections forward `Outbound` pushes to their
//! client, the dashboard SSE feed watches `ApprovalAppended`.

use atelier_protocol::{Approval, ServerMessage, SessionId};
use tokio::sync::broadcast;

#[derive(Debug, Clone)]
pub struct SessionEvent {
    pub session_id: SessionId,
    pub kind: SessionEventKind,
}

#[derive(Debug, Clone)]
pub enum SessionEventKind {
    /// A server message pushed to the session's connected clients.
    Outbound(ServerMessage),
    /// An approval entry was appended to the session's ledger.
    ApprovalAppended(Approval),
}

#[derive(Debug, Clone)]
pub struct SessionHub {
    sender: broadcast::Sender<SessionEvent>,
}

impl SessionHub {
    pub fn new(buffer: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer);
        Self { sender }
    }

    pub fn publish(&self, event: SessionEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use atelier_protocol::{ServerMessage, SessionId};

    use super::{SessionEvent, SessionEventKind, SessionHub};

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let hub = SessionHub::new(8);
        let mut receiver = hub.subscribe();

        hub.publish(SessionEvent {
            session_id: SessionId::from_string("abc123"),
            kind: SessionEventKind::Outbound(ServerMessage::Pong { ts: 7 }),
        });

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.session_id.as_str(), "abc123");
        assert!(matches!(
            event.kind,
            SessionEventKind::Outbound(ServerMessage::Pong { ts: 7 })
        ));
    }

    #[test]
    fn publish_without_subscribers_does_not_panic() {
        let hub = SessionHub::new(8);
        hub.publish(SessionEvent {
            session_id: SessionId::from_string("lonely"),
            kind: SessionEventKind::Outbound(ServerMessage::Pong { ts: 1 }),
        });
    }
}
