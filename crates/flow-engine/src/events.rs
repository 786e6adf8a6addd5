//! Event types for observing update passes
//!
//! Events are sent from the tool manager to the UI (or any consumer) so it
//! does not need to poll tool state while a pass is in flight.

use serde::{Deserialize, Serialize};

use crate::tool::ToolState;

/// Trait for receiving graph events
///
/// This abstracts over the transport mechanism (channel, UI bridge, log)
/// so the manager can be used in different contexts.
pub trait EventSink: Send + Sync {
    /// Send an event
    ///
    /// Returns an error if the event could not be sent (e.g., channel closed)
    fn send(&self, event: GraphEvent) -> Result<(), EventError>;
}

/// Error when sending events fails
#[derive(Debug, Clone, thiserror::Error)]
#[error("Event error: {message}")]
pub struct EventError {
    pub message: String,
}

impl EventError {
    pub fn channel_closed() -> Self {
        Self {
            message: "Channel closed".to_string(),
        }
    }
}

/// Events emitted by update passes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GraphEvent {
    /// A pass started with the given out-of-date tools
    #[serde(rename_all = "camelCase")]
    UpdateStarted { generation: u64, tools: Vec<String> },

    /// A tool started running
    #[serde(rename_all = "camelCase")]
    ToolStarted { generation: u64, tool: String },

    /// A tool run finished and its result was committed
    #[serde(rename_all = "camelCase")]
    ToolFinished {
        generation: u64,
        tool: String,
        state: ToolState,
        error: Option<String>,
    },

    /// Tools left unresolved by a pass
    #[serde(rename_all = "camelCase")]
    CycleDetected { generation: u64, tools: Vec<String> },

    /// A pass reached its fixpoint
    #[serde(rename_all = "camelCase")]
    UpdateSettled { generation: u64 },

    /// A pass stopped because a newer one was requested
    #[serde(rename_all = "camelCase")]
    UpdateSuperseded { generation: u64 },
}

impl GraphEvent {
    /// Generation of the pass that emitted the event
    pub fn generation(&self) -> u64 {
        match self {
            Self::UpdateStarted { generation, .. }
            | Self::ToolStarted { generation, .. }
            | Self::ToolFinished { generation, .. }
            | Self::CycleDetected { generation, .. }
            | Self::UpdateSettled { generation }
            | Self::UpdateSuperseded { generation } => *generation,
        }
    }
}

/// A no-op event sink that discards all events
///
/// Useful for testing or when events aren't needed.
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn send(&self, _event: GraphEvent) -> Result<(), EventError> {
        Ok(())
    }
}

/// A vector-based event sink that collects events
///
/// Useful for testing to verify events were emitted correctly.
pub struct VecEventSink {
    events: parking_lot::Mutex<Vec<GraphEvent>>,
}

impl VecEventSink {
    pub fn new() -> Self {
        Self {
            events: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Get all collected events
    pub fn events(&self) -> Vec<GraphEvent> {
        self.events.lock().clone()
    }

    /// Clear all collected events
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl Default for VecEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for VecEventSink {
    fn send(&self, event: GraphEvent) -> Result<(), EventError> {
        self.events.lock().push(event);
        Ok(())
    }
}

/// Forwards events to an unbounded Tokio channel
///
/// Fails with [`EventError::channel_closed`] once the receiver is dropped.
pub struct ChannelEventSink {
    sender: tokio::sync::mpsc::UnboundedSender<GraphEvent>,
}

impl ChannelEventSink {
    pub fn new(sender: tokio::sync::mpsc::UnboundedSender<GraphEvent>) -> Self {
        Self { sender }
    }
}

impl EventSink for ChannelEventSink {
    fn send(&self, event: GraphEvent) -> Result<(), EventError> {
        self.sender
            .send(event)
            .map_err(|_| EventError::channel_closed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_event_sink() {
        let sink = VecEventSink::new();

        sink.send(GraphEvent::ToolStarted {
            generation: 3,
            tool: "Add".to_string(),
        })
        .unwrap();

        let events = sink.events();
        assert_eq!(events.len(), 1);

        match &events[0] {
            GraphEvent::ToolStarted { generation, tool } => {
                assert_eq!(*generation, 3);
                assert_eq!(tool, "Add");
            }
            _ => panic!("Expected ToolStarted event"),
        }

        sink.clear();
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_null_event_sink() {
        let sink = NullEventSink;
        // Should not panic
        sink.send(GraphEvent::UpdateSettled { generation: 1 }).unwrap();
    }

    #[test]
    fn test_channel_event_sink() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let sink = ChannelEventSink::new(tx);
        sink.send(GraphEvent::UpdateSettled { generation: 4 }).unwrap();
        assert_eq!(rx.try_recv().unwrap(), GraphEvent::UpdateSettled { generation: 4 });

        drop(rx);
        let err = sink.send(GraphEvent::UpdateSettled { generation: 5 }).unwrap_err();
        assert_eq!(err.to_string(), "Event error: Channel closed");
    }

    #[test]
    fn test_events_serialize_tagged() {
        let event = GraphEvent::ToolFinished {
            generation: 2,
            tool: "Calc".to_string(),
            state: ToolState::BadInputs,
            error: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "toolFinished");
        assert_eq!(json["state"], "bad-inputs");
        assert_eq!(event.generation(), 2);
    }
}
