use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// AG-UI event type names.
///
/// The chain only attaches these tags to envelopes; it does not interpret
/// them beyond picking the right one for each operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    RunStarted,
    RunFinished,
    RunError,
    TextMessageStart,
    TextMessageContent,
    TextMessageEnd,
    ThinkingStart,
    ThinkingTextMessageContent,
    ThinkingEnd,
    ToolCallStart,
    ToolCallArgs,
    ToolCallEnd,
    ToolCallResult,
    StepStarted,
    StepFinished,
    StateSnapshot,
    StateDelta,
    MessagesSnapshot,
    Custom,
    Raw,
}

impl EventType {
    /// Every known event type, in catalogue order.
    pub const ALL: [EventType; 20] = [
        EventType::RunStarted,
        EventType::RunFinished,
        EventType::RunError,
        EventType::TextMessageStart,
        EventType::TextMessageContent,
        EventType::TextMessageEnd,
        EventType::ThinkingStart,
        EventType::ThinkingTextMessageContent,
        EventType::ThinkingEnd,
        EventType::ToolCallStart,
        EventType::ToolCallArgs,
        EventType::ToolCallEnd,
        EventType::ToolCallResult,
        EventType::StepStarted,
        EventType::StepFinished,
        EventType::StateSnapshot,
        EventType::StateDelta,
        EventType::MessagesSnapshot,
        EventType::Custom,
        EventType::Raw,
    ];

    /// Wire name of the event type (for example `TEXT_MESSAGE_START`).
    pub const fn as_str(self) -> &'static str {
        match self {
            EventType::RunStarted => "RUN_STARTED",
            EventType::RunFinished => "RUN_FINISHED",
            EventType::RunError => "RUN_ERROR",
            EventType::TextMessageStart => "TEXT_MESSAGE_START",
            EventType::TextMessageContent => "TEXT_MESSAGE_CONTENT",
            EventType::TextMessageEnd => "TEXT_MESSAGE_END",
            EventType::ThinkingStart => "THINKING_START",
            EventType::ThinkingTextMessageContent => "THINKING_TEXT_MESSAGE_CONTENT",
            EventType::ThinkingEnd => "THINKING_END",
            EventType::ToolCallStart => "TOOL_CALL_START",
            EventType::ToolCallArgs => "TOOL_CALL_ARGS",
            EventType::ToolCallEnd => "TOOL_CALL_END",
            EventType::ToolCallResult => "TOOL_CALL_RESULT",
            EventType::StepStarted => "STEP_STARTED",
            EventType::StepFinished => "STEP_FINISHED",
            EventType::StateSnapshot => "STATE_SNAPSHOT",
            EventType::StateDelta => "STATE_DELTA",
            EventType::MessagesSnapshot => "MESSAGES_SNAPSHOT",
            EventType::Custom => "CUSTOM",
            EventType::Raw => "RAW",
        }
    }

    /// Looks up an event type by its wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ty| ty.as_str() == name)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed payload of a protocol event, tagged with its `type` on the wire.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventPayload {
    RunStarted {
        #[serde(rename = "threadId", skip_serializing_if = "Option::is_none")]
        thread_id: Option<String>,
        #[serde(rename = "runId", skip_serializing_if = "Option::is_none")]
        run_id: Option<String>,
    },
    RunFinished {
        #[serde(rename = "threadId", skip_serializing_if = "Option::is_none")]
        thread_id: Option<String>,
        #[serde(rename = "runId", skip_serializing_if = "Option::is_none")]
        run_id: Option<String>,
    },
    RunError {
        message: String,
        code: i32,
    },
    TextMessageStart {
        #[serde(rename = "messageId")]
        message_id: String,
        role: String,
    },
    TextMessageContent {
        #[serde(rename = "messageId")]
        message_id: String,
        delta: String,
    },
    TextMessageEnd {
        #[serde(rename = "messageId")]
        message_id: String,
    },
    /// The thinking stream's own id doubles as its `parentMessageId`.
    ThinkingStart {
        #[serde(rename = "parentMessageId")]
        parent_message_id: String,
    },
    ThinkingTextMessageContent {
        #[serde(rename = "parentMessageId")]
        parent_message_id: String,
        delta: String,
    },
    ThinkingEnd {
        #[serde(rename = "parentMessageId")]
        parent_message_id: String,
    },
    ToolCallStart {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        #[serde(rename = "toolCallName")]
        tool_call_name: String,
        #[serde(rename = "parentMessageId", skip_serializing_if = "Option::is_none")]
        parent_message_id: Option<String>,
    },
    /// One raw fragment of the tool arguments; consumers reassemble them.
    ToolCallArgs {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        delta: String,
    },
    ToolCallEnd {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
    },
    ToolCallResult {
        #[serde(rename = "messageId")]
        message_id: String,
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        content: String,
        role: String,
    },
    StepStarted {
        #[serde(rename = "stepName")]
        step_name: String,
    },
    StepFinished {
        #[serde(rename = "stepName")]
        step_name: String,
    },
    StateSnapshot {
        snapshot: Value,
    },
    StateDelta {
        delta: Vec<Value>,
    },
    MessagesSnapshot {
        messages: Vec<Value>,
    },
    /// Extra payload entries are flattened next to `name` and `value`.
    Custom {
        name: String,
        value: Value,
        #[serde(flatten)]
        payload: Map<String, Value>,
    },
    Raw {
        event: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        source: Option<String>,
    },
}

impl EventPayload {
    /// Event type tag for this payload.
    pub fn event_type(&self) -> EventType {
        match self {
            EventPayload::RunStarted { .. } => EventType::RunStarted,
            EventPayload::RunFinished { .. } => EventType::RunFinished,
            EventPayload::RunError { .. } => EventType::RunError,
            EventPayload::TextMessageStart { .. } => EventType::TextMessageStart,
            EventPayload::TextMessageContent { .. } => EventType::TextMessageContent,
            EventPayload::TextMessageEnd { .. } => EventType::TextMessageEnd,
            EventPayload::ThinkingStart { .. } => EventType::ThinkingStart,
            EventPayload::ThinkingTextMessageContent { .. } => {
                EventType::ThinkingTextMessageContent
            }
            EventPayload::ThinkingEnd { .. } => EventType::ThinkingEnd,
            EventPayload::ToolCallStart { .. } => EventType::ToolCallStart,
            EventPayload::ToolCallArgs { .. } => EventType::ToolCallArgs,
            EventPayload::ToolCallEnd { .. } => EventType::ToolCallEnd,
            EventPayload::ToolCallResult { .. } => EventType::ToolCallResult,
            EventPayload::StepStarted { .. } => EventType::StepStarted,
            EventPayload::StepFinished { .. } => EventType::StepFinished,
            EventPayload::StateSnapshot { .. } => EventType::StateSnapshot,
            EventPayload::StateDelta { .. } => EventType::StateDelta,
            EventPayload::MessagesSnapshot { .. } => EventType::MessagesSnapshot,
            EventPayload::Custom { .. } => EventType::Custom,
            EventPayload::Raw { .. } => EventType::Raw,
        }
    }

    /// Id linking the start, content, and terminal events of one stream.
    ///
    /// Returns `None` for events that do not belong to a content stream.
    pub fn correlation_id(&self) -> Option<&str> {
        match self {
            EventPayload::TextMessageStart { message_id, .. }
            | EventPayload::TextMessageContent { message_id, .. }
            | EventPayload::TextMessageEnd { message_id } => Some(message_id),
            EventPayload::ThinkingStart { parent_message_id }
            | EventPayload::ThinkingTextMessageContent {
                parent_message_id, ..
            }
            | EventPayload::ThinkingEnd { parent_message_id } => Some(parent_message_id),
            EventPayload::ToolCallStart { tool_call_id, .. }
            | EventPayload::ToolCallArgs { tool_call_id, .. }
            | EventPayload::ToolCallEnd { tool_call_id }
            | EventPayload::ToolCallResult { tool_call_id, .. } => Some(tool_call_id),
            _ => None,
        }
    }
}

/// Protocol event built by the chain: a typed payload plus its emission time.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProtocolEvent {
    #[serde(flatten)]
    pub payload: EventPayload,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

/// Caller-supplied event forwarded verbatim, with its provenance attached.
///
/// Built from an [`ExternalEvent`](crate::content::ExternalEvent) by
/// [`AguiChain::event`](crate::AguiChain::event).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ForwardedEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    /// Copy of the event as originally supplied.
    #[serde(rename = "rawEvent")]
    pub raw_event: Value,
}

/// Any event observed by subscribers.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Event {
    Protocol(ProtocolEvent),
    Forwarded(ForwardedEvent),
}

impl Event {
    /// Creates a protocol event with an explicit timestamp.
    pub fn protocol(payload: EventPayload, timestamp: u64) -> Self {
        Event::Protocol(ProtocolEvent { payload, timestamp })
    }

    /// Wire name of the event's `type`.
    pub fn type_name(&self) -> &str {
        match self {
            Event::Protocol(event) => event.payload.event_type().as_str(),
            Event::Forwarded(event) => &event.event_type,
        }
    }

    /// Known event type, if the `type` is part of the catalogue.
    pub fn event_type(&self) -> Option<EventType> {
        match self {
            Event::Protocol(event) => Some(event.payload.event_type()),
            Event::Forwarded(event) => EventType::from_name(&event.event_type),
        }
    }

    /// Typed payload for protocol events.
    pub fn payload(&self) -> Option<&EventPayload> {
        match self {
            Event::Protocol(event) => Some(&event.payload),
            Event::Forwarded(_) => None,
        }
    }

    /// Emission time in milliseconds. Forwarded events only carry one if the
    /// caller supplied a numeric `timestamp` field.
    pub fn timestamp(&self) -> Option<u64> {
        match self {
            Event::Protocol(event) => Some(event.timestamp),
            Event::Forwarded(event) => event.fields.get("timestamp").and_then(Value::as_u64),
        }
    }

    /// Shorthand for [`EventPayload::correlation_id`].
    pub fn correlation_id(&self) -> Option<&str> {
        self.payload().and_then(EventPayload::correlation_id)
    }

    /// Serializes the event into its AG-UI JSON shape.
    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

impl From<ProtocolEvent> for Event {
    fn from(value: ProtocolEvent) -> Self {
        Event::Protocol(value)
    }
}

impl From<ForwardedEvent> for Event {
    fn from(value: ForwardedEvent) -> Self {
        Event::Forwarded(value)
    }
}
