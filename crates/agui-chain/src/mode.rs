use crate::event::EventPayload;

/// The content stream currently open on a chain.
///
/// Correlating ids live inside the variants, so a message id exists exactly
/// while a text or thinking stream is open and a tool call id exactly while a
/// tool call is open.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    None,
    Text {
        message_id: String,
    },
    Thinking {
        message_id: String,
    },
    ToolCall {
        tool_call_id: String,
    },
}

impl Mode {
    /// Short label used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Mode::None => "none",
            Mode::Text { .. } => "text",
            Mode::Thinking { .. } => "thinking",
            Mode::ToolCall { .. } => "tool_call",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Mode::None)
    }

    /// Id of the open text or thinking stream.
    pub fn message_id(&self) -> Option<&str> {
        match self {
            Mode::Text { message_id } | Mode::Thinking { message_id } => Some(message_id),
            _ => None,
        }
    }

    /// Id of the open tool call.
    pub fn tool_call_id(&self) -> Option<&str> {
        match self {
            Mode::ToolCall { tool_call_id } => Some(tool_call_id),
            _ => None,
        }
    }

    /// Terminal event that closes this stream, if one is open.
    pub(crate) fn into_terminal_payload(self) -> Option<EventPayload> {
        match self {
            Mode::None => None,
            Mode::Text { message_id } => Some(EventPayload::TextMessageEnd { message_id }),
            Mode::Thinking { message_id } => Some(EventPayload::ThinkingEnd {
                parent_message_id: message_id,
            }),
            Mode::ToolCall { tool_call_id } => Some(EventPayload::ToolCallEnd { tool_call_id }),
        }
    }
}
