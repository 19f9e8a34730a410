use serde_json::{Map, Value};

use crate::errors::ChainError;
use crate::event::ForwardedEvent;

/// Role attached to text streams when the caller does not pick one.
pub const DEFAULT_TEXT_ROLE: &str = "assistant";
/// Role attached to tool results when the caller does not pick one.
pub const DEFAULT_TOOL_ROLE: &str = "tool";
/// Code attached to run errors when the caller does not pick one.
pub const DEFAULT_ERROR_CODE: i32 = 500;

/// Arguments for [`AguiChain::tool_call_start`](crate::AguiChain::tool_call_start).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ToolCallStart {
    /// Caller-chosen id. When `None` or empty, the chain generates one.
    pub tool_call_id: Option<String>,
    pub tool_call_name: String,
    pub parent_message_id: Option<String>,
}

impl ToolCallStart {
    /// Starts a tool call with a generated id.
    pub fn new(tool_call_name: impl Into<String>) -> Self {
        Self {
            tool_call_id: None,
            tool_call_name: tool_call_name.into(),
            parent_message_id: None,
        }
    }

    /// Uses a caller-supplied tool call id.
    pub fn with_id(mut self, tool_call_id: impl Into<String>) -> Self {
        self.tool_call_id = Some(tool_call_id.into());
        self
    }

    /// Links the tool call to the message that requested it.
    pub fn with_parent_message_id(mut self, parent_message_id: impl Into<String>) -> Self {
        self.parent_message_id = Some(parent_message_id.into());
        self
    }
}

/// Arguments for [`AguiChain::tool_call_result`](crate::AguiChain::tool_call_result).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolCallResult {
    pub message_id: String,
    pub tool_call_id: String,
    pub content: String,
    /// Defaults to [`DEFAULT_TOOL_ROLE`] when `None` or empty.
    pub role: Option<String>,
}

impl ToolCallResult {
    pub fn new(
        message_id: impl Into<String>,
        tool_call_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            role: None,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub(crate) fn resolved_role(&self) -> String {
        self.role
            .as_deref()
            .filter(|role| !role.is_empty())
            .unwrap_or(DEFAULT_TOOL_ROLE)
            .to_string()
    }
}

/// Arbitrary event injected through [`AguiChain::event`](crate::AguiChain::event).
///
/// The chain forwards it as-is. If `raw_event` is unset, a copy of the event
/// (type plus fields) is attached under `rawEvent` before dispatch.
///
/// `event_type` must be non-empty by the time the event is forwarded. A
/// `type` key left in `fields` is dropped in favour of `event_type`, and a
/// `rawEvent` key there fills `raw_event` when that slot is empty.
#[derive(Clone, Debug, PartialEq)]
pub struct ExternalEvent {
    pub event_type: String,
    pub fields: Map<String, Value>,
    pub raw_event: Option<Value>,
}

impl ExternalEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            fields: Map::new(),
            raw_event: None,
        }
    }

    /// Adds a payload field. `type` and `rawEvent` are routed to their
    /// dedicated slots instead of the field map; a non-string `type` is
    /// ignored and the current type kept.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        let value = value.into();
        match key.as_str() {
            "type" => {
                if let Value::String(event_type) = value {
                    self.event_type = event_type;
                }
            }
            "rawEvent" => self.raw_event = Some(value).filter(|raw| !raw.is_null()),
            _ => {
                self.fields.insert(key, value);
            }
        }
        self
    }

    pub fn with_raw_event(mut self, raw_event: Value) -> Self {
        self.raw_event = Some(raw_event);
        self
    }

    /// Parses a JSON object carrying a string `type`.
    ///
    /// A `null` `rawEvent` counts as absent.
    pub fn from_value(value: Value) -> Result<Self, ChainError> {
        let Value::Object(mut fields) = value else {
            return Err(ChainError::invalid_event("event must be a JSON object"));
        };
        let event_type = match fields.remove("type") {
            Some(Value::String(event_type)) if !event_type.is_empty() => event_type,
            Some(_) => {
                return Err(ChainError::invalid_event(
                    "event `type` must be a non-empty string",
                ));
            }
            None => return Err(ChainError::invalid_event("event is missing `type`")),
        };
        let raw_event = fields.remove("rawEvent").filter(|raw| !raw.is_null());
        Ok(Self {
            event_type,
            fields,
            raw_event,
        })
    }

    pub(crate) fn into_forwarded(self) -> Result<ForwardedEvent, ChainError> {
        if self.event_type.is_empty() {
            return Err(ChainError::invalid_event(
                "event `type` must be a non-empty string",
            ));
        }
        let mut fields = self.fields;
        fields.remove("type");
        let stray_raw = fields.remove("rawEvent").filter(|raw| !raw.is_null());
        let raw_event = match self.raw_event.filter(|raw| !raw.is_null()).or(stray_raw) {
            Some(raw_event) => raw_event,
            None => {
                let mut original = fields.clone();
                original.insert("type".into(), Value::String(self.event_type.clone()));
                Value::Object(original)
            }
        };
        Ok(ForwardedEvent {
            event_type: self.event_type,
            fields,
            raw_event,
        })
    }
}
