//! Common imports for typical chain usage.
pub use crate::{
    AguiChain, ChainError, Event, EventLog, EventPayload, EventType, ExternalEvent, RunOptions,
    Subscriber, SubscriberError, ToolCallResult, ToolCallStart,
};
