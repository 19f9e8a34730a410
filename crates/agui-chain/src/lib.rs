//! Chain-style builder for AG-UI protocol event streams.
//!
//! An [`AguiChain`] turns high-level calls ("emit text", "emit a thought",
//! "start a tool call") into a well-formed AG-UI event sequence: it opens and
//! closes text, thinking, and tool call streams for you, sends `RUN_STARTED`
//! before the first event and `RUN_FINISHED` once, and hands every event to
//! the registered subscribers synchronously, in order. Transport (SSE,
//! WebSocket, ...) is left to the subscribers.
//!
//! ```
//! use agui_chain::prelude::*;
//!
//! # fn main() -> Result<(), ChainError> {
//! let log = EventLog::new();
//! let mut chain = AguiChain::new(RunOptions::new("thread_123", "run_456"));
//! chain.subscribe(log.subscriber());
//!
//! chain
//!     .text("Let me check.")?
//!     .think("The user wants the weather.")?
//!     .tool_call_start(ToolCallStart::new("get_weather"))?
//!     .tool_call_args(r#"{"city":"Paris"}"#)?
//!     .tool_call_end()?
//!     .end()?;
//!
//! let types = log.type_names();
//! assert_eq!(types.first().map(String::as_str), Some("RUN_STARTED"));
//! assert_eq!(types.last().map(String::as_str), Some("RUN_FINISHED"));
//! assert_eq!(types.len(), 11);
//! # Ok(())
//! # }
//! ```

/// The chain: mode tracking, lifecycle guard, and dispatch.
pub mod chain;
/// Timestamp sources.
pub mod clock;
/// Caller-side inputs for tool calls and forwarded events.
pub mod content;
/// Public error types.
pub mod errors;
/// Event envelopes and the AG-UI event type catalogue.
pub mod event;
/// Correlating id generation.
pub mod ids;
mod lifecycle;
/// The currently open content stream.
pub mod mode;
/// Run identifiers attached to lifecycle events.
pub mod options;
/// Common imports for typical usage.
pub mod prelude;
/// Subscriber handles and the in-memory event recorder.
pub mod subscriber;

pub use chain::{AguiChain, AguiChainBuilder, ChainResult};
pub use clock::{Clock, ManualClock, SystemClock};
pub use content::{
    DEFAULT_ERROR_CODE, DEFAULT_TEXT_ROLE, DEFAULT_TOOL_ROLE, ExternalEvent, ToolCallResult,
    ToolCallStart,
};
pub use errors::{ChainError, SubscriberError};
pub use event::{Event, EventPayload, EventType, ForwardedEvent, ProtocolEvent};
pub use ids::{IdGenerator, IdKind, SequentialIdGenerator, UuidIdGenerator};
pub use mode::Mode;
pub use options::RunOptions;
pub use subscriber::{EventLog, Subscriber, SubscriberResult};
