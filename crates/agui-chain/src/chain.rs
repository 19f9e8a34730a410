use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::content::{
    DEFAULT_ERROR_CODE, DEFAULT_TEXT_ROLE, ExternalEvent, ToolCallResult, ToolCallStart,
};
use crate::errors::ChainError;
use crate::event::{Event, EventPayload, ProtocolEvent};
use crate::ids::{IdGenerator, IdKind, UuidIdGenerator};
use crate::lifecycle::{RunLifecycle, run_finished_payload, run_started_payload};
use crate::mode::Mode;
use crate::options::RunOptions;
use crate::subscriber::{Subscriber, SubscriberList};

/// Keys a `CUSTOM` payload may not override.
const RESERVED_CUSTOM_KEYS: [&str; 4] = ["type", "timestamp", "name", "value"];

/// Result of a chain operation; `Ok` hands the chain back for further calls.
pub type ChainResult<'a> = Result<&'a mut AguiChain, ChainError>;

/// Sequences AG-UI events for one run and fans them out to subscribers.
///
/// At most one content stream (text, thinking, or tool call) is open at a
/// time. Opening a new stream, or emitting any standalone event, first closes
/// the open one with its terminal event. `RUN_STARTED` is sent before the
/// first event of any kind and `RUN_FINISHED` at most once.
///
/// Every state change is committed before the event announcing it is
/// dispatched, so a failing subscriber never leaves the chain half-way through
/// a transition.
pub struct AguiChain {
    mode: Mode,
    lifecycle: RunLifecycle,
    subscribers: SubscriberList,
    run_options: RunOptions,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    last_timestamp: u64,
}

impl AguiChain {
    /// Creates a chain with the given run options and default id/clock sources.
    pub fn new(run_options: RunOptions) -> Self {
        Self::builder().run_options(run_options).build()
    }

    pub fn builder() -> AguiChainBuilder {
        AguiChainBuilder::default()
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn run_options(&self) -> &RunOptions {
        &self.run_options
    }

    pub fn has_started(&self) -> bool {
        self.lifecycle.has_started()
    }

    pub fn has_finished(&self) -> bool {
        self.lifecycle.has_finished()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Merges `update` into the run options used by lifecycle events not yet sent.
    pub fn set_run_options(&mut self, update: RunOptions) -> &mut Self {
        self.run_options.merge(update);
        self
    }

    /// Appends a subscriber. Registering the same handle twice delivers twice.
    pub fn subscribe(&mut self, subscriber: Subscriber) -> &mut Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Removes the first registration of `subscriber`, if any.
    pub fn unsubscribe(&mut self, subscriber: &Subscriber) -> &mut Self {
        if !self.subscribers.remove_first(subscriber) {
            debug!("unsubscribe ignored: subscriber not registered");
        }
        self
    }

    /// Dispatches an already built event, sending `RUN_STARTED` first if needed.
    pub fn emit(&mut self, event: impl Into<Event>) -> ChainResult<'_> {
        self.dispatch(event.into())?;
        Ok(self)
    }

    /// Appends assistant text, opening a text stream if one is not open.
    pub fn text(&mut self, content: impl Into<String>) -> ChainResult<'_> {
        self.text_with_role(content, DEFAULT_TEXT_ROLE)
    }

    /// Appends text. `role` only applies when this call opens the stream.
    pub fn text_with_role(
        &mut self,
        content: impl Into<String>,
        role: impl Into<String>,
    ) -> ChainResult<'_> {
        let open = match &self.mode {
            Mode::Text { message_id } => Some(message_id.clone()),
            _ => None,
        };
        let message_id = match open {
            Some(message_id) => message_id,
            None => {
                self.close_current_mode()?;
                let message_id = self.ids.generate(IdKind::Message);
                self.mode = Mode::Text {
                    message_id: message_id.clone(),
                };
                debug!(%message_id, "opened text stream");
                self.emit_payload(EventPayload::TextMessageStart {
                    message_id: message_id.clone(),
                    role: role.into(),
                })?;
                message_id
            }
        };
        self.emit_payload(EventPayload::TextMessageContent {
            message_id,
            delta: content.into(),
        })?;
        Ok(self)
    }

    /// Appends reasoning text, opening a thinking stream if one is not open.
    pub fn think(&mut self, content: impl Into<String>) -> ChainResult<'_> {
        let open = match &self.mode {
            Mode::Thinking { message_id } => Some(message_id.clone()),
            _ => None,
        };
        let message_id = match open {
            Some(message_id) => message_id,
            None => {
                self.close_current_mode()?;
                let message_id = self.ids.generate(IdKind::Message);
                self.mode = Mode::Thinking {
                    message_id: message_id.clone(),
                };
                debug!(%message_id, "opened thinking stream");
                self.emit_payload(EventPayload::ThinkingStart {
                    parent_message_id: message_id.clone(),
                })?;
                message_id
            }
        };
        self.emit_payload(EventPayload::ThinkingTextMessageContent {
            parent_message_id: message_id,
            delta: content.into(),
        })?;
        Ok(self)
    }

    /// Opens a tool call. Always closes the open stream first, including a
    /// tool call that is already open.
    pub fn tool_call_start(&mut self, start: ToolCallStart) -> ChainResult<'_> {
        self.close_current_mode()?;
        let tool_call_id = start
            .tool_call_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| self.ids.generate(IdKind::ToolCall));
        self.mode = Mode::ToolCall {
            tool_call_id: tool_call_id.clone(),
        };
        debug!(%tool_call_id, tool_call_name = %start.tool_call_name, "opened tool call");
        self.emit_payload(EventPayload::ToolCallStart {
            tool_call_id,
            tool_call_name: start.tool_call_name,
            parent_message_id: start.parent_message_id,
        })?;
        Ok(self)
    }

    /// Sends one raw argument fragment for the open tool call.
    ///
    /// Ignored when no tool call is open.
    pub fn tool_call_args(&mut self, delta: impl Into<String>) -> ChainResult<'_> {
        let Some(tool_call_id) = self.mode.tool_call_id().map(str::to_string) else {
            debug!(mode = self.mode.name(), "tool call args ignored: no open tool call");
            return Ok(self);
        };
        self.emit_payload(EventPayload::ToolCallArgs {
            tool_call_id,
            delta: delta.into(),
        })?;
        Ok(self)
    }

    /// Closes the open tool call. Ignored when no tool call is open.
    pub fn tool_call_end(&mut self) -> ChainResult<'_> {
        if !matches!(self.mode, Mode::ToolCall { .. }) {
            debug!(mode = self.mode.name(), "tool call end ignored: no open tool call");
            return Ok(self);
        }
        self.close_current_mode()?;
        Ok(self)
    }

    /// Reports a tool result. Unlike every other event, this leaves the open
    /// stream untouched.
    pub fn tool_call_result(&mut self, result: ToolCallResult) -> ChainResult<'_> {
        let role = result.resolved_role();
        self.emit_payload(EventPayload::ToolCallResult {
            message_id: result.message_id,
            tool_call_id: result.tool_call_id,
            content: result.content,
            role,
        })?;
        Ok(self)
    }

    /// Emits a `CUSTOM` event with no extra payload.
    pub fn custom(&mut self, name: impl Into<String>, value: impl Into<Value>) -> ChainResult<'_> {
        self.custom_with_payload(name, value, Map::new())
    }

    /// Emits a `CUSTOM` event whose extra payload entries sit next to `name`
    /// and `value`. Entries named `type`, `timestamp`, `name`, or `value` are
    /// dropped.
    pub fn custom_with_payload(
        &mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
        payload: impl IntoIterator<Item = (String, Value)>,
    ) -> ChainResult<'_> {
        let payload: Map<String, Value> = payload
            .into_iter()
            .filter(|(key, _)| {
                let reserved = RESERVED_CUSTOM_KEYS.contains(&key.as_str());
                if reserved {
                    debug!(key = %key, "dropping reserved key from custom payload");
                }
                !reserved
            })
            .collect();
        self.emit_standalone(EventPayload::Custom {
            name: name.into(),
            value: value.into(),
            payload,
        })
    }

    /// Emits `RUN_ERROR` with code 500.
    pub fn error(&mut self, message: impl Into<String>) -> ChainResult<'_> {
        self.error_with_code(message, DEFAULT_ERROR_CODE)
    }

    /// Emits `RUN_ERROR`. This is data for the consumer; the chain keeps going.
    pub fn error_with_code(&mut self, message: impl Into<String>, code: i32) -> ChainResult<'_> {
        self.emit_standalone(EventPayload::RunError {
            message: message.into(),
            code,
        })
    }

    pub fn step_started(&mut self, step_name: impl Into<String>) -> ChainResult<'_> {
        self.emit_standalone(EventPayload::StepStarted {
            step_name: step_name.into(),
        })
    }

    pub fn step_finished(&mut self, step_name: impl Into<String>) -> ChainResult<'_> {
        self.emit_standalone(EventPayload::StepFinished {
            step_name: step_name.into(),
        })
    }

    pub fn state_snapshot(&mut self, snapshot: Value) -> ChainResult<'_> {
        self.emit_standalone(EventPayload::StateSnapshot { snapshot })
    }

    /// Emits `STATE_DELTA` with the given patch operations, unvalidated.
    pub fn state_delta(&mut self, delta: Vec<Value>) -> ChainResult<'_> {
        self.emit_standalone(EventPayload::StateDelta { delta })
    }

    pub fn messages_snapshot(&mut self, messages: Vec<Value>) -> ChainResult<'_> {
        self.emit_standalone(EventPayload::MessagesSnapshot { messages })
    }

    /// Wraps an upstream event in a `RAW` envelope.
    pub fn raw(&mut self, event: Value, source: Option<String>) -> ChainResult<'_> {
        self.emit_standalone(EventPayload::Raw { event, source })
    }

    /// Forwards a caller-defined event verbatim after closing the open stream.
    ///
    /// An event with an empty `type` is rejected before anything is closed.
    pub fn event(&mut self, event: ExternalEvent) -> ChainResult<'_> {
        let forwarded = event.into_forwarded()?;
        self.close_current_mode()?;
        self.dispatch(forwarded.into())?;
        Ok(self)
    }

    /// Closes the open stream and finishes the run. Repeat calls only close.
    pub fn end(&mut self) -> ChainResult<'_> {
        self.close_current_mode()?;
        self.run_finished()
    }

    /// Sends `RUN_STARTED` now unless it was already sent.
    pub fn run_started(&mut self) -> ChainResult<'_> {
        self.ensure_started()?;
        Ok(self)
    }

    /// Sends `RUN_FINISHED` unless it was already sent. Does not close the
    /// open stream; use [`end`](Self::end) for that.
    pub fn run_finished(&mut self) -> ChainResult<'_> {
        if self.lifecycle.finish() {
            debug!(
                thread_id = ?self.run_options.thread_id,
                run_id = ?self.run_options.run_id,
                "run finished"
            );
            self.emit_payload(run_finished_payload(&self.run_options))?;
        } else {
            debug!("run finish ignored: already finished");
        }
        Ok(self)
    }

    fn emit_standalone(&mut self, payload: EventPayload) -> ChainResult<'_> {
        self.close_current_mode()?;
        self.emit_payload(payload)?;
        Ok(self)
    }

    fn close_current_mode(&mut self) -> Result<(), ChainError> {
        let previous = std::mem::take(&mut self.mode);
        let mode = previous.name();
        if let Some(terminal) = previous.into_terminal_payload() {
            debug!(mode, "closing content stream");
            self.emit_payload(terminal)?;
        }
        Ok(())
    }

    fn ensure_started(&mut self) -> Result<(), ChainError> {
        if self.lifecycle.begin() {
            debug!(
                thread_id = ?self.run_options.thread_id,
                run_id = ?self.run_options.run_id,
                "run started"
            );
            let started = self.stamp(run_started_payload(&self.run_options));
            self.subscribers.dispatch(&started)?;
        }
        Ok(())
    }

    fn emit_payload(&mut self, payload: EventPayload) -> Result<(), ChainError> {
        self.ensure_started()?;
        let event = self.stamp(payload);
        self.subscribers.dispatch(&event)
    }

    fn dispatch(&mut self, event: Event) -> Result<(), ChainError> {
        self.ensure_started()?;
        self.subscribers.dispatch(&event)
    }

    fn stamp(&mut self, payload: EventPayload) -> Event {
        let timestamp = self.clock.now_millis().max(self.last_timestamp);
        self.last_timestamp = timestamp;
        Event::Protocol(ProtocolEvent { payload, timestamp })
    }
}

impl Default for AguiChain {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl std::fmt::Debug for AguiChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AguiChain")
            .field("mode", &self.mode)
            .field("lifecycle", &self.lifecycle)
            .field("subscribers", &self.subscribers.len())
            .field("run_options", &self.run_options)
            .finish_non_exhaustive()
    }
}

/// Builder for an [`AguiChain`] with custom id and clock sources.
#[derive(Default)]
pub struct AguiChainBuilder {
    run_options: RunOptions,
    ids: Option<Arc<dyn IdGenerator>>,
    clock: Option<Arc<dyn Clock>>,
}

impl AguiChainBuilder {
    pub fn run_options(mut self, run_options: RunOptions) -> Self {
        self.run_options = run_options;
        self
    }

    pub fn thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.run_options.thread_id = Some(thread_id.into());
        self
    }

    pub fn run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_options.run_id = Some(run_id.into());
        self
    }

    /// Replaces the default uuid-based id generator.
    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Replaces the system clock used for event timestamps.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> AguiChain {
        AguiChain {
            mode: Mode::None,
            lifecycle: RunLifecycle::default(),
            subscribers: SubscriberList::default(),
            run_options: self.run_options,
            ids: self.ids.unwrap_or_else(|| Arc::new(UuidIdGenerator)),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            last_timestamp: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::errors::SubscriberError;
    use crate::event::EventType;
    use crate::ids::SequentialIdGenerator;
    use crate::subscriber::EventLog;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn recorded_chain() -> (AguiChain, EventLog) {
        let log = EventLog::new();
        let mut chain = AguiChain::builder()
            .id_generator(Arc::new(SequentialIdGenerator::new()))
            .clock(Arc::new(ManualClock::new(1_000)))
            .build();
        chain.subscribe(log.subscriber());
        (chain, log)
    }

    fn types(log: &EventLog) -> Vec<EventType> {
        log.events()
            .iter()
            .map(|event| event.event_type().expect("known event type"))
            .collect()
    }

    fn payload(log: &EventLog, index: usize) -> EventPayload {
        log.events()[index]
            .payload()
            .cloned()
            .expect("protocol event")
    }

    #[test]
    fn hello_world_text_then_end() {
        let (mut chain, log) = recorded_chain();
        chain.text("Hello World").unwrap().end().unwrap();

        assert_eq!(
            types(&log),
            vec![
                EventType::RunStarted,
                EventType::TextMessageStart,
                EventType::TextMessageContent,
                EventType::TextMessageEnd,
                EventType::RunFinished,
            ]
        );
        assert_eq!(
            payload(&log, 1),
            EventPayload::TextMessageStart {
                message_id: "msg_1".into(),
                role: "assistant".into(),
            }
        );
        assert_eq!(
            payload(&log, 2),
            EventPayload::TextMessageContent {
                message_id: "msg_1".into(),
                delta: "Hello World".into(),
            }
        );
    }

    #[test]
    fn repeated_text_appends_to_the_same_message() {
        let (mut chain, log) = recorded_chain();
        chain.text("Hello").unwrap().text(" ").unwrap().text("World").unwrap();
        chain.end().unwrap();

        assert_eq!(log.len(), 7);
        let ids: Vec<_> = log
            .events()
            .iter()
            .filter_map(|event| event.correlation_id().map(str::to_string))
            .collect();
        assert!(ids.iter().all(|id| id == "msg_1"));
        assert_eq!(ids.len(), 5);
    }

    #[test]
    fn mode_switches_close_the_previous_stream() {
        let (mut chain, log) = recorded_chain();
        chain.text("A").unwrap().think("B").unwrap().text("C").unwrap().end().unwrap();

        assert_eq!(
            types(&log),
            vec![
                EventType::RunStarted,
                EventType::TextMessageStart,
                EventType::TextMessageContent,
                EventType::TextMessageEnd,
                EventType::ThinkingStart,
                EventType::ThinkingTextMessageContent,
                EventType::ThinkingEnd,
                EventType::TextMessageStart,
                EventType::TextMessageContent,
                EventType::TextMessageEnd,
                EventType::RunFinished,
            ]
        );
        let first = log.events()[1].correlation_id().map(str::to_string);
        let second = log.events()[7].correlation_id().map(str::to_string);
        assert_ne!(first, second);
        assert_eq!(
            payload(&log, 5),
            EventPayload::ThinkingTextMessageContent {
                parent_message_id: "msg_2".into(),
                delta: "B".into(),
            }
        );
    }

    #[test]
    fn role_is_fixed_when_the_stream_opens() {
        let (mut chain, log) = recorded_chain();
        chain.text_with_role("hi", "user").unwrap();
        chain.text_with_role(" there", "system").unwrap();

        assert_eq!(
            payload(&log, 1),
            EventPayload::TextMessageStart {
                message_id: "msg_1".into(),
                role: "user".into(),
            }
        );
        assert_eq!(log.len(), 4);
        assert_eq!(
            payload(&log, 3),
            EventPayload::TextMessageContent {
                message_id: "msg_1".into(),
                delta: " there".into(),
            }
        );
    }

    #[test]
    fn tool_call_flow_with_result() {
        let (mut chain, log) = recorded_chain();
        chain
            .tool_call_start(ToolCallStart::new("fetch_data").with_id("tool_1"))
            .unwrap()
            .tool_call_args(r#"{"url": "https://api.example.com"}"#)
            .unwrap()
            .tool_call_end()
            .unwrap()
            .tool_call_result(ToolCallResult::new("msg_1", "tool_1", "Data fetched"))
            .unwrap()
            .end()
            .unwrap();

        assert_eq!(
            types(&log),
            vec![
                EventType::RunStarted,
                EventType::ToolCallStart,
                EventType::ToolCallArgs,
                EventType::ToolCallEnd,
                EventType::ToolCallResult,
                EventType::RunFinished,
            ]
        );
        assert_eq!(
            payload(&log, 4),
            EventPayload::ToolCallResult {
                message_id: "msg_1".into(),
                tool_call_id: "tool_1".into(),
                content: "Data fetched".into(),
                role: "tool".into(),
            }
        );
        assert!(chain.mode().is_none());
    }

    #[test]
    fn tool_call_args_fragments_are_sent_verbatim() {
        let (mut chain, log) = recorded_chain();
        chain
            .tool_call_start(ToolCallStart::new("sum").with_id("tool_7"))
            .unwrap()
            .tool_call_args("{\"a\":")
            .unwrap()
            .tool_call_args("1}")
            .unwrap();

        assert_eq!(log.len(), 4);
        assert_eq!(
            payload(&log, 2),
            EventPayload::ToolCallArgs {
                tool_call_id: "tool_7".into(),
                delta: "{\"a\":".into(),
            }
        );
        assert_eq!(
            payload(&log, 3),
            EventPayload::ToolCallArgs {
                tool_call_id: "tool_7".into(),
                delta: "1}".into(),
            }
        );
    }

    #[test]
    fn generated_tool_call_id_is_reused_on_end() {
        let (mut chain, log) = recorded_chain();
        chain
            .tool_call_start(ToolCallStart::new("fetch_data"))
            .unwrap()
            .tool_call_end()
            .unwrap()
            .end()
            .unwrap();

        let start = log.events()[1].correlation_id().map(str::to_string);
        let end = log.events()[2].correlation_id().map(str::to_string);
        assert_eq!(start.as_deref(), Some("tool_1"));
        assert_eq!(start, end);
    }

    #[test]
    fn empty_tool_call_id_is_replaced() {
        let (mut chain, _log) = recorded_chain();
        chain
            .tool_call_start(ToolCallStart::new("noop").with_id(""))
            .unwrap();
        assert_eq!(chain.mode().tool_call_id(), Some("tool_1"));
    }

    #[test]
    fn second_tool_call_start_restarts_the_call() {
        let (mut chain, log) = recorded_chain();
        chain
            .tool_call_start(ToolCallStart::new("a"))
            .unwrap()
            .tool_call_start(ToolCallStart::new("b").with_parent_message_id("msg_9"))
            .unwrap();

        assert_eq!(
            types(&log),
            vec![
                EventType::RunStarted,
                EventType::ToolCallStart,
                EventType::ToolCallEnd,
                EventType::ToolCallStart,
            ]
        );
        assert_eq!(
            payload(&log, 3),
            EventPayload::ToolCallStart {
                tool_call_id: "tool_2".into(),
                tool_call_name: "b".into(),
                parent_message_id: Some("msg_9".into()),
            }
        );
    }

    #[test]
    fn tool_call_continuations_outside_a_tool_call_are_ignored() {
        let (mut chain, log) = recorded_chain();
        chain.tool_call_args("{}").unwrap().tool_call_end().unwrap();
        assert!(log.is_empty());
        assert!(!chain.has_started());

        chain.text("x").unwrap().tool_call_args("{}").unwrap().tool_call_end().unwrap();
        assert_eq!(log.len(), 3);
        assert_eq!(chain.mode().message_id(), Some("msg_1"));
    }

    #[test]
    fn tool_call_result_does_not_close_the_open_stream() {
        let (mut chain, log) = recorded_chain();
        chain
            .text("A")
            .unwrap()
            .tool_call_result(ToolCallResult::new("msg_x", "tool_x", "ok"))
            .unwrap()
            .end()
            .unwrap();

        assert_eq!(
            types(&log),
            vec![
                EventType::RunStarted,
                EventType::TextMessageStart,
                EventType::TextMessageContent,
                EventType::ToolCallResult,
                EventType::TextMessageEnd,
                EventType::RunFinished,
            ]
        );
    }

    #[test]
    fn standalone_events_close_the_open_stream() {
        let (mut chain, log) = recorded_chain();
        chain.think("hmm").unwrap().step_started("validation").unwrap();
        assert_eq!(
            &types(&log)[3..],
            &[EventType::ThinkingEnd, EventType::StepStarted]
        );
        assert!(chain.mode().is_none());
    }

    #[test]
    fn custom_payload_is_merged_without_reserved_keys() {
        let (mut chain, log) = recorded_chain();
        chain
            .custom_with_payload(
                "progress",
                50,
                [
                    ("stage".to_string(), json!("processing")),
                    ("timestamp".to_string(), json!(123)),
                    ("name".to_string(), json!("other")),
                ],
            )
            .unwrap();

        let json = log.events()[1].to_json().unwrap();
        assert_eq!(json["type"], "CUSTOM");
        assert_eq!(json["name"], "progress");
        assert_eq!(json["value"], 50);
        assert_eq!(json["stage"], "processing");
        assert_eq!(json["timestamp"], 1_000);
    }

    #[test]
    fn error_defaults_to_code_500() {
        let (mut chain, log) = recorded_chain();
        chain.error("Something went wrong").unwrap();
        chain.error_with_code("Invalid input parameters", 400).unwrap();
        chain.end().unwrap();

        assert_eq!(log.len(), 4);
        assert_eq!(
            payload(&log, 1),
            EventPayload::RunError {
                message: "Something went wrong".into(),
                code: 500,
            }
        );
        assert_eq!(
            payload(&log, 2),
            EventPayload::RunError {
                message: "Invalid input parameters".into(),
                code: 400,
            }
        );
    }

    #[test]
    fn state_and_message_snapshots() {
        let (mut chain, log) = recorded_chain();
        chain
            .state_snapshot(json!({"user": {"id": "123"}}))
            .unwrap()
            .state_delta(vec![json!({"op": "add", "path": "/user/name", "value": "John"})])
            .unwrap()
            .messages_snapshot(vec![json!({"id": "msg_1", "role": "user", "content": "Hello"})])
            .unwrap()
            .end()
            .unwrap();

        assert_eq!(
            types(&log),
            vec![
                EventType::RunStarted,
                EventType::StateSnapshot,
                EventType::StateDelta,
                EventType::MessagesSnapshot,
                EventType::RunFinished,
            ]
        );
        assert_eq!(
            payload(&log, 1),
            EventPayload::StateSnapshot {
                snapshot: json!({"user": {"id": "123"}})
            }
        );
    }

    #[test]
    fn raw_event_carries_source() {
        let (mut chain, log) = recorded_chain();
        chain
            .raw(json!({"custom": "data"}), Some("external".into()))
            .unwrap();
        let json = log.events()[1].to_json().unwrap();
        assert_eq!(json["type"], "RAW");
        assert_eq!(json["event"], json!({"custom": "data"}));
        assert_eq!(json["source"], "external");
    }

    #[test]
    fn forwarded_events_keep_their_type_and_provenance() {
        let (mut chain, log) = recorded_chain();
        chain.text("before").unwrap();
        chain
            .event(ExternalEvent::new("CUSTOM_TYPE").with_field("data", "custom"))
            .unwrap()
            .end()
            .unwrap();

        let names = log.type_names();
        assert_eq!(
            names,
            vec![
                "RUN_STARTED",
                "TEXT_MESSAGE_START",
                "TEXT_MESSAGE_CONTENT",
                "TEXT_MESSAGE_END",
                "CUSTOM_TYPE",
                "RUN_FINISHED",
            ]
        );
        let json = log.events()[4].to_json().unwrap();
        assert_eq!(json["data"], "custom");
        assert_eq!(json["rawEvent"], json!({"type": "CUSTOM_TYPE", "data": "custom"}));
    }

    #[test]
    fn invalid_forwarded_event_leaves_the_stream_open() {
        let (mut chain, log) = recorded_chain();
        chain.text("open").unwrap();
        let err = chain.event(ExternalEvent::new("")).unwrap_err();
        assert!(matches!(err, ChainError::InvalidEvent(_)));
        assert_eq!(log.len(), 3);
        assert_eq!(chain.mode().message_id(), Some("msg_1"));
    }

    #[test]
    fn forwarded_event_with_stray_keys_serializes_each_key_once() {
        let (mut chain, log) = recorded_chain();
        let mut event = ExternalEvent::new("CUSTOM_TYPE");
        event.fields.insert("type".into(), json!("OTHER"));
        event.fields.insert("rawEvent".into(), json!({"x": 1}));
        chain.event(event).unwrap();

        let line = serde_json::to_string(&log.events()[1]).unwrap();
        assert_eq!(line, r#"{"type":"CUSTOM_TYPE","rawEvent":{"x":1}}"#);
    }

    #[test]
    fn lifecycle_events_are_sent_once() {
        let (mut chain, log) = recorded_chain();
        chain.run_started().unwrap().run_started().unwrap();
        chain.text("Hello").unwrap();
        chain.end().unwrap().end().unwrap();
        chain.run_finished().unwrap();

        let names = log.type_names();
        assert_eq!(names.iter().filter(|n| *n == "RUN_STARTED").count(), 1);
        assert_eq!(names.iter().filter(|n| *n == "RUN_FINISHED").count(), 1);
        assert_eq!(names.first().map(String::as_str), Some("RUN_STARTED"));
        assert_eq!(names.last().map(String::as_str), Some("RUN_FINISHED"));
        assert!(chain.has_started() && chain.has_finished());
    }

    #[test]
    fn run_finished_on_an_empty_run_still_starts_it() {
        let (mut chain, log) = recorded_chain();
        chain.run_finished().unwrap();
        assert_eq!(types(&log), vec![EventType::RunStarted, EventType::RunFinished]);
    }

    #[test]
    fn run_options_are_read_when_lifecycle_events_are_built() {
        let log = EventLog::new();
        let mut chain = AguiChain::builder().thread_id("thread_1").build();
        chain.subscribe(log.subscriber());
        chain.set_run_options(RunOptions::default().with_run_id("run_1"));
        chain.text("Hello").unwrap();
        chain.set_run_options(RunOptions::default().with_run_id("run_2"));
        chain.end().unwrap();

        assert_eq!(
            payload(&log, 0),
            EventPayload::RunStarted {
                thread_id: Some("thread_1".into()),
                run_id: Some("run_1".into()),
            }
        );
        assert_eq!(
            payload(&log, 4),
            EventPayload::RunFinished {
                thread_id: Some("thread_1".into()),
                run_id: Some("run_2".into()),
            }
        );
    }

    #[test]
    fn ended_chain_can_still_emit_with_fresh_ids() {
        let (mut chain, log) = recorded_chain();
        chain.text("Hello").unwrap().end().unwrap();
        chain.text("World").unwrap().end().unwrap();

        let starts: Vec<_> = log
            .events()
            .into_iter()
            .filter(|event| event.event_type() == Some(EventType::TextMessageStart))
            .collect();
        assert_eq!(starts.len(), 2);
        assert_ne!(starts[0].correlation_id(), starts[1].correlation_id());
        assert_eq!(log.type_names().last().map(String::as_str), Some("TEXT_MESSAGE_END"));
    }

    #[test]
    fn every_subscriber_sees_every_event_in_order() {
        let first = EventLog::new();
        let second = EventLog::new();
        let mut chain = AguiChain::default();
        chain.subscribe(first.subscriber()).subscribe(second.subscriber());
        chain.text("Hello").unwrap().end().unwrap();

        assert_eq!(first.len(), 5);
        assert_eq!(first.events(), second.events());
    }

    #[test]
    fn duplicate_subscription_delivers_twice_and_unsubscribe_removes_one() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let sub = Subscriber::infallible(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        let mut chain = AguiChain::default();
        chain.subscribe(sub.clone()).subscribe(sub.clone());
        chain.run_started().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        chain.unsubscribe(&sub).step_started("one").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        chain.unsubscribe(&sub).unsubscribe(&sub);
        chain.step_finished("one").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(chain.subscriber_count(), 0);
    }

    #[test]
    fn unsubscribed_callback_receives_nothing() {
        let log = EventLog::new();
        let sub = log.subscriber();
        let mut chain = AguiChain::default();
        chain.subscribe(sub.clone()).unsubscribe(&sub);
        chain.text("Hello").unwrap();
        assert!(log.is_empty());
    }

    #[test]
    fn subscriber_failure_propagates_and_skips_later_subscribers() {
        let log = EventLog::new();
        let mut chain = AguiChain::default();
        chain
            .subscribe(Subscriber::new(|event| {
                if event.event_type() == Some(EventType::TextMessageContent) {
                    Err(SubscriberError::msg("sink closed"))
                } else {
                    Ok(())
                }
            }))
            .subscribe(log.subscriber());

        let err = chain.text("Hello").unwrap_err();
        assert!(matches!(
            err,
            ChainError::Subscriber { ref event_type, .. } if event_type == "TEXT_MESSAGE_CONTENT"
        ));
        assert_eq!(
            log.type_names(),
            vec!["RUN_STARTED", "TEXT_MESSAGE_START"]
        );
        assert!(chain.mode().message_id().is_some());

        chain.end().unwrap();
        assert_eq!(log.len(), 4);
    }

    #[test]
    fn timestamps_never_go_backwards() {
        let clock = Arc::new(ManualClock::new(500));
        let log = EventLog::new();
        let mut chain = AguiChain::builder().clock(clock.clone()).build();
        chain.subscribe(log.subscriber());
        chain.text("a").unwrap();
        clock.set(100);
        chain.text("b").unwrap();
        clock.set(900);
        chain.end().unwrap();

        let stamps: Vec<u64> = log.events().iter().filter_map(Event::timestamp).collect();
        assert_eq!(stamps, vec![500, 500, 500, 500, 900, 900]);
    }

    #[test]
    fn chain_can_move_across_threads() {
        fn assert_send<T: Send>() {}
        assert_send::<AguiChain>();
    }

    #[test]
    fn emit_prepends_run_started_to_caller_events() {
        let (mut chain, log) = recorded_chain();
        chain
            .emit(Event::protocol(
                EventPayload::StepStarted {
                    step_name: "manual".into(),
                },
                5,
            ))
            .unwrap();
        assert_eq!(types(&log), vec![EventType::RunStarted, EventType::StepStarted]);
        assert!(chain.mode().is_none());
    }
}
