//! Usage scenarios, one per function. Each drives a fresh chain to the end of
//! its run.

use agui_chain::{AguiChain, ChainError, Subscriber, ToolCallResult, ToolCallStart};
use serde_json::json;
use tracing::{debug, info};

use crate::sink::{EventWriter, OutputFormat};

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Scenario {
    Basic,
    ExternalStream,
    ToolCall,
    ErrorHandling,
    StateManagement,
    CustomEvents,
    MultipleSubscribers,
}

impl Scenario {
    pub const ALL: [Scenario; 7] = [
        Scenario::Basic,
        Scenario::ExternalStream,
        Scenario::ToolCall,
        Scenario::ErrorHandling,
        Scenario::StateManagement,
        Scenario::CustomEvents,
        Scenario::MultipleSubscribers,
    ];

    pub fn slug(self) -> &'static str {
        match self {
            Scenario::Basic => "basic",
            Scenario::ExternalStream => "external_stream",
            Scenario::ToolCall => "tool_call",
            Scenario::ErrorHandling => "error_handling",
            Scenario::StateManagement => "state_management",
            Scenario::CustomEvents => "custom_events",
            Scenario::MultipleSubscribers => "multiple_subscribers",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Scenario::Basic => "Basic usage",
            Scenario::ExternalStream => "Streaming from an external source",
            Scenario::ToolCall => "Tool call",
            Scenario::ErrorHandling => "Error handling",
            Scenario::StateManagement => "State management",
            Scenario::CustomEvents => "Custom events",
            Scenario::MultipleSubscribers => "Multiple subscribers",
        }
    }

    pub fn run(self, chain: &mut AguiChain) -> Result<(), ChainError> {
        match self {
            Scenario::Basic => basic(chain),
            Scenario::ExternalStream => external_stream(chain),
            Scenario::ToolCall => tool_call(chain),
            Scenario::ErrorHandling => error_handling(chain),
            Scenario::StateManagement => state_management(chain),
            Scenario::CustomEvents => custom_events(chain),
            Scenario::MultipleSubscribers => multiple_subscribers(chain),
        }
    }
}

fn basic(chain: &mut AguiChain) -> Result<(), ChainError> {
    chain
        .text("Hello, this is a basic text message")?
        .think("Processing the request...")?
        .text("Operation completed successfully!")?
        .end()?;
    Ok(())
}

/// A chunk as it would arrive from an upstream model stream.
enum Chunk {
    Text(&'static str),
    Thinking(&'static str),
}

fn external_stream(chain: &mut AguiChain) -> Result<(), ChainError> {
    let chunks = [
        Chunk::Text("Hello"),
        Chunk::Text(" "),
        Chunk::Text("World"),
        Chunk::Thinking("Processing"),
        Chunk::Thinking("..."),
        Chunk::Text("Done!"),
    ];
    for chunk in chunks {
        match chunk {
            Chunk::Text(content) => chain.text(content)?,
            Chunk::Thinking(content) => chain.think(content)?,
        };
    }
    chain.end()?;
    Ok(())
}

fn tool_call(chain: &mut AguiChain) -> Result<(), ChainError> {
    chain
        .text("I need to fetch some data")?
        .tool_call_start(
            ToolCallStart::new("fetch_data")
                .with_id("tool_1")
                .with_parent_message_id("msg_1"),
        )?
        .tool_call_args(r#"{"url": "https://api.example.com/data"}"#)?
        .tool_call_end()?
        .tool_call_result(
            ToolCallResult::new("msg_2", "tool_1", "Data fetched successfully").with_role("tool"),
        )?
        .text("Data has been retrieved")?
        .end()?;
    Ok(())
}

fn error_handling(chain: &mut AguiChain) -> Result<(), ChainError> {
    chain
        .text("Attempting to process request...")?
        .step_started("validation")?
        .error_with_code("Invalid input parameters", 400)?
        .step_finished("validation")?
        .end()?;
    Ok(())
}

fn state_management(chain: &mut AguiChain) -> Result<(), ChainError> {
    chain
        .state_snapshot(json!({
            "user": { "id": "user_123", "name": "John" },
            "session": { "id": "session_456", "status": "active" }
        }))?
        .text("Current state loaded")?
        .state_delta(vec![
            json!({ "op": "add", "path": "/user/preferences", "value": { "theme": "dark" } }),
            json!({ "op": "replace", "path": "/session/status", "value": "processing" }),
        ])?
        .messages_snapshot(vec![
            json!({ "id": "msg_1", "role": "user", "content": "Hello" }),
            json!({ "id": "msg_2", "role": "assistant", "content": "Hi there!" }),
        ])?
        .end()?;
    Ok(())
}

fn custom_events(chain: &mut AguiChain) -> Result<(), ChainError> {
    chain
        .text("Processing with custom events")?
        .custom_with_payload("progress", 50, [("stage".to_string(), json!("processing"))])?
        .custom_with_payload("status", "success", [("attempt".to_string(), json!(1))])?
        .text("Custom events processed")?
        .end()?;
    Ok(())
}

/// Fans one run out to an SSE body and a logger. The SSE body is buffered in
/// memory here; a server would hand the same writer its response stream.
fn multiple_subscribers(chain: &mut AguiChain) -> Result<(), ChainError> {
    let sse = EventWriter::new(Vec::new(), OutputFormat::Sse);
    fan_out(chain, &sse)?;
    debug!(bytes = sse.with_writer(Vec::len), "sse body ready");
    Ok(())
}

fn fan_out(chain: &mut AguiChain, sse: &EventWriter<Vec<u8>>) -> Result<(), ChainError> {
    let logger = Subscriber::infallible(|event| {
        info!(event_type = event.type_name(), "logger subscriber");
    });
    chain.subscribe(sse.subscriber()).subscribe(logger);
    chain
        .text("Hello from multiple subscribers")?
        .think("Processing...")?
        .text("All subscribers received the events")?
        .end()?;
    Ok(())
}
