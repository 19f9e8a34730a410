use std::sync::atomic::{AtomicU64, Ordering};

/// What an id is generated for; decides its prefix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IdKind {
    Message,
    ToolCall,
}

impl IdKind {
    pub const fn prefix(self) -> &'static str {
        match self {
            IdKind::Message => "msg",
            IdKind::ToolCall => "tool",
        }
    }
}

/// Source of correlating ids for text, thinking, and tool call streams.
///
/// Ids must be unique per chain; their format is opaque to the chain.
pub trait IdGenerator: Send + Sync {
    fn generate(&self, kind: IdKind) -> String;
}

impl<F> IdGenerator for F
where
    F: Fn(IdKind) -> String + Send + Sync,
{
    fn generate(&self, kind: IdKind) -> String {
        self(kind)
    }
}

/// Default generator: `msg_<uuid>` / `tool_<uuid>` with random v4 uuids.
#[derive(Clone, Copy, Debug, Default)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn generate(&self, kind: IdKind) -> String {
        format!("{}_{}", kind.prefix(), uuid::Uuid::new_v4().simple())
    }
}

/// Deterministic generator producing `msg_1`, `tool_2`, ... from one counter.
#[derive(Debug, Default)]
pub struct SequentialIdGenerator {
    next: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn generate(&self, kind: IdKind) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}_{n}", kind.prefix())
    }
}
