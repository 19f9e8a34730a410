use std::error::Error as StdError;

/// Failure reported by a subscriber callback.
///
/// Wraps any error the callback produced so it can travel back to the caller of
/// the chain operation that triggered the dispatch.
#[derive(Debug, thiserror::Error)]
#[error("{source}")]
pub struct SubscriberError {
    #[source]
    source: Box<dyn StdError + Send + Sync>,
}

impl SubscriberError {
    /// Wraps an arbitrary error.
    pub fn new(source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Creates an error from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(message.into())
    }
}

impl From<std::io::Error> for SubscriberError {
    fn from(value: std::io::Error) -> Self {
        Self::new(value)
    }
}

impl From<serde_json::Error> for SubscriberError {
    fn from(value: serde_json::Error) -> Self {
        Self::new(value)
    }
}

/// Errors returned by [`AguiChain`](crate::AguiChain) operations.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// A subscriber failed; remaining subscribers for that event were skipped.
    #[error("subscriber failed while handling {event_type}: {source}")]
    Subscriber {
        event_type: String,
        #[source]
        source: SubscriberError,
    },
    /// A caller-supplied event could not be interpreted.
    #[error("invalid event: {0}")]
    InvalidEvent(String),
}

impl ChainError {
    pub(crate) fn subscriber(event_type: impl Into<String>, source: SubscriberError) -> Self {
        Self::Subscriber {
            event_type: event_type.into(),
            source,
        }
    }

    pub(crate) fn invalid_event(message: impl Into<String>) -> Self {
        Self::InvalidEvent(message.into())
    }
}
