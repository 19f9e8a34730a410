use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use agui_chain::{Event, Subscriber, SubscriberError};

/// How events are rendered by an [`EventWriter`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// `TYPE  {json}` per line, for reading in a terminal.
    #[default]
    Pretty,
    /// One JSON object per line, ready to pipe into an SSE relay.
    Jsonl,
    /// `data: {json}` frames separated by a blank line, as written to an
    /// SSE response body.
    Sse,
}

/// Subscriber target that renders every event to a writer.
pub struct EventWriter<W> {
    writer: Arc<Mutex<W>>,
    format: OutputFormat,
}

impl<W> Clone for EventWriter<W> {
    fn clone(&self) -> Self {
        Self {
            writer: Arc::clone(&self.writer),
            format: self.format,
        }
    }
}

impl<W: Write + Send + 'static> EventWriter<W> {
    pub fn new(writer: W, format: OutputFormat) -> Self {
        Self {
            writer: Arc::new(Mutex::new(writer)),
            format,
        }
    }

    /// Subscriber that writes to this target. Write failures abort the
    /// dispatch and surface from the chain call.
    pub fn subscriber(&self) -> Subscriber {
        let target = self.clone();
        Subscriber::new(move |event| target.write_event(event))
    }

    /// Runs `f` against the underlying writer, e.g. to inspect a buffer.
    pub fn with_writer<R>(&self, f: impl FnOnce(&W) -> R) -> R {
        let writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        f(&writer)
    }

    fn write_event(&self, event: &Event) -> Result<(), SubscriberError> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        match self.format {
            OutputFormat::Jsonl => {
                serde_json::to_writer(&mut *writer, event)?;
                writer.write_all(b"\n")?;
            }
            OutputFormat::Pretty => {
                let json = serde_json::to_string(event)?;
                writeln!(writer, "{:<30} {json}", event.type_name())?;
            }
            OutputFormat::Sse => {
                let json = serde_json::to_string(event)?;
                write!(writer, "data: {json}\n\n")?;
            }
        }
        writer.flush()?;
        Ok(())
    }
}
