/// Identifiers stamped on the run lifecycle events.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RunOptions {
    #[serde(rename = "threadId", default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(rename = "runId", default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
}

impl RunOptions {
    pub fn new(thread_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            thread_id: Some(thread_id.into()),
            run_id: Some(run_id.into()),
        }
    }

    pub fn with_thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    /// Shallow merge: fields set in `update` replace ours, unset fields are kept.
    pub fn merge(&mut self, update: RunOptions) {
        if let Some(thread_id) = update.thread_id {
            self.thread_id = Some(thread_id);
        }
        if let Some(run_id) = update.run_id {
            self.run_id = Some(run_id);
        }
    }
}
