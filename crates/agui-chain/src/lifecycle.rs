use crate::event::EventPayload;
use crate::options::RunOptions;

/// Started/finished flags for one run. Each flips to `true` once and stays.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct RunLifecycle {
    started: bool,
    finished: bool,
}

impl RunLifecycle {
    pub(crate) fn has_started(&self) -> bool {
        self.started
    }

    pub(crate) fn has_finished(&self) -> bool {
        self.finished
    }

    /// Marks the run started. Returns `true` only on the first call.
    pub(crate) fn begin(&mut self) -> bool {
        !std::mem::replace(&mut self.started, true)
    }

    /// Marks the run finished. Returns `true` only on the first call.
    pub(crate) fn finish(&mut self) -> bool {
        !std::mem::replace(&mut self.finished, true)
    }
}

pub(crate) fn run_started_payload(options: &RunOptions) -> EventPayload {
    EventPayload::RunStarted {
        thread_id: options.thread_id.clone(),
        run_id: options.run_id.clone(),
    }
}

pub(crate) fn run_finished_payload(options: &RunOptions) -> EventPayload {
    EventPayload::RunFinished {
        thread_id: options.thread_id.clone(),
        run_id: options.run_id.clone(),
    }
}
