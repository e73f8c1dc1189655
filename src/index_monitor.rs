use crate::model::IndexProgress;
use crate::service::{ServiceHandle, ServiceRequest};
use crate::timer::TimerSlot;
use std::time::{Duration, Instant};

pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexLifecycle {
    #[default]
    Idle,
    Building,
    Ready,
}

/// Mirrors the background index build. The progress copy is a cache of what
/// the service last reported, never the source of truth.
#[derive(Debug, Default)]
pub struct IndexLifecycleMonitor {
    state: IndexLifecycle,
    progress: IndexProgress,
    file_count: Option<usize>,
    poll: TimerSlot,
    awaiting_persisted: bool,
}

impl IndexLifecycleMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> IndexLifecycle {
        self.state
    }

    pub fn progress(&self) -> &IndexProgress {
        &self.progress
    }

    pub fn file_count(&self) -> Option<usize> {
        self.file_count
    }

    /// The shared fact the rest of the system reads: the index is usable and
    /// holds this many entries.
    pub fn ready_file_count(&self) -> Option<usize> {
        match self.state {
            IndexLifecycle::Ready => Some(self.file_count.unwrap_or(self.progress.total_files)),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state == IndexLifecycle::Ready
    }

    /// Waiting on the service: either the saved-index check or a build.
    pub fn is_waiting(&self) -> bool {
        self.awaiting_persisted || self.state == IndexLifecycle::Building
    }

    pub fn is_polling(&self) -> bool {
        self.poll.is_pending()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.poll.deadline()
    }

    /// Asks the service for a previously saved index.
    pub fn start(&mut self, service: &ServiceHandle) {
        if self.state != IndexLifecycle::Idle || self.awaiting_persisted {
            return;
        }
        self.awaiting_persisted = service.send(ServiceRequest::LoadPersistedIndex);
        if !self.awaiting_persisted {
            tracing::warn!("index service is unavailable");
        }
    }

    pub fn finish_persisted(
        &mut self,
        result: Result<bool, String>,
        now: Instant,
        service: &ServiceHandle,
    ) {
        if !self.awaiting_persisted {
            return;
        }
        self.awaiting_persisted = false;
        let found = result.unwrap_or_else(|error| {
            tracing::warn!(error = %error, "could not load saved index");
            false
        });
        if found {
            tracing::info!("loaded saved index");
            self.become_ready(service);
        } else {
            tracing::info!("no saved index; starting a fresh build");
            self.begin_build(now, service);
        }
    }

    /// User-triggered re-index. Only valid when no build is running.
    pub fn reindex(&mut self, now: Instant, service: &ServiceHandle) -> bool {
        if self.state == IndexLifecycle::Building || self.awaiting_persisted {
            return false;
        }
        self.begin_build(now, service);
        true
    }

    fn begin_build(&mut self, now: Instant, service: &ServiceHandle) {
        self.state = IndexLifecycle::Building;
        self.progress = IndexProgress::default();
        if !service.send(ServiceRequest::StartIndexBuild) {
            tracing::warn!("cannot start index build: service unavailable");
            self.abandon_build();
            return;
        }
        self.poll.schedule(now, POLL_INTERVAL);
    }

    fn abandon_build(&mut self) {
        self.poll.cancel();
        self.state = if self.file_count.is_some() {
            IndexLifecycle::Ready
        } else {
            IndexLifecycle::Idle
        };
    }

    pub fn finish_build_started(&mut self, result: Result<(), String>) {
        if let Err(error) = result {
            tracing::warn!(error = %error, "index build failed to start");
            if self.state == IndexLifecycle::Building {
                self.abandon_build();
            }
        }
    }

    /// Sends a progress poll when the interval elapses. Returns true if one
    /// went out.
    pub fn tick(&mut self, now: Instant, service: &ServiceHandle) -> bool {
        if self.state != IndexLifecycle::Building {
            self.poll.cancel();
            return false;
        }
        if !self.poll.fire_if_due(now) {
            return false;
        }
        self.poll.schedule(now, POLL_INTERVAL);
        service.send(ServiceRequest::IndexProgress)
    }

    /// Applies a progress sample. Returns true on the one transition from
    /// Building to Ready.
    pub fn finish_progress(
        &mut self,
        result: Result<IndexProgress, String>,
        service: &ServiceHandle,
    ) -> bool {
        if self.state != IndexLifecycle::Building {
            return false;
        }
        let progress = match result {
            Ok(progress) => progress,
            Err(error) => {
                tracing::warn!(error = %error, "index progress poll failed");
                return false;
            }
        };
        let complete = progress.is_complete;
        self.progress = progress;
        if complete {
            tracing::info!(files = self.progress.total_files, "index build complete");
            self.become_ready(service);
        }
        complete
    }

    fn become_ready(&mut self, service: &ServiceHandle) {
        self.poll.cancel();
        self.state = IndexLifecycle::Ready;
        // The final tally can exceed the last progress sample.
        if !service.send(ServiceRequest::IndexedFileCount) {
            tracing::warn!("cannot fetch indexed file count: service unavailable");
        }
    }

    pub fn finish_file_count(&mut self, result: Result<usize, String>) {
        match result {
            Ok(count) => {
                self.file_count = Some(count);
                self.progress.total_files = count;
            }
            Err(error) => tracing::warn!(error = %error, "failed to fetch indexed file count"),
        }
    }

    pub fn cancel_timers(&mut self) {
        self.poll.cancel();
    }
}
