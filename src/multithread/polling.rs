//! Polling-based asynchronous operation monitoring
//!
//! This module provides a way to monitor asynchronous operations through
//! polling. It provides maximal performance in scenarios where a client does
//! not need to synchronize with an asynchronous operation, but only to
//! periodically check its status, as is the case for example when updating
//! progress bars and status graphs in user interfaces.
//!
//! A `StatusMonitor` is fed by the progress and completion callbacks of the
//! operation through a triple buffer, so reading it never contends with the
//! producer. Status transitions which do not come with a progress report,
//! such as scheduling, are only observed at the next progress report.

use crate::client::AsyncOpClient;
use crate::op::AsyncOpResult;
use crate::status::AsyncOpStatus;
use parking_lot::Mutex;
use std::sync::Arc;
use triple_buffer::{Input, Output, TripleBuffer};


/// Snapshot of an asynchronous operation's status and progress
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Snapshot {
    /// Status of the operation
    pub status: AsyncOpStatus,

    /// Progress of the operation, between 0 and 1
    pub progress: f32,
}


/// Writing side of a status monitor
struct MonitorFeed {
    /// New snapshots will be sent through this triple buffer
    input: Input<Snapshot>,

    /// Set once the final snapshot has been written
    done: bool,
}
//
impl MonitorFeed {
    /// Publish a progress report of a running operation
    fn report_progress(&mut self, progress: f32) {
        // A progress report may race with completion, which must win
        if !self.done {
            self.input.write(Snapshot {
                status: AsyncOpStatus::Running,
                progress,
            });
        }
    }

    /// Publish the final snapshot
    fn report_completion(&mut self, status: AsyncOpStatus) {
        self.done = true;
        self.input.write(Snapshot { status, progress: 1.0 });
    }
}


/// Wait-free polling interface to an asynchronous operation
pub struct StatusMonitor {
    /// Current snapshot will be read through this triple buffer
    output: Output<Snapshot>,
}
//
impl StatusMonitor {
    /// Start monitoring some asynchronous operation
    pub(crate) fn new<T: AsyncOpResult>(op: &AsyncOpClient<T>) -> Self {
        let initial = Snapshot {
            status: op.status(),
            progress: op.progress(),
        };
        let (input, output) = TripleBuffer::new(&initial).split();
        let feed = Arc::new(Mutex::new(MonitorFeed {
            input,
            done: initial.status.is_final(),
        }));

        let progress_feed = feed.clone();
        let _ = op.try_add_progress_callback(move |progress| {
            progress_feed.lock().report_progress(progress);
        }, None);
        op.add_completion_callback(move |op: &AsyncOpClient<T>| {
            feed.lock().report_completion(op.status());
        }, None);

        StatusMonitor { output }
    }

    /// Access the latest snapshot of the operation
    pub fn snapshot(&mut self) -> Snapshot {
        *self.output.read()
    }

    /// Latest known status of the operation
    pub fn status(&mut self) -> AsyncOpStatus {
        self.snapshot().status
    }

    /// Latest known progress of the operation
    pub fn progress(&mut self) -> f32 {
        self.snapshot().progress
    }
}


impl<T: AsyncOpResult> AsyncOpClient<T> {
    /// Build a polling monitor for this operation
    pub fn monitor(&self) -> StatusMonitor {
        StatusMonitor::new(self)
    }
}
