//! Queue-based callback executor, for consumers which own an event loop
//!
//! Some consumers, such as UI or game update loops, must run every piece of
//! consumer code on one specific thread. This executor lets callbacks which
//! fire on other threads be posted to a queue, which the owner thread drains
//! whenever it sees fit. It is also convenient for deterministic tests.

use crate::executor::{CallbackExecutor, Job};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::thread::{self, ThreadId};


/// CallbackExecutor which queues jobs until its owner thread runs them
pub struct QueueCallbackExecutor {
    /// Thread which is considered to belong to this executor
    owner: ThreadId,

    /// Jobs which have been posted, but not run yet
    queue: Mutex<VecDeque<Job>>,
}
//
impl QueueCallbackExecutor {
    /// Create a queue owned by the calling thread
    pub fn new() -> Self {
        Self::with_owner(thread::current().id())
    }

    /// Create a queue owned by some other thread
    pub fn with_owner(owner: ThreadId) -> Self {
        QueueCallbackExecutor {
            owner,
            queue: Mutex::new(VecDeque::new()),
        }
    }

    /// Number of jobs waiting to be run
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Run queued jobs until the queue is empty, including jobs which are
    /// posted while doing so, and tell how many jobs were run
    pub fn run_pending(&self) -> usize {
        let mut count = 0;
        loop {
            // The lock must not be held while a job runs, as jobs may post
            let job = self.queue.lock().pop_front();
            match job {
                Some(job) => {
                    job();
                    count += 1;
                }
                None => return count,
            }
        }
    }
}
//
impl Default for QueueCallbackExecutor {
    fn default() -> Self {
        Self::new()
    }
}
//
impl CallbackExecutor for QueueCallbackExecutor {
    fn execute(&self, job: Job) {
        self.queue.lock().push_back(job);
    }

    fn is_current(&self) -> bool {
        thread::current().id() == self.owner
    }
}
