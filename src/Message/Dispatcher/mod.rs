// A worker thread plus the bounded priority queue it drains.

use crate::Core::PriorityQueue::PriorityQueue;
use crate::Core::Semaphore::Semaphore;
use crate::Core::SharedObject::{Lifecycle, ObjectStatus, SharedHeader, SharedRef};
use crate::Message::LocalNode::handle_message;
use crate::Message::Structs::MessageContext::MessageContext;
use crate::config::{DispatcherConfig, DispatcherId, Priority};
use crate::error::{RouterError, RouterResult, Undelivered};
use parking_lot::Mutex;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};
mod debug;
mod getters;

/// Owns one priority queue and one worker thread.
///
/// Status moves `Stopped -> Starting -> Running -> Stopping -> ToDestroy`.
/// The worker holds its own reference and releases it when it exits.
pub struct Dispatcher {
    header: SharedHeader,
    dispatcher_id: DispatcherId,
    queue: PriorityQueue<Box<MessageContext>>,
    poll_timeout: Duration,
    push_timeout: Duration,
    started: Semaphore,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Builds a stopped dispatcher. Nothing runs until [`Dispatcher::start`].
    pub fn create(config: &DispatcherConfig) -> RouterResult<SharedRef<Dispatcher>> {
        let queue = PriorityQueue::new(config.queue_size, config.priority_levels)?;
        Ok(SharedRef::new(Dispatcher {
            header: SharedHeader::new(),
            dispatcher_id: config.dispatcher_id,
            queue,
            poll_timeout: config.poll_timeout,
            push_timeout: config.push_timeout,
            started: Semaphore::new(0),
            worker: Mutex::new(None),
        }))
    }

    /// Spawns the worker and waits until it reports `Running`.
    pub fn start(this: &SharedRef<Dispatcher>) -> RouterResult<()> {
        if !this.header.transition(ObjectStatus::Stopped, ObjectStatus::Starting) {
            return Err(RouterError::wrong_status(this.status()));
        }

        let Some(worker_ref) = this.try_ref() else {
            this.header.transition(ObjectStatus::Starting, ObjectStatus::Stopped);
            return Err(RouterError::wrong_status(this.status()));
        };

        let spawned = thread::Builder::new()
            .name(format!("msg-dispatcher-{}", this.dispatcher_id))
            .spawn(move || Dispatcher::run(worker_ref));

        match spawned {
            Ok(handle) => *this.worker.lock() = Some(handle),
            Err(e) => {
                warn!(dispatcher_id = this.dispatcher_id, error = %e, "failed to spawn dispatcher thread");
                this.header.transition(ObjectStatus::Starting, ObjectStatus::Stopped);
                return Err(RouterError::ResourceExhausted);
            }
        }

        this.started.wait();
        match this.status() {
            ObjectStatus::Running => {
                info!(dispatcher_id = this.dispatcher_id, "dispatcher running");
                Ok(())
            }
            status => Err(RouterError::wrong_status(status)),
        }
    }

    /// Queues `msg` at `priority`. Only a running dispatcher accepts work.
    pub fn append_message(
        &self,
        priority: Priority,
        msg: Box<MessageContext>,
    ) -> Result<(), Undelivered> {
        let status = self.status();
        if status != ObjectStatus::Running {
            return Err(Undelivered::new(RouterError::wrong_status(status), msg));
        }

        self.queue
            .push(priority, msg, self.push_timeout)
            .map_err(|e| {
                let error = match e.error {
                    // closed under us: the worker is already draining
                    RouterError::NotSupported => RouterError::wrong_status(self.status()),
                    other => other,
                };
                Undelivered::new(error, e.item)
            })
    }

    /// Asks the worker to stop. No-op unless `Starting` or `Running`.
    pub fn shutdown(&self) {
        let stopped = self
            .header
            .transition(ObjectStatus::Running, ObjectStatus::Stopping)
            || self
                .header
                .transition(ObjectStatus::Starting, ObjectStatus::Stopping);
        if stopped {
            debug!(dispatcher_id = self.dispatcher_id, "dispatcher stopping");
            self.queue.wake();
        }
    }

    /// Waits for the worker thread to exit. Never joins from the worker itself.
    pub fn join(&self) {
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                warn!(dispatcher_id = self.dispatcher_id, "dispatcher thread panicked");
            }
        }
    }

    fn run(this: SharedRef<Dispatcher>) {
        this.header
            .transition(ObjectStatus::Starting, ObjectStatus::Running);
        this.started.post();

        while this.status() == ObjectStatus::Running {
            if let Some(msg) = this.queue.pop(this.poll_timeout) {
                handle_message(msg);
            }
        }

        this.queue.close();
        let pending = this.drain_pending();
        this.header.set_status(ObjectStatus::ToDestroy);
        info!(
            dispatcher_id = this.dispatcher_id,
            pending, "dispatcher stopped"
        );
    }

    /// Fails every queued envelope so no caller waits on a dead queue.
    fn drain_pending(&self) -> usize {
        let pending = self.queue.drain();
        let count = pending.len();
        for msg in pending {
            msg.fail(RouterError::NotSupported);
        }
        count
    }
}

impl Lifecycle for Dispatcher {
    fn header(&self) -> &SharedHeader {
        &self.header
    }

    fn destroy(&self) {
        self.queue.close();
        let pending = self.drain_pending();
        if pending > 0 {
            warn!(dispatcher_id = self.dispatcher_id, pending, "released queued messages on destroy");
        }
    }
}
