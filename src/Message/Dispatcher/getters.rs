use super::*;

/// Read-only accessors for monitoring and tests.
impl Dispatcher {
    pub fn dispatcher_id(&self) -> DispatcherId {
        self.dispatcher_id
    }

    pub fn status(&self) -> ObjectStatus {
        self.header.status()
    }

    /// Number of envelopes waiting in the queue.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn priority_levels(&self) -> u8 {
        self.queue.level_count()
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue.capacity()
    }

    pub fn poll_timeout(&self) -> Duration {
        self.poll_timeout
    }
}
