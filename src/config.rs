// Identifiers, limits and builder-style configuration for the router.

use std::time::Duration;

pub type ServiceId = u8;
pub type DispatcherId = u8;
pub type CommandId = u32;
pub type Priority = u8;

/// Number of service slots in the registry.
pub const MAX_SERVICES: usize = 64;

/// Number of dispatcher slots in the registry.
pub const MAX_DISPATCHERS: usize = 16;

/// Number of node slots (local + remote).
pub const MAX_NODES: usize = 2;

/// Highest reference count a shared object hands out.
pub const MAX_REF_COUNT: u32 = 0x7FFF_FFFF;

/// Dispatcher used by services that do not ask for a dedicated one.
pub const DEFAULT_DISPATCHER_ID: DispatcherId = 0;

pub const DEFAULT_QUEUE_SIZE: usize = 128;
pub const DEFAULT_PRIORITY_LEVELS: u8 = 2;

/// How long a worker waits on an empty queue before re-checking its status.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(1000);

/// How long a producer waits for room in a full queue.
pub const DEFAULT_PUSH_TIMEOUT: Duration = Duration::from_millis(1000);

/// Upper bound on waiting for the global registry lock.
pub const REGISTRY_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// Priority used when queueing asynchronous responses back to the sender.
pub const RESPONSE_PRIORITY: Priority = 0;

/// `DispatchToMessage` packs the service id above the low 16 command bits.
pub const COMMAND_ID_BITS: u32 = 16;
pub const COMMAND_ID_MASK: u32 = (1 << COMMAND_ID_BITS) - 1;

bitflags::bitflags! {
    /// Which message nodes the router brings up at start.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct NodeConfig: u32 {
        /// This process. Always created.
        const LOCAL = 0b01;
        /// A remote (kernel or userspace) node provided by the installed factory.
        const REMOTE = 0b10;
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig::LOCAL
    }
}

/// Identifies a node slot in the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeId {
    Local = 0,
    Remote = 1,
}

impl NodeId {
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Construction parameters for one dispatcher.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub(crate) dispatcher_id: DispatcherId,
    pub(crate) queue_size: usize,
    pub(crate) priority_levels: u8,
    pub(crate) poll_timeout: Duration,
    pub(crate) push_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            dispatcher_id: DEFAULT_DISPATCHER_ID,
            queue_size: DEFAULT_QUEUE_SIZE,
            priority_levels: DEFAULT_PRIORITY_LEVELS,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            push_timeout: DEFAULT_PUSH_TIMEOUT,
        }
    }
}

impl DispatcherConfig {
    pub fn new(dispatcher_id: DispatcherId) -> Self {
        Self {
            dispatcher_id,
            ..Self::default()
        }
    }

    pub fn with_queue_size(mut self, size: usize) -> Self {
        self.queue_size = size;
        self
    }

    pub fn with_priority_levels(mut self, levels: u8) -> Self {
        self.priority_levels = levels;
        self
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    pub fn with_push_timeout(mut self, timeout: Duration) -> Self {
        self.push_timeout = timeout;
        self
    }

    pub fn dispatcher_id(&self) -> DispatcherId {
        self.dispatcher_id
    }

    pub fn queue_size(&self) -> usize {
        self.queue_size
    }

    pub fn priority_levels(&self) -> u8 {
        self.priority_levels
    }
}

/// Where a service created through a sidecar is bound.
#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    pub(crate) dispatcher_id: DispatcherId,
}

impl ServiceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dispatcher_id(mut self, dispatcher_id: DispatcherId) -> Self {
        self.dispatcher_id = dispatcher_id;
        self
    }

    pub fn dispatcher_id(&self) -> DispatcherId {
        self.dispatcher_id
    }
}
