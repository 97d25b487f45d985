//! Error taxonomy shared by every router operation.

use crate::Core::SharedObject::ObjectStatus;
use crate::Message::Structs::MessageContext::MessageContext;
use crate::config::{CommandId, DispatcherId, ServiceId};

/// Errors reported by the router, its dispatchers and its nodes.
///
/// A command handler's own failure travels as [`RouterError::Handler`]; it is
/// response data, not a routing failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouterError {
    /// A required pointer or payload was missing.
    #[error("null input")]
    NullInput,

    /// The operation is not valid in the current lifecycle state.
    #[error("wrong status: {status:?}")]
    WrongStatus {
        /// The status observed when the operation was attempted.
        status: ObjectStatus,
    },

    /// No live service is registered under this id.
    #[error("no such service: {service_id}")]
    NoSuchService {
        /// The service that could not be resolved.
        service_id: ServiceId,
    },

    /// No live dispatcher is registered under this id.
    #[error("no such dispatcher: {dispatcher_id}")]
    NoSuchDispatcher {
        /// The dispatcher that could not be resolved.
        dispatcher_id: DispatcherId,
    },

    /// The service has no handler for this command.
    #[error("no such command: service {service_id} command {command_id}")]
    NoSuchCommand {
        /// The receiving service.
        service_id: ServiceId,
        /// The command that is out of range or unset.
        command_id: CommandId,
    },

    /// The service id is already taken.
    #[error("service id conflict: {service_id}")]
    ServiceIdConflict {
        /// The conflicting id.
        service_id: ServiceId,
    },

    /// The dispatcher id is already taken.
    #[error("dispatcher id conflict: {dispatcher_id}")]
    DispatcherIdConflict {
        /// The conflicting id.
        dispatcher_id: DispatcherId,
    },

    /// A queue was full or a thread/allocation could not be obtained.
    #[error("resource exhausted")]
    ResourceExhausted,

    /// The global registry lock could not be acquired.
    #[error("mutex operation failed")]
    MutexOperationFailed,

    /// The node or dispatcher does not implement the requested operation.
    #[error("not supported")]
    NotSupported,

    /// An argument was outside its valid range.
    #[error("invalid parameter: {reason}")]
    ParameterInvalid {
        /// What was wrong with the argument.
        reason: &'static str,
    },

    /// A command handler completed with a non-zero status.
    #[error("handler failed with status {0}")]
    Handler(i32),
}

/// Result alias used across the crate.
pub type RouterResult<T> = Result<T, RouterError>;

impl RouterError {
    /// Stable integer code used by the C entry points. Success is `0`.
    pub fn code(&self) -> i32 {
        match self {
            RouterError::NullInput => -1,
            RouterError::WrongStatus { .. } => -2,
            RouterError::NoSuchService { .. } => -3,
            RouterError::NoSuchDispatcher { .. } => -4,
            RouterError::NoSuchCommand { .. } => -5,
            RouterError::ServiceIdConflict { .. } => -6,
            RouterError::DispatcherIdConflict { .. } => -7,
            RouterError::ResourceExhausted => -8,
            RouterError::MutexOperationFailed => -9,
            RouterError::NotSupported => -10,
            RouterError::ParameterInvalid { .. } => -11,
            RouterError::Handler(status) => *status,
        }
    }

    pub(crate) fn wrong_status(status: ObjectStatus) -> Self {
        RouterError::WrongStatus { status }
    }

    pub(crate) fn invalid(reason: &'static str) -> Self {
        RouterError::ParameterInvalid { reason }
    }
}

/// An envelope the router could not take ownership of.
///
/// The message is handed back untouched so the caller decides whether to
/// release its waiter ([`MessageContext::fail`]) or to drop it and report
/// `error` directly.
pub struct Undelivered {
    pub error: RouterError,
    pub message: Box<MessageContext>,
}

impl Undelivered {
    pub(crate) fn new(error: RouterError, message: Box<MessageContext>) -> Self {
        Self { error, message }
    }

    /// Completes the envelope with the routing error, waking any waiter.
    pub fn release(self) {
        self.message.fail(self.error);
    }
}

impl std::fmt::Debug for Undelivered {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Undelivered")
            .field("error", &self.error)
            .field("message", &self.message)
            .finish()
    }
}

impl From<Undelivered> for RouterError {
    fn from(undelivered: Undelivered) -> Self {
        undelivered.error
    }
}
