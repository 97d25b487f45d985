// The seam where transports plug in: nodes host services, remote services
// accept envelopes.

use crate::Core::SharedObject::{Lifecycle, SharedRef};
use crate::Message::Dispatcher::Dispatcher;
use crate::Message::Structs::MessageContext::MessageContext;
use crate::Message::Structs::ServiceDef::ServiceDef;
use crate::config::{NodeId, ServiceId};
use crate::error::{RouterError, RouterResult, Undelivered};
use std::sync::Arc;

/// Where services live: this process, or a kernel/userspace peer.
///
/// Hooks other than [`create_remote_service`](MessageNode::create_remote_service)
/// are optional; a transport that cannot sync its peer's services keeps the
/// default `NotSupported`.
pub trait MessageNode: Lifecycle {
    fn node_id(&self) -> NodeId;

    fn init(&self) -> RouterResult<()> {
        Ok(())
    }

    /// Binds `def` to this node, queueing through `dispatcher` where the node
    /// executes work locally.
    fn create_remote_service(
        &self,
        def: Arc<ServiceDef>,
        dispatcher: SharedRef<Dispatcher>,
    ) -> RouterResult<SharedRef<dyn RemoteService>>;

    /// Pulls the services its peer advertises into the router.
    fn sync_service(&self) -> RouterResult<()> {
        Err(RouterError::NotSupported)
    }

    fn notify_service_add(&self, _def: &ServiceDef) -> RouterResult<()> {
        Ok(())
    }

    fn notify_service_del(&self, _service_id: ServiceId) -> RouterResult<()> {
        Ok(())
    }
}

/// A routable service as the router sees it.
pub trait RemoteService: Lifecycle {
    fn service_id(&self) -> ServiceId;

    /// Takes ownership of `msg`. On `Err` the envelope is handed back
    /// untouched and its waiter has not been signalled.
    fn send_message(&self, msg: Box<MessageContext>) -> Result<(), Undelivered>;

    /// Runs a queued request popped by a dispatcher worker.
    fn handle_request(&self, msg: Box<MessageContext>) {
        msg.fail(RouterError::NotSupported);
    }
}

/// Builds the remote node when the router starts with `NodeConfig::REMOTE`.
pub type RemoteNodeFactory =
    Arc<dyn Fn() -> RouterResult<SharedRef<dyn MessageNode>> + Send + Sync>;
