// Process-wide registry of nodes, dispatchers and services, and the routing
// entry points built on it.

use crate::Core::SharedObject::{Lifecycle, ObjectStatus, SharedRef};
use crate::Message::Dispatcher::Dispatcher;
use crate::Message::LocalNode::LocalNode;
use crate::Message::Node::{MessageNode, RemoteNodeFactory, RemoteService};
use crate::Message::Structs::MessageBuffer::MessageBuffer;
use crate::Message::Structs::MessageContext::{MessageContext, SyncCompletion};
use crate::Message::Structs::ServiceDef::ServiceDef;
use crate::config::{
    DispatcherConfig, DispatcherId, NodeConfig, NodeId, ServiceId, COMMAND_ID_BITS,
    COMMAND_ID_MASK, MAX_DISPATCHERS, MAX_NODES, MAX_SERVICES, REGISTRY_LOCK_TIMEOUT,
};
use crate::error::{RouterError, RouterResult, Undelivered};
use lazy_static::lazy_static;
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

struct ServiceEntry {
    service: SharedRef<dyn RemoteService>,
    node_id: NodeId,
    dispatcher_id: DispatcherId,
}

struct RouterState {
    status: ObjectStatus,
    services: Vec<Option<ServiceEntry>>,
    dispatchers: Vec<Option<SharedRef<Dispatcher>>>,
    nodes: Vec<Option<SharedRef<dyn MessageNode>>>,
}

impl RouterState {
    fn new() -> Self {
        Self {
            status: ObjectStatus::Stopped,
            services: (0..MAX_SERVICES).map(|_| None).collect(),
            dispatchers: (0..MAX_DISPATCHERS).map(|_| None).collect(),
            nodes: (0..MAX_NODES).map(|_| None).collect(),
        }
    }

    fn ensure_running(&self) -> RouterResult<()> {
        if self.status == ObjectStatus::Running {
            Ok(())
        } else {
            Err(RouterError::wrong_status(self.status))
        }
    }

    fn node(&self, node_id: NodeId) -> RouterResult<&SharedRef<dyn MessageNode>> {
        self.nodes[node_id.index()]
            .as_ref()
            .ok_or(RouterError::NotSupported)
    }

    fn ref_dispatcher(&self, dispatcher_id: DispatcherId) -> RouterResult<SharedRef<Dispatcher>> {
        self.dispatchers
            .get(dispatcher_id as usize)
            .and_then(|slot| slot.as_ref())
            .and_then(|d| d.try_ref())
            .ok_or(RouterError::NoSuchDispatcher { dispatcher_id })
    }

    fn ref_service(&self, service_id: ServiceId) -> Option<SharedRef<dyn RemoteService>> {
        self.services
            .get(service_id as usize)
            .and_then(|slot| slot.as_ref())
            .and_then(|entry| entry.service.try_ref())
    }
}

lazy_static! {
    static ref REGISTRY: RwLock<RouterState> = RwLock::new(RouterState::new());
    static ref REMOTE_NODE_FACTORY: Mutex<Option<RemoteNodeFactory>> = Mutex::new(None);
}

fn lock_registry() -> RouterResult<RwLockWriteGuard<'static, RouterState>> {
    REGISTRY.try_write_for(REGISTRY_LOCK_TIMEOUT).ok_or_else(|| {
        error!("unable to acquire the router registry lock");
        RouterError::MutexOperationFailed
    })
}

fn read_registry() -> RouterResult<RwLockReadGuard<'static, RouterState>> {
    REGISTRY.try_read_for(REGISTRY_LOCK_TIMEOUT).ok_or_else(|| {
        error!("unable to acquire the router registry lock for reading");
        RouterError::MutexOperationFailed
    })
}

/// Installs (or clears) the constructor used for `NodeConfig::REMOTE`.
pub fn set_remote_node_factory(factory: Option<RemoteNodeFactory>) {
    *REMOTE_NODE_FACTORY.lock() = factory;
}

pub fn router_status() -> ObjectStatus {
    match read_registry() {
        Ok(state) => state.status,
        Err(_) => ObjectStatus::Stopping,
    }
}

fn create_nodes(config: NodeConfig) -> RouterResult<Vec<Option<SharedRef<dyn MessageNode>>>> {
    let mut nodes: Vec<Option<SharedRef<dyn MessageNode>>> = (0..MAX_NODES).map(|_| None).collect();

    let local: Box<dyn MessageNode> = Box::new(LocalNode::new());
    nodes[NodeId::Local.index()] = Some(SharedRef::from_box(local));

    if config.contains(NodeConfig::REMOTE) {
        let factory = REMOTE_NODE_FACTORY
            .lock()
            .clone()
            .ok_or(RouterError::NotSupported)?;
        let remote = factory()?;
        if remote.node_id() != NodeId::Remote {
            return Err(RouterError::invalid("remote factory built a non-remote node"));
        }
        nodes[NodeId::Remote.index()] = Some(remote);
    }

    for node in nodes.iter().flatten() {
        node.init()?;
    }
    Ok(nodes)
}

/// Brings the router up with the local node and any configured remote node.
/// A no-op when already starting or running.
pub fn start_message_router(config: NodeConfig) -> RouterResult<()> {
    let mut state = lock_registry()?;
    match state.status {
        ObjectStatus::Running | ObjectStatus::Starting => return Ok(()),
        ObjectStatus::Stopped => {}
        status => return Err(RouterError::wrong_status(status)),
    }

    state.status = ObjectStatus::Starting;
    match create_nodes(config) {
        Ok(nodes) => {
            state.nodes = nodes;
            state.status = ObjectStatus::Running;
            info!(?config, "message router started");
            Ok(())
        }
        Err(e) => {
            state.status = ObjectStatus::Stopped;
            warn!(error = %e, "message router failed to start");
            Err(e)
        }
    }
}

/// Releases every service, stops and joins every dispatcher, then drops the
/// nodes. A no-op when already stopped.
pub fn shutdown_message_router() -> RouterResult<()> {
    let (services, dispatchers, nodes) = {
        let mut state = lock_registry()?;
        match state.status {
            ObjectStatus::Stopped | ObjectStatus::Stopping => return Ok(()),
            _ => {}
        }
        state.status = ObjectStatus::Stopping;
        let services: Vec<ServiceEntry> = state.services.iter_mut().filter_map(Option::take).collect();
        let dispatchers: Vec<SharedRef<Dispatcher>> =
            state.dispatchers.iter_mut().filter_map(Option::take).collect();
        let nodes: Vec<SharedRef<dyn MessageNode>> =
            state.nodes.iter_mut().filter_map(Option::take).collect();
        (services, dispatchers, nodes)
    };

    // Workers may still route responses while we tear down; the lock is
    // free so they observe empty tables rather than blocking.
    drop(services);
    for dispatcher in &dispatchers {
        dispatcher.shutdown();
    }
    for dispatcher in &dispatchers {
        dispatcher.join();
    }
    drop(dispatchers);
    for node in &nodes {
        node.header().set_status(ObjectStatus::Stopping);
    }
    drop(nodes);

    lock_registry()?.status = ObjectStatus::Stopped;
    info!("message router stopped");
    Ok(())
}

/// Creates, starts and registers a dispatcher. Nothing is left behind on failure.
#[instrument(skip(config), fields(dispatcher_id = config.dispatcher_id))]
pub fn add_dispatcher(config: DispatcherConfig) -> RouterResult<DispatcherId> {
    let dispatcher_id = config.dispatcher_id;
    if dispatcher_id as usize >= MAX_DISPATCHERS {
        return Err(RouterError::invalid("dispatcher id out of range"));
    }

    {
        let state = read_registry()?;
        state.ensure_running()?;
        if state.dispatchers[dispatcher_id as usize].is_some() {
            return Err(RouterError::DispatcherIdConflict { dispatcher_id });
        }
    }

    // The worker thread starts without the registry lock held.
    let dispatcher = Dispatcher::create(&config)?;
    if let Err(e) = Dispatcher::start(&dispatcher) {
        stop_dispatcher(dispatcher);
        return Err(e);
    }

    if let Err((e, dispatcher)) = insert_dispatcher(dispatcher_id, dispatcher) {
        debug!(error = %e, "dispatcher not registered after start");
        stop_dispatcher(dispatcher);
        return Err(e);
    }
    debug!("dispatcher registered");
    Ok(dispatcher_id)
}

/// Takes the slot for a started dispatcher, handing it back if the router
/// stopped or another dispatcher won the id meanwhile.
fn insert_dispatcher(
    dispatcher_id: DispatcherId,
    dispatcher: SharedRef<Dispatcher>,
) -> Result<(), (RouterError, SharedRef<Dispatcher>)> {
    let mut state = match lock_registry() {
        Ok(state) => state,
        Err(e) => return Err((e, dispatcher)),
    };
    if let Err(e) = state.ensure_running() {
        return Err((e, dispatcher));
    }
    let slot = &mut state.dispatchers[dispatcher_id as usize];
    if slot.is_some() {
        return Err((RouterError::DispatcherIdConflict { dispatcher_id }, dispatcher));
    }
    *slot = Some(dispatcher);
    Ok(())
}

fn stop_dispatcher(dispatcher: SharedRef<Dispatcher>) {
    dispatcher.shutdown();
    dispatcher.join();
}

/// Adds the dispatcher with the default configuration.
pub fn enable_default_dispatcher() -> RouterResult<()> {
    add_dispatcher(DispatcherConfig::default()).map(|_| ())
}

/// A counted handle to a registered dispatcher, for inspection.
pub fn ref_dispatcher(dispatcher_id: DispatcherId) -> Option<SharedRef<Dispatcher>> {
    read_registry().ok()?.ref_dispatcher(dispatcher_id).ok()
}

/// Announces a new service to every node except `origin`. If one refuses,
/// the nodes already told are told to forget it again.
fn advertise_service(
    nodes: &[Option<SharedRef<dyn MessageNode>>],
    origin: NodeId,
    def: &ServiceDef,
) -> RouterResult<()> {
    let mut notified: Vec<&SharedRef<dyn MessageNode>> = Vec::new();
    for node in nodes.iter().flatten().filter(|n| n.node_id() != origin) {
        if let Err(e) = node.notify_service_add(def) {
            warn!(
                service_id = def.service_id(),
                node = ?node.node_id(),
                error = %e,
                "service advertisement refused, rolling back"
            );
            for done in notified.iter().rev() {
                if let Err(e) = done.notify_service_del(def.service_id()) {
                    warn!(node = ?done.node_id(), error = %e, "rollback notification failed");
                }
            }
            return Err(e);
        }
        notified.push(node);
    }
    Ok(())
}

fn withdraw_service(nodes: &[Option<SharedRef<dyn MessageNode>>], origin: NodeId, service_id: ServiceId) {
    for node in nodes.iter().flatten().filter(|n| n.node_id() != origin) {
        if let Err(e) = node.notify_service_del(service_id) {
            warn!(service_id, node = ?node.node_id(), error = %e, "service removal notification failed");
        }
    }
}

/// Binds `def` to `dispatcher_id` on the local node and makes it routable.
#[instrument(skip(def), fields(service_id = def.service_id()))]
pub fn register_local_service(dispatcher_id: DispatcherId, def: ServiceDef) -> RouterResult<()> {
    let service_id = def.service_id();
    if service_id as usize >= MAX_SERVICES {
        return Err(RouterError::invalid("service id out of range"));
    }
    let def = Arc::new(def);

    let mut state = lock_registry()?;
    state.ensure_running()?;
    if state.services[service_id as usize].is_some() {
        return Err(RouterError::ServiceIdConflict { service_id });
    }

    let dispatcher = state.ref_dispatcher(dispatcher_id)?;
    let service = state
        .node(NodeId::Local)?
        .create_remote_service(Arc::clone(&def), dispatcher)?;
    advertise_service(&state.nodes, NodeId::Local, &def)?;

    state.services[service_id as usize] = Some(ServiceEntry {
        service,
        node_id: NodeId::Local,
        dispatcher_id,
    });
    debug!(dispatcher_id, "service registered");
    Ok(())
}

/// Removes a local service previously registered on `dispatcher_id`.
#[instrument]
pub fn unregister_local_service(dispatcher_id: DispatcherId, service_id: ServiceId) -> RouterResult<()> {
    if service_id as usize >= MAX_SERVICES {
        return Err(RouterError::invalid("service id out of range"));
    }

    let entry = {
        let mut state = lock_registry()?;
        state.ensure_running()?;
        let slot = &mut state.services[service_id as usize];
        match slot {
            Some(entry) if entry.node_id == NodeId::Local && entry.dispatcher_id == dispatcher_id => {}
            Some(_) => {
                return Err(RouterError::invalid(
                    "service is not bound to this node and dispatcher",
                ))
            }
            None => return Err(RouterError::NoSuchService { service_id }),
        }
        let entry = slot.take();
        withdraw_service(&state.nodes, NodeId::Local, service_id);
        entry
    };

    // Final release may drain a dispatcher and run callbacks: keep it
    // outside the lock.
    drop(entry);
    debug!("service unregistered");
    Ok(())
}

fn lookup_service(service_id: ServiceId) -> Option<SharedRef<dyn RemoteService>> {
    read_registry().ok()?.ref_service(service_id)
}

/// Resolves and references a service. On a miss, asks remote nodes to sync
/// their services once and retries.
pub fn ref_remote_service(service_id: ServiceId) -> Option<SharedRef<dyn RemoteService>> {
    if service_id as usize >= MAX_SERVICES {
        return None;
    }
    if let Some(service) = lookup_service(service_id) {
        return Some(service);
    }

    let remotes: Vec<SharedRef<dyn MessageNode>> = {
        let state = read_registry().ok()?;
        state
            .nodes
            .iter()
            .flatten()
            .filter(|n| n.node_id() != NodeId::Local)
            .filter_map(|n| n.try_ref())
            .collect()
    };
    if remotes.is_empty() {
        return None;
    }

    for node in &remotes {
        if let Err(e) = node.sync_service() {
            debug!(node = ?node.node_id(), error = %e, "service sync skipped");
        }
    }
    lookup_service(service_id)
}

/// Hands `msg` to the service named by its receiver id.
pub fn send_message(msg: Box<MessageContext>) -> Result<(), Undelivered> {
    match ref_remote_service(msg.receiver_id) {
        Some(service) => service.send_message(msg),
        None => {
            let error = RouterError::NoSuchService {
                service_id: msg.receiver_id,
            };
            Err(Undelivered::new(error, msg))
        }
    }
}

/// Splits a `DispatchToMessage` id into `(service, command)`.
pub fn decode_message_id(encoded_id: u32) -> RouterResult<(ServiceId, u32)> {
    let service = encoded_id >> COMMAND_ID_BITS;
    if service as usize >= MAX_SERVICES {
        return Err(RouterError::invalid("encoded service id out of range"));
    }
    Ok((service as ServiceId, encoded_id & COMMAND_ID_MASK))
}

/// Entry point for external callers addressing a command by numeric id.
///
/// The request is cross-node, so it always queues on the target's
/// dispatcher; the calling thread blocks until the response arrives.
pub fn dispatch_to_message(
    client_handle: u64,
    encoded_id: u32,
    req: Option<&MessageBuffer>,
    rsp: Option<&mut MessageBuffer>,
) -> RouterResult<()> {
    let (service_id, command_id) = decode_message_id(encoded_id)?;

    let completion = SyncCompletion::new();
    let mut msg = MessageContext::sync_request(
        service_id,
        service_id,
        command_id,
        req.cloned().unwrap_or_default(),
        MessageBuffer::new(),
        Arc::clone(&completion),
    );
    msg.cross_node = true;
    msg.client_handle = Some(client_handle);

    send_message(msg)?;
    let outcome = completion.wait();
    if let Some(rsp) = rsp {
        *rsp = outcome.response;
    }
    outcome.status
}
