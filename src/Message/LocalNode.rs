// The in-process node: binds command tables to dispatchers and runs the
// request/response state machine.

use crate::Core::SharedObject::{Lifecycle, ObjectStatus, SharedHeader, SharedRef};
use crate::Message::Dispatcher::Dispatcher;
use crate::Message::Node::{MessageNode, RemoteService};
use crate::Message::Router;
use crate::Message::Structs::MessageContext::{MessageContext, RequestType};
use crate::Message::Structs::ServiceDef::ServiceDef;
use crate::config::{NodeId, Priority, ServiceId, RESPONSE_PRIORITY};
use crate::error::{RouterError, RouterResult, Undelivered};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct LocalNode {
    header: SharedHeader,
}

impl LocalNode {
    pub fn new() -> Self {
        Self {
            header: SharedHeader::new(),
        }
    }
}

impl Default for LocalNode {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle for LocalNode {
    fn header(&self) -> &SharedHeader {
        &self.header
    }
}

impl MessageNode for LocalNode {
    fn node_id(&self) -> NodeId {
        NodeId::Local
    }

    fn init(&self) -> RouterResult<()> {
        self.header.set_status(ObjectStatus::Running);
        Ok(())
    }

    fn create_remote_service(
        &self,
        def: Arc<ServiceDef>,
        dispatcher: SharedRef<Dispatcher>,
    ) -> RouterResult<SharedRef<dyn RemoteService>> {
        def.validate()?;
        if let Some(level) = def.max_priority_level() {
            if level >= dispatcher.priority_levels() {
                return Err(RouterError::invalid(
                    "command priority exceeds the dispatcher's levels",
                ));
            }
        }

        let service: Box<dyn RemoteService> = Box::new(LocalNodeService {
            header: SharedHeader::new(),
            service_id: def.service_id(),
            def,
            dispatcher: Mutex::new(Some(dispatcher)),
        });
        Ok(SharedRef::from_box(service))
    }
}

/// A [`ServiceDef`] bound to the dispatcher that runs its queued work.
pub struct LocalNodeService {
    header: SharedHeader,
    service_id: ServiceId,
    def: Arc<ServiceDef>,
    dispatcher: Mutex<Option<SharedRef<Dispatcher>>>,
}

impl LocalNodeService {
    fn dispatcher(&self) -> Option<SharedRef<Dispatcher>> {
        self.dispatcher.lock().as_ref().and_then(|d| d.try_ref())
    }

    fn priority_of(&self, msg: &MessageContext) -> Option<Priority> {
        self.def.message(msg.command_id).map(|def| def.priority)
    }

    fn append(&self, priority: Priority, msg: Box<MessageContext>) -> Result<(), Undelivered> {
        match self.dispatcher() {
            Some(dispatcher) => dispatcher.append_message(priority, msg),
            None => Err(Undelivered::new(
                RouterError::wrong_status(ObjectStatus::ToDestroy),
                msg,
            )),
        }
    }

    /// Runs the command handler, storing its status in the envelope.
    fn invoke(&self, msg: &mut MessageContext) {
        let ctx = msg.context();
        msg.response_status = match self.def.message(msg.command_id).and_then(|m| m.handler.clone()) {
            Some(handler) => handler(&ctx, &msg.req_data, &mut msg.rsp_data),
            None => Err(RouterError::NoSuchCommand {
                service_id: self.service_id,
                command_id: msg.command_id,
            }),
        };
    }

    /// Same-process synchronous request: handled on the caller's thread.
    fn handle_inline(&self, mut msg: Box<MessageContext>) -> Result<(), Undelivered> {
        if self.priority_of(&msg).is_none() {
            let error = RouterError::NoSuchCommand {
                service_id: self.service_id,
                command_id: msg.command_id,
            };
            return Err(Undelivered::new(error, msg));
        }
        self.invoke(&mut msg);
        msg.set_to_response();
        msg.complete();
        Ok(())
    }
}

impl Lifecycle for LocalNodeService {
    fn header(&self) -> &SharedHeader {
        &self.header
    }

    fn destroy(&self) {
        debug!(service_id = self.service_id, "releasing local service");
        self.dispatcher.lock().take();
    }
}

impl RemoteService for LocalNodeService {
    fn service_id(&self) -> ServiceId {
        self.service_id
    }

    fn send_message(&self, msg: Box<MessageContext>) -> Result<(), Undelivered> {
        match msg.request_type {
            RequestType::SyncReq if !msg.cross_node => self.handle_inline(msg),
            RequestType::SyncRsp => {
                msg.complete();
                Ok(())
            }
            RequestType::SyncReq | RequestType::AsyncReq => match self.priority_of(&msg) {
                Some(priority) => self.append(priority, msg),
                None => {
                    let error = RouterError::NoSuchCommand {
                        service_id: self.service_id,
                        command_id: msg.command_id,
                    };
                    Err(Undelivered::new(error, msg))
                }
            },
            RequestType::AsyncRsp => self.append(RESPONSE_PRIORITY, msg),
        }
    }

    fn handle_request(&self, mut msg: Box<MessageContext>) {
        self.invoke(&mut msg);
        msg.set_to_response();

        if msg.is_oneway() {
            return;
        }

        if let Err(undelivered) = Router::send_message(msg) {
            warn!(
                service_id = self.service_id,
                error = %undelivered.error,
                "failed to route response back to sender"
            );
            undelivered.release();
        }
    }
}

/// Entry point for every envelope a dispatcher worker pops.
pub(crate) fn handle_message(msg: Box<MessageContext>) {
    if !msg.request_type.is_request() {
        msg.complete();
        return;
    }

    match Router::ref_remote_service(msg.receiver_id) {
        Some(service) => service.handle_request(msg),
        None => {
            let error = RouterError::NoSuchService {
                service_id: msg.receiver_id,
            };
            msg.fail(error);
        }
    }
}
