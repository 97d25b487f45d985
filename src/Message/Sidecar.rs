// Client-facing handle of one registered service.

use crate::Message::Router;
use crate::Message::Structs::MessageBuffer::MessageBuffer;
use crate::Message::Structs::MessageContext::{MessageCallback, MessageContext, SyncCompletion};
use crate::Message::Structs::ServiceDef::ServiceDef;
use crate::config::{CommandId, DispatcherId, ServiceConfig, ServiceId, MAX_SERVICES};
use crate::error::{RouterError, RouterResult};
use std::sync::Arc;

/// Sends messages on behalf of the service it was created for.
///
/// Responses to asynchronous requests are delivered on this service's
/// dispatcher thread.
#[derive(Debug)]
pub struct Sidecar {
    service_id: ServiceId,
    dispatcher_id: DispatcherId,
}

impl Sidecar {
    /// Registers `def` on the configured dispatcher and returns its sidecar.
    pub fn create(def: ServiceDef, config: &ServiceConfig) -> RouterResult<Self> {
        let service_id = def.service_id();
        Router::register_local_service(config.dispatcher_id, def)?;
        Ok(Self {
            service_id,
            dispatcher_id: config.dispatcher_id,
        })
    }

    /// Unregisters the service.
    pub fn destroy(self) -> RouterResult<()> {
        Router::unregister_local_service(self.dispatcher_id, self.service_id)
    }

    pub fn service_id(&self) -> ServiceId {
        self.service_id
    }

    pub fn dispatcher_id(&self) -> DispatcherId {
        self.dispatcher_id
    }

    fn validate(&self, receiver: ServiceId) -> RouterResult<()> {
        if receiver as usize >= MAX_SERVICES {
            return Err(RouterError::invalid("receiver id out of range"));
        }
        if self.service_id as usize >= MAX_SERVICES {
            return Err(RouterError::invalid("sidecar bound to an invalid service id"));
        }
        Ok(())
    }

    /// Fire-and-forget: returns once the request is accepted. The response
    /// is discarded by the receiving side.
    pub fn send_oneway_message(
        &self,
        receiver: ServiceId,
        command_id: CommandId,
        req: Option<MessageBuffer>,
    ) -> RouterResult<()> {
        self.validate(receiver)?;
        let msg = MessageContext::async_request(
            self.service_id,
            receiver,
            command_id,
            req.unwrap_or_default(),
            None,
        );
        Router::send_message(msg).map_err(RouterError::from)
    }

    /// Queues a request; `callback` runs once with the response. A missing
    /// callback is rejected, use [`send_oneway_message`](Self::send_oneway_message).
    pub fn send_async_message(
        &self,
        receiver: ServiceId,
        command_id: CommandId,
        req: Option<MessageBuffer>,
        callback: Option<MessageCallback>,
    ) -> RouterResult<()> {
        self.validate(receiver)?;
        let Some(callback) = callback else {
            return Err(RouterError::invalid("async message without callback, use oneway"));
        };
        let msg = MessageContext::async_request(
            self.service_id,
            receiver,
            command_id,
            req.unwrap_or_default(),
            Some(callback),
        );
        Router::send_message(msg).map_err(RouterError::from)
    }

    /// Sends a request and blocks the calling thread until the handler's
    /// response arrives. The handler's status is returned; its response
    /// payload lands in `rsp`.
    pub fn send_sync_message(
        &self,
        receiver: ServiceId,
        command_id: CommandId,
        req: Option<&MessageBuffer>,
        rsp: Option<&mut MessageBuffer>,
    ) -> RouterResult<()> {
        self.validate(receiver)?;
        let completion = SyncCompletion::new();
        let msg = MessageContext::sync_request(
            self.service_id,
            receiver,
            command_id,
            req.cloned().unwrap_or_default(),
            MessageBuffer::new(),
            Arc::clone(&completion),
        );
        Router::send_message(msg)?;

        let outcome = completion.wait();
        if let Some(rsp) = rsp {
            *rsp = outcome.response;
        }
        outcome.status
    }
}
