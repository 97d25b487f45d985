// The envelope: one request or response in flight.

use super::MessageBuffer::MessageBuffer;
use crate::Core::Semaphore::Semaphore;
use crate::config::{CommandId, ServiceId};
use crate::error::{RouterError, RouterResult};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestType {
    SyncReq,
    AsyncReq,
    SyncRsp,
    AsyncRsp,
}

impl RequestType {
    pub fn is_request(self) -> bool {
        matches!(self, RequestType::SyncReq | RequestType::AsyncReq)
    }

    pub fn is_sync(self) -> bool {
        matches!(self, RequestType::SyncReq | RequestType::SyncRsp)
    }

    /// The response kind a request turns into. Responses map to themselves.
    pub fn to_response(self) -> Self {
        match self {
            RequestType::SyncReq | RequestType::SyncRsp => RequestType::SyncRsp,
            RequestType::AsyncReq | RequestType::AsyncRsp => RequestType::AsyncRsp,
        }
    }
}

/// Read-only view of an envelope's routing fields, handed to command handlers
/// and async callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    pub command_id: CommandId,
    pub sender_id: ServiceId,
    pub receiver_id: ServiceId,
    pub request_type: RequestType,
    pub cross_node: bool,
    /// Set for requests that entered through `dispatch_to_message`.
    pub client_handle: Option<u64>,
}

/// Invoked once with the request, the response and the handler's status.
pub type MessageCallback =
    Box<dyn FnOnce(&RequestContext, &MessageBuffer, &MessageBuffer, RouterResult<()>) + Send>;

/// What a synchronous caller gets back when its envelope completes.
pub struct SyncOutcome {
    pub status: RouterResult<()>,
    pub response: MessageBuffer,
}

/// Completion slot a synchronous caller blocks on.
pub struct SyncCompletion {
    done: Semaphore,
    outcome: Mutex<Option<SyncOutcome>>,
}

impl SyncCompletion {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            done: Semaphore::new(0),
            outcome: Mutex::new(None),
        })
    }

    fn post(&self, outcome: SyncOutcome) {
        *self.outcome.lock() = Some(outcome);
        self.done.post();
    }

    /// Blocks until the envelope is completed, on whichever thread completes it.
    pub fn wait(&self) -> SyncOutcome {
        self.done.wait();
        self.outcome.lock().take().unwrap_or(SyncOutcome {
            status: Err(RouterError::NotSupported),
            response: MessageBuffer::new(),
        })
    }

    pub fn is_posted(&self) -> bool {
        self.done.available() > 0
    }
}

/// How the originator learns about completion. A semaphore and a callback
/// can never both be present.
enum Reply {
    Sync(Arc<SyncCompletion>),
    Async(Option<MessageCallback>),
    Released,
}

/// One request or response in flight.
///
/// Exactly one side owns the envelope at a time; it travels as
/// `Box<MessageContext>` through queues and is consumed by [`complete`]
/// or [`fail`].
///
/// [`complete`]: MessageContext::complete
/// [`fail`]: MessageContext::fail
pub struct MessageContext {
    pub command_id: CommandId,
    pub sender_id: ServiceId,
    pub receiver_id: ServiceId,
    pub request_type: RequestType,
    pub cross_node: bool,
    pub client_handle: Option<u64>,
    pub req_data: MessageBuffer,
    pub rsp_data: MessageBuffer,
    pub response_status: RouterResult<()>,
    reply: Reply,
}

impl MessageContext {
    fn build(
        sender_id: ServiceId,
        receiver_id: ServiceId,
        command_id: CommandId,
        request_type: RequestType,
        req_data: MessageBuffer,
        rsp_data: MessageBuffer,
        reply: Reply,
    ) -> Box<Self> {
        Box::new(Self {
            command_id,
            sender_id,
            receiver_id,
            request_type,
            cross_node: false,
            client_handle: None,
            req_data,
            rsp_data,
            response_status: Ok(()),
            reply,
        })
    }

    pub fn sync_request(
        sender_id: ServiceId,
        receiver_id: ServiceId,
        command_id: CommandId,
        req_data: MessageBuffer,
        rsp_data: MessageBuffer,
        completion: Arc<SyncCompletion>,
    ) -> Box<Self> {
        Self::build(
            sender_id,
            receiver_id,
            command_id,
            RequestType::SyncReq,
            req_data,
            rsp_data,
            Reply::Sync(completion),
        )
    }

    /// `callback == None` makes this a oneway message.
    pub fn async_request(
        sender_id: ServiceId,
        receiver_id: ServiceId,
        command_id: CommandId,
        req_data: MessageBuffer,
        callback: Option<MessageCallback>,
    ) -> Box<Self> {
        Self::build(
            sender_id,
            receiver_id,
            command_id,
            RequestType::AsyncReq,
            req_data,
            MessageBuffer::new(),
            Reply::Async(callback),
        )
    }

    pub fn context(&self) -> RequestContext {
        RequestContext {
            command_id: self.command_id,
            sender_id: self.sender_id,
            receiver_id: self.receiver_id,
            request_type: self.request_type,
            cross_node: self.cross_node,
            client_handle: self.client_handle,
        }
    }

    /// Turns a request into its response: swaps the addresses and advances
    /// the request type.
    pub fn set_to_response(&mut self) {
        std::mem::swap(&mut self.sender_id, &mut self.receiver_id);
        self.request_type = self.request_type.to_response();
    }

    /// An async message whose sender asked for no reply.
    pub fn is_oneway(&self) -> bool {
        matches!(self.reply, Reply::Async(None))
    }

    pub fn has_callback(&self) -> bool {
        matches!(self.reply, Reply::Async(Some(_)))
    }

    /// Delivers the envelope to its originator: posts the sync waiter or runs
    /// the async callback, then releases it.
    pub fn complete(mut self: Box<Self>) {
        match std::mem::replace(&mut self.reply, Reply::Released) {
            Reply::Sync(completion) => {
                let status = std::mem::replace(&mut self.response_status, Ok(()));
                completion.post(SyncOutcome {
                    status,
                    response: std::mem::take(&mut self.rsp_data),
                });
            }
            Reply::Async(Some(callback)) => {
                let ctx = self.context();
                let status = self.response_status.clone();
                callback(&ctx, &self.req_data, &self.rsp_data, status);
            }
            Reply::Async(None) | Reply::Released => {}
        }
    }

    /// Completes the envelope with `error` so no waiter is left blocked.
    pub fn fail(mut self: Box<Self>, error: RouterError) {
        self.response_status = Err(error);
        self.complete();
    }
}

impl Drop for MessageContext {
    fn drop(&mut self) {
        // A synchronous waiter must never outlive its envelope unanswered.
        if let Reply::Sync(completion) = std::mem::replace(&mut self.reply, Reply::Released) {
            completion.post(SyncOutcome {
                status: Err(RouterError::NotSupported),
                response: MessageBuffer::new(),
            });
        }
    }
}

impl std::fmt::Debug for MessageContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        crate::Debug::StructDebug::debug_message_context(self, f)
    }
}

impl MessageContext {
    pub(crate) fn reply_kind(&self) -> &'static str {
        match self.reply {
            Reply::Sync(_) => "sync",
            Reply::Async(Some(_)) => "async",
            Reply::Async(None) => "oneway",
            Reply::Released => "released",
        }
    }
}
