use crate::Core::SharedObject::SharedHeader;
use crate::Message::Dispatcher::Dispatcher;
use crate::Message::Structs::MessageContext::MessageContext;
use std::fmt;

/// Debug function for Dispatcher
///
/// Shows:
/// - Dispatcher ID and lifecycle status
/// - Queue occupancy against its capacity
/// - Number of priority levels
pub fn debug_dispatcher(dispatcher: &Dispatcher, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Dispatcher")
        .field("dispatcher_id", &dispatcher.dispatcher_id())
        .field("status", &dispatcher.status())
        .field(
            "queue",
            &format_args!("{}/{}", dispatcher.pending(), dispatcher.queue_capacity()),
        )
        .field("priority_levels", &dispatcher.priority_levels())
        .finish_non_exhaustive()
}

/// Debug function for MessageContext
///
/// Payloads are summarised by length; the completion handle is shown by kind
/// only so formatting never touches a waiter.
pub fn debug_message_context(msg: &MessageContext, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MessageContext")
        .field("command_id", &msg.command_id)
        .field("sender_id", &msg.sender_id)
        .field("receiver_id", &msg.receiver_id)
        .field("request_type", &msg.request_type)
        .field("cross_node", &msg.cross_node)
        .field("req_len", &msg.req_data.len())
        .field("rsp_len", &msg.rsp_data.len())
        .field("status", &msg.response_status)
        .field("reply", &msg.reply_kind())
        .finish()
}

/// Debug function for SharedHeader
pub fn debug_shared_header(header: &SharedHeader, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SharedHeader")
        .field("status", &header.status())
        .field("ref_count", &header.ref_count())
        .finish()
}
