// Static command table a service registers with the router.

use super::MessageBuffer::MessageBuffer;
use super::MessageContext::RequestContext;
use crate::config::{CommandId, Priority, ServiceId, COMMAND_ID_MASK};
use crate::error::{RouterError, RouterResult};
use std::sync::Arc;

/// A command handler: reads the request, writes the response, returns its status.
pub type MessageHandler =
    Arc<dyn Fn(&RequestContext, &MessageBuffer, &mut MessageBuffer) -> RouterResult<()> + Send + Sync>;

/// One slot of the command table. A slot without a handler is a gap.
#[derive(Clone)]
pub struct MessageDef {
    pub handler: Option<MessageHandler>,
    pub priority: Priority,
}

/// A service id together with its command table, indexed by command id.
#[derive(Clone)]
pub struct ServiceDef {
    service_id: ServiceId,
    messages: Vec<MessageDef>,
    /// First command id given that the encoded id cannot carry.
    rejected_command: Option<CommandId>,
}

impl ServiceDef {
    pub fn new(service_id: ServiceId) -> Self {
        Self {
            service_id,
            messages: Vec::new(),
            rejected_command: None,
        }
    }

    /// Installs `handler` for `command_id` at `priority` (0 is highest).
    ///
    /// A `command_id` above `COMMAND_ID_MASK` is not installed; registering
    /// the definition then fails with `ParameterInvalid`.
    pub fn with_message<F>(mut self, command_id: CommandId, handler: F, priority: Priority) -> Self
    where
        F: Fn(&RequestContext, &MessageBuffer, &mut MessageBuffer) -> RouterResult<()>
            + Send
            + Sync
            + 'static,
    {
        if command_id > COMMAND_ID_MASK {
            self.rejected_command = self.rejected_command.or(Some(command_id));
            return self;
        }

        let index = command_id as usize;
        if self.messages.len() <= index {
            self.messages.resize(
                index + 1,
                MessageDef {
                    handler: None,
                    priority: 0,
                },
            );
        }
        self.messages[index] = MessageDef {
            handler: Some(Arc::new(handler)),
            priority,
        };
        self
    }

    pub fn service_id(&self) -> ServiceId {
        self.service_id
    }

    pub fn messages(&self) -> &[MessageDef] {
        &self.messages
    }

    /// The handler entry for `command_id`, if the table defines one.
    pub fn message(&self, command_id: CommandId) -> Option<&MessageDef> {
        self.messages
            .get(command_id as usize)
            .filter(|def| def.handler.is_some())
    }

    /// Fails if any command id was out of range when the table was built.
    pub fn validate(&self) -> RouterResult<()> {
        match self.rejected_command {
            Some(_) => Err(RouterError::invalid("command id does not fit the encoded message id")),
            None => Ok(()),
        }
    }

    /// The numerically largest (least urgent) level any command uses.
    pub fn max_priority_level(&self) -> Option<Priority> {
        self.messages
            .iter()
            .filter(|def| def.handler.is_some())
            .map(|def| def.priority)
            .max()
    }
}

impl std::fmt::Debug for ServiceDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceDef")
            .field("service_id", &self.service_id)
            .field("commands", &self.messages.len())
            .finish_non_exhaustive()
    }
}
