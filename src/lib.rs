// Module naming follows project convention (capitalised subsystem modules)
#[allow(non_snake_case)]
pub mod Core {
    pub mod PriorityQueue;
    pub mod Semaphore;
    pub mod SharedObject;
    pub mod futex;
    pub use SharedObject::{Lifecycle, ObjectStatus, SharedHeader, SharedRef};
}
#[allow(non_snake_case)]
pub mod Message {
    pub mod Dispatcher;
    pub mod LocalNode;
    pub mod Node;
    pub mod Router;
    pub mod Sidecar;
    pub mod Structs {
        pub mod MessageBuffer;
        pub mod MessageContext;
        pub mod ServiceDef;
        pub use MessageBuffer::MessageReader;
        pub use MessageContext::{MessageCallback, RequestContext, RequestType};
        pub use ServiceDef::{MessageDef, MessageHandler};
    }
}
#[allow(non_snake_case)]
pub mod Debug {
    pub mod StructDebug;
}

pub mod config;
pub mod error;
pub mod ffi;

pub use config::{DispatcherConfig, NodeConfig, ServiceConfig};
pub use error::{RouterError, RouterResult};
pub use Message::Router::{
    add_dispatcher, dispatch_to_message, enable_default_dispatcher, register_local_service,
    shutdown_message_router, start_message_router, unregister_local_service,
};
pub use Message::Sidecar::Sidecar;
pub use Message::Structs::MessageBuffer::MessageBuffer;
pub use Message::Structs::ServiceDef::ServiceDef;
