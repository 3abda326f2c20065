//! Keyword auto-replies: the response handler registry, the per-session
//! listener registry and the dispatcher that connects inbound messages to
//! handlers.
//!
//! Flow: inbound message → self-message filter → scope check → keyword match →
//! handler lookup → handler invocation (failures isolated per listener).

pub mod builtin;
pub mod dispatch;
pub mod handler;
pub mod listeners;

pub use {
    dispatch::{DispatchReport, Dispatcher},
    handler::{HandlerInfo, HandlerRegistry, ResponseHandler, parse_options},
    listeners::{AddListener, ListenerRegistry},
};
