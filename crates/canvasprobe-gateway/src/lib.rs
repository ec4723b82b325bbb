//! Boundary between the control model and the browser.
//!
//! [`Gateway`] is the asynchronous contract a browser bridge implements.
//! [`PollBridge`] adapts it for callers that must stay synchronous, such as
//! formula extension functions, by blocking on a fixed poll interval until the
//! call completes or the configured timeout elapses.

mod bridge;
mod gateway;
mod wire;

pub use bridge::{BridgeSettings, CallState, PollBridge};
pub use gateway::{Gateway, fetch_item_count, fetch_property, fetch_snapshot};
pub use wire::{ControlDescriptor, ModelSnapshot, PropertyDescriptor, PropertyValueEnvelope};
