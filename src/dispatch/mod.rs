//! Ordered message dispatch.
//!
//! - [`CallbackRegistry`]: system and user callbacks with kind filters
//! - [`DispatchQueue`]: bounded FIFO with a single in-order worker

mod queue;
mod registry;

pub use queue::DispatchQueue;
pub use registry::{
    BoxFuture, Callback, CallbackId, CallbackRegistry, CallbackResult, Dispatchable, Registration,
};
