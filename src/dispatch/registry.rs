//! Callback registry for delivering messages to consumers.
//!
//! Callbacks live in two ordered lists: system callbacks, used internally
//! for session state tracking, and user callbacks. A dispatch runs every
//! matching system callback, then every matching user callback, awaiting
//! each in turn.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use chatwire::dispatch::CallbackRegistry;
//! use chatwire::irc::{Command, Message};
//!
//! # async fn run() {
//! let registry = CallbackRegistry::<Message>::new();
//!
//! registry.add(Some(vec![Command::Privmsg]), |msg: Arc<Message>| async move {
//!     println!("{}", msg.last_param());
//!     Ok(())
//! });
//!
//! let msg = Arc::new(Message::parse("PRIVMSG #c :hello").unwrap());
//! assert_eq!(registry.dispatch(&msg).await, 1);
//! # }
//! ```

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::RwLock;

use crate::error::Result;

/// Result type for callback functions.
pub type CallbackResult = Result<()>;

/// Boxed future for callback results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A message that can be routed by kind.
pub trait Dispatchable: Send + Sync + 'static {
    /// The closed set of message kinds used by callback filters.
    type Kind: PartialEq + Clone + fmt::Debug + Send + Sync + 'static;

    /// This message's kind.
    fn kind(&self) -> Self::Kind;
}

/// Trait for callback functions.
pub trait Callback<M>: Send + Sync + 'static {
    /// Handle one message.
    fn call(&self, msg: Arc<M>) -> BoxFuture<'static, CallbackResult>;
}

impl<M, F, Fut> Callback<M> for F
where
    F: Fn(Arc<M>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CallbackResult> + Send + 'static,
{
    fn call(&self, msg: Arc<M>) -> BoxFuture<'static, CallbackResult> {
        Box::pin(self(msg))
    }
}

/// Identifies a registered callback for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

/// Which list a callback belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    System,
    User,
}

/// A registered callback and its optional kind filter.
pub struct Registration<M: Dispatchable> {
    id: CallbackId,
    /// Fires for every message when `None`.
    filter: Option<Vec<M::Kind>>,
    callback: Box<dyn Callback<M>>,
}

impl<M: Dispatchable> Registration<M> {
    pub fn id(&self) -> CallbackId {
        self.id
    }

    /// Check whether this registration fires for `kind`.
    pub fn matches(&self, kind: &M::Kind) -> bool {
        match &self.filter {
            Some(kinds) => kinds.contains(kind),
            None => true,
        }
    }
}

/// Ordered system and user callback lists.
pub struct CallbackRegistry<M: Dispatchable> {
    system: RwLock<Vec<Arc<Registration<M>>>>,
    user: RwLock<Vec<Arc<Registration<M>>>>,
    next_id: AtomicU64,
}

impl<M: Dispatchable> CallbackRegistry<M> {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            system: RwLock::new(Vec::new()),
            user: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register an internal callback. System callbacks always run before
    /// user callbacks.
    pub fn add_system<F, Fut>(&self, filter: Option<Vec<M::Kind>>, callback: F) -> CallbackId
    where
        F: Fn(Arc<M>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CallbackResult> + Send + 'static,
    {
        self.insert(Tier::System, filter, Box::new(callback))
    }

    /// Register a user callback.
    pub fn add<F, Fut>(&self, filter: Option<Vec<M::Kind>>, callback: F) -> CallbackId
    where
        F: Fn(Arc<M>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CallbackResult> + Send + 'static,
    {
        self.insert(Tier::User, filter, Box::new(callback))
    }

    fn insert(
        &self,
        tier: Tier,
        filter: Option<Vec<M::Kind>>,
        callback: Box<dyn Callback<M>>,
    ) -> CallbackId {
        let id = CallbackId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let registration = Arc::new(Registration {
            id,
            filter,
            callback,
        });
        match tier {
            Tier::System => self.system.write().push(registration),
            Tier::User => self.user.write().push(registration),
        }
        id
    }

    /// Remove a callback from either list. Returns `false` if unknown.
    ///
    /// A dispatch already in progress still sees the callback.
    pub fn remove(&self, id: CallbackId) -> bool {
        for list in [&self.system, &self.user] {
            let mut list = list.write();
            if let Some(pos) = list.iter().position(|r| r.id == id) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    /// Number of registered callbacks, system and user.
    pub fn len(&self) -> usize {
        self.system.read().len() + self.user.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the matching callbacks, system first.
    fn snapshot(&self, kind: &M::Kind) -> Vec<Arc<Registration<M>>> {
        let system = self.system.read();
        let user = self.user.read();
        system
            .iter()
            .chain(user.iter())
            .filter(|r| r.matches(kind))
            .cloned()
            .collect()
    }

    /// Deliver a message to every matching callback.
    ///
    /// Errors and panics are logged and do not stop the remaining
    /// callbacks. Returns the number of callbacks invoked.
    pub async fn dispatch(&self, msg: &Arc<M>) -> usize {
        let kind = msg.kind();
        let registrations = self.snapshot(&kind);

        for registration in &registrations {
            let id = registration.id;
            let fut = match std::panic::catch_unwind(AssertUnwindSafe(|| {
                registration.callback.call(msg.clone())
            })) {
                Ok(fut) => fut,
                Err(_) => {
                    tracing::error!(?id, ?kind, "Callback panicked");
                    continue;
                }
            };

            match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!(?id, ?kind, "Callback error: {}", e);
                }
                Err(_) => {
                    tracing::error!(?id, ?kind, "Callback panicked");
                }
            }
        }

        registrations.len()
    }
}

impl<M: Dispatchable> Default for CallbackRegistry<M> {
    fn default() -> Self {
        Self::new()
    }
}
