//! Handler registry.
//!
//! Handlers are stored per channel name in registration order. Every
//! registration returns a [`HandlerId`] that can later be passed to
//! [`HandlerRegistry::unregister`].
//!
//! The registry belongs to one client instance; two clients in the same
//! process never see each other's handlers.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use linex_core::context::{PostbackContext, TextMessageContext};
use linex_core::{Channel, EventContext};
use parking_lot::RwLock;
use tracing::debug;

use crate::command::{ArgsHandler, command_handler, postback_handler};
use crate::error::{RegistrationError, RegistrationResult};
use crate::handler::{
    BoxedHandler, BoxedReadyHandler, Handler, IntoHandlerResult, into_handler, into_ready_handler,
};

/// Identifies one registered handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler#{}", self.0)
    }
}

struct Entry {
    id: HandlerId,
    handler: BoxedHandler,
    route: Option<Route>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Route {
    Command(String),
    Postback(String),
}

/// Per-channel handler lists plus startup handlers.
#[derive(Default)]
pub struct HandlerRegistry {
    channels: RwLock<HashMap<String, Vec<Entry>>>,
    ready: RwLock<Vec<(HandlerId, BoxedReadyHandler)>>,
    routes: RwLock<HashSet<Route>>,
    next_id: AtomicU64,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> HandlerId {
        HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn insert(&self, channel: &str, handler: BoxedHandler, route: Option<Route>) -> HandlerId {
        let id = self.next_id();
        self.channels
            .write()
            .entry(channel.to_string())
            .or_default()
            .push(Entry { id, handler, route });
        debug!(channel, %id, "Registered handler");
        id
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Registers a handler on a channel by name.
    ///
    /// Any name is accepted, so handlers can listen on custom channels fed
    /// through `emit`.
    pub fn register<F, T>(&self, channel: impl AsRef<str>, handler: F) -> HandlerId
    where
        F: Handler<T>,
        T: 'static,
    {
        self.insert(channel.as_ref(), into_handler(handler), None)
    }

    /// Registers a handler on the channel of context type `C`.
    pub fn on<C, F, T>(&self, handler: F) -> HandlerId
    where
        C: EventContext,
        F: Handler<T>,
        T: 'static,
    {
        self.insert(C::CHANNEL.as_str(), into_handler(handler), None)
    }

    /// Registers a command handler on the `text` channel.
    pub fn command<F, T>(&self, name: impl Into<String>, handler: F) -> RegistrationResult<HandlerId>
    where
        F: ArgsHandler<TextMessageContext, T>,
        T: 'static,
    {
        let name = name.into();
        if let Some(index) = <F as ArgsHandler<TextMessageContext, T>>::misplaced_rest() {
            return Err(RegistrationError::MisplacedRest { name, index });
        }
        let route = Route::Command(name.clone());
        if !self.routes.write().insert(route.clone()) {
            return Err(RegistrationError::DuplicateCommand(name));
        }
        Ok(self.insert(
            Channel::Text.as_str(),
            command_handler(name, handler),
            Some(route),
        ))
    }

    /// Registers a postback route on the `postback` channel.
    pub fn postback<F, T>(
        &self,
        name: impl Into<String>,
        handler: F,
    ) -> RegistrationResult<HandlerId>
    where
        F: ArgsHandler<PostbackContext, T>,
        T: 'static,
    {
        let name = name.into();
        if let Some(index) = <F as ArgsHandler<PostbackContext, T>>::misplaced_rest() {
            return Err(RegistrationError::MisplacedRest { name, index });
        }
        let route = Route::Postback(name.clone());
        if !self.routes.write().insert(route.clone()) {
            return Err(RegistrationError::DuplicatePostback(name));
        }
        Ok(self.insert(
            Channel::Postback.as_str(),
            postback_handler(name, handler),
            Some(route),
        ))
    }

    /// Registers a handler run once at startup with the bot's own account.
    pub fn on_ready<F, Fut>(&self, handler: F) -> HandlerId
    where
        F: Fn(std::sync::Arc<linex_core::model::BotUser>) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: IntoHandlerResult,
    {
        let id = self.next_id();
        self.ready.write().push((id, into_ready_handler(handler)));
        debug!(%id, "Registered ready handler");
        id
    }

    /// Removes a handler. Returns whether it was registered.
    pub fn unregister(&self, id: HandlerId) -> bool {
        let mut channels = self.channels.write();
        for entries in channels.values_mut() {
            if let Some(pos) = entries.iter().position(|entry| entry.id == id) {
                let entry = entries.remove(pos);
                if let Some(route) = entry.route {
                    self.routes.write().remove(&route);
                }
                debug!(%id, "Unregistered handler");
                return true;
            }
        }
        drop(channels);

        let mut ready = self.ready.write();
        let before = ready.len();
        ready.retain(|(ready_id, _)| *ready_id != id);
        before != ready.len()
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Snapshot of the handlers on `channel`, in registration order.
    pub fn handlers(&self, channel: &str) -> Vec<BoxedHandler> {
        self.channels
            .read()
            .get(channel)
            .map(|entries| entries.iter().map(|e| e.handler.clone()).collect())
            .unwrap_or_default()
    }

    /// Snapshot of the startup handlers, in registration order.
    pub fn ready_handlers(&self) -> Vec<BoxedReadyHandler> {
        self.ready.read().iter().map(|(_, h)| h.clone()).collect()
    }

    /// Number of handlers on `channel`.
    pub fn handler_count(&self, channel: &str) -> usize {
        self.channels.read().get(channel).map_or(0, Vec::len)
    }

    /// Channels with at least one handler.
    pub fn channels(&self) -> Vec<String> {
        self.channels
            .read()
            .iter()
            .filter(|(_, entries)| !entries.is_empty())
            .map(|(channel, _)| channel.clone())
            .collect()
    }

    /// Drops every handler and route.
    pub fn clear(&self) {
        self.channels.write().clear();
        self.ready.write().clear();
        self.routes.write().clear();
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let channels = self.channels.read();
        let counts: HashMap<&str, usize> = channels
            .iter()
            .map(|(channel, entries)| (channel.as_str(), entries.len()))
            .collect();
        f.debug_struct("HandlerRegistry")
            .field("channels", &counts)
            .field("ready", &self.ready.read().len())
            .finish()
    }
}
