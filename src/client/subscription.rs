//! Handler registries with synchronous, ordered dispatch.
//!
//! `subscribe(handler)` returns a token; `unsubscribe(token)` removes the
//! handler. `emit` calls every current handler in registration order.

use std::fmt;

/// Identifies one registered handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionToken(u64);

type Handler<T> = Box<dyn FnMut(&T)>;

pub struct Subscribers<T> {
    next_token: u64,
    handlers: Vec<(SubscriptionToken, Handler<T>)>,
}

impl<T> Default for Subscribers<T> {
    fn default() -> Self {
        Self {
            next_token: 1,
            handlers: Vec::new(),
        }
    }
}

impl<T> fmt::Debug for Subscribers<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscribers")
            .field("count", &self.handlers.len())
            .finish()
    }
}

impl<T> Subscribers<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, handler: impl FnMut(&T) + 'static) -> SubscriptionToken {
        let token = SubscriptionToken(self.next_token);
        self.next_token += 1;
        self.handlers.push((token, Box::new(handler)));
        token
    }

    /// Returns false if the token was unknown
    pub fn unsubscribe(&mut self, token: SubscriptionToken) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(t, _)| *t != token);
        self.handlers.len() != before
    }

    pub fn emit(&mut self, value: &T) {
        for (_, handler) in self.handlers.iter_mut() {
            handler(value);
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn clear(&mut self) {
        self.handlers.clear();
    }
}
