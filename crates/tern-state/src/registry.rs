use crate::error::{Result, StateError};
use crate::session::SessionOptions;
use crate::visitor::StateVisitor;

/// Default bound on the number of registered handlers.
pub const MAX_STATE_HANDLERS: usize = 16;

type HandlerFn<C> = dyn FnMut(&mut C, &mut dyn StateVisitor) -> Result<()>;

struct RegisteredHandler<C> {
    name: &'static str,
    describe: Box<HandlerFn<C>>,
}

/// Ordered set of state handlers for a context type `C`.
///
/// Handlers are invoked in registration order for both save and restore, so the order is part
/// of the on-disk schema: register the same handlers in the same order no matter which of the two
/// the process is going to do.
pub struct HandlerRegistry<C> {
    handlers: Vec<RegisteredHandler<C>>,
    limit: usize,
    pub(crate) options: SessionOptions,
}

impl<C> Default for HandlerRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> core::fmt::Debug for HandlerRegistry<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.handler_names().collect::<Vec<_>>())
            .field("limit", &self.limit)
            .field("options", &self.options)
            .finish()
    }
}

impl<C> HandlerRegistry<C> {
    pub fn new() -> Self {
        Self::with_limit(MAX_STATE_HANDLERS)
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            handlers: Vec::new(),
            limit,
            options: SessionOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn handler_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.handlers.iter().map(|handler| handler.name)
    }

    /// Appends a handler. Fails once `limit` handlers are registered.
    pub fn register<F>(&mut self, name: &'static str, handler: F) -> Result<()>
    where
        F: FnMut(&mut C, &mut dyn StateVisitor) -> Result<()> + 'static,
    {
        if self.handlers.len() >= self.limit {
            return Err(StateError::TooManyHandlers { limit: self.limit });
        }
        self.handlers.push(RegisteredHandler {
            name,
            describe: Box::new(handler),
        });
        Ok(())
    }

    /// Invokes every handler once, in registration order.
    pub(crate) fn run_all<V: StateVisitor>(&mut self, ctx: &mut C, visitor: &mut V) -> Result<()> {
        for handler in &mut self.handlers {
            let name = handler.name;
            let _span = tracing::debug_span!("state_handler", handler = name).entered();
            tracing::debug!(mode = ?visitor.mode(), "running state handler");

            (handler.describe)(&mut *ctx, &mut *visitor).map_err(|source| StateError::Handler {
                name,
                source: Box::new(source),
            })?;
            if visitor.depth() != 0 {
                return Err(StateError::Handler {
                    name,
                    source: Box::new(StateError::UnbalancedObject),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_is_bounded() {
        let mut registry = HandlerRegistry::<()>::with_limit(2);
        registry.register("a", |_, _| Ok(())).unwrap();
        registry.register("b", |_, _| Ok(())).unwrap();
        assert!(matches!(
            registry.register("c", |_, _| Ok(())),
            Err(StateError::TooManyHandlers { limit: 2 })
        ));
        assert_eq!(registry.handler_names().collect::<Vec<_>>(), ["a", "b"]);
    }

    #[test]
    fn default_limit_matches_constant() {
        let mut registry = HandlerRegistry::<u32>::new();
        for _ in 0..MAX_STATE_HANDLERS {
            registry.register("h", |_, _| Ok(())).unwrap();
        }
        assert_eq!(registry.len(), MAX_STATE_HANDLERS);
        assert!(registry.register("one-too-many", |_, _| Ok(())).is_err());
    }
}
