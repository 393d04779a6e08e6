//! Type → handler lookup table.

use std::collections::HashMap;
use std::fmt;

use crate::ProtocolError;

/// Error type returned by message handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// What every client and server handler resolves to.
pub type HandlerResult = Result<(), HandlerError>;

/// Maps a message type to its handler.
///
/// Built once during setup and then frozen: the client and server move it
/// into an `Arc` before any task starts, so lookups never take a lock.
/// `H` is whatever callable the owner stores (the client and server each
/// use their own boxed-future handler type).
pub struct HandlerRegistry<H> {
    handlers: HashMap<String, H>,
}

impl<H> HandlerRegistry<H> {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registers `handler` for `msg_type`.
    ///
    /// # Panics
    /// Panics if `msg_type` is empty or already registered. Both are
    /// setup mistakes, so they fail loudly before anything connects.
    pub fn register(&mut self, msg_type: impl Into<String>, handler: H) {
        if let Err(e) = self.try_register(msg_type, handler) {
            panic!("{e}");
        }
    }

    /// Registers `handler` for `msg_type`, reporting duplicates as errors.
    pub fn try_register(
        &mut self,
        msg_type: impl Into<String>,
        handler: H,
    ) -> Result<(), ProtocolError> {
        let msg_type = msg_type.into();
        if msg_type.is_empty() {
            return Err(ProtocolError::InvalidMessage(
                "handler message type must not be empty".into(),
            ));
        }
        if self.handlers.contains_key(&msg_type) {
            return Err(ProtocolError::DuplicateHandler(msg_type));
        }
        self.handlers.insert(msg_type, handler);
        Ok(())
    }

    /// The handler for `msg_type`, if one is registered.
    ///
    /// Matching is exact and case-sensitive: `"Chat"` and `"chat"` are
    /// different types.
    pub fn get(&self, msg_type: &str) -> Option<&H> {
        self.handlers.get(msg_type)
    }

    pub fn contains(&self, msg_type: &str) -> bool {
        self.handlers.contains_key(msg_type)
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Registered types, in no particular order.
    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }
}

impl<H> Default for HandlerRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> fmt::Debug for HandlerRegistry<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.types()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_get() {
        let mut registry = HandlerRegistry::new();
        registry.register("chat", 1);
        registry.register("join", 2);

        assert_eq!(registry.get("chat"), Some(&1));
        assert_eq!(registry.get("join"), Some(&2));
        assert_eq!(registry.get("leave"), None);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn test_register_duplicate_panics() {
        let mut registry = HandlerRegistry::new();
        registry.register("chat", 1);
        registry.register("chat", 2);
    }

    #[test]
    #[should_panic(expected = "must not be empty")]
    fn test_register_empty_type_panics() {
        let mut registry = HandlerRegistry::new();
        registry.register("", 1);
    }

    #[test]
    fn test_try_register_duplicate_keeps_first() {
        let mut registry = HandlerRegistry::new();
        registry.try_register("chat", 1).unwrap();

        let err = registry.try_register("chat", 2).unwrap_err();
        assert!(matches!(err, ProtocolError::DuplicateHandler(ref t) if t == "chat"));
        assert_eq!(registry.get("chat"), Some(&1));
    }

    #[test]
    fn test_contains_and_is_empty() {
        let mut registry: HandlerRegistry<()> = HandlerRegistry::default();
        assert!(registry.is_empty());
        registry.register("ping", ());
        assert!(registry.contains("ping"));
        assert!(!registry.contains("pong"));
    }

    #[test]
    fn test_debug_lists_types() {
        let mut registry = HandlerRegistry::new();
        registry.register("chat", 0u8);
        assert_eq!(format!("{registry:?}"), r#"{"chat"}"#);
    }
}
