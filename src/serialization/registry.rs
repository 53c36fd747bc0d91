//! Serialization lookup by name and by content type id.

use std::sync::Arc;

use super::{JsonSerialization, MsgPackSerialization, Serialization, MAX_CONTENT_TYPE_ID};
use crate::constants::{DEFAULT_SERIALIZATION, SERIALIZATION_KEY};
use crate::error::{RemoteError, Result};
use crate::extension::ExtensionRegistry;
use crate::url::Url;

/// Registry resolving serializations for encoding (by the channel's
/// configured name) and decoding (by the id found in the frame flags).
pub struct SerializationRegistry {
    by_name: ExtensionRegistry<dyn Serialization>,
    by_id: [Option<Arc<dyn Serialization>>; MAX_CONTENT_TYPE_ID as usize + 1],
}

impl SerializationRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            by_name: ExtensionRegistry::new(),
            by_id: Default::default(),
        }
    }

    /// Registry with the built-in `msgpack` and `json` plug-ins.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        // Built-in ids are distinct constants, registration cannot collide.
        let _ = registry.register(Arc::new(MsgPackSerialization));
        let _ = registry.register(Arc::new(JsonSerialization));
        registry
    }

    /// Register a serialization under its own name and id.
    ///
    /// # Errors
    ///
    /// Fails if the id does not fit in 5 bits or is already taken by a
    /// serialization with a different name.
    pub fn register(&mut self, serialization: Arc<dyn Serialization>) -> Result<()> {
        let id = serialization.content_type_id();
        if id > MAX_CONTENT_TYPE_ID {
            return Err(RemoteError::Protocol(format!(
                "Serialization id {} of {} does not fit in 5 bits",
                id,
                serialization.name()
            )));
        }
        if let Some(existing) = &self.by_id[id as usize] {
            if existing.name() != serialization.name() {
                return Err(RemoteError::Protocol(format!(
                    "Serialization id {} already used by {}",
                    id,
                    existing.name()
                )));
            }
        }

        self.by_id[id as usize] = Some(serialization.clone());
        self.by_name.register(serialization.name(), serialization);
        Ok(())
    }

    /// Look up by configuration name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Serialization>> {
        self.by_name.get(name)
    }

    /// Look up by wire id.
    pub fn by_id(&self, id: u8) -> Option<Arc<dyn Serialization>> {
        self.by_id.get(id as usize).and_then(|s| s.clone())
    }

    /// Serialization configured for a channel (`serialization=<name>`).
    pub fn for_url(&self, url: &Url) -> Result<Arc<dyn Serialization>> {
        let name = url.parameter_or(SERIALIZATION_KEY, DEFAULT_SERIALIZATION);
        self.get(name)
            .ok_or_else(|| RemoteError::UnknownSerialization(name.to_string()))
    }

    /// Serialization for an incoming frame.
    ///
    /// The frame's id wins; the channel's configured serialization is used
    /// when it carries the same id.
    pub fn for_frame(&self, url: &Url, id: u8) -> Result<Arc<dyn Serialization>> {
        if let Ok(configured) = self.for_url(url) {
            if configured.content_type_id() == id {
                return Ok(configured);
            }
        }
        self.by_id(id)
            .ok_or_else(|| RemoteError::UnknownSerialization(format!("id {}", id)))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.by_name.names()
    }
}

impl Default for SerializationRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
