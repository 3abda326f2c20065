use std::sync::{Arc, RwLock};

use {
    anyhow::Context,
    async_trait::async_trait,
    parley_channels::{ChatMessage, HandlerOptions, Session},
    serde::{Serialize, de::DeserializeOwned},
    tracing::debug,
};

/// A named behavior invoked when a listener matches.
///
/// Handlers are stateless: everything they need comes from the message, the
/// owning session and the listener's options.
#[async_trait]
pub trait ResponseHandler: Send + Sync {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    async fn invoke(
        &self,
        message: &ChatMessage,
        session: &Session,
        options: &HandlerOptions,
    ) -> anyhow::Result<()>;
}

/// Decode a listener's options into a handler-specific struct.
pub fn parse_options<T: DeserializeOwned>(options: &HandlerOptions) -> anyhow::Result<T> {
    serde_json::from_value(serde_json::Value::Object(options.clone()))
        .context("invalid handler options")
}

/// Plain description of a registered handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandlerInfo {
    pub id: String,
    pub name: String,
    pub description: String,
}

/// Handler lookup table, shared read-mostly across all sessions.
///
/// Iteration follows registration order; re-registering an ID replaces the
/// handler in place.
pub struct HandlerRegistry {
    handlers: RwLock<Vec<Arc<dyn ResponseHandler>>>,
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Registry pre-populated with the built-in handlers.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        crate::builtin::register_builtins(&registry);
        registry
    }

    /// Add a handler. An existing handler with the same ID is replaced.
    pub fn register(&self, handler: Arc<dyn ResponseHandler>) {
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        match handlers.iter().position(|h| h.id() == handler.id()) {
            Some(pos) => {
                debug!(handler_id = handler.id(), "replacing response handler");
                handlers[pos] = handler;
            },
            None => handlers.push(handler),
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn ResponseHandler>> {
        self.handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|h| h.id() == id)
            .cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn list(&self) -> Vec<HandlerInfo> {
        self.handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|h| HandlerInfo {
                id: h.id().to_string(),
                name: h.name().to_string(),
                description: h.description().to_string(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    struct Named {
        id: &'static str,
        name: &'static str,
    }

    #[async_trait]
    impl ResponseHandler for Named {
        fn id(&self) -> &str {
            self.id
        }

        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "test handler"
        }

        async fn invoke(
            &self,
            _message: &ChatMessage,
            _session: &Session,
            _options: &HandlerOptions,
        ) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn last_registration_wins_in_place() {
        let registry = HandlerRegistry::new();
        registry.register(Arc::new(Named { id: "a", name: "first" }));
        registry.register(Arc::new(Named { id: "b", name: "bee" }));
        registry.register(Arc::new(Named { id: "a", name: "second" }));

        let listed = registry.list();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, "a");
        assert_eq!(listed[0].name, "second");
        assert_eq!(listed[1].id, "b");
        assert_eq!(registry.get("a").unwrap().name(), "second");
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn builtins_are_registered() {
        let registry = HandlerRegistry::with_builtins();
        let ids: Vec<_> = registry.list().into_iter().map(|h| h.id).collect();
        assert_eq!(ids, vec!["reply", "echo", "log"]);
    }

    #[test]
    fn options_decode_into_structs() {
        #[derive(serde::Deserialize)]
        struct Opts {
            message: String,
        }
        let mut options = HandlerOptions::new();
        options.insert("message".into(), serde_json::json!("hi"));
        let opts: Opts = parse_options(&options).unwrap();
        assert_eq!(opts.message, "hi");

        assert!(parse_options::<Opts>(&HandlerOptions::new()).is_err());
    }
}
