// SPDX-FileCopyrightText: 2026 Chime Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Namespace registry: unique key -> resolver for invocable actor handles.

use std::collections::HashMap;
use std::sync::Arc;

use chime_core::{AlarmHandler, ChimeError};

/// Turns an actor id into an invocable handle for one namespace.
pub type ActorResolver = Arc<dyn Fn(&str) -> Arc<dyn AlarmHandler> + Send + Sync>;

/// Resolvers keyed by namespace unique key.
#[derive(Default, Clone)]
pub struct NamespaceRegistry {
    namespaces: HashMap<String, ActorResolver>,
}

impl NamespaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the resolver for `unique_key`.
    pub fn register(&mut self, unique_key: impl Into<String>, resolver: ActorResolver) {
        self.namespaces.insert(unique_key.into(), resolver);
    }

    /// Resolver for `unique_key`; an unknown key is a configuration error.
    pub fn resolver(&self, unique_key: &str) -> Result<ActorResolver, ChimeError> {
        self.namespaces
            .get(unique_key)
            .cloned()
            .ok_or_else(|| ChimeError::NamespaceNotRegistered {
                unique_key: unique_key.to_string(),
            })
    }

    pub fn contains(&self, unique_key: &str) -> bool {
        self.namespaces.contains_key(unique_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chime_core::{AlarmResult, Timestamp};

    struct Noop;

    #[async_trait]
    impl AlarmHandler for Noop {
        async fn run_alarm(
            &self,
            _scheduled_time: Timestamp,
            _retry_count: u32,
        ) -> Result<AlarmResult, ChimeError> {
            Ok(AlarmResult::success())
        }
    }

    #[test]
    fn unknown_namespace_is_an_error() {
        let registry = NamespaceRegistry::new();
        assert!(matches!(
            registry.resolver("missing"),
            Err(ChimeError::NamespaceNotRegistered { unique_key }) if unique_key == "missing"
        ));
    }

    #[test]
    fn register_and_resolve() {
        let mut registry = NamespaceRegistry::new();
        let resolver: ActorResolver = Arc::new(|_id: &str| Arc::new(Noop) as Arc<dyn AlarmHandler>);
        registry.register("ns", resolver);

        assert!(registry.contains("ns"));
        assert!(!registry.contains("other"));
        assert!(registry.resolver("ns").is_ok());
    }
}
