//! Entity handler contract and registry.
//!
//! The core never interprets payloads; domain collaborators supply one
//! handler per (entity, operation) pair and the synchronizer dispatches to
//! them. Pairs are validated at registration time, so an enqueue for an
//! unregistered pair fails before anything is persisted.

use courier_engine::{EntityKind, OperationKind};
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Outcome of applying one offline mutation against the authoritative store.
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    /// The mutation was applied; the summary is recorded on the operation.
    Applied { summary: Value },
    /// An authoritative record with the same natural key already exists.
    /// Carries the identifying fields of the colliding record.
    Conflict { server_data: Value },
}

impl ApplyOutcome {
    /// An applied outcome with a summary payload.
    pub fn applied(summary: Value) -> Self {
        ApplyOutcome::Applied { summary }
    }

    /// A conflict outcome naming the colliding record.
    pub fn conflict(server_data: Value) -> Self {
        ApplyOutcome::Conflict { server_data }
    }
}

/// Error raised by a handler. The synchronizer treats every handler error
/// as transient and applies the retry policy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A domain collaborator that can apply one kind of mutation.
pub trait EntityHandler: Send + Sync {
    /// Attempt to apply `payload` against current stored state.
    fn apply<'a>(
        &'a self,
        payload: &'a Value,
    ) -> BoxFuture<'a, Result<ApplyOutcome, HandlerError>>;
}

/// Registration errors.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("handler already registered for {entity}.{operation}")]
    Duplicate {
        entity: EntityKind,
        operation: OperationKind,
    },
}

/// Handlers keyed by (entity, operation).
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<(EntityKind, OperationKind), Arc<dyn EntityHandler>>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one (entity, operation) pair.
    ///
    /// Duplicate registration is a programming error and is rejected here
    /// rather than silently shadowing the earlier handler.
    pub fn register(
        &mut self,
        entity: EntityKind,
        operation: OperationKind,
        handler: Arc<dyn EntityHandler>,
    ) -> Result<(), RegistryError> {
        if self.handlers.contains_key(&(entity, operation)) {
            return Err(RegistryError::Duplicate { entity, operation });
        }
        self.handlers.insert((entity, operation), handler);
        Ok(())
    }

    /// Get the handler for a pair, if registered.
    pub fn get(
        &self,
        entity: EntityKind,
        operation: OperationKind,
    ) -> Option<Arc<dyn EntityHandler>> {
        self.handlers.get(&(entity, operation)).cloned()
    }

    /// Whether a pair has a registered handler.
    pub fn is_registered(&self, entity: EntityKind, operation: OperationKind) -> bool {
        self.handlers.contains_key(&(entity, operation))
    }

    /// Number of registered pairs.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut pairs: Vec<String> = self
            .handlers
            .keys()
            .map(|(entity, operation)| format!("{entity}.{operation}"))
            .collect();
        pairs.sort();
        f.debug_struct("HandlerRegistry")
            .field("pairs", &pairs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysApplied;

    impl EntityHandler for AlwaysApplied {
        fn apply<'a>(
            &'a self,
            _payload: &'a Value,
        ) -> BoxFuture<'a, Result<ApplyOutcome, HandlerError>> {
            Box::pin(async { Ok(ApplyOutcome::applied(serde_json::json!({"ok": true}))) })
        }
    }

    #[test]
    fn register_and_lookup() {
        let mut registry = HandlerRegistry::new();
        registry
            .register(
                EntityKind::Lead,
                OperationKind::Create,
                Arc::new(AlwaysApplied),
            )
            .unwrap();

        assert!(registry.is_registered(EntityKind::Lead, OperationKind::Create));
        assert!(!registry.is_registered(EntityKind::Lead, OperationKind::Update));
        assert!(registry
            .get(EntityKind::Lead, OperationKind::Create)
            .is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = HandlerRegistry::new();
        registry
            .register(
                EntityKind::Task,
                OperationKind::Complete,
                Arc::new(AlwaysApplied),
            )
            .unwrap();

        let err = registry
            .register(
                EntityKind::Task,
                OperationKind::Complete,
                Arc::new(AlwaysApplied),
            )
            .unwrap_err();

        assert!(matches!(
            err,
            RegistryError::Duplicate {
                entity: EntityKind::Task,
                operation: OperationKind::Complete,
            }
        ));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn handler_dispatch() {
        let mut registry = HandlerRegistry::new();
        registry
            .register(
                EntityKind::Lead,
                OperationKind::Create,
                Arc::new(AlwaysApplied),
            )
            .unwrap();

        let handler = registry
            .get(EntityKind::Lead, OperationKind::Create)
            .unwrap();
        let outcome = handler.apply(&serde_json::json!({})).await.unwrap();
        assert_eq!(
            outcome,
            ApplyOutcome::applied(serde_json::json!({"ok": true}))
        );
    }
}
