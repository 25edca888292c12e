//! Typed in-process event bus.
//!
//! Each payload type names itself through [`DomainEvent::NAME`]. Subscribers
//! register per payload type and are called synchronously, in subscription
//! order, on every [`EventBus::publish`] of that type.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use serde::Serialize;

use crate::types::{Deployment, TargetId};

/// A payload that can travel on the [`EventBus`].
pub trait DomainEvent: Any + Send + Sync {
    const NAME: &'static str;
}

/// A target's deployment was committed and recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentCompleted {
    pub deployment: Deployment,
}

impl DomainEvent for DeploymentCompleted {
    const NAME: &'static str = "deployments.completed";
}

/// A target's pipeline failed. `error` is the message stored on the failed row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentFailed {
    pub target_id: TargetId,
    pub error: String,
}

impl DomainEvent for DeploymentFailed {
    const NAME: &'static str = "deployments.failed";
}

type Handler = Box<dyn Fn(&dyn Any) + Send + Sync>;

#[derive(Default)]
pub struct EventBus {
    handlers: RwLock<HashMap<&'static str, Vec<Handler>>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        let mut counts: Vec<(&str, usize)> = handlers.iter().map(|(k, v)| (*k, v.len())).collect();
        counts.sort();
        f.debug_struct("EventBus").field("handlers", &counts).finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<E, F>(&self, handler: F)
    where
        E: DomainEvent,
        F: Fn(&E) + Send + Sync + 'static,
    {
        let erased: Handler = Box::new(move |payload: &dyn Any| {
            if let Some(event) = payload.downcast_ref::<E>() {
                handler(event);
            }
        });
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(E::NAME)
            .or_default()
            .push(erased);
    }

    pub fn publish<E: DomainEvent>(&self, event: &E) {
        let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        let Some(list) = handlers.get(E::NAME) else {
            tracing::trace!(event = E::NAME, "no subscribers");
            return;
        };
        tracing::debug!(event = E::NAME, subscribers = list.len(), "publishing event");
        for handler in list {
            handler(event as &dyn Any);
        }
    }

    pub fn subscriber_count<E: DomainEvent>(&self) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(E::NAME)
            .map_or(0, Vec::len)
    }
}
