//! Running containers of a stack and the per-service lookup cache.

use crate::{
    Error, Result,
    gateway::{ContainerFilter, ContainerStatus, RuntimeGateway},
};
use compose_config::labels::{PROJECT_LABEL, SERVICE_LABEL};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Handle to a container backing a stack service
#[derive(Clone)]
pub struct StackContainer {
    id: String,
    service: String,
    gateway: Arc<dyn RuntimeGateway>,
}

impl StackContainer {
    /// Create a handle for container `id` of `service`
    pub fn new(id: impl Into<String>, service: impl Into<String>, gateway: Arc<dyn RuntimeGateway>) -> Self {
        Self {
            id: id.into(),
            service: service.into(),
            gateway,
        }
    }

    /// Runtime-assigned container identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Service this container belongs to
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Inspect the container's current state
    pub async fn status(&self) -> Result<ContainerStatus> {
        self.gateway.container_status(&self.id).await
    }

    /// Combined stdout and stderr
    pub async fn logs(&self) -> Result<String> {
        self.gateway.container_logs(&self.id).await
    }
}

impl fmt::Debug for StackContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackContainer")
            .field("id", &self.id)
            .field("service", &self.service)
            .finish()
    }
}

/// Service name to container cache.
///
/// Entries are never invalidated automatically: a service recreated outside
/// of the controller keeps returning the old handle until [`clear`] is called.
///
/// [`clear`]: ContainerCache::clear
#[derive(Debug, Default)]
pub struct ContainerCache {
    containers: Mutex<HashMap<String, StackContainer>>,
}

impl ContainerCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached handle for `service`
    pub fn get(&self, service: &str) -> Option<StackContainer> {
        self.entries().get(service).cloned()
    }

    /// Store a handle for `service`
    pub fn insert(&self, service: impl Into<String>, container: StackContainer) {
        self.entries().insert(service.into(), container);
    }

    /// Drop every cached handle
    pub fn clear(&self) {
        self.entries().clear();
    }

    /// Number of cached handles
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Resolve the container of `service` in stack `stack_name`.
    ///
    /// Served from the cache when possible, otherwise the runtime is queried
    /// by project and service label. When several containers match, the first
    /// one in runtime order is used.
    pub async fn lookup(
        &self,
        gateway: &Arc<dyn RuntimeGateway>,
        stack_name: &str,
        service: &str,
    ) -> Result<StackContainer> {
        if let Some(container) = self.get(service) {
            debug!("Container cache hit for service {}", service);
            return Ok(container);
        }

        let filter = ContainerFilter {
            all: true,
            ..Default::default()
        }
        .with_label(PROJECT_LABEL, stack_name)
        .with_label(SERVICE_LABEL, service);

        let containers = gateway.list_containers(&filter).await?;
        let first = containers
            .into_iter()
            .next()
            .ok_or_else(|| Error::ServiceNotFound(service.to_string()))?;

        debug!("Resolved service {} to container {}", service, first.id);
        let container = StackContainer::new(first.id, service, Arc::clone(gateway));
        self.insert(service, container.clone());

        Ok(container)
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, StackContainer>> {
        self.containers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
