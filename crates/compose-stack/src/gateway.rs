//! Boundary to the container runtime.
//!
//! The controller never talks to a container engine directly; every
//! create/start/stop/list call goes through a [`RuntimeGateway`].

use crate::Result;
use async_trait::async_trait;
use compose_config::Project;

/// Recreate policy for containers whose definition may have changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Recreate {
    /// Recreate only containers whose configuration diverged
    #[default]
    Diverged,
    /// Always recreate
    Force,
    /// Never recreate existing containers
    Never,
}

/// Image removal policy for teardown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveImages {
    /// Remove all images used by the stack
    All,
    /// Remove only images that don't have a custom tag
    Local,
}

impl RemoveImages {
    /// Value understood by `docker compose down --rmi`
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoveImages::All => "all",
            RemoveImages::Local => "local",
        }
    }
}

/// Options for creating containers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateOptions {
    /// Services to create
    pub services: Vec<String>,
    /// Recreate policy for the requested services
    pub recreate: Recreate,
    /// Recreate policy for their dependencies
    pub recreate_dependencies: Recreate,
    /// Remove containers of services no longer in the project
    pub remove_orphans: bool,
    /// Ignore containers of services no longer in the project
    pub ignore_orphans: bool,
}

/// Options for starting containers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartOptions {
    /// Block until containers are running or healthy
    pub wait: bool,
}

/// Combined create and start request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpRequest {
    /// Create options
    pub create: CreateOptions,
    /// Start options
    pub start: StartOptions,
}

/// Teardown request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownRequest {
    /// Compiled project being torn down
    pub project: Option<Project>,
    /// Remove containers of services no longer in the project
    pub remove_orphans: bool,
    /// Image removal policy
    pub images: Option<RemoveImages>,
}

/// Container listing filter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerFilter {
    /// Include stopped containers
    pub all: bool,
    /// `key=value` label filters, all of which must match
    pub labels: Vec<(String, String)>,
}

impl ContainerFilter {
    /// Add a label filter
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.push((key.into(), value.into()));
        self
    }
}

/// Container as reported by a listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerSummary {
    /// Runtime-assigned identifier
    pub id: String,
    /// Container names
    pub names: Vec<String>,
    /// Runtime state, e.g. `running` or `exited`
    pub state: String,
}

/// Current status of a single container
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerStatus {
    /// Runtime state, e.g. `running` or `exited`
    pub state: String,
    /// Healthcheck status, if the container defines one
    pub health: Option<String>,
}

/// Capability set consumed from the container runtime
#[async_trait]
pub trait RuntimeGateway: Send + Sync {
    /// Create and start the project's containers
    async fn up(&self, project: &Project, request: &UpRequest) -> Result<()>;

    /// Tear the stack down
    async fn down(&self, stack_name: &str, request: &DownRequest) -> Result<()>;

    /// List containers matching `filter`, in runtime order
    async fn list_containers(&self, filter: &ContainerFilter) -> Result<Vec<ContainerSummary>>;

    /// Inspect a single container's state
    async fn container_status(&self, id: &str) -> Result<ContainerStatus>;

    /// Combined stdout and stderr of a container
    async fn container_logs(&self, id: &str) -> Result<String>;
}
