//! # Compose Stack
//!
//! Lifecycle control of a multi-service compose stack for the duration of a
//! test run.
//!
//! A [`ComposeStack`] compiles its manifests into a project, brings the
//! requested services up through a [`RuntimeGateway`], waits until every
//! service with a registered [`ReadinessStrategy`] is ready, and exposes the
//! running containers by service name until the stack is torn down again.
//!
//! ## Example
//!
//! ```no_run
//! use compose_stack::{
//!     ComposeStackBuilder, DownOption, ForHealthy, StackConfiguration, UpOption,
//! };
//!
//! # async fn example() -> compose_stack::Result<()> {
//! let stack = ComposeStackBuilder::new()
//!     .with_files(["docker-compose.yaml"])
//!     .wait_for_service("api", ForHealthy::new())
//!     .build();
//!
//! stack.up(&[UpOption::Wait(true)]).await?;
//!
//! let api = stack.service_container("api").await?;
//! println!("api is running in {}", api.id());
//!
//! stack.down(&[DownOption::RemoveOrphans(true)]).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unsafe_code)]

mod cancel;
mod container;
mod docker;
mod fanout;
mod gateway;
mod options;
mod readiness;
mod stack;
mod staging;

pub use cancel::CancelToken;
pub use container::{ContainerCache, StackContainer};
pub use docker::DockerCliGateway;
pub use fanout::join_first_error;
pub use gateway::{
    ContainerFilter, ContainerStatus, ContainerSummary, CreateOptions, DownRequest, Recreate,
    RemoveImages, RuntimeGateway, StartOptions, UpRequest,
};
pub use options::{DownOption, StackDownOptions, StackUpOptions, UpOption};
pub use readiness::{
    ForAll, ForFn, ForHealthy, ForLogLine, ReadinessRegistry, ReadinessStrategy,
};
pub use stack::{ComposeStack, ComposeStackBuilder, StackConfiguration};
pub use staging::{stage_readers, staging_dir};

/// Error types for stack operations
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Manifest compilation errors
    #[error("Compose configuration error: {0}")]
    Config(#[from] compose_config::ConfigError),

    /// Environment key injected twice
    #[error("Environment with key {0} already set")]
    DuplicateEnvironmentKey(String),

    /// Operation requires a compiled project
    #[error("Stack has not been started: call up() first")]
    NotStarted,

    /// No container matched the service labels
    #[error("No container found for service name {0}")]
    ServiceNotFound(String),

    /// Runtime gateway failure
    #[error("Runtime {operation} failed: {reason}")]
    Gateway {
        /// Gateway operation that failed
        operation: String,
        /// Failure reported by the runtime
        reason: String,
    },

    /// Readiness check failure
    #[error("Service {service} did not become ready: {reason}")]
    Readiness {
        /// Service being checked
        service: String,
        /// Why the check failed
        reason: String,
    },

    /// The operation observed cancellation
    #[error("Operation cancelled")]
    Cancelled,

    /// Failed to stage manifest content
    #[error("Failed to stage compose file {path}: {source}")]
    Staging {
        /// Path being written
        path: std::path::PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a gateway error
    pub fn gateway(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Gateway {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create a readiness error
    pub fn readiness(service: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Readiness {
            service: service.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
