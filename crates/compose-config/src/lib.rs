//! # Compose Configuration
//!
//! Compose manifest compiler for compose-harness.
//!
//! This crate turns one or more compose-style manifests plus a list of
//! compilation options into an immutable [`Project`]: a named, ordered
//! collection of services, each stamped with the labels used later to
//! rediscover its containers.
//!
//! ## Example
//!
//! ```no_run
//! use compose_config::{CompileOption, ProjectCompiler, YamlCompiler};
//! use std::path::PathBuf;
//!
//! # fn example() -> compose_config::Result<()> {
//! let project = YamlCompiler.compile(
//!     &[PathBuf::from("docker-compose.yaml")],
//!     &[CompileOption::Name("integration".to_string())],
//! )?;
//!
//! for name in project.service_names() {
//!     println!("{name}");
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

use std::path::PathBuf;
use thiserror::Error;

pub mod compiler;
pub mod interpolate;
pub mod labels;
pub mod model;
pub mod options;

pub use compiler::{DEFAULT_CONFIG_FILES, ProjectCompiler, YamlCompiler};
pub use labels::{Labels, service_labels};
pub use model::{Project, Service};
pub use options::{CompileOption, ProjectOptions};

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a manifest or environment file
    #[error("Failed to read {path}: {source}")]
    ReadError {
        /// File that could not be read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse YAML
    #[error("Failed to parse YAML in {path}: {source}")]
    YamlError {
        /// Manifest that failed to parse
        path: PathBuf,
        /// Underlying parse error
        #[source]
        source: serde_yaml::Error,
    },

    /// Failed to render the project back to YAML
    #[error("Failed to render project: {0}")]
    RenderError(#[from] serde_yaml::Error),

    /// Failed to parse an environment file
    #[error("Failed to parse environment file {path}: {reason}")]
    EnvFileError {
        /// Environment file that failed to parse
        path: PathBuf,
        /// Parser message
        reason: String,
    },

    /// No manifest paths were given and no default manifest was found
    #[error("No compose file found in {0}")]
    NoConfigFile(PathBuf),

    /// Environment key injected twice
    #[error("Environment with key {0} already set")]
    DuplicateEnvironmentKey(String),

    /// Required variable missing during interpolation
    #[error("Required variable {name} is missing a value: {message}")]
    MissingVariable {
        /// Variable name
        name: String,
        /// Message supplied by the manifest
        message: String,
    },

    /// Malformed `${...}` expression
    #[error("Invalid interpolation format: {0}")]
    InvalidInterpolation(String),

    /// Project name is empty after normalization
    #[error("Invalid project name: {0:?}")]
    InvalidProjectName(String),

    /// Service depends on a service that is not declared
    #[error("Service '{service}' depends on undefined service '{dependency}'")]
    UnknownDependency {
        /// Service declaring the dependency
        service: String,
        /// Missing dependency
        dependency: String,
    },

    /// The dependency graph contains a cycle
    #[error("Dependency cycle detected involving service '{0}'")]
    DependencyCycle(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;
