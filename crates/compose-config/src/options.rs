//! Compilation options.
//!
//! Every [`CompileOption`] is a pure transformation of a [`ProjectOptions`]
//! record. Options are applied in the order they are given, so a later
//! `Name` wins over an earlier one.

use crate::{ConfigError, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A single compilation option
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileOption {
    /// Inject environment variables; a key that is already set is rejected
    Environment(BTreeMap<String, String>),
    /// Inherit the process environment for keys not already set
    OsEnvironment,
    /// Override the project name
    Name(String),
    /// Fall back to the default manifest names when no path is given
    DefaultConfigPath,
    /// Explicit working directory
    WorkingDir(PathBuf),
    /// Explicit environment file
    EnvFile(PathBuf),
}

/// Options record consumed by the compiler
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectOptions {
    /// Manifest paths in merge order
    pub config_paths: Vec<PathBuf>,
    /// Explicit project name
    pub name: Option<String>,
    /// Variables available for interpolation
    pub environment: BTreeMap<String, String>,
    /// Whether the process environment is inherited
    pub os_environment: bool,
    /// Whether default manifest names are probed
    pub default_config_path: bool,
    /// Explicit working directory
    pub working_dir: Option<PathBuf>,
    /// Explicit environment file
    pub env_file: Option<PathBuf>,
}

impl ProjectOptions {
    /// Build an options record from manifest paths and options
    pub fn new(paths: &[PathBuf], options: &[CompileOption]) -> Result<Self> {
        let mut record = Self {
            config_paths: paths.to_vec(),
            ..Default::default()
        };

        for option in options {
            option.apply(&mut record)?;
        }

        Ok(record)
    }
}

impl CompileOption {
    /// Apply this option to the options record
    pub fn apply(&self, options: &mut ProjectOptions) -> Result<()> {
        match self {
            CompileOption::Environment(env) => {
                for (key, value) in env {
                    if options.environment.contains_key(key) {
                        return Err(ConfigError::DuplicateEnvironmentKey(key.clone()));
                    }
                    options.environment.insert(key.clone(), value.clone());
                }
            }
            CompileOption::OsEnvironment => {
                options.os_environment = true;
                for (key, value) in std::env::vars() {
                    options.environment.entry(key).or_insert(value);
                }
            }
            CompileOption::Name(name) => options.name = Some(name.clone()),
            CompileOption::DefaultConfigPath => options.default_config_path = true,
            CompileOption::WorkingDir(dir) => options.working_dir = Some(dir.clone()),
            CompileOption::EnvFile(path) => options.env_file = Some(path.clone()),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_duplicate_environment_key_rejected() {
        let result = ProjectOptions::new(
            &[],
            &[
                CompileOption::Environment(env(&[("X", "1")])),
                CompileOption::Environment(env(&[("X", "2")])),
            ],
        );

        match result {
            Err(ConfigError::DuplicateEnvironmentKey(key)) => assert_eq!(key, "X"),
            other => panic!("Expected duplicate key error, got {:?}", other),
        }
    }

    #[test]
    fn test_later_name_wins() {
        let options = ProjectOptions::new(
            &[],
            &[
                CompileOption::Name("first".to_string()),
                CompileOption::Name("second".to_string()),
            ],
        )
        .unwrap();

        assert_eq!(options.name.as_deref(), Some("second"));
    }

    #[test]
    fn test_os_environment_does_not_override_injected() {
        let path = std::env::var("PATH").unwrap_or_default();
        let options = ProjectOptions::new(
            &[],
            &[
                CompileOption::Environment(env(&[("PATH", "injected")])),
                CompileOption::OsEnvironment,
            ],
        )
        .unwrap();

        assert!(options.os_environment);
        assert_eq!(options.environment["PATH"], "injected");
        assert_ne!(options.environment["PATH"], path);
    }
}
