pub mod container;
pub mod down;
pub mod services;
pub mod up;

use anyhow::{Context, Result};
use compose_config::compiler::normalize_project_name;
use compose_stack::{ComposeStackBuilder, StackConfiguration};
use std::path::PathBuf;

/// Flags shared by every command
pub struct StackArgs {
    pub files: Vec<PathBuf>,
    pub project_name: Option<String>,
    pub env: Vec<(String, String)>,
    pub os_env: bool,
}

impl StackArgs {
    /// Builder configured from the shared flags
    pub fn builder(&self) -> Result<ComposeStackBuilder> {
        let identifier = match &self.project_name {
            Some(name) => name.clone(),
            None => current_dir_name()?,
        };

        let mut builder = ComposeStackBuilder::new()
            .with_files(self.files.iter().cloned())
            .with_identifier(identifier);
        if !self.env.is_empty() {
            builder = builder
                .with_env(self.env.iter().cloned())
                .context("Invalid --env flags")?;
        }
        if self.os_env {
            builder = builder.with_os_env();
        }
        Ok(builder)
    }
}

/// Project name compose would derive for the current directory
fn current_dir_name() -> Result<String> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    let name = cwd
        .file_name()
        .map(|name| normalize_project_name(&name.to_string_lossy()))
        .unwrap_or_default();
    if name.is_empty() {
        anyhow::bail!(
            "Cannot derive a project name from {}, pass --project-name",
            cwd.display()
        );
    }
    Ok(name)
}
