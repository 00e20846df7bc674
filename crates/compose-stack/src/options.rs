//! Options accepted by [`ComposeStack::up`] and [`ComposeStack::down`].
//!
//! Options are applied in order; a later option wins over an earlier one of
//! the same kind.
//!
//! [`ComposeStack::up`]: crate::ComposeStack::up
//! [`ComposeStack::down`]: crate::ComposeStack::down

use crate::gateway::{CreateOptions, DownRequest, Recreate, RemoveImages, StartOptions, UpRequest};
use compose_config::Project;

/// Option for bringing a stack up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpOption {
    /// Only start the named services, comparable to `docker compose run`.
    ///
    /// An empty list starts every service. Unknown names are dropped when the
    /// project is narrowed, but narrowing only happens when the list length
    /// differs from the number of services: a list as long as the project that
    /// names an unknown service is passed to the runtime as is, and the runtime
    /// rejects it.
    RunServices(Vec<String>),
    /// Ignore containers of services that are not defined in the project
    IgnoreOrphans(bool),
    /// Remove containers of services that are not defined in the project
    RemoveOrphans(bool),
    /// Don't return until containers are running or healthy
    Wait(bool),
}

/// Option for tearing a stack down
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownOption {
    /// Remove containers of services that are not defined in the project
    RemoveOrphans(bool),
    /// Remove images used by the services
    RemoveImages(RemoveImages),
}

/// Record built from a list of [`UpOption`]s
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackUpOptions {
    /// Services to bring up
    pub services: Vec<String>,
    /// Recreate policy for requested services
    pub recreate: Recreate,
    /// Recreate policy for dependencies
    pub recreate_dependencies: Recreate,
    /// Ignore orphaned containers
    pub ignore_orphans: bool,
    /// Remove orphaned containers
    pub remove_orphans: bool,
    /// Wait for running/healthy
    pub wait: bool,
}

impl StackUpOptions {
    /// Defaults for `project`: every service, recreate only what diverged
    pub fn for_project(project: &Project) -> Self {
        Self {
            services: project.service_names(),
            recreate: Recreate::Diverged,
            recreate_dependencies: Recreate::Diverged,
            ignore_orphans: false,
            remove_orphans: false,
            wait: false,
        }
    }

    /// Apply `options` in order
    pub fn apply(mut self, options: &[UpOption]) -> Self {
        for option in options {
            match option {
                UpOption::RunServices(services) => self.services = services.clone(),
                UpOption::IgnoreOrphans(ignore) => self.ignore_orphans = *ignore,
                UpOption::RemoveOrphans(remove) => self.remove_orphans = *remove,
                UpOption::Wait(wait) => self.wait = *wait,
            }
        }
        self
    }

    /// Gateway request for these options
    pub fn to_request(&self) -> UpRequest {
        UpRequest {
            create: CreateOptions {
                services: self.services.clone(),
                recreate: self.recreate,
                recreate_dependencies: self.recreate_dependencies,
                remove_orphans: self.remove_orphans,
                ignore_orphans: self.ignore_orphans,
            },
            start: StartOptions { wait: self.wait },
        }
    }
}

/// Record built from a list of [`DownOption`]s
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackDownOptions {
    /// Remove orphaned containers
    pub remove_orphans: bool,
    /// Image removal policy
    pub images: Option<RemoveImages>,
}

impl StackDownOptions {
    /// Apply `options` in order
    pub fn apply(mut self, options: &[DownOption]) -> Self {
        for option in options {
            match option {
                DownOption::RemoveOrphans(remove) => self.remove_orphans = *remove,
                DownOption::RemoveImages(images) => self.images = Some(*images),
            }
        }
        self
    }

    /// Gateway request for `project` with these options
    pub fn to_request(&self, project: &Project) -> DownRequest {
        DownRequest {
            project: Some(project.clone()),
            remove_orphans: self.remove_orphans,
            images: self.images,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compose_config::Service;

    fn project() -> Project {
        Project {
            name: "stack".to_string(),
            services: ["db", "api"]
                .iter()
                .map(|name| Service {
                    name: name.to_string(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_up_defaults() {
        let options = StackUpOptions::for_project(&project());

        assert_eq!(options.services, vec!["db", "api"]);
        assert_eq!(options.recreate, Recreate::Diverged);
        assert_eq!(options.recreate_dependencies, Recreate::Diverged);
        assert!(!options.wait);
        assert!(!options.remove_orphans);
    }

    #[test]
    fn test_later_up_option_wins() {
        let options = StackUpOptions::for_project(&project()).apply(&[
            UpOption::Wait(true),
            UpOption::RunServices(vec!["api".to_string()]),
            UpOption::Wait(false),
            UpOption::RemoveOrphans(true),
            UpOption::IgnoreOrphans(true),
        ]);

        assert_eq!(options.services, vec!["api"]);
        assert!(!options.wait);

        let request = options.to_request();
        assert!(request.create.remove_orphans);
        assert!(request.create.ignore_orphans);
        assert_eq!(request.create.services, vec!["api"]);
    }

    #[test]
    fn test_down_options() {
        let options = StackDownOptions::default().apply(&[
            DownOption::RemoveImages(RemoveImages::All),
            DownOption::RemoveOrphans(true),
            DownOption::RemoveImages(RemoveImages::Local),
        ]);

        let request = options.to_request(&project());
        assert!(request.remove_orphans);
        assert_eq!(request.images, Some(RemoveImages::Local));
        assert_eq!(request.project.unwrap().name, "stack");
    }
}
