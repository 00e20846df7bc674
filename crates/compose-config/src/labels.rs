//! Discovery labels stamped on every compiled service.
//!
//! The labels are the only durable link between a stack identifier and its
//! containers, so [`service_labels`] is a pure function of its inputs.

use crate::model::Project;
use std::collections::BTreeMap;

/// Label set attached to a service
pub type Labels = BTreeMap<String, String>;

/// Project (stack identifier) label
pub const PROJECT_LABEL: &str = "com.docker.compose.project";
/// Service name label
pub const SERVICE_LABEL: &str = "com.docker.compose.service";
/// Compose version label
pub const VERSION_LABEL: &str = "com.docker.compose.version";
/// Working directory label
pub const WORKING_DIR_LABEL: &str = "com.docker.compose.project.working_dir";
/// Comma-joined manifest list label
pub const CONFIG_FILES_LABEL: &str = "com.docker.compose.project.config_files";
/// Environment file label, only present when an env file was used
pub const ENVIRONMENT_FILE_LABEL: &str = "com.docker.compose.project.environment_file";
/// One-off container label
pub const ONEOFF_LABEL: &str = "com.docker.compose.oneoff";

/// Compose version written to [`VERSION_LABEL`]
pub const COMPOSE_VERSION: &str = "2.24.0";

/// Derive the label set for `service_name` within `project`
pub fn service_labels(project: &Project, service_name: &str) -> Labels {
    let config_files = project
        .config_files
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(",");

    let mut labels = Labels::new();
    labels.insert(PROJECT_LABEL.to_string(), project.name.clone());
    labels.insert(SERVICE_LABEL.to_string(), service_name.to_string());
    labels.insert(VERSION_LABEL.to_string(), COMPOSE_VERSION.to_string());
    labels.insert(
        WORKING_DIR_LABEL.to_string(),
        project.working_dir.display().to_string(),
    );
    labels.insert(CONFIG_FILES_LABEL.to_string(), config_files);
    // default, will be overridden by one-off runs
    labels.insert(ONEOFF_LABEL.to_string(), "False".to_string());

    if let Some(env_file) = &project.env_file {
        labels.insert(
            ENVIRONMENT_FILE_LABEL.to_string(),
            env_file.display().to_string(),
        );
    }

    labels
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn project(env_file: Option<PathBuf>) -> Project {
        Project {
            name: "stack".to_string(),
            working_dir: PathBuf::from("/work"),
            config_files: vec![PathBuf::from("/work/a.yaml"), PathBuf::from("/work/b.yaml")],
            env_file,
            ..Default::default()
        }
    }

    #[test]
    fn test_labels_are_deterministic() {
        let p = project(None);
        assert_eq!(service_labels(&p, "web"), service_labels(&p, "web"));
    }

    #[test]
    fn test_label_values() {
        let labels = service_labels(&project(None), "web");

        assert_eq!(labels[PROJECT_LABEL], "stack");
        assert_eq!(labels[SERVICE_LABEL], "web");
        assert_eq!(labels[WORKING_DIR_LABEL], "/work");
        assert_eq!(labels[CONFIG_FILES_LABEL], "/work/a.yaml,/work/b.yaml");
        assert_eq!(labels[ONEOFF_LABEL], "False");
        assert!(!labels.contains_key(ENVIRONMENT_FILE_LABEL));
    }

    #[test]
    fn test_env_file_label_only_when_present() {
        let labels = service_labels(&project(Some(PathBuf::from("/work/.env"))), "web");
        assert_eq!(labels[ENVIRONMENT_FILE_LABEL], "/work/.env");
    }

    #[test]
    fn test_services_get_distinct_label_sets() {
        let p = project(None);
        assert_ne!(service_labels(&p, "web"), service_labels(&p, "db"));
    }
}
