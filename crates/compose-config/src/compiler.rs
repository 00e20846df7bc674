//! Manifest compiler.
//!
//! Loads one or more manifests, interpolates variables, merges services
//! across files and stamps discovery labels on the result.

use crate::{
    ConfigError, Result,
    interpolate::interpolate_value,
    labels::service_labels,
    model::{Project, Service},
    options::{CompileOption, ProjectOptions},
};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Manifest names probed when no path is given
pub const DEFAULT_CONFIG_FILES: [&str; 4] = [
    "compose.yaml",
    "compose.yml",
    "docker-compose.yaml",
    "docker-compose.yml",
];

const DEFAULT_ENV_FILE: &str = ".env";
const RESOURCE_SECTIONS: [&str; 4] = ["networks", "volumes", "secrets", "configs"];

/// Compiles manifest sources into a [`Project`]
pub trait ProjectCompiler: Send + Sync {
    /// Compile `paths` with `options` into a project
    fn compile(&self, paths: &[PathBuf], options: &[CompileOption]) -> Result<Project>;
}

/// Compiler for YAML compose manifests
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlCompiler;

/// One manifest as it appears on disk
#[derive(Debug, Default, Deserialize)]
struct ComposeFile {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    services: IndexMap<String, Option<Mapping>>,
    #[serde(flatten)]
    sections: IndexMap<String, Value>,
}

impl ProjectCompiler for YamlCompiler {
    fn compile(&self, paths: &[PathBuf], options: &[CompileOption]) -> Result<Project> {
        let mut options = ProjectOptions::new(paths, options)?;

        let working_dir = resolve_working_dir(&options)?;
        let config_files = resolve_config_files(&options, &working_dir)?;
        let env_file = load_env_file(&mut options, &working_dir)?;

        let mut manifest_name = None;
        let mut services: IndexMap<String, Mapping> = IndexMap::new();
        let mut resources: IndexMap<String, Value> = IndexMap::new();

        for path in &config_files {
            debug!("Loading compose file {}", path.display());
            let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
                path: path.clone(),
                source,
            })?;
            let yaml_error = |source| ConfigError::YamlError {
                path: path.clone(),
                source,
            };

            // interpolate parsed values so comments and keys are left alone
            let mut document: Value = serde_yaml::from_str(&content).map_err(yaml_error)?;
            interpolate_value(&mut document, &options.environment)?;
            let file: ComposeFile = match document {
                Value::Null => ComposeFile::default(),
                document => serde_yaml::from_value(document).map_err(yaml_error)?,
            };

            if file.name.is_some() {
                manifest_name = file.name;
            }

            for (name, definition) in file.services {
                let definition = definition.unwrap_or_default();
                match services.get_mut(&name) {
                    Some(existing) => merge_mapping(existing, definition),
                    None => {
                        services.insert(name, definition);
                    }
                }
            }

            for (section, value) in file.sections {
                if !RESOURCE_SECTIONS.contains(&section.as_str()) {
                    continue;
                }
                if let (Some(Value::Mapping(existing)), Value::Mapping(incoming)) =
                    (resources.get_mut(&section), &value)
                {
                    merge_mapping(existing, incoming.clone());
                    continue;
                }
                resources.insert(section, value);
            }
        }

        let name = resolve_name(&options, manifest_name.as_deref(), &working_dir)?;

        let mut project = Project {
            name,
            working_dir,
            config_files,
            env_file,
            environment: options.environment,
            services: services
                .into_iter()
                .map(|(name, definition)| Service {
                    depends_on: parse_depends_on(definition.get("depends_on")),
                    name,
                    definition,
                    labels: Default::default(),
                })
                .collect(),
            resources,
        };

        validate(&project)?;

        // labels are computed from the finished project, never patched in place
        let labels: Vec<_> = project
            .services
            .iter()
            .map(|service| service_labels(&project, &service.name))
            .collect();
        for (service, labels) in project.services.iter_mut().zip(labels) {
            service.labels = labels;
        }

        info!(
            "Compiled project '{}' with {} services",
            project.name,
            project.services.len()
        );
        Ok(project)
    }
}

fn resolve_working_dir(options: &ProjectOptions) -> Result<PathBuf> {
    let dir = match (&options.working_dir, options.config_paths.first()) {
        (Some(dir), _) => dir.clone(),
        (None, Some(first)) => first
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
        (None, None) => PathBuf::from("."),
    };

    absolute(&dir)
}

fn resolve_config_files(options: &ProjectOptions, working_dir: &Path) -> Result<Vec<PathBuf>> {
    if !options.config_paths.is_empty() {
        return options.config_paths.iter().map(|p| absolute(p)).collect();
    }

    if options.default_config_path {
        for candidate in DEFAULT_CONFIG_FILES {
            let path = working_dir.join(candidate);
            if path.is_file() {
                return Ok(vec![path]);
            }
        }
    }

    Err(ConfigError::NoConfigFile(working_dir.to_path_buf()))
}

/// Load the environment file into the options, returning its path if one was used.
///
/// Injected and inherited variables take precedence over file entries.
fn load_env_file(options: &mut ProjectOptions, working_dir: &Path) -> Result<Option<PathBuf>> {
    let path = match &options.env_file {
        Some(path) if path.is_absolute() => path.clone(),
        Some(path) => working_dir.join(path),
        None => {
            let default = working_dir.join(DEFAULT_ENV_FILE);
            if !default.is_file() {
                return Ok(None);
            }
            default
        }
    };

    let entries = dotenvy::from_path_iter(&path).map_err(|e| env_file_error(&path, e))?;
    for entry in entries {
        let (key, value) = entry.map_err(|e| env_file_error(&path, e))?;
        options.environment.entry(key).or_insert(value);
    }

    debug!("Loaded environment file {}", path.display());
    Ok(Some(path))
}

fn env_file_error(path: &Path, error: dotenvy::Error) -> ConfigError {
    match error {
        dotenvy::Error::Io(source) => ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        },
        other => ConfigError::EnvFileError {
            path: path.to_path_buf(),
            reason: other.to_string(),
        },
    }
}

fn resolve_name(
    options: &ProjectOptions,
    manifest_name: Option<&str>,
    working_dir: &Path,
) -> Result<String> {
    let raw = options
        .name
        .clone()
        .or_else(|| manifest_name.map(str::to_string))
        .or_else(|| {
            working_dir
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
        })
        .unwrap_or_default();

    let normalized = normalize_project_name(&raw);
    if normalized.is_empty() {
        return Err(ConfigError::InvalidProjectName(raw));
    }
    Ok(normalized)
}

/// Lowercase, keep `[a-z0-9_-]` and strip leading non-alphanumerics
pub fn normalize_project_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_' || *c == '-')
        .skip_while(|c| !c.is_ascii_alphanumeric())
        .collect()
}

fn parse_depends_on(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Sequence(entries)) => entries
            .iter()
            .filter_map(|entry| entry.as_str().map(str::to_string))
            .collect(),
        Some(Value::Mapping(entries)) => entries
            .keys()
            .filter_map(|key| key.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

/// Shallow merge: keys of `incoming` replace keys of `base`
fn merge_mapping(base: &mut Mapping, incoming: Mapping) {
    for (key, value) in incoming {
        base.insert(key, value);
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).map_err(|source| ConfigError::ReadError {
        path: path.to_path_buf(),
        source,
    })
}

fn validate(project: &Project) -> Result<()> {
    for service in &project.services {
        if !service.definition.contains_key("image") && !service.definition.contains_key("build") {
            return Err(ConfigError::ValidationError(format!(
                "Service '{}' has neither an image nor a build context specified",
                service.name
            )));
        }

        for dependency in &service.depends_on {
            if project.service(dependency).is_none() {
                return Err(ConfigError::UnknownDependency {
                    service: service.name.clone(),
                    dependency: dependency.clone(),
                });
            }
        }
    }

    detect_cycles(project)
}

fn detect_cycles(project: &Project) -> Result<()> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }

    fn visit<'a>(
        name: &'a str,
        edges: &BTreeMap<&'a str, &'a [String]>,
        marks: &mut HashMap<&'a str, Mark>,
    ) -> Result<()> {
        match marks.get(name) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => return Err(ConfigError::DependencyCycle(name.to_string())),
            None => {}
        }

        marks.insert(name, Mark::Visiting);
        for dependency in edges.get(name).copied().unwrap_or_default() {
            visit(dependency, edges, marks)?;
        }
        marks.insert(name, Mark::Done);
        Ok(())
    }

    let edges: BTreeMap<&str, &[String]> = project
        .services
        .iter()
        .map(|s| (s.name.as_str(), s.depends_on.as_slice()))
        .collect();
    let mut marks = HashMap::new();

    for service in &project.services {
        visit(&service.name, &edges, &mut marks)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_project_name() {
        assert_eq!(normalize_project_name("My.Project"), "myproject");
        assert_eq!(normalize_project_name("__stack-1"), "stack-1");
        assert_eq!(normalize_project_name("..."), "");
    }

    #[test]
    fn test_parse_depends_on_forms() {
        let list: Value = serde_yaml::from_str("[db, cache]").unwrap();
        assert_eq!(parse_depends_on(Some(&list)), vec!["db", "cache"]);

        let map: Value =
            serde_yaml::from_str("db: {condition: service_healthy}\ncache: {}").unwrap();
        assert_eq!(parse_depends_on(Some(&map)), vec!["db", "cache"]);

        assert!(parse_depends_on(None).is_empty());
    }

    #[test]
    fn test_merge_mapping_overrides_keys() {
        let mut base: Mapping = serde_yaml::from_str("image: a\nports: ['80']").unwrap();
        let incoming: Mapping = serde_yaml::from_str("image: b").unwrap();
        merge_mapping(&mut base, incoming);

        assert_eq!(base["image"], Value::from("b"));
        assert_eq!(base["ports"][0], Value::from("80"));
    }
}
