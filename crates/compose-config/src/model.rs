//! Compiled project model.

use crate::Result;
use crate::labels::Labels;
use indexmap::IndexMap;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A compiled compose project
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Project {
    /// Stack identifier
    pub name: String,
    /// Directory relative paths are resolved against
    pub working_dir: PathBuf,
    /// Manifests that contributed to this project, in merge order
    pub config_files: Vec<PathBuf>,
    /// Environment file used during compilation
    pub env_file: Option<PathBuf>,
    /// Variables used for interpolation
    pub environment: BTreeMap<String, String>,
    /// Services in declaration order
    pub services: Vec<Service>,
    /// Top-level networks, volumes, secrets and configs
    pub resources: IndexMap<String, Value>,
}

/// A single service of a project
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Service {
    /// Service name, unique within the project
    pub name: String,
    /// Services that must be started first
    pub depends_on: Vec<String>,
    /// Raw service definition after interpolation and merging
    pub definition: Mapping,
    /// Derived discovery labels
    pub labels: Labels,
}

impl Project {
    /// Service names in declaration order
    pub fn service_names(&self) -> Vec<String> {
        self.services.iter().map(|s| s.name.clone()).collect()
    }

    /// Look up a service by name
    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.name == name)
    }

    /// Narrow the project to `requested`, keeping declaration order.
    ///
    /// Unknown names are dropped.
    pub fn filter_services(&self, requested: &[String]) -> Project {
        let mut requested = requested.to_vec();
        requested.sort();

        let services = self
            .services
            .iter()
            .filter(|service| requested.binary_search(&service.name).is_ok())
            .cloned()
            .collect();

        Project {
            services,
            ..self.clone()
        }
    }

    /// Render the project as a compose document.
    ///
    /// Derived labels are merged into each service and dependencies on
    /// services that are not part of this project are left out.
    pub fn to_yaml(&self) -> Result<String> {
        let mut services = Mapping::new();
        for service in &self.services {
            services.insert(
                Value::String(service.name.clone()),
                Value::Mapping(self.render_service(service)),
            );
        }

        let mut document = Mapping::new();
        document.insert("name".into(), Value::String(self.name.clone()));
        document.insert("services".into(), Value::Mapping(services));
        for (key, value) in &self.resources {
            document.insert(Value::String(key.clone()), value.clone());
        }

        Ok(serde_yaml::to_string(&document)?)
    }

    fn render_service(&self, service: &Service) -> Mapping {
        let mut definition = service.definition.clone();

        let mut labels = match definition.remove("labels") {
            Some(existing) => labels_to_mapping(existing),
            None => Mapping::new(),
        };
        for (key, value) in &service.labels {
            labels.insert(Value::String(key.clone()), Value::String(value.clone()));
        }
        definition.insert("labels".into(), Value::Mapping(labels));

        if let Some(depends_on) = definition.remove("depends_on") {
            let retained = match depends_on {
                Value::Sequence(entries) => {
                    let kept: Vec<Value> = entries
                        .into_iter()
                        .filter(|entry| entry.as_str().is_some_and(|name| self.service(name).is_some()))
                        .collect();
                    (!kept.is_empty()).then_some(Value::Sequence(kept))
                }
                Value::Mapping(entries) => {
                    let kept: Mapping = entries
                        .into_iter()
                        .filter(|(key, _)| key.as_str().is_some_and(|name| self.service(name).is_some()))
                        .collect();
                    (!kept.is_empty()).then_some(Value::Mapping(kept))
                }
                other => Some(other),
            };
            if let Some(retained) = retained {
                definition.insert("depends_on".into(), retained);
            }
        }

        definition
    }
}

/// Normalize list-form (`KEY=VALUE`) or mapping-form labels to a mapping
fn labels_to_mapping(value: Value) -> Mapping {
    match value {
        Value::Mapping(mapping) => mapping,
        Value::Sequence(entries) => entries
            .into_iter()
            .filter_map(|entry| {
                let entry = entry.as_str()?.to_string();
                let (key, value) = entry.split_once('=').unwrap_or((entry.as_str(), ""));
                Some((Value::String(key.to_string()), Value::String(value.to_string())))
            })
            .collect(),
        _ => Mapping::new(),
    }
}
