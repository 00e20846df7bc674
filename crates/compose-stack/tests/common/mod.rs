//! Common test utilities

#![allow(dead_code)]

use async_trait::async_trait;
use compose_config::Project;
use compose_config::labels::SERVICE_LABEL;
use compose_stack::{
    ContainerFilter, ContainerStatus, ContainerSummary, DownRequest, Error, Result,
    RuntimeGateway, UpRequest,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Calls seen by a [`FakeGateway`]
#[derive(Debug, Default)]
pub struct Recorded {
    pub up: Vec<(Project, UpRequest)>,
    pub down: Vec<(String, DownRequest)>,
    pub list: Vec<ContainerFilter>,
}

/// In-memory runtime that records every call
#[derive(Default)]
pub struct FakeGateway {
    containers: HashMap<String, Vec<ContainerSummary>>,
    statuses: HashMap<String, ContainerStatus>,
    logs: HashMap<String, String>,
    up_error: Option<String>,
    recorded: Mutex<Recorded>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a running container `id` for `service`
    pub fn with_container(mut self, service: &str, id: &str) -> Self {
        self.containers
            .entry(service.to_string())
            .or_default()
            .push(ContainerSummary {
                id: id.to_string(),
                names: vec![format!("stack-{}-1", service)],
                state: "running".to_string(),
            });
        self
    }

    pub fn with_status(mut self, id: &str, state: &str, health: Option<&str>) -> Self {
        self.statuses.insert(
            id.to_string(),
            ContainerStatus {
                state: state.to_string(),
                health: health.map(str::to_string),
            },
        );
        self
    }

    pub fn with_logs(mut self, id: &str, logs: &str) -> Self {
        self.logs.insert(id.to_string(), logs.to_string());
        self
    }

    /// Make every `up` call fail with `reason`
    pub fn failing_up(mut self, reason: &str) -> Self {
        self.up_error = Some(reason.to_string());
        self
    }

    pub fn up_calls(&self) -> Vec<(Project, UpRequest)> {
        self.recorded.lock().unwrap().up.clone()
    }

    pub fn down_calls(&self) -> Vec<(String, DownRequest)> {
        self.recorded.lock().unwrap().down.clone()
    }

    pub fn list_calls(&self) -> usize {
        self.recorded.lock().unwrap().list.len()
    }

    pub fn last_list_filter(&self) -> Option<ContainerFilter> {
        self.recorded.lock().unwrap().list.last().cloned()
    }
}

#[async_trait]
impl RuntimeGateway for FakeGateway {
    async fn up(&self, project: &Project, request: &UpRequest) -> Result<()> {
        self.recorded
            .lock()
            .unwrap()
            .up
            .push((project.clone(), request.clone()));
        match &self.up_error {
            Some(reason) => Err(Error::gateway("up", reason.clone())),
            None => Ok(()),
        }
    }

    async fn down(&self, stack_name: &str, request: &DownRequest) -> Result<()> {
        self.recorded
            .lock()
            .unwrap()
            .down
            .push((stack_name.to_string(), request.clone()));
        Ok(())
    }

    async fn list_containers(&self, filter: &ContainerFilter) -> Result<Vec<ContainerSummary>> {
        self.recorded.lock().unwrap().list.push(filter.clone());

        let service = filter
            .labels
            .iter()
            .find(|(key, _)| key == SERVICE_LABEL)
            .map(|(_, value)| value.as_str());
        Ok(service
            .and_then(|service| self.containers.get(service))
            .cloned()
            .unwrap_or_default())
    }

    async fn container_status(&self, id: &str) -> Result<ContainerStatus> {
        Ok(self.statuses.get(id).cloned().unwrap_or(ContainerStatus {
            state: "running".to_string(),
            health: None,
        }))
    }

    async fn container_logs(&self, id: &str) -> Result<String> {
        Ok(self.logs.get(id).cloned().unwrap_or_default())
    }
}

/// Write `content` to `dir/name` and return the path
pub fn write_manifest(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

/// Two services where `api` depends on `db`
pub const DB_API_MANIFEST: &str = r#"
services:
  db:
    image: postgres:16
  api:
    image: "example/api:${API_TAG:-latest}"
    depends_on:
      - db
"#;
