//! Runtime gateway backed by the `docker` CLI.

use crate::{
    Error, Result,
    gateway::{
        ContainerFilter, ContainerStatus, ContainerSummary, DownRequest, Recreate,
        RuntimeGateway, UpRequest,
    },
};
use async_process::{Command, Stdio};
use async_trait::async_trait;
use compose_config::Project;
use std::ffi::OsString;
use std::io::Write;
use tracing::{debug, info};

/// Gateway that shells out to `docker` and `docker compose`
#[derive(Debug, Clone)]
pub struct DockerCliGateway {
    binary: OsString,
}

/// Output of a finished docker invocation
struct CommandOutput {
    stdout: String,
    stderr: String,
}

impl DockerCliGateway {
    /// Use `docker` from `PATH`
    pub fn new() -> Self {
        Self {
            binary: OsString::from("docker"),
        }
    }

    /// Use a specific docker binary
    pub fn with_binary(binary: impl Into<OsString>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn run(&self, operation: &str, args: &[OsString], envs: &[(&str, &str)]) -> Result<CommandOutput> {
        debug!(
            "Running {} {}",
            self.binary.to_string_lossy(),
            args.iter()
                .map(|a| a.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        );

        let mut command = Command::new(&self.binary);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in envs {
            command.env(key, value);
        }

        let output = command
            .output()
            .await
            .map_err(|e| Error::gateway(operation, format!("failed to spawn docker: {}", e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            let reason = if stderr.trim().is_empty() {
                format!("docker exited with {}", output.status)
            } else {
                stderr.trim().to_string()
            };
            return Err(Error::gateway(operation, reason));
        }

        Ok(CommandOutput { stdout, stderr })
    }
}

impl Default for DockerCliGateway {
    fn default() -> Self {
        Self::new()
    }
}

/// Arguments for `docker compose up`
fn up_args(project: &Project, request: &UpRequest, compose_file: &std::path::Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "compose".into(),
        "--project-name".into(),
        project.name.clone().into(),
        "--project-directory".into(),
        project.working_dir.clone().into(),
        "--file".into(),
        compose_file.into(),
        "up".into(),
        "--detach".into(),
    ];

    match request.create.recreate {
        Recreate::Diverged => {}
        Recreate::Force => args.push("--force-recreate".into()),
        Recreate::Never => args.push("--no-recreate".into()),
    }
    if request.create.recreate_dependencies == Recreate::Force {
        args.push("--always-recreate-deps".into());
    }
    if request.create.remove_orphans {
        args.push("--remove-orphans".into());
    }
    if request.start.wait {
        args.push("--wait".into());
    }

    args.extend(request.create.services.iter().map(OsString::from));
    args
}

/// Arguments for `docker compose down`
fn down_args(stack_name: &str, request: &DownRequest) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "compose".into(),
        "--project-name".into(),
        stack_name.into(),
        "down".into(),
    ];

    if request.remove_orphans {
        args.push("--remove-orphans".into());
    }
    if let Some(images) = request.images {
        args.push("--rmi".into());
        args.push(images.as_str().into());
    }
    args
}

/// Arguments for `docker ps`
fn list_args(filter: &ContainerFilter) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["ps".into(), "--no-trunc".into()];
    if filter.all {
        args.push("--all".into());
    }
    for (key, value) in &filter.labels {
        args.push("--filter".into());
        args.push(format!("label={}={}", key, value).into());
    }
    args.push("--format".into());
    args.push("{{.ID}}|{{.Names}}|{{.State}}".into());
    args
}

fn parse_container_list(output: &str) -> Vec<ContainerSummary> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let mut parts = line.splitn(3, '|');
            let id = parts.next()?.to_string();
            let names = parts
                .next()
                .unwrap_or_default()
                .split(',')
                .filter(|n| !n.is_empty())
                .map(str::to_string)
                .collect();
            let state = parts.next().unwrap_or_default().to_string();
            Some(ContainerSummary { id, names, state })
        })
        .collect()
}

fn parse_status(output: &str) -> ContainerStatus {
    let (state, health) = output.trim().split_once('|').unwrap_or((output.trim(), ""));
    ContainerStatus {
        state: state.to_string(),
        health: (!health.is_empty()).then(|| health.to_string()),
    }
}

#[async_trait]
impl RuntimeGateway for DockerCliGateway {
    async fn up(&self, project: &Project, request: &UpRequest) -> Result<()> {
        let rendered = project.to_yaml()?;

        let mut compose_file = tempfile::Builder::new()
            .prefix("compose-harness-")
            .suffix(".yaml")
            .tempfile()?;
        compose_file.write_all(rendered.as_bytes())?;
        compose_file.flush()?;

        info!(
            "Bringing up project {} ({} services)",
            project.name,
            request.create.services.len()
        );

        let envs: &[(&str, &str)] = if request.create.ignore_orphans {
            &[("COMPOSE_IGNORE_ORPHANS", "true")]
        } else {
            &[]
        };
        self.run("up", &up_args(project, request, compose_file.path()), envs)
            .await?;
        Ok(())
    }

    async fn down(&self, stack_name: &str, request: &DownRequest) -> Result<()> {
        info!("Tearing down project {}", stack_name);
        self.run("down", &down_args(stack_name, request), &[]).await?;
        Ok(())
    }

    async fn list_containers(&self, filter: &ContainerFilter) -> Result<Vec<ContainerSummary>> {
        let output = self.run("list", &list_args(filter), &[]).await?;
        Ok(parse_container_list(&output.stdout))
    }

    async fn container_status(&self, id: &str) -> Result<ContainerStatus> {
        let args: Vec<OsString> = vec![
            "inspect".into(),
            "--format".into(),
            "{{.State.Status}}|{{if .State.Health}}{{.State.Health.Status}}{{end}}".into(),
            id.into(),
        ];
        let output = self.run("inspect", &args, &[]).await?;
        Ok(parse_status(&output.stdout))
    }

    async fn container_logs(&self, id: &str) -> Result<String> {
        let args: Vec<OsString> = vec!["logs".into(), id.into()];
        let output = self.run("logs", &args, &[]).await?;
        Ok(format!("{}{}", output.stdout, output.stderr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{CreateOptions, RemoveImages, StartOptions};
    use std::path::{Path, PathBuf};

    fn strings(args: Vec<OsString>) -> Vec<String> {
        args.into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_up_args() {
        let project = Project {
            name: "stack".to_string(),
            working_dir: PathBuf::from("/work"),
            ..Default::default()
        };
        let request = UpRequest {
            create: CreateOptions {
                services: vec!["api".to_string()],
                remove_orphans: true,
                ..Default::default()
            },
            start: StartOptions { wait: true },
        };

        let args = strings(up_args(&project, &request, Path::new("/tmp/c.yaml")));
        assert_eq!(
            args,
            vec![
                "compose",
                "--project-name",
                "stack",
                "--project-directory",
                "/work",
                "--file",
                "/tmp/c.yaml",
                "up",
                "--detach",
                "--remove-orphans",
                "--wait",
                "api"
            ]
        );
    }

    #[test]
    fn test_down_args() {
        let request = DownRequest {
            remove_orphans: true,
            images: Some(RemoveImages::Local),
            ..Default::default()
        };
        assert_eq!(
            strings(down_args("stack", &request)),
            vec!["compose", "--project-name", "stack", "down", "--remove-orphans", "--rmi", "local"]
        );
    }

    #[test]
    fn test_list_args_include_label_filters() {
        let filter = ContainerFilter {
            all: true,
            ..Default::default()
        }
        .with_label("com.docker.compose.project", "stack")
        .with_label("com.docker.compose.service", "web");

        let args = strings(list_args(&filter));
        assert!(args.contains(&"--all".to_string()));
        assert!(args.contains(&"label=com.docker.compose.project=stack".to_string()));
        assert!(args.contains(&"label=com.docker.compose.service=web".to_string()));
    }

    #[test]
    fn test_parse_container_list() {
        let containers = parse_container_list("abc|stack-web-1|running\n\ndef|stack-web-2|exited\n");
        assert_eq!(containers.len(), 2);
        assert_eq!(containers[0].id, "abc");
        assert_eq!(containers[0].names, vec!["stack-web-1"]);
        assert_eq!(containers[1].state, "exited");
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(
            parse_status("running|healthy\n"),
            ContainerStatus {
                state: "running".to_string(),
                health: Some("healthy".to_string())
            }
        );
        assert_eq!(parse_status("running|").health, None);
    }

    #[test]
    fn test_missing_binary_is_a_gateway_error() {
        let gateway = DockerCliGateway::with_binary("/nonexistent/compose-harness/docker");

        let err = smol::block_on(gateway.list_containers(&ContainerFilter::default())).unwrap_err();
        match err {
            Error::Gateway { operation, reason } => {
                assert_eq!(operation, "list");
                assert!(reason.starts_with("failed to spawn docker"));
            }
            other => panic!("Expected gateway error, got {:?}", other),
        }
    }
}
