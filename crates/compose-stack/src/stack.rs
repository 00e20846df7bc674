//! Stack lifecycle controller.
//!
//! Every public operation on [`ComposeStack`] holds a single exclusive lock
//! for its whole duration, including gateway calls and the readiness
//! fan-out, so the compiled project and the container cache are never seen
//! mid-mutation.

use crate::{
    Error, Result,
    cancel::CancelToken,
    container::{ContainerCache, StackContainer},
    docker::DockerCliGateway,
    fanout::join_first_error,
    gateway::RuntimeGateway,
    options::{DownOption, StackDownOptions, StackUpOptions, UpOption},
    readiness::{ReadinessRegistry, ReadinessStrategy},
    staging::stage_readers,
};
use compose_config::{
    CompileOption, Project, ProjectCompiler, YamlCompiler, compiler::normalize_project_name,
};
use futures::lock::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Configuration capability shared by stack builders
pub trait StackConfiguration: Sized {
    /// Inject environment variables used for interpolation.
    ///
    /// Fails if a key was already injected.
    fn with_env<I, K, V>(self, env: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>;

    /// Inherit the process environment for interpolation
    fn with_os_env(self) -> Self;

    /// Bind `strategy` to `service`, replacing any earlier binding
    fn wait_for_service(
        self,
        service: impl Into<String>,
        strategy: impl ReadinessStrategy + 'static,
    ) -> Self;
}

/// Mutable controller state, guarded by the controller lock
#[derive(Debug)]
struct StackState {
    /// Stack identifier, a UUID unless set explicitly
    name: String,
    /// Manifest paths considered when compiling the project
    configs: Vec<PathBuf>,
    /// Injected environment
    environment: BTreeMap<String, String>,
    /// Whether the process environment is inherited
    os_env: bool,
    /// One readiness strategy per service
    readiness: ReadinessRegistry,
    /// Containers already resolved, to avoid repeated runtime queries
    containers: ContainerCache,
    /// Compiled project, `None` until the first `up`
    project: Option<Project>,
}

impl StackState {
    fn new(name: String) -> Self {
        Self {
            name,
            configs: Vec::new(),
            environment: BTreeMap::new(),
            os_env: false,
            readiness: ReadinessRegistry::new(),
            containers: ContainerCache::new(),
            project: None,
        }
    }

    /// Compile options; name and default path come last so callers can't override them
    fn compile_options(&self) -> Vec<CompileOption> {
        let mut options = Vec::with_capacity(4);
        if !self.environment.is_empty() {
            options.push(CompileOption::Environment(self.environment.clone()));
        }
        if self.os_env {
            options.push(CompileOption::OsEnvironment);
        }
        options.push(CompileOption::Name(self.name.clone()));
        options.push(CompileOption::DefaultConfigPath);
        options
    }

    /// Add `env`, leaving the environment untouched if any key is already set
    fn inject_env<I, K, V>(&mut self, env: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let env: Vec<(String, String)> = env
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        let mut seen = BTreeSet::new();
        for (key, _) in &env {
            if self.environment.contains_key(key) || !seen.insert(key.as_str()) {
                return Err(Error::DuplicateEnvironmentKey(key.clone()));
            }
        }

        self.environment.extend(env);
        Ok(())
    }
}

/// Builder for [`ComposeStack`]
pub struct ComposeStackBuilder {
    state: StackState,
    compiler: Arc<dyn ProjectCompiler>,
    gateway: Option<Arc<dyn RuntimeGateway>>,
}

impl ComposeStackBuilder {
    /// Start a builder with a generated stack identifier
    pub fn new() -> Self {
        Self {
            state: StackState::new(uuid::Uuid::new_v4().to_string()),
            compiler: Arc::new(YamlCompiler),
            gateway: None,
        }
    }

    /// Manifest files, merged in the given order
    pub fn with_files<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.state.configs = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Manifests supplied as byte streams, staged to a temporary directory
    ///
    /// # Panics
    ///
    /// Panics if the current working directory cannot be determined.
    pub fn with_readers<R: Read>(mut self, readers: impl IntoIterator<Item = R>) -> Result<Self> {
        self.state.configs = stage_readers(readers)?;
        Ok(self)
    }

    /// Explicit stack identifier, normalized the same way project names are
    /// so container lookups match the labels the runtime applies
    pub fn with_identifier(mut self, identifier: impl AsRef<str>) -> Self {
        self.state.name = normalize_project_name(identifier.as_ref());
        self
    }

    /// Project compiler, [`YamlCompiler`] by default
    pub fn with_compiler(mut self, compiler: Arc<dyn ProjectCompiler>) -> Self {
        self.compiler = compiler;
        self
    }

    /// Runtime gateway, [`DockerCliGateway`] by default
    pub fn with_gateway(mut self, gateway: Arc<dyn RuntimeGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Finish configuration
    pub fn build(self) -> ComposeStack {
        ComposeStack {
            state: Mutex::new(self.state),
            compiler: self.compiler,
            gateway: self
                .gateway
                .unwrap_or_else(|| Arc::new(DockerCliGateway::new())),
        }
    }
}

impl Default for ComposeStackBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StackConfiguration for ComposeStackBuilder {
    fn with_env<I, K, V>(mut self, env: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.state.inject_env(env)?;
        Ok(self)
    }

    fn with_os_env(mut self) -> Self {
        self.state.os_env = true;
        self
    }

    fn wait_for_service(
        mut self,
        service: impl Into<String>,
        strategy: impl ReadinessStrategy + 'static,
    ) -> Self {
        self.state.readiness.register(service, Arc::new(strategy));
        self
    }
}

/// A compose stack under test
pub struct ComposeStack {
    state: Mutex<StackState>,
    compiler: Arc<dyn ProjectCompiler>,
    gateway: Arc<dyn RuntimeGateway>,
}

impl ComposeStack {
    /// Stack identifier
    pub async fn identifier(&self) -> String {
        self.state.lock().await.name.clone()
    }

    /// Inject environment variables; fails if a key was already injected
    pub async fn with_env<I, K, V>(&self, env: I) -> Result<&Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.state.lock().await.inject_env(env)?;
        Ok(self)
    }

    /// Inherit the process environment for interpolation
    pub async fn with_os_env(&self) -> &Self {
        self.state.lock().await.os_env = true;
        self
    }

    /// Bind `strategy` to `service`, replacing any earlier binding
    pub async fn wait_for_service(
        &self,
        service: impl Into<String>,
        strategy: impl ReadinessStrategy + 'static,
    ) -> &Self {
        self.state
            .lock()
            .await
            .readiness
            .register(service, Arc::new(strategy));
        self
    }

    /// Compile the project without starting anything.
    ///
    /// Lets [`down`](Self::down) tear down a stack started by another process.
    pub async fn compile(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.project = None;
        let project = self
            .compiler
            .compile(&state.configs, &state.compile_options())?;

        debug!(
            "Compiled stack {} with {} services",
            state.name,
            project.services.len()
        );
        state.project = Some(project);
        Ok(())
    }

    /// Compile the project, start the requested services and wait for every
    /// service with a readiness strategy.
    ///
    /// Returns the first readiness failure; the remaining checks are cancelled.
    pub async fn up(&self, options: &[UpOption]) -> Result<()> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        state.project = None;
        let project = self
            .compiler
            .compile(&state.configs, &state.compile_options())?;

        let mut up_options = StackUpOptions::for_project(&project).apply(options);
        if up_options.services.is_empty() {
            up_options.services = project.service_names();
        }
        let project = if up_options.services.len() != project.services.len() {
            let filtered = project.filter_services(&up_options.services);
            up_options.services = filtered.service_names();
            filtered
        } else {
            project
        };

        info!(
            "Starting stack {} with services {:?}",
            state.name, up_options.services
        );
        let project = state.project.insert(project);
        self.gateway.up(project, &up_options.to_request()).await?;

        if state.readiness.is_empty() {
            return Ok(());
        }

        debug!(
            "Waiting for {} services to become ready",
            state.readiness.len()
        );
        let cancel = CancelToken::new();
        let gateway = &self.gateway;
        let containers = &state.containers;
        let name = state.name.as_str();
        let cancel_ref = &cancel;

        let checks = state.readiness.iter().map(|(service, strategy)| async move {
            let target = containers.lookup(gateway, name, service).await?;
            strategy.wait_until_ready(&target, cancel_ref).await
        });

        join_first_error(checks, &cancel).await?;
        info!("Stack {} is ready", state.name);
        Ok(())
    }

    /// Tear the stack down
    pub async fn down(&self, options: &[DownOption]) -> Result<()> {
        let state = self.state.lock().await;
        let project = state.project.as_ref().ok_or(Error::NotStarted)?;

        let request = StackDownOptions::default().apply(options).to_request(project);
        info!("Stopping stack {}", state.name);
        self.gateway.down(&state.name, &request).await
    }

    /// Service names of the compiled project
    pub async fn services(&self) -> Result<Vec<String>> {
        let state = self.state.lock().await;
        state
            .project
            .as_ref()
            .map(Project::service_names)
            .ok_or(Error::NotStarted)
    }

    /// Container running `service`
    pub async fn service_container(&self, service: &str) -> Result<StackContainer> {
        let state = self.state.lock().await;
        state
            .containers
            .lookup(&self.gateway, &state.name, service)
            .await
    }

    /// Forget every cached container handle
    pub async fn clear_containers(&self) {
        self.state.lock().await.containers.clear();
    }
}
