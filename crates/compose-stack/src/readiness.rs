//! Readiness strategies and the per-service registry.
//!
//! A strategy decides when a container is fit for use by tests. Only one
//! strategy is bound per service; combine several with [`ForAll`].

use crate::{
    Error, Result, cancel::CancelToken, container::StackContainer, fanout::join_first_error,
};
use async_trait::async_trait;
use futures::future::{BoxFuture, Either, select};
use std::collections::HashMap;
use std::future::Future;
use std::pin::pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(60);

/// Decides when a container is ready
#[async_trait]
pub trait ReadinessStrategy: Send + Sync {
    /// Resolve once `target` is ready.
    ///
    /// Implementations must return promptly with [`Error::Cancelled`] once
    /// `cancel` is cancelled.
    async fn wait_until_ready(&self, target: &StackContainer, cancel: &CancelToken) -> Result<()>;
}

/// Service name to readiness strategy bindings
#[derive(Clone, Default)]
pub struct ReadinessRegistry {
    strategies: HashMap<String, Arc<dyn ReadinessStrategy>>,
}

impl ReadinessRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `strategy` to `service`, replacing any earlier binding
    pub fn register(&mut self, service: impl Into<String>, strategy: Arc<dyn ReadinessStrategy>) {
        self.strategies.insert(service.into(), strategy);
    }

    /// Strategy bound to `service`
    pub fn get(&self, service: &str) -> Option<Arc<dyn ReadinessStrategy>> {
        self.strategies.get(service).cloned()
    }

    /// All bindings
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Arc<dyn ReadinessStrategy>)> {
        self.strategies.iter()
    }

    /// Number of bound services
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// Whether no service is bound
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

impl std::fmt::Debug for ReadinessRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut services: Vec<_> = self.strategies.keys().collect();
        services.sort();
        f.debug_struct("ReadinessRegistry")
            .field("services", &services)
            .finish()
    }
}

/// Poll `check` every `interval` until it returns `true`, `timeout` elapses
/// or `cancel` fires.
async fn poll_until<F, Fut>(
    service: &str,
    interval: Duration,
    timeout: Duration,
    cancel: &CancelToken,
    mut check: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let deadline = Instant::now() + timeout;

    loop {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if check().await? {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(Error::readiness(
                service,
                format!("not ready after {:?}", timeout),
            ));
        }

        let cancelled = pin!(cancel.cancelled());
        if let Either::Right(_) = select(async_io::Timer::after(interval), cancelled).await {
            return Err(Error::Cancelled);
        }
    }
}

/// Wait until the container reports `healthy`, or `running` when it has no
/// healthcheck
#[derive(Debug, Clone)]
pub struct ForHealthy {
    poll_interval: Duration,
    startup_timeout: Duration,
}

impl ForHealthy {
    /// Create the strategy with default polling
    pub fn new() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
        }
    }

    /// Set the poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the startup timeout
    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }
}

impl Default for ForHealthy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReadinessStrategy for ForHealthy {
    async fn wait_until_ready(&self, target: &StackContainer, cancel: &CancelToken) -> Result<()> {
        poll_until(
            target.service(),
            self.poll_interval,
            self.startup_timeout,
            cancel,
            move || async move {
                let status = target.status().await?;
                debug!(
                    "Service {} state={} health={:?}",
                    target.service(),
                    status.state,
                    status.health
                );

                match (status.state.as_str(), status.health.as_deref()) {
                    ("exited" | "dead", _) => Err(Error::readiness(
                        target.service(),
                        format!("container is {}", status.state),
                    )),
                    (_, Some(health)) => Ok(health == "healthy"),
                    (state, None) => Ok(state == "running"),
                }
            },
        )
        .await
    }
}

/// Wait until a text appears in the container logs
#[derive(Debug, Clone)]
pub struct ForLogLine {
    text: String,
    occurrences: usize,
    poll_interval: Duration,
    startup_timeout: Duration,
}

impl ForLogLine {
    /// Wait for one occurrence of `text`
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            occurrences: 1,
            poll_interval: DEFAULT_POLL_INTERVAL,
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
        }
    }

    /// Require `occurrences` matches
    pub fn with_occurrence(mut self, occurrences: usize) -> Self {
        self.occurrences = occurrences;
        self
    }

    /// Set the poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the startup timeout
    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }
}

#[async_trait]
impl ReadinessStrategy for ForLogLine {
    async fn wait_until_ready(&self, target: &StackContainer, cancel: &CancelToken) -> Result<()> {
        poll_until(
            target.service(),
            self.poll_interval,
            self.startup_timeout,
            cancel,
            move || async move {
                let logs = target.logs().await?;
                Ok(logs.matches(self.text.as_str()).count() >= self.occurrences)
            },
        )
        .await
    }
}

/// Run several strategies concurrently; the first failure wins
#[derive(Clone, Default)]
pub struct ForAll {
    strategies: Vec<Arc<dyn ReadinessStrategy>>,
}

impl ForAll {
    /// Create an empty composite
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a strategy
    pub fn with(mut self, strategy: impl ReadinessStrategy + 'static) -> Self {
        self.strategies.push(Arc::new(strategy));
        self
    }
}

#[async_trait]
impl ReadinessStrategy for ForAll {
    async fn wait_until_ready(&self, target: &StackContainer, cancel: &CancelToken) -> Result<()> {
        let checks = self
            .strategies
            .iter()
            .map(|strategy| strategy.wait_until_ready(target, cancel));
        join_first_error(checks, cancel).await
    }
}

type ReadinessFn =
    dyn Fn(StackContainer, CancelToken) -> BoxFuture<'static, Result<()>> + Send + Sync;

/// Readiness decided by a caller-supplied closure
#[derive(Clone)]
pub struct ForFn {
    check: Arc<ReadinessFn>,
}

impl ForFn {
    /// Wrap `check`
    pub fn new<F>(check: F) -> Self
    where
        F: Fn(StackContainer, CancelToken) -> BoxFuture<'static, Result<()>> + Send + Sync + 'static,
    {
        Self {
            check: Arc::new(check),
        }
    }
}

#[async_trait]
impl ReadinessStrategy for ForFn {
    async fn wait_until_ready(&self, target: &StackContainer, cancel: &CancelToken) -> Result<()> {
        (self.check)(target.clone(), cancel.clone()).await
    }
}
