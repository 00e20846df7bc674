use crate::commands::StackArgs;
use anyhow::{Context, Result};
use clap::Args;
use compose_stack::{ForAll, ForHealthy, ForLogLine, StackConfiguration, UpOption};
use std::collections::BTreeMap;
use tracing::info;

#[derive(Args)]
pub struct UpArgs {
    /// Services to start (empty means all)
    pub services: Vec<String>,

    /// Wait for services to be running or healthy
    #[arg(long)]
    pub wait: bool,

    /// Remove containers for services not in the compose files
    #[arg(long)]
    pub remove_orphans: bool,

    /// Do not warn about orphaned containers
    #[arg(long)]
    pub ignore_orphans: bool,

    /// Wait until SERVICE reports healthy (repeatable)
    #[arg(long = "wait-healthy", value_name = "SERVICE")]
    pub wait_healthy: Vec<String>,

    /// Wait until SERVICE logs TEXT, as SERVICE=TEXT (repeatable)
    #[arg(long = "wait-log", value_name = "SERVICE=TEXT", value_parser = crate::parse_key_val)]
    pub wait_log: Vec<(String, String)>,
}

impl UpArgs {
    fn options(&self) -> Vec<UpOption> {
        let mut options = vec![
            UpOption::Wait(self.wait),
            UpOption::RemoveOrphans(self.remove_orphans),
            UpOption::IgnoreOrphans(self.ignore_orphans),
        ];
        if !self.services.is_empty() {
            options.push(UpOption::RunServices(self.services.clone()));
        }
        options
    }

    /// One composite strategy per service, so repeated flags add up
    fn readiness(&self) -> BTreeMap<String, ForAll> {
        let mut strategies: BTreeMap<String, ForAll> = BTreeMap::new();
        for service in &self.wait_healthy {
            let entry = strategies.entry(service.clone()).or_default();
            *entry = std::mem::take(entry).with(ForHealthy::new());
        }
        for (service, text) in &self.wait_log {
            let entry = strategies.entry(service.clone()).or_default();
            *entry = std::mem::take(entry).with(ForLogLine::new(text));
        }
        strategies
    }
}

pub async fn run(stack_args: &StackArgs, args: UpArgs) -> Result<()> {
    let mut builder = stack_args.builder()?;
    for (service, strategy) in args.readiness() {
        builder = builder.wait_for_service(service, strategy);
    }
    let stack = builder.build();

    let name = stack.identifier().await;
    info!("Bringing up stack {}", name);
    stack
        .up(&args.options())
        .await
        .with_context(|| format!("Failed to bring up stack {}", name))?;

    println!("✓ Stack {} is up", name);
    for service in stack.services().await? {
        println!("  {}", service);
    }

    Ok(())
}
