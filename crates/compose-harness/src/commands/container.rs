use crate::commands::StackArgs;
use anyhow::{Context, Result};

pub async fn run(stack_args: &StackArgs, service: &str) -> Result<()> {
    let stack = stack_args.builder()?.build();

    let container = stack
        .service_container(service)
        .await
        .with_context(|| format!("Failed to find container for service {}", service))?;

    println!("{}", container.id());
    Ok(())
}
