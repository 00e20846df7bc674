use crate::commands::StackArgs;
use anyhow::{Context, Result};

pub async fn run(stack_args: &StackArgs) -> Result<()> {
    let stack = stack_args.builder()?.build();
    stack
        .compile()
        .await
        .context("Failed to compile compose files")?;

    for service in stack.services().await? {
        println!("{}", service);
    }
    Ok(())
}
