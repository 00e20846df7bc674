use crate::commands::StackArgs;
use anyhow::{Context, Result};
use compose_stack::{DownOption, RemoveImages};

pub async fn run(stack_args: &StackArgs, remove_orphans: bool, rmi: Option<RemoveImages>) -> Result<()> {
    let stack = stack_args.builder()?.build();
    let name = stack.identifier().await;

    // The stack was started by another process, compile to know what to tear down
    stack
        .compile()
        .await
        .context("Failed to compile compose files")?;

    let mut options = vec![DownOption::RemoveOrphans(remove_orphans)];
    if let Some(images) = rmi {
        options.push(DownOption::RemoveImages(images));
    }

    stack
        .down(&options)
        .await
        .with_context(|| format!("Failed to tear down stack {}", name))?;

    println!("✓ Stack {} is down", name);
    Ok(())
}
