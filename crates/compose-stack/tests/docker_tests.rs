//! Tests against a real Docker engine
//!
//! Run with `cargo test -p compose-stack --features docker-tests`.

#![cfg(feature = "docker-tests")]

use compose_stack::{
    ComposeStackBuilder, DownOption, ForAll, ForHealthy, ForLogLine, StackConfiguration, UpOption,
};
use std::time::Duration;

const MANIFEST: &str = r#"
services:
  echo:
    image: alpine:3.20
    command: ["sh", "-c", "echo listening; sleep 300"]
  sidecar:
    image: alpine:3.20
    command: ["sleep", "300"]
    depends_on:
      - echo
"#;

#[smol_potat::test]
async fn test_stack_lifecycle() {
    let stack = ComposeStackBuilder::new()
        .with_readers([MANIFEST.as_bytes()])
        .unwrap()
        .wait_for_service(
            "echo",
            ForAll::new()
                .with(ForHealthy::new())
                .with(ForLogLine::new("listening").with_startup_timeout(Duration::from_secs(30))),
        )
        .build();

    stack.up(&[UpOption::Wait(true)]).await.unwrap();

    let echo = stack.service_container("echo").await.unwrap();
    assert!(!echo.id().is_empty());
    assert_eq!(echo.status().await.unwrap().state, "running");
    assert!(echo.logs().await.unwrap().contains("listening"));

    let sidecar = stack.service_container("sidecar").await.unwrap();
    assert_ne!(sidecar.id(), echo.id());

    stack.down(&[DownOption::RemoveOrphans(true)]).await.unwrap();
}

#[smol_potat::test]
async fn test_run_single_service() {
    let dir = tempfile::TempDir::new().unwrap();
    let manifest = dir.path().join("docker-compose.yml");
    std::fs::write(&manifest, MANIFEST).unwrap();

    let stack = ComposeStackBuilder::new().with_files([manifest]).build();

    stack
        .up(&[UpOption::RunServices(vec!["echo".to_string()])])
        .await
        .unwrap();
    assert_eq!(stack.services().await.unwrap(), vec!["echo"]);

    stack.down(&[]).await.unwrap();
}
