use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::process::Command;

use super::{RunOutcome, SandboxRunner, run_capped};

/// A simple runner that executes the binary directly
///
/// SimpleRunner only provides the timeout and the output cap. There is no
/// resource accounting, so CPU time and memory are always reported as
/// unknown. Like every runner here it offers no file system or permission
/// isolation.
pub struct SimpleRunner;

#[async_trait]
impl SandboxRunner for SimpleRunner {
    async fn run(&self, executable: &Path, limit: Duration) -> Result<RunOutcome> {
        let mut cmd = Command::new(executable);
        if let Some(dir) = executable.parent() {
            cmd.current_dir(dir);
        }
        run_capped(cmd, limit).await
    }
}
