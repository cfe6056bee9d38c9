use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Result, bail};

use super::{CompilationResult, run_capped};

/// Builds `source_path` into `executable_path` with the configured toolchain.
///
/// A compiler that outlives `timeout_ms` is killed together with its process
/// group and reported as a failed compilation. Spawn failures are returned as
/// errors.
pub async fn compile(
    command_template: &[String],
    source_path: &Path,
    executable_path: &Path,
    timeout_ms: u64,
) -> Result<CompilationResult> {
    let command = generate_compile_command(
        command_template,
        &source_path.to_string_lossy(),
        &executable_path.to_string_lossy(),
    );
    if command.is_empty() {
        bail!("Empty compile command");
    }

    let mut cmd = tokio::process::Command::new(&command[0]);
    cmd.args(&command[1..]);
    if let Some(dir) = source_path.parent() {
        cmd.current_dir(dir);
    }

    // Same process-group treatment as submissions, so a timeout also takes
    // down whatever the compiler driver forked
    let outcome = run_capped(cmd, Duration::from_millis(timeout_ms)).await?;
    let elapsed_ms = outcome.wall_time_ms;

    let mut diagnostics = outcome.stdout.clone();
    diagnostics.push_str(&outcome.stderr);
    if outcome.timeout {
        diagnostics.push_str(&format!("\n[compilation timed out after {timeout_ms} ms]"));
    }

    let result = CompilationResult {
        success: outcome.succeeded() && executable_path.exists(),
        diagnostics,
        elapsed_ms,
    };

    if result.success {
        log::debug!("Compiled {} in {elapsed_ms} ms", source_path.display());
    } else {
        log::debug!(
            "Compilation of {} failed after {elapsed_ms} ms: {}",
            source_path.display(),
            result.diagnostics
        );
    }

    Ok(result)
}

/// Generates the compile command by applying template substitutions
fn generate_compile_command(
    template: &[String],
    source_path: &str,
    executable_path: &str,
) -> Vec<String> {
    let mut mapping = HashMap::<&str, &str>::new();
    mapping.insert("%INPUT%", source_path);
    mapping.insert("%OUTPUT%", executable_path);

    template
        .iter()
        .map(|s| {
            let mut t = s.clone();
            for (k, v) in mapping.iter() {
                t = t.replace(k, v);
            }
            t
        })
        .collect()
}
