use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::timeout_at;

use crate::config::OUTPUT_LIMIT_BYTES;

use super::RunOutcome;

/// Exit code reported when the run was killed for writing too much output
pub const OVERFLOW_EXIT_CODE: i32 = -1;

const READ_CHUNK: usize = 8192;

/// Trait for the process boundary around an untrusted binary
///
/// Implementations only differ in how the binary is wrapped; all of them run
/// it with empty stdin, kill it at `limit` or once the combined output passes
/// the cap, and report what was captured. Stronger isolation backends plug in
/// here without touching verdict resolution.
#[async_trait]
pub trait SandboxRunner: Send + Sync {
    async fn run(&self, executable: &Path, limit: Duration) -> Result<RunOutcome>;
}

/// Spawns `cmd` in its own process group and captures its output under a
/// wall-clock limit and the combined output cap.
///
/// On timeout or overflow the whole process group is killed. Overflow forces
/// `exit_code` to [`OVERFLOW_EXIT_CODE`] whatever the process would have done.
/// Accounting fields are left empty for the caller to fill in.
pub async fn run_capped(mut cmd: Command, limit: Duration) -> Result<RunOutcome> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .process_group(0);

    let start_time = Instant::now();
    let mut child = cmd.spawn()?;
    let pid = child.id();
    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("Child stdout was not captured"))?;
    let mut stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("Child stderr was not captured"))?;

    let mut out_buf = Vec::new();
    let mut err_buf = Vec::new();
    let mut out_chunk = [0u8; READ_CHUNK];
    let mut err_chunk = [0u8; READ_CHUNK];
    let mut out_open = true;
    let mut err_open = true;
    let mut timed_out = false;
    let mut overflow = false;

    let deadline = tokio::time::sleep(limit);
    tokio::pin!(deadline);

    while out_open || err_open {
        tokio::select! {
            read = stdout.read(&mut out_chunk), if out_open => match read {
                Ok(0) | Err(_) => out_open = false,
                Ok(n) => out_buf.extend_from_slice(&out_chunk[..n]),
            },
            read = stderr.read(&mut err_chunk), if err_open => match read {
                Ok(0) | Err(_) => err_open = false,
                Ok(n) => err_buf.extend_from_slice(&err_chunk[..n]),
            },
            _ = &mut deadline => {
                timed_out = true;
                break;
            }
        }

        if out_buf.len() + err_buf.len() > OUTPUT_LIMIT_BYTES {
            overflow = true;
            break;
        }
    }

    let status = if timed_out || overflow {
        kill_process_group(pid);
        let _ = child.start_kill();
        child.wait().await.ok()
    } else {
        // Both pipes are closed; the process still has to exit in time
        match timeout_at(deadline.deadline(), child.wait()).await {
            Ok(status) => Some(status?),
            Err(_) => {
                timed_out = true;
                kill_process_group(pid);
                let _ = child.start_kill();
                child.wait().await.ok()
            }
        }
    };
    let wall_time_ms = start_time.elapsed().as_millis() as u64;

    if overflow {
        truncate_to_cap(&mut out_buf, &mut err_buf);
    }
    let stdout = String::from_utf8_lossy(&out_buf).into_owned();
    let mut stderr = String::from_utf8_lossy(&err_buf).into_owned();

    let exit_code = if overflow {
        stderr.push_str(&format!(
            "\n[output truncated: exceeded {OUTPUT_LIMIT_BYTES} bytes]"
        ));
        Some(OVERFLOW_EXIT_CODE)
    } else {
        status.and_then(|s| s.code())
    };

    if timed_out {
        log::debug!("Run killed after {wall_time_ms} ms (limit {limit:?})");
    }

    Ok(RunOutcome {
        timeout: timed_out,
        output_overflow: overflow,
        exit_code,
        stdout,
        stderr,
        exec_time_ms: None,
        memory_kb: None,
        wall_time_ms,
    })
}

fn truncate_to_cap(out_buf: &mut Vec<u8>, err_buf: &mut Vec<u8>) {
    if out_buf.len() >= OUTPUT_LIMIT_BYTES {
        out_buf.truncate(OUTPUT_LIMIT_BYTES);
        err_buf.clear();
    } else {
        err_buf.truncate(OUTPUT_LIMIT_BYTES - out_buf.len());
    }
}

fn kill_process_group(pid: Option<u32>) {
    if let Some(pid) = pid {
        // The child leads its own group, so this reaches everything it forked
        unsafe {
            libc::kill(-(pid as libc::pid_t), libc::SIGKILL);
        }
    }
}
