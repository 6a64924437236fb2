// src/exec/command.rs

use std::process::Stdio;

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::SparkEntry;
use crate::dag::SparkWork;
use crate::errors::SparksError;

/// Work that runs `cmd` through the platform shell.
///
/// Succeeds when the process exits with status zero. Output lines are logged
/// against `key`: stdout at info, stderr at debug.
pub fn command_work(key: &str, cmd: &str) -> SparkWork {
    let key = key.to_string();
    let cmd = cmd.to_string();
    SparkWork::new(move || run_command(key.clone(), cmd.clone()))
}

/// Bind a manifest entry to [`command_work`]; entries without `cmd` fail.
pub fn bind_entry(entry: &SparkEntry) -> std::result::Result<SparkWork, SparksError> {
    match &entry.cmd {
        Some(cmd) => Ok(command_work(&entry.key, cmd)),
        None => Err(SparksError::ConfigError(format!(
            "spark '{}' has no `cmd` to run",
            entry.key
        ))),
    }
}

async fn run_command(key: String, cmd_line: String) -> Result<()> {
    info!(spark = %key, cmd = %cmd_line, "starting spark process");

    // Build a shell command appropriate for the platform.
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(&cmd_line);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(&cmd_line);
        c
    };

    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning process for spark '{key}'"))?;

    if let Some(stdout) = child.stdout.take() {
        forward_lines(key.clone(), stdout, false);
    }
    // Always consume stderr so buffers don't fill.
    if let Some(stderr) = child.stderr.take() {
        forward_lines(key.clone(), stderr, true);
    }

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for process of spark '{key}'"))?;

    let code = status.code().unwrap_or(-1);
    info!(spark = %key, exit_code = code, success = status.success(), "spark process exited");

    if !status.success() {
        bail!("command `{cmd_line}` exited with code {code}");
    }
    Ok(())
}

fn forward_lines<R>(key: String, stream: R, is_stderr: bool)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if is_stderr {
                debug!(spark = %key, "stderr: {}", line);
            } else {
                info!(spark = %key, "stdout: {}", line);
            }
        }
    });
}
