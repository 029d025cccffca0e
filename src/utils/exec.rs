use anyhow::{Context, Result};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Run `cmd` to completion and capture `(exit code, stdout, stderr)`.
///
/// The child is killed if it outlives `timeout`.
pub async fn exec_capture(cmd: &str, args: &[&str], timeout: Duration) -> Result<(i32, Vec<u8>, Vec<u8>)> {
    let mut c = Command::new(cmd);
    c.args(args);
    c.stdin(Stdio::null());
    c.stdout(Stdio::piped());
    c.stderr(Stdio::piped());
    c.kill_on_drop(true);
    let child = c.spawn().with_context(|| format!("failed to spawn {}", cmd))?;
    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .with_context(|| format!("{} timed out after {}s", cmd, timeout.as_secs()))??;
    let code = output.status.code().unwrap_or(-1);
    Ok((code, output.stdout, output.stderr))
}
