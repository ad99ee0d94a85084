use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::SlideshowError;

/// Runs `cmd` with merged output captured for the error message. The child
/// is killed on timeout or when the future is dropped.
pub(crate) async fn run(mut cmd: Command, timeout: Duration) -> Result<(), SlideshowError> {
    let tool = cmd.as_std().get_program().to_string_lossy().into_owned();
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            SlideshowError::ToolMissing(tool.clone())
        } else {
            SlideshowError::Io(e)
        }
    })?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result?,
        Err(_) => return Err(SlideshowError::ToolTimeout { tool, timeout }),
    };
    if output.status.success() {
        return Ok(());
    }

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    Err(SlideshowError::ToolFailed {
        tool,
        status: output.status.to_string(),
        output: lines[lines.len().saturating_sub(5)..].join(" | "),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_program() {
        let result = run(Command::new("photosync-no-such-encoder"), Duration::from_secs(1)).await;
        assert!(matches!(result, Err(SlideshowError::ToolMissing(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_kills_child() {
        let mut cmd = Command::new("sleep");
        cmd.arg("5");
        let result = run(cmd, Duration::from_millis(100)).await;
        assert!(matches!(result, Err(SlideshowError::ToolTimeout { .. })));
    }
}
