// Shell execution inside a running container.
use tokio::process::Command;

use crate::errors::{ScreenLoopError, ScreenLoopResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DockerOutput {
    Text(String),
    Bytes(Vec<u8>),
}

impl DockerOutput {
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            DockerOutput::Text(s) => s.into_bytes(),
            DockerOutput::Bytes(b) => b,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            DockerOutput::Text(s) => s,
            DockerOutput::Bytes(b) => String::from_utf8_lossy(&b).into_owned(),
        }
    }
}

/// Runs `cmd` through `sh -c` inside `container` and returns its stdout.
///
/// `cmd` goes to the container shell as one argv entry, never through a host
/// shell, but the container shell still interprets it: never pass untrusted
/// input. `decode = true` yields lossily-decoded UTF-8 text, otherwise raw
/// bytes (screenshots).
pub async fn docker_exec(
    cmd: &str,
    container: &str,
    decode: bool,
) -> ScreenLoopResult<DockerOutput> {
    tracing::debug!(container, cmd, "docker exec");

    let output = Command::new("docker")
        .args(["exec", container, "sh", "-c", cmd])
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| ScreenLoopError::SurfaceUnavailable(format!("cannot run docker: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(classify_failure(container, output.status.code(), stderr));
    }

    Ok(if decode {
        DockerOutput::Text(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        DockerOutput::Bytes(output.stdout)
    })
}

fn classify_failure(container: &str, code: Option<i32>, stderr: String) -> ScreenLoopError {
    let gone = stderr.contains("No such container")
        || stderr.contains("is not running")
        || stderr.contains("Cannot connect to the Docker daemon");
    if gone {
        ScreenLoopError::SurfaceUnavailable(format!("container '{container}': {stderr}"))
    } else {
        ScreenLoopError::Container(format!(
            "exit {}: {stderr}",
            code.map_or_else(|| "signal".to_string(), |c| c.to_string())
        ))
    }
}
