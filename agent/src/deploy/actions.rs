//! Deployment action execution

use std::collections::HashMap;
use std::path::Path;

use futures::StreamExt;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::deploy::job::Action;
use crate::errors::AgentError;
use crate::transport::client::Transport;
use crate::utils::hex_encode;

/// Run one action to completion; a non-zero exit or failed verification
/// is surfaced as an error
pub async fn run_action(
    action: &Action,
    transport: &Transport,
    expected_hashes: &HashMap<String, String>,
) -> Result<(), AgentError> {
    match action {
        Action::Download { url, dest } => download(transport, url, dest, expected_hashes).await,
        Action::Install { artifact } => install(artifact).await,
        Action::Command { program, args } => run_command(program, args).await,
    }
}

/// Fetch a URL to `dest`, streaming through a sha256 accumulator.
///
/// When the job declares a sha256 digest, a mismatch deletes the written
/// file before surfacing the error — a bad artifact never survives on
/// disk.
async fn download(
    transport: &Transport,
    url: &str,
    dest: &Path,
    expected_hashes: &HashMap<String, String>,
) -> Result<(), AgentError> {
    info!("Downloading {} -> {}", url, dest.display());

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).await?;
    }

    let response = transport.fetch_artifact(url).await?;
    let mut file = fs::File::create(dest).await?;
    let mut hasher = Sha256::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(bytes) => {
                hasher.update(&bytes);
                file.write_all(&bytes).await?;
            }
            Err(e) => {
                drop(file);
                let _ = fs::remove_file(dest).await;
                return Err(e.into());
            }
        }
    }
    file.sync_all().await?;
    drop(file);

    if let Some(expected) = expected_hashes.get("sha256") {
        let actual = hex_encode(hasher.finalize());
        if !actual.eq_ignore_ascii_case(expected) {
            let _ = fs::remove_file(dest).await;
            return Err(AgentError::HashMismatch {
                expected: expected.clone(),
                actual,
            });
        }
        debug!("Artifact digest verified: {}", actual);
    }

    Ok(())
}

/// Invoke the platform package installer for a local artifact, selected
/// by artifact extension. The contract is only "non-zero exit is failure".
async fn install(artifact: &Path) -> Result<(), AgentError> {
    let path = artifact.to_string_lossy().to_string();
    let ext = artifact
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();

    let (program, args): (&str, Vec<String>) = match ext {
        "deb" => ("dpkg", vec!["-i".to_string(), path]),
        "rpm" => ("rpm", vec!["-U".to_string(), path]),
        "pkg" => (
            "installer",
            vec!["-pkg".to_string(), path, "-target".to_string(), "/".to_string()],
        ),
        "msi" => ("msiexec", vec!["/i".to_string(), path, "/qn".to_string()]),
        _ => {
            return Err(AgentError::DeployError(format!(
                "No installer for artifact: {}",
                artifact.display()
            )))
        }
    };

    info!("Installing {} via {}", artifact.display(), program);
    run_command(program, &args).await
}

async fn run_command(program: &str, args: &[String]) -> Result<(), AgentError> {
    debug!("Running command: {} {:?}", program, args);

    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|e| AgentError::DeployError(format!("Failed to spawn {}: {}", program, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AgentError::DeployError(format!(
            "{} exited with {}: {}",
            program,
            output.status,
            stderr.trim()
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_exit_codes() {
        assert!(run_command("true", &[]).await.is_ok());
        assert!(run_command("false", &[]).await.is_err());
    }

    #[tokio::test]
    async fn test_install_rejects_unknown_artifact() {
        let err = install(Path::new("/tmp/artifact.xyz")).await.unwrap_err();
        assert!(matches!(err, AgentError::DeployError(_)));
    }
}
