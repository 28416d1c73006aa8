//! Deployment engine integration tests
//!
//! Jobs here run real commands and real downloads against a local
//! responder. Status reporting goes to a dead port; the engine treats
//! that as log-only.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use inventagent::deploy::engine::{DeploymentEngine, HostInfo};
use inventagent::deploy::job::{Action, Check, DeploymentJob, JobStatus};
use inventagent::errors::AgentError;
use inventagent::transport::client::{Transport, TransportConfig};
use inventagent::utils::sha256_hex;

/// Serve one 200 response with the given body, then close
fn serve_body(body: Vec<u8>) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();

    std::thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            let mut buf = [0u8; 8192];
            let _ = stream.read(&mut buf);
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            let _ = stream.write_all(head.as_bytes());
            let _ = stream.write_all(&body);
        }
    });

    port
}

/// Serve one 200 response trickled out in delayed chunks
fn serve_body_slow(body: Vec<u8>, chunk: usize, delay: Duration) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();

    std::thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            let mut buf = [0u8; 8192];
            let _ = stream.read(&mut buf);
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            let _ = stream.write_all(head.as_bytes());
            for part in body.chunks(chunk) {
                std::thread::sleep(delay);
                let _ = stream.write_all(part);
                let _ = stream.flush();
            }
        }
    });

    port
}

/// Transport whose status reports land on a dead port and fail fast
fn dead_letter_transport() -> Arc<Transport> {
    Arc::new(
        Transport::new(TransportConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            attempts: 1,
            timeout: Duration::from_secs(2),
            initial_backoff: Duration::from_millis(1),
            ..Default::default()
        })
        .unwrap(),
    )
}

fn job_for(id: &str, host: &HostInfo) -> DeploymentJob {
    DeploymentJob {
        id: id.to_string(),
        name: format!("test job {id}"),
        version: "1.0.0".to_string(),
        target_os: vec![host.os.clone()],
        target_arch: vec![host.arch.clone()],
        pre_checks: vec![],
        actions: vec![],
        post_checks: vec![],
        rollback_actions: vec![],
        expected_hashes: HashMap::new(),
        status: JobStatus::Pending,
        started_at: None,
        finished_at: None,
        last_error: None,
    }
}

fn touch(path: &std::path::Path) -> Action {
    Action::Command {
        program: "touch".to_string(),
        args: vec![path.to_string_lossy().to_string()],
    }
}

#[tokio::test]
async fn test_incompatible_host_fails_without_rollback() {
    let host = HostInfo {
        os: "testos".to_string(),
        arch: "testarch".to_string(),
    };
    let engine = DeploymentEngine::new(host.clone(), dead_letter_transport());

    let mut job = job_for("job-gate", &host);
    job.target_os = vec!["some-other-os".to_string()];
    // Rollback is defined but must not run: nothing changed yet.
    job.rollback_actions = vec![Action::Command {
        program: "true".to_string(),
        args: vec![],
    }];

    let err = engine.execute(job).await.unwrap_err();
    assert!(matches!(err, AgentError::DeployError(_)));

    let job = engine.job("job-gate").await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.started_at.is_some());
    assert!(job.finished_at.is_some());
    assert!(job.last_error.unwrap().contains("not in compatible list"));
}

#[tokio::test]
async fn test_successful_job_runs_exactly_once() {
    let host = HostInfo::current();
    let engine = DeploymentEngine::new(host.clone(), dead_letter_transport());

    let job = job_for("job-once", &host);
    engine.execute(job.clone()).await.unwrap();
    assert_eq!(engine.status("job-once").await, Some(JobStatus::Success));

    // Re-submitting the same id is rejected, not re-run.
    let err = engine.execute(job).await.unwrap_err();
    assert!(matches!(err, AgentError::DeployError(_)));
    assert_eq!(engine.status("job-once").await, Some(JobStatus::Success));
}

#[cfg(unix)]
#[tokio::test]
async fn test_failed_action_triggers_rollback() {
    let dir = TempDir::new().unwrap();
    let first_marker = dir.path().join("first");
    let rollback_marker = dir.path().join("rollback");

    let host = HostInfo::current();
    let engine = DeploymentEngine::new(host.clone(), dead_letter_transport());

    let mut job = job_for("job-rollback", &host);
    job.actions = vec![
        touch(&first_marker),
        Action::Command {
            program: "false".to_string(),
            args: vec![],
        },
    ];
    // The first rollback step fails; the second must still run.
    job.rollback_actions = vec![
        Action::Command {
            program: "false".to_string(),
            args: vec![],
        },
        touch(&rollback_marker),
    ];

    let err = engine.execute(job).await.unwrap_err();
    assert!(matches!(err, AgentError::DeployError(_)));

    let job = engine.job("job-rollback").await.unwrap();
    assert_eq!(job.status, JobStatus::RolledBack);
    assert!(job.last_error.unwrap().contains("Action 1"));
    assert!(first_marker.exists());
    assert!(rollback_marker.exists());
}

#[cfg(unix)]
#[tokio::test]
async fn test_failed_pre_check_skips_actions() {
    let dir = TempDir::new().unwrap();
    let marker = dir.path().join("never-touched");

    let host = HostInfo::current();
    let engine = DeploymentEngine::new(host.clone(), dead_letter_transport());

    let mut job = job_for("job-precheck", &host);
    job.pre_checks = vec![Check::PathExists {
        path: dir.path().join("does-not-exist"),
    }];
    job.actions = vec![touch(&marker)];
    job.rollback_actions = vec![touch(&marker)];

    engine.execute(job).await.unwrap_err();

    // Fail-fast: no action ran and no rollback ran.
    assert_eq!(engine.status("job-precheck").await, Some(JobStatus::Failed));
    assert!(!marker.exists());
}

#[cfg(unix)]
#[tokio::test]
async fn test_failed_post_check_rolls_back() {
    let dir = TempDir::new().unwrap();
    let installed = dir.path().join("installed");
    let rollback_marker = dir.path().join("rollback");

    let host = HostInfo::current();
    let engine = DeploymentEngine::new(host.clone(), dead_letter_transport());

    let mut job = job_for("job-postcheck", &host);
    job.actions = vec![touch(&installed)];
    job.post_checks = vec![Check::ServiceRunning {
        service: "inventa-test-nonexistent-service".to_string(),
    }];
    job.rollback_actions = vec![touch(&rollback_marker)];

    engine.execute(job).await.unwrap_err();

    assert_eq!(
        engine.status("job-postcheck").await,
        Some(JobStatus::RolledBack)
    );
    assert!(rollback_marker.exists());
}

#[tokio::test]
async fn test_download_verifies_declared_digest() {
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("artifact.bin");

    let host = HostInfo::current();
    let engine = DeploymentEngine::new(host.clone(), dead_letter_transport());

    let port = serve_body(b"artifact contents".to_vec());
    let mut job = job_for("job-hash", &host);
    job.actions = vec![Action::Download {
        url: format!("http://127.0.0.1:{port}/artifact.bin"),
        dest: dest.clone(),
    }];
    job.expected_hashes
        .insert("sha256".to_string(), "0".repeat(64));

    engine.execute(job).await.unwrap_err();

    // The mismatched artifact was deleted, not left on disk.
    assert_eq!(engine.status("job-hash").await, Some(JobStatus::Failed));
    assert!(!dest.exists());
}

#[tokio::test]
async fn test_download_outlasts_the_batch_timeout() {
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("artifact.bin");
    let contents = vec![0x5au8; 4096];

    let host = HostInfo::current();
    // The per-attempt timeout bounds API calls only; the transfer below
    // takes well past one second while bytes keep flowing.
    let transport = Arc::new(
        Transport::new(TransportConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            attempts: 1,
            timeout: Duration::from_secs(1),
            initial_backoff: Duration::from_millis(1),
            ..Default::default()
        })
        .unwrap(),
    );
    let engine = DeploymentEngine::new(host.clone(), transport);

    let port = serve_body_slow(contents.clone(), 1024, Duration::from_millis(400));
    let mut job = job_for("job-slow-download", &host);
    job.actions = vec![Action::Download {
        url: format!("http://127.0.0.1:{port}/artifact.bin"),
        dest: dest.clone(),
    }];
    job.expected_hashes
        .insert("sha256".to_string(), sha256_hex(&contents));

    engine.execute(job).await.unwrap();

    assert_eq!(
        engine.status("job-slow-download").await,
        Some(JobStatus::Success)
    );
    assert_eq!(std::fs::read(&dest).unwrap(), contents);
}

#[tokio::test]
async fn test_download_accepts_matching_digest() {
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("artifact.bin");
    let contents = b"artifact contents".to_vec();

    let host = HostInfo::current();
    let engine = DeploymentEngine::new(host.clone(), dead_letter_transport());

    let port = serve_body(contents.clone());
    let mut job = job_for("job-hash-ok", &host);
    job.actions = vec![Action::Download {
        url: format!("http://127.0.0.1:{port}/artifact.bin"),
        dest: dest.clone(),
    }];
    job.expected_hashes
        .insert("sha256".to_string(), sha256_hex(&contents));

    engine.execute(job).await.unwrap();

    assert_eq!(engine.status("job-hash-ok").await, Some(JobStatus::Success));
    assert_eq!(std::fs::read(&dest).unwrap(), contents);
}
