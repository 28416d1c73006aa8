//! Worker lifecycle integration tests

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use inventagent::deploy::engine::{DeploymentEngine, HostInfo};
use inventagent::probes::platform_registry;
use inventagent::queue::store::DurableQueue;
use inventagent::transport::client::{Transport, TransportConfig};
use inventagent::workers::{collector, heartbeat};

/// Respond 200 to every connection, counting hits
fn serve_counting() -> (u16, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    std::thread::spawn(move || {
        while let Ok((mut stream, _)) = listener.accept() {
            let mut buf = [0u8; 8192];
            let _ = stream.read(&mut buf);
            counter.fetch_add(1, Ordering::SeqCst);
            let _ = stream.write_all(
                b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            );
        }
    });

    (port, hits)
}

#[tokio::test]
async fn test_collector_shutdown_during_initial_delay() {
    let registry = Arc::new(platform_registry());
    let queue = Arc::new(DurableQueue::open_in_memory(3).unwrap());

    let options = collector::Options {
        interval: Duration::from_secs(60),
        initial_delay: Duration::from_secs(60),
    };

    // Shutdown is already signalled; the worker must not wait out the
    // initial delay or run a probe pass on the way down.
    let run = collector::run(
        &options,
        registry,
        queue.clone(),
        tokio::time::sleep,
        Box::pin(async {}),
    );
    tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("collector should exit promptly");

    assert_eq!(queue.stats().unwrap().pending, 0);
}

#[tokio::test]
async fn test_heartbeat_skips_beat_when_stats_unavailable() {
    let (port, hits) = serve_counting();
    let transport = Arc::new(
        Transport::new(TransportConfig {
            base_url: format!("http://127.0.0.1:{port}"),
            compress: false,
            attempts: 1,
            initial_backoff: Duration::from_millis(1),
            ..Default::default()
        })
        .unwrap(),
    );
    let engine = Arc::new(DeploymentEngine::new(HostInfo::current(), transport.clone()));

    // A closed store errors on stats(); no telemetry document may claim
    // the queue is empty.
    let queue = Arc::new(DurableQueue::open_in_memory(3).unwrap());
    queue.close().unwrap();

    let options = heartbeat::Options {
        interval: Duration::from_millis(10),
    };
    heartbeat::run(
        &options,
        "1.0.0".to_string(),
        queue,
        engine,
        transport,
        tokio::time::sleep,
        Box::pin(tokio::time::sleep(Duration::from_millis(150))),
    )
    .await;

    assert_eq!(hits.load(Ordering::SeqCst), 0);
}
