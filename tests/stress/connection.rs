//! Connection actor stress tests

use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};
use tether::{Connection, ConnectionStatus, LinkConfig};

use super::Counting;

fn config(queue: usize) -> LinkConfig {
    LinkConfig::builder()
        .name("stress")
        .message_queue_size(queue)
        .rate_limit(1_000_000, Duration::from_secs(1))
        .reconnect_interval(Duration::from_millis(1))
        .max_reconnect_attempts(u32::MAX)
        .build()
        .unwrap()
}

/// Test: one actor drains a large burst without losing messages
#[tokio::test]
#[ignore]
async fn stress_high_volume_sends() {
    let adapter = Counting::default();
    let sent = adapter.sent.clone();
    let (connection, handle) = Connection::new(config(500_000), adapter);
    let task = tokio::spawn(connection.run());

    handle.connect("ws://localhost").unwrap();
    handle.wait_for(ConnectionStatus::Connected).await.unwrap();

    let start = Instant::now();
    for i in 0..200_000u32 {
        handle.send(i.to_be_bytes().to_vec()).unwrap();
    }
    while sent.load(Ordering::Relaxed) < 200_000 {
        tokio::task::yield_now().await;
    }
    let elapsed = start.elapsed();
    println!("200k sends drained in {elapsed:?}");

    handle.terminate().unwrap();
    let ctx = task.await.unwrap();
    assert_eq!(ctx.metrics().sent, 200_000);
    assert!(ctx.queue().is_empty());
}

/// Test: thousands of independent actors on one runtime
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn stress_many_connections() {
    let adapter = Counting::default();
    let mut running = Vec::new();

    for _ in 0..5_000 {
        let (connection, handle) = Connection::new(config(16), adapter.clone());
        let task = tokio::spawn(connection.run());
        handle.connect("ws://localhost").unwrap();
        running.push((handle, task));
    }
    for (handle, _) in &running {
        handle.wait_for(ConnectionStatus::Connected).await.unwrap();
        handle.send("hello").unwrap();
    }
    for (handle, task) in running {
        handle.terminate().unwrap();
        let ctx = task.await.unwrap();
        assert_eq!(ctx.status(), ConnectionStatus::Terminated);
    }

    assert_eq!(adapter.connects.load(Ordering::Relaxed), 5_000);
    assert_eq!(adapter.sent.load(Ordering::Relaxed), 5_000);
}

/// Test: the peer resets every hundredth send and the actor keeps reconnecting
#[tokio::test]
#[ignore]
async fn stress_reconnect_churn() {
    let adapter = Counting {
        reset_every: Some(100),
        ..Default::default()
    };
    let connects = adapter.connects.clone();
    let (connection, handle) = Connection::new(config(100_000), adapter);
    let task = tokio::spawn(connection.run());

    handle.connect("ws://localhost").unwrap();
    handle.wait_for(ConnectionStatus::Connected).await.unwrap();
    for _ in 0..20_000 {
        handle.send(vec![0u8; rand::random_range(1..512)]).unwrap();
    }
    tokio::time::sleep(Duration::from_secs(2)).await;

    handle.terminate().unwrap();
    let ctx = task.await.unwrap();
    println!(
        "{} connects, {} sent, {} queued",
        connects.load(Ordering::Relaxed),
        ctx.metrics().sent,
        ctx.queue().len()
    );
    assert!(connects.load(Ordering::Relaxed) > 1);
    assert!(ctx.queue().len() <= 100_000);
    assert!(ctx.errors().len() <= ctx.errors().capacity());
}
