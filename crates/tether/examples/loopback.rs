//! Drives a connection against an in-memory echo peer that misbehaves.
//!
//! Run with: RUST_LOG=tether=debug cargo run --example loopback -p tether
//!
//! The first connect is refused, and the peer drops the link after three echoes.
//! Watch the connection back off, reconnect, and drain the messages it queued in
//! the meantime.

use futures::StreamExt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tether::{
    Connection, ConnectionEvent, ConnectionStatus, LinkConfig, SocketAdapter, SocketError,
    SocketErrorKind, SocketEvents, SocketHandle,
};
use tracing_subscriber::EnvFilter;

struct EchoPeer {
    events: SocketEvents,
    echoed: u32,
}

impl SocketHandle for EchoPeer {
    fn send(&mut self, payload: &[u8]) -> Result<(), SocketError> {
        self.echoed += 1;
        let events = self.events.clone();
        let payload = payload.to_vec();
        let drop_link = self.echoed == 3;
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            events.message(payload);
            if drop_link {
                events.close(1011, "peer restarting", false);
            }
        });
        Ok(())
    }

    fn ping(&mut self, _payload: &[u8]) -> Result<(), SocketError> {
        let events = self.events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2)).await;
            events.pong();
        });
        Ok(())
    }

    fn close(&mut self, code: u16, reason: &str) {
        self.events.close(code, reason.to_string(), true);
    }
}

#[derive(Default)]
struct Loopback {
    attempts: Arc<AtomicU32>,
}

impl SocketAdapter for Loopback {
    type Handle = EchoPeer;

    fn connect(
        &mut self,
        url: &str,
        _protocols: &[String],
        events: SocketEvents,
    ) -> Result<EchoPeer, SocketError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        println!("connect #{attempt} to {url} ({})", events.socket());
        if attempt == 1 {
            return Err(SocketError::new(SocketErrorKind::Refused, "peer not up yet"));
        }

        let opener = events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            opener.open();
        });
        Ok(EchoPeer { events, echoed: 0 })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tether=info")),
        )
        .init();

    let config = LinkConfig::builder()
        .name("loopback")
        .reconnect_interval(Duration::from_millis(100))
        .reconnect_backoff_rate(2.0)
        .ping_interval(Duration::from_millis(250))
        .pong_timeout(Duration::from_millis(100))
        .rate_limit(2, Duration::from_millis(200))
        .on_state_change(|from, to, _| println!("  {from} -> {to}"))
        .build()?;

    let handle = Connection::spawn(config, Loopback::default());
    let mut events = std::pin::pin!(handle.events());

    handle.connect("ws://loopback:9000/echo")?;
    for i in 1..=6 {
        handle.send(format!("message {i}"))?;
    }
    handle.send_high("urgent")?;

    let mut echoes = 0;
    while let Some(event) = events.next().await {
        if let ConnectionEvent::Message { payload, .. } = event {
            echoes += 1;
            println!("echo: {}", String::from_utf8_lossy(&payload));
            if echoes == 7 {
                break;
            }
        }
    }

    handle.disconnect()?;
    handle.wait_for(ConnectionStatus::Disconnected).await?;
    handle.terminate()?;
    println!("done after {echoes} echoes");
    Ok(())
}
