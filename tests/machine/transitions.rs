use super::*;
use tether::{ConnectOptions, ErrorCause, ErrorKind, LinkError, SocketErrorKind};

fn socket_error(kind: SocketErrorKind) -> Event {
    Event::Error(ErrorCause::Socket(SocketError::new(kind, "boom")))
}

#[test]
fn connect_stores_url_and_allocates_socket() {
    let mut driver = Driver::default_config();
    let step = driver.step(Event::Connect {
        url: "wss://example.com/feed".to_string(),
        protocols: vec!["v2".to_string()],
        options: ConnectOptions::default(),
    });

    assert_eq!(step.status(), ConnectionStatus::Connecting);
    assert_eq!(driver.ctx.connection().url(), Some("wss://example.com/feed"));
    assert_eq!(driver.ctx.connection().protocols(), ["v2"]);
    assert_eq!(driver.ctx.connection().ready_state(), 0);
    assert_eq!(driver.ctx.attempts(), 0);

    let socket = driver.ctx.socket().expect("socket allocated");
    let calls: Vec<&Effect> = step.socket_calls().collect();
    assert_eq!(calls.len(), 1);
    match calls[0] {
        Effect::Connect {
            socket: id,
            protocols,
            ..
        } => {
            assert_eq!(*id, socket);
            assert_eq!(protocols, &["v2"]);
        }
        other => panic!("unexpected socket call: {other:?}"),
    }
}

#[test]
fn open_resets_attempts() {
    let mut driver = Driver::default_config();
    driver.connected();

    driver.step(socket_error(SocketErrorKind::Reset));
    assert_eq!(driver.status(), ConnectionStatus::Reconnecting);
    assert_eq!(driver.ctx.attempts(), 1);

    driver.advance(Duration::from_secs(1));
    let step = driver.step(Event::Retry {
        attempt: 1,
        delay: Duration::from_secs(1),
    });
    assert_eq!(step.status(), ConnectionStatus::Connecting);
    assert_eq!(driver.ctx.attempts(), 1);

    driver.step(Event::Open);
    assert_eq!(driver.status(), ConnectionStatus::Connected);
    assert_eq!(driver.ctx.attempts(), 0);
    assert_eq!(driver.ctx.retry().last_attempt(), None);
}

#[test]
fn retryable_error_schedules_first_retry_at_base_interval() {
    let mut driver = Driver::default_config();
    driver.step(Event::connect("ws://localhost"));

    let step = driver.step(socket_error(SocketErrorKind::Refused));
    assert_eq!(step.status(), ConnectionStatus::Reconnecting);
    assert_eq!(driver.ctx.socket(), None);
    assert!(step
        .effects
        .iter()
        .any(|e| matches!(e, Effect::Release { close: None, .. })));

    let (after, event) = scheduled(&step.effects, Timer::Retry).expect("retry scheduled");
    assert_eq!(after, Duration::from_secs(1));
    assert_eq!(
        event,
        Event::Retry {
            attempt: 1,
            delay: Duration::from_secs(1)
        }
    );

    let record = driver.ctx.errors().last().unwrap();
    assert_eq!(record.kind, ErrorKind::Connection);
    assert_eq!(record.note, "socket error");
}

#[test]
fn backoff_grows_between_retries() {
    let mut driver = Driver::new(
        LinkConfig::builder()
            .reconnect_interval(Duration::from_millis(100))
            .reconnect_backoff_rate(2.0)
            .max_reconnect_attempts(10)
            .build()
            .unwrap(),
    );
    driver.step(Event::connect("ws://localhost"));

    let mut delays = Vec::new();
    for _ in 0..4 {
        let step = driver.step(socket_error(SocketErrorKind::Refused));
        let (after, event) = scheduled(&step.effects, Timer::Retry).unwrap();
        delays.push(after);
        driver.advance(after);
        driver.step(event);
        assert_eq!(driver.status(), ConnectionStatus::Connecting);
    }

    assert_eq!(
        delays,
        [100, 200, 400, 800].map(Duration::from_millis).to_vec()
    );
}

#[test]
fn fatal_socket_error_parks_disconnected() {
    let mut driver = Driver::default_config();
    driver.connected();

    let step = driver.step(socket_error(SocketErrorKind::Protocol));
    assert_eq!(step.status(), ConnectionStatus::Disconnected);
    assert_eq!(driver.ctx.attempts(), 0);

    let notes = notifications(&step.effects);
    assert!(matches!(notes[0], ConnectionEvent::StateChanged { .. }));
    assert!(matches!(
        notes[1],
        ConnectionEvent::FatalError { error: LinkError::Protocol { code: 1002, .. }, .. }
    ));
    assert_eq!(driver.ctx.errors().last().unwrap().kind, ErrorKind::Protocol);
}

#[test]
fn reconnect_disabled_parks_disconnected() {
    let mut driver = Driver::new(LinkConfig::builder().reconnect(false).build().unwrap());
    driver.connected();

    let step = driver.step(socket_error(SocketErrorKind::Reset));
    assert_eq!(step.status(), ConnectionStatus::Disconnected);
    assert!(notifications(&step.effects)
        .iter()
        .any(|e| matches!(e, ConnectionEvent::FatalError { .. })));
}

#[test]
fn predicate_vetoes_reconnection() {
    let mut driver = Driver::new(
        LinkConfig::builder()
            .reconnect_predicate(|err| !err.to_string().contains("unauthorized"))
            .build()
            .unwrap(),
    );
    driver.connected();

    driver.step(Event::Error(ErrorCause::Socket(SocketError::new(
        SocketErrorKind::Other,
        "unauthorized",
    ))));
    assert_eq!(driver.status(), ConnectionStatus::Disconnected);
}

#[test]
fn connect_options_override_retry_settings() {
    let mut driver = Driver::default_config();
    driver.step(Event::Connect {
        url: "ws://localhost".to_string(),
        protocols: Vec::new(),
        options: ConnectOptions::default()
            .max_attempts(2)
            .base_interval(Duration::from_millis(250)),
    });
    assert_eq!(driver.ctx.retry().max_attempts(), 2);

    let step = driver.step(socket_error(SocketErrorKind::Refused));
    let (after, event) = scheduled(&step.effects, Timer::Retry).unwrap();
    assert_eq!(after, Duration::from_millis(250));

    driver.step(event);
    let effects = driver.run(socket_error(SocketErrorKind::Refused));
    assert_eq!(driver.status(), ConnectionStatus::Disconnected);
    assert!(notifications(&effects)
        .iter()
        .any(|e| matches!(e, ConnectionEvent::MaxRetries { attempts: 2, .. })));
}

#[test]
fn retry_is_ignored_once_the_limit_is_reached() {
    let mut driver = Driver::new(LinkConfig::builder().max_reconnect_attempts(1).build().unwrap());
    driver.step(Event::connect("ws://localhost"));

    let step = driver.step(socket_error(SocketErrorKind::Refused));
    assert_eq!(step.status(), ConnectionStatus::Reconnecting);
    assert_eq!(step.raised().collect::<Vec<_>>(), [&Event::MaxRetries]);
    assert!(scheduled(&step.effects, Timer::Retry).is_none());

    let retry = driver.step(Event::Retry {
        attempt: 1,
        delay: Duration::ZERO,
    });
    assert!(!retry.handled);
    assert_eq!(driver.status(), ConnectionStatus::Reconnecting);
}

#[test]
fn leaving_connected_cancels_its_timers_first() {
    let mut driver = Driver::default_config();
    driver.connected();

    let step = driver.step(socket_error(SocketErrorKind::Reset));
    assert_eq!(
        step.effects[..3]
            .iter()
            .map(|e| match e {
                Effect::Cancel(timer) => Some(*timer),
                _ => None,
            })
            .collect::<Vec<_>>(),
        [Some(Timer::Ping), Some(Timer::PongTimeout), Some(Timer::Drain)]
    );
}

#[test]
fn reconnecting_disconnect_cancels_retry() {
    let mut driver = Driver::default_config();
    driver.step(Event::connect("ws://localhost"));
    driver.step(socket_error(SocketErrorKind::Refused));

    let step = driver.step(Event::disconnect());
    assert_eq!(step.status(), ConnectionStatus::Disconnected);
    assert_eq!(cancelled(&step.effects), [Timer::Retry]);
}

#[test]
fn state_change_carries_a_snapshot() {
    let mut driver = Driver::default_config();
    let step = driver.step(Event::connect("ws://localhost"));

    let notes = notifications(&step.effects);
    assert_eq!(notes.len(), 1);
    match notes[0] {
        ConnectionEvent::StateChanged {
            from,
            to,
            snapshot,
            connection_name,
            ..
        } => {
            assert_eq!(*from, ConnectionStatus::Disconnected);
            assert_eq!(*to, ConnectionStatus::Connecting);
            assert_eq!(connection_name, "test");
            assert_eq!(**snapshot, driver.ctx);
        }
        other => panic!("unexpected notification: {other:?}"),
    }
}

#[test]
fn inbound_messages_are_counted_and_surfaced() {
    let mut driver = Driver::default_config();
    driver.connected();

    let step = driver.step(Event::Message(Bytes::from_static(b"hello")));
    assert_eq!(step.status(), ConnectionStatus::Connected);
    assert_eq!(driver.ctx.metrics().received, 1);
    assert_eq!(driver.ctx.metrics().bytes_received, 5);
    let notes = notifications(&step.effects);
    assert_eq!(notes.len(), 1);
    assert!(matches!(
        notes[0],
        ConnectionEvent::Message { payload, .. } if payload == "hello"
    ));
}

#[test]
fn ping_probes_once_until_answered() {
    let mut driver = Driver::default_config();
    driver.connected();
    driver.advance(Duration::from_secs(30));

    let step = driver.step(Event::Ping);
    let calls: Vec<&Effect> = step.socket_calls().collect();
    assert_eq!(calls.len(), 1);
    assert!(matches!(calls[0], Effect::Probe { payload, .. } if payload == "ping"));
    assert_eq!(
        scheduled(&step.effects, Timer::PongTimeout).map(|(after, _)| after),
        Some(Duration::from_secs(10))
    );
    assert_eq!(
        scheduled(&step.effects, Timer::Ping).map(|(after, _)| after),
        Some(Duration::from_secs(30))
    );
    assert_eq!(driver.ctx.metrics().probes_sent, 1);

    // A second PING while waiting keeps the outstanding deadline
    let again = driver.step(Event::Ping);
    assert_eq!(again.socket_calls().count(), 0);
    assert!(scheduled(&again.effects, Timer::PongTimeout).is_none());
    assert!(scheduled(&again.effects, Timer::Ping).is_some());

    driver.advance(Duration::from_millis(40));
    let pong = driver.step(Event::Pong {
        latency: Duration::from_millis(40),
    });
    assert_eq!(cancelled(&pong.effects), [Timer::PongTimeout]);
    assert_eq!(driver.ctx.metrics().pongs_received, 1);
    assert_eq!(
        driver.ctx.health().last_latency(),
        Some(Duration::from_millis(40))
    );
    assert!(!driver.ctx.health().is_awaiting_response());
}

#[test]
fn pong_without_outstanding_probe_is_ignored() {
    let mut driver = Driver::default_config();
    driver.connected();

    let early = driver.step(Event::Pong {
        latency: Duration::from_secs(99),
    });
    assert!(!early.handled);
    assert!(early.effects.is_empty());
    assert_eq!(driver.ctx.health().sample_count(), 0);

    driver.step(Event::Ping);
    assert!(
        driver
            .step(Event::Pong {
                latency: Duration::from_millis(5),
            })
            .handled
    );
    let duplicate = driver.step(Event::Pong {
        latency: Duration::from_millis(6),
    });
    assert!(!duplicate.handled);
    assert_eq!(driver.ctx.metrics().pongs_received, 1);
    assert_eq!(driver.ctx.health().sample_count(), 1);
}

#[test]
fn disabled_probing_arms_no_ping() {
    let mut driver = Driver::new(
        LinkConfig::builder()
            .ping_interval(Duration::ZERO)
            .build()
            .unwrap(),
    );
    driver.step(Event::connect("ws://localhost"));
    let step = driver.step(Event::Open);
    assert!(scheduled(&step.effects, Timer::Ping).is_none());
}

#[test]
fn events_outside_their_status_are_ignored() {
    let mut driver = Driver::default_config();
    for event in [
        Event::Open,
        Event::Ping,
        Event::Message(Bytes::from_static(b"x")),
        Event::MaxRetries,
        Event::disconnect(),
        Event::Flush,
    ] {
        let before = driver.ctx.clone();
        let step = driver.step(event.clone());
        assert!(!step.handled, "{} accepted while disconnected", event.name());
        assert_eq!(step.context, before);
    }

    driver.step(Event::connect("ws://localhost"));
    assert!(!driver.step(Event::connect("ws://other")).handled);
    assert!(!driver.step(Event::Message(Bytes::from_static(b"x"))).handled);
}
