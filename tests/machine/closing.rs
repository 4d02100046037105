use super::*;
use tether::{ErrorCause, LinkError, SocketErrorKind, CLOSE_ABNORMAL, CLOSE_NORMAL};

fn close(code: u16, clean: bool) -> Event {
    Event::Close {
        code,
        reason: "peer".to_string(),
        clean,
    }
}

#[test]
fn clean_normal_close_disconnects_quietly() {
    let mut driver = Driver::default_config();
    driver.connected();

    let step = driver.step(close(CLOSE_NORMAL, true));
    assert_eq!(step.status(), ConnectionStatus::Disconnected);
    assert!(driver.ctx.errors().is_empty());
    assert_eq!(driver.ctx.socket(), None);
    assert!(matches!(
        step.socket_calls().collect::<Vec<_>>()[..],
        [Effect::Release { close: None, .. }]
    ));
    assert_eq!(notifications(&step.effects).len(), 1);
}

#[test]
fn recoverable_close_codes_reconnect() {
    for (code, clean) in [
        (1001, true),
        (1005, true),
        (1006, true),
        (1011, true),
        (1012, true),
        (1013, true),
        (1014, true),
        (CLOSE_NORMAL, false),
        (4000, false),
    ] {
        let mut driver = Driver::default_config();
        driver.connected();

        let step = driver.step(close(code, clean));
        assert_eq!(
            step.status(),
            ConnectionStatus::Reconnecting,
            "code {code} clean {clean}"
        );
        assert_eq!(driver.ctx.attempts(), 1);
        assert!(scheduled(&step.effects, Timer::Retry).is_some());
    }
}

#[test]
fn protocol_close_codes_are_fatal() {
    for code in [1002, 1003, 1007, 1008, 1009, 4000] {
        let mut driver = Driver::default_config();
        driver.connected();

        let step = driver.step(close(code, true));
        assert_eq!(step.status(), ConnectionStatus::Disconnected, "code {code}");
        let fatal = notifications(&step.effects)
            .into_iter()
            .find_map(|e| match e {
                ConnectionEvent::FatalError { error, .. } => Some(error.clone()),
                _ => None,
            });
        assert_eq!(
            fatal,
            Some(LinkError::Protocol {
                code,
                reason: "peer".to_string()
            })
        );
    }
}

#[test]
fn close_while_connecting_disconnects() {
    let mut driver = Driver::default_config();
    driver.step(Event::connect("ws://localhost"));
    let step = driver.step(close(CLOSE_NORMAL, true));
    assert_eq!(step.status(), ConnectionStatus::Disconnected);
    assert!(driver.ctx.errors().is_empty());

    driver.step(Event::connect("ws://localhost"));
    let step = driver.step(close(CLOSE_ABNORMAL, false));
    assert_eq!(step.status(), ConnectionStatus::Disconnected);
    assert_eq!(driver.ctx.errors().len(), 1);
    assert!(notifications(&step.effects)
        .iter()
        .any(|e| matches!(e, ConnectionEvent::FatalError { .. })));
}

#[test]
fn graceful_disconnect_waits_for_the_peer() {
    let mut driver = Driver::default_config();
    driver.connected();
    let socket = driver.ctx.socket().unwrap();

    let step = driver.step(Event::Disconnect {
        code: 4001,
        reason: "shutting down".to_string(),
    });
    assert_eq!(step.status(), ConnectionStatus::Disconnecting);
    assert_eq!(driver.ctx.socket(), Some(socket));
    assert!(matches!(
        step.socket_calls().collect::<Vec<_>>()[..],
        [Effect::Close { code: 4001, reason, .. }] if reason == "shutting down"
    ));
    assert_eq!(
        cancelled(&step.effects),
        [Timer::Ping, Timer::PongTimeout, Timer::Drain]
    );
    let (after, _) = scheduled(&step.effects, Timer::CloseTimeout).unwrap();
    assert_eq!(after, Duration::from_secs(5));

    let step = driver.step(close(4001, true));
    assert_eq!(step.status(), ConnectionStatus::Disconnected);
    assert_eq!(cancelled(&step.effects), [Timer::CloseTimeout]);
    assert_eq!(driver.ctx.socket(), None);
    assert!(driver.ctx.errors().is_empty());
}

#[test]
fn close_timeout_forces_release() {
    let mut driver = Driver::new(
        LinkConfig::builder()
            .close_timeout(Duration::from_millis(300))
            .build()
            .unwrap(),
    );
    driver.connected();

    let step = driver.step(Event::disconnect());
    let (after, timeout) = scheduled(&step.effects, Timer::CloseTimeout).unwrap();
    assert_eq!(after, Duration::from_millis(300));
    assert!(matches!(
        timeout,
        Event::Close { code: CLOSE_ABNORMAL, clean: false, .. }
    ));

    driver.advance(after);
    let step = driver.step(timeout);
    assert_eq!(step.status(), ConnectionStatus::Disconnected);
    assert!(step
        .socket_calls()
        .any(|e| matches!(e, Effect::Release { .. })));
}

#[test]
fn error_while_disconnecting_finishes_the_close() {
    let mut driver = Driver::default_config();
    driver.connected();
    driver.step(Event::disconnect());

    let step = driver.step(Event::Error(ErrorCause::Socket(SocketError::new(
        SocketErrorKind::Reset,
        "reset during close",
    ))));
    assert_eq!(step.status(), ConnectionStatus::Disconnected);
    assert_eq!(driver.ctx.errors().len(), 1);
    assert_eq!(driver.ctx.socket(), None);
}

#[test]
fn disconnect_while_connecting_closes_the_attempt() {
    let mut driver = Driver::default_config();
    driver.step(Event::connect("ws://localhost"));

    let step = driver.step(Event::disconnect());
    assert_eq!(step.status(), ConnectionStatus::Disconnecting);
    assert!(matches!(
        step.socket_calls().next(),
        Some(Effect::Close { code: CLOSE_NORMAL, .. })
    ));
}

fn driver_in(status: ConnectionStatus) -> Driver {
    let mut driver = Driver::default_config();
    match status {
        ConnectionStatus::Disconnected => {}
        ConnectionStatus::Connecting => {
            driver.step(Event::connect("ws://localhost"));
        }
        ConnectionStatus::Connected => driver.connected(),
        ConnectionStatus::Reconnecting => {
            driver.connected();
            driver.step(Event::Error(ErrorCause::PongTimeout {
                waited: Duration::from_secs(10),
            }));
        }
        ConnectionStatus::Disconnecting => {
            driver.connected();
            driver.step(Event::disconnect());
        }
        ConnectionStatus::Terminated => unreachable!(),
    }
    assert_eq!(driver.status(), status);
    driver
}

#[test]
fn terminate_wins_from_every_status() {
    for status in ConnectionStatus::ALL
        .into_iter()
        .filter(|status| !status.is_terminal())
    {
        let mut driver = driver_in(status);
        let held = driver.ctx.socket();

        let step = driver.step(Event::Terminate);
        assert_eq!(step.status(), ConnectionStatus::Terminated, "from {status}");
        assert!(matches!(step.effects[0], Effect::CancelAll));
        assert!(cancelled(&step.effects).is_empty());
        assert_eq!(driver.ctx.socket(), None);
        assert_eq!(driver.ctx.connection().ready_state(), 3);

        let releases: Vec<_> = step
            .socket_calls()
            .filter_map(|e| match e {
                Effect::Release { socket, close } => Some((*socket, close.clone())),
                _ => None,
            })
            .collect();
        match held {
            Some(socket) => {
                assert_eq!(releases.len(), 1);
                assert_eq!(releases[0].0, socket);
                assert_eq!(releases[0].1.as_ref().map(|f| f.code), Some(CLOSE_NORMAL));
            }
            None => assert!(releases.is_empty()),
        }

        for event in [
            Event::connect("ws://localhost"),
            Event::Open,
            Event::send("x"),
            Event::Terminate,
            Event::MaxRetries,
        ] {
            let frozen = driver.ctx.clone();
            let after = driver.step(event);
            assert!(!after.handled);
            assert!(after.effects.is_empty());
            assert_eq!(after.context, frozen);
        }
    }
}
