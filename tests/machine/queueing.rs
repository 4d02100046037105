use super::*;
use tether::{ErrorKind, MessageId, OverflowPolicy, Priority};

fn connecting(capacity: usize, policy: OverflowPolicy) -> Driver {
    let mut driver = Driver::new(
        LinkConfig::builder()
            .message_queue_size(capacity)
            .overflow_policy(policy)
            .build()
            .unwrap(),
    );
    driver.step(Event::connect("ws://localhost"));
    driver
}

fn queued(driver: &Driver) -> Vec<Bytes> {
    driver.ctx.queue().iter().map(|m| m.payload.clone()).collect()
}

#[test]
fn sends_while_connecting_are_queued() {
    let mut driver = connecting(10, OverflowPolicy::EvictOldestNormal);
    let step = driver.step(Event::send("hello"));

    assert!(step.handled);
    assert_eq!(step.status(), ConnectionStatus::Connecting);
    assert_eq!(step.socket_calls().count(), 0);
    assert_eq!(queued(&driver), ["hello"]);
}

#[test]
fn sends_while_disconnected_are_rejected() {
    let mut driver = Driver::default_config();
    let step = driver.step(Event::send("hello"));

    assert!(step.handled);
    assert_eq!(step.status(), ConnectionStatus::Disconnected);
    assert!(driver.ctx.queue().is_empty());
    assert_eq!(driver.ctx.errors().last().unwrap().kind, ErrorKind::Validation);
    assert!(matches!(
        notifications(&step.effects)[0],
        ConnectionEvent::Rejected { reason, .. } if reason.contains("disconnected")
    ));
}

#[test]
fn sends_while_disconnecting_are_rejected() {
    let mut driver = Driver::default_config();
    driver.connected();
    driver.step(Event::disconnect());
    assert_eq!(driver.status(), ConnectionStatus::Disconnecting);

    let step = driver.step(Event::send("late"));
    assert_eq!(step.status(), ConnectionStatus::Disconnecting);
    assert_eq!(step.socket_calls().count(), 0);
    assert!(driver.ctx.queue().is_empty());
    assert!(matches!(
        notifications(&step.effects)[0],
        ConnectionEvent::Rejected { .. }
    ));
}

#[test]
fn overflow_evicts_oldest_normal() {
    let mut driver = connecting(2, OverflowPolicy::EvictOldestNormal);
    driver.step(Event::send("n1"));
    driver.step(Event::send("n2"));

    let step = driver.step(Event::send("n3"));
    assert_eq!(queued(&driver), ["n2", "n3"]);
    assert_eq!(driver.ctx.metrics().evicted, 1);
    assert!(matches!(
        notifications(&step.effects)[..],
        [ConnectionEvent::MessageEvicted { id, .. }] if id.get() == 1
    ));

    // High priority also pushes out a normal message
    driver.step(Event::send_high("h1"));
    assert_eq!(queued(&driver), ["h1", "n3"]);
}

#[test]
fn overflow_rejects_new_normal() {
    let mut driver = connecting(2, OverflowPolicy::RejectNewNormal);
    driver.step(Event::send("n1"));
    driver.step(Event::send("n2"));

    let step = driver.step(Event::send("n3"));
    assert_eq!(queued(&driver), ["n1", "n2"]);
    assert_eq!(driver.ctx.errors().last().unwrap().kind, ErrorKind::QueueFull);
    assert!(matches!(
        notifications(&step.effects)[..],
        [ConnectionEvent::QueueFull { capacity: 2, .. }]
    ));

    let step = driver.step(Event::send_high("h1"));
    assert_eq!(queued(&driver), ["h1", "n2"]);
    assert!(matches!(
        notifications(&step.effects)[..],
        [ConnectionEvent::MessageEvicted { .. }]
    ));
}

#[test]
fn full_high_priority_queue_rejects_under_either_policy() {
    for policy in [OverflowPolicy::EvictOldestNormal, OverflowPolicy::RejectNewNormal] {
        let mut driver = connecting(2, policy);
        driver.step(Event::send_high("h1"));
        driver.step(Event::send_high("h2"));

        for event in [Event::send_high("h3"), Event::send("n1")] {
            let step = driver.step(event);
            assert_eq!(queued(&driver), ["h1", "h2"], "{policy:?}");
            assert!(matches!(
                notifications(&step.effects)[..],
                [ConnectionEvent::QueueFull { .. }]
            ));
        }
        assert_eq!(driver.ctx.queue().len(), driver.ctx.queue().capacity());
    }
}

#[test]
fn in_flight_message_is_never_evicted() {
    let mut driver = Driver::new(LinkConfig::builder().message_queue_size(2).build().unwrap());
    driver.connected();

    let first = driver.step(Event::send("n1"));
    let in_flight = match first.socket_calls().next() {
        Some(Effect::Transmit { id, .. }) => *id,
        other => panic!("expected transmit, got {other:?}"),
    };
    driver.step(Event::send("n2"));

    let step = driver.step(Event::send("n3"));
    let evicted: Vec<MessageId> = notifications(&step.effects)
        .iter()
        .filter_map(|e| match e {
            ConnectionEvent::MessageEvicted { id, .. } => Some(*id),
            _ => None,
        })
        .collect();
    assert_eq!(evicted.len(), 1);
    assert_ne!(evicted[0], in_flight);
    assert_eq!(driver.ctx.queue().in_flight(), Some(in_flight));
    assert_eq!(queued(&driver), ["n1", "n3"]);
}

#[test]
fn rate_limit_defers_and_drains_later() {
    let mut driver = Driver::new(
        LinkConfig::builder()
            .rate_limit(2, Duration::from_secs(1))
            .build()
            .unwrap(),
    );
    driver.connected();

    let mut sent = Vec::new();
    let mut drain = None;
    for i in 0..5 {
        let effects = driver.run(Event::send(format!("m{i}")));
        sent.extend(transmitted(&effects));
        if let Some(scheduled) = scheduled(&effects, Timer::Drain) {
            drain = Some(scheduled);
        }
    }
    assert_eq!(sent, ["m0", "m1"]);
    assert_eq!(driver.ctx.queue().len(), 3);
    assert!(driver.ctx.metrics().deferred >= 1);

    let (after, flush) = drain.expect("drain scheduled");
    assert_eq!(flush, Event::Flush);
    assert!(after <= Duration::from_secs(1));

    driver.advance(after);
    let effects = driver.run(flush);
    assert_eq!(transmitted(&effects), ["m2", "m3"]);
    assert!(notifications(&effects)
        .iter()
        .any(|e| matches!(e, ConnectionEvent::SendDeferred { .. })));

    let (after, flush) = scheduled(&effects, Timer::Drain).expect("drain rescheduled");
    driver.advance(after);
    let effects = driver.run(flush);
    assert_eq!(transmitted(&effects), ["m4"]);
    assert!(driver.ctx.queue().is_empty());
    assert_eq!(driver.ctx.metrics().sent, 5);
}

#[test]
fn high_priority_jumps_the_deferred_queue() {
    let mut driver = Driver::new(
        LinkConfig::builder()
            .rate_limit(1, Duration::from_secs(1))
            .build()
            .unwrap(),
    );
    driver.connected();
    driver.run(Event::send("n0"));
    driver.run(Event::send("n1"));
    driver.run(Event::send_high("h0"));

    driver.advance(Duration::from_secs(1));
    let effects = driver.run(Event::Flush);
    assert_eq!(transmitted(&effects), ["h0"]);
    assert_eq!(queued(&driver), ["n1"]);
    assert_eq!(driver.ctx.queue().peek_next().unwrap().priority, Priority::Normal);
}
