//! Property tests for the outbound queue.
//!
//! Invariants tested:
//! - The queue never holds more than its capacity
//! - High-priority messages always drain before normal ones
//! - The in-flight message survives any overflow

use proptest::prelude::*;
use std::time::Instant;
use tether::{MessageQueue, OverflowPolicy, Priority};

#[derive(Debug, Clone)]
enum Op {
    Enqueue(Priority),
    Begin,
    Complete,
    Fail,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => prop_oneof![Just(Priority::Normal), Just(Priority::High)].prop_map(Op::Enqueue),
        1 => Just(Op::Begin),
        1 => Just(Op::Complete),
        1 => Just(Op::Fail),
    ]
}

fn policy() -> impl Strategy<Value = OverflowPolicy> {
    prop_oneof![
        Just(OverflowPolicy::EvictOldestNormal),
        Just(OverflowPolicy::RejectNewNormal),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: len <= capacity and the in-flight message is always retained
    #[test]
    fn queue_stays_bounded(
        capacity in 1usize..=16,
        policy in policy(),
        ops in prop::collection::vec(op(), 1..200),
    ) {
        let mut queue = MessageQueue::new(capacity, policy);
        let now = Instant::now();

        for op in ops {
            match op {
                Op::Enqueue(priority) => {
                    let _ = queue.enqueue("m", priority, now);
                }
                Op::Begin => {
                    queue.begin_send();
                }
                Op::Complete => {
                    if let Some(id) = queue.in_flight() {
                        prop_assert!(queue.complete(id).is_some());
                    }
                }
                Op::Fail => {
                    if let Some(id) = queue.in_flight() {
                        queue.fail(id);
                    }
                }
            }

            prop_assert!(queue.len() <= capacity);
            if let Some(id) = queue.in_flight() {
                prop_assert!(queue.iter().any(|m| m.id == id));
            }
        }
    }

    /// Property: no normal message drains while a high one is waiting
    #[test]
    fn high_lane_drains_first(
        priorities in prop::collection::vec(
            prop_oneof![Just(Priority::Normal), Just(Priority::High)],
            1..64,
        ),
    ) {
        let mut queue = MessageQueue::new(priorities.len(), OverflowPolicy::EvictOldestNormal);
        let now = Instant::now();
        for priority in &priorities {
            queue.enqueue("m", *priority, now).unwrap();
        }

        let mut drained = Vec::new();
        while let Some(message) = queue.begin_send() {
            drained.push(message.priority);
            queue.complete(message.id);
        }
        prop_assert_eq!(drained.len(), priorities.len());
        let first_normal = drained
            .iter()
            .position(|p| *p == Priority::Normal)
            .unwrap_or(drained.len());
        prop_assert!(drained[first_normal..].iter().all(|p| *p == Priority::Normal));
    }
}
