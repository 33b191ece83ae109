// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

use super::fixtures::{Event, EventLog, PATIENCE, PassCounter, Witness, wait_until};
use crate::{Dispatcher, DispatcherConfig, Endpoint, Interest, PollMultiplexer};
use pretty_assertions::assert_eq;
use serial_test::serial;
use std::{collections::BTreeSet, io::Write, time::Duration};

fn expired(label: u8) -> impl Fn(&Event) -> bool {
    move |it| matches!(it, Event::Expired { label: l, .. } if *l == label)
}

#[test]
#[serial]
fn test_expiry_fires_once_per_arm() {
    let dispatcher = Dispatcher::new().unwrap();
    let log = EventLog::default();
    let (endpoint, _peer) = Witness::endpoint(1, &log);
    let handle = dispatcher
        .attach(endpoint.with_deadline(Duration::from_millis(10)))
        .unwrap();

    assert!(wait_until(PATIENCE, || log.count(expired(1)) == 1));
    std::thread::sleep(Duration::from_millis(60));
    assert_eq!(log.count(expired(1)), 1);
    assert_eq!(handle.deadline_remaining().unwrap(), None);

    // Re-arming from outside the loop fires once more.
    handle.set_deadline(Duration::from_millis(5)).unwrap();
    assert!(wait_until(PATIENCE, || log.count(expired(1)) == 2));
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(log.count(expired(1)), 2);
}

#[test]
#[serial]
fn test_cleared_deadline_never_fires() {
    let dispatcher = Dispatcher::new().unwrap();
    let log = EventLog::default();
    let (endpoint, _peer) = Witness::endpoint(1, &log);
    let handle = dispatcher
        .attach(endpoint.with_deadline(Duration::from_millis(40)))
        .unwrap();
    handle.clear_deadline().unwrap();

    std::thread::sleep(Duration::from_millis(80));
    assert_eq!(log.count(expired(1)), 0);
    assert_eq!(dispatcher.stats().expiries, 0);
}

#[test]
fn test_zero_rearm_fires_within_same_pass() {
    let (hooks, view) = PassCounter::shared();
    let dispatcher = Dispatcher::with_hooks(hooks).unwrap();
    let log = EventLog::default();
    let (mut witness, _peer) = Witness::new(1, &log);
    witness.rearm_zero = 3;
    witness.pass = Some(view.pass.clone());

    dispatcher
        .attach(Endpoint::new(witness).with_deadline(Duration::ZERO))
        .unwrap();

    assert!(wait_until(PATIENCE, || log.count(expired(1)) == 4));
    let passes: BTreeSet<_> = log
        .snapshot()
        .into_iter()
        .filter_map(|it| match it {
            Event::Expired { pass, .. } => Some(pass),
            _ => None,
        })
        .collect();
    assert_eq!(passes.len(), 1);
}

#[test]
fn test_expiry_cap_spills_into_next_pass() {
    let (hooks, view) = PassCounter::shared();
    let config = DispatcherConfig {
        max_expiries_per_visit: 2,
        ..DispatcherConfig::default()
    };
    let dispatcher =
        Dispatcher::with_parts(config, PollMultiplexer::new(), hooks).unwrap();
    let log = EventLog::default();
    let (mut witness, _peer) = Witness::new(1, &log);
    witness.rearm_zero = 5;
    witness.pass = Some(view.pass.clone());

    dispatcher
        .attach(Endpoint::new(witness).with_deadline(Duration::ZERO))
        .unwrap();

    assert!(wait_until(PATIENCE, || log.count(expired(1)) == 6));
    let passes: BTreeSet<_> = log
        .snapshot()
        .into_iter()
        .filter_map(|it| match it {
            Event::Expired { pass, .. } => Some(pass),
            _ => None,
        })
        .collect();
    assert_eq!(passes.len(), 3);
}

#[test]
fn test_disconnect_unlinks_before_callback() {
    let dispatcher = Dispatcher::new().unwrap();
    let log = EventLog::default();
    let (a, peer_a) = Witness::endpoint(1, &log);
    let (b, _peer_b) = Witness::endpoint(2, &log);
    dispatcher
        .attach(a.with_interest(Interest::READABLE | Interest::DISCONNECTING))
        .unwrap();
    dispatcher.attach(b).unwrap();

    drop(peer_a);

    assert!(wait_until(PATIENCE, || {
        log.count(|it| matches!(it, Event::Disconnected { .. })) == 1
    }));
    assert_eq!(
        log.snapshot(),
        vec![Event::Disconnected {
            label: 1,
            remaining: 1
        }]
    );
    assert_eq!(dispatcher.len(), 1);
    assert_eq!(dispatcher.stats().disconnects, 1);
}

#[test]
fn test_hang_up_without_disconnecting_goes_to_readable() {
    let dispatcher = Dispatcher::new().unwrap();
    let log = EventLog::default();
    let (endpoint, mut peer) = Witness::endpoint(1, &log);
    dispatcher
        .attach(endpoint.with_interest(Interest::READABLE))
        .unwrap();

    peer.write_all(b"bye").unwrap();
    drop(peer);

    // The witness reads the bytes, then EOF, then detaches itself.
    assert!(wait_until(PATIENCE, || dispatcher.is_empty()));
    assert!(log.count(|it| *it == Event::Readable(1)) >= 1);
    assert_eq!(log.count(|it| matches!(it, Event::Disconnected { .. })), 0);
}

#[test]
#[serial]
fn test_parked_endpoint_does_not_spin() {
    let dispatcher = Dispatcher::new().unwrap();
    let log = EventLog::default();
    let (endpoint, peer) = Witness::endpoint(1, &log);
    let handle = dispatcher
        .attach(endpoint.with_interest(Interest::NONE))
        .unwrap();
    drop(peer);

    std::thread::sleep(Duration::from_millis(50));
    let before = dispatcher.stats().passes;
    std::thread::sleep(Duration::from_millis(100));
    let after = dispatcher.stats().passes;
    assert!(after - before <= 1, "loop spun: {before} -> {after} passes");
    assert!(handle.is_attached());

    // Changing the interest unparks it, and the hang-up is now delivered.
    handle.set_interest(false, false, true).unwrap();
    assert!(wait_until(PATIENCE, || !handle.is_attached()));
    assert_eq!(
        log.snapshot(),
        vec![Event::Disconnected {
            label: 1,
            remaining: 0
        }]
    );
}

/// E1 is readable, E2 expires at 10 ms, E3 is writable and expires at 5 ms.
#[test]
#[serial]
fn test_readiness_then_expiries_in_deadline_order() {
    let dispatcher = Dispatcher::new().unwrap();
    let log = EventLog::default();

    let (e1, mut peer1) = Witness::endpoint(1, &log);
    peer1.write_all(b"ping").unwrap();
    let (e2, _peer2) = Witness::endpoint(2, &log);
    let (mut e3, _peer3) = Witness::new(3, &log);
    e3.one_shot_writable = true;

    dispatcher.attach(e1).unwrap();
    dispatcher
        .attach(e2.with_deadline(Duration::from_millis(10)))
        .unwrap();
    dispatcher
        .attach(
            Endpoint::new(e3)
                .with_interest(Interest::new(false, true, false))
                .with_deadline(Duration::from_millis(5)),
        )
        .unwrap();

    assert!(wait_until(PATIENCE, || {
        log.count(expired(2)) == 1 && log.count(expired(3)) == 1
    }));

    let readable_1 = log.position(|it| *it == Event::Readable(1)).unwrap();
    let writable_3 = log.position(|it| *it == Event::Writable(3)).unwrap();
    let expired_3 = log.position(expired(3)).unwrap();
    let expired_2 = log.position(expired(2)).unwrap();
    assert!(readable_1 < expired_3);
    assert!(writable_3 < expired_3);
    assert!(expired_3 < expired_2);
    assert_eq!(log.count(|it| *it == Event::Writable(3)), 1);
}

#[test]
#[serial]
fn test_wait_set_rebuilt_only_on_membership_change() {
    let dispatcher = Dispatcher::new().unwrap();
    let log = EventLog::default();
    let mut peers = vec![];
    let mut handles = vec![];
    for label in 0..3 {
        let (endpoint, peer) = Witness::endpoint(label, &log);
        handles.push(dispatcher.attach(endpoint).unwrap());
        peers.push(peer);
    }

    let settle = |passes: u64| {
        assert!(wait_until(PATIENCE, || dispatcher.stats().passes > passes));
        // Every pass ends with the sync, so taking the lock once more is enough.
        dispatcher.inspect_hooks(|_| ()).unwrap();
    };

    dispatcher.wake().unwrap();
    settle(dispatcher.stats().passes);
    let rebuilds = dispatcher.stats().wait_set_rebuilds;

    for handle in &handles {
        let passes = dispatcher.stats().passes;
        handle.set_interest(true, true, false).unwrap();
        settle(passes);
        let passes = dispatcher.stats().passes;
        handle.set_interest(true, false, false).unwrap();
        settle(passes);
    }
    assert_eq!(dispatcher.stats().wait_set_rebuilds, rebuilds);

    let (endpoint, _peer) = Witness::endpoint(9, &log);
    dispatcher.attach(endpoint).unwrap();
    assert!(wait_until(PATIENCE, || {
        dispatcher.stats().wait_set_rebuilds == rebuilds + 1
    }));
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(dispatcher.stats().wait_set_rebuilds, rebuilds + 1);
}
