//! Integration tests for the chain wallet manager: polling, snapshots,
//! single-flight refresh, lock accounting, and stop quiescence.

mod support;

use std::sync::Arc;
use std::time::Duration;

use rust_decimal_macros::dec;

use purser::application::AcquireOptions;
use purser::domain::WalletAddress;
use purser::port::event::Event;
use purser::testkit::{native_balance, wallet, ScriptedDriver};
use purser::{DriverError, Error, FleetError};

use support::started_manager;

#[tokio::test]
async fn first_poll_lands_in_get_balances() {
    let driver = Arc::new(ScriptedDriver::new().with_balances(
        "0xA",
        vec![native_balance("0xA", "ETH", dec!(1.5))],
    ));
    let (manager, sink) = started_manager(
        Arc::clone(&driver),
        vec![wallet("0xA", "ETH")],
        Some(Duration::from_millis(25)),
    );

    assert!(
        sink.wait_for(
            |e| matches!(e, Event::Balances { .. }),
            Duration::from_secs(1)
        )
        .await
    );

    let snapshot = manager.get_balances();
    let balances = snapshot.get(&WalletAddress::new("0xA")).unwrap();
    assert_eq!(balances.len(), 1);
    assert_eq!(balances[0].symbol, "ETH");
    assert!(balances[0].is_native);
    assert_eq!(balances[0].formatted_balance, dec!(1.5));

    manager.stop().await;
}

#[tokio::test]
async fn balances_events_fire_even_when_unchanged() {
    let driver = Arc::new(ScriptedDriver::new().with_balances(
        "0xA",
        vec![native_balance("0xA", "ETH", dec!(1))],
    ));
    let (manager, sink) = started_manager(
        Arc::clone(&driver),
        vec![wallet("0xA", "ETH")],
        Some(Duration::from_millis(10)),
    );

    // Values never change, yet refreshes keep announcing themselves so
    // freshness metrics stay live.
    let saw_repeats = sink
        .wait_for(
            |e| matches!(e, Event::Balances { .. }),
            Duration::from_secs(1),
        )
        .await
        && {
            tokio::time::sleep(Duration::from_millis(100)).await;
            sink.matching(|e| matches!(e, Event::Balances { .. })).len() >= 3
        };
    assert!(saw_repeats);

    manager.stop().await;
}

#[tokio::test]
async fn snapshots_are_published_monotonically() {
    let driver = Arc::new(ScriptedDriver::new());
    driver.push_balances("0xA", Ok(vec![native_balance("0xA", "ETH", dec!(1))]));
    driver.push_balances("0xA", Ok(vec![native_balance("0xA", "ETH", dec!(2))]));
    driver.push_balances("0xA", Ok(vec![native_balance("0xA", "ETH", dec!(3))]));

    let (manager, sink) = started_manager(
        Arc::clone(&driver),
        vec![wallet("0xA", "ETH")],
        Some(Duration::from_millis(10)),
    );

    tokio::time::sleep(Duration::from_millis(120)).await;
    manager.stop().await;

    let events = sink.matching(|e| matches!(e, Event::Balances { .. }));
    assert!(events.len() >= 3);

    // Each event's previous snapshot is exactly the one published before
    // it: the sequence consumers observe is the sequence produced.
    for pair in events.windows(2) {
        let (Event::Balances { new, .. }, Event::Balances { previous, .. }) = (&pair[0], &pair[1])
        else {
            unreachable!("filtered to balance events");
        };
        assert!(Arc::ptr_eq(new, previous), "snapshot sequence reordered");
    }
}

#[tokio::test]
async fn failed_wallet_keeps_prior_balances_and_emits_error() {
    let driver = Arc::new(
        ScriptedDriver::new()
            .with_balances("0xGood", vec![native_balance("0xGood", "ETH", dec!(2))])
            .with_balances("0xFlaky", vec![native_balance("0xFlaky", "ETH", dec!(5))]),
    );
    let (manager, sink) = started_manager(
        Arc::clone(&driver),
        vec![wallet("0xGood", "ETH"), wallet("0xFlaky", "ETH")],
        None,
    );

    // First refresh: both wallets answer.
    manager.pull_balances().await.unwrap();

    // Second refresh: the flaky wallet errors; its last-known balances
    // must survive in the new snapshot.
    driver.push_balances("0xFlaky", Err(DriverError::Rpc("connection reset".into())));
    let snapshot = manager.pull_balances().await.unwrap();

    assert_eq!(
        snapshot.get(&WalletAddress::new("0xFlaky")).unwrap()[0].formatted_balance,
        dec!(5)
    );
    assert_eq!(
        snapshot.get(&WalletAddress::new("0xGood")).unwrap()[0].formatted_balance,
        dec!(2)
    );
    assert_eq!(
        sink.matching(|e| matches!(e, Event::ChainError { .. })).len(),
        1
    );

    manager.stop().await;
}

#[tokio::test]
async fn concurrent_pulls_share_one_refresh() {
    let driver = Arc::new(
        ScriptedDriver::new()
            .with_delay(Duration::from_millis(50))
            .with_balances("0xA", vec![native_balance("0xA", "ETH", dec!(1))]),
    );
    // Polling disabled: only explicit pulls refresh.
    let (manager, _sink) = started_manager(Arc::clone(&driver), vec![wallet("0xA", "ETH")], None);

    let (first, second, third) = tokio::join!(
        manager.pull_balances(),
        manager.pull_balances(),
        manager.pull_balances()
    );
    first.unwrap();
    second.unwrap();
    third.unwrap();

    assert_eq!(driver.pull_count(), 1, "followers must share the refresh");

    manager.stop().await;
}

#[tokio::test]
async fn pull_at_height_leaves_snapshot_untouched() {
    let driver = Arc::new(ScriptedDriver::new().with_balances(
        "0xA",
        vec![native_balance("0xA", "ETH", dec!(7))],
    ));
    let (manager, _sink) = started_manager(Arc::clone(&driver), vec![wallet("0xA", "ETH")], None);

    let historical = manager.pull_balances_at_height(12_345).await.unwrap();
    assert_eq!(historical.len(), 1);

    // The persistent table never saw a publish.
    assert!(manager.get_balances().is_empty());

    manager.stop().await;
}

#[tokio::test]
async fn lock_accounting_emits_count_and_period() {
    let driver = Arc::new(ScriptedDriver::new());
    let (manager, sink) = started_manager(Arc::clone(&driver), vec![wallet("0xA", "ETH")], None);

    let token = manager
        .acquire_lock(&WalletAddress::new("0xA"), AcquireOptions::default())
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    manager.release_lock(token).unwrap();

    let counts: Vec<usize> = sink
        .matching(|e| matches!(e, Event::ActiveWalletsCount { .. }))
        .into_iter()
        .map(|e| match e {
            Event::ActiveWalletsCount { count, .. } => count,
            _ => unreachable!(),
        })
        .collect();
    assert_eq!(counts, vec![1, 0]);

    let periods = sink.matching(|e| matches!(e, Event::WalletsLockPeriod { .. }));
    assert_eq!(periods.len(), 1);
    let Event::WalletsLockPeriod { address, held_for, .. } = &periods[0] else {
        unreachable!();
    };
    assert_eq!(address, &WalletAddress::new("0xA"));
    assert!(*held_for >= Duration::from_millis(5));

    manager.stop().await;
}

#[tokio::test]
async fn locking_unconfigured_wallet_fails() {
    let driver = Arc::new(ScriptedDriver::new());
    let (manager, _sink) = started_manager(Arc::clone(&driver), vec![wallet("0xA", "ETH")], None);

    let err = manager
        .acquire_lock(&WalletAddress::new("0xNope"), AcquireOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Fleet(FleetError::UnknownWallet { .. })
    ));

    manager.stop().await;
}

#[tokio::test]
async fn stop_is_quiescent_and_terminal() {
    let driver = Arc::new(ScriptedDriver::new().with_balances(
        "0xA",
        vec![native_balance("0xA", "ETH", dec!(1))],
    ));
    let (manager, sink) = started_manager(
        Arc::clone(&driver),
        vec![wallet("0xA", "ETH")],
        Some(Duration::from_millis(10)),
    );

    assert!(
        sink.wait_for(
            |e| matches!(e, Event::Balances { .. }),
            Duration::from_secs(1)
        )
        .await
    );

    manager.stop().await;
    let events_after_stop = sink.len();
    let pulls_after_stop = driver.pull_count();

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(sink.len(), events_after_stop, "events after stop");
    assert_eq!(driver.pull_count(), pulls_after_stop, "driver calls after stop");

    // Terminal state: restarts and fresh pulls are refused.
    assert!(matches!(
        manager.start().unwrap_err(),
        Error::Fleet(FleetError::ManagerStopped(_))
    ));
    assert!(matches!(
        manager.pull_balances().await.unwrap_err(),
        Error::Fleet(FleetError::ManagerStopped(_))
    ));
}

#[tokio::test]
async fn start_is_idempotent_while_running() {
    let driver = Arc::new(ScriptedDriver::new());
    let (manager, _sink) = started_manager(
        Arc::clone(&driver),
        vec![wallet("0xA", "ETH")],
        Some(Duration::from_millis(20)),
    );

    manager.start().unwrap();
    manager.start().unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    manager.stop().await;

    // A duplicated poller would double the refresh rate; with ~50ms of
    // runtime and a 20ms period a single poller fits in a narrow band.
    assert!(driver.pull_count() <= 4);
}
