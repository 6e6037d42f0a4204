use bytes::Bytes;
use cluster_sim::{
    CaseOverrides, ChangePeerType, ControlPlaneClient, ControlPlaneConfig, ControlPlaneError, Driver,
    EmbeddedControlPlane, Operator, Outcome, Peer, PeerId, Region, RegionEpoch, RegionId, RpcControlPlaneClient,
    SimConfig, Store, StoreId, StoreStatus, MIB,
};
use std::error::Error;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

const CLUSTER_ID: u64 = 77;

#[tokio::test]
async fn balance_region_small_converges() -> Result<(), Box<dyn Error>> {
    // -- setup --
    let mut config = fast_config(3000);
    config.cases.insert(
        "balance-region-small".to_string(),
        CaseOverrides {
            region_count: Some(8),
            region_size_mb: Some(1),
            ..CaseOverrides::default()
        },
    );
    let driver = Driver::new(test_logger(), config, None);

    // -- execute --
    let report = driver.run("balance-region-small", CancellationToken::new()).await?;

    // -- verify --
    assert!(report.passed(), "{}", report);
    for store in &report.stores {
        assert_eq!(6, store.region_count, "{}", report);
    }
    let summary = report.control_plane.expect("embedded control plane summary");
    assert_eq!(4, summary.stores);

    Ok(())
}

#[tokio::test]
async fn single_store_never_reaches_replica_target() -> Result<(), Box<dyn Error>> {
    // -- setup --
    let mut config = fast_config(50);
    config.cases.insert(
        "makeup-down-replicas".to_string(),
        CaseOverrides {
            store_count: Some(1),
            region_count: Some(4),
            ..CaseOverrides::default()
        },
    );
    let driver = Driver::new(test_logger(), config, None);

    // -- execute --
    let report = driver.run("makeup-down-replicas", CancellationToken::new()).await?;

    // -- verify --
    assert_eq!(Outcome::TickLimit, report.outcome);
    assert_eq!(50, report.ticks);
    assert!(report.to_string().starts_with("FAIL [makeup-down-replicas] ticks=50"));

    Ok(())
}

#[tokio::test]
async fn cancellation_ends_run_as_failure() -> Result<(), Box<dyn Error>> {
    // -- setup --
    let mut config = fast_config(1_000_000);
    config.sim_tick_interval_ms = 5;
    config.cases.insert(
        "add-nodes-dynamic".to_string(),
        CaseOverrides {
            region_count: Some(100),
            ..CaseOverrides::default()
        },
    );
    let driver = Driver::new(test_logger(), config, None);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    // -- execute --
    let report = driver.run("add-nodes-dynamic", cancel).await?;

    // -- verify --
    assert_eq!(Outcome::Cancelled, report.outcome);
    assert!(!report.passed());

    Ok(())
}

#[tokio::test]
async fn region_merge_stops_at_three_quarters() -> Result<(), Box<dyn Error>> {
    // -- setup --
    let driver = Driver::new(test_logger(), paced_config(), None);

    // -- execute --
    let report = driver.run("region-merge", CancellationToken::new()).await?;

    // -- verify --
    assert!(report.passed(), "{}", report);
    assert_eq!(10, report.counters.merges, "{}", report);

    Ok(())
}

#[tokio::test]
async fn makeup_down_replicas_refills_survivors() -> Result<(), Box<dyn Error>> {
    // -- setup --
    let mut config = paced_config();
    config.cases.insert(
        "makeup-down-replicas".to_string(),
        CaseOverrides {
            region_count: Some(40),
            region_size_mb: Some(1),
            ..CaseOverrides::default()
        },
    );
    let driver = Driver::new(test_logger(), config, None);

    // -- execute --
    let report = driver.run("makeup-down-replicas", CancellationToken::new()).await?;

    // -- verify --
    assert!(report.passed(), "{}", report);
    for store in &report.stores {
        if store.id == StoreId::new(1) {
            assert_ne!(StoreStatus::Up, store.status);
        } else {
            assert_eq!(40, store.region_count, "{}", report);
        }
    }

    Ok(())
}

#[tokio::test]
async fn delete_nodes_rebalances_remaining_stores() -> Result<(), Box<dyn Error>> {
    // -- setup --
    let mut config = paced_config();
    config.cases.insert(
        "delete-nodes".to_string(),
        CaseOverrides {
            region_count: Some(80),
            region_size_mb: Some(1),
            interval_ticks: Some(10),
            ..CaseOverrides::default()
        },
    );
    let driver = Driver::new(test_logger(), config, None);

    // -- execute --
    let report = driver.run("delete-nodes", CancellationToken::new()).await?;

    // -- verify --
    assert!(report.passed(), "{}", report);
    assert!(report.ticks >= 10);
    let up: Vec<_> = report.stores.iter().filter(|s| s.status == StoreStatus::Up).collect();
    assert_eq!(7, up.len());
    for store in up {
        assert!((32..=36).contains(&store.region_count), "{}", report);
    }

    Ok(())
}

#[tokio::test]
async fn add_nodes_fills_empty_stores() -> Result<(), Box<dyn Error>> {
    // -- setup --
    let mut config = paced_config();
    config.cases.insert(
        "add-nodes".to_string(),
        CaseOverrides {
            region_count: Some(30),
            region_size_mb: Some(1),
            ..CaseOverrides::default()
        },
    );
    let driver = Driver::new(test_logger(), config, None);

    // -- execute --
    let report = driver.run("add-nodes", CancellationToken::new()).await?;

    // -- verify --
    assert!(report.passed(), "{}", report);
    assert_eq!(6, report.stores.len());
    for store in &report.stores {
        assert!(store.region_count > 0, "{}", report);
    }

    Ok(())
}

#[tokio::test]
async fn add_nodes_dynamic_spreads_over_late_stores() -> Result<(), Box<dyn Error>> {
    // -- setup --
    let mut config = paced_config();
    config.cases.insert(
        "add-nodes-dynamic".to_string(),
        CaseOverrides {
            store_count: Some(4),
            target_store_count: Some(6),
            region_count: Some(40),
            region_size_mb: Some(1),
            interval_ticks: Some(10),
            ..CaseOverrides::default()
        },
    );
    let driver = Driver::new(test_logger(), config, None);

    // -- execute --
    let report = driver.run("add-nodes-dynamic", CancellationToken::new()).await?;

    // -- verify --
    assert!(report.passed(), "{}", report);
    assert!(report.ticks >= 20);
    assert_eq!(6, report.stores.len());

    Ok(())
}

#[tokio::test]
async fn embedded_control_plane_schedules_missing_replica() -> Result<(), Box<dyn Error>> {
    // -- setup --
    let control_plane = EmbeddedControlPlane::start(test_logger(), ControlPlaneConfig::default(), CLUSTER_ID).await?;
    let address = control_plane.address().to_string();
    let client = RpcControlPlaneClient::connect(test_logger(), &address, Duration::from_secs(3)).await?;
    assert_eq!(CLUSTER_ID, client.get_cluster_id().await?);

    let stores: Vec<Store> = (1..=3).map(|id| Store::new(StoreId::new(id), 1 << 30)).collect();
    let region = Region::new(
        RegionId::new(10),
        Bytes::new(),
        Bytes::new(),
        vec![Peer::voter(PeerId::new(11), StoreId::new(1))],
        RegionEpoch::new(1, 1),
    )
    .with_leader(PeerId::new(11))
    .with_size(MIB, 100);

    // -- execute --
    client.bootstrap(&stores[0], &region, 1000).await?;
    client.put_store(&stores[1]).await?;
    client.put_store(&stores[2]).await?;
    let first_id = client.alloc_id().await?;
    let mut stream = client.region_heartbeat().await?;
    stream.requests.send(region.clone())?;
    let response = tokio::time::timeout(Duration::from_secs(3), stream.responses.recv())
        .await?
        .expect("stream open")?;

    // -- verify --
    assert!(first_id >= 1000);
    assert_eq!(region.id(), response.region_id);
    match response.operator {
        Some(Operator::ChangePeer { change, peer }) => {
            assert_eq!(ChangePeerType::AddVoter, change);
            assert_ne!(StoreId::new(1), peer.store_id());
            assert!(peer.id().as_u64() > first_id);
        }
        other => panic!("Expected a replica to be added, got {:?}", other),
    }

    drop(stream);
    control_plane.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn conflicting_bootstrap_is_refused() -> Result<(), Box<dyn Error>> {
    // -- setup --
    let control_plane = EmbeddedControlPlane::start(test_logger(), ControlPlaneConfig::default(), CLUSTER_ID).await?;
    let address = control_plane.address().to_string();
    let client = RpcControlPlaneClient::connect(test_logger(), &address, Duration::from_secs(3)).await?;
    let region = |id: u64| {
        Region::new(
            RegionId::new(id),
            Bytes::new(),
            Bytes::new(),
            vec![Peer::voter(PeerId::new(id + 1), StoreId::new(1))],
            RegionEpoch::new(1, 1),
        )
    };
    let store = Store::new(StoreId::new(1), 1 << 30);

    // -- execute --
    client.bootstrap(&store, &region(10), 100).await?;
    let again = client.bootstrap(&store, &region(10), 100).await;
    let conflict = client.bootstrap(&store, &region(20), 100).await;

    // -- verify --
    assert!(again.is_ok());
    assert!(matches!(conflict, Err(ControlPlaneError::BootstrapConflict { .. })));

    control_plane.shutdown().await;
    Ok(())
}

fn fast_config(max_ticks: u64) -> SimConfig {
    SimConfig {
        sim_tick_interval_ms: 1,
        store_heartbeat_interval_ticks: 1,
        region_heartbeat_interval_ticks: 1,
        max_ticks: Some(max_ticks),
        ..SimConfig::default()
    }
}

// Real pacing with the default heartbeat intervals.
fn paced_config() -> SimConfig {
    SimConfig {
        sim_tick_interval_ms: 20,
        max_ticks: Some(3000),
        ..SimConfig::default()
    }
}

fn test_logger() -> slog::Logger {
    slog::Logger::root(slog::Discard, slog::o!())
}
