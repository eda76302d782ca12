#![allow(clippy::unwrap_used)]

// Engine behavior end to end against the simulated reader and an
// in-memory catalog.

use std::sync::Arc;
use std::time::Duration;

use tagwatch_core::{
    ConnectionState, CoreError, DeviceInfo, Engine, EngineConfig, FeedbackEvent, IngestFilter,
    LookupService, RSSI_FLOOR, RawRead, ReaderSession, ReadingMode, Registration, SimulatedReader,
    SimulatedSession, StaticCatalog,
};
use tokio::time::Instant;

fn fast_config() -> EngineConfig {
    EngineConfig {
        connect_backoff: Duration::from_millis(5),
        driver_call_timeout: Duration::from_secs(2),
        poll_interval: Duration::from_millis(10),
        pull_timeout: Duration::from_millis(500),
        // Effectively off unless a test lowers it.
        stall_threshold: 10_000,
        stall_restart_pause: Duration::from_millis(5),
        lookup_timeout: Duration::from_secs(1),
        sweep_interval: Duration::from_millis(10),
        locate_timeout: Duration::from_millis(150),
        monitor_timeout: Duration::from_millis(150),
        ..EngineConfig::default()
    }
}

fn catalog() -> Arc<StaticCatalog> {
    Arc::new(
        StaticCatalog::new()
            .with_item("E1", "SKU-1")
            .with_item("E2", "SKU-2"),
    )
}

fn engine_with(
    config: EngineConfig,
    reader: &SimulatedReader,
    catalog: &Arc<StaticCatalog>,
) -> Engine {
    let lookup: Arc<dyn LookupService> = catalog.clone();
    Engine::new(config, Arc::new(reader.clone()), lookup)
}

async fn wait_for<F: FnMut() -> bool>(mut check: F) -> bool {
    let deadline = Instant::now() + Duration::from_secs(3);
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

fn reads(batch: &[(&str, i32)]) -> Vec<RawRead> {
    batch.iter().map(|&(epc, rssi)| RawRead::new(epc, rssi)).collect()
}

async fn scanning_engine(
    config: EngineConfig,
    catalog: &Arc<StaticCatalog>,
) -> (Engine, Arc<SimulatedSession>) {
    let reader = SimulatedReader::new();
    let engine = engine_with(config, &reader, catalog);
    assert_eq!(engine.connect(None).await, ConnectionState::Connected);
    engine.start_session().await.unwrap();
    let session = reader.session().unwrap();
    (engine, session)
}

// ── Connection ──────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn connect_opens_and_configures_reader() {
    let reader = SimulatedReader::new();
    let engine = engine_with(fast_config(), &reader, &catalog());
    let mut feedback = engine.feedback();

    let state = engine.connect(None).await;

    assert_eq!(state, ConnectionState::Connected);
    assert_eq!(*engine.connection_state().borrow(), ConnectionState::Connected);
    assert!(engine.is_connected().await);
    assert_eq!(
        engine.connected_device().await.map(|d| d.name).as_deref(),
        Some("RFD40-SIM")
    );
    let session = reader.session().unwrap();
    assert!(session.has_listener());
    assert!(session.applied_settings().is_some());
    assert_eq!(
        feedback.recv().await.unwrap(),
        FeedbackEvent::ConnectConfirmed {
            device: "RFD40-SIM".into()
        }
    );
    engine.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn discovery_retries_with_driver_reinitialization() {
    let reader = SimulatedReader::new().hidden_for(2);
    let engine = engine_with(fast_config(), &reader, &catalog());

    assert_eq!(engine.connect(None).await, ConnectionState::Connected);
    assert_eq!(reader.discoveries(), 3);
    assert_eq!(reader.reinitializations(), 1);
    engine.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn discovery_gives_up_after_configured_attempts() {
    let reader = SimulatedReader::new().hidden_for(10);
    let engine = engine_with(fast_config(), &reader, &catalog());

    let state = engine.connect(None).await;

    assert!(matches!(state, ConnectionState::Error { .. }));
    assert_eq!(reader.discoveries(), 3);
    assert!(!engine.is_connected().await);
}

fn slow_retry_config() -> EngineConfig {
    EngineConfig {
        connect_backoff: Duration::from_secs(1),
        connect_attempts: 10,
        ..fast_config()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_interrupts_discovery_backoff() {
    let reader = SimulatedReader::new().hidden_for(100);
    let engine = engine_with(slow_retry_config(), &reader, &catalog());

    let connecting = tokio::spawn({
        let engine = engine.clone();
        async move { engine.connect(None).await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(*engine.connection_state().borrow(), ConnectionState::Connecting);

    engine.shutdown().await;
    let state = tokio::time::timeout(Duration::from_millis(800), connecting)
        .await
        .expect("connect outlived shutdown")
        .unwrap();

    assert_eq!(state, ConnectionState::Disconnected);
    assert_eq!(*engine.connection_state().borrow(), ConnectionState::Disconnected);
    assert!(reader.discoveries() < 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn disconnect_interrupts_discovery_backoff() {
    let reader = SimulatedReader::new().hidden_for(100);
    let engine = engine_with(slow_retry_config(), &reader, &catalog());
    let mut feedback = engine.feedback();

    let connecting = tokio::spawn({
        let engine = engine.clone();
        async move { engine.connect(None).await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    engine.disconnect().await;
    let state = tokio::time::timeout(Duration::from_millis(800), connecting)
        .await
        .expect("connect outlived disconnect")
        .unwrap();

    assert_eq!(state, ConnectionState::Disconnected);
    assert!(!engine.is_connected().await);
    // Nothing was open, so nothing is confirmed.
    assert!(feedback.try_recv().is_err());
    engine.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn no_paired_reader_is_an_error_state() {
    let reader = SimulatedReader::with_paired(vec![DeviceInfo::new("Headset", "11:22")]);
    let engine = engine_with(fast_config(), &reader, &catalog());

    let state = engine.connect(None).await;

    assert!(matches!(state, ConnectionState::Error { .. }));
    assert_eq!(reader.discoveries(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn connect_failure_reports_error() {
    let reader = SimulatedReader::new().failing_connect("link refused");
    let engine = engine_with(fast_config(), &reader, &catalog());

    match engine.connect(None).await {
        ConnectionState::Error { message } => assert!(message.contains("link refused")),
        other => panic!("unexpected state {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn configuration_failure_is_not_fatal() {
    let reader = SimulatedReader::new().failing_configure();
    let engine = engine_with(fast_config(), &reader, &catalog());

    assert_eq!(engine.connect(None).await, ConnectionState::Connected);
    assert!(reader.session().unwrap().applied_settings().is_none());
    engine.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn connect_while_connected_reinstalls_listener() {
    let reader = SimulatedReader::new();
    let engine = engine_with(fast_config(), &reader, &catalog());

    engine.connect(None).await;
    let first = reader.session().unwrap();
    assert_eq!(engine.connect(None).await, ConnectionState::Connected);

    let second = reader.session().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(second.listener_installs(), 2);
    engine.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dead_link_is_replaced_on_connect() {
    let reader = SimulatedReader::new();
    let engine = engine_with(fast_config(), &reader, &catalog());

    engine.connect(None).await;
    let first = reader.session().unwrap();
    first.drop_link();

    assert_eq!(engine.connect(None).await, ConnectionState::Connected);
    assert!(!Arc::ptr_eq(&first, &reader.session().unwrap()));
    engine.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn disconnect_confirms_once() {
    let reader = SimulatedReader::new();
    let engine = engine_with(fast_config(), &reader, &catalog());
    engine.connect(None).await;
    let mut feedback = engine.feedback();

    engine.disconnect().await;
    engine.disconnect().await;

    assert_eq!(feedback.recv().await.unwrap(), FeedbackEvent::DisconnectConfirmed);
    assert!(feedback.try_recv().is_err());
    assert_eq!(*engine.connection_state().borrow(), ConnectionState::Disconnected);
    assert!(engine.connected_device().await.is_none());
    let session = reader.session().unwrap();
    assert!(!session.is_connected());
    assert!(!session.has_listener());
}

// ── Scan sessions ───────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn start_session_requires_connection() {
    let reader = SimulatedReader::new();
    let engine = engine_with(fast_config(), &reader, &catalog());

    let err = engine.start_session().await.unwrap_err();
    assert!(matches!(err, CoreError::NotConnected));
    assert!(!engine.is_scanning());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn session_start_and_stop_drive_inventory() {
    let (engine, session) = scanning_engine(fast_config(), &catalog()).await;

    assert!(engine.is_scanning());
    assert!(session.inventory_running());
    assert_eq!(session.purges(), 1);

    engine.stop_session().await;
    assert!(!engine.is_scanning());
    assert!(!session.inventory_running());

    assert!(engine.toggle_session().await.unwrap());
    assert!(session.inventory_running());
    engine.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn disconnect_stops_the_session() {
    let (engine, _session) = scanning_engine(fast_config(), &catalog()).await;

    engine.disconnect().await;

    assert!(!engine.is_scanning());
    assert!(matches!(
        engine.start_session().await,
        Err(CoreError::NotConnected)
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stalled_reader_is_restarted() {
    let config = EngineConfig {
        stall_threshold: 3,
        ..fast_config()
    };
    let (engine, session) = scanning_engine(config, &catalog()).await;
    session.stall();

    assert!(wait_for(|| session.inventory_starts() >= 2).await);
    assert!(session.inventory_running());
    engine.shutdown().await;
}

// ── Classification pipeline ─────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn target_keeps_only_matching_tags_once() {
    let catalog = catalog();
    let (engine, session) = scanning_engine(fast_config(), &catalog).await;
    engine.set_reading_target(Some("SKU-1".into()));
    let mut feedback = engine.feedback();

    session.push_reads(reads(&[("E1", -50), ("E2", -40), ("E3", -60)]));
    assert!(wait_for(|| engine.store().cached_decisions() == 3).await);
    session.push_reads(reads(&[("E1", -45), ("E2", -41), ("E3", -61)]));
    assert!(wait_for(|| engine.store().get("E1").is_some_and(|t| t.rssi == -45)).await);

    assert_eq!(engine.store().len(), 1);
    assert_eq!(catalog.item_lookups(), 3);
    let tag = engine.store().get("E1").unwrap();
    assert_eq!(tag.registration.product_id(), Some("SKU-1"));
    assert_eq!(
        feedback.recv().await.unwrap(),
        FeedbackEvent::NewTagMatched { epc: "E1".into() }
    );
    assert!(feedback.try_recv().is_err());
    engine.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn registered_only_mode_rejects_unknown_tags() {
    let config = EngineConfig {
        reading_mode: ReadingMode::OnlyRegistered,
        ..fast_config()
    };
    let (engine, session) = scanning_engine(config, &catalog()).await;

    session.push_reads(reads(&[("E1", -50), ("E9", -50)]));
    assert!(wait_for(|| engine.store().cached_decisions() == 2).await);

    assert_eq!(engine.store().len(), 1);
    assert!(engine.store().get("E9").is_none());
    assert!(!engine.store().decision("E9").unwrap().matched);
    engine.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unfiltered_mode_keeps_unregistered_tags() {
    let (engine, session) = scanning_engine(fast_config(), &catalog()).await;

    session.push_reads(reads(&[("E9", -55)]));
    assert!(wait_for(|| engine.store().get("E9").is_some()).await);

    let tag = engine.store().get("E9").unwrap();
    assert_eq!(tag.registration, Registration::Unregistered);
    engine.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unreachable_catalog_treats_tags_as_unregistered() {
    let catalog = Arc::new(StaticCatalog::new().unreachable());
    let config = EngineConfig {
        reading_mode: ReadingMode::OnlyRegistered,
        ..fast_config()
    };
    let (engine, session) = scanning_engine(config, &catalog).await;

    session.push_reads(reads(&[("E1", -50)]));
    assert!(wait_for(|| engine.store().cached_decisions() == 1).await);

    assert!(engine.store().is_empty());
    engine.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn changing_target_clears_tags_and_cache() {
    let catalog = catalog();
    let (engine, session) = scanning_engine(fast_config(), &catalog).await;
    engine.set_reading_target(Some("SKU-1".into()));

    session.push_reads(reads(&[("E1", -50)]));
    assert!(wait_for(|| engine.store().len() == 1).await);

    engine.set_reading_target(Some("SKU-2".into()));
    assert!(engine.store().is_empty());
    assert_eq!(engine.store().cached_decisions(), 0);

    session.push_reads(reads(&[("E1", -50), ("E2", -52)]));
    assert!(wait_for(|| engine.store().cached_decisions() == 2).await);
    assert_eq!(catalog.item_lookups(), 3);
    assert!(engine.store().get("E1").is_none());
    assert!(engine.store().get("E2").is_some());
    engine.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn ingest_filter_drops_weak_reads() {
    let config = EngineConfig {
        ingest_filter: IngestFilter {
            min_rssi: Some(-60),
            epc_prefix: None,
        },
        ..fast_config()
    };
    let catalog = catalog();
    let (engine, session) = scanning_engine(config, &catalog).await;

    session.push_reads(reads(&[("E1", -75), ("E2", -50)]));
    assert!(wait_for(|| engine.store().len() == 1).await);

    assert!(engine.store().get("E1").is_none());
    assert_eq!(catalog.item_lookups(), 1);
    engine.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn read_ready_event_pulls_immediately() {
    let config = EngineConfig {
        poll_interval: Duration::from_secs(60),
        ..fast_config()
    };
    let (engine, session) = scanning_engine(config, &catalog()).await;
    // Let the poll task consume its immediate first tick.
    tokio::time::sleep(Duration::from_millis(50)).await;

    session.push_reads(reads(&[("E2", -42)]));
    session.notify_read_ready();

    assert!(wait_for(|| engine.store().get("E2").is_some()).await);
    engine.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn tag_stream_yields_growing_snapshots() {
    use futures_util::StreamExt;

    let (engine, session) = scanning_engine(fast_config(), &catalog()).await;
    let mut stream = engine.tags().into_stream();
    // The first item is the current (empty) snapshot.
    assert!(stream.next().await.unwrap().is_empty());

    session.push_reads(reads(&[("E1", -50)]));
    let first = tokio::time::timeout(Duration::from_secs(3), stream.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].epc, "E1");
    engine.shutdown().await;
}

// ── Staleness ───────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn silent_selected_tag_drops_to_floor() {
    let (engine, session) = scanning_engine(fast_config(), &catalog()).await;
    let selected = engine.selected_tag();

    session.push_reads(reads(&[("E1", -48), ("E2", -70)]));
    assert!(wait_for(|| engine.store().len() == 2).await);
    assert!(engine.select_tag("E1"));

    assert!(wait_for(|| engine.store().get("E1").is_some_and(|t| t.rssi == RSSI_FLOOR)).await);
    assert_eq!(
        selected.borrow().as_ref().map(|t| t.rssi),
        Some(RSSI_FLOOR)
    );
    // Unselected tags keep their last reading.
    assert_eq!(engine.store().get("E2").unwrap().rssi, -70);

    session.push_reads(reads(&[("E1", -44)]));
    assert!(wait_for(|| engine.store().get("E1").is_some_and(|t| t.rssi == -44)).await);
    engine.shutdown().await;
}

// ── Trigger ─────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn trigger_release_toggles_scanning() {
    let reader = SimulatedReader::new();
    let engine = engine_with(fast_config(), &reader, &catalog());
    engine.connect(None).await;
    let session = reader.session().unwrap();
    let mut toggles = engine.scan_toggles();
    let pressed = engine.trigger_pressed();

    session.set_trigger(true);
    assert!(wait_for(|| *pressed.borrow()).await);
    assert!(!engine.is_scanning());

    session.set_trigger(false);
    toggles.recv().await.unwrap();
    assert!(wait_for(|| engine.is_scanning()).await);
    assert!(session.inventory_running());

    session.set_trigger(true);
    session.set_trigger(false);
    toggles.recv().await.unwrap();
    assert!(wait_for(|| !engine.is_scanning()).await);
    assert!(toggles.try_recv().is_err());
    engine.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn trigger_survives_reconnect() {
    let reader = SimulatedReader::new();
    let engine = engine_with(fast_config(), &reader, &catalog());
    engine.connect(None).await;
    engine.disconnect().await;
    engine.connect(None).await;
    let mut toggles = engine.scan_toggles();

    let session = reader.session().unwrap();
    session.set_trigger(true);
    session.set_trigger(false);

    toggles.recv().await.unwrap();
    assert!(wait_for(|| engine.is_scanning()).await);
    engine.shutdown().await;
}
