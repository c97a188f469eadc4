//! Behaviour shared by every `ZoneStore` implementation.

use chrono::{Duration, Utc};

use super::{MemoryStore, SqliteStore, StoreError, ZoneStore};
use crate::decision::{self, DecisionMode};
use crate::reading::{LatestReading, Reading, SensorReport};
use crate::zone::{DEFAULT_TARGET_MOISTURE, Zone, ZoneId, ZoneSettings};

fn seeds() -> Vec<Zone> {
    ["Ginger", "Large Cardamom", "Mandarin Orange", "Ginger"]
        .iter()
        .zip(1..)
        .map(|(crop, id)| Zone::new(ZoneId(id), *crop, DEFAULT_TARGET_MOISTURE))
        .collect()
}

async fn memory_store() -> MemoryStore {
    let store = MemoryStore::new();
    store.ensure_zones(&seeds()).await.unwrap();
    store
}

async fn sqlite_store() -> SqliteStore {
    let store = SqliteStore::open_in_memory().await.unwrap();
    store.ensure_zones(&seeds()).await.unwrap();
    store
}

fn report(soil_moisture: f64, temperature: f64) -> SensorReport {
    SensorReport {
        temperature,
        humidity: 55.0,
        soil_moisture,
        is_raining: false,
    }
}

fn reading(zone: u32, soil_moisture: f64) -> Reading {
    Reading::from_report(ZoneId(zone), &report(soil_moisture, 25.0), Utc::now())
}

async fn submit<S: ZoneStore>(store: &S, zone: u32, r: SensorReport) -> decision::PumpDecision {
    store
        .commit_report(
            Reading::from_report(ZoneId(zone), &r, Utc::now()),
            move |z| decision::decide(&r, z.manual_pending, DecisionMode::AutoOrManual),
        )
        .await
        .unwrap()
}

// === Checks, run against both stores ===

async fn check_seeded_zones<S: ZoneStore>(store: S) {
    let zones = store.list_zones().await.unwrap();
    assert_eq!(zones.len(), 4);
    assert_eq!(zones[0].id, ZoneId(1));
    assert_eq!(zones[1].crop, "Large Cardamom");
    assert!(zones.iter().all(|z| !z.manual_pending));
    assert!(zones.iter().all(|z| z.target_moisture == DEFAULT_TARGET_MOISTURE));
}

async fn check_ensure_zones_keeps_existing_state<S: ZoneStore>(store: S) {
    store
        .update_settings(
            ZoneId(1),
            &ZoneSettings {
                crop: Some("Turmeric".into()),
                target_moisture: None,
            },
        )
        .await
        .unwrap();
    store.ensure_zones(&seeds()).await.unwrap();
    assert_eq!(store.get_zone(ZoneId(1)).await.unwrap().crop, "Turmeric");
}

async fn check_fresh_zone_latest_is_default<S: ZoneStore>(store: S) {
    let latest = store.get_latest(ZoneId(3)).await.unwrap();
    assert_eq!(latest, LatestReading::default());
}

async fn check_unknown_zone_is_not_found<S: ZoneStore>(store: S) {
    assert!(matches!(
        store.get_zone(ZoneId(9)).await,
        Err(StoreError::ZoneNotFound(ZoneId(9)))
    ));
    assert!(matches!(
        store.get_latest(ZoneId(9)).await,
        Err(StoreError::ZoneNotFound(_))
    ));
    assert!(matches!(
        store.set_manual_pending(ZoneId(9), 0).await,
        Err(StoreError::ZoneNotFound(_))
    ));
    assert!(matches!(
        store.append(reading(9, 40.0)).await,
        Err(StoreError::ZoneNotFound(_))
    ));
    let res = store
        .commit_report(reading(9, 40.0), |_| unreachable!("decision must not run"))
        .await;
    assert!(matches!(res, Err(StoreError::ZoneNotFound(_))));
}

async fn check_latest_is_max_timestamp<S: ZoneStore>(store: S) {
    let now = Utc::now();
    let mut newest = reading(2, 33.0);
    newest.recorded_at = now;
    let mut older = reading(2, 11.0);
    older.recorded_at = now - Duration::seconds(30);

    store.append(newest).await.unwrap();
    store.append(older).await.unwrap();

    let latest = store.get_latest(ZoneId(2)).await.unwrap();
    assert_eq!(latest.soil_moisture, 33.0);
    assert_eq!(
        latest.recorded_at.map(|t| t.timestamp_millis()),
        Some(now.timestamp_millis())
    );
    // Other zones are untouched.
    assert_eq!(
        store.get_latest(ZoneId(1)).await.unwrap(),
        LatestReading::default()
    );
}

async fn check_timestamp_tie_prefers_later_insert<S: ZoneStore>(store: S) {
    let at = Utc::now();
    let mut first = reading(1, 10.0);
    first.recorded_at = at;
    let mut second = reading(1, 20.0);
    second.recorded_at = at;
    store.append(first).await.unwrap();
    store.append(second).await.unwrap();
    assert_eq!(store.get_latest(ZoneId(1)).await.unwrap().soil_moisture, 20.0);
}

async fn check_manual_request_is_idempotent<S: ZoneStore>(store: S) {
    let zone = store.set_manual_pending(ZoneId(4), 3).await.unwrap();
    assert!(zone.manual_pending);
    let zone = store.set_manual_pending(ZoneId(4), 3).await.unwrap();
    assert!(zone.manual_pending);
    assert_eq!(zone.manual_water_level, 3);
    // Does not produce a reading.
    assert_eq!(
        store.get_latest(ZoneId(4)).await.unwrap(),
        LatestReading::default()
    );
}

async fn check_commit_report_consumes_manual_flag_once<S: ZoneStore>(store: S) {
    store.set_manual_pending(ZoneId(1), 0).await.unwrap();

    // Moderate and hot: automatic rules say no, manual request forces it.
    let first = submit(&store, 1, report(45.0, 50.0)).await;
    assert!(first.pump_on);
    assert!(first.manual_consumed);
    assert!(!store.get_zone(ZoneId(1)).await.unwrap().manual_pending);

    let second = submit(&store, 1, report(45.0, 50.0)).await;
    assert!(!second.pump_on);
    assert!(!second.manual_consumed);

    let latest = store.get_latest(ZoneId(1)).await.unwrap();
    assert_eq!(latest.soil_moisture, 45.0);
    assert_eq!(latest.temperature, 50.0);
}

async fn check_manual_flag_cleared_even_when_auto_waters<S: ZoneStore>(store: S) {
    store.set_manual_pending(ZoneId(2), 0).await.unwrap();
    let d = submit(&store, 2, report(25.0, 35.0)).await;
    assert!(d.pump_on);
    assert!(d.manual_consumed);
    assert!(!store.get_zone(ZoneId(2)).await.unwrap().manual_pending);
}

async fn check_update_settings<S: ZoneStore>(store: S) {
    let zone = store
        .update_settings(
            ZoneId(3),
            &ZoneSettings {
                crop: Some(" Cardamom ".into()),
                target_moisture: Some(42.5),
            },
        )
        .await
        .unwrap();
    assert_eq!(zone.crop, "Cardamom");
    assert_eq!(zone.target_moisture, 42.5);

    let zone = store
        .update_settings(
            ZoneId(3),
            &ZoneSettings {
                crop: None,
                target_moisture: Some(60.0),
            },
        )
        .await
        .unwrap();
    assert_eq!(zone.crop, "Cardamom");
    assert_eq!(zone.target_moisture, 60.0);
}

async fn check_reset_restores_seeds<S: ZoneStore>(store: S) {
    store.set_manual_pending(ZoneId(1), 7).await.unwrap();
    store.append(reading(1, 12.0)).await.unwrap();
    store
        .update_settings(
            ZoneId(2),
            &ZoneSettings {
                crop: Some("Rice".into()),
                target_moisture: Some(80.0),
            },
        )
        .await
        .unwrap();

    store.reset(&seeds()).await.unwrap();

    assert_eq!(store.list_zones().await.unwrap(), seeds());
    assert_eq!(
        store.get_latest(ZoneId(1)).await.unwrap(),
        LatestReading::default()
    );
}

macro_rules! store_tests {
    ($($name:ident),* $(,)?) => {
        mod memory {
            $(
                #[tokio::test]
                async fn $name() {
                    super::$name(super::memory_store().await).await;
                }
            )*
        }

        mod sqlite {
            $(
                #[tokio::test]
                async fn $name() {
                    super::$name(super::sqlite_store().await).await;
                }
            )*
        }
    };
}

store_tests!(
    check_seeded_zones,
    check_ensure_zones_keeps_existing_state,
    check_fresh_zone_latest_is_default,
    check_unknown_zone_is_not_found,
    check_latest_is_max_timestamp,
    check_timestamp_tie_prefers_later_insert,
    check_manual_request_is_idempotent,
    check_commit_report_consumes_manual_flag_once,
    check_manual_flag_cleared_even_when_auto_waters,
    check_update_settings,
    check_reset_restores_seeds,
);

// === Store-specific ===

#[tokio::test]
async fn memory_manual_request_during_report_survives_for_next_cycle() {
    let store = memory_store().await;
    let writer = store.clone();

    // The decision closure runs while the zone slot is locked; a manual
    // request spawned from inside it has to wait for the commit.
    let (tx, rx) = tokio::sync::oneshot::channel();
    let r = report(45.0, 50.0);
    let decision = store
        .commit_report(
            Reading::from_report(ZoneId(1), &r, Utc::now()),
            move |z| {
                let handle = tokio::spawn(async move {
                    writer.set_manual_pending(ZoneId(1), 0).await.unwrap();
                });
                let _ = tx.send(handle);
                decision::decide(&r, z.manual_pending, DecisionMode::AutoOrManual)
            },
        )
        .await
        .unwrap();
    assert!(!decision.pump_on);

    rx.await.unwrap().await.unwrap();
    assert!(store.get_zone(ZoneId(1)).await.unwrap().manual_pending);

    let next = submit(&store, 1, report(45.0, 50.0)).await;
    assert!(next.pump_on);
    assert!(!store.get_zone(ZoneId(1)).await.unwrap().manual_pending);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn memory_zones_do_not_block_each_other() {
    let store = memory_store().await;
    let (locked_tx, locked_rx) = tokio::sync::oneshot::channel();
    let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();

    let writer = store.clone();
    let r = report(25.0, 30.0);
    let report_task = tokio::spawn(async move {
        writer
            .commit_report(
                Reading::from_report(ZoneId(1), &r, Utc::now()),
                move |z| {
                    let _ = locked_tx.send(());
                    // Hold zone 1 until zone 2 has been read.
                    let _ = release_rx.recv();
                    decision::decide(&r, z.manual_pending, DecisionMode::AutoOnly)
                },
            )
            .await
    });

    locked_rx.await.unwrap();
    let zone2 = store.get_zone(ZoneId(2)).await.unwrap();
    assert_eq!(zone2.crop, "Large Cardamom");
    release_tx.send(()).unwrap();

    assert!(report_task.await.unwrap().unwrap().pump_on);
    assert_eq!(store.reading_count(ZoneId(1)).await.unwrap(), 1);
}

#[tokio::test]
async fn sqlite_concurrent_reports_and_requests_are_not_lost() {
    let store = sqlite_store().await;
    let mut handles = Vec::new();
    for zone in 1..=4 {
        let s = store.clone();
        handles.push(tokio::spawn(async move {
            s.set_manual_pending(ZoneId(zone), 0).await.unwrap();
            submit(&s, zone, report(45.0, 50.0)).await
        }));
    }
    for handle in handles {
        let decision = handle.await.unwrap();
        assert!(decision.pump_on);
    }
    for zone in 1..=4 {
        assert_eq!(store.reading_count(ZoneId(zone)).await.unwrap(), 1);
        assert!(!store.get_zone(ZoneId(zone)).await.unwrap().manual_pending);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sqlite_manual_request_during_report_survives_for_next_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(&dir.path().join("zones.db")).await.unwrap();
    store.ensure_zones(&seeds()).await.unwrap();
    let writer = store.clone();

    // The request runs on its own pooled connection and has to wait for the
    // report transaction to commit.
    let (tx, rx) = tokio::sync::oneshot::channel();
    let r = report(45.0, 50.0);
    let decision = store
        .commit_report(
            Reading::from_report(ZoneId(1), &r, Utc::now()),
            move |z| {
                let handle = tokio::spawn(async move {
                    writer.set_manual_pending(ZoneId(1), 0).await.unwrap();
                });
                let _ = tx.send(handle);
                std::thread::sleep(std::time::Duration::from_millis(100));
                decision::decide(&r, z.manual_pending, DecisionMode::AutoOrManual)
            },
        )
        .await
        .unwrap();
    assert!(!decision.pump_on);

    rx.await.unwrap().await.unwrap();
    assert!(store.get_zone(ZoneId(1)).await.unwrap().manual_pending);

    let next = submit(&store, 1, report(45.0, 50.0)).await;
    assert!(next.pump_on);
    assert!(!store.get_zone(ZoneId(1)).await.unwrap().manual_pending);
    assert_eq!(store.reading_count(ZoneId(1)).await.unwrap(), 2);
}

#[tokio::test]
async fn sqlite_file_store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("zones.db");
    {
        let store = SqliteStore::open(&path).await.unwrap();
        store.ensure_zones(&seeds()).await.unwrap();
        submit(&store, 3, report(18.0, 44.0)).await;
        store.set_manual_pending(ZoneId(3), 2).await.unwrap();
        store.pool().close().await;
    }
    let store = SqliteStore::open(&path).await.unwrap();
    store.ensure_zones(&seeds()).await.unwrap();
    let latest = store.get_latest(ZoneId(3)).await.unwrap();
    assert_eq!(latest.soil_moisture, 18.0);
    assert!(latest.recorded_at.is_some());
    assert!(store.get_zone(ZoneId(3)).await.unwrap().manual_pending);
}
