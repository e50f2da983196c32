#[path = "../src/test_support.rs"]
mod test_support;

use labsync_rs::{
    LabSync, MemoryStore, PushIdGenerator, RemoteStore, Sheet, SyncConfig, SyncError,
    TabularSource,
};
use serde_json::json;
use test_support::{request_row, request_sheet, ManualClock};

const OCT_16_2025: u64 = 1_760_616_000_000;

fn labsync(store: MemoryStore) -> anyhow::Result<LabSync<MemoryStore, ManualClock>> {
    let ids = PushIdGenerator::with_seed(ManualClock::at(OCT_16_2025), 11);
    Ok(LabSync::with_generator(store, SyncConfig::default(), ids)?)
}

#[test]
fn three_new_rows_get_three_sortable_ids() -> anyhow::Result<()> {
    let mut sheet = request_sheet(
        "Adesioni primarie",
        &[
            request_row("16/10/2025 10:00:00", "a@scuola.it", "Classe I", "Robotica"),
            request_row("16/10/2025 10:05:00", "b@scuola.it", "Classe II", "Chimica, Fisica"),
            request_row("16/10/2025 10:10:00", "c@scuola.it", "Classe III", "Astronomia"),
        ],
    );
    let mut sync = labsync(MemoryStore::new())?;

    let summary = sync.sync_requests(&mut sheet)?;
    assert_eq!(summary.created, 3);
    assert_eq!(summary.updated, 0);

    let ids: Vec<String> = sheet
        .rows()
        .iter()
        .map(|row| row.text("firebase_id").unwrap_or_default().to_string())
        .collect();
    assert_eq!(ids.len(), 3);
    assert!(ids.iter().all(|id| id.len() == 20));
    assert!(ids[0] < ids[1] && ids[1] < ids[2]);

    let store = sync.store();
    assert_eq!(store.child_count("richiesteprimarie"), 3);
    let stored = store
        .get(&format!("richiesteprimarie/{}", ids[1]))?
        .expect("record written");
    assert_eq!(stored["email"], "b@scuola.it");
    assert_eq!(stored["laboratori_richiesti"], json!(["Chimica", "Fisica"]));
    Ok(())
}

#[test]
fn second_run_writes_nothing() -> anyhow::Result<()> {
    let mut sheet = request_sheet(
        "Adesioni primarie",
        &[
            request_row("16/10/2025 10:00:00", "a@scuola.it", "Classe I", "Robotica"),
            request_row("16/10/2025 10:05:00", "b@scuola.it", "Classe II", "Chimica"),
        ],
    );
    let mut sync = labsync(MemoryStore::new())?;
    sync.sync_requests(&mut sheet)?;
    let writes = sync.store().write_count();
    let snapshot = sheet.clone();

    let summary = sync.sync_requests(&mut sheet)?;
    assert_eq!(summary.created, 0);
    assert_eq!(summary.updated, 0);
    assert_eq!(summary.skipped, 2);
    assert_eq!(sync.store().write_count(), writes);
    assert_eq!(sheet, snapshot);
    Ok(())
}

#[test]
fn lost_local_id_is_relinked_without_remote_write() -> anyhow::Result<()> {
    let remote = MemoryStore::with_root(json!({
        "richiestesecondarie": {
            "-Nexisting0000000000": {
                "timestamp": "2025-10-16T08:00:00.000Z",
                "email": "a@scuola.it",
                "classe_livello": "Classe I"
            }
        }
    }));
    let mut sheet = request_sheet(
        "Adesioni primarie",
        &[request_row("16/10/2025 10:00:00", " a@scuola.it ", "Classe I", "Robotica")],
    );
    let mut sync = labsync(remote)?;

    let summary = sync.sync_requests(&mut sheet)?;
    assert_eq!(summary.created, 0);
    assert_eq!(summary.updated, 1);
    assert_eq!(sync.store().write_count(), 0);
    assert_eq!(sheet.rows()[0].text("firebase_id"), Some("-Nexisting0000000000"));
    Ok(())
}

#[test]
fn secondary_sources_route_to_secondary_node() -> anyhow::Result<()> {
    let mut sheet = request_sheet(
        "Adesioni SECONDO GRADO 2025",
        &[request_row("16/10/2025 10:00:00", "a@liceo.it", "Classe IV", "Robotica")],
    );
    let mut sync = labsync(MemoryStore::new())?;
    sync.sync_requests(&mut sheet)?;
    assert_eq!(sync.store().child_count("richiestesecondarie"), 1);
    assert_eq!(sync.store().child_count("richiesteprimarie"), 0);
    Ok(())
}

#[test]
fn drafts_are_skipped_not_errors() -> anyhow::Result<()> {
    let mut sheet = request_sheet(
        "Adesioni primarie",
        &[
            request_row("16/10/2025 10:00:00", "", "Classe I", "Robotica"),
            request_row("16/10/2025 10:00:00", "a@scuola.it", "", "Robotica"),
        ],
    );
    let mut sync = labsync(MemoryStore::new())?;
    let summary = sync.sync_requests(&mut sheet)?;
    assert_eq!(summary.created, 0);
    assert_eq!(summary.skipped, 2);
    assert_eq!(sync.store().write_count(), 0);
    Ok(())
}

#[test]
fn missing_id_column_aborts_before_any_write() -> anyhow::Result<()> {
    let mut sheet = Sheet::new(
        "Adesioni primarie",
        vec!["Indirizzo email".to_string()],
        vec![vec!["a@scuola.it".to_string()]],
    );
    let mut sync = labsync(MemoryStore::new())?;
    let err = sync.sync_requests(&mut sheet).unwrap_err();
    assert!(matches!(err, SyncError::Schema { .. }));
    assert_eq!(sync.store().write_count(), 0);
    Ok(())
}

#[test]
fn ids_round_trip_through_csv_file() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("Adesioni primarie.csv");
    request_sheet(
        "ignored",
        &[request_row("16/10/2025 10:00:00", "a@scuola.it", "Classe I", "Robotica")],
    )
    .save_csv(&path)?;

    let mut sheet = Sheet::from_csv_path(&path)?;
    assert_eq!(sheet.name(), "Adesioni primarie");
    let mut sync = labsync(MemoryStore::new())?;
    sync.sync_requests(&mut sheet)?;
    sheet.save_csv(&path)?;

    let reread = Sheet::from_csv_path(&path)?;
    let id = reread.rows()[0]
        .text("firebase_id")
        .map(str::to_string)
        .unwrap_or_default();
    assert!(sync.store().get(&format!("richiesteprimarie/{id}"))?.is_some());
    Ok(())
}

#[test]
fn link_ids_repairs_only() -> anyhow::Result<()> {
    let remote = MemoryStore::with_root(json!({
        "richiesteprimarie": {
            "-Nknown0000000000000": {"timestamp": "16/10/2025 10:00:00", "email": "a@scuola.it"}
        }
    }));
    let mut sheet = request_sheet(
        "Adesioni primarie",
        &[
            request_row("16/10/2025 10:00:00", "a@scuola.it", "", ""),
            request_row("16/10/2025 11:00:00", "b@scuola.it", "Classe I", "Robotica"),
        ],
    );
    let mut sync = labsync(remote)?;
    let summary = sync.link_request_ids(&mut sheet)?;
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(sync.store().write_count(), 0);
    assert_eq!(sheet.rows()[0].text("firebase_id"), Some("-Nknown0000000000000"));
    assert_eq!(sheet.rows()[1].text("firebase_id"), None);
    Ok(())
}

#[test]
fn submit_and_repopulate() -> anyhow::Result<()> {
    let mut sync = labsync(MemoryStore::with_root(json!({
        "richiesteprimarie": {"stale": {"email": "old@scuola.it"}}
    })))?;

    let sheet = request_sheet(
        "Adesioni primarie",
        &[
            request_row("", "a@scuola.it", "Classe I", "Robotica"),
            request_row("16/10/2025 10:00:00", "b@scuola.it", "Classe II", ""),
            request_row("16/10/2025 10:05:00", "c@scuola.it", "", "Robotica"),
        ],
    );

    let posted = sync.submit_request("Adesioni primarie", &sheet.rows()[0])?;
    let posted = posted.expect("submission stored");
    let record = sync
        .store()
        .get(&format!("richiesteprimarie/{posted}"))?
        .expect("posted record");
    assert_eq!(record["timestamp"], "2025-10-16T12:00:00.000Z");

    let summary = sync.repopulate(&sheet, "richiesteprimarie")?;
    assert_eq!(summary.created, 1);
    assert_eq!(summary.skipped, 2);
    assert_eq!(sync.store().child_count("richiesteprimarie"), 1);
    assert!(sync.store().get("richiesteprimarie/stale")?.is_none());
    Ok(())
}
