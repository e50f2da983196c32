#[path = "../src/test_support.rs"]
mod test_support;

use labsync_rs::{CellColor, LabSync, MemoryStore, SyncConfig, SyncError, TabularSource};
use serde_json::json;
use test_support::slot_sheet;

fn store() -> MemoryStore {
    MemoryStore::with_root(json!({
        "assegnazioni_primarie": {
            "-a1": {"proposta_accettata": "proposta da elaborare", "nome_lab": "Robotica per tutti",
                    "data_lab": "30/10/2025 09:00:00"},
            "-a2": {"proposta_accettata": "SI", "nome_lab": "robotica  per tutti",
                    "data_lab": "'30/10/2025 9:00"},
            "-a3": {"proposta_accettata": "NO", "nome_lab": "Chimica",
                    "data_lab": "31/10/2025 09:00:00"}
        },
        "risultati_assegnazione_primarie": {
            "2025-10-01T08:00:00": {
                "p1": {"labAssegnato": "Astronomia", "dataAssegnata": "05/11/2025 11:00:00"}
            },
            "2025-10-20T08:00:00": {
                "p1": {"labAssegnato": "Robotica per tutti", "dataAssegnata": "30/10/2025 09:00:00"},
                "p2": {"labAssegnato": "Chimica", "dataAssegnata": "31/10/2025 09:00:00"}
            }
        }
    }))
}

#[test]
fn confirmed_wins_and_fuzzy_subjects_match() -> anyhow::Result<()> {
    let display = slot_sheet(
        "Date ricercatori",
        3,
        &[
            (
                "Robotica per tutti (edizione 2025)",
                "Atrio",
                &["30/10/2025 09:00", "30/10/2025 10:00", ""],
            ),
            ("Chimica in cucina", "Laboratorio 2", &["31/10/2025 09:00:00"]),
            ("Astronomia", "Cortile", &["05/11/2025 11:00:00"]),
            ("", "", &["30/10/2025 09:00"]),
        ],
    );
    let sync = LabSync::new(store(), SyncConfig::default())?;
    let grid = sync.status_grid(&display)?;

    // Columns: subject, meeting point, 1° data, 2° data, 3° data
    assert_eq!(grid.cell(0, 2), Some(CellColor::Confirmed));
    assert_eq!(grid.cell(0, 3), Some(CellColor::Neutral));
    assert_eq!(grid.cell(0, 4), Some(CellColor::Neutral));
    assert_eq!(grid.cell(0, 1), None);
    // NO contributes nothing; the latest proposal batch marks it pending.
    assert_eq!(grid.cell(1, 2), Some(CellColor::Pending));
    // Only the latest batch is read.
    assert_eq!(grid.cell(2, 2), Some(CellColor::Neutral));
    assert_eq!(grid.cell(3, 2), None);
    assert_eq!(grid.colored(), 2);
    Ok(())
}

#[test]
fn grid_renders_hex_colors() -> anyhow::Result<()> {
    let display = slot_sheet(
        "Date ricercatori",
        1,
        &[("Robotica per tutti", "Atrio", &["30/10/2025 09:00:00"])],
    );
    let sync = LabSync::new(store(), SyncConfig::default())?;
    let colors = sync.status_grid(&display)?.to_sheet("colori");
    let rows = colors.rows();
    let row = &rows[0];
    assert_eq!(row.values()[0], "");
    assert_eq!(row.values()[2], "#90ee90");
    assert_eq!(colors.headers()[2], "1° data");
    Ok(())
}

#[test]
fn empty_feeds_leave_neutral_cells() -> anyhow::Result<()> {
    let display = slot_sheet("Date", 1, &[("Robotica", "", &["30/10/2025 09:00:00"])]);
    let sync = LabSync::new(MemoryStore::new(), SyncConfig::default())?;
    let grid = sync.status_grid(&display)?;
    assert_eq!(grid.cell(0, 2), Some(CellColor::Neutral));
    assert_eq!(grid.colored(), 0);
    Ok(())
}

#[test]
fn display_without_slot_columns_is_rejected() -> anyhow::Result<()> {
    let display = labsync_rs::Sheet::new("Date", vec!["Titolo".to_string()], vec![]);
    let sync = LabSync::new(MemoryStore::new(), SyncConfig::default())?;
    let err = sync.status_grid(&display).unwrap_err();
    assert!(matches!(err, SyncError::Schema { .. }));
    Ok(())
}
