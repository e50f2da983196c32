//! Quick benchmarks for development feedback.
//!
//! Run with:
//! ```
//! cargo bench --bench bench_quick
//! ```

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use labsync_rs::config::{ColumnConfig, PhaseConfig};
use labsync_rs::counter::{apply_decisions, compute_max_counters};
use labsync_rs::model::{AssignmentRecord, RemoteRecord};
use labsync_rs::payload::{COL_CLASS_LEVEL, LAB_INTEREST_COLUMNS};
use labsync_rs::reconcile::reconcile;
use labsync_rs::{DedupIndex, PushIdGenerator, RemoteId, SourceRow, SystemClock};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::hint::black_box;
use std::time::Duration;

const ROME: chrono_tz::Tz = chrono_tz::Europe::Rome;

fn timestamp(i: usize) -> String {
    format!("{:02}/10/2025 {:02}:{:02}:{:02}", 1 + i % 28, i % 24, (i / 24) % 60, i % 60)
}

fn request_rows(count: usize) -> Vec<SourceRow> {
    (0..count)
        .map(|i| {
            SourceRow::from_pairs(
                i,
                [
                    ("firebase_id".to_string(), String::new()),
                    ("Informazioni cronologiche".to_string(), timestamp(i)),
                    ("Indirizzo email".to_string(), format!("docente{i}@scuola.it")),
                    (COL_CLASS_LEVEL.to_string(), "Classe III".to_string()),
                    (LAB_INTEREST_COLUMNS[2].to_string(), "Robotica, Chimica".to_string()),
                ],
            )
        })
        .collect()
}

fn bench_push_ids(c: &mut Criterion) {
    let mut group = c.benchmark_group("quick/pushid");
    group.sample_size(20);
    group.warm_up_time(Duration::from_secs(1));
    group.measurement_time(Duration::from_secs(3));

    let count = 10_000u64;
    group.throughput(Throughput::Elements(count));
    group.bench_function(BenchmarkId::new("generate", count), |b| {
        let mut ids = PushIdGenerator::with_seed(SystemClock, 42);
        b.iter(|| {
            for _ in 0..count {
                black_box(ids.generate());
            }
        })
    });
    group.finish();
}

fn bench_reconcile(c: &mut Criterion) {
    let mut group = c.benchmark_group("quick/reconcile");
    group.sample_size(10);
    group.warm_up_time(Duration::from_secs(1));
    group.measurement_time(Duration::from_secs(3));

    let count = 2_000usize;
    let rows = request_rows(count);
    // Every other row already exists remotely.
    let remote: Vec<RemoteRecord> = (0..count)
        .step_by(2)
        .map(|i| RemoteRecord {
            id: RemoteId::new(format!("-Nremote{i:012}")),
            timestamp: Some(timestamp(i)),
            email: Some(format!("docente{i}@scuola.it")),
        })
        .collect();
    let columns = ColumnConfig::default();

    group.throughput(Throughput::Elements(count as u64));
    group.bench_function(BenchmarkId::new("rows", count), |b| {
        b.iter_batched(
            || PushIdGenerator::with_seed(SystemClock, 7),
            |mut ids| {
                let index = DedupIndex::build(&remote, ROME);
                black_box(reconcile(&rows, &index, &columns, &mut ids))
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

fn bench_counters(c: &mut Criterion) {
    let mut group = c.benchmark_group("quick/counters");
    group.sample_size(10);
    group.warm_up_time(Duration::from_secs(1));
    group.measurement_time(Duration::from_secs(3));

    let mut rng = StdRng::seed_from_u64(42);
    let decisions = ["NO", "SI", "PROPOSTA DA ELABORARE", "NO"];
    let tags = ["", "", "FASE 1", "ALTA DOMANDA", "FASE 2"];
    let groups = 300usize;

    let history: Vec<AssignmentRecord> = (0..5_000)
        .map(|i| AssignmentRecord {
            group_id: format!("G{}", rng.random_range(0..groups)),
            decision: decisions[rng.random_range(0..decisions.len())].to_string(),
            subject_name: format!("Laboratorio {}", i % 40),
            timeslot: timestamp(i),
            rejection_counter: rng.random_range(0..5),
        })
        .collect();
    let rows: Vec<SourceRow> = (0..2_000usize)
        .map(|i| {
            SourceRow::from_pairs(
                i,
                [
                    ("firebase_id".to_string(), format!("G{}", rng.random_range(0..groups))),
                    (
                        "Proposta accettata".to_string(),
                        decisions[rng.random_range(0..decisions.len())].to_string(),
                    ),
                    ("Nome laboratorio proposto/accettato".to_string(), format!("Laboratorio {}", i % 40)),
                    ("Data e ora proposta/accettata".to_string(), timestamp(i + 7)),
                    ("consiglio AI".to_string(), tags[rng.random_range(0..tags.len())].to_string()),
                ],
            )
        })
        .collect();
    let columns = ColumnConfig::default();
    let phases = PhaseConfig::default();

    group.throughput(Throughput::Elements(rows.len() as u64));
    group.bench_function(BenchmarkId::new("scan_and_fold", rows.len()), |b| {
        b.iter_batched(
            || PushIdGenerator::with_seed(SystemClock, 9),
            |mut ids| {
                let scan = compute_max_counters(&history);
                black_box(apply_decisions(&rows, scan, &columns, &phases, &mut ids))
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

criterion_group!(benches, bench_push_ids, bench_reconcile, bench_counters);
criterion_main!(benches);
