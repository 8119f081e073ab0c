use std::sync::{Arc, Barrier};
use std::thread;

use mapstat_terminal::model::{MapSideStats, PlayerIdentity, Side};
use mapstat_terminal::store::{AnalysisStore, StatsTable};

const MAPS: &[&str] = &["ascent", "bind", "haven", "split"];

fn table(batch_id: u64) -> StatsTable {
    let mut table = StatsTable::new(batch_id, PlayerIdentity::new("P1"));
    for map in MAPS {
        for side in Side::ALL {
            table.insert(
                *map,
                side,
                MapSideStats {
                    matches: batch_id as u32,
                    ..MapSideStats::default()
                },
            );
        }
    }
    table
}

#[test]
fn readers_never_see_a_mixed_table() {
    let store = Arc::new(AnalysisStore::new());
    store.write_all(table(1));
    let barrier = Arc::new(Barrier::new(5));

    let writer = {
        let store = Arc::clone(&store);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            for i in 0..500u64 {
                store.write_all(table(1 + i % 2));
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..500 {
                    let snapshot = store.snapshot().expect("store was seeded");
                    let expected = snapshot.batch_id as u32;
                    assert!(
                        snapshot.sides.values().all(|s| s.matches == expected),
                        "snapshot {} mixes batches",
                        snapshot.batch_id
                    );
                    let single = store.query("bind", Side::Defense).expect("key always present");
                    assert!(single.matches == 1 || single.matches == 2);
                }
            })
        })
        .collect();

    writer.join().expect("writer should not panic");
    for reader in readers {
        reader.join().expect("reader should not panic");
    }
}

#[test]
fn repeated_queries_without_writes_are_identical() {
    let store = AnalysisStore::new();
    store.write_all(table(2));
    let first = store.query("haven", Side::Attack);
    let second = store.query("haven", Side::Attack);
    assert!(first.is_some());
    assert_eq!(first, second);
}

#[test]
fn snapshot_survives_later_writes() {
    let store = AnalysisStore::new();
    store.write_all(table(1));
    let held = store.snapshot().expect("table written");
    store.write_all(table(2));
    assert_eq!(held.batch_id, 1);
    assert_eq!(store.snapshot().map(|t| t.batch_id), Some(2));
    assert_eq!(held.len(), MAPS.len() * 2);
}
