use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::model::{MapAnalytics, MapSideStats, PlayerIdentity, Side};

/// Full result of one analysis pass. Written to the store as a unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsTable {
    pub batch_id: u64,
    pub player: Option<PlayerIdentity>,
    pub sides: HashMap<(String, Side), MapSideStats>,
    pub maps: HashMap<String, MapAnalytics>,
}

impl StatsTable {
    pub fn new(batch_id: u64, player: PlayerIdentity) -> Self {
        Self {
            batch_id,
            player: Some(player),
            ..Self::default()
        }
    }

    pub fn insert(&mut self, map_id: impl Into<String>, side: Side, stats: MapSideStats) {
        self.sides.insert((map_id.into(), side), stats);
    }

    pub fn get(&self, map_id: &str, side: Side) -> Option<&MapSideStats> {
        self.sides.get(&(map_id.to_string(), side))
    }

    pub fn len(&self) -> usize {
        self.sides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sides.is_empty()
    }
}

/// Latest full set of per-map, per-side stats.
///
/// Readers load the current snapshot pointer and never block the writer;
/// `write_all` swaps in a new snapshot, so a reader sees either the old table
/// or the new one, never a mix.
#[derive(Default)]
pub struct AnalysisStore {
    current: ArcSwapOption<StatsTable>,
}

impl AnalysisStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_all(&self, table: StatsTable) {
        self.current.store(Some(Arc::new(table)));
    }

    pub fn query(&self, map_id: &str, side: Side) -> Option<MapSideStats> {
        let guard = self.current.load();
        (*guard).as_ref()?.get(map_id, side).cloned()
    }

    pub fn map_analytics(&self, map_id: &str) -> Option<MapAnalytics> {
        let guard = self.current.load();
        (*guard).as_ref()?.maps.get(map_id).cloned()
    }

    /// Whole table as of now; holding it does not delay later writes.
    pub fn snapshot(&self) -> Option<Arc<StatsTable>> {
        self.current.load_full()
    }

    pub fn has_analysis(&self) -> bool {
        self.current.load().is_some()
    }

    /// Map ids present in the current table, sorted.
    pub fn maps(&self) -> Vec<String> {
        let Some(table) = self.snapshot() else {
            return Vec::new();
        };
        let mut ids: Vec<String> = table.maps.keys().cloned().collect();
        ids.sort();
        ids
    }
}
