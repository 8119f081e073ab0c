#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::mpsc::{self, Receiver, Sender};

use mapstat_terminal::analysis::{AnalysisProgress, Analyzer, TacticalAnalyzer};
use mapstat_terminal::coordinator::{DependentGate, MatchSupply, RenderTrigger};
use mapstat_terminal::error::AnalysisError;
use mapstat_terminal::model::{
    KillRecord, MatchBatch, MatchPlayer, MatchRecord, PlayerIdentity, RoundRecord, Team,
};
use mapstat_terminal::store::StatsTable;

/// Records every collaborator callback in call order.
#[derive(Debug, Default)]
pub struct Recorder {
    pub calls: Vec<String>,
}

impl RenderTrigger for Recorder {
    fn refresh(&mut self) {
        self.calls.push("refresh".to_string());
    }
}

impl DependentGate for Recorder {
    fn unlock(&mut self) {
        self.calls.push("unlock".to_string());
    }
}

impl MatchSupply for Recorder {
    fn release_transient_payload(&mut self, player: &PlayerIdentity) {
        self.calls.push(format!("release:{player}"));
    }
}

/// Runs the real analyzer once the test opens the gate.
pub struct GatedAnalyzer {
    open: Mutex<Receiver<()>>,
}

impl GatedAnalyzer {
    pub fn new() -> (Self, Sender<()>) {
        let (tx, rx) = mpsc::channel();
        (Self { open: Mutex::new(rx) }, tx)
    }
}

impl Analyzer for GatedAnalyzer {
    fn analyze(
        &self,
        batch: &MatchBatch,
        player: &PlayerIdentity,
        on_progress: &mut dyn FnMut(AnalysisProgress),
    ) -> Result<StatsTable, AnalysisError> {
        let _ = self.open.lock().unwrap().recv();
        TacticalAnalyzer.analyze(batch, player, on_progress)
    }
}

pub struct FailingAnalyzer;

impl Analyzer for FailingAnalyzer {
    fn analyze(
        &self,
        batch: &MatchBatch,
        _player: &PlayerIdentity,
        _on_progress: &mut dyn FnMut(AnalysisProgress),
    ) -> Result<StatsTable, AnalysisError> {
        Err(AnalysisError::NoUsableMatches {
            skipped: batch.len(),
        })
    }
}

pub struct PanickingAnalyzer;

impl Analyzer for PanickingAnalyzer {
    fn analyze(
        &self,
        _batch: &MatchBatch,
        _player: &PlayerIdentity,
        _on_progress: &mut dyn FnMut(AnalysisProgress),
    ) -> Result<StatsTable, AnalysisError> {
        panic!("analysis blew up");
    }
}

fn kill(killer: &str, victim: &str, zone: &str) -> KillRecord {
    KillRecord {
        killer: PlayerIdentity::new(killer),
        victim: PlayerIdentity::new(victim),
        zone: Some(zone.to_string()),
        round_time_ms: 10_000,
    }
}

/// Three first-half rounds with `player` on Red (attacking): won, lost, won.
/// The player gets one kill at `a-site` and dies once at `mid`.
pub fn three_round_match(id: usize, map_id: &str, player: &str) -> MatchRecord {
    MatchRecord {
        match_id: format!("m{id}"),
        map_id: map_id.to_string(),
        started_at: 1_700_000_000_000 + id as i64,
        players: vec![
            MatchPlayer {
                player: PlayerIdentity::new(player),
                team: Team::Red,
            },
            MatchPlayer {
                player: PlayerIdentity::new("X"),
                team: Team::Blue,
            },
        ],
        rounds: vec![
            RoundRecord {
                winning_team: Team::Red,
                kills: vec![kill(player, "X", "a-site")],
            },
            RoundRecord {
                winning_team: Team::Blue,
                kills: vec![kill("X", player, "mid")],
            },
            RoundRecord {
                winning_team: Team::Red,
                kills: Vec::new(),
            },
        ],
        winning_team: Some(Team::Red),
    }
}

pub fn batch_of(count: usize, map_id: &str, player: &str) -> MatchBatch {
    MatchBatch::new(
        (0..count)
            .map(|i| three_round_match(i, map_id, player))
            .collect(),
    )
}
