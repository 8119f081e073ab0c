use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::{Duration as ChronoDuration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::coordinator::MatchSupply;
use crate::model::{
    KNOWN_MAPS, KillRecord, MatchBatch, MatchPlayer, MatchRecord, PlayerIdentity, ROUNDS_PER_HALF,
    RoundRecord, Team,
};

const DEMO_ZONES: &[&str] = &["a-site", "a-main", "mid", "b-main", "b-site", "spawn"];
const DEMO_ROUND_CAP: usize = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchHistoryFile {
    pub player: PlayerIdentity,
    #[serde(default)]
    pub matches: Vec<MatchRecord>,
}

/// What stays on the general tab after round detail is released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSummary {
    pub match_id: String,
    pub map_id: String,
    pub started_at: i64,
    pub rounds: usize,
    pub won: Option<bool>,
}

impl MatchSummary {
    fn from_record(record: &MatchRecord, player: Option<&PlayerIdentity>) -> Self {
        let team = player.and_then(|p| record.team_of(p));
        let won = match (team, record.winning_team) {
            (Some(team), Some(winner)) => Some(team == winner),
            _ => None,
        };
        Self {
            match_id: record.match_id.clone(),
            map_id: record.map_id.clone(),
            started_at: record.started_at,
            rounds: record.rounds.len(),
            won,
        }
    }
}

/// The player's fetched matches, held until analysis no longer needs them.
#[derive(Debug, Clone, Default)]
pub struct PlayerData {
    pub identity: Option<PlayerIdentity>,
    pub available_matches: Vec<MatchRecord>,
    pub summaries: Vec<MatchSummary>,
}

impl PlayerData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_matches(&mut self, player: PlayerIdentity, matches: Vec<MatchRecord>) {
        self.summaries = matches
            .iter()
            .map(|m| MatchSummary::from_record(m, Some(&player)))
            .collect();
        self.identity = Some(player);
        self.available_matches = matches;
    }

    pub fn has_match_details(&self) -> bool {
        !self.available_matches.is_empty()
    }

    /// Copy of the current matches for one analysis run.
    pub fn batch(&self) -> MatchBatch {
        MatchBatch::new(self.available_matches.clone())
    }

    /// Drops round-level detail, keeping per-match summaries.
    pub fn unload_info_from_matches(&mut self) {
        let released = self.available_matches.len();
        self.available_matches = Vec::new();
        debug!(released, "released match details");
    }
}

impl MatchSupply for PlayerData {
    fn release_transient_payload(&mut self, player: &PlayerIdentity) {
        if self.identity.as_ref() == Some(player) {
            self.unload_info_from_matches();
        }
    }
}

pub fn parse_match_history_json(raw: &str) -> Result<MatchHistoryFile> {
    let history: MatchHistoryFile =
        serde_json::from_str(raw).context("invalid match history json")?;
    if history.player.as_str().trim().is_empty() {
        bail!("match history has an empty player id");
    }
    Ok(history)
}

pub fn load_match_history(path: &Path) -> Result<MatchHistoryFile> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read match history {}", path.display()))?;
    let history = parse_match_history_json(&raw)
        .with_context(|| format!("failed to parse match history {}", path.display()))?;
    info!(
        matches = history.matches.len(),
        player = %history.player,
        "loaded match history"
    );
    Ok(history)
}

/// Deterministic synthetic match history for `player`.
pub fn generate_demo_matches(player: &PlayerIdentity, count: usize, seed: u64) -> Vec<MatchRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    let now = Utc::now();
    (0..count)
        .map(|idx| {
            let started = now - ChronoDuration::hours(6 * idx as i64);
            demo_match(&mut rng, player, idx, started.timestamp_millis())
        })
        .collect()
}

fn demo_match(rng: &mut StdRng, player: &PlayerIdentity, idx: usize, started_at: i64) -> MatchRecord {
    let (map_id, _) = KNOWN_MAPS[rng.gen_range(0..KNOWN_MAPS.len())];
    let my_team = if rng.gen_bool(0.5) { Team::Red } else { Team::Blue };

    let mut players = vec![MatchPlayer {
        player: player.clone(),
        team: my_team,
    }];
    for n in 1..10 {
        let team = if n < 5 { my_team } else { my_team.opponent() };
        players.push(MatchPlayer {
            player: PlayerIdentity::new(format!("bot-{n}")),
            team,
        });
    }

    let mut rounds = Vec::new();
    let (mut red, mut blue) = (0usize, 0usize);
    loop {
        let regulation_done =
            red.max(blue) == ROUNDS_PER_HALF + 1 && red.min(blue) < ROUNDS_PER_HALF;
        let overtime_done = rounds.len() >= ROUNDS_PER_HALF * 2 && red.abs_diff(blue) >= 2;
        if regulation_done || overtime_done || rounds.len() >= DEMO_ROUND_CAP {
            break;
        }
        let winner = if rng.gen_bool(0.5) { Team::Red } else { Team::Blue };
        match winner {
            Team::Red => red += 1,
            Team::Blue => blue += 1,
        }
        let kill_count = rng.gen_range(3..=7);
        let kills = (0..kill_count)
            .map(|_| demo_kill(rng, &players))
            .collect();
        rounds.push(RoundRecord {
            winning_team: winner,
            kills,
        });
    }

    let winning_team = match red.cmp(&blue) {
        std::cmp::Ordering::Greater => Some(Team::Red),
        std::cmp::Ordering::Less => Some(Team::Blue),
        std::cmp::Ordering::Equal => None,
    };
    MatchRecord {
        match_id: format!("demo-{idx:04}"),
        map_id: map_id.to_string(),
        started_at,
        players,
        rounds,
        winning_team,
    }
}

fn demo_kill(rng: &mut StdRng, players: &[MatchPlayer]) -> KillRecord {
    let killer = &players[rng.gen_range(0..players.len())];
    let victims: Vec<&MatchPlayer> = players.iter().filter(|p| p.team != killer.team).collect();
    let victim = victims[rng.gen_range(0..victims.len())];
    KillRecord {
        killer: killer.player.clone(),
        victim: victim.player.clone(),
        zone: Some(DEMO_ZONES[rng.gen_range(0..DEMO_ZONES.len())].to_string()),
        round_time_ms: rng.gen_range(5_000..100_000),
    }
}
