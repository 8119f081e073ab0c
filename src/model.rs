use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Regulation rounds per half; overtime starts after two halves.
pub const ROUNDS_PER_HALF: usize = 12;

/// Maps the terminal knows how to list, as `(map id, display name)`.
pub const KNOWN_MAPS: &[(&str, &str)] = &[
    ("ascent", "Ascent"),
    ("bind", "Bind"),
    ("breeze", "Breeze"),
    ("haven", "Haven"),
    ("icebox", "Icebox"),
    ("lotus", "Lotus"),
    ("split", "Split"),
    ("sunset", "Sunset"),
];

pub fn map_display_name(map_id: &str) -> &str {
    KNOWN_MAPS
        .iter()
        .find(|(id, _)| *id == map_id)
        .map(|(_, name)| *name)
        .unwrap_or(map_id)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerIdentity(Arc<str>);

impl PlayerIdentity {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(Arc::from(raw.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerIdentity {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    Red,
    Blue,
}

impl Team {
    pub fn opponent(self) -> Team {
        match self {
            Team::Red => Team::Blue,
            Team::Blue => Team::Red,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Attack,
    Defense,
}

impl Side {
    pub const ALL: [Side; 2] = [Side::Attack, Side::Defense];

    pub fn toggle(self) -> Side {
        match self {
            Side::Attack => Side::Defense,
            Side::Defense => Side::Attack,
        }
    }

    /// Side played by `team` in the 0-based round `round_index`.
    ///
    /// Red attacks the first half, Blue the second; overtime alternates every
    /// round with Red attacking on even rounds.
    pub fn for_team_in_round(team: Team, round_index: usize) -> Side {
        let red_attacks = if round_index < ROUNDS_PER_HALF {
            true
        } else if round_index < ROUNDS_PER_HALF * 2 {
            false
        } else {
            round_index % 2 == 0
        };
        match (team, red_attacks) {
            (Team::Red, true) | (Team::Blue, false) => Side::Attack,
            _ => Side::Defense,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Attack => f.write_str("attack"),
            Side::Defense => f.write_str("defense"),
        }
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "attack" | "atk" | "attacker" => Ok(Side::Attack),
            "defense" | "def" | "defence" | "defender" => Ok(Side::Defense),
            other => Err(format!("unknown side: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchPlayer {
    pub player: PlayerIdentity,
    pub team: Team,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KillRecord {
    pub killer: PlayerIdentity,
    pub victim: PlayerIdentity,
    /// Named map zone where the victim died, when the feed reports one.
    #[serde(default)]
    pub zone: Option<String>,
    #[serde(default)]
    pub round_time_ms: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub winning_team: Team,
    #[serde(default)]
    pub kills: Vec<KillRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub match_id: String,
    pub map_id: String,
    #[serde(default)]
    pub started_at: i64,
    pub players: Vec<MatchPlayer>,
    #[serde(default)]
    pub rounds: Vec<RoundRecord>,
    /// `None` for a draw.
    #[serde(default)]
    pub winning_team: Option<Team>,
}

impl MatchRecord {
    pub fn team_of(&self, player: &PlayerIdentity) -> Option<Team> {
        self.players
            .iter()
            .find(|p| &p.player == player)
            .map(|p| p.team)
    }
}

static NEXT_BATCH_ID: AtomicU64 = AtomicU64::new(1);

/// Immutable snapshot of the matches analyzed together in one job.
#[derive(Debug, Clone)]
pub struct MatchBatch {
    batch_id: u64,
    captured_at: DateTime<Utc>,
    matches: Vec<MatchRecord>,
}

impl MatchBatch {
    pub fn new(matches: Vec<MatchRecord>) -> Self {
        Self {
            batch_id: NEXT_BATCH_ID.fetch_add(1, Ordering::Relaxed),
            captured_at: Utc::now(),
            matches,
        }
    }

    pub fn batch_id(&self) -> u64 {
        self.batch_id
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn matches(&self) -> &[MatchRecord] {
        &self.matches
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapSideStats {
    pub matches: u32,
    pub rounds_played: u32,
    pub rounds_won: u32,
    pub kills: u32,
    pub deaths: u32,
    pub kill_zones: BTreeMap<String, u32>,
    pub death_zones: BTreeMap<String, u32>,
}

impl MapSideStats {
    pub fn round_win_rate(&self) -> Option<f64> {
        if self.rounds_played == 0 {
            return None;
        }
        Some(self.rounds_won as f64 / self.rounds_played as f64)
    }

    pub fn kd_ratio(&self) -> Option<f64> {
        if self.deaths == 0 {
            return None;
        }
        Some(self.kills as f64 / self.deaths as f64)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapAnalytics {
    pub matches_played: u32,
    pub matches_won: u32,
    pub attack_round_win_rate: Option<f64>,
    pub defense_round_win_rate: Option<f64>,
    pub most_lethal_zone: Option<String>,
    pub deadliest_zone: Option<String>,
}

impl MapAnalytics {
    pub fn match_win_rate(&self) -> Option<f64> {
        if self.matches_played == 0 {
            return None;
        }
        Some(self.matches_won as f64 / self.matches_played as f64)
    }
}
