use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::error::AnalysisError;
use crate::model::{
    MapAnalytics, MapSideStats, MatchBatch, MatchRecord, PlayerIdentity, Side, Team,
};
use crate::store::StatsTable;

pub struct AnalysisProgress {
    pub current: usize,
    pub total: usize,
    pub message: String,
}

/// The computation one analysis job runs over its batch.
///
/// Implementations must be deterministic for a fixed batch and player; the
/// job treats any `Err` (or panic) as an unrecoverable failure of the run.
/// A single bad match should be skipped rather than fail the whole batch.
pub trait Analyzer: Send + Sync {
    fn analyze(
        &self,
        batch: &MatchBatch,
        player: &PlayerIdentity,
        on_progress: &mut dyn FnMut(AnalysisProgress),
    ) -> Result<StatsTable, AnalysisError>;
}

/// Counting aggregation of rounds, kills and deaths per map and side.
///
/// Matches the player did not take part in, and matches without rounds
/// (remakes), are skipped and left out of the per-map match counts.
#[derive(Debug, Clone, Copy, Default)]
pub struct TacticalAnalyzer;

impl Analyzer for TacticalAnalyzer {
    fn analyze(
        &self,
        batch: &MatchBatch,
        player: &PlayerIdentity,
        on_progress: &mut dyn FnMut(AnalysisProgress),
    ) -> Result<StatsTable, AnalysisError> {
        let total = batch.len();
        let mut table = StatsTable::new(batch.batch_id(), player.clone());
        let mut match_results: HashMap<String, (u32, u32)> = HashMap::new();
        let mut skipped = 0;

        for (idx, record) in batch.matches().iter().enumerate() {
            let message = match accumulate_match(&mut table, record, player) {
                Some(team) => {
                    let entry = match_results.entry(record.map_id.clone()).or_default();
                    entry.0 += 1;
                    if record.winning_team == Some(team) {
                        entry.1 += 1;
                    }
                    format!("Analyzed {}", record.match_id)
                }
                None => {
                    skipped += 1;
                    format!("Skipped {}", record.match_id)
                }
            };
            on_progress(AnalysisProgress {
                current: idx + 1,
                total,
                message,
            });
        }

        // An empty batch is a valid (empty) result; a batch of only unusable
        // matches usually means the wrong player was selected.
        if total > 0 && skipped == total {
            return Err(AnalysisError::NoUsableMatches { skipped });
        }

        for (map_id, (played, won)) in match_results {
            let analytics = summarize_map(&table, &map_id, played, won);
            table.maps.insert(map_id, analytics);
        }
        Ok(table)
    }
}

fn accumulate_match(
    table: &mut StatsTable,
    record: &MatchRecord,
    player: &PlayerIdentity,
) -> Option<Team> {
    let Some(team) = record.team_of(player) else {
        debug!(match_id = %record.match_id, "skipping match without the analyzed player");
        return None;
    };
    if record.rounds.is_empty() {
        debug!(match_id = %record.match_id, "skipping match with no rounds");
        return None;
    }

    let mut sides_seen = [false; 2];
    for (round_index, round) in record.rounds.iter().enumerate() {
        let side = Side::for_team_in_round(team, round_index);
        sides_seen[side as usize] = true;
        let stats = table
            .sides
            .entry((record.map_id.clone(), side))
            .or_default();
        stats.rounds_played += 1;
        if round.winning_team == team {
            stats.rounds_won += 1;
        }
        for kill in &round.kills {
            if &kill.killer == player {
                stats.kills += 1;
                bump_zone(&mut stats.kill_zones, kill.zone.as_deref());
            }
            if &kill.victim == player {
                stats.deaths += 1;
                bump_zone(&mut stats.death_zones, kill.zone.as_deref());
            }
        }
    }

    for side in Side::ALL {
        if sides_seen[side as usize]
            && let Some(stats) = table.sides.get_mut(&(record.map_id.clone(), side))
        {
            stats.matches += 1;
        }
    }
    Some(team)
}

fn bump_zone(zones: &mut BTreeMap<String, u32>, zone: Option<&str>) {
    if let Some(zone) = zone {
        *zones.entry(zone.to_string()).or_insert(0) += 1;
    }
}

fn summarize_map(table: &StatsTable, map_id: &str, played: u32, won: u32) -> MapAnalytics {
    let attack = table.get(map_id, Side::Attack);
    let defense = table.get(map_id, Side::Defense);

    let mut kill_zones: BTreeMap<&str, u32> = BTreeMap::new();
    let mut death_zones: BTreeMap<&str, u32> = BTreeMap::new();
    for stats in [attack, defense].into_iter().flatten() {
        for (zone, count) in &stats.kill_zones {
            *kill_zones.entry(zone).or_insert(0) += count;
        }
        for (zone, count) in &stats.death_zones {
            *death_zones.entry(zone).or_insert(0) += count;
        }
    }

    MapAnalytics {
        matches_played: played,
        matches_won: won,
        attack_round_win_rate: attack.and_then(MapSideStats::round_win_rate),
        defense_round_win_rate: defense.and_then(MapSideStats::round_win_rate),
        most_lethal_zone: top_zone(&kill_zones),
        deadliest_zone: top_zone(&death_zones),
    }
}

// Highest count wins; ties go to the alphabetically first zone.
fn top_zone(zones: &BTreeMap<&str, u32>) -> Option<String> {
    let mut best: Option<(&str, u32)> = None;
    for (zone, count) in zones {
        if best.map(|(_, c)| *count > c).unwrap_or(true) {
            best = Some((*zone, *count));
        }
    }
    best.map(|(zone, _)| zone.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{KillRecord, MatchPlayer, RoundRecord};

    fn me() -> PlayerIdentity {
        PlayerIdentity::new("me")
    }

    fn kill(killer: &str, victim: &str, zone: &str) -> KillRecord {
        KillRecord {
            killer: PlayerIdentity::new(killer),
            victim: PlayerIdentity::new(victim),
            zone: Some(zone.to_string()),
            round_time_ms: 0,
        }
    }

    fn record(map: &str, rounds: Vec<RoundRecord>, winner: Option<Team>) -> MatchRecord {
        MatchRecord {
            match_id: format!("{map}-1"),
            map_id: map.to_string(),
            started_at: 0,
            players: vec![
                MatchPlayer {
                    player: me(),
                    team: Team::Red,
                },
                MatchPlayer {
                    player: PlayerIdentity::new("them"),
                    team: Team::Blue,
                },
            ],
            rounds,
            winning_team: winner,
        }
    }

    #[test]
    fn first_half_counts_as_attack_for_red() {
        let rounds = (0..14)
            .map(|i| RoundRecord {
                winning_team: if i % 2 == 0 { Team::Red } else { Team::Blue },
                kills: vec![kill("me", "them", "a-site")],
            })
            .collect();
        let batch = MatchBatch::new(vec![record("ascent", rounds, Some(Team::Red))]);
        let table = TacticalAnalyzer
            .analyze(&batch, &me(), &mut |_| {})
            .expect("analysis should succeed");

        let attack = table.get("ascent", Side::Attack).expect("attack stats");
        assert_eq!(attack.rounds_played, 12);
        assert_eq!(attack.rounds_won, 6);
        assert_eq!(attack.kills, 12);
        assert_eq!(attack.matches, 1);
        let defense = table.get("ascent", Side::Defense).expect("defense stats");
        assert_eq!(defense.rounds_played, 2);
        assert_eq!(defense.kill_zones.get("a-site"), Some(&2));

        let analytics = table.maps.get("ascent").expect("map analytics");
        assert_eq!(analytics.matches_won, 1);
        assert_eq!(analytics.most_lethal_zone.as_deref(), Some("a-site"));
        assert_eq!(analytics.deadliest_zone, None);
    }

    fn won_round() -> RoundRecord {
        RoundRecord {
            winning_team: Team::Red,
            kills: vec![kill("me", "them", "b-site")],
        }
    }

    #[test]
    fn unusable_matches_are_skipped_not_fatal() {
        let good = record("bind", vec![won_round(), won_round()], Some(Team::Red));
        let mut remake = record("bind", Vec::new(), None);
        remake.match_id = "remake".to_string();
        let mut absent = record("bind", vec![won_round()], Some(Team::Red));
        absent.match_id = "absent".to_string();
        absent.players.retain(|p| p.player.as_str() != "me");

        let batch = MatchBatch::new(vec![remake, good, absent]);
        let mut messages = Vec::new();
        let table = TacticalAnalyzer
            .analyze(&batch, &me(), &mut |p: AnalysisProgress| messages.push(p.message))
            .expect("one usable match is enough");

        let attack = table.get("bind", Side::Attack).expect("attack stats");
        assert_eq!(attack.matches, 1);
        assert_eq!(attack.rounds_played, 2);
        assert_eq!(attack.kills, 2);
        let analytics = table.maps.get("bind").expect("map analytics");
        assert_eq!(analytics.matches_played, 1);
        assert_eq!(analytics.matches_won, 1);
        assert_eq!(
            messages,
            vec!["Skipped remake", "Analyzed bind-1", "Skipped absent"]
        );
    }

    #[test]
    fn batch_without_any_usable_match_fails() {
        let mut bad = record("bind", vec![won_round()], None);
        bad.players.clear();
        let remake = record("ascent", Vec::new(), None);
        let batch = MatchBatch::new(vec![bad, remake]);
        let err = TacticalAnalyzer
            .analyze(&batch, &me(), &mut |_| {})
            .unwrap_err();
        assert_eq!(err, AnalysisError::NoUsableMatches { skipped: 2 });
    }

    #[test]
    fn top_zone_breaks_ties_alphabetically() {
        let zones = BTreeMap::from([("b-main", 2), ("a-long", 2), ("mid", 1)]);
        assert_eq!(top_zone(&zones).as_deref(), Some("a-long"));
    }
}
