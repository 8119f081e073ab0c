use std::collections::VecDeque;

use crate::coordinator::{AnalysisCoordinator, DependentGate, MatchSupply, RenderTrigger};
use crate::match_source::PlayerData;
use crate::model::{KNOWN_MAPS, MapAnalytics, MapSideStats, PlayerIdentity, Side};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    General,
    Maps,
}

/// Stats pulled for the selected map and side on the last redraw.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsView {
    pub map_id: String,
    pub side: Side,
    pub analyzed: bool,
    pub stats: Option<MapSideStats>,
    pub analytics: Option<MapAnalytics>,
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub screen: Screen,
    pub map_tab_enabled: bool,
    pub selected_map: usize,
    pub side: Side,
    pub player_data: PlayerData,
    pub stats_view: Option<StatsView>,
    pub stats_dirty: bool,
    pub help_overlay: bool,
    pub logs: VecDeque<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self {
            screen: Screen::General,
            map_tab_enabled: false,
            selected_map: 0,
            side: Side::Attack,
            player_data: PlayerData::new(),
            stats_view: None,
            stats_dirty: true,
            help_overlay: false,
            logs: VecDeque::new(),
        }
    }

    pub fn push_log(&mut self, msg: impl Into<String>) {
        const MAX_LOGS: usize = 200;
        self.logs.push_back(msg.into());
        while self.logs.len() > MAX_LOGS {
            self.logs.pop_front();
        }
    }

    pub fn current_map_id(&self) -> &'static str {
        KNOWN_MAPS
            .get(self.selected_map)
            .map(|(id, _)| *id)
            .unwrap_or(KNOWN_MAPS[0].0)
    }

    /// Switches tabs; the maps tab stays unreachable until the gate unlocks.
    pub fn set_screen(&mut self, screen: Screen) -> bool {
        if screen == Screen::Maps && !self.map_tab_enabled {
            self.push_log("[INFO] Maps tab unlocks after analysis completes");
            return false;
        }
        if self.screen != screen {
            self.screen = screen;
            if screen == Screen::Maps {
                self.stats_dirty = true;
            }
        }
        true
    }

    pub fn select_map_next(&mut self) {
        self.selected_map = (self.selected_map + 1) % KNOWN_MAPS.len();
        self.stats_dirty = true;
    }

    pub fn select_map_prev(&mut self) {
        if self.selected_map == 0 {
            self.selected_map = KNOWN_MAPS.len() - 1;
        } else {
            self.selected_map -= 1;
        }
        self.stats_dirty = true;
    }

    pub fn toggle_side(&mut self) {
        self.side = self.side.toggle();
        self.stats_dirty = true;
    }

    pub fn analysis_player(&self) -> Option<PlayerIdentity> {
        self.player_data.identity.clone()
    }

    /// Re-reads stats for the selected map and side. Without an analysis the
    /// view is kept empty rather than showing stale numbers.
    pub fn draw_stats(&mut self, coordinator: &AnalysisCoordinator) {
        let map_id = self.current_map_id();
        let analyzed = coordinator.is_analyzed();
        let (stats, analytics) = if analyzed {
            (
                coordinator.get_map_side_stats(map_id, self.side),
                coordinator.get_map_analytics(map_id),
            )
        } else {
            (None, None)
        };
        self.stats_view = Some(StatsView {
            map_id: map_id.to_string(),
            side: self.side,
            analyzed,
            stats,
            analytics,
        });
        self.stats_dirty = false;
    }
}

impl RenderTrigger for AppState {
    fn refresh(&mut self) {
        self.stats_dirty = true;
        self.push_log("[INFO] Analysis results ready");
    }
}

impl DependentGate for AppState {
    fn unlock(&mut self) {
        self.map_tab_enabled = true;
        // Results may have been drawn before the state flipped to analyzed.
        self.stats_dirty = true;
        self.push_log("[INFO] Analysis complete, maps tab unlocked");
    }
}

impl MatchSupply for AppState {
    fn release_transient_payload(&mut self, player: &PlayerIdentity) {
        self.player_data.release_transient_payload(player);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_tab_is_gated() {
        let mut state = AppState::new();
        assert!(!state.set_screen(Screen::Maps));
        assert_eq!(state.screen, Screen::General);

        state.unlock();
        assert!(state.set_screen(Screen::Maps));
        assert_eq!(state.screen, Screen::Maps);
        assert!(state.stats_dirty);
    }

    #[test]
    fn map_selection_wraps() {
        let mut state = AppState::new();
        state.select_map_prev();
        assert_eq!(state.selected_map, KNOWN_MAPS.len() - 1);
        state.select_map_next();
        assert_eq!(state.selected_map, 0);
    }

    #[test]
    fn draw_stats_without_analysis_is_empty() {
        let mut state = AppState::new();
        let coordinator = AnalysisCoordinator::new();
        state.toggle_side();
        state.draw_stats(&coordinator);
        let view = state.stats_view.expect("view should be set");
        assert!(!view.analyzed);
        assert_eq!(view.side, Side::Defense);
        assert!(view.stats.is_none());
        assert!(!state.stats_dirty);
    }
}
