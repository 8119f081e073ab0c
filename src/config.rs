use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::model::PlayerIdentity;

const DEFAULT_PLAYER: &str = "demo-player";

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// JSON match history to load; demo matches are generated when unset.
    pub match_history_file: Option<PathBuf>,
    pub player: PlayerIdentity,
    pub demo_matches: usize,
    pub demo_seed: u64,
    pub tick_rate: Duration,
    pub log_dir: PathBuf,
}

impl AppConfig {
    /// Reads `.env.local`/`.env` (if present) and then the process environment.
    pub fn load() -> Self {
        let _ = dotenvy::from_filename(".env.local");
        let _ = dotenvy::from_filename(".env");
        Self::from_env()
    }

    pub fn from_env() -> Self {
        let match_history_file = env::var("MATCH_HISTORY_FILE")
            .ok()
            .map(|val| val.trim().to_string())
            .filter(|val| !val.is_empty())
            .map(PathBuf::from);
        let player = env::var("PLAYER_ID")
            .ok()
            .map(|val| val.trim().to_string())
            .filter(|val| !val.is_empty())
            .unwrap_or_else(|| DEFAULT_PLAYER.to_string());
        let demo_matches = env::var("DEMO_MATCHES")
            .ok()
            .and_then(|val| val.parse::<usize>().ok())
            .unwrap_or(20)
            .clamp(1, 500);
        let demo_seed = env::var("DEMO_SEED")
            .ok()
            .and_then(|val| val.parse::<u64>().ok())
            .unwrap_or(7);
        let tick_ms = env::var("TICK_MS")
            .ok()
            .and_then(|val| val.parse::<u64>().ok())
            .unwrap_or(250)
            .max(50);
        let log_dir = env::var("LOG_DIR")
            .ok()
            .filter(|val| !val.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("logs"));

        Self {
            match_history_file,
            player: PlayerIdentity::new(player),
            demo_matches,
            demo_seed,
            tick_rate: Duration::from_millis(tick_ms),
            log_dir,
        }
    }
}
