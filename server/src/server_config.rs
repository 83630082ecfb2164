use std::time::Duration;

use serde::{Deserialize, Serialize};

use common::config::Validate;
use common::games::connect_four::Difficulty;

pub const MAX_SEARCH_DEPTH: usize = 10;
pub const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_address: String,
    pub static_files_path: Option<String>,
    pub matchmaking: MatchmakingConfig,
    pub bot: BotConfig,
    pub leaderboard: LeaderboardConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchmakingConfig {
    pub bot_match_delay_ms: u64,
    pub disconnect_grace_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub search_depth: usize,
    pub difficulty: Difficulty,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaderboardConfig {
    pub default_page_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:3001".to_string(),
            static_files_path: None,
            matchmaking: MatchmakingConfig::default(),
            bot: BotConfig::default(),
            leaderboard: LeaderboardConfig::default(),
        }
    }
}

impl Default for MatchmakingConfig {
    fn default() -> Self {
        Self {
            bot_match_delay_ms: 0,
            disconnect_grace_secs: 30,
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            search_depth: 6,
            difficulty: Difficulty::Hard,
            seed: None,
        }
    }
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self { default_page_size: 10 }
    }
}

impl Validate for ServerConfig {
    fn validate(&self) -> Result<(), String> {
        if self.listen_address.trim().is_empty() {
            return Err("listen_address must not be empty".to_string());
        }
        if self.matchmaking.disconnect_grace_secs == 0 {
            return Err("matchmaking.disconnect_grace_secs must be positive".to_string());
        }
        if !(1..=MAX_SEARCH_DEPTH).contains(&self.bot.search_depth) {
            return Err(format!("bot.search_depth must be between 1 and {}", MAX_SEARCH_DEPTH));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&self.leaderboard.default_page_size) {
            return Err(format!(
                "leaderboard.default_page_size must be between 1 and {}",
                MAX_PAGE_SIZE
            ));
        }
        Ok(())
    }
}

/// Runtime knobs of the session manager, derived from the config file.
#[derive(Debug, Clone)]
pub struct MatchSettings {
    pub bot_match_delay: Duration,
    pub disconnect_grace: Duration,
    pub search_depth: usize,
    pub difficulty: Difficulty,
    pub bot_seed: Option<u64>,
}

impl Default for MatchSettings {
    fn default() -> Self {
        ServerConfig::default().match_settings()
    }
}

impl ServerConfig {
    pub fn match_settings(&self) -> MatchSettings {
        MatchSettings {
            bot_match_delay: Duration::from_millis(self.matchmaking.bot_match_delay_ms),
            disconnect_grace: Duration::from_secs(self.matchmaking.disconnect_grace_secs),
            search_depth: self.bot.search_depth,
            difficulty: self.bot.difficulty,
            bot_seed: self.bot.seed,
        }
    }
}
