mod leaderboard;
mod memory;

use std::future::Future;

use serde::Serialize;
use thiserror::Error;

use common::games::connect_four::{Board, Move, Party};
use common::{PlayerId, SessionId};

pub use leaderboard::{LeaderboardEntry, LeaderboardPage, Pagination, build_leaderboard};
pub use memory::MemoryStore;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Win,
    Loss,
    Draw,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlayerStats {
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
}

impl PlayerStats {
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Win => self.wins += 1,
            Outcome::Loss => self.losses += 1,
            Outcome::Draw => self.draws += 1,
        }
    }

    pub fn total_games(&self) -> u32 {
        self.wins + self.losses + self.draws
    }

    /// Percentage of games won, rounded to two decimals. Zero when no games were played.
    pub fn win_percentage(&self) -> f64 {
        let total = self.total_games();
        if total == 0 {
            return 0.0;
        }
        (f64::from(self.wins) / f64::from(total) * 10_000.0).round() / 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GameRecordStatus {
    Active,
    Completed,
}

/// Persisted image of a session. Party identities are display names,
/// with the bot recorded under `BOT_IDENTITY`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameRecord {
    pub session_id: SessionId,
    pub party_a: String,
    pub party_b: String,
    pub board: Board,
    pub moves: Vec<Move>,
    pub next_to_move: Party,
    pub status: GameRecordStatus,
    pub winner: Option<String>,
    pub is_draw: bool,
}

/// Persistence collaborator of the session manager. Failures are reported
/// to the caller, which logs them and carries on with the game.
pub trait GameStore: Send + Sync + Clone + 'static {
    /// Creates a zeroed stats row if the player is unknown.
    fn register_player(&self, player: &PlayerId) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn player_stats(
        &self,
        player: &PlayerId,
    ) -> impl Future<Output = Result<Option<PlayerStats>, StoreError>> + Send;

    /// Upserts the player's stats row and returns the updated counters.
    fn record_outcome(
        &self,
        player: &PlayerId,
        outcome: Outcome,
    ) -> impl Future<Output = Result<PlayerStats, StoreError>> + Send;

    fn create_game(&self, record: GameRecord) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn update_game(&self, record: GameRecord) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn game(
        &self,
        session_id: &SessionId,
    ) -> impl Future<Output = Result<Option<GameRecord>, StoreError>> + Send;

    fn leaderboard(
        &self,
        page: usize,
        limit: usize,
    ) -> impl Future<Output = Result<LeaderboardPage, StoreError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_win_percentage_rounds_to_two_decimals() {
        let stats = PlayerStats { wins: 1, losses: 2, draws: 0 };
        assert_eq!(stats.win_percentage(), 33.33);

        let stats = PlayerStats { wins: 2, losses: 1, draws: 0 };
        assert_eq!(stats.win_percentage(), 66.67);
    }

    #[test]
    fn test_win_percentage_without_games_is_zero() {
        assert_eq!(PlayerStats::default().win_percentage(), 0.0);
    }

    #[test]
    fn test_record_counts_each_outcome() {
        let mut stats = PlayerStats::default();
        stats.record(Outcome::Win);
        stats.record(Outcome::Draw);
        stats.record(Outcome::Loss);
        stats.record(Outcome::Win);

        assert_eq!(stats, PlayerStats { wins: 2, losses: 1, draws: 1 });
        assert_eq!(stats.total_games(), 4);
    }
}
