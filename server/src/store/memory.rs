use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use common::{PlayerId, SessionId};

use super::{GameRecord, GameStore, LeaderboardPage, Outcome, PlayerStats, StoreError, build_leaderboard};

#[derive(Default)]
struct MemoryStoreInner {
    players: HashMap<PlayerId, PlayerStats>,
    games: HashMap<SessionId, GameRecord>,
}

/// Process-local store. Contents are lost on restart.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GameStore for MemoryStore {
    async fn register_player(&self, player: &PlayerId) -> Result<(), StoreError> {
        self.inner.lock().await.players.entry(player.clone()).or_default();
        Ok(())
    }

    async fn player_stats(&self, player: &PlayerId) -> Result<Option<PlayerStats>, StoreError> {
        Ok(self.inner.lock().await.players.get(player).copied())
    }

    async fn record_outcome(&self, player: &PlayerId, outcome: Outcome) -> Result<PlayerStats, StoreError> {
        let mut inner = self.inner.lock().await;
        let stats = inner.players.entry(player.clone()).or_default();
        stats.record(outcome);
        Ok(*stats)
    }

    async fn create_game(&self, record: GameRecord) -> Result<(), StoreError> {
        self.inner.lock().await.games.insert(record.session_id.clone(), record);
        Ok(())
    }

    async fn update_game(&self, record: GameRecord) -> Result<(), StoreError> {
        self.inner.lock().await.games.insert(record.session_id.clone(), record);
        Ok(())
    }

    async fn game(&self, session_id: &SessionId) -> Result<Option<GameRecord>, StoreError> {
        Ok(self.inner.lock().await.games.get(session_id).cloned())
    }

    async fn leaderboard(&self, page: usize, limit: usize) -> Result<LeaderboardPage, StoreError> {
        let inner = self.inner.lock().await;
        let players = inner
            .players
            .iter()
            .map(|(player, stats)| (player.to_string(), *stats));
        Ok(build_leaderboard(players, page, limit))
    }
}
