use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use common::games::SessionRng;
use common::games::connect_four::{
    BotInput, Difficulty, GameStatus, Party, calculate_move, party_to_proto, select_move,
};
use common::id_generator::generate_session_id;
use common::{
    MatchResumed, MatchStarted, MoveApplied, OpponentDisconnected, PlayerId, ServerMessage,
    SessionId, log, server_message,
};

use crate::error::GameError;
use crate::games::GameBroadcaster;
use crate::games::connect_four::{AppliedMove, GameSession, Seat};
use crate::matchmaking::{WaitingEntry, WaitingQueue};
use crate::server_config::MatchSettings;
use crate::store::{GameStore, Outcome};
use crate::timers::{TimerHandle, TimerId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    Waiting,
    Paired(SessionId),
}

struct Registry {
    sessions: HashMap<SessionId, GameSession>,
    waiting: WaitingQueue,
    bot_rng: SessionRng,
    next_timer_id: TimerId,
}

impl Registry {
    fn allocate_timer_id(&mut self) -> TimerId {
        self.next_timer_id += 1;
        self.next_timer_id
    }

    fn session_of(&self, player: &PlayerId) -> Option<&GameSession> {
        self.sessions.values().find(|session| session.party_of(player).is_some())
    }

    fn session_of_mut(&mut self, player: &PlayerId) -> Option<&mut GameSession> {
        self.sessions
            .values_mut()
            .find(|session| session.party_of(player).is_some())
    }
}

/// Owns the waiting queue and every live session. Each public operation runs
/// as one unit under the registry lock, persistence and notification included,
/// so two operations never interleave on the same session.
#[derive(Clone)]
pub struct SessionManager<S: GameStore, B: GameBroadcaster> {
    registry: Arc<Mutex<Registry>>,
    store: S,
    broadcaster: B,
    settings: Arc<MatchSettings>,
}

impl<S: GameStore, B: GameBroadcaster> SessionManager<S, B> {
    pub fn new(store: S, broadcaster: B, settings: MatchSettings) -> Self {
        let bot_rng = settings
            .bot_seed
            .map(SessionRng::new)
            .unwrap_or_else(SessionRng::from_random);
        log!(
            "Session manager ready: bot after {:?}, grace {:?}, {:?} bot at depth {}, rng seed {}",
            settings.bot_match_delay,
            settings.disconnect_grace,
            settings.difficulty,
            settings.search_depth,
            bot_rng.seed()
        );

        Self {
            registry: Arc::new(Mutex::new(Registry {
                sessions: HashMap::new(),
                waiting: WaitingQueue::new(),
                bot_rng,
                next_timer_id: 0,
            })),
            store,
            broadcaster,
            settings: Arc::new(settings),
        }
    }

    pub async fn request_match(&self, player: &PlayerId) -> Result<MatchOutcome, GameError> {
        let mut registry = self.registry.lock().await;

        if let Some(session) = registry.session_of(player) {
            return Err(GameError::AlreadyInGame(session.id.clone()));
        }
        if registry.waiting.contains(player) {
            return Err(GameError::AlreadyWaiting);
        }

        if let Err(e) = self.store.register_player(player).await {
            log!("[player:{}] Failed to register player: {}", player, e);
        }

        if let Some(opponent) = registry.waiting.pop_front() {
            opponent.timer.cancel();
            let session = GameSession::new(
                SessionId::new(generate_session_id()),
                opponent.player,
                Seat::Human(player.clone()),
            );
            let session_id = self.start_session(&mut registry, session).await;
            return Ok(MatchOutcome::Paired(session_id));
        }

        let timer_id = registry.allocate_timer_id();
        let manager = self.clone();
        let waiting_player = player.clone();
        let timer = TimerHandle::schedule(timer_id, self.settings.bot_match_delay, async move {
            manager.on_bot_pairing_timer(waiting_player, timer_id).await;
        });
        registry.waiting.push(WaitingEntry {
            player: player.clone(),
            timer,
        });
        log!(
            "[player:{}] Waiting for an opponent ({} in queue)",
            player,
            registry.waiting.len()
        );

        Ok(MatchOutcome::Waiting)
    }

    /// Applies a human move and, when the bot is next, its replies before returning.
    pub async fn request_move(
        &self,
        player: &PlayerId,
        session_id: &SessionId,
        column: i32,
    ) -> Result<(), GameError> {
        let column = usize::try_from(column).map_err(|_| GameError::InvalidColumn(column))?;

        let mut registry = self.registry.lock().await;
        let Registry { sessions, bot_rng, .. } = &mut *registry;

        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| GameError::SessionNotFound(session_id.clone()))?;
        let applied = session.play(player, column)?;
        self.publish_move(session, applied).await;

        while session.is_bot_turn() {
            let input = BotInput {
                board: session.board,
                bot: session.to_move(),
                depth: self.settings.search_depth,
            };
            let Some(column) = self.compute_bot_move(input, bot_rng).await else {
                log!("[session:{}] Bot found no move to play", session.id);
                break;
            };
            match session.apply_move(input.bot, column) {
                Ok(applied) => self.publish_move(session, applied).await,
                Err(e) => {
                    log!("[session:{}] Bot move in column {} rejected: {}", session.id, column, e);
                    break;
                }
            }
        }

        if session.is_over() {
            remove_session(sessions, session_id);
        }
        Ok(())
    }

    /// Re-sends the current state of the player's session. Returns false when
    /// the player has no live session.
    pub async fn request_reconnect(&self, player: &PlayerId) -> bool {
        let mut registry = self.registry.lock().await;
        let Some(session) = registry.session_of_mut(player) else {
            log!("[player:{}] Reconnect without a live session", player);
            return false;
        };

        if session.cancel_disconnect_timer(player) {
            log!("[session:{}] {} reconnected within grace period", session.id, player);
        }

        let message = ServerMessage {
            message: Some(server_message::Message::MatchResumed(MatchResumed {
                session_id: session.id.to_string(),
                board: Some(session.board.to_proto()),
                next_to_move: session.to_move().to_proto(),
                opponent_a: session.identity_of(Party::A).to_string(),
                opponent_b: session.identity_of(Party::B).to_string(),
            })),
        };
        self.broadcaster.send_to_players(vec![player.clone()], message).await;
        true
    }

    pub async fn handle_disconnect(&self, player: &PlayerId) {
        let mut registry = self.registry.lock().await;

        if let Some(entry) = registry.waiting.remove(player) {
            entry.timer.cancel();
            log!("[player:{}] Left the waiting queue", player);
            return;
        }

        let timer_id = registry.allocate_timer_id();
        let Some(session) = registry.session_of_mut(player) else {
            return;
        };

        let manager = self.clone();
        let session_id = session.id.clone();
        let disconnected = player.clone();
        let timer = TimerHandle::schedule(timer_id, self.settings.disconnect_grace, async move {
            manager
                .on_disconnect_grace_expired(session_id, disconnected, timer_id)
                .await;
        });
        session.arm_disconnect_timer(player.clone(), timer);
        log!(
            "[session:{}] {} disconnected, forfeit in {:?} unless they return",
            session.id,
            player,
            self.settings.disconnect_grace
        );
    }

    async fn on_bot_pairing_timer(&self, player: PlayerId, timer_id: TimerId) {
        let mut registry = self.registry.lock().await;
        if registry.waiting.take_if_timer(&player, timer_id).is_none() {
            return;
        }

        let session = GameSession::new(SessionId::new(generate_session_id()), player, Seat::Bot);
        self.start_session(&mut registry, session).await;
    }

    async fn on_disconnect_grace_expired(&self, session_id: SessionId, player: PlayerId, timer_id: TimerId) {
        let mut registry = self.registry.lock().await;
        let Some(session) = registry.sessions.get_mut(&session_id) else {
            return;
        };
        if !session.take_disconnect_timer(&player, timer_id) || session.is_over() {
            return;
        }
        let Some(loser) = session.party_of(&player) else {
            return;
        };

        session.forfeit(loser);
        let winner = loser.opponent();
        log!(
            "[session:{}] {} did not return, {} wins by forfeit",
            session.id,
            player,
            session.identity_of(winner)
        );

        if let Err(e) = self.store.update_game(session.to_record()).await {
            log!("[session:{}] Failed to persist forfeited game: {}", session.id, e);
        }
        if !session.has_bot() {
            self.record_results(session).await;
        }

        let message = ServerMessage {
            message: Some(server_message::Message::OpponentDisconnected(OpponentDisconnected {
                session_id: session.id.to_string(),
                disconnected_identity: player.to_string(),
                winner: winner.to_proto(),
                winner_identity: session.identity_of(winner).to_string(),
            })),
        };
        self.broadcaster.send_to_players(session.humans(), message).await;

        remove_session(&mut registry.sessions, &session_id);
    }

    async fn start_session(&self, registry: &mut Registry, session: GameSession) -> SessionId {
        if let Err(e) = self.store.create_game(session.to_record()).await {
            log!("[session:{}] Failed to persist new game: {}", session.id, e);
        }

        self.broadcaster
            .send_to_players(vec![session.party_a.clone()], match_started(&session, Party::A))
            .await;
        if let Some(player_b) = session.party_b.human() {
            self.broadcaster
                .send_to_players(vec![player_b.clone()], match_started(&session, Party::B))
                .await;
        }

        log!(
            "[session:{}] Started: {} vs {}",
            session.id,
            session.identity_of(Party::A),
            session.identity_of(Party::B)
        );
        let session_id = session.id.clone();
        registry.sessions.insert(session_id.clone(), session);
        session_id
    }

    /// Persists the move, settles stats on a terminal move, then notifies the humans.
    async fn publish_move(&self, session: &GameSession, applied: AppliedMove) {
        if let Err(e) = self.store.update_game(session.to_record()).await {
            log!("[session:{}] Failed to persist move: {}", session.id, e);
        }

        let over = applied.status.is_over();
        if over {
            self.record_results(session).await;
            match applied.status {
                GameStatus::Won(party) => {
                    log!("[session:{}] {} wins", session.id, session.identity_of(party))
                }
                _ => log!("[session:{}] Draw", session.id),
            }
        }

        let message = ServerMessage {
            message: Some(server_message::Message::MoveApplied(MoveApplied {
                session_id: session.id.to_string(),
                board: Some(session.board.to_proto()),
                column: applied.mv.column as u32,
                row: applied.mv.row as u32,
                party: applied.mv.party.to_proto(),
                next_to_move: if over { 0 } else { session.to_move().to_proto() },
                over,
                winner: party_to_proto(applied.status.winner()),
                is_draw: applied.status.is_draw(),
            })),
        };
        self.broadcaster.send_to_players(session.humans(), message).await;
    }

    /// Stats for human seats only; the bot never gets a row.
    async fn record_results(&self, session: &GameSession) {
        let outcomes: Vec<(PlayerId, Outcome)> = match session.status() {
            GameStatus::Won(winner) => [(winner, Outcome::Win), (winner.opponent(), Outcome::Loss)]
                .into_iter()
                .filter_map(|(party, outcome)| {
                    session.seat(party).human().cloned().map(|player| (player, outcome))
                })
                .collect(),
            GameStatus::Draw => session
                .humans()
                .into_iter()
                .map(|player| (player, Outcome::Draw))
                .collect(),
            GameStatus::InProgress => return,
        };

        for (player, outcome) in outcomes {
            if let Err(e) = self.store.record_outcome(&player, outcome).await {
                log!("[session:{}] Failed to record {:?} for {}: {}", session.id, outcome, player, e);
            }
        }
    }

    async fn compute_bot_move(&self, input: BotInput, rng: &mut SessionRng) -> Option<usize> {
        match self.settings.difficulty {
            Difficulty::Hard => match tokio::task::spawn_blocking(move || select_move(&input)).await {
                Ok(column) => column,
                Err(e) => {
                    log!("Bot search task failed: {}", e);
                    None
                }
            },
            difficulty => calculate_move(difficulty, &input, rng),
        }
    }
}

fn match_started(session: &GameSession, party: Party) -> ServerMessage {
    let opponent = party.opponent();
    ServerMessage {
        message: Some(server_message::Message::MatchStarted(MatchStarted {
            session_id: session.id.to_string(),
            opponent: session.identity_of(opponent).to_string(),
            is_first_party: party == Party::A,
            first_to_move: Party::A.to_proto(),
            board: Some(session.board.to_proto()),
            opponent_is_bot: session.seat(opponent).is_bot(),
        })),
    }
}

fn remove_session(sessions: &mut HashMap<SessionId, GameSession>, session_id: &SessionId) {
    if let Some(mut session) = sessions.remove(session_id) {
        session.cancel_all_timers();
        log!("[session:{}] Closed ({} still active)", session_id, sessions.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use common::games::connect_four::{COLUMNS, MoveError};
    use common::{BOT_IDENTITY, RejectReason};

    use crate::store::{
        GameRecord, GameRecordStatus, LeaderboardPage, MemoryStore, PlayerStats, StoreError,
        build_leaderboard,
    };

    /// Column sequence, party A first, that fills the board without a line of four.
    const DRAW_SEQUENCE: [usize; 42] = [
        5, 3, 2, 3, 1, 5, 3, 1, 0, 1, 4, 1, 2, 5, 0, 5, 6, 6, 2, 0, 6, 0, 4, 2, 3, 0, 3, 4, 2, 3,
        2, 6, 0, 4, 1, 1, 5, 4, 4, 5, 6, 6,
    ];

    #[derive(Clone, Default)]
    struct RecordingBroadcaster {
        sent: Arc<std::sync::Mutex<Vec<(PlayerId, ServerMessage)>>>,
    }

    impl RecordingBroadcaster {
        fn messages_for(&self, player: &str) -> Vec<server_message::Message> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter(|(recipient, _)| recipient.as_str() == player)
                .filter_map(|(_, message)| message.message.clone())
                .collect()
        }

        fn match_started_for(&self, player: &str) -> Vec<MatchStarted> {
            self.messages_for(player)
                .into_iter()
                .filter_map(|message| match message {
                    server_message::Message::MatchStarted(started) => Some(started),
                    _ => None,
                })
                .collect()
        }

        fn moves_for(&self, player: &str) -> Vec<MoveApplied> {
            self.messages_for(player)
                .into_iter()
                .filter_map(|message| match message {
                    server_message::Message::MoveApplied(applied) => Some(applied),
                    _ => None,
                })
                .collect()
        }

        fn disconnects_for(&self, player: &str) -> Vec<OpponentDisconnected> {
            self.messages_for(player)
                .into_iter()
                .filter_map(|message| match message {
                    server_message::Message::OpponentDisconnected(notice) => Some(notice),
                    _ => None,
                })
                .collect()
        }
    }

    impl GameBroadcaster for RecordingBroadcaster {
        async fn send_to_players(&self, recipients: Vec<PlayerId>, message: ServerMessage) {
            let mut sent = self.sent.lock().unwrap();
            for recipient in recipients {
                sent.push((recipient, message.clone()));
            }
        }
    }

    #[derive(Clone, Default)]
    struct FailingStore;

    fn offline() -> StoreError {
        StoreError::Unavailable("database offline".to_string())
    }

    impl GameStore for FailingStore {
        async fn register_player(&self, _player: &PlayerId) -> Result<(), StoreError> {
            Err(offline())
        }

        async fn player_stats(&self, _player: &PlayerId) -> Result<Option<PlayerStats>, StoreError> {
            Err(offline())
        }

        async fn record_outcome(&self, _player: &PlayerId, _outcome: Outcome) -> Result<PlayerStats, StoreError> {
            Err(offline())
        }

        async fn create_game(&self, _record: GameRecord) -> Result<(), StoreError> {
            Err(offline())
        }

        async fn update_game(&self, _record: GameRecord) -> Result<(), StoreError> {
            Err(offline())
        }

        async fn game(&self, _session_id: &SessionId) -> Result<Option<GameRecord>, StoreError> {
            Err(offline())
        }

        async fn leaderboard(&self, page: usize, limit: usize) -> Result<LeaderboardPage, StoreError> {
            Ok(build_leaderboard(Vec::new(), page, limit))
        }
    }

    fn settings(bot_delay: Duration) -> MatchSettings {
        MatchSettings {
            bot_match_delay: bot_delay,
            disconnect_grace: Duration::from_secs(30),
            search_depth: 4,
            difficulty: Difficulty::Hard,
            bot_seed: Some(7),
        }
    }

    fn manager_with<S: GameStore>(
        store: S,
        settings: MatchSettings,
    ) -> (SessionManager<S, RecordingBroadcaster>, RecordingBroadcaster) {
        let broadcaster = RecordingBroadcaster::default();
        (SessionManager::new(store, broadcaster.clone(), settings), broadcaster)
    }

    fn id(name: &str) -> PlayerId {
        PlayerId::from(name)
    }

    async fn pair(manager: &SessionManager<impl GameStore, RecordingBroadcaster>, a: &str, b: &str) -> SessionId {
        assert_eq!(manager.request_match(&id(a)).await, Ok(MatchOutcome::Waiting));
        match manager.request_match(&id(b)).await {
            Ok(MatchOutcome::Paired(session_id)) => session_id,
            other => panic!("expected pairing, got {:?}", other),
        }
    }

    async fn session_count(manager: &SessionManager<impl GameStore, RecordingBroadcaster>) -> usize {
        manager.registry.lock().await.sessions.len()
    }

    async fn stats(store: &MemoryStore, player: &str) -> PlayerStats {
        store.player_stats(&id(player)).await.unwrap().unwrap_or_default()
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiting_player_becomes_party_a() {
        let (manager, broadcaster) = manager_with(MemoryStore::new(), settings(Duration::from_secs(10)));

        let session_id = pair(&manager, "alice", "bob").await;

        {
            let registry = manager.registry.lock().await;
            let session = &registry.sessions[&session_id];
            assert_eq!(session.party_a, id("alice"));
            assert_eq!(session.party_b, Seat::Human(id("bob")));
            assert_eq!(session.to_move(), Party::A);
            assert!(registry.waiting.is_empty());
        }

        let alice = broadcaster.match_started_for("alice");
        let bob = broadcaster.match_started_for("bob");
        assert_eq!(alice.len(), 1);
        assert_eq!(alice[0].opponent, "bob");
        assert!(alice[0].is_first_party);
        assert_eq!(bob[0].opponent, "alice");
        assert!(!bob[0].is_first_party);
        assert_eq!(bob[0].session_id, session_id.to_string());
        assert_eq!(bob[0].board.as_ref().map(|b| b.cells.iter().all(|&c| c == 0)), Some(true));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pairing_cancels_bot_timer() {
        let (manager, _broadcaster) = manager_with(MemoryStore::new(), settings(Duration::from_secs(10)));

        pair(&manager, "alice", "bob").await;
        tokio::time::sleep(Duration::from_secs(20)).await;

        assert_eq!(session_count(&manager).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_queue_pairs_in_arrival_order() {
        let (manager, _broadcaster) = manager_with(MemoryStore::new(), settings(Duration::from_secs(10)));

        pair(&manager, "alice", "bob").await;
        assert_eq!(manager.request_match(&id("carol")).await, Ok(MatchOutcome::Waiting));
        let session_id = match manager.request_match(&id("dave")).await {
            Ok(MatchOutcome::Paired(session_id)) => session_id,
            other => panic!("expected pairing, got {:?}", other),
        };

        let registry = manager.registry.lock().await;
        assert_eq!(registry.sessions[&session_id].party_a, id("carol"));
        assert_eq!(registry.sessions.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lone_player_gets_bot_after_delay() {
        let store = MemoryStore::new();
        let (manager, broadcaster) = manager_with(store.clone(), settings(Duration::from_secs(10)));

        manager.request_match(&id("alice")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(session_count(&manager).await, 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(session_count(&manager).await, 1);

        let started = broadcaster.match_started_for("alice");
        assert_eq!(started.len(), 1);
        assert_eq!(started[0].opponent, BOT_IDENTITY);
        assert!(started[0].opponent_is_bot);
        assert!(started[0].is_first_party);

        let session_id = SessionId::new(started[0].session_id.clone());
        let record = store.game(&session_id).await.unwrap().unwrap();
        assert_eq!(record.party_b, BOT_IDENTITY);
        assert_eq!(record.status, GameRecordStatus::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_delay_still_pairs_with_bot() {
        let (manager, _broadcaster) = manager_with(MemoryStore::new(), settings(Duration::ZERO));

        assert_eq!(manager.request_match(&id("alice")).await, Ok(MatchOutcome::Waiting));
        tokio::time::sleep(Duration::from_millis(1)).await;

        let registry = manager.registry.lock().await;
        assert!(registry.waiting.is_empty());
        assert_eq!(registry.sessions.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_player_never_pairs_with_themselves() {
        let (manager, _broadcaster) = manager_with(MemoryStore::new(), settings(Duration::from_secs(10)));

        manager.request_match(&id("alice")).await.unwrap();
        assert_eq!(manager.request_match(&id("alice")).await, Err(GameError::AlreadyWaiting));
        assert_eq!(session_count(&manager).await, 0);

        let session_id = match manager.request_match(&id("bob")).await {
            Ok(MatchOutcome::Paired(session_id)) => session_id,
            other => panic!("expected pairing, got {:?}", other),
        };
        assert_eq!(
            manager.request_match(&id("alice")).await,
            Err(GameError::AlreadyInGame(session_id))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_move_rejections() {
        let (manager, _broadcaster) = manager_with(MemoryStore::new(), settings(Duration::from_secs(10)));
        let session_id = pair(&manager, "alice", "bob").await;

        assert_eq!(
            manager.request_move(&id("alice"), &SessionId::from("nope"), 0).await,
            Err(GameError::SessionNotFound(SessionId::from("nope")))
        );
        assert_eq!(
            manager.request_move(&id("mallory"), &session_id, 0).await,
            Err(GameError::NotAParticipant(session_id.clone()))
        );
        assert_eq!(
            manager.request_move(&id("bob"), &session_id, 0).await,
            Err(GameError::NotYourTurn)
        );
        assert_eq!(
            manager.request_move(&id("alice"), &session_id, -1).await,
            Err(GameError::InvalidColumn(-1))
        );
        let outside = manager
            .request_move(&id("alice"), &session_id, COLUMNS as i32)
            .await
            .unwrap_err();
        assert_eq!(outside, GameError::InvalidMove(MoveError::ColumnOutOfRange(COLUMNS)));
        assert_eq!(outside.reason(), RejectReason::InvalidColumn);

        for _ in 0..3 {
            manager.request_move(&id("alice"), &session_id, 6).await.unwrap();
            manager.request_move(&id("bob"), &session_id, 6).await.unwrap();
        }
        assert_eq!(
            manager.request_move(&id("alice"), &session_id, 6).await,
            Err(GameError::InvalidMove(MoveError::ColumnFull(6)))
        );

        let registry = manager.registry.lock().await;
        let session = &registry.sessions[&session_id];
        assert_eq!(session.moves.len(), 6);
        assert_eq!(session.to_move(), Party::A);
    }

    #[tokio::test(start_paused = true)]
    async fn test_moves_are_persisted_and_broadcast() {
        let store = MemoryStore::new();
        let (manager, broadcaster) = manager_with(store.clone(), settings(Duration::from_secs(10)));
        let session_id = pair(&manager, "alice", "bob").await;

        manager.request_move(&id("alice"), &session_id, 3).await.unwrap();

        let record = store.game(&session_id).await.unwrap().unwrap();
        assert_eq!(record.moves.len(), 1);
        assert_eq!(record.next_to_move, Party::B);

        let seen_by_bob = broadcaster.moves_for("bob");
        assert_eq!(seen_by_bob.len(), 1);
        assert_eq!(seen_by_bob[0].column, 3);
        assert_eq!(seen_by_bob[0].row, 5);
        assert_eq!(seen_by_bob[0].party, 1);
        assert_eq!(seen_by_bob[0].next_to_move, 2);
        assert!(!seen_by_bob[0].over);
        assert_eq!(broadcaster.moves_for("alice"), seen_by_bob);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_client_does_not_freeze_other_sessions() {
        let broadcaster = crate::broadcaster::Broadcaster::new();
        let manager = SessionManager::new(MemoryStore::new(), broadcaster.clone(), settings(Duration::from_secs(10)));
        let (alice_tx, _alice_rx) = tokio::sync::mpsc::channel(16);
        let (bob_tx, _bob_rx) = tokio::sync::mpsc::channel(1);
        broadcaster.register(id("alice"), 1, alice_tx).await;
        broadcaster.register(id("bob"), 2, bob_tx).await;

        manager.request_match(&id("alice")).await.unwrap();
        let session_id = match manager.request_match(&id("bob")).await {
            Ok(MatchOutcome::Paired(session_id)) => session_id,
            other => panic!("expected pairing, got {:?}", other),
        };

        let traffic = async {
            manager.request_move(&id("alice"), &session_id, 3).await.unwrap();
            manager.request_match(&id("carol")).await
        };
        let outcome = tokio::time::timeout(Duration::from_secs(2), traffic)
            .await
            .expect("a full outbound queue stalled the session manager");
        assert_eq!(outcome, Ok(MatchOutcome::Waiting));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bot_replies_before_request_returns() {
        let (manager, broadcaster) = manager_with(MemoryStore::new(), settings(Duration::ZERO));
        manager.request_match(&id("alice")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        let session_id = SessionId::new(broadcaster.match_started_for("alice")[0].session_id.clone());

        manager.request_move(&id("alice"), &session_id, 3).await.unwrap();

        {
            let registry = manager.registry.lock().await;
            let session = &registry.sessions[&session_id];
            assert_eq!(session.moves.len(), 2);
            assert_eq!(session.moves[1].party, Party::B);
            assert_eq!(session.to_move(), Party::A);
        }

        let updates = broadcaster.moves_for("alice");
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].party, 1);
        assert_eq!(updates[1].party, 2);
        assert_eq!(updates[1].next_to_move, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_win_settles_stats_and_closes_session() {
        let store = MemoryStore::new();
        let (manager, broadcaster) = manager_with(store.clone(), settings(Duration::from_secs(10)));
        let session_id = pair(&manager, "alice", "bob").await;

        for column in 0..3 {
            manager.request_move(&id("alice"), &session_id, column).await.unwrap();
            manager.request_move(&id("bob"), &session_id, column).await.unwrap();
        }
        manager.request_move(&id("alice"), &session_id, 3).await.unwrap();

        assert_eq!(session_count(&manager).await, 0);
        assert_eq!(stats(&store, "alice").await, PlayerStats { wins: 1, losses: 0, draws: 0 });
        assert_eq!(stats(&store, "bob").await, PlayerStats { wins: 0, losses: 1, draws: 0 });

        let record = store.game(&session_id).await.unwrap().unwrap();
        assert_eq!(record.status, GameRecordStatus::Completed);
        assert_eq!(record.winner.as_deref(), Some("alice"));
        assert_eq!(record.moves.len(), 7);

        let last = broadcaster.moves_for("bob").pop().unwrap();
        assert!(last.over);
        assert_eq!(last.winner, 1);
        assert_eq!(last.next_to_move, 0);

        assert_eq!(
            manager.request_move(&id("bob"), &session_id, 4).await,
            Err(GameError::SessionNotFound(session_id))
        );
        assert_eq!(manager.request_match(&id("alice")).await, Ok(MatchOutcome::Waiting));
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_board_without_line_is_a_draw() {
        let store = MemoryStore::new();
        let (manager, broadcaster) = manager_with(store.clone(), settings(Duration::from_secs(10)));
        let session_id = pair(&manager, "alice", "bob").await;

        for (index, column) in DRAW_SEQUENCE.iter().enumerate() {
            let player = if index % 2 == 0 { "alice" } else { "bob" };
            manager
                .request_move(&id(player), &session_id, *column as i32)
                .await
                .unwrap();
        }

        assert_eq!(session_count(&manager).await, 0);
        assert_eq!(stats(&store, "alice").await, PlayerStats { wins: 0, losses: 0, draws: 1 });
        assert_eq!(stats(&store, "bob").await, PlayerStats { wins: 0, losses: 0, draws: 1 });

        let record = store.game(&session_id).await.unwrap().unwrap();
        assert!(record.is_draw);
        assert_eq!(record.winner, None);

        let last = broadcaster.moves_for("alice").pop().unwrap();
        assert!(last.over && last.is_draw);
        assert_eq!(last.winner, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bot_game_records_only_human_stats() {
        let store = MemoryStore::new();
        let (manager, broadcaster) = manager_with(store.clone(), settings(Duration::ZERO));
        manager.request_match(&id("alice")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        let session_id = SessionId::new(broadcaster.match_started_for("alice")[0].session_id.clone());

        for _ in 0..21 {
            if session_count(&manager).await == 0 {
                break;
            }
            let board = manager.registry.lock().await.sessions[&session_id].board;
            let column = board.legal_columns()[0];
            manager
                .request_move(&id("alice"), &session_id, column as i32)
                .await
                .unwrap();
        }

        assert_eq!(session_count(&manager).await, 0);
        assert_eq!(stats(&store, "alice").await.total_games(), 1);
        assert_eq!(store.player_stats(&id(BOT_IDENTITY)).await.unwrap(), None);
        assert_eq!(
            store.game(&session_id).await.unwrap().unwrap().status,
            GameRecordStatus::Completed
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_failures_do_not_block_the_game() {
        let (manager, broadcaster) = manager_with(FailingStore, settings(Duration::from_secs(10)));
        let session_id = pair(&manager, "alice", "bob").await;

        manager.request_move(&id("alice"), &session_id, 2).await.unwrap();
        manager.request_move(&id("bob"), &session_id, 2).await.unwrap();

        assert_eq!(broadcaster.moves_for("alice").len(), 2);
        let registry = manager.registry.lock().await;
        assert_eq!(registry.sessions[&session_id].moves.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_within_grace_keeps_the_game() {
        let (manager, broadcaster) = manager_with(MemoryStore::new(), settings(Duration::from_secs(10)));
        let session_id = pair(&manager, "alice", "bob").await;
        manager.request_move(&id("alice"), &session_id, 3).await.unwrap();

        manager.handle_disconnect(&id("bob")).await;
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(manager.request_reconnect(&id("bob")).await);
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(session_count(&manager).await, 1);
        assert!(broadcaster.disconnects_for("alice").is_empty());

        let resumed: Vec<MatchResumed> = broadcaster
            .messages_for("bob")
            .into_iter()
            .filter_map(|message| match message {
                server_message::Message::MatchResumed(resumed) => Some(resumed),
                _ => None,
            })
            .collect();
        assert_eq!(resumed.len(), 1);
        assert_eq!(resumed[0].next_to_move, 2);
        assert_eq!(resumed[0].opponent_a, "alice");
        assert_eq!(resumed[0].opponent_b, "bob");

        manager.request_move(&id("bob"), &session_id, 3).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_grace_expiry_forfeits_to_remaining_player() {
        let store = MemoryStore::new();
        let (manager, broadcaster) = manager_with(store.clone(), settings(Duration::from_secs(10)));
        let session_id = pair(&manager, "alice", "bob").await;

        manager.handle_disconnect(&id("bob")).await;
        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(session_count(&manager).await, 1);
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(session_count(&manager).await, 0);
        let notices = broadcaster.disconnects_for("alice");
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].disconnected_identity, "bob");
        assert_eq!(notices[0].winner, 1);
        assert_eq!(notices[0].winner_identity, "alice");

        assert_eq!(stats(&store, "alice").await.wins, 1);
        assert_eq!(stats(&store, "bob").await.losses, 1);
        let record = store.game(&session_id).await.unwrap().unwrap();
        assert_eq!(record.status, GameRecordStatus::Completed);
        assert_eq!(record.winner.as_deref(), Some("alice"));

        assert!(!manager.request_reconnect(&id("bob")).await);
        assert_eq!(
            manager.request_move(&id("bob"), &session_id, 0).await,
            Err(GameError::SessionNotFound(session_id))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_forfeit_to_bot_records_no_stats() {
        let store = MemoryStore::new();
        let (manager, broadcaster) = manager_with(store.clone(), settings(Duration::ZERO));
        manager.request_match(&id("alice")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(broadcaster.match_started_for("alice").len(), 1);

        manager.handle_disconnect(&id("alice")).await;
        tokio::time::sleep(Duration::from_secs(31)).await;

        assert_eq!(session_count(&manager).await, 0);
        assert_eq!(stats(&store, "alice").await.total_games(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_disconnect_restarts_grace() {
        let (manager, _broadcaster) = manager_with(MemoryStore::new(), settings(Duration::from_secs(10)));
        pair(&manager, "alice", "bob").await;

        manager.handle_disconnect(&id("bob")).await;
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(manager.request_reconnect(&id("bob")).await);
        tokio::time::sleep(Duration::from_secs(5)).await;
        manager.handle_disconnect(&id("bob")).await;

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(session_count(&manager).await, 1);

        tokio::time::sleep(Duration::from_secs(16)).await;
        assert_eq!(session_count(&manager).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_while_waiting_leaves_queue() {
        let (manager, broadcaster) = manager_with(MemoryStore::new(), settings(Duration::from_secs(10)));

        manager.request_match(&id("alice")).await.unwrap();
        manager.handle_disconnect(&id("alice")).await;
        tokio::time::sleep(Duration::from_secs(20)).await;

        assert_eq!(session_count(&manager).await, 0);
        assert!(broadcaster.match_started_for("alice").is_empty());
        assert_eq!(manager.request_match(&id("bob")).await, Ok(MatchOutcome::Waiting));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_without_session_is_a_no_op() {
        let (manager, broadcaster) = manager_with(MemoryStore::new(), settings(Duration::from_secs(10)));

        assert!(!manager.request_reconnect(&id("ghost")).await);
        manager.handle_disconnect(&id("ghost")).await;

        assert!(broadcaster.messages_for("ghost").is_empty());
    }
}
