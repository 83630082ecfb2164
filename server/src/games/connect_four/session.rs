use std::collections::HashMap;

use common::games::connect_four::{Board, GameStatus, Move, Party};
use common::{BOT_IDENTITY, PlayerId, SessionId};

use crate::error::GameError;
use crate::store::{GameRecord, GameRecordStatus};
use crate::timers::{TimerHandle, TimerId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Seat {
    Human(PlayerId),
    Bot,
}

impl Seat {
    pub fn identity(&self) -> &str {
        match self {
            Seat::Human(player) => player.as_str(),
            Seat::Bot => BOT_IDENTITY,
        }
    }

    pub fn human(&self) -> Option<&PlayerId> {
        match self {
            Seat::Human(player) => Some(player),
            Seat::Bot => None,
        }
    }

    pub fn is_bot(&self) -> bool {
        matches!(self, Seat::Bot)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedMove {
    pub mv: Move,
    pub status: GameStatus,
}

/// One running game. Party A always moves first; a bot, when present, sits in B.
#[derive(Debug)]
pub struct GameSession {
    pub id: SessionId,
    pub party_a: PlayerId,
    pub party_b: Seat,
    pub board: Board,
    pub moves: Vec<Move>,
    to_move: Party,
    status: GameStatus,
    disconnect_timers: HashMap<PlayerId, TimerHandle>,
}

impl GameSession {
    pub fn new(id: SessionId, party_a: PlayerId, party_b: Seat) -> Self {
        Self {
            id,
            party_a,
            party_b,
            board: Board::new(),
            moves: Vec::new(),
            to_move: Party::A,
            status: GameStatus::InProgress,
            disconnect_timers: HashMap::new(),
        }
    }

    pub fn seat(&self, party: Party) -> Seat {
        match party {
            Party::A => Seat::Human(self.party_a.clone()),
            Party::B => self.party_b.clone(),
        }
    }

    pub fn identity_of(&self, party: Party) -> &str {
        match party {
            Party::A => self.party_a.as_str(),
            Party::B => self.party_b.identity(),
        }
    }

    pub fn party_of(&self, player: &PlayerId) -> Option<Party> {
        if &self.party_a == player {
            Some(Party::A)
        } else if self.party_b.human() == Some(player) {
            Some(Party::B)
        } else {
            None
        }
    }

    pub fn humans(&self) -> Vec<PlayerId> {
        let mut humans = vec![self.party_a.clone()];
        humans.extend(self.party_b.human().cloned());
        humans
    }

    pub fn has_bot(&self) -> bool {
        self.party_b.is_bot()
    }

    pub fn to_move(&self) -> Party {
        self.to_move
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn is_over(&self) -> bool {
        self.status.is_over()
    }

    pub fn is_bot_turn(&self) -> bool {
        !self.is_over() && self.seat(self.to_move).is_bot()
    }

    pub fn winner(&self) -> Option<Party> {
        self.status.winner()
    }

    pub fn winner_identity(&self) -> Option<String> {
        self.winner().map(|party| self.identity_of(party).to_string())
    }

    /// A human move: checks the game is live, the player sits here and it is their turn.
    pub fn play(&mut self, player: &PlayerId, column: usize) -> Result<AppliedMove, GameError> {
        if self.is_over() {
            return Err(GameError::GameAlreadyOver);
        }
        let party = self
            .party_of(player)
            .ok_or_else(|| GameError::NotAParticipant(self.id.clone()))?;
        if party != self.to_move {
            return Err(GameError::NotYourTurn);
        }
        self.apply_move(party, column)
    }

    /// Drops a piece for `party`. A rejected move leaves the session untouched.
    pub fn apply_move(&mut self, party: Party, column: usize) -> Result<AppliedMove, GameError> {
        if self.is_over() {
            return Err(GameError::GameAlreadyOver);
        }
        if party != self.to_move {
            return Err(GameError::NotYourTurn);
        }

        let placement = self.board.apply_move(column, party)?;
        let mv = Move {
            party,
            column: placement.column,
            row: placement.row,
        };

        self.board = placement.board;
        self.moves.push(mv);
        self.status = self.board.status(placement.row, placement.column, party);
        if !self.status.is_over() {
            self.to_move = party.opponent();
        }

        Ok(AppliedMove { mv, status: self.status })
    }

    /// Ends the game in favour of the party opposite `loser`.
    pub fn forfeit(&mut self, loser: Party) {
        self.status = GameStatus::Won(loser.opponent());
    }

    pub fn to_record(&self) -> GameRecord {
        GameRecord {
            session_id: self.id.clone(),
            party_a: self.party_a.to_string(),
            party_b: self.party_b.identity().to_string(),
            board: self.board,
            moves: self.moves.clone(),
            next_to_move: self.to_move,
            status: if self.is_over() {
                GameRecordStatus::Completed
            } else {
                GameRecordStatus::Active
            },
            winner: self.winner_identity(),
            is_draw: self.status.is_draw(),
        }
    }

    /// Replaces any grace timer already pending for `player`.
    pub fn arm_disconnect_timer(&mut self, player: PlayerId, timer: TimerHandle) {
        if let Some(previous) = self.disconnect_timers.insert(player, timer) {
            previous.cancel();
        }
    }

    pub fn cancel_disconnect_timer(&mut self, player: &PlayerId) -> bool {
        match self.disconnect_timers.remove(player) {
            Some(timer) => {
                timer.cancel();
                true
            }
            None => false,
        }
    }

    /// Detaches the timer without aborting it, so a firing timer can keep running.
    pub fn take_disconnect_timer(&mut self, player: &PlayerId, timer_id: TimerId) -> bool {
        if self.disconnect_timers.get(player).map(TimerHandle::id) == Some(timer_id) {
            self.disconnect_timers.remove(player);
            true
        } else {
            false
        }
    }

    pub fn cancel_all_timers(&mut self) {
        for (_, timer) in self.disconnect_timers.drain() {
            timer.cancel();
        }
    }
}
