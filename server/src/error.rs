use thiserror::Error;

use common::games::connect_four::MoveError;
use common::{RejectReason, RequestRejected, ServerMessage, SessionId, server_message};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    RuleViolation,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),
    #[error("Invalid column {0}")]
    InvalidColumn(i32),
    #[error("Malformed message: {0}")]
    MalformedMessage(String),
    #[error("Join or reconnect before sending moves")]
    NotJoined,
    #[error("Game {0} not found")]
    SessionNotFound(SessionId),
    #[error("Game is already over")]
    GameAlreadyOver,
    #[error("Not your turn")]
    NotYourTurn,
    #[error("Not a player in game {0}")]
    NotAParticipant(SessionId),
    #[error("Already waiting for an opponent")]
    AlreadyWaiting,
    #[error("Already playing game {0}")]
    AlreadyInGame(SessionId),
    #[error(transparent)]
    InvalidMove(#[from] MoveError),
}

impl GameError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GameError::InvalidIdentity(_)
            | GameError::InvalidColumn(_)
            | GameError::MalformedMessage(_)
            | GameError::InvalidMove(MoveError::ColumnOutOfRange(_)) => ErrorKind::Validation,
            _ => ErrorKind::RuleViolation,
        }
    }

    pub fn reason(&self) -> RejectReason {
        match self {
            GameError::InvalidIdentity(_) => RejectReason::InvalidIdentity,
            GameError::InvalidColumn(_) => RejectReason::InvalidColumn,
            GameError::MalformedMessage(_) => RejectReason::MalformedMessage,
            GameError::NotJoined => RejectReason::NotJoined,
            GameError::SessionNotFound(_) => RejectReason::SessionNotFound,
            GameError::GameAlreadyOver => RejectReason::GameAlreadyOver,
            GameError::NotYourTurn => RejectReason::NotYourTurn,
            GameError::NotAParticipant(_) => RejectReason::NotAParticipant,
            GameError::AlreadyWaiting => RejectReason::AlreadyWaiting,
            GameError::AlreadyInGame(_) => RejectReason::AlreadyInGame,
            GameError::InvalidMove(MoveError::ColumnOutOfRange(_)) => RejectReason::InvalidColumn,
            GameError::InvalidMove(MoveError::ColumnFull(_)) => RejectReason::ColumnFull,
        }
    }

    pub fn to_server_message(&self) -> ServerMessage {
        ServerMessage {
            message: Some(server_message::Message::RequestRejected(RequestRejected {
                reason: self.reason().into(),
                message: self.to_string(),
            })),
        }
    }
}
