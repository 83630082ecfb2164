use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Party {
    A,
    B,
}

impl Party {
    pub fn opponent(&self) -> Party {
        match self {
            Party::A => Party::B,
            Party::B => Party::A,
        }
    }

    /// Wire number: A is 1, B is 2. Zero is reserved for "nobody".
    pub fn to_proto(&self) -> u32 {
        match self {
            Party::A => 1,
            Party::B => 2,
        }
    }
}

pub fn party_to_proto(party: Option<Party>) -> u32 {
    party.map(|p| p.to_proto()).unwrap_or(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Move {
    pub party: Party,
    pub column: usize,
    pub row: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStatus {
    InProgress,
    Won(Party),
    Draw,
}

impl GameStatus {
    pub fn is_over(&self) -> bool {
        !matches!(self, GameStatus::InProgress)
    }

    pub fn winner(&self) -> Option<Party> {
        match self {
            GameStatus::Won(party) => Some(*party),
            _ => None,
        }
    }

    pub fn is_draw(&self) -> bool {
        matches!(self, GameStatus::Draw)
    }
}
