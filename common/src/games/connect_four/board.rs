use thiserror::Error;

use super::types::{GameStatus, Party};
use super::win_detector::detect_win;

pub const ROWS: usize = 6;
pub const COLUMNS: usize = 7;
pub const WIN_LENGTH: usize = 4;

const WINDOW_DIRECTIONS: [(isize, isize); 4] = [(0, 1), (1, 0), (1, 1), (1, -1)];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MoveError {
    #[error("Invalid column {0}: outside the board")]
    ColumnOutOfRange(usize),
    #[error("Invalid column {0}: column is full")]
    ColumnFull(usize),
}

/// Row 0 is the top of the board; pieces fall towards row `ROWS - 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Board {
    cells: [[Option<Party>; COLUMNS]; ROWS],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub board: Board,
    pub row: usize,
    pub column: usize,
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    pub fn new() -> Self {
        Self {
            cells: [[None; COLUMNS]; ROWS],
        }
    }

    pub fn get(&self, row: usize, column: usize) -> Option<Party> {
        self.cells[row][column]
    }

    pub fn is_column_full(&self, column: usize) -> bool {
        self.cells[0][column].is_some()
    }

    /// Returns a new board with the piece dropped into `column`; `self` is left untouched.
    pub fn apply_move(&self, column: usize, party: Party) -> Result<Placement, MoveError> {
        if column >= COLUMNS {
            return Err(MoveError::ColumnOutOfRange(column));
        }
        if self.is_column_full(column) {
            return Err(MoveError::ColumnFull(column));
        }

        let row = (0..ROWS)
            .rev()
            .find(|&row| self.cells[row][column].is_none())
            .ok_or(MoveError::ColumnFull(column))?;

        let mut board = *self;
        board.cells[row][column] = Some(party);
        Ok(Placement { board, row, column })
    }

    /// Gravity keeps columns packed, so a full top row means a full board.
    pub fn is_full(&self) -> bool {
        self.cells[0].iter().all(|cell| cell.is_some())
    }

    pub fn legal_columns(&self) -> Vec<usize> {
        (0..COLUMNS).filter(|&column| !self.is_column_full(column)).collect()
    }

    pub fn status(&self, last_row: usize, last_col: usize, party: Party) -> GameStatus {
        if detect_win(self, last_row, last_col, party) {
            GameStatus::Won(party)
        } else if self.is_full() {
            GameStatus::Draw
        } else {
            GameStatus::InProgress
        }
    }

    /// Static positional score for `party` summed over every four-cell window.
    pub fn score(&self, party: Party) -> i32 {
        let mut score = 0;
        for row in 0..ROWS {
            for col in 0..COLUMNS {
                for (dr, dc) in WINDOW_DIRECTIONS {
                    score += self.window_score(row, col, dr, dc, party);
                }
            }
        }
        score
    }

    fn window_score(&self, row: usize, col: usize, dr: isize, dc: isize, party: Party) -> i32 {
        let last = (WIN_LENGTH - 1) as isize;
        let end_row = row as isize + dr * last;
        let end_col = col as isize + dc * last;
        if end_row < 0 || end_row >= ROWS as isize || end_col < 0 || end_col >= COLUMNS as isize {
            return 0;
        }

        let mut own = 0;
        for i in 0..WIN_LENGTH as isize {
            let r = (row as isize + dr * i) as usize;
            let c = (col as isize + dc * i) as usize;
            match self.cells[r][c] {
                Some(p) if p == party => own += 1,
                Some(_) => return 0,
                None => {}
            }
        }

        match own {
            4 => 100_000,
            3 => 1_000,
            2 => 100,
            1 => 10,
            _ => 0,
        }
    }

    pub fn to_proto(&self) -> crate::proto::Board {
        let cells = self
            .cells
            .iter()
            .flatten()
            .map(|cell| cell.map(|p| p.to_proto()).unwrap_or(0))
            .collect();

        crate::proto::Board {
            rows: ROWS as u32,
            columns: COLUMNS as u32,
            cells,
        }
    }

    /// Test helper: rows from top to bottom, `A`/`B` for pieces, anything else empty.
    #[cfg(test)]
    pub(crate) fn from_rows(rows: &[&str; ROWS]) -> Self {
        let mut board = Self::new();
        for (r, line) in rows.iter().enumerate() {
            for (c, ch) in line.chars().take(COLUMNS).enumerate() {
                board.cells[r][c] = match ch {
                    'A' => Some(Party::A),
                    'B' => Some(Party::B),
                    _ => None,
                };
            }
        }
        board
    }
}
