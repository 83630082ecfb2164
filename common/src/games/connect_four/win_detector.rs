use super::board::{Board, COLUMNS, ROWS, WIN_LENGTH};
use super::types::Party;

const DIRECTIONS: [(isize, isize); 4] = [(0, 1), (1, 0), (1, 1), (1, -1)];

/// Only the cell just played can complete a new line, so scanning the four
/// axes through it is enough.
pub fn detect_win(board: &Board, last_row: usize, last_col: usize, party: Party) -> bool {
    DIRECTIONS
        .iter()
        .any(|&(dr, dc)| line_length(board, last_row, last_col, dr, dc, party) >= WIN_LENGTH)
}

fn line_length(board: &Board, row: usize, col: usize, dr: isize, dc: isize, party: Party) -> usize {
    let mut count = 1;
    count += run_length(board, row, col, dr, dc, party);
    count += run_length(board, row, col, -dr, -dc, party);
    count
}

fn run_length(board: &Board, row: usize, col: usize, dr: isize, dc: isize, party: Party) -> usize {
    let mut count = 0;
    let mut r = row as isize + dr;
    let mut c = col as isize + dc;
    while r >= 0 && r < ROWS as isize && c >= 0 && c < COLUMNS as isize {
        if board.get(r as usize, c as usize) != Some(party) {
            break;
        }
        count += 1;
        r += dr;
        c += dc;
    }
    count
}
