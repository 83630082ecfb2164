use serde::{Deserialize, Serialize};

use crate::games::SessionRng;
use super::board::Board;
use super::types::{GameStatus, Party};

const WIN_SCORE: i32 = 100_000;

/// Fallback order for the easy bot, centre column first.
const CENTER_PREFERENCE: [usize; 7] = [3, 2, 4, 1, 5, 0, 6];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Hard,
    Easy,
}

#[derive(Debug, Clone, Copy)]
pub struct BotInput {
    pub board: Board,
    pub bot: Party,
    pub depth: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchResult {
    pub column: Option<usize>,
    pub score: i32,
}

pub fn calculate_move(difficulty: Difficulty, input: &BotInput, rng: &mut SessionRng) -> Option<usize> {
    match difficulty {
        Difficulty::Hard => select_move(input),
        Difficulty::Easy => select_move_easy(&input.board, input.bot, rng),
    }
}

/// Immediate win, then immediate block, then alpha-beta search to `input.depth` plies.
pub fn select_move(input: &BotInput) -> Option<usize> {
    let legal = input.board.legal_columns();
    if legal.is_empty() {
        return None;
    }

    if let Some(column) = find_winning_move(&input.board, input.bot, &legal) {
        return Some(column);
    }

    if let Some(column) = find_winning_move(&input.board, input.bot.opponent(), &legal) {
        return Some(column);
    }

    search_best_move(&input.board, input.bot, input.depth).column
}

pub fn select_move_easy(board: &Board, bot: Party, rng: &mut SessionRng) -> Option<usize> {
    let legal = board.legal_columns();
    if legal.is_empty() {
        return None;
    }

    if let Some(column) = find_winning_move(board, bot, &legal) {
        return Some(column);
    }

    if let Some(column) = find_winning_move(board, bot.opponent(), &legal) {
        return Some(column);
    }

    if let Some(&column) = CENTER_PREFERENCE.iter().find(|column| legal.contains(column)) {
        return Some(column);
    }

    let idx = rng.random_range(0..legal.len());
    Some(legal[idx])
}

fn find_winning_move(board: &Board, party: Party, legal: &[usize]) -> Option<usize> {
    legal.iter().copied().find(|&column| {
        board
            .apply_move(column, party)
            .map(|placement| placement.board.status(placement.row, column, party) == GameStatus::Won(party))
            .unwrap_or(false)
    })
}

/// Alpha-beta minimax with `bot` to move at the root.
pub fn search_best_move(board: &Board, bot: Party, max_depth: usize) -> SearchResult {
    minimax(board, bot, bot, 0, max_depth, i32::MIN, i32::MAX)
}

fn evaluate(board: &Board, bot: Party) -> i32 {
    board.score(bot) - board.score(bot.opponent())
}

fn terminal_score(status: GameStatus, bot: Party, depth: usize) -> Option<i32> {
    match status {
        GameStatus::InProgress => None,
        GameStatus::Draw => Some(0),
        GameStatus::Won(winner) if winner == bot => Some(WIN_SCORE - depth as i32),
        GameStatus::Won(_) => Some(-WIN_SCORE + depth as i32),
    }
}

fn minimax(
    board: &Board,
    to_move: Party,
    bot: Party,
    depth: usize,
    max_depth: usize,
    mut alpha: i32,
    mut beta: i32,
) -> SearchResult {
    if depth >= max_depth {
        return SearchResult { column: None, score: evaluate(board, bot) };
    }

    let moves = board.legal_columns();
    if moves.is_empty() {
        return SearchResult { column: None, score: evaluate(board, bot) };
    }

    let is_maximizing = to_move == bot;
    let mut best_column = moves[0];
    let mut best_score = if is_maximizing { i32::MIN } else { i32::MAX };

    for column in moves {
        let Ok(placement) = board.apply_move(column, to_move) else {
            continue;
        };

        let status = placement.board.status(placement.row, column, to_move);
        let score = match terminal_score(status, bot, depth) {
            Some(score) => score,
            None => {
                minimax(&placement.board, to_move.opponent(), bot, depth + 1, max_depth, alpha, beta)
                    .score
            }
        };

        if is_maximizing {
            if score > best_score {
                best_score = score;
                best_column = column;
            }
            alpha = alpha.max(score);
        } else {
            if score < best_score {
                best_score = score;
                best_column = column;
            }
            beta = beta.min(score);
        }

        if beta <= alpha {
            break;
        }
    }

    SearchResult { column: Some(best_column), score: best_score }
}
