mod board;
mod bot_controller;
mod types;
mod win_detector;

pub use board::{Board, MoveError, Placement, COLUMNS, ROWS, WIN_LENGTH};
pub use bot_controller::{
    BotInput, Difficulty, SearchResult, calculate_move, search_best_move, select_move,
    select_move_easy,
};
pub use types::{GameStatus, Move, Party, party_to_proto};
pub use win_detector::detect_win;
