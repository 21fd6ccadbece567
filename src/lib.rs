pub mod board;
pub mod cli;
pub mod error;
pub mod evaluation;
pub mod fen;
pub mod game_state;
pub mod movegen;
pub mod pgn;
pub mod piece;
pub mod search;

pub use board::{Board, Square};
pub use error::{ChessError, ChessResult};
pub use evaluation::{evaluate, Evaluator};
pub use game_state::{perft, GameState, GameStatus};
pub use movegen::Move;
pub use piece::{Color, Piece, PieceType};
pub use search::{choose_best_move, Search, SearchConfig, SearchReport};
