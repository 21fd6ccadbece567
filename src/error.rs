//! Error types for the rules engine.
//!
//! None of these are fatal: every variant describes input the caller can
//! correct and retry.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChessError {
    /// The move is not in the legal-move set of the side to move.
    #[error("Illegal move: {mv}")]
    IllegalMove { mv: String },

    #[error("Invalid square `{0}` (expected a file a-h and a rank 1-8)")]
    InvalidSquare(String),

    /// Coordinate text that is not four/five characters of `<from><to>[promo]`.
    #[error("Invalid move text `{0}` (expected e.g. e2e4 or e7e8q)")]
    InvalidMoveText(String),

    #[error("No {color} piece on {square}")]
    NoPieceToMove { square: String, color: String },

    #[error("Invalid FEN: {0}")]
    InvalidFen(String),

    #[error("Invalid PGN: {0}")]
    InvalidPgn(String),

    #[error("Could not match SAN move `{0}` against the legal moves")]
    UnresolvedSan(String),
}

pub type ChessResult<T> = Result<T, ChessError>;
