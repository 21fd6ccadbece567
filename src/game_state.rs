use std::collections::HashMap;
use std::fmt;
use std::fmt::Write as _;

use tracing::{debug, info, Level};

use crate::board::{Board, Square};
use crate::error::{ChessError, ChessResult};
use crate::movegen::Move;
use crate::piece::{Color, PieceType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStatus {
    Ongoing,
    Checkmate { winner: Color },
    Stalemate,
    FiftyMoveRule,
    ThreefoldRepetition,
}

impl GameStatus {
    pub fn is_over(&self) -> bool {
        *self != GameStatus::Ongoing
    }

    /// PGN result token.
    pub fn result_token(&self) -> &'static str {
        match self {
            GameStatus::Ongoing => "*",
            GameStatus::Checkmate { winner: Color::White } => "1-0",
            GameStatus::Checkmate { winner: Color::Black } => "0-1",
            GameStatus::Stalemate | GameStatus::FiftyMoveRule | GameStatus::ThreefoldRepetition => "1/2-1/2",
        }
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GameStatus::Ongoing => write!(f, "Game in progress"),
            GameStatus::Checkmate { winner } => {
                write!(f, "Checkmate! {} is checkmated, {} wins", winner.opposite(), winner)
            }
            GameStatus::Stalemate => write!(f, "Stalemate"),
            GameStatus::FiftyMoveRule => write!(f, "Draw by 50-move rule"),
            GameStatus::ThreefoldRepetition => write!(f, "Draw by threefold repetition"),
        }
    }
}

/// State that `Board::undo_move` cannot recover on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UndoInfo {
    en_passant_target: Option<Square>,
    halfmove_clock: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct HistoryEntry {
    mv: Move,
    undo: UndoInfo,
}

/// Owns the board plus everything the rules need beyond placement: turn,
/// en passant target, fifty-move clock, history and the repetition table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameState {
    pub(crate) board: Board,
    pub(crate) turn: Color,
    pub(crate) en_passant_target: Option<Square>,
    pub(crate) halfmove_clock: u32,
    history: Vec<HistoryEntry>,
    redo_stack: Vec<Move>,
    position_history: HashMap<String, u32>,
    // Full-move number and side to move of the position the game began from.
    pub(crate) start_fullmove: u32,
    pub(crate) start_turn: Color,
}

impl GameState {
    pub fn new() -> Self {
        GameState::from_position(Board::new(), Color::White, None, 0)
    }

    /// Starts a game from an arbitrary position. The position itself counts
    /// as the first occurrence for repetition purposes.
    pub fn from_position(
        board: Board,
        turn: Color,
        en_passant_target: Option<Square>,
        halfmove_clock: u32,
    ) -> Self {
        let mut state = Self {
            board,
            turn,
            en_passant_target,
            halfmove_clock,
            history: Vec::new(),
            redo_stack: Vec::new(),
            position_history: HashMap::new(),
            start_fullmove: 1,
            start_turn: turn,
        };
        state.record_position();
        state
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn turn(&self) -> Color {
        self.turn
    }

    pub fn en_passant_target(&self) -> Option<Square> {
        self.en_passant_target
    }

    pub fn halfmove_clock(&self) -> u32 {
        self.halfmove_clock
    }

    pub fn move_history(&self) -> impl Iterator<Item = &Move> + '_ {
        self.history.iter().map(|entry| &entry.mv)
    }

    pub fn moves_played(&self) -> usize {
        self.history.len()
    }

    /// Starts at the game's first full-move number and increments after
    /// each Black move.
    pub fn fullmove_number(&self) -> u32 {
        let black_first = usize::from(self.start_turn == Color::Black);
        let completed = (self.history.len() + black_first) / 2;
        self.start_fullmove.saturating_add(u32::try_from(completed).unwrap_or(u32::MAX))
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn position_count(&self, key: &str) -> u32 {
        self.position_history.get(key).copied().unwrap_or(0)
    }

    pub fn legal_moves(&self) -> Vec<Move> {
        self.legal_moves_for(self.turn)
    }

    /// Pseudo-legal moves of `color` that do not leave its own king attacked.
    /// The en passant target only applies to the side to move.
    pub fn legal_moves_for(&self, color: Color) -> Vec<Move> {
        let en_passant = if color == self.turn {
            self.en_passant_target
        } else {
            None
        };
        let mut scratch = self.board.clone();
        let candidates = scratch.generate_pseudo_legal_moves(color, en_passant);
        candidates
            .into_iter()
            .filter(|mv| {
                scratch.apply_move(mv);
                let safe = !scratch.is_king_attacked(color);
                scratch.undo_move(mv);
                safe
            })
            .collect()
    }

    fn has_legal_move(&self) -> bool {
        let mut scratch = self.board.clone();
        let candidates = scratch.generate_pseudo_legal_moves(self.turn, self.en_passant_target);
        candidates.iter().any(|mv| {
            scratch.apply_move(mv);
            let safe = !scratch.is_king_attacked(self.turn);
            scratch.undo_move(mv);
            safe
        })
    }

    pub fn in_check(&self, color: Color) -> bool {
        self.board.is_king_attacked(color)
    }

    /// Parses `e2e4` / `e7e8q` against the current board. Only the format and
    /// the mover's ownership are checked here; legality is `make_move`'s job.
    pub fn parse_move(&self, text: &str) -> ChessResult<Move> {
        let text = text.trim();
        let invalid = || ChessError::InvalidMoveText(text.to_string());
        if !text.is_ascii() || !(text.len() == 4 || text.len() == 5) {
            return Err(invalid());
        }
        let from: Square = text[0..2].parse().map_err(|_| invalid())?;
        let to: Square = text[2..4].parse().map_err(|_| invalid())?;
        let promotion = match text[4..].chars().next() {
            None => None,
            Some(letter) => match PieceType::from_letter(letter) {
                Some(kind) if PieceType::PROMOTIONS.contains(&kind) => Some(kind),
                _ => return Err(invalid()),
            },
        };

        let piece = self
            .board
            .piece_at(from)
            .filter(|piece| piece.color == self.turn)
            .ok_or_else(|| ChessError::NoPieceToMove {
                square: from.to_string(),
                color: self.turn.to_string(),
            })?;

        let mut mv = match self.board.piece_at(to) {
            Some(target) => Move::new_capture(from, to, piece, target),
            None => Move::new(from, to, piece),
        };
        mv.promotion = promotion;
        Ok(mv)
    }

    /// Commits a move to the game. The request matches a legal move by its
    /// squares; the matched move supplies capture/castling metadata and the
    /// request only picks the promotion piece (queen when unspecified).
    pub fn make_move(&mut self, requested: &Move) -> ChessResult<Move> {
        let legal = self.legal_moves();
        let Some(matched) = legal.iter().find(|mv| mv.same_squares(requested)) else {
            debug!(mv = %requested, turn = %self.turn, "rejected illegal move");
            return Err(ChessError::IllegalMove {
                mv: requested.to_string(),
            });
        };

        let mut mv = *matched;
        if mv.promotion.is_some() {
            let choice = requested
                .promotion
                .filter(|kind| PieceType::PROMOTIONS.contains(kind))
                .unwrap_or(PieceType::Queen);
            mv.promotion = Some(choice);
        }

        self.commit(mv);
        self.redo_stack.clear();
        debug!(mv = %mv, halfmove_clock = self.halfmove_clock, "move committed");

        if tracing::enabled!(Level::INFO) {
            let status = self.status();
            if status.is_over() {
                info!(%status, moves = self.history.len(), "game over");
            }
        }
        Ok(mv)
    }

    pub fn undo_last_move(&mut self) -> bool {
        let Some(entry) = self.history.pop() else {
            return false;
        };
        self.release_position();
        self.unmake_search_move(&entry.mv, entry.undo);
        self.redo_stack.push(entry.mv);
        debug!(mv = %entry.mv, "move undone");
        true
    }

    pub fn redo_last_move(&mut self) -> bool {
        let Some(mv) = self.redo_stack.pop() else {
            return false;
        };
        self.commit(mv);
        debug!(mv = %mv, "move redone");
        true
    }

    /// Draws are checked before the side to move runs out of moves.
    pub fn status(&self) -> GameStatus {
        if self.halfmove_clock >= 100 {
            return GameStatus::FiftyMoveRule;
        }
        if self.position_history.values().any(|&count| count >= 3) {
            return GameStatus::ThreefoldRepetition;
        }
        if self.has_legal_move() {
            return GameStatus::Ongoing;
        }
        if self.in_check(self.turn) {
            GameStatus::Checkmate {
                winner: self.turn.opposite(),
            }
        } else {
            GameStatus::Stalemate
        }
    }

    pub fn is_game_over(&self) -> bool {
        self.status().is_over()
    }

    /// Applies a move for exploration: board, turn, en passant target and
    /// clock change, but history and the repetition table do not.
    pub fn make_search_move(&mut self, mv: &Move) -> UndoInfo {
        let undo = UndoInfo {
            en_passant_target: self.en_passant_target,
            halfmove_clock: self.halfmove_clock,
        };

        self.en_passant_target = None;
        if mv.piece.kind == PieceType::Pawn && mv.from.row.abs_diff(mv.to.row) == 2 {
            let passed = (mv.from.row + mv.to.row) / 2;
            self.en_passant_target = Some(Square::new(passed, mv.from.col));
        }

        if mv.piece.kind == PieceType::Pawn || mv.is_capture() {
            self.halfmove_clock = 0;
        } else {
            self.halfmove_clock = self.halfmove_clock.saturating_add(1);
        }

        self.board.apply_move(mv);
        self.turn = self.turn.opposite();
        undo
    }

    pub fn unmake_search_move(&mut self, mv: &Move, undo: UndoInfo) {
        self.turn = self.turn.opposite();
        self.board.undo_move(mv);
        self.en_passant_target = undo.en_passant_target;
        self.halfmove_clock = undo.halfmove_clock;
    }

    fn commit(&mut self, mv: Move) {
        let undo = self.make_search_move(&mv);
        self.history.push(HistoryEntry { mv, undo });
        self.record_position();
    }

    fn record_position(&mut self) {
        *self.position_history.entry(self.position_key()).or_insert(0) += 1;
    }

    fn release_position(&mut self) {
        let key = self.position_key();
        if let Some(count) = self.position_history.get_mut(&key) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.position_history.remove(&key);
            }
        }
    }

    /// Piece layout, side to move and en passant square, e.g.
    /// `rnbqkbnr/pppppppp/......../......../....P.../......../PPPP.PPP/RNBQKBNR b e3`.
    pub fn position_key(&self) -> String {
        let mut key = String::with_capacity(80);
        for row in 0..8u8 {
            if row > 0 {
                key.push('/');
            }
            for col in 0..8u8 {
                let symbol = self
                    .board
                    .piece_at(Square::new(row, col))
                    .map(|p| p.symbol())
                    .unwrap_or('.');
                key.push(symbol);
            }
        }
        key.push(' ');
        key.push(match self.turn {
            Color::White => 'w',
            Color::Black => 'b',
        });
        key.push(' ');
        match self.en_passant_target {
            Some(square) => {
                let _ = write!(key, "{}", square);
            }
            None => key.push('-'),
        }
        key
    }

    /// Numbered coordinate moves, one full move per line.
    pub fn history_text(&self) -> String {
        let moves: Vec<&Move> = self.move_history().collect();
        moves
            .chunks(2)
            .enumerate()
            .map(|(i, pair)| {
                let line = pair.iter().map(|mv| mv.to_string()).collect::<Vec<_>>().join(" ");
                format!("{}. {}", i + 1, line)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for GameState {
    fn default() -> Self {
        GameState::new()
    }
}

/// Counts the leaf nodes of the legal-move tree `depth` plies deep.
pub fn perft(state: &mut GameState, depth: u32) -> u64 {
    if depth == 0 {
        return 1;
    }
    let moves = state.legal_moves();
    if depth == 1 {
        return moves.len() as u64;
    }
    let mut nodes = 0;
    for mv in &moves {
        let undo = state.make_search_move(mv);
        nodes += perft(state, depth - 1);
        state.unmake_search_move(mv, undo);
    }
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::piece::Piece;

    fn play(state: &mut GameState, moves: &[&str]) {
        for text in moves {
            let mv = state.parse_move(text).unwrap();
            state.make_move(&mv).unwrap();
        }
    }

    fn sq(name: &str) -> Square {
        name.parse().unwrap()
    }

    #[test]
    fn test_initial_state() {
        let state = GameState::new();
        assert_eq!(state.turn(), Color::White);
        assert_eq!(state.legal_moves().len(), 20);
        assert_eq!(state.status(), GameStatus::Ongoing);
        assert_eq!(state.position_count(&state.position_key()), 1);
    }

    #[test]
    fn test_illegal_move_leaves_state_untouched() {
        let mut state = GameState::new();
        let before = state.clone();
        let mv = state.parse_move("e2e5").unwrap();
        let err = state.make_move(&mv).unwrap_err();
        assert!(err.to_string().starts_with("Illegal move"));
        assert_eq!(state, before);
    }

    #[test]
    fn test_cannot_leave_king_in_check() {
        // Pinned knight on e2 cannot move.
        let mut board = Board::empty();
        board.set_piece(sq("e1"), Some(Piece::new(Color::White, PieceType::King)));
        board.set_piece(sq("e2"), Some(Piece::new(Color::White, PieceType::Knight)));
        board.set_piece(sq("e8"), Some(Piece::new(Color::Black, PieceType::Rook)));
        board.set_piece(sq("a8"), Some(Piece::new(Color::Black, PieceType::King)));
        let state = GameState::from_position(board, Color::White, None, 0);
        assert!(state.legal_moves().iter().all(|mv| mv.from != sq("e2")));
    }

    #[test]
    fn test_parse_move_rejects_bad_input() {
        let state = GameState::new();
        assert!(matches!(state.parse_move("e2"), Err(ChessError::InvalidMoveText(_))));
        assert!(matches!(state.parse_move("z2e4"), Err(ChessError::InvalidMoveText(_))));
        assert!(matches!(state.parse_move("e7e8k"), Err(ChessError::InvalidMoveText(_))));
        assert!(matches!(state.parse_move("é2e4"), Err(ChessError::InvalidMoveText(_))));
        assert!(matches!(state.parse_move("e7e5"), Err(ChessError::NoPieceToMove { .. })));
        assert!(matches!(state.parse_move("e4e5"), Err(ChessError::NoPieceToMove { .. })));
    }

    #[test]
    fn test_en_passant_target_lifecycle() {
        let mut state = GameState::new();
        play(&mut state, &["e2e4"]);
        assert_eq!(state.en_passant_target(), Some(sq("e3")));
        play(&mut state, &["g8f6"]);
        assert_eq!(state.en_passant_target(), None);
        play(&mut state, &["d2d3"]);
        assert_eq!(state.en_passant_target(), None);
    }

    #[test]
    fn test_halfmove_clock() {
        let mut state = GameState::new();
        play(&mut state, &["g1f3", "g8f6"]);
        assert_eq!(state.halfmove_clock(), 2);
        play(&mut state, &["e2e4"]);
        assert_eq!(state.halfmove_clock(), 0);
        play(&mut state, &["f6e4"]);
        assert_eq!(state.halfmove_clock(), 0);
        play(&mut state, &["b1c3"]);
        assert_eq!(state.halfmove_clock(), 1);
    }

    #[test]
    fn test_undo_restores_everything_but_redo() {
        let mut state = GameState::new();
        play(&mut state, &["e2e4", "d7d5"]);
        let before = state.clone();
        play(&mut state, &["e4d5"]);

        assert!(state.undo_last_move());
        assert_eq!(state.board(), before.board());
        assert_eq!(state.turn(), before.turn());
        assert_eq!(state.en_passant_target(), Some(sq("d6")));
        assert_eq!(state.halfmove_clock(), before.halfmove_clock());
        assert_eq!(state.position_key(), before.position_key());
        assert!(state.can_redo());

        assert!(state.redo_last_move());
        assert_eq!(state.board().piece_at(sq("d5")).map(|p| p.color), Some(Color::White));
        assert_eq!(state.turn(), Color::Black);
        assert!(!state.can_redo());
    }

    #[test]
    fn test_undo_redo_on_empty_stacks() {
        let mut state = GameState::new();
        assert!(!state.undo_last_move());
        assert!(!state.redo_last_move());
    }

    #[test]
    fn test_new_move_clears_redo() {
        let mut state = GameState::new();
        play(&mut state, &["e2e4"]);
        assert!(state.undo_last_move());
        play(&mut state, &["d2d4"]);
        assert!(!state.redo_last_move());
        assert_eq!(state.moves_played(), 1);
    }

    #[test]
    fn test_repetition_table_tracks_undo() {
        let mut state = GameState::new();
        let start = state.position_key();
        play(&mut state, &["g1f3", "g8f6", "f3g1", "f6g8"]);
        assert_eq!(state.position_count(&start), 2);
        assert!(state.undo_last_move());
        assert_eq!(state.position_count(&start), 1);
        assert!(state.redo_last_move());
        assert_eq!(state.position_count(&start), 2);
    }

    fn promotion_state() -> GameState {
        let mut board = Board::empty();
        board.set_piece(sq("a7"), Some(Piece::new(Color::White, PieceType::Pawn)));
        board.set_piece(sq("e1"), Some(Piece::new(Color::White, PieceType::King)));
        board.set_piece(sq("e8"), Some(Piece::new(Color::Black, PieceType::King)));
        GameState::from_position(board, Color::White, None, 0)
    }

    #[test]
    fn test_promotion_defaults_to_queen() {
        let mut state = promotion_state();
        let mv = state.parse_move("a7a8").unwrap();
        let committed = state.make_move(&mv).unwrap();
        assert_eq!(committed.promotion, Some(PieceType::Queen));
        assert_eq!(state.board().piece_at(sq("a8")).map(|p| p.kind), Some(PieceType::Queen));
    }

    #[test]
    fn test_promotion_choice_is_honoured() {
        let mut state = promotion_state();
        let mv = state.parse_move("a7a8n").unwrap();
        state.make_move(&mv).unwrap();
        assert_eq!(state.board().piece_at(sq("a8")).map(|p| p.kind), Some(PieceType::Knight));

        assert!(state.undo_last_move());
        let pawn = state.board().piece_at(sq("a7")).unwrap();
        assert_eq!(pawn.kind, PieceType::Pawn);
    }

    #[test]
    fn test_fifty_move_rule_checked_first() {
        let state = GameState::from_position(Board::new(), Color::White, None, 100);
        assert_eq!(state.status(), GameStatus::FiftyMoveRule);
        assert!(state.is_game_over());
    }

    #[test]
    fn test_halfmove_clock_saturates() {
        let mut board = Board::empty();
        board.set_piece(sq("e1"), Some(Piece::new(Color::White, PieceType::King)));
        board.set_piece(sq("g1"), Some(Piece::new(Color::White, PieceType::Knight)));
        board.set_piece(sq("e8"), Some(Piece::new(Color::Black, PieceType::King)));
        let mut state = GameState::from_position(board, Color::White, None, u32::MAX);

        play(&mut state, &["g1f3"]);
        assert_eq!(state.halfmove_clock(), u32::MAX);
        assert!(state.undo_last_move());
        assert_eq!(state.halfmove_clock(), u32::MAX);
    }

    #[test]
    fn test_fullmove_number_follows_starting_side() {
        let mut state = GameState::new();
        assert_eq!(state.fullmove_number(), 1);
        play(&mut state, &["e2e4"]);
        assert_eq!(state.fullmove_number(), 1);
        play(&mut state, &["e7e5"]);
        assert_eq!(state.fullmove_number(), 2);

        let mut board = Board::empty();
        board.set_piece(sq("e1"), Some(Piece::new(Color::White, PieceType::King)));
        board.set_piece(sq("e8"), Some(Piece::new(Color::Black, PieceType::King)));
        let mut state = GameState::from_position(board, Color::Black, None, 0);
        play(&mut state, &["e8d7"]);
        assert_eq!(state.fullmove_number(), 2);
        play(&mut state, &["e1d1"]);
        assert_eq!(state.fullmove_number(), 2);
    }

    #[test]
    fn test_game_over_still_committed_without_log_subscriber() {
        assert!(!tracing::enabled!(Level::INFO));
        let mut state = GameState::new();
        play(&mut state, &["f2f3", "e7e5", "g2g4", "d8h4"]);
        assert_eq!(state.moves_played(), 4);
        assert_eq!(state.status(), GameStatus::Checkmate { winner: Color::Black });
    }

    #[test]
    fn test_stalemate() {
        let mut board = Board::empty();
        board.set_piece(sq("a1"), Some(Piece::new(Color::White, PieceType::King)));
        board.set_piece(sq("c2"), Some(Piece::new(Color::Black, PieceType::King)));
        board.set_piece(sq("b3"), Some(Piece::new(Color::Black, PieceType::Queen)));
        let state = GameState::from_position(board, Color::White, None, 0);
        assert!(!state.in_check(Color::White));
        assert!(state.legal_moves().is_empty());
        assert_eq!(state.status(), GameStatus::Stalemate);
        assert_eq!(state.status().result_token(), "1/2-1/2");
    }

    #[test]
    fn test_missing_king_is_in_check() {
        let mut board = Board::empty();
        board.set_piece(sq("e8"), Some(Piece::new(Color::Black, PieceType::King)));
        let state = GameState::from_position(board, Color::White, None, 0);
        assert!(state.in_check(Color::White));
        assert_eq!(state.status(), GameStatus::Checkmate { winner: Color::Black });
    }

    #[test]
    fn test_position_key_format() {
        let mut state = GameState::new();
        play(&mut state, &["e2e4"]);
        assert_eq!(
            state.position_key(),
            "rnbqkbnr/pppppppp/......../......../....P.../......../PPPP.PPP/RNBQKBNR b e3"
        );
    }

    #[test]
    fn test_history_text() {
        let mut state = GameState::new();
        play(&mut state, &["e2e4", "e7e5", "g1f3"]);
        assert_eq!(state.history_text(), "1. e2e4 e7e5\n2. g1f3");
    }

    #[test]
    fn test_search_move_round_trip() {
        let mut state = GameState::new();
        play(&mut state, &["e2e4", "c7c5"]);
        let before = state.clone();
        for mv in state.legal_moves() {
            let undo = state.make_search_move(&mv);
            assert_eq!(state.turn(), Color::Black);
            state.unmake_search_move(&mv, undo);
            assert_eq!(state, before);
        }
    }
}
