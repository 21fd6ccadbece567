use crate::board::{Board, Square};
use crate::game_state::GameState;
use crate::piece::{Color, Piece, PieceType};

/// Static evaluation weights. Tables are indexed `[rank][file]` from the
/// owner's point of view: index 0 is the owner's back rank.
#[derive(Debug, Clone)]
pub struct Evaluator {
    // Piece values
    pub pawn_value: i32,
    pub knight_value: i32,
    pub bishop_value: i32,
    pub rook_value: i32,
    pub queen_value: i32,
    pub king_value: i32,

    // Positional bonuses
    pub pawn_position_bonus: [[i32; 8]; 8],
    pub knight_position_bonus: [[i32; 8]; 8],

    // Pawn structure
    pub doubled_pawn_penalty: i32,
    pub isolated_pawn_penalty: i32,
    pub passed_pawn_bonus: i32,

    // King safety
    pub missing_shield_penalty: i32,
    pub missing_king_penalty: i32,

    pub mobility_weight: i32,
}

impl Evaluator {
    pub fn new() -> Self {
        Self {
            pawn_value: 100,
            knight_value: 320,
            bishop_value: 330,
            rook_value: 500,
            queen_value: 900,
            king_value: 0,

            // Rewards central pawns and advancement, rank 1 first
            pawn_position_bonus: [
                [0, 0, 0, 0, 0, 0, 0, 0],
                [5, 10, 10, -20, -20, 10, 10, 5],
                [5, -5, -10, 0, 0, -10, -5, 5],
                [0, 0, 0, 20, 20, 0, 0, 0],
                [5, 5, 10, 25, 25, 10, 5, 5],
                [10, 10, 20, 30, 30, 20, 10, 10],
                [50, 50, 50, 50, 50, 50, 50, 50],
                [0, 0, 0, 0, 0, 0, 0, 0],
            ],

            // Knights on the rim are dim
            knight_position_bonus: [
                [-50, -40, -30, -30, -30, -30, -40, -50],
                [-40, -20, 0, 5, 5, 0, -20, -40],
                [-30, 5, 10, 15, 15, 10, 5, -30],
                [-30, 0, 15, 20, 20, 15, 0, -30],
                [-30, 5, 15, 20, 20, 15, 5, -30],
                [-30, 0, 10, 15, 15, 10, 0, -30],
                [-40, -20, 0, 0, 0, 0, -20, -40],
                [-50, -40, -30, -30, -30, -30, -40, -50],
            ],

            doubled_pawn_penalty: 15,
            isolated_pawn_penalty: 10,
            passed_pawn_bonus: 20,

            missing_shield_penalty: 15,
            missing_king_penalty: 100,

            mobility_weight: 5,
        }
    }

    /// Score of the position for the side to move (positive is good for it).
    pub fn evaluate(&self, state: &GameState) -> i32 {
        let board = state.board();
        let mut score = 0;

        for (square, piece) in board.pieces() {
            let mut value = self.piece_value(piece.kind) + self.position_bonus(piece, square);
            if piece.kind == PieceType::Pawn {
                value += self.pawn_structure(board, square, piece.color);
            }
            score += match piece.color {
                Color::White => value,
                Color::Black => -value,
            };
        }

        // A weak shield helps the opponent.
        score -= self.king_safety_penalty(board, Color::White);
        score += self.king_safety_penalty(board, Color::Black);

        score += self.mobility(state, Color::White);
        score -= self.mobility(state, Color::Black);

        match state.turn() {
            Color::White => score,
            Color::Black => -score,
        }
    }

    pub fn piece_value(&self, kind: PieceType) -> i32 {
        match kind {
            PieceType::Pawn => self.pawn_value,
            PieceType::Knight => self.knight_value,
            PieceType::Bishop => self.bishop_value,
            PieceType::Rook => self.rook_value,
            PieceType::Queen => self.queen_value,
            PieceType::King => self.king_value,
        }
    }

    fn position_bonus(&self, piece: Piece, square: Square) -> i32 {
        let table = match piece.kind {
            PieceType::Pawn => &self.pawn_position_bonus,
            PieceType::Knight => &self.knight_position_bonus,
            _ => return 0,
        };
        // Mirror vertically for Black.
        let rank = match piece.color {
            Color::White => 7 - square.row,
            Color::Black => square.row,
        };
        table[rank as usize][square.col as usize]
    }

    fn pawn_structure(&self, board: &Board, square: Square, color: Color) -> i32 {
        let pawn_on = |row: u8, col: i8, owner: Color| {
            (0..8).contains(&col)
                && matches!(
                    board.piece_at(Square::new(row, col as u8)),
                    Some(p) if p.kind == PieceType::Pawn && p.color == owner
                )
        };
        let col = square.col as i8;
        let mut bonus = 0;

        if (0..8).any(|row| row != square.row && pawn_on(row, col, color)) {
            bonus -= self.doubled_pawn_penalty;
        }

        if !(0..8).any(|row| pawn_on(row, col - 1, color) || pawn_on(row, col + 1, color)) {
            bonus -= self.isolated_pawn_penalty;
        }

        let ahead: Vec<u8> = match color {
            Color::White => (0..square.row).collect(),
            Color::Black => (square.row + 1..8).collect(),
        };
        let enemy = color.opposite();
        let blocked = ahead
            .iter()
            .any(|&row| (col - 1..=col + 1).any(|c| pawn_on(row, c, enemy)));
        if !blocked {
            bonus += self.passed_pawn_bonus;
        }

        bonus
    }

    /// Penalty for each of the three squares in front of the king that lacks
    /// a friendly pawn.
    fn king_safety_penalty(&self, board: &Board, color: Color) -> i32 {
        let Some(king) = board.find_king(color) else {
            return self.missing_king_penalty;
        };
        let Some(shield) = king.offset(color.forward(), 0) else {
            return 0;
        };
        let mut penalty = 0;
        for d_col in -1..=1 {
            let Some(square) = shield.offset(0, d_col) else {
                continue;
            };
            let sheltered = matches!(
                board.piece_at(square),
                Some(p) if p.kind == PieceType::Pawn && p.color == color
            );
            if !sheltered {
                penalty += self.missing_shield_penalty;
            }
        }
        penalty
    }

    fn mobility(&self, state: &GameState, color: Color) -> i32 {
        state.legal_moves_for(color).len() as i32 * self.mobility_weight
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Evaluator::new()
    }
}

/// Evaluates with the default weights.
pub fn evaluate(state: &GameState) -> i32 {
    Evaluator::new().evaluate(state)
}
