use std::fmt;

use crate::board::{Board, Square};
use crate::piece::{Color, Piece, PieceType};

/// A move as produced by generation and consumed by apply/undo.
///
/// `piece` and `captured` are snapshots taken before the move, so undo can
/// restore both squares exactly, including their `has_moved` flags.
/// `captured_pos` equals `to` except for en passant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Move {
    pub from: Square,
    pub to: Square,
    pub piece: Piece,
    pub captured: Option<Piece>,
    pub captured_pos: Square,
    pub promotion: Option<PieceType>,
    pub castling: bool,
}

impl Move {
    pub fn new(from: Square, to: Square, piece: Piece) -> Self {
        Self {
            from,
            to,
            piece,
            captured: None,
            captured_pos: to,
            promotion: None,
            castling: false,
        }
    }

    pub fn new_capture(from: Square, to: Square, piece: Piece, captured: Piece) -> Self {
        Self {
            captured: Some(captured),
            ..Move::new(from, to, piece)
        }
    }

    pub fn new_en_passant(from: Square, to: Square, piece: Piece, captured: Piece, captured_pos: Square) -> Self {
        Self {
            captured: Some(captured),
            captured_pos,
            ..Move::new(from, to, piece)
        }
    }

    pub fn new_castling(from: Square, to: Square, king: Piece) -> Self {
        Self {
            castling: true,
            ..Move::new(from, to, king)
        }
    }

    pub fn is_capture(&self) -> bool {
        self.captured.is_some()
    }

    pub fn is_en_passant(&self) -> bool {
        self.captured.is_some() && self.captured_pos != self.to
    }

    /// Legality matching compares squares only; promotion choice is not part of it.
    pub fn same_squares(&self, other: &Move) -> bool {
        self.from == other.from && self.to == other.to
    }

    /// Rook source and destination for a castling move.
    pub fn castling_rook_squares(&self) -> Option<(Square, Square)> {
        if !self.castling {
            return None;
        }
        let row = self.from.row;
        if self.to.col > self.from.col {
            Some((Square::new(row, 7), Square::new(row, 5)))
        } else {
            Some((Square::new(row, 0), Square::new(row, 3)))
        }
    }
}

/// Coordinate notation: `e2e4`, `e7e8q`.
impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(kind) = self.promotion {
            write!(f, "{}", kind.letter().to_ascii_lowercase())?;
        }
        Ok(())
    }
}

const KNIGHT_OFFSETS: [(i8, i8); 8] = [
    (-2, -1), (-2, 1), (-1, -2), (-1, 2),
    (1, -2), (1, 2), (2, -1), (2, 1),
];

const KING_OFFSETS: [(i8, i8); 8] = [
    (-1, -1), (-1, 0), (-1, 1),
    (0, -1), (0, 1),
    (1, -1), (1, 0), (1, 1),
];

const DIAGONALS: [(i8, i8); 4] = [(-1, -1), (-1, 1), (1, -1), (1, 1)];
const ORTHOGONALS: [(i8, i8); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

struct CastlingSide {
    rook_col: u8,
    between: &'static [u8],
    king_path: [u8; 3],
    king_to: u8,
}

const CASTLING_SIDES: [CastlingSide; 2] = [
    // Kingside
    CastlingSide {
        rook_col: 7,
        between: &[5, 6],
        king_path: [4, 5, 6],
        king_to: 6,
    },
    // Queenside: b-file must be empty but the king never crosses it
    CastlingSide {
        rook_col: 0,
        between: &[1, 2, 3],
        king_path: [4, 3, 2],
        king_to: 2,
    },
];

impl Board {
    /// Moves that obey piece movement but may leave the mover's king in check.
    /// Row-major scan, so the order is deterministic.
    pub fn generate_pseudo_legal_moves(&self, color: Color, en_passant: Option<Square>) -> Vec<Move> {
        let mut moves = Vec::with_capacity(48);
        for (from, piece) in self.pieces() {
            if piece.color != color {
                continue;
            }
            match piece.kind {
                PieceType::Pawn => self.pawn_moves(from, piece, en_passant, &mut moves),
                PieceType::Knight => self.step_moves(from, piece, &KNIGHT_OFFSETS, &mut moves),
                PieceType::Bishop => self.slide_moves(from, piece, &DIAGONALS, &mut moves),
                PieceType::Rook => self.slide_moves(from, piece, &ORTHOGONALS, &mut moves),
                PieceType::Queen => {
                    self.slide_moves(from, piece, &DIAGONALS, &mut moves);
                    self.slide_moves(from, piece, &ORTHOGONALS, &mut moves);
                }
                PieceType::King => {
                    self.step_moves(from, piece, &KING_OFFSETS, &mut moves);
                    self.castling_moves(from, piece, &mut moves);
                }
            }
        }
        moves
    }

    fn pawn_moves(&self, from: Square, pawn: Piece, en_passant: Option<Square>, moves: &mut Vec<Move>) {
        let dir = pawn.color.forward();

        if let Some(one) = from.offset(dir, 0) {
            if self.piece_at(one).is_none() {
                push_pawn_move(Move::new(from, one, pawn), moves);
                if from.row == pawn.color.pawn_start_row() {
                    if let Some(two) = one.offset(dir, 0) {
                        if self.piece_at(two).is_none() {
                            moves.push(Move::new(from, two, pawn));
                        }
                    }
                }
            }
        }

        for d_col in [-1, 1] {
            let Some(target) = from.offset(dir, d_col) else {
                continue;
            };
            match self.piece_at(target) {
                Some(victim) if victim.color != pawn.color => {
                    push_pawn_move(Move::new_capture(from, target, pawn, victim), moves);
                }
                None if en_passant == Some(target) => {
                    // The victim sits beside the attacker, on the fifth rank from its side.
                    let victim_square = Square::new(from.row, target.col);
                    let on_fifth_rank = from.row as i8 == pawn.color.pawn_start_row() as i8 + 3 * dir;
                    if let Some(victim) = self.piece_at(victim_square) {
                        if on_fifth_rank && victim.kind == PieceType::Pawn && victim.color != pawn.color {
                            moves.push(Move::new_en_passant(from, target, pawn, victim, victim_square));
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn step_moves(&self, from: Square, piece: Piece, offsets: &[(i8, i8)], moves: &mut Vec<Move>) {
        for &(d_row, d_col) in offsets {
            let Some(to) = from.offset(d_row, d_col) else {
                continue;
            };
            match self.piece_at(to) {
                None => moves.push(Move::new(from, to, piece)),
                Some(other) if other.color != piece.color => {
                    moves.push(Move::new_capture(from, to, piece, other));
                }
                _ => {}
            }
        }
    }

    fn slide_moves(&self, from: Square, piece: Piece, directions: &[(i8, i8)], moves: &mut Vec<Move>) {
        for &(d_row, d_col) in directions {
            let mut current = from;
            while let Some(to) = current.offset(d_row, d_col) {
                match self.piece_at(to) {
                    None => moves.push(Move::new(from, to, piece)),
                    Some(other) => {
                        if other.color != piece.color {
                            moves.push(Move::new_capture(from, to, piece, other));
                        }
                        break;
                    }
                }
                current = to;
            }
        }
    }

    fn castling_moves(&self, from: Square, king: Piece, moves: &mut Vec<Move>) {
        let row = king.color.back_rank();
        if king.has_moved || from != Square::new(row, 4) {
            return;
        }
        let enemy = king.color.opposite();

        for side in &CASTLING_SIDES {
            let rook_ready = matches!(
                self.piece_at(Square::new(row, side.rook_col)),
                Some(rook) if rook.kind == PieceType::Rook && rook.color == king.color && !rook.has_moved
            );
            if !rook_ready {
                continue;
            }
            if side.between.iter().any(|&col| self.piece_at(Square::new(row, col)).is_some()) {
                continue;
            }
            if side
                .king_path
                .iter()
                .any(|&col| self.is_square_attacked(Square::new(row, col), enemy))
            {
                continue;
            }
            moves.push(Move::new_castling(from, Square::new(row, side.king_to), king));
        }
    }

    /// True if any piece of `attacker` could capture on `square`.
    ///
    /// Probes outward from the target square instead of generating the
    /// attacker's full move list; castling never attacks anything.
    pub fn is_square_attacked(&self, square: Square, attacker: Color) -> bool {
        // An attacking pawn stands one row behind the target, from its own point of view.
        let pawn_row = -attacker.forward();
        for d_col in [-1, 1] {
            if let Some(from) = square.offset(pawn_row, d_col) {
                if self.holds(from, attacker, &[PieceType::Pawn]) {
                    return true;
                }
            }
        }

        let steppers = [
            (&KNIGHT_OFFSETS, PieceType::Knight),
            (&KING_OFFSETS, PieceType::King),
        ];
        for (offsets, kind) in steppers {
            for &(d_row, d_col) in offsets.iter() {
                if let Some(from) = square.offset(d_row, d_col) {
                    if self.holds(from, attacker, &[kind]) {
                        return true;
                    }
                }
            }
        }

        self.ray_hits(square, &DIAGONALS, attacker, &[PieceType::Bishop, PieceType::Queen])
            || self.ray_hits(square, &ORTHOGONALS, attacker, &[PieceType::Rook, PieceType::Queen])
    }

    /// A missing king counts as attacked.
    pub fn is_king_attacked(&self, color: Color) -> bool {
        match self.find_king(color) {
            Some(king) => self.is_square_attacked(king, color.opposite()),
            None => true,
        }
    }

    fn holds(&self, square: Square, color: Color, kinds: &[PieceType]) -> bool {
        matches!(self.piece_at(square), Some(p) if p.color == color && kinds.contains(&p.kind))
    }

    fn ray_hits(&self, square: Square, directions: &[(i8, i8)], attacker: Color, kinds: &[PieceType]) -> bool {
        for &(d_row, d_col) in directions {
            let mut current = square;
            while let Some(next) = current.offset(d_row, d_col) {
                if self.piece_at(next).is_some() {
                    if self.holds(next, attacker, kinds) {
                        return true;
                    }
                    break;
                }
                current = next;
            }
        }
        false
    }
}

fn push_pawn_move(mv: Move, moves: &mut Vec<Move>) {
    if mv.to.row == mv.piece.color.opposite().back_rank() {
        for kind in PieceType::PROMOTIONS {
            moves.push(Move {
                promotion: Some(kind),
                ..mv
            });
        }
    } else {
        moves.push(mv);
    }
}
