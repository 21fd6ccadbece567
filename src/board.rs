use std::fmt;
use std::str::FromStr;

use crate::error::ChessError;
use crate::movegen::Move;
use crate::piece::{Color, Piece, PieceType};

/// A (row, column) pair. Row 0 is rank 8, row 7 is rank 1; column 0 is file a.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Square {
    pub row: u8,
    pub col: u8,
}

impl Square {
    pub fn new(row: u8, col: u8) -> Self {
        debug_assert!(row < 8 && col < 8, "square out of range: ({row}, {col})");
        Self { row, col }
    }

    pub fn try_new(row: i8, col: i8) -> Option<Self> {
        if (0..8).contains(&row) && (0..8).contains(&col) {
            Some(Self {
                row: row as u8,
                col: col as u8,
            })
        } else {
            None
        }
    }

    pub fn offset(&self, d_row: i8, d_col: i8) -> Option<Square> {
        Square::try_new(self.row as i8 + d_row, self.col as i8 + d_col)
    }

    /// All 64 squares in row-major order, starting at a8.
    pub fn all() -> impl Iterator<Item = Square> {
        (0..8u8).flat_map(|row| (0..8u8).map(move |col| Square { row, col }))
    }

    pub fn file_char(&self) -> char {
        (b'a' + self.col) as char
    }

    pub fn rank_char(&self) -> char {
        (b'8' - self.row) as char
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.file_char(), self.rank_char())
    }
}

impl FromStr for Square {
    type Err = ChessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != 2 {
            return Err(ChessError::InvalidSquare(s.to_string()));
        }
        let file = bytes[0].to_ascii_lowercase();
        let rank = bytes[1];
        if !(b'a'..=b'h').contains(&file) || !(b'1'..=b'8').contains(&rank) {
            return Err(ChessError::InvalidSquare(s.to_string()));
        }
        Ok(Square::new(b'8' - rank, file - b'a'))
    }
}

/// 8x8 grid of optional pieces. The single source of truth for placement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Board {
    grid: [[Option<Piece>; 8]; 8],
}

const BACK_RANK: [PieceType; 8] = [
    PieceType::Rook,
    PieceType::Knight,
    PieceType::Bishop,
    PieceType::Queen,
    PieceType::King,
    PieceType::Bishop,
    PieceType::Knight,
    PieceType::Rook,
];

impl Board {
    pub fn new() -> Self {
        let mut board = Board::empty();
        for (col, &kind) in BACK_RANK.iter().enumerate() {
            let col = col as u8;
            board.set_piece(Square::new(0, col), Some(Piece::new(Color::Black, kind)));
            board.set_piece(Square::new(1, col), Some(Piece::new(Color::Black, PieceType::Pawn)));
            board.set_piece(Square::new(6, col), Some(Piece::new(Color::White, PieceType::Pawn)));
            board.set_piece(Square::new(7, col), Some(Piece::new(Color::White, kind)));
        }
        board
    }

    pub fn empty() -> Self {
        Self {
            grid: [[None; 8]; 8],
        }
    }

    pub fn piece_at(&self, square: Square) -> Option<Piece> {
        self.grid[square.row as usize][square.col as usize]
    }

    pub fn set_piece(&mut self, square: Square, piece: Option<Piece>) {
        self.grid[square.row as usize][square.col as usize] = piece;
    }

    fn take(&mut self, square: Square) -> Option<Piece> {
        self.grid[square.row as usize][square.col as usize].take()
    }

    /// Occupied squares in row-major order.
    pub fn pieces(&self) -> impl Iterator<Item = (Square, Piece)> + '_ {
        Square::all().filter_map(move |square| self.piece_at(square).map(|p| (square, p)))
    }

    pub fn find_king(&self, color: Color) -> Option<Square> {
        self.pieces()
            .find(|(_, piece)| piece.kind == PieceType::King && piece.color == color)
            .map(|(square, _)| square)
    }

    pub fn apply_move(&mut self, mv: &Move) {
        // En passant: the victim is not on the destination, so remove it
        // before the destination is written.
        if mv.captured.is_some() && self.piece_at(mv.to).is_none() {
            self.set_piece(mv.captured_pos, None);
        }

        let mut mover = self.take(mv.from).unwrap_or(mv.piece);
        mover.has_moved = true;
        let placed = match mv.promotion {
            Some(kind) => Piece {
                color: mover.color,
                kind,
                has_moved: true,
            },
            None => mover,
        };
        self.set_piece(mv.to, Some(placed));

        if let Some((rook_from, rook_to)) = mv.castling_rook_squares() {
            if let Some(mut rook) = self.take(rook_from) {
                rook.has_moved = true;
                self.set_piece(rook_to, Some(rook));
            }
        }
    }

    /// Exact inverse of `apply_move`. Moves must be undone in reverse order.
    pub fn undo_move(&mut self, mv: &Move) {
        if let Some((rook_from, rook_to)) = mv.castling_rook_squares() {
            // Castling requires an unmoved rook, so its flag goes back to false.
            if let Some(mut rook) = self.take(rook_to) {
                rook.has_moved = false;
                self.set_piece(rook_from, Some(rook));
            }
        }

        self.set_piece(mv.to, None);
        // The snapshot carries the original kind (pawn for promotions) and flag.
        self.set_piece(mv.from, Some(mv.piece));
        if let Some(captured) = mv.captured {
            self.set_piece(mv.captured_pos, Some(captured));
        }
    }
}

impl Default for Board {
    fn default() -> Self {
        Board::new()
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for row in 0..8u8 {
            write!(f, "{} ", 8 - row)?;
            for col in 0..8u8 {
                let symbol = self
                    .piece_at(Square::new(row, col))
                    .map(|p| p.symbol())
                    .unwrap_or('.');
                write!(f, "{} ", symbol)?;
            }
            writeln!(f)?;
        }
        writeln!(f, "  a b c d e f g h")
    }
}
