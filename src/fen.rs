//! FEN import and export.
//!
//! The board keeps castling eligibility as per-piece `has_moved` flags, so
//! castling rights are translated to and from those flags: a king or rook on
//! its home square is unmoved exactly when a right involving it is present.

use crate::board::{Board, Square};
use crate::error::{ChessError, ChessResult};
use crate::game_state::GameState;
use crate::piece::{Color, Piece, PieceType};

pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

// (right letter, color, rook column)
const CASTLING_RIGHTS: [(char, Color, u8); 4] = [
    ('K', Color::White, 7),
    ('Q', Color::White, 0),
    ('k', Color::Black, 7),
    ('q', Color::Black, 0),
];

impl GameState {
    pub fn from_fen(fen: &str) -> ChessResult<GameState> {
        let invalid = |reason: &str| ChessError::InvalidFen(format!("{reason} in `{fen}`"));
        let fields: Vec<&str> = fen.split_whitespace().collect();
        if fields.len() < 4 {
            return Err(invalid("expected at least four fields"));
        }

        let mut board = parse_placement(fields[0]).map_err(|reason| invalid(&reason))?;

        let turn = match fields[1] {
            "w" => Color::White,
            "b" => Color::Black,
            _ => return Err(invalid("side to move must be `w` or `b`")),
        };

        let rights = fields[2];
        if rights != "-" && !rights.chars().all(|c| "KQkq".contains(c)) {
            return Err(invalid("bad castling field"));
        }
        apply_castling_rights(&mut board, rights);

        let en_passant = match fields[3] {
            "-" => None,
            square => Some(square.parse::<Square>().map_err(|_| invalid("bad en passant square"))?),
        };

        let halfmove_clock = match fields.get(4) {
            Some(clock) => clock.parse::<u32>().map_err(|_| invalid("bad half-move clock"))?,
            None => 0,
        };

        // Some writers emit 0 here; treat it as the first move.
        let fullmove = match fields.get(5) {
            Some(number) => number.parse::<u32>().map_err(|_| invalid("bad full-move number"))?.max(1),
            None => 1,
        };

        for color in [Color::White, Color::Black] {
            let kings = board
                .pieces()
                .filter(|(_, p)| p.kind == PieceType::King && p.color == color)
                .count();
            if kings != 1 {
                return Err(invalid(&format!("{color} must have exactly one king")));
            }
        }

        let mut state = GameState::from_position(board, turn, en_passant, halfmove_clock);
        state.start_fullmove = fullmove;
        Ok(state)
    }

    pub fn to_fen(&self) -> String {
        let mut placement = String::new();
        for row in 0..8u8 {
            if row > 0 {
                placement.push('/');
            }
            let mut empty = 0;
            for col in 0..8u8 {
                match self.board.piece_at(Square::new(row, col)) {
                    Some(piece) => {
                        if empty > 0 {
                            placement.push_str(&empty.to_string());
                            empty = 0;
                        }
                        placement.push(piece.symbol());
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                placement.push_str(&empty.to_string());
            }
        }

        let side = match self.turn {
            Color::White => "w",
            Color::Black => "b",
        };

        let mut rights: String = CASTLING_RIGHTS
            .iter()
            .filter(|(_, color, rook_col)| castling_available(&self.board, *color, *rook_col))
            .map(|(letter, _, _)| *letter)
            .collect();
        if rights.is_empty() {
            rights.push('-');
        }

        let en_passant = self
            .en_passant_target
            .map(|square| square.to_string())
            .unwrap_or_else(|| "-".to_string());

        format!(
            "{placement} {side} {rights} {en_passant} {} {}",
            self.halfmove_clock,
            self.fullmove_number()
        )
    }
}

fn parse_placement(placement: &str) -> Result<Board, String> {
    let ranks: Vec<&str> = placement.split('/').collect();
    if ranks.len() != 8 {
        return Err("placement must have eight ranks".to_string());
    }

    let mut board = Board::empty();
    for (row, rank) in ranks.iter().enumerate() {
        let mut col = 0u8;
        for symbol in rank.chars() {
            if let Some(skip) = symbol.to_digit(10) {
                if !(1..=8).contains(&skip) {
                    return Err(format!("bad empty-square count `{symbol}`"));
                }
                col += skip as u8;
            } else {
                let mut piece = Piece::from_symbol(symbol).ok_or_else(|| format!("unknown piece `{symbol}`"))?;
                if col >= 8 {
                    return Err(format!("rank {} is too long", 8 - row));
                }
                let square = Square::new(row as u8, col);
                // Castling flags are settled afterwards; everything else that
                // left its home square has clearly moved.
                piece.has_moved = match piece.kind {
                    PieceType::Pawn => square.row != piece.color.pawn_start_row(),
                    PieceType::King | PieceType::Rook => true,
                    _ => false,
                };
                board.set_piece(square, Some(piece));
                col += 1;
            }
            if col > 8 {
                return Err(format!("rank {} is too long", 8 - row));
            }
        }
        if col != 8 {
            return Err(format!("rank {} is too short", 8 - row));
        }
    }
    Ok(board)
}

fn apply_castling_rights(board: &mut Board, rights: &str) {
    for (letter, color, rook_col) in CASTLING_RIGHTS {
        if !rights.contains(letter) {
            continue;
        }
        let row = color.back_rank();
        let king_square = Square::new(row, 4);
        let rook_square = Square::new(row, rook_col);
        let king = board.piece_at(king_square);
        let rook = board.piece_at(rook_square);
        match (king, rook) {
            (Some(mut king), Some(mut rook))
                if king.kind == PieceType::King
                    && king.color == color
                    && rook.kind == PieceType::Rook
                    && rook.color == color =>
            {
                king.has_moved = false;
                rook.has_moved = false;
                board.set_piece(king_square, Some(king));
                board.set_piece(rook_square, Some(rook));
            }
            _ => {}
        }
    }
}

fn castling_available(board: &Board, color: Color, rook_col: u8) -> bool {
    let row = color.back_rank();
    let unmoved = |square: Square, kind: PieceType| {
        matches!(board.piece_at(square), Some(p) if p.kind == kind && p.color == color && !p.has_moved)
    };
    unmoved(Square::new(row, 4), PieceType::King) && unmoved(Square::new(row, rook_col), PieceType::Rook)
}
