//! Standard algebraic notation and PGN interchange.
//!
//! SAN is produced from the legal move list of the position before the move,
//! which is also how tokens are resolved on import: a token names whichever
//! legal move renders to the same text.

use std::collections::BTreeMap;

use crate::board::Square;
use crate::error::{ChessError, ChessResult};
use crate::fen::STARTING_FEN;
use crate::game_state::GameState;
use crate::movegen::Move;
use crate::piece::{Color, PieceType};

const SEVEN_TAG_ROSTER: [&str; 7] = ["Event", "Site", "Date", "Round", "White", "Black", "Result"];

#[derive(Debug, Clone)]
pub struct PgnGame {
    pub headers: BTreeMap<String, String>,
    /// Position after replaying every move.
    pub state: GameState,
    pub result: String,
}

/// SAN for `mv` played from `state`, including the check or mate suffix.
pub fn move_to_san(state: &GameState, mv: &Move) -> String {
    let mut san = san_body(state, mv);
    let mut next = state.clone();
    next.make_search_move(mv);
    if next.in_check(next.turn()) {
        san.push(if next.legal_moves().is_empty() { '#' } else { '+' });
    }
    san
}

fn san_body(state: &GameState, mv: &Move) -> String {
    if mv.castling {
        return if mv.to.col == 6 { "O-O" } else { "O-O-O" }.to_string();
    }

    let mut san = String::new();
    if mv.piece.kind == PieceType::Pawn {
        if mv.is_capture() {
            san.push(mv.from.file_char());
        }
    } else {
        san.push(mv.piece.kind.letter().to_ascii_uppercase());
        san.push_str(&disambiguation(state, mv));
    }
    if mv.is_capture() {
        san.push('x');
    }
    san.push_str(&mv.to.to_string());
    if let Some(kind) = mv.promotion {
        san.push('=');
        san.push(kind.letter().to_ascii_uppercase());
    }
    san
}

fn disambiguation(state: &GameState, mv: &Move) -> String {
    let rivals: Vec<Move> = state
        .legal_moves()
        .into_iter()
        .filter(|other| other.piece.kind == mv.piece.kind && other.to == mv.to && other.from != mv.from)
        .collect();

    if rivals.is_empty() {
        String::new()
    } else if rivals.iter().all(|other| other.from.col != mv.from.col) {
        mv.from.file_char().to_string()
    } else if rivals.iter().all(|other| other.from.row != mv.from.row) {
        mv.from.rank_char().to_string()
    } else {
        mv.from.to_string()
    }
}

fn normalize_san(token: &str) -> String {
    let token = token.trim_end_matches(|c: char| matches!(c, '+' | '#' | '!' | '?'));
    let token = match token {
        "0-0" => "O-O",
        "0-0-0" => "O-O-O",
        other => other,
    };
    token.replace('=', "")
}

/// The pieces of a non-castling SAN token: `Ngf3` is a knight with file
/// hint `g` going to f3.
#[derive(Debug, PartialEq, Eq)]
struct SanParts {
    kind: PieceType,
    file: Option<char>,
    rank: Option<char>,
    to: Square,
    promotion: Option<PieceType>,
}

fn split_san(san: &str) -> Option<SanParts> {
    let mut body: Vec<char> = san.chars().filter(|&c| c != 'x').collect();

    let kind = match body.first() {
        Some(&c) if c.is_ascii_uppercase() => {
            body.remove(0);
            PieceType::from_letter(c)?
        }
        _ => PieceType::Pawn,
    };

    let promotion = match body.last() {
        Some(&c) if c.is_ascii_uppercase() => {
            body.pop();
            Some(PieceType::from_letter(c).filter(|p| PieceType::PROMOTIONS.contains(p))?)
        }
        _ => None,
    };

    if body.len() < 2 || body.len() > 4 {
        return None;
    }
    let split = body.len() - 2;
    let to: Square = body[split..].iter().collect::<String>().parse().ok()?;

    let mut file = None;
    let mut rank = None;
    for &hint in &body[..split] {
        match hint {
            'a'..='h' if file.is_none() => file = Some(hint),
            '1'..='8' if rank.is_none() => rank = Some(hint),
            _ => return None,
        }
    }
    Some(SanParts {
        kind,
        file,
        rank,
        to,
        promotion,
    })
}

impl GameState {
    /// Resolves a SAN token against the legal moves and commits it.
    ///
    /// The canonical spelling is tried first. Otherwise the token matches by
    /// piece, destination and promotion, with any file or rank hints agreeing
    /// with the origin; it must then single out exactly one move.
    pub fn play_san(&mut self, token: &str) -> ChessResult<Move> {
        let unresolved = || ChessError::UnresolvedSan(token.to_string());
        let wanted = normalize_san(token);
        let legal = self.legal_moves();

        if let Some(mv) = legal.iter().find(|mv| san_body(self, mv).replace('=', "") == wanted) {
            return self.make_move(mv);
        }

        let parts = split_san(&wanted).ok_or_else(unresolved)?;
        let mut candidates = legal.iter().filter(|mv| {
            !mv.castling
                && mv.piece.kind == parts.kind
                && mv.to == parts.to
                && match mv.promotion {
                    Some(kind) => parts.promotion.unwrap_or(PieceType::Queen) == kind,
                    None => parts.promotion.is_none(),
                }
                && parts.file.map_or(true, |file| mv.from.file_char() == file)
                && parts.rank.map_or(true, |rank| mv.from.rank_char() == rank)
        });
        match (candidates.next(), candidates.next()) {
            (Some(mv), None) => {
                let mv = *mv;
                self.make_move(&mv)
            }
            _ => Err(unresolved()),
        }
    }
}

/// Writes the game as PGN. The seven-tag roster comes first with defaults
/// for anything `headers` leaves out; extra headers follow in key order.
pub fn export_pgn(state: &GameState, headers: &BTreeMap<String, String>) -> String {
    let moves: Vec<Move> = state.move_history().copied().collect();
    let mut replay = state.clone();
    while replay.undo_last_move() {}
    let initial_fen = replay.to_fen();

    let mut tags: BTreeMap<String, String> = BTreeMap::new();
    tags.insert("Event".to_owned(), "Casual Game".to_owned());
    tags.insert("Site".to_owned(), "Local".to_owned());
    tags.insert("Date".to_owned(), chrono::Local::now().format("%Y.%m.%d").to_string());
    tags.insert("Round".to_owned(), "-".to_owned());
    tags.insert("White".to_owned(), "White".to_owned());
    tags.insert("Black".to_owned(), "Black".to_owned());
    tags.insert("Result".to_owned(), state.status().result_token().to_owned());
    if initial_fen != STARTING_FEN {
        tags.insert("SetUp".to_owned(), "1".to_owned());
        tags.insert("FEN".to_owned(), initial_fen);
    }
    for (key, value) in headers {
        tags.insert(key.clone(), value.clone());
    }

    let mut out = String::new();
    for key in SEVEN_TAG_ROSTER {
        if let Some(value) = tags.get(key) {
            out.push_str(&format!("[{} \"{}\"]\n", key, escape_tag_value(value)));
        }
    }
    for (key, value) in &tags {
        if !SEVEN_TAG_ROSTER.contains(&key.as_str()) {
            out.push_str(&format!("[{} \"{}\"]\n", key, escape_tag_value(value)));
        }
    }
    out.push('\n');

    let black_first = replay.turn() == Color::Black;
    let mut parts = Vec::with_capacity(moves.len() + 2);
    for (index, mv) in moves.iter().enumerate() {
        let white_to_move = (index + usize::from(black_first)) % 2 == 0;
        let number = replay.fullmove_number();
        let san = move_to_san(&replay, mv);
        if white_to_move {
            parts.push(format!("{number}. {san}"));
        } else if index == 0 {
            parts.push(format!("{number}... {san}"));
        } else {
            parts.push(san);
        }
        replay.redo_last_move();
    }
    parts.push(tags.get("Result").cloned().unwrap_or_else(|| "*".to_owned()));
    out.push_str(&parts.join(" "));
    out.push('\n');
    out
}

/// Movetext tokens with comments, variations, move numbers, NAGs and the
/// result removed.
pub fn parse_pgn_moves(movetext: &str) -> Vec<String> {
    strip_comments_and_variations(movetext)
        .split_whitespace()
        .map(strip_move_number)
        .filter(|token| !token.is_empty() && !token.starts_with('$') && !is_result_token(token))
        .map(str::to_owned)
        .collect()
}

/// Replays a PGN game from the start position, or from its `FEN` tag when
/// `SetUp` is `1`.
pub fn load_pgn(text: &str) -> ChessResult<PgnGame> {
    let mut headers = BTreeMap::new();
    let mut movetext = String::new();
    for line in text.lines() {
        let line = line.trim();
        if line.starts_with('[') {
            let (key, value) = parse_tag(line)?;
            headers.insert(key, value);
        } else if !line.is_empty() {
            movetext.push_str(line);
            movetext.push(' ');
        }
    }

    let mut state = if headers.get("SetUp").map(String::as_str) == Some("1") {
        let fen = headers
            .get("FEN")
            .ok_or_else(|| ChessError::InvalidPgn("SetUp is 1 but the FEN tag is missing".to_string()))?;
        GameState::from_fen(fen)?
    } else {
        GameState::new()
    };

    for token in parse_pgn_moves(&movetext) {
        state.play_san(&token)?;
    }

    let result = headers
        .get("Result")
        .cloned()
        .unwrap_or_else(|| state.status().result_token().to_owned());
    Ok(PgnGame { headers, state, result })
}

fn parse_tag(line: &str) -> ChessResult<(String, String)> {
    let invalid = || ChessError::InvalidPgn(format!("bad tag line `{line}`"));
    let inner = line
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(invalid)?;
    let (key, raw) = inner.split_once(' ').ok_or_else(invalid)?;
    let value = raw
        .trim()
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .ok_or_else(invalid)?;
    Ok((key.trim().to_owned(), value.replace("\\\"", "\"").replace("\\\\", "\\")))
}

fn escape_tag_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn strip_comments_and_variations(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut braces = 0usize;
    let mut parens = 0usize;
    for ch in text.chars() {
        match ch {
            '{' => braces += 1,
            '}' => braces = braces.saturating_sub(1),
            '(' if braces == 0 => parens += 1,
            ')' if braces == 0 => parens = parens.saturating_sub(1),
            _ if braces == 0 && parens == 0 => out.push(ch),
            _ => {}
        }
        // Keep tokens apart when a comment closes against a move.
        if matches!(ch, '}' | ')') {
            out.push(' ');
        }
    }
    out
}

// `12.`, `12...` and `12.e4` all lose their number.
fn strip_move_number(token: &str) -> &str {
    let rest = token.trim_start_matches(|c: char| c.is_ascii_digit());
    if rest.len() < token.len() && rest.starts_with('.') {
        rest.trim_start_matches('.')
    } else {
        token
    }
}

fn is_result_token(token: &str) -> bool {
    matches!(token, "1-0" | "0-1" | "1/2-1/2" | "*")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(fen: &str) -> GameState {
        GameState::from_fen(fen).unwrap()
    }

    fn san_of(state: &GameState, coord: &str) -> String {
        let mv = state
            .legal_moves()
            .into_iter()
            .find(|mv| mv.to_string() == coord)
            .unwrap();
        move_to_san(state, &mv)
    }

    fn fools_mate() -> GameState {
        let mut game = GameState::new();
        for san in ["f3", "e5", "g4", "Qh4#"] {
            game.play_san(san).unwrap();
        }
        game
    }

    #[test]
    fn test_pawn_and_piece_san() {
        let game = GameState::new();
        assert_eq!(san_of(&game, "e2e4"), "e4");
        assert_eq!(san_of(&game, "g1f3"), "Nf3");
    }

    #[test]
    fn test_fools_mate_san() {
        let game = fools_mate();
        assert!(game.is_game_over());
        assert_eq!(game.history_text(), "1. f2f3 e7e5\n2. g2g4 d8h4");
    }

    #[test]
    fn test_castling_san() {
        let game = state("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1");
        assert_eq!(san_of(&game, "e1g1"), "O-O");
        assert_eq!(san_of(&game, "e1c1"), "O-O-O");
    }

    #[test]
    fn test_disambiguation() {
        let knights = state("4k3/8/8/8/8/5N2/8/1N2K3 w - - 0 1");
        assert_eq!(san_of(&knights, "b1d2"), "Nbd2");
        assert_eq!(san_of(&knights, "f3d2"), "Nfd2");

        let rooks = state("4k3/8/8/R7/8/8/8/R3K3 w - - 0 1");
        assert_eq!(san_of(&rooks, "a1a3"), "R1a3");
        assert_eq!(san_of(&rooks, "a5a3"), "R5a3");
    }

    #[test]
    fn test_capture_promotion_and_check() {
        let game = state("3rk3/4P3/8/8/8/8/8/4K3 w - - 0 1");
        assert_eq!(san_of(&game, "e7d8q"), "exd8=Q+");
        assert_eq!(san_of(&game, "e7d8n"), "exd8=N");
    }

    #[test]
    fn test_en_passant_san() {
        let game = state("4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 1");
        assert_eq!(san_of(&game, "e5d6"), "exd6");
    }

    #[test]
    fn test_play_san_accepts_variants() {
        let mut game = state("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1");
        let mv = game.play_san("0-0!").unwrap();
        assert!(mv.castling);

        let mut game = state("4k3/P7/8/8/8/8/8/4K3 w - - 0 1");
        game.play_san("a8R+").unwrap();
        let promoted = game.board().piece_at("a8".parse().unwrap()).unwrap();
        assert_eq!(promoted.kind, PieceType::Rook);
    }

    #[test]
    fn test_play_san_accepts_extra_disambiguation() {
        let mut game = GameState::new();
        assert_eq!(game.play_san("Ngf3").unwrap().to_string(), "g1f3");
        game.play_san("d5").unwrap();
        game.play_san("d4").unwrap();
        game.play_san("Nb8c6").unwrap();
        assert_eq!(game.play_san("Qd1d3").unwrap().to_string(), "d1d3");
        assert_eq!(game.moves_played(), 5);

        let mut game = state("4k3/P7/8/8/8/8/8/4K3 w - - 0 1");
        assert_eq!(game.play_san("a7a8N").unwrap().promotion, Some(PieceType::Knight));
    }

    #[test]
    fn test_play_san_rejects_ambiguous_or_wrong_hints() {
        let mut knights = state("4k3/8/8/8/8/5N2/8/1N2K3 w - - 0 1");
        let before = knights.clone();
        assert!(matches!(knights.play_san("Nd2"), Err(ChessError::UnresolvedSan(_))));
        assert!(matches!(knights.play_san("Nhd2"), Err(ChessError::UnresolvedSan(_))));
        assert!(matches!(knights.play_san("Nb1d3"), Err(ChessError::UnresolvedSan(_))));
        assert_eq!(knights, before);
        assert_eq!(knights.play_san("Nf3d2").unwrap().to_string(), "f3d2");
    }

    #[test]
    fn test_split_san() {
        assert_eq!(
            split_san("Qd1xd2"),
            Some(SanParts {
                kind: PieceType::Queen,
                file: Some('d'),
                rank: Some('1'),
                to: "d2".parse().unwrap(),
                promotion: None,
            })
        );
        assert_eq!(split_san("exd8Q").map(|p| (p.file, p.promotion)), Some((Some('e'), Some(PieceType::Queen))));
        assert_eq!(split_san("Zf3"), None);
        assert_eq!(split_san("Nf9"), None);
        assert_eq!(split_san("e8K"), None);
    }

    #[test]
    fn test_export_keeps_fen_move_numbers() {
        let mut game = state("4k3/8/8/8/8/8/4P3/4K3 b - - 0 30");
        game.play_san("Kd7").unwrap();
        game.play_san("e4").unwrap();
        game.play_san("Kd6").unwrap();

        let pgn = export_pgn(&game, &BTreeMap::new());
        assert!(pgn.contains("[FEN \"4k3/8/8/8/8/8/4P3/4K3 b - - 0 30\"]"));
        assert!(pgn.contains("30... Kd7 31. e4 Kd6 *"));

        let loaded = load_pgn(&pgn).unwrap();
        assert_eq!(loaded.state.to_fen(), game.to_fen());
        assert!(game.to_fen().ends_with(" 32"));
    }

    #[test]
    fn test_play_san_rejects_unknown_token() {
        let mut game = GameState::new();
        let before = game.clone();
        assert_eq!(
            game.play_san("Nf6"),
            Err(ChessError::UnresolvedSan("Nf6".to_string()))
        );
        assert_eq!(game, before);
    }

    #[test]
    fn test_export_fools_mate() {
        let mut headers = BTreeMap::new();
        headers.insert("White".to_owned(), "Alice".to_owned());
        headers.insert("Annotator".to_owned(), "bot".to_owned());
        let pgn = export_pgn(&fools_mate(), &headers);

        let lines: Vec<&str> = pgn.lines().collect();
        assert_eq!(lines[0], "[Event \"Casual Game\"]");
        assert_eq!(lines[4], "[White \"Alice\"]");
        assert_eq!(lines[6], "[Result \"0-1\"]");
        assert_eq!(lines[7], "[Annotator \"bot\"]");
        assert_eq!(lines[8], "");
        assert_eq!(lines[9], "1. f3 e5 2. g4 Qh4# 0-1");
        assert!(!pgn.contains("SetUp"));
    }

    #[test]
    fn test_export_from_custom_position() {
        let mut game = state("4k3/8/8/8/8/8/4P3/4K3 b - - 0 1");
        let mv = game.parse_move("e8d7").unwrap();
        game.make_move(&mv).unwrap();
        let mv = game.parse_move("e2e4").unwrap();
        game.make_move(&mv).unwrap();

        let pgn = export_pgn(&game, &BTreeMap::new());
        assert!(pgn.contains("[SetUp \"1\"]"));
        assert!(pgn.contains("[FEN \"4k3/8/8/8/8/8/4P3/4K3 b - - 0 1\"]"));
        assert!(pgn.contains("1... Kd7 2. e4 *"));

        let loaded = load_pgn(&pgn).unwrap();
        assert_eq!(loaded.state.board(), game.board());
        assert_eq!(loaded.result, "*");
    }

    #[test]
    fn test_load_strips_noise() {
        let text = r#"[Event "Test"]
[Site "Here"]
[Result "1-0"]

1. e4 {best by test} e5 2.Nf3 (2. f4 exf4) Nc6 $1 3. Bb5 a6?! 1-0
"#;
        let game = load_pgn(text).unwrap();
        assert_eq!(game.headers.get("Event").map(String::as_str), Some("Test"));
        assert_eq!(game.result, "1-0");
        assert_eq!(game.state.moves_played(), 6);
        assert_eq!(
            game.state.to_fen(),
            "r1bqkbnr/1ppp1ppp/p1n5/1B2p3/4P3/5N2/PPPP1PPP/RNBQK2R w KQkq - 0 4"
        );
    }

    #[test]
    fn test_load_reports_first_bad_token() {
        let err = load_pgn("1. e4 e5 2. Ke3 Nc6").unwrap_err();
        assert_eq!(err, ChessError::UnresolvedSan("Ke3".to_string()));

        let err = load_pgn("[SetUp \"1\"]\n\n1. e4").unwrap_err();
        assert!(matches!(err, ChessError::InvalidPgn(_)));

        let err = load_pgn("[Event Test]\n1. e4").unwrap_err();
        assert!(matches!(err, ChessError::InvalidPgn(_)));
    }

    #[test]
    fn test_export_then_load() {
        let original = fools_mate();
        let game = load_pgn(&export_pgn(&original, &BTreeMap::new())).unwrap();
        assert_eq!(game.state.board(), original.board());
        assert_eq!(game.result, "0-1");
        assert!(game.state.is_game_over());
    }

    #[test]
    fn test_move_number_stripping() {
        assert_eq!(
            parse_pgn_moves("1.e4 e5 2... Nc6 10. Bb5 *"),
            vec!["e4", "e5", "Nc6", "Bb5"]
        );
    }
}
