use std::collections::BTreeMap;
use std::fs;
use std::io::{BufRead, Write};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use crate::evaluation::Evaluator;
use crate::game_state::GameState;
use crate::pgn::{export_pgn, load_pgn, move_to_san};
use crate::search::{Search, SearchConfig};

const DEFAULT_PGN_FILE: &str = "game.pgn";

const HELP: &str = "\
Commands:
  e2e4, e7e8q     play a move in coordinate notation
  undo / redo     step back or forward through the game
  history         list the moves played so far
  eval            static evaluation for the side to move
  bot             let the engine move for the side to move
  depth N         deepest search iteration
  time MS         think time per bot move (0 = fixed depth)
  fen [FEN]       show the position, or set up a new one
  export [FILE]   write the game as PGN (default game.pgn)
  load FILE       replay a PGN file
  board           show the board
  new             start a new game
  help            show this message
  quit            leave";

/// Interactive command interpreter over a single game.
pub struct CliHandler {
    state: GameState,
    search: Search,
    evaluator: Evaluator,
}

impl CliHandler {
    pub fn new() -> Self {
        CliHandler::with_config(SearchConfig {
            max_depth: 6,
            time_budget: Some(Duration::from_millis(1500)),
            ..SearchConfig::default()
        })
    }

    pub fn with_config(config: SearchConfig) -> Self {
        CliHandler {
            state: GameState::new(),
            search: Search::with_config(config),
            evaluator: Evaluator::new(),
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Reads commands until `quit`, end of input, or the end of the game.
    pub fn run<R: BufRead, W: Write>(&mut self, mut input: R, mut output: W) -> Result<()> {
        writeln!(output, "{}", self.state.board())?;
        let mut line = String::new();

        while !self.state.is_game_over() {
            write!(output, "{} to move> ", self.state.turn())?;
            output.flush()?;

            line.clear();
            if input.read_line(&mut line)? == 0 {
                break;
            }
            let command = line.trim();
            if matches!(command, "quit" | "exit") {
                return Ok(());
            }

            match self.handle_command(command) {
                Ok(response) if response.is_empty() => {}
                Ok(response) => writeln!(output, "{response}")?,
                Err(err) => writeln!(output, "Error: {err:#}")?,
            }
        }

        if self.state.is_game_over() {
            writeln!(output, "Game over. {}", self.state.status())?;
        }
        Ok(())
    }

    pub fn handle_command(&mut self, command: &str) -> Result<String> {
        let parts: Vec<&str> = command.split_whitespace().collect();
        let Some(&name) = parts.first() else {
            return Ok(String::new());
        };

        match name {
            "help" => Ok(HELP.to_string()),
            "board" => Ok(self.board_with_status()),
            "new" => {
                self.state = GameState::new();
                Ok(self.board_with_status())
            }
            "undo" => Ok(if self.state.undo_last_move() {
                format!("Undid last move.\n{}", self.state.board())
            } else {
                "No move to undo.".to_string()
            }),
            "redo" => Ok(if self.state.redo_last_move() {
                format!("Redid last move.\n{}", self.state.board())
            } else {
                "No move to redo.".to_string()
            }),
            "history" => {
                let history = self.state.history_text();
                Ok(if history.is_empty() {
                    "No moves played yet.".to_string()
                } else {
                    history
                })
            }
            "eval" => Ok(format!(
                "Eval score: {} (for {})",
                self.evaluator.evaluate(&self.state),
                self.state.turn()
            )),
            "bot" => self.bot_move(),
            "depth" => {
                let depth: u32 = parse_arg(&parts, "depth N")?;
                if depth == 0 {
                    bail!("depth must be at least 1");
                }
                self.search.set_max_depth(depth);
                Ok(format!("Search depth set to {depth}."))
            }
            "time" => {
                let millis: u64 = parse_arg(&parts, "time MS")?;
                if millis == 0 {
                    self.search.set_time_budget(None);
                    Ok(format!("Fixed-depth search ({} plies).", self.search.config().max_depth))
                } else {
                    self.search.set_time_budget(Some(Duration::from_millis(millis)));
                    Ok(format!("Think time set to {millis} ms."))
                }
            }
            "fen" if parts.len() == 1 => Ok(self.state.to_fen()),
            "fen" => {
                let fen = command["fen".len()..].trim();
                self.state = GameState::from_fen(fen)?;
                Ok(self.board_with_status())
            }
            "export" => {
                let path = parts.get(1).copied().unwrap_or(DEFAULT_PGN_FILE);
                let pgn = export_pgn(&self.state, &BTreeMap::new());
                fs::write(path, pgn).with_context(|| format!("failed to write {path}"))?;
                info!(path, moves = self.state.moves_played(), "game exported");
                Ok(format!("Game exported to {path}."))
            }
            "load" => {
                let Some(&path) = parts.get(1) else {
                    bail!("usage: load FILE");
                };
                let text = fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?;
                let game = load_pgn(&text).with_context(|| format!("failed to replay {path}"))?;
                self.state = game.state;
                info!(path, moves = self.state.moves_played(), "game loaded");
                Ok(format!("Loaded {path}.\n{}", self.board_with_status()))
            }
            _ => self.play(command),
        }
    }

    fn play(&mut self, text: &str) -> Result<String> {
        let requested = self.state.parse_move(text)?;
        self.state.make_move(&requested)?;
        Ok(self.board_with_status())
    }

    fn bot_move(&mut self) -> Result<String> {
        let Some(mv) = self.search.choose_best_move(&mut self.state) else {
            warn!(status = %self.state.status(), "bot asked to move with no move available");
            return Ok("Bot found no legal move.".to_string());
        };
        let san = move_to_san(&self.state, &mv);
        self.state.make_move(&mv)?;

        let mut reply = format!("Bot played: {san} ({mv})");
        if let Some(report) = self.search.last_report() {
            reply.push_str(&format!(
                " [depth {}, score {}, {} nodes]",
                report.depth, report.score, report.nodes
            ));
        }
        reply.push('\n');
        reply.push_str(&self.board_with_status());
        Ok(reply)
    }

    fn board_with_status(&self) -> String {
        let status = self.state.status();
        if status.is_over() {
            format!("{}\n{}", self.state.board(), status)
        } else if self.state.in_check(self.state.turn()) {
            format!("{}\n{} is in check.", self.state.board(), self.state.turn())
        } else {
            self.state.board().to_string()
        }
    }
}

impl Default for CliHandler {
    fn default() -> Self {
        CliHandler::new()
    }
}

fn parse_arg<T: std::str::FromStr>(parts: &[&str], usage: &str) -> Result<T> {
    match parts.get(1).map(|arg| arg.parse::<T>()) {
        Some(Ok(value)) if parts.len() == 2 => Ok(value),
        _ => bail!("usage: {usage}"),
    }
}
