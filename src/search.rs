use std::cmp::Reverse;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::evaluation::Evaluator;
use crate::game_state::GameState;
use crate::movegen::Move;

/// Larger than any evaluation; used as the initial alpha-beta window.
pub const INFINITY: i32 = 1_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    /// Fixed depth, or the deepest iteration when a time budget is set.
    pub max_depth: u32,
    /// Enables iterative deepening. Checked between iterations only.
    pub time_budget: Option<Duration>,
    pub quiescence_depth: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            time_budget: None,
            quiescence_depth: 4,
        }
    }
}

/// Outcome of the last completed search depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchReport {
    pub depth: u32,
    pub score: i32,
    pub nodes: u64,
    pub best_move: Option<Move>,
}

/// Alpha-beta minimax over the legal-move tree.
///
/// Scores are from the point of view of the side to move at the root:
/// maximizing nodes are the ones where that side is to move again.
pub struct Search {
    evaluator: Evaluator,
    config: SearchConfig,
    nodes_searched: u64,
    last_report: Option<SearchReport>,
}

impl Search {
    pub fn new() -> Self {
        Search::with_config(SearchConfig::default())
    }

    /// A `max_depth` of 0 is raised to 1; a root search always looks one ply.
    pub fn with_config(config: SearchConfig) -> Self {
        Self {
            evaluator: Evaluator::new(),
            config: SearchConfig {
                max_depth: config.max_depth.max(1),
                ..config
            },
            nodes_searched: 0,
            last_report: None,
        }
    }

    pub fn with_evaluator(mut self, evaluator: Evaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn set_max_depth(&mut self, depth: u32) {
        self.config.max_depth = depth.max(1);
    }

    pub fn set_time_budget(&mut self, budget: Option<Duration>) {
        self.config.time_budget = budget;
    }

    pub fn nodes_searched(&self) -> u64 {
        self.nodes_searched
    }

    pub fn last_report(&self) -> Option<&SearchReport> {
        self.last_report.as_ref()
    }

    /// Best move for the side to move, or `None` when the game is over.
    /// The state is explored in place and handed back unchanged.
    pub fn choose_best_move(&mut self, state: &mut GameState) -> Option<Move> {
        match self.config.time_budget {
            Some(budget) => self.iterative_deepening(state, budget),
            None => self.search_depth(state, self.config.max_depth),
        }
    }

    pub fn search_depth(&mut self, state: &mut GameState, depth: u32) -> Option<Move> {
        let depth = depth.max(1);
        self.nodes_searched = 0;
        let (score, best_move) = self.minimax(state, depth, -INFINITY, INFINITY, true);
        self.last_report = Some(SearchReport {
            depth,
            score,
            nodes: self.nodes_searched,
            best_move,
        });
        best_move
    }

    /// Searches depth 1, 2, ... while the budget lasts. Only fully completed
    /// depths are kept; a running depth is never interrupted, so a slow last
    /// iteration can overrun the budget.
    pub fn iterative_deepening(&mut self, state: &mut GameState, budget: Duration) -> Option<Move> {
        let start = Instant::now();
        self.nodes_searched = 0;
        let mut completed: Option<SearchReport> = None;

        for depth in 1..=self.config.max_depth {
            if completed.is_some() && start.elapsed() >= budget {
                break;
            }
            let (score, best_move) = self.minimax(state, depth, -INFINITY, INFINITY, true);
            if best_move.is_none() {
                break;
            }
            completed = Some(SearchReport {
                depth,
                score,
                nodes: self.nodes_searched,
                best_move,
            });
            debug!(
                depth,
                score,
                nodes = self.nodes_searched,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "search depth completed"
            );
        }

        self.last_report = completed;
        completed.and_then(|report| report.best_move)
    }

    pub fn minimax(
        &mut self,
        state: &mut GameState,
        depth: u32,
        mut alpha: i32,
        mut beta: i32,
        maximizing: bool,
    ) -> (i32, Option<Move>) {
        self.nodes_searched += 1;

        if depth == 0 || state.is_game_over() {
            let score = self.quiescence_search(state, alpha, beta, maximizing, self.config.quiescence_depth);
            return (score, None);
        }

        let mut moves = state.legal_moves();
        if moves.is_empty() {
            return (self.leaf_score(state, maximizing), None);
        }
        self.order_moves(&mut moves);

        let mut best_score = if maximizing { i32::MIN } else { i32::MAX };
        let mut best_move = None;

        for mv in &moves {
            let undo = state.make_search_move(mv);
            let (score, _) = self.minimax(state, depth - 1, alpha, beta, !maximizing);
            state.unmake_search_move(mv, undo);

            if maximizing {
                if score > best_score {
                    best_score = score;
                    best_move = Some(*mv);
                }
                alpha = alpha.max(score);
            } else {
                if score < best_score {
                    best_score = score;
                    best_move = Some(*mv);
                }
                beta = beta.min(score);
            }

            if beta <= alpha {
                break;
            }
        }

        (best_score, best_move)
    }

    /// Capture-only extension. Stand pat first: a side that is already past
    /// the bound is not forced to capture.
    pub fn quiescence_search(
        &mut self,
        state: &mut GameState,
        mut alpha: i32,
        mut beta: i32,
        maximizing: bool,
        depth_limit: u32,
    ) -> i32 {
        self.nodes_searched += 1;

        let stand_pat = self.leaf_score(state, maximizing);
        if depth_limit == 0 || state.is_game_over() {
            return stand_pat;
        }

        if maximizing {
            if stand_pat >= beta {
                return beta;
            }
            alpha = alpha.max(stand_pat);
        } else {
            if stand_pat <= alpha {
                return alpha;
            }
            beta = beta.min(stand_pat);
        }

        let mut captures = state.legal_moves();
        captures.retain(Move::is_capture);
        self.order_moves(&mut captures);

        for mv in &captures {
            let undo = state.make_search_move(mv);
            let score = self.quiescence_search(state, alpha, beta, !maximizing, depth_limit - 1);
            state.unmake_search_move(mv, undo);

            if maximizing {
                if score > alpha {
                    alpha = score;
                    if alpha >= beta {
                        break;
                    }
                }
            } else if score < beta {
                beta = score;
                if beta <= alpha {
                    break;
                }
            }
        }

        if maximizing {
            alpha
        } else {
            beta
        }
    }

    /// Captures first, most valuable victim / least valuable attacker.
    /// Stable, so quiet moves keep generation order.
    pub fn order_moves(&self, moves: &mut [Move]) {
        moves.sort_by_key(|mv| Reverse(self.mvv_lva_score(mv)));
    }

    pub fn mvv_lva_score(&self, mv: &Move) -> i32 {
        match mv.captured {
            Some(victim) => {
                self.evaluator.piece_value(victim.kind) * 10 - self.evaluator.piece_value(mv.piece.kind)
            }
            None => 0,
        }
    }

    fn leaf_score(&self, state: &GameState, maximizing: bool) -> i32 {
        let score = self.evaluator.evaluate(state);
        if maximizing {
            score
        } else {
            -score
        }
    }
}

impl Default for Search {
    fn default() -> Self {
        Search::new()
    }
}

/// Fixed-depth search with default weights.
pub fn choose_best_move(state: &mut GameState, depth: u32) -> Option<Move> {
    let mut search = Search::with_config(SearchConfig {
        max_depth: depth,
        ..SearchConfig::default()
    });
    search.choose_best_move(state)
}

/// Iterative deepening under a wall-clock budget with default weights.
pub fn choose_best_move_timed(state: &mut GameState, budget: Duration, max_depth: u32) -> Option<Move> {
    let mut search = Search::with_config(SearchConfig {
        max_depth,
        time_budget: Some(budget),
        ..SearchConfig::default()
    });
    search.choose_best_move(state)
}
