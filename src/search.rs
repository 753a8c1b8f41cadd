/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{
    fmt,
    marker::PhantomData,
    ops::Neg,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use arrayvec::ArrayVec;
use uci_parser::{UciInfo, UciResponse, UciSearchOptions};

use crate::{
    evaluate, score_move, see_ge, tune, HistoryTable, KillerTable, LogLevel, Move, MovePicker,
    PawnHashTable, PieceKind, Position, Score, TTable, TTableEntry, Tablebase, MAX_DEPTH,
};

/// A marker trait for the types of nodes encountered during search.
///
/// Credit to Cosmo, author of Viridithas,
/// for the idea of using a const generic trait for this.
trait NodeType {
    /// Is this node the first searched?
    const ROOT: bool;

    /// Is this node a PV node?
    const PV: bool;
}

/// First node searched.
struct RootNode;
impl NodeType for RootNode {
    const ROOT: bool = true;
    const PV: bool = true;
}

/// A node on the principal variation, searched with a non-null window.
struct PvNode;
impl NodeType for PvNode {
    const ROOT: bool = false;
    const PV: bool = true;
}

/// A node not on the principal variation, searched with a null window.
struct NonPvNode;
impl NodeType for NonPvNode {
    const ROOT: bool = false;
    const PV: bool = false;
}

/// Signals that a search ran out of time, nodes, or was told to stop.
///
/// Returned through every frame of the recursion, so that each frame unmakes its move on the way out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchCancelled;

impl fmt::Display for SearchCancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "search cancelled")
    }
}

impl std::error::Error for SearchCancelled {}

/// Represents the best sequence of moves found during a search.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PrincipalVariation(ArrayVec<Move, MAX_DEPTH>);

impl PrincipalVariation {
    /// An empty PV.
    const EMPTY: Self = Self(ArrayVec::new_const());

    #[inline(always)]
    pub fn moves(&self) -> &[Move] {
        &self.0
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for PrincipalVariation {
    #[inline(always)]
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Bounds within an alpha-beta search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchBounds {
    /// Lower bound.
    ///
    /// We are guaranteed a score that is AT LEAST `alpha`.
    /// During search, if no move can raise `alpha`, we are said to have "failed low."
    pub alpha: Score,

    /// Upper bound.
    ///
    /// Our opponent is guaranteed a score that is AT MOST `beta`.
    /// During search, if a move scores higher than `beta`, we are said to have "failed high."
    pub beta: Score,
}

impl SearchBounds {
    /// Create a new [`SearchBounds`] from the provided `alpha` and `beta` values.
    #[inline(always)]
    pub const fn new(alpha: Score, beta: Score) -> Self {
        Self { alpha, beta }
    }

    /// Create a "null window" around `alpha`.
    #[inline(always)]
    fn null_alpha(self) -> Self {
        Self::new(self.alpha, self.alpha + 1)
    }

    /// Create a "null window" around `beta`.
    #[inline(always)]
    fn null_beta(self) -> Self {
        Self::new(self.beta - 1, self.beta)
    }
}

impl Neg for SearchBounds {
    type Output = Self;
    /// Negating a [`SearchBounds`] swaps the `alpha` and `beta` fields and negates them both.
    #[inline(always)]
    fn neg(self) -> Self::Output {
        Self {
            alpha: -self.beta,
            beta: -self.alpha,
        }
    }
}

impl Default for SearchBounds {
    /// Default [`SearchBounds`] are a `(-infinity, infinity)`.
    #[inline(always)]
    fn default() -> Self {
        Self::new(Score::ALPHA, Score::BETA)
    }
}

/// Represents a window around a search result to act as our a/b bounds.
#[derive(Debug)]
struct AspirationWindow {
    /// Bounds of this search window
    bounds: SearchBounds,

    /// Number of times that a score has been returned above beta.
    beta_fails: i32,

    /// Number of times that a score has been returned below alpha.
    alpha_fails: i32,
}

impl AspirationWindow {
    /// Returns a delta value to change window's size.
    ///
    /// Higher depths produce narrower windows.
    #[inline(always)]
    fn delta(depth: usize) -> Score {
        let initial_delta = tune::initial_aspiration_window_delta!();
        let min_delta = tune::min_aspiration_window_delta!();

        // Gradually decrease the window size from `8*init` to `min`
        Score(((initial_delta << 3) / depth.max(1) as i32).max(min_delta))
    }

    /// Creates a new [`AspirationWindow`] centered around `score`.
    #[inline(always)]
    fn new(score: Score, depth: usize) -> Self {
        // Mate scores fluctuate too much to be worth bounding
        let bounds = if depth < tune::min_aspiration_window_depth!() || score.is_mate() {
            SearchBounds::default()
        } else {
            let delta = Self::delta(depth);
            SearchBounds::new(
                (score - delta).max(Score::ALPHA),
                (score + delta).min(Score::BETA),
            )
        };

        Self {
            bounds,
            alpha_fails: 0,
            beta_fails: 0,
        }
    }

    /// Widens the window's `alpha` bound, expanding it downwards.
    ///
    /// This also resets the `beta` bound to `(alpha + beta) / 2`
    #[inline(always)]
    fn widen_down(&mut self, score: Score, depth: usize) {
        let delta = Self::delta(depth) * (1 << (self.alpha_fails + 1));

        self.bounds.beta = ((self.bounds.alpha + self.bounds.beta) / 2).min(Score::BETA);
        self.bounds.alpha = (score - delta).max(Score::ALPHA);

        self.alpha_fails += 1;
        self.give_up_if_exhausted();
    }

    /// Widens the window's `beta` bound, expanding it upwards.
    #[inline(always)]
    fn widen_up(&mut self, score: Score, depth: usize) {
        let delta = Self::delta(depth) * (1 << (self.beta_fails + 1));

        self.bounds.beta = (score + delta).min(Score::BETA);

        self.beta_fails += 1;
        self.give_up_if_exhausted();
    }

    /// After too many failures, search with an unbounded window.
    #[inline(always)]
    fn give_up_if_exhausted(&mut self) {
        if self.alpha_fails + self.beta_fails >= tune::max_aspiration_window_widenings!() {
            self.bounds = SearchBounds::default();
        }
    }

    /// Returns `true` if `score` fails low, meaning it is below `alpha` and the window must be expanded downwards.
    #[inline(always)]
    fn fails_low(&self, score: Score) -> bool {
        self.bounds.alpha != Score::ALPHA && score <= self.bounds.alpha
    }

    /// Returns `true` if `score` fails high, meaning it is above `beta` and the window must be expanded upwards.
    #[inline(always)]
    fn fails_high(&self, score: Score) -> bool {
        self.bounds.beta != Score::BETA && score >= self.bounds.beta
    }
}

/// The result of a search, containing the best move found, score, and total nodes searched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchResult {
    /// Number of nodes searched.
    pub nodes: u64,

    /// Best move found during the search.
    pub bestmove: Option<Move>,

    /// Evaluation of the position after `bestmove` is made.
    pub score: Score,

    /// The depth of the last completed iteration.
    pub depth: usize,

    /// Principal variation of the last completed iteration.
    pub pv: PrincipalVariation,
}

impl Default for SearchResult {
    /// A default search result should initialize to a *very bad* value,
    /// since there isn't a move to play.
    #[inline(always)]
    fn default() -> Self {
        Self {
            nodes: 0,
            bestmove: None,
            score: Score::ALPHA,
            depth: 0,
            pv: PrincipalVariation::EMPTY,
        }
    }
}

/// Configuration variables for executing a [`Search`].
#[derive(Debug, Clone, Copy)]
pub struct SearchConfig {
    /// Maximum depth to execute the search.
    pub max_depth: usize,

    /// Node allowance.
    ///
    /// If the search exceeds this many nodes, it will exit as quickly as possible.
    pub max_nodes: u64,

    /// Start time of the search.
    pub starttime: Instant,

    /// Soft limit on search time.
    ///
    /// No new iteration of iterative deepening is started once this has elapsed.
    pub soft_timeout: Duration,

    /// Hard limit on search time.
    ///
    /// During *any* point in the search, if this limit is exceeded, the search will cancel.
    pub hard_timeout: Duration,

    /// Centipawns a drawn line costs the side that is ahead.
    pub contempt: i32,
}

impl SearchConfig {
    /// Constructs a new [`SearchConfig`] from the provided UCI options and position.
    ///
    /// The [`Position`] determines whose clock is used when computing the soft/hard timeouts.
    pub fn new(options: UciSearchOptions, position: &Position) -> Self {
        let mut config = Self::default();

        if let Some(depth) = options.depth {
            config.max_depth = (depth as usize).clamp(1, MAX_DEPTH - 1);
        }

        if let Some(nodes) = options.nodes {
            config.max_nodes = nodes as u64;
        }

        // If `movetime` was supplied, search that long.
        if let Some(movetime) = options.movetime {
            config.hard_timeout = movetime;
            config.soft_timeout = movetime;
        } else {
            // Otherwise, search based on time remaining and increment
            let (time, inc) = if position.side_to_move().is_white() {
                (options.wtime, options.winc)
            } else {
                (options.btime, options.binc)
            };

            // Only calculate timeouts if a time was provided
            if let Some(time) = time {
                let inc = inc.unwrap_or(Duration::ZERO) / tune::time_inc_divisor!();

                config.soft_timeout = time / tune::soft_timeout_divisor!() + inc;
                config.hard_timeout = (time / tune::hard_timeout_divisor!() + inc).min(time);
            }
        }

        config
    }
}

impl Default for SearchConfig {
    /// A default [`SearchConfig`] will permit an "infinite" search.
    ///
    /// The word "infinite" is quoted here because the actual defaults are the `::MAX` values for each field.
    #[inline(always)]
    fn default() -> Self {
        Self {
            max_depth: MAX_DEPTH - 1,
            max_nodes: u64::MAX,
            starttime: Instant::now(),
            soft_timeout: Duration::MAX,
            hard_timeout: Duration::MAX,
            contempt: tune::contempt!(),
        }
    }
}

/// Parameters for the various features used to enhance the efficiency of a search.
#[derive(Debug, Clone, Copy, PartialEq)]
struct SearchParameters {
    /// Minimum depth at which null move pruning can be applied.
    min_nmp_depth: i32,

    /// Value to subtract from `depth` when applying null move pruning.
    nmp_reduction: i32,

    /// Maximum depth at which to apply reverse futility pruning.
    max_rfp_depth: i32,

    /// Safety margin per ply when applying reverse futility pruning.
    rfp_margin: i32,

    /// Maximum depth at which to apply razoring.
    max_razoring_depth: i32,

    /// Razoring margins, indexed by depth.
    razoring_margins: [i32; 4],

    /// Maximum depth at which to apply futility pruning.
    max_futility_depth: i32,

    /// Futility margins, indexed by depth.
    futility_margins: [i32; 4],

    /// Minimum depth at which to apply late move reductions.
    min_lmr_depth: i32,

    /// Minimum moves that must be made before late move reductions can be applied.
    min_lmr_moves: usize,

    /// Base value in the LMR formula.
    lmr_offset: f32,

    /// Divisor in the LMR formula.
    lmr_divisor: f32,

    /// Margin above the best possible capture before qsearch gives up on a node.
    delta_margin: i32,

    /// Captures losing more than this are skipped in qsearch.
    qsearch_see_threshold: i32,
}

impl Default for SearchParameters {
    fn default() -> Self {
        Self {
            min_nmp_depth: tune::min_nmp_depth!(),
            nmp_reduction: tune::nmp_reduction!(),
            max_rfp_depth: tune::max_rfp_depth!(),
            rfp_margin: tune::rfp_margin!(),
            max_razoring_depth: tune::max_razoring_depth!(),
            razoring_margins: tune::razoring_margins!(),
            max_futility_depth: tune::max_futility_depth!(),
            futility_margins: tune::futility_margins!(),
            min_lmr_depth: tune::min_lmr_depth!(),
            min_lmr_moves: tune::min_lmr_moves!(),
            lmr_offset: tune::lmr_offset!(),
            lmr_divisor: tune::lmr_divisor!(),
            delta_margin: tune::delta_margin!(),
            qsearch_see_threshold: tune::qsearch_see_threshold!(),
        }
    }
}

/// Executes a search on a position.
pub struct Search<'a, Log> {
    /// Number of nodes searched.
    nodes: u64,

    /// An atomic flag to determine if the search should be cancelled at any time.
    ///
    /// If this is ever `false`, the search must exit as soon as possible.
    is_searching: Arc<AtomicBool>,

    /// Configuration variables for this instance of the search.
    config: SearchConfig,

    /// Nodes between checks of the clock, as a mask.
    time_check_mask: u64,

    /// Transposition table used to cache information during search.
    ttable: &'a mut TTable,

    /// Cache of pawn structure evaluations.
    pawns: &'a mut PawnHashTable,

    /// Storage for quiet moves that cause a beta-cutoff during search.
    history: &'a mut HistoryTable,

    /// Quiet moves that caused a beta-cutoff, by ply.
    killers: &'a mut KillerTable,

    /// Endgame tablebase consulted at the root and at nodes with few enough pieces.
    tablebase: &'a dyn Tablebase,

    /// Best move of the root, as found by the iteration in progress.
    root_bestmove: Option<Move>,

    /// Parameters for search features like pruning, extensions, etc.
    params: SearchParameters,

    /// Marker for the level of logging to print.
    log: PhantomData<Log>,
}

impl<'a, Log: LogLevel> Search<'a, Log> {
    /// Construct a new [`Search`] instance to execute.
    #[inline(always)]
    pub fn new(
        is_searching: Arc<AtomicBool>,
        config: SearchConfig,
        ttable: &'a mut TTable,
        pawns: &'a mut PawnHashTable,
        history: &'a mut HistoryTable,
        killers: &'a mut KillerTable,
        tablebase: &'a dyn Tablebase,
    ) -> Self {
        let low_time = Duration::from_millis(tune::low_time_threshold!());
        let time_check_mask = if config.hard_timeout < low_time {
            tune::low_time_check_mask!()
        } else {
            tune::time_check_mask!()
        };

        Self {
            nodes: 0,
            is_searching,
            config,
            time_check_mask,
            ttable,
            pawns,
            history,
            killers,
            tablebase,
            root_bestmove: None,
            params: SearchParameters::default(),
            log: PhantomData,
        }
    }

    /// Start the search on the supplied [`Position`], returning a [`SearchResult`].
    ///
    /// This is the entrypoint of the search, and prints UCI info before starting iterative deepening,
    /// concluding by sending the `bestmove` message and exiting.
    ///
    /// The position is searched in place, and is identical to its original state when this returns.
    pub fn start(mut self, position: &mut Position) -> SearchResult {
        if Log::DEBUG {
            self.send_string(format!("Starting search on {:?}", position.to_fen()));

            let soft = self.config.soft_timeout.as_millis();
            let hard = self.config.hard_timeout.as_millis();
            let nodes = self.config.max_nodes;
            let depth = self.config.max_depth;

            if soft < Duration::MAX.as_millis() {
                self.send_string(format!("Soft timeout := {soft}ms"));
            }
            if hard < Duration::MAX.as_millis() {
                self.send_string(format!("Hard timeout := {hard}ms"));
            }
            if nodes < u64::MAX {
                self.send_string(format!("Max nodes := {nodes} nodes"));
            }
            if depth < MAX_DEPTH - 1 {
                self.send_string(format!("Max depth := {depth}"));
            }
        }

        let res = match self.probe_root_tablebase(position) {
            Some(res) => {
                if Log::INFO {
                    self.send_search_info(&res);
                }
                res
            }
            None => self.iterative_deepening(position),
        };

        if Log::DEBUG {
            let hits = self.ttable.hits;
            let accesses = self.ttable.accesses;
            let hit_rate = hits as f32 / accesses.max(1) as f32 * 100.0;
            let collisions = self.ttable.collisions;
            self.send_string(format!(
                "TT stats: {hits} hits / {accesses} accesses ({hit_rate:.2}% hit rate), {collisions} collisions"
            ));

            let hits = self.pawns.hits;
            let accesses = self.pawns.accesses;
            let hit_rate = hits as f32 / accesses.max(1) as f32 * 100.0;
            self.send_string(format!(
                "Pawn hash stats: {hits} hits / {accesses} accesses ({hit_rate:.2}% hit rate)"
            ));
        }

        // Search has ended; send bestmove
        if Log::INFO {
            self.send_response(UciResponse::BestMove {
                bestmove: res.bestmove.map(|mv| mv.to_uci()),
                ponder: res.pv.moves().get(1).map(|mv| mv.to_uci()),
            });
        }

        // Search has concluded, alert other thread(s) that we are no longer searching
        self.is_searching.store(false, Ordering::Relaxed);

        res
    }

    /// Sends a [`UciResponse`] to `stdout`.
    #[inline(always)]
    fn send_response<T: fmt::Display>(&self, response: UciResponse<T>) {
        println!("{response}");
    }

    /// Sends a [`UciInfo`] to `stdout`.
    #[inline(always)]
    fn send_info(&self, info: UciInfo) {
        self.send_response(UciResponse::<String>::info(info));
    }

    /// Sends UCI info about a completed iteration.
    #[inline(always)]
    fn send_search_info(&self, result: &SearchResult) {
        let elapsed = self.config.starttime.elapsed();

        self.send_info(
            UciInfo::new()
                .depth(result.depth)
                .nodes(self.nodes)
                .score(result.score)
                .nps((self.nodes as f32 / elapsed.as_secs_f32()).trunc())
                .time(elapsed.as_millis())
                .hashfull(self.ttable.hashfull())
                .pv(result.pv.moves().iter().map(|mv| mv.to_uci())),
        );
    }

    /// Helper to send a [`UciInfo`] containing only a `string` message to `stdout`.
    #[inline(always)]
    fn send_string<T: fmt::Display>(&self, string: T) {
        self.send_response(UciResponse::info_string(string));
    }

    /// Performs [iterative deepening](https://www.chessprogramming.org/Iterative_Deepening) (ID) on the position.
    ///
    /// Searches at depth `1`, then `2`, and so on, until the soft timeout has elapsed, the maximum depth
    /// is reached, or a mate is proven. An iteration cut short by cancellation is discarded,
    /// leaving the result of the last completed iteration.
    fn iterative_deepening(&mut self, position: &mut Position) -> SearchResult {
        // Initialize `bestmove` to the first move available
        let mut result = SearchResult {
            bestmove: position.legal_moves().first().copied(),
            ..Default::default()
        };

        let mut depth = 1;

        /****************************************************************************************************
         * Iterative Deepening: https://www.chessprogramming.org/Iterative_Deepening
         ****************************************************************************************************/
        'iterative_deepening: while depth <= self.config.max_depth
            && (depth == 1 || self.config.starttime.elapsed() < self.config.soft_timeout)
            && self.is_searching.load(Ordering::Relaxed)
        {
            /****************************************************************************************************
             * Aspiration Windows: https://www.chessprogramming.org/Aspiration_Windows
             ****************************************************************************************************/
            let mut window = AspirationWindow::new(result.score, depth);

            let score = 'aspiration_window: loop {
                let score = match self.alpha_beta::<RootNode>(
                    position,
                    depth as i32,
                    0,
                    window.bounds,
                    false,
                ) {
                    Ok(score) => score,
                    Err(SearchCancelled) => {
                        if Log::DEBUG {
                            self.send_string(format!("Search cancelled during depth {depth}"));
                        }
                        break 'iterative_deepening;
                    }
                };

                // If the score fell outside of the aspiration window, widen it gradually
                if window.fails_low(score) {
                    window.widen_down(score, depth);
                } else if window.fails_high(score) {
                    window.widen_up(score, depth);
                } else {
                    break 'aspiration_window score;
                }

                if Log::DEBUG {
                    self.send_string(format!(
                        "Aspiration window at depth {depth} failed with {score}, widened to [{}, {}]",
                        window.bounds.alpha, window.bounds.beta
                    ));
                }
            };

            /****************************************************************************************************
             * Update current best score
             ****************************************************************************************************/
            result.score = score;
            result.depth = depth;
            if let Some(bestmove) = self.root_bestmove {
                result.bestmove = Some(bestmove);
            }
            result.pv = self.extract_pv(position, result.bestmove, depth);

            if Log::INFO {
                self.send_search_info(&result);
            }

            // No deeper search can improve on a mate found within the full-width horizon
            if score.is_mate() && score.plies_to_mate() <= depth as i32 {
                break 'iterative_deepening;
            }

            depth += 1;
        }

        result.nodes = self.nodes;
        result
    }

    /// Primary location of search logic.
    ///
    /// Uses the [negamax](https://www.chessprogramming.org/Negamax) algorithm.
    /// A beta cutoff in the move loop returns `beta` itself, while a node that fails low returns its best score.
    fn alpha_beta<Node: NodeType>(
        &mut self,
        position: &mut Position,
        depth: i32,
        ply: usize,
        mut bounds: SearchBounds,
        allow_null: bool,
    ) -> Result<Score, SearchCancelled> {
        self.count_node()?;

        if ply >= MAX_DEPTH - 1 {
            return Ok(self.evaluate(position));
        }

        if !Node::ROOT {
            /****************************************************************************************************
             * Draw detection
             ****************************************************************************************************/
            if position.is_insufficient_material() {
                return Ok(Score::DRAW);
            }

            let repetitions = position.repetitions();
            if repetitions >= 4 {
                return Ok(Score::DRAW);
            }
            // Checkmate on the move that reaches the fifty-move limit still wins
            if repetitions >= 2 || (position.is_fifty_move_draw() && !position.is_checkmate()) {
                return Ok(self.draw_score(position));
            }

            /****************************************************************************************************
             * Mate Distance Pruning: https://www.chessprogramming.org/Mate_Distance_Pruning
             *
             * Even mating on the very next move cannot beat a mate already found closer to the root.
             ****************************************************************************************************/
            bounds.alpha = bounds.alpha.max(Score::mated_in(ply));
            bounds.beta = bounds.beta.min(Score::mate_in(ply + 1));
            if bounds.alpha >= bounds.beta {
                return Ok(bounds.alpha);
            }

            /****************************************************************************************************
             * Endgame tablebases
             ****************************************************************************************************/
            if let Some(score) = self.probe_tablebase(position, depth, ply) {
                return Ok(score);
            }
        }

        /****************************************************************************************************
         * TT Cutoffs: https://www.chessprogramming.org/Transposition_Table#Transposition_Table_Cutoffs
         ****************************************************************************************************/
        let tt_entry = self.ttable.probe(&position.key());
        let mut tt_move = tt_entry.as_ref().and_then(|entry| entry.bestmove);

        if !Node::PV {
            if let Some(entry) = tt_entry.filter(|entry| entry.depth as i32 >= depth) {
                if let Some(score) = entry.try_score(bounds, ply as i32) {
                    return Ok(score);
                }

                // A bound that doesn't cut off may still narrow the window
                let score = entry.score.from_tt(ply as i32);
                match entry.node_type {
                    crate::NodeType::Cut => bounds.alpha = bounds.alpha.max(score),
                    crate::NodeType::All => bounds.beta = bounds.beta.min(score),
                    crate::NodeType::Pv => {}
                }
            }
        }

        if Node::ROOT {
            tt_move = self.root_bestmove.or(tt_move);
            self.root_bestmove = None;
        }

        /****************************************************************************************************
         * Quiescence Search: https://www.chessprogramming.org/Quiescence_Search
         ****************************************************************************************************/
        if depth <= 0 {
            return self.quiescence(position, ply, bounds);
        }

        let in_check = position.is_in_check();

        // Low-depth pruning only happens away from the PV and out of check
        let static_eval = (!in_check && !Node::PV).then(|| self.evaluate(position));
        let mut futile = false;
        if let Some(eval) = static_eval {
            if let Some(score) = self.node_pruning_score(position, depth, ply, bounds, eval, allow_null)? {
                return Ok(score);
            }

            /****************************************************************************************************
             * Futility Pruning: https://www.chessprogramming.org/Futility_Pruning
             *
             * If even a generous margin cannot lift the static eval to alpha, quiet moves are hopeless.
             ****************************************************************************************************/
            futile = depth <= self.params.max_futility_depth
                && !bounds.alpha.is_mate()
                && eval + self.params.futility_margins[depth as usize] <= bounds.alpha;
        }

        /****************************************************************************************************
         * Primary move loop
         ****************************************************************************************************/
        let killers = self.killers.get(ply);
        let history: &HistoryTable = self.history;
        let picker = MovePicker::new(position.generate_moves(false), |&mv| {
            score_move(position, mv, tt_move, killers, history)
        });

        let original_alpha = bounds.alpha;
        let mut best = Score::ALPHA;
        let mut bestmove = None;
        let mut legal = 0;

        for (mv, _) in picker {
            position.make_move(mv);
            if position.left_king_in_check() {
                position.unmake_move(mv);
                continue;
            }
            legal += 1;

            let gives_check = position.is_in_check();

            if futile && legal > 1 && mv.is_quiet() && !gives_check {
                position.unmake_move(mv);
                continue;
            }

            /****************************************************************************************************
             * Check Extensions: https://www.chessprogramming.org/Check_Extensions
             ****************************************************************************************************/
            let new_depth = depth - 1 + gives_check as i32;

            let reduction = if mv.is_quiet() && !gives_check && !in_check {
                self.reduction::<Node>(depth, legal)
            } else {
                0
            };

            let searched = self.search_move::<Node>(position, new_depth, reduction, ply, bounds, legal);
            position.unmake_move(mv);
            let score = searched?;

            /****************************************************************************************************
             * Score evaluation & bounds adjustments
             ****************************************************************************************************/
            if score > best {
                best = score;
                bestmove = Some(mv);

                if Node::ROOT {
                    self.root_bestmove = Some(mv);
                }

                if score > bounds.alpha {
                    bounds.alpha = score;
                }

                // Fail high
                if score >= bounds.beta {
                    /****************************************************************************************************
                     * Killers and the History Heuristic
                     *
                     * A quiet move that fails high is probably good elsewhere at this ply, too.
                     ****************************************************************************************************/
                    if mv.is_quiet() {
                        self.killers.store(ply, mv);
                        self.history.update(mv, depth);
                    }

                    // Fail hard: a refuted node is only known to be worth at least beta
                    best = bounds.beta;
                    break;
                }
            }
        }

        // If there are no legal moves, it's either mate or a draw.
        if legal == 0 {
            return Ok(if in_check {
                Score::mated_in(ply)
            } else {
                Score::DRAW
            });
        }

        self.ttable.store(TTableEntry::new(
            position.key(),
            bestmove,
            best,
            SearchBounds::new(original_alpha, bounds.beta),
            depth.clamp(0, u8::MAX as i32) as u8,
            ply as i32,
        ));

        Ok(best)
    }

    /// Searches the child reached by the move just made, returning its score from this node's perspective.
    ///
    /// The first legal move is searched with the full window.
    /// Later moves get a (possibly reduced) null window first, and are re-searched only if they beat alpha.
    fn search_move<Node: NodeType>(
        &mut self,
        position: &mut Position,
        new_depth: i32,
        reduction: i32,
        ply: usize,
        bounds: SearchBounds,
        legal: usize,
    ) -> Result<Score, SearchCancelled> {
        if legal == 1 {
            return if Node::PV {
                Ok(-self.alpha_beta::<PvNode>(position, new_depth, ply + 1, -bounds, true)?)
            } else {
                Ok(-self.alpha_beta::<NonPvNode>(position, new_depth, ply + 1, -bounds, true)?)
            };
        }

        /****************************************************************************************************
         * Late Move Reductions: https://www.chessprogramming.org/Late_Move_Reductions
         ****************************************************************************************************/
        let reduced_depth = new_depth - reduction;
        let mut score = -self.alpha_beta::<NonPvNode>(
            position,
            reduced_depth,
            ply + 1,
            -bounds.null_alpha(),
            true,
        )?;

        // A reduced search that beats alpha is not trusted
        if score > bounds.alpha && reduced_depth < new_depth {
            score = -self.alpha_beta::<NonPvNode>(
                position,
                new_depth,
                ply + 1,
                -bounds.null_alpha(),
                true,
            )?;
        }

        /****************************************************************************************************
         * Principal Variation Search: https://en.wikipedia.org/wiki/Principal_variation_search#Pseudocode
         ****************************************************************************************************/
        if Node::PV && score > bounds.alpha && score < bounds.beta {
            score = -self.alpha_beta::<PvNode>(position, new_depth, ply + 1, -bounds, true)?;
        }

        Ok(score)
    }

    /// Quiescence Search (QSearch)
    ///
    /// A search that looks at only captures, or at every evasion when in check,
    /// until the position is quiet. Called when [`Search::alpha_beta`] reaches a depth of 0.
    fn quiescence(
        &mut self,
        position: &mut Position,
        ply: usize,
        mut bounds: SearchBounds,
    ) -> Result<Score, SearchCancelled> {
        self.count_node()?;

        if ply >= MAX_DEPTH - 1 {
            return Ok(self.evaluate(position));
        }

        let in_check = position.is_in_check();

        // When in check, standing pat is not an option
        let mut best = Score::mated_in(ply);
        if !in_check {
            let stand_pat = self.evaluate(position);

            // Beta cutoff; this position is "too good" and our opponent would never let us get here
            if stand_pat >= bounds.beta {
                return Ok(stand_pat);
            }

            /****************************************************************************************************
             * Delta Pruning: https://www.chessprogramming.org/Delta_Pruning
             ****************************************************************************************************/
            if stand_pat + PieceKind::Queen.value() + self.params.delta_margin < bounds.alpha {
                return Ok(stand_pat);
            }

            bounds.alpha = bounds.alpha.max(stand_pat);
            best = stand_pat;
        }

        let history: &HistoryTable = self.history;
        let picker = MovePicker::new(position.generate_moves(!in_check), |&mv| {
            score_move(position, mv, None, [None; 2], history)
        });

        for (mv, _) in picker {
            // Skip captures that lose material outright
            if !in_check && !see_ge(position, mv, self.params.qsearch_see_threshold) {
                continue;
            }

            position.make_move(mv);
            if position.left_king_in_check() {
                position.unmake_move(mv);
                continue;
            }

            let searched = self.quiescence(position, ply + 1, -bounds);
            position.unmake_move(mv);
            let score = -searched?;

            if score > best {
                best = score;

                if score > bounds.alpha {
                    bounds.alpha = score;
                }

                if score >= bounds.beta {
                    break;
                }
            }
        }

        Ok(best) // fail-soft
    }

    /// If we can prune the provided node, this function returns a score to return upon pruning.
    ///
    /// If we cannot prune the node, this function returns `None`.
    #[inline]
    fn node_pruning_score(
        &mut self,
        position: &mut Position,
        depth: i32,
        ply: usize,
        bounds: SearchBounds,
        static_eval: Score,
        allow_null: bool,
    ) -> Result<Option<Score>, SearchCancelled> {
        /****************************************************************************************************
         * Razoring: https://www.chessprogramming.org/Razoring
         *
         * If the static eval of our position is low enough, check if a qsearch can beat alpha.
         * If it can't, we can prune this node.
         ****************************************************************************************************/
        if depth <= self.params.max_razoring_depth
            && static_eval + self.params.razoring_margins[depth as usize] < bounds.alpha
        {
            let score = self.quiescence(position, ply, bounds.null_alpha())?;
            if score <= bounds.alpha {
                return Ok(Some(score));
            }
        }

        /****************************************************************************************************
         * Reverse Futility Pruning: https://www.chessprogramming.org/Reverse_Futility_Pruning
         *
         * If our static eval is too good (better than beta), we can prune this branch. Multiplying our
         * margin by depth makes this pruning process less risky for higher depths.
         ****************************************************************************************************/
        let rfp_score = static_eval - self.params.rfp_margin * depth;
        if depth <= self.params.max_rfp_depth && !bounds.beta.is_mate() && rfp_score >= bounds.beta {
            return Ok(Some(rfp_score));
        }

        /****************************************************************************************************
         * Null Move Pruning: https://www.chessprogramming.org/Null_Move_Pruning
         *
         * If we can afford to skip our turn and give our opponent two moves in a row while maintaining a high
         * enough score, we can prune this branch as our opponent would likely never let us reach it anyway.
         ****************************************************************************************************/
        let can_perform_nmp = allow_null
            && depth >= self.params.min_nmp_depth
            && static_eval >= bounds.beta
            // Zugzwang is likely when only Kings and Pawns remain
            && position.has_non_pawn_material(position.side_to_move());

        if can_perform_nmp {
            position.make_null_move();
            let nmp_depth = depth - 1 - self.params.nmp_reduction;
            let searched =
                self.alpha_beta::<NonPvNode>(position, nmp_depth, ply + 1, -bounds.null_beta(), false);
            position.unmake_null_move();
            let score = -searched?;

            if score >= bounds.beta {
                // Mates found after passing are not proven
                return Ok(Some(if score.is_mate() { bounds.beta } else { score }));
            }
        }

        Ok(None)
    }

    /// Compute a reduction value (`R`) to apply to the `moves_made`th move of a node, if possible.
    #[inline(always)]
    fn reduction<Node: NodeType>(&self, depth: i32, moves_made: usize) -> i32 {
        if depth < self.params.min_lmr_depth
            || moves_made <= self.params.min_lmr_moves + Node::PV as usize
        {
            return 0;
        }

        // Base LMR reduction increases as we go higher in depth and/or make more moves
        let reduction = self.params.lmr_offset
            + (depth as f32).ln() * (moves_made as f32).ln() / self.params.lmr_divisor;

        (reduction as i32).clamp(0, depth - 2)
    }

    /// Counts a node, cancelling the search if any of its limits were exceeded.
    ///
    /// The clock and the stop flag are only read every few thousand nodes.
    #[inline(always)]
    fn count_node(&mut self) -> Result<(), SearchCancelled> {
        self.nodes += 1;

        if self.nodes >= self.config.max_nodes {
            return Err(SearchCancelled);
        }

        if self.nodes & self.time_check_mask == 0
            && (self.config.starttime.elapsed() >= self.config.hard_timeout
                || !self.is_searching.load(Ordering::Relaxed))
        {
            return Err(SearchCancelled);
        }

        Ok(())
    }

    /// Evaluates `position` from the side-to-move's perspective.
    #[inline(always)]
    fn evaluate(&mut self, position: &Position) -> Score {
        evaluate(position, self.pawns)
    }

    /// Score of a claimable draw for the side to move.
    ///
    /// A side that is ahead loses `contempt` by drawing, and a side that is behind gains it.
    fn draw_score(&mut self, position: &Position) -> Score {
        let eval = self.evaluate(position);
        Score(-eval.0.signum() * self.config.contempt)
    }

    /// Probes the tablebase at an interior node, caching a hit as an exact TT entry.
    fn probe_tablebase(&mut self, position: &Position, depth: i32, ply: usize) -> Option<Score> {
        if position.occupied().population() as u32 > self.tablebase.max_pieces() {
            return None;
        }

        let score = self.tablebase.probe(position)?.score(ply);

        self.ttable.store(TTableEntry::new(
            position.key(),
            None,
            score,
            SearchBounds::default(),
            depth.clamp(0, u8::MAX as i32) as u8,
            ply as i32,
        ));

        Some(score)
    }

    /// Picks a root move by probing the tablebase after every legal move.
    ///
    /// Only succeeds if the tablebase can answer for every child.
    fn probe_root_tablebase(&mut self, position: &mut Position) -> Option<SearchResult> {
        let pieces = position.occupied().population() as u32;
        if pieces > self.tablebase.max_pieces() {
            return None;
        }

        let mut best: Option<(Move, Score)> = None;
        for mv in position.legal_moves() {
            position.make_move(mv);
            let child = self.tablebase.probe(position);
            position.unmake_move(mv);

            let score = -child?.score(1);
            if best.map_or(true, |(_, best)| score > best) {
                best = Some((mv, score));
            }
        }

        let (bestmove, score) = best?;
        let mut pv = PrincipalVariation::default();
        pv.0.push(bestmove);

        Some(SearchResult {
            nodes: 0,
            bestmove: Some(bestmove),
            score,
            depth: 1,
            pv,
        })
    }

    /// Follows best moves through the TT, starting with `bestmove`, for at most `depth` moves.
    ///
    /// Every move is made and then unmade, leaving `position` as it was.
    fn extract_pv(
        &self,
        position: &mut Position,
        bestmove: Option<Move>,
        depth: usize,
    ) -> PrincipalVariation {
        let mut pv = PrincipalVariation::default();
        let mut next = bestmove;

        while let Some(mv) = next {
            if pv.len() >= depth.min(MAX_DEPTH) || !position.legal_moves().contains(&mv) {
                break;
            }

            position.make_move(mv);
            pv.0.push(mv);

            // A repeated position would loop forever
            if position.repetitions() > 0 {
                break;
            }

            next = self.ttable.get(&position.key()).and_then(|entry| entry.bestmove);
        }

        for &mv in pv.0.iter().rev() {
            position.unmake_move(mv);
        }

        pv
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::*;

    struct Tables {
        ttable: TTable,
        pawns: PawnHashTable,
        history: HistoryTable,
        killers: KillerTable,
    }

    impl Tables {
        fn new() -> Self {
            Self {
                ttable: TTable::new(4),
                pawns: PawnHashTable::new(1),
                history: HistoryTable::default(),
                killers: KillerTable::default(),
            }
        }

        fn search(&mut self, config: SearchConfig) -> Search<'_, LogNone> {
            Search::new(
                Arc::new(AtomicBool::new(true)),
                config,
                &mut self.ttable,
                &mut self.pawns,
                &mut self.history,
                &mut self.killers,
                &NoTablebase,
            )
        }
    }

    fn run_search(fen: &str, config: SearchConfig) -> SearchResult {
        let mut position = fen.parse().unwrap();
        Tables::new().search(config).start(&mut position)
    }

    fn ensure_is_mate_in(fen: &str, config: SearchConfig, moves: i32) -> SearchResult {
        let res = run_search(fen, config);
        assert!(
            res.score.is_mate(),
            "Search on {fen:?} with config {config:#?} produced result that is not mate.\nResult: {res:#?}"
        );
        assert_eq!(
            res.score.moves_to_mate(),
            moves,
            "Search on {fen:?} with config {config:#?} produced result not mate in {moves}.\nResult: {res:#?}"
        );
        res
    }

    /// Search parameters with every pruning technique switched off.
    fn exhaustive_params() -> SearchParameters {
        SearchParameters {
            min_nmp_depth: i32::MAX,
            max_rfp_depth: -1,
            max_razoring_depth: -1,
            max_futility_depth: -1,
            min_lmr_depth: i32::MAX,
            delta_margin: 1_000_000,
            qsearch_see_threshold: i32::MIN,
            ..Default::default()
        }
    }

    /// Plain negamax over every legal move, sharing the leaves and extensions of the real search.
    fn minimax(search: &mut Search<LogNone>, position: &mut Position, depth: i32, ply: usize) -> Score {
        if depth <= 0 {
            if position.is_insufficient_material() {
                return Score::DRAW;
            }
            return search
                .quiescence(position, ply, SearchBounds::default())
                .unwrap();
        }

        let moves = position.legal_moves();
        if moves.is_empty() {
            return if position.is_in_check() {
                Score::mated_in(ply)
            } else {
                Score::DRAW
            };
        }

        let mut best = Score::ALPHA;
        for mv in moves {
            position.make_move(mv);
            let new_depth = depth - 1 + position.is_in_check() as i32;
            let score = -minimax(search, position, new_depth, ply + 1);
            position.unmake_move(mv);
            best = best.max(score);
        }
        best
    }

    #[test]
    fn test_white_mate_in_1() {
        let fen = "k7/8/KQ6/8/8/8/8/8 w - - 0 1";
        let config = SearchConfig {
            max_depth: 2,
            ..Default::default()
        };

        let res = ensure_is_mate_in(fen, config, 1);
        assert_eq!(res.bestmove.unwrap(), "b6a7")
    }

    #[test]
    fn test_black_mated_in_1() {
        let fen = "1k6/8/KQ6/2Q5/8/8/8/8 b - - 0 1";
        let config = SearchConfig {
            max_depth: 3,
            ..Default::default()
        };

        let res = ensure_is_mate_in(fen, config, -1);
        assert_eq!(res.bestmove.unwrap(), "b8a8")
    }

    #[test]
    fn test_stalemate() {
        let fen = "k7/8/KQ6/8/8/8/8/8 b - - 0 1";
        let config = SearchConfig {
            max_depth: 4,
            ..Default::default()
        };

        let res = run_search(fen, config);
        assert!(res.bestmove.is_none());
        assert_eq!(res.score, Score::DRAW);
    }

    #[test]
    fn test_obvious_capture_promote() {
        // Pawn should take queen and also promote to queen
        let fen = "3q1n2/4P3/8/8/8/8/k7/7K w - - 0 1";
        let config = SearchConfig {
            max_depth: 1,
            ..Default::default()
        };

        let res = run_search(fen, config);
        assert_eq!(res.bestmove.unwrap(), "e7d8q");
    }

    #[test]
    fn test_quick_search_finds_move() {
        // If *any* legal move is available, it should be found, regardless of how much time was given.
        let config = SearchConfig {
            soft_timeout: Duration::from_millis(0),
            hard_timeout: Duration::from_millis(0),
            ..Default::default()
        };

        let mut position = Position::default();
        let res = Tables::new().search(config).start(&mut position);
        assert!(res.bestmove.is_some());
        assert_eq!(position, Position::default());
        assert_eq!(position.plies_played(), 0);
    }

    #[test]
    fn test_cancelled_search_restores_position() {
        let config = SearchConfig {
            max_nodes: 5_000,
            ..Default::default()
        };

        let mut position = Position::from_fen(FEN_KIWIPETE).unwrap();
        let original = position.clone();
        let res = Tables::new().search(config).start(&mut position);

        assert!(res.bestmove.is_some());
        assert_eq!(position, original);
        assert_eq!(position.key(), original.key());
        assert_eq!(position.plies_played(), 0);
        assert!(position.is_consistent());
    }

    #[test]
    fn test_startpos_depth_4() {
        let config = SearchConfig {
            max_depth: 4,
            ..Default::default()
        };

        let mut position = Position::default();
        let res = Tables::new().search(config).start(&mut position);

        let bestmove = res.bestmove.unwrap();
        assert!(position.legal_moves().contains(&bestmove));
        assert_eq!(res.depth, 4);
        assert!(!res.pv.is_empty() && res.pv.len() <= 4);
        assert_eq!(res.pv.moves()[0], bestmove);
        assert_eq!(position, Position::default());

        // Every move of the PV must be legal in sequence
        for &mv in res.pv.moves() {
            assert!(position.legal_moves().contains(&mv), "illegal PV move {mv}");
            position.play_move(mv);
        }
    }

    #[test]
    fn test_alpha_beta_matches_minimax() {
        // No checks are possible within three plies, so every transposition is searched to the same depth
        let fens = [
            "8/k7/8/2p1p3/3P4/8/6K1/8 w - - 0 1",
            "k7/8/8/3n4/8/2PP4/8/6K1 w - - 0 1",
            "7k/8/8/1p6/P1p5/8/8/K7 b - - 0 1",
        ];

        for fen in fens {
            let mut position = Position::from_fen(fen).unwrap();
            let depth = 3;

            let mut tables = Tables::new();
            let mut search = tables.search(SearchConfig {
                max_depth: depth,
                ..Default::default()
            });
            search.params = exhaustive_params();
            let res = search.iterative_deepening(&mut position);

            let mut tables = Tables::new();
            let mut reference = tables.search(SearchConfig::default());
            reference.params = exhaustive_params();
            let expected = minimax(&mut reference, &mut position, depth as i32, 0);
            assert_eq!(res.score, expected, "alpha-beta disagrees with minimax on {fen}");

            // The chosen move must be one of the best
            let bestmove = res.bestmove.unwrap();
            position.make_move(bestmove);
            let new_depth = depth as i32 - 1 + position.is_in_check() as i32;
            let score = -minimax(&mut reference, &mut position, new_depth, 1);
            position.unmake_move(bestmove);
            assert_eq!(score, expected, "{bestmove} is not a best move on {fen}");
        }
    }

    /// Shuffles both Kings back and forth `cycles` times, returning to the starting position each time.
    fn repeat(position: &mut Position, cycles: usize) {
        for _ in 0..cycles {
            for uci in ["e1f1", "e8f8", "f1e1", "f8e8"] {
                let mv = Move::from_uci(position, uci).unwrap();
                position.play_move(mv);
            }
        }
    }

    #[test]
    fn test_threefold_repetition_uses_contempt() {
        // White is a queen up, so a repetition is bad for White
        let mut position = Position::from_fen("4k3/8/8/8/8/8/8/3QK3 w - - 0 1").unwrap();
        repeat(&mut position, 2);
        assert_eq!(position.repetitions(), 2);

        let mut tables = Tables::new();
        let mut search = tables.search(SearchConfig::default());
        let score = search
            .alpha_beta::<PvNode>(&mut position, 3, 1, SearchBounds::default(), true)
            .unwrap();
        assert_eq!(score, Score(-tune::contempt!()));

        // Black, on the losing side, welcomes the same draw
        let mut position = Position::from_fen("4k3/8/8/8/8/8/8/3QK3 w - - 0 1").unwrap();
        repeat(&mut position, 2);
        let mv = Move::from_uci(&position, "e1f1").unwrap();
        position.play_move(mv);
        assert_eq!(position.repetitions(), 2);

        let score = search
            .alpha_beta::<PvNode>(&mut position, 3, 1, SearchBounds::default(), true)
            .unwrap();
        assert_eq!(score, Score(tune::contempt!()));
    }

    #[test]
    fn test_fivefold_repetition_is_exact_draw() {
        let mut position = Position::from_fen("4k3/8/8/8/8/8/8/3QK3 w - - 0 1").unwrap();
        repeat(&mut position, 4);
        assert_eq!(position.repetitions(), 4);

        let mut tables = Tables::new();
        let mut search = tables.search(SearchConfig::default());
        let score = search
            .alpha_beta::<PvNode>(&mut position, 3, 1, SearchBounds::default(), true)
            .unwrap();
        assert_eq!(score, Score::DRAW);
    }

    #[test]
    fn test_insufficient_material_is_draw() {
        let mut position = Position::from_fen("4k3/8/8/8/8/8/8/2B1K3 w - - 0 1").unwrap();
        let mut tables = Tables::new();
        let mut search = tables.search(SearchConfig::default());
        let score = search
            .alpha_beta::<PvNode>(&mut position, 3, 1, SearchBounds::default(), true)
            .unwrap();
        assert_eq!(score, Score::DRAW);
    }

    #[test]
    fn test_fifty_move_rule_uses_contempt() {
        let mut tables = Tables::new();
        let mut search = tables.search(SearchConfig::default());

        let mut position = Position::from_fen("4k3/8/8/8/8/8/8/3QK3 w - - 100 80").unwrap();
        let score = search
            .alpha_beta::<PvNode>(&mut position, 3, 1, SearchBounds::default(), true)
            .unwrap();
        assert_eq!(score, Score(-tune::contempt!()));

        let mut position = Position::from_fen("4k3/8/8/8/8/8/8/3QK3 b - - 100 80").unwrap();
        let score = search
            .alpha_beta::<PvNode>(&mut position, 3, 1, SearchBounds::default(), true)
            .unwrap();
        assert_eq!(score, Score(tune::contempt!()));
    }

    #[test]
    fn test_checkmate_beats_fifty_move_rule() {
        let mut position = Position::from_fen("6k1/5ppp/8/8/8/8/8/R5K1 w - - 99 80").unwrap();
        let mv = Move::from_uci(&position, "a1a8").unwrap();
        position.play_move(mv);
        assert!(position.is_fifty_move_draw());

        let mut tables = Tables::new();
        let mut search = tables.search(SearchConfig::default());
        let score = search
            .alpha_beta::<PvNode>(&mut position, 3, 1, SearchBounds::default(), true)
            .unwrap();
        assert_eq!(score, Score::mated_in(1));
    }

    #[test]
    fn test_beta_cutoff_returns_beta() {
        let mut position = Position::from_fen("4k3/8/8/8/8/8/8/3QK3 w - - 0 1").unwrap();
        let bounds = SearchBounds::new(Score(-20), Score(-10));

        let mut tables = Tables::new();
        let mut search = tables.search(SearchConfig::default());
        search.params = exhaustive_params();
        let score = search
            .alpha_beta::<PvNode>(&mut position, 1, 1, bounds, true)
            .unwrap();
        assert_eq!(score, bounds.beta);

        let entry = tables.ttable.get(&position.key()).unwrap();
        assert_eq!(entry.node_type, crate::NodeType::Cut);
        assert_eq!(entry.score, bounds.beta);
    }

    #[test]
    fn test_aspiration_window_widens_then_gives_up() {
        // Shallow depths and mate scores are never bounded
        assert_eq!(AspirationWindow::new(Score(50), 1).bounds, SearchBounds::default());
        assert_eq!(
            AspirationWindow::new(Score::mate_in(3), 6).bounds,
            SearchBounds::default()
        );

        let mut window = AspirationWindow::new(Score(50), 6);
        let delta = AspirationWindow::delta(6);
        assert_eq!(window.bounds, SearchBounds::new(Score(50) - delta, Score(50) + delta));
        assert!(!window.fails_low(Score(50)) && !window.fails_high(Score(50)));

        let low = window.bounds.alpha - 30;
        assert!(window.fails_low(low));
        window.widen_down(low, 6);
        assert_eq!(window.bounds.alpha, low - delta * 2);
        assert_eq!(window.bounds.beta, Score(50));
        assert!(!window.fails_low(low));

        let high = window.bounds.beta + 5;
        assert!(window.fails_high(high));
        window.widen_up(high, 6);
        assert_eq!(window.bounds.beta, high + delta * 2);

        // Once the widenings run out, the window is unbounded and can no longer fail
        while window.bounds != SearchBounds::default() {
            let score = window.bounds.beta;
            window.widen_up(score, 6);
        }
        assert_eq!(
            window.alpha_fails + window.beta_fails,
            tune::max_aspiration_window_widenings!()
        );
        assert!(!window.fails_low(Score(-5_000)));
        assert!(!window.fails_high(Score(5_000)));
    }

    #[test]
    fn test_null_move_pruning_restores_position() {
        let mut position = Position::from_fen("4k3/8/8/8/8/8/8/3QK3 w - - 0 1").unwrap();
        let original = position.clone();
        let bounds = SearchBounds::new(Score(0), Score(1));

        let mut tables = Tables::new();
        let mut search = tables.search(SearchConfig::default());
        search.params.max_rfp_depth = -1;
        search.params.max_razoring_depth = -1;

        let static_eval = search.evaluate(&position);
        assert!(static_eval >= bounds.beta);

        let pruned = search
            .node_pruning_score(&mut position, 4, 1, bounds, static_eval, true)
            .unwrap();
        assert!(pruned.is_some_and(|score| score >= bounds.beta && !score.is_mate()));
        assert_eq!(position, original);
        assert_eq!(position.key(), original.key());

        // Without permission to pass, nothing is pruned
        let pruned = search
            .node_pruning_score(&mut position, 4, 1, bounds, static_eval, false)
            .unwrap();
        assert_eq!(pruned, None);
    }

    #[test]
    fn test_tt_mate_is_rebased_to_probing_ply() {
        let mut position = Position::from_fen("k7/8/KQ6/8/8/8/8/8 w - - 0 1").unwrap();
        let mut tables = Tables::new();

        let res = tables
            .search(SearchConfig {
                max_depth: 2,
                ..Default::default()
            })
            .iterative_deepening(&mut position);
        assert_eq!(res.score, Score::mate_in(1));

        // The same position, transposed four plies deeper, is answered from the TT
        let mut search = tables.search(SearchConfig::default());
        let score = search
            .alpha_beta::<NonPvNode>(&mut position, 1, 4, SearchBounds::default(), true)
            .unwrap();
        assert_eq!(score, Score::mate_in(5));
        assert_eq!(search.nodes, 1);
    }

    /// Claims every position with at most three pieces is won for White.
    struct WhiteWins;

    impl Tablebase for WhiteWins {
        fn max_pieces(&self) -> u32 {
            3
        }

        fn probe(&self, position: &Position) -> Option<TbProbe> {
            let wdl = if position.side_to_move().is_white() {
                Wdl::Win
            } else {
                Wdl::Loss
            };
            Some(TbProbe { wdl, dtz: 5 })
        }
    }

    #[test]
    fn test_tablebase_answers_at_root() {
        let mut position = Position::from_fen("4k3/8/8/8/8/8/8/3QK3 w - - 0 1").unwrap();
        let mut tables = Tables::new();
        let search = Search::<LogNone>::new(
            Arc::new(AtomicBool::new(true)),
            SearchConfig::default(),
            &mut tables.ttable,
            &mut tables.pawns,
            &mut tables.history,
            &mut tables.killers,
            &WhiteWins,
        );

        let res = search.start(&mut position);
        assert!(res.bestmove.is_some());
        assert_eq!(res.score, TbProbe { wdl: Wdl::Win, dtz: 5 }.score(1));
        assert_eq!(res.nodes, 0);
    }
}
