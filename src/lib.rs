/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

/// Board representation, move generation, and perft.
mod board;

/// Commands the engine understands beyond the UCI protocol.
mod cli;

/// Code related to the engine's functionality, such as user input handling.
mod engine;

/// Evaluation of chess positions.
mod eval;

/// History and killer heuristics for ordering quiet moves.
mod history;

/// Staged move ordering.
mod movepicker;

/// Opening book and endgame tablebase interfaces.
mod oracle;

/// Pawn structure evaluation and its cache.
mod pawns;

/// Piece-square tables.
mod psqt;

/// Search scores, including mate scores.
mod score;

/// Main engine logic; all search related code.
mod search;

/// Static exchange evaluation.
mod see;

/// Transposition table.
mod ttable;

/// Tunable search parameters.
pub(crate) mod tune;

/// Misc utility functions, constants, and types.
mod utils;

pub use board::*;
pub use cli::*;
pub use engine::*;
pub use eval::*;
pub use history::*;
pub use movepicker::*;
pub use oracle::*;
pub use pawns::*;
pub use psqt::*;
pub use score::*;
pub use search::*;
pub use see::*;
pub use ttable::*;
pub use utils::*;
