/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

/// Pre-computed attack tables for every piece.
mod attacks;

/// Bitboard representation of a set of squares.
mod bitboard;

/// Pseudo-legal move generation and the legality filter.
mod movegen;

/// Compact move encoding.
mod moves;

/// Perft node counting, used to validate move generation.
mod perft;

/// Colors, piece kinds, and colored pieces.
mod piece;

/// The board state and its incremental make/unmake.
mod position;

/// Pseudo-random number generation for hashing and magic search.
mod prng;

/// Squares, files, and ranks.
mod square;

/// Zobrist hashing keys.
mod zobrist;

pub use attacks::*;
pub use bitboard::*;
pub use movegen::*;
pub use moves::*;
pub use perft::*;
pub use piece::*;
pub use position::*;
pub use prng::*;
pub use square::*;
pub use zobrist::*;
