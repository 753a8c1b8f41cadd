/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::fmt;

use super::{CastlingRights, Piece, Square, XoShiRo};

/// Process-wide Zobrist keys, generated at compile time from fixed seeds.
const ZOBRIST_TABLE: ZobristHashTable = ZobristHashTable::new();

/// A 64-bit position hash, maintained incrementally by XOR-ing keys in and out.
#[derive(Default, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy)]
pub struct ZobristKey(pub(crate) u64);

impl ZobristKey {
    #[inline(always)]
    pub const fn inner(&self) -> u64 {
        self.0
    }

    /// Adds/removes `piece` on `square`.
    ///
    /// # Example
    /// ```
    /// # use bullfrog::*;
    /// let mut key = ZobristKey::default();
    /// key.hash_piece(Square::D7, Piece::BLACK_PAWN);
    /// assert_ne!(key, ZobristKey::default());
    /// key.hash_piece(Square::D7, Piece::BLACK_PAWN);
    /// assert_eq!(key, ZobristKey::default());
    /// ```
    #[inline(always)]
    pub fn hash_piece(&mut self, square: Square, piece: Piece) {
        self.0 ^= ZOBRIST_TABLE.piece_keys[square][piece];
    }

    /// Adds/removes the en passant file, or the "no en passant" key if `None`.
    #[inline(always)]
    pub fn hash_ep_square(&mut self, ep_square: Option<Square>) {
        let index = ep_square.map(|sq| sq.file().index()).unwrap_or(8);
        self.0 ^= ZOBRIST_TABLE.ep_keys[index];
    }

    #[inline(always)]
    pub fn hash_castling_rights(&mut self, rights: CastlingRights) {
        self.0 ^= ZOBRIST_TABLE.castling_keys[rights.index()];
    }

    /// Toggles the side-to-move.
    #[inline(always)]
    pub fn hash_side_to_move(&mut self) {
        self.0 ^= ZOBRIST_TABLE.side_key;
    }
}

impl fmt::Display for ZobristKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016X}", self.0)
    }
}

struct ZobristHashTable {
    piece_keys: [[u64; Piece::COUNT]; Square::COUNT],

    /// One key per en passant file, plus one for "no en passant square".
    ep_keys: [u64; 9],

    castling_keys: [u64; CastlingRights::COUNT],

    /// Toggled in whenever Black is to move.
    side_key: u64,
}

impl ZobristHashTable {
    const fn new() -> Self {
        let mut piece_keys = [[0; Piece::COUNT]; Square::COUNT];
        let mut ep_keys = [0; 9];
        let mut castling_keys = [0; CastlingRights::COUNT];
        let mut prng = XoShiRo::new();

        let mut i = 0;
        while i < Square::COUNT {
            let mut j = 0;
            while j < Piece::COUNT {
                let key;
                (key, prng) = prng.next();
                piece_keys[i][j] = key;
                j += 1;
            }
            i += 1;
        }

        i = 0;
        while i < ep_keys.len() {
            let key;
            (key, prng) = prng.next();
            ep_keys[i] = key;
            i += 1;
        }

        i = 0;
        while i < CastlingRights::COUNT {
            let key;
            (key, prng) = prng.next();
            castling_keys[i] = key;
            i += 1;
        }

        let (side_key, _) = prng.next();

        Self {
            piece_keys,
            ep_keys,
            castling_keys,
            side_key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_distinct() {
        let mut seen = std::collections::HashSet::new();
        for row in ZOBRIST_TABLE.piece_keys {
            for key in row {
                assert!(seen.insert(key));
            }
        }
        for key in ZOBRIST_TABLE.ep_keys {
            assert!(seen.insert(key));
        }
        for key in ZOBRIST_TABLE.castling_keys {
            assert!(seen.insert(key));
        }
        assert!(seen.insert(ZOBRIST_TABLE.side_key));
    }
}
