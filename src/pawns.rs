/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::{pawn_attack_span, Bitboard, Color, PieceKind, Position, ZobristKey};

/// Number of bytes in a megabyte
const BYTES_IN_MB: usize = 1024 * 1024;

/// Bonus for a passed pawn, indexed by its rank relative to its owner, as `(mg, eg)`.
const PASSED_PAWN_BONUS: [(i32, i32); 8] = [
    (0, 0),
    (5, 10),
    (10, 20),
    (20, 40),
    (35, 70),
    (60, 120),
    (100, 200),
    (0, 0),
];

const DOUBLED_PAWN_PENALTY: (i32, i32) = (-10, -15);
const ISOLATED_PAWN_PENALTY: (i32, i32) = (-15, -20);
const CONNECTED_PAWN_BONUS: (i32, i32) = (10, 15);

/// Pawn-only evaluation of a position, shared by every position with the same pawns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PawnEntry {
    /// Pawn key of the positions this entry describes.
    pub key: ZobristKey,

    /// Middle-game structure score, from White's perspective.
    pub mg: i32,

    /// End-game structure score, from White's perspective.
    pub eg: i32,

    /// Squares attacked by each color's pawns.
    pub attacks: [Bitboard; Color::COUNT],
}

impl PawnEntry {
    /// Scores the pawn structure of `position` from scratch.
    pub fn new(position: &Position) -> Self {
        let mut entry = Self {
            key: position.pawn_key(),
            ..Default::default()
        };

        for color in Color::all() {
            let pawns = position.piece_parts(color, PieceKind::Pawn);
            let attacks = pawn_attack_span(pawns, color);
            entry.attacks[color.index()] = attacks;

            let (mut mg, mut eg) = (0, 0);
            let mut add = |(m, e): (i32, i32)| {
                mg += m;
                eg += e;
            };

            for square in pawns {
                let file = Bitboard::from_file(square.file());

                if attacks.intersects(square) {
                    add(CONNECTED_PAWN_BONUS);
                }

                if (pawns & square.file().adjacent()).is_empty() {
                    add(ISOLATED_PAWN_PENALTY);
                }

                if (pawns & file).has_many() {
                    add(DOUBLED_PAWN_PENALTY);
                }

                if position.passed_pawns(color).intersects(square) {
                    add(PASSED_PAWN_BONUS[square.rank().relative_to(color).index()]);
                }
            }

            let sign = color.negation_multiplier();
            entry.mg += mg * sign;
            entry.eg += eg * sign;
        }

        entry
    }
}

/// Cache of [`PawnEntry`]s, indexed by pawn key.
#[derive(Debug)]
pub struct PawnHashTable {
    cache: Vec<Option<PawnEntry>>,

    /// Number of probes since last clearing.
    pub(crate) accesses: usize,

    /// Number of probes answered from the cache.
    pub(crate) hits: usize,
}

impl PawnHashTable {
    /// Default size of the Pawn Hash Table, in megabytes.
    pub const DEFAULT_SIZE: usize = 2;

    /// Minimum size of the Pawn Hash Table, in megabytes.
    pub const MIN_SIZE: usize = 1;

    /// Maximum size of the Pawn Hash Table, in megabytes.
    pub const MAX_SIZE: usize = 64;

    /// Create a new [`PawnHashTable`] that is `size` megabytes.
    #[inline(always)]
    pub fn new(size: usize) -> Self {
        Self::from_capacity((size * BYTES_IN_MB) / size_of::<Option<PawnEntry>>())
    }

    /// Create a new [`PawnHashTable`] that can hold `capacity` entries.
    #[inline(always)]
    pub fn from_capacity(capacity: usize) -> Self {
        Self {
            cache: vec![None; capacity.max(1)],
            accesses: 0,
            hits: 0,
        }
    }

    #[inline(always)]
    pub fn clear(&mut self) {
        self.cache.iter_mut().for_each(|entry| *entry = None);
        self.accesses = 0;
        self.hits = 0;
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.cache.len()
    }

    /// Returns the size of this [`PawnHashTable`], in megabytes.
    #[inline(always)]
    pub fn size(&self) -> usize {
        self.cache.len() * size_of::<Option<PawnEntry>>() / BYTES_IN_MB
    }

    #[inline(always)]
    pub fn num_entries(&self) -> usize {
        self.cache.iter().filter(|entry| entry.is_some()).count()
    }

    #[inline(always)]
    fn index(&self, key: &ZobristKey) -> usize {
        (key.inner() % self.capacity() as u64) as usize
    }

    /// Returns the pawn structure of `position`, computing and caching it on a miss.
    pub fn probe(&mut self, position: &Position) -> PawnEntry {
        let key = position.pawn_key();
        let index = self.index(&key);
        self.accesses += 1;

        if let Some(entry) = self.cache[index].filter(|entry| entry.key == key) {
            self.hits += 1;
            return entry;
        }

        let entry = PawnEntry::new(position);
        self.cache[index] = Some(entry);
        entry
    }
}

impl Default for PawnHashTable {
    #[inline(always)]
    fn default() -> Self {
        Self::new(Self::DEFAULT_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symmetric_structure_is_even() {
        let entry = PawnEntry::new(&Position::default());
        assert_eq!((entry.mg, entry.eg), (0, 0));
    }

    #[test]
    fn test_structure_penalties() {
        // White: doubled and isolated c-pawns. Black: a healthy pair
        let pos = Position::from_fen("4k3/5pp1/8/8/8/2P5/2P5/4K3 w - - 0 1").unwrap();
        let entry = PawnEntry::new(&pos);
        assert!(entry.mg < 0);
        assert!(entry.eg < 0);
    }

    #[test]
    fn test_passed_pawn_bonus_grows_with_rank() {
        let far = Position::from_fen("4k3/8/8/8/8/P7/8/4K3 w - - 0 1").unwrap();
        let near = Position::from_fen("4k3/8/P7/8/8/8/8/4K3 w - - 0 1").unwrap();
        assert!(PawnEntry::new(&near).eg > PawnEntry::new(&far).eg);
    }

    #[test]
    fn test_cache_hits_on_same_pawns() {
        let mut table = PawnHashTable::from_capacity(128);
        let a = Position::from_fen("4k3/pp6/8/8/8/8/PP6/4K3 w - - 0 1").unwrap();
        let b = Position::from_fen("3k4/pp6/8/8/8/8/PP6/3K4 b - - 0 1").unwrap();

        let first = table.probe(&a);
        assert_eq!(table.hits, 0);
        let second = table.probe(&b);
        assert_eq!(table.hits, 1);
        assert_eq!(first, second);
        assert_eq!(table.num_entries(), 1);
    }
}
