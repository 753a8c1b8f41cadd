/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::{Move, Score, SearchBounds, ZobristKey};

/// Number of bytes in a megabyte
const BYTES_IN_MB: usize = 1024 * 1024;

/// Number of slots sampled when computing [`TTable::hashfull`].
const HASHFULL_SAMPLE: usize = 1_000;

/// Type of node encountered during search.
///
/// See [CPW](https://www.chessprogramming.org/Node_Types) for more.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash)]
pub enum NodeType {
    /// The score is exact.
    Pv,

    /// The score is less than alpha (upper bound).
    All,

    /// The score is greater than or equal to beta (lower bound).
    Cut,
}

impl NodeType {
    /// Creates a new [`NodeType`] based on the parameters as follows:
    ///
    /// ```text
    /// if score <= alpha:
    ///     UPPERBOUND
    /// else if score >= beta:
    ///     LOWERBOUND
    /// else:
    ///     EXACT
    /// ```
    #[inline(always)]
    pub fn new(score: Score, bounds: SearchBounds) -> Self {
        if score <= bounds.alpha {
            Self::All
        } else if score >= bounds.beta {
            Self::Cut
        } else {
            Self::Pv
        }
    }
}

/// An entry into a hash table
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct TTableEntry {
    /// Key of the node this entry represents.
    pub key: ZobristKey,

    /// Depth at which the data for this entry was found.
    pub depth: u8,

    /// Best move found for this position, if one was found.
    pub bestmove: Option<Move>,

    /// Best score found for this position.
    pub score: Score,

    /// Node type of this entry.
    pub node_type: NodeType,
}

impl TTableEntry {
    /// Creates a new [`TTableEntry`] from the provided parameters.
    ///
    /// This will generate a node type through [`NodeType::new`].
    /// Mate scores are rebased from the root onto the node `ply` plies deep.
    #[inline(always)]
    pub fn new(
        key: ZobristKey,
        bestmove: Option<Move>,
        score: Score,
        bounds: SearchBounds,
        depth: u8,
        ply: i32,
    ) -> Self {
        // Classify before the score is moved off of this ply
        let node_type = NodeType::new(score, bounds);
        let score = score.to_tt(ply);

        Self {
            key,
            bestmove,
            score,
            depth,
            node_type,
        }
    }

    /// Determine whether the score in this entry can be used and, if so, return it relative to the root.
    ///
    /// An entry's score can be used if and only if:
    ///     1. The entry is exact ([`NodeType::Pv`]).
    ///     2. The entry is an upper bound ([`NodeType::All`]) and its score is `<= alpha`.
    ///     3. The entry is a lower bound ([`NodeType::Cut`]) and its score is `>= beta`.
    #[inline(always)]
    pub fn try_score(&self, bounds: SearchBounds, ply: i32) -> Option<Score> {
        let score = self.score.from_tt(ply);

        (self.node_type == NodeType::Pv
            || (self.node_type == NodeType::All && score <= bounds.alpha)
            || (self.node_type == NodeType::Cut && score >= bounds.beta))
            .then_some(score)
    }
}

/// Transposition Table.
///
/// A direct-mapped cache of previous search results: every key maps to exactly one slot,
/// and a slot is only overwritten by a result searched at least as deep.
#[derive(Debug)]
pub struct TTable {
    /// Internal cache of the TTable.
    cache: Vec<Option<TTableEntry>>,

    /// Number of stores that landed on a slot holding a different position.
    pub(crate) collisions: usize,

    /// Number of probes since last clearing.
    pub(crate) accesses: usize,

    /// Number of probes that found their position.
    pub(crate) hits: usize,
}

impl TTable {
    /// Default size of the Transposition Table, in megabytes.
    pub const DEFAULT_SIZE: usize = 16;

    /// Minimum size of the Transposition Table, in megabytes.
    pub const MIN_SIZE: usize = 1;

    /// Maximum size of the Transposition Table, in megabytes.
    pub const MAX_SIZE: usize = 1_024;

    /// Create a new [`TTable`] that is `size` megabytes.
    ///
    /// Its size will be `size_of::<Option<TTableEntry>>() * capacity`
    #[inline(always)]
    pub fn new(size: usize) -> Self {
        Self::from_capacity((size * BYTES_IN_MB) / size_of::<Option<TTableEntry>>())
    }

    /// Create a new [`TTable`] that can hold `capacity` entries.
    ///
    /// A table always has at least one slot.
    #[inline(always)]
    pub fn from_capacity(capacity: usize) -> Self {
        Self {
            cache: vec![None; capacity.max(1)],
            collisions: 0,
            accesses: 0,
            hits: 0,
        }
    }

    /// Clears the entries of this [`TTable`].
    #[inline(always)]
    pub fn clear(&mut self) {
        self.cache.iter_mut().for_each(|entry| *entry = None);
        self.collisions = 0;
        self.accesses = 0;
        self.hits = 0;
    }

    /// Returns the number of entries that can fit within this [`TTable`]
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.cache.len()
    }

    /// Returns the size of this [`TTable`], in megabytes.
    #[inline(always)]
    pub fn size(&self) -> usize {
        self.cache.len() * size_of::<Option<TTableEntry>>() / BYTES_IN_MB
    }

    /// Returns the number of `Some` entries in this [`TTable`].
    #[inline(always)]
    pub fn num_entries(&self) -> usize {
        self.cache.iter().filter(|entry| entry.is_some()).count()
    }

    /// Approximate occupancy, in parts per thousand, from the first slots of the table.
    pub fn hashfull(&self) -> usize {
        let sample = self.capacity().min(HASHFULL_SAMPLE);
        let used = self.cache[..sample]
            .iter()
            .filter(|entry| entry.is_some())
            .count();
        used * 1_000 / sample
    }

    /// Map `key` to an index into this [`TTable`].
    #[inline(always)]
    pub fn index(&self, key: &ZobristKey) -> usize {
        (key.inner() % self.capacity() as u64) as usize
    }

    /// Get the entry if and only if it matches the provided key
    #[inline(always)]
    pub fn get(&self, key: &ZobristKey) -> Option<&TTableEntry> {
        self.entry(key).filter(|e| &e.key == key)
    }

    /// Like [`TTable::get`], but records the probe in the table's statistics.
    #[inline(always)]
    pub fn probe(&mut self, key: &ZobristKey) -> Option<TTableEntry> {
        self.accesses += 1;
        let entry = self.get(key).cloned();
        self.hits += entry.is_some() as usize;
        entry
    }

    /// Get the entry, without regards for whether it matches the provided key
    #[inline(always)]
    fn entry(&self, key: &ZobristKey) -> Option<&TTableEntry> {
        self.cache[self.index(key)].as_ref()
    }

    /// Store `entry` if its slot is empty or it was searched at least as deep as the occupant.
    ///
    /// Returns `true` if the entry was written.
    #[inline(always)]
    pub fn store(&mut self, entry: TTableEntry) -> bool {
        let index = self.index(&entry.key);
        let slot = &mut self.cache[index];

        if let Some(old) = slot {
            if entry.depth < old.depth {
                return false;
            }
            self.collisions += (old.key != entry.key) as usize;
        }

        *slot = Some(entry);
        true
    }
}

impl Default for TTable {
    #[inline(always)]
    fn default() -> Self {
        Self::new(Self::DEFAULT_SIZE)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn entry(key: u64, depth: u8, score: Score) -> TTableEntry {
        TTableEntry {
            key: ZobristKey(key),
            bestmove: None,
            score,
            depth,
            node_type: NodeType::Pv,
        }
    }

    #[test]
    fn test_store_then_probe() {
        let mut tt = TTable::from_capacity(64);
        let stored = entry(0xDEAD_BEEF, 5, Score(42));

        assert!(tt.store(stored.clone()));
        assert_eq!(tt.get(&stored.key), Some(&stored));
        assert_eq!(tt.num_entries(), 1);
    }

    #[test]
    fn test_collisions_never_report_a_hit() {
        // Both keys map to slot 0 of a table with two slots
        let mut tt = TTable::from_capacity(2);
        let first = entry(4, 3, Score::DRAW);
        let second = entry(6, 3, Score::MATE);
        assert_eq!(tt.index(&first.key), tt.index(&second.key));

        tt.store(first.clone());
        assert!(tt.get(&second.key).is_none());

        assert!(tt.store(second.clone()));
        assert_eq!(tt.num_entries(), 1);
        assert!(tt.get(&first.key).is_none());
        assert_eq!(tt.get(&second.key), Some(&second));
        assert_eq!(tt.collisions, 1);
    }

    #[test]
    fn test_depth_preferred_replacement() {
        let mut tt = TTable::from_capacity(2);
        let deep = entry(4, 8, Score(10));
        let shallow = entry(6, 2, Score(20));

        tt.store(deep.clone());
        assert!(!tt.store(shallow.clone()));
        assert_eq!(tt.get(&deep.key), Some(&deep));

        let equal = entry(6, 8, Score(30));
        assert!(tt.store(equal.clone()));
        assert_eq!(tt.get(&equal.key), Some(&equal));
    }

    #[test]
    fn test_hashfull_and_clear() {
        let mut tt = TTable::from_capacity(10);
        assert_eq!(tt.hashfull(), 0);

        for key in 0..5 {
            tt.store(entry(key, 1, Score::DRAW));
        }
        assert_eq!(tt.hashfull(), 500);

        tt.clear();
        assert_eq!(tt.num_entries(), 0);
        assert_eq!(tt.hashfull(), 0);
    }

    #[test]
    fn test_mate_scores_survive_a_change_of_ply() {
        let bounds = SearchBounds::default();

        // Mate 3 plies after the root, found at a node 2 plies deep
        let stored = TTableEntry::new(ZobristKey(1), None, Score::mate_in(3), bounds, 4, 2);
        assert_eq!(stored.score, Score::mate_in(1));
        assert_eq!(stored.try_score(bounds, 2), Some(Score::mate_in(3)));

        // The same position transposed to 10 plies deep is still mate one ply later
        let probed = stored.try_score(bounds, 10).unwrap();
        assert_eq!(probed, Score::mate_in(11));
        assert!(probed < Score::INF);
        assert!(probed.plies_to_mate() > 0);

        let mated = TTableEntry::new(ZobristKey(2), None, Score::mated_in(5), bounds, 4, 1);
        assert_eq!(mated.try_score(bounds, 3), Some(Score::mated_in(7)));
    }
}
