/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::ops::Index;

use crate::{tune, Move, Square, MAX_DEPTH};

/// Stores bonuses for quiet moves that caused a beta cutoff, indexed by `[from][to]`.
///
/// Used to keep track of good moves found during search.
#[derive(Debug)]
pub struct HistoryTable([[i32; Square::COUNT]; Square::COUNT]);

impl HistoryTable {
    /// Clear the history table, removing all scores.
    #[inline(always)]
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Rewards `mv` for causing a cutoff at `depth`, by `depth * depth`.
    ///
    /// Once any entry passes the maximum bonus, every entry is halved.
    #[inline(always)]
    pub fn update(&mut self, mv: Move, depth: i32) {
        let entry = &mut self.0[mv.from()][mv.to()];
        *entry += depth * depth;

        if *entry > tune::max_history_bonus!() {
            self.age();
        }
    }

    /// Halves every entry.
    pub fn age(&mut self) {
        self.0
            .iter_mut()
            .flatten()
            .for_each(|score| *score /= 2);
    }

    /// Score of `mv` for move ordering.
    #[inline(always)]
    pub fn get(&self, mv: Move) -> i32 {
        self.0[mv.from()][mv.to()]
    }
}

impl Default for HistoryTable {
    #[inline(always)]
    fn default() -> Self {
        Self([[0; Square::COUNT]; Square::COUNT])
    }
}

impl Index<Move> for HistoryTable {
    type Output = i32;
    #[inline(always)]
    fn index(&self, mv: Move) -> &Self::Output {
        &self.0[mv.from()][mv.to()]
    }
}

/// The two most recent quiet moves that caused a cutoff at each ply.
#[derive(Debug)]
pub struct KillerTable([[Option<Move>; 2]; MAX_DEPTH]);

impl KillerTable {
    #[inline(always)]
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Records `mv` as the newest killer at `ply`, pushing out the oldest.
    #[inline(always)]
    pub fn store(&mut self, ply: usize, mv: Move) {
        let Some(slots) = self.0.get_mut(ply) else {
            return;
        };

        if slots[0] != Some(mv) {
            slots[1] = slots[0];
            slots[0] = Some(mv);
        }
    }

    /// Returns the index (`0` newest, `1` oldest) of `mv` among the killers at `ply`.
    #[inline(always)]
    pub fn slot_of(&self, ply: usize, mv: Move) -> Option<usize> {
        self.0
            .get(ply)?
            .iter()
            .position(|&killer| killer == Some(mv))
    }

    #[inline(always)]
    pub fn get(&self, ply: usize) -> [Option<Move>; 2] {
        self.0.get(ply).copied().unwrap_or_default()
    }
}

impl Default for KillerTable {
    #[inline(always)]
    fn default() -> Self {
        Self([[None; 2]; MAX_DEPTH])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MoveKind;

    #[test]
    fn test_history_bonus_is_depth_squared() {
        let mut history = HistoryTable::default();
        let mv = Move::new(Square::G1, Square::F3, MoveKind::Quiet);

        history.update(mv, 3);
        assert_eq!(history.get(mv), 9);
        history.update(mv, 4);
        assert_eq!(history[mv], 25);

        history.clear();
        assert_eq!(history.get(mv), 0);
    }

    #[test]
    fn test_history_ages_when_saturated() {
        let mut history = HistoryTable::default();
        let mv = Move::new(Square::B1, Square::C3, MoveKind::Quiet);

        for _ in 0..200 {
            history.update(mv, 20);
        }
        assert!(history.get(mv) <= tune::max_history_bonus!());
        assert!(history.get(mv) > 0);
    }

    #[test]
    fn test_killers_keep_two_newest() {
        let mut killers = KillerTable::default();
        let a = Move::new(Square::E2, Square::E3, MoveKind::Quiet);
        let b = Move::new(Square::D2, Square::D3, MoveKind::Quiet);
        let c = Move::new(Square::C2, Square::C3, MoveKind::Quiet);

        killers.store(5, a);
        killers.store(5, a);
        assert_eq!(killers.get(5), [Some(a), None]);

        killers.store(5, b);
        killers.store(5, c);
        assert_eq!(killers.get(5), [Some(c), Some(b)]);
        assert_eq!(killers.slot_of(5, b), Some(1));
        assert_eq!(killers.slot_of(5, a), None);
        assert_eq!(killers.slot_of(4, c), None);
    }
}
