/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{
    fmt,
    ops::{Add, AddAssign},
};

use super::Position;

/// Perform a perft at the specified depth, collecting only data about the number of possible positions (nodes).
///
/// This performs bulk counting, meaning that, at depth 1, it returns the number of available moves,
/// rather than making them, recursing again, and returning 1 for each terminal case.
/// If you do *not* want to use bulk counting, use [`perft_generic`].
#[inline(always)]
pub fn perft(position: &mut Position, depth: usize) -> u64 {
    perft_generic::<true, false>(position, depth)
}

/// Perform a splitperft at the specified depth, printing the number of nodes reachable after each root move.
#[inline(always)]
pub fn splitperft(position: &mut Position, depth: usize) -> u64 {
    perft_generic::<true, true>(position, depth)
}

/// Generic version of `perft` that allows you to specify whether to perform bulk counting and splitperft.
///
/// If `BULK` is set to `true`, this will perform bulk counting.
/// If `SPLIT` is set to `true`, this will perform a splitperft.
///
/// The position is walked with make/unmake and is unchanged when this returns.
pub fn perft_generic<const BULK: bool, const SPLIT: bool>(
    position: &mut Position,
    depth: usize,
) -> u64 {
    if depth == 0 {
        return 1;
    }

    let moves = position.generate_moves(false);

    // Bulk counting; no need to recurse again just to apply a singular move and return 1.
    if BULK && !SPLIT && depth == 1 {
        return moves.into_iter().filter(|&mv| position.is_legal(mv)).count() as u64;
    }

    let mut nodes = 0;
    for mv in moves {
        if !position.is_legal(mv) {
            continue;
        }

        position.make_move(mv);
        let new_nodes = perft_generic::<BULK, false>(position, depth - 1);
        position.unmake_move(mv);

        if SPLIT {
            println!("{mv}\t{new_nodes}");
        }

        nodes += new_nodes;
    }

    nodes
}

/// Counts from a detailed perft, tallied over the moves made at the final ply.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerftCounts {
    pub nodes: u64,
    pub captures: u64,
    pub en_passant: u64,
    pub castles: u64,
    /// Each promotion piece counts as its own move.
    pub promotions: u64,
    pub checks: u64,
    pub double_checks: u64,
    pub checkmates: u64,
}

impl Add for PerftCounts {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self {
            nodes: self.nodes + rhs.nodes,
            captures: self.captures + rhs.captures,
            en_passant: self.en_passant + rhs.en_passant,
            castles: self.castles + rhs.castles,
            promotions: self.promotions + rhs.promotions,
            checks: self.checks + rhs.checks,
            double_checks: self.double_checks + rhs.double_checks,
            checkmates: self.checkmates + rhs.checkmates,
        }
    }
}

impl AddAssign for PerftCounts {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs
    }
}

impl fmt::Display for PerftCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers = [
            "Nodes", "Capt.", "E.p.", "Cast.", "Promo.", "Checks", "Dbl.", "Mates",
        ];
        let values = [
            self.nodes,
            self.captures,
            self.en_passant,
            self.castles,
            self.promotions,
            self.checks,
            self.double_checks,
            self.checkmates,
        ];

        let widths: Vec<usize> = headers
            .iter()
            .zip(values)
            .map(|(h, v)| h.len().max(v.to_string().len()))
            .collect();

        let header = headers
            .iter()
            .zip(&widths)
            .map(|(h, w)| format!(" {h:>w$} "))
            .collect::<Vec<_>>()
            .join("|");
        let row = values
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!(" {v:>w$} "))
            .collect::<Vec<_>>()
            .join("|");

        writeln!(f, "|{header}|")?;
        writeln!(f, "|{}|", "-".repeat(header.len()))?;
        write!(f, "|{row}|")
    }
}

/// Perform a perft at the specified depth, collecting data on captures, castling, promotions, checks and mates.
pub fn perft_detailed(position: &mut Position, depth: usize) -> PerftCounts {
    let mut counts = PerftCounts::default();

    if depth == 0 {
        counts.nodes = 1;
        return counts;
    }

    for mv in position.generate_moves(false) {
        if !position.is_legal(mv) {
            continue;
        }

        position.make_move(mv);

        if depth == 1 {
            counts.nodes += 1;
            counts.captures += mv.is_capture() as u64;
            counts.en_passant += mv.is_en_passant() as u64;
            counts.castles += mv.is_castle() as u64;
            counts.promotions += mv.is_promotion() as u64;

            let checkers = position.checkers();
            if checkers.is_nonempty() {
                counts.checks += 1;
                counts.double_checks += checkers.has_many() as u64;
                counts.checkmates += !position.has_legal_moves() as u64;
            }
        } else {
            counts += perft_detailed(position, depth - 1);
        }

        position.unmake_move(mv);
    }

    counts
}
