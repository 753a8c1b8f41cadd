/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{
    fmt,
    ops::{Add, Div, Mul, Neg, Sub},
};

use uci_parser::UciScore;

use crate::MAX_DEPTH;

/// Evaluation of a position in centipawns, from the perspective of the side to move.
///
/// Mate scores are measured from the root of the search: a mate delivered `n` plies after the root
/// scores [`Score::MATE`]` - n` no matter how deep in the tree it was found.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Score(pub i32);

impl Score {
    /// No score is ever larger than this.
    pub const INF: Self = Self(i16::MAX as i32);

    /// Lower edge of a full search window.
    pub const ALPHA: Self = Self(-Self::INF.0);

    /// Upper edge of a full search window.
    pub const BETA: Self = Self::INF;

    /// Checkmate delivered at the root itself.
    pub const MATE: Self = Self(Self::INF.0 - 1);

    pub const DRAW: Self = Self(0);

    /// Smallest score that still counts as a forced mate.
    pub const LOWEST_MATE: Self = Self(Self::MATE.0 - MAX_DEPTH as i32);

    /// Score of a tablebase win at the root, before adjusting for distance.
    ///
    /// Sits below every mate score so that a real mate is always preferred.
    pub const TB_WIN: Self = Self(Self::LOWEST_MATE.0 - 1_000);

    /// Score of delivering checkmate `ply` plies from the root.
    #[inline(always)]
    pub const fn mate_in(ply: usize) -> Self {
        Self(Self::MATE.0 - ply as i32)
    }

    /// Score of being checkmated `ply` plies from the root.
    #[inline(always)]
    pub const fn mated_in(ply: usize) -> Self {
        Self(-Self::mate_in(ply).0)
    }

    #[inline(always)]
    pub const fn is_mate(&self) -> bool {
        self.0.abs() >= Self::LOWEST_MATE.0
    }

    /// Plies from the root to the mate this score announces.
    #[inline(always)]
    pub const fn plies_to_mate(&self) -> i32 {
        Self::MATE.0 - self.0.abs()
    }

    /// Full moves until mate, as UCI reports them: positive when we mate, negative when we are mated.
    #[inline(always)]
    pub const fn moves_to_mate(&self) -> i32 {
        let plies = self.plies_to_mate();
        if self.0 > 0 {
            // Our mating move is the last of an odd number of plies
            (plies + 1) / 2
        } else {
            -plies / 2
        }
    }

    /// Converts a root-relative score found `ply` plies deep into one relative to that node,
    /// so that it stays correct when the entry is read back at a different ply.
    #[inline(always)]
    pub const fn to_tt(self, ply: i32) -> Self {
        if !self.is_mate() {
            self
        } else if self.0 > 0 {
            Self(self.0 + ply)
        } else {
            Self(self.0 - ply)
        }
    }

    /// Inverse of [`Score::to_tt`]: rebases a stored score onto the root for a node `ply` plies deep.
    #[inline(always)]
    pub const fn from_tt(self, ply: i32) -> Self {
        if !self.is_mate() {
            self
        } else if self.0 > 0 {
            Self(self.0 - ply)
        } else {
            Self(self.0 + ply)
        }
    }

    #[inline(always)]
    pub const fn abs(self) -> Self {
        Self(self.0.abs())
    }

    /// This score in units of pawns.
    #[inline(always)]
    pub fn pawns(&self) -> f32 {
        self.0 as f32 / 100.0
    }

    /// Converts this score into a [`UciScore`] for an `info score` line.
    #[inline(always)]
    pub fn into_uci(self) -> UciScore {
        if self.is_mate() {
            UciScore::mate(self.moves_to_mate())
        } else {
            UciScore::cp(self.0)
        }
    }
}

impl From<Score> for UciScore {
    #[inline(always)]
    fn from(value: Score) -> Self {
        value.into_uci()
    }
}

/// Arithmetic with another [`Score`] or with a plain number of centipawns.
macro_rules! impl_score_arithmetic {
    ($($trait:ident :: $fn:ident for $rhs:ty => |$a:ident, $b:ident| $body:expr;)*) => {$(
        impl $trait<$rhs> for Score {
            type Output = Self;

            #[inline(always)]
            fn $fn(self, rhs: $rhs) -> Self {
                let ($a, $b) = (self, rhs);
                $body
            }
        }
    )*};
}

impl_score_arithmetic! {
    Add::add for Score => |a, b| Score(a.0 + b.0);
    Add::add for i32 => |a, b| Score(a.0 + b);
    Sub::sub for Score => |a, b| Score(a.0 - b.0);
    Sub::sub for i32 => |a, b| Score(a.0 - b);
    Mul::mul for i32 => |a, b| Score(a.0 * b);
    Div::div for i32 => |a, b| Score(a.0 / b);
}

impl Neg for Score {
    type Output = Self;

    #[inline(always)]
    fn neg(self) -> Self {
        Self(-self.0)
    }
}

impl fmt::Display for Score {
    #[inline(always)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Debug for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_mate() {
            write!(f, "{} (#{})", self.0, self.moves_to_mate())
        } else {
            write!(f, "{}", self.0)
        }
    }
}
