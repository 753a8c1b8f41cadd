/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{
    fmt,
    ops::{Add, AddAssign, Neg, Sub},
};

use crate::{
    attacks_for, bishop_attacks, passed_pawn_mask, rook_attacks, taper, Bitboard, Color,
    PawnEntry, PawnHashTable, PieceKind, Position, Rank, Score, MAX_PHASE,
};

/// A middle-game and end-game pair of values, blended by the game phase.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct Tapered {
    pub mg: i32,
    pub eg: i32,
}

impl Tapered {
    pub const ZERO: Self = Self::new(0, 0);

    #[inline(always)]
    pub const fn new(mg: i32, eg: i32) -> Self {
        Self { mg, eg }
    }

    /// Blends this pair by `phase`, out of [`MAX_PHASE`].
    #[inline(always)]
    pub const fn taper(self, phase: i32) -> i32 {
        taper(self.mg, self.eg, phase)
    }
}

impl Add for Tapered {
    type Output = Self;
    #[inline(always)]
    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.mg + rhs.mg, self.eg + rhs.eg)
    }
}

impl AddAssign for Tapered {
    #[inline(always)]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Tapered {
    type Output = Self;
    #[inline(always)]
    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.mg - rhs.mg, self.eg - rhs.eg)
    }
}

impl Neg for Tapered {
    type Output = Self;
    #[inline(always)]
    fn neg(self) -> Self::Output {
        Self::new(-self.mg, -self.eg)
    }
}

/// Phase at or below which the position is treated as an endgame.
const ENDGAME_PHASE: i32 = 8;

/// Phase above which the King is expected to hide behind its pawns.
const MIDDLEGAME_PHASE: i32 = 12;

/// Material lead, in centipawns, from which a side is considered to be winning.
const WINNING_ADVANTAGE: i32 = 150;

/// Material lead, in centipawns, from which the defending King is driven to the edge.
const DECISIVE_ADVANTAGE: i32 = 400;

/// Number of Knights, Bishops, Rooks and Queens in the starting position.
const MAX_PIECES: i32 = 14;

const BISHOP_PAIR: Tapered = Tapered::new(30, 50);
const ROOK_OPEN_FILE: Tapered = Tapered::new(25, 10);
const ROOK_SEMI_OPEN_FILE: Tapered = Tapered::new(12, 6);
const ROOK_ON_SEVENTH: Tapered = Tapered::new(20, 30);
const ROOK_BEHIND_PASSER: Tapered = Tapered::new(10, 25);
const KNIGHT_OUTPOST: Tapered = Tapered::new(25, 12);
const ROOK_BATTERY: Tapered = Tapered::new(12, 6);
const QUEEN_BISHOP_BATTERY: Tapered = Tapered::new(10, 4);

const SHIELD_MISSING: i32 = -20;
const SHIELD_OPEN_FILE: i32 = -30;

const TRADE_BONUS_PER_PIECE: i32 = 4;
const KING_CENTER_BONUS: i32 = 8;
const KING_PAWN_PROXIMITY: i32 = 4;
const MOP_UP_EDGE: i32 = 10;
const MOP_UP_PROXIMITY: i32 = 4;

/// Builds a mobility table, indexed by the number of safe squares a piece attacks.
const fn mobility_table<const N: usize>(offset: i32, mg: i32, eg: i32) -> [Tapered; N] {
    let mut table = [Tapered::ZERO; N];
    let mut i = 0;
    while i < N {
        let moves = i as i32 - offset;
        table[i] = Tapered::new(moves * mg, moves * eg);
        i += 1;
    }
    table
}

const KNIGHT_MOBILITY: [Tapered; 9] = mobility_table(4, 4, 4);
const BISHOP_MOBILITY: [Tapered; 14] = mobility_table(6, 4, 5);
const ROOK_MOBILITY: [Tapered; 15] = mobility_table(7, 2, 4);
const QUEEN_MOBILITY: [Tapered; 28] = mobility_table(13, 1, 2);

#[inline(always)]
fn mobility_bonus(kind: PieceKind, moves: usize) -> Tapered {
    let table: &[Tapered] = match kind {
        PieceKind::Knight => &KNIGHT_MOBILITY,
        PieceKind::Bishop => &BISHOP_MOBILITY,
        PieceKind::Rook => &ROOK_MOBILITY,
        PieceKind::Queen => &QUEEN_MOBILITY,
        _ => return Tapered::ZERO,
    };
    table[moves.min(table.len() - 1)]
}

/// The individual components of an evaluation.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Term {
    Material,
    BishopPair,
    Pawns,
    Rooks,
    Outposts,
    KingShield,
    Mobility,
    Batteries,
    Trading,
    KingActivity,
    MopUp,
}

impl Term {
    pub const COUNT: usize = 11;

    pub const ALL: [Self; Self::COUNT] = [
        Self::Material,
        Self::BishopPair,
        Self::Pawns,
        Self::Rooks,
        Self::Outposts,
        Self::KingShield,
        Self::Mobility,
        Self::Batteries,
        Self::Trading,
        Self::KingActivity,
        Self::MopUp,
    ];

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Material => "Material & PSQT",
            Self::BishopPair => "Bishop pair",
            Self::Pawns => "Pawn structure",
            Self::Rooks => "Rooks",
            Self::Outposts => "Knight outposts",
            Self::KingShield => "King shield",
            Self::Mobility => "Mobility",
            Self::Batteries => "Batteries",
            Self::Trading => "Trading",
            Self::KingActivity => "King activity",
            Self::MopUp => "Mop-up",
        }
    }
}

/// Encapsulates the logic of scoring a chess position.
///
/// Every term is kept from White's perspective. During a negamax search, positions must be
/// evaluated from the side-to-move's perspective, which [`Evaluator::score`] provides.
#[derive(Debug, Clone)]
pub struct Evaluator {
    side_to_move: Color,
    pawns: PawnEntry,
    phase: i32,
    terms: [Tapered; Term::COUNT],
}

impl Evaluator {
    /// Construct a new [`Evaluator`], computing every term.
    pub fn new(position: &Position, pawn_cache: &mut PawnHashTable) -> Self {
        let mut eval = Self {
            side_to_move: position.side_to_move(),
            pawns: pawn_cache.probe(position),
            phase: position.phase(),
            terms: [Tapered::ZERO; Term::COUNT],
        };

        eval.terms[Term::Material as usize] = Tapered::new(position.mg_score(), position.eg_score());
        eval.terms[Term::Pawns as usize] = Tapered::new(eval.pawns.mg, eval.pawns.eg);
        eval.terms[Term::BishopPair as usize] = eval.both(position, Self::bishop_pair);
        eval.terms[Term::Rooks as usize] = eval.both(position, Self::rooks);
        eval.terms[Term::Outposts as usize] = eval.both(position, Self::outposts);
        eval.terms[Term::Mobility as usize] = eval.both(position, Self::mobility);
        eval.terms[Term::Batteries as usize] = eval.both(position, Self::batteries);
        eval.terms[Term::Trading as usize] = Self::trading(position);

        if eval.phase > MIDDLEGAME_PHASE {
            eval.terms[Term::KingShield as usize] = eval.both(position, Self::king_shield);
        }

        if eval.phase <= ENDGAME_PHASE {
            eval.terms[Term::KingActivity as usize] = eval.both(position, Self::king_activity);
            eval.terms[Term::MopUp as usize] = Self::mop_up(position);
        }

        eval
    }

    /// Evaluate this position from the side-to-move's perspective.
    ///
    /// A positive/high number is good for the side-to-move, while a negative number is better for the opponent.
    #[inline(always)]
    pub fn score(&self) -> Score {
        Score(self.white_score() * self.side_to_move.negation_multiplier())
    }

    /// Evaluate this position from White's perspective.
    #[inline(always)]
    pub fn white_score(&self) -> i32 {
        self.total().taper(self.phase)
    }

    #[inline(always)]
    pub fn term(&self, term: Term) -> Tapered {
        self.terms[term as usize]
    }

    #[inline(always)]
    fn total(&self) -> Tapered {
        self.terms.iter().fold(Tapered::ZERO, |acc, &term| acc + term)
    }

    /// White's value of `term` minus Black's.
    #[inline(always)]
    fn both(&self, position: &Position, term: fn(&Self, &Position, Color) -> Tapered) -> Tapered {
        term(self, position, Color::White) - term(self, position, Color::Black)
    }

    fn bishop_pair(&self, position: &Position, color: Color) -> Tapered {
        if position.piece_parts(color, PieceKind::Bishop).has_many() {
            BISHOP_PAIR
        } else {
            Tapered::ZERO
        }
    }

    fn rooks(&self, position: &Position, color: Color) -> Tapered {
        let own_pawns = position.piece_parts(color, PieceKind::Pawn);
        let enemy_pawns = position.piece_parts(color.opponent(), PieceKind::Pawn);
        let passers = position.passed_pawns(color);
        let mut score = Tapered::ZERO;

        for rook in position.piece_parts(color, PieceKind::Rook) {
            let file = Bitboard::from_file(rook.file());

            if !own_pawns.intersects(file) {
                score += if enemy_pawns.intersects(file) {
                    ROOK_SEMI_OPEN_FILE
                } else {
                    ROOK_OPEN_FILE
                };
            }

            if rook.rank().relative_to(color) == Rank::SEVEN {
                score += ROOK_ON_SEVENTH;
            }

            if rook.bitboard().front_fill(color).intersects(passers) {
                score += ROOK_BEHIND_PASSER;
            }
        }

        score
    }

    /// Knights on the enemy half, defended by a pawn, that no enemy pawn can ever chase away.
    fn outposts(&self, position: &Position, color: Color) -> Tapered {
        let enemy_pawns = position.piece_parts(color.opponent(), PieceKind::Pawn);
        let defended = self.pawns.attacks[color.index()];
        let mut score = Tapered::ZERO;

        for knight in position.piece_parts(color, PieceKind::Knight) {
            let rank = knight.rank().relative_to(color).index();
            if !(3..=5).contains(&rank) || !defended.intersects(knight) {
                continue;
            }

            let chasers = passed_pawn_mask(color, knight) & knight.file().adjacent();
            if !chasers.intersects(enemy_pawns) {
                score += KNIGHT_OUTPOST;
            }
        }

        score
    }

    /// Penalizes missing pawns in front of a castled King. Middle-game only.
    fn king_shield(&self, position: &Position, color: Color) -> Tapered {
        let king = position.king_square(color);
        if king.rank().relative_to(color).index() > 1 {
            return Tapered::ZERO;
        }

        let own_pawns = position.piece_parts(color, PieceKind::Pawn);
        let enemy_pawns = position.piece_parts(color.opponent(), PieceKind::Pawn);
        let mut mg = 0;

        for delta in -1..=1 {
            let Some(file) = king.file().offset(delta) else {
                continue;
            };
            let file = Bitboard::from_file(file);

            if !own_pawns.intersects(file) {
                mg += SHIELD_MISSING;
                if !enemy_pawns.intersects(file) {
                    mg += SHIELD_OPEN_FILE;
                }
            }
        }

        Tapered::new(mg, 0)
    }

    fn mobility(&self, position: &Position, color: Color) -> Tapered {
        let occupied = position.occupied();
        let safe = !position.color(color) & !self.pawns.attacks[color.opponent().index()];
        let mut score = Tapered::ZERO;

        for kind in [
            PieceKind::Knight,
            PieceKind::Bishop,
            PieceKind::Rook,
            PieceKind::Queen,
        ] {
            for square in position.piece_parts(color, kind) {
                let moves = (attacks_for(kind, square, occupied) & safe).population();
                score += mobility_bonus(kind, moves as usize);
            }
        }

        score
    }

    /// Rooks supported by a Rook or Queen on the same line, and Queens backed by a Bishop.
    fn batteries(&self, position: &Position, color: Color) -> Tapered {
        let occupied = position.occupied();
        let orthogonals = position.orthogonal_sliders(color);
        let bishops = position.piece_parts(color, PieceKind::Bishop);
        let mut score = Tapered::ZERO;

        for rook in position.piece_parts(color, PieceKind::Rook) {
            if rook_attacks(rook, occupied).intersects(orthogonals) {
                score += ROOK_BATTERY;
            }
        }

        for queen in position.piece_parts(color, PieceKind::Queen) {
            if bishop_attacks(queen, occupied).intersects(bishops) {
                score += QUEEN_BISHOP_BATTERY;
            }
        }

        score
    }

    /// Rewards the side that is ahead for trading pieces, and penalizes the side that is behind.
    fn trading(position: &Position) -> Tapered {
        let lead = material_lead(position);
        if lead.abs() < WINNING_ADVANTAGE {
            return Tapered::ZERO;
        }

        let pieces = (position.occupied()
            ^ position.kind(PieceKind::Pawn)
            ^ position.kind(PieceKind::King))
        .population() as i32;
        let bonus = lead.signum() * (MAX_PIECES - pieces).max(0) * TRADE_BONUS_PER_PIECE;

        Tapered::new(bonus, bonus)
    }

    /// Centralizes the King and brings it towards enemy pawns. End-game only.
    fn king_activity(&self, position: &Position, color: Color) -> Tapered {
        let king = position.king_square(color);
        let mut eg = (6 - king.center_distance() as i32) * KING_CENTER_BONUS;

        let enemy_pawns = position.piece_parts(color.opponent(), PieceKind::Pawn);
        if let Some(nearest) = enemy_pawns.iter().map(|pawn| king.distance(pawn)).min() {
            eg += (7 - nearest as i32) * KING_PAWN_PROXIMITY;
        }

        Tapered::new(0, eg)
    }

    /// Drives the losing King to the edge and brings the winning King closer. End-game only.
    fn mop_up(position: &Position) -> Tapered {
        let lead = material_lead(position);
        if lead.abs() < DECISIVE_ADVANTAGE {
            return Tapered::ZERO;
        }

        let winner = if lead > 0 { Color::White } else { Color::Black };
        let winning_king = position.king_square(winner);
        let losing_king = position.king_square(winner.opponent());

        let eg = losing_king.center_distance() as i32 * MOP_UP_EDGE
            + (7 - winning_king.distance(losing_king) as i32) * MOP_UP_PROXIMITY;

        Tapered::new(0, eg * winner.negation_multiplier())
    }
}

/// Material of White minus material of Black, without the Kings.
fn material_lead(position: &Position) -> i32 {
    [
        PieceKind::Pawn,
        PieceKind::Knight,
        PieceKind::Bishop,
        PieceKind::Rook,
        PieceKind::Queen,
    ]
    .into_iter()
    .map(|kind| {
        let count = |color| position.piece_parts(color, kind).population() as i32;
        (count(Color::White) - count(Color::Black)) * kind.value()
    })
    .sum()
}

/// Evaluates `position` from the side-to-move's perspective.
#[inline(always)]
pub fn evaluate(position: &Position, pawn_cache: &mut PawnHashTable) -> Score {
    Evaluator::new(position, pawn_cache).score()
}

impl fmt::Display for Evaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<16} | {:>6} | {:>6}", "Term", "MG", "EG")?;
        writeln!(f, "{:-<16}-+-{:->6}-+-{:->6}", "", "", "")?;
        for term in Term::ALL {
            let value = self.term(term);
            writeln!(f, "{:<16} | {:>6} | {:>6}", term.name(), value.mg, value.eg)?;
        }
        writeln!(f, "{:-<16}-+-{:->6}-+-{:->6}", "", "", "")?;
        let total = self.total();
        writeln!(f, "{:<16} | {:>6} | {:>6}", "Total", total.mg, total.eg)?;

        writeln!(f, "\nPhase: {}/{MAX_PHASE}", self.phase)?;
        writeln!(f, "White: {}", Score(self.white_score()).pawns())?;
        write!(
            f,
            "{} (side to move): {}",
            self.side_to_move.name(),
            self.score().pawns()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FEN_KIWIPETE, FEN_STARTPOS};

    fn eval(fen: &str) -> Evaluator {
        let position = Position::from_fen(fen).unwrap();
        Evaluator::new(&position, &mut PawnHashTable::from_capacity(64))
    }

    #[test]
    fn test_startpos_is_balanced() {
        let startpos = eval(FEN_STARTPOS);
        assert_eq!(startpos.white_score(), 0);
        assert_eq!(startpos.score(), Score::DRAW);
    }

    #[test]
    fn test_eval_is_side_relative() {
        let white = eval(FEN_KIWIPETE);
        let black = eval(&FEN_KIWIPETE.replace(" w ", " b "));
        assert_eq!(white.score(), -black.score());
    }

    #[test]
    fn test_mirrored_positions_are_negated() {
        let a = eval("r3k2r/pp3ppp/2n5/3q4/8/2N2N2/PP3PPP/R2QK2R w KQkq - 0 1");
        let b = eval("r2qk2r/pp3ppp/2n2n2/8/3Q4/2N5/PP3PPP/R3K2R b KQkq - 0 1");
        assert_eq!(a.white_score(), -b.white_score());
        assert_eq!(a.score(), b.score());
    }

    #[test]
    fn test_bishop_pair() {
        let pair = eval("4k3/8/8/8/8/8/8/2B1KB2 w - - 0 1");
        assert_eq!(pair.term(Term::BishopPair), BISHOP_PAIR);
    }

    #[test]
    fn test_rook_on_open_file_and_seventh() {
        let rooks = eval("4k3/R7/8/8/8/8/1P6/4K3 w - - 0 1");
        assert_eq!(rooks.term(Term::Rooks), ROOK_OPEN_FILE + ROOK_ON_SEVENTH);
    }

    #[test]
    fn test_rook_behind_passer() {
        let rooks = eval("4k3/8/8/8/P7/8/8/R3K3 w - - 0 1");
        assert_eq!(rooks.term(Term::Rooks), ROOK_BEHIND_PASSER);
    }

    #[test]
    fn test_knight_outpost() {
        // Knight on d5, defended by e4, with no Black pawn on the c or e files to chase it
        let outpost = eval("4k3/pp4pp/8/3N4/4P3/8/8/4K3 w - - 0 1");
        assert_eq!(outpost.term(Term::Outposts), KNIGHT_OUTPOST);

        let chased = eval("4k3/pp2p1pp/8/3N4/4P3/8/8/4K3 w - - 0 1");
        assert_eq!(chased.term(Term::Outposts), Tapered::ZERO);
    }

    #[test]
    fn test_king_shield_only_in_middlegame() {
        let startpos = eval(FEN_STARTPOS);
        assert_eq!(startpos.term(Term::KingShield), Tapered::ZERO);

        let exposed = eval("rnbq1rk1/pppppppp/8/8/8/8/PPPPP3/RNBQ1RK1 w - - 0 1");
        assert_eq!(exposed.term(Term::KingShield).mg, 3 * SHIELD_MISSING);

        let endgame = eval("6k1/5ppp/8/8/8/8/8/6K1 w - - 0 1");
        assert_eq!(endgame.term(Term::KingShield), Tapered::ZERO);
    }

    #[test]
    fn test_mop_up_prefers_cornered_king() {
        let cornered = eval("7k/8/5K2/8/8/8/8/R7 w - - 0 1");
        let centered = eval("8/8/8/4k3/8/8/8/R3K3 w - - 0 1");
        assert!(cornered.term(Term::MopUp).eg > centered.term(Term::MopUp).eg);
        assert!(cornered.white_score() > centered.white_score());
    }

    #[test]
    fn test_trading_bonus_favors_the_side_ahead() {
        let ahead = eval("4k3/8/8/8/8/8/8/R3K3 w - - 0 1");
        assert!(ahead.term(Term::Trading).mg > 0);

        let behind = eval("r3k3/8/8/8/8/8/8/4K3 w - - 0 1");
        assert!(behind.term(Term::Trading).mg < 0);
    }

    #[test]
    fn test_pawn_cache_is_reused() {
        let position = Position::default();
        let mut cache = PawnHashTable::from_capacity(64);
        let first = evaluate(&position, &mut cache);
        let second = evaluate(&position, &mut cache);
        assert_eq!(first, second);
        assert_eq!(cache.hits, 1);
    }
}
