/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use arrayvec::ArrayVec;

use crate::{HistoryTable, Move, MoveList, PieceKind, Position, MAX_NUM_MOVES};

/// Ordering key of the transposition table's move.
const TT_MOVE_SCORE: i32 = i32::MAX;

/// Added to every capture and promotion so that they rank above all quiets.
const CAPTURE_SCORE: i32 = 1 << 24;

/// Added to killer moves so that they rank above every history score.
const KILLER_SCORE: i32 = 1 << 20;

/// Values are obtained from here: <https://www.chessprogramming.org/Simplified_Evaluation_Function>
const MVV_LVA_PIECE_VALUES: [i32; PieceKind::COUNT] = [100, 320, 330, 500, 900, 0];

/// This table represents values for [MVV-LVA](https://www.chessprogramming.org/MVV-LVA) move ordering.
///
/// It is indexed by `[attacker][victim]`, and yields `10 * victim - attacker`:
/// ```text
///                     VICTIM
/// A       P     N     B     R     Q     K
/// T    +-----------------------------------
/// T   P| 900   3100  3200  4900  8900  0
/// A   N| 680   2880  2980  4680  8680  0
/// C   B| 670   2870  2970  4670  8670  0
/// K   R| 500   2700  2800  4500  8500  0
/// E   Q| 100   2300  2400  4100  8100  0
/// R   K| 1000  3200  3300  5000  9000  0
/// ```
pub const MVV_LVA: [[i32; PieceKind::COUNT]; PieceKind::COUNT] = {
    let mut matrix = [[0; PieceKind::COUNT]; PieceKind::COUNT];

    let mut attacker = 0;
    while attacker < PieceKind::COUNT {
        // The King can never be captured
        let mut victim = 0;
        while victim < PieceKind::COUNT - 1 {
            matrix[attacker][victim] =
                10 * MVV_LVA_PIECE_VALUES[victim] - MVV_LVA_PIECE_VALUES[attacker];
            victim += 1;
        }
        attacker += 1;
    }
    matrix
};

/// Computes the ordering key of `mv`; higher keys are searched first.
///
/// The transposition table's move comes first, then captures by MVV-LVA (en passant captures a pawn),
/// then the killers of this ply, newest first, then quiets by their history score.
pub fn score_move(
    position: &Position,
    mv: Move,
    tt_move: Option<Move>,
    killers: [Option<Move>; 2],
    history: &HistoryTable,
) -> i32 {
    if tt_move == Some(mv) {
        return TT_MOVE_SCORE;
    }

    if mv.is_capture() {
        let attacker = position
            .piece_at(mv.from())
            .map_or(PieceKind::Pawn, |piece| piece.kind());
        let victim = if mv.is_en_passant() {
            PieceKind::Pawn
        } else {
            position
                .piece_at(mv.to())
                .map_or(PieceKind::Pawn, |piece| piece.kind())
        };

        let promotion = mv.promotion().map_or(0, |kind| kind.value());
        return CAPTURE_SCORE + MVV_LVA[attacker.index()][victim.index()] + promotion;
    }

    if let Some(promotion) = mv.promotion() {
        return CAPTURE_SCORE + promotion.value();
    }

    if let Some(slot) = killers.iter().position(|&killer| killer == Some(mv)) {
        return KILLER_SCORE - slot as i32;
    }

    history.get(mv)
}

/// Yields moves in descending order of their scores, selecting lazily.
///
/// Most nodes cut off after a few moves, so sorting the whole list up front is wasted work.
pub struct MovePicker {
    moves: MoveList,
    scores: ArrayVec<i32, MAX_NUM_MOVES>,
    current: usize,
}

impl MovePicker {
    pub fn new(moves: MoveList, score_fn: impl Fn(&Move) -> i32) -> Self {
        let scores = moves.iter().map(score_fn).collect();

        Self {
            moves,
            scores,
            current: 0,
        }
    }
}

impl Iterator for MovePicker {
    type Item = (Move, i32);

    fn next(&mut self) -> Option<Self::Item> {
        if self.current >= self.moves.len() {
            return None;
        }

        let mut best_index = self.current;
        let mut best_score = self.scores[best_index];

        for i in (self.current + 1)..self.moves.len() {
            if self.scores[i] > best_score {
                best_index = i;
                best_score = self.scores[i];
            }
        }

        if best_index != self.current {
            self.moves.swap(self.current, best_index);
            self.scores.swap(self.current, best_index);
        }

        let mv = self.moves[self.current];
        let score = self.scores[self.current];
        self.current += 1;

        Some((mv, score))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{KillerTable, Square};

    #[test]
    fn test_mvv_lva_table() {
        assert_eq!(MVV_LVA[PieceKind::Pawn.index()][PieceKind::Queen.index()], 8_900);
        assert_eq!(MVV_LVA[PieceKind::Queen.index()][PieceKind::Pawn.index()], 100);
        assert_eq!(MVV_LVA[PieceKind::Knight.index()][PieceKind::King.index()], 0);
    }

    #[test]
    fn test_ordering_priorities() {
        let fen = "r3k2r/p1p1q1b1/bn3np1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
        let position = Position::from_fen(fen).unwrap();

        let tt_move = Move::from_uci(&position, "b2b3").ok();
        let killer = Move::from_uci(&position, "a2a3").unwrap();
        let mut killers = KillerTable::default();
        killers.store(0, killer);

        let mut history = HistoryTable::default();
        let favored = Move::from_uci(&position, "g2g3").unwrap();
        history.update(favored, 4);

        let moves = position.legal_moves();
        let picker = MovePicker::new(moves, |&mv| {
            score_move(&position, mv, tt_move, killers.get(0), &history)
        });
        let ordered: Vec<Move> = picker.map(|(mv, _)| mv).collect();

        // Hash move first
        assert_eq!(ordered[0], "b2b3");

        // Then captures, most valuable victim first: BxB, QxN, then the pawn captures
        assert_eq!(ordered[1], "e2a6");
        assert_eq!(ordered[2], "f3f6");
        assert_eq!(ordered[3], "g2h3");
        let captures = ordered.iter().filter(|mv| mv.is_capture()).count();
        assert!(ordered[1..=captures].iter().all(|mv| mv.is_capture()));

        // Then the killer, then the move with history
        assert_eq!(ordered[captures + 1], killer);
        assert_eq!(ordered[captures + 2], favored);
    }

    #[test]
    fn test_en_passant_is_scored_as_pawn_capture() {
        let position =
            Position::from_fen("rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 3")
                .unwrap();
        let ep = Move::from_uci(&position, "e5f6").unwrap();
        let score = score_move(&position, ep, None, [None; 2], &HistoryTable::default());
        assert_eq!(
            score,
            CAPTURE_SCORE + MVV_LVA[PieceKind::Pawn.index()][PieceKind::Pawn.index()]
        );
        assert_eq!(Square::F6, ep.to());
    }
}
