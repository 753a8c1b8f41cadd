/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::{Bitboard, Move, PieceKind, Position, Square};

/// Material gained by the capture itself, counting en passant as a pawn.
#[inline(always)]
pub fn captured_value(position: &Position, mv: Move) -> i32 {
    if mv.is_en_passant() {
        PieceKind::Pawn.value()
    } else {
        position
            .piece_at(mv.to())
            .map_or(0, |victim| victim.kind().value())
    }
}

/// [Static Exchange Evaluation](https://www.chessprogramming.org/Static_Exchange_Evaluation) of `mv`.
///
/// Plays out every capture on the target square, always with the least valuable attacker,
/// and returns the material balance for the side making `mv` when both sides stop optimally.
/// Sliders uncovered behind a capturer join the exchange.
pub fn see(position: &Position, mv: Move) -> i32 {
    let (from, to) = (mv.from(), mv.to());
    let Some(mover) = position.piece_at(from) else {
        return 0;
    };

    let mut gain = [0; 32];
    let mut depth = 0;

    gain[0] = captured_value(position, mv);
    let mut on_square = mover.kind();

    if let Some(promotion) = mv.promotion() {
        gain[0] += promotion.value() - PieceKind::Pawn.value();
        on_square = promotion;
    }

    let mut occupied = position.occupied() ^ from;
    if mv.is_en_passant() {
        if let Some(victim) = to.backward(mover.color()) {
            occupied ^= victim;
        }
    }

    let mut side = mover.color().opponent();
    let mut attackers = position.attackers_to(to, occupied) & occupied;

    while depth + 1 < gain.len() {
        let Some((square, kind)) = least_valuable_attacker(position, attackers & position.color(side))
        else {
            break;
        };

        // A King may only recapture onto an undefended square
        if kind == PieceKind::King && (attackers & position.color(side.opponent())).is_nonempty() {
            break;
        }

        depth += 1;
        gain[depth] = on_square.value() - gain[depth - 1];

        on_square = kind;
        occupied ^= square;
        attackers = position.attackers_to(to, occupied) & occupied;
        side = side.opponent();
    }

    // Each side may decline to continue the exchange
    while depth > 0 {
        gain[depth - 1] = -(-gain[depth - 1]).max(gain[depth]);
        depth -= 1;
    }

    gain[0]
}

/// Returns `true` if the exchange started by `mv` wins at least `threshold`.
///
/// Decides from the captured and capturing pieces alone when possible,
/// only running the full [`see`] when the outcome depends on recaptures.
pub fn see_ge(position: &Position, mv: Move, threshold: i32) -> bool {
    if mv.promotion().is_none() {
        let victim = captured_value(position, mv);

        // Even an undefended capture cannot reach the threshold
        if victim < threshold {
            return false;
        }

        // Even losing the capturer still clears the threshold
        let attacker = position
            .piece_at(mv.from())
            .map_or(0, |piece| piece.kind().value());
        if victim - attacker >= threshold {
            return true;
        }
    }

    see(position, mv) >= threshold
}

fn least_valuable_attacker(position: &Position, attackers: Bitboard) -> Option<(Square, PieceKind)> {
    PieceKind::all().into_iter().find_map(|kind| {
        (attackers & position.kind(kind))
            .lsb()
            .map(|square| (square, kind))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find(position: &Position, uci: &str) -> Move {
        Move::from_uci(position, uci).unwrap()
    }

    #[test]
    fn test_rook_takes_queen_defended_pawn() {
        let pos = Position::from_fen("3qk3/8/8/8/3p4/8/8/3RK3 w - - 0 1").unwrap();
        let mv = find(&pos, "d1d4");

        assert_eq!(see(&pos, mv), 100 - 500);
        assert!(!see_ge(&pos, mv, 0));
    }

    #[test]
    fn test_free_capture() {
        let pos = Position::from_fen("4k3/8/8/8/3n4/4P3/8/4K3 w - - 0 1").unwrap();
        let mv = find(&pos, "e3d4");
        assert_eq!(see(&pos, mv), 320);
        assert!(see_ge(&pos, mv, 300));
        assert!(!see_ge(&pos, mv, 400));
    }

    #[test]
    fn test_even_trade_passes_zero_threshold() {
        // NxN, recaptured by a pawn
        let pos = Position::from_fen("4k3/8/2p5/3n4/8/4N3/8/4K3 w - - 0 1").unwrap();
        let mv = find(&pos, "e3d5");
        assert_eq!(see(&pos, mv), 0);
        assert!(see_ge(&pos, mv, 0));
    }

    #[test]
    fn test_xray_recapture() {
        // Rooks doubled on the d-file win the pawn despite the defending rook
        let pos = Position::from_fen("3rk3/8/8/3p4/8/8/3R4/3RK3 w - - 0 1").unwrap();
        let mv = find(&pos, "d2d5");
        assert_eq!(see(&pos, mv), 100);
    }

    #[test]
    fn test_king_cannot_recapture_defended_piece() {
        // Kxd2 would walk into the bishop on b4
        let pos = Position::from_fen("3rk3/8/8/8/1b6/8/3P4/4K3 b - - 0 1").unwrap();
        let mv = find(&pos, "d8d2");
        assert_eq!(see(&pos, mv), 100);

        let pos = Position::from_fen("3rk3/8/8/8/8/8/3P4/4K3 b - - 0 1").unwrap();
        let mv = find(&pos, "d8d2");
        assert_eq!(see(&pos, mv), 100 - 500);
    }

    #[test]
    fn test_en_passant_counts_as_pawn() {
        let pos = Position::from_fen("4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 1").unwrap();
        let mv = find(&pos, "e5d6");
        assert!(mv.is_en_passant());
        assert_eq!(see(&pos, mv), 100);
    }
}
