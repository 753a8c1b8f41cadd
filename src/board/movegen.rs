/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use super::{
    attacks_for, pawn_attacks, Bitboard, CastlingRights, Color, File, Move, MoveKind, MoveList,
    PieceKind, Position, Square,
};

/// Generates pseudo-legal moves for the side to move in `position`.
///
/// If `captures_only` is set, only captures (including en passant and capturing promotions)
/// are produced. Moves may leave the mover's King in check; see [`Position::is_legal`].
#[inline(always)]
pub fn generate(position: &Position, captures_only: bool) -> MoveList {
    position.generate_moves(captures_only)
}

impl Position {
    /// See [`generate`].
    pub fn generate_moves(&self, captures_only: bool) -> MoveList {
        let mut moves = MoveList::new();
        let us = self.side_to_move();
        let enemies = self.color(us.opponent());
        let empty = !self.occupied();

        self.generate_pawn_moves(&mut moves, captures_only);

        let targets = if captures_only {
            enemies
        } else {
            enemies | empty
        };

        for kind in [
            PieceKind::Knight,
            PieceKind::Bishop,
            PieceKind::Rook,
            PieceKind::Queen,
            PieceKind::King,
        ] {
            for from in self.piece_parts(us, kind) {
                let attacks = attacks_for(kind, from, self.occupied()) & targets;
                for to in attacks {
                    let kind = if enemies.intersects(to) {
                        MoveKind::Capture
                    } else {
                        MoveKind::Quiet
                    };
                    moves.push(Move::new(from, to, kind));
                }
            }
        }

        if !captures_only {
            self.generate_castling(&mut moves);
        }

        moves
    }

    fn generate_pawn_moves(&self, moves: &mut MoveList, captures_only: bool) {
        let us = self.side_to_move();
        let pawns = self.piece_parts(us, PieceKind::Pawn);
        let enemies = self.color(us.opponent());
        let empty = !self.occupied();
        let promoting_rank = Bitboard::seventh_rank(us);

        for from in pawns {
            let promotes = promoting_rank.intersects(from);

            for to in pawn_attacks(from, us) & enemies {
                if promotes {
                    push_promotions(moves, from, to, true);
                } else {
                    moves.push(Move::new(from, to, MoveKind::Capture));
                }
            }

            if let Some(ep) = self.ep_square() {
                if pawn_attacks(from, us).intersects(ep) {
                    moves.push(Move::new(from, ep, MoveKind::EnPassantCapture));
                }
            }

            if captures_only {
                continue;
            }

            let Some(single) = from.forward(us).filter(|&to| empty.intersects(to)) else {
                continue;
            };

            if promotes {
                push_promotions(moves, from, single, false);
                continue;
            }
            moves.push(Move::new(from, single, MoveKind::Quiet));

            if let Some(double) = single.forward(us) {
                if Bitboard::fourth_rank(us).intersects(double) && empty.intersects(double) {
                    moves.push(Move::new(from, double, MoveKind::PawnDoublePush));
                }
            }
        }
    }

    fn generate_castling(&self, moves: &mut MoveList) {
        let us = self.side_to_move();
        let them = us.opponent();
        let rights = self.castling_rights();
        let king = self.king_square(us);
        let rank = king.rank();

        if king != Square::new(File::E, rank) {
            return;
        }

        // (right, squares that must be empty, squares the king passes through, destination)
        let sides = [
            (
                CastlingRights::short(us),
                [File::F, File::G].as_slice(),
                [File::E, File::F, File::G],
                File::G,
                MoveKind::ShortCastle,
            ),
            (
                CastlingRights::long(us),
                [File::B, File::C, File::D].as_slice(),
                [File::E, File::D, File::C],
                File::C,
                MoveKind::LongCastle,
            ),
        ];

        for (right, between, path, destination, kind) in sides {
            if !rights.contains(right) {
                continue;
            }

            if between
                .iter()
                .any(|&file| self.occupied().intersects(Square::new(file, rank)))
            {
                continue;
            }

            if path
                .iter()
                .any(|&file| self.is_square_attacked(Square::new(file, rank), them))
            {
                continue;
            }

            moves.push(Move::new(king, Square::new(destination, rank), kind));
        }
    }

    /// Returns `true` if making the pseudo-legal `mv` does not leave the mover's King attacked.
    ///
    /// King moves are tested by lifting the King off the board and probing the target square.
    /// Every other move is made, tested, and unmade, leaving the position unchanged.
    pub fn is_legal(&mut self, mv: Move) -> bool {
        let us = self.side_to_move();
        let from = mv.from();

        if self.piece_at(from).is_some_and(|p| p.is_king()) {
            // Castling paths were already checked during generation
            let occupied = self.occupied() ^ from;
            return !self.is_square_attacked_with(mv.to(), us.opponent(), occupied);
        }

        self.make_move(mv);
        let legal = !self.is_square_attacked(self.king_square(us), us.opponent());
        self.unmake_move(mv);

        legal
    }

    /// Returns `true` if the side that just moved left its own King attacked.
    #[inline(always)]
    pub fn left_king_in_check(&self) -> bool {
        let mover = self.side_to_move().opponent();
        self.is_square_attacked(self.king_square(mover), self.side_to_move())
    }

    /// All legal moves for the side to move.
    ///
    /// # Example
    /// ```
    /// # use bullfrog::*;
    /// assert_eq!(Position::default().legal_moves().len(), 20);
    /// ```
    pub fn legal_moves(&self) -> MoveList {
        let mut scratch = self.clone();
        let mut moves = self.generate_moves(false);
        moves.retain(|mv| scratch.is_legal(*mv));
        moves
    }

    /// Returns `true` if the side to move has at least one legal move.
    pub fn has_legal_moves(&mut self) -> bool {
        self.generate_moves(false)
            .into_iter()
            .any(|mv| self.is_legal(mv))
    }

    pub fn is_checkmate(&mut self) -> bool {
        self.is_in_check() && !self.has_legal_moves()
    }

    pub fn is_stalemate(&mut self) -> bool {
        !self.is_in_check() && !self.has_legal_moves()
    }

    /// Returns `true` if `mv` would give check to the opponent.
    pub fn gives_check(&mut self, mv: Move) -> bool {
        self.make_move(mv);
        let check = self.is_in_check();
        self.unmake_move(mv);
        check
    }
}

fn push_promotions(moves: &mut MoveList, from: Square, to: Square, capture: bool) {
    for kind in MoveKind::PROMOTIONS {
        moves.push(Move::new(from, to, MoveKind::promotion(kind, capture)));
    }
}

/// Squares attacked by every pawn of `color`.
#[inline(always)]
pub fn pawn_attack_span(pawns: Bitboard, color: Color) -> Bitboard {
    let forward = pawns.forward(color);
    forward.east() | forward.west()
}
