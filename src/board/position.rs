/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{fmt, str::FromStr};

use anyhow::{anyhow, bail, Result};

use super::{
    bishop_attacks, king_attacks, knight_attacks, pawn_attacks, rook_attacks, Bitboard, Color,
    File, Move, PieceKind, Piece, Rank, Square, ZobristKey,
};
use crate::{piece_square_value, MAX_PHASE};

/// FEN string for the starting position of chess.
pub const FEN_STARTPOS: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// A popular FEN string for debugging move generation.
pub const FEN_KIWIPETE: &str =
    "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";

/// Squares that must hold the given piece for the corresponding castling rights to survive.
const CASTLING_HOMES: [(Square, Piece); 6] = [
    (Square::E1, Piece::WHITE_KING),
    (Square::A1, Piece::WHITE_ROOK),
    (Square::H1, Piece::WHITE_ROOK),
    (Square::E8, Piece::BLACK_KING),
    (Square::A8, Piece::BLACK_ROOK),
    (Square::H8, Piece::BLACK_ROOK),
];

/// For every square, the castling rights that survive a move touching it.
const CASTLING_MASKS: [u8; Square::COUNT] = {
    let mut masks = [CastlingRights::ALL.0; Square::COUNT];
    masks[Square::A1.index()] &= !CastlingRights::WHITE_LONG.0;
    masks[Square::E1.index()] &= !(CastlingRights::WHITE_SHORT.0 | CastlingRights::WHITE_LONG.0);
    masks[Square::H1.index()] &= !CastlingRights::WHITE_SHORT.0;
    masks[Square::A8.index()] &= !CastlingRights::BLACK_LONG.0;
    masks[Square::E8.index()] &= !(CastlingRights::BLACK_SHORT.0 | CastlingRights::BLACK_LONG.0);
    masks[Square::H8.index()] &= !CastlingRights::BLACK_SHORT.0;
    masks
};

/// Squares in front of a pawn, on its own and adjacent files, that enemy pawns must not occupy for it to be passed.
const PASSED_PAWN_MASKS: [[Bitboard; Square::COUNT]; Color::COUNT] = {
    let mut masks = [[Bitboard::EMPTY_BOARD; Square::COUNT]; Color::COUNT];

    let mut i = 0;
    while i < Square::COUNT {
        let pawn = Bitboard::from_square(Square::from_index_unchecked(i));
        let spans = Bitboard(pawn.0 | pawn.east().0 | pawn.west().0);
        masks[0][i] = spans.north_fill();
        masks[1][i] = spans.south_fill();
        i += 1;
    }

    masks
};

/// Returns the passed-pawn mask for a pawn of `color` on `square`.
#[inline(always)]
pub const fn passed_pawn_mask(color: Color, square: Square) -> Bitboard {
    PASSED_PAWN_MASKS[color.index()][square.index()]
}

/// The four castling rights, packed into the low four bits of a `u8`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CastlingRights(u8);

impl CastlingRights {
    pub const WHITE_SHORT: Self = Self(0b0001);
    pub const WHITE_LONG: Self = Self(0b0010);
    pub const BLACK_SHORT: Self = Self(0b0100);
    pub const BLACK_LONG: Self = Self(0b1000);
    pub const ALL: Self = Self(0b1111);
    pub const NONE: Self = Self(0);

    /// Number of possible combinations of castling rights.
    pub const COUNT: usize = 16;

    #[inline(always)]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }

    #[inline(always)]
    pub const fn short(color: Color) -> Self {
        [Self::WHITE_SHORT, Self::BLACK_SHORT][color.index()]
    }

    #[inline(always)]
    pub const fn long(color: Color) -> Self {
        [Self::WHITE_LONG, Self::BLACK_LONG][color.index()]
    }

    #[inline(always)]
    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn from_uci(castling: &str) -> Result<Self> {
        if castling == "-" {
            return Ok(Self::NONE);
        }

        castling.chars().try_fold(Self::NONE, |rights, c| {
            let right = match c {
                'K' => Self::WHITE_SHORT,
                'Q' => Self::WHITE_LONG,
                'k' => Self::BLACK_SHORT,
                'q' => Self::BLACK_LONG,
                _ => bail!("Invalid castling rights {castling:?}: unexpected {c:?}"),
            };
            Ok(Self(rights.0 | right.0))
        })
    }
}

impl fmt::Display for CastlingRights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return write!(f, "-");
        }
        for (right, c) in [
            (Self::WHITE_SHORT, 'K'),
            (Self::WHITE_LONG, 'Q'),
            (Self::BLACK_SHORT, 'k'),
            (Self::BLACK_LONG, 'q'),
        ] {
            if self.contains(right) {
                write!(f, "{c}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for CastlingRights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

/// Everything needed to reverse a single call to [`Position::make_move`] or [`Position::make_null_move`].
#[derive(Clone, Copy, Debug)]
struct Undo {
    mv: Option<Move>,
    captured: Option<Piece>,
    castling: CastlingRights,
    ep_square: Option<Square>,
    halfmove: u16,
    fullmove: u16,
    key: ZobristKey,
    pawn_key: ZobristKey,
    mg: i32,
    eg: i32,
    phase: i32,
    passed: [Bitboard; Color::COUNT],
}

/// The mutable state of a chess game.
///
/// Pieces are stored redundantly in bitboards (for generation) and a mailbox (for lookups).
/// Hash keys, tapered scores, phase, and passed pawns are all updated incrementally by
/// [`Position::make_move`] and restored exactly by [`Position::unmake_move`].
#[derive(Clone)]
pub struct Position {
    pieces: [Bitboard; Piece::COUNT],
    colors: [Bitboard; Color::COUNT],
    occupied: Bitboard,
    mailbox: [Option<Piece>; Square::COUNT],

    side_to_move: Color,
    castling: CastlingRights,
    ep_square: Option<Square>,
    halfmove: u16,
    fullmove: u16,

    key: ZobristKey,
    pawn_key: ZobristKey,

    /// Middle-game and end-game material plus piece-square scores, from White's perspective.
    mg: i32,
    eg: i32,
    phase: i32,

    /// Pawns of each color with no enemy pawns able to stop them.
    passed: [Bitboard; Color::COUNT],

    /// Keys of every position before the current one, oldest first.
    history: Vec<ZobristKey>,
    undo: Vec<Undo>,
}

impl Position {
    fn empty() -> Self {
        let mut key = ZobristKey::default();
        key.hash_castling_rights(CastlingRights::NONE);
        key.hash_ep_square(None);

        Self {
            pieces: [Bitboard::EMPTY_BOARD; Piece::COUNT],
            colors: [Bitboard::EMPTY_BOARD; Color::COUNT],
            occupied: Bitboard::EMPTY_BOARD,
            mailbox: [None; Square::COUNT],
            side_to_move: Color::White,
            castling: CastlingRights::NONE,
            ep_square: None,
            halfmove: 0,
            fullmove: 1,
            key,
            pawn_key: ZobristKey::default(),
            mg: 0,
            eg: 0,
            phase: 0,
            passed: [Bitboard::EMPTY_BOARD; Color::COUNT],
            history: Vec::with_capacity(512),
            undo: Vec::with_capacity(512),
        }
    }

    /// Parses a position from [Forsyth-Edwards Notation](https://www.chessprogramming.org/Forsyth-Edwards_Notation).
    ///
    /// The halfmove and fullmove counters may be omitted.
    ///
    /// # Example
    /// ```
    /// # use bullfrog::*;
    /// let pos = Position::from_fen(FEN_KIWIPETE).unwrap();
    /// assert_eq!(pos.to_fen(), FEN_KIWIPETE);
    /// assert!(Position::from_fen("8/8/8/8/8/8/8/8 w - - 0 1").is_err());
    /// ```
    pub fn from_fen(fen: &str) -> Result<Self> {
        let mut pos = Self::empty();
        let mut fields = fen.split_whitespace();

        let placements = fields
            .next()
            .ok_or(anyhow!("Invalid FEN {fen:?}: missing piece placements"))?;
        let ranks: Vec<&str> = placements.split('/').collect();
        if ranks.len() != Rank::COUNT {
            bail!("Invalid FEN {fen:?}: expected 8 ranks, found {}", ranks.len());
        }

        for (rank, row) in Rank::iter().rev().zip(ranks) {
            let mut file = 0;
            for c in row.chars() {
                if let Some(skip) = c.to_digit(10) {
                    file += skip as u8;
                } else {
                    if file >= File::COUNT as u8 {
                        bail!("Invalid FEN {fen:?}: rank {rank} has more than 8 files");
                    }
                    let square = Square::new(File(file), rank);
                    pos.put_piece(square, Piece::from_uci(c)?);
                    file += 1;
                }
            }
            if file != File::COUNT as u8 {
                bail!("Invalid FEN {fen:?}: rank {rank} does not have 8 files");
            }
        }

        for color in Color::all() {
            let kings = pos.piece_parts(color, PieceKind::King).population();
            if kings != 1 {
                bail!("Invalid FEN {fen:?}: {} has {kings} kings", color.name());
            }
        }

        let stm = fields.next().unwrap_or("w");
        if stm.len() != 1 {
            bail!("Invalid FEN {fen:?}: side to move must be `w` or `b`");
        }
        if Color::from_uci(stm.chars().next().unwrap_or('w'))? == Color::Black {
            pos.side_to_move = Color::Black;
            pos.key.hash_side_to_move();
        }

        let mut castling = CastlingRights::from_uci(fields.next().unwrap_or("-"))?;
        // A right is only kept while its King and Rook stand on their home squares
        for (square, piece) in CASTLING_HOMES {
            if pos.piece_at(square) != Some(piece) {
                castling.0 &= CASTLING_MASKS[square];
            }
        }
        pos.key.hash_castling_rights(pos.castling);
        pos.castling = castling;
        pos.key.hash_castling_rights(pos.castling);

        let ep_square = match fields.next().unwrap_or("-") {
            "-" => None,
            square => Some(Square::from_uci(square)?),
        };
        let ep_square = ep_square.filter(|&ep| pos.is_valid_ep_square(ep));
        pos.key.hash_ep_square(pos.ep_square);
        pos.ep_square = ep_square;
        pos.key.hash_ep_square(pos.ep_square);

        if let Some(halfmove) = fields.next() {
            pos.halfmove = halfmove
                .parse()
                .map_err(|_| anyhow!("Invalid FEN {fen:?}: bad halfmove clock {halfmove:?}"))?;
        }
        if let Some(fullmove) = fields.next() {
            pos.fullmove = fullmove
                .parse()
                .map_err(|_| anyhow!("Invalid FEN {fen:?}: bad fullmove counter {fullmove:?}"))?;
        }

        pos.passed = pos.compute_passed_pawns();

        let them = pos.side_to_move.opponent();
        if pos.is_square_attacked(pos.king_square(them), pos.side_to_move) {
            bail!("Invalid FEN {fen:?}: the side not to move is in check");
        }

        Ok(pos)
    }

    pub fn to_fen(&self) -> String {
        let mut placements = String::with_capacity(64);
        for rank in Rank::iter().rev() {
            let mut empty = 0;
            for file in File::iter() {
                match self.piece_at(Square::new(file, rank)) {
                    Some(piece) => {
                        if empty > 0 {
                            placements.push_str(&empty.to_string());
                            empty = 0;
                        }
                        placements.push(piece.to_uci());
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                placements.push_str(&empty.to_string());
            }
            if rank != Rank::ONE {
                placements.push('/');
            }
        }

        let ep = self.ep_square.map(|sq| sq.to_uci()).unwrap_or("-".into());
        format!(
            "{placements} {} {} {ep} {} {}",
            self.side_to_move.to_uci(),
            self.castling,
            self.halfmove,
            self.fullmove
        )
    }

    #[inline(always)]
    pub const fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    #[inline(always)]
    pub const fn castling_rights(&self) -> CastlingRights {
        self.castling
    }

    #[inline(always)]
    pub const fn ep_square(&self) -> Option<Square> {
        self.ep_square
    }

    #[inline(always)]
    pub const fn halfmove(&self) -> u16 {
        self.halfmove
    }

    #[inline(always)]
    pub const fn fullmove(&self) -> u16 {
        self.fullmove
    }

    #[inline(always)]
    pub const fn key(&self) -> ZobristKey {
        self.key
    }

    /// Hash of the pawns alone, used to index the pawn-structure cache.
    #[inline(always)]
    pub const fn pawn_key(&self) -> ZobristKey {
        self.pawn_key
    }

    /// Incremental middle-game score, from White's perspective.
    #[inline(always)]
    pub const fn mg_score(&self) -> i32 {
        self.mg
    }

    /// Incremental end-game score, from White's perspective.
    #[inline(always)]
    pub const fn eg_score(&self) -> i32 {
        self.eg
    }

    /// Game phase, from `0` (bare kings and pawns) up to [`MAX_PHASE`].
    #[inline(always)]
    pub const fn phase(&self) -> i32 {
        if self.phase > MAX_PHASE {
            MAX_PHASE
        } else {
            self.phase
        }
    }

    #[inline(always)]
    pub const fn passed_pawns(&self, color: Color) -> Bitboard {
        self.passed[color.index()]
    }

    #[inline(always)]
    pub const fn occupied(&self) -> Bitboard {
        self.occupied
    }

    #[inline(always)]
    pub const fn color(&self, color: Color) -> Bitboard {
        self.colors[color.index()]
    }

    #[inline(always)]
    pub const fn piece(&self, piece: Piece) -> Bitboard {
        self.pieces[piece.index()]
    }

    #[inline(always)]
    pub const fn piece_parts(&self, color: Color, kind: PieceKind) -> Bitboard {
        self.piece(Piece::new(color, kind))
    }

    /// All pieces of `kind`, regardless of color.
    #[inline(always)]
    pub const fn kind(&self, kind: PieceKind) -> Bitboard {
        Bitboard(self.piece_parts(Color::White, kind).0 | self.piece_parts(Color::Black, kind).0)
    }

    #[inline(always)]
    pub const fn piece_at(&self, square: Square) -> Option<Piece> {
        self.mailbox[square.index()]
    }

    #[inline(always)]
    pub fn king_square(&self, color: Color) -> Square {
        let king = self.piece_parts(color, PieceKind::King);
        debug_assert_eq!(king.population(), 1, "{} must have exactly one king", color.name());
        king.lsb().unwrap_or_default()
    }

    /// Number of plies made since this position was set up.
    #[inline(always)]
    pub fn plies_played(&self) -> usize {
        self.undo.len()
    }

    /// Bishops and queens of `color`.
    #[inline(always)]
    pub const fn diagonal_sliders(&self, color: Color) -> Bitboard {
        Bitboard(
            self.piece_parts(color, PieceKind::Bishop).0 | self.piece_parts(color, PieceKind::Queen).0,
        )
    }

    /// Rooks and queens of `color`.
    #[inline(always)]
    pub const fn orthogonal_sliders(&self, color: Color) -> Bitboard {
        Bitboard(
            self.piece_parts(color, PieceKind::Rook).0 | self.piece_parts(color, PieceKind::Queen).0,
        )
    }

    /// All pieces of both colors attacking `square`, given a hypothetical `occupied` set.
    pub fn attackers_to(&self, square: Square, occupied: Bitboard) -> Bitboard {
        let diagonals = self.kind(PieceKind::Bishop) | self.kind(PieceKind::Queen);
        let orthogonals = self.kind(PieceKind::Rook) | self.kind(PieceKind::Queen);

        (pawn_attacks(square, Color::Black) & self.piece(Piece::WHITE_PAWN))
            | (pawn_attacks(square, Color::White) & self.piece(Piece::BLACK_PAWN))
            | (knight_attacks(square) & self.kind(PieceKind::Knight))
            | (king_attacks(square) & self.kind(PieceKind::King))
            | (bishop_attacks(square, occupied) & diagonals)
            | (rook_attacks(square, occupied) & orthogonals)
    }

    /// Pieces of `color` attacking `square`.
    #[inline(always)]
    pub fn get_attackers(&self, square: Square, color: Color) -> Bitboard {
        self.attackers_to(square, self.occupied) & self.color(color)
    }

    /// Returns `true` if any piece of `by` attacks `square`.
    #[inline(always)]
    pub fn is_square_attacked(&self, square: Square, by: Color) -> bool {
        self.is_square_attacked_with(square, by, self.occupied)
    }

    /// Like [`Position::is_square_attacked`], but sliders see through everything not in `occupied`.
    pub fn is_square_attacked_with(&self, square: Square, by: Color, occupied: Bitboard) -> bool {
        pawn_attacks(square, by.opponent()).intersects(self.piece_parts(by, PieceKind::Pawn))
            || knight_attacks(square).intersects(self.piece_parts(by, PieceKind::Knight))
            || king_attacks(square).intersects(self.piece_parts(by, PieceKind::King))
            || bishop_attacks(square, occupied).intersects(self.diagonal_sliders(by))
            || rook_attacks(square, occupied).intersects(self.orthogonal_sliders(by))
    }

    /// Enemy pieces giving check to the side to move.
    #[inline(always)]
    pub fn checkers(&self) -> Bitboard {
        let us = self.side_to_move;
        self.get_attackers(self.king_square(us), us.opponent())
    }

    #[inline(always)]
    pub fn is_in_check(&self) -> bool {
        let us = self.side_to_move;
        self.is_square_attacked(self.king_square(us), us.opponent())
    }

    /// Returns `true` if `color` has any pieces besides pawns and its king.
    #[inline(always)]
    pub fn has_non_pawn_material(&self, color: Color) -> bool {
        (self.color(color)
            ^ self.piece_parts(color, PieceKind::Pawn)
            ^ self.piece_parts(color, PieceKind::King))
        .is_nonempty()
    }

    /// Neither side can possibly deliver mate.
    ///
    /// Covers K vs K, a lone minor piece against a bare king, and bishops that all share one square color.
    pub fn is_insufficient_material(&self) -> bool {
        let majors = self.kind(PieceKind::Pawn) | self.kind(PieceKind::Rook) | self.kind(PieceKind::Queen);
        if majors.is_nonempty() {
            return false;
        }

        let knights = self.kind(PieceKind::Knight);
        let bishops = self.kind(PieceKind::Bishop);
        let minors = (knights | bishops).population();

        if minors <= 1 {
            return true;
        }

        knights.is_empty()
            && ((bishops & Bitboard::LIGHT_SQUARES).is_empty()
                || (bishops & Bitboard::DARK_SQUARES).is_empty())
    }

    /// Number of earlier positions in the game identical to this one.
    ///
    /// Only positions since the last irreversible move, with the same side to move, are considered.
    pub fn repetitions(&self) -> usize {
        let window = (self.halfmove as usize).min(self.history.len());
        self.history
            .iter()
            .rev()
            .take(window)
            .skip(1)
            .step_by(2)
            .filter(|&&key| key == self.key)
            .count()
    }

    #[inline(always)]
    pub fn is_fifty_move_draw(&self) -> bool {
        self.halfmove >= 100
    }

    /// Recomputes the full Zobrist key without using any incremental state.
    pub fn compute_key(&self) -> ZobristKey {
        let mut key = ZobristKey::default();
        for square in self.occupied {
            if let Some(piece) = self.piece_at(square) {
                key.hash_piece(square, piece);
            }
        }
        key.hash_castling_rights(self.castling);
        key.hash_ep_square(self.ep_square);
        if self.side_to_move == Color::Black {
            key.hash_side_to_move();
        }
        key
    }

    /// Recomputes the pawn-only key without using any incremental state.
    pub fn compute_pawn_key(&self) -> ZobristKey {
        let mut key = ZobristKey::default();
        for piece in [Piece::WHITE_PAWN, Piece::BLACK_PAWN] {
            for square in self.piece(piece) {
                key.hash_piece(square, piece);
            }
        }
        key
    }

    /// Recomputes the middle-game score, end-game score, and phase from scratch.
    pub fn compute_scores(&self) -> (i32, i32, i32) {
        let (mut mg, mut eg, mut phase) = (0, 0, 0);
        for square in self.occupied {
            if let Some(piece) = self.piece_at(square) {
                let (pmg, peg) = piece_square_value(piece, square);
                mg += pmg;
                eg += peg;
                phase += piece.kind().phase();
            }
        }
        (mg, eg, phase)
    }

    fn compute_passed_pawns(&self) -> [Bitboard; Color::COUNT] {
        Color::all().map(|color| {
            let enemy_pawns = self.piece_parts(color.opponent(), PieceKind::Pawn);
            self.piece_parts(color, PieceKind::Pawn)
                .iter()
                .filter(|&sq| !passed_pawn_mask(color, sq).intersects(enemy_pawns))
                .collect()
        })
    }

    /// Checks every redundant field against the source of truth.
    ///
    /// Used in debug assertions and tests.
    pub fn is_consistent(&self) -> bool {
        let mut colors = [Bitboard::EMPTY_BOARD; Color::COUNT];
        for piece in Piece::iter() {
            colors[piece.color()] |= self.piece(piece);
        }

        let mailbox_agrees = Square::iter().all(|square| match self.piece_at(square) {
            Some(piece) => self.piece(piece).intersects(square),
            None => !self.occupied.intersects(square),
        });

        colors == self.colors
            && self.occupied == (colors[0] | colors[1])
            && mailbox_agrees
            && Color::all()
                .iter()
                .all(|&c| self.piece_parts(c, PieceKind::King).population() == 1)
            && self.key == self.compute_key()
            && self.pawn_key == self.compute_pawn_key()
            && (self.mg, self.eg, self.phase) == self.compute_scores()
            && self.passed == self.compute_passed_pawns()
    }

    /// Places `piece` on the board without touching keys or scores.
    #[inline(always)]
    fn put_raw(&mut self, square: Square, piece: Piece) {
        self.pieces[piece] |= square;
        self.colors[piece.color()] |= square;
        self.occupied |= square;
        self.mailbox[square] = Some(piece);
    }

    /// Removes whatever is on `square` without touching keys or scores.
    #[inline(always)]
    fn take_raw(&mut self, square: Square) -> Option<Piece> {
        let piece = self.mailbox[square].take()?;
        self.pieces[piece].clear(square);
        self.colors[piece.color()].clear(square);
        self.occupied.clear(square);
        Some(piece)
    }

    fn put_piece(&mut self, square: Square, piece: Piece) {
        self.put_raw(square, piece);
        self.key.hash_piece(square, piece);
        if piece.is_pawn() {
            self.pawn_key.hash_piece(square, piece);
        }
        let (mg, eg) = piece_square_value(piece, square);
        self.mg += mg;
        self.eg += eg;
        self.phase += piece.kind().phase();
    }

    fn take_piece(&mut self, square: Square) -> Option<Piece> {
        let piece = self.take_raw(square)?;
        self.key.hash_piece(square, piece);
        if piece.is_pawn() {
            self.pawn_key.hash_piece(square, piece);
        }
        let (mg, eg) = piece_square_value(piece, square);
        self.mg -= mg;
        self.eg -= eg;
        self.phase -= piece.kind().phase();
        Some(piece)
    }

    fn snapshot(&self, mv: Option<Move>, captured: Option<Piece>) -> Undo {
        Undo {
            mv,
            captured,
            castling: self.castling,
            ep_square: self.ep_square,
            halfmove: self.halfmove,
            fullmove: self.fullmove,
            key: self.key,
            pawn_key: self.pawn_key,
            mg: self.mg,
            eg: self.eg,
            phase: self.phase,
            passed: self.passed,
        }
    }

    /// Where the rook starts and ends when the King castles with `mv`.
    #[inline(always)]
    fn castling_rook_squares(mv: Move) -> (Square, Square) {
        let rank = mv.from().rank();
        if mv.to().file() > mv.from().file() {
            (Square::new(File::H, rank), Square::new(File::F, rank))
        } else {
            (Square::new(File::A, rank), Square::new(File::D, rank))
        }
    }

    /// Returns `true` if a pawn of `capturer` attacks the en passant square `ep`.
    #[inline(always)]
    fn can_capture_en_passant(&self, ep: Square, capturer: Color) -> bool {
        pawn_attacks(ep, capturer.opponent()).intersects(self.piece_parts(capturer, PieceKind::Pawn))
    }

    /// Whether `ep` could have been recorded by the double push that led to this position.
    ///
    /// The square must be empty, sit directly behind the pushed pawn, and be capturable by the side to move.
    fn is_valid_ep_square(&self, ep: Square) -> bool {
        let pusher = self.side_to_move.opponent();
        let pushed = Piece::new(pusher, PieceKind::Pawn);

        ep.rank() == Rank::THREE.relative_to(pusher)
            && self.piece_at(ep).is_none()
            && ep.forward(pusher).is_some_and(|sq| self.piece_at(sq) == Some(pushed))
            && self.can_capture_en_passant(ep, self.side_to_move)
    }

    /// Applies a pseudo-legal `mv` in place.
    ///
    /// The move is not validated. Passing a move that was not generated for this position
    /// leaves the position in an unspecified state.
    pub fn make_move(&mut self, mv: Move) {
        let us = self.side_to_move;
        let (from, to) = (mv.from(), mv.to());
        let Some(piece) = self.piece_at(from) else {
            debug_assert!(false, "No piece on {from} for {mv:?}");
            return;
        };

        let mut undo = self.snapshot(Some(mv), None);
        self.history.push(self.key);

        self.key.hash_ep_square(self.ep_square);
        self.key.hash_castling_rights(self.castling);
        self.ep_square = None;
        self.take_piece(from);

        if mv.is_en_passant() {
            let victim = to.backward(us).unwrap_or(to);
            undo.captured = self.take_piece(victim);
        } else if mv.is_capture() {
            undo.captured = self.take_piece(to);
        }

        let placed = match mv.promotion() {
            Some(promotion) => piece.promoted(promotion),
            None => piece,
        };
        self.put_piece(to, placed);

        if mv.is_castle() {
            let (rook_from, rook_to) = Self::castling_rook_squares(mv);
            if let Some(rook) = self.take_piece(rook_from) {
                self.put_piece(rook_to, rook);
            }
        }

        self.castling.0 &= CASTLING_MASKS[from] & CASTLING_MASKS[to];

        if mv.is_pawn_double_push() {
            let ep = from.forward(us);
            // Only record en passant squares that can actually be captured onto
            if let Some(ep) = ep.filter(|&ep| self.can_capture_en_passant(ep, us.opponent())) {
                self.ep_square = Some(ep);
            }
        }

        self.key.hash_ep_square(self.ep_square);
        self.key.hash_castling_rights(self.castling);

        if piece.is_pawn() || undo.captured.is_some() {
            self.halfmove = 0;
        } else {
            self.halfmove += 1;
        }
        if us == Color::Black {
            self.fullmove += 1;
        }

        if piece.is_pawn() || undo.captured.is_some_and(|c| c.is_pawn()) {
            self.passed = self.compute_passed_pawns();
        }

        self.side_to_move = us.opponent();
        self.key.hash_side_to_move();
        self.undo.push(undo);
    }

    /// Reverses the most recent [`Position::make_move`], which must have been called with `mv`.
    pub fn unmake_move(&mut self, mv: Move) {
        let Some(undo) = self.undo.pop() else {
            debug_assert!(false, "unmake_move({mv:?}) without a matching make_move");
            return;
        };
        debug_assert_eq!(undo.mv, Some(mv));
        self.history.pop();

        let us = self.side_to_move.opponent();
        let (from, to) = (mv.from(), mv.to());

        if mv.is_castle() {
            let (rook_from, rook_to) = Self::castling_rook_squares(mv);
            if let Some(rook) = self.take_raw(rook_to) {
                self.put_raw(rook_from, rook);
            }
        }

        if let Some(placed) = self.take_raw(to) {
            let original = if mv.is_promotion() {
                Piece::new(us, PieceKind::Pawn)
            } else {
                placed
            };
            self.put_raw(from, original);
        }

        if let Some(captured) = undo.captured {
            let square = if mv.is_en_passant() {
                to.backward(us).unwrap_or(to)
            } else {
                to
            };
            self.put_raw(square, captured);
        }

        self.restore(undo);
        self.side_to_move = us;
    }

    /// Passes the turn to the opponent without moving a piece.
    ///
    /// Must not be made while in check.
    pub fn make_null_move(&mut self) {
        let undo = self.snapshot(None, None);
        self.history.push(self.key);

        self.key.hash_ep_square(self.ep_square);
        self.ep_square = None;
        self.key.hash_ep_square(None);

        self.halfmove += 1;
        self.side_to_move = self.side_to_move.opponent();
        self.key.hash_side_to_move();
        self.undo.push(undo);
    }

    pub fn unmake_null_move(&mut self) {
        let Some(undo) = self.undo.pop() else {
            debug_assert!(false, "unmake_null_move without a matching make_null_move");
            return;
        };
        debug_assert!(undo.mv.is_none());
        self.history.pop();
        self.restore(undo);
        self.side_to_move = self.side_to_move.opponent();
    }

    #[inline(always)]
    fn restore(&mut self, undo: Undo) {
        self.castling = undo.castling;
        self.ep_square = undo.ep_square;
        self.halfmove = undo.halfmove;
        self.fullmove = undo.fullmove;
        self.key = undo.key;
        self.pawn_key = undo.pawn_key;
        self.mg = undo.mg;
        self.eg = undo.eg;
        self.phase = undo.phase;
        self.passed = undo.passed;
    }

    /// Applies a move and forgets how to undo it, as when a game progresses.
    ///
    /// The repetition history is kept.
    pub fn play_move(&mut self, mv: Move) {
        self.make_move(mv);
        self.undo.clear();
    }
}

impl Default for Position {
    fn default() -> Self {
        // The starting position is always valid
        Self::from_fen(FEN_STARTPOS).unwrap_or_else(|_| Self::empty())
    }
}

impl FromStr for Position {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_fen(s)
    }
}

impl PartialEq for Position {
    /// Two positions are equal if their boards and game state agree, regardless of history.
    fn eq(&self, other: &Self) -> bool {
        self.pieces == other.pieces
            && self.mailbox == other.mailbox
            && self.side_to_move == other.side_to_move
            && self.castling == other.castling
            && self.ep_square == other.ep_square
            && self.halfmove == other.halfmove
            && self.fullmove == other.fullmove
            && self.key == other.key
            && self.pawn_key == other.pawn_key
            && (self.mg, self.eg, self.phase) == (other.mg, other.eg, other.phase)
            && self.passed == other.passed
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rank in Rank::iter().rev() {
            write!(f, "{rank}| ")?;
            for file in File::iter() {
                let c = self
                    .piece_at(Square::new(file, rank))
                    .map(|p| p.to_uci())
                    .unwrap_or('.');
                write!(f, "{c} ")?;
            }
            writeln!(f)?;
        }
        writeln!(f, " +----------------")?;
        writeln!(f, "   a b c d e f g h")?;
        writeln!(f)?;
        writeln!(f, "FEN: {}", self.to_fen())?;
        write!(f, "Key: {}", self.key)
    }
}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_fen())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fen_roundtrip() {
        for fen in [
            FEN_STARTPOS,
            FEN_KIWIPETE,
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
            "rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 3",
        ] {
            let pos = Position::from_fen(fen).unwrap();
            assert_eq!(pos.to_fen(), fen);
            assert!(pos.is_consistent());
        }
    }

    #[test]
    fn test_fen_errors() {
        assert!(Position::from_fen("").is_err());
        assert!(Position::from_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP w KQkq - 0 1").is_err());
        assert!(Position::from_fen("rnbqkbnr/pppppppp/9/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1").is_err());
        assert!(Position::from_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR x KQkq - 0 1").is_err());
        assert!(Position::from_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQxq - 0 1").is_err());
        // Side not to move is in check
        assert!(Position::from_fen("4k3/4Q3/8/8/8/8/8/4K3 w - - 0 1").is_err());
    }

    #[test]
    fn test_fen_defaults_missing_clocks() {
        let pos = Position::from_fen("4k3/8/8/8/8/8/8/4K3 b -").unwrap();
        assert_eq!(pos.halfmove(), 0);
        assert_eq!(pos.fullmove(), 1);
        assert_eq!(pos.side_to_move(), Color::Black);
    }

    #[test]
    fn test_make_unmake_restores_everything() {
        let mut pos = Position::from_fen(FEN_KIWIPETE).unwrap();
        let original = pos.clone();
        for mv in pos.clone().generate_moves(false) {
            pos.make_move(mv);
            assert!(pos.is_consistent(), "{mv:?}");
            pos.unmake_move(mv);
            assert_eq!(pos, original, "{mv:?}");
        }
    }

    #[test]
    fn test_null_move_roundtrip() {
        let mut pos = Position::from_fen(FEN_KIWIPETE).unwrap();
        let original = pos.clone();
        pos.make_null_move();
        assert_eq!(pos.side_to_move(), Color::Black);
        assert_eq!(pos.key(), pos.compute_key());
        pos.unmake_null_move();
        assert_eq!(pos, original);
    }

    #[test]
    fn test_ep_square_only_when_capturable() {
        let mut pos = Position::default();
        pos.make_move(Move::from_uci(&pos, "e2e4").unwrap());
        assert_eq!(pos.ep_square(), None);

        let mut pos = Position::from_fen("4k3/8/8/8/3p4/8/4P3/4K3 w - - 0 1").unwrap();
        pos.make_move(Move::from_uci(&pos, "e2e4").unwrap());
        assert_eq!(pos.ep_square(), Some(Square::E3));
        assert_eq!(pos.key(), pos.compute_key());
    }

    #[test]
    fn test_fen_ep_square_matches_played_position() {
        let mut played = Position::default();
        played.play_move(Move::from_uci(&played, "e2e4").unwrap());

        // Nothing can capture onto e3, so the square is dropped and both keys agree
        let parsed =
            Position::from_fen("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1").unwrap();
        assert_eq!(parsed.ep_square(), None);
        assert_eq!(parsed.key(), played.key());
        assert_eq!(parsed.key(), parsed.compute_key());

        // Not directly behind a pushed pawn
        let pos = Position::from_fen("4k3/8/8/8/3p4/8/4P3/4K3 b - e3 0 1").unwrap();
        assert_eq!(pos.ep_square(), None);

        let pos = Position::from_fen("4k3/8/8/8/3pP3/8/8/4K3 b - e3 0 1").unwrap();
        assert_eq!(pos.ep_square(), Some(Square::E3));
        assert_eq!(pos.key(), pos.compute_key());
    }

    #[test]
    fn test_fen_castling_requires_home_pieces() {
        let pos = Position::from_fen("4k3/8/8/8/8/8/8/4K3 w K - 0 1").unwrap();
        assert_eq!(pos.castling_rights(), CastlingRights::NONE);
        assert!(pos.legal_moves().iter().all(|mv| !mv.is_castle()));

        // The King has left its home square
        let pos = Position::from_fen("r3k2r/8/8/8/8/8/8/R4K1R w KQkq - 0 1").unwrap();
        assert_eq!(pos.castling_rights().to_string(), "kq");

        // Only the a8 Rook is missing
        let pos = Position::from_fen("4k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        assert_eq!(pos.castling_rights().to_string(), "KQk");
        assert_eq!(pos.key(), pos.compute_key());
    }

    #[test]
    fn test_castling_rights_update() {
        let mut pos = Position::from_fen(FEN_KIWIPETE).unwrap();
        pos.make_move(Move::from_uci(&pos, "a1b1").unwrap());
        assert_eq!(pos.castling_rights().to_string(), "Kkq");
        pos.make_move(Move::from_uci(&pos, "e8g8").unwrap());
        assert_eq!(pos.castling_rights().to_string(), "K");
        assert_eq!(pos.piece_at(Square::F8), Some(Piece::BLACK_ROOK));
        assert_eq!(pos.piece_at(Square::G8), Some(Piece::BLACK_KING));
    }

    #[test]
    fn test_insufficient_material() {
        for fen in [
            "4k3/8/8/8/8/8/8/4K3 w - - 0 1",
            "4k3/8/8/8/8/8/8/4KN2 w - - 0 1",
            "4kb2/8/8/8/8/8/8/4K3 w - - 0 1",
            "4kb2/8/8/8/8/8/8/2B1K3 w - - 0 1",
        ] {
            assert!(Position::from_fen(fen).unwrap().is_insufficient_material(), "{fen}");
        }
        for fen in [
            "4k3/8/8/8/8/8/4P3/4K3 w - - 0 1",
            "4k3/8/8/8/8/8/8/3NKN2 w - - 0 1",
            "4kb2/8/8/8/8/8/8/3BK3 w - - 0 1",
        ] {
            assert!(!Position::from_fen(fen).unwrap().is_insufficient_material(), "{fen}");
        }
    }

    #[test]
    fn test_repetitions() {
        let mut pos = Position::default();
        assert_eq!(pos.repetitions(), 0);
        for _ in 0..2 {
            for uci in ["g1f3", "g8f6", "f3g1", "f6g8"] {
                let mv = Move::from_uci(&pos, uci).unwrap();
                pos.play_move(mv);
            }
        }
        assert_eq!(pos.repetitions(), 2);
        pos.play_move(Move::from_uci(&pos, "e2e4").unwrap());
        assert_eq!(pos.repetitions(), 0);
    }

    #[test]
    fn test_passed_pawns() {
        let pos = Position::from_fen("4k3/8/3p4/8/4P3/8/P7/4K3 w - - 0 1").unwrap();
        let passed = pos.passed_pawns(Color::White);
        assert!(passed.intersects(Square::A2));
        assert!(!passed.intersects(Square::E4));
        assert!(!pos.passed_pawns(Color::Black).intersects(Square::D6));
    }
}
