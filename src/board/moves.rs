/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::fmt;

use anyhow::{anyhow, bail, Result};

use super::{PieceKind, Position, Square};

/// Maximum possible number of moves in a given chess position.
///
/// Found [here](<https://www.chessprogramming.org/Chess_Position#cite_note-4>)
pub const MAX_NUM_MOVES: usize = 218;

/// An alias for an [`arrayvec::ArrayVec`] containing at most [`MAX_NUM_MOVES`] moves.
pub type MoveList = arrayvec::ArrayVec<Move, MAX_NUM_MOVES>;

/// The different kinds of moves that can be made.
///
/// Flag values follow the [chess programming wiki](https://www.chessprogramming.org/Encoding_Moves#From-To_Based):
/// bit 2 marks captures and bit 3 marks promotions.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum MoveKind {
    Quiet = 0,
    PawnDoublePush = 1,
    ShortCastle = 2,
    LongCastle = 3,
    Capture = 4,
    EnPassantCapture = 5,
    PromoteKnight = 8,
    PromoteBishop = 9,
    PromoteRook = 10,
    PromoteQueen = 11,
    CaptureAndPromoteKnight = 12,
    CaptureAndPromoteBishop = 13,
    CaptureAndPromoteRook = 14,
    CaptureAndPromoteQueen = 15,
}

impl MoveKind {
    /// Promotion flags in the order they are emitted by the generator.
    pub const PROMOTIONS: [PieceKind; 4] = [
        PieceKind::Queen,
        PieceKind::Rook,
        PieceKind::Bishop,
        PieceKind::Knight,
    ];

    /// A promotion to `kind`, capturing if `capture` is set.
    ///
    /// `kind` must be a Knight, Bishop, Rook, or Queen.
    #[inline(always)]
    pub const fn promotion(kind: PieceKind, capture: bool) -> Self {
        match (kind, capture) {
            (PieceKind::Knight, false) => Self::PromoteKnight,
            (PieceKind::Bishop, false) => Self::PromoteBishop,
            (PieceKind::Rook, false) => Self::PromoteRook,
            (_, false) => Self::PromoteQueen,
            (PieceKind::Knight, true) => Self::CaptureAndPromoteKnight,
            (PieceKind::Bishop, true) => Self::CaptureAndPromoteBishop,
            (PieceKind::Rook, true) => Self::CaptureAndPromoteRook,
            (_, true) => Self::CaptureAndPromoteQueen,
        }
    }

    #[inline(always)]
    const fn from_flag(flag: u16) -> Self {
        match flag {
            1 => Self::PawnDoublePush,
            2 => Self::ShortCastle,
            3 => Self::LongCastle,
            4 => Self::Capture,
            5 => Self::EnPassantCapture,
            8 => Self::PromoteKnight,
            9 => Self::PromoteBishop,
            10 => Self::PromoteRook,
            11 => Self::PromoteQueen,
            12 => Self::CaptureAndPromoteKnight,
            13 => Self::CaptureAndPromoteBishop,
            14 => Self::CaptureAndPromoteRook,
            15 => Self::CaptureAndPromoteQueen,
            _ => Self::Quiet,
        }
    }
}

/// A move, packed into 16 bits:
/// ```text
///     0000 000000 000000
///      |     |      |
///      |     |      +- Source square.
///      |     +- Target square.
///      +- MoveKind flag.
/// ```
///
/// Castling is encoded as the King's own move, such as `e1g1`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Move(u16);

impl Move {
    const SRC_MASK: u16 = 0b0000_0000_0011_1111;
    const DST_MASK: u16 = 0b0000_1111_1100_0000;
    const DST_BITS: u16 = 6;
    const FLG_BITS: u16 = 12;

    const FLAG_CAPTURE: u16 = 0b0100;
    const FLAG_PROMOTION: u16 = 0b1000;

    /// # Example
    /// ```
    /// # use bullfrog::{Move, MoveKind, PieceKind, Square};
    /// let e2e4 = Move::new(Square::E2, Square::E4, MoveKind::PawnDoublePush);
    /// assert_eq!(e2e4.to_string(), "e2e4");
    ///
    /// let e7e8n = Move::new(Square::E7, Square::E8, MoveKind::promotion(PieceKind::Knight, false));
    /// assert_eq!(e7e8n.to_string(), "e7e8n");
    /// ```
    #[inline(always)]
    pub const fn new(from: Square, to: Square, kind: MoveKind) -> Self {
        Self((kind as u16) << Self::FLG_BITS | (to.inner() as u16) << Self::DST_BITS | from.inner() as u16)
    }

    /// Rebuilds a [`Move`] from its packed bits.
    #[inline(always)]
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    #[inline(always)]
    pub const fn bits(&self) -> u16 {
        self.0
    }

    #[inline(always)]
    pub const fn from(&self) -> Square {
        Square::from_index_unchecked((self.0 & Self::SRC_MASK) as usize)
    }

    #[inline(always)]
    pub const fn to(&self) -> Square {
        Square::from_index_unchecked(((self.0 & Self::DST_MASK) >> Self::DST_BITS) as usize)
    }

    #[inline(always)]
    const fn flag(&self) -> u16 {
        self.0 >> Self::FLG_BITS
    }

    #[inline(always)]
    pub const fn kind(&self) -> MoveKind {
        MoveKind::from_flag(self.flag())
    }

    /// Returns `true` for captures, en passant, and capturing promotions.
    #[inline(always)]
    pub const fn is_capture(&self) -> bool {
        self.flag() & Self::FLAG_CAPTURE != 0
    }

    #[inline(always)]
    pub const fn is_promotion(&self) -> bool {
        self.flag() & Self::FLAG_PROMOTION != 0
    }

    /// Neither a capture nor a promotion.
    #[inline(always)]
    pub const fn is_quiet(&self) -> bool {
        !self.is_capture() && !self.is_promotion()
    }

    #[inline(always)]
    pub const fn is_en_passant(&self) -> bool {
        matches!(self.kind(), MoveKind::EnPassantCapture)
    }

    #[inline(always)]
    pub const fn is_castle(&self) -> bool {
        matches!(self.kind(), MoveKind::ShortCastle | MoveKind::LongCastle)
    }

    #[inline(always)]
    pub const fn is_pawn_double_push(&self) -> bool {
        matches!(self.kind(), MoveKind::PawnDoublePush)
    }

    /// The piece a pawn becomes, if this is a promotion.
    #[inline(always)]
    pub const fn promotion(&self) -> Option<PieceKind> {
        if !self.is_promotion() {
            return None;
        }

        Some(match self.flag() & 0b11 {
            0 => PieceKind::Knight,
            1 => PieceKind::Bishop,
            2 => PieceKind::Rook,
            _ => PieceKind::Queen,
        })
    }

    /// Parses coordinate notation (`e2e4`, `e7e8q`) against `position`.
    ///
    /// The move must be legal in `position`, which also resolves its [`MoveKind`].
    ///
    /// # Example
    /// ```
    /// # use bullfrog::*;
    /// let position = Position::from_fen(FEN_KIWIPETE).unwrap();
    /// let castle = Move::from_uci(&position, "e1c1").unwrap();
    /// assert_eq!(castle.kind(), MoveKind::LongCastle);
    /// assert!(Move::from_uci(&position, "e1e3").is_err());
    /// ```
    pub fn from_uci(position: &Position, uci: &str) -> Result<Self> {
        let from = uci
            .get(0..2)
            .ok_or(anyhow!("Move {uci:?} must contain a `from` square"))?;
        let to = uci
            .get(2..4)
            .ok_or(anyhow!("Move {uci:?} must contain a `to` square"))?;
        let from = Square::from_uci(from)?;
        let to = Square::from_uci(to)?;

        let promotion = match uci.get(4..) {
            None | Some("") => None,
            Some(promo) => Some(promo.parse::<PieceKind>()?),
        };

        let Some(mv) = position
            .legal_moves()
            .into_iter()
            .find(|mv| mv.from() == from && mv.to() == to && mv.promotion() == promotion)
        else {
            bail!("Move {uci:?} is not legal in position {}", position.to_fen());
        };

        Ok(mv)
    }

    pub fn to_uci(&self) -> String {
        match self.promotion() {
            Some(promotion) => format!("{}{}{}", self.from(), self.to(), promotion),
            None => format!("{}{}", self.from(), self.to()),
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_uci())
    }
}

impl fmt::Debug for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self} ({:?})", self.kind())
    }
}

impl<T: AsRef<str>> PartialEq<T> for Move {
    #[inline(always)]
    fn eq(&self, other: &T) -> bool {
        self.to_uci().eq(other.as_ref())
    }
}
