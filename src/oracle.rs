/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};

use crate::{Move, Position, Score, ZobristKey};

/// A source of prepared moves, consulted before a search begins.
pub trait OpeningBook: Send {
    /// Returns a move to play in `position`, if the book knows one.
    fn probe(&self, position: &Position) -> Option<Move>;
}

/// A book that never knows a move.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBook;

impl OpeningBook for NoBook {
    #[inline(always)]
    fn probe(&self, _position: &Position) -> Option<Move> {
        None
    }
}

/// An in-memory book mapping position keys to candidate moves.
///
/// The first candidate that is legal in the probed position is played.
#[derive(Debug, Default, Clone)]
pub struct MapBook {
    entries: HashMap<ZobristKey, Vec<Move>>,
}

impl MapBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `mv` as a candidate for `position`, after any existing candidates.
    pub fn insert(&mut self, position: &Position, mv: Move) {
        self.entries.entry(position.key()).or_default().push(mv);
    }

    /// Number of positions in the book.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parses a book from lines of the form `<fen>; <move> [<move> ...]`.
    ///
    /// Blank lines and lines starting with `#` are skipped.
    ///
    /// # Example
    /// ```
    /// # use bullfrog::*;
    /// let book = MapBook::parse(&format!("{FEN_STARTPOS}; e2e4 d2d4")).unwrap();
    /// assert_eq!(book.probe(&Position::default()).unwrap(), "e2e4");
    /// ```
    pub fn parse(text: &str) -> Result<Self> {
        let mut book = Self::new();

        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (fen, moves) = line
                .split_once(';')
                .ok_or(anyhow!("Book line {} has no `;` separator", number + 1))?;

            let position = Position::from_fen(fen.trim())
                .with_context(|| format!("Book line {} has an invalid FEN", number + 1))?;

            for uci in moves.split_whitespace() {
                let mv = Move::from_uci(&position, uci)
                    .with_context(|| format!("Book line {}", number + 1))?;
                book.insert(&position, mv);
            }
        }

        Ok(book)
    }
}

impl OpeningBook for MapBook {
    fn probe(&self, position: &Position) -> Option<Move> {
        let candidates = self.entries.get(&position.key())?;
        let legal = position.legal_moves();
        candidates.iter().copied().find(|mv| legal.contains(mv))
    }
}

/// Game-theoretic outcome of a tablebase position, for the side to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wdl {
    Win,
    Draw,
    Loss,
}

/// Result of a successful tablebase probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TbProbe {
    pub wdl: Wdl,

    /// Plies until the next capture or pawn move that preserves the outcome.
    pub dtz: u32,
}

impl TbProbe {
    /// Converts this result into a search score `ply` plies from the root.
    ///
    /// Wins score just below every mate, and sooner conversions score higher.
    pub fn score(&self, ply: usize) -> Score {
        let win = Score::TB_WIN - ply as i32 - self.dtz.min(Score::TB_WIN.0 as u32 / 2) as i32;
        match self.wdl {
            Wdl::Win => win,
            Wdl::Draw => Score::DRAW,
            Wdl::Loss => -win,
        }
    }
}

/// Endgame tablebase, probed during search.
pub trait Tablebase: Send + Sync {
    /// Largest number of pieces, Kings included, that this tablebase can answer for.
    fn max_pieces(&self) -> u32;

    /// Returns the outcome of `position`, if known.
    ///
    /// Failing to answer is never an error; the search simply continues without it.
    fn probe(&self, position: &Position) -> Option<TbProbe>;
}

/// A tablebase that knows no positions.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTablebase;

impl Tablebase for NoTablebase {
    #[inline(always)]
    fn max_pieces(&self) -> u32 {
        0
    }

    #[inline(always)]
    fn probe(&self, _position: &Position) -> Option<TbProbe> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FEN_KIWIPETE, FEN_STARTPOS};

    #[test]
    fn test_map_book_picks_first_legal_candidate() {
        let position = Position::default();
        let mut book = MapBook::new();
        assert!(book.probe(&position).is_none());

        let e4 = Move::from_uci(&position, "e2e4").unwrap();
        let d4 = Move::from_uci(&position, "d2d4").unwrap();
        book.insert(&position, e4);
        book.insert(&position, d4);

        assert_eq!(book.probe(&position), Some(e4));
        assert_eq!(book.len(), 1);

        let other = Position::from_fen(FEN_KIWIPETE).unwrap();
        assert!(book.probe(&other).is_none());
    }

    #[test]
    fn test_map_book_parse() {
        let text = format!("# openings\n\n{FEN_STARTPOS}; g1f3\n{FEN_KIWIPETE}; e1g1 e2a6\n");
        let book = MapBook::parse(&text).unwrap();
        assert_eq!(book.len(), 2);
        assert_eq!(book.probe(&Position::default()).unwrap(), "g1f3");

        assert!(MapBook::parse(&format!("{FEN_STARTPOS}; e2e5")).is_err());
        assert!(MapBook::parse("not a fen; e2e4").is_err());
        assert!(MapBook::parse(FEN_STARTPOS).is_err());
    }

    #[test]
    fn test_tablebase_scores() {
        let win = TbProbe { wdl: Wdl::Win, dtz: 10 };
        let quick = TbProbe { wdl: Wdl::Win, dtz: 2 };
        assert!(quick.score(0) > win.score(0));
        assert!(win.score(0) > win.score(4));
        assert!(!win.score(0).is_mate());
        assert!(win.score(0) > Score(10_000));

        let loss = TbProbe { wdl: Wdl::Loss, dtz: 10 };
        assert_eq!(loss.score(3), -win.score(3));

        let draw = TbProbe { wdl: Wdl::Draw, dtz: 0 };
        assert_eq!(draw.score(7), Score::DRAW);

        assert!(NoTablebase.probe(&Position::default()).is_none());
        assert!(NoBook.probe(&Position::default()).is_none());
    }
}
