/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::sync::OnceLock;

use super::{Bitboard, Color, PieceKind, Square, XoShiRo};

/// Pre-computed attacks for leaping pieces, built at compile time.
const KNIGHT_ATTACKS: [Bitboard; Square::COUNT] = leaper_table(&[
    (1, 2),
    (2, 1),
    (2, -1),
    (1, -2),
    (-1, -2),
    (-2, -1),
    (-2, 1),
    (-1, 2),
]);

const KING_ATTACKS: [Bitboard; Square::COUNT] = leaper_table(&[
    (0, 1),
    (1, 1),
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
]);

const PAWN_ATTACKS: [[Bitboard; Square::COUNT]; Color::COUNT] = [
    leaper_table(&[(-1, 1), (1, 1)]),
    leaper_table(&[(-1, -1), (1, -1)]),
];

const ROOK_DIRECTIONS: [(i8, i8); 4] = [(0, 1), (1, 0), (0, -1), (-1, 0)];
const BISHOP_DIRECTIONS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, -1), (-1, 1)];

/// Exact occupancy-to-attack tables for sliding pieces, built once on first use.
static SLIDER_ATTACKS: OnceLock<SliderAttacks> = OnceLock::new();

const fn leaper_table(deltas: &[(i8, i8)]) -> [Bitboard; Square::COUNT] {
    let mut table = [Bitboard::EMPTY_BOARD; Square::COUNT];

    let mut i = 0;
    while i < Square::COUNT {
        let square = Square::from_index_unchecked(i);
        let mut bits = 0;
        let mut j = 0;
        while j < deltas.len() {
            if let Some(to) = square.offset(deltas[j].0, deltas[j].1) {
                bits |= 1 << to.index();
            }
            j += 1;
        }
        table[i] = Bitboard::new(bits);
        i += 1;
    }

    table
}

/// Walks each ray from `square` until it leaves the board or hits a blocker (inclusive).
fn ray_attacks(square: Square, blockers: Bitboard, directions: &[(i8, i8)]) -> Bitboard {
    let mut attacks = Bitboard::EMPTY_BOARD;

    for &(df, dr) in directions {
        let mut current = square;
        while let Some(next) = current.offset(df, dr) {
            attacks |= next;
            if blockers.intersects(next) {
                break;
            }
            current = next;
        }
    }

    attacks
}

/// Squares whose occupancy can change a slider's attacks from `square`.
///
/// The last square of each ray is excluded, since a piece there never blocks anything further.
fn relevant_mask(square: Square, directions: &[(i8, i8)]) -> Bitboard {
    let mut mask = Bitboard::EMPTY_BOARD;

    for &(df, dr) in directions {
        let mut current = square;
        while let Some(next) = current.offset(df, dr) {
            if next.offset(df, dr).is_none() {
                break;
            }
            mask |= next;
            current = next;
        }
    }

    mask
}

/// A per-square entry mapping a blocker pattern to a slot in the shared attack buffer.
#[derive(Clone, Copy, Debug, Default)]
struct SliderEntry {
    mask: Bitboard,
    magic: u64,
    shift: u32,
    offset: usize,
}

impl SliderEntry {
    #[inline(always)]
    fn index(&self, occupied: Bitboard) -> usize {
        let blockers = (occupied & self.mask).inner();
        self.offset + (blockers.wrapping_mul(self.magic) >> self.shift) as usize
    }
}

/// Attack buffers for bishops and rooks.
///
/// Every slot is verified against a ray walk for every blocker subset during construction,
/// so a lookup always returns the exact attack set for the actual occupancy.
struct SliderAttacks {
    rooks: [SliderEntry; Square::COUNT],
    bishops: [SliderEntry; Square::COUNT],
    attacks: Vec<Bitboard>,
}

impl SliderAttacks {
    fn new() -> Self {
        let mut attacks = Vec::new();
        let mut prng = XoShiRo::new();

        let rooks = Self::build(&ROOK_DIRECTIONS, &mut attacks, &mut prng);
        let bishops = Self::build(&BISHOP_DIRECTIONS, &mut attacks, &mut prng);

        Self {
            rooks,
            bishops,
            attacks,
        }
    }

    fn build(
        directions: &[(i8, i8)],
        attacks: &mut Vec<Bitboard>,
        prng: &mut XoShiRo,
    ) -> [SliderEntry; Square::COUNT] {
        let mut entries = [SliderEntry::default(); Square::COUNT];

        for square in Square::iter() {
            let mask = relevant_mask(square, directions);
            let bits = mask.population() as u32;
            let shift = 64 - bits;

            let patterns: Vec<(Bitboard, Bitboard)> = mask
                .subsets()
                .map(|blockers| (blockers, ray_attacks(square, blockers, directions)))
                .collect();

            let mut slots = vec![None; 1 << bits];
            let magic = loop {
                let candidate = sparse_random(prng);
                if (mask.inner().wrapping_mul(candidate) >> 56).count_ones() < 6 {
                    continue;
                }

                slots.iter_mut().for_each(|slot| *slot = None);
                let fits = patterns.iter().all(|&(blockers, attack)| {
                    let index = (blockers.inner().wrapping_mul(candidate) >> shift) as usize;
                    match slots[index] {
                        None => {
                            slots[index] = Some(attack);
                            true
                        }
                        Some(existing) => existing == attack,
                    }
                });

                if fits {
                    break candidate;
                }
            };

            entries[square] = SliderEntry {
                mask,
                magic,
                shift,
                offset: attacks.len(),
            };
            attacks.extend(slots.into_iter().map(Option::unwrap_or_default));
        }

        entries
    }
}

/// A random number with few bits set, which makes a good magic candidate.
fn sparse_random(prng: &mut XoShiRo) -> u64 {
    let (a, next) = prng.next();
    let (b, next) = next.next();
    let (c, next) = next.next();
    *prng = next;
    a & b & c
}

#[inline(always)]
fn sliders() -> &'static SliderAttacks {
    SLIDER_ATTACKS.get_or_init(SliderAttacks::new)
}

/// Forces construction of the slider tables, so the first search doesn't pay for it.
pub fn init_attack_tables() {
    sliders();
}

#[inline(always)]
pub const fn knight_attacks(square: Square) -> Bitboard {
    KNIGHT_ATTACKS[square.index()]
}

#[inline(always)]
pub const fn king_attacks(square: Square) -> Bitboard {
    KING_ATTACKS[square.index()]
}

/// Squares attacked by a pawn of `color` standing on `square`.
#[inline(always)]
pub const fn pawn_attacks(square: Square, color: Color) -> Bitboard {
    PAWN_ATTACKS[color.index()][square.index()]
}

#[inline(always)]
pub fn rook_attacks(square: Square, occupied: Bitboard) -> Bitboard {
    let tables = sliders();
    tables.attacks[tables.rooks[square].index(occupied)]
}

#[inline(always)]
pub fn bishop_attacks(square: Square, occupied: Bitboard) -> Bitboard {
    let tables = sliders();
    tables.attacks[tables.bishops[square].index(occupied)]
}

#[inline(always)]
pub fn queen_attacks(square: Square, occupied: Bitboard) -> Bitboard {
    rook_attacks(square, occupied) | bishop_attacks(square, occupied)
}

/// Attacks of a non-pawn piece of `kind` on `square`, given the board's occupancy.
#[inline(always)]
pub fn attacks_for(kind: PieceKind, square: Square, occupied: Bitboard) -> Bitboard {
    match kind {
        PieceKind::Knight => knight_attacks(square),
        PieceKind::Bishop => bishop_attacks(square, occupied),
        PieceKind::Rook => rook_attacks(square, occupied),
        PieceKind::Queen => queen_attacks(square, occupied),
        PieceKind::King => king_attacks(square),
        PieceKind::Pawn => Bitboard::EMPTY_BOARD,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaper_tables() {
        assert_eq!(knight_attacks(Square::A1).population(), 2);
        assert_eq!(knight_attacks(Square::D4).population(), 8);
        assert_eq!(king_attacks(Square::H8).population(), 3);
        assert_eq!(
            pawn_attacks(Square::E4, Color::White),
            Square::D5.bitboard() | Square::F5
        );
        assert_eq!(pawn_attacks(Square::A7, Color::Black), Square::B6.bitboard());
    }

    #[test]
    fn test_slider_lookups_match_ray_walks() {
        let mut prng = XoShiRo::new();
        for _ in 0..2_000 {
            let (occupied, next) = prng.next();
            let (bits, next) = next.next();
            prng = next;
            let occupied = Bitboard::new(occupied & bits);
            for square in Square::iter() {
                assert_eq!(
                    rook_attacks(square, occupied),
                    ray_attacks(square, occupied, &ROOK_DIRECTIONS)
                );
                assert_eq!(
                    bishop_attacks(square, occupied),
                    ray_attacks(square, occupied, &BISHOP_DIRECTIONS)
                );
            }
        }
    }

    #[test]
    fn test_slider_blocked() {
        let blockers = Square::D6.bitboard() | Square::F4;
        let rook = rook_attacks(Square::D4, blockers);
        assert!(rook.intersects(Square::D6));
        assert!(!rook.intersects(Square::D7));
        assert!(rook.intersects(Square::F4));
        assert!(!rook.intersects(Square::G4));
        assert!(rook.intersects(Square::A4));
        assert_eq!(queen_attacks(Square::A1, Bitboard::EMPTY_BOARD).population(), 21);
    }
}
