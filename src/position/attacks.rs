//! Precomputed attack tables.
//!
//! King, knight and pawn attacks are plain per-square lookups. Slider
//! attacks use magic bitboards: a per-square relevant-occupancy mask and a
//! multiply-shift into a shared attack table. On x86_64 with BMI2 the index
//! is computed with PEXT instead; both paths fill and read the same table
//! through one indexing function, so they are identical by construction.
//!
//! Magic numbers are found at startup by seeded rejection sampling and
//! validated square by square: a candidate is accepted only once every
//! relevant occupancy maps to the correct attack set.

use once_cell::sync::Lazy;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::types::{Bitboard, Color, PieceType, Square};

/// Rook then bishop ray directions as (file, rank) steps.
const ROOK_DELTAS: [(i8, i8); 4] = [(0, 1), (0, -1), (1, 0), (-1, 0)];
const BISHOP_DELTAS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];

const MAGIC_SEED: u64 = 0x1A2B_3C4D_5E6F_7081;

struct Magic {
    mask: Bitboard,
    #[cfg_attr(all(target_arch = "x86_64", target_feature = "bmi2"), allow(dead_code))]
    magic: u64,
    shift: u32,
    offset: usize,
}

impl Magic {
    #[inline]
    fn index(&self, occ: Bitboard) -> usize {
        #[cfg(all(target_arch = "x86_64", target_feature = "bmi2"))]
        {
            let _ = self.shift;
            self.offset + unsafe { std::arch::x86_64::_pext_u64(occ.0, self.mask.0) } as usize
        }
        #[cfg(not(all(target_arch = "x86_64", target_feature = "bmi2")))]
        {
            self.offset + ((occ.0 & self.mask.0).wrapping_mul(self.magic) >> self.shift) as usize
        }
    }
}

struct SliderTable {
    magics: [Magic; 64],
    attacks: Vec<Bitboard>,
}

pub(crate) struct Tables {
    king: [Bitboard; 64],
    knight: [Bitboard; 64],
    pawn: [[Bitboard; 64]; 2],
    between: Box<[[Bitboard; 64]; 64]>,
    line: Box<[[Bitboard; 64]; 64]>,
    distance: [[u8; 64]; 64],
    rooks: SliderTable,
    bishops: SliderTable,
}

static TABLES: Lazy<Tables> = Lazy::new(Tables::build);

/// Force table construction. Called once at startup before any position is
/// created; afterwards every lookup is a plain read of immutable data.
pub fn init() {
    Lazy::force(&TABLES);
    log::debug!("attack tables initialized");
}

impl Tables {
    fn build() -> Tables {
        let mut king = [Bitboard::EMPTY; 64];
        let mut knight = [Bitboard::EMPTY; 64];
        let mut pawn = [[Bitboard::EMPTY; 64]; 2];
        let mut distance = [[0u8; 64]; 64];

        for sq in 0..64 {
            let s = Square::from_index(sq);
            let bb = Bitboard::from_square(s);

            king[sq] = bb.north()
                | bb.south()
                | bb.east()
                | bb.west()
                | bb.north_east()
                | bb.north_west()
                | bb.south_east()
                | bb.south_west();

            knight[sq] = step_attacks(
                s,
                &[
                    (1, 2),
                    (2, 1),
                    (2, -1),
                    (1, -2),
                    (-1, -2),
                    (-2, -1),
                    (-2, 1),
                    (-1, 2),
                ],
            );

            pawn[Color::White.index()][sq] = bb.north_east() | bb.north_west();
            pawn[Color::Black.index()][sq] = bb.south_east() | bb.south_west();

            for other in 0..64 {
                let o = Square::from_index(other);
                let df = (s.file() as i8 - o.file() as i8).unsigned_abs();
                let dr = (s.rank() as i8 - o.rank() as i8).unsigned_abs();
                distance[sq][other] = df.max(dr);
            }
        }

        let mut rng = StdRng::seed_from_u64(MAGIC_SEED);
        let rooks = SliderTable::build(&ROOK_DELTAS, &mut rng);
        let bishops = SliderTable::build(&BISHOP_DELTAS, &mut rng);

        let mut between = Box::new([[Bitboard::EMPTY; 64]; 64]);
        let mut line = Box::new([[Bitboard::EMPTY; 64]; 64]);
        for s1 in 0..64 {
            let sq1 = Square::from_index(s1);
            for (deltas, table) in [(&ROOK_DELTAS, &rooks), (&BISHOP_DELTAS, &bishops)] {
                let empty_ray = sliding_attack(deltas, sq1, Bitboard::EMPTY);
                for sq2 in empty_ray {
                    let s2 = sq2.index();
                    line[s1][s2] = (empty_ray & sliding_attack(deltas, sq2, Bitboard::EMPTY))
                        | Bitboard::from_square(sq1)
                        | Bitboard::from_square(sq2);
                    // Squares strictly between, plus the far endpoint.
                    between[s1][s2] = table.attacks_from(sq1, Bitboard::from_square(sq2))
                        & table.attacks_from(sq2, Bitboard::from_square(sq1))
                        | Bitboard::from_square(sq2);
                }
            }
        }

        Tables {
            king,
            knight,
            pawn,
            between,
            line,
            distance,
            rooks,
            bishops,
        }
    }
}

impl SliderTable {
    fn build(deltas: &[(i8, i8); 4], rng: &mut StdRng) -> SliderTable {
        let mut attacks = Vec::new();
        let mut magics = Vec::with_capacity(64);

        for sq in 0..64 {
            let s = Square::from_index(sq);
            let edges = ((Bitboard::RANK_1 | Bitboard::RANK_8) & !Bitboard::rank_bb(s.rank()))
                | ((Bitboard::FILE_A | Bitboard::FILE_H) & !Bitboard::file_bb(s.file()));
            let mask = sliding_attack(deltas, s, Bitboard::EMPTY) & !edges;
            let bits = mask.count();
            let size = 1usize << bits;
            let offset = attacks.len();
            attacks.resize(attacks.len() + size, Bitboard::EMPTY);

            // Enumerate every subset of the mask (Carry-Rippler) together
            // with its reference attack set.
            let mut occupancies = Vec::with_capacity(size);
            let mut occ = Bitboard::EMPTY;
            loop {
                occupancies.push((occ, sliding_attack(deltas, s, occ)));
                occ = Bitboard(occ.0.wrapping_sub(mask.0) & mask.0);
                if occ.is_empty() {
                    break;
                }
            }

            let magic = Magic {
                mask,
                magic: find_magic(mask, &occupancies, rng),
                shift: 64 - bits,
                offset,
            };
            for &(occ, att) in &occupancies {
                let idx = magic.index(occ);
                debug_assert!(
                    attacks[idx].is_empty() || attacks[idx] == att,
                    "magic index collision"
                );
                attacks[idx] = att;
            }
            magics.push(magic);
        }

        SliderTable {
            magics: magics.try_into().unwrap_or_else(|_| unreachable!()),
            attacks,
        }
    }

    #[inline]
    fn attacks_from(&self, sq: Square, occ: Bitboard) -> Bitboard {
        self.attacks[self.magics[sq.index()].index(occ)]
    }
}

/// Search for a magic multiplier by rejection sampling. Sparse random
/// candidates converge quickly; each accepted magic is verified to map all
/// occupancy subsets without destructive collisions.
#[allow(unused_variables)]
fn find_magic(mask: Bitboard, occupancies: &[(Bitboard, Bitboard)], rng: &mut StdRng) -> u64 {
    #[cfg(all(target_arch = "x86_64", target_feature = "bmi2"))]
    {
        // PEXT indexing is collision-free by definition; no magic needed.
        0
    }
    #[cfg(not(all(target_arch = "x86_64", target_feature = "bmi2")))]
    {
        let bits = mask.count();
        let shift = 64 - bits;
        let size = 1usize << bits;
        let mut used: Vec<Bitboard> = vec![Bitboard::EMPTY; size];
        let mut epoch: Vec<u32> = vec![0; size];
        let mut current = 0u32;

        loop {
            let candidate = rng.gen::<u64>() & rng.gen::<u64>() & rng.gen::<u64>();
            // Cheap pre-filter: the high bits of mask * magic must be dense.
            if (mask.0.wrapping_mul(candidate) >> 56).count_ones() < 6 {
                continue;
            }
            current += 1;
            let mut ok = true;
            for &(occ, att) in occupancies {
                let idx = ((occ.0 & mask.0).wrapping_mul(candidate) >> shift) as usize;
                if epoch[idx] == current && used[idx] != att {
                    ok = false;
                    break;
                }
                epoch[idx] = current;
                used[idx] = att;
            }
            if ok {
                return candidate;
            }
        }
    }
}

/// Slow reference generator: walk each ray until the board edge or the
/// first blocker, inclusive. Only used while building tables.
fn sliding_attack(deltas: &[(i8, i8); 4], sq: Square, occ: Bitboard) -> Bitboard {
    let mut attacks = Bitboard::EMPTY;
    for &(df, dr) in deltas {
        let mut file = sq.file() as i8 + df;
        let mut rank = sq.rank() as i8 + dr;
        while (0..8).contains(&file) && (0..8).contains(&rank) {
            let target = Square::make(file as u8, rank as u8);
            attacks.set(target);
            if occ.contains(target) {
                break;
            }
            file += df;
            rank += dr;
        }
    }
    attacks
}

fn step_attacks(sq: Square, steps: &[(i8, i8)]) -> Bitboard {
    let mut attacks = Bitboard::EMPTY;
    for &(df, dr) in steps {
        let file = sq.file() as i8 + df;
        let rank = sq.rank() as i8 + dr;
        if (0..8).contains(&file) && (0..8).contains(&rank) {
            attacks.set(Square::make(file as u8, rank as u8));
        }
    }
    attacks
}

#[inline]
#[must_use]
pub fn king_attacks(sq: Square) -> Bitboard {
    TABLES.king[sq.index()]
}

#[inline]
#[must_use]
pub fn knight_attacks(sq: Square) -> Bitboard {
    TABLES.knight[sq.index()]
}

#[inline]
#[must_use]
pub fn pawn_attacks(color: Color, sq: Square) -> Bitboard {
    TABLES.pawn[color.index()][sq.index()]
}

#[inline]
#[must_use]
pub fn bishop_attacks(sq: Square, occ: Bitboard) -> Bitboard {
    TABLES.bishops.attacks_from(sq, occ)
}

#[inline]
#[must_use]
pub fn rook_attacks(sq: Square, occ: Bitboard) -> Bitboard {
    TABLES.rooks.attacks_from(sq, occ)
}

#[inline]
#[must_use]
pub fn queen_attacks(sq: Square, occ: Bitboard) -> Bitboard {
    bishop_attacks(sq, occ) | rook_attacks(sq, occ)
}

/// Attacks of a non-pawn piece type.
#[inline]
#[must_use]
pub fn attacks_bb(pt: PieceType, sq: Square, occ: Bitboard) -> Bitboard {
    match pt {
        PieceType::Knight => knight_attacks(sq),
        PieceType::Bishop => bishop_attacks(sq, occ),
        PieceType::Rook => rook_attacks(sq, occ),
        PieceType::Queen => queen_attacks(sq, occ),
        PieceType::King => king_attacks(sq),
        PieceType::Pawn => unreachable!("pawn attacks depend on color"),
    }
}

/// Squares strictly between `s1` and `s2` along a shared ray, plus `s2`.
/// Empty when the squares share no ray.
#[inline]
#[must_use]
pub fn between_bb(s1: Square, s2: Square) -> Bitboard {
    TABLES.between[s1.index()][s2.index()]
}

/// The full edge-to-edge line through `s1` and `s2`, or empty when they are
/// not collinear.
#[inline]
#[must_use]
pub fn line_bb(s1: Square, s2: Square) -> Bitboard {
    TABLES.line[s1.index()][s2.index()]
}

/// Chebyshev distance between two squares.
#[inline]
#[must_use]
pub fn distance(s1: Square, s2: Square) -> u8 {
    TABLES.distance[s1.index()][s2.index()]
}

/// True when `a`, `b` and `c` lie on one rank, file or diagonal.
#[inline]
#[must_use]
pub fn aligned(a: Square, b: Square, c: Square) -> bool {
    line_bb(a, b).contains(c)
}
