//! Zobrist keys for incremental position hashing.
//!
//! One 64-bit key per (piece, square), per en-passant file, per 4-bit
//! castling-rights mask, and one for the side to move. Keys come from a
//! fixed-seed generator so hashes are reproducible across runs.

use once_cell::sync::Lazy;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::types::{Piece, Square};

const ZOBRIST_SEED: u64 = 0x9E37_79B9_7F4A_7C15;

pub struct Zobrist {
    pub piece_square: [[u64; 64]; Piece::COUNT],
    pub en_passant: [u64; 8],
    pub castling: [u64; 16],
    pub side: u64,
}

pub static ZOBRIST: Lazy<Zobrist> = Lazy::new(|| {
    let mut rng = StdRng::seed_from_u64(ZOBRIST_SEED);
    let mut piece_square = [[0u64; 64]; Piece::COUNT];
    for row in &mut piece_square {
        for key in row.iter_mut() {
            *key = rng.gen();
        }
    }
    let mut en_passant = [0u64; 8];
    for key in &mut en_passant {
        *key = rng.gen();
    }
    // Index 0 is the empty-rights mask; keep it zero so "no rights" does
    // not perturb the hash.
    let mut castling = [0u64; 16];
    for key in castling.iter_mut().skip(1) {
        *key = rng.gen();
    }
    Zobrist {
        piece_square,
        en_passant,
        castling,
        side: rng.gen(),
    }
});

#[inline]
#[must_use]
pub fn piece_key(pc: Piece, sq: Square) -> u64 {
    ZOBRIST.piece_square[pc.index()][sq.index()]
}

#[inline]
#[must_use]
pub fn en_passant_key(file: u8) -> u64 {
    ZOBRIST.en_passant[file as usize]
}

#[inline]
#[must_use]
pub fn castling_key(rights: u8) -> u64 {
    ZOBRIST.castling[rights as usize]
}

#[inline]
#[must_use]
pub fn side_key() -> u64 {
    ZOBRIST.side
}
