//! Network weights, the feature indexing scheme, and the weight-bundle
//! loader.
//!
//! Architecture: a sparse input layer over 16 king buckets x 12 piece
//! channels x 64 squares feeding a 512-wide accumulator per perspective,
//! then a single output layer over the concatenation of both perspectives
//! (side to move first) with clipped-ReLU activation.

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use once_cell::sync::Lazy;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::types::{Color, Piece, Square};

pub const HIDDEN: usize = 512;
pub const KING_BUCKETS: usize = 16;
pub const INPUT: usize = KING_BUCKETS * Piece::COUNT * 64;

/// Output is divided by this after the int32 accumulation.
pub const OUTPUT_SCALE: i32 = 32 * 128;

const MAGIC: &[u8; 4] = b"BSNN";
const VERSION: u32 = 1;

/// King-bucket lookup from the perspective owner's oriented king square.
/// Mirror-symmetric across the d/e file boundary, finer near the home
/// rank where king placement matters most.
#[rustfmt::skip]
pub const KING_BUCKET_MAP: [usize; 64] = [
     0,  1,  2,  3,  3,  2,  1,  0,
     4,  5,  6,  7,  7,  6,  5,  4,
     8,  9, 10, 11, 11, 10,  9,  8,
     8,  9, 10, 11, 11, 10,  9,  8,
    12, 12, 13, 13, 13, 13, 12, 12,
    12, 12, 13, 13, 13, 13, 12, 12,
    14, 14, 15, 15, 15, 15, 14, 14,
    14, 14, 15, 15, 15, 15, 14, 14,
];

/// Vertical flip for the black perspective.
#[inline]
#[must_use]
pub fn orient(perspective: Color, sq: Square) -> Square {
    match perspective {
        Color::White => sq,
        Color::Black => sq.flip_rank(),
    }
}

/// Bucket and board half governing the feature mapping for a king square.
/// While both stay fixed, every other feature index is stable and moves
/// can be applied as accumulator deltas.
#[inline]
#[must_use]
pub fn king_zone(perspective: Color, ksq: Square) -> (usize, bool) {
    let k = orient(perspective, ksq);
    (KING_BUCKET_MAP[k.index()], k.file() >= 4)
}

/// Index of the input feature for `pc` on `sq`, seen from `perspective`
/// whose king is on `ksq`.
#[inline]
#[must_use]
pub fn feature_index(perspective: Color, pc: Piece, sq: Square, ksq: Square) -> usize {
    let (bucket, kingside) = king_zone(perspective, ksq);
    let mut s = orient(perspective, sq);
    if kingside {
        s = s.flip_file();
    }
    let color_term = usize::from(pc.color() != perspective);
    bucket * (Piece::COUNT * 64)
        + color_term * (6 * 64)
        + pc.piece_type().index() * 64
        + s.index()
}

#[derive(Debug)]
pub enum NetworkError {
    Io(io::Error),
    BadMagic,
    BadVersion(u32),
    BadShape { buckets: u32, hidden: u32 },
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::Io(e) => write!(f, "network read failed: {e}"),
            NetworkError::BadMagic => write!(f, "not a network bundle (bad magic)"),
            NetworkError::BadVersion(v) => write!(f, "unsupported bundle version {v}"),
            NetworkError::BadShape { buckets, hidden } => {
                write!(f, "bundle shape {buckets}x{hidden} does not match the engine")
            }
        }
    }
}

impl std::error::Error for NetworkError {}

impl From<io::Error> for NetworkError {
    fn from(e: io::Error) -> Self {
        NetworkError::Io(e)
    }
}

pub struct Network {
    l0_weights: Box<[i16]>,
    pub l0_bias: [i16; HIDDEN],
    pub l1_weights: [i16; 2 * HIDDEN],
    pub l1_bias: i32,
}

impl Network {
    /// The weight row of one input feature.
    #[inline]
    #[must_use]
    pub fn feature(&self, idx: usize) -> &[i16] {
        &self.l0_weights[idx * HIDDEN..(idx + 1) * HIDDEN]
    }

    /// Load a bundle: `BSNN` magic, version, shape, then little-endian
    /// L0 weights (i16), L0 bias (i16), L1 weights (i16), L1 bias (i32).
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, NetworkError> {
        let file = File::open(path)?;
        Self::from_reader(&mut BufReader::new(file))
    }

    pub fn from_reader<R: Read>(reader: &mut R) -> Result<Self, NetworkError> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(NetworkError::BadMagic);
        }
        let version = read_u32(reader)?;
        if version != VERSION {
            return Err(NetworkError::BadVersion(version));
        }
        let buckets = read_u32(reader)?;
        let hidden = read_u32(reader)?;
        if buckets as usize != KING_BUCKETS || hidden as usize != HIDDEN {
            return Err(NetworkError::BadShape { buckets, hidden });
        }

        let mut l0_weights = vec![0i16; INPUT * HIDDEN].into_boxed_slice();
        read_i16_all(reader, &mut l0_weights)?;
        let mut l0_bias = [0i16; HIDDEN];
        read_i16_all(reader, &mut l0_bias)?;
        let mut l1_weights = [0i16; 2 * HIDDEN];
        read_i16_all(reader, &mut l1_weights)?;
        let mut buf = [0u8; 4];
        reader.read_exact(&mut buf)?;
        let l1_bias = i32::from_le_bytes(buf);

        Ok(Network {
            l0_weights,
            l0_bias,
            l1_weights,
            l1_bias,
        })
    }

    /// Deterministic stand-in bundle used when no weight file is
    /// available. Two accumulator lanes are wired so the output equals
    /// the material balance in centipawns; the remaining lanes carry
    /// small seeded weights that add a positional flavor of a few dozen
    /// centipawns. Reproducible across runs, functional, just not strong.
    #[must_use]
    pub fn fallback() -> Self {
        // Lane 0 sums own-piece values, lane 1 opponent-piece values,
        // both offset by a bias so ReLU never clips them. The output
        // weights recover (own - opp) from each perspective; the bias
        // terms cancel. MATERIAL_AMP / (MATERIAL_SCALE * OUTPUT_SCALE)
        // = 1/2 per perspective pair, so the lanes sum to one centipawn
        // per centipawn of material.
        const MATERIAL_SCALE: i16 = 8;
        const MATERIAL_AMP: i16 = 16_384;
        const LANE_BIAS: i16 = 1_024;
        const MATERIAL_VALUES: [i16; 6] = [100, 422, 437, 694, 1350, 0];

        let mut rng = StdRng::seed_from_u64(0x5157_4E4E_0001);
        let mut l0_weights = vec![0i16; INPUT * HIDDEN].into_boxed_slice();
        for (idx, row) in l0_weights.chunks_exact_mut(HIDDEN).enumerate() {
            let channel = idx % (Piece::COUNT * 64) / 64;
            let (lane, piece_type) = if channel < 6 {
                (0, channel)
            } else {
                (1, channel - 6)
            };
            row[lane] = MATERIAL_VALUES[piece_type] / MATERIAL_SCALE;
            for w in row.iter_mut().skip(2) {
                *w = rng.gen_range(-2..=2);
            }
        }

        let mut l0_bias = [0i16; HIDDEN];
        l0_bias[0] = LANE_BIAS;
        l0_bias[1] = LANE_BIAS;
        for b in l0_bias.iter_mut().skip(2) {
            *b = rng.gen_range(-4..=4);
        }

        let mut l1_weights = [0i16; 2 * HIDDEN];
        l1_weights[0] = MATERIAL_AMP;
        l1_weights[1] = -MATERIAL_AMP;
        l1_weights[HIDDEN] = -MATERIAL_AMP;
        l1_weights[HIDDEN + 1] = MATERIAL_AMP;
        for half in [2..HIDDEN, HIDDEN + 2..2 * HIDDEN] {
            for w in &mut l1_weights[half] {
                *w = rng.gen_range(-2..=2);
            }
        }

        Network {
            l0_weights,
            l0_bias,
            l1_weights,
            l1_bias: 0,
        }
    }
}

fn read_u32<R: Read>(reader: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_i16_all<R: Read>(reader: &mut R, out: &mut [i16]) -> io::Result<()> {
    let mut buf = vec![0u8; out.len() * 2];
    reader.read_exact(&mut buf)?;
    for (value, chunk) in out.iter_mut().zip(buf.chunks_exact(2)) {
        *value = i16::from_le_bytes([chunk[0], chunk[1]]);
    }
    Ok(())
}

/// Process-wide network: a file named by `BASALT_EVAL_FILE` when present,
/// the deterministic fallback otherwise. Loaded once before the first
/// evaluation; a corrupt file is fatal at startup rather than mid-search.
static NETWORK: Lazy<Network> = Lazy::new(|| {
    if let Ok(path) = std::env::var("BASALT_EVAL_FILE") {
        match Network::load(&path) {
            Ok(net) => {
                log::info!("loaded network bundle from {path}");
                return net;
            }
            Err(e) => panic!("cannot load network bundle {path}: {e}"),
        }
    }
    log::warn!("no network bundle configured; using built-in fallback weights");
    Network::fallback()
});

#[must_use]
pub fn network() -> &'static Network {
    &NETWORK
}
