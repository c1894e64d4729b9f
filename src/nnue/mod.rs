//! NNUE evaluation: per-ply accumulator stack with lazy incremental
//! updates and a king-bucketed refresh table.
//!
//! The searcher pushes one entry per move and pops on undo. Accumulators
//! are only brought up to date when an evaluation is actually requested:
//! the evaluator walks back to the nearest computed ancestor and replays
//! the recorded piece deltas, or rebuilds from the refresh table when the
//! king crossed a bucket or board half in between.

pub mod network;
mod simd;

pub use network::{network, Network, NetworkError};

use network::{feature_index, king_zone, HIDDEN, KING_BUCKETS};

use crate::position::Position;
use crate::types::{
    Bitboard, Color, Move, MoveKind, Piece, PieceType, Square, Value, MAX_PLY,
    VALUE_MATE_IN_MAX_PLY,
};

const STACK_SIZE: usize = MAX_PLY + 8;
/// Refresh slots per perspective: two board halves times the buckets.
const REFRESH_SLOTS: usize = 2 * KING_BUCKETS;

#[derive(Clone)]
struct Accumulator {
    values: [[i16; HIDDEN]; 2],
    computed: [bool; 2],
}

impl Accumulator {
    fn new() -> Self {
        Accumulator {
            values: [[0; HIDDEN]; 2],
            computed: [false; 2],
        }
    }
}

/// Piece changes of one move: at most two removals (mover and capture, or
/// king and rook) and two placements.
#[derive(Clone, Copy, Default)]
struct Delta {
    adds: [Option<(Piece, Square)>; 2],
    subs: [Option<(Piece, Square)>; 2],
    /// Perspective must rebuild from the refresh table at or above this
    /// ply: its king changed bucket or board half.
    refresh: [bool; 2],
}

#[derive(Clone)]
struct RefreshEntry {
    values: [i16; HIDDEN],
    pieces: [Bitboard; Piece::COUNT],
}

pub struct Evaluator {
    stack: Vec<Accumulator>,
    deltas: Vec<Delta>,
    refresh: Vec<RefreshEntry>,
    current: usize,
}

impl Evaluator {
    #[must_use]
    pub fn new() -> Self {
        Evaluator {
            stack: vec![Accumulator::new(); STACK_SIZE],
            deltas: vec![Delta::default(); STACK_SIZE],
            refresh: vec![
                RefreshEntry {
                    values: [0; HIDDEN],
                    pieces: [Bitboard::EMPTY; Piece::COUNT],
                };
                2 * REFRESH_SLOTS
            ],
            current: 0,
        }
    }

    /// Rebase the stack on `pos`: full rebuild of both perspectives and a
    /// reset of the refresh table to empty-board entries.
    pub fn reset(&mut self, pos: &Position, net: &Network) {
        self.current = 0;
        for entry in &mut self.refresh {
            entry.values = net.l0_bias;
            entry.pieces = [Bitboard::EMPTY; Piece::COUNT];
        }
        for persp in Color::ALL {
            let acc = &mut self.stack[0];
            acc.values[persp.index()] = net.l0_bias;
            acc.computed[persp.index()] = true;
        }
        for persp in Color::ALL {
            let ksq = pos.king_square(persp);
            for sq in pos.occupied() {
                let pc = pos.piece_on(sq).expect("occupied square has a piece");
                let feature = net.feature(feature_index(persp, pc, sq, ksq));
                simd::add_weights(&mut self.stack[0].values[persp.index()], feature);
            }
        }
    }

    /// Record the accumulator delta for a move already applied to `pos`.
    pub fn push(&mut self, pos: &Position, m: Move) {
        let mover = !pos.side_to_move();
        let from = m.from();
        let to = m.to();
        self.current += 1;
        debug_assert!(self.current < STACK_SIZE);

        let mut delta = Delta::default();
        match m.kind() {
            MoveKind::Castling => {
                let kingside = to.index() > from.index();
                let king_to = Square::make(if kingside { 6 } else { 2 }, from.rank());
                let rook_to = Square::make(if kingside { 5 } else { 3 }, from.rank());
                let king = Piece::new(mover, PieceType::King);
                let rook = Piece::new(mover, PieceType::Rook);
                delta.subs = [Some((king, from)), Some((rook, to))];
                delta.adds = [Some((king, king_to)), Some((rook, rook_to))];
                delta.refresh[mover.index()] =
                    king_zone(mover, from) != king_zone(mover, king_to);
            }
            MoveKind::EnPassant => {
                let pawn = Piece::new(mover, PieceType::Pawn);
                let capsq = to.offset(-mover.push());
                let captured = Piece::new(!mover, PieceType::Pawn);
                delta.subs = [Some((pawn, from)), Some((captured, capsq))];
                delta.adds = [Some((pawn, to)), None];
            }
            MoveKind::Promotion => {
                let pawn = Piece::new(mover, PieceType::Pawn);
                let promo = Piece::new(mover, m.promotion_type());
                delta.subs[0] = Some((pawn, from));
                delta.adds[0] = Some((promo, to));
                if let Some(captured) = pos.captured() {
                    delta.subs[1] = Some((captured, to));
                }
            }
            MoveKind::Normal => {
                let pc = pos.piece_on(to).expect("moved piece is on its target");
                delta.subs[0] = Some((pc, from));
                delta.adds[0] = Some((pc, to));
                if let Some(captured) = pos.captured() {
                    delta.subs[1] = Some((captured, to));
                }
                if pc.piece_type() == PieceType::King {
                    delta.refresh[mover.index()] =
                        king_zone(mover, from) != king_zone(mover, to);
                }
            }
        }

        self.deltas[self.current] = delta;
        self.stack[self.current].computed = [false; 2];
    }

    /// A null move changes no features; the parent accumulators stay
    /// valid as-is.
    pub fn push_null(&mut self) {
        self.current += 1;
        debug_assert!(self.current < STACK_SIZE);
        self.deltas[self.current] = Delta::default();
        let (front, back) = self.stack.split_at_mut(self.current);
        let parent = &front[self.current - 1];
        back[0].values = parent.values;
        back[0].computed = parent.computed;
    }

    pub fn pop(&mut self) {
        debug_assert!(self.current > 0);
        self.stack[self.current].computed = [false; 2];
        self.current -= 1;
    }

    /// Centipawn evaluation from the side to move's perspective.
    pub fn evaluate(&mut self, pos: &Position, net: &Network) -> Value {
        for persp in Color::ALL {
            self.materialize(persp, pos, net);
        }
        self.propagate(pos.side_to_move(), net)
    }

    /// Forward pass over the already-computed accumulators.
    fn propagate(&self, side: Color, net: &Network) -> Value {
        let acc = &self.stack[self.current];
        debug_assert!(acc.computed[0] && acc.computed[1]);
        let own = &acc.values[side.index()];
        let opp = &acc.values[(!side).index()];
        let mut sum = simd::relu_dot(own, &net.l1_weights[..HIDDEN]);
        sum = sum.wrapping_add(simd::relu_dot(opp, &net.l1_weights[HIDDEN..]));
        let value = (sum + net.l1_bias) / network::OUTPUT_SCALE;
        value.clamp(-(VALUE_MATE_IN_MAX_PLY - 1), VALUE_MATE_IN_MAX_PLY - 1)
    }

    /// Reference evaluation: rebuild both perspectives from scratch and
    /// run the forward pass. The incremental path must match this
    /// bit-for-bit for every reachable position.
    #[must_use]
    pub fn predict(pos: &Position, net: &Network) -> Value {
        let mut fresh = Evaluator::new();
        fresh.reset(pos, net);
        fresh.propagate(pos.side_to_move(), net)
    }

    /// Bring the current accumulator up to date for one perspective.
    fn materialize(&mut self, persp: Color, pos: &Position, net: &Network) {
        let p = persp.index();
        if self.stack[self.current].computed[p] {
            return;
        }

        // Walk towards the root until a computed ancestor, or a king
        // bucket crossing that forces a table refresh.
        let mut base = self.current;
        loop {
            if self.deltas[base].refresh[p] {
                self.refresh_from_table(persp, pos, net);
                return;
            }
            base -= 1;
            if self.stack[base].computed[p] {
                break;
            }
            debug_assert!(base > 0, "root accumulator is always computed");
        }

        for ply in base + 1..=self.current {
            let ksq = pos.king_square(persp);
            let (front, back) = self.stack.split_at_mut(ply);
            let parent = &front[ply - 1];
            let acc = &mut back[0];
            acc.values[p] = parent.values[p];
            let delta = self.deltas[ply];
            for (pc, sq) in delta.subs.iter().flatten() {
                let feature = net.feature(feature_index(persp, *pc, *sq, ksq));
                simd::sub_weights(&mut acc.values[p], feature);
            }
            for (pc, sq) in delta.adds.iter().flatten() {
                let feature = net.feature(feature_index(persp, *pc, *sq, ksq));
                simd::add_weights(&mut acc.values[p], feature);
            }
            acc.computed[p] = true;
        }
    }

    /// Rebuild the current accumulator from the refresh table entry of
    /// the king's current zone, updating only the squares that changed
    /// since the entry was last used.
    fn refresh_from_table(&mut self, persp: Color, pos: &Position, net: &Network) {
        let ksq = pos.king_square(persp);
        let (bucket, kingside) = king_zone(persp, ksq);
        let slot =
            persp.index() * REFRESH_SLOTS + usize::from(kingside) * KING_BUCKETS + bucket;
        let entry = &mut self.refresh[slot];

        for pc_idx in 0..Piece::COUNT {
            let pc = match pc_idx {
                0..=5 => Piece::new(Color::White, PieceType::from_index(pc_idx)),
                _ => Piece::new(Color::Black, PieceType::from_index(pc_idx - 6)),
            };
            let now = pos.pieces_cp(pc.color(), pc.piece_type());
            let was = entry.pieces[pc_idx];
            for sq in now & !was {
                simd::add_weights(&mut entry.values, net.feature(feature_index(persp, pc, sq, ksq)));
            }
            for sq in was & !now {
                simd::sub_weights(&mut entry.values, net.feature(feature_index(persp, pc, sq, ksq)));
            }
            entry.pieces[pc_idx] = now;
        }

        let p = persp.index();
        self.stack[self.current].values[p] = entry.values;
        self.stack[self.current].computed[p] = true;
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Evaluator::new()
    }
}
