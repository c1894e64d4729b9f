//! Fixed-corpus benchmark used for regression tracking and PGO.
//!
//! Fifty positions searched to a fixed depth with one thread and a fresh
//! table per position; for a given network two identical builds must
//! report the same total node count.

use std::time::Instant;

use crate::position::Position;
use crate::search::time::{SearchLimits, TimeManager};
use crate::search::{search, SearchResult};
use crate::tt::TranspositionTable;

pub const BENCH_DEPTH: i32 = 12;
pub const BENCH_TT_MB: usize = 16;

/// The 50-position corpus: openings, middlegames, tactical melees,
/// promotion races and bare endgames.
#[rustfmt::skip]
pub const BENCH_POSITIONS: [&str; 50] = [
    "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
    "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
    "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
    "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1",
    "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
    "r4rk1/1pp1qppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP1QPPP/R4RK1 w - - 0 10",
    "rnbqkb1r/pp1p1ppp/2p5/4P3/2B5/8/PPP1NnPP/RNBQK2R w KQkq - 0 6",
    "r1bqkbnr/pppp1ppp/2n5/4p3/2B1P3/5N2/PPPP1PPP/RNBQK2R b KQkq - 3 3",
    "r1bqk2r/ppp2ppp/2n2n2/2bpp3/4P3/2PP1N2/PP1N1PPP/R1BQKB1R w KQkq - 0 6",
    "rnbqk2r/ppp1ppbp/5np1/3p4/2PP4/2N2N2/PP2PPPP/R1BQKB1R w KQkq - 0 5",
    "rn1qkb1r/pb1p1ppp/1p2pn2/2p5/2PP4/5NP1/PP2PPBP/RNBQK2R w KQkq c6 0 6",
    "r1bq1rk1/pp2ppbp/2np1np1/8/3NP3/2N1BP2/PPPQ2PP/R3KB1R w KQ - 4 9",
    "r2q1rk1/1ppb1pp1/p2p1n1p/4p3/2B1P3/2PP1N2/PP3PPP/R2Q1RK1 w - - 0 11",
    "2rq1rk1/pp1bppbp/3p1np1/8/2BNP3/2N1B3/PPP2PPP/2KR3R w - - 5 12",
    "r1b2rk1/2q1bppp/p2ppn2/1p6/3NPP2/1BN5/PPP3PP/R2Q1R1K w - - 0 12",
    "r1bqr1k1/ppp2ppp/2np1n2/2b1p3/2B1P3/2PP1N2/PP1N1PPP/R1BQR1K1 w - - 6 8",
    "1r1q1rk1/p4ppp/2pb1n2/3p4/3P4/1QN1PN2/PP3PPP/R4RK1 b - - 2 14",
    "4rrk1/pp1n3p/3q2pQ/2p1pb2/2PP4/2P3N1/P2B2PP/4RRK1 b - - 7 19",
    "r3r1k1/2p2ppp/p1p1bn2/8/1q2P3/2NPQN2/PPP3PP/R4RK1 b - - 2 15",
    "r1bq1rk1/1pp2pbp/p1np1np1/4p3/2PPP3/2N1BP2/PP1QN1PP/R3KB1R w KQ - 0 9",
    "3rr1k1/pp3pp1/1qn2np1/8/3p4/PP1R1P2/2P1NQPP/R1B3K1 b - - 4 21",
    "2r2rk1/1bqnbpp1/1p1ppn1p/pP6/N1P1P3/P2B1N1P/1B2QPP1/R2R2K1 b - - 0 16",
    "r1bqkb1r/pp3ppp/2np1n2/4p1B1/3NP3/2N5/PPP2PPP/R2QKB1R w KQkq - 2 7",
    "5rk1/2p4p/2p4r/3P4/4p1b1/1Q2NqPp/PP3P1K/R4R2 b - - 1 32",
    "r2qnrnk/p2b2b1/1p1p2pp/2pPpp2/1PP1P3/PRNBB3/3QNPPP/5RK1 w - - 0 19",
    "6k1/6p1/6Pp/ppp5/3pn2P/1P3K2/1PP2P2/3N4 b - - 0 1",
    "3b4/5kp1/1p1p1p1p/pP1PpP1P/P1P1P3/3KN3/8/8 w - - 0 1",
    "8/6pk/1p6/8/PP3p1p/5P2/4KP1q/3Q4 w - - 0 1",
    "7k/3p2pp/4q3/8/4Q3/5Kp1/P6b/8 w - - 0 1",
    "8/2p5/8/2kPKp1p/2p4P/2P5/3P4/8 w - - 0 1",
    "8/1p3pp1/7p/5P1P/2k3P1/8/2K2P2/8 w - - 0 1",
    "8/pp2r1k1/2p1p3/3pP2p/1P1P1P1P/P5KR/8/8 w - - 0 1",
    "8/3p4/p1bk3p/Pp6/1Kp1PpPp/2P2P1P/2P5/5B2 b - - 0 1",
    "5k2/7R/4P2p/5K2/p1r2P1p/8/8/8 b - - 0 1",
    "6k1/6p1/P6p/r1N5/5p2/7P/1b3PP1/4R1K1 w - - 0 1",
    "1r3k2/4q3/2Pp3b/3Bp3/2Q2p2/1p1P2P1/1P2KP2/3N4 w - - 0 1",
    "6k1/4pp1p/3p2p1/P1pPb3/R7/1r2P1PP/3B1P2/6K1 w - - 0 1",
    "8/3p3B/5p2/5P2/p7/PP5b/k7/6K1 w - - 0 1",
    "5rk1/q6p/2p3bR/1pPp1rP1/1P1Pp3/P3B1Q1/1K3P2/R7 w - - 93 90",
    "4rrk1/1p1nq3/p7/2p5/3P4/2P3n1/7P/2B2R1K w - - 0 1",
    "r3k2r/2pb1ppp/2pp1q2/p7/1nP1B3/1P2P3/P2N1PPP/R2QK2R w KQkq a6 0 14",
    "4k3/8/4K3/8/8/8/8/4R3 w - - 0 1",
    "8/8/1p1r1k2/p1pPN1p1/P3KnP1/1P6/8/3R4 b - - 0 1",
    "8/8/8/5N2/8/p7/8/2NK3k w - - 0 1",
    "8/3k4/8/8/8/4B3/4KB2/2B5 w - - 0 1",
    "n1n5/PPPk4/8/8/8/8/4Kppp/5N1N b - - 0 1",
    "8/2k5/5p2/4pP2/4P3/8/2K5/8 w - - 0 1",
    "5k2/5p2/5P1p/7K/7P/8/8/8 w - - 0 1",
    "1k6/1b6/8/8/7R/8/8/4K2N w - - 0 1",
    "r1b1kb1r/3q1ppp/pBp1pn2/8/Np3P2/5B2/PPP3PP/R2Q1RK1 w kq - 0 13",
];

#[derive(Debug)]
pub struct BenchReport {
    pub total_nodes: u64,
    pub elapsed_ms: u64,
    pub nps: u64,
}

/// Run the corpus at the given depth and report per-position results via
/// the supplied sink (one line each), returning the totals.
pub fn run_bench(depth: i32, mut sink: impl FnMut(String)) -> BenchReport {
    let start = Instant::now();
    let mut total_nodes = 0u64;

    for (i, fen) in BENCH_POSITIONS.iter().enumerate() {
        let pos = Position::from_fen(fen, false).expect("bench FEN is valid");
        let tt = TranspositionTable::new(BENCH_TT_MB);
        let tm = TimeManager::new(SearchLimits::depth(depth), pos.side_to_move(), 0, 0);
        let SearchResult {
            best_move, nodes, ..
        } = search(&pos, &tm, &tt, 1, None);
        total_nodes += nodes;
        sink(format!(
            "position {:>2}/50 bestmove {:<6} nodes {:>10}",
            i + 1,
            best_move.to_uci(false),
            nodes
        ));
    }

    let elapsed_ms = start.elapsed().as_millis().max(1) as u64;
    BenchReport {
        total_nodes,
        elapsed_ms,
        nps: total_nodes * 1000 / elapsed_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_bench_fens_parse() {
        for fen in BENCH_POSITIONS {
            assert!(
                Position::from_fen(fen, false).is_ok(),
                "bench FEN failed to parse: {fen}"
            );
        }
    }

    #[test]
    fn shallow_bench_is_deterministic() {
        let a = run_bench(2, |_| {});
        let b = run_bench(2, |_| {});
        assert_eq!(a.total_nodes, b.total_nodes);
        assert!(a.total_nodes > 0);
    }
}
