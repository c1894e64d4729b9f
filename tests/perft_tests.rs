//! Perft vectors: the move generator is correct iff every count matches.

use basalt::movegen::perft;
use basalt::position::Position;

struct PerftCase {
    name: &'static str,
    fen: &'static str,
    chess960: bool,
    depths: &'static [(usize, u64)],
}

const CASES: &[PerftCase] = &[
    PerftCase {
        name: "startpos",
        fen: "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
        chess960: false,
        depths: &[(1, 20), (2, 400), (3, 8_902), (4, 197_281)],
    },
    PerftCase {
        name: "kiwipete",
        fen: "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        chess960: false,
        depths: &[(1, 48), (2, 2_039), (3, 97_862), (4, 4_085_603)],
    },
    PerftCase {
        name: "rook endgame with en passant",
        fen: "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
        chess960: false,
        depths: &[(1, 14), (2, 191), (3, 2_812), (4, 43_238), (5, 674_624)],
    },
    PerftCase {
        name: "promotion tangle",
        fen: "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1",
        chess960: false,
        depths: &[(1, 6), (2, 264), (3, 9_467), (4, 422_333)],
    },
    PerftCase {
        name: "talkchess illegal-ep position",
        fen: "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
        chess960: false,
        depths: &[(1, 44), (2, 1_486), (3, 62_379), (4, 2_103_487)],
    },
    PerftCase {
        name: "steven edwards position 6",
        fen: "r4rk1/1pp1qppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP1QPPP/R4RK1 w - - 0 10",
        chess960: false,
        depths: &[(1, 46), (2, 2_079), (3, 89_890)],
    },
    PerftCase {
        name: "underpromotion farm",
        fen: "n1n5/PPPk4/8/8/8/8/4Kppp/5N1N b - - 0 1",
        chess960: false,
        depths: &[(1, 24), (2, 496), (3, 9_483)],
    },
    PerftCase {
        name: "castling rights gauntlet",
        fen: "r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1",
        chess960: false,
        depths: &[(1, 26), (2, 568), (3, 13_744)],
    },
];

#[test]
fn chess960_positions_stay_consistent_under_perft() {
    // No published counts handy for these, but perft exercises every
    // do/undo path; the incremental key must survive the whole tree.
    for fen in [
        "2rkr3/8/8/8/8/8/8/2RKR3 w ECec - 0 1",
        "rk2r3/8/8/8/8/8/8/RK2R3 w EAea - 0 1",
    ] {
        let mut pos = Position::from_fen(fen, true).unwrap();
        let nodes = perft(&mut pos, 3);
        assert!(nodes > 0);
        assert_eq!(pos.key(), pos.compute_key());
        assert_eq!(pos.to_fen(), fen);
    }
}

#[test]
fn perft_suite_shallow() {
    for case in CASES {
        let mut pos = Position::from_fen(case.fen, case.chess960).unwrap();
        for &(depth, expected) in case.depths {
            if expected > 500_000 {
                continue;
            }
            let got = perft(&mut pos, depth);
            assert_eq!(
                got, expected,
                "{} at depth {depth}: got {got}, expected {expected}",
                case.name
            );
        }
    }
}

#[test]
#[ignore = "several million nodes; run explicitly"]
fn perft_suite_deep() {
    for case in CASES {
        let mut pos = Position::from_fen(case.fen, case.chess960).unwrap();
        for &(depth, expected) in case.depths {
            assert_eq!(
                perft(&mut pos, depth),
                expected,
                "{} at depth {depth}",
                case.name
            );
        }
    }
}

#[test]
#[ignore = "119 million nodes; run explicitly"]
fn perft_startpos_depth_six() {
    let mut pos = Position::startpos();
    assert_eq!(perft(&mut pos, 5), 4_865_609);
    assert_eq!(perft(&mut pos, 6), 119_060_324);
}

#[test]
#[ignore = "194 million nodes; run explicitly"]
fn perft_kiwipete_depth_five() {
    let mut pos = Position::from_fen(
        "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        false,
    )
    .unwrap();
    assert_eq!(perft(&mut pos, 5), 193_690_690);
}
