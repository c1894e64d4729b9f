//! Randomized and targeted position-state invariants.

use basalt::movegen::generate_legal;
use basalt::position::Position;
use basalt::types::{Color, Move, MoveList, PieceType};

use proptest::prelude::*;
use rand::prelude::*;
use rand::Rng;

fn random_playout(seed: u64, max_plies: usize) -> (Position, Vec<Move>) {
    let mut pos = Position::startpos();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut played = Vec::new();
    for _ in 0..max_plies {
        let mut list = MoveList::new();
        generate_legal(&pos, &mut list);
        if list.is_empty() {
            break;
        }
        let m = list[rng.gen_range(0..list.len())];
        pos.do_move(m);
        played.push(m);
    }
    (pos, played)
}

proptest! {
    /// Unwinding a random game restores the starting position exactly.
    #[test]
    fn make_unmake_restores_everything(seed in any::<u64>(), plies in 1..60usize) {
        let start = Position::startpos();
        let (mut pos, mut played) = random_playout(seed, plies);
        while let Some(m) = played.pop() {
            pos.undo_move(m);
        }
        prop_assert_eq!(pos.key(), start.key());
        prop_assert_eq!(pos.to_fen(), start.to_fen());
        prop_assert_eq!(pos.checkers(), start.checkers());
        prop_assert_eq!(
            pos.non_pawn_material(Color::White),
            start.non_pawn_material(Color::White)
        );
    }

    /// The incrementally-maintained key always equals the key rebuilt
    /// from the board.
    #[test]
    fn incremental_key_matches_scratch(seed in any::<u64>(), plies in 1..80usize) {
        let (pos, _) = random_playout(seed, plies);
        prop_assert_eq!(pos.key(), pos.compute_key());
    }

    /// Every generated legal move passes both filters, and the filters
    /// never accept a move the generator knows nothing about.
    #[test]
    fn generator_agrees_with_legality_filters(seed in any::<u64>(), plies in 0..40usize) {
        let (pos, _) = random_playout(seed, plies);
        let mut list = MoveList::new();
        generate_legal(&pos, &mut list);
        for &m in &list {
            prop_assert!(pos.is_pseudolegal(m), "generated {m:?} fails pseudolegality");
            prop_assert!(pos.is_legal(m), "generated {m:?} fails legality");
        }
    }

    /// FEN round-trips through parse and format.
    #[test]
    fn fen_roundtrip(seed in any::<u64>(), plies in 0..60usize) {
        let (pos, _) = random_playout(seed, plies);
        let fen = pos.to_fen();
        let reparsed = Position::from_fen(&fen, false).unwrap();
        prop_assert_eq!(reparsed.to_fen(), fen);
        prop_assert_eq!(reparsed.key(), pos.key());
    }

    /// Two clones fed the same move sequence stay identical.
    #[test]
    fn clones_evolve_identically(seed in any::<u64>(), plies in 1..40usize) {
        let (_, played) = random_playout(seed, plies);
        let mut a = Position::startpos();
        let mut b = Position::startpos();
        for m in played {
            a.do_move(m);
            b.do_move(m);
        }
        prop_assert_eq!(a.key(), b.key());
        prop_assert_eq!(a.to_fen(), b.to_fen());
    }

    /// SEE never decreases when the captured piece gets more valuable.
    #[test]
    fn see_is_monotone_in_victim(victim_idx in 0..4usize) {
        let victims = ['p', 'n', 'r', 'q'];
        let fen = |v: char| format!("3r3k/8/8/3{v}4/8/8/3R4/3K4 w - - 0 1");
        let m = Move::new("d2".parse().unwrap(), "d5".parse().unwrap());
        let small = Position::from_fen(&fen(victims[victim_idx]), false).unwrap();
        for &bigger in &victims[victim_idx..] {
            let big = Position::from_fen(&fen(bigger), false).unwrap();
            prop_assert!(big.see(m) >= small.see(m));
        }
    }
}

#[test]
fn null_move_roundtrip_preserves_state() {
    let mut pos = Position::from_fen(
        "r1bqkbnr/pppp1ppp/2n5/4p3/2B1P3/5N2/PPPP1PPP/RNBQK2R b KQkq - 3 3",
        false,
    )
    .unwrap();
    let fen = pos.to_fen();
    let key = pos.key();
    pos.do_null();
    assert_ne!(pos.key(), key);
    assert_eq!(pos.ep_square(), None);
    pos.undo_null();
    assert_eq!(pos.to_fen(), fen);
    assert_eq!(pos.key(), key);
}

#[test]
fn kings_always_exactly_one_per_side() {
    let (pos, _) = random_playout(7, 120);
    for color in Color::ALL {
        assert_eq!(pos.pieces_cp(color, PieceType::King).count(), 1);
    }
}

#[test]
fn fifty_move_counter_drives_draw() {
    // Two kings and two rooks shuffling: no captures, no pawn moves.
    let mut pos = Position::from_fen("7k/8/8/8/8/8/R7/K7 w - - 98 80", false).unwrap();
    assert!(!pos.is_draw(2));
    pos.do_move(Move::new("a2".parse().unwrap(), "b2".parse().unwrap()));
    pos.do_move(Move::new("h8".parse().unwrap(), "g8".parse().unwrap()));
    assert!(pos.rule50() >= 100);
    assert!(pos.is_draw(2));
}

#[test]
fn chess960_castling_into_corner() {
    // King on b1 castles "kingside" with the c1 rook: king to g1, rook
    // to f1, even though the rook starts to the king's immediate right.
    let mut pos = Position::from_fen("5k2/8/8/8/8/8/8/1KR5 w C - 0 1", true).unwrap();
    let mut list = MoveList::new();
    generate_legal(&pos, &mut list);
    let castle = list
        .iter()
        .copied()
        .find(|m| m.is_castling())
        .expect("castling must be generated");
    pos.do_move(castle);
    assert_eq!(pos.king_square(Color::White).to_string(), "g1");
    pos.undo_move(castle);
    assert_eq!(pos.to_fen(), "5k2/8/8/8/8/8/8/1KR5 w C - 0 1");
}
