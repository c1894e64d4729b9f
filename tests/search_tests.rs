//! End-to-end search behavior through the public API.

use std::sync::Arc;

use basalt::position::Position;
use basalt::search::time::{SearchLimits, TimeManager};
use basalt::search::{search, SearchResult};
use basalt::tt::TranspositionTable;
use basalt::types::{mate_in, Move, VALUE_MATE_IN_MAX_PLY};

fn run_depth(fen: &str, depth: i32, threads: usize) -> SearchResult {
    let pos = Position::from_fen(fen, false).unwrap();
    let tm = TimeManager::new(SearchLimits::depth(depth), pos.side_to_move(), 0, 10);
    let tt = TranspositionTable::new(16);
    search(&pos, &tm, &tt, threads, None)
}

#[test]
fn mate_in_one_at_depth_one() {
    let result = run_depth("6k1/5ppp/8/8/8/8/8/4R1K1 w - - 0 1", 1, 1);
    assert_eq!(result.best_move.to_uci(false), "e1e8");
    assert_eq!(result.score, mate_in(1));
}

#[test]
fn stalemate_returns_draw_without_nodes() {
    let result = run_depth("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1", 5, 1);
    assert_eq!(result.best_move, Move::NONE);
    assert_eq!(result.score, 0);
    assert_eq!(result.nodes, 0);
}

#[test]
fn doubled_rooks_deliver_the_back_rank_mate() {
    // Only the front rook can reach the eighth rank.
    let result = run_depth("6k1/5ppp/8/8/8/8/4R3/4R1K1 w - - 0 1", 6, 1);
    assert!(
        result.score >= VALUE_MATE_IN_MAX_PLY,
        "expected a mate score, got {}",
        result.score
    );
    assert_eq!(result.best_move.to_uci(false), "e2e8");
}

#[test]
fn wins_a_hanging_piece() {
    // The black rook on h5 is free to take.
    let result = run_depth("4k3/8/8/7r/8/8/8/4K2R w - - 0 1", 5, 1);
    assert_eq!(result.best_move.to_uci(false), "h1h5");
}

#[test]
fn pv_starts_with_the_best_move() {
    let result = run_depth(
        "r1bqkbnr/pppp1ppp/2n5/4p3/2B1P3/5N2/PPPP1PPP/RNBQK2R w KQkq - 3 3",
        6,
        1,
    );
    assert!(result.best_move.is_ok());
    assert_eq!(result.pv.first().copied(), Some(result.best_move));
    assert!(result.depth >= 6);
}

#[test]
fn repetition_draw_is_recognized_and_survivable() {
    let mut pos = Position::startpos();
    let cycle = ["g1f3", "g8f6", "f3g1", "f6g8"];
    for _ in 0..2 {
        for token in cycle {
            let m = find_move(&pos, token);
            pos.do_move(m);
        }
    }
    // Third occurrence of the starting position is on the board.
    assert!(pos.is_draw(1));

    let tm = TimeManager::new(SearchLimits::depth(4), pos.side_to_move(), 0, 10);
    let tt = TranspositionTable::new(4);
    let result = search(&pos, &tm, &tt, 1, None);
    // The engine still proposes a playable move.
    assert!(result.best_move.is_ok());
    assert!(pos.is_legal(result.best_move));
}

#[test]
fn movetime_stops_the_search() {
    let pos = Position::startpos();
    let tm = TimeManager::new(
        SearchLimits {
            movetime: Some(120),
            ..Default::default()
        },
        pos.side_to_move(),
        0,
        10,
    );
    let tt = TranspositionTable::new(16);
    let start = std::time::Instant::now();
    let result = search(&pos, &tm, &tt, 1, None);
    assert!(result.best_move.is_ok());
    assert!(
        start.elapsed().as_millis() < 2_000,
        "search ran far past its movetime"
    );
}

#[test]
fn stop_flag_aborts_promptly() {
    let pos = Position::startpos();
    let tm = Arc::new(TimeManager::new(
        SearchLimits {
            infinite: true,
            ..Default::default()
        },
        pos.side_to_move(),
        0,
        10,
    ));
    let tt = TranspositionTable::new(16);
    let stopper = Arc::clone(&tm);
    let handle = std::thread::spawn(move || {
        std::thread::sleep(std::time::Duration::from_millis(150));
        stopper.stop();
    });
    let result = search(&pos, &tm, &tt, 1, None);
    handle.join().unwrap();
    assert!(result.best_move.is_ok());
}

#[test]
fn helper_threads_do_not_change_the_forced_result() {
    let single = run_depth("6k1/5ppp/8/8/8/8/8/4R1K1 w - - 0 1", 4, 1);
    let multi = run_depth("6k1/5ppp/8/8/8/8/8/4R1K1 w - - 0 1", 4, 4);
    assert_eq!(single.best_move, multi.best_move);
    assert_eq!(multi.best_move.to_uci(false), "e1e8");
}

#[test]
fn deeper_search_never_misses_the_shallow_mate() {
    for depth in 1..=6 {
        let result = run_depth("6k1/5ppp/8/8/8/8/8/4R1K1 w - - 0 1", depth, 1);
        assert_eq!(
            result.best_move.to_uci(false),
            "e1e8",
            "lost the mate at depth {depth}"
        );
    }
}

fn find_move(pos: &Position, token: &str) -> Move {
    use basalt::movegen::generate_legal;
    use basalt::types::MoveList;
    let mut list = MoveList::new();
    generate_legal(pos, &mut list);
    list.iter()
        .copied()
        .find(|m| m.to_uci(false) == token)
        .unwrap_or_else(|| panic!("{token} is not legal here"))
}
