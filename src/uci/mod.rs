//! UCI front end: the stdin loop, engine state, and output formatting.
//!
//! The search runs on its own thread so `stop` stays responsive; the
//! transposition table sits behind an `RwLock` whose write side (resize,
//! clear) naturally waits for the search's read guard to drop.

pub mod command;

use std::io::BufRead;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::RwLock;

use crate::movegen;
use crate::nnue;
use crate::position::{attacks, Position};
use crate::search::bench::{run_bench, BENCH_DEPTH};
use crate::search::time::{SearchLimits, TimeManager};
use crate::search::{search, InfoCallback, SearchEvent};
use crate::tt::{TranspositionTable, DEFAULT_TT_MB};
use crate::types::{Move, MoveList, Value, VALUE_MATE, VALUE_MATE_IN_MAX_PLY};

use command::{parse_command, parse_go_params, UciCommand};

const ENGINE_NAME: &str = concat!("Basalt ", env!("CARGO_PKG_VERSION"));
const SEARCH_STACK_SIZE: usize = 16 * 1024 * 1024;

struct ActiveSearch {
    tm: Arc<TimeManager>,
    handle: JoinHandle<()>,
}

pub struct Engine {
    pos: Position,
    tt: Arc<RwLock<TranspositionTable>>,
    threads: usize,
    move_overhead: u64,
    chess960: bool,
    active: Option<ActiveSearch>,
}

impl Engine {
    #[must_use]
    pub fn new() -> Self {
        Engine {
            pos: Position::startpos(),
            tt: Arc::new(RwLock::new(TranspositionTable::new(DEFAULT_TT_MB))),
            threads: 1,
            move_overhead: 10,
            chess960: false,
            active: None,
        }
    }

    /// Process one command; returns `false` on `quit`.
    pub fn handle(&mut self, cmd: UciCommand) -> bool {
        match cmd {
            UciCommand::Uci => self.cmd_uci(),
            UciCommand::IsReady => self.cmd_isready(),
            UciCommand::UciNewGame => self.cmd_newgame(),
            UciCommand::Position(tokens) => self.cmd_position(&tokens),
            UciCommand::Go(tokens) => self.cmd_go(&tokens),
            UciCommand::SetOption { name, value } => self.cmd_setoption(&name, &value),
            UciCommand::Stop => {
                if let Some(active) = &self.active {
                    active.tm.stop();
                }
            }
            UciCommand::Bench => self.cmd_bench(),
            UciCommand::Quit => {
                self.stop_and_join();
                return false;
            }
            UciCommand::Unknown(token) => {
                if !token.is_empty() {
                    log::debug!("ignoring unknown command: {token}");
                }
            }
        }
        true
    }

    fn cmd_uci(&self) {
        println!("id name {ENGINE_NAME}");
        println!("id author the Basalt developers");
        println!("option name Hash type spin default {DEFAULT_TT_MB} min 1 max 1048576");
        println!("option name Threads type spin default 1 min 1 max 512");
        println!("option name MoveOverhead type spin default 10 min 0 max 5000");
        println!("option name UCI_Chess960 type check default false");
        println!("uciok");
    }

    fn cmd_isready(&mut self) {
        // Make sure every lazily-built table exists before claiming ready.
        attacks::init();
        let _ = nnue::network();
        println!("readyok");
    }

    fn cmd_newgame(&mut self) {
        self.stop_and_join();
        self.tt.write().clear();
        self.pos = Position::startpos();
    }

    fn cmd_setoption(&mut self, name: &str, value: &str) {
        self.stop_and_join();
        match name {
            "Hash" => {
                if let Ok(mb) = value.parse::<usize>() {
                    self.tt.write().resize(mb.clamp(1, 1_048_576));
                }
            }
            "Threads" => {
                if let Ok(n) = value.parse::<usize>() {
                    self.threads = n.clamp(1, 512);
                }
            }
            "MoveOverhead" => {
                if let Ok(ms) = value.parse::<u64>() {
                    self.move_overhead = ms.min(5000);
                }
            }
            "UCI_Chess960" => {
                self.chess960 = value.eq_ignore_ascii_case("true");
            }
            other => log::debug!("ignoring unknown option: {other}"),
        }
    }

    /// `position startpos|fen <fen> [moves m1 m2 ...]`. A malformed move
    /// stops processing; the position keeps the last valid state.
    fn cmd_position(&mut self, tokens: &[String]) {
        self.stop_and_join();
        let mut idx = 0;
        let parsed = match tokens.first().map(String::as_str) {
            Some("startpos") => {
                idx = 1;
                Some(Position::startpos())
            }
            Some("fen") => {
                let end = tokens
                    .iter()
                    .position(|t| t == "moves")
                    .unwrap_or(tokens.len());
                let fen = tokens[1..end].join(" ");
                idx = end;
                match Position::from_fen(&fen, self.chess960) {
                    Ok(pos) => Some(pos),
                    Err(e) => {
                        log::warn!("rejecting position command: {e}");
                        None
                    }
                }
            }
            _ => None,
        };
        let Some(mut pos) = parsed else { return };

        if tokens.get(idx).map(String::as_str) == Some("moves") {
            for token in &tokens[idx + 1..] {
                match self.find_move(&pos, token) {
                    Some(m) => pos.do_move(m),
                    None => {
                        log::warn!("stopping at unplayable move: {token}");
                        break;
                    }
                }
            }
        }
        self.pos = pos;
    }

    fn find_move(&self, pos: &Position, token: &str) -> Option<Move> {
        let mut legal = MoveList::new();
        movegen::generate_legal(pos, &mut legal);
        legal
            .iter()
            .copied()
            .find(|m| m.to_uci(self.chess960) == token)
    }

    fn cmd_go(&mut self, tokens: &[String]) {
        self.stop_and_join();
        let params = parse_go_params(tokens);

        if let Some(depth) = params.perft {
            let mut pos = self.pos.clone();
            let start = std::time::Instant::now();
            let divide = movegen::perft_divide(&mut pos, depth);
            let mut total = 0u64;
            for (m, nodes) in &divide {
                println!("{}: {nodes}", m.to_uci(self.chess960));
                total += nodes;
            }
            let ms = start.elapsed().as_millis().max(1) as u64;
            println!("\nNodes searched: {total} ({} nps)", total * 1000 / ms);
            return;
        }

        self.start_search(params.limits);
    }

    fn start_search(&mut self, limits: SearchLimits) {
        let tm = Arc::new(TimeManager::new(
            limits,
            self.pos.side_to_move(),
            self.pos.game_ply(),
            self.move_overhead,
        ));
        let pos = self.pos.clone();
        let tt = Arc::clone(&self.tt);
        let threads = self.threads;
        let chess960 = self.chess960;
        let tm_thread = Arc::clone(&tm);

        let handle = thread::Builder::new()
            .name("search-main".to_string())
            .stack_size(SEARCH_STACK_SIZE)
            .spawn(move || {
                let callback: InfoCallback =
                    Arc::new(move |event| print_event(event, chess960));
                let tt = tt.read();
                let result = search(&pos, &tm_thread, &tt, threads, Some(callback));
                println!("bestmove {}", result.best_move.to_uci(chess960));
            })
            .expect("failed to spawn search thread");

        self.active = Some(ActiveSearch { tm, handle });
    }

    fn stop_and_join(&mut self) {
        if let Some(active) = self.active.take() {
            active.tm.stop();
            let _ = active.handle.join();
        }
    }

    fn cmd_bench(&mut self) {
        self.stop_and_join();
        let report = run_bench(BENCH_DEPTH, |line| println!("{line}"));
        println!("total nodes: {}", report.total_nodes);
        println!("nps: {}", report.nps);
    }
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new()
    }
}

fn format_score(score: Value) -> String {
    if score >= VALUE_MATE_IN_MAX_PLY {
        format!("mate {}", (VALUE_MATE - score + 1) / 2)
    } else if score <= -VALUE_MATE_IN_MAX_PLY {
        format!("mate -{}", (VALUE_MATE + score + 1) / 2)
    } else {
        format!("cp {score}")
    }
}

fn print_event(event: &SearchEvent, chess960: bool) {
    match event {
        SearchEvent::Depth {
            depth,
            seldepth,
            score,
            nodes,
            nps,
            time_ms,
            hashfull,
            pv,
        } => {
            let mut line = format!(
                "info depth {depth} seldepth {seldepth} score {} nodes {nodes} nps {nps} time {time_ms} hashfull {hashfull}",
                format_score(*score)
            );
            if !pv.is_empty() {
                line.push_str(" pv");
                for m in *pv {
                    line.push(' ');
                    line.push_str(&m.to_uci(chess960));
                }
            }
            println!("{line}");
        }
        SearchEvent::CurrMove { depth, mv, number } => {
            println!(
                "info depth {depth} currmove {} currmovenumber {number}",
                mv.to_uci(chess960)
            );
        }
    }
}

/// Blocking stdin loop; returns on `quit` or end of input.
pub fn run() {
    attacks::init();
    let mut engine = Engine::new();
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        if !engine.handle(parse_command(&line)) {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_command_applies_moves() {
        let mut engine = Engine::new();
        engine.cmd_position(&[
            "startpos".into(),
            "moves".into(),
            "e2e4".into(),
            "e7e5".into(),
            "g1f3".into(),
        ]);
        assert_eq!(
            engine.pos.to_fen(),
            "rnbqkbnr/pppp1ppp/8/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R b KQkq - 1 2"
        );
    }

    #[test]
    fn malformed_move_stops_processing() {
        let mut engine = Engine::new();
        engine.cmd_position(&[
            "startpos".into(),
            "moves".into(),
            "e2e4".into(),
            "e2e5".into(), // illegal: the pawn already moved
            "e7e5".into(),
        ]);
        // State is left after the last valid move.
        assert_eq!(
            engine.pos.to_fen(),
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1"
        );
    }

    #[test]
    fn fen_position_roundtrips() {
        let mut engine = Engine::new();
        let fen = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
        let mut tokens: Vec<String> = vec!["fen".into()];
        tokens.extend(fen.split(' ').map(String::from));
        engine.cmd_position(&tokens);
        assert_eq!(engine.pos.to_fen(), fen);

        // A bad FEN leaves the previous position untouched.
        engine.cmd_position(&["fen".into(), "garbage".into()]);
        assert_eq!(engine.pos.to_fen(), fen);
    }

    #[test]
    fn score_formatting() {
        use crate::types::{mate_in, mated_in};
        assert_eq!(format_score(123), "cp 123");
        assert_eq!(format_score(mate_in(1)), "mate 1");
        assert_eq!(format_score(mate_in(4)), "mate 2");
        assert_eq!(format_score(mated_in(2)), "mate -1");
    }

    #[test]
    fn castling_tokens_match_variant() {
        let mut engine = Engine::new();
        let fen = "r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1";
        let mut tokens: Vec<String> = vec!["fen".into()];
        tokens.extend(fen.split(' ').map(String::from));
        tokens.push("moves".into());
        tokens.push("e1g1".into());
        engine.cmd_position(&tokens);
        assert!(engine.pos.to_fen().starts_with("r3k2r/8/8/8/8/8/8/R4RK1"));
    }
}
