//! Iterative-deepening principal-variation search.
//!
//! Every worker thread runs the same routine over its own clone of the
//! root position with private history and accumulator state; only the
//! transposition table is shared (Lazy SMP). The main worker is
//! authoritative for the reported best move.

pub mod bench;
pub mod history;
pub mod time;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use once_cell::sync::Lazy;

use crate::movegen::{generate_legal, MovePicker, PickerMode};
use crate::nnue::{network, Evaluator, Network};
use crate::position::Position;
use crate::search::history::{History, PrevMove};
use crate::search::time::TimeManager;
use crate::tt::{value_from_tt, value_to_tt, Bound, TranspositionTable};
use crate::types::{
    mate_in, mated_in, piece_value, Move, MoveList, PieceType, Value, MAX_PLY, VALUE_DRAW,
    VALUE_INFINITE, VALUE_MATE, VALUE_MATED_IN_MAX_PLY, VALUE_MATE_IN_MAX_PLY, VALUE_NONE,
};

/// Helper threads get a deep stack; the search frames are heap-backed but
/// recursion itself is not free.
const WORKER_STACK_SIZE: usize = 16 * 1024 * 1024;

/// Poll the clock every this many nodes.
const POLL_INTERVAL: u64 = 1024;

/// Emit `currmove` lines once a search has run at least this long.
const CURRMOVE_AFTER_MS: u64 = 3000;

/// Reductions indexed by depth and move count.
static LMR: Lazy<[[i8; 64]; 64]> = Lazy::new(|| {
    let mut table = [[0i8; 64]; 64];
    for (depth, row) in table.iter_mut().enumerate().skip(1) {
        for (count, r) in row.iter_mut().enumerate().skip(1) {
            let value = 1.25 + (depth as f64).ln() * (count as f64).ln() / 3.0;
            *r = value.round() as i8;
        }
    }
    table
});

/// Progress reported to the front end.
pub enum SearchEvent<'a> {
    Depth {
        depth: i32,
        seldepth: usize,
        score: Value,
        nodes: u64,
        nps: u64,
        time_ms: u64,
        hashfull: usize,
        pv: &'a [Move],
    },
    CurrMove {
        depth: i32,
        mv: Move,
        number: usize,
    },
}

pub type InfoCallback = Arc<dyn Fn(&SearchEvent) + Send + Sync>;

#[derive(Clone, Debug)]
pub struct SearchResult {
    pub best_move: Move,
    pub score: Value,
    pub depth: i32,
    pub nodes: u64,
    pub pv: Vec<Move>,
}

/// Small node-keyed jitter around zero so the search does not walk into
/// deterministic repetition draws.
#[inline]
fn draw_value(nodes: u64) -> Value {
    VALUE_DRAW + 8 - (nodes & 0xF) as Value
}

struct Frame {
    excluded: Move,
    moved: PrevMove,
    pv: Vec<Move>,
}

impl Frame {
    fn new() -> Self {
        Frame {
            excluded: Move::NONE,
            moved: None,
            pv: Vec::new(),
        }
    }
}

struct Worker<'a> {
    pos: Position,
    nnue: Evaluator,
    history: History,
    net: &'static Network,
    tt: &'a TranspositionTable,
    tm: &'a TimeManager,
    global_nodes: &'a AtomicU64,
    callback: Option<&'a InfoCallback>,

    ss: Vec<Frame>,
    nodes: u64,
    flushed_nodes: u64,
    seldepth: usize,
    ply: usize,
    root_delta: Value,
    root_best: Move,
    root_avg: Value,
    have_avg: bool,
    stopped: bool,
}

/// Run a search over `pos` with `threads` workers. Blocks until the
/// budget expires or [`TimeManager::stop`] is called; helper threads are
/// joined before returning and the main worker's best move is returned.
pub fn search(
    pos: &Position,
    tm: &TimeManager,
    tt: &TranspositionTable,
    threads: usize,
    callback: Option<InfoCallback>,
) -> SearchResult {
    tt.new_search();
    let global_nodes = AtomicU64::new(0);

    // A root without legal moves is decided without evaluating anything.
    let mut root_moves = MoveList::new();
    generate_legal(pos, &mut root_moves);
    if root_moves.is_empty() {
        let score = if pos.in_check() { mated_in(0) } else { VALUE_DRAW };
        return SearchResult {
            best_move: Move::NONE,
            score,
            depth: 0,
            nodes: 0,
            pv: Vec::new(),
        };
    }
    let fallback = root_moves[0];

    let result = thread::scope(|scope| {
        for id in 1..threads.max(1) {
            let worker_pos = pos.clone();
            let global_nodes = &global_nodes;
            thread::Builder::new()
                .name(format!("search-{id}"))
                .stack_size(WORKER_STACK_SIZE)
                .spawn_scoped(scope, move || {
                    let mut worker = Worker::new(worker_pos, tt, tm, global_nodes, None);
                    worker.iterate();
                })
                .expect("failed to spawn search worker");
        }

        let mut main = Worker::new(pos.clone(), tt, tm, &global_nodes, callback.as_ref());
        let result = main.iterate();
        // Helpers observe the flag at their next poll and unwind.
        tm.stop();
        result
    });

    let mut result = result;
    if result.best_move == Move::NONE {
        result.best_move = fallback;
    }
    result.nodes = global_nodes.load(Ordering::Relaxed);
    result
}

impl<'a> Worker<'a> {
    fn new(
        pos: Position,
        tt: &'a TranspositionTable,
        tm: &'a TimeManager,
        global_nodes: &'a AtomicU64,
        callback: Option<&'a InfoCallback>,
    ) -> Self {
        let mut ss = Vec::with_capacity(MAX_PLY + 8);
        for _ in 0..MAX_PLY + 8 {
            ss.push(Frame::new());
        }
        Worker {
            pos,
            nnue: Evaluator::new(),
            history: History::new(),
            net: network(),
            tt,
            tm,
            global_nodes,
            callback,
            ss,
            nodes: 0,
            flushed_nodes: 0,
            seldepth: 0,
            ply: 0,
            root_delta: 2 * VALUE_INFINITE,
            root_best: Move::NONE,
            root_avg: 0,
            have_avg: false,
            stopped: false,
        }
    }

    /// Iterative deepening with aspiration windows.
    fn iterate(&mut self) -> SearchResult {
        self.nnue.reset(&self.pos, self.net);

        let mut committed = SearchResult {
            best_move: Move::NONE,
            score: -VALUE_INFINITE,
            depth: 0,
            nodes: 0,
            pv: Vec::new(),
        };

        let mut depth = 1;
        while depth < MAX_PLY as i32 && self.tm.can_continue(depth, self.total_nodes()) {
            let mut delta = 20 + self.root_avg * self.root_avg / 10_000;
            let (mut alpha, mut beta) = if self.have_avg {
                (
                    (self.root_avg - delta).max(-VALUE_INFINITE),
                    (self.root_avg + delta).min(VALUE_INFINITE),
                )
            } else {
                (-VALUE_INFINITE, VALUE_INFINITE)
            };
            let mut failed_high = 0;

            let score = loop {
                self.root_delta = (beta - alpha).max(1);
                self.seldepth = 0;
                let adjusted = (depth - failed_high).max(1);
                let score = self.alpha_beta::<true>(alpha, beta, adjusted);
                if self.stopped {
                    break score;
                }
                if score <= alpha {
                    // Fail low: drop alpha, pull beta toward the center.
                    beta = (alpha + beta) / 2;
                    alpha = (score - delta).max(-VALUE_INFINITE);
                    failed_high = 0;
                } else if score >= beta {
                    beta = (score + delta).min(VALUE_INFINITE);
                    failed_high += 1;
                } else {
                    break score;
                }
                delta += delta / 2;
            };

            if self.stopped {
                break;
            }

            committed = SearchResult {
                best_move: self.root_best,
                score,
                depth,
                nodes: self.total_nodes(),
                pv: self.ss[0].pv.clone(),
            };
            self.report_depth(&committed);
            depth += 1;
        }

        committed
    }

    fn report_depth(&self, result: &SearchResult) {
        if let Some(cb) = self.callback {
            let time_ms = self.tm.elapsed_ms();
            let nodes = self.total_nodes();
            let nps = nodes * 1000 / time_ms.max(1);
            cb(&SearchEvent::Depth {
                depth: result.depth,
                seldepth: self.seldepth,
                score: result.score,
                nodes,
                nps,
                time_ms,
                hashfull: self.tt.hashfull(),
                pv: &result.pv,
            });
        }
    }

    #[inline]
    fn total_nodes(&self) -> u64 {
        self.global_nodes.load(Ordering::Relaxed) + (self.nodes - self.flushed_nodes)
    }

    /// Count a node; every 1024 the global counter is refreshed and the
    /// clock polled.
    #[inline]
    fn visit_node(&mut self) -> bool {
        self.nodes += 1;
        if self.nodes % POLL_INTERVAL == 0 {
            self.global_nodes
                .fetch_add(self.nodes - self.flushed_nodes, Ordering::Relaxed);
            self.flushed_nodes = self.nodes;
            if self.tm.should_stop(self.global_nodes.load(Ordering::Relaxed)) {
                self.tm.stop();
            }
        }
        if self.tm.is_stopped() {
            self.stopped = true;
        }
        self.stopped
    }

    fn conts(&self, ply: usize) -> [PrevMove; 3] {
        let get = |off: usize| {
            if ply >= off {
                self.ss[ply - off].moved
            } else {
                None
            }
        };
        [get(1), get(2), get(4)]
    }

    fn do_move(&mut self, m: Move) {
        let pc = self.pos.piece_on(m.from()).expect("legal move has a piece");
        self.ss[self.ply].moved = Some((pc, m.to()));
        self.pos.do_move(m);
        self.nnue.push(&self.pos, m);
        self.ply += 1;
        self.tt.prefetch(self.pos.key());
    }

    fn undo_move(&mut self, m: Move) {
        self.ply -= 1;
        self.ss[self.ply].moved = None;
        self.nnue.pop();
        self.pos.undo_move(m);
    }

    fn do_null(&mut self) {
        self.ss[self.ply].moved = None;
        self.pos.do_null();
        self.nnue.push_null();
        self.ply += 1;
    }

    fn undo_null(&mut self) {
        self.ply -= 1;
        self.nnue.pop();
        self.pos.undo_null();
    }

    fn evaluate(&mut self) -> Value {
        let Worker { nnue, pos, net, .. } = self;
        nnue.evaluate(pos, net)
    }

    #[allow(clippy::too_many_lines)]
    fn alpha_beta<const PV: bool>(&mut self, mut alpha: Value, mut beta: Value, depth: i32) -> Value {
        if depth <= 0 || self.ply >= MAX_PLY {
            return self.qsearch::<PV>(alpha, beta);
        }
        if self.visit_node() {
            return beta;
        }

        let ply = self.ply;
        let root = ply == 0;
        let us = self.pos.side_to_move();
        let in_check = self.pos.in_check();
        let excluded = self.ss[ply].excluded;
        self.ss[ply].pv.clear();
        self.seldepth = self.seldepth.max(ply);

        if !root {
            // Steer away from lines that can be dragged into repetition.
            if alpha < VALUE_DRAW && self.pos.has_game_cycled(ply) {
                alpha = draw_value(self.nodes);
                if alpha >= beta {
                    return alpha;
                }
            }
            if self.pos.is_draw(ply) {
                return draw_value(self.nodes);
            }
            // Mate-distance pruning.
            alpha = alpha.max(mated_in(ply));
            beta = beta.min(mate_in(ply + 1));
            if alpha >= beta {
                return alpha;
            }
        }

        if ply + 2 < MAX_PLY {
            self.history.clear_killers(us, ply + 2);
        }

        // Transposition table.
        let key = self.pos.key();
        let rule50 = self.pos.rule50();
        let tt_hit = self.tt.probe(key);
        let mut tt_move = Move::NONE;
        let mut tt_score = VALUE_NONE;
        let mut tt_bound = Bound::None;
        let mut tt_depth = -1;
        let mut tt_eval = VALUE_NONE;
        if let Some(hit) = tt_hit {
            tt_move = hit.mv;
            tt_score = value_from_tt(hit.score, ply, rule50);
            tt_bound = hit.bound;
            tt_depth = hit.depth;
            tt_eval = hit.eval;
        }

        let cutoff_ok = match tt_bound {
            Bound::Exact => true,
            Bound::Lower => tt_score >= beta,
            Bound::Upper => tt_score <= alpha,
            Bound::None => false,
        };
        if !PV
            && excluded == Move::NONE
            && tt_depth >= depth
            && tt_score != VALUE_NONE
            && cutoff_ok
            && rule50 < 90
        {
            return tt_score;
        }

        // Static evaluation and the refined search eval.
        let standpat;
        let mut eval;
        if in_check {
            standpat = -VALUE_MATE + ply as Value;
            eval = standpat;
        } else {
            standpat = if tt_eval != VALUE_NONE && tt_eval.abs() < VALUE_MATE_IN_MAX_PLY {
                tt_eval
            } else {
                self.evaluate()
            };
            eval = standpat;
            // A stored score bounded in the right direction is a better
            // estimate than the raw static eval.
            let refine = match tt_bound {
                Bound::Exact => true,
                Bound::Lower => tt_score > eval,
                Bound::Upper => tt_score < eval,
                Bound::None => false,
            };
            if tt_score != VALUE_NONE && tt_score.abs() < VALUE_MATE_IN_MAX_PLY && refine {
                eval = tt_score;
            }
        }
        self.history.set_eval(us, ply, standpat);
        let improving =
            !in_check && ply >= 2 && standpat > self.history.eval(us, ply - 2);

        // Razoring: hopeless nodes drop straight into quiescence.
        if !PV && !in_check && eval < alpha - 500 - 300 * depth * depth {
            return self.qsearch::<false>(alpha, beta);
        }

        // Reverse futility: a comfortable static margin fails high early.
        if !PV
            && !in_check
            && excluded == Move::NONE
            && depth < 10
            && tt_move == Move::NONE
            && eval.abs() < VALUE_MATE_IN_MAX_PLY
            && beta.abs() < VALUE_MATE_IN_MAX_PLY
            && eval - 100 * depth >= beta
        {
            return beta + (eval - beta) / 3;
        }

        // Null-move pruning with a verification search at high depth.
        if !PV
            && !in_check
            && excluded == Move::NONE
            && self.pos.state().played != Move::NULL
            && eval >= beta
            && beta > -VALUE_MATE_IN_MAX_PLY
            && self.pos.non_pawn_material(us) > 0
        {
            let r = ((eval - beta) / 200).min(6) + depth / 3 + 5;
            self.do_null();
            let null_score = -self.alpha_beta::<false>(-beta, 1 - beta, depth - r);
            self.undo_null();
            if self.stopped {
                return beta;
            }
            if null_score >= beta && null_score < VALUE_MATE_IN_MAX_PLY {
                if depth < 12 {
                    return null_score;
                }
                // Zugzwang guard: confirm without the null move.
                let verified = self.alpha_beta::<false>(beta - 1, beta, depth - r);
                if verified >= beta {
                    return null_score;
                }
            }
        }

        // Internal iterative deepening.
        let mut depth = depth;
        if PV && depth >= 4 && tt_move == Move::NONE {
            depth -= 2;
        }

        let killers = self.history.killers(us, ply);
        let mut picker = MovePicker::new(&self.pos, PickerMode::Search, tt_move, killers);
        let conts = self.conts(ply);

        let mut best_score = -VALUE_INFINITE;
        let mut best_move = Move::NONE;
        let mut move_count = 0usize;

        while let Some(m) = picker.next(&self.pos, &self.history, &conts) {
            if m == excluded {
                continue;
            }
            if !self.pos.is_legal(m) {
                continue;
            }
            move_count += 1;

            if root {
                self.report_currmove(depth, m, move_count);
            }

            let is_quiet = self.pos.is_quiet(m);
            let gives_check = self.pos.gives_check(m);
            let captured = if m.is_en_passant() {
                Some(PieceType::Pawn)
            } else {
                self.pos.piece_on(m.to()).map(|p| p.piece_type())
            };
            let quiet_hist = if is_quiet {
                let pc = self.pos.piece_on(m.from()).expect("legal move has a piece");
                self.history.quiet_score(us, pc, m, &conts)
            } else {
                0
            };

            // Base reduction, widened for narrow windows relative to the
            // root window.
            let lmr_base = LMR[depth.min(63) as usize][move_count.min(63)] as f64;
            let window_adj = 1.5 - (beta - alpha) as f64 / self.root_delta.max(1) as f64;
            let mut reduction = (lmr_base + window_adj).round() as i32;

            // Shallow pruning, never on the first move and never when a
            // mate is already on the board.
            if !root
                && self.pos.non_pawn_material(us) > 0
                && best_score > VALUE_MATED_IN_MAX_PLY
            {
                let threshold = (3 + depth * depth) / (2 - i32::from(improving));
                if move_count as i32 >= threshold {
                    picker.set_skip_quiets();
                }
                if let Some(cap_pt) = captured {
                    if !gives_check {
                        let move_depth = (depth - 1 - reduction).clamp(1, depth);
                        let cap_hist = self
                            .pos
                            .piece_on(m.from())
                            .map_or(0, |pc| self.history.capture_score(pc, m.to(), cap_pt));
                        if standpat
                            + 250
                            + 250 * move_depth
                            + piece_value(cap_pt)
                            + cap_hist / 10
                            <= alpha
                        {
                            continue;
                        }
                    }
                }
            }

            // Singular extension: is the hash move alone above beta?
            let mut extension = 0;
            if !root
                && m == tt_move
                && excluded == Move::NONE
                && depth >= 8
                && tt_bound != Bound::Upper
                && tt_score != VALUE_NONE
                && tt_score.abs() < VALUE_MATE_IN_MAX_PLY
                && tt_depth >= depth - 3
            {
                let singular_beta = tt_score - 2 * depth;
                self.ss[ply].excluded = m;
                let singular_score = self.alpha_beta::<false>(
                    singular_beta - 1,
                    singular_beta,
                    (depth - 1) / 2,
                );
                self.ss[ply].excluded = Move::NONE;

                if singular_score < singular_beta {
                    extension = 1 + i32::from(!PV);
                } else if singular_score >= beta
                    && singular_score.abs() < VALUE_MATE_IN_MAX_PLY
                {
                    // Multicut: several moves beat beta at reduced depth.
                    return singular_score;
                } else if tt_score >= beta {
                    // Siblings look good too; distrust the hash move.
                    extension = -2 - i32::from(!PV);
                }
            }

            let new_depth = depth - 1 + extension;

            reduction += ((eval - alpha).abs() / 400).min(2);
            if m == killers[0] || m == killers[1] {
                reduction -= 1;
            }
            if PV {
                reduction -= 2;
            }
            if improving {
                reduction -= 1;
            }
            if m == tt_move {
                reduction -= 1;
            }
            if is_quiet {
                reduction -= quiet_hist / 10_000;
            }

            picker.record_tried(&self.pos, m);
            self.do_move(m);

            let mut score = -VALUE_INFINITE;
            let mut research_bonus = None;
            if depth >= 2 && move_count > 1 {
                let reduced = (new_depth - reduction).clamp(1, new_depth.max(1) + 1);
                score = -self.alpha_beta::<false>(-alpha - 1, -alpha, reduced);
                if score > alpha && reduced < new_depth {
                    score = -self.alpha_beta::<false>(-alpha - 1, -alpha, new_depth);
                    // Reward or punish the move's continuation according
                    // to whether the re-search confirmed the promotion.
                    research_bonus = Some(if score > alpha {
                        stat_bonus(new_depth)
                    } else {
                        -stat_malus(new_depth)
                    });
                }
            } else if !PV || move_count > 1 {
                score = -self.alpha_beta::<false>(-alpha - 1, -alpha, new_depth);
            }
            if PV && (move_count == 1 || (score > alpha && (root || score < beta))) {
                score = -self.alpha_beta::<true>(-beta, -alpha, new_depth);
            }

            self.undo_move(m);
            if let Some(bonus) = research_bonus {
                self.update_continuations(ply, m, bonus, false);
            }
            if self.stopped {
                return beta;
            }

            if root && (move_count == 1 || score > best_score) {
                if self.have_avg {
                    self.root_avg = (2 * score + self.root_avg) / 3;
                } else {
                    self.root_avg = score;
                    self.have_avg = true;
                }
            }

            if score > best_score {
                best_score = score;
                if score > alpha {
                    best_move = m;
                    if root {
                        self.root_best = m;
                    }
                    if PV {
                        let child_pv = self.ss[ply + 1].pv.clone();
                        let frame = &mut self.ss[ply];
                        frame.pv.clear();
                        frame.pv.push(m);
                        frame.pv.extend(child_pv);
                    }
                    if score >= beta {
                        if excluded == Move::NONE {
                            self.tt.store(
                                key,
                                m,
                                value_to_tt(score, ply),
                                standpat,
                                depth,
                                Bound::Lower,
                                PV,
                            );
                        }
                        self.update_stats(m, depth, &picker, ply, in_check);
                        return score;
                    }
                    alpha = score;
                }
            }
        }

        if move_count == 0 {
            if excluded != Move::NONE {
                return alpha;
            }
            return if in_check {
                mated_in(ply)
            } else {
                VALUE_DRAW
            };
        }

        if excluded == Move::NONE {
            let bound = if PV && best_move != Move::NONE {
                Bound::Exact
            } else {
                Bound::Upper
            };
            self.tt.store(
                key,
                best_move,
                value_to_tt(best_score, ply),
                standpat,
                depth,
                bound,
                PV,
            );
        }
        best_score
    }

    fn qsearch<const PV: bool>(&mut self, mut alpha: Value, beta: Value) -> Value {
        if self.visit_node() {
            return beta;
        }

        let ply = self.ply;
        self.ss[ply].pv.clear();
        self.seldepth = self.seldepth.max(ply);

        if self.pos.is_draw(ply) {
            return draw_value(self.nodes);
        }
        if ply >= MAX_PLY {
            return if self.pos.in_check() {
                VALUE_DRAW
            } else {
                self.evaluate()
            };
        }

        let in_check = self.pos.in_check();
        let qdepth = i32::from(in_check);
        let key = self.pos.key();
        let rule50 = self.pos.rule50();

        let mut tt_move = Move::NONE;
        let mut tt_score = VALUE_NONE;
        let mut tt_bound = Bound::None;
        let mut tt_eval = VALUE_NONE;
        if let Some(hit) = self.tt.probe(key) {
            if hit.depth >= qdepth {
                tt_score = value_from_tt(hit.score, ply, rule50);
                tt_bound = hit.bound;
            }
            tt_move = hit.mv;
            tt_eval = hit.eval;
        }
        let cutoff_ok = match tt_bound {
            Bound::Exact => true,
            Bound::Lower => tt_score >= beta,
            Bound::Upper => tt_score <= alpha,
            Bound::None => false,
        };
        if !PV && tt_score != VALUE_NONE && cutoff_ok {
            return tt_score;
        }

        let mut best_score;
        let standpat;
        if in_check {
            standpat = -VALUE_MATE + ply as Value;
            best_score = -VALUE_INFINITE;
        } else {
            standpat = if tt_eval != VALUE_NONE && tt_eval.abs() < VALUE_MATE_IN_MAX_PLY {
                tt_eval
            } else {
                self.evaluate()
            };
            best_score = standpat;
            if best_score >= beta {
                return best_score;
            }
            if best_score > alpha {
                alpha = best_score;
            }
        }

        let mode = if in_check {
            PickerMode::QSearchCheck
        } else {
            PickerMode::QSearch
        };
        let mut picker = MovePicker::new(&self.pos, mode, tt_move, [Move::NONE; 2]);
        let conts = self.conts(ply);
        let us = self.pos.side_to_move();

        let mut best_move = Move::NONE;
        let mut move_count = 0usize;

        while let Some(m) = picker.next(&self.pos, &self.history, &conts) {
            if !self.pos.is_legal(m) {
                continue;
            }
            move_count += 1;

            let is_capture = self.pos.is_capture(m);

            // Shallow pruning once something playable exists.
            if best_score > VALUE_MATED_IN_MAX_PLY {
                if move_count > 2 {
                    break;
                }
                if is_capture {
                    let cap_pt = if m.is_en_passant() {
                        PieceType::Pawn
                    } else {
                        self.pos
                            .piece_on(m.to())
                            .map_or(PieceType::Pawn, |p| p.piece_type())
                    };
                    if !in_check && alpha >= standpat + piece_value(cap_pt) + 400 {
                        continue;
                    }
                    let see = self.pos.see(m);
                    if see <= alpha - standpat - 400 {
                        continue;
                    }
                    if see < -50 {
                        continue;
                    }
                } else if in_check && self.pos.is_quiet(m) {
                    let pc = self.pos.piece_on(m.from()).expect("legal move has a piece");
                    if self.history.quiet_score(us, pc, m, &conts) <= 2000 {
                        continue;
                    }
                }
            }

            self.do_move(m);
            let score = -self.qsearch::<PV>(-beta, -alpha);
            self.undo_move(m);
            if self.stopped {
                return beta;
            }

            if score > best_score {
                best_score = score;
                if score > alpha {
                    best_move = m;
                    if PV {
                        let child_pv = self.ss[ply + 1].pv.clone();
                        let frame = &mut self.ss[ply];
                        frame.pv.clear();
                        frame.pv.push(m);
                        frame.pv.extend(child_pv);
                    }
                    if score >= beta {
                        self.tt.store(
                            key,
                            m,
                            value_to_tt(score, ply),
                            standpat,
                            qdepth,
                            Bound::Lower,
                            PV,
                        );
                        return score;
                    }
                    alpha = score;
                }
            }
        }

        if in_check && move_count == 0 {
            return mated_in(ply);
        }

        self.tt.store(
            key,
            best_move,
            value_to_tt(best_score, ply),
            standpat,
            qdepth,
            Bound::Upper,
            PV,
        );
        best_score
    }

    /// Beta-cutoff bookkeeping: reward the move that cut, punish the
    /// tried siblings that did not.
    fn update_stats(
        &mut self,
        best: Move,
        depth: i32,
        picker: &MovePicker,
        ply: usize,
        in_check: bool,
    ) {
        let us = self.pos.side_to_move();
        let bonus = stat_bonus(depth);
        let malus = stat_malus(depth);

        if self.pos.is_capture(best) {
            let pc = self.pos.piece_on(best.from()).expect("tried move has a piece");
            let cap = captured_type(&self.pos, best);
            self.history.update_capture(pc, best.to(), cap, bonus);
        } else {
            self.history.set_killer(us, ply, best);
            self.history.update_butterfly(us, best, bonus);
            self.update_continuations(ply, best, bonus, in_check);

            for &m in self.collect_tried(picker, false).iter() {
                if m == best {
                    continue;
                }
                self.history.update_butterfly(us, m, -malus);
                self.update_continuations(ply, m, -malus, in_check);
            }
        }

        for &m in self.collect_tried(picker, true).iter() {
            if m == best {
                continue;
            }
            let pc = self.pos.piece_on(m.from()).expect("tried move has a piece");
            let cap = captured_type(&self.pos, m);
            self.history.update_capture(pc, m.to(), cap, -malus);
        }
    }

    fn collect_tried(&self, picker: &MovePicker, captures: bool) -> MoveList {
        let list = if captures {
            picker.tried_captures()
        } else {
            picker.tried_quiets()
        };
        let mut out = MoveList::new();
        for &m in list {
            out.push(m);
        }
        out
    }

    /// Continuation-history update at the standard ply offsets; only the
    /// immediate ones apply while in check.
    fn update_continuations(&mut self, ply: usize, m: Move, bonus: i32, in_check: bool) {
        let pc = match self.pos.piece_on(m.from()) {
            Some(pc) => pc,
            None => return,
        };
        let offsets: &[usize] = if in_check {
            &[1, 2]
        } else {
            &[1, 2, 3, 4, 6]
        };
        for &off in offsets {
            if ply >= off {
                if let Some(prev) = self.ss[ply - off].moved {
                    self.history.update_continuation(prev, pc, m.to(), bonus);
                }
            }
        }
    }

    fn report_currmove(&self, depth: i32, m: Move, number: usize) {
        if let Some(cb) = self.callback {
            if self.tm.elapsed_ms() >= CURRMOVE_AFTER_MS {
                cb(&SearchEvent::CurrMove {
                    depth,
                    mv: m,
                    number,
                });
            }
        }
    }
}

fn captured_type(pos: &Position, m: Move) -> PieceType {
    if m.is_en_passant() {
        PieceType::Pawn
    } else {
        pos.piece_on(m.to()).map_or(PieceType::Pawn, |p| p.piece_type())
    }
}

#[inline]
fn stat_bonus(depth: i32) -> i32 {
    (300 * depth - 250).min(1_500)
}

#[inline]
fn stat_malus(depth: i32) -> i32 {
    (350 * depth - 200).min(1_700)
}
