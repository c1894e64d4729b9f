//! Staged, lazy move ordering.
//!
//! The picker yields moves one at a time so a beta cutoff early in the
//! list never pays for scoring or sorting the rest. Stage order follows
//! the search's ordering pipeline: hash move, winning captures, killers,
//! quiets above the history threshold, then the leftovers.

use super::{generate, GenType};
use crate::position::Position;
use crate::search::history::{History, PrevMove};
use crate::types::{Move, MoveList, PieceType, ScoredMoveList};

/// Ordering steered by adding this to every scored quiet and every
/// winning capture; bucket membership is recovered from the score alone.
const STEER_BONUS: i32 = 100_000;

/// A quiet whose history score is at or below this is deferred to the
/// bad-quiets stage.
const GOOD_QUIET_THRESHOLD: i32 = -10_000;

/// Construction mode; chooses which stages run.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PickerMode {
    /// Full pipeline for main-search nodes.
    Search,
    /// Captures and queen promotions only.
    QSearch,
    /// Every evasion, captures first; killers are unused.
    QSearchCheck,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Stage {
    TtMove,
    InitCaptures,
    GoodCaptures,
    Killer1,
    Killer2,
    InitQuiets,
    GoodQuiets,
    BadCaptures,
    BadQuiets,
    InitEvasions,
    Evasions,
    Done,
}

pub struct MovePicker {
    mode: PickerMode,
    stage: Stage,
    tt_move: Move,
    killers: [Move; 2],
    captures: ScoredMoveList,
    bad_captures: ScoredMoveList,
    quiets: ScoredMoveList,
    cap_idx: usize,
    bad_idx: usize,
    quiet_idx: usize,
    skip_quiets: bool,
    tried_captures: MoveList,
    tried_quiets: MoveList,
}

impl MovePicker {
    #[must_use]
    pub fn new(pos: &Position, mode: PickerMode, tt_move: Move, killers: [Move; 2]) -> Self {
        let tt_move = if tt_move.is_ok() && pos.is_pseudolegal(tt_move) {
            match mode {
                // Quiet hash moves are useless at quiescence nodes.
                PickerMode::QSearch if !pos.is_noisy(tt_move) => Move::NONE,
                _ => tt_move,
            }
        } else {
            Move::NONE
        };

        // Deduplicate the killer slots against the hash move and each
        // other up front.
        let mut killers = match mode {
            PickerMode::Search => killers,
            _ => [Move::NONE; 2],
        };
        if killers[0] == tt_move {
            killers[0] = Move::NONE;
        }
        if killers[1] == tt_move || killers[1] == killers[0] {
            killers[1] = Move::NONE;
        }

        MovePicker {
            mode,
            stage: Stage::TtMove,
            tt_move,
            killers,
            captures: ScoredMoveList::new(),
            bad_captures: ScoredMoveList::new(),
            quiets: ScoredMoveList::new(),
            cap_idx: 0,
            bad_idx: 0,
            quiet_idx: 0,
            skip_quiets: false,
            tried_captures: MoveList::new(),
            tried_quiets: MoveList::new(),
        }
    }

    /// Late-move movecount pruning kicked in: no further quiet moves will
    /// be yielded.
    pub fn set_skip_quiets(&mut self) {
        self.skip_quiets = true;
    }

    /// Record a move the searcher actually searched, so a later cutoff
    /// can punish the siblings that did not produce it.
    pub fn record_tried(&mut self, pos: &Position, m: Move) {
        if pos.is_capture(m) {
            self.tried_captures.push(m);
        } else {
            self.tried_quiets.push(m);
        }
    }

    #[must_use]
    pub fn tried_captures(&self) -> &MoveList {
        &self.tried_captures
    }

    #[must_use]
    pub fn tried_quiets(&self) -> &MoveList {
        &self.tried_quiets
    }

    /// Yield the next move in ordering priority, or `None` when exhausted.
    /// Yielded moves are pseudo-legal; legality stays with the caller.
    pub fn next(&mut self, pos: &Position, hist: &History, conts: &[PrevMove]) -> Option<Move> {
        loop {
            match self.stage {
                Stage::TtMove => {
                    self.stage = match self.mode {
                        PickerMode::QSearchCheck => Stage::InitEvasions,
                        _ => Stage::InitCaptures,
                    };
                    if self.tt_move.is_ok() {
                        return Some(self.tt_move);
                    }
                }

                Stage::InitCaptures => {
                    self.score_captures(pos, hist);
                    self.stage = Stage::GoodCaptures;
                }

                Stage::GoodCaptures => {
                    if let Some(sm) = self.captures.pick_best(self.cap_idx) {
                        self.cap_idx += 1;
                        if sm.mv == self.tt_move {
                            continue;
                        }
                        return Some(sm.mv);
                    }
                    self.stage = match self.mode {
                        PickerMode::Search => Stage::Killer1,
                        _ => Stage::BadCaptures,
                    };
                }

                Stage::Killer1 => {
                    self.stage = Stage::Killer2;
                    let k = self.killers[0];
                    if !self.skip_quiets
                        && k.is_ok()
                        && pos.is_pseudolegal(k)
                        && pos.is_quiet(k)
                    {
                        return Some(k);
                    }
                }

                Stage::Killer2 => {
                    self.stage = Stage::InitQuiets;
                    let k = self.killers[1];
                    if !self.skip_quiets
                        && k.is_ok()
                        && pos.is_pseudolegal(k)
                        && pos.is_quiet(k)
                    {
                        return Some(k);
                    }
                }

                Stage::InitQuiets => {
                    if !self.skip_quiets {
                        self.score_quiets(pos, hist, conts);
                    }
                    self.stage = Stage::GoodQuiets;
                }

                Stage::GoodQuiets => {
                    if !self.skip_quiets {
                        if let Some(sm) = self.quiets.pick_best(self.quiet_idx) {
                            if sm.score > STEER_BONUS + GOOD_QUIET_THRESHOLD {
                                self.quiet_idx += 1;
                                if self.is_dup(sm.mv) {
                                    continue;
                                }
                                return Some(sm.mv);
                            }
                        }
                    }
                    self.stage = Stage::BadCaptures;
                }

                Stage::BadCaptures => {
                    if let Some(sm) = self.bad_captures.pick_best(self.bad_idx) {
                        self.bad_idx += 1;
                        if sm.mv == self.tt_move {
                            continue;
                        }
                        return Some(sm.mv);
                    }
                    self.stage = match self.mode {
                        PickerMode::Search => Stage::BadQuiets,
                        _ => Stage::Done,
                    };
                }

                Stage::BadQuiets => {
                    if !self.skip_quiets {
                        if let Some(sm) = self.quiets.pick_best(self.quiet_idx) {
                            self.quiet_idx += 1;
                            if self.is_dup(sm.mv) {
                                continue;
                            }
                            return Some(sm.mv);
                        }
                    }
                    self.stage = Stage::Done;
                }

                Stage::InitEvasions => {
                    self.score_evasions(pos, hist, conts);
                    self.stage = Stage::Evasions;
                }

                Stage::Evasions => {
                    if let Some(sm) = self.quiets.pick_best(self.quiet_idx) {
                        self.quiet_idx += 1;
                        if sm.mv == self.tt_move {
                            continue;
                        }
                        return Some(sm.mv);
                    }
                    self.stage = Stage::Done;
                }

                Stage::Done => return None,
            }
        }
    }

    fn is_dup(&self, m: Move) -> bool {
        m == self.tt_move || m == self.killers[0] || m == self.killers[1]
    }

    fn score_captures(&mut self, pos: &Position, hist: &History) {
        let mut list = MoveList::new();
        generate(pos, GenType::Captures, &mut list);
        for &m in &list {
            let see = pos.see(m);
            let pc = pos.piece_on(m.from()).expect("generated move has a piece");
            let captured = if m.is_en_passant() {
                PieceType::Pawn
            } else {
                pos.piece_on(m.to())
                    .map_or(PieceType::Pawn, |p| p.piece_type())
            };
            let score = see + hist.capture_score(pc, m.to(), captured);
            if see >= 0 {
                self.captures.push(m, score + STEER_BONUS);
            } else {
                self.bad_captures.push(m, score);
            }
        }
    }

    fn score_quiets(&mut self, pos: &Position, hist: &History, conts: &[PrevMove]) {
        let mut list = MoveList::new();
        generate(pos, GenType::Quiets, &mut list);
        let us = pos.side_to_move();
        for &m in &list {
            let pc = pos.piece_on(m.from()).expect("generated move has a piece");
            let score = STEER_BONUS + hist.quiet_score(us, pc, m, conts);
            self.quiets.push(m, score);
        }
    }

    fn score_evasions(&mut self, pos: &Position, hist: &History, conts: &[PrevMove]) {
        let mut list = MoveList::new();
        generate(pos, GenType::Evasions, &mut list);
        let us = pos.side_to_move();
        for &m in &list {
            let pc = pos.piece_on(m.from()).expect("generated move has a piece");
            let score = if pos.is_capture(m) {
                let captured = if m.is_en_passant() {
                    PieceType::Pawn
                } else {
                    pos.piece_on(m.to())
                        .map_or(PieceType::Pawn, |p| p.piece_type())
                };
                STEER_BONUS + crate::types::piece_value(captured)
                    - pc.piece_type() as i32
            } else {
                hist.quiet_score(us, pc, m, conts)
            };
            self.quiets.push(m, score);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movegen::generate_legal;
    use crate::search::history::History;

    fn drain(pos: &Position, mode: PickerMode, tt: Move) -> Vec<Move> {
        let hist = History::new();
        let mut picker = MovePicker::new(pos, mode, tt, [Move::NONE; 2]);
        let mut out = Vec::new();
        while let Some(m) = picker.next(pos, &hist, &[]) {
            out.push(m);
        }
        out
    }

    #[test]
    fn yields_every_legal_move_exactly_once() {
        let pos = Position::from_fen(
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            false,
        )
        .unwrap();
        let yielded = drain(&pos, PickerMode::Search, Move::NONE);
        let mut legal = MoveList::new();
        generate_legal(&pos, &mut legal);
        for &m in &legal {
            assert_eq!(
                yielded.iter().filter(|&&y| y == m).count(),
                1,
                "move {m} yielded wrong number of times"
            );
        }
    }

    #[test]
    fn tt_move_comes_first_and_is_not_repeated() {
        let pos = Position::startpos();
        let tt = Move::new(Square::make(4, 1), Square::make(4, 3));
        let yielded = drain(&pos, PickerMode::Search, tt);
        assert_eq!(yielded[0], tt);
        assert_eq!(yielded.iter().filter(|&&m| m == tt).count(), 1);
    }

    use crate::types::Square;

    #[test]
    fn winning_captures_come_before_losing_ones() {
        // Queen can take a defended pawn (losing) or a hanging rook
        // (winning).
        let pos =
            Position::from_fen("4k3/3p4/2p4r/8/8/8/3Q4/4K3 w - - 0 1", false).unwrap();
        let yielded = drain(&pos, PickerMode::QSearch, Move::NONE);
        let rook_cap = Move::new(Square::make(3, 1), Square::make(7, 5));
        let pawn_cap = Move::new(Square::make(3, 1), Square::make(3, 6));
        let rook_at = yielded.iter().position(|&m| m == rook_cap).unwrap();
        let pawn_at = yielded.iter().position(|&m| m == pawn_cap).unwrap();
        assert!(rook_at < pawn_at);
    }

    #[test]
    fn qsearch_yields_only_noisy_moves() {
        let pos = Position::from_fen(
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            false,
        )
        .unwrap();
        for m in drain(&pos, PickerMode::QSearch, Move::NONE) {
            assert!(pos.is_noisy(m), "{m} is not noisy");
        }
    }

    #[test]
    fn skip_quiets_suppresses_quiet_moves() {
        let pos = Position::startpos();
        let hist = History::new();
        let mut picker = MovePicker::new(&pos, PickerMode::Search, Move::NONE, [Move::NONE; 2]);
        picker.set_skip_quiets();
        let mut count = 0;
        while let Some(m) = picker.next(&pos, &hist, &[]) {
            assert!(pos.is_noisy(m));
            count += 1;
        }
        // Startpos has no captures at all.
        assert_eq!(count, 0);
    }

    #[test]
    fn evasion_mode_covers_all_check_answers() {
        let pos =
            Position::from_fen("4r2k/8/8/8/8/8/8/R2NK3 w - - 0 1", false).unwrap();
        assert!(pos.in_check());
        let yielded = drain(&pos, PickerMode::QSearchCheck, Move::NONE);
        let mut legal = MoveList::new();
        generate_legal(&pos, &mut legal);
        for &m in &legal {
            assert!(yielded.contains(&m), "missing evasion {m}");
        }
    }
}
