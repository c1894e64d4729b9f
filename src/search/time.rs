//! Per-move time budgeting and the cooperative stop flag.
//!
//! From the clock situation the manager derives two budgets: `optimal`,
//! consulted between iterations, and `maximum`, the hard wall polled
//! inside the search every 1024 nodes. Depth, node and movetime limits
//! are hard caps evaluated directly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::types::Color;

/// Parsed `go` limits, all optional.
#[derive(Clone, Debug, Default)]
pub struct SearchLimits {
    pub depth: Option<i32>,
    pub nodes: Option<u64>,
    pub movetime: Option<u64>,
    pub wtime: Option<u64>,
    pub btime: Option<u64>,
    pub winc: Option<u64>,
    pub binc: Option<u64>,
    pub movestogo: Option<u64>,
    pub infinite: bool,
}

impl SearchLimits {
    #[must_use]
    pub fn depth(depth: i32) -> Self {
        SearchLimits {
            depth: Some(depth),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn use_clock(&self) -> bool {
        !self.infinite
            && self.movetime.is_none()
            && (self.wtime.is_some() || self.btime.is_some())
    }
}

pub struct TimeManager {
    start: Instant,
    limits: SearchLimits,
    /// Soft budget in ms; iteration boundaries respect it.
    optimal: u64,
    /// Hard budget in ms; the in-search poll respects it.
    maximum: u64,
    timed: bool,
    force_stop: AtomicBool,
}

impl TimeManager {
    #[must_use]
    pub fn new(limits: SearchLimits, us: Color, game_ply: usize, overhead_ms: u64) -> Self {
        let mut tm = TimeManager {
            start: Instant::now(),
            optimal: u64::MAX,
            maximum: u64::MAX,
            timed: false,
            force_stop: AtomicBool::new(false),
            limits,
        };

        if let Some(movetime) = tm.limits.movetime {
            let budget = movetime.saturating_sub(overhead_ms).max(1);
            tm.optimal = budget;
            tm.maximum = budget;
            tm.timed = true;
        } else if tm.limits.use_clock() {
            let (time, inc) = match us {
                Color::White => (
                    tm.limits.wtime.unwrap_or(0),
                    tm.limits.winc.unwrap_or(0),
                ),
                Color::Black => (
                    tm.limits.btime.unwrap_or(0),
                    tm.limits.binc.unwrap_or(0),
                ),
            };
            let (optimal, maximum) =
                classical_budget(time, inc, tm.limits.movestogo, game_ply, overhead_ms);
            tm.optimal = optimal;
            tm.maximum = maximum;
            tm.timed = true;
            log::debug!("time budget: optimal {optimal} ms, maximum {maximum} ms");
        }
        tm
    }

    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    /// Cooperative cancellation; observed at the next poll.
    pub fn stop(&self) {
        self.force_stop.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.force_stop.load(Ordering::Relaxed)
    }

    /// Hard-limit poll from inside the tree.
    #[must_use]
    pub fn should_stop(&self, nodes: u64) -> bool {
        if self.is_stopped() {
            return true;
        }
        if let Some(cap) = self.limits.nodes {
            if nodes >= cap {
                return true;
            }
        }
        self.timed && self.elapsed_ms() >= self.maximum
    }

    /// Asked between iterations: is starting depth `next_depth` worth it?
    #[must_use]
    pub fn can_continue(&self, next_depth: i32, nodes: u64) -> bool {
        if self.is_stopped() {
            return false;
        }
        if let Some(depth) = self.limits.depth {
            if next_depth > depth {
                return false;
            }
        }
        if let Some(cap) = self.limits.nodes {
            if nodes >= cap {
                return false;
            }
        }
        !(self.timed && self.elapsed_ms() >= self.optimal)
    }

    #[must_use]
    pub fn optimal_ms(&self) -> u64 {
        self.optimal
    }

    #[must_use]
    pub fn maximum_ms(&self) -> u64 {
        self.maximum
    }
}

/// Budgets for an incremental or moves-to-go time control.
fn classical_budget(
    time: u64,
    inc: u64,
    movestogo: Option<u64>,
    game_ply: usize,
    move_overhead: u64,
) -> (u64, u64) {
    // An increment-free control pays a latency tax on every move.
    let overhead = move_overhead + if inc == 0 { 10 } else { 0 };
    let mut mtg = movestogo.unwrap_or(50).min(50).max(1);
    if time < 1000 && inc < 100 {
        // Nearly flagged: spread the remainder over fewer moves.
        mtg = mtg.min((time / 50).max(2));
    }

    let time_left = (time + inc * mtg)
        .saturating_sub(overhead * mtg)
        .max(1) as f64;
    let time = time.max(1) as f64;
    let ply = game_ply as f64;

    let (optimal_scale, max_scale) = if movestogo.is_none() {
        let log_time = (time_left / 1000.0).max(0.001).log10();
        let opt_constant = (0.0048 + 0.0009 * log_time).clamp(0.0025, 0.009);
        let optimal = (0.01 + ply.sqrt() * opt_constant).min(0.2 * time / time_left);
        let max = (3.5 + 0.75 * log_time.max(0.0) + ply / 10.0).min(6.0);
        (optimal, max)
    } else {
        let optimal = (ply / 500.0 + 0.5 / mtg as f64).min(0.9 * time / time_left);
        let max = (1.5 + 0.1 * mtg as f64).min(6.0);
        (optimal, max)
    };

    let optimal = (time_left * optimal_scale).max(1.0) as u64;
    let maximum = ((0.7 * time - move_overhead as f64).max(1.0))
        .min(max_scale * optimal as f64)
        .max(1.0) as u64;
    (optimal, maximum)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infinite_never_stops_on_time() {
        let tm = TimeManager::new(
            SearchLimits {
                infinite: true,
                ..Default::default()
            },
            Color::White,
            0,
            10,
        );
        assert!(!tm.should_stop(1_000_000));
        assert!(tm.can_continue(60, 1_000_000));
        tm.stop();
        assert!(tm.should_stop(0));
        assert!(!tm.can_continue(1, 0));
    }

    #[test]
    fn depth_limit_is_a_hard_cap() {
        let tm = TimeManager::new(SearchLimits::depth(8), Color::White, 0, 10);
        assert!(tm.can_continue(8, 0));
        assert!(!tm.can_continue(9, 0));
    }

    #[test]
    fn node_limit_is_a_hard_cap() {
        let tm = TimeManager::new(
            SearchLimits {
                nodes: Some(5000),
                ..Default::default()
            },
            Color::White,
            0,
            10,
        );
        assert!(!tm.should_stop(4999));
        assert!(tm.should_stop(5000));
    }

    #[test]
    fn movetime_sets_both_budgets() {
        let tm = TimeManager::new(
            SearchLimits {
                movetime: Some(500),
                ..Default::default()
            },
            Color::White,
            0,
            30,
        );
        assert_eq!(tm.optimal_ms(), 470);
        assert_eq!(tm.maximum_ms(), 470);
    }

    #[test]
    fn classical_budgets_are_sane() {
        // One minute plus increment, opening position.
        let (opt, max) = classical_budget(60_000, 1_000, None, 0, 10);
        assert!(opt >= 100, "optimal {opt} too small");
        assert!(opt <= 20_000, "optimal {opt} too large");
        assert!(max >= opt, "maximum {max} below optimal {opt}");
        assert!(max <= 42_000, "maximum {max} exceeds the 0.7*time cap");

        // Known moves-to-go.
        let (opt, max) = classical_budget(30_000, 0, Some(10), 40, 10);
        assert!(opt >= 500);
        assert!(max >= opt);
        assert!(max <= 21_000);

        // Nearly flagged: never budget more than what is on the clock.
        let (opt, max) = classical_budget(300, 0, None, 60, 10);
        assert!(max <= 300);
        assert!(opt <= max.max(opt));
        assert!(opt >= 1);
    }

    #[test]
    fn deeper_game_gets_longer_optimal() {
        let (early, _) = classical_budget(120_000, 1_000, None, 2, 10);
        let (late, _) = classical_budget(120_000, 1_000, None, 80, 10);
        assert!(late >= early);
    }
}
