//! Parallel-for over candidate positions with early stop.
//!
//! A scan covers the `span x span` grid of top-left positions for one object.
//! Each row of positions is one rayon task scanned left to right; the shared
//! stop state is checked before every score evaluation. `for_each` joins all
//! tasks before the winner is read.

use crate::config::TieBreak;
use crate::problem::Position;
use rayon::prelude::*;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub trait PositionScan: Send + Sync {
    /// Find a position for which `qualifies` holds, or `None` if no position does.
    fn scan(&self, span: usize, qualifies: &(dyn Fn(Position) -> bool + Sync)) -> Option<Position>;
}

/// Deterministic scan: always returns the topmost, then leftmost, qualifying
/// position.
///
/// The shared state is the smallest qualifying row-major index seen so far.
/// A task stops once its next index cannot beat it.
#[derive(Debug, Default, Clone, Copy)]
pub struct RowMajorScan;

impl PositionScan for RowMajorScan {
    fn scan(&self, span: usize, qualifies: &(dyn Fn(Position) -> bool + Sync)) -> Option<Position> {
        let best = AtomicUsize::new(usize::MAX);

        (0..span).into_par_iter().for_each(|row| {
            let base = row * span;
            for col in 0..span {
                if base + col >= best.load(Ordering::Relaxed) {
                    break;
                }
                if qualifies(Position::new(row, col)) {
                    best.fetch_min(base + col, Ordering::Relaxed);
                    break;
                }
            }
        });

        let index = best.into_inner();
        (index != usize::MAX).then(|| Position::new(index / span, index % span))
    }
}

/// Best-effort racing scan: the first task to flip the found flag owns the
/// result. Which qualifying position wins is scheduling dependent.
#[derive(Debug, Default, Clone, Copy)]
pub struct RacingScan;

impl PositionScan for RacingScan {
    fn scan(&self, span: usize, qualifies: &(dyn Fn(Position) -> bool + Sync)) -> Option<Position> {
        let found = AtomicBool::new(false);
        let winner = OnceLock::new();

        (0..span).into_par_iter().for_each(|row| {
            for col in 0..span {
                if found.load(Ordering::Relaxed) {
                    break;
                }
                let position = Position::new(row, col);
                if qualifies(position) {
                    // Only the task that flips the flag may record a winner.
                    if found
                        .compare_exchange(false, true, Ordering::SeqCst, Ordering::Relaxed)
                        .is_ok()
                    {
                        let _ = winner.set(position);
                    }
                    break;
                }
            }
        });

        winner.into_inner()
    }
}

pub fn scan_for(tie_break: TieBreak) -> Box<dyn PositionScan> {
    match tie_break {
        TieBreak::RowMajor => Box::new(RowMajorScan),
        TieBreak::Racing => Box::new(RacingScan),
    }
}
