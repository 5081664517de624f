//! Simple profiling using thread-local accumulators
//!
//! Lightweight timing of the engine's hot spots without changing function
//! signatures. Enable with environment variable: SNAKE_PROFILE=1

use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

const CATEGORIES: [&str; 6] = ["region", "choke", "astar", "squiggle", "pipeline", "state"];

thread_local! {
    static TIMES: RefCell<[u64; 6]> = const { RefCell::new([0; 6]) };
    static COUNTS: RefCell<[u64; 6]> = const { RefCell::new([0; 6]) };
}

// Global aggregators
static GLOBAL_TIMES: [AtomicU64; 6] = [
    AtomicU64::new(0),
    AtomicU64::new(0),
    AtomicU64::new(0),
    AtomicU64::new(0),
    AtomicU64::new(0),
    AtomicU64::new(0),
];
static GLOBAL_COUNTS: [AtomicU64; 6] = [
    AtomicU64::new(0),
    AtomicU64::new(0),
    AtomicU64::new(0),
    AtomicU64::new(0),
    AtomicU64::new(0),
    AtomicU64::new(0),
];

#[inline]
pub fn is_profiling_enabled() -> bool {
    std::env::var("SNAKE_PROFILE").is_ok()
}

fn slot(category: &str) -> Option<usize> {
    CATEGORIES.iter().position(|c| *c == category)
}

pub struct ProfileGuard {
    start: Instant,
    slot: usize,
}

impl ProfileGuard {
    /// Starts timing `category`; `None` when profiling is off or the category
    /// is unknown
    pub fn new(category: &'static str) -> Option<Self> {
        if !is_profiling_enabled() {
            return None;
        }
        slot(category).map(|slot| ProfileGuard {
            start: Instant::now(),
            slot,
        })
    }
}

impl Drop for ProfileGuard {
    fn drop(&mut self) {
        let elapsed_ns = self.start.elapsed().as_nanos() as u64;
        TIMES.with(|t| t.borrow_mut()[self.slot] += elapsed_ns);
        COUNTS.with(|c| c.borrow_mut()[self.slot] += 1);
    }
}

/// Moves this thread's counters into the global totals
pub fn merge_thread_local() {
    if !is_profiling_enabled() {
        return;
    }

    TIMES.with(|t| {
        for (i, v) in t.borrow_mut().iter_mut().enumerate() {
            GLOBAL_TIMES[i].fetch_add(*v, Ordering::Relaxed);
            *v = 0;
        }
    });
    COUNTS.with(|c| {
        for (i, v) in c.borrow_mut().iter_mut().enumerate() {
            GLOBAL_COUNTS[i].fetch_add(*v, Ordering::Relaxed);
            *v = 0;
        }
    });
}

/// (category, total ns, calls) for every category
pub fn snapshot() -> Vec<(&'static str, u64, u64)> {
    CATEGORIES
        .iter()
        .enumerate()
        .map(|(i, name)| {
            (
                *name,
                GLOBAL_TIMES[i].load(Ordering::Relaxed),
                GLOBAL_COUNTS[i].load(Ordering::Relaxed),
            )
        })
        .collect()
}

pub fn print_report(total_time_ms: u64) {
    if !is_profiling_enabled() {
        return;
    }

    let total_ns = total_time_ms * 1_000_000;

    eprintln!("\n═══════════════════════════════════════════════════════════");
    eprintln!("                 PERFORMANCE PROFILE");
    eprintln!("═══════════════════════════════════════════════════════════");
    eprintln!("Total Time: {}ms\n", total_time_ms);

    for (name, time, count) in snapshot() {
        let ms = time as f64 / 1_000_000.0;
        let pct = if total_ns > 0 { 100.0 * time as f64 / total_ns as f64 } else { 0.0 };
        let avg_us = if count > 0 { time as f64 / (count * 1000) as f64 } else { 0.0 };
        eprintln!(
            "  {:<10} {:>9.2}ms ({:>5.1}%) - {} calls, {:.2}µs avg",
            name, ms, pct, count, avg_us
        );
    }

    eprintln!("═══════════════════════════════════════════════════════════\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_categories_have_slots() {
        for name in CATEGORIES {
            assert!(slot(name).is_some());
        }
        assert!(slot("alpha_beta").is_none());
    }

    #[test]
    fn test_snapshot_lists_every_category() {
        let names: Vec<&str> = snapshot().into_iter().map(|(n, _, _)| n).collect();
        assert_eq!(names, CATEGORIES.to_vec());
    }
}
