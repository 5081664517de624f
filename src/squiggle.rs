// Space-filling candidates ("squiggles")
//
// A squiggle is a greedy self-avoiding walk through a region that always
// takes the first free direction of a fixed priority order. Eight orders are
// tried, one per rotation and reflection of Up, Down, Left, Right, so the
// walks cover the region in different sweeps. Triage scores every distinct
// walk and returns the best one's first step.

use log::debug;
use std::collections::{HashMap, HashSet};

use crate::config::TriageConfig;
use crate::predict::threat_map;
use crate::region::{Region, WallOwner};
use crate::simple_profiler::ProfileGuard;
use crate::state::{GameState, MatrixKind};
use crate::types::{Coord, Direction};

/// The 8 traversal orders that keep opposite directions paired
pub fn traversal_orders() -> Vec<[Direction; 4]> {
    let mut orders: Vec<[Direction; 4]> = Vec::with_capacity(8);
    let mut base = Direction::all();
    for _ in 0..4 {
        for order in [base, base.map(|d| d.mirror())] {
            if !orders.contains(&order) {
                orders.push(order);
            }
        }
        base = base.map(|d| d.rotate());
    }
    orders
}

/// Greedy walk from `start` inside `region`; `start` itself is not included
pub fn squiggle(start: Coord, region: &Region, order: &[Direction; 4]) -> Vec<Coord> {
    let mut visited: HashSet<Coord> = HashSet::from([start]);
    let mut path = Vec::new();
    let mut cursor = start;
    while let Some(next) = order
        .iter()
        .map(|d| d.apply(&cursor))
        .find(|c| region.contains(c) && !visited.contains(c))
    {
        visited.insert(next);
        path.push(next);
        cursor = next;
    }
    path
}

/// Distinct non-empty squiggles from `start`, in traversal-order sequence
pub fn squiggles_in(start: Coord, region: &Region) -> Vec<Vec<Coord>> {
    let _guard = ProfileGuard::new("squiggle");
    let mut out: Vec<Vec<Coord>> = Vec::new();
    for order in traversal_orders() {
        let path = squiggle(start, region, &order);
        if !path.is_empty() && !out.contains(&path) {
            out.push(path);
        }
    }
    out
}

/// A region is an escape if some body segment on its boundary leaves before
/// a walk of `path_len` moves is over
pub fn is_escape(state: &GameState, boundary: &HashMap<Coord, WallOwner>, path_len: usize) -> bool {
    boundary.values().any(|owner| match owner {
        WallOwner::Body { segment, .. } => state.turns_until_vacated(*segment) < path_len,
        _ => false,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub path: Vec<Coord>,
    pub direction: Direction,
    pub score: f64,
    pub has_food: bool,
    pub escape: bool,
    pub threat: f64,
}

/// Scores one squiggle. `threats` is the summed head distribution of every
/// same-or-larger opponent.
pub fn score_squiggle(
    state: &GameState,
    path: &[Coord],
    kind: MatrixKind,
    weights: &TriageConfig,
    threats: &HashMap<Coord, f64>,
) -> Option<Candidate> {
    let first = *path.first()?;
    let direction = Direction::between(&state.me().head(), &first)?;

    let region = state.region_at(first, kind);
    let boundary = state.region_boundary(&region);
    let has_food = state.region_has_food(&region);
    let escape = is_escape(state, &boundary, path.len());

    // Contact odds on the opening moves plus exposure to reserved cells
    let contact: f64 = path
        .iter()
        .take(weights.lookahead_steps.max(1))
        .filter_map(|c| threats.get(c))
        .sum();
    let exposed = boundary
        .keys()
        .filter(|c| state.lookahead_cells().contains(c))
        .count() as f64;
    let threat = contact + exposed;

    let mut score = path.len() as f64 * weights.weight_length;
    if has_food {
        score += weights.food_bonus;
    }
    score -= threat * weights.threat_penalty;
    if escape {
        score += weights.escape_bonus;
    } else if path.len() < state.me().len() {
        score -= weights.trap_penalty;
    }

    Some(Candidate {
        path: path.to_vec(),
        direction,
        score,
        has_food,
        escape,
        threat,
    })
}

/// Best squiggle from our head, conservative view first; ties keep the
/// earlier candidate
pub fn triage(state: &GameState, weights: &TriageConfig) -> Option<Candidate> {
    let me = state.me();
    let heads: Vec<Coord> = state
        .opponents()
        .filter(|o| o.len() >= me.len())
        .map(|o| o.head())
        .collect();
    let threats = threat_map(&heads, state.matrix(MatrixKind::Dangerous), weights.lookahead_steps);

    for kind in [MatrixKind::Conservative, MatrixKind::Dangerous] {
        let region = state.region_at(me.head(), kind);

        let mut best: Option<Candidate> = None;
        for path in squiggles_in(me.head(), &region) {
            let Some(candidate) = score_squiggle(state, &path, kind, weights, &threats) else {
                continue;
            };
            debug!(
                "Squiggle {:?} len {} score {:.1} (food {}, escape {}, threat {:.2})",
                candidate.direction,
                candidate.path.len(),
                candidate.score,
                candidate.has_food,
                candidate.escape,
                candidate.threat
            );
            if best.as_ref().map_or(true, |b| candidate.score > b.score) {
                best = Some(candidate);
            }
        }
        if best.is_some() {
            return best;
        }
    }
    None
}
