// Path search
//
// A* over the 4-connected grid with a Manhattan heuristic. Step costs are
// supplied by the caller and never drop below 1, so the heuristic stays
// admissible. `safe_move_to` wraps the search in the bounded retry protocol:
// a first step that leads into a trap or a sticky cell is blocked and the
// search re-run, at most once per free neighbour of the head.

use log::debug;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::grid::{free_neighbors, Occupancy, Overlay};
use crate::simple_profiler::ProfileGuard;
use crate::state::{GameState, MatrixKind};
use crate::types::{Coord, Direction};

/// Ordered cells from start to target, both included
pub type Path = Vec<Coord>;

/// Per-step cost models for biasing routes without changing reachability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepCost {
    Uniform,
    /// Boundary cells cost `1 + penalty`
    AvoidEdges { penalty: u32 },
    /// Cost grows as the choke value drops, plus an edge surcharge
    OpenSpace { weight: u32, edge_penalty: u32 },
}

impl StepCost {
    pub fn of(&self, state: &GameState, coord: Coord) -> u32 {
        match *self {
            StepCost::Uniform => 1,
            StepCost::AvoidEdges { penalty } => {
                if state.is_edge(coord) {
                    1 + penalty
                } else {
                    1
                }
            }
            StepCost::OpenSpace {
                weight,
                edge_penalty,
            } => {
                let edge = if state.is_edge(coord) { edge_penalty } else { 0 };
                state.choke().open_space_cost(coord, weight) + edge
            }
        }
    }
}

/// A* from `from` to `to`. The target must be free unless it equals the start.
pub fn find_path<O: Occupancy + ?Sized>(
    from: Coord,
    to: Coord,
    occupancy: &O,
    step_cost: &dyn Fn(Coord) -> u32,
) -> Option<Path> {
    let _guard = ProfileGuard::new("astar");

    if from == to {
        return Some(vec![from]);
    }
    if occupancy.is_occupied(to) {
        return None;
    }

    // (f, h, insertion order) keeps expansion order deterministic
    let mut open: BinaryHeap<(Reverse<u32>, Reverse<u32>, Reverse<u32>, Coord)> = BinaryHeap::new();
    let mut best: HashMap<Coord, u32> = HashMap::new();
    let mut came_from: HashMap<Coord, Coord> = HashMap::new();
    let mut closed: HashSet<Coord> = HashSet::new();
    let mut seq = 0u32;

    let h = |c: Coord| c.manhattan(&to) as u32;
    best.insert(from, 0);
    open.push((Reverse(h(from)), Reverse(h(from)), Reverse(seq), from));

    while let Some((_, _, _, cell)) = open.pop() {
        if cell == to {
            let mut path = vec![cell];
            let mut cursor = cell;
            while let Some(prev) = came_from.get(&cursor) {
                path.push(*prev);
                cursor = *prev;
            }
            path.reverse();
            return Some(path);
        }
        if !closed.insert(cell) {
            continue;
        }

        let g = best[&cell];
        for next in free_neighbors(cell, occupancy) {
            if closed.contains(&next) {
                continue;
            }
            let tentative = g + step_cost(next).max(1);
            if best.get(&next).map_or(true, |&known| tentative < known) {
                best.insert(next, tentative);
                came_from.insert(next, cell);
                seq += 1;
                open.push((Reverse(tentative + h(next)), Reverse(h(next)), Reverse(seq), next));
            }
        }
    }

    None
}

/// How a safe move may be planned
#[derive(Debug, Clone, Copy)]
pub struct SafeMoveOptions {
    pub matrix: MatrixKind,
    /// Accept a sticky first step when nothing else reaches the target
    pub tolerate_sticky: bool,
    pub cost: StepCost,
}

impl Default for SafeMoveOptions {
    fn default() -> Self {
        SafeMoveOptions {
            matrix: MatrixKind::Conservative,
            tolerate_sticky: false,
            cost: StepCost::Uniform,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMove {
    pub direction: Direction,
    pub path: Path,
    /// First step is within reach of a same-or-larger head
    pub sticky: bool,
    /// Number of first steps rejected before this one
    pub retries: usize,
}

/// Plans a move from our head toward `target`, rejecting first steps that
/// lead into a region smaller than our body or onto sticky cells
pub fn safe_move_to(state: &GameState, target: Coord, options: SafeMoveOptions) -> Option<PlannedMove> {
    let me = state.me();
    let head = me.head();
    let base = state.matrix(options.matrix);
    let cost = |c: Coord| options.cost.of(state, c);

    let mut blocked: HashSet<Coord> = HashSet::new();
    let mut sticky_fallback: Option<(Path, usize)> = None;
    let candidates = free_neighbors(head, base).len();

    // Every rejection blocks a distinct free neighbour of the head
    for retries in 0..=candidates {
        let overlay = Overlay::new(base, &blocked);
        let path = match find_path(head, target, &overlay, &cost) {
            Some(p) if p.len() >= 2 => p,
            _ => break,
        };
        let step = path[1];

        let room = state.region_at(step, options.matrix).len();
        if room < me.len() {
            debug!(
                "Path to {:?}: step {:?} is a trap ({} cells < {})",
                target,
                step,
                room,
                me.len()
            );
            blocked.insert(step);
            continue;
        }

        if state.is_sticky(step) {
            debug!("Path to {:?}: step {:?} is sticky", target, step);
            if sticky_fallback.is_none() {
                sticky_fallback = Some((path, retries));
            }
            blocked.insert(step);
            continue;
        }

        return planned(head, path, false, retries);
    }

    if options.tolerate_sticky {
        if let Some((path, retries)) = sticky_fallback {
            return planned(head, path, true, retries);
        }
    }
    None
}

fn planned(head: Coord, path: Path, sticky: bool, retries: usize) -> Option<PlannedMove> {
    let direction = Direction::between(&head, &path[1])?;
    Some(PlannedMove {
        direction,
        path,
        sticky,
        retries,
    })
}
