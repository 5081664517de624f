// Region (flood-fill) analysis
//
// A region is the set of free cells reachable from a seed without crossing an
// occupied cell. A free seed belongs to its own region; an occupied seed
// (typically a head) yields the union of its free neighbours' regions.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use crate::grid::{free_neighbors, Occupancy};
use crate::simple_profiler::ProfileGuard;
use crate::state::{BodyRef, GameState, MatrixKind};
use crate::types::{Coord, Direction};

pub type Region = HashSet<Coord>;

/// What seals a region on the far side of a boundary cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WallOwner {
    /// A snake segment, by snake id
    Body { id: String, segment: BodyRef },
    /// The off-board wall
    Edge,
    /// Blocked without a body: a lookahead cell or an overlay cell
    Reserved,
}

/// Breadth-first flood fill from `seed`
pub fn flood_fill<O: Occupancy + ?Sized>(seed: Coord, occupancy: &O) -> Region {
    let _guard = ProfileGuard::new("region");
    let mut region = Region::new();
    let mut frontier = VecDeque::new();

    if occupancy.is_free(seed) {
        region.insert(seed);
        frontier.push_back(seed);
    } else {
        for n in free_neighbors(seed, occupancy) {
            if region.insert(n) {
                frontier.push_back(n);
            }
        }
    }

    while let Some(cell) = frontier.pop_front() {
        for n in free_neighbors(cell, occupancy) {
            if region.insert(n) {
                frontier.push_back(n);
            }
        }
    }
    region
}

impl GameState {
    /// Memoized region under one of the two base views
    pub fn region_at(&self, seed: Coord, kind: MatrixKind) -> Arc<Region> {
        if let Some(hit) = self.region_cache.lock().get(&(seed, kind)) {
            return hit.clone();
        }

        let matrix = self.matrix(kind);
        let region = Arc::new(flood_fill(seed, matrix));

        let mut cache = self.region_cache.lock();
        if matrix.is_free(seed) {
            // Every member of a free region shares it
            for cell in region.iter() {
                cache.insert((*cell, kind), region.clone());
            }
        } else {
            cache.insert((seed, kind), region.clone());
        }
        region
    }

    /// Region under an arbitrary view (usually an overlay); not memoized
    pub fn region_in<O: Occupancy + ?Sized>(&self, seed: Coord, occupancy: &O) -> Region {
        flood_fill(seed, occupancy)
    }

    /// Owner of every cell adjacent to but outside `region`, including
    /// off-board cells
    pub fn region_boundary(&self, region: &Region) -> HashMap<Coord, WallOwner> {
        let mut boundary = HashMap::new();
        for cell in region {
            for dir in Direction::all() {
                let next = dir.apply(cell);
                if region.contains(&next) || boundary.contains_key(&next) {
                    continue;
                }
                let owner = if !self.in_bounds(next) {
                    WallOwner::Edge
                } else if let Some(segment) = self.body_index_of(next) {
                    WallOwner::Body {
                        id: self.snakes()[segment.snake].id.clone(),
                        segment,
                    }
                } else {
                    WallOwner::Reserved
                };
                boundary.insert(next, owner);
            }
        }
        boundary
    }

    pub fn region_has_food(&self, region: &Region) -> bool {
        self.food().iter().any(|f| region.contains(f))
    }
}
