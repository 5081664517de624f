// Distance/choke map
//
// Multi-source BFS seeded from every occupied cell (depth 0) and every free
// boundary cell (depth 1, one step from the off-board wall). Each free cell
// ends up with its distance to the nearest obstacle: larger is more open.

use std::collections::{BTreeMap, HashSet, VecDeque};

use crate::grid::{self, Occupancy, OccupancyMatrix};
use crate::simple_profiler::ProfileGuard;
use crate::types::Coord;

#[derive(Debug, Clone)]
pub struct ChokeMap {
    width: i32,
    height: i32,
    values: Vec<u32>,
    by_value: BTreeMap<u32, Vec<Coord>>,
}

impl ChokeMap {
    pub fn build(obstacles: &OccupancyMatrix) -> Self {
        let _guard = ProfileGuard::new("choke");
        let width = obstacles.width();
        let height = obstacles.height();
        let mut values = vec![u32::MAX; (width * height) as usize];
        let idx = |c: Coord| (c.y * width + c.x) as usize;

        let mut frontier = VecDeque::new();
        for cell in obstacles.occupied_cells() {
            values[idx(cell)] = 0;
            frontier.push_back(cell);
        }
        // Seeds must enter in depth order for the BFS to stay monotone
        let mut edges: Vec<Coord> = grid::edge_cells(width, height)
            .into_iter()
            .filter(|c| obstacles.is_free(*c))
            .collect();
        edges.sort();
        for cell in edges {
            values[idx(cell)] = 1;
            frontier.push_back(cell);
        }

        while let Some(cell) = frontier.pop_front() {
            let depth = values[idx(cell)];
            for next in grid::free_neighbors(cell, obstacles) {
                if values[idx(next)] == u32::MAX {
                    values[idx(next)] = depth + 1;
                    frontier.push_back(next);
                }
            }
        }

        let mut by_value: BTreeMap<u32, Vec<Coord>> = BTreeMap::new();
        for y in 0..height {
            for x in 0..width {
                let c = Coord { x, y };
                if obstacles.is_free(c) {
                    by_value.entry(values[idx(c)]).or_default().push(c);
                }
            }
        }

        ChokeMap {
            width,
            height,
            values,
            by_value,
        }
    }

    /// Openness of a cell; obstacles and off-board cells are 0
    pub fn value(&self, coord: Coord) -> u32 {
        if coord.x < 0 || coord.y < 0 || coord.x >= self.width || coord.y >= self.height {
            return 0;
        }
        self.values[(coord.y * self.width + coord.x) as usize]
    }

    pub fn max_value(&self) -> u32 {
        self.by_value.keys().next_back().copied().unwrap_or(0)
    }

    /// Free cells grouped by choke value, ascending
    pub fn choke_value_map(&self) -> &BTreeMap<u32, Vec<Coord>> {
        &self.by_value
    }

    /// Most open point inside `region`, preferring cells closer to `anchor`
    /// and then the smaller coordinate
    pub fn most_open_in(&self, region: &HashSet<Coord>, anchor: Coord) -> Option<Coord> {
        self.choke_value_map()
            .values()
            .rev()
            .find_map(|points| {
                points
                    .iter()
                    .filter(|c| region.contains(*c))
                    .min_by_key(|c| (c.manhattan(&anchor), **c))
            })
            .copied()
    }

    /// Step cost that grows as space closes in; never below 1
    pub fn open_space_cost(&self, coord: Coord, weight: u32) -> u32 {
        1 + weight * self.max_value().saturating_sub(self.value(coord))
    }
}
