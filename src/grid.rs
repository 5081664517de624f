// Grid & occupancy model
//
// An occupancy view answers one question: can a head enter this cell next?
// Base views are flat bit matrices built once per turn. Retries and attack
// simulations layer a small set of extra blocked cells on top of a base view
// (`Overlay`) instead of copying the matrix.

use std::collections::HashSet;

use crate::types::{Coord, Direction};

/// Read-only occupancy query shared by matrices and overlays
pub trait Occupancy {
    fn width(&self) -> i32;
    fn height(&self) -> i32;

    /// Off-board cells always count as occupied
    fn is_occupied(&self, coord: Coord) -> bool;

    fn in_bounds(&self, coord: Coord) -> bool {
        coord.x >= 0 && coord.y >= 0 && coord.x < self.width() && coord.y < self.height()
    }

    fn is_free(&self, coord: Coord) -> bool {
        !self.is_occupied(coord)
    }
}

/// Row-major boolean matrix of occupied cells
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupancyMatrix {
    width: i32,
    height: i32,
    cells: Vec<bool>,
}

impl OccupancyMatrix {
    pub fn new(width: i32, height: i32) -> Self {
        OccupancyMatrix {
            width,
            height,
            cells: vec![false; (width.max(0) * height.max(0)) as usize],
        }
    }

    fn index(&self, coord: Coord) -> Option<usize> {
        if self.in_bounds(coord) {
            Some((coord.y * self.width + coord.x) as usize)
        } else {
            None
        }
    }

    /// Marks a cell occupied; off-board cells are ignored
    pub fn mark(&mut self, coord: Coord) {
        if let Some(i) = self.index(coord) {
            self.cells[i] = true;
        }
    }

    pub fn free_count(&self) -> usize {
        self.cells.iter().filter(|&&c| !c).count()
    }

    /// All occupied on-board cells, row-major
    pub fn occupied_cells(&self) -> impl Iterator<Item = Coord> + '_ {
        self.cells.iter().enumerate().filter(|(_, c)| **c).map(move |(i, _)| Coord {
            x: i as i32 % self.width,
            y: i as i32 / self.width,
        })
    }
}

impl Occupancy for OccupancyMatrix {
    fn width(&self) -> i32 {
        self.width
    }

    fn height(&self) -> i32 {
        self.height
    }

    fn is_occupied(&self, coord: Coord) -> bool {
        match self.index(coord) {
            Some(i) => self.cells[i],
            None => true,
        }
    }
}

/// Immutable base view plus extra blocked cells
pub struct Overlay<'a, O: Occupancy + ?Sized> {
    base: &'a O,
    blocked: &'a HashSet<Coord>,
}

impl<'a, O: Occupancy + ?Sized> Overlay<'a, O> {
    pub fn new(base: &'a O, blocked: &'a HashSet<Coord>) -> Self {
        Overlay { base, blocked }
    }
}

impl<'a, O: Occupancy + ?Sized> Occupancy for Overlay<'a, O> {
    fn width(&self) -> i32 {
        self.base.width()
    }

    fn height(&self) -> i32 {
        self.base.height()
    }

    fn is_occupied(&self, coord: Coord) -> bool {
        self.blocked.contains(&coord) || self.base.is_occupied(coord)
    }
}

/// Adjacent cells in direction order. With `trim_to_board` off-board cells are
/// dropped, otherwise all four are returned.
pub fn neighbors(coord: Coord, width: i32, height: i32, trim_to_board: bool) -> Vec<Coord> {
    Direction::all()
        .iter()
        .map(|d| d.apply(&coord))
        .filter(|c| !trim_to_board || (c.x >= 0 && c.y >= 0 && c.x < width && c.y < height))
        .collect()
}

/// On-board neighbours not occupied in `occupancy`
pub fn free_neighbors<O: Occupancy + ?Sized>(coord: Coord, occupancy: &O) -> Vec<Coord> {
    Direction::all()
        .iter()
        .map(|d| d.apply(&coord))
        .filter(|c| occupancy.is_free(*c))
        .collect()
}

/// True for cells on the outer ring of the board
pub fn is_edge(coord: Coord, width: i32, height: i32) -> bool {
    coord.x == 0 || coord.y == 0 || coord.x == width - 1 || coord.y == height - 1
}

/// Every boundary cell of a board, row-major
pub fn edge_cells(width: i32, height: i32) -> HashSet<Coord> {
    let mut edges = HashSet::new();
    for y in 0..height {
        for x in 0..width {
            let c = Coord { x, y };
            if is_edge(c, width, height) {
                edges.insert(c);
            }
        }
    }
    edges
}
