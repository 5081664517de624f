// Short-horizon movement prediction
//
// Where a head can be after a few moves, as a probability distribution over
// cells. Each step splits a cell's mass evenly across its free neighbours;
// mass at a cell with no exit is dropped.

use std::collections::HashMap;

use crate::grid::{free_neighbors, Occupancy};
use crate::types::Coord;

/// Body after the head moves through `moves` (oldest first), assuming no growth
pub fn position_after_moves(body: &[Coord], moves: &[Coord]) -> Vec<Coord> {
    moves
        .iter()
        .rev()
        .chain(body.iter())
        .take(body.len())
        .copied()
        .collect()
}

/// Probability of a head at `start` standing on each cell after exactly
/// `steps` uniformly random moves over free cells
pub fn reach_probabilities<O: Occupancy + ?Sized>(
    start: Coord,
    occupancy: &O,
    steps: usize,
) -> HashMap<Coord, f64> {
    let mut current: HashMap<Coord, f64> = HashMap::from([(start, 1.0)]);
    for _ in 0..steps {
        let mut next: HashMap<Coord, f64> = HashMap::new();
        for (cell, mass) in &current {
            let exits = free_neighbors(*cell, occupancy);
            if exits.is_empty() {
                continue;
            }
            let share = mass / exits.len() as f64;
            for exit in exits {
                *next.entry(exit).or_insert(0.0) += share;
            }
        }
        current = next;
    }
    current
}

/// Summed reach probabilities over the first `steps` moves
pub fn threat_map<O: Occupancy + ?Sized>(
    heads: &[Coord],
    occupancy: &O,
    steps: usize,
) -> HashMap<Coord, f64> {
    let mut total: HashMap<Coord, f64> = HashMap::new();
    for head in heads {
        for n in 1..=steps {
            for (cell, p) in reach_probabilities(*head, occupancy, n) {
                *total.entry(cell).or_insert(0.0) += p;
            }
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::OccupancyMatrix;

    fn c(x: i32, y: i32) -> Coord {
        Coord::new(x, y)
    }

    #[test]
    fn test_body_after_one_move() {
        let body = [c(1, 1), c(2, 1), c(3, 1)];
        assert_eq!(position_after_moves(&body, &[c(1, 2)]), vec![c(1, 2), c(1, 1), c(2, 1)]);
    }

    #[test]
    fn test_body_after_more_moves_than_length() {
        let body = [c(1, 1), c(2, 1)];
        let moves = [c(1, 2), c(1, 3), c(1, 4)];
        assert_eq!(position_after_moves(&body, &moves), vec![c(1, 4), c(1, 3)]);
    }

    #[test]
    fn test_single_step_splits_evenly() {
        let m = OccupancyMatrix::new(3, 3);
        let dist = reach_probabilities(c(0, 0), &m, 1);
        assert_eq!(dist.len(), 2);
        assert!((dist[&c(1, 0)] - 0.5).abs() < 1e-9);
        assert!((dist[&c(0, 1)] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_mass_is_conserved_on_open_board() {
        let m = OccupancyMatrix::new(7, 7);
        let dist = reach_probabilities(c(3, 3), &m, 3);
        let total: f64 = dist.values().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_dead_end_drops_mass() {
        let mut m = OccupancyMatrix::new(3, 1);
        m.mark(c(2, 0));
        // From (0,0) the only exit is (1,0); from there only back to (0,0)
        let dist = reach_probabilities(c(0, 0), &m, 2);
        assert!((dist[&c(0, 0)] - 1.0).abs() < 1e-9);

        m.mark(c(0, 0));
        let stuck = reach_probabilities(c(1, 0), &m, 1);
        assert!(stuck.is_empty());
    }

    #[test]
    fn test_threat_map_accumulates_steps() {
        let m = OccupancyMatrix::new(5, 5);
        let map = threat_map(&[c(2, 2)], &m, 2);
        assert!((map[&c(2, 1)] - 0.25).abs() < 1e-9);
        // Reachable only on the second move
        assert!(map[&c(2, 0)] > 0.0);
        assert!(!map.contains_key(&c(0, 0)));
    }
}
