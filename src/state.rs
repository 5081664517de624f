// Per-turn game state
//
// Built once from a request payload, validated, then read by every later
// stage. All derived views (both occupancy matrices, the choke map, the edge
// set, the body index and the opponent lookahead) are computed here. The only
// interior mutability is the region memo, which never changes an answer.

use log::debug;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::choke::ChokeMap;
use crate::engine::CarryOver;
use crate::error::StateError;
use crate::grid::{self, free_neighbors, Occupancy, OccupancyMatrix};
use crate::region::Region;
use crate::types::{Coord, MoveRequest};

/// A snake in engine coordinates, head first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snake {
    pub id: String,
    pub body: Vec<Coord>,
    pub health: i32,
    pub is_self: bool,
}

impl Snake {
    pub fn new(id: &str, body: Vec<Coord>, health: i32, is_self: bool) -> Self {
        Snake {
            id: id.to_string(),
            body,
            health,
            is_self,
        }
    }

    pub fn head(&self) -> Coord {
        self.body[0]
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

/// Which occupancy view a query runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatrixKind {
    /// Bodies plus the next cells of every same-or-larger opponent head
    Conservative,
    /// Bodies only
    Dangerous,
}

/// A body segment: snake position in `GameState::snakes` and segment index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyRef {
    pub snake: usize,
    pub index: usize,
}

pub struct GameState {
    width: i32,
    height: i32,
    turn: i32,
    snakes: Vec<Snake>,
    self_index: usize,
    food: Vec<Coord>,
    food_set: HashSet<Coord>,
    occupation: OccupancyMatrix,
    dangerous: OccupancyMatrix,
    choke: ChokeMap,
    edges: HashSet<Coord>,
    body_index: HashMap<Coord, BodyRef>,
    lookahead: HashSet<Coord>,
    sticky: HashSet<Coord>,
    carry: CarryOver,
    pub(crate) region_cache: Mutex<HashMap<(Coord, MatrixKind), Arc<Region>>>,
}

impl GameState {
    /// Validates the payload and derives every per-turn view
    pub fn new(
        width: i32,
        height: i32,
        snakes: Vec<Snake>,
        food: Vec<Coord>,
        turn: i32,
        carry: Option<&CarryOver>,
    ) -> Result<GameState, StateError> {
        if width <= 0 || height <= 0 {
            return Err(StateError::InvalidDimensions { width, height });
        }

        let in_bounds = |c: &Coord| c.x >= 0 && c.y >= 0 && c.x < width && c.y < height;
        let mut ids = HashSet::new();
        for snake in &snakes {
            if !ids.insert(snake.id.as_str()) {
                return Err(StateError::DuplicateSnake(snake.id.clone()));
            }
            if snake.body.is_empty() {
                return Err(StateError::EmptyBody { id: snake.id.clone() });
            }
            if let Some(coord) = snake.body.iter().find(|c| !in_bounds(*c)) {
                return Err(StateError::OutOfBounds {
                    id: snake.id.clone(),
                    coord: *coord,
                });
            }
            // Stacked segments (equal neighbours) are legal right after eating
            for (index, pair) in snake.body.windows(2).enumerate() {
                if pair[0] != pair[1] && !pair[0].is_adjacent(&pair[1]) {
                    return Err(StateError::DisjointBody {
                        id: snake.id.clone(),
                        index: index + 1,
                    });
                }
            }
        }

        let mut selves = snakes.iter().enumerate().filter(|(_, s)| s.is_self);
        let self_index = match (selves.next(), selves.next()) {
            (Some((i, _)), None) => i,
            (Some(_), Some(_)) => return Err(StateError::MultipleSelf),
            (None, _) => return Err(StateError::MissingSelf(String::new())),
        };

        if let Some(bad) = food.iter().find(|c| !in_bounds(*c)) {
            return Err(StateError::FoodOutOfBounds(*bad));
        }
        let mut food = food;
        food.sort();
        food.dedup();
        let food_set: HashSet<Coord> = food.iter().copied().collect();

        let dangerous = Self::literal_occupancy(width, height, &snakes, &food_set);

        let self_len = snakes[self_index].len();
        let mut occupation = dangerous.clone();
        let mut lookahead = HashSet::new();
        for snake in snakes.iter().filter(|s| !s.is_self && s.len() >= self_len) {
            for cell in free_neighbors(snake.head(), &dangerous) {
                occupation.mark(cell);
                lookahead.insert(cell);
            }
        }

        let mut sticky = lookahead.clone();
        for cell in &lookahead {
            sticky.extend(grid::neighbors(*cell, width, height, true));
        }

        let mut body_index = HashMap::new();
        for (snake_idx, snake) in snakes.iter().enumerate() {
            for (index, coord) in snake.body.iter().enumerate() {
                body_index.entry(*coord).or_insert(BodyRef {
                    snake: snake_idx,
                    index,
                });
            }
        }

        let choke = ChokeMap::build(&dangerous);
        let carry = carry.cloned().unwrap_or_default();

        debug!(
            "Turn {}: state {}x{} with {} snakes, {} food, {} lookahead cells",
            turn,
            width,
            height,
            snakes.len(),
            food.len(),
            lookahead.len()
        );

        Ok(GameState {
            width,
            height,
            turn,
            snakes,
            self_index,
            food,
            food_set,
            occupation,
            dangerous,
            choke,
            edges: grid::edge_cells(width, height),
            body_index,
            lookahead,
            sticky,
            carry,
            region_cache: Mutex::new(HashMap::new()),
        })
    }

    /// Builds a state from a wire request, flipping the wire's bottom-left
    /// origin into the engine's top-left frame
    pub fn from_request(
        request: &MoveRequest,
        carry: Option<&CarryOver>,
    ) -> Result<GameState, StateError> {
        let board = &request.board;
        let flip = |c: &Coord| Coord {
            x: c.x,
            y: board.height - 1 - c.y,
        };

        if !board.snakes.iter().any(|s| s.id == request.you.id) {
            return Err(StateError::MissingSelf(request.you.id.clone()));
        }

        let snakes = board
            .snakes
            .iter()
            .map(|s| Snake {
                id: s.id.clone(),
                body: s.body.iter().map(flip).collect(),
                health: s.health,
                is_self: s.id == request.you.id,
            })
            .collect();
        let food = board.food.iter().map(flip).collect();

        GameState::new(board.width, board.height, snakes, food, request.turn, carry)
    }

    /// Bodies minus tails that provably vacate this turn
    fn literal_occupancy(
        width: i32,
        height: i32,
        snakes: &[Snake],
        food: &HashSet<Coord>,
    ) -> OccupancyMatrix {
        let mut matrix = OccupancyMatrix::new(width, height);
        for snake in snakes {
            let may_grow = grid::neighbors(snake.head(), width, height, true)
                .iter()
                .any(|c| food.contains(c));
            let last = snake.len() - 1;
            for (i, coord) in snake.body.iter().enumerate() {
                if i == last && i > 0 && !may_grow {
                    continue;
                }
                matrix.mark(*coord);
            }
        }
        matrix
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn turn(&self) -> i32 {
        self.turn
    }

    pub fn center(&self) -> Coord {
        Coord {
            x: self.width / 2,
            y: self.height / 2,
        }
    }

    pub fn snakes(&self) -> &[Snake] {
        &self.snakes
    }

    pub fn me(&self) -> &Snake {
        &self.snakes[self.self_index]
    }

    pub fn opponents(&self) -> impl Iterator<Item = &Snake> + '_ {
        self.snakes.iter().filter(|s| !s.is_self)
    }

    pub fn food(&self) -> &[Coord] {
        &self.food
    }

    pub fn has_food(&self, coord: Coord) -> bool {
        self.food_set.contains(&coord)
    }

    pub fn matrix(&self, kind: MatrixKind) -> &OccupancyMatrix {
        match kind {
            MatrixKind::Conservative => &self.occupation,
            MatrixKind::Dangerous => &self.dangerous,
        }
    }

    pub fn choke(&self) -> &ChokeMap {
        &self.choke
    }

    pub fn is_edge(&self, coord: Coord) -> bool {
        self.edges.contains(&coord)
    }

    pub fn carry(&self) -> &CarryOver {
        &self.carry
    }

    /// Segment occupying `coord`; stacked cells report the lowest index
    pub fn body_index_of(&self, coord: Coord) -> Option<BodyRef> {
        self.body_index.get(&coord).copied()
    }

    /// Turns until the segment leaves its cell, assuming no growth
    pub fn turns_until_vacated(&self, segment: BodyRef) -> usize {
        self.snakes[segment.snake].len() - segment.index - 1
    }

    /// Cells a same-or-larger opponent head may enter next turn
    pub fn lookahead_cells(&self) -> &HashSet<Coord> {
        &self.lookahead
    }

    /// Lookahead cells and everything one step from them
    pub fn is_sticky(&self, coord: Coord) -> bool {
        self.sticky.contains(&coord)
    }

    /// Free cells around `coord` under the given view
    pub fn free_neighbors(&self, coord: Coord, kind: MatrixKind) -> Vec<Coord> {
        free_neighbors(coord, self.matrix(kind))
    }

    pub fn in_bounds(&self, coord: Coord) -> bool {
        self.occupation.in_bounds(coord)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Battlesnake, Board, Game};

    fn c(x: i32, y: i32) -> Coord {
        Coord::new(x, y)
    }

    fn me(body: Vec<Coord>) -> Snake {
        Snake::new("me", body, 90, true)
    }

    #[test]
    fn test_vacating_tail_is_free() {
        let state = GameState::new(5, 5, vec![me(vec![c(2, 2), c(2, 3), c(2, 4)])], vec![], 0, None)
            .unwrap();
        let m = state.matrix(MatrixKind::Dangerous);
        assert!(m.is_occupied(c(2, 2)));
        assert!(m.is_occupied(c(2, 3)));
        assert!(m.is_free(c(2, 4)));
    }

    #[test]
    fn test_tail_kept_when_food_next_to_head() {
        let state = GameState::new(
            5,
            5,
            vec![me(vec![c(2, 2), c(2, 3), c(2, 4)])],
            vec![c(1, 2)],
            0,
            None,
        )
        .unwrap();
        assert!(state.matrix(MatrixKind::Dangerous).is_occupied(c(2, 4)));
    }

    #[test]
    fn test_stacked_tail_stays_occupied() {
        let state = GameState::new(
            5,
            5,
            vec![me(vec![c(2, 2), c(2, 3), c(2, 3)])],
            vec![],
            0,
            None,
        )
        .unwrap();
        assert!(state.matrix(MatrixKind::Dangerous).is_occupied(c(2, 3)));
        // The stacked cell vacates with the earlier segment
        let seg = state.body_index_of(c(2, 3)).unwrap();
        assert_eq!(seg.index, 1);
        assert_eq!(state.turns_until_vacated(seg), 1);
    }

    #[test]
    fn test_lookahead_only_for_same_or_larger_opponents() {
        let snakes = vec![
            me(vec![c(0, 0), c(0, 1), c(0, 2)]),
            Snake::new("big", vec![c(5, 5), c(5, 6), c(5, 7)], 90, false),
            Snake::new("small", vec![c(2, 8), c(2, 9)], 90, false),
        ];
        let state = GameState::new(11, 11, snakes, vec![], 3, None).unwrap();

        let conservative = state.matrix(MatrixKind::Conservative);
        assert!(conservative.is_occupied(c(5, 4)));
        assert!(conservative.is_occupied(c(4, 5)));
        assert!(conservative.is_occupied(c(6, 5)));
        assert!(conservative.is_free(c(2, 7)));
        assert!(state.matrix(MatrixKind::Dangerous).is_free(c(5, 4)));

        assert_eq!(state.lookahead_cells().len(), 3);
        assert!(state.is_sticky(c(5, 3)));
        assert!(!state.is_sticky(c(2, 6)));
    }

    #[test]
    fn test_rejects_out_of_bounds_segment() {
        let err = GameState::new(5, 5, vec![me(vec![c(4, 4), c(5, 4)])], vec![], 0, None)
            .err()
            .unwrap();
        assert_eq!(
            err,
            StateError::OutOfBounds {
                id: "me".to_string(),
                coord: c(5, 4)
            }
        );
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let snakes = vec![
            me(vec![c(0, 0)]),
            Snake::new("x", vec![c(3, 3)], 90, false),
            Snake::new("x", vec![c(1, 3)], 90, false),
        ];
        let err = GameState::new(5, 5, snakes, vec![], 0, None).err().unwrap();
        assert_eq!(err, StateError::DuplicateSnake("x".to_string()));
    }

    #[test]
    fn test_rejects_disjoint_body_and_bad_dimensions() {
        let err = GameState::new(5, 5, vec![me(vec![c(0, 0), c(2, 0)])], vec![], 0, None)
            .err()
            .unwrap();
        assert!(matches!(err, StateError::DisjointBody { index: 1, .. }));

        let err = GameState::new(0, 5, vec![me(vec![c(0, 0)])], vec![], 0, None)
            .err()
            .unwrap();
        assert!(matches!(err, StateError::InvalidDimensions { .. }));
    }

    #[test]
    fn test_duplicate_food_is_merged() {
        let state = GameState::new(
            5,
            5,
            vec![me(vec![c(0, 0)])],
            vec![c(3, 3), c(3, 3), c(1, 1)],
            0,
            None,
        )
        .unwrap();
        assert_eq!(state.food(), &[c(1, 1), c(3, 3)]);
    }

    #[test]
    fn test_from_request_flips_y() {
        let you = Battlesnake {
            id: "me".to_string(),
            name: "me".to_string(),
            health: 80,
            body: vec![c(1, 0), c(1, 1)],
        };
        let request = MoveRequest {
            game: Game::default(),
            turn: 7,
            board: Board {
                width: 5,
                height: 5,
                food: vec![c(4, 4)],
                snakes: vec![you.clone()],
            },
            you,
        };
        let state = GameState::from_request(&request, None).unwrap();
        assert_eq!(state.me().body, vec![c(1, 4), c(1, 3)]);
        assert_eq!(state.food(), &[c(4, 0)]);
        assert_eq!(state.turn(), 7);
    }

    #[test]
    fn test_from_request_requires_self_on_board() {
        let you = Battlesnake {
            id: "ghost".to_string(),
            name: String::new(),
            health: 80,
            body: vec![c(1, 0)],
        };
        let request = MoveRequest {
            game: Game::default(),
            turn: 0,
            board: Board {
                width: 5,
                height: 5,
                food: vec![],
                snakes: vec![],
            },
            you,
        };
        assert_eq!(
            GameState::from_request(&request, None).err(),
            Some(StateError::MissingSelf("ghost".to_string()))
        );
    }

    #[test]
    fn test_center_and_edges() {
        let state = GameState::new(11, 11, vec![me(vec![c(5, 5)])], vec![], 0, None).unwrap();
        assert_eq!(state.center(), c(5, 5));
        assert!(state.is_edge(c(0, 4)));
        assert!(state.is_edge(c(10, 10)));
        assert!(!state.is_edge(c(1, 1)));
    }
}
