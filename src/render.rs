// ASCII boards
//
// `.` empty, `*` food, `S`/`s` our head and body, any other letter an
// opponent (uppercase head, lowercase body). Body order is recovered by
// walking same-letter cells from the head in Up, Down, Left, Right order.
// Used by tests and by the replay tool to print positions.

use std::collections::{HashMap, HashSet};

use crate::error::StateError;
use crate::state::{GameState, Snake};
use crate::types::{Battlesnake, Board, Coord, Direction, Game, MoveRequest};

pub const SELF_ID: &str = "you";

/// A parsed board before validation
#[derive(Debug, Clone)]
pub struct Sketch {
    pub width: i32,
    pub height: i32,
    pub snakes: Vec<Snake>,
    pub food: Vec<Coord>,
}

impl Sketch {
    pub fn parse(text: &str) -> Result<Sketch, String> {
        let rows: Vec<Vec<char>> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(|l| l.chars().collect())
            .collect();

        let height = rows.len() as i32;
        let width = rows.first().map_or(0, |r| r.len()) as i32;
        if height == 0 || width == 0 {
            return Err("empty board".to_string());
        }
        if let Some(y) = rows.iter().position(|r| r.len() as i32 != width) {
            return Err(format!("row {} has {} cells, expected {}", y, rows[y].len(), width));
        }

        let mut cells: HashMap<Coord, char> = HashMap::new();
        let mut food = Vec::new();
        let mut heads = Vec::new();
        for (y, row) in rows.iter().enumerate() {
            for (x, ch) in row.iter().enumerate() {
                let coord = Coord::new(x as i32, y as i32);
                match ch {
                    '.' => {}
                    '*' => food.push(coord),
                    c if c.is_ascii_alphabetic() => {
                        if c.is_ascii_uppercase() {
                            heads.push((c.to_ascii_lowercase(), coord));
                        }
                        cells.insert(coord, c.to_ascii_lowercase());
                    }
                    other => return Err(format!("unknown cell '{}' at {}", other, coord.key())),
                }
            }
        }

        let mut seen_letters = HashSet::new();
        let mut snakes = Vec::new();
        for (letter, head) in heads {
            if !seen_letters.insert(letter) {
                return Err(format!("two heads for '{}'", letter));
            }
            let body = walk_body(head, letter, &cells);
            let (id, is_self) = if letter == 's' {
                (SELF_ID.to_string(), true)
            } else {
                (letter.to_string(), false)
            };
            snakes.push(Snake::new(&id, body, 100, is_self));
        }

        let claimed: usize = snakes.iter().map(Snake::len).sum();
        if claimed != cells.len() {
            return Err(format!(
                "{} body cells are not connected to a head",
                cells.len() - claimed
            ));
        }

        Ok(Sketch {
            width,
            height,
            snakes,
            food,
        })
    }

    pub fn with_health(mut self, id: &str, health: i32) -> Self {
        for snake in self.snakes.iter_mut().filter(|s| s.id == id) {
            snake.health = health;
        }
        self
    }

    pub fn build(self) -> Result<GameState, StateError> {
        GameState::new(self.width, self.height, self.snakes, self.food, 0, None)
    }

    /// The same position as a wire request, bottom-left origin
    pub fn to_request(&self, turn: i32) -> MoveRequest {
        let flip = |c: &Coord| Coord::new(c.x, self.height - 1 - c.y);
        let wire: Vec<Battlesnake> = self
            .snakes
            .iter()
            .map(|s| Battlesnake {
                id: s.id.clone(),
                name: s.id.clone(),
                health: s.health,
                body: s.body.iter().map(flip).collect(),
            })
            .collect();
        let you = wire
            .iter()
            .find(|s| s.id == SELF_ID)
            .cloned()
            .unwrap_or_else(|| Battlesnake {
                id: SELF_ID.to_string(),
                name: String::new(),
                health: 0,
                body: vec![],
            });

        MoveRequest {
            game: Game {
                id: "sketch".to_string(),
                ..Game::default()
            },
            turn,
            board: Board {
                height: self.height,
                width: self.width,
                food: self.food.iter().map(flip).collect(),
                snakes: wire,
            },
            you,
        }
    }
}

fn walk_body(head: Coord, letter: char, cells: &HashMap<Coord, char>) -> Vec<Coord> {
    let mut body = vec![head];
    let mut visited: HashSet<Coord> = HashSet::from([head]);
    let mut cursor = head;
    while let Some(next) = Direction::all()
        .iter()
        .map(|d| d.apply(&cursor))
        .find(|c| !visited.contains(c) && cells.get(c) == Some(&letter))
    {
        visited.insert(next);
        body.push(next);
        cursor = next;
    }
    body
}

/// Parses a board into a validated state with every snake at full health
///
/// # Panics
/// On malformed boards; intended for tests and fixtures.
pub fn parse_board(text: &str) -> GameState {
    let sketch = match Sketch::parse(text) {
        Ok(s) => s,
        Err(e) => panic!("bad board: {}", e),
    };
    match sketch.build() {
        Ok(state) => state,
        Err(e) => panic!("invalid board: {}", e),
    }
}

/// Draws `state`, marking `highlights` with `+`
pub fn show(state: &GameState, highlights: &[Coord]) -> String {
    let mut letters: HashMap<usize, char> = HashMap::new();
    let mut spare = ('a'..='z').filter(|c| *c != 's');
    for (i, snake) in state.snakes().iter().enumerate() {
        let letter = if snake.is_self {
            's'
        } else {
            match snake.id.chars().next() {
                Some(c) if snake.id.len() == 1 && c.is_ascii_lowercase() && c != 's' => c,
                _ => spare.next().unwrap_or('?'),
            }
        };
        letters.insert(i, letter);
    }

    let marks: HashSet<Coord> = highlights.iter().copied().collect();
    let mut out = String::new();
    for y in 0..state.height() {
        for x in 0..state.width() {
            let coord = Coord::new(x, y);
            let ch = if let Some(seg) = state.body_index_of(coord) {
                let letter = letters.get(&seg.snake).copied().unwrap_or('?');
                if seg.index == 0 {
                    letter.to_ascii_uppercase()
                } else {
                    letter
                }
            } else if marks.contains(&coord) {
                '+'
            } else if state.has_food(coord) {
                '*'
            } else {
                '.'
            };
            out.push(ch);
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_orders_body_from_head() {
        let state = parse_board(
            "
            .....
            .Ss..
            ..s..
            ....*
            ",
        );
        assert_eq!(state.width(), 5);
        assert_eq!(state.height(), 4);
        assert_eq!(
            state.me().body,
            vec![Coord::new(1, 1), Coord::new(2, 1), Coord::new(2, 2)]
        );
        assert_eq!(state.food(), &[Coord::new(4, 3)]);
    }

    #[test]
    fn test_opponents_take_their_letter() {
        let state = parse_board(
            "
            S..
            ...
            bB.
            ",
        );
        let opp: Vec<&Snake> = state.opponents().collect();
        assert_eq!(opp.len(), 1);
        assert_eq!(opp[0].id, "b");
        assert_eq!(opp[0].body, vec![Coord::new(1, 2), Coord::new(0, 2)]);
    }

    #[test]
    fn test_rejects_orphan_body_and_ragged_rows() {
        assert!(Sketch::parse("S..\n..a").is_err());
        assert!(Sketch::parse("S..\n..").is_err());
        assert!(Sketch::parse("S.#").is_err());
    }

    #[test]
    fn test_show_round_trips_layout() {
        let text = "S*.\nsA.\n.a.\n";
        let state = parse_board(text);
        assert_eq!(show(&state, &[]), text);
        assert_eq!(show(&state, &[Coord::new(2, 2)]), "S*.\nsA.\n.a+\n");
    }

    #[test]
    fn test_request_uses_bottom_left_origin() {
        let sketch = Sketch::parse("S..\ns..\n...").unwrap().with_health(SELF_ID, 12);
        let request = sketch.to_request(4);
        assert_eq!(request.you.body, vec![Coord::new(0, 2), Coord::new(0, 1)]);
        assert_eq!(request.you.health, 12);
        assert_eq!(request.turn, 4);

        let state = GameState::from_request(&request, None).unwrap();
        assert_eq!(state.me().body, sketch.snakes[0].body);
    }
}
