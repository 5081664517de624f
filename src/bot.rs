// Battlesnake bot: the server-facing side of the engine
//
// Holds the static configuration, the debug logger and the per-game
// carry-over map. Each /move runs the pipeline on a blocking thread under
// the response budget; if it errors, panics or runs late the bot answers
// with a plain legal move instead.

use log::{error, info, warn};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::debug_logger::{DebugLogger, LogEntry};
use crate::engine::{compute_move, CarryOver};
use crate::types::{Board, Coord, Direction, MoveRequest};

/// Battlesnake Bot with OOP-style API
/// Takes static configuration dependencies and exposes methods corresponding to API endpoints
pub struct Bot {
    config: Config,
    logger: DebugLogger,
    sessions: Mutex<HashMap<String, CarryOver>>,
}

impl Bot {
    /// Creates a new Bot instance with the given configuration
    ///
    /// # Arguments
    /// * `config` - Static configuration that does not change during the bot's lifetime
    /// * `logger` - Debug logger, possibly disabled
    pub fn new(config: Config, logger: DebugLogger) -> Self {
        Bot {
            config,
            logger,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Returns bot metadata and appearance
    /// Corresponds to GET / endpoint
    pub fn info(&self) -> Value {
        info!("INFO");
        let appearance = &self.config.appearance;

        json!({
            "apiversion": "1",
            "author": appearance.author,
            "color": appearance.color,
            "head": appearance.head,
            "tail": appearance.tail,
        })
    }

    /// Called when a game starts
    /// Corresponds to POST /start endpoint
    pub fn start(&self, request: &MoveRequest) {
        info!("GAME START {}", request.game.id);
        self.sessions
            .lock()
            .insert(request.game.id.clone(), CarryOver::default());
    }

    /// Called when a game ends
    /// Corresponds to POST /end endpoint
    pub fn end(&self, request: &MoveRequest) {
        let carry = self.sessions.lock().remove(&request.game.id);
        info!(
            "GAME OVER {} after {} turns",
            request.game.id,
            carry.map_or(0, |c| c.turns_seen)
        );
    }

    pub fn active_games(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Computes and returns the next move
    /// Corresponds to POST /move endpoint
    ///
    /// # Returns
    /// * `Value` - JSON response with the move and a shout
    pub async fn get_move(&self, request: &MoveRequest) -> Value {
        let start_time = Instant::now();
        let game_id = request.game.id.clone();
        info!("Turn {}: Computing move", request.turn);

        let carry = self.sessions.lock().get(&game_id).cloned();
        let owned = request.clone();
        let config = self.config.clone();
        let budget = Duration::from_millis(self.config.timing.effective_budget_ms());

        let task = tokio::task::spawn_blocking(move || compute_move(&owned, carry.as_ref(), &config));

        let (direction, stage, annotation) = match tokio::time::timeout(budget, task).await {
            Ok(Ok(Ok(outcome))) => {
                // Only games opened by /start keep a slot; /end frees it
                if let Some(slot) = self.sessions.lock().get_mut(&game_id) {
                    *slot = outcome.carry;
                }
                (
                    outcome.direction,
                    outcome.stage.as_str().to_string(),
                    outcome.annotation,
                )
            }
            Ok(Ok(Err(e))) => {
                warn!("Turn {}: rejected state: {}", request.turn, e);
                self.fallback(request)
            }
            Ok(Err(e)) => {
                error!("Turn {}: engine panicked: {}", request.turn, e);
                self.fallback(request)
            }
            Err(_) => {
                warn!(
                    "Turn {}: no decision within {}ms",
                    request.turn,
                    budget.as_millis()
                );
                self.fallback(request)
            }
        };

        info!(
            "Turn {}: Chose {} ({}, time: {}ms)",
            request.turn,
            direction.as_str(),
            stage,
            start_time.elapsed().as_millis()
        );

        self.logger.log_move(LogEntry::new(
            request.turn,
            &game_id,
            &request.you.id,
            direction,
            &stage,
            &annotation,
            request.board.clone(),
        ));

        json!({ "move": direction.as_str(), "shout": annotation })
    }

    fn fallback(&self, request: &MoveRequest) -> (Direction, String, String) {
        let direction = fallback_direction(&request.board, &request.you.body)
            .unwrap_or(self.config.pipeline.default_direction);
        (direction, "fallback".to_string(), String::new())
    }
}

/// First legal move on the raw wire board, if any
///
/// A move is legal if it:
/// - Doesn't go out of bounds
/// - Doesn't collide with snake bodies (excluding tails which will move)
/// - Doesn't reverse into the neck
pub fn fallback_direction(board: &Board, body: &[Coord]) -> Option<Direction> {
    let head = *body.first()?;
    let neck = body.get(1).copied();

    Direction::all().into_iter().find(|dir| {
        let next = wire_step(dir, &head);
        Some(next) != neck
            && !is_out_of_bounds(&next, board.width, board.height)
            && !is_collision(&next, board)
    })
}

/// The wire board puts y = 0 at the bottom, so Up increases y
fn wire_step(dir: &Direction, coord: &Coord) -> Coord {
    match dir {
        Direction::Up => Coord::new(coord.x, coord.y + 1),
        Direction::Down => Coord::new(coord.x, coord.y - 1),
        horizontal => horizontal.apply(coord),
    }
}

/// Checks if a coordinate is out of bounds
fn is_out_of_bounds(coord: &Coord, board_width: i32, board_height: i32) -> bool {
    coord.x < 0 || coord.x >= board_width || coord.y < 0 || coord.y >= board_height
}

/// Checks if a coordinate collides with any snake body
fn is_collision(coord: &Coord, board: &Board) -> bool {
    board.snakes.iter().any(|snake| {
        let body_check_len = snake.body.len().saturating_sub(1).max(1);
        snake.body.iter().take(body_check_len).any(|c| c == coord)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::Sketch;

    fn wire(text: &str) -> MoveRequest {
        Sketch::parse(text).unwrap().to_request(1)
    }

    #[test]
    fn test_fallback_avoids_walls_and_bodies() {
        // Wire frame: head at (0,0) bottom-left, body above it
        let request = wire(
            "
            s..
            S..
            ",
        );
        assert_eq!(request.you.body[0], Coord::new(0, 0));
        assert_eq!(
            fallback_direction(&request.board, &request.you.body),
            Some(Direction::Right)
        );
    }

    #[test]
    fn test_fallback_none_when_surrounded() {
        let request = wire(
            "
            aaa
            aSa
            aAa
            ",
        );
        // Tail of "a" is excluded, but (2,0) on the wire is not adjacent
        assert_eq!(fallback_direction(&request.board, &request.you.body), None);
    }

    #[test]
    fn test_info_uses_appearance() {
        let bot = Bot::new(Config::default_hardcoded(), DebugLogger::disabled());
        let info = bot.info();
        assert_eq!(info["apiversion"], "1");
        assert_eq!(info["color"], "#FF3917");
    }

    #[tokio::test]
    async fn test_sessions_follow_game_lifecycle() {
        let bot = Bot::new(Config::default_hardcoded(), DebugLogger::disabled());
        let request = wire(
            "
            .....
            .Ss..
            .....
            ",
        );
        bot.start(&request);
        assert_eq!(bot.active_games(), 1);

        let response = bot.get_move(&request).await;
        let mv = response["move"].as_str().unwrap();
        assert!(Direction::parse(mv).is_ok());
        assert!(response["shout"].is_string());
        assert_eq!(
            bot.sessions.lock().get(&request.game.id).map(|c| c.turns_seen),
            Some(1)
        );

        bot.end(&request);
        assert_eq!(bot.active_games(), 0);
    }

    #[tokio::test]
    async fn test_move_without_start_keeps_no_session() {
        let bot = Bot::new(Config::default_hardcoded(), DebugLogger::disabled());
        let mut request = wire(
            "
            .....
            .Ss..
            .....
            ",
        );
        for turn in 0..3 {
            request.game.id = format!("stray-{}", turn);
            bot.get_move(&request).await;
        }
        assert_eq!(bot.active_games(), 0);
    }

    #[tokio::test]
    async fn test_invalid_request_falls_back() {
        let bot = Bot::new(Config::default_hardcoded(), DebugLogger::disabled());
        let mut request = wire("S..\n...");
        request.board.width = 0;
        let response = bot.get_move(&request).await;
        assert_eq!(response["shout"], "");
        assert!(Direction::parse(response["move"].as_str().unwrap()).is_ok());
    }
}
