// Debug logging module for asynchronous game state logging
//
// This module provides fire-and-forget async logging to avoid blocking
// the main request/response cycle. Each turn's wire board and the decision
// taken on it are written as one JSON line, which the replay tool reads back.

use log::error;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::types::{Board, Direction};

/// A single debug log line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub turn: i32,
    pub game_id: String,
    pub you_id: String,
    pub chosen_move: String,
    /// Pipeline stage, or "fallback" when the engine did not answer
    #[serde(default)]
    pub stage: String,
    #[serde(default)]
    pub annotation: String,
    /// Board exactly as received (bottom-left origin)
    pub board: Board,
    pub timestamp: String,
}

impl LogEntry {
    pub fn new(
        turn: i32,
        game_id: &str,
        you_id: &str,
        chosen_move: Direction,
        stage: &str,
        annotation: &str,
        board: Board,
    ) -> Self {
        LogEntry {
            turn,
            game_id: game_id.to_string(),
            you_id: you_id.to_string(),
            chosen_move: chosen_move.as_str().to_string(),
            stage: stage.to_string(),
            annotation: annotation.to_string(),
            board,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Shared debug logger state
/// Uses Arc<Mutex<File>> to allow concurrent async writes from multiple tasks
#[derive(Clone)]
pub struct DebugLogger {
    file: Arc<Mutex<Option<File>>>,
    enabled: bool,
}

impl DebugLogger {
    /// Creates a new debug logger
    /// If enabled is true, initializes the log file (truncating if it exists)
    pub async fn new(enabled: bool, log_file_path: &str) -> Self {
        if !enabled {
            return Self::disabled();
        }

        match OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(log_file_path)
            .await
        {
            Ok(file) => {
                log::info!("Debug logging enabled: {}", log_file_path);
                DebugLogger {
                    file: Arc::new(Mutex::new(Some(file))),
                    enabled: true,
                }
            }
            Err(e) => {
                error!("Failed to create debug log file '{}': {}", log_file_path, e);
                Self::disabled()
            }
        }
    }

    /// Creates a disabled debug logger (no-op)
    pub fn disabled() -> Self {
        DebugLogger {
            file: Arc::new(Mutex::new(None)),
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Logs a move decision asynchronously (fire-and-forget)
    /// This spawns a tokio task that writes to the file without blocking
    pub fn log_move(&self, entry: LogEntry) {
        if !self.enabled {
            return;
        }

        let file_handle = self.file.clone();
        tokio::spawn(async move {
            Self::write_entry(file_handle, entry).await;
        });
    }

    async fn write_entry(file_handle: Arc<Mutex<Option<File>>>, entry: LogEntry) {
        let mut file_guard = file_handle.lock().await;

        if let Some(file) = file_guard.as_mut() {
            match serde_json::to_string(&entry) {
                Ok(json_line) => {
                    let line_with_newline = format!("{}\n", json_line);
                    if let Err(e) = file.write_all(line_with_newline.as_bytes()).await {
                        error!("Failed to write debug log entry: {}", e);
                    } else if let Err(e) = file.flush().await {
                        error!("Failed to flush debug log: {}", e);
                    }
                }
                Err(e) => {
                    error!("Failed to serialize debug log entry: {}", e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Battlesnake, Coord};

    fn board() -> Board {
        Board {
            height: 3,
            width: 3,
            food: vec![Coord::new(2, 2)],
            snakes: vec![Battlesnake {
                id: "me".to_string(),
                name: "me".to_string(),
                health: 90,
                body: vec![Coord::new(0, 0)],
            }],
        }
    }

    #[test]
    fn test_entry_survives_json_line() {
        let entry = LogEntry::new(4, "g1", "me", Direction::Up, "feeding", "food at 2,2", board());
        let line = serde_json::to_string(&entry).unwrap();
        assert!(!line.contains('\n'));

        let back: LogEntry = serde_json::from_str(&line).unwrap();
        assert_eq!(back.chosen_move, "up");
        assert_eq!(back.stage, "feeding");
        assert_eq!(back.board.food, vec![Coord::new(2, 2)]);
    }

    #[test]
    fn test_stage_and_annotation_are_optional() {
        let line = r#"{"turn":1,"game_id":"g","you_id":"me","chosen_move":"left",
            "board":{"height":3,"width":3,"food":[],"snakes":[]},"timestamp":"t"}"#;
        let entry: LogEntry = serde_json::from_str(line).unwrap();
        assert!(entry.stage.is_empty());
        assert!(entry.annotation.is_empty());
    }

    #[tokio::test]
    async fn test_enabled_logger_writes_lines() {
        let path = std::env::temp_dir().join(format!("squiggle_log_{}.jsonl", std::process::id()));
        let path_str = path.to_string_lossy().to_string();
        let logger = DebugLogger::new(true, &path_str).await;
        assert!(logger.is_enabled());

        let entry = LogEntry::new(0, "g", "me", Direction::Left, "triage", "", board());
        DebugLogger::write_entry(logger.file.clone(), entry).await;

        let text = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(text.lines().count(), 1);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_disabled_logger_is_noop() {
        let logger = DebugLogger::disabled();
        assert!(!logger.is_enabled());
        // No runtime needed: nothing is spawned
        logger.log_move(LogEntry::new(0, "g", "me", Direction::Up, "", "", board()));
    }
}
