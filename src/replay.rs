// Replay module for analyzing historical game states and debugging decision-making
//
// This module provides functionality to:
// 1. Parse JSONL debug logs
// 2. Replay the pipeline on historical states
// 3. Compare logged vs replayed moves
// 4. Generate analysis reports

use log::{info, warn};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Instant;

use crate::config::Config;
use crate::debug_logger::LogEntry;
use crate::engine::{compute_move, CarryOver, Stage};
use crate::predict::position_after_moves;
use crate::render::show;
use crate::state::GameState;
use crate::types::{Direction, Game, MoveRequest};

/// Result of replaying a single turn
#[derive(Debug, Clone)]
pub struct ReplayResult {
    pub turn: i32,
    pub original_move: Direction,
    pub replayed_move: Direction,
    pub original_stage: String,
    pub replayed_stage: Stage,
    pub annotation: String,
    pub matches: bool,
    pub computation_time_ms: u128,
}

/// Statistics for a complete replay session
#[derive(Debug, Default)]
pub struct ReplayStats {
    pub total_turns: usize,
    pub matches: usize,
    pub mismatches: usize,
    pub match_rate: f64,
    /// Replayed decisions per stage, in pipeline order of first appearance
    pub stages: Vec<(Stage, usize)>,
}

/// Replay engine for analyzing debug logs
pub struct ReplayEngine {
    config: Config,
    verbose: bool,
}

impl ReplayEngine {
    /// Creates a new replay engine with the given configuration
    pub fn new(config: Config, verbose: bool) -> Self {
        ReplayEngine { config, verbose }
    }

    /// Loads all log entries from a JSONL file
    pub fn load_log_file<P: AsRef<Path>>(&self, log_path: P) -> Result<Vec<LogEntry>, String> {
        let file =
            File::open(log_path.as_ref()).map_err(|e| format!("Failed to open log file: {}", e))?;

        let reader = BufReader::new(file);
        let mut entries = Vec::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| format!("Failed to read line {}: {}", line_num + 1, e))?;

            if line.trim().is_empty() {
                continue;
            }

            let entry: LogEntry = serde_json::from_str(&line)
                .map_err(|e| format!("Failed to parse JSON on line {}: {}", line_num + 1, e))?;

            entries.push(entry);
        }

        info!("Loaded {} log entries", entries.len());
        Ok(entries)
    }

    /// Rebuilds the request a log entry was answered for
    pub fn request_for(entry: &LogEntry) -> Result<MoveRequest, String> {
        let you = entry
            .board
            .snakes
            .iter()
            .find(|s| s.id == entry.you_id)
            .cloned()
            .ok_or_else(|| format!("Snake with id '{}' not found in board state", entry.you_id))?;

        Ok(MoveRequest {
            game: Game {
                id: entry.game_id.clone(),
                ..Game::default()
            },
            turn: entry.turn,
            board: entry.board.clone(),
            you,
        })
    }

    /// Replays a single log entry and compares the result
    pub fn replay_entry(
        &self,
        entry: &LogEntry,
        carry: Option<&CarryOver>,
    ) -> Result<(ReplayResult, CarryOver), String> {
        if self.verbose {
            info!("Replaying turn {}...", entry.turn);
        }

        let request = Self::request_for(entry)?;
        let original_move = Direction::parse(&entry.chosen_move)?;

        let start_time = Instant::now();
        let outcome = compute_move(&request, carry, &self.config).map_err(|e| e.to_string())?;
        let computation_time = start_time.elapsed().as_millis();

        let matches = original_move == outcome.direction;
        let result = ReplayResult {
            turn: entry.turn,
            original_move,
            replayed_move: outcome.direction,
            original_stage: entry.stage.clone(),
            replayed_stage: outcome.stage,
            annotation: outcome.annotation,
            matches,
            computation_time_ms: computation_time,
        };

        if self.verbose {
            if matches {
                info!(
                    "Turn {}: ✓ MATCH - {} ({}, time: {}ms)",
                    entry.turn,
                    result.replayed_move.as_str(),
                    result.replayed_stage.as_str(),
                    computation_time
                );
            } else {
                warn!(
                    "Turn {}: ✗ MISMATCH - Original: {} ({}), Replayed: {} ({})",
                    entry.turn,
                    original_move.as_str(),
                    entry.stage,
                    result.replayed_move.as_str(),
                    result.replayed_stage.as_str()
                );
            }
        }

        Ok((result, outcome.carry))
    }

    /// Replays all entries in order, threading the carry-over within each game
    pub fn replay_all(&self, entries: &[LogEntry]) -> Vec<ReplayResult> {
        let mut results = Vec::new();
        let mut carry: Option<(String, CarryOver)> = None;

        for entry in entries {
            let previous = carry
                .as_ref()
                .filter(|(game, _)| *game == entry.game_id)
                .map(|(_, c)| c);
            match self.replay_entry(entry, previous) {
                Ok((result, next)) => {
                    results.push(result);
                    carry = Some((entry.game_id.clone(), next));
                }
                Err(e) => {
                    warn!("Failed to replay turn {}: {}", entry.turn, e);
                }
            }
        }

        results
    }

    /// Replays specific turns from a log file
    pub fn replay_turns(
        &self,
        entries: &[LogEntry],
        turn_numbers: &[i32],
    ) -> Result<Vec<ReplayResult>, String> {
        let mut results = Vec::new();

        for entry in select_turns(entries, turn_numbers)? {
            match self.replay_entry(entry, None) {
                Ok((result, _)) => results.push(result),
                Err(e) => {
                    warn!("Failed to replay turn {}: {}", entry.turn, e);
                }
            }
        }

        Ok(results)
    }

    /// Draws the logged board with the replayed move applied to our body
    pub fn show_turn(&self, entry: &LogEntry) -> Result<String, String> {
        let request = Self::request_for(entry)?;
        let state = GameState::from_request(&request, None).map_err(|e| e.to_string())?;
        let outcome = compute_move(&request, None, &self.config).map_err(|e| e.to_string())?;

        let head = state.me().head();
        let next = outcome.direction.apply(&head);
        let after = position_after_moves(&state.me().body, &[next]);

        let mut out = format!(
            "Turn {} ({}): {} by {} - {}\n",
            entry.turn,
            entry.game_id,
            outcome.direction.as_str(),
            outcome.stage.as_str(),
            outcome.annotation
        );
        out.push_str(&show(&state, &after));
        Ok(out)
    }

    /// Generates statistics from replay results
    pub fn generate_stats(&self, results: &[ReplayResult]) -> ReplayStats {
        let total_turns = results.len();
        let matches = results.iter().filter(|r| r.matches).count();
        let mismatches = total_turns - matches;
        let match_rate = if total_turns > 0 {
            (matches as f64 / total_turns as f64) * 100.0
        } else {
            0.0
        };

        let mut stages: Vec<(Stage, usize)> = Vec::new();
        for result in results {
            match stages.iter_mut().find(|(s, _)| *s == result.replayed_stage) {
                Some((_, count)) => *count += 1,
                None => stages.push((result.replayed_stage, 1)),
            }
        }

        ReplayStats {
            total_turns,
            matches,
            mismatches,
            match_rate,
            stages,
        }
    }

    /// Turns where the replay was decided by a different stage than the log
    /// recorded, counted per (logged, replayed) pair
    pub fn stage_shifts(&self, results: &[ReplayResult]) -> Vec<(String, Stage, usize)> {
        let mut shifts: Vec<(String, Stage, usize)> = Vec::new();
        for result in results {
            if result.original_stage.is_empty() || result.original_stage == result.replayed_stage.as_str() {
                continue;
            }
            match shifts
                .iter_mut()
                .find(|(from, to, _)| *from == result.original_stage && *to == result.replayed_stage)
            {
                Some((_, _, count)) => *count += 1,
                None => shifts.push((result.original_stage.clone(), result.replayed_stage, 1)),
            }
        }
        shifts
    }

    /// Prints a detailed report of replay results
    pub fn print_report(&self, results: &[ReplayResult]) {
        let stats = self.generate_stats(results);

        println!("\n═══════════════════════════════════════════════════════════");
        println!("                    REPLAY REPORT");
        println!("═══════════════════════════════════════════════════════════");
        println!("Total Turns:    {}", stats.total_turns);
        println!("Matches:        {} ({:.1}%)", stats.matches, stats.match_rate);
        println!("Mismatches:     {}", stats.mismatches);
        println!("═══════════════════════════════════════════════════════════\n");

        if !results.is_empty() {
            let avg_time: f64 = results
                .iter()
                .map(|r| r.computation_time_ms as f64)
                .sum::<f64>()
                / results.len() as f64;
            println!("Average Computation Time:   {:.1}ms", avg_time);
            for (stage, count) in &stats.stages {
                println!("  {:<12} {}", stage.as_str(), count);
            }
            println!();
        }

        let mismatches: Vec<_> = results.iter().filter(|r| !r.matches).collect();
        if !mismatches.is_empty() {
            println!("═══════════════════════════════════════════════════════════");
            println!("                  DETAILED MISMATCHES");
            println!("═══════════════════════════════════════════════════════════");

            for result in mismatches {
                println!(
                    "Turn {}: {} ({}) → {} ({}: {})",
                    result.turn,
                    result.original_move.as_str(),
                    result.original_stage,
                    result.replayed_move.as_str(),
                    result.replayed_stage.as_str(),
                    result.annotation
                );
            }
            println!();
        }
    }

    /// Validates that specific expected moves were made
    pub fn validate_expected_moves(
        &self,
        entries: &[LogEntry],
        expected_moves: &[(i32, Vec<Direction>)], // (turn, acceptable_moves)
    ) -> Result<(), String> {
        let turns: Vec<i32> = expected_moves.iter().map(|(turn, _)| *turn).collect();
        let picked = select_turns(entries, &turns)?;

        for (entry, (turn, acceptable)) in picked.into_iter().zip(expected_moves) {
            let actual_move = Direction::parse(&entry.chosen_move)?;

            if !acceptable.contains(&actual_move) {
                return Err(format!(
                    "Turn {}: Expected one of {:?}, but got {}",
                    turn,
                    acceptable.iter().map(|d| d.as_str()).collect::<Vec<_>>(),
                    actual_move.as_str()
                ));
            }
        }

        Ok(())
    }
}

/// Entries for `turns`, in the order asked. A log holding several games
/// yields the first entry logged for each turn.
pub fn select_turns<'a>(entries: &'a [LogEntry], turns: &[i32]) -> Result<Vec<&'a LogEntry>, String> {
    turns
        .iter()
        .map(|turn| {
            entries
                .iter()
                .find(|e| e.turn == *turn)
                .ok_or_else(|| format!("Turn {} not found in log file", turn))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::Sketch;

    fn entry(text: &str, turn: i32, chosen: Direction) -> LogEntry {
        let request = Sketch::parse(text).unwrap().to_request(turn);
        LogEntry::new(
            turn,
            &request.game.id,
            &request.you.id,
            chosen,
            "",
            "",
            request.board,
        )
    }

    #[test]
    fn test_replay_entry_reports_match() {
        let engine = ReplayEngine::new(Config::default_hardcoded(), false);
        let e = entry("aaa\naSa\naAa", 5, Direction::Left);
        let (result, carry) = engine.replay_entry(&e, None).unwrap();
        assert!(result.matches);
        assert_eq!(result.replayed_stage, Stage::LastResort);
        assert_eq!(carry.turns_seen, 1);
    }

    #[test]
    fn test_missing_self_is_an_error() {
        let engine = ReplayEngine::new(Config::default_hardcoded(), false);
        let mut e = entry("S..", 0, Direction::Up);
        e.you_id = "nobody".to_string();
        assert!(engine.replay_entry(&e, None).is_err());
    }

    #[test]
    fn test_stats_count_stages() {
        let engine = ReplayEngine::new(Config::default_hardcoded(), false);
        let entries = vec![
            entry("aaa\naSa\naAa", 1, Direction::Left),
            entry("aaa\naSa\naAa", 2, Direction::Up),
        ];
        let results = engine.replay_all(&entries);
        let stats = engine.generate_stats(&results);
        assert_eq!(stats.total_turns, 2);
        assert_eq!(stats.matches, 1);
        assert_eq!(stats.stages, vec![(Stage::LastResort, 2)]);
    }

    #[test]
    fn test_show_turn_marks_next_body() {
        let engine = ReplayEngine::new(Config::default_hardcoded(), false);
        let e = entry("S..", 1, Direction::Right);
        let text = engine.show_turn(&e).unwrap();
        assert!(text.starts_with("Turn 1 (sketch): right by edge_safety"));
        assert!(text.ends_with("S+.\n"));
    }

    #[test]
    fn test_validate_expected_moves() {
        let engine = ReplayEngine::new(Config::default_hardcoded(), false);
        let entries = vec![entry("S..", 3, Direction::Right)];
        assert!(engine
            .validate_expected_moves(&entries, &[(3, vec![Direction::Right, Direction::Down])])
            .is_ok());
        assert!(engine
            .validate_expected_moves(&entries, &[(3, vec![Direction::Up])])
            .is_err());
        assert!(engine.validate_expected_moves(&entries, &[(9, vec![])]).is_err());
    }

    #[test]
    fn test_select_turns_keeps_request_order() {
        let mut other = entry("S..", 3, Direction::Up);
        other.game_id = "other".to_string();
        let entries = vec![other, entry("S..", 3, Direction::Right), entry("S..", 5, Direction::Down)];

        let picked = select_turns(&entries, &[5, 3]).unwrap();
        assert_eq!(picked[0].turn, 5);
        // First logged game wins for a repeated turn number
        assert_eq!(picked[1].game_id, "other");

        let err = select_turns(&entries, &[3, 4]).unwrap_err();
        assert!(err.contains("Turn 4"));
    }

    #[test]
    fn test_stage_shifts_skip_unlabelled_turns() {
        let engine = ReplayEngine::new(Config::default_hardcoded(), false);
        let mut labelled = entry("aaa\naSa\naAa", 1, Direction::Left);
        labelled.stage = "triage".to_string();
        let mut agreeing = entry("aaa\naSa\naAa", 2, Direction::Left);
        agreeing.stage = "last_resort".to_string();
        let unlabelled = entry("aaa\naSa\naAa", 3, Direction::Left);

        let results = engine.replay_all(&[labelled, agreeing, unlabelled]);
        assert_eq!(
            engine.stage_shifts(&results),
            vec![("triage".to_string(), Stage::LastResort, 1)]
        );
    }
}
