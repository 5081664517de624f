// Replays a JSONL debug log through the current pipeline
//
//   replay <log_file> <mode> [--game <id>] [--config <path>] [--verbose] [--profile]
//
// Modes: --all, --turns T1,T2, --show T1,T2, --validate T:move|move,...
// --game keeps only one game's entries when a log holds several.

use std::env;
use std::process;
use std::time::Instant;

use squiggle_snake::config::Config;
use squiggle_snake::debug_logger::LogEntry;
use squiggle_snake::replay::{select_turns, ReplayEngine, ReplayResult};
use squiggle_snake::simple_profiler;
use squiggle_snake::types::Direction;

const USAGE: &str = "\
usage: replay <log_file> <mode> [options]

modes:
  --all                     replay every entry, carrying state within each game
  --turns <T1,T2,...>       replay the listed turns on their own
  --show <T1,T2,...>        draw the board and the replayed step for turns
  --validate <T:M|M,...>    check logged moves against acceptable moves

options:
  --game <id>               only entries from this game
  --config <path>           engine settings (default: Snake.toml)
  --verbose                 print every replayed turn
  --profile                 time engine phases (same as SNAKE_PROFILE=1)";

#[derive(Debug, PartialEq)]
enum Mode {
    All,
    Turns(Vec<i32>),
    Show(Vec<i32>),
    Validate(Vec<(i32, Vec<Direction>)>),
}

#[derive(Debug)]
struct Args {
    log_file: String,
    mode: Mode,
    game: Option<String>,
    config_path: String,
    verbose: bool,
    profile: bool,
}

impl Args {
    fn parse(raw: &[String]) -> Result<Args, String> {
        let mut rest = raw.iter();
        let log_file = rest.next().ok_or("missing log file")?.clone();

        let mut mode = None;
        let mut game = None;
        let mut config_path = "Snake.toml".to_string();
        let mut verbose = false;
        let mut profile = false;

        while let Some(flag) = rest.next() {
            let mut value = || {
                rest.next()
                    .cloned()
                    .ok_or_else(|| format!("{} needs a value", flag))
            };
            let picked = match flag.as_str() {
                "--all" => Some(Mode::All),
                "--turns" => Some(Mode::Turns(parse_turns(&value()?)?)),
                "--show" => Some(Mode::Show(parse_turns(&value()?)?)),
                "--validate" => Some(Mode::Validate(parse_expected_moves(&value()?)?)),
                "--game" => {
                    game = Some(value()?);
                    None
                }
                "--config" => {
                    config_path = value()?;
                    None
                }
                "--verbose" => {
                    verbose = true;
                    None
                }
                "--profile" => {
                    profile = true;
                    None
                }
                other => return Err(format!("unknown option '{}'", other)),
            };
            if let Some(m) = picked {
                if mode.is_some() {
                    return Err("pick one of --all, --turns, --show, --validate".to_string());
                }
                mode = Some(m);
            }
        }

        Ok(Args {
            log_file,
            mode: mode.ok_or("pick one of --all, --turns, --show, --validate")?,
            game,
            config_path,
            verbose,
            profile,
        })
    }
}

fn parse_turns(s: &str) -> Result<Vec<i32>, String> {
    s.split(',')
        .map(|t| t.trim().parse::<i32>().map_err(|e| format!("bad turn '{}': {}", t, e)))
        .collect()
}

/// `3:up,7:left|down` -> turn 3 must be up, turn 7 left or down
fn parse_expected_moves(s: &str) -> Result<Vec<(i32, Vec<Direction>)>, String> {
    s.split(',')
        .map(|pair| {
            let (turn, moves) = pair
                .trim()
                .split_once(':')
                .ok_or_else(|| format!("expected turn:move, got '{}'", pair))?;
            let turn = turn
                .parse::<i32>()
                .map_err(|e| format!("bad turn '{}': {}", turn, e))?;
            let moves = moves
                .split('|')
                .map(|m| Direction::parse(m.trim()))
                .collect::<Result<Vec<_>, _>>()?;
            Ok((turn, moves))
        })
        .collect()
}

fn print_stage_summary(engine: &ReplayEngine, results: &[ReplayResult]) {
    engine.print_report(results);

    let shifts = engine.stage_shifts(results);
    if !shifts.is_empty() {
        println!("Stage changes (logged -> replayed):");
        for (from, to, count) in shifts {
            println!("  {:<12} -> {:<12} {}", from, to.as_str(), count);
        }
        println!();
    }
}

fn run(args: &Args, engine: &ReplayEngine, entries: &[LogEntry]) -> Result<(), String> {
    match &args.mode {
        Mode::All => {
            println!("Replaying {} turns\n", entries.len());
            print_stage_summary(engine, &engine.replay_all(entries));
        }
        Mode::Turns(turns) => {
            println!("Replaying turns {:?}\n", turns);
            print_stage_summary(engine, &engine.replay_turns(entries, turns)?);
        }
        Mode::Show(turns) => {
            for entry in select_turns(entries, turns)? {
                println!("{}", engine.show_turn(entry)?);
            }
        }
        Mode::Validate(expected) => {
            engine.validate_expected_moves(entries, expected)?;
            println!("✓ {} expected move(s) hold", expected.len());
        }
    }
    Ok(())
}

fn main() {
    env_logger::init();

    let raw: Vec<String> = env::args().skip(1).collect();
    if raw.iter().any(|a| a == "--help") {
        println!("{}", USAGE);
        return;
    }
    let args = match Args::parse(&raw) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {}\n\n{}", e, USAGE);
            process::exit(1);
        }
    };
    if args.profile {
        env::set_var("SNAKE_PROFILE", "1");
    }

    let config = Config::from_file(&args.config_path).unwrap_or_else(|e| {
        eprintln!("Warning: {} ({}), using defaults", e, args.config_path);
        Config::default_hardcoded()
    });
    let engine = ReplayEngine::new(config, args.verbose);
    let started = Instant::now();

    let mut entries = match engine.load_log_file(&args.log_file) {
        Ok(entries) => entries,
        Err(e) => {
            eprintln!("Error loading {}: {}", args.log_file, e);
            process::exit(1);
        }
    };
    if let Some(game) = &args.game {
        entries.retain(|e| &e.game_id == game);
    }
    if entries.is_empty() {
        eprintln!("Error: no entries to replay in {}", args.log_file);
        process::exit(1);
    }

    if let Err(e) = run(&args, &engine, &entries) {
        eprintln!("✗ {}", e);
        process::exit(1);
    }

    simple_profiler::merge_thread_local();
    simple_profiler::print_report(started.elapsed().as_millis() as u64);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(line: &str) -> Result<Args, String> {
        let raw: Vec<String> = line.split_whitespace().map(String::from).collect();
        Args::parse(&raw)
    }

    #[test]
    fn test_parses_mode_and_options() {
        let parsed = args("log.jsonl --show 3,5 --game g1 --verbose").unwrap();
        assert_eq!(parsed.mode, Mode::Show(vec![3, 5]));
        assert_eq!(parsed.game.as_deref(), Some("g1"));
        assert!(parsed.verbose);
        assert_eq!(parsed.config_path, "Snake.toml");
    }

    #[test]
    fn test_validate_accepts_alternatives() {
        let parsed = args("log.jsonl --validate 3:up,7:left|down").unwrap();
        assert_eq!(
            parsed.mode,
            Mode::Validate(vec![
                (3, vec![Direction::Up]),
                (7, vec![Direction::Left, Direction::Down]),
            ])
        );
    }

    #[test]
    fn test_rejects_missing_or_double_mode() {
        assert!(args("log.jsonl").is_err());
        assert!(args("log.jsonl --all --turns 1").is_err());
        assert!(args("log.jsonl --turns").is_err());
        assert!(args("log.jsonl --all --bogus").is_err());
    }
}
