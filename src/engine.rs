// Move pipeline
//
// An ordered list of stages, each either claiming the move or falling
// through to the next:
//
//   1. edge safety  - leave the board edge toward open space
//   2. catch up     - grow when outsized or hungry
//   3. attack       - cut off a shorter opponent's next cell
//   4. feeding      - take food we can reach first
//   5. triage       - best space-filling candidate
//   6. last resort  - largest-region neighbour, else the default direction
//
// The pipeline runs synchronously on a fully built GameState and never
// mutates it.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::StateError;
use crate::grid::Overlay;
use crate::pathfinding::{safe_move_to, PlannedMove, SafeMoveOptions, StepCost};
use crate::simple_profiler::ProfileGuard;
use crate::squiggle;
use crate::state::{GameState, MatrixKind, Snake};
use crate::types::{Coord, Direction, MoveRequest};

/// Which stage produced a move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    EdgeSafety,
    CatchUp,
    Attack,
    Feeding,
    Triage,
    LastResort,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::EdgeSafety => "edge_safety",
            Stage::CatchUp => "catch_up",
            Stage::Attack => "attack",
            Stage::Feeding => "feeding",
            Stage::Triage => "triage",
            Stage::LastResort => "last_resort",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub direction: Direction,
    pub stage: Stage,
    /// Human-readable note returned as the shout
    pub annotation: String,
}

/// Opaque per-game memory threaded from one turn to the next
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarryOver {
    pub turns_seen: u32,
    pub last_move: Option<Direction>,
    pub last_stage: Option<Stage>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MoveOutcome {
    pub direction: Direction,
    pub stage: Stage,
    pub annotation: String,
    pub carry: CarryOver,
}

struct Context<'a> {
    state: &'a GameState,
    config: &'a Config,
}

impl<'a> Context<'a> {
    fn me(&self) -> &'a Snake {
        self.state.me()
    }

    fn avoid_edges(&self) -> StepCost {
        StepCost::AvoidEdges {
            penalty: self.config.path_costs.edge_penalty,
        }
    }

    fn decision(&self, stage: Stage, plan: &PlannedMove, what: String) -> Decision {
        debug!(
            "{}: {} via {:?} ({} steps, {} retries{})",
            stage.as_str(),
            what,
            plan.direction,
            plan.path.len() - 1,
            plan.retries,
            if plan.sticky { ", sticky" } else { "" }
        );
        Decision {
            direction: plan.direction,
            stage,
            annotation: what,
        }
    }
}

type StageFn = fn(&Context) -> Option<Decision>;

const PIPELINE: [(Stage, StageFn); 6] = [
    (Stage::EdgeSafety, edge_safety),
    (Stage::CatchUp, catch_up),
    (Stage::Attack, attack),
    (Stage::Feeding, feeding),
    (Stage::Triage, triage),
    (Stage::LastResort, last_resort),
];

/// Runs the pipeline on a built state
pub fn decide(state: &GameState, config: &Config) -> Decision {
    let _guard = ProfileGuard::new("pipeline");
    let ctx = Context { state, config };

    for (stage, select) in PIPELINE.iter() {
        if let Some(decision) = select(&ctx) {
            return decision;
        }
        debug!("Turn {}: {} fell through", state.turn(), stage.as_str());
    }

    // last_resort always answers; kept for exhaustiveness
    Decision {
        direction: config.pipeline.default_direction,
        stage: Stage::LastResort,
        annotation: "no move".to_string(),
    }
}

/// Builds the state for `request`, decides, and threads the carry-over
pub fn compute_move(
    request: &MoveRequest,
    carry: Option<&CarryOver>,
    config: &Config,
) -> Result<MoveOutcome, StateError> {
    let state = {
        let _guard = ProfileGuard::new("state");
        GameState::from_request(request, carry)?
    };
    let decision = decide(&state, config);

    info!(
        "Turn {}: {} by {} ({})",
        request.turn,
        decision.direction.as_str(),
        decision.stage.as_str(),
        decision.annotation
    );

    let carry = CarryOver {
        turns_seen: state.carry().turns_seen + 1,
        last_move: Some(decision.direction),
        last_stage: Some(decision.stage),
    };
    Ok(MoveOutcome {
        direction: decision.direction,
        stage: decision.stage,
        annotation: decision.annotation,
        carry,
    })
}

/// Off the edge toward the centre, or the most open cell we can reach
fn edge_safety(ctx: &Context) -> Option<Decision> {
    let state = ctx.state;
    let head = ctx.me().head();
    if !state.is_edge(head) {
        return None;
    }

    let region = state.region_at(head, MatrixKind::Conservative);
    let center = state.center();
    let target = if region.contains(&center) {
        center
    } else {
        state.choke().most_open_in(&region, center)?
    };

    let plan = safe_move_to(
        state,
        target,
        SafeMoveOptions {
            matrix: MatrixKind::Conservative,
            tolerate_sticky: false,
            cost: StepCost::OpenSpace {
                weight: ctx.config.path_costs.open_space_weight,
                edge_penalty: ctx.config.path_costs.edge_penalty,
            },
        },
    )?;
    Some(ctx.decision(Stage::EdgeSafety, &plan, format!("off the edge to {}", target.key())))
}

/// Nearest reachable food when an opponent is at least our size or we are
/// hungry; health picks how much risk the path may take
fn catch_up(ctx: &Context) -> Option<Decision> {
    let state = ctx.state;
    let me = ctx.me();
    let pipeline = &ctx.config.pipeline;

    let outsized = state.opponents().any(|o| o.len() >= me.len());
    let hungry = me.health < pipeline.low_health_threshold;
    if !outsized && !hungry {
        return None;
    }

    let options = if me.health < pipeline.critical_health_threshold {
        SafeMoveOptions {
            matrix: MatrixKind::Conservative,
            tolerate_sticky: true,
            cost: StepCost::Uniform,
        }
    } else {
        SafeMoveOptions {
            matrix: MatrixKind::Conservative,
            tolerate_sticky: hungry,
            cost: ctx.avoid_edges(),
        }
    };

    for food in foods_by_distance(state, me.head()) {
        if let Some(plan) = safe_move_to(state, food, options) {
            let why = if hungry { "hungry" } else { "catching up" };
            return Some(ctx.decision(Stage::CatchUp, &plan, format!("{}, food at {}", why, food.key())));
        }
    }
    None
}

/// Take the cell a shorter opponent needs next, unless doing so could box us in
fn attack(ctx: &Context) -> Option<Decision> {
    let state = ctx.state;
    let me = ctx.me();
    let head = me.head();
    let center = state.center();

    let mut prey: Vec<&Snake> = state
        .opponents()
        .filter(|o| o.len() < me.len())
        .filter(|o| o.head().manhattan(&head) <= ctx.config.pipeline.max_attack_distance)
        .collect();
    prey.sort_by_key(|o| o.head().manhattan(&head));

    for opponent in prey {
        let mut targets = state.free_neighbors(opponent.head(), MatrixKind::Dangerous);
        targets.sort_by_key(|t| (t.manhattan(&center), *t));

        for target in &targets {
            let plan = match safe_move_to(state, *target, SafeMoveOptions::default()) {
                Some(plan) => plan,
                None => continue,
            };
            if traps_us(state, plan.path[1], &targets) {
                debug!("attack: {} would box us in", target.key());
                continue;
            }
            return Some(ctx.decision(
                Stage::Attack,
                &plan,
                format!("cutting off {} at {}", opponent.id, target.key()),
            ));
        }
    }
    None
}

/// True if the opponent stepping onto any of `replies` leaves our next cell
/// with less room than our body
fn traps_us(state: &GameState, step: Coord, replies: &[Coord]) -> bool {
    let base = state.matrix(MatrixKind::Conservative);
    let need = state.me().len();
    replies.iter().any(|reply| {
        let blocked = [*reply].into_iter().collect();
        let overlay = Overlay::new(base, &blocked);
        state.region_in(step, &overlay).len() < need
    })
}

/// Food we reach no later than any opponent, away from larger heads
fn feeding(ctx: &Context) -> Option<Decision> {
    let state = ctx.state;
    let head = ctx.me().head();

    for food in foods_by_distance(state, head) {
        let ours = head.manhattan(&food);
        if state.opponents().any(|o| o.head().manhattan(&food) < ours) {
            continue;
        }
        if state.is_sticky(food) {
            continue;
        }
        let options = SafeMoveOptions {
            cost: ctx.avoid_edges(),
            ..SafeMoveOptions::default()
        };
        if let Some(plan) = safe_move_to(state, food, options) {
            return Some(ctx.decision(Stage::Feeding, &plan, format!("food at {}", food.key())));
        }
    }
    None
}

fn triage(ctx: &Context) -> Option<Decision> {
    let best = squiggle::triage(ctx.state, &ctx.config.triage)?;
    Some(Decision {
        direction: best.direction,
        stage: Stage::Triage,
        annotation: format!(
            "filling {} cells{}",
            best.path.len(),
            if best.escape { ", escape" } else { "" }
        ),
    })
}

/// Neighbour with the most room; the default direction when boxed in
fn last_resort(ctx: &Context) -> Option<Decision> {
    let state = ctx.state;
    let head = ctx.me().head();

    for kind in [MatrixKind::Conservative, MatrixKind::Dangerous] {
        let mut best: Option<(Coord, usize)> = None;
        for cell in state.free_neighbors(head, kind) {
            let room = state.region_at(cell, kind).len();
            if best.map_or(true, |(_, r)| room > r) {
                best = Some((cell, room));
            }
        }
        if let Some((cell, room)) = best {
            let direction = Direction::between(&head, &cell)?;
            return Some(Decision {
                direction,
                stage: Stage::LastResort,
                annotation: format!("{} cells left", room),
            });
        }
    }

    Some(Decision {
        direction: ctx.config.pipeline.default_direction,
        stage: Stage::LastResort,
        annotation: "boxed in".to_string(),
    })
}

fn foods_by_distance(state: &GameState, from: Coord) -> Vec<Coord> {
    let mut foods = state.food().to_vec();
    foods.sort_by_key(|f| (f.manhattan(&from), *f));
    foods
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{parse_board, Sketch, SELF_ID};

    fn config() -> Config {
        Config::default_hardcoded()
    }

    #[test]
    fn test_edge_head_moves_inward() {
        let state = parse_board(
            "
            .......
            .......
            .......
            S......
            s......
            .......
            .......
            ",
        );
        let d = decide(&state, &config());
        assert_eq!(d.stage, Stage::EdgeSafety);
        assert_eq!(d.direction, Direction::Right);
    }

    #[test]
    fn test_hungry_snake_eats_even_when_largest() {
        let state = Sketch::parse(
            "
            .......
            .......
            ..*Ss..
            ....s..
            .......
            ",
        )
        .unwrap()
        .with_health(SELF_ID, 20)
        .build()
        .unwrap();
        let d = decide(&state, &config());
        assert_eq!(d.stage, Stage::CatchUp);
        assert_eq!(d.direction, Direction::Left);
    }

    #[test]
    fn test_catch_up_when_opponent_is_longer() {
        let state = parse_board(
            "
            .........
            .........
            .........
            ...*S....
            ....s....
            .........
            .......a.
            .......a.
            .......A.
            ",
        );
        let d = decide(&state, &config());
        assert_eq!(d.stage, Stage::CatchUp);
        assert_eq!(d.direction, Direction::Left);
    }

    #[test]
    fn test_feeding_skips_food_an_opponent_reaches_first() {
        let contested = parse_board(
            "
            .........
            .........
            .ssS.....
            .........
            .........
            ......*A.
            .......a.
            .........
            ",
        );
        let cfg = config();
        let ctx = Context {
            state: &contested,
            config: &cfg,
        };
        assert!(feeding(&ctx).is_none());

        let free = parse_board(
            "
            .........
            .........
            .ssS.....
            .........
            .........
            ......*..
            .........
            .........
            ",
        );
        let ctx = Context {
            state: &free,
            config: &cfg,
        };
        let d = feeding(&ctx).unwrap();
        assert_eq!(d.stage, Stage::Feeding);
        assert!(matches!(d.direction, Direction::Right | Direction::Down));
    }

    #[test]
    fn test_feeding_skips_food_next_to_larger_head() {
        let cfg = config();
        // Food is ours by distance, but (4,3) is where "a" can step next
        let guarded = parse_board(
            "
            .......
            .......
            .ssS*..
            .......
            ....A..
            ....a..
            ....a..
            ",
        );
        assert!(guarded.is_sticky(Coord::new(4, 2)));
        let ctx = Context {
            state: &guarded,
            config: &cfg,
        };
        assert!(feeding(&ctx).is_none());

        // A shorter opponent casts no lookahead, so the same food is fine
        let shorter = parse_board(
            "
            .......
            .......
            .ssS*..
            .......
            ....A..
            ....a..
            .......
            ",
        );
        assert!(!shorter.is_sticky(Coord::new(4, 2)));
        let ctx = Context {
            state: &shorter,
            config: &cfg,
        };
        let d = feeding(&ctx).unwrap();
        assert_eq!(d.direction, Direction::Right);
    }

    #[test]
    fn test_attack_refuses_cut_off_that_boxes_us_in() {
        // The only way to "a"'s free cell (0,3) runs through a pocket that
        // (0,3) itself closes off
        let state = parse_board(
            "
            ...
            *..
            Aa.
            .ss
            .*S
            ",
        );
        let cfg = config();
        let target = Coord::new(0, 3);
        let plan = safe_move_to(&state, target, SafeMoveOptions::default()).unwrap();
        assert_eq!(plan.path[1], Coord::new(1, 4));
        assert!(traps_us(&state, plan.path[1], &[target]));

        let ctx = Context {
            state: &state,
            config: &cfg,
        };
        assert!(attack(&ctx).is_none());
    }

    #[test]
    fn test_last_resort_defaults_when_boxed() {
        let state = parse_board(
            "
            aaa
            aSa
            aAa
            ",
        );
        let d = decide(&state, &config());
        assert_eq!(d.stage, Stage::LastResort);
        assert_eq!(d.direction, Direction::Left);
    }

    #[test]
    fn test_compute_move_threads_carry() {
        let sketch = Sketch::parse(
            "
            .....
            .Ss..
            .....
            ..*..
            .....
            ",
        )
        .unwrap();
        let request = sketch.to_request(3);
        let first = compute_move(&request, None, &config()).unwrap();
        assert_eq!(first.carry.turns_seen, 1);
        assert_eq!(first.carry.last_move, Some(first.direction));

        let second = compute_move(&request, Some(&first.carry), &config()).unwrap();
        assert_eq!(second.carry.turns_seen, 2);
        assert_eq!(second.direction, first.direction);
    }

    #[test]
    fn test_compute_move_reports_bad_state() {
        let mut request = Sketch::parse("S..").unwrap().to_request(0);
        request.you.id = "ghost".to_string();
        assert!(matches!(
            compute_move(&request, None, &config()),
            Err(StateError::MissingSelf(_))
        ));
    }

    #[test]
    fn test_stage_names_match_serde() {
        for stage in [Stage::EdgeSafety, Stage::LastResort, Stage::CatchUp] {
            let json = serde_json::to_string(&stage).unwrap();
            assert_eq!(json, format!("\"{}\"", stage.as_str()));
        }
    }
}
