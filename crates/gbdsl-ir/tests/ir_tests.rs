//! Integration tests for the gbdsl IR layer.
//!
//! Tests validate:
//! - Recording composes across nested blocks and restores the outer sink
//! - Logic block expansions are structurally independent copies
//! - Game configurations survive a JSON round trip with recorded handlers
//! - Navigation grids keep the weight/walkability asymmetry

use gbdsl_ir::game::{EntityDef, SceneDef, StateDef, StateMachineDef, VarType};
use gbdsl_ir::nav::NavGrid;
use gbdsl_ir::{BinOp, Expr, Game, IrError, LogicBlock, Recorder, Stmt, StmtKind};

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

/// A block that knocks an entity back by `force` and clamps its speed.
fn knockback_block(rec: &mut Recorder) -> LogicBlock {
    LogicBlock::record(rec, "knockback", &["force"], |r| {
        r.assign(
            "vx",
            Expr::binary(Expr::var("vx"), BinOp::Add, Expr::var("force")),
        )?;
        r.when(
            Expr::binary(Expr::var("vx"), BinOp::Gt, Expr::var("force")),
            |r| r.assign("vx", Expr::var("force")),
        )
    })
    .unwrap()
}

/// Collect every expression reachable from a statement list, mutably.
fn exprs_mut(stmts: &mut [Stmt]) -> Vec<&mut Expr> {
    let mut out = Vec::new();
    for s in stmts {
        match &mut s.kind {
            StmtKind::Assign { value, .. } => out.push(value),
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                out.push(cond);
                out.extend(exprs_mut(then_branch));
                if let Some(e) = else_branch {
                    out.extend(exprs_mut(e));
                }
            }
            _ => {}
        }
    }
    out
}

// ══════════════════════════════════════════════════════════════════════════════
// Logic blocks
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_two_expansions_share_no_node() {
    let mut rec = Recorder::new();
    let block = knockback_block(&mut rec);
    let arg = Expr::binary(Expr::var("power"), BinOp::Mul, Expr::int(2));

    let mut first = block.expand(&[arg.clone()]).unwrap();
    let second = block.expand(&[arg.clone()]).unwrap();
    assert_eq!(first, second);

    // Rewrite every expression of the first copy; the second must not notice.
    for e in exprs_mut(&mut first) {
        *e = Expr::int(0);
    }
    assert_ne!(first, second);
    assert_eq!(second, block.expand(&[arg]).unwrap());
}

#[test]
fn test_expansion_inside_recording() {
    let mut rec = Recorder::new();
    let block = knockback_block(&mut rec);
    let stmts = rec
        .record(|r| {
            r.expand(&block, &[Expr::int(3)])?;
            r.expand(&block, &[Expr::int(5)])
        })
        .unwrap();
    assert_eq!(stmts.len(), 4);
    match &stmts[2].kind {
        StmtKind::Assign { value, .. } => assert_eq!(
            value,
            &Expr::binary(Expr::var("vx"), BinOp::Add, Expr::int(5))
        ),
        other => panic!("expected assign, got {other:?}"),
    }
}

#[test]
fn test_expand_outside_recording_fails() {
    let mut rec = Recorder::new();
    let block = knockback_block(&mut rec);
    assert_eq!(
        rec.expand(&block, &[Expr::int(1)]).unwrap_err(),
        IrError::NoActiveRecordingContext
    );
}

#[test]
fn test_flat_substitution_captures_shadowing_names() {
    // A body variable that shares the placeholder's name is substituted too.
    let mut rec = Recorder::new();
    let block = LogicBlock::record(&mut rec, "reset", &["n"], |r| {
        r.for_range("i", 0, 4, |r| r.assign("n", Expr::var("n")))
    })
    .unwrap();
    let stmts = block.expand(&[Expr::int(9)]).unwrap();
    let StmtKind::For { body, .. } = &stmts[0].kind else {
        panic!("expected for");
    };
    assert_eq!(
        body[0].kind,
        StmtKind::Assign {
            target: "n".into(),
            op: Default::default(),
            value: Expr::int(9)
        }
    );
}

// ══════════════════════════════════════════════════════════════════════════════
// Configuration
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_recorded_game_round_trips_through_json() {
    let mut rec = Recorder::new();
    let on_frame = rec
        .record(|r| {
            r.compound("timer", gbdsl_ir::AssignOp::Add, 1)?;
            r.when(
                Expr::binary(Expr::var("timer"), BinOp::Ge, Expr::int(60)),
                |r| r.change_scene("level"),
            )
        })
        .unwrap();
    let ai_update = rec.record(|r| r.call("think", vec![])).unwrap();

    let game = Game::new("round-trip")
        .with_variable("timer", VarType::U8, 0)
        .with_entity(EntityDef::new("hero", "player", 8, 8))
        .with_scene(SceneDef::new("title").on_frame(on_frame))
        .with_scene(SceneDef::new("level"))
        .with_state_machine(
            StateMachineDef::new("ai", "idle").state(StateDef {
                on_update: ai_update,
                ..StateDef::new("idle")
            }),
        );

    let back = Game::from_json(&game.to_json().unwrap()).unwrap();
    assert_eq!(back, game);
}

#[test]
fn test_grid_asymmetry_survives_serialization() {
    let mut grid = NavGrid::open(8, 8).unwrap();
    grid.set_weight((2, 2), 0);
    grid.set_walkable((2, 2), true);
    let json = serde_json::to_string(&grid).unwrap();
    let back: NavGrid = serde_json::from_str(&json).unwrap();
    back.validate().unwrap();
    assert!(back.is_walkable((2, 2)));
    assert_eq!(back.weight((2, 2)), 0);
}

#[test]
fn test_recording_is_deterministic() {
    let build = || {
        let mut rec = Recorder::new();
        let block = knockback_block(&mut rec);
        let stmts = rec.record(|r| r.expand(&block, &[Expr::int(2)])).unwrap();
        serde_json::to_string(&stmts).unwrap()
    };
    let first = build();
    for i in 0..100 {
        assert_eq!(build(), first, "recording differed on iteration {i}");
    }
}
