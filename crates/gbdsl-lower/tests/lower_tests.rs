//! Integration tests for the gbdsl lowering engine.
//!
//! Tests validate:
//! - Folding is idempotent and stays in the destination's numeric domain
//! - Emitted expressions keep their meaning under C precedence
//! - Recorded handlers and expanded logic blocks lower with source-map entries
//! - The host A* search returns valid, deterministic paths
//! - The host physics step separates by mass and rests bodies on static floors

use gbdsl_ir::game::{EntityDef, SceneDef, VarType};
use gbdsl_ir::nav::{Heuristic, NavGrid, PathfinderConfig, Tile};
use gbdsl_ir::physics::{CollisionPair, PhysicsBody, PhysicsWorld};
use gbdsl_ir::{AssignOp, BinOp, Expr, Fixed, Game, LogicBlock, NumericDomain, Recorder, UnaryOp};
use gbdsl_lower::stmt::lower_block;
use gbdsl_lower::subsystems::collision::aabb_overlap;
use gbdsl_lower::subsystems::pathfind::{search, SearchOutcome};
use gbdsl_lower::subsystems::physics::{Body, Hit, Simulation};
use gbdsl_lower::{emit_expr, Folder, LowerContext, LowerOptions, SymbolTable};

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

fn v(name: &str) -> Expr {
    Expr::var(name)
}

fn bin(l: Expr, op: BinOp, r: Expr) -> Expr {
    Expr::binary(l, op, r)
}

const DOMAINS: [NumericDomain; 4] = [
    NumericDomain::U8,
    NumericDomain::I8,
    NumericDomain::U16,
    NumericDomain::I16,
];

fn arcade() -> Game {
    Game::new("arcade")
        .with_variable("score", VarType::U16, 0)
        .with_variable("lives", VarType::U8, 3)
        .with_array("hp", VarType::U8, 4, vec![])
        .with_scene(SceneDef::new("title"))
        .with_scene(SceneDef::new("play"))
}

fn config(diagonal: bool, heuristic: Heuristic) -> PathfinderConfig {
    PathfinderConfig {
        diagonal,
        heuristic,
        max_iterations: 256,
    }
}

/// Each step moves to a walkable neighbour and never squeezes between two
/// blocked orthogonal tiles.
fn assert_valid_path(grid: &NavGrid, start: Tile, goal: Tile, path: &[Tile], diagonal: bool) {
    assert_eq!(path.last(), Some(&goal), "path must end at the goal");
    let mut prev = start;
    for &tile in path {
        assert!(grid.is_walkable(tile), "{tile:?} is blocked");
        let dx = (tile.0 as i16 - prev.0 as i16).abs();
        let dy = (tile.1 as i16 - prev.1 as i16).abs();
        assert!(dx <= 1 && dy <= 1 && dx + dy > 0, "{prev:?} -> {tile:?} is not a step");
        if dx + dy == 2 {
            assert!(diagonal, "diagonal step in cardinal mode");
            assert!(grid.is_walkable((tile.0, prev.1)), "corner cut at {prev:?} -> {tile:?}");
            assert!(grid.is_walkable((prev.0, tile.1)), "corner cut at {prev:?} -> {tile:?}");
        }
        prev = tile;
    }
}

fn rect(b: &Body) -> (i16, i16, u8, u8) {
    (b.x, b.y, b.width, b.height)
}

// ══════════════════════════════════════════════════════════════════════════════
// Folding & emission
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_fold_wraps_in_destination_domain() {
    let e = bin(Expr::int(255), BinOp::Add, Expr::int(2));
    assert_eq!(Folder::new(NumericDomain::U8).simplify(&e), Expr::int(1));
    assert_eq!(Folder::new(NumericDomain::U16).simplify(&e), Expr::int(257));
}

#[test]
fn test_fold_leaves_division_by_zero() {
    let e = bin(Expr::int(10), BinOp::Div, Expr::int(0));
    for domain in DOMAINS {
        assert_eq!(Folder::new(domain).fold(&e), None);
    }
}

#[test]
fn test_fold_strength_reduction_for_powers_of_two_only() {
    let f = Folder::new(NumericDomain::U8);
    assert_eq!(emit_expr(&f.simplify(&bin(v("x"), BinOp::Mul, Expr::int(4)))), "x << 2");
    assert_eq!(emit_expr(&f.simplify(&bin(v("x"), BinOp::Div, Expr::int(8)))), "x >> 3");
    assert_eq!(f.fold(&bin(v("x"), BinOp::Mul, Expr::int(3))), None);
}

#[test]
fn test_fold_is_idempotent_across_domains() {
    let samples = [
        bin(bin(v("x"), BinOp::Mul, Expr::int(1)), BinOp::Add, bin(Expr::int(2), BinOp::Mul, Expr::int(64))),
        bin(v("x"), BinOp::Sub, v("x")),
        Expr::unary(UnaryOp::Not, Expr::unary(UnaryOp::Not, bin(v("a"), BinOp::Lt, Expr::int(3)))),
        Expr::ternary(bin(Expr::int(1), BinOp::Eq, Expr::int(1)), v("a"), v("b")),
        Expr::index("hp", bin(v("i"), BinOp::Div, Expr::int(2))),
        bin(Expr::call("rand", vec![]), BinOp::Mul, Expr::int(0)),
    ];
    for domain in DOMAINS {
        let f = Folder::new(domain);
        for e in &samples {
            let once = f.simplify(e);
            assert_eq!(f.simplify(&once), once, "{e:?} in {domain:?}");
        }
    }
}

#[test]
fn test_emission_keeps_meaning() {
    let cases = [
        (bin(bin(v("a"), BinOp::Add, v("b")), BinOp::Mul, v("c")), "(a + b) * c"),
        (bin(v("a"), BinOp::Add, bin(v("b"), BinOp::Mul, v("c"))), "a + b * c"),
        (bin(v("a"), BinOp::Sub, bin(v("b"), BinOp::Sub, v("c"))), "a - (b - c)"),
        (
            bin(bin(v("a"), BinOp::BitAnd, v("m")), BinOp::Eq, Expr::int(0)),
            "(a & m) == 0",
        ),
    ];
    for (expr, c) in cases {
        assert_eq!(emit_expr(&expr), c);
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Recording → lowering
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_recorded_handler_lowers_with_source_map() {
    let mut rec = Recorder::new();
    let reward = LogicBlock::record(&mut rec, "reward", &["amount"], |r| {
        r.compound("score", AssignOp::Add, bin(v("amount"), BinOp::Mul, Expr::int(4)))
    })
    .unwrap();
    let frame = rec
        .record(|r| {
            r.expand(&reward, &[Expr::int(5)])?;
            r.expand(&reward, &[v("bonus")])?;
            r.when(bin(v("lives"), BinOp::Eq, Expr::int(0)), |r| r.change_scene("title"))?;
            r.otherwise(|r| r.compound("lives", AssignOp::Sub, 1))
        })
        .unwrap();

    let game = arcade();
    let symbols = SymbolTable::build(&game);
    let mut ctx = LowerContext::new(&game, &symbols, LowerOptions::default());
    ctx.function("scene_play_frame", "void scene_play_frame(void)", |ctx| {
        lower_block(ctx, &frame)
    })
    .unwrap();

    let expected = "\
void scene_play_frame(void) {
    score += 20;
    score += bonus << 2;
    if (lives == 0) {
        change_scene(SCENE_TITLE);
    } else {
        lives -= 1;
    }
}

";
    assert_eq!(ctx.out.as_str(), expected);
    assert!(!ctx.diagnostics.has_errors());

    let lines: Vec<u32> = ctx.source_map.entries.iter().map(|e| e.emitted_line).collect();
    assert_eq!(lines, vec![2, 3, 4, 5, 7]);
    for entry in &ctx.source_map.entries {
        assert!(entry.origin_file.ends_with("lower_tests.rs"), "{}", entry.origin_file);
        assert_eq!(entry.symbol.as_deref(), Some("scene_play_frame"));
    }
    // both expansions point back at the block's single recorded statement
    assert_eq!(
        ctx.source_map.entries[0].origin_line,
        ctx.source_map.entries[1].origin_line
    );
}

#[test]
fn test_unknown_scene_in_handler_is_collected_not_fatal() {
    let mut rec = Recorder::new();
    let stmts = rec
        .record(|r| {
            r.change_scene("credits")?;
            r.assign("lives", 3)
        })
        .unwrap();
    let game = arcade();
    let symbols = SymbolTable::build(&game);
    let mut ctx = LowerContext::new(&game, &symbols, LowerOptions::default());
    lower_block(&mut ctx, &stmts).unwrap();
    assert_eq!(ctx.diagnostics.total_errors, 1);
    assert!(ctx.out.as_str().contains("/* error V100: unknown scene 'credits' */"));
    assert!(ctx.out.as_str().contains("lives = 3;"));
}

// ══════════════════════════════════════════════════════════════════════════════
// Pathfinding
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_open_grid_paths() {
    let grid = NavGrid::open(3, 3).unwrap();
    let diag = search(&grid, (0, 0), (2, 2), &config(true, Heuristic::Chebyshev));
    assert_eq!(diag.path(), Some(&[(1, 1), (2, 2)][..]));
    let card = search(&grid, (0, 0), (2, 2), &config(false, Heuristic::Manhattan));
    assert_eq!(card.path().map(<[Tile]>::len), Some(4));
}

#[test]
fn test_maze_paths_are_valid_in_both_modes() {
    let grid = NavGrid::from_rows(&[
        "..#.....",
        "..#.##..",
        "....#...",
        "###.#.#.",
        "....#.#.",
        ".##...#.",
    ])
    .unwrap();
    let (start, goal) = ((0, 0), (7, 5));
    for (diagonal, heuristic) in [(false, Heuristic::Manhattan), (true, Heuristic::Chebyshev)] {
        let out = search(&grid, start, goal, &config(diagonal, heuristic));
        let path = out.path().unwrap_or_else(|| panic!("no path: {out:?}"));
        assert_valid_path(&grid, start, goal, path, diagonal);
    }
}

#[test]
fn test_search_is_deterministic() {
    let grid = NavGrid::from_rows(&["....#", ".##.#", "...2.", "#.#..", "....."]).unwrap();
    let cfg = config(true, Heuristic::Manhattan);
    let first = search(&grid, (0, 0), (4, 4), &cfg);
    for _ in 0..100 {
        assert_eq!(search(&grid, (0, 0), (4, 4), &cfg), first);
    }
}

#[test]
fn test_budget_exhaustion_is_not_a_path() {
    let grid = NavGrid::open(8, 8).unwrap();
    let cfg = PathfinderConfig {
        max_iterations: 1,
        ..config(false, Heuristic::Manhattan)
    };
    let out = search(&grid, (0, 0), (7, 7), &cfg);
    assert_eq!(out, SearchOutcome::BudgetExhausted);
    assert!(!out.is_found());
}

// ══════════════════════════════════════════════════════════════════════════════
// Physics
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_three_to_one_separation() {
    let mut world = PhysicsWorld::default();
    world.bodies.push(PhysicsBody::new("light", 1));
    world.bodies.push(PhysicsBody::new("heavy", 3));
    world.collisions.push(CollisionPair::solid("a", "b"));
    let game = Game::new("t")
        .with_entity(EntityDef::new("light", "a", 8, 8).at(0, 0))
        .with_entity(EntityDef::new("heavy", "b", 8, 8).at(4, 0))
        .with_physics(world);
    let mut sim = Simulation::new(&game).unwrap();
    assert_eq!(sim.step(), vec![Hit { pair: 0, a: 0, b: 1 }]);
    assert_eq!(sim.body(0).x, -3);
    assert_eq!(sim.body(1).x, 5);
}

#[test]
fn test_falling_box_rests_on_static_floor() {
    let world = PhysicsWorld {
        gravity: Fixed(64),
        bodies: vec![PhysicsBody::new("crate", 2)],
        collisions: vec![CollisionPair::solid("box", "ground")],
        ..PhysicsWorld::default()
    };
    let game = Game::new("t")
        .with_entity(EntityDef::new("crate", "box", 8, 8).at(28, 0))
        .with_entity(EntityDef::new("floor", "ground", 64, 8).at(0, 40))
        .with_physics(world);
    let mut sim = Simulation::new(&game).unwrap();
    for _ in 0..120 {
        sim.step();
        assert!(!aabb_overlap(rect(sim.body(0)), rect(sim.body(1))));
        assert_eq!((sim.body(1).x, sim.body(1).y), (0, 40));
    }
    assert_eq!(sim.body(0).y, 32);
    assert_eq!(sim.body(0).x, 28);
}

#[test]
fn test_simulation_is_deterministic() {
    let world = PhysicsWorld {
        gravity: Fixed(40),
        bounce: Fixed(128),
        bodies: vec![PhysicsBody::new("ball", 1), PhysicsBody::new("crate", 4)],
        collisions: vec![CollisionPair::solid("ball", "crate"), CollisionPair::solid("ball", "ground")],
        ..PhysicsWorld::default()
    };
    let game = Game::new("t")
        .with_entity(EntityDef::new("ball", "ball", 4, 4).at(10, 0))
        .with_entity(EntityDef::new("crate", "crate", 8, 8).at(8, 20))
        .with_entity(EntityDef::new("floor", "ground", 64, 8).at(0, 48))
        .with_physics(world);
    let run = || {
        let mut sim = Simulation::new(&game).unwrap();
        let hits: Vec<Vec<Hit>> = (0..90).map(|_| sim.step()).collect();
        (sim.bodies().to_vec(), hits)
    };
    let first = run();
    for _ in 0..20 {
        assert_eq!(run(), first);
    }
}
