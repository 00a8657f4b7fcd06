//! Fixed-point physics: integration, pairwise collision and response.
//!
//! Velocities are 8.8 fixed point; positions are whole pixels and advance
//! by `velocity >> 8` each frame. An instance takes part in integration
//! only if its entity has a physics body. Instances without one still
//! collide, as immovable obstacles.
//!
//! [`Simulation`] runs the same arithmetic on the host, operation for
//! operation, so tests and tools can predict the target.

use gbdsl_ir::physics::{CollisionPair, PhysicsBody, PhysicsWorld};
use gbdsl_ir::{Fixed, Game, IrError};
use tracing::debug;

use super::collision::aabb_overlap;
use super::pool::column;
use crate::context::LowerContext;
use crate::error::LowerResult;
use crate::stmt::lower_block;
use crate::symbols::{tag_const, SymbolTable};

/// Full scale of a separation or bounce ratio.
const RATIO_ONE: u16 = 256;

fn body_for<'w>(world: &'w PhysicsWorld, entity: &str) -> Option<&'w PhysicsBody> {
    world.bodies.iter().find(|b| b.entity == entity)
}

fn check_bodies(world: &PhysicsWorld) -> LowerResult<()> {
    for b in &world.bodies {
        if b.mass == 0 {
            return Err(IrError::invalid(format!(
                "physics body '{}' has mass 0; leave the body out for a static obstacle",
                b.entity
            ))
            .into());
        }
        // The clamp runs over -max..=max, which needs a non-negative,
        // negatable bound.
        for (axis, max) in [("x", b.max_vx), ("y", b.max_vy)] {
            if max.raw() < 0 {
                return Err(IrError::invalid(format!(
                    "physics body '{}' has negative max velocity on {axis}: {max}",
                    b.entity
                ))
                .into());
            }
        }
    }
    Ok(())
}

/// Portions of the overlap that `a` and `b` each move, out of 256.
/// The lighter body moves more; a massless (static) body never moves.
pub fn separation_ratios(ma: u8, mb: u8) -> Option<(u16, u16)> {
    match (ma, mb) {
        (0, 0) => None,
        (0, _) => Some((0, RATIO_ONE)),
        (_, 0) => Some((RATIO_ONE, 0)),
        _ => {
            let total = ma as u16 + mb as u16;
            Some((((mb as u16) << 8) / total, ((ma as u16) << 8) / total))
        }
    }
}

/// Velocity after bouncing off an obstacle. A body that moved its full
/// share of the overlap or more keeps the full bounce; one that moved less
/// keeps proportionally less.
pub fn bounce(v: i16, coefficient: Fixed, ratio: u16) -> i16 {
    let scale = (ratio as i32 * 2).min(RATIO_ONE as i32);
    (-((((v as i32 * coefficient.raw() as i32) >> 8) * scale) >> 8)) as i16
}

// ══════════════════════════════════════════════════════════════════════════════
// Host simulation
// ══════════════════════════════════════════════════════════════════════════════

/// One slot of the instance table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Body {
    pub x: i16,
    pub y: i16,
    /// 8.8 velocity.
    pub vx: i16,
    pub vy: i16,
    pub width: u8,
    pub height: u8,
    pub tag: String,
    /// 0 for instances without a physics body.
    pub mass: u8,
    pub friction: Fixed,
    pub max_vx: Fixed,
    pub max_vy: Fixed,
    pub active: bool,
}

impl Body {
    fn rect(&self) -> (i16, i16, u8, u8) {
        (self.x, self.y, self.width, self.height)
    }
}

/// An overlapping pair found during a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit {
    /// Index into the world's collision pairs.
    pub pair: usize,
    pub a: usize,
    pub b: usize,
}

/// The generated physics, run on the host.
#[derive(Debug, Clone)]
pub struct Simulation {
    world: PhysicsWorld,
    bodies: Vec<Body>,
}

impl Simulation {
    /// Build the instance table of `game` with its physics parameters.
    pub fn new(game: &Game) -> LowerResult<Self> {
        let world = game.physics.clone().unwrap_or_default();
        check_bodies(&world)?;
        let symbols = SymbolTable::build(game);
        let bodies = symbols
            .instances()
            .iter()
            .map(|inst| {
                let body = body_for(&world, &inst.entity);
                Body {
                    x: inst.x,
                    y: inst.y,
                    vx: 0,
                    vy: 0,
                    width: inst.width,
                    height: inst.height,
                    tag: inst.tag.clone(),
                    mass: body.map_or(0, |b| b.mass),
                    friction: body.and_then(|b| b.friction).unwrap_or(world.friction),
                    max_vx: body.map_or(Fixed(i16::MAX), |b| b.max_vx),
                    max_vy: body.map_or(Fixed(i16::MAX), |b| b.max_vy),
                    active: inst.pool.is_none(),
                }
            })
            .collect();
        Ok(Self { world, bodies })
    }

    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    pub fn body(&self, index: usize) -> &Body {
        &self.bodies[index]
    }

    pub fn body_mut(&mut self, index: usize) -> &mut Body {
        &mut self.bodies[index]
    }

    /// Advance one frame; returns every overlapping pair in the order the
    /// generated code visits them.
    pub fn step(&mut self) -> Vec<Hit> {
        self.integrate();
        self.collide()
    }

    fn gravity_at(&self, x: i16, y: i16) -> Fixed {
        self.world
            .zones
            .iter()
            .find(|z| z.contains(x, y))
            .map_or(self.world.gravity, |z| z.gravity)
    }

    fn integrate(&mut self) {
        for i in 0..self.bodies.len() {
            if !self.bodies[i].active || self.bodies[i].mass == 0 {
                continue;
            }
            let gravity = self.gravity_at(self.bodies[i].x, self.bodies[i].y);
            let b = &mut self.bodies[i];
            b.vy = b.vy.wrapping_add(gravity.raw());
            b.vx = b.friction.scale(b.vx);
            b.vx = b.vx.clamp(-b.max_vx.raw(), b.max_vx.raw());
            b.vy = b.vy.clamp(-b.max_vy.raw(), b.max_vy.raw());
            b.x = b.x.wrapping_add(b.vx >> 8);
            b.y = b.y.wrapping_add(b.vy >> 8);
        }
    }

    fn collide(&mut self) -> Vec<Hit> {
        let mut hits = Vec::new();
        let n = self.bodies.len();
        for (p, pair) in self.world.collisions.clone().iter().enumerate() {
            let same = pair.tag_a == pair.tag_b;
            for a in 0..n {
                if !self.bodies[a].active || self.bodies[a].tag != pair.tag_a {
                    continue;
                }
                let first = if same { a + 1 } else { 0 };
                for b in first..n {
                    if b == a || !self.bodies[b].active || self.bodies[b].tag != pair.tag_b {
                        continue;
                    }
                    if !aabb_overlap(self.bodies[a].rect(), self.bodies[b].rect()) {
                        continue;
                    }
                    if pair.solid {
                        self.separate(a, b);
                    }
                    hits.push(Hit { pair: p, a, b });
                }
            }
        }
        hits
    }

    fn separate(&mut self, a: usize, b: usize) {
        let Some((ra, rb)) = separation_ratios(self.bodies[a].mass, self.bodies[b].mass) else {
            return;
        };
        let coefficient = self.world.bounce;
        let (ba, bb) = (&self.bodies[a], &self.bodies[b]);
        let dx = (bb.x as i32 * 2 + bb.width as i32) - (ba.x as i32 * 2 + ba.width as i32);
        let dy = (bb.y as i32 * 2 + bb.height as i32) - (ba.y as i32 * 2 + ba.height as i32);
        let horizontal = dx.abs() > dy.abs();
        let (overlap, toward_b) = if horizontal {
            let hi = (ba.x as i32 + ba.width as i32).min(bb.x as i32 + bb.width as i32);
            (hi - (ba.x as i32).max(bb.x as i32), dx >= 0)
        } else {
            let hi = (ba.y as i32 + ba.height as i32).min(bb.y as i32 + bb.height as i32);
            (hi - (ba.y as i32).max(bb.y as i32), dy >= 0)
        };
        let move_a = ((overlap * ra as i32) >> 8) as i16;
        let move_b = ((overlap * rb as i32) >> 8) as i16;
        // `a` is pushed away from `b`: negative when `b` lies ahead.
        let sign: i16 = if toward_b { 1 } else { -1 };

        let (pa, va) = axis(&mut self.bodies[a], horizontal);
        *pa = pa.wrapping_sub(sign * move_a);
        if va.signum() == sign {
            *va = bounce(*va, coefficient, ra);
        }
        let (pb, vb) = axis(&mut self.bodies[b], horizontal);
        *pb = pb.wrapping_add(sign * move_b);
        if vb.signum() == -sign {
            *vb = bounce(*vb, coefficient, rb);
        }
    }
}

fn axis(body: &mut Body, horizontal: bool) -> (&mut i16, &mut i16) {
    if horizontal {
        (&mut body.x, &mut body.vx)
    } else {
        (&mut body.y, &mut body.vy)
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Emission
// ══════════════════════════════════════════════════════════════════════════════

pub fn prototypes(ctx: &LowerContext<'_>) -> Vec<String> {
    if ctx.game.physics.is_some() {
        vec!["void physics_step(void);".to_string()]
    } else {
        Vec::new()
    }
}

pub fn emit(ctx: &mut LowerContext<'_>) -> LowerResult<()> {
    let (game, symbols) = (ctx.game, ctx.symbols);
    let Some(world) = &game.physics else {
        return Ok(());
    };
    check_bodies(world)?;
    ctx.banner();
    if symbols.instance_count() == 0 {
        ctx.function("physics_step", "void physics_step(void)", |_| Ok(()))?;
        return Ok(());
    }
    emit_tables(ctx, world);
    emit_integrate(ctx, world)?;
    emit_separate(ctx)?;
    emit_collide(ctx, world)?;
    ctx.function("physics_step", "void physics_step(void)", |ctx| {
        ctx.out.line("physics_integrate();");
        ctx.out.line("physics_collide();");
        Ok(())
    })?;
    debug!(
        bodies = world.bodies.len(),
        zones = world.zones.len(),
        pairs = world.collisions.len(),
        "physics emitted"
    );
    Ok(())
}

fn emit_tables(ctx: &mut LowerContext<'_>, world: &PhysicsWorld) {
    let symbols = ctx.symbols;
    let instances = symbols.instances();
    let body = |entity: &str| body_for(world, entity);

    ctx.out
        .line(format!("#define PHYS_GRAVITY {}", world.gravity.raw()));
    ctx.out
        .line(format!("#define PHYS_FRICTION {}", world.friction.raw()));
    ctx.out
        .line(format!("#define PHYS_BOUNCE {}", world.bounce.raw()));
    let mass = column(instances, |i| body(&i.entity).map_or(0, |b| b.mass).to_string());
    let friction = column(instances, |i| {
        body(&i.entity)
            .and_then(|b| b.friction)
            .map_or("PHYS_FRICTION".to_string(), |f| f.raw().to_string())
    });
    let max_vx = column(instances, |i| {
        body(&i.entity).map_or(i16::MAX, |b| b.max_vx.raw()).to_string()
    });
    let max_vy = column(instances, |i| {
        body(&i.entity).map_or(i16::MAX, |b| b.max_vy.raw()).to_string()
    });
    ctx.out
        .line(format!("const uint8_t phys_mass[MAX_ENTITIES] = {{{mass}}};"));
    ctx.out
        .line(format!("const int16_t phys_friction[MAX_ENTITIES] = {{{friction}}};"));
    ctx.out
        .line(format!("const int16_t phys_max_vx[MAX_ENTITIES] = {{{max_vx}}};"));
    ctx.out
        .line(format!("const int16_t phys_max_vy[MAX_ENTITIES] = {{{max_vy}}};"));

    if !world.zones.is_empty() {
        let zones = &world.zones;
        let list = |f: &dyn Fn(usize) -> String| (0..zones.len()).map(f).collect::<Vec<_>>().join(", ");
        ctx.out
            .line(format!("#define PHYS_ZONE_COUNT {}", zones.len()));
        ctx.out.line(format!(
            "const int16_t phys_zone_x[PHYS_ZONE_COUNT] = {{{}}};",
            list(&|z| zones[z].x.to_string())
        ));
        ctx.out.line(format!(
            "const int16_t phys_zone_y[PHYS_ZONE_COUNT] = {{{}}};",
            list(&|z| zones[z].y.to_string())
        ));
        ctx.out.line(format!(
            "const uint16_t phys_zone_w[PHYS_ZONE_COUNT] = {{{}}};",
            list(&|z| zones[z].width.to_string())
        ));
        ctx.out.line(format!(
            "const uint16_t phys_zone_h[PHYS_ZONE_COUNT] = {{{}}};",
            list(&|z| zones[z].height.to_string())
        ));
        ctx.out.line(format!(
            "const int16_t phys_zone_g[PHYS_ZONE_COUNT] = {{{}}};",
            list(&|z| zones[z].gravity.raw().to_string())
        ));
    }
    ctx.out.blank();
}

fn emit_integrate(ctx: &mut LowerContext<'_>, world: &PhysicsWorld) -> LowerResult<()> {
    ctx.function(
        "phys_gravity_at",
        "static int16_t phys_gravity_at(int16_t x, int16_t y)",
        |ctx| {
            if world.zones.is_empty() {
                ctx.out.line("(void)x;");
                ctx.out.line("(void)y;");
            } else {
                ctx.out.line("uint8_t z;");
                ctx.out.open("for (z = 0; z < PHYS_ZONE_COUNT; z++)");
                ctx.out.line("if (x >= phys_zone_x[z] && (int32_t)x < (int32_t)phys_zone_x[z] + phys_zone_w[z] &&");
                ctx.out.line("    y >= phys_zone_y[z] && (int32_t)y < (int32_t)phys_zone_y[z] + phys_zone_h[z])");
                ctx.out.line("    return phys_zone_g[z];");
                ctx.out.close();
            }
            ctx.out.line("return PHYS_GRAVITY;");
            Ok(())
        },
    )?;
    ctx.function(
        "physics_integrate",
        "static void physics_integrate(void)",
        |ctx| {
            ctx.out.line("uint8_t i;");
            ctx.out.open("for (i = 0; i < MAX_ENTITIES; i++)");
            ctx.out
                .line("if (!ent_active[i] || phys_mass[i] == 0) continue;");
            ctx.out
                .line("ent_vy[i] += phys_gravity_at(ent_x[i], ent_y[i]);");
            ctx.out
                .line("ent_vx[i] = (int16_t)(((int32_t)ent_vx[i] * phys_friction[i]) >> 8);");
            for v in ["vx", "vy"] {
                ctx.out.line(format!(
                    "if (ent_{v}[i] > phys_max_{v}[i]) ent_{v}[i] = phys_max_{v}[i];"
                ));
                ctx.out.line(format!(
                    "if (ent_{v}[i] < -phys_max_{v}[i]) ent_{v}[i] = -phys_max_{v}[i];"
                ));
            }
            ctx.out.line("ent_x[i] += ent_vx[i] >> 8;");
            ctx.out.line("ent_y[i] += ent_vy[i] >> 8;");
            ctx.out.close();
            Ok(())
        },
    )
}

fn emit_separate(ctx: &mut LowerContext<'_>) -> LowerResult<()> {
    ctx.function(
        "phys_bounce",
        "static int16_t phys_bounce(int16_t v, uint16_t ratio)",
        |ctx| {
            ctx.out.line("int32_t scale = (int32_t)ratio * 2;");
            ctx.out.line("if (scale > 256) scale = 256;");
            ctx.out
                .line("return (int16_t)-(((((int32_t)v * PHYS_BOUNCE) >> 8) * scale) >> 8);");
            Ok(())
        },
    )?;
    ctx.function(
        "physics_separate",
        "static void physics_separate(uint8_t a, uint8_t b)",
        |ctx| {
            let o = &mut ctx.out;
            o.line("uint8_t ma = phys_mass[a];");
            o.line("uint8_t mb = phys_mass[b];");
            o.line("uint16_t ra, rb;");
            o.line("int32_t dx, dy, lo, hi, overlap;");
            o.line("int16_t move_a, move_b;");
            o.line("if (ma == 0 && mb == 0) return;");
            o.open("if (ma == 0)");
            o.line("ra = 0;");
            o.line("rb = 256;");
            o.reopen("} else if (mb == 0) {");
            o.line("ra = 256;");
            o.line("rb = 0;");
            o.reopen("} else {");
            o.line("ra = ((uint16_t)mb << 8) / (ma + mb);");
            o.line("rb = ((uint16_t)ma << 8) / (ma + mb);");
            o.close();
            o.line("dx = ((int32_t)ent_x[b] * 2 + ent_w[b]) - ((int32_t)ent_x[a] * 2 + ent_w[a]);");
            o.line("dy = ((int32_t)ent_y[b] * 2 + ent_h[b]) - ((int32_t)ent_y[a] * 2 + ent_h[a]);");
            for (axis, size, delta, vel) in [("x", "w", "dx", "vx"), ("y", "h", "dy", "vy")] {
                if axis == "x" {
                    o.open("if ((dx < 0 ? -dx : dx) > (dy < 0 ? -dy : dy))");
                } else {
                    o.reopen("} else {");
                }
                o.line(format!(
                    "hi = (int32_t)ent_{axis}[a] + ent_{size}[a] < (int32_t)ent_{axis}[b] + ent_{size}[b] \
                     ? (int32_t)ent_{axis}[a] + ent_{size}[a] : (int32_t)ent_{axis}[b] + ent_{size}[b];"
                ));
                o.line(format!(
                    "lo = ent_{axis}[a] > ent_{axis}[b] ? ent_{axis}[a] : ent_{axis}[b];"
                ));
                o.line("overlap = hi - lo;");
                o.line("move_a = (int16_t)((overlap * ra) >> 8);");
                o.line("move_b = (int16_t)((overlap * rb) >> 8);");
                o.open(format!("if ({delta} >= 0)"));
                o.line(format!("ent_{axis}[a] -= move_a;"));
                o.line(format!("ent_{axis}[b] += move_b;"));
                o.line(format!(
                    "if (ent_{vel}[a] > 0) ent_{vel}[a] = phys_bounce(ent_{vel}[a], ra);"
                ));
                o.line(format!(
                    "if (ent_{vel}[b] < 0) ent_{vel}[b] = phys_bounce(ent_{vel}[b], rb);"
                ));
                o.reopen("} else {");
                o.line(format!("ent_{axis}[a] += move_a;"));
                o.line(format!("ent_{axis}[b] -= move_b;"));
                o.line(format!(
                    "if (ent_{vel}[a] < 0) ent_{vel}[a] = phys_bounce(ent_{vel}[a], ra);"
                ));
                o.line(format!(
                    "if (ent_{vel}[b] > 0) ent_{vel}[b] = phys_bounce(ent_{vel}[b], rb);"
                ));
                o.close();
            }
            o.close();
            Ok(())
        },
    )
}

fn emit_collide(ctx: &mut LowerContext<'_>, world: &PhysicsWorld) -> LowerResult<()> {
    let symbols = ctx.symbols;
    // Pairs naming a tag nobody carries are reported by validation.
    let pairs: Vec<&CollisionPair> = world
        .collisions
        .iter()
        .filter(|p| symbols.has_tag(&p.tag_a) && symbols.has_tag(&p.tag_b))
        .collect();
    ctx.function(
        "physics_collide",
        "static void physics_collide(void)",
        |ctx| {
            if pairs.is_empty() {
                return Ok(());
            }
            ctx.out.line("uint8_t hit_a, hit_b;");
            for pair in &pairs {
                let (ta, tb) = (tag_const(&pair.tag_a), tag_const(&pair.tag_b));
                let first = if pair.tag_a == pair.tag_b { "hit_a + 1" } else { "0" };
                ctx.out.line(format!("/* {} / {} */", pair.tag_a, pair.tag_b));
                ctx.out.open("for (hit_a = 0; hit_a < MAX_ENTITIES; hit_a++)");
                ctx.out
                    .line(format!("if (!ent_active[hit_a] || ent_tag[hit_a] != {ta}) continue;"));
                ctx.out
                    .open(format!("for (hit_b = {first}; hit_b < MAX_ENTITIES; hit_b++)"));
                ctx.out.line(format!(
                    "if (hit_b == hit_a || !ent_active[hit_b] || ent_tag[hit_b] != {tb}) continue;"
                ));
                ctx.out.line(
                    "if (!aabb_overlap(ent_x[hit_a], ent_y[hit_a], ent_w[hit_a], ent_h[hit_a],",
                );
                ctx.out.line(
                    "                  ent_x[hit_b], ent_y[hit_b], ent_w[hit_b], ent_h[hit_b])) continue;",
                );
                if pair.solid {
                    ctx.out.line("physics_separate(hit_a, hit_b);");
                }
                lower_block(ctx, &pair.on_hit)?;
                ctx.out.close();
                ctx.out.close();
            }
            Ok(())
        },
    )
}
