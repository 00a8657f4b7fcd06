//! Bounded A* over navigation grids.
//!
//! The generated routine works in fixed memory: a node table of
//! [`ASTAR_MAX_NODES`] entries, a binary min-heap of `(f, node)` entries, and
//! a 32×32 closed bitset. Each node record packs
//! `(tile << 6) | parent` into one word. [`search`] mirrors that routine step
//! for step, so the host can predict exactly what the target will return.
//!
//! Neighbors are visited N, E, S, W, or clockwise from N with diagonals.
//! Diagonal moves never cut a blocked corner. Entering a tile costs its
//! weight (1 without a weight layer).

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use gbdsl_ir::nav::{Heuristic, NavGrid, NavGridDef, PathfinderConfig, Tile};
use tracing::debug;

use crate::context::LowerContext;
use crate::error::LowerResult;
use crate::symbols::{c_ident, upper_ident};

/// Node table capacity; parents are 6-bit indices.
pub const ASTAR_MAX_NODES: usize = 64;
/// Open-set capacity. Improved nodes are pushed again, so the heap can hold
/// more entries than there are nodes.
pub const ASTAR_HEAP_SIZE: usize = 128;

/// Direction offsets clockwise from north.
const DIRECTIONS: [(i8, i8); 8] = [
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
];

/// One entry of the node table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Node {
    /// Row-major tile index.
    pub tile: u16,
    /// Index of the node this one was reached from; the start is its own
    /// parent.
    pub parent: u8,
    pub g: u16,
    pub f: u16,
}

impl Node {
    /// The packed word stored by the generated code.
    pub fn pack(&self) -> u16 {
        (self.tile << 6) | (self.parent as u16 & 0x3F)
    }

    /// `(tile, parent)` of a packed word.
    pub fn unpack(word: u16) -> (u16, u8) {
        (word >> 6, (word & 0x3F) as u8)
    }
}

/// How a search ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Tiles from the first step to the goal; empty when start is the goal.
    Found(Vec<Tile>),
    /// The open set ran dry, or start or goal is blocked.
    NoPath,
    /// The iteration budget ran out first.
    BudgetExhausted,
    /// The node table or open set overflowed.
    NodeTableFull,
}

impl SearchOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, SearchOutcome::Found(_))
    }

    pub fn path(&self) -> Option<&[Tile]> {
        match self {
            SearchOutcome::Found(path) => Some(path),
            _ => None,
        }
    }

    /// Status byte returned by the generated routine.
    pub fn status(&self) -> u8 {
        match self {
            SearchOutcome::Found(_) => 0,
            SearchOutcome::NoPath => 1,
            SearchOutcome::BudgetExhausted => 2,
            SearchOutcome::NodeTableFull => 3,
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Host search
// ══════════════════════════════════════════════════════════════════════════════

struct Closed([u32; 32]);

impl Closed {
    fn contains(&self, tile: u16) -> bool {
        self.0[(tile >> 5) as usize] & (1 << (tile & 31)) != 0
    }

    fn insert(&mut self, tile: u16) {
        self.0[(tile >> 5) as usize] |= 1 << (tile & 31);
    }
}

/// Run the bounded search the generated `astar_search` runs.
pub fn search(grid: &NavGrid, start: Tile, goal: Tile, config: &PathfinderConfig) -> SearchOutcome {
    if !grid.is_walkable(start) || !grid.is_walkable(goal) {
        return SearchOutcome::NoPath;
    }
    if start == goal {
        return SearchOutcome::Found(Vec::new());
    }
    let heuristic = config.heuristic;
    let goal_tile = grid.index(goal) as u16;

    let mut nodes: Vec<Node> = Vec::with_capacity(ASTAR_MAX_NODES);
    let mut heap: BinaryHeap<Reverse<(u16, u8)>> = BinaryHeap::with_capacity(ASTAR_HEAP_SIZE);
    let mut closed = Closed([0; 32]);

    let f = heuristic.estimate(start, goal);
    nodes.push(Node {
        tile: grid.index(start) as u16,
        parent: 0,
        g: 0,
        f,
    });
    heap.push(Reverse((f, 0)));

    let step = if config.diagonal { 1 } else { 2 };
    let mut iterations: u16 = 0;
    let current = loop {
        if heap.is_empty() {
            return SearchOutcome::NoPath;
        }
        if iterations >= config.max_iterations {
            return SearchOutcome::BudgetExhausted;
        }
        let Some(Reverse((_, cur))) = heap.pop() else {
            return SearchOutcome::NoPath;
        };
        iterations += 1;

        let node = nodes[cur as usize];
        if closed.contains(node.tile) {
            continue;
        }
        if node.tile == goal_tile {
            break cur;
        }
        closed.insert(node.tile);

        let (x, y) = grid.tile_at(node.tile as usize);
        for &(dx, dy) in DIRECTIONS.iter().step_by(step) {
            let next = (x.wrapping_add(dx as u8), y.wrapping_add(dy as u8));
            if !grid.is_walkable(next) {
                continue;
            }
            if dx != 0 && dy != 0 && (!grid.is_walkable((next.0, y)) || !grid.is_walkable((x, next.1))) {
                continue;
            }
            let tile = grid.index(next) as u16;
            if closed.contains(tile) {
                continue;
            }
            let g = node.g.wrapping_add(grid.weight(next) as u16);
            let slot = match nodes.iter().position(|n| n.tile == tile) {
                Some(k) if nodes[k].g <= g => continue,
                Some(k) => k,
                None if nodes.len() == ASTAR_MAX_NODES => return SearchOutcome::NodeTableFull,
                None => {
                    nodes.push(Node {
                        tile,
                        parent: cur,
                        g,
                        f: 0,
                    });
                    nodes.len() - 1
                }
            };
            if heap.len() == ASTAR_HEAP_SIZE {
                return SearchOutcome::NodeTableFull;
            }
            let f = g.wrapping_add(heuristic.estimate(next, goal));
            nodes[slot] = Node {
                tile,
                parent: cur,
                g,
                f,
            };
            heap.push(Reverse((f, slot as u8)));
        }
    };

    let mut path = Vec::new();
    let mut n = current as usize;
    while n != 0 {
        path.push(grid.tile_at(nodes[n].tile as usize));
        n = nodes[n].parent as usize;
    }
    path.reverse();
    SearchOutcome::Found(path)
}

// ══════════════════════════════════════════════════════════════════════════════
// Emission
// ══════════════════════════════════════════════════════════════════════════════

const SEARCH_SIGNATURE: &str = "uint8_t astar_search(const uint8_t *walk, const uint8_t *weights, \
                                uint8_t w, uint8_t h, uint8_t sx, uint8_t sy, uint8_t gx, uint8_t gy, \
                                uint8_t diagonal, uint8_t chebyshev, uint16_t max_iter)";

fn find_signature(grid: &NavGridDef) -> String {
    format!(
        "uint8_t nav_{}_find(uint8_t sx, uint8_t sy, uint8_t gx, uint8_t gy)",
        c_ident(&grid.name)
    )
}

pub fn prototypes(ctx: &LowerContext<'_>) -> Vec<String> {
    let grids = &ctx.game.nav_grids;
    if grids.is_empty() {
        return Vec::new();
    }
    let mut out = vec![format!("{SEARCH_SIGNATURE};")];
    out.extend(grids.iter().map(|g| format!("{};", find_signature(g))));
    out
}

pub fn emit(ctx: &mut LowerContext<'_>) -> LowerResult<()> {
    let game = ctx.game;
    if game.nav_grids.is_empty() {
        return Ok(());
    }
    for def in &game.nav_grids {
        def.grid.validate()?;
    }
    ctx.banner();
    emit_tables(ctx);
    emit_heap(ctx)?;
    emit_search(ctx)?;
    for def in &game.nav_grids {
        emit_grid(ctx, def)?;
    }
    Ok(())
}

fn emit_tables(ctx: &mut LowerContext<'_>) {
    ctx.out
        .line(format!("#define ASTAR_MAX_NODES {ASTAR_MAX_NODES}"));
    ctx.out
        .line(format!("#define ASTAR_HEAP_SIZE {ASTAR_HEAP_SIZE}"));
    ctx.out.line("#define ASTAR_FOUND 0");
    ctx.out.line("#define ASTAR_NO_PATH 1");
    ctx.out.line("#define ASTAR_BUDGET 2");
    ctx.out.line("#define ASTAR_FULL 3");
    ctx.out
        .line("static uint16_t astar_node[ASTAR_MAX_NODES]; /* (tile << 6) | parent */");
    ctx.out.line("static uint16_t astar_g[ASTAR_MAX_NODES];");
    ctx.out.line("static uint16_t astar_f[ASTAR_MAX_NODES];");
    ctx.out.line("static uint8_t astar_heap_n[ASTAR_HEAP_SIZE];");
    ctx.out.line("static uint16_t astar_heap_f[ASTAR_HEAP_SIZE];");
    ctx.out.line("static uint8_t astar_heap_len;");
    ctx.out.line("static uint32_t astar_closed[32];");
    ctx.out.line("uint8_t astar_path_x[ASTAR_MAX_NODES];");
    ctx.out.line("uint8_t astar_path_y[ASTAR_MAX_NODES];");
    ctx.out.line("uint8_t astar_path_len;");
    let dx: Vec<String> = DIRECTIONS.iter().map(|d| d.0.to_string()).collect();
    let dy: Vec<String> = DIRECTIONS.iter().map(|d| d.1.to_string()).collect();
    ctx.out.line(format!(
        "static const int8_t astar_dx[8] = {{{}}};",
        dx.join(", ")
    ));
    ctx.out.line(format!(
        "static const int8_t astar_dy[8] = {{{}}};",
        dy.join(", ")
    ));
    ctx.out.blank();
}

fn emit_heap(ctx: &mut LowerContext<'_>) -> LowerResult<()> {
    ctx.function(
        "astar_heap_before",
        "static uint8_t astar_heap_before(uint8_t i, uint16_t f, uint8_t n)",
        |ctx| {
            ctx.out.line(
                "return astar_heap_f[i] < f || (astar_heap_f[i] == f && astar_heap_n[i] < n);",
            );
            Ok(())
        },
    )?;
    ctx.function(
        "astar_push",
        "static void astar_push(uint8_t n, uint16_t f)",
        |ctx| {
            ctx.out.line("uint8_t i = astar_heap_len++;");
            ctx.out.line("uint8_t p;");
            ctx.out.open("while (i > 0)");
            ctx.out.line("p = (i - 1) >> 1;");
            ctx.out.line("if (astar_heap_before(p, f, n)) break;");
            ctx.out.line("astar_heap_n[i] = astar_heap_n[p];");
            ctx.out.line("astar_heap_f[i] = astar_heap_f[p];");
            ctx.out.line("i = p;");
            ctx.out.close();
            ctx.out.line("astar_heap_n[i] = n;");
            ctx.out.line("astar_heap_f[i] = f;");
            Ok(())
        },
    )?;
    ctx.function("astar_pop", "static uint8_t astar_pop(void)", |ctx| {
        ctx.out.line("uint8_t top = astar_heap_n[0];");
        ctx.out.line("uint8_t i = 0;");
        ctx.out.line("uint8_t c, ln;");
        ctx.out.line("uint16_t lf;");
        ctx.out.line("astar_heap_len--;");
        ctx.out.line("ln = astar_heap_n[astar_heap_len];");
        ctx.out.line("lf = astar_heap_f[astar_heap_len];");
        ctx.out.open("for (;;)");
        ctx.out.line("c = (i << 1) + 1;");
        ctx.out.line("if (c >= astar_heap_len) break;");
        ctx.out.line(
            "if (c + 1 < astar_heap_len && astar_heap_before(c + 1, astar_heap_f[c], astar_heap_n[c])) c++;",
        );
        ctx.out.line("if (!astar_heap_before(c, lf, ln)) break;");
        ctx.out.line("astar_heap_n[i] = astar_heap_n[c];");
        ctx.out.line("astar_heap_f[i] = astar_heap_f[c];");
        ctx.out.line("i = c;");
        ctx.out.close();
        ctx.out.line("astar_heap_n[i] = ln;");
        ctx.out.line("astar_heap_f[i] = lf;");
        ctx.out.line("return top;");
        Ok(())
    })?;
    ctx.function(
        "astar_h",
        "static uint16_t astar_h(uint8_t x, uint8_t y, uint8_t gx, uint8_t gy, uint8_t chebyshev)",
        |ctx| {
            ctx.out.line("uint8_t dx = x > gx ? x - gx : gx - x;");
            ctx.out.line("uint8_t dy = y > gy ? y - gy : gy - y;");
            ctx.out.line("if (chebyshev) return dx > dy ? dx : dy;");
            ctx.out.line("return (uint16_t)dx + dy;");
            Ok(())
        },
    )?;
    ctx.function(
        "astar_walk",
        "static uint8_t astar_walk(const uint8_t *walk, uint8_t w, uint8_t x, uint8_t y)",
        |ctx| {
            ctx.out.line("uint16_t t = (uint16_t)y * w + x;");
            ctx.out.line("return (walk[t >> 3] >> (t & 7)) & 1;");
            Ok(())
        },
    )
}

fn emit_search(ctx: &mut LowerContext<'_>) -> LowerResult<()> {
    ctx.function("astar_search", SEARCH_SIGNATURE, |ctx| {
        let o = &mut ctx.out;
        o.line("uint8_t count, cur, n, d, step, x, y, nx, ny, k;");
        o.line("uint16_t iter, tile, goal, nt, g;");
        o.line("astar_path_len = 0;");
        o.line("if (sx >= w || sy >= h || gx >= w || gy >= h) return ASTAR_NO_PATH;");
        o.line(
            "if (!astar_walk(walk, w, sx, sy) || !astar_walk(walk, w, gx, gy)) return ASTAR_NO_PATH;",
        );
        o.line("if (sx == gx && sy == gy) return ASTAR_FOUND;");
        o.line("memset(astar_closed, 0, sizeof(astar_closed));");
        o.line("goal = (uint16_t)gy * w + gx;");
        o.line("astar_node[0] = ((uint16_t)sy * w + sx) << 6;");
        o.line("astar_g[0] = 0;");
        o.line("astar_f[0] = astar_h(sx, sy, gx, gy, chebyshev);");
        o.line("count = 1;");
        o.line("astar_heap_len = 0;");
        o.line("astar_push(0, astar_f[0]);");
        o.line("step = diagonal ? 1 : 2;");
        o.line("iter = 0;");
        o.open("for (;;)");
        o.line("if (astar_heap_len == 0) return ASTAR_NO_PATH;");
        o.line("if (iter >= max_iter) return ASTAR_BUDGET;");
        o.line("cur = astar_pop();");
        o.line("iter++;");
        o.line("tile = astar_node[cur] >> 6;");
        o.line("if (astar_closed[tile >> 5] & ((uint32_t)1 << (tile & 31))) continue;");
        o.line("if (tile == goal) break;");
        o.line("astar_closed[tile >> 5] |= (uint32_t)1 << (tile & 31);");
        o.line("x = tile % w;");
        o.line("y = tile / w;");
        o.open("for (d = 0; d < 8; d += step)");
        o.line("nx = x + astar_dx[d];");
        o.line("ny = y + astar_dy[d];");
        o.line("if (nx >= w || ny >= h || !astar_walk(walk, w, nx, ny)) continue;");
        o.line(
            "if ((d & 1) && (!astar_walk(walk, w, nx, y) || !astar_walk(walk, w, x, ny))) continue;",
        );
        o.line("nt = (uint16_t)ny * w + nx;");
        o.line("if (astar_closed[nt >> 5] & ((uint32_t)1 << (nt & 31))) continue;");
        o.line("g = astar_g[cur] + (weights ? weights[nt] : 1);");
        o.line("for (k = 0; k < count; k++) if ((astar_node[k] >> 6) == nt) break;");
        o.open("if (k < count)");
        o.line("if (astar_g[k] <= g) continue;");
        o.reopen("} else {");
        o.line("if (count == ASTAR_MAX_NODES) return ASTAR_FULL;");
        o.line("k = count++;");
        o.close();
        o.line("if (astar_heap_len == ASTAR_HEAP_SIZE) return ASTAR_FULL;");
        o.line("astar_node[k] = (nt << 6) | cur;");
        o.line("astar_g[k] = g;");
        o.line("astar_f[k] = g + astar_h(nx, ny, gx, gy, chebyshev);");
        o.line("astar_push(k, astar_f[k]);");
        o.close();
        o.close();
        o.line("/* parents lead back to the start (node 0); reverse into the path */");
        o.open("for (n = cur; n != 0; n = astar_node[n] & 0x3F)");
        o.line("tile = astar_node[n] >> 6;");
        o.line("astar_path_x[astar_path_len] = tile % w;");
        o.line("astar_path_y[astar_path_len] = tile / w;");
        o.line("astar_path_len++;");
        o.close();
        o.open("for (k = 0; k < astar_path_len / 2; k++)");
        o.line("n = astar_path_len - 1 - k;");
        o.line("x = astar_path_x[k]; astar_path_x[k] = astar_path_x[n]; astar_path_x[n] = x;");
        o.line("y = astar_path_y[k]; astar_path_y[k] = astar_path_y[n]; astar_path_y[n] = y;");
        o.close();
        o.line("return ASTAR_FOUND;");
        Ok(())
    })
}

fn emit_grid(ctx: &mut LowerContext<'_>, def: &NavGridDef) -> LowerResult<()> {
    let name = c_ident(&def.name);
    let upper = upper_ident(&def.name);
    let grid = &def.grid;
    let cfg = &def.pathfinder;

    ctx.out
        .line(format!("#define NAV_{upper}_WIDTH {}", grid.width()));
    ctx.out
        .line(format!("#define NAV_{upper}_HEIGHT {}", grid.height()));
    ctx.out.line(format!(
        "uint8_t nav_{name}_walk[{}] = {{{}}};",
        grid.walkable_bytes().len(),
        hex_bytes(grid.walkable_bytes())
    ));
    let weights = match grid.weight_bytes() {
        Some(w) => {
            ctx.out.line(format!(
                "uint8_t nav_{name}_weights[{}] = {{{}}};",
                w.len(),
                hex_bytes(w)
            ));
            format!("nav_{name}_weights")
        }
        None => "0".to_string(),
    };
    ctx.out.blank();

    ctx.function(&format!("nav_{name}_find"), &find_signature(def), |ctx| {
        ctx.out.line(format!(
            "return astar_search(nav_{name}_walk, {weights}, NAV_{upper}_WIDTH, NAV_{upper}_HEIGHT, \
             sx, sy, gx, gy, {}, {}, {});",
            u8::from(cfg.diagonal),
            u8::from(cfg.heuristic == Heuristic::Chebyshev),
            cfg.max_iterations
        ));
        Ok(())
    })?;
    debug!(
        grid = %def.name,
        width = grid.width(),
        height = grid.height(),
        walkable = grid.walkable_count(),
        weighted = grid.has_weights(),
        "pathfinder tables sized"
    );
    Ok(())
}

fn hex_bytes(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("0x{b:02X}"))
        .collect::<Vec<_>>()
        .join(", ")
}
