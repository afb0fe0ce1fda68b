// Procedural terrain: tile classification, chunk generation, chunk cache.
//
// The world plane is an unbounded grid of 64-unit tiles, grouped into 16×16
// chunks — the unit of generation and caching. A chunk's content is a pure
// function of `(world_seed, chunk coordinate)`: the tile layer comes from a
// smooth sin/cos scalar field over global tile coordinates, and vegetation is
// sampled from a per-tile PRNG stream (`WorldRng::for_tile`), never from a
// shared stream whose output would depend on chunk visit order.
//
// The `ChunkStore` memoizes generated chunks for the life of the process.
// There is no eviction: memory is bounded by how far a player explores, which
// is acceptable for a client-side cache over a play session. If that stops
// holding, a distance-keyed LRU slots in behind `get_chunk` without changing
// any caller.
//
// See also: `render.rs`, which walks visible chunks to emit the ground layer
// and vegetation sprites; `camera.rs` for the visible-rect computation that
// drives `visible_chunks`.
//
// **Critical constraint: determinism.** Regenerating a chunk must yield an
// identical tile layout and vegetation set, or a dropped-and-recreated chunk
// would visibly mutate the world. Keep all sampling keyed on coordinates.

use aldervale_prng::WorldRng;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::camera::WorldRect;

/// Tiles per chunk edge.
pub const CHUNK_SIZE: i32 = 16;
/// World units per tile edge.
pub const TILE_SIZE: f32 = 64.0;
/// World units per chunk edge.
pub const CHUNK_WORLD_SIZE: f32 = CHUNK_SIZE as f32 * TILE_SIZE;
/// Seed shared by every client. Terrain is generated client-side only, so all
/// participants must agree on this value to see the same world.
pub const DEFAULT_WORLD_SEED: u64 = 0xA1DE_0001;

/// Ground tile classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileKind {
    Water,
    Dirt,
    Grass,
}

/// Vegetation sprite classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VegetationKind {
    Tree,
    Flower,
}

/// One vegetation instance, positioned at its tile's world-space origin.
///
/// `phase` is a uniform sample from [0, 2π) for sway animation; it is part of
/// the deterministic chunk content, not render state.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vegetation {
    pub x: f32,
    pub y: f32,
    pub kind: VegetationKind,
    pub phase: f32,
}

/// Smooth scalar field over global tile coordinates that drives tile
/// classification.
pub fn field_value(gx: i64, gy: i64) -> f64 {
    ((gx as f64 * 0.1).sin() + (gy as f64 * 0.1).cos() + 2.0) * 20.0
}

/// Classify a field value. Half-open intervals: exactly 5 is Dirt (not
/// Water), exactly 15 is Grass (not Dirt).
pub fn classify(v: f64) -> TileKind {
    if v < 5.0 {
        TileKind::Water
    } else if v < 15.0 {
        TileKind::Dirt
    } else {
        TileKind::Grass
    }
}

/// A generated 16×16 chunk: tile layer plus vegetation instances.
///
/// Never mutated after generation; `ChunkStore` hands out shared references.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub cx: i32,
    pub cy: i32,
    /// Flat storage: index = lx + ly * CHUNK_SIZE.
    tiles: Vec<TileKind>,
    vegetation: Vec<Vegetation>,
}

impl Chunk {
    /// Generate the chunk at `(cx, cy)`. Pure function of the arguments.
    pub fn generate(world_seed: u64, cx: i32, cy: i32) -> Self {
        let mut tiles = Vec::with_capacity((CHUNK_SIZE * CHUNK_SIZE) as usize);
        let mut vegetation = Vec::new();
        for ly in 0..CHUNK_SIZE {
            for lx in 0..CHUNK_SIZE {
                let gx = i64::from(cx) * i64::from(CHUNK_SIZE) + i64::from(lx);
                let gy = i64::from(cy) * i64::from(CHUNK_SIZE) + i64::from(ly);
                let kind = classify(field_value(gx, gy));
                tiles.push(kind);
                if kind == TileKind::Grass {
                    vegetation.extend(sample_vegetation(world_seed, gx, gy));
                }
            }
        }
        Self {
            cx,
            cy,
            tiles,
            vegetation,
        }
    }

    /// Tile at local coordinates. Panics on out-of-range locals in debug
    /// builds via the slice index; callers iterate `0..CHUNK_SIZE` only.
    pub fn tile(&self, lx: i32, ly: i32) -> TileKind {
        self.tiles[(lx + ly * CHUNK_SIZE) as usize]
    }

    /// Iterate `(lx, ly, kind)` over the tile layer in row-major order.
    pub fn tiles(&self) -> impl Iterator<Item = (i32, i32, TileKind)> + '_ {
        self.tiles.iter().enumerate().map(|(i, &kind)| {
            let i = i as i32;
            (i % CHUNK_SIZE, i / CHUNK_SIZE, kind)
        })
    }

    pub fn vegetation(&self) -> &[Vegetation] {
        &self.vegetation
    }

    /// World-space origin of the chunk (its north-west corner).
    pub fn world_origin(&self) -> (f32, f32) {
        (
            self.cx as f32 * CHUNK_WORLD_SIZE,
            self.cy as f32 * CHUNK_WORLD_SIZE,
        )
    }
}

/// Sample the vegetation roll for one grass tile: 5% tree, else 20% flower.
///
/// The stream is derived from `(world_seed, gx, gy)`, so the outcome at one
/// tile never depends on what was generated before it.
fn sample_vegetation(world_seed: u64, gx: i64, gy: i64) -> Option<Vegetation> {
    let mut rng = WorldRng::for_tile(world_seed, gx, gy);
    let x = gx as f32 * TILE_SIZE;
    let y = gy as f32 * TILE_SIZE;
    if rng.chance(0.05) {
        Some(Vegetation {
            x,
            y,
            kind: VegetationKind::Tree,
            phase: rng.range_f32(0.0, std::f32::consts::TAU),
        })
    } else if rng.chance(0.20) {
        Some(Vegetation {
            x,
            y,
            kind: VegetationKind::Flower,
            phase: rng.range_f32(0.0, std::f32::consts::TAU),
        })
    } else {
        None
    }
}

/// Memoizing chunk cache, keyed by chunk coordinate.
#[derive(Debug)]
pub struct ChunkStore {
    world_seed: u64,
    chunks: FxHashMap<(i32, i32), Chunk>,
}

impl ChunkStore {
    pub fn new(world_seed: u64) -> Self {
        Self {
            world_seed,
            chunks: FxHashMap::default(),
        }
    }

    /// Fetch the chunk at `(cx, cy)`, generating and caching it on first
    /// access.
    pub fn get_chunk(&mut self, cx: i32, cy: i32) -> &Chunk {
        self.chunks
            .entry((cx, cy))
            .or_insert_with(|| Chunk::generate(self.world_seed, cx, cy))
    }

    /// Chunks intersecting a world-space rectangle, in row-major chunk order.
    ///
    /// Generates any missing chunk in the range first, so the returned slice
    /// of references is always complete.
    pub fn visible_chunks(&mut self, rect: &WorldRect) -> Vec<&Chunk> {
        let (min_cx, min_cy, max_cx, max_cy) = chunk_span(rect);
        for cy in min_cy..=max_cy {
            for cx in min_cx..=max_cx {
                self.get_chunk(cx, cy);
            }
        }
        let mut out = Vec::with_capacity(
            ((max_cx - min_cx + 1) * (max_cy - min_cy + 1)).max(0) as usize,
        );
        for cy in min_cy..=max_cy {
            for cx in min_cx..=max_cx {
                if let Some(chunk) = self.chunks.get(&(cx, cy)) {
                    out.push(chunk);
                }
            }
        }
        out
    }

    /// Number of chunks generated so far.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}

impl Default for ChunkStore {
    fn default() -> Self {
        Self::new(DEFAULT_WORLD_SEED)
    }
}

/// Inclusive chunk-coordinate span covering a world rectangle. Floor division
/// keeps negative coordinates correct (world x = -1 lies in chunk -1, not 0).
fn chunk_span(rect: &WorldRect) -> (i32, i32, i32, i32) {
    (
        (rect.min_x / CHUNK_WORLD_SIZE).floor() as i32,
        (rect.min_y / CHUNK_WORLD_SIZE).floor() as i32,
        (rect.max_x / CHUNK_WORLD_SIZE).floor() as i32,
        (rect.max_y / CHUNK_WORLD_SIZE).floor() as i32,
    )
}
