// aldervale_world — the client-side spatial core.
//
// Pure logic, no I/O and no drawing backend: deterministic chunked terrain,
// the camera transform, and painter's-algorithm render ordering. The client
// crate (`aldervale_client`) feeds this from network state each frame and
// hands the resulting `FrameScene` to whatever backend draws it.
//
// Module overview:
// - `terrain.rs`: tile classification, chunk generation, memoizing
//                 `ChunkStore` with rect-based visibility queries.
// - `camera.rs`:  smoothed zoom, follow/center, world↔screen transforms,
//                 visible-rect derivation.
// - `render.rs`:  `FrameScene` assembly — ground pass, Y-sorted and
//                 margin-culled sprites.
//
// Design decisions:
// - **Scene as data.** The pipeline emits draw lists instead of calling a
//   backend, so ordering and culling are unit-testable and the crate stays
//   engine-agnostic.
// - **Per-tile seeded vegetation.** Sampling is keyed on coordinates, never
//   drawn from a shared stream, so regenerated chunks are identical.
// - **Wire types flow through.** Positions and appearances come from
//   `aldervale_protocol` unchanged; this crate adds no parallel copies.

pub mod camera;
pub mod render;
pub mod terrain;

pub use camera::{Camera, MAX_ZOOM, MIN_ZOOM, WorldRect};
pub use render::{Avatar, CULL_MARGIN, FrameScene, Sprite, SpriteDraw, TileDraw, build_scene};
pub use terrain::{
    CHUNK_SIZE, CHUNK_WORLD_SIZE, Chunk, ChunkStore, DEFAULT_WORLD_SEED, TILE_SIZE, TileKind,
    Vegetation, VegetationKind, classify, field_value,
};
