// Render pipeline: visibility culling and painter's-algorithm ordering.
//
// Produces a pure-data `FrameScene` instead of issuing draw calls: an ordered
// ground-tile list and an ordered sprite list with screen positions already
// transformed through the camera. Whatever drawing backend the embedder uses
// just walks the two lists in order. This keeps every real decision (which
// chunks to touch, which tiles and sprites survive culling, who draws over
// whom) in plain testable code.
//
// Ordering rules:
// - Ground tiles are a single flat layer; they carry no depth and are emitted
//   in chunk/tile iteration order.
// - Everything else (avatars, vegetation) is Y-sorted ascending by world Y
//   before transform. Lower Y means further back, so it draws first and
//   higher-Y sprites overlap it — the painter's algorithm for a top-down
//   view. The sort is stable, so equal-Y sprites keep insertion order and
//   cannot flicker between frames.
// - Sprites are culled against the viewport expanded by `CULL_MARGIN` on all
//   sides, so sprites with large extents don't pop at the edges. Tiles are
//   culled in world space against the visible rect expanded by one tile.

use aldervale_protocol::{Appearance, Position};
use serde::{Deserialize, Serialize};

use crate::camera::Camera;
use crate::terrain::{ChunkStore, TILE_SIZE, TileKind, VegetationKind};

/// Screen-space cull margin around the viewport, in screen units.
pub const CULL_MARGIN: f32 = 128.0;

/// An avatar to draw this frame — the local player or one remote session.
#[derive(Clone, Debug, PartialEq)]
pub struct Avatar {
    pub pos: Position,
    pub appearance: Appearance,
    pub username: String,
    /// True for the locally controlled avatar (embedders draw nameplates and
    /// input affordances differently for it).
    pub local: bool,
}

/// One ground tile, transformed to screen space. `size` is the tile edge in
/// screen units (`TILE_SIZE * zoom`).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TileDraw {
    pub kind: TileKind,
    pub sx: f32,
    pub sy: f32,
    pub size: f32,
}

/// What a sprite slot depicts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Sprite {
    Avatar {
        username: String,
        appearance: Appearance,
        local: bool,
    },
    Vegetation {
        kind: VegetationKind,
        phase: f32,
    },
}

/// One depth-ordered sprite, transformed to screen space.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpriteDraw {
    pub sx: f32,
    pub sy: f32,
    pub sprite: Sprite,
}

/// Everything one frame draws, in draw order: ground first, then sprites
/// back-to-front.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameScene {
    /// Effective camera zoom this frame; embedders scale sprite extents by it.
    pub zoom: f32,
    pub ground: Vec<TileDraw>,
    pub sprites: Vec<SpriteDraw>,
}

struct Renderable {
    world_y: f32,
    world_x: f32,
    sprite: Sprite,
}

/// Build the scene for one frame: visible rect → chunks → ground tiles, then
/// avatars + vegetation Y-sorted and margin-culled.
pub fn build_scene(camera: &Camera, store: &mut ChunkStore, avatars: &[Avatar]) -> FrameScene {
    let rect = camera.visible_world_rect();
    let tile_rect = rect.expanded(TILE_SIZE);
    let zoom = camera.zoom();

    let mut ground = Vec::new();
    let mut renderables: Vec<Renderable> = Vec::new();

    for chunk in store.visible_chunks(&rect) {
        let (origin_x, origin_y) = chunk.world_origin();
        for (lx, ly, kind) in chunk.tiles() {
            let wx = origin_x + lx as f32 * TILE_SIZE;
            let wy = origin_y + ly as f32 * TILE_SIZE;
            if !tile_rect.contains(wx, wy) {
                continue;
            }
            let (sx, sy) = camera.world_to_screen(wx, wy);
            ground.push(TileDraw {
                kind,
                sx,
                sy,
                size: TILE_SIZE * zoom,
            });
        }
        for veg in chunk.vegetation() {
            renderables.push(Renderable {
                world_y: veg.y,
                world_x: veg.x,
                sprite: Sprite::Vegetation {
                    kind: veg.kind,
                    phase: veg.phase,
                },
            });
        }
    }

    for avatar in avatars {
        renderables.push(Renderable {
            world_y: avatar.pos.y,
            world_x: avatar.pos.x,
            sprite: Sprite::Avatar {
                username: avatar.username.clone(),
                appearance: avatar.appearance,
                local: avatar.local,
            },
        });
    }

    // Stable: equal-Y sprites keep insertion order frame over frame.
    renderables.sort_by(|a, b| a.world_y.total_cmp(&b.world_y));

    let min_sx = -CULL_MARGIN;
    let max_sx = camera.viewport_w + CULL_MARGIN;
    let min_sy = -CULL_MARGIN;
    let max_sy = camera.viewport_h + CULL_MARGIN;

    let mut sprites = Vec::with_capacity(renderables.len());
    for r in renderables {
        let (sx, sy) = camera.world_to_screen(r.world_x, r.world_y);
        if sx < min_sx || sx > max_sx || sy < min_sy || sy > max_sy {
            continue;
        }
        sprites.push(SpriteDraw {
            sx,
            sy,
            sprite: r.sprite,
        });
    }

    FrameScene {
        zoom,
        ground,
        sprites,
    }
}
