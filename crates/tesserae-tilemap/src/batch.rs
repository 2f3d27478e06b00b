//! Fixed-capacity tile batches.
//!
//! A batch groups up to `tex_per_batch` distinct base textures with the tile
//! quads drawn from them, so the whole batch renders in one pass. Geometry
//! accumulates monotonically between [`TileBatch::clear`] calls.

use glam::Vec2;
use tesserae_core::geometry::Rect;

use crate::render::{Canvas2d, TilemapPlugin};
use crate::texture::{TextureId, TileTexture};

/// One buffered tile quad.
#[derive(Debug, Clone, Copy)]
pub struct TileQuad {
    /// Slot of the source texture in the owning batch.
    pub texture_index: usize,
    /// Source rectangle in texel coordinates.
    pub src: Rect<f32>,
    /// Destination position.
    pub pos: Vec2,
    /// Per-frame animation offsets; zero means a static tile.
    pub anim: Vec2,
}

/// A bounded grouping of textures plus the tile quads drawn from them.
///
/// `modification_marker` snapshots the quad count at the last clean
/// checkpoint; the owning layer compares it against the live count to decide
/// whether geometry needs re-uploading.
#[derive(Debug, Clone)]
pub struct TileBatch {
    z_index: i32,
    textures: Vec<TileTexture>,
    quads: Vec<TileQuad>,
    modification_marker: usize,
    has_anim: bool,
}

impl TileBatch {
    pub fn new(z_index: i32, textures: Vec<TileTexture>) -> Self {
        Self {
            z_index,
            textures,
            quads: Vec::new(),
            modification_marker: 0,
            has_anim: false,
        }
    }

    pub fn z_index(&self) -> i32 {
        self.z_index
    }

    pub fn textures(&self) -> &[TileTexture] {
        &self.textures
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn quads(&self) -> &[TileQuad] {
        &self.quads
    }

    pub fn quad_count(&self) -> usize {
        self.quads.len()
    }

    /// True once any buffered quad carries a nonzero animation offset.
    pub fn has_anim(&self) -> bool {
        self.has_anim
    }

    pub fn modification_marker(&self) -> usize {
        self.modification_marker
    }

    /// Find the slot holding `base`, if any.
    pub fn texture_slot(&self, base: TextureId) -> Option<usize> {
        self.textures.iter().position(|t| t.base() == base)
    }

    /// Append a texture, returning its slot.
    pub(crate) fn push_texture(&mut self, texture: TileTexture) -> usize {
        self.textures.push(texture);
        self.textures.len() - 1
    }

    /// Replace the whole texture set. Buffered quads keep their slot indices,
    /// which are reinterpreted against the new set.
    pub(crate) fn set_textures(&mut self, textures: Vec<TileTexture>) {
        self.textures = textures;
    }

    /// Snapshot the current quad count as the clean baseline.
    pub(crate) fn checkpoint(&mut self) {
        self.modification_marker = self.quads.len();
    }

    /// Buffer one tile quad referencing texture `slot`.
    pub fn push_tile(&mut self, slot: usize, src: Rect<f32>, pos: Vec2, anim: Vec2) {
        self.quads.push(TileQuad {
            texture_index: slot,
            src,
            pos,
            anim,
        });
        self.has_anim = self.has_anim || anim != Vec2::ZERO;
    }

    /// Drop all buffered quads and reset the dirty checkpoint. The texture
    /// set is retained.
    pub fn clear(&mut self) {
        self.quads.clear();
        self.modification_marker = 0;
        self.has_anim = false;
    }

    /// Immediate-mode path: hand each quad to the canvas context.
    pub fn render_canvas(&self, canvas: &mut dyn Canvas2d) {
        for quad in &self.quads {
            if let Some(texture) = self.textures.get(quad.texture_index) {
                canvas.draw_image(texture.base(), quad.src, quad.pos);
            }
        }
    }

    /// GPU path: record this batch with the renderer plugin.
    pub fn render_gpu(&self, plugin: &mut dyn TilemapPlugin, use_square: bool) {
        plugin.draw_batch(self, use_square);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tex(id: u64) -> TileTexture {
        TileTexture::new(TextureId(id), Rect::from_size(16.0, 16.0))
    }

    #[test]
    fn texture_slot_matches_by_base() {
        let batch = TileBatch::new(0, vec![tex(1), tex(2), tex(3)]);
        assert_eq!(batch.texture_slot(TextureId(2)), Some(1));
        assert_eq!(batch.texture_slot(TextureId(9)), None);
    }

    #[test]
    fn anim_flag_latches() {
        let mut batch = TileBatch::new(0, vec![tex(1)]);
        batch.push_tile(0, Rect::from_size(16.0, 16.0), Vec2::ZERO, Vec2::ZERO);
        assert!(!batch.has_anim());

        batch.push_tile(0, Rect::from_size(16.0, 16.0), Vec2::ZERO, Vec2::new(0.0, -1.0));
        assert!(batch.has_anim());

        // Static tiles after an animated one do not unlatch the flag.
        batch.push_tile(0, Rect::from_size(16.0, 16.0), Vec2::ZERO, Vec2::ZERO);
        assert!(batch.has_anim());
    }

    #[test]
    fn clear_empties_quads_but_keeps_textures() {
        let mut batch = TileBatch::new(0, vec![tex(1), tex(2)]);
        batch.push_tile(1, Rect::from_size(16.0, 16.0), Vec2::new(32.0, 0.0), Vec2::X);
        batch.checkpoint();

        batch.clear();
        assert_eq!(batch.quad_count(), 0);
        assert_eq!(batch.modification_marker(), 0);
        assert!(!batch.has_anim());
        assert_eq!(batch.texture_count(), 2);
    }
}
