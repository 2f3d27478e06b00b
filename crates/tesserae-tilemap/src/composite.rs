//! The composite tile layer: batch assignment, dirty tracking, and backend
//! dispatch.

use glam::{Affine2, Mat3, Vec2};
use tesserae_core::geometry::Rect;

use crate::batch::TileBatch;
use crate::render::{CanvasFrame, GpuFrame, TileUniforms};
use crate::texture::{TextureCache, TileSource, TileTexture};

/// Shadow tint applied by both GPU shader variants.
const SHADOW_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 0.5];

/// Construction parameters for [`CompositeTileLayer`].
#[derive(Debug, Clone)]
pub struct CompositeTileLayerDescriptor {
    /// Draw-order key within the host scene graph.
    pub z_index: i32,
    /// Initial texture set, distributed across batches at construction.
    pub textures: Vec<TileTexture>,
    /// Select the point-sprite GPU shader variant.
    pub use_square: bool,
    /// Texture capacity per batch. Must be positive.
    pub tex_per_batch: usize,
}

impl Default for CompositeTileLayerDescriptor {
    fn default() -> Self {
        Self {
            z_index: 0,
            textures: Vec::new(),
            use_square: false,
            tex_per_batch: 16,
        }
    }
}

/// A drawable node that partitions tile textures into fixed-capacity
/// [`TileBatch`]es and renders them with a bounded number of draw calls.
///
/// Batches accumulate monotonically: bulk texture assignment reuses existing
/// batches in place and appends new ones, and [`clear`](Self::clear) empties
/// geometry without removing batches or their texture sets. The layer tracks
/// a clean/dirty distinction through count snapshots
/// ([`is_modified`](Self::is_modified) / [`clear_modify`](Self::clear_modify))
/// so the host render loop can skip redundant geometry uploads.
///
/// The host scene graph composes transforms and pushes the result in through
/// [`set_world_transform`](Self::set_world_transform).
#[derive(Debug)]
pub struct CompositeTileLayer {
    z_index: i32,
    use_square: bool,
    tex_per_batch: usize,
    batches: Vec<TileBatch>,
    modification_marker: usize,
    world_transform: Affine2,
    // Scratch caches reused across frames to avoid per-frame allocation.
    // Mutated only during render_gpu; not semantic state.
    scratch_matrix: Mat3,
    scratch_scale: Vec2,
}

impl CompositeTileLayer {
    pub fn new(descriptor: CompositeTileLayerDescriptor) -> Self {
        debug_assert!(descriptor.tex_per_batch > 0);
        let mut layer = Self {
            z_index: descriptor.z_index,
            use_square: descriptor.use_square,
            tex_per_batch: descriptor.tex_per_batch,
            batches: Vec::new(),
            modification_marker: 0,
            world_transform: Affine2::IDENTITY,
            scratch_matrix: Mat3::IDENTITY,
            scratch_scale: Vec2::ONE,
        };
        if !descriptor.textures.is_empty() {
            layer.set_textures(&descriptor.textures);
        }
        layer
    }

    /// Convenience constructor for a layer with default settings.
    pub fn with_z(z_index: i32) -> Self {
        Self::new(CompositeTileLayerDescriptor {
            z_index,
            ..Default::default()
        })
    }

    pub fn z_index(&self) -> i32 {
        self.z_index
    }

    pub fn use_square(&self) -> bool {
        self.use_square
    }

    pub fn tex_per_batch(&self) -> usize {
        self.tex_per_batch
    }

    pub fn batches(&self) -> &[TileBatch] {
        &self.batches
    }

    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    pub fn world_transform(&self) -> Affine2 {
        self.world_transform
    }

    /// Install the transform composed by the host scene graph.
    pub fn set_world_transform(&mut self, transform: Affine2) {
        self.world_transform = transform;
    }

    /// Distribute `textures` across batches in consecutive chunks of
    /// `tex_per_batch`.
    ///
    /// Existing batches get their texture sets replaced in place; chunks past
    /// the current batch count create new batches at this layer's z. Batches
    /// beyond the new chunk count keep their previous texture sets: batch
    /// assignment is additive-only.
    pub fn set_textures(&mut self, textures: &[TileTexture]) {
        let existing = self.batches.len();
        for (i, chunk) in textures.chunks(self.tex_per_batch).enumerate() {
            if i < existing {
                self.batches[i].set_textures(chunk.to_vec());
            } else {
                self.batches.push(TileBatch::new(self.z_index, chunk.to_vec()));
            }
        }
        tracing::debug!(
            textures = textures.len(),
            batches = self.batches.len(),
            "assigned batch texture sets"
        );
    }

    /// Empty every batch's geometry (texture sets are retained) and reset
    /// the dirty marker.
    pub fn clear(&mut self) {
        for batch in &mut self.batches {
            batch.clear();
        }
        self.modification_marker = 0;
    }

    /// Append a quad at texture slot 0 of the batch at `batch_index`.
    ///
    /// A missing batch or one without textures is a silent no-op, not an
    /// error signal.
    pub fn add_rect(&mut self, batch_index: usize, src: Rect<f32>, pos: Vec2) {
        if let Some(batch) = self.batches.get_mut(batch_index) {
            if batch.texture_count() > 0 {
                batch.push_tile(0, src, pos, Vec2::ZERO);
            }
        }
    }

    /// Buffer one tile at `pos`, choosing a batch by the reuse-then-append
    /// policy.
    ///
    /// Search order: a batch already holding the texture's base (slot reused
    /// without mutating any texture set), then the first batch with spare
    /// texture capacity, then a fresh batch at this layer's z. Always
    /// succeeds.
    pub fn add_tile<'a>(
        &mut self,
        source: impl Into<TileSource<'a>>,
        cache: &TextureCache,
        pos: Vec2,
        anim: Vec2,
    ) -> bool {
        let texture = match source.into() {
            TileSource::Texture(texture) => texture,
            TileSource::Name(name) => cache.resolve(name),
        };

        let mut target = None;
        for (index, batch) in self.batches.iter().enumerate() {
            if let Some(slot) = batch.texture_slot(texture.base()) {
                target = Some((index, slot));
                break;
            }
        }
        if target.is_none() {
            // First batch with spare capacity wins; later ones stay untouched.
            for (index, batch) in self.batches.iter_mut().enumerate() {
                if batch.texture_count() < self.tex_per_batch {
                    target = Some((index, batch.push_texture(texture)));
                    break;
                }
            }
        }
        let (index, slot) = target.unwrap_or_else(|| {
            tracing::debug!(z_index = self.z_index, "appending tile batch");
            self.batches.push(TileBatch::new(self.z_index, vec![texture]));
            (self.batches.len() - 1, 0)
        });

        self.batches[index].push_tile(slot, texture.frame(), pos, anim);
        true
    }

    /// True when accumulated geometry differs from the last checkpoint, or
    /// when `anim` is requested and any batch carries animated quads.
    pub fn is_modified(&self, anim: bool) -> bool {
        if self.modification_marker != self.batches.len() {
            return true;
        }
        self.batches
            .iter()
            .any(|batch| batch.modification_marker() != batch.quad_count() || (anim && batch.has_anim()))
    }

    /// Snapshot the current batch count and every batch's quad count as the
    /// new clean baseline.
    pub fn clear_modify(&mut self) {
        self.modification_marker = self.batches.len();
        for batch in &mut self.batches {
            batch.checkpoint();
        }
    }

    /// Immediate-mode render path.
    ///
    /// Unless the renderer-level bypass flag is set, pushes this layer's
    /// world transform (translation scaled by device resolution) into the
    /// canvas context, then renders every batch in order.
    pub fn render_canvas(&self, frame: &mut CanvasFrame<'_>) {
        if !frame.bypass_layer_transform {
            let mut transform = self.world_transform;
            transform.translation *= frame.resolution;
            frame.canvas.set_transform(&transform);
        }
        for batch in &self.batches {
            batch.render_canvas(frame.canvas);
        }
    }

    /// GPU render path.
    ///
    /// Binds the shader variant keyed by `use_square`, composes the target's
    /// projection with this layer's world transform into the scratch matrix,
    /// and uploads it with the constant shadow color and the plugin's global
    /// animation counter. The square variant additionally gets the
    /// point-sprite flip compensation and projection scale.
    pub fn render_gpu(&mut self, frame: &mut GpuFrame<'_>) {
        frame.plugin.bind_shader(self.use_square);

        self.scratch_matrix = frame.projection * Mat3::from(self.world_transform);
        let mut uniforms =
            TileUniforms::new(&self.scratch_matrix, SHADOW_COLOR, frame.plugin.tile_anim());
        if self.use_square {
            // Point sprites keep their screen orientation under axis flips,
            // so the flip has to be baked into the sampling direction.
            self.scratch_scale = Vec2::new(
                if self.scratch_matrix.x_axis.x >= 0.0 { 1.0 } else { -1.0 },
                if self.scratch_matrix.y_axis.y < 0.0 { 1.0 } else { -1.0 },
            );
            uniforms.point_scale = self.scratch_scale.to_array();
            uniforms.projection_scale =
                self.world_transform.matrix2.x_axis.x.abs() * frame.resolution;
        }
        frame.plugin.upload_uniforms(self.use_square, &uniforms);

        for batch in &self.batches {
            batch.render_gpu(frame.plugin, self.use_square);
        }
    }
}
