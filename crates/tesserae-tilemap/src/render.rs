//! Backend contracts driven by the composite layer: the immediate-mode
//! canvas and GPU renderer-plugin interfaces, plus the shared uniform block.
//!
//! Both are injected per render call through [`CanvasFrame`] / [`GpuFrame`];
//! the core keeps no reference to any global renderer registry.

use bytemuck::{Pod, Zeroable};
use glam::{Affine2, Mat3, Vec2};
use tesserae_core::geometry::Rect;

use crate::batch::TileBatch;
use crate::texture::TextureId;

/// Immediate-mode 2D drawing context.
///
/// The batcher only delegates: rasterization, clipping, and blending are the
/// context's business.
pub trait Canvas2d {
    /// Replace the context's current transform.
    fn set_transform(&mut self, transform: &Affine2);

    /// Draw the `src` region of base texture `texture` with its top-left
    /// corner at `dst`.
    fn draw_image(&mut self, texture: TextureId, src: Rect<f32>, dst: Vec2);
}

/// Renderer plugin contract for the GPU path.
///
/// Frame lifecycle: the layer binds a shader variant, uploads uniforms, and
/// records every batch via [`draw_batch`](Self::draw_batch); the backend
/// uploads buffers and issues the actual draws afterwards.
pub trait TilemapPlugin {
    /// Activate the shader variant for subsequent draws.
    fn bind_shader(&mut self, use_square: bool);

    /// Set the uniform block for the active shader variant.
    fn upload_uniforms(&mut self, use_square: bool, uniforms: &TileUniforms);

    /// Global per-frame animation counter shared by every layer.
    fn tile_anim(&self) -> [f32; 2];

    /// When set, the immediate-mode path leaves transform handling to the
    /// individual batches.
    fn bypass_layer_transform(&self) -> bool;

    /// Record one batch for this frame's draw submission.
    fn draw_batch(&mut self, batch: &TileBatch, use_square: bool);
}

/// Per-call context for the immediate-mode render path.
pub struct CanvasFrame<'a> {
    pub canvas: &'a mut dyn Canvas2d,
    /// Device pixel ratio of the target.
    pub resolution: f32,
    /// Renderer-level transform bypass, sourced from the plugin.
    pub bypass_layer_transform: bool,
}

impl<'a> CanvasFrame<'a> {
    pub fn new(canvas: &'a mut dyn Canvas2d, plugin: &dyn TilemapPlugin, resolution: f32) -> Self {
        Self {
            canvas,
            resolution,
            bypass_layer_transform: plugin.bypass_layer_transform(),
        }
    }
}

/// Per-call context for the GPU render path.
pub struct GpuFrame<'a> {
    pub plugin: &'a mut dyn TilemapPlugin,
    /// Projection matrix of the active render target.
    pub projection: Mat3,
    /// Device pixel ratio of the target.
    pub resolution: f32,
}

/// Uniform block shared by the baked-quad and point-sprite shader variants.
///
/// Matches the WGSL layout: `mat3x3<f32>` columns are padded to vec4 and the
/// whole block rounds up to 96 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct TileUniforms {
    /// Column-major projection x world transform.
    pub projection: [[f32; 4]; 3],
    /// Constant shadow tint.
    pub shadow_color: [f32; 4],
    /// Global animation frame offsets.
    pub animation_frame: [f32; 2],
    /// Point-sprite axis-flip compensation (square variant only).
    pub point_scale: [f32; 2],
    /// |world x-scale| x resolution (square variant only).
    pub projection_scale: f32,
    pub _pad: [f32; 3],
}

impl TileUniforms {
    pub fn new(projection: &Mat3, shadow_color: [f32; 4], animation_frame: [f32; 2]) -> Self {
        Self {
            projection: pack_mat3(projection),
            shadow_color,
            animation_frame,
            point_scale: [1.0, 1.0],
            projection_scale: 1.0,
            _pad: [0.0; 3],
        }
    }
}

/// Pad a [`Mat3`] to the vec4-aligned column layout WGSL expects.
fn pack_mat3(m: &Mat3) -> [[f32; 4]; 3] {
    [
        [m.x_axis.x, m.x_axis.y, m.x_axis.z, 0.0],
        [m.y_axis.x, m.y_axis.y, m.y_axis.z, 0.0],
        [m.z_axis.x, m.z_axis.y, m.z_axis.z, 0.0],
    ]
}
