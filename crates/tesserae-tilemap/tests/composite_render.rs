//! Render-dispatch tests for the composite layer, driven through recording
//! mock backends so no GPU is required.

use glam::{Affine2, Mat2, Mat3, Vec2};
use tesserae_core::geometry::Rect;
use tesserae_tilemap::{
    Canvas2d, CanvasFrame, CompositeTileLayer, CompositeTileLayerDescriptor, GpuFrame, TextureCache,
    TextureId, TileBatch, TileTexture, TileUniforms, TilemapPlugin,
};

fn tex(id: u64) -> TileTexture {
    TileTexture::new(TextureId(id), Rect::new(0.0, 0.0, 16.0, 16.0))
}

#[derive(Default)]
struct RecordingCanvas {
    transforms: Vec<Affine2>,
    draws: Vec<(TextureId, Vec2)>,
}

impl Canvas2d for RecordingCanvas {
    fn set_transform(&mut self, transform: &Affine2) {
        self.transforms.push(*transform);
    }

    fn draw_image(&mut self, texture: TextureId, _src: Rect<f32>, dst: Vec2) {
        self.draws.push((texture, dst));
    }
}

#[derive(Default)]
struct RecordingPlugin {
    bound: Vec<bool>,
    uniforms: Vec<(bool, TileUniforms)>,
    batches: Vec<(usize, usize, bool)>,
    tile_anim: [f32; 2],
    bypass: bool,
}

impl TilemapPlugin for RecordingPlugin {
    fn bind_shader(&mut self, use_square: bool) {
        self.bound.push(use_square);
    }

    fn upload_uniforms(&mut self, use_square: bool, uniforms: &TileUniforms) {
        self.uniforms.push((use_square, *uniforms));
    }

    fn tile_anim(&self) -> [f32; 2] {
        self.tile_anim
    }

    fn bypass_layer_transform(&self) -> bool {
        self.bypass
    }

    fn draw_batch(&mut self, batch: &TileBatch, use_square: bool) {
        self.batches
            .push((batch.texture_count(), batch.quad_count(), use_square));
    }
}

fn square_layer(texture_ids: &[u64]) -> CompositeTileLayer {
    CompositeTileLayer::new(CompositeTileLayerDescriptor {
        z_index: 1,
        textures: texture_ids.iter().map(|&id| tex(id)).collect(),
        use_square: true,
        tex_per_batch: 16,
    })
}

#[test]
fn gpu_path_binds_uploads_and_draws_in_order() {
    let mut layer = CompositeTileLayer::new(CompositeTileLayerDescriptor {
        z_index: 0,
        textures: vec![tex(1), tex(2)],
        use_square: false,
        tex_per_batch: 1,
    });
    let cache = TextureCache::new();
    layer.add_tile(tex(1), &cache, Vec2::ZERO, Vec2::ZERO);
    layer.add_tile(tex(2), &cache, Vec2::new(16.0, 0.0), Vec2::ZERO);
    layer.add_tile(tex(2), &cache, Vec2::new(32.0, 0.0), Vec2::ZERO);

    let mut plugin = RecordingPlugin {
        tile_anim: [3.0, 4.0],
        ..Default::default()
    };
    let mut frame = GpuFrame {
        plugin: &mut plugin,
        projection: Mat3::IDENTITY,
        resolution: 1.0,
    };
    layer.render_gpu(&mut frame);

    assert_eq!(plugin.bound, vec![false]);
    assert_eq!(plugin.batches, vec![(1, 1, false), (1, 2, false)]);

    let (square, uniforms) = plugin.uniforms[0];
    assert!(!square);
    assert_eq!(uniforms.animation_frame, [3.0, 4.0]);
    assert_eq!(uniforms.shadow_color, [0.0, 0.0, 0.0, 0.5]);
    // Identity projection and world transform pass straight through.
    assert_eq!(uniforms.projection[0], [1.0, 0.0, 0.0, 0.0]);
    assert_eq!(uniforms.projection[2], [0.0, 0.0, 1.0, 0.0]);
}

#[test]
fn gpu_path_composes_projection_with_world_transform() {
    let mut layer = square_layer(&[1]);
    layer.set_world_transform(Affine2::from_translation(Vec2::new(10.0, 20.0)));

    let mut plugin = RecordingPlugin::default();
    let mut frame = GpuFrame {
        plugin: &mut plugin,
        projection: Mat3::from_scale(Vec2::new(2.0, 2.0)),
        resolution: 1.0,
    };
    layer.render_gpu(&mut frame);

    let (_, uniforms) = plugin.uniforms[0];
    // projection * world: translation lands in the third column, scaled.
    assert_eq!(uniforms.projection[2][0], 20.0);
    assert_eq!(uniforms.projection[2][1], 40.0);
}

#[test]
fn point_scale_follows_axis_flip_signs() {
    // World scale a = -2, d = 3: point scale must be (-1, -1) and the
    // projection scale |a| x resolution.
    let mut layer = square_layer(&[1]);
    layer.set_world_transform(Affine2::from_mat2(Mat2::from_diagonal(Vec2::new(-2.0, 3.0))));

    let mut plugin = RecordingPlugin::default();
    let mut frame = GpuFrame {
        plugin: &mut plugin,
        projection: Mat3::IDENTITY,
        resolution: 2.0,
    };
    layer.render_gpu(&mut frame);

    let (square, uniforms) = plugin.uniforms[0];
    assert!(square);
    assert_eq!(uniforms.point_scale, [-1.0, -1.0]);
    assert_eq!(uniforms.projection_scale, 4.0);
}

#[test]
fn point_scale_flips_y_for_downward_axis() {
    let mut layer = square_layer(&[1]);
    layer.set_world_transform(Affine2::from_mat2(Mat2::from_diagonal(Vec2::new(1.0, -1.0))));

    let mut plugin = RecordingPlugin::default();
    let mut frame = GpuFrame {
        plugin: &mut plugin,
        projection: Mat3::IDENTITY,
        resolution: 1.0,
    };
    layer.render_gpu(&mut frame);

    let (_, uniforms) = plugin.uniforms[0];
    assert_eq!(uniforms.point_scale, [1.0, 1.0]);
    assert_eq!(uniforms.projection_scale, 1.0);
}

#[test]
fn canvas_path_scales_translation_by_resolution() {
    let mut layer = CompositeTileLayer::with_z(0);
    let cache = TextureCache::new();
    layer.add_tile(tex(1), &cache, Vec2::new(5.0, 6.0), Vec2::ZERO);
    layer.set_world_transform(Affine2::from_translation(Vec2::new(100.0, 50.0)));

    let mut canvas = RecordingCanvas::default();
    let mut frame = CanvasFrame {
        canvas: &mut canvas,
        resolution: 2.0,
        bypass_layer_transform: false,
    };
    layer.render_canvas(&mut frame);

    assert_eq!(canvas.transforms.len(), 1);
    assert_eq!(canvas.transforms[0].translation, Vec2::new(200.0, 100.0));
    // Linear part is not resolution-scaled.
    assert_eq!(canvas.transforms[0].matrix2, Mat2::IDENTITY);
    assert_eq!(canvas.draws, vec![(TextureId(1), Vec2::new(5.0, 6.0))]);
}

#[test]
fn canvas_path_honors_transform_bypass() {
    let mut layer = CompositeTileLayer::with_z(0);
    let cache = TextureCache::new();
    layer.add_tile(tex(1), &cache, Vec2::ZERO, Vec2::ZERO);

    let plugin = RecordingPlugin {
        bypass: true,
        ..Default::default()
    };
    let mut canvas = RecordingCanvas::default();
    let mut frame = CanvasFrame::new(&mut canvas, &plugin, 1.0);
    layer.render_canvas(&mut frame);

    assert!(canvas.transforms.is_empty());
    assert_eq!(canvas.draws.len(), 1);
}
