//! Instanced wgpu tilemap backend.
//!
//! Frame lifecycle per layer: the layer's `render_gpu` binds a shader
//! variant, uploads uniforms, and records its batches through the
//! [`TilemapPlugin`] contract; the host then calls [`WgpuTilemap::prepare`]
//! to upload buffers and [`WgpuTilemap::render`] to issue the draws into an
//! open render pass.

use ahash::AHashMap;
use bytemuck::{Pod, Zeroable};
use tesserae_tilemap::{TextureId, TileBatch, TileQuad, TileUniforms, TilemapPlugin};
use wgpu::util::DeviceExt;

/// GPU instance data for one tile quad.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
struct TileInstance {
    /// Source rectangle in texels: u, v, width, height.
    src: [f32; 4],
    /// Destination position.
    pos: [f32; 2],
    /// Animation offsets, multiplied by the global animation frame.
    anim: [f32; 2],
}

impl TileInstance {
    const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    fn new(quad: &TileQuad) -> Self {
        Self {
            src: [quad.src.x, quad.src.y, quad.src.width, quad.src.height],
            pos: quad.pos.to_array(),
            anim: quad.anim.to_array(),
        }
    }

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        const ATTRS: &[wgpu::VertexAttribute] = &wgpu::vertex_attr_array![
            // location 1: src (vec4)
            1 => Float32x4,
            // location 2: pos (vec2)
            2 => Float32x2,
            // location 3: anim (vec2)
            3 => Float32x2,
        ];

        wgpu::VertexBufferLayout {
            array_stride: Self::SIZE,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: ATTRS,
        }
    }
}

/// A contiguous instance-buffer range drawn with one texture bound.
struct DrawGroup {
    texture: TextureId,
    start: u32,
    count: u32,
    use_square: bool,
}

/// Append one batch's quads to `pending`, grouped contiguously by texture
/// slot so each group renders with a single draw call.
fn record_batch(
    pending: &mut Vec<TileInstance>,
    groups: &mut Vec<DrawGroup>,
    batch: &TileBatch,
    use_square: bool,
) {
    for (slot, texture) in batch.textures().iter().enumerate() {
        let start = pending.len() as u32;
        for quad in batch.quads().iter().filter(|q| q.texture_index == slot) {
            pending.push(TileInstance::new(quad));
        }
        let count = pending.len() as u32 - start;
        if count > 0 {
            groups.push(DrawGroup {
                texture: texture.base(),
                start,
                count,
                use_square,
            });
        }
    }
}

/// wgpu renderer plugin for composite tile layers.
///
/// Owns the two shader-variant pipelines, the shared uniform buffer, a
/// per-texture bind-group cache, and the growable instance buffer. Texture
/// decoding and upload stay with the host; views are registered through
/// [`register_texture`](Self::register_texture).
pub struct WgpuTilemap {
    tile_pipeline: wgpu::RenderPipeline,
    square_pipeline: wgpu::RenderPipeline,
    quad_vbo: wgpu::Buffer,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    texture_layout: wgpu::BindGroupLayout,
    textures: AHashMap<TextureId, wgpu::BindGroup>,
    instance_buffer: wgpu::Buffer,
    instance_capacity: usize,
    // Frame state recorded through the plugin contract
    pending: Vec<TileInstance>,
    groups: Vec<DrawGroup>,
    pending_uniforms: TileUniforms,
    uniforms_dirty: bool,
    tile_anim: [f32; 2],
    bypass_layer_transform: bool,
}

impl WgpuTilemap {
    const INITIAL_CAPACITY: usize = 2048;

    /// Create the backend for the given render target format.
    pub fn new(device: &wgpu::Device, target_format: wgpu::TextureFormat) -> Self {
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("tilemap_uniform_buffer"),
            size: std::mem::size_of::<TileUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("tilemap_uniform_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("tilemap_uniform_bind_group"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("tilemap_texture_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("tilemap_pipeline_layout"),
            bind_group_layouts: &[&uniform_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let tile_pipeline =
            create_tile_pipeline(device, &pipeline_layout, target_format, TILE_SHADER, "tilemap_tile_pipeline");
        let square_pipeline = create_tile_pipeline(
            device,
            &pipeline_layout,
            target_format,
            SQUARE_SHADER,
            "tilemap_square_pipeline",
        );

        // Unit quad (0,0 to 1,1)
        let quad_vertices: [[f32; 2]; 4] = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];
        let quad_vbo = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("tilemap_quad_vbo"),
            contents: bytemuck::cast_slice(&quad_vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let instance_buffer = create_instance_buffer(device, Self::INITIAL_CAPACITY);

        Self {
            tile_pipeline,
            square_pipeline,
            quad_vbo,
            uniform_buffer,
            uniform_bind_group,
            texture_layout,
            textures: AHashMap::new(),
            instance_buffer,
            instance_capacity: Self::INITIAL_CAPACITY,
            pending: Vec::with_capacity(Self::INITIAL_CAPACITY),
            groups: Vec::new(),
            pending_uniforms: TileUniforms::new(
                &glam::Mat3::IDENTITY,
                [0.0, 0.0, 0.0, 0.5],
                [0.0, 0.0],
            ),
            uniforms_dirty: true,
            tile_anim: [0.0, 0.0],
            bypass_layer_transform: false,
        }
    }

    /// Register the view and sampler backing a base texture id.
    pub fn register_texture(
        &mut self,
        device: &wgpu::Device,
        id: TextureId,
        view: &wgpu::TextureView,
        sampler: &wgpu::Sampler,
    ) {
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("tilemap_texture_bind_group"),
            layout: &self.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        });
        self.textures.insert(id, bind_group);
    }

    /// Advance the global animation counter shared by every layer.
    pub fn set_tile_anim(&mut self, anim: [f32; 2]) {
        self.tile_anim = anim;
    }

    /// Toggle the immediate-mode transform bypass reported to layers.
    pub fn set_bypass_layer_transform(&mut self, bypass: bool) {
        self.bypass_layer_transform = bypass;
    }

    fn ensure_instance_capacity(&mut self, device: &wgpu::Device, required: usize) {
        if required > self.instance_capacity {
            let new_capacity = required.next_power_of_two();
            self.instance_buffer = create_instance_buffer(device, new_capacity);
            self.instance_capacity = new_capacity;
        }
    }

    /// Upload uniform and instance data recorded since the last
    /// [`render`](Self::render).
    pub fn prepare(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        if self.uniforms_dirty {
            queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&self.pending_uniforms));
            self.uniforms_dirty = false;
        }
        if self.pending.is_empty() {
            return;
        }
        self.ensure_instance_capacity(device, self.pending.len());
        tracing::trace!("uploading {} tile instances", self.pending.len());
        queue.write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&self.pending));
    }

    /// Issue the recorded draws into `pass`, then reset the frame state.
    pub fn render(&mut self, pass: &mut wgpu::RenderPass<'_>) {
        if self.groups.is_empty() {
            self.pending.clear();
            return;
        }

        pass.set_bind_group(0, &self.uniform_bind_group, &[]);
        pass.set_vertex_buffer(0, self.quad_vbo.slice(..));
        pass.set_vertex_buffer(1, self.instance_buffer.slice(..));

        let mut active_square = None;
        for group in &self.groups {
            if active_square != Some(group.use_square) {
                pass.set_pipeline(if group.use_square {
                    &self.square_pipeline
                } else {
                    &self.tile_pipeline
                });
                active_square = Some(group.use_square);
            }
            let Some(texture) = self.textures.get(&group.texture) else {
                tracing::warn!(id = group.texture.0, "texture not registered, skipping group");
                continue;
            };
            pass.set_bind_group(1, texture, &[]);
            pass.draw(0..4, group.start..group.start + group.count);
        }

        self.groups.clear();
        self.pending.clear();
    }
}

impl TilemapPlugin for WgpuTilemap {
    fn bind_shader(&mut self, _use_square: bool) {
        // Pipeline selection is deferred to render(); groups carry the
        // variant they were recorded under.
    }

    fn upload_uniforms(&mut self, _use_square: bool, uniforms: &TileUniforms) {
        self.pending_uniforms = *uniforms;
        self.uniforms_dirty = true;
    }

    fn tile_anim(&self) -> [f32; 2] {
        self.tile_anim
    }

    fn bypass_layer_transform(&self) -> bool {
        self.bypass_layer_transform
    }

    fn draw_batch(&mut self, batch: &TileBatch, use_square: bool) {
        record_batch(&mut self.pending, &mut self.groups, batch, use_square);
    }
}

fn create_instance_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("tilemap_instance_buffer"),
        size: capacity as u64 * TileInstance::SIZE,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_tile_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    target_format: wgpu::TextureFormat,
    source: &str,
    label: &str,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[
                // Unit quad corners
                wgpu::VertexBufferLayout {
                    array_stride: 8,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &[wgpu::VertexAttribute {
                        format: wgpu::VertexFormat::Float32x2,
                        offset: 0,
                        shader_location: 0,
                    }],
                },
                TileInstance::layout(),
            ],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: target_format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleStrip,
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

/// Baked-quad shader variant.
const TILE_SHADER: &str = r#"
struct TileUniforms {
    projection: mat3x3<f32>,
    shadow_color: vec4<f32>,
    animation_frame: vec2<f32>,
    point_scale: vec2<f32>,
    projection_scale: f32,
};

@group(0) @binding(0) var<uniform> u: TileUniforms;
@group(1) @binding(0) var tile_texture: texture_2d<f32>;
@group(1) @binding(1) var tile_sampler: sampler;

struct VertexInput {
    @location(0) corner: vec2<f32>,
    @location(1) src: vec4<f32>,
    @location(2) pos: vec2<f32>,
    @location(3) anim: vec2<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) texel: vec2<f32>,
};

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let world = in.pos + in.corner * in.src.zw;
    let projected = u.projection * vec3<f32>(world, 1.0);
    out.clip_position = vec4<f32>(projected.xy, 0.0, 1.0);
    out.texel = in.src.xy + in.anim * u.animation_frame + in.corner * in.src.zw;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let size = vec2<f32>(textureDimensions(tile_texture));
    let color = textureSample(tile_texture, tile_sampler, in.texel / size);
    return mix(u.shadow_color * u.shadow_color.a, color, color.a);
}
"#;

/// Point-sprite shader variant: the square keeps its screen orientation, so
/// axis flips are compensated in the sampling direction via `point_scale`.
const SQUARE_SHADER: &str = r#"
struct TileUniforms {
    projection: mat3x3<f32>,
    shadow_color: vec4<f32>,
    animation_frame: vec2<f32>,
    point_scale: vec2<f32>,
    projection_scale: f32,
};

@group(0) @binding(0) var<uniform> u: TileUniforms;
@group(1) @binding(0) var tile_texture: texture_2d<f32>;
@group(1) @binding(1) var tile_sampler: sampler;

struct VertexInput {
    @location(0) corner: vec2<f32>,
    @location(1) src: vec4<f32>,
    @location(2) pos: vec2<f32>,
    @location(3) anim: vec2<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) texel: vec2<f32>,
};

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let world = in.pos + in.corner * in.src.zw;
    let projected = u.projection * vec3<f32>(world, 1.0);
    out.clip_position = vec4<f32>(projected.xy, 0.0, 1.0);
    let flipped = (in.corner - vec2<f32>(0.5)) * u.point_scale + vec2<f32>(0.5);
    out.texel = in.src.xy + in.anim * u.animation_frame + flipped * in.src.zw;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let size = vec2<f32>(textureDimensions(tile_texture));
    let color = textureSample(tile_texture, tile_sampler, in.texel / size);
    return mix(u.shadow_color * u.shadow_color.a, color, color.a);
}
"#;
