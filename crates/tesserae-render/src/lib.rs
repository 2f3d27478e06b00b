//! Tesserae Render
//!
//! wgpu implementation of the tilemap renderer-plugin contract. The
//! [`WgpuTilemap`] records batches submitted by composite layers during
//! their GPU render pass, uploads instance and uniform data, and issues one
//! draw per (batch, texture slot) group.

mod tilemap;

pub use tilemap::WgpuTilemap;
