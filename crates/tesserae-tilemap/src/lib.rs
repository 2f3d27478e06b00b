//! Tesserae Tilemap
//!
//! Composite tile batching and dirty tracking: partitions an arbitrary set of
//! tile textures into fixed-capacity batches so a large 2D tile grid renders
//! in a bounded number of draw calls.
//!
//! The centerpiece is [`CompositeTileLayer`], a drawable node that owns an
//! ordered sequence of [`TileBatch`]es, assigns newly added tiles to them by
//! a reuse-then-append heuristic, and tracks whether accumulated geometry has
//! changed since the last upload so the host render loop can skip redundant
//! work. Rendering is dispatched to two backends through injected contracts:
//! an immediate-mode [`Canvas2d`] and a GPU [`TilemapPlugin`].

mod batch;
mod composite;
mod render;
mod texture;

pub use batch::{TileBatch, TileQuad};
pub use composite::{CompositeTileLayer, CompositeTileLayerDescriptor};
pub use render::{Canvas2d, CanvasFrame, GpuFrame, TileUniforms, TilemapPlugin};
pub use texture::{TextureCache, TextureId, TileSource, TileTexture};
