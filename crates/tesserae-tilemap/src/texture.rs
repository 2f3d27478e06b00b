//! Texture handles and the name-resolution cache.
//!
//! Handles are lightweight, copyable references. The batcher never touches
//! pixel data; decoding and upload belong to the host.

use ahash::AHashMap;
use tesserae_core::geometry::Rect;

/// Stable identity of a base texture (the underlying pixel source).
///
/// Slot-reuse decisions compare this id, so two tile textures cut from the
/// same base can share one batch slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u64);

impl TextureId {
    /// Reserved id handed out for names the cache cannot resolve.
    pub const PLACEHOLDER: Self = Self(u64::MAX);
}

/// A copyable handle to a rectangular region of a base texture.
///
/// The `frame` is the source rectangle in texel coordinates; the `base` is
/// the identity used for batching equality.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileTexture {
    base: TextureId,
    frame: Rect<f32>,
}

impl TileTexture {
    pub fn new(base: TextureId, frame: Rect<f32>) -> Self {
        Self { base, frame }
    }

    pub fn base(&self) -> TextureId {
        self.base
    }

    pub fn frame(&self) -> Rect<f32> {
        self.frame
    }
}

/// Either an already-resolved texture handle or a name still to be resolved
/// through a [`TextureCache`].
#[derive(Debug, Clone, Copy)]
pub enum TileSource<'a> {
    Texture(TileTexture),
    Name(&'a str),
}

impl From<TileTexture> for TileSource<'static> {
    fn from(texture: TileTexture) -> Self {
        TileSource::Texture(texture)
    }
}

impl<'a> From<&'a str> for TileSource<'a> {
    fn from(name: &'a str) -> Self {
        TileSource::Name(name)
    }
}

/// Name-to-texture registry, injected wherever resolution happens.
///
/// Unknown names resolve to a placeholder handle rather than an error, so
/// tile insertion always succeeds.
#[derive(Debug, Default)]
pub struct TextureCache {
    entries: AHashMap<String, TileTexture>,
}

impl TextureCache {
    /// Frame assigned to placeholder handles.
    const PLACEHOLDER_FRAME: Rect<f32> = Rect {
        x: 0.0,
        y: 0.0,
        width: 16.0,
        height: 16.0,
    };

    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, texture: TileTexture) {
        self.entries.insert(name.into(), texture);
    }

    pub fn get(&self, name: &str) -> Option<TileTexture> {
        self.entries.get(name).copied()
    }

    /// Resolve a name, falling back to the placeholder handle.
    pub fn resolve(&self, name: &str) -> TileTexture {
        self.get(name).unwrap_or_else(|| {
            tracing::warn!("texture '{name}' not registered, using placeholder");
            TileTexture::new(TextureId::PLACEHOLDER, Self::PLACEHOLDER_FRAME)
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
