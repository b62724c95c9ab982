use crate::data::Resource;
use num_enum::TryFromPrimitive;
use std::cell::{Cell, Ref, RefCell};
use std::fmt;

#[repr(u32)]
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash, TryFromPrimitive)]
pub enum TextureFormat {
    R8,
    Rg8,
    Rgb8,
    #[default]
    Rgba8,
    R16F,
    Rgba16F,
    R32F,
    Rgba32F,
    Depth24Stencil8,
    Depth32F,
}

impl TextureFormat {
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            TextureFormat::R8 => 1,
            TextureFormat::Rg8 | TextureFormat::R16F => 2,
            TextureFormat::Rgb8 => 3,
            TextureFormat::Rgba8
            | TextureFormat::R32F
            | TextureFormat::Depth24Stencil8
            | TextureFormat::Depth32F => 4,
            TextureFormat::Rgba16F => 8,
            TextureFormat::Rgba32F => 16,
        }
    }

    pub const fn is_depth(self) -> bool {
        matches!(self, TextureFormat::Depth24Stencil8 | TextureFormat::Depth32F)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TextureDimension {
    D2,
    D2Array,
    D3,
    CubeMap,
}

impl TextureDimension {
    pub const fn faces(self) -> usize {
        match self {
            TextureDimension::CubeMap => 6,
            _ => 1,
        }
    }
}

/// Client side image of a texture.
///
/// The extent is `[width, height, depth]` where depth is the layer count of
/// an array texture and 1 for 2D textures and cube maps. Cube map pixels hold
/// the six faces back to back.
pub struct TextureData {
    dimension: TextureDimension,
    extent: Cell<[u32; 3]>,
    format: Cell<TextureFormat>,
    pixels: RefCell<Vec<u8>>,
    dirty: Cell<bool>,
}

impl TextureData {
    pub fn new(dimension: TextureDimension) -> Self {
        Self {
            dimension,
            extent: Cell::new([0, 0, 1]),
            format: Cell::new(TextureFormat::default()),
            pixels: RefCell::new(Vec::new()),
            dirty: Cell::new(false),
        }
    }

    pub fn dimension(&self) -> TextureDimension {
        self.dimension
    }

    pub fn extent(&self) -> [u32; 3] {
        self.extent.get()
    }

    pub fn format(&self) -> TextureFormat {
        self.format.get()
    }

    pub fn pixels(&self) -> Ref<'_, [u8]> {
        Ref::map(self.pixels.borrow(), Vec::as_slice)
    }

    pub fn set_image(&self, extent: [u32; 3], format: TextureFormat, pixels: Vec<u8>) {
        self.extent.set(extent);
        self.format.set(format);
        *self.pixels.borrow_mut() = pixels;
        self.dirty.set(true);
    }

    /// Byte length the current extent and format call for, `None` if it
    /// doesn't fit in memory.
    pub fn expected_len(&self) -> Option<usize> {
        let [width, height, depth] = self.extent.get();
        [height, depth]
            .into_iter()
            .try_fold(width as usize, |len, side| len.checked_mul(side as usize))?
            .checked_mul(self.dimension.faces())?
            .checked_mul(self.format.get().bytes_per_pixel())
    }

    /// Whether the pixel data covers the extent exactly.
    pub fn is_complete(&self) -> bool {
        self.expected_len() == Some(self.pixels.borrow().len())
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    pub fn clear_dirty(&self) {
        self.dirty.set(false);
    }
}

impl fmt::Debug for TextureData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextureData")
            .field("dimension", &self.dimension)
            .field("extent", &self.extent.get())
            .field("format", &self.format.get())
            .field("bytes", &self.pixels.borrow().len())
            .field("dirty", &self.dirty.get())
            .finish()
    }
}

pub trait Texture2D: Resource {
    fn texture(&self) -> &TextureData;
}

pub trait Texture2DArray: Resource {
    fn texture(&self) -> &TextureData;
}

pub trait Texture3D: Resource {
    fn texture(&self) -> &TextureData;
}

pub trait TextureCubeMap: Resource {
    fn texture(&self) -> &TextureData;
}

impl dyn Texture2D {
    pub fn set_image(&self, width: u32, height: u32, format: TextureFormat, pixels: Vec<u8>) {
        self.texture().set_image([width, height, 1], format, pixels);
    }
}

impl dyn Texture2DArray {
    pub fn set_image(&self, width: u32, height: u32, layers: u32, format: TextureFormat, pixels: Vec<u8>) {
        self.texture().set_image([width, height, layers], format, pixels);
    }
}

impl dyn Texture3D {
    pub fn set_image(&self, width: u32, height: u32, depth: u32, format: TextureFormat, pixels: Vec<u8>) {
        self.texture().set_image([width, height, depth], format, pixels);
    }
}

impl dyn TextureCubeMap {
    /// `pixels` holds the +X, -X, +Y, -Y, +Z, -Z faces in that order.
    pub fn set_image(&self, size: u32, format: TextureFormat, pixels: Vec<u8>) {
        self.texture().set_image([size, size, 1], format, pixels);
    }
}
