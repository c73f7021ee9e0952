use crate::error::FogOfWarError;
use crate::settings::ALPHA_VISIBLE;
use bevy::math::UVec2;

/// Square grid of 8-bit alpha values backing the fog of war texture.
/// 战争迷雾纹理所使用的方形 8 位透明度网格
///
/// Pixels are stored row-major (`index = y * size + x`), which is also the
/// byte layout of an `R8Unorm` texture, so the renderer can upload
/// [`PixelAlphaBuffer::as_bytes`] directly.
///
/// Every in-range [`PixelAlphaBuffer::set`] raises the dirty flag. The renderer
/// consumes it once per synchronization point through
/// [`PixelAlphaBuffer::take_dirty`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelAlphaBuffer {
    size: u32,
    pixels: Vec<u8>,
    dirty: bool,
}

impl PixelAlphaBuffer {
    /// Allocates a `size × size` buffer filled with [`ALPHA_VISIBLE`].
    pub fn new(size: u32) -> Result<Self, FogOfWarError> {
        let mut buffer = Self {
            size: 0,
            pixels: Vec::new(),
            dirty: false,
        };
        buffer.resize(size)?;
        Ok(buffer)
    }

    /// Reallocates the grid. Existing content is discarded.
    /// 重新分配网格，丢弃现有内容
    pub fn resize(&mut self, size: u32) -> Result<(), FogOfWarError> {
        if size < 1 {
            return Err(FogOfWarError::InvalidConfiguration(format!(
                "buffer size must be at least 1, got {size}"
            )));
        }
        let len = (size as usize)
            .checked_mul(size as usize)
            .ok_or_else(|| {
                FogOfWarError::InvalidConfiguration(format!("buffer size too large: {size}x{size}"))
            })?;
        self.size = size;
        self.pixels.clear();
        self.pixels.resize(len, ALPHA_VISIBLE);
        self.dirty = true;
        Ok(())
    }

    /// Side length in pixels.
    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn dimensions(&self) -> UVec2 {
        UVec2::splat(self.size)
    }

    /// Fills every pixel with `alpha`.
    pub fn reset(&mut self, alpha: u8) {
        self.pixels.fill(alpha);
        self.dirty = true;
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.size && y < self.size).then(|| y as usize * self.size as usize + x as usize)
    }

    /// Alpha at `(x, y)`. Outside the grid everything is visible.
    /// 网格之外始终视为可见
    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.index(x, y)
            .map_or(ALPHA_VISIBLE, |index| self.pixels[index])
    }

    /// Writes `alpha` at `(x, y)`; out of range writes are ignored.
    pub fn set(&mut self, x: u32, y: u32, alpha: u8) {
        if let Some(index) = self.index(x, y) {
            self.pixels[index] = alpha;
            self.dirty = true;
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Returns whether the buffer changed since the last call, and clears the flag.
    /// 返回自上次调用以来缓冲区是否改变，并清除标记
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Raw row-major pixel data.
    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    /// Replaces the content with raw row-major pixel data of the same size.
    /// 用相同尺寸的原始数据替换内容
    pub fn load_bytes(&mut self, bytes: &[u8]) -> Result<(), FogOfWarError> {
        if bytes.len() != self.pixels.len() {
            return Err(FogOfWarError::InvalidConfiguration(format!(
                "expected {} bytes for a {}x{} mask, got {}",
                self.pixels.len(),
                self.size,
                self.size,
                bytes.len()
            )));
        }
        self.pixels.copy_from_slice(bytes);
        self.dirty = true;
        Ok(())
    }
}
