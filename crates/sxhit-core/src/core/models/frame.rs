use std::fmt;

/// Width and height of a detector readout, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Shape {
    pub width: usize,
    pub height: usize,
}

impl Shape {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    /// `None` when the pixel count does not fit in `usize`.
    #[inline]
    pub fn checked_pixel_count(&self) -> Option<usize> {
        self.width.checked_mul(self.height)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Bit depth of the unsigned pixels stored in a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelDepth {
    U8,
    U16,
    U32,
}

impl PixelDepth {
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            8 => Some(Self::U8),
            16 => Some(Self::U16),
            32 => Some(Self::U32),
            _ => None,
        }
    }

    pub fn bits(&self) -> u8 {
        match self {
            Self::U8 => 8,
            Self::U16 => 16,
            Self::U32 => 32,
        }
    }

    #[inline]
    pub fn bytes_per_pixel(&self) -> usize {
        usize::from(self.bits() / 8)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PixelData {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl PixelData {
    pub fn depth(&self) -> PixelDepth {
        match self {
            Self::U8(_) => PixelDepth::U8,
            Self::U16(_) => PixelDepth::U16,
            Self::U32(_) => PixelDepth::U32,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::U8(v) => v.len(),
            Self::U16(v) => v.len(),
            Self::U32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Widens every pixel to `u32`, regardless of the stored depth.
    pub fn to_u32_vec(&self) -> Vec<u32> {
        match self {
            Self::U8(v) => v.iter().map(|&p| u32::from(p)).collect(),
            Self::U16(v) => v.iter().map(|&p| u32::from(p)).collect(),
            Self::U32(v) => v.clone(),
        }
    }
}

/// A frame exactly as read from a container, before depth normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    shape: Shape,
    data: PixelData,
}

impl RawFrame {
    /// Returns `None` when the pixel buffer does not match the shape.
    pub fn new(shape: Shape, data: PixelData) -> Option<Self> {
        (data.len() == shape.pixel_count()).then_some(Self { shape, data })
    }

    #[inline]
    pub fn shape(&self) -> Shape {
        self.shape
    }

    #[inline]
    pub fn data(&self) -> &PixelData {
        &self.data
    }

    #[inline]
    pub fn depth(&self) -> PixelDepth {
        self.data.depth()
    }

    pub fn into_data(self) -> PixelData {
        self.data
    }
}

/// A frame normalized to 16-bit intensities, ready for scoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    shape: Shape,
    pixels: Vec<u16>,
}

impl Frame {
    pub fn new(shape: Shape, pixels: Vec<u16>) -> Option<Self> {
        (pixels.len() == shape.pixel_count()).then_some(Self { shape, pixels })
    }

    #[inline]
    pub fn shape(&self) -> Shape {
        self.shape
    }

    #[inline]
    pub fn pixels(&self) -> &[u16] {
        &self.pixels
    }

    #[inline]
    pub fn pixels_mut(&mut self) -> &mut [u16] {
        &mut self.pixels
    }

    /// Pixel at column `x`, row `y`.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Option<u16> {
        if x >= self.shape.width || y >= self.shape.height {
            return None;
        }
        self.pixels.get(y * self.shape.width + x).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_frame_rejects_buffer_of_wrong_length() {
        let shape = Shape::new(3, 2);
        assert!(RawFrame::new(shape, PixelData::U8(vec![0; 5])).is_none());
        assert!(RawFrame::new(shape, PixelData::U8(vec![0; 6])).is_some());
    }

    #[test]
    fn pixel_depth_round_trips_through_bits() {
        for depth in [PixelDepth::U8, PixelDepth::U16, PixelDepth::U32] {
            assert_eq!(PixelDepth::from_bits(depth.bits()), Some(depth));
        }
        assert_eq!(PixelDepth::from_bits(12), None);
        assert_eq!(PixelDepth::U32.bytes_per_pixel(), 4);
    }

    #[test]
    fn frame_get_uses_row_major_layout() {
        let frame = Frame::new(Shape::new(3, 2), vec![0, 1, 2, 10, 11, 12]).unwrap();
        assert_eq!(frame.get(2, 0), Some(2));
        assert_eq!(frame.get(0, 1), Some(10));
        assert_eq!(frame.get(3, 0), None);
    }
}
