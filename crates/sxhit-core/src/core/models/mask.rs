use super::frame::Shape;

/// A static per-pixel exclusion map for detector defects and module gaps.
///
/// Only the flat indices of excluded pixels are kept, since they are a small fraction
/// of the detector and are revisited on every frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    shape: Shape,
    excluded: Vec<usize>,
}

impl Mask {
    /// Builds a mask from row-major values; every positive entry marks an excluded pixel.
    ///
    /// Returns `None` when `values` does not match `shape`.
    pub fn from_values<T>(shape: Shape, values: &[T]) -> Option<Self>
    where
        T: Copy + Default + PartialOrd,
    {
        if values.len() != shape.pixel_count() {
            return None;
        }
        let zero = T::default();
        let excluded = values
            .iter()
            .enumerate()
            .filter_map(|(idx, &value)| (value > zero).then_some(idx))
            .collect();
        Some(Self { shape, excluded })
    }

    pub fn empty(shape: Shape) -> Self {
        Self {
            shape,
            excluded: Vec::new(),
        }
    }

    #[inline]
    pub fn shape(&self) -> Shape {
        self.shape
    }

    #[inline]
    pub fn excluded(&self) -> &[usize] {
        &self.excluded
    }

    pub fn excluded_count(&self) -> usize {
        self.excluded.len()
    }
}
