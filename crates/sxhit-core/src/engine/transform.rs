use super::error::EngineError;
use crate::core::models::frame::{Frame, PixelData, RawFrame};
use crate::core::models::mask::Mask;

/// Marks a pixel the scorer must ignore: over the count cutoff, or masked out.
pub const INVALID_PIXEL: u16 = 65535;
/// Highest intensity a valid pixel can carry once narrowed to 16 bits.
pub const CLAMPED_PIXEL: u16 = 65534;

/// Narrows a raw frame to 16-bit intensities.
///
/// 8-bit data is widened and 16-bit data is taken as is. 32-bit values above
/// `pixel_max` become [`INVALID_PIXEL`]; values in `(65534, pixel_max]` are clamped to
/// [`CLAMPED_PIXEL`]; everything else is narrowed unchanged.
pub fn normalize(raw: RawFrame, pixel_max: u32) -> Result<Frame, EngineError> {
    let shape = raw.shape();
    let pixels = match raw.into_data() {
        PixelData::U8(values) => values.into_iter().map(u16::from).collect(),
        PixelData::U16(values) => values,
        PixelData::U32(values) => values
            .into_iter()
            .map(|v| narrow_u32(v, pixel_max))
            .collect(),
    };
    Frame::new(shape, pixels)
        .ok_or_else(|| EngineError::Internal(format!("normalized buffer does not fit {}", shape)))
}

#[inline]
fn narrow_u32(value: u32, pixel_max: u32) -> u16 {
    if value > pixel_max {
        INVALID_PIXEL
    } else {
        u16::try_from(value).map_or(CLAMPED_PIXEL, |v| v.min(CLAMPED_PIXEL))
    }
}

/// Overwrites every excluded pixel with [`INVALID_PIXEL`].
pub fn apply_mask(frame: &mut Frame, mask: &Mask) -> Result<(), EngineError> {
    if mask.shape() != frame.shape() {
        return Err(EngineError::ShapeMismatch {
            expected: mask.shape(),
            found: frame.shape(),
        });
    }
    let pixels = frame.pixels_mut();
    for &idx in mask.excluded() {
        pixels[idx] = INVALID_PIXEL;
    }
    Ok(())
}

/// Normalization followed by masking: the full path from container bytes to scorer input.
pub fn prepare_frame(
    raw: RawFrame,
    pixel_max: u32,
    mask: Option<&Mask>,
) -> Result<Frame, EngineError> {
    let mut frame = normalize(raw, pixel_max)?;
    if let Some(mask) = mask {
        apply_mask(&mut frame, mask)?;
    }
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::frame::Shape;

    fn raw(data: PixelData) -> RawFrame {
        let len = data.len();
        RawFrame::new(Shape::new(len, 1), data).unwrap()
    }

    #[test]
    fn u8_frames_are_widened() {
        let frame = normalize(raw(PixelData::U8(vec![0, 7, 255])), 1000).unwrap();
        assert_eq!(frame.pixels(), &[0, 7, 255]);
    }

    #[test]
    fn u16_frames_pass_through_unchanged() {
        let values = vec![0, 1234, 65534, 65535];
        let frame = normalize(raw(PixelData::U16(values.clone())), 10).unwrap();
        assert_eq!(frame.pixels(), values.as_slice());
    }

    #[test]
    fn u32_values_follow_the_clamping_rule() {
        let pixel_max = 100_000;
        let frame = normalize(
            raw(PixelData::U32(vec![
                0,
                500,
                65533,
                65534,
                65535,
                70_000,
                100_000,
                100_001,
                u32::MAX,
            ])),
            pixel_max,
        )
        .unwrap();
        assert_eq!(
            frame.pixels(),
            &[0, 500, 65533, 65534, 65534, 65534, 65534, 65535, 65535]
        );
    }

    #[test]
    fn u32_values_above_a_low_cutoff_are_invalid() {
        let frame = normalize(raw(PixelData::U32(vec![999, 1000, 1001])), 1000).unwrap();
        assert_eq!(frame.pixels(), &[999, 1000, 65535]);
    }

    #[test]
    fn u32_normalization_preserves_in_range_values() {
        let pixel_max = 65_534 + 17;
        for value in (0u32..=pixel_max + 40).step_by(97).chain([65533, 65534, 65535]) {
            let out = normalize(raw(PixelData::U32(vec![value])), pixel_max).unwrap().pixels()[0];
            if value <= pixel_max && value <= 65534 {
                assert_eq!(u32::from(out), value);
            } else if value > pixel_max {
                assert_eq!(out, INVALID_PIXEL);
            } else {
                assert_eq!(out, CLAMPED_PIXEL);
            }
        }
    }

    #[test]
    fn mask_overwrites_exactly_the_excluded_pixels() {
        let shape = Shape::new(3, 2);
        let mut frame = Frame::new(shape, vec![1, 2, 3, 4, 5, 6]).unwrap();
        let mask = Mask::from_values(shape, &[0u32, 1, 0, 0, 0, 1]).unwrap();
        apply_mask(&mut frame, &mask).unwrap();
        assert_eq!(frame.pixels(), &[1, 65535, 3, 4, 5, 65535]);
    }

    #[test]
    fn mask_shape_mismatch_is_an_error() {
        let mut frame = Frame::new(Shape::new(2, 2), vec![0; 4]).unwrap();
        let mask = Mask::empty(Shape::new(4, 1));
        let err = apply_mask(&mut frame, &mask).unwrap_err();
        assert!(matches!(err, EngineError::ShapeMismatch { .. }));
    }

    #[test]
    fn prepare_frame_normalizes_then_masks() {
        let shape = Shape::new(2, 1);
        let raw = RawFrame::new(shape, PixelData::U32(vec![70_000, 5])).unwrap();
        let mask = Mask::from_values(shape, &[0u8, 1]).unwrap();
        let frame = prepare_frame(raw, 80_000, Some(&mask)).unwrap();
        assert_eq!(frame.pixels(), &[65534, 65535]);
    }
}
