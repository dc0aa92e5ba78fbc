use crate::error::{Error, Result};
use crate::util::TakeArray;
use std::io::Read;

/// Bytes per pixel: one each for red, green, blue and alpha.
pub const CHANNELS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::EmptyImage);
        }
        Ok(Dimensions { width, height })
    }

    /// Guess a square image from a buffer length: `floor(sqrt(len / 4))` on each side.
    ///
    /// Lengths that are not `4 * k * k` leave trailing bytes; [`RawImage::decode`]
    /// ignores them and logs how many at debug level.
    pub fn infer(len: usize) -> Result<Self> {
        let side = (len / CHANNELS).isqrt();
        let side = u32::try_from(side).map_err(|_| Error::DimensionsOverflow)?;
        Dimensions::new(side, side)
    }

    pub fn pixel_count(&self) -> Result<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)
            .ok_or(Error::DimensionsOverflow)
    }

    pub fn byte_len(&self) -> Result<usize> {
        self.pixel_count()?
            .checked_mul(CHANNELS)
            .ok_or(Error::DimensionsOverflow)
    }
}

/// A tightly packed, top-down RGBA8 pixel grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl RawImage {
    /// Reinterpret the start of `bytes` as a `width * height` RGBA grid.
    /// Anything past `width * height * 4` is left untouched.
    pub fn decode(bytes: &[u8], dims: Dimensions) -> Result<Self> {
        let expected = dims.byte_len()?;
        if bytes.len() < expected {
            return Err(Error::BufferTooShort {
                expected,
                actual: bytes.len(),
            });
        }
        if bytes.len() > expected {
            log::debug!(
                "ignoring {} trailing bytes past {}x{}",
                bytes.len() - expected,
                dims.width,
                dims.height
            );
        }

        Ok(RawImage {
            width: dims.width,
            height: dims.height,
            pixels: bytes[..expected].to_vec(),
        })
    }

    /// Read one frame of a dimension-prefixed stream: big-endian `u32` width,
    /// big-endian `u32` height, then the RGBA bytes.
    ///
    /// Returns `Ok(None)` if the stream ends cleanly before a new frame starts.
    pub fn read_prefixed(input: &mut impl Read) -> Result<Option<Self>> {
        let mut header = Vec::with_capacity(8);
        input.by_ref().take(8).read_to_end(&mut header)?;
        if header.is_empty() {
            return Ok(None);
        }

        let mut fields = header.iter().copied();
        let w: Option<[u8; 4]> = fields.take_array();
        let h: Option<[u8; 4]> = fields.take_array();
        let (Some(w), Some(h)) = (w, h) else {
            return Err(Error::BufferTooShort {
                expected: 8,
                actual: header.len(),
            });
        };
        let dims = Dimensions::new(u32::from_be_bytes(w), u32::from_be_bytes(h))?;

        let expected = dims.byte_len()?;
        // grow with the data actually read, the header may lie
        let mut pixels = Vec::new();
        input.take(expected as u64).read_to_end(&mut pixels)?;
        if pixels.len() < expected {
            return Err(Error::BufferTooShort {
                expected,
                actual: pixels.len(),
            });
        }

        Ok(Some(RawImage {
            width: dims.width,
            height: dims.height,
            pixels,
        }))
    }
}

#[cfg(test)]
impl RawImage {
    pub fn to_prefixed(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(8 + self.pixels.len());
        bytes.extend_from_slice(&self.width.to_be_bytes());
        bytes.extend_from_slice(&self.height.to_be_bytes());
        bytes.extend_from_slice(&self.pixels);
        bytes
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; CHANNELS]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * CHANNELS;
        self.pixels[offset..offset + CHANNELS].try_into().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_exact_squares() {
        for k in [1u32, 2, 5, 64, 513] {
            let len = (k * k * 4) as usize;
            assert_eq!(Dimensions::infer(len).unwrap(), Dimensions::new(k, k).unwrap());
        }
    }

    #[test]
    fn infer_truncates_to_whole_side() {
        let dims = Dimensions::infer(100).unwrap();
        assert_eq!((dims.width, dims.height), (5, 5));
        assert_eq!(dims.byte_len().unwrap(), 100);

        let dims = Dimensions::infer(99).unwrap();
        assert_eq!((dims.width, dims.height), (4, 4));
        assert_eq!(dims.byte_len().unwrap(), 64);
    }

    #[test]
    fn infer_rejects_tiny_buffers() {
        assert!(matches!(Dimensions::infer(0), Err(Error::EmptyImage)));
        assert!(matches!(Dimensions::infer(3), Err(Error::EmptyImage)));
        assert_eq!(Dimensions::infer(4).unwrap(), Dimensions::new(1, 1).unwrap());
    }

    #[test]
    fn zero_sized_dimensions_are_rejected() {
        assert!(matches!(Dimensions::new(0, 4), Err(Error::EmptyImage)));
        assert!(matches!(Dimensions::new(4, 0), Err(Error::EmptyImage)));
    }

    #[test]
    fn decodes_two_dark_rows_then_three_light_rows() {
        let mut bytes = vec![0x00; 40];
        bytes.extend(vec![0xFF; 60]);

        let img = RawImage::decode(&bytes, Dimensions::new(5, 5).unwrap()).unwrap();
        assert_eq!(img.pixels.len(), 100);
        for y in 0..5 {
            for x in 0..5 {
                let expected = if y < 2 { [0; 4] } else { [255; 4] };
                assert_eq!(img.pixel(x, y), Some(expected), "pixel ({x}, {y})");
            }
        }
        assert_eq!(img.pixel(5, 0), None);
    }

    #[test]
    fn decode_consumes_exactly_the_grid() {
        let bytes: Vec<u8> = (0..99).collect();
        let dims = Dimensions::infer(bytes.len()).unwrap();
        let img = RawImage::decode(&bytes, dims).unwrap();
        assert_eq!(img.pixels, bytes[..64]);
    }

    #[test]
    fn decode_fails_on_short_buffer() {
        let err = RawImage::decode(&[0; 99], Dimensions::new(5, 5).unwrap()).unwrap_err();
        assert!(matches!(
            err,
            Error::BufferTooShort {
                expected: 100,
                actual: 99
            }
        ));
    }

    #[test]
    fn reads_prefixed_frames_until_end_of_stream() {
        let first = RawImage {
            width: 2,
            height: 1,
            pixels: vec![1, 2, 3, 4, 5, 6, 7, 8],
        };
        let second = RawImage {
            width: 1,
            height: 1,
            pixels: vec![9, 9, 9, 9],
        };
        let mut stream = first.to_prefixed();
        stream.extend(second.to_prefixed());

        let mut input = stream.as_slice();
        assert_eq!(RawImage::read_prefixed(&mut input).unwrap(), Some(first));
        assert_eq!(RawImage::read_prefixed(&mut input).unwrap(), Some(second));
        assert_eq!(RawImage::read_prefixed(&mut input).unwrap(), None);
    }

    #[test]
    fn truncated_prefixed_frame_is_an_error() {
        let mut stream = RawImage {
            width: 2,
            height: 2,
            pixels: vec![7; 16],
        }
        .to_prefixed();
        stream.truncate(stream.len() - 3);

        let err = RawImage::read_prefixed(&mut stream.as_slice()).unwrap_err();
        assert!(matches!(
            err,
            Error::BufferTooShort {
                expected: 16,
                actual: 13
            }
        ));

        let err = RawImage::read_prefixed(&mut &[0u8, 0, 0][..]).unwrap_err();
        assert!(matches!(err, Error::BufferTooShort { expected: 8, actual: 3 }));
    }

    #[test]
    fn oversized_prefixed_header_fails_without_allocating() {
        let mut stream = 0x7fff_ffffu32.to_be_bytes().to_vec();
        stream.extend(0xffffu32.to_be_bytes());
        stream.extend([1, 2, 3, 4]);

        let err = RawImage::read_prefixed(&mut stream.as_slice()).unwrap_err();
        assert!(matches!(err, Error::BufferTooShort { actual: 4, .. }), "{}", err);
    }
}
