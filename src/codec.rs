use crate::error::{Error, Result};
use crate::img::RawImage;
use crate::util::{TakeArray, TakeVec};
use clap::ValueEnum;
use crc::{CRC_32_ISO_HDLC, Crc};
use std::fmt::{self, Display};
use std::iter::Peekable;
use std::str::{FromStr, from_utf8};

pub const STANDARD_HEADER: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

const PNG_CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// zlib effort used for the IDAT stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Compression {
    Fast,
    #[default]
    Default,
    Best,
}

impl From<Compression> for png::Compression {
    fn from(level: Compression) -> Self {
        match level {
            Compression::Fast => png::Compression::Fast,
            Compression::Default => png::Compression::Default,
            Compression::Best => png::Compression::Best,
        }
    }
}

/// Encode an RGBA8 grid as a complete PNG file in memory.
pub fn encode_img(img: &RawImage, compression: Compression) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut encoder = png::Encoder::new(&mut out, img.width, img.height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_compression(compression.into());

    let mut writer = encoder.write_header()?;
    writer.write_image_data(&img.pixels)?;
    writer.finish()?;

    Ok(out)
}

/// Decode an 8-bit RGBA PNG back into a pixel grid.
pub fn parse_img(bytes: &[u8]) -> Result<RawImage> {
    let mut reader = png::Decoder::new(bytes).read_info()?;
    let mut pixels = vec![0; reader.output_buffer_size()];
    let info = reader.next_frame(&mut pixels)?;

    if info.color_type != png::ColorType::Rgba || info.bit_depth != png::BitDepth::Eight {
        return Err(Error::UnsupportedPng {
            color_type: info.color_type,
            bit_depth: info.bit_depth as u8,
        });
    }
    pixels.truncate(info.buffer_size());

    Ok(RawImage {
        width: info.width,
        height: info.height,
        pixels,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkType {
    data: [u8; 4],
}

impl TryFrom<[u8; 4]> for ChunkType {
    type Error = Error;

    fn try_from(value: [u8; 4]) -> Result<Self> {
        if value.iter().all(u8::is_ascii_alphabetic) {
            Ok(ChunkType { data: value })
        } else {
            Err(Error::InvalidPng(format!("invalid chunk type {:?}", value)))
        }
    }
}

impl FromStr for ChunkType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bytes: [u8; 4] = s
            .as_bytes()
            .try_into()
            .map_err(|_| Error::InvalidPng(format!("chunk type {:?} is not 4 bytes", s)))?;
        ChunkType::try_from(bytes)
    }
}

impl Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match from_utf8(&self.data) {
            Ok(s) => write!(f, "{}", s),
            Err(_) => Err(fmt::Error),
        }
    }
}

impl PartialEq<&str> for ChunkType {
    fn eq(&self, other: &&str) -> bool {
        self.data.as_slice() == other.as_bytes()
    }
}

impl ChunkType {
    pub fn bytes(&self) -> [u8; 4] {
        self.data
    }
    pub fn is_critical(&self) -> bool {
        self.data[0].is_ascii_uppercase()
    }
    pub fn is_public(&self) -> bool {
        self.data[1].is_ascii_uppercase()
    }
    pub fn is_safe_to_copy(&self) -> bool {
        self.data[3].is_ascii_lowercase()
    }
}

#[derive(Debug, Clone)]
pub struct Chunk {
    chunk_type: ChunkType,
    data: Vec<u8>,
    crc: u32,
}

impl Chunk {
    pub fn new(chunk_type: ChunkType, data: Vec<u8>) -> Chunk {
        let mut digest = PNG_CRC.digest();
        digest.update(&chunk_type.bytes());
        digest.update(&data);

        Self {
            crc: digest.finalize(),
            chunk_type,
            data,
        }
    }

    pub fn length(&self) -> usize {
        self.data.len()
    }

    pub fn chunk_type(&self) -> &ChunkType {
        &self.chunk_type
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn crc(&self) -> u32 {
        self.crc
    }

    pub fn as_bytes(&self) -> Vec<u8> {
        let mut bytes = (self.data.len() as u32).to_be_bytes().to_vec();
        bytes.extend_from_slice(&self.chunk_type.bytes());
        bytes.extend_from_slice(&self.data);
        bytes.extend_from_slice(&self.crc.to_be_bytes());
        bytes
    }
}

impl Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.chunk_type.is_critical() {
            "critical"
        } else {
            "ancillary"
        };
        let scope = if self.chunk_type.is_public() {
            "public"
        } else {
            "private"
        };
        let copy = if self.chunk_type.is_safe_to_copy() {
            ", safe to copy"
        } else {
            ""
        };
        write!(
            f,
            "{} ({} {}{}, {} bytes, crc {:08x})",
            self.chunk_type,
            scope,
            kind,
            copy,
            self.length(),
            self.crc
        )
    }
}

/// Split a PNG file into its chunks, checking the signature and every CRC.
pub fn chunks(bytes: &[u8]) -> Result<Vec<Chunk>> {
    let mut stream = bytes.iter().copied();
    let signature: Option<[u8; 8]> = stream.take_array();
    if signature != Some(STANDARD_HEADER) {
        return Err(Error::InvalidPng("missing PNG signature".into()));
    }

    Parser {
        byte_stream: stream.peekable(),
        failed: false,
    }
    .collect()
}

struct Parser<I>
where
    I: Iterator<Item = u8>,
{
    byte_stream: Peekable<I>,
    failed: bool,
}

impl<I: Iterator<Item = u8>> Parser<I> {
    fn read_chunk(&mut self) -> Result<Chunk> {
        let truncated = || Error::InvalidPng("truncated chunk".into());

        let length: [u8; 4] = self.byte_stream.take_array().ok_or_else(truncated)?;
        let raw_type: [u8; 4] = self.byte_stream.take_array().ok_or_else(truncated)?;
        let chunk_type = ChunkType::try_from(raw_type)?;
        let data = self
            .byte_stream
            .take_vec(u32::from_be_bytes(length) as usize)
            .ok_or_else(truncated)?;
        let stored_crc: [u8; 4] = self.byte_stream.take_array().ok_or_else(truncated)?;
        let stored_crc = u32::from_be_bytes(stored_crc);

        let chunk = Chunk::new(chunk_type, data);
        if chunk.crc() != stored_crc {
            return Err(Error::InvalidPng(format!(
                "{} chunk crc mismatch: stored {:08x}, computed {:08x}",
                chunk.chunk_type(),
                stored_crc,
                chunk.crc()
            )));
        }
        Ok(chunk)
    }
}

impl<I: Iterator<Item = u8>> Iterator for Parser<I> {
    type Item = Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        self.byte_stream.peek()?;

        let chunk = self.read_chunk();
        self.failed = chunk.is_err();
        Some(chunk)
    }
}

/// Contents of the IHDR chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub width: u32,
    pub height: u32,
    pub bit_depth: u8,
    pub color_type: u8,
    pub compression_method: u8,
    pub filter_method: u8,
    pub interlace_method: u8,
}

impl Header {
    /// Check chunk ordering (IHDR first, some IDAT, IEND last) and parse IHDR.
    pub fn from_chunks(chunks: &[Chunk]) -> Result<Self> {
        let (Some(first), Some(last)) = (chunks.first(), chunks.last()) else {
            return Err(Error::InvalidPng("no chunks".into()));
        };
        if *first.chunk_type() != "IHDR" {
            return Err(Error::InvalidPng(format!(
                "first chunk is {}, expected IHDR",
                first.chunk_type()
            )));
        }
        if !chunks.iter().any(|c| *c.chunk_type() == "IDAT") {
            return Err(Error::InvalidPng("no IDAT chunk".into()));
        }
        if *last.chunk_type() != "IEND" {
            return Err(Error::InvalidPng(format!(
                "last chunk is {}, expected IEND",
                last.chunk_type()
            )));
        }

        let data = first.data();
        if data.len() != 13 {
            return Err(Error::InvalidPng(format!(
                "IHDR is {} bytes, expected 13",
                data.len()
            )));
        }
        let mut fields = data.iter().copied();
        let width: Option<[u8; 4]> = fields.take_array();
        let height: Option<[u8; 4]> = fields.take_array();
        let (Some(width), Some(height)) = (width, height) else {
            return Err(Error::InvalidPng("short IHDR".into()));
        };

        Ok(Header {
            width: u32::from_be_bytes(width),
            height: u32::from_be_bytes(height),
            bit_depth: data[8],
            color_type: data[9],
            compression_method: data[10],
            filter_method: data[11],
            interlace_method: data[12],
        })
    }
}

impl Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "width: {}", self.width)?;
        writeln!(f, "height: {}", self.height)?;
        writeln!(f, "bit depth: {}", self.bit_depth)?;
        writeln!(f, "color type: {}", self.color_type)?;
        writeln!(f, "compression method: {}", self.compression_method)?;
        writeln!(f, "filter method: {}", self.filter_method)?;
        write!(f, "interlace method: {}", self.interlace_method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::img::Dimensions;

    fn as_bytes(chunks: &[Chunk]) -> Vec<u8> {
        STANDARD_HEADER
            .iter()
            .copied()
            .chain(chunks.iter().flat_map(Chunk::as_bytes))
            .collect()
    }

    fn two_tone() -> RawImage {
        let mut bytes = vec![0x00; 40];
        bytes.extend(vec![0xFF; 60]);
        RawImage::decode(&bytes, Dimensions::new(5, 5).unwrap()).unwrap()
    }

    fn gradient(width: u32, height: u32) -> RawImage {
        let pixels = (0..width * height)
            .flat_map(|i| {
                let (x, y) = (i % width, i / width);
                [x as u8, y as u8, (x ^ y) as u8, 255 - (i % 256) as u8]
            })
            .collect();
        RawImage {
            width,
            height,
            pixels,
        }
    }

    #[test]
    fn round_trips_two_tone_image() {
        let img = two_tone();
        let encoded = encode_img(&img, Compression::Default).unwrap();
        let decoded = parse_img(&encoded).unwrap();
        assert_eq!(decoded, img);
        assert_eq!(decoded.pixel(4, 1), Some([0, 0, 0, 0]));
        assert_eq!(decoded.pixel(0, 2), Some([255, 255, 255, 255]));
    }

    #[test]
    fn round_trips_at_every_compression_level() {
        let img = gradient(37, 11);
        for level in [Compression::Fast, Compression::Default, Compression::Best] {
            let encoded = encode_img(&img, level).unwrap();
            assert_eq!(parse_img(&encoded).unwrap(), img, "{:?}", level);
        }
    }

    #[test]
    fn encoded_container_is_rgba8() {
        let encoded = encode_img(&gradient(3, 2), Compression::Fast).unwrap();
        assert_eq!(encoded[..8], STANDARD_HEADER);

        let chunks = chunks(&encoded).unwrap();
        let header = Header::from_chunks(&chunks).unwrap();
        assert_eq!((header.width, header.height), (3, 2));
        assert_eq!(header.bit_depth, 8);
        assert_eq!(header.color_type, 6);
        assert_eq!(header.interlace_method, 0);
        assert_eq!(as_bytes(&chunks), encoded);
    }

    #[test]
    fn corrupted_crc_is_rejected() {
        let mut encoded = encode_img(&two_tone(), Compression::Default).unwrap();
        // last byte of IHDR's crc: signature (8) + length (4) + type (4) + data (13) + crc (4)
        encoded[8 + 4 + 4 + 13 + 3] ^= 0x01;
        let err = chunks(&encoded).unwrap_err();
        assert!(err.to_string().contains("crc mismatch"), "{}", err);
    }

    #[test]
    fn truncated_file_is_rejected() {
        let encoded = encode_img(&two_tone(), Compression::Default).unwrap();
        assert!(matches!(
            chunks(&encoded[..encoded.len() - 2]),
            Err(Error::InvalidPng(_))
        ));
        assert!(matches!(chunks(b"GIF89a"), Err(Error::InvalidPng(_))));
    }

    #[test]
    fn header_requires_iend_last() {
        let encoded = encode_img(&two_tone(), Compression::Default).unwrap();
        let mut chunks = chunks(&encoded).unwrap();
        chunks.pop();
        assert!(Header::from_chunks(&chunks).is_err());
        assert!(Header::from_chunks(&[]).is_err());
    }

    #[test]
    fn rejects_non_rgba_png() {
        let mut out = Vec::new();
        let mut encoder = png::Encoder::new(&mut out, 2, 2);
        encoder.set_color(png::ColorType::Grayscale);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().unwrap();
        writer.write_image_data(&[0, 64, 128, 255]).unwrap();
        writer.finish().unwrap();

        assert!(matches!(
            parse_img(&out),
            Err(Error::UnsupportedPng { bit_depth: 8, .. })
        ));
    }

    #[test]
    fn chunk_type_properties() {
        let ihdr: ChunkType = "IHDR".parse().unwrap();
        assert!(ihdr.is_critical());
        assert!(ihdr.is_public());
        assert!(!ihdr.is_safe_to_copy());

        let text: ChunkType = "tEXt".parse().unwrap();
        assert!(!text.is_critical());
        assert!(text.is_safe_to_copy());
        assert_eq!(text.to_string(), "tEXt");

        assert!("IH1R".parse::<ChunkType>().is_err());
        assert!("IHDRX".parse::<ChunkType>().is_err());
    }
}
