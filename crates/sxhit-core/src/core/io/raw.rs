//! A minimal uncompressed on-disk layout for frame stacks.
//!
//! Every file starts with a fixed 20-byte little-endian header:
//!
//! | bytes  | field                             |
//! |--------|-----------------------------------|
//! | 0..4   | magic `SXRW`                      |
//! | 4      | bit depth (8, 16 or 32)           |
//! | 5..8   | reserved, zero                    |
//! | 8..12  | width in pixels                   |
//! | 12..16 | height in pixels                  |
//! | 16..20 | number of frames                  |
//!
//! followed by the frames back to back, each stored row-major.
//! Containers and masks share this layout.

use crate::core::models::frame::{PixelData, PixelDepth, RawFrame, Shape};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const MAGIC: [u8; 4] = *b"SXRW";
pub const HEADER_LEN: u64 = 20;

#[derive(Debug, Error)]
pub enum RawError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Not a raw frame file (magic {0:?})")]
    BadMagic([u8; 4]),
    #[error("Unsupported pixel bit depth: {0}")]
    UnsupportedDepth(u8),
    #[error("Frame offset {offset} is out of range for a file holding {count} frame(s)")]
    FrameOutOfRange { offset: usize, count: usize },
    #[error("Frame {index} does not match the declared shape or depth")]
    InconsistentFrame { index: usize },
    #[error("Corrupt header: {0}")]
    Corrupt(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawHeader {
    pub depth: PixelDepth,
    pub shape: Shape,
    pub frame_count: usize,
}

impl RawHeader {
    /// Size of one frame. Only meaningful for headers that passed [`RawHeader::read_from`]
    /// or describe frames already held in memory.
    #[inline]
    pub fn frame_bytes(&self) -> u64 {
        (self.shape.pixel_count() * self.depth.bytes_per_pixel()) as u64
    }

    /// Bytes of pixel data the header declares, or `None` on overflow.
    fn checked_data_bytes(&self) -> Option<u64> {
        let frame = self
            .shape
            .checked_pixel_count()?
            .checked_mul(self.depth.bytes_per_pixel())?;
        u64::try_from(frame)
            .ok()?
            .checked_mul(self.frame_count as u64)
    }

    /// Reads and validates a header against the length of the file it came from.
    pub fn read_from(reader: &mut impl Read, file_len: u64) -> Result<Self, RawError> {
        let mut buf = [0u8; HEADER_LEN as usize];
        reader.read_exact(&mut buf)?;

        let magic = [buf[0], buf[1], buf[2], buf[3]];
        if magic != MAGIC {
            return Err(RawError::BadMagic(magic));
        }
        let depth = PixelDepth::from_bits(buf[4]).ok_or(RawError::UnsupportedDepth(buf[4]))?;
        let width = read_u32(&buf[8..12]) as usize;
        let height = read_u32(&buf[12..16]) as usize;
        let frame_count = read_u32(&buf[16..20]) as usize;

        let header = Self {
            depth,
            shape: Shape::new(width, height),
            frame_count,
        };

        let data_bytes = header.checked_data_bytes().ok_or_else(|| {
            RawError::Corrupt(format!(
                "{} frame(s) of {} at {} bits overflow the addressable size",
                frame_count,
                header.shape,
                depth.bits()
            ))
        })?;
        let available = file_len.saturating_sub(HEADER_LEN);
        if data_bytes > available {
            return Err(RawError::Corrupt(format!(
                "declares {} byte(s) of pixel data but the file holds {}",
                data_bytes, available
            )));
        }
        Ok(header)
    }

    pub fn write_to(&self, writer: &mut impl Write) -> io::Result<()> {
        writer.write_all(&MAGIC)?;
        writer.write_all(&[self.depth.bits(), 0, 0, 0])?;
        writer.write_all(&(self.shape.width as u32).to_le_bytes())?;
        writer.write_all(&(self.shape.height as u32).to_le_bytes())?;
        writer.write_all(&(self.frame_count as u32).to_le_bytes())?;
        Ok(())
    }
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(bytes);
    u32::from_le_bytes(word)
}

pub fn decode_pixels(depth: PixelDepth, bytes: &[u8]) -> PixelData {
    match depth {
        PixelDepth::U8 => PixelData::U8(bytes.to_vec()),
        PixelDepth::U16 => PixelData::U16(
            bytes
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]))
                .collect(),
        ),
        PixelDepth::U32 => PixelData::U32(
            bytes
                .chunks_exact(4)
                .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        ),
    }
}

fn encode_pixels(data: &PixelData, writer: &mut impl Write) -> io::Result<()> {
    match data {
        PixelData::U8(v) => writer.write_all(v),
        PixelData::U16(v) => v.iter().try_for_each(|p| writer.write_all(&p.to_le_bytes())),
        PixelData::U32(v) => v.iter().try_for_each(|p| writer.write_all(&p.to_le_bytes())),
    }
}

/// An open raw file with random access to its frames.
#[derive(Debug)]
pub struct RawFile {
    path: PathBuf,
    header: RawHeader,
    reader: BufReader<File>,
}

impl RawFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, RawError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);
        let header = RawHeader::read_from(&mut reader, file_len)?;
        Ok(Self {
            path,
            header,
            reader,
        })
    }

    #[inline]
    pub fn header(&self) -> &RawHeader {
        &self.header
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read_frame(&mut self, offset: usize) -> Result<RawFrame, RawError> {
        if offset >= self.header.frame_count {
            return Err(RawError::FrameOutOfRange {
                offset,
                count: self.header.frame_count,
            });
        }
        let frame_bytes = self.header.frame_bytes();
        self.reader
            .seek(SeekFrom::Start(HEADER_LEN + offset as u64 * frame_bytes))?;

        let mut bytes = vec![0u8; frame_bytes as usize];
        self.reader.read_exact(&mut bytes)?;

        let data = decode_pixels(self.header.depth, &bytes);
        RawFrame::new(self.header.shape, data)
            .ok_or(RawError::InconsistentFrame { index: offset })
    }
}

/// Writes `frames` as a raw file. All frames must share `shape` and one bit depth.
pub fn write_raw<P: AsRef<Path>>(
    path: P,
    shape: Shape,
    frames: &[PixelData],
) -> Result<(), RawError> {
    let depth = frames.first().map_or(PixelDepth::U16, PixelData::depth);
    for (index, frame) in frames.iter().enumerate() {
        if frame.depth() != depth || frame.len() != shape.pixel_count() {
            return Err(RawError::InconsistentFrame { index });
        }
    }

    let mut writer = BufWriter::new(File::create(path)?);
    RawHeader {
        depth,
        shape,
        frame_count: frames.len(),
    }
    .write_to(&mut writer)?;
    for frame in frames {
        encode_pixels(frame, &mut writer)?;
    }
    writer.flush()?;
    Ok(())
}
