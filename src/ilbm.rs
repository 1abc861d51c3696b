// ilbm-cycle - decode IFF images and animate their color cycles
// Copyright (C) 2025  Mathias Panzenböck
// 
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
// 
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
// 
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Chunk handlers that turn an ILBM or PBM `FORM` into an [`Image`].

use std::{fs::File, io::{BufReader, Read}, path::Path};

use log::{debug, trace};
use serde::Serialize;

use crate::{
    byterun,
    color::Rgb,
    error::{Error, ErrorKind, Result},
    iff::{parse_iff, ChunkId, ParseRules},
    image::{Image, PixelFormat, Planes},
    palette::{ColorRange, Palette, MAX_COLORS},
    planar::{self, MAX_PLANES},
};

pub const MAX_COLOR_RANGES: usize = 16;

pub const RNG_ACTIVE: u16 = 1;
pub const RNG_REVERSE: u16 = 2;

/// Big-endian field reader over a chunk payload.
#[derive(Debug)]
struct ChunkReader<'a> {
    id: ChunkId,
    data: &'a [u8],
}

impl<'a> ChunkReader<'a> {
    #[inline]
    fn new(id: ChunkId, data: &'a [u8]) -> Self {
        Self { id, data }
    }

    #[inline]
    fn read<const N: usize>(&mut self) -> Result<[u8; N]> {
        let Some((bytes, rest)) = self.data.split_first_chunk::<N>() else {
            return Err(Error::malformed_chunk(format!("truncated {} chunk", self.id)));
        };
        self.data = rest;
        Ok(*bytes)
    }

    #[inline]
    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read::<1>()?[0])
    }

    #[inline]
    fn read_u16be(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.read()?))
    }

    #[inline]
    fn read_i16be(&mut self) -> Result<i16> {
        Ok(i16::from_be_bytes(self.read()?))
    }
}

/// How a mask relates to the bit-planes. Only [`Masking::HasMask`]
/// changes how pixel data is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Masking {
    None,
    HasMask,
    HasTransparentColor,
    Lasso,
    Other(u8),
}

impl From<u8> for Masking {
    #[inline]
    fn from(value: u8) -> Self {
        match value {
            0 => Masking::None,
            1 => Masking::HasMask,
            2 => Masking::HasTransparentColor,
            3 => Masking::Lasso,
            _ => Masking::Other(value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Compression {
    None,
    ByteRun1,
}

impl TryFrom<u8> for Compression {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Compression::None),
            1 => Ok(Compression::ByteRun1),
            _ => Err(Error::unsupported(format!("unknown compression type {value}"))),
        }
    }
}

/// Contents of the `BMHD` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BitmapHeader {
    width: u16,
    height: u16,
    x_origin: i16,
    y_origin: i16,
    num_planes: u8,
    masking: Masking,
    compression: Compression,
    trans_color: u16,
    x_aspect: u8,
    y_aspect: u8,
    page_width: u16,
    page_height: u16,
}

impl BitmapHeader {
    pub const SIZE: usize = 20;

    #[inline]
    pub fn width(&self) -> u16 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u16 {
        self.height
    }

    #[inline]
    pub fn x_origin(&self) -> i16 {
        self.x_origin
    }

    #[inline]
    pub fn y_origin(&self) -> i16 {
        self.y_origin
    }

    #[inline]
    pub fn num_planes(&self) -> u8 {
        self.num_planes
    }

    #[inline]
    pub fn masking(&self) -> Masking {
        self.masking
    }

    #[inline]
    pub fn compression(&self) -> Compression {
        self.compression
    }

    #[inline]
    pub fn trans_color(&self) -> u16 {
        self.trans_color
    }

    #[inline]
    pub fn x_aspect(&self) -> u8 {
        self.x_aspect
    }

    #[inline]
    pub fn y_aspect(&self) -> u8 {
        self.y_aspect
    }

    #[inline]
    pub fn page_width(&self) -> u16 {
        self.page_width
    }

    #[inline]
    pub fn page_height(&self) -> u16 {
        self.page_height
    }

    #[inline]
    pub fn has_mask(&self) -> bool {
        self.masking == Masking::HasMask
    }

    /// Plane rows are padded to whole 16 bit words.
    #[inline]
    pub fn bytes_per_row(&self) -> usize {
        (self.width as usize).div_ceil(16) * 2
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() != Self::SIZE {
            return Err(Error::malformed_chunk(format!(
                "invalid BMHD size: {} bytes, expected {}", data.len(), Self::SIZE)));
        }

        let mut reader = ChunkReader::new(ChunkId::BMHD, data);
        let width = reader.read_u16be()?;
        let height = reader.read_u16be()?;
        let x_origin = reader.read_i16be()?;
        let y_origin = reader.read_i16be()?;
        let num_planes = reader.read_u8()?;
        let masking = reader.read_u8()?.into();
        let compression = reader.read_u8()?.try_into()?;
        let _pad1 = reader.read_u8()?;
        let trans_color = reader.read_u16be()?;
        let x_aspect = reader.read_u8()?;
        let y_aspect = reader.read_u8()?;
        let page_width = reader.read_u16be()?;
        let page_height = reader.read_u16be()?;

        if num_planes as usize > MAX_PLANES {
            return Err(Error::unsupported(format!(
                "parser does not support more than {MAX_PLANES} bits per pixel, got {num_planes}")));
        }

        if num_planes == 0 {
            return Err(Error::malformed_chunk("BMHD declares no bit-planes"));
        }

        Ok(Self {
            width,
            height,
            x_origin,
            y_origin,
            num_planes,
            masking,
            compression,
            trans_color,
            x_aspect,
            y_aspect,
            page_width,
            page_height,
        })
    }
}

/// Contents of a `CRNG` chunk, before the inactive ones are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorRangeChunk {
    rate: u16,
    flags: u16,
    low: u8,
    high: u8,
}

impl ColorRangeChunk {
    pub const SIZE: usize = 8;

    #[inline]
    pub fn rate(&self) -> u16 {
        self.rate
    }

    #[inline]
    pub fn flags(&self) -> u16 {
        self.flags
    }

    #[inline]
    pub fn low(&self) -> u8 {
        self.low
    }

    #[inline]
    pub fn high(&self) -> u8 {
        self.high
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.flags & RNG_ACTIVE != 0
    }

    #[inline]
    pub fn to_color_range(&self) -> ColorRange {
        ColorRange::new(self.low, self.high, self.rate, self.flags & RNG_REVERSE != 0)
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() != Self::SIZE {
            return Err(Error::malformed_chunk(format!(
                "CRNG chunk must be {} bytes, got {}", Self::SIZE, data.len())));
        }

        let mut reader = ChunkReader::new(ChunkId::CRNG, data);
        let _padding = reader.read_u16be()?;
        let rate = reader.read_u16be()?;
        let flags = reader.read_u16be()?;
        let low = reader.read_u8()?;
        let high = reader.read_u8()?;

        Ok(Self {
            rate,
            flags,
            low,
            high,
        })
    }
}

/// Everything one decode call has built so far.
///
/// Dropped as a whole when a handler fails, so no half decoded image is
/// ever handed out.
#[derive(Debug, Default)]
pub struct DecodeContext {
    pixel_format: Option<PixelFormat>,
    header: Option<BitmapHeader>,
    palette: Palette,
    color_ranges: Vec<ColorRange>,
    planes: Option<Planes>,
    row_buffer: Vec<u8>,
}

impl DecodeContext {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn pixel_format(&self) -> Option<PixelFormat> {
        self.pixel_format
    }

    #[inline]
    pub fn header(&self) -> Option<&BitmapHeader> {
        self.header.as_ref()
    }

    /// Turn the collected chunks into an image.
    pub fn finish(self) -> Result<Image> {
        let Some(header) = self.header else {
            return Err(Error::malformed_container("BMHD chunk missing"));
        };

        let Some(pixel_format) = self.pixel_format else {
            return Err(Error::unsupported("unknown pixel format"));
        };

        Ok(Image::new(header, pixel_format, self.planes, self.palette, self.color_ranges))
    }

    /// Chunk handlers for ILBM and PBM forms.
    pub fn rules() -> ParseRules<Self> {
        ParseRules::new()
            .accept(ChunkId::ILBM)
            .accept(ChunkId::PBM)
            .handler(ChunkId::ILBM, handle_ilbm)
            .handler(ChunkId::PBM, handle_pbm)
            .handler(ChunkId::BMHD, handle_bmhd)
            .handler(ChunkId::CMAP, handle_cmap)
            .handler(ChunkId::CRNG, handle_crng)
            .handler(ChunkId::BODY, handle_body)
    }
}

fn handle_ilbm(context: &mut DecodeContext, _data: &[u8]) -> Result<()> {
    context.pixel_format = Some(PixelFormat::Ilbm);
    Ok(())
}

fn handle_pbm(context: &mut DecodeContext, _data: &[u8]) -> Result<()> {
    context.pixel_format = Some(PixelFormat::Pbm);
    Ok(())
}

fn handle_bmhd(context: &mut DecodeContext, data: &[u8]) -> Result<()> {
    if context.header.is_some() {
        return Err(Error::malformed_chunk("multiple BMHD chunks"));
    }

    let header = BitmapHeader::parse(data)?;

    debug!("image dimensions: {}x{} pixels, {} bits per pixel{}",
        header.width(), header.height(), header.num_planes(),
        if header.has_mask() { " (+ 1 mask bitplane)" } else { "" });
    debug!("image compression: {:?}", header.compression());

    context.header = Some(header);
    Ok(())
}

fn handle_cmap(context: &mut DecodeContext, data: &[u8]) -> Result<()> {
    if data.len() % 3 != 0 {
        return Err(Error::malformed_chunk(format!(
            "CMAP chunk size must be a multiple of 3 bytes, got {}", data.len())));
    }

    let num_colors = data.len() / 3;
    if num_colors > MAX_COLORS {
        return Err(Error::malformed_chunk(format!(
            "CMAP chunk holds {num_colors} colors, at most {MAX_COLORS} are supported")));
    }

    debug!("found {num_colors} palette entries");

    context.palette = data.chunks_exact(3)
        .map(|rgb| Rgb::new(rgb[0], rgb[1], rgb[2]))
        .collect();

    Ok(())
}

fn handle_crng(context: &mut DecodeContext, data: &[u8]) -> Result<()> {
    let chunk = ColorRangeChunk::parse(data)?;

    if !chunk.is_active() {
        debug!("ignoring inactive color range");
        return Ok(());
    }

    if context.color_ranges.len() == MAX_COLOR_RANGES {
        return Err(Error::unsupported(format!(
            "parser supports at most {MAX_COLOR_RANGES} active color ranges in a file")));
    }

    let range = chunk.to_color_range();
    debug!("color range from {} to {}, rate {}{}",
        range.low(), range.high(), range.rate(),
        if range.reverse() { ", reverse" } else { "" });

    context.color_ranges.push(range);
    Ok(())
}

/// Copy or decompress one row of `dest.len()` bytes.
#[inline]
fn read_row(compression: Compression, dest: &mut [u8], src: &[u8]) -> Result<usize> {
    match compression {
        Compression::None => {
            let Some(row) = src.get(..dest.len()) else {
                return Err(Error::codec("error during BODY decoding (source buffer overrun)"));
            };
            dest.copy_from_slice(row);
            Ok(dest.len())
        }
        Compression::ByteRun1 => byterun::decode(dest, src),
    }
}

/// Step over one row of `row_bytes` bytes without storing it.
#[inline]
fn skip_row(compression: Compression, src: &[u8], row_bytes: usize) -> Result<usize> {
    match compression {
        Compression::None => {
            if src.len() < row_bytes {
                return Err(Error::codec("error during BODY decoding (source buffer overrun)"));
            }
            Ok(row_bytes)
        }
        Compression::ByteRun1 => byterun::skip(src, row_bytes),
    }
}

#[inline]
fn rest(data: &[u8], pos: usize) -> &[u8] {
    data.get(pos..).unwrap_or_default()
}

fn handle_body(context: &mut DecodeContext, data: &[u8]) -> Result<()> {
    let Some(header) = context.header else {
        return Err(Error::malformed_chunk("unable to decode BODY before BMHD has been handled"));
    };

    if context.planes.is_some() {
        debug!("ignoring multiple BODYs");
        return Ok(());
    }

    let Some(pixel_format) = context.pixel_format else {
        return Err(Error::unsupported("unsupported pixel format: unknown"));
    };

    if pixel_format == PixelFormat::Pbm && header.has_mask() {
        return Err(Error::unsupported("PBM format parser doesn't support mask plane"));
    }

    let width = header.width() as usize;
    let height = header.height() as usize;
    let depth = header.num_planes() as usize;
    let bytes_per_row = header.bytes_per_row();
    let compression = header.compression();

    debug!("allocating memory for {width}x{height}x{depth} planes");
    let mut planes = Planes::new(bytes_per_row, height, depth)?;

    if pixel_format == PixelFormat::Pbm {
        let row_buffer_bytes = (width + 31) & !31;
        context.row_buffer.clear();
        if context.row_buffer.try_reserve_exact(row_buffer_bytes).is_err() {
            return Err(Error::allocation(row_buffer_bytes));
        }
        context.row_buffer.resize(row_buffer_bytes, 0);
    }

    debug!("decoding bitmap data");

    let mut pos = 0;
    for y in 0..height {
        trace!("decoding row {y}");

        match pixel_format {
            PixelFormat::Ilbm => {
                for dest in planes.rows_mut(y) {
                    pos += read_row(compression, dest, rest(data, pos))?;
                }

                if header.has_mask() {
                    trace!("skipping over mask plane");
                    pos += skip_row(compression, rest(data, pos), bytes_per_row)?;
                }
            }
            PixelFormat::Pbm => {
                // bytes past `width` stay zero for the whole body
                pos += read_row(compression, &mut context.row_buffer[..width], rest(data, pos))?;
                planar::transpose_row(&context.row_buffer, &mut planes.rows_mut(y));
            }
        }

        if pos > data.len() {
            return Err(Error::codec("error during BODY decoding (source buffer overrun)"));
        }
    }

    if pos != data.len() {
        return Err(Error::codec(format!(
            "error during BODY decoding (source buffer underrun/overrun): used {pos} of {} bytes",
            data.len())));
    }

    debug!("finished decoding bitmap data");

    context.planes = Some(planes);
    context.row_buffer = Vec::new();
    Ok(())
}

/// Decode an ILBM or PBM image from `reader`.
pub fn decode_reader<R>(reader: &mut R) -> Result<Image>
where R: Read {
    let mut context = DecodeContext::new();
    parse_iff(reader, &DecodeContext::rules(), &mut context)?;
    context.finish()
}

/// Decode the ILBM or PBM image stored at `path`.
pub fn decode<P>(path: P) -> Result<Image>
where P: AsRef<Path> {
    let path = path.as_ref();
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) => {
            return Err(Error::with_cause(
                ErrorKind::Io,
                format!("unable to open file {path:?}"),
                Box::new(err)));
        }
    };

    decode_reader(&mut BufReader::new(file))
}

/// [`decode`], handing the message of a failure to `error_sink` first.
pub fn decode_with_sink<P, F>(path: P, mut error_sink: F) -> Result<Image>
where P: AsRef<Path>, F: FnMut(&str) {
    decode(path).inspect_err(|err| error_sink(&err.to_string()))
}
