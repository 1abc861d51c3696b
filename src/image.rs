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

use serde::Serialize;

use crate::{
    error::{Error, Result},
    ilbm::BitmapHeader,
    palette::{animate, ColorRange, Palette},
    planar::{self, PIXELS_PER_GROUP},
};

/// How the `BODY` of a file stores its pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PixelFormat {
    /// Interleaved bit-planes, one row of every plane after the other.
    Ilbm,
    /// Chunky pixels, one byte each.
    Pbm,
}

/// All bit-planes of an image in one allocation.
///
/// Plane `i` occupies `i * plane_size()..(i + 1) * plane_size()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Planes {
    data: Box<[u8]>,
    bytes_per_row: usize,
    height: usize,
    depth: usize,
}

impl Planes {
    pub fn new(bytes_per_row: usize, height: usize, depth: usize) -> Result<Self> {
        let size = bytes_per_row
            .checked_mul(height)
            .and_then(|size| size.checked_mul(depth))
            .ok_or_else(|| Error::allocation(usize::MAX))?;

        let mut data = Vec::new();
        if data.try_reserve_exact(size).is_err() {
            return Err(Error::allocation(size));
        }
        data.resize(size, 0);

        Ok(Self {
            data: data.into_boxed_slice(),
            bytes_per_row,
            height,
            depth,
        })
    }

    #[inline]
    pub fn bytes_per_row(&self) -> usize {
        self.bytes_per_row
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    #[inline]
    pub fn plane_size(&self) -> usize {
        self.bytes_per_row * self.height
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    fn row_range(&self, plane: usize, y: usize) -> Option<std::ops::Range<usize>> {
        if plane >= self.depth || y >= self.height {
            return None;
        }
        let start = plane * self.plane_size() + y * self.bytes_per_row;
        Some(start..start + self.bytes_per_row)
    }

    #[inline]
    pub fn plane(&self, plane: usize) -> Option<&[u8]> {
        if plane >= self.depth {
            return None;
        }
        let size = self.plane_size();
        self.data.get(plane * size..(plane + 1) * size)
    }

    #[inline]
    pub fn row(&self, plane: usize, y: usize) -> Option<&[u8]> {
        let range = self.row_range(plane, y)?;
        self.data.get(range)
    }

    #[inline]
    pub fn row_mut(&mut self, plane: usize, y: usize) -> Option<&mut [u8]> {
        let range = self.row_range(plane, y)?;
        self.data.get_mut(range)
    }

    /// Row `y` of every plane, plane 0 first.
    pub fn rows_mut(&mut self, y: usize) -> Vec<&mut [u8]> {
        let plane_size = self.plane_size();
        if plane_size == 0 || y >= self.height {
            return Vec::new();
        }

        let bytes_per_row = self.bytes_per_row;
        self.data
            .chunks_exact_mut(plane_size)
            .map(|plane| &mut plane[y * bytes_per_row..(y + 1) * bytes_per_row])
            .collect()
    }
}

/// A decoded ILBM or PBM image: bit-planes plus its cycling palette.
///
/// Dropping the image releases all of its memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    header: BitmapHeader,
    pixel_format: PixelFormat,
    planes: Option<Planes>,
    palette: Palette,
    color_ranges: Vec<ColorRange>,
}

impl Image {
    #[inline]
    pub fn new(header: BitmapHeader, pixel_format: PixelFormat, planes: Option<Planes>, palette: Palette, color_ranges: Vec<ColorRange>) -> Self {
        Self {
            header,
            pixel_format,
            planes,
            palette,
            color_ranges,
        }
    }

    /// Explicit spelling of `drop(image)`.
    #[inline]
    pub fn release(self) {}

    #[inline]
    pub fn header(&self) -> &BitmapHeader {
        &self.header
    }

    #[inline]
    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.header.width() as u32
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.header.height() as u32
    }

    #[inline]
    pub fn size(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    #[inline]
    pub fn depth(&self) -> u8 {
        self.header.num_planes()
    }

    #[inline]
    pub fn bytes_per_row(&self) -> usize {
        self.header.bytes_per_row()
    }

    #[inline]
    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    #[inline]
    pub fn color_ranges(&self) -> &[ColorRange] {
        &self.color_ranges
    }

    /// Whether the file had a `BODY` chunk.
    #[inline]
    pub fn has_pixels(&self) -> bool {
        self.planes.is_some()
    }

    #[inline]
    pub fn planes(&self) -> Option<&Planes> {
        self.planes.as_ref()
    }

    #[inline]
    pub fn plane(&self, plane: usize) -> Option<&[u8]> {
        self.planes.as_ref()?.plane(plane)
    }

    #[inline]
    pub fn plane_row(&self, plane: usize, y: u32) -> Option<&[u8]> {
        self.planes.as_ref()?.row(plane, y as usize)
    }

    /// Palette index of the pixel at `x`, `y`, combined from all planes.
    pub fn color_index(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width() || y >= self.height() {
            return None;
        }

        let planes = self.planes.as_ref()?;
        let byte = x as usize / 8;
        let bit = 7 - (x % 8);
        let mut index = 0u8;
        for plane in 0..planes.depth() {
            let byte = planes.row(plane, y as usize)?.get(byte)?;
            index |= ((byte >> bit) & 1) << plane;
        }
        Some(index)
    }

    /// One byte per pixel, row by row. Empty if there is no pixel data.
    pub fn to_chunky(&self) -> Vec<u8> {
        let Some(planes) = &self.planes else {
            return Vec::new();
        };

        let width = self.width() as usize;
        let mut chunky = Vec::with_capacity(width * planes.height());
        let mut words = Vec::with_capacity(planes.depth());

        for y in 0..planes.height() {
            for x in (0..width).step_by(PIXELS_PER_GROUP) {
                words.clear();
                for plane in 0..planes.depth() {
                    let word = planes.row(plane, y)
                        .and_then(|row| row.get(x / 8..x / 8 + 2))
                        .map_or(0, |bytes| u16::from_be_bytes([bytes[0], bytes[1]]));
                    words.push(word);
                }

                let pixels = planar::planar_to_chunky(&words);
                let count = (width - x).min(PIXELS_PER_GROUP);
                chunky.extend_from_slice(&pixels[..count]);
            }
        }

        chunky
    }

    /// Color table of this image `ticks` into the animation.
    #[inline]
    pub fn frame(&self, ticks: u32, blend: bool) -> Palette {
        animate(&self.palette, &self.color_ranges, ticks, blend)
    }

    #[inline]
    pub fn info(&self) -> ImageInfo<'_> {
        ImageInfo {
            width: self.width(),
            height: self.height(),
            depth: self.depth(),
            bytes_per_row: self.bytes_per_row(),
            pixel_format: self.pixel_format,
            has_pixels: self.has_pixels(),
            header: &self.header,
            palette: &self.palette,
            color_ranges: &self.color_ranges,
        }
    }
}

/// Serializable summary of an [`Image`] without its pixel data.
#[derive(Debug, Clone, Serialize)]
pub struct ImageInfo<'a> {
    pub width: u32,
    pub height: u32,
    pub depth: u8,
    pub bytes_per_row: usize,
    pub pixel_format: PixelFormat,
    pub has_pixels: bool,
    pub header: &'a BitmapHeader,
    pub palette: &'a Palette,
    pub color_ranges: &'a [ColorRange],
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn plane_slices() {
        let mut planes = Planes::new(2, 3, 2).unwrap();
        assert_eq!(planes.plane_size(), 6);
        assert_eq!(planes.data().len(), 12);

        planes.row_mut(1, 2).unwrap().copy_from_slice(&[0xAB, 0xCD]);
        {
            let mut rows = planes.rows_mut(0);
            assert_eq!(rows.len(), 2);
            rows[0].copy_from_slice(&[1, 2]);
        }

        assert_eq!(planes.plane(0), Some(&[1, 2, 0, 0, 0, 0][..]));
        assert_eq!(planes.plane(1), Some(&[0, 0, 0, 0, 0xAB, 0xCD][..]));
        assert_eq!(planes.row(1, 2), Some(&[0xAB, 0xCD][..]));
        assert_eq!(planes.row(2, 0), None);
        assert_eq!(planes.row(0, 3), None);
        assert_eq!(planes.plane(2), None);
    }

    #[test]
    fn empty_planes() {
        let mut planes = Planes::new(0, 0, 3).unwrap();
        assert!(planes.rows_mut(0).is_empty());
        assert_eq!(planes.plane(0), Some(&[][..]));
    }

    #[test]
    fn color_index_outside_planes() {
        let mut data = Vec::new();
        data.extend_from_slice(&320u16.to_be_bytes());
        data.extend_from_slice(&200u16.to_be_bytes());
        data.extend_from_slice(&[0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 1, 1]);
        data.extend_from_slice(&320u16.to_be_bytes());
        data.extend_from_slice(&200u16.to_be_bytes());
        let header = BitmapHeader::parse(&data).unwrap();

        let mut planes = Planes::new(2, 1, 1).unwrap();
        planes.rows_mut(0)[0].copy_from_slice(&[0x80, 0x01]);
        let image = Image::new(header, PixelFormat::Ilbm, Some(planes), Palette::new(), Vec::new());

        assert_eq!(image.color_index(0, 0), Some(1));
        assert_eq!(image.color_index(15, 0), Some(1));
        assert_eq!(image.color_index(100, 0), None);
        assert_eq!(image.color_index(0, 1), None);
    }

    #[test]
    fn oversized_planes() {
        let err = Planes::new(usize::MAX, 2, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Allocation);
    }
}
