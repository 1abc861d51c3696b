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

//! Conversion between chunky pixels (one byte each) and bit-planes.
//!
//! Bit-plane words are big-endian, the leftmost pixel of a group of 16 is
//! the most significant bit.

pub const PIXELS_PER_GROUP: usize = 16;
pub const MAX_PLANES: usize = 8;

/// Merge-exchange passes as `(shift, mask, word pairs)`.
const PASSES: [(u32, u16, [(usize, usize); 4]); 4] = [
    (8, 0x00FF, [(0, 4), (1, 5), (2, 6), (3, 7)]),
    (4, 0x0F0F, [(0, 2), (1, 3), (4, 6), (5, 7)]),
    (2, 0x3333, [(0, 1), (2, 3), (4, 5), (6, 7)]),
    (1, 0x5555, [(0, 4), (1, 5), (2, 6), (3, 7)]),
];

/// Plane `i` is transposed word `PLANE_ORDER[i]`.
pub const PLANE_ORDER: [usize; MAX_PLANES] = [7, 3, 6, 2, 5, 1, 4, 0];

/// Swap the bits of `words[a]` selected by `mask` with the bits of
/// `words[b]` that sit `shift` positions higher.
#[inline]
fn merge_exchange(words: &mut [u16; MAX_PLANES], a: usize, b: usize, shift: u32, mask: u16) {
    let temp = ((words[b] >> shift) ^ words[a]) & mask;
    words[a] ^= temp;
    words[b] ^= temp << shift;
}

/// Transpose 16 chunky pixels into 8 plane words, plane 0 first.
pub fn chunky_to_planar(pixels: &[u8; PIXELS_PER_GROUP]) -> [u16; MAX_PLANES] {
    let mut words = [0u16; MAX_PLANES];
    for (word, pair) in words.iter_mut().zip(pixels.chunks_exact(2)) {
        *word = u16::from_be_bytes([pair[0], pair[1]]);
    }

    for (shift, mask, pairs) in PASSES {
        for (a, b) in pairs {
            merge_exchange(&mut words, a, b, shift, mask);
        }
    }

    PLANE_ORDER.map(|index| words[index])
}

/// Gather 16 chunky pixels from up to 8 plane words.
pub fn planar_to_chunky(words: &[u16]) -> [u8; PIXELS_PER_GROUP] {
    let mut pixels = [0u8; PIXELS_PER_GROUP];
    for (x, pixel) in pixels.iter_mut().enumerate() {
        let bit = 15 - x;
        for (plane, word) in words.iter().take(MAX_PLANES).enumerate() {
            *pixel |= (((word >> bit) & 1) as u8) << plane;
        }
    }
    pixels
}

/// Transpose a chunky row into plane rows.
///
/// `chunky` has to hold at least 16 pixels for every 2 bytes of a plane
/// row. Bits of planes beyond `plane_rows.len()` are dropped.
pub fn transpose_row(chunky: &[u8], plane_rows: &mut [&mut [u8]]) {
    for (group, pixels) in chunky.chunks_exact(PIXELS_PER_GROUP).enumerate() {
        let offset = group * 2;
        let Some(pixels) = pixels.first_chunk::<PIXELS_PER_GROUP>() else {
            break;
        };

        let words = chunky_to_planar(pixels);
        for (row, word) in plane_rows.iter_mut().zip(words) {
            if let Some(dest) = row.get_mut(offset..offset + 2) {
                dest.copy_from_slice(&word.to_be_bytes());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(pixels: &[u8; 16]) -> [u16; 8] {
        let mut words = [0u16; 8];
        for (plane, word) in words.iter_mut().enumerate() {
            for (x, pixel) in pixels.iter().enumerate() {
                *word |= (((pixel >> plane) & 1) as u16) << (15 - x);
            }
        }
        words
    }

    fn pseudo_random(seed: &mut u32) -> u8 {
        *seed = seed.wrapping_mul(1103515245).wrapping_add(12345);
        (*seed >> 16) as u8
    }

    #[test]
    fn single_pixel() {
        let mut pixels = [0u8; 16];
        pixels[0] = 0xFF;
        assert_eq!(chunky_to_planar(&pixels), [0x8000; 8]);

        let mut pixels = [0u8; 16];
        pixels[15] = 0b0000_0101;
        assert_eq!(chunky_to_planar(&pixels), [1, 0, 1, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn ascending_indices() {
        let pixels: [u8; 16] = std::array::from_fn(|index| index as u8);
        let words = chunky_to_planar(&pixels);
        assert_eq!(&words[..4], &[0x5555, 0x3333, 0x0F0F, 0x00FF]);
        assert_eq!(&words[4..], &[0, 0, 0, 0]);
    }

    #[test]
    fn matches_bitwise_reference() {
        let mut seed = 42;
        for _ in 0..500 {
            let pixels: [u8; 16] = std::array::from_fn(|_| pseudo_random(&mut seed));
            let words = chunky_to_planar(&pixels);
            assert_eq!(words, reference(&pixels));
            assert_eq!(planar_to_chunky(&words), pixels);
        }
    }

    #[test]
    fn shallow_planes_drop_high_bits() {
        let pixels = [0xFFu8; 16];
        let words = chunky_to_planar(&pixels);
        assert_eq!(planar_to_chunky(&words[..3]), [0x07; 16]);
    }

    #[test]
    fn row_of_two_groups() {
        let mut chunky = [0u8; 32];
        chunky[0] = 1;
        chunky[17] = 2;
        let mut plane0 = [0u8; 4];
        let mut plane1 = [0u8; 4];
        transpose_row(&chunky, &mut [&mut plane0[..], &mut plane1[..]]);
        assert_eq!(plane0, [0x80, 0x00, 0x00, 0x00]);
        assert_eq!(plane1, [0x00, 0x00, 0x40, 0x00]);
    }

    #[test]
    fn row_longer_than_planes() {
        // the scratch row is padded to 32 pixels, the plane row may hold 16
        let chunky = [1u8; 32];
        let mut plane0 = [0u8; 2];
        transpose_row(&chunky, &mut [&mut plane0[..]]);
        assert_eq!(plane0, [0xFF, 0xFF]);
    }
}
