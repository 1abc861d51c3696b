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

#![allow(dead_code)]

use ilbm_cycle::byterun;

pub const NONE: u8 = 0;
pub const BYTE_RUN: u8 = 1;

pub const MASK_NONE: u8 = 0;
pub const MASK_PLANE: u8 = 1;

pub fn chunk(id: &[u8; 4], data: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(data.len() + 9);
    bytes.extend_from_slice(id);
    bytes.extend_from_slice(&(data.len() as u32).to_be_bytes());
    bytes.extend_from_slice(data);
    if data.len() % 2 == 1 {
        bytes.push(0);
    }
    bytes
}

pub fn form(form_type: &[u8; 4], chunks: &[Vec<u8>]) -> Vec<u8> {
    let body = chunks.concat();
    let mut bytes = Vec::with_capacity(body.len() + 12);
    bytes.extend_from_slice(b"FORM");
    bytes.extend_from_slice(&(body.len() as u32 + 4).to_be_bytes());
    bytes.extend_from_slice(form_type);
    bytes.extend_from_slice(&body);
    bytes
}

pub fn bmhd(width: u16, height: u16, planes: u8, masking: u8, compression: u8) -> Vec<u8> {
    let mut data = Vec::with_capacity(20);
    data.extend_from_slice(&width.to_be_bytes());
    data.extend_from_slice(&height.to_be_bytes());
    data.extend_from_slice(&[0, 0, 0, 0]);
    data.extend_from_slice(&[planes, masking, compression, 0]);
    data.extend_from_slice(&[0, 0]);
    data.extend_from_slice(&[1, 1]);
    data.extend_from_slice(&width.to_be_bytes());
    data.extend_from_slice(&height.to_be_bytes());
    chunk(b"BMHD", &data)
}

pub fn cmap(colors: &[u32]) -> Vec<u8> {
    let data: Vec<u8> = colors.iter()
        .flat_map(|color| [(color >> 16) as u8, (color >> 8) as u8, *color as u8])
        .collect();
    chunk(b"CMAP", &data)
}

pub fn crng(rate: u16, flags: u16, low: u8, high: u8) -> Vec<u8> {
    let mut data = vec![0, 0];
    data.extend_from_slice(&rate.to_be_bytes());
    data.extend_from_slice(&flags.to_be_bytes());
    data.extend_from_slice(&[low, high]);
    chunk(b"CRNG", &data)
}

pub fn bytes_per_row(width: usize) -> usize {
    width.div_ceil(16) * 2
}

/// Bit-plane data of `pixels`, one buffer per plane, computed bit by bit.
pub fn planarize(pixels: &[u8], width: usize, height: usize, depth: usize) -> Vec<Vec<u8>> {
    let bpr = bytes_per_row(width);
    let mut planes = vec![vec![0u8; bpr * height]; depth];
    for y in 0..height {
        for x in 0..width {
            let pixel = pixels[y * width + x];
            for (plane, data) in planes.iter_mut().enumerate() {
                if (pixel >> plane) & 1 != 0 {
                    data[y * bpr + x / 8] |= 0x80 >> (x % 8);
                }
            }
        }
    }
    planes
}

fn push_row(body: &mut Vec<u8>, row: &[u8], compression: u8) {
    if compression == BYTE_RUN {
        byterun::encode(row, body);
    } else {
        body.extend_from_slice(row);
    }
}

/// Interleaved ILBM body, with an extra mask row after every row if
/// `mask` is set.
pub fn ilbm_body(planes: &[Vec<u8>], width: usize, height: usize, compression: u8, mask: bool) -> Vec<u8> {
    let bpr = bytes_per_row(width);
    let mask_row = vec![0xFFu8; bpr];
    let mut body = Vec::new();
    for y in 0..height {
        for plane in planes {
            push_row(&mut body, &plane[y * bpr..(y + 1) * bpr], compression);
        }
        if mask {
            push_row(&mut body, &mask_row, compression);
        }
    }
    body
}

/// Chunky PBM body.
pub fn pbm_body(pixels: &[u8], width: usize, height: usize, compression: u8) -> Vec<u8> {
    let mut body = Vec::new();
    for y in 0..height {
        push_row(&mut body, &pixels[y * width..(y + 1) * width], compression);
    }
    body
}

pub fn pseudo_random_pixels(count: usize, depth: usize, seed: u32) -> Vec<u8> {
    let mut state = seed;
    let mask = ((1u16 << depth) - 1) as u8;
    (0..count)
        .map(|index| {
            state = state.wrapping_mul(1103515245).wrapping_add(12345);
            // runs of equal pixels give the encoder something to do
            if index % 7 < 3 {
                (index as u8 / 7) & mask
            } else {
                ((state >> 16) as u8) & mask
            }
        })
        .collect()
}
