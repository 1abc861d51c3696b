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

//! ByteRun1, the PackBits style row compression of ILBM and PBM bodies.
//!
//! Every run starts with a control byte `n` read as `i8`:
//!
//! * `0..=127`: the next `n + 1` bytes are copied literally
//! * `-127..=-1`: the next byte is repeated `1 - n` times
//! * `-128`: no operation
//!
//! Rows are compressed separately, so a decoder always knows exactly how
//! many bytes it has to produce.

use log::trace;

use crate::error::{Error, Result};

pub const MAX_RUN: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Run<'a> {
    Literal(&'a [u8]),
    Repeat(u8, usize),
    Nop,
}

impl Run<'_> {
    #[inline]
    fn output_len(&self) -> usize {
        match self {
            Run::Literal(bytes) => bytes.len(),
            Run::Repeat(_, count) => *count,
            Run::Nop => 0,
        }
    }
}

#[inline]
fn source_overrun() -> Error {
    Error::codec("byte-run data ends in the middle of a row")
}

fn read_run<'a>(src: &'a [u8], pos: &mut usize) -> Result<Run<'a>> {
    let Some(&control) = src.get(*pos) else {
        return Err(source_overrun());
    };
    *pos += 1;

    let count = control as i8;
    if count >= 0 {
        let len = count as usize + 1;
        let Some(literal) = src.get(*pos..*pos + len) else {
            return Err(source_overrun());
        };
        *pos += len;
        Ok(Run::Literal(literal))
    } else if count != -128 {
        let Some(&value) = src.get(*pos) else {
            return Err(source_overrun());
        };
        *pos += 1;
        Ok(Run::Repeat(value, (1 - count as isize) as usize))
    } else {
        Ok(Run::Nop)
    }
}

#[inline]
fn overshoot(produced: usize, run: usize, dest_bytes: usize) -> Error {
    Error::codec(format!(
        "byte-run of {run} bytes at offset {produced} overshoots the row of {dest_bytes} bytes"))
}

/// Decode runs from `src` until `dest` is completely filled.
///
/// Returns the number of source bytes consumed. Stops right after the run
/// that fills `dest`, so trailing runs are left for the next row.
pub fn decode(dest: &mut [u8], src: &[u8]) -> Result<usize> {
    trace!("decoding byte-run data into {} bytes", dest.len());

    let mut src_pos = 0;
    let mut dest_pos = 0;
    while dest_pos < dest.len() {
        let run = read_run(src, &mut src_pos)?;
        let end = dest_pos + run.output_len();
        if end > dest.len() {
            return Err(overshoot(dest_pos, run.output_len(), dest.len()));
        }

        match run {
            Run::Literal(bytes) => dest[dest_pos..end].copy_from_slice(bytes),
            Run::Repeat(value, _) => dest[dest_pos..end].fill(value),
            Run::Nop => {}
        }
        dest_pos = end;
    }

    Ok(src_pos)
}

/// Walk runs worth `dest_bytes` of output without storing anything.
///
/// Consumes exactly the source bytes [`decode`] would for the same input.
pub fn skip(src: &[u8], dest_bytes: usize) -> Result<usize> {
    trace!("skipping byte-run data worth {dest_bytes} bytes");

    let mut src_pos = 0;
    let mut remaining = dest_bytes;
    while remaining > 0 {
        let run = read_run(src, &mut src_pos)?;
        let len = run.output_len();
        if len > remaining {
            return Err(overshoot(dest_bytes - remaining, len, dest_bytes));
        }
        remaining -= len;
    }

    Ok(src_pos)
}

/// Append the byte-run encoding of `src` to `out`.
///
/// Repeats of two or more bytes become repeat runs, everything else is
/// gathered into literal runs that end where a repeat of three starts.
pub fn encode(src: &[u8], out: &mut Vec<u8>) {
    let mut pos = 0;
    while pos < src.len() {
        let value = src[pos];
        let repeat = src[pos..].iter().take(MAX_RUN).take_while(|&&byte| byte == value).count();

        if repeat >= 2 {
            out.push((1 - repeat as isize) as i8 as u8);
            out.push(value);
            pos += repeat;
        } else {
            let start = pos;
            while pos < src.len() && pos - start < MAX_RUN {
                if pos + 2 < src.len() && src[pos] == src[pos + 1] && src[pos] == src[pos + 2] {
                    break;
                }
                pos += 1;
            }
            out.push((pos - start - 1) as u8);
            out.extend_from_slice(&src[start..pos]);
        }
    }
}
