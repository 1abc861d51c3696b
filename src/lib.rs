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

//! Decoder for IFF ILBM and PBM images and their color cycling palettes.
//!
//! ```no_run
//! let image = ilbm_cycle::decode("forest.lbm")?;
//! let frame = image.frame(3 << 16, true);
//! println!("{}x{}: {frame}", image.width(), image.height());
//! # Ok::<(), ilbm_cycle::Error>(())
//! ```

pub mod byterun;
pub mod color;
pub mod error;
pub mod iff;
pub mod ilbm;
pub mod image;
pub mod palette;
pub mod planar;

pub use color::Rgb;
pub use error::{Error, ErrorKind, Result};
pub use ilbm::{decode, decode_reader, decode_with_sink, BitmapHeader};
pub use image::{Image, PixelFormat};
pub use palette::{animate, ticks_per_frame, ColorRange, Palette};
