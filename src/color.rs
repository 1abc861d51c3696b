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

use std::fmt::Display;

use serde::{de::{Error, Visitor}, Deserialize, Deserializer, Serialize, Serializer};

/// A color register value packed as `0x00RRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[repr(transparent)]
pub struct Rgb(pub u32);

impl Rgb {
    pub const RB_MASK: u32 = 0x00FF00FF;
    pub const G_MASK: u32 = 0x0000FF00;

    #[inline]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self(((r as u32) << 16) | ((g as u32) << 8) | b as u32)
    }

    #[inline]
    pub fn r(self) -> u8 {
        (self.0 >> 16) as u8
    }

    #[inline]
    pub fn g(self) -> u8 {
        (self.0 >> 8) as u8
    }

    #[inline]
    pub fn b(self) -> u8 {
        self.0 as u8
    }

    #[inline]
    pub fn packed(self) -> u32 {
        self.0
    }
}

impl From<[u8; 3]> for Rgb {
    #[inline]
    fn from([r, g, b]: [u8; 3]) -> Self {
        Self::new(r, g, b)
    }
}

impl From<Rgb> for [u8; 3] {
    #[inline]
    fn from(value: Rgb) -> Self {
        [value.r(), value.g(), value.b()]
    }
}

impl Display for Rgb {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r(), self.g(), self.b())
    }
}

/// Weighted average of two colors, `w0 + w1` must be `0x100`.
///
/// Red and blue are computed together in one word, green on its own. With
/// weights summing to `0x100` no channel can carry into its neighbour.
#[inline]
pub fn blend(c0: Rgb, c1: Rgb, w0: u32, w1: u32) -> Rgb {
    let rb = (((c0.0 & Rgb::RB_MASK) * w0 + (c1.0 & Rgb::RB_MASK) * w1) >> 8) & Rgb::RB_MASK;
    let g = (((c0.0 & Rgb::G_MASK) * w0 + (c1.0 & Rgb::G_MASK) * w1) >> 8) & Rgb::G_MASK;
    Rgb(rb | g)
}

impl Serialize for Rgb {
    #[inline]
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where S: Serializer {
        serializer.collect_str(self)
    }
}

struct RgbVisitor;

impl<'de> Visitor<'de> for RgbVisitor {
    type Value = Rgb;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("a color as \"#RRGGBB\" or a list of 3 numbers, each in the range of 0 to 255")
    }

    fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
    where E: Error {
        let Some(hex) = value.strip_prefix('#') else {
            return Err(E::custom(format_args!("color must start with '#': {value:?}")));
        };

        if hex.len() != 6 {
            return Err(E::custom(format_args!("color must have 6 hex digits: {value:?}")));
        }

        match u32::from_str_radix(hex, 16) {
            Ok(packed) => Ok(Rgb(packed)),
            Err(err) => Err(E::custom(format_args!("illegal color {value:?}: {err}"))),
        }
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where A: serde::de::SeqAccess<'de> {
        let Some(r) = seq.next_element()? else {
            return Err(Error::missing_field("r"));
        };

        let Some(g) = seq.next_element()? else {
            return Err(Error::missing_field("g"));
        };

        let Some(b) = seq.next_element()? else {
            return Err(Error::missing_field("b"));
        };

        if seq.next_element::<serde::de::IgnoredAny>()?.is_some() {
            return Err(Error::custom("superfluous elements in RGB value"));
        };

        Ok(Rgb::new(r, g, b))
    }
}

impl<'de> Deserialize<'de> for Rgb {
    #[inline]
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where D: Deserializer<'de> {
        deserializer.deserialize_any(RgbVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels() {
        let color = Rgb::new(0x12, 0x34, 0x56);
        assert_eq!(color.packed(), 0x123456);
        assert_eq!((color.r(), color.g(), color.b()), (0x12, 0x34, 0x56));
        assert_eq!(color.to_string(), "#123456");
    }

    #[test]
    fn blend_extremes() {
        let black = Rgb(0x000000);
        let white = Rgb(0xFFFFFF);
        assert_eq!(blend(black, white, 0x100, 0), black);
        assert_eq!(blend(black, white, 0, 0x100), white);
        assert_eq!(blend(white, white, 0x80, 0x80), white);
        assert_eq!(blend(black, white, 0x80, 0x80), Rgb(0x7F7F7F));
    }

    #[test]
    fn blend_keeps_channels_apart() {
        let red = Rgb(0xFF0000);
        let blue = Rgb(0x0000FF);
        assert_eq!(blend(red, blue, 0x80, 0x80), Rgb(0x7F007F));
    }

    #[test]
    fn json() {
        let color: Rgb = serde_json::from_str("\"#00FF80\"").unwrap();
        assert_eq!(color, Rgb(0x00FF80));
        let color: Rgb = serde_json::from_str("[1, 2, 3]").unwrap();
        assert_eq!(color, Rgb(0x010203));
        assert_eq!(serde_json::to_string(&Rgb(0xABCDEF)).unwrap(), "\"#ABCDEF\"");
        assert!(serde_json::from_str::<Rgb>("\"00FF80\"").is_err());
    }
}
