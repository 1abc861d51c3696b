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

use std::{fmt::Display, ops::{Index, IndexMut}};

use serde::{de::{Error, IgnoredAny, Visitor}, Deserialize, Deserializer, Serialize};

use crate::color::{self, Rgb};

/// Number of color registers addressable by 8 bit-planes.
pub const MAX_COLORS: usize = 256;

/// One full step of the elapsed-time counter: `1 << 16` ticks are one
/// integer tick, the low 16 bits are the fraction.
pub const TICK_ONE: u32 = 1 << 16;

/// Per-frame tick advance of a display loop running at `speed`, where
/// speed 1 advances one whole tick per frame and higher speeds slow the
/// animation down.
#[inline]
pub fn ticks_per_frame(speed: u32) -> u32 {
    TICK_ONE / speed.max(1)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Palette(Vec<Rgb>);

impl Display for Palette {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        "[".fmt(f)?;

        let mut iter = self.0.iter();
        if let Some(first) = iter.next() {
            write!(f, "{first}")?;
            for color in iter {
                write!(f, ", {color}")?;
            }
        }

        "]".fmt(f)
    }
}

impl Index<usize> for Palette {
    type Output = Rgb;

    #[inline]
    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl IndexMut<usize> for Palette {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut Rgb {
        &mut self.0[index]
    }
}

impl From<Vec<Rgb>> for Palette {
    #[inline]
    fn from(value: Vec<Rgb>) -> Self {
        Self(value)
    }
}

impl From<Palette> for Vec<Rgb> {
    #[inline]
    fn from(value: Palette) -> Self {
        value.0
    }
}

impl FromIterator<Rgb> for Palette {
    #[inline]
    fn from_iter<T: IntoIterator<Item = Rgb>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Palette {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn colors(&self) -> &[Rgb] {
        &self.0
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<Rgb> {
        self.0.get(index).copied()
    }

    /// Overwrite `self` with `base` and cycle every range into it.
    ///
    /// Reuses the allocation of `self`, so a render loop can keep one frame
    /// palette around and call this once per frame.
    pub fn apply_cycles_from(&mut self, base: &Palette, ranges: &[ColorRange], ticks: u32, blend: bool) {
        self.0.clone_from(&base.0);

        for range in ranges {
            self.apply_cycle_from(base, range, ticks, blend);
        }
    }

    fn apply_cycle_from(&mut self, base: &Palette, range: &ColorRange, ticks: u32, blend: bool) {
        let low = range.low() as usize;
        let high = range.high() as usize;
        if low > high || high >= base.len() {
            return;
        }

        let size = high - low + 1;
        let scaled = range.scaled_ticks(ticks);
        let offset = range.offset(scaled);

        let src = &base.0[low..=high];
        let dest = &mut self.0[low..=high];

        if blend {
            let w1 = (scaled >> 8) & 0xFF;
            let w0 = 0x100 - w1;
            for (index, color) in dest.iter_mut().enumerate() {
                let index0 = (index + offset) % size;
                let index1 = (index0 + size - 1) % size;
                *color = color::blend(src[index0], src[index1], w0, w1);
            }
        } else {
            for (index, color) in dest.iter_mut().enumerate() {
                *color = src[(index + offset) % size];
            }
        }
    }
}

/// Compute the color table for `ticks` elapsed time.
///
/// `ticks` is 16.16 fixed point. The result has the same length as
/// `base`; colors outside every range are copied unchanged. Ranges that do
/// not fit into `base` are ignored.
pub fn animate(base: &Palette, ranges: &[ColorRange], ticks: u32, blend: bool) -> Palette {
    let mut frame = Palette(Vec::with_capacity(base.len()));
    frame.apply_cycles_from(base, ranges, ticks, blend);
    frame
}

/// A `CRNG` color range: registers `low..=high` rotate at `rate`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct ColorRange {
    low: u8,
    high: u8,
    rate: u16,
    reverse: bool,
}

impl ColorRange {
    #[inline]
    pub fn new(low: u8, high: u8, rate: u16, reverse: bool) -> Self {
        Self {
            low,
            high,
            rate,
            reverse,
        }
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
    pub fn rate(&self) -> u16 {
        self.rate
    }

    #[inline]
    pub fn reverse(&self) -> bool {
        self.reverse
    }

    /// Number of registers in the range, 0 if `low > high`.
    #[inline]
    pub fn len(&self) -> usize {
        if self.low > self.high {
            0
        } else {
            (self.high - self.low) as usize + 1
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Scale 16.16 elapsed ticks by the raw rate.
    ///
    /// The integer part is multiplied by `rate << 2` and the fraction by
    /// `rate >> 14`, so one integer tick at rate `0x4000` is exactly one
    /// color step (`1 << 16` in the result). Wraps on 32 bit overflow.
    #[inline]
    pub fn scaled_ticks(&self, ticks: u32) -> u32 {
        let int_ticks = ticks >> 16;
        let frac_ticks = ticks & 0xFFFF;
        let rate = self.rate as u32;
        int_ticks.wrapping_mul(rate << 2).wrapping_add((frac_ticks * rate) >> 14)
    }

    /// Rotation of the range in registers for already scaled ticks.
    ///
    /// Without the reverse flag the rotation is inverted, so colors move
    /// towards higher registers.
    #[inline]
    pub fn offset(&self, scaled_ticks: u32) -> usize {
        let size = self.len();
        if size == 0 {
            return 0;
        }

        let offset = (scaled_ticks >> 16) as usize % size;
        if self.reverse {
            offset
        } else {
            (size - offset) % size
        }
    }
}

struct ColorRangeVisitor;

impl<'de> Visitor<'de> for ColorRangeVisitor {
    type Value = ColorRange;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("a color range definition")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where A: serde::de::MapAccess<'de>, {
        let mut reverse = false;
        let mut rate = 0;
        let mut low = None;
        let mut high = None;

        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "reverse" => {
                    let value: i32 = map.next_value()?;
                    if value == 0 {
                        reverse = false;
                    } else if value == 2 {
                        reverse = true;
                    } else {
                        return Err(Error::invalid_value(
                            serde::de::Unexpected::Signed(value as i64),
                            &"0 or 2"));
                    }
                }
                "rate" => {
                    rate = map.next_value()?;
                }
                "low" => {
                    low = Some(map.next_value()?);
                }
                "high" => {
                    high = Some(map.next_value()?);
                }
                _ => {
                    let _ = map.next_value::<IgnoredAny>()?;
                }
            }
        }

        let Some(low) = low else {
            return Err(Error::missing_field("low"));
        };

        let Some(high) = high else {
            return Err(Error::missing_field("high"));
        };

        if low > high {
            return Err(Error::custom(format_args!("low ({low}) is greater than high ({high})")));
        }

        Ok(ColorRange::new(low, high, rate, reverse))
    }
}

impl<'de> Deserialize<'de> for ColorRange {
    #[inline]
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where D: Deserializer<'de> {
        deserializer.deserialize_map(ColorRangeVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(len: u32) -> Palette {
        (0..len).map(|index| Rgb(index * 0x010101)).collect()
    }

    #[test]
    fn ticks_zero_is_identity() {
        let base = gradient(8);
        let ranges = [ColorRange::new(0, 3, 256, true)];
        assert_eq!(animate(&base, &ranges, 0, false), base);

        let ranges = [ColorRange::new(0, 3, 256, false)];
        assert_eq!(animate(&base, &ranges, 0, false), base);
    }

    #[test]
    fn one_step_each_direction() {
        let base = gradient(6);
        // one integer tick at rate 0x4000 is exactly one register
        let ticks = TICK_ONE;

        let ranges = [ColorRange::new(1, 4, 0x4000, true)];
        let frame = animate(&base, &ranges, ticks, false);
        assert_eq!(frame.colors(), &[base[0], base[2], base[3], base[4], base[1], base[5]]);

        let ranges = [ColorRange::new(1, 4, 0x4000, false)];
        let frame = animate(&base, &ranges, ticks, false);
        assert_eq!(frame.colors(), &[base[0], base[4], base[1], base[2], base[3], base[5]]);
    }

    #[test]
    fn full_cycle_wraps() {
        let base = gradient(4);
        let ranges = [ColorRange::new(0, 3, 0x4000, true)];
        assert_eq!(animate(&base, &ranges, 4 * TICK_ONE, false), base);
        assert_eq!(animate(&base, &ranges, 5 * TICK_ONE, false), animate(&base, &ranges, TICK_ONE, false));
    }

    #[test]
    fn fractional_ticks() {
        let range = ColorRange::new(0, 3, 0x4000, true);
        assert_eq!(range.scaled_ticks(0x8000), 0x8000);
        assert_eq!(range.scaled_ticks(0x18000), 0x18000);
        assert_eq!(range.offset(0x18000), 1);
    }

    #[test]
    fn blend_half_way() {
        let base: Palette = vec![Rgb(0x000000), Rgb(0xFFFFFF), Rgb(0x123456)].into();
        let ranges = [ColorRange::new(0, 1, 0x4000, true)];
        let frame = animate(&base, &ranges, 0x8000, true);
        // offset 0, weight 0x80 between each color and its predecessor
        assert_eq!(frame[0], color::blend(Rgb(0x000000), Rgb(0xFFFFFF), 0x80, 0x80));
        assert_eq!(frame[1], color::blend(Rgb(0xFFFFFF), Rgb(0x000000), 0x80, 0x80));
        assert_eq!(frame[2], Rgb(0x123456));
    }

    #[test]
    fn blend_with_zero_weight_matches_plain() {
        let base = gradient(16);
        let ranges = [ColorRange::new(2, 9, 0x4000, false), ColorRange::new(10, 15, 0x8000, true)];
        for step in 0..20 {
            let ticks = step * TICK_ONE;
            assert_eq!(animate(&base, &ranges, ticks, true), animate(&base, &ranges, ticks, false));
        }
    }

    #[test]
    fn stays_inside_range() {
        let base = gradient(32);
        let ranges = [ColorRange::new(5, 5, 0xFFFF, false), ColorRange::new(10, 20, 0xFFFF, true)];
        for ticks in [0, 1, 0xFFFF, 0x10000, 0x12345678, u32::MAX] {
            for blend in [false, true] {
                let frame = animate(&base, &ranges, ticks, blend);
                assert_eq!(frame.len(), base.len());
                for index in (0..5).chain(6..10).chain(21..32) {
                    assert_eq!(frame[index], base[index]);
                }
                assert_eq!(frame[5], base[5]);
                if !blend {
                    for index in 10..=20 {
                        assert!(base.colors()[10..=20].contains(&frame[index]));
                    }
                }
            }
        }
    }

    #[test]
    fn out_of_bounds_range_is_ignored() {
        let base = gradient(4);
        let ranges = [ColorRange::new(2, 7, 0x4000, true), ColorRange::new(3, 1, 0x4000, true)];
        assert_eq!(animate(&base, &ranges, 3 * TICK_ONE, false), base);
    }

    #[test]
    fn frame_clock() {
        assert_eq!(ticks_per_frame(1), 0x10000);
        assert_eq!(ticks_per_frame(4), 0x4000);
        assert_eq!(ticks_per_frame(0), 0x10000);
    }

    #[test]
    fn range_json() {
        let range: ColorRange = serde_json::from_str(r#"{"reverse": 2, "rate": 280, "low": 3, "high": 9}"#).unwrap();
        assert_eq!(range, ColorRange::new(3, 9, 280, true));
        assert!(serde_json::from_str::<ColorRange>(r#"{"reverse": 1, "low": 3, "high": 9}"#).is_err());
        assert!(serde_json::from_str::<ColorRange>(r#"{"low": 9, "high": 3}"#).is_err());
    }

    #[test]
    fn display() {
        let palette: Palette = vec![Rgb(0xFF0000), Rgb(0x00FF00)].into();
        assert_eq!(palette.to_string(), "[#FF0000, #00FF00]");
        assert_eq!(Palette::new().to_string(), "[]");
    }
}
