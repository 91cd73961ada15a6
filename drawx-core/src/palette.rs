//! Pencil palette: the fixed set of named colors a stroke can carry.
//!
//! Names are what gets stored and replicated; packed `0xAARRGGBB` values are
//! what gets painted. Lookups go both ways.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An 8-bit-per-channel color.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const WHITE: Rgba = Rgba::from_argb(0xffff_ffff);
    pub const BLACK: Rgba = Rgba::from_argb(0xff00_0000);
    pub const TRANSPARENT: Rgba = Rgba::from_argb(0x0000_0000);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Unpack a `0xAARRGGBB` value.
    pub const fn from_argb(argb: u32) -> Self {
        Self {
            a: (argb >> 24) as u8,
            r: (argb >> 16) as u8,
            g: (argb >> 8) as u8,
            b: argb as u8,
        }
    }

    /// Pack into `0xAARRGGBB`.
    pub const fn to_argb(self) -> u32 {
        (self.a as u32) << 24 | (self.r as u32) << 16 | (self.g as u32) << 8 | self.b as u32
    }

    /// Normalized `[r, g, b, a]`, the layout GPU pipelines expect.
    pub fn to_array(self) -> [f32; 4] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
            self.a as f32 / 255.0,
        ]
    }
}

impl Default for Rgba {
    fn default() -> Self {
        Rgba::WHITE
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:08x}", self.to_argb())
    }
}

/// The named pencils.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, Default, PartialEq, Eq, Hash)]
pub enum SwatchColor {
    #[default]
    Charcoal,
    Elephant,
    Dove,
    Ultramarine,
    Indigo,
    GrapeJelly,
    Mulberry,
    Flamingo,
    SexySalmon,
    Peach,
    Melon,
}

impl SwatchColor {
    /// All pencils in tray order.
    pub const ALL: [SwatchColor; 11] = [
        SwatchColor::Charcoal,
        SwatchColor::Elephant,
        SwatchColor::Dove,
        SwatchColor::Ultramarine,
        SwatchColor::Indigo,
        SwatchColor::GrapeJelly,
        SwatchColor::Mulberry,
        SwatchColor::Flamingo,
        SwatchColor::SexySalmon,
        SwatchColor::Peach,
        SwatchColor::Melon,
    ];

    /// The name written into stored strokes.
    pub const fn name(self) -> &'static str {
        match self {
            SwatchColor::Charcoal => "Charcoal",
            SwatchColor::Elephant => "Elephant",
            SwatchColor::Dove => "Dove",
            SwatchColor::Ultramarine => "Ultramarine",
            SwatchColor::Indigo => "Indigo",
            SwatchColor::GrapeJelly => "GrapeJelly",
            SwatchColor::Mulberry => "Mulberry",
            SwatchColor::Flamingo => "Flamingo",
            SwatchColor::SexySalmon => "SexySalmon",
            SwatchColor::Peach => "Peach",
            SwatchColor::Melon => "Melon",
        }
    }

    pub const fn argb(self) -> u32 {
        match self {
            SwatchColor::Charcoal => 0xff1c_283f,
            SwatchColor::Elephant => 0xff9a_9ba5,
            SwatchColor::Dove => 0xffeb_ebf2,
            SwatchColor::Ultramarine => 0xff39_477f,
            SwatchColor::Indigo => 0xff59_569e,
            SwatchColor::GrapeJelly => 0xff9a_50a5,
            SwatchColor::Mulberry => 0xffd3_4ca3,
            SwatchColor::Flamingo => 0xfffe_5192,
            SwatchColor::SexySalmon => 0xfff7_7c88,
            SwatchColor::Peach => 0xfffc_9f95,
            SwatchColor::Melon => 0xfffc_c397,
        }
    }

    pub const fn rgba(self) -> Rgba {
        Rgba::from_argb(self.argb())
    }

    /// Exact, case-sensitive name lookup. Stored names are written by
    /// [`SwatchColor::name`], so anything else is unrecognized.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    /// Reverse lookup from a packed value.
    pub fn from_argb(argb: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.argb() == argb)
    }

    /// Paint color for a stored name, falling back to `fallback` when the
    /// name is not in this palette.
    pub fn resolve(name: &str, fallback: Rgba) -> Rgba {
        Self::from_name(name).map_or(fallback, SwatchColor::rgba)
    }
}

impl fmt::Display for SwatchColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error for parsing a pencil name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown pencil color: {0}")]
pub struct UnknownColor(pub String);

impl FromStr for SwatchColor {
    type Err = UnknownColor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| UnknownColor(s.to_string()))
    }
}
