// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! RGBA8 color values and their text forms.

use core::fmt;

use peniko::color;

use crate::ObjectError;

/// A non-premultiplied RGBA color packed as `0xRRGGBBAA`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Color(u32);

#[allow(clippy::cast_possible_truncation, reason = "channel extraction masks by shifting")]
impl Color {
    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self(0);
    /// Opaque black.
    pub const BLACK: Self = Self(0x0000_00ff);
    /// Opaque white.
    pub const WHITE: Self = Self(0xffff_ffff);

    /// Creates a color from its packed `0xRRGGBBAA` form.
    #[must_use]
    pub const fn from_rgba(rgba: u32) -> Self {
        Self(rgba)
    }

    /// Creates a color from individual channels.
    #[must_use]
    pub const fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self(((r as u32) << 24) | ((g as u32) << 16) | ((b as u32) << 8) | a as u32)
    }

    /// Returns the packed `0xRRGGBBAA` value.
    #[must_use]
    pub const fn rgba(self) -> u32 {
        self.0
    }

    /// Red channel.
    #[must_use]
    pub const fn red(self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Green channel.
    #[must_use]
    pub const fn green(self) -> u8 {
        (self.0 >> 16) as u8
    }

    /// Blue channel.
    #[must_use]
    pub const fn blue(self) -> u8 {
        (self.0 >> 8) as u8
    }

    /// Alpha channel.
    #[must_use]
    pub const fn alpha(self) -> u8 {
        self.0 as u8
    }

    /// Returns `true` if the alpha channel is zero.
    #[must_use]
    pub const fn is_transparent(self) -> bool {
        self.alpha() == 0
    }

    /// Parses a CSS color: hex forms, `rgb()`/`rgba()`, `hsl()`/`hsla()` and every CSS named
    /// color. Colors in other spaces are converted to sRGB.
    pub fn parse(text: &str) -> Result<Self, ObjectError> {
        let parsed = color::parse_color(&text.trim().to_ascii_lowercase())
            .map_err(|_| ObjectError::InvalidColor(text.to_owned()))?;
        let rgba = parsed.to_alpha_color::<color::Srgb>().to_rgba8();
        Ok(Self::from_rgba8(rgba.r, rgba.g, rgba.b, rgba.a))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:08x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_forms() {
        assert_eq!(Color::parse("#f00").unwrap(), Color::from_rgba8(255, 0, 0, 255));
        assert_eq!(Color::parse("#f008").unwrap(), Color::from_rgba8(255, 0, 0, 0x88));
        assert_eq!(Color::parse("#102030").unwrap(), Color::from_rgba8(0x10, 0x20, 0x30, 255));
        assert_eq!(Color::parse("#10203040").unwrap().rgba(), 0x1020_3040);
    }

    #[test]
    fn parses_named_and_functional() {
        assert_eq!(Color::parse("Blue").unwrap(), Color::from_rgba8(0, 0, 255, 255));
        assert_eq!(Color::parse("transparent").unwrap(), Color::TRANSPARENT);
        assert_eq!(
            Color::parse("rgba(255, 128, 0, 0.5)").unwrap(),
            Color::from_rgba8(255, 128, 0, 128)
        );
        assert_eq!(Color::parse("rgb(1,2,3)").unwrap(), Color::from_rgba8(1, 2, 3, 255));
    }

    #[test]
    fn parses_hsl_and_the_full_named_set() {
        assert_eq!(
            Color::parse("hsl(0, 100%, 50%)").unwrap(),
            Color::from_rgba8(255, 0, 0, 255)
        );
        assert_eq!(
            Color::parse("hsla(240, 100%, 50%, 0.5)").unwrap(),
            Color::from_rgba8(0, 0, 255, 128)
        );
        assert_eq!(Color::parse("aliceblue").unwrap().rgba(), 0xf0f8_ffff);
        assert_eq!(Color::parse(" RebeccaPurple ").unwrap().rgba(), 0x6633_99ff);
    }

    #[test]
    fn rejects_garbage() {
        assert!(Color::parse("#12").is_err(), "two digit hex is not a color");
        assert!(Color::parse("#ggg").is_err(), "non hex digits");
        assert!(Color::parse("blurple").is_err(), "unknown name");
        assert!(Color::parse("rgb(1,2)").is_err(), "too few channels");
    }

    #[test]
    fn displays_as_rrggbbaa() {
        assert_eq!(Color::from_rgba8(255, 0, 16, 255).to_string(), "#ff0010ff");
    }
}
