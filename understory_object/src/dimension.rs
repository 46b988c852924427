// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dimensions and the viewport metrics used to resolve them.

use core::fmt;

use crate::{ObjectError, format_number};

/// Viewport metrics in display-independent pixels (dp).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Metrics {
    /// Viewport width in dp.
    pub width: f64,
    /// Viewport height in dp.
    pub height: f64,
    /// Dots per inch of the display. 160 dpi is one pixel per dp.
    pub dpi: f64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            width: 1024.0,
            height: 800.0,
            dpi: 160.0,
        }
    }
}

impl Metrics {
    /// Creates metrics for a viewport of the given size at 160 dpi.
    #[must_use]
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            dpi: 160.0,
        }
    }

    /// Returns a copy with a different dpi.
    #[must_use]
    pub fn with_dpi(mut self, dpi: f64) -> Self {
        self.dpi = dpi;
        self
    }

    /// Converts physical pixels to dp.
    #[must_use]
    pub fn px_to_dp(&self, px: f64) -> f64 {
        px * 160.0 / self.dpi
    }

    /// Converts dp to physical pixels.
    #[must_use]
    pub fn dp_to_px(&self, dp: f64) -> f64 {
        dp * self.dpi / 160.0
    }
}

/// A length that is absolute (dp), relative to the parent (percent), or automatic.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Dimension {
    /// Sized by content or layout.
    #[default]
    Auto,
    /// Absolute length in dp.
    Absolute(f64),
    /// Percentage of the containing length.
    Relative(f64),
}

impl Dimension {
    /// Parses `auto`, a bare number (dp), or a number suffixed with `dp`, `px`, `%`, `vw`, or `vh`.
    pub fn parse(text: &str, metrics: &Metrics) -> Result<Self, ObjectError> {
        let trimmed = text.trim();
        if trimmed.eq_ignore_ascii_case("auto") {
            return Ok(Self::Auto);
        }
        let split = trimmed
            .find(|c: char| c.is_ascii_alphabetic() || c == '%')
            .unwrap_or(trimmed.len());
        let (number, unit) = trimmed.split_at(split);
        let value: f64 = number
            .trim()
            .parse()
            .map_err(|_| ObjectError::InvalidDimension(text.to_owned()))?;
        match unit.trim().to_ascii_lowercase().as_str() {
            "" | "dp" => Ok(Self::Absolute(value)),
            "px" => Ok(Self::Absolute(metrics.px_to_dp(value))),
            "%" => Ok(Self::Relative(value)),
            "vw" => Ok(Self::Absolute(value * metrics.width / 100.0)),
            "vh" => Ok(Self::Absolute(value * metrics.height / 100.0)),
            _ => Err(ObjectError::InvalidDimension(text.to_owned())),
        }
    }

    /// Returns `true` for [`Dimension::Auto`].
    #[must_use]
    pub fn is_auto(&self) -> bool {
        matches!(self, Self::Auto)
    }

    /// Returns `true` for [`Dimension::Absolute`].
    #[must_use]
    pub fn is_absolute(&self) -> bool {
        matches!(self, Self::Absolute(_))
    }

    /// Returns `true` for [`Dimension::Relative`].
    #[must_use]
    pub fn is_relative(&self) -> bool {
        matches!(self, Self::Relative(_))
    }

    /// The numeric payload, or `NaN` for auto.
    #[must_use]
    pub fn value(&self) -> f64 {
        match self {
            Self::Auto => f64::NAN,
            Self::Absolute(v) | Self::Relative(v) => *v,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Absolute(v) => write!(f, "{}dp", format_number(*v)),
            Self::Relative(v) => write!(f, "{}%", format_number(*v)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_units() {
        let metrics = Metrics::new(400.0, 200.0).with_dpi(320.0);
        assert_eq!(Dimension::parse("12", &metrics).unwrap(), Dimension::Absolute(12.0));
        assert_eq!(Dimension::parse("12dp", &metrics).unwrap(), Dimension::Absolute(12.0));
        assert_eq!(Dimension::parse("20px", &metrics).unwrap(), Dimension::Absolute(10.0));
        assert_eq!(Dimension::parse("25%", &metrics).unwrap(), Dimension::Relative(25.0));
        assert_eq!(Dimension::parse("50vw", &metrics).unwrap(), Dimension::Absolute(200.0));
        assert_eq!(Dimension::parse("10vh", &metrics).unwrap(), Dimension::Absolute(20.0));
        assert_eq!(Dimension::parse(" AUTO ", &metrics).unwrap(), Dimension::Auto);
    }

    #[test]
    fn rejects_unknown_units() {
        let metrics = Metrics::default();
        assert!(Dimension::parse("12em", &metrics).is_err(), "em is not supported");
        assert!(Dimension::parse("wide", &metrics).is_err(), "no number");
    }

    #[test]
    fn display_round_trips_text_form() {
        assert_eq!(Dimension::Absolute(10.0).to_string(), "10dp");
        assert_eq!(Dimension::Relative(12.5).to_string(), "12.5%");
        assert_eq!(Dimension::Auto.to_string(), "auto");
    }
}
