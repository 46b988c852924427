// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Text measurement interface used by layout.

use core::fmt;

use kurbo::Size;

/// How a measured axis is constrained.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MeasureMode {
    /// The size must be exactly the given value.
    Exactly,
    /// The size may not exceed the given value.
    AtMost,
    /// The given value is meaningless.
    Undefined,
}

/// The text-relevant properties of a component being measured.
#[derive(Clone, Debug, PartialEq)]
pub struct TextRequest {
    /// The text to lay out.
    pub text: String,
    /// Font size in dp.
    pub font_size: f64,
    /// Maximum number of lines, zero for unlimited.
    pub max_lines: u32,
}

/// Measures text on behalf of the layout engine.
///
/// Called from inside a layout pass, on the engine thread.
pub trait TextMeasurement: fmt::Debug {
    /// The size of `request` under the given constraints, in dp.
    fn measure(
        &self,
        request: &TextRequest,
        width: f64,
        width_mode: MeasureMode,
        height: f64,
        height_mode: MeasureMode,
    ) -> Size;

    /// Distance from the top of a box of the given size to the first baseline.
    fn baseline(&self, request: &TextRequest, width: f64, height: f64) -> f64;
}

/// Measures every character as half the font size wide and every line as 1.25 font sizes tall.
///
/// Deterministic, which makes it the default for tests and headless hosts.
#[derive(Clone, Copy, Debug, Default)]
pub struct FixedAdvanceMeasure;

impl FixedAdvanceMeasure {
    const ADVANCE: f64 = 0.5;
    const LINE_HEIGHT: f64 = 1.25;
}

impl TextMeasurement for FixedAdvanceMeasure {
    fn measure(
        &self,
        request: &TextRequest,
        width: f64,
        width_mode: MeasureMode,
        height: f64,
        height_mode: MeasureMode,
    ) -> Size {
        let advance = request.font_size * Self::ADVANCE;
        let chars = request.text.chars().count() as f64;
        let natural = chars * advance;

        let (measured_width, mut lines) = match width_mode {
            MeasureMode::Undefined => (natural, 1.0),
            _ if natural <= width || advance <= 0.0 => (natural, 1.0),
            _ => {
                let per_line = (width / advance).floor().max(1.0);
                (per_line * advance, (chars / per_line).ceil())
            }
        };
        if request.max_lines > 0 {
            lines = lines.min(f64::from(request.max_lines));
        }
        if chars == 0.0 {
            lines = 1.0;
        }
        let natural_height = lines * request.font_size * Self::LINE_HEIGHT;

        let width = match width_mode {
            MeasureMode::Exactly => width,
            _ => measured_width,
        };
        let height = match height_mode {
            MeasureMode::Exactly => height,
            MeasureMode::AtMost => natural_height.min(height),
            MeasureMode::Undefined => natural_height,
        };
        Size::new(width, height)
    }

    fn baseline(&self, request: &TextRequest, _width: f64, _height: f64) -> f64 {
        request.font_size
    }
}
