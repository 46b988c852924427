// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bridge between the component tree and the [`taffy`] flexbox engine.
//!
//! Taffy owns sizes and positions; components own everything else. Each component owns one
//! taffy node whose context points back at it weakly so the measure callback can reach the
//! text properties. Results are read back after a pass and written as `bounds` and
//! `innerBounds`.

use core::fmt;
use std::rc::{Rc, Weak};

use kurbo::Rect;
use taffy::prelude::{AvailableSpace, Size, Style};
use taffy::style::FlexDirection;
use taffy::{Layout, NodeId, TaffyError, TaffyTree, TraversePartialTree};

use understory_object::Object;

use crate::property::layout_f32;
use crate::{ComponentType, CoreComponent, MeasureMode, PropertyKey, TextMeasurement};

/// The taffy tree of one document.
pub(crate) struct LayoutTree {
    taffy: TaffyTree<Weak<CoreComponent>>,
}

impl fmt::Debug for LayoutTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayoutTree")
            .field("nodes", &self.taffy.total_node_count())
            .finish_non_exhaustive()
    }
}

impl LayoutTree {
    pub(crate) fn new() -> Self {
        Self {
            taffy: TaffyTree::new(),
        }
    }

    pub(crate) fn new_node(
        &mut self,
        style: Style,
        component: Weak<CoreComponent>,
    ) -> Option<NodeId> {
        self.taffy
            .new_leaf_with_context(style, component)
            .inspect_err(|error| tracing::warn!(%error, "layout node not created"))
            .ok()
    }

    pub(crate) fn update_style(&mut self, node: NodeId, apply: impl FnOnce(&mut Style)) {
        let Ok(style) = self.taffy.style(node) else {
            return;
        };
        let mut style = style.clone();
        apply(&mut style);
        if let Err(error) = self.taffy.set_style(node, style) {
            tracing::warn!(%error, "layout style not updated");
        }
    }

    pub(crate) fn mark_dirty(&mut self, node: NodeId) {
        if let Err(error) = self.taffy.mark_dirty(node) {
            tracing::warn!(%error, "layout node not invalidated");
        }
    }

    pub(crate) fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        let index = index.min(self.taffy.child_count(parent));
        if let Err(error) = self.taffy.insert_child_at_index(parent, index, child) {
            tracing::warn!(%error, "layout child not inserted");
        }
    }

    pub(crate) fn remove_child(&mut self, parent: NodeId, child: NodeId) {
        if let Err(error) = self.taffy.remove_child(parent, child) {
            tracing::warn!(%error, "layout child not removed");
        }
    }

    pub(crate) fn remove(&mut self, node: NodeId) {
        if let Err(error) = self.taffy.remove(node) {
            tracing::debug!(%error, "layout node already gone");
        }
    }

    pub(crate) fn layout(&self, node: NodeId) -> Option<Layout> {
        self.taffy.layout(node).ok().copied()
    }

    /// Runs a pass from `root` inside a `width` by `height` viewport.
    pub(crate) fn compute(
        &mut self,
        root: NodeId,
        width: f64,
        height: f64,
        measurement: &Rc<dyn TextMeasurement>,
    ) -> Result<(), TaffyError> {
        let available = Size {
            width: AvailableSpace::Definite(layout_f32(width)),
            height: AvailableSpace::Definite(layout_f32(height)),
        };
        self.taffy.compute_layout_with_measure(
            root,
            available,
            |known, available, _node, context, _style| {
                if let Size {
                    width: Some(width),
                    height: Some(height),
                } = known
                {
                    return Size { width, height };
                }
                let Some(component) = context.and_then(|weak| weak.upgrade()) else {
                    return Size::ZERO;
                };
                if !component.component_type().measures_text() {
                    return Size::ZERO;
                }
                let (width, width_mode) = constraint(known.width, available.width);
                let (height, height_mode) = constraint(known.height, available.height);
                let measured = measurement.measure(
                    &component.text_request(),
                    width,
                    width_mode,
                    height,
                    height_mode,
                );
                Size {
                    width: known.width.unwrap_or(layout_f32(measured.width)),
                    height: known.height.unwrap_or(layout_f32(measured.height)),
                }
            },
        )
    }
}

/// Moves the baseline-aligned children of a single-line row container so their first baselines
/// line up.
///
/// Taffy has no baselines for measured leaves and falls back to the bottom edge. Text children
/// report their real baseline through [`TextMeasurement::baseline`]; other children keep the
/// bottom edge.
pub(crate) fn align_baselines(container: &CoreComponent, measurement: &dyn TextMeasurement) {
    if container.component_type() != ComponentType::Container
        || container.main_axis() != FlexDirection::Row
        || container.get_calculated(PropertyKey::Wrap).as_str() != Some("noWrap")
    {
        return;
    }
    let container_aligns =
        container.get_calculated(PropertyKey::AlignItems).as_str() == Some("baseline");
    let aligned: Vec<_> = container
        .children()
        .into_iter()
        .filter(|child| {
            child.get_calculated(PropertyKey::Display).as_str() != Some("none")
                && child.get_calculated(PropertyKey::Position).as_str() != Some("absolute")
                && match child.get_calculated(PropertyKey::AlignSelf).as_str() {
                    Some("baseline") => true,
                    Some("auto") | None => container_aligns,
                    Some(_) => false,
                }
        })
        .map(|child| {
            let bounds = child.bounds();
            let baseline = if child.component_type().measures_text() {
                measurement.baseline(&child.text_request(), bounds.width(), bounds.height())
            } else {
                bounds.height()
            };
            (child, bounds, baseline)
        })
        .collect();
    let Some((_, first, _)) = aligned.first() else {
        return;
    };
    let tallest = aligned.iter().map(|(_, b, _)| b.height()).fold(0.0, f64::max);
    let deepest = aligned.iter().map(|(_, _, baseline)| *baseline).fold(0.0, f64::max);
    let line_top = first.y0 - (tallest - first.height());
    for (child, bounds, baseline) in &aligned {
        let y0 = line_top + deepest - baseline;
        if y0 != bounds.y0 {
            let inner = match child.get_calculated(PropertyKey::InnerBounds) {
                Object::Rect(rect) => rect,
                _ => Rect::ZERO,
            };
            child.apply_layout(bounds.with_origin((bounds.x0, y0)), inner);
        }
    }
}

fn constraint(known: Option<f32>, available: AvailableSpace) -> (f64, MeasureMode) {
    match (known, available) {
        (Some(size), _) => (f64::from(size), MeasureMode::Exactly),
        (None, AvailableSpace::Definite(size)) => (f64::from(size), MeasureMode::AtMost),
        (None, _) => (0.0, MeasureMode::Undefined),
    }
}

/// The border box of a layout in parent coordinates.
#[must_use]
pub(crate) fn layout_to_rect(layout: &Layout) -> Rect {
    let x0 = f64::from(layout.location.x);
    let y0 = f64::from(layout.location.y);
    Rect::new(
        x0,
        y0,
        x0 + f64::from(layout.size.width),
        y0 + f64::from(layout.size.height),
    )
}

/// The content box of a layout in its own coordinates: the border box minus border and padding.
#[must_use]
pub(crate) fn layout_to_inner_rect(layout: &Layout) -> Rect {
    let left = f64::from(layout.border.left + layout.padding.left);
    let top = f64::from(layout.border.top + layout.padding.top);
    let right = f64::from(layout.size.width - layout.border.right - layout.padding.right);
    let bottom = f64::from(layout.size.height - layout.border.bottom - layout.padding.bottom);
    Rect::new(left, top, right.max(left), bottom.max(top))
}
