// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `position: sticky` bookkeeping.
//!
//! Every scrollable component keeps a list of the sticky components between it and the next
//! scrollable below. When it scrolls, each of them gets an offset that keeps it inside the
//! viewport at its `top`/`left`/`bottom`/`right` inset, without leaving its parent's box. The
//! offset is folded into the output transform.

use std::rc::{Rc, Weak};

use kurbo::{Rect, Vec2};
use taffy::style::LengthPercentageAuto;
use understory_object::{Dimension, Object};

use crate::{CoreComponent, LayoutFn, PropertyKey};

/// Inset properties. A sticky component lays out as if they were all `auto`.
pub(crate) const INSET_KEYS: [PropertyKey; 4] = [
    PropertyKey::Left,
    PropertyKey::Top,
    PropertyKey::Right,
    PropertyKey::Bottom,
];

impl CoreComponent {
    /// Returns `true` if `position` is `sticky`.
    #[must_use]
    pub fn is_sticky(&self) -> bool {
        self.get_calculated(PropertyKey::Position).as_str() == Some("sticky")
    }

    /// The nearest scrollable ancestor.
    pub(crate) fn scrollable_ancestor(&self) -> Option<Rc<Self>> {
        let mut current = self.parent();
        while let Some(component) = current {
            if component.component_type().is_scrollable() {
                return Some(component);
            }
            current = component.parent();
        }
        None
    }

    fn sticky_components(&self) -> Vec<Rc<Self>> {
        let mut found = Vec::new();
        let mut stack: Vec<Rc<Self>> = self.self_rc().into_iter().collect();
        while let Some(component) = stack.pop() {
            if component.is_sticky() {
                found.push(component.clone());
            }
            stack.extend(component.children());
        }
        found
    }

    /// Registers every sticky component of this subtree with its scroller.
    pub(crate) fn register_sticky_subtree(&self) {
        for sticky in self.sticky_components() {
            sticky.register_sticky();
        }
    }

    /// Undoes [`register_sticky_subtree`](Self::register_sticky_subtree) while the parent link
    /// is still in place.
    pub(crate) fn unregister_sticky_subtree(&self) {
        for sticky in self.sticky_components() {
            sticky.unregister_sticky();
        }
    }

    fn register_sticky(&self) {
        let (Some(scroller), Some(this)) = (self.scrollable_ancestor(), self.self_rc()) else {
            return;
        };
        let mut descendants = scroller.sticky_descendants.borrow_mut();
        descendants.retain(|w| w.strong_count() > 0);
        if !descendants.iter().any(|w| w.ptr_eq(&Rc::downgrade(&this))) {
            descendants.push(Rc::downgrade(&this));
            tracing::debug!(uid = self.uid(), scroller = scroller.uid(), "sticky registered");
        }
    }

    fn unregister_sticky(&self) {
        if let Some(scroller) = self.scrollable_ancestor() {
            scroller
                .sticky_descendants
                .borrow_mut()
                .retain(|w| w.strong_count() > 0 && !core::ptr::eq(w.as_ptr(), self));
        }
        if self.sticky_offset.replace(Vec2::ZERO) != Vec2::ZERO {
            self.recompute_transform();
        }
    }

    /// Writes the inset properties into the layout node, or clears them while sticky.
    pub(crate) fn apply_layout_insets(&self) {
        if self.is_sticky() {
            self.update_layout_style(|style| {
                style.inset.left = LengthPercentageAuto::auto();
                style.inset.top = LengthPercentageAuto::auto();
                style.inset.right = LengthPercentageAuto::auto();
                style.inset.bottom = LengthPercentageAuto::auto();
            });
            return;
        }
        let metrics = *self.context().metrics();
        let hooks: Vec<(LayoutFn, Object)> = INSET_KEYS
            .iter()
            .filter_map(|&key| Some((self.find_def(key)?.layout?, self.get_calculated(key))))
            .collect();
        self.update_layout_style(|style| {
            for (layout, value) in &hooks {
                layout(style, value, &metrics);
            }
        });
    }

    /// Reacts to `position` moving into or out of `sticky`.
    pub(crate) fn sticky_transition(&self, previous: Option<&Object>, current: &Object) {
        let was = previous.and_then(Object::as_str) == Some("sticky");
        let is = current.as_str() == Some("sticky");
        match (was, is) {
            (false, true) => {
                self.register_sticky();
                if let Some(scroller) = self.scrollable_ancestor() {
                    scroller.update_sticky_children();
                }
            }
            (true, false) => self.unregister_sticky(),
            _ => {}
        }
        if was != is {
            self.apply_layout_insets();
            if let Some(parent) = self.parent() {
                parent.mark_displayed_children_stale();
            }
        }
    }

    /// Recomputes the offsets of the sticky components this scroller tracks.
    pub(crate) fn update_sticky_children(&self) {
        let tracked: Vec<Rc<Self>> = self
            .sticky_descendants
            .borrow()
            .iter()
            .filter_map(Weak::upgrade)
            .collect();
        if tracked.is_empty() {
            return;
        }
        let viewport = Rect::from_origin_size(self.scroll_offset().to_point(), self.bounds().size());
        for sticky in tracked {
            let offset = sticky.sticky_offset_in(self, viewport);
            if sticky.sticky_offset.replace(offset) != offset {
                sticky.recompute_transform();
            }
        }
    }

    /// The offset that pins this component inside `viewport`, in `scroller` content space.
    fn sticky_offset_in(&self, scroller: &Self, viewport: Rect) -> Vec2 {
        let Some(origin) = self.origin_in(scroller) else {
            return Vec2::ZERO;
        };
        let size = self.bounds().size();
        let container = self
            .parent()
            .filter(|p| !core::ptr::eq(p.as_ref(), scroller))
            .and_then(|p| Some(Rect::from_origin_size(p.origin_in(scroller)?, p.bounds().size())));
        let metrics = *self.context().metrics();
        let inset = |key| match self.get_calculated(key).as_dimension(&metrics) {
            Dimension::Absolute(value) => Some(value),
            _ => None,
        };
        let axis = |start: f64,
                    extent: f64,
                    view_start: f64,
                    view_end: f64,
                    lead: Option<f64>,
                    trail: Option<f64>,
                    bounds: Option<(f64, f64)>| {
            let mut delta = 0.0_f64;
            if let Some(lead) = lead {
                delta = delta.max(view_start + lead - start);
            }
            if let Some(trail) = trail {
                delta = delta.min(view_end - trail - (start + extent));
            }
            if let Some((low, high)) = bounds {
                delta = delta.min(high - (start + extent)).max(low - start);
            }
            delta
        };
        Vec2::new(
            axis(
                origin.x,
                size.width,
                viewport.x0,
                viewport.x1,
                inset(PropertyKey::Left),
                inset(PropertyKey::Right),
                container.map(|c| (c.x0, c.x1)),
            ),
            axis(
                origin.y,
                size.height,
                viewport.y0,
                viewport.y1,
                inset(PropertyKey::Top),
                inset(PropertyKey::Bottom),
                container.map(|c| (c.y0, c.y1)),
            ),
        )
    }

    /// Layout position of this component in the content space of `ancestor`, ignoring
    /// transforms.
    fn origin_in(&self, ancestor: &Self) -> Option<kurbo::Point> {
        let mut position = self.bounds().origin().to_vec2();
        let mut current = self.parent()?;
        while !core::ptr::eq(current.as_ref(), ancestor) {
            position += current.bounds().origin().to_vec2() - current.scroll_offset();
            current = current.parent()?;
        }
        Some(position.to_point())
    }
}
