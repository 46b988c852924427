// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Keyboard focus.
//!
//! Tab order is a depth-first, pre-order walk of the component tree from the top component.
//! Candidates are components whose type can take focus, that are not disabled, and that are
//! displayable. The manager only holds a weak handle, so focus can never keep a released
//! component alive; removal of the focused subtree moves focus forward in tab order or clears
//! it.

use core::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::document::DocumentData;
use crate::{CoreComponent, StateFlags};

/// Tracks the focused component of one document.
#[derive(Debug, Default)]
pub(crate) struct FocusManager {
    focused: RefCell<Weak<CoreComponent>>,
}

impl FocusManager {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// The focused component, if it is still alive and attached.
    pub(crate) fn focused(&self) -> Option<Rc<CoreComponent>> {
        self.focused
            .borrow()
            .upgrade()
            .filter(|component| !component.is_released())
    }

    /// Moves focus to `component`. Returns `false` if it cannot take focus.
    pub(crate) fn set_focus(&self, component: &Rc<CoreComponent>) -> bool {
        self.focus(component, true)
    }

    /// Moves focus on behalf of the host field itself, without echoing it back.
    pub(crate) fn set_focus_from_host(&self, component: &Rc<CoreComponent>) -> bool {
        self.focus(component, false)
    }

    fn focus(&self, component: &Rc<CoreComponent>, notify_host: bool) -> bool {
        if !component.is_focusable() {
            return false;
        }
        if self
            .focused()
            .is_some_and(|current| Rc::ptr_eq(&current, component))
        {
            return true;
        }
        self.clear_focus();
        *self.focused.borrow_mut() = Rc::downgrade(component);
        component.apply_focus(true, notify_host);
        tracing::debug!(uid = component.uid(), "focus set");
        true
    }

    /// Clears focus, if any component holds it.
    pub(crate) fn clear_focus(&self) {
        self.clear(true);
    }

    pub(crate) fn clear_focus_from_host(&self) {
        self.clear(false);
    }

    fn clear(&self, notify_host: bool) {
        let previous = self.focused.replace(Weak::new()).upgrade();
        if let Some(previous) = previous {
            previous.apply_focus(false, notify_host);
            tracing::debug!(uid = previous.uid(), "focus cleared");
        }
    }

    /// Called before `removed` leaves the tree.
    ///
    /// If the focused component is inside `removed`, focus moves to the next focusable
    /// component outside of it in tab order, wrapping around, or is cleared.
    pub(crate) fn handle_removal(&self, doc: &DocumentData, removed: &Rc<CoreComponent>) {
        let Some(focused) = self.focused() else {
            return;
        };
        if !removed.is_ancestor_of(&focused) {
            return;
        }
        let next = doc
            .top()
            .and_then(|top| next_in_tab_order(&top, &focused, |c| !removed.is_ancestor_of(c)));
        match next {
            Some(next) => {
                self.set_focus(&next);
            }
            None => self.clear_focus(),
        }
    }

    /// Moves focus forward from the focused component, or to the first candidate.
    pub(crate) fn focus_next(&self, top: &Rc<CoreComponent>) -> Option<Rc<CoreComponent>> {
        let next = match self.focused() {
            Some(focused) => next_in_tab_order(top, &focused, |_| true),
            None => tab_order(top).into_iter().find(|c| c.is_focusable()),
        }?;
        self.set_focus(&next).then_some(next)
    }
}

/// Every component under `top`, parents before children, siblings in order.
pub(crate) fn tab_order(top: &Rc<CoreComponent>) -> Vec<Rc<CoreComponent>> {
    let mut order = Vec::new();
    let mut stack = vec![top.clone()];
    while let Some(component) = stack.pop() {
        stack.extend(component.children().into_iter().rev());
        order.push(component);
    }
    order
}

/// The first focusable component after `from` in tab order that passes `accept`.
fn next_in_tab_order(
    top: &Rc<CoreComponent>,
    from: &Rc<CoreComponent>,
    accept: impl Fn(&CoreComponent) -> bool,
) -> Option<Rc<CoreComponent>> {
    let order = tab_order(top);
    let start = order
        .iter()
        .position(|c| Rc::ptr_eq(c, from))
        .map_or(0, |i| i + 1);
    let len = order.len();
    (0..len)
        .map(|offset| order[(start + offset) % len].clone())
        .find(|c| !Rc::ptr_eq(c, from) && c.is_focusable() && accept(c))
}

impl CoreComponent {
    /// Returns `true` if this component can take keyboard focus right now.
    #[must_use]
    pub fn is_focusable(&self) -> bool {
        self.component_type().is_focusable()
            && !self.state().contains(StateFlags::DISABLED)
            && !self.is_released()
            && self.is_displayable()
    }

    /// Returns `true` if this component holds keyboard focus.
    #[must_use]
    pub fn is_focused(&self) -> bool {
        self.state().contains(StateFlags::FOCUSED)
    }

    pub(crate) fn apply_focus(&self, focused: bool, notify_host: bool) {
        self.set_state(StateFlags::FOCUSED, focused);
        if notify_host {
            if let Some(edit_text) = self.edit_text.borrow().as_ref() {
                edit_text.set_focus(focused);
            }
        }
    }

    /// The host text field gained or lost native focus.
    pub(crate) fn host_focus_changed(&self, focused: bool) {
        let Some(this) = self.self_rc() else {
            return;
        };
        let focus = &self.doc.focus;
        if focused {
            focus.set_focus_from_host(&this);
        } else if focus.focused().is_some_and(|f| Rc::ptr_eq(&f, &this)) {
            focus.clear_focus_from_host();
        }
    }
}
