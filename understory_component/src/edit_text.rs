// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host-backed text fields.

use core::fmt;
use std::rc::{Rc, Weak};

use crate::CoreComponent;

/// Called when the user submits the field.
pub type SubmitCallback = Rc<dyn Fn()>;
/// Called with the new contents whenever the user edits the field.
pub type ChangedCallback = Rc<dyn Fn(&str)>;
/// Called when the host field gains or loses focus.
pub type FocusCallback = Rc<dyn Fn(bool)>;

/// A native text field owned by an `EditText` component.
pub trait EditText: fmt::Debug {
    /// Frees the native field. Called once when the component is released.
    fn release(&self);

    /// Gives or takes native focus.
    fn set_focus(&self, focused: bool);
}

/// Creates native text fields.
///
/// All three callbacks must only be invoked on the engine thread.
pub trait EditTextFactory: fmt::Debug {
    /// Creates a field wired to the given callbacks.
    fn create_edit_text(
        &self,
        submit: SubmitCallback,
        changed: ChangedCallback,
        focus: FocusCallback,
    ) -> Box<dyn EditText>;
}

/// Builds the three callbacks for `component`. They do nothing once it is released.
pub(crate) fn create_for(
    factory: &dyn EditTextFactory,
    component: Weak<CoreComponent>,
) -> Box<dyn EditText> {
    let on_submit = component.clone();
    let on_change = component.clone();
    let on_focus = component;
    factory.create_edit_text(
        Rc::new(move || {
            if let Some(component) = live(&on_submit) {
                component.submit();
            }
        }),
        Rc::new(move |text: &str| {
            if let Some(component) = live(&on_change) {
                component.host_text_changed(text);
            }
        }),
        Rc::new(move |focused: bool| {
            if let Some(component) = live(&on_focus) {
                component.host_focus_changed(focused);
            }
        }),
    )
}

fn live(component: &Weak<CoreComponent>) -> Option<Rc<CoreComponent>> {
    component.upgrade().filter(|c| !c.is_released())
}
