// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::rc::{Rc, Weak};

use understory_binding::{
    BindingFunction, BoundSymbolSet, Context, Dependant, DependantCore, Expression,
    apply_data_binding,
};

use crate::{CoreComponent, PropertyKey};

/// Keeps one component property equal to an expression.
///
/// Conversion to the property's type happens in the component, so the binding function is
/// the identity.
#[derive(Debug)]
pub struct ComponentDependant {
    core: DependantCore,
    component: Weak<CoreComponent>,
    key: PropertyKey,
}

impl ComponentDependant {
    /// Binds `key` of `component` to `expression` evaluated in `binding_context`.
    pub fn create(
        component: &Rc<CoreComponent>,
        key: PropertyKey,
        binding_context: &Rc<Context>,
        expression: Expression,
        symbols: BoundSymbolSet,
    ) -> Rc<Self> {
        let order = binding_context.dependant_manager().next_order();
        let dependant = Rc::new_cyclic(|weak: &Weak<Self>| {
            let self_weak: Weak<dyn Dependant> = weak.clone();
            Self {
                core: DependantCore::new(
                    order,
                    expression,
                    binding_context,
                    BindingFunction::default(),
                    symbols,
                    self_weak,
                ),
                component: Rc::downgrade(component),
                key,
            }
        });
        let as_dyn: Rc<dyn Dependant> = dependant.clone();
        component.set_upstream(key, Rc::downgrade(&as_dyn));
        as_dyn.attach();
        tracing::debug!(
            order,
            uid = component.uid(),
            %key,
            expression = dependant.core.expression().source(),
            "property binding created"
        );
        dependant
    }

    /// The driven property.
    #[must_use]
    pub fn key(&self) -> PropertyKey {
        self.key
    }
}

impl Dependant for ComponentDependant {
    fn core(&self) -> &DependantCore {
        &self.core
    }

    fn recalculate(&self, _use_dirty_flag: bool) {
        let (Some(component), Some(context)) =
            (self.component.upgrade(), self.core.binding_context())
        else {
            return;
        };
        let result = apply_data_binding(
            &context,
            self.core.expression(),
            self.core.binding_function(),
        );
        component.update_property(self.key, &result.value);
        self.reattach(result.symbols);
    }
}
