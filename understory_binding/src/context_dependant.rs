// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::rc::{Rc, Weak};

use crate::{
    BindingFunction, BoundSymbolSet, Context, Dependant, DependantCore, Expression,
    apply_data_binding,
};

/// Keeps a context slot equal to an expression evaluated in some (possibly other) frame.
#[derive(Debug)]
pub struct ContextDependant {
    core: DependantCore,
    downstream_context: Weak<Context>,
    downstream_name: Rc<str>,
}

impl ContextDependant {
    /// Binds `downstream_name` in `downstream_context` to `expression`.
    ///
    /// The dependant registers itself as the slot's upstream and as a listener on every
    /// symbol; the returned `Rc` may be dropped freely.
    pub fn create(
        downstream_context: &Rc<Context>,
        downstream_name: &str,
        binding_context: &Rc<Context>,
        expression: Expression,
        binding_function: BindingFunction,
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
                    binding_function,
                    symbols,
                    self_weak,
                ),
                downstream_context: Rc::downgrade(downstream_context),
                downstream_name: Rc::from(downstream_name),
            }
        });
        let as_dyn: Rc<dyn Dependant> = dependant.clone();
        downstream_context.add_upstream(downstream_name, Rc::downgrade(&as_dyn));
        as_dyn.attach();
        tracing::debug!(
            order,
            name = downstream_name,
            expression = dependant.core.expression().source(),
            "context binding created"
        );
        dependant
    }
}

impl Dependant for ContextDependant {
    fn core(&self) -> &DependantCore {
        &self.core
    }

    fn recalculate(&self, use_dirty_flag: bool) {
        let (Some(target), Some(context)) =
            (self.downstream_context.upgrade(), self.core.binding_context())
        else {
            return;
        };
        let result = apply_data_binding(
            &context,
            self.core.expression(),
            self.core.binding_function(),
        );
        target.propagate(&self.downstream_name, result.value, use_dirty_flag);
        self.reattach(result.symbols);
    }
}

#[cfg(test)]
mod tests {
    use understory_object::Object;

    use super::*;
    use crate::{BindingType, parse_and_evaluate};

    #[test]
    fn converts_through_the_binding_function() {
        let context = Context::create_test_context();
        context.put_user_writeable("a", Object::from(2.7));
        let parsed = parse_and_evaluate(&context, &Object::from("${a * 2}"), true);
        let function = BindingType::Integer.binding_function();
        context.put_user_writeable("n", function.call(&context, &parsed.value));
        ContextDependant::create(
            &context,
            "n",
            &context,
            parsed.expression.unwrap(),
            function,
            parsed.symbols,
        );
        assert_eq!(context.opt("n"), Object::from(5));

        context.user_update_and_recalculate("a", Object::from(10.2));
        assert_eq!(context.opt("n"), Object::from(20));
    }

    #[test]
    fn reads_from_another_frame() {
        let root = Context::create_test_context();
        root.put_user_writeable("price", Object::from(3));
        let item = Context::create_child(&root);
        item.put_user_writeable("label", Object::Null);
        let parsed = parse_and_evaluate(&item, &Object::from("Cost: ${price}"), false);
        ContextDependant::create(
            &item,
            "label",
            &item,
            parsed.expression.unwrap(),
            BindingFunction::default(),
            parsed.symbols,
        );
        assert_eq!(root.count_downstream("price"), 1);

        root.user_update_and_recalculate("price", Object::from(4));
        assert_eq!(item.opt("label"), Object::from("Cost: 4"));
    }
}
