// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dependants and the queue that recalculates them.

use core::cell::{Cell, RefCell};
use core::fmt;
use std::rc::{Rc, Weak};

use crate::{BindingFunction, BoundSymbolSet, Context, Expression};

/// State shared by every kind of dependant.
pub struct DependantCore {
    order: u64,
    expression: Expression,
    binding_context: Weak<Context>,
    binding_function: BindingFunction,
    symbols: RefCell<BoundSymbolSet>,
    self_weak: Weak<dyn Dependant>,
    detached: Cell<bool>,
}

impl fmt::Debug for DependantCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependantCore")
            .field("order", &self.order)
            .field("expression", &self.expression.source())
            .field("symbols", &self.symbols.borrow().len())
            .field("detached", &self.detached.get())
            .finish_non_exhaustive()
    }
}

impl DependantCore {
    /// Creates the shared state. `self_weak` must point at the dependant that owns this core.
    #[must_use]
    pub fn new(
        order: u64,
        expression: Expression,
        binding_context: &Rc<Context>,
        binding_function: BindingFunction,
        symbols: BoundSymbolSet,
        self_weak: Weak<dyn Dependant>,
    ) -> Self {
        debug_assert!(
            !symbols.is_empty(),
            "a dependant with no symbols can never be recalculated"
        );
        Self {
            order,
            expression,
            binding_context: Rc::downgrade(binding_context),
            binding_function,
            symbols: RefCell::new(symbols),
            self_weak,
            detached: Cell::new(false),
        }
    }

    /// Queue sort key, assigned at creation.
    #[must_use]
    pub fn order(&self) -> u64 {
        self.order
    }

    /// The expression being tracked.
    #[must_use]
    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    /// The frame the expression evaluates in, if still alive.
    #[must_use]
    pub fn binding_context(&self) -> Option<Rc<Context>> {
        self.binding_context.upgrade()
    }

    /// Conversion applied to every result.
    #[must_use]
    pub fn binding_function(&self) -> &BindingFunction {
        &self.binding_function
    }

    /// The slots this dependant currently listens to.
    #[must_use]
    pub fn symbols(&self) -> BoundSymbolSet {
        self.symbols.borrow().clone()
    }

    /// Returns `true` once [`Dependant::detach`] has run.
    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.detached.get()
    }
}

/// A live binding from a set of context slots to one target.
///
/// A dependant is owned by the downstream lists of the slots it reads; targets refer back to
/// it weakly. Implementors only supply [`core`](Self::core) and
/// [`recalculate`](Self::recalculate).
pub trait Dependant: fmt::Debug {
    /// Shared state.
    fn core(&self) -> &DependantCore;

    /// Re-evaluates the expression and pushes the result to the target.
    fn recalculate(&self, use_dirty_flag: bool);

    /// Queue sort key.
    fn order(&self) -> u64 {
        self.core().order
    }

    /// Queues this dependant for recalculation.
    fn enqueue(&self) {
        let core = self.core();
        if core.detached.get() {
            return;
        }
        let (Some(context), Some(this)) = (core.binding_context(), core.self_weak.upgrade()) else {
            return;
        };
        context.dependant_manager().enqueue(this);
    }

    /// Registers as a listener on every symbol.
    fn attach(&self) {
        let core = self.core();
        let Some(this) = core.self_weak.upgrade() else {
            return;
        };
        let symbols = core.symbols();
        for symbol in symbols.iter() {
            if let Some(context) = symbol.context() {
                context.add_downstream(symbol.name(), this.clone());
            }
        }
    }

    /// Unregisters from every symbol and stops responding to changes. Final.
    fn detach(&self) {
        let core = self.core();
        core.detached.set(true);
        unlink(core);
    }

    /// Switches to `symbols` if the last evaluation read a different set.
    fn reattach(&self, symbols: BoundSymbolSet) {
        let core = self.core();
        if core.detached.get() || *core.symbols.borrow() == symbols {
            return;
        }
        tracing::trace!(order = core.order, count = symbols.len(), "dependant rewired");
        unlink(core);
        *core.symbols.borrow_mut() = symbols;
        self.attach();
    }
}

fn unlink(core: &DependantCore) {
    let symbols = core.symbols();
    for symbol in symbols.iter() {
        if let Some(context) = symbol.context() {
            context.remove_downstream(symbol.name(), core.order);
        }
    }
}

/// Guard clearing the re-entrancy flag even if a recalculation panics.
struct Processing<'a>(&'a Cell<bool>);

impl Drop for Processing<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Ordered queue of dependants awaiting recalculation.
///
/// Dependants are kept sorted by creation order and appear at most once. Draining always
/// takes the smallest order first, so a binding created earlier (usually a source of later
/// ones) settles before the bindings that read it.
pub struct DependantManager {
    next_order: Cell<u64>,
    queue: RefCell<Vec<Rc<dyn Dependant>>>,
    processing: Cell<bool>,
}

impl fmt::Debug for DependantManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependantManager")
            .field("next_order", &self.next_order.get())
            .field("queued", &self.queue.borrow().len())
            .field("processing", &self.processing.get())
            .finish()
    }
}

impl Default for DependantManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DependantManager {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_order: Cell::new(10),
            queue: RefCell::new(Vec::new()),
            processing: Cell::new(false),
        }
    }

    /// Hands out the next creation-order key.
    pub fn next_order(&self) -> u64 {
        let order = self.next_order.get();
        self.next_order.set(order + 1);
        order
    }

    /// Adds `dependant` unless one with the same order is already queued.
    pub fn enqueue(&self, dependant: Rc<dyn Dependant>) {
        let order = dependant.order();
        let mut queue = self.queue.borrow_mut();
        if let Err(index) = queue.binary_search_by_key(&order, |d| d.order()) {
            queue.insert(index, dependant);
        }
    }

    /// Recalculates queued dependants until the queue is empty.
    ///
    /// A nested call made while draining returns immediately; the outer loop picks up
    /// anything the nested caller enqueued.
    pub fn process_dependencies(&self, use_dirty_flag: bool) {
        if self.processing.replace(true) {
            return;
        }
        let _guard = Processing(&self.processing);
        let mut processed = 0_usize;
        loop {
            let next = {
                let mut queue = self.queue.borrow_mut();
                if queue.is_empty() {
                    None
                } else {
                    Some(queue.remove(0))
                }
            };
            let Some(dependant) = next else {
                break;
            };
            dependant.recalculate(use_dirty_flag);
            processed += 1;
        }
        if processed > 0 {
            tracing::trace!(processed, "dependency queue drained");
        }
    }

    /// Returns `true` if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }

    /// Number of queued dependants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }
}
