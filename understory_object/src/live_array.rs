// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared mutable arrays that notify listeners of structural changes.

use core::cell::RefCell;
use core::fmt;
use std::rc::{Rc, Weak};

use crate::Object;

/// A structural change applied to a [`LiveArray`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LiveArrayChange {
    /// `count` items were inserted starting at `index`.
    Inserted {
        /// First inserted position.
        index: usize,
        /// Number of inserted items.
        count: usize,
    },
    /// `count` items were removed starting at `index`.
    Removed {
        /// First removed position.
        index: usize,
        /// Number of removed items.
        count: usize,
    },
    /// The item at `index` was replaced.
    Updated {
        /// Replaced position.
        index: usize,
    },
}

/// Receives [`LiveArrayChange`] notifications.
///
/// Listeners are held weakly; a dropped listener is pruned on the next notification.
/// Notifications are delivered synchronously on the thread that mutated the array.
pub trait LiveArrayListener {
    /// Called after `change` has been applied to `array`.
    fn live_array_changed(&self, array: &LiveArray, change: LiveArrayChange);
}

/// An array whose contents can change after a document is inflated.
#[derive(Default)]
pub struct LiveArray {
    items: RefCell<Vec<Object>>,
    listeners: RefCell<Vec<Weak<dyn LiveArrayListener>>>,
}

impl fmt::Debug for LiveArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveArray")
            .field("items", &self.items.borrow())
            .field("listeners", &self.listeners.borrow().len())
            .finish()
    }
}

impl LiveArray {
    /// Creates a shared live array with initial contents.
    #[must_use]
    pub fn new(items: Vec<Object>) -> Rc<Self> {
        Rc::new(Self {
            items: RefCell::new(items),
            listeners: RefCell::new(Vec::new()),
        })
    }

    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    /// Returns `true` if there are no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    /// The item at `index`.
    #[must_use]
    pub fn at(&self, index: usize) -> Option<Object> {
        self.items.borrow().get(index).cloned()
    }

    /// A copy of the current items.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Object> {
        self.items.borrow().clone()
    }

    /// Registers a listener.
    pub fn add_listener(&self, listener: Weak<dyn LiveArrayListener>) {
        self.listeners.borrow_mut().push(listener);
    }

    /// Appends an item.
    pub fn push(&self, item: Object) {
        let index = {
            let mut items = self.items.borrow_mut();
            items.push(item);
            items.len() - 1
        };
        self.notify(LiveArrayChange::Inserted { index, count: 1 });
    }

    /// Inserts an item at `index`. Returns `false` if `index` is past the end.
    pub fn insert(&self, index: usize, item: Object) -> bool {
        {
            let mut items = self.items.borrow_mut();
            if index > items.len() {
                return false;
            }
            items.insert(index, item);
        }
        self.notify(LiveArrayChange::Inserted { index, count: 1 });
        true
    }

    /// Removes the item at `index`.
    pub fn remove(&self, index: usize) -> Option<Object> {
        let removed = {
            let mut items = self.items.borrow_mut();
            if index >= items.len() {
                return None;
            }
            items.remove(index)
        };
        self.notify(LiveArrayChange::Removed { index, count: 1 });
        Some(removed)
    }

    /// Replaces the item at `index`. Returns `false` if out of range.
    pub fn update(&self, index: usize, item: Object) -> bool {
        {
            let mut items = self.items.borrow_mut();
            let Some(slot) = items.get_mut(index) else {
                return false;
            };
            *slot = item;
        }
        self.notify(LiveArrayChange::Updated { index });
        true
    }

    fn notify(&self, change: LiveArrayChange) {
        let live: Vec<Rc<dyn LiveArrayListener>> = {
            let mut listeners = self.listeners.borrow_mut();
            listeners.retain(|l| l.strong_count() > 0);
            listeners.iter().filter_map(Weak::upgrade).collect()
        };
        tracing::debug!(?change, listeners = live.len(), "live array changed");
        for listener in live {
            listener.live_array_changed(self, change);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder(RefCell<Vec<LiveArrayChange>>);

    impl LiveArrayListener for Recorder {
        fn live_array_changed(&self, _array: &LiveArray, change: LiveArrayChange) {
            self.0.borrow_mut().push(change);
        }
    }

    #[test]
    fn listeners_see_each_change() {
        let array = LiveArray::new(vec![Object::from(1)]);
        let recorder = Rc::new(Recorder::default());
        let weak: Weak<dyn LiveArrayListener> = Rc::downgrade(&recorder) as Weak<dyn LiveArrayListener>;
        array.add_listener(weak);

        array.push(Object::from(2));
        assert!(array.insert(0, Object::from(0)));
        assert!(array.update(2, Object::from(20)));
        assert_eq!(array.remove(1), Some(Object::from(1)));
        assert!(!array.insert(9, Object::Null), "insert past the end is refused");

        assert_eq!(array.snapshot(), vec![Object::from(0), Object::from(20)]);
        assert_eq!(
            *recorder.0.borrow(),
            vec![
                LiveArrayChange::Inserted { index: 1, count: 1 },
                LiveArrayChange::Inserted { index: 0, count: 1 },
                LiveArrayChange::Updated { index: 2 },
                LiveArrayChange::Removed { index: 1, count: 1 },
            ]
        );
    }

    #[test]
    fn dropped_listeners_are_pruned() {
        let array = LiveArray::new(Vec::new());
        {
            let recorder = Rc::new(Recorder::default());
            array.add_listener(Rc::downgrade(&recorder) as Weak<dyn LiveArrayListener>);
        }
        array.push(Object::Null);
        assert_eq!(array.listeners.borrow().len(), 0);
    }
}
