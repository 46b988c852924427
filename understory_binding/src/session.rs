// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Developer-facing console sink.

use core::cell::RefCell;

/// Collects console messages about recoverable document problems.
///
/// Every message is also emitted through `tracing` at `WARN` level under the
/// `understory::console` target.
#[derive(Debug, Default)]
pub struct Session {
    messages: RefCell<Vec<String>>,
}

impl Session {
    /// Creates an empty session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a message.
    pub fn console(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(target: "understory::console", "{message}");
        self.messages.borrow_mut().push(message);
    }

    /// Records a message prefixed with the document path it concerns.
    pub fn console_at(&self, path: &str, message: impl AsRef<str>) {
        if path.is_empty() {
            self.console(message.as_ref());
        } else {
            self.console(format!("{path}: {}", message.as_ref()));
        }
    }

    /// A copy of every recorded message.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.messages.borrow().clone()
    }

    /// Removes and returns every recorded message.
    pub fn take_messages(&self) -> Vec<String> {
        core::mem::take(&mut *self.messages.borrow_mut())
    }

    /// Returns `true` if some recorded message contains `needle`.
    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.messages.borrow().iter().any(|m| m.contains(needle))
    }

    /// Returns `true` if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.borrow().is_empty()
    }

    /// Number of recorded messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_drains() {
        let session = Session::new();
        session.console("plain");
        session.console_at("_main/items/0", "Missing required property 'text'");
        assert_eq!(session.len(), 2);
        assert!(session.contains("_main/items/0: Missing"));
        assert_eq!(session.take_messages().len(), 2);
        assert!(session.is_empty());
    }
}
