use std::{cell::Cell, rc::Rc};

use crate::foundation::error::{VitrineError, VitrineResult};

/// A node in a parent-linked tree of cooperative cancellation signals.
///
/// A scope is cancelled when it, or any scope it was derived from, is cancelled. Scopes are
/// cheap `Rc` handles; cloning shares the same signal. [`CancellationScope::never`] is a scope
/// that can never be cancelled and carries no allocation.
///
/// Cancellation never interrupts anything: work calls [`CancellationScope::checkpoint`] at its
/// suspension points and before committing side effects.
#[derive(Clone, Default)]
pub struct CancellationScope {
    node: Option<Rc<ScopeNode>>,
}

struct ScopeNode {
    cancelled: Cell<bool>,
    parents: Vec<Rc<ScopeNode>>,
}

impl ScopeNode {
    fn is_cancelled(&self) -> bool {
        self.cancelled.get() || self.parents.iter().any(|p| p.is_cancelled())
    }
}

impl CancellationScope {
    /// A fresh root scope that can be cancelled.
    pub fn new() -> Self {
        Self::with_parents(Vec::new())
    }

    /// A scope that is never cancelled.
    pub fn never() -> Self {
        Self { node: None }
    }

    fn with_parents(parents: Vec<Rc<ScopeNode>>) -> Self {
        Self {
            node: Some(Rc::new(ScopeNode {
                cancelled: Cell::new(false),
                parents,
            })),
        }
    }

    /// A scope cancelled by its own [`cancel`](Self::cancel) or by any cancellation of `self`.
    pub fn child(&self) -> Self {
        Self::with_parents(self.node.iter().cloned().collect())
    }

    /// Scope cancelled when either input is. When only one input can ever be cancelled it is
    /// returned as is.
    pub fn merge(root: &Self, caller: &Self) -> Self {
        match (&root.node, &caller.node) {
            (Some(a), Some(b)) if Rc::ptr_eq(a, b) => root.clone(),
            (Some(a), Some(b)) => Self::with_parents(vec![a.clone(), b.clone()]),
            (Some(_), None) => root.clone(),
            (None, _) => caller.clone(),
        }
    }

    /// Cancel this scope and every scope derived from it. A no-op on [`never`](Self::never).
    pub fn cancel(&self) {
        if let Some(node) = &self.node {
            node.cancelled.set(true);
        }
    }

    /// Whether this scope or any ancestor has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.node.as_ref().is_some_and(|n| n.is_cancelled())
    }

    /// False only for [`never`](Self::never).
    pub fn can_be_cancelled(&self) -> bool {
        self.node.is_some()
    }

    /// `Err(Cancelled)` once the scope is cancelled.
    pub fn checkpoint(&self) -> VitrineResult<()> {
        if self.is_cancelled() {
            Err(VitrineError::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl std::fmt::Debug for CancellationScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationScope")
            .field("cancellable", &self.can_be_cancelled())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/runtime/cancel.rs"]
mod tests;
