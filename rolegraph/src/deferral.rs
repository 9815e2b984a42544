// SPDX-License-Identifier: MIT OR Apache-2.0

//! Postpone closure updates during bulk changes.
//!
//! Reconciling the closure after every single edge mutation is wasteful when many edges change in
//! a row. Inside a deferral scope lifecycle operations only remember that the closure is out of
//! date, the scope then reconciles it once when it is left.
//!
//! The scope is bound to the current tokio task, other tasks keep updating the closure
//! immediately. Scopes can be nested, only leaving the outermost one triggers the update.
use std::cell::RefCell;

tokio::task_local! {
    static DEFERRAL: RefCell<DeferralState>;
}

/// Depth of nested deferral scopes and whether an update was requested within them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeferralState {
    depth: usize,
    pending: bool,
}

impl DeferralState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a (possibly nested) scope.
    pub fn enter(&mut self) {
        self.depth += 1;
    }

    /// Leave a scope.
    ///
    /// Returns `true` if this was the outermost scope and an update was requested while it was
    /// active. The pending flag is cleared in that case, the caller is expected to run the update.
    pub fn exit(&mut self) -> bool {
        self.depth = self.depth.saturating_sub(1);
        if self.depth == 0 && self.pending {
            self.pending = false;
            return true;
        }
        false
    }

    /// Remember that the closure needs to be updated.
    ///
    /// Returns `false` if no scope is active and the caller needs to run the update immediately.
    pub fn request_recompute(&mut self) -> bool {
        if self.is_deferring() {
            self.pending = true;
        }
        self.is_deferring()
    }

    pub fn is_deferring(&self) -> bool {
        self.depth > 0
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }
}

/// Returns `true` if the current task is inside a deferral scope.
pub fn is_deferring() -> bool {
    DEFERRAL
        .try_with(|state| state.borrow().is_deferring())
        .unwrap_or(false)
}

/// Request a closure update within the current task.
///
/// Returns `false` if the task is not deferring and the update needs to happen right away.
pub(crate) fn request_recompute() -> bool {
    DEFERRAL
        .try_with(|state| state.borrow_mut().request_recompute())
        .unwrap_or(false)
}

/// Depth of one entered scope, given back when the scope is left or its future is dropped.
struct ScopeGuard {
    entered: bool,
}

impl ScopeGuard {
    fn enter() -> Self {
        DEFERRAL.with(|state| state.borrow_mut().enter());
        Self { entered: true }
    }

    fn exit(mut self) -> bool {
        self.entered = false;
        DEFERRAL.with(|state| state.borrow_mut().exit())
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        if self.entered {
            // A cancelled inner scope keeps the pending update for the outer one.
            let _ = DEFERRAL.try_with(|state| state.borrow_mut().exit());
        }
    }
}

/// Run the future inside a deferral scope.
///
/// Returns the output of the future and whether the closure needs to be updated now, which is
/// only ever the case for the outermost scope.
pub(crate) async fn scope<F>(future: F) -> (F::Output, bool)
where
    F: Future,
{
    if DEFERRAL.try_with(|_| ()).is_ok() {
        // Nested scope, re-use the state of the outer one.
        let guard = ScopeGuard::enter();
        let output = future.await;
        return (output, guard.exit());
    }

    DEFERRAL
        .scope(RefCell::new(DeferralState::new()), async move {
            let guard = ScopeGuard::enter();
            let output = future.await;
            (output, guard.exit())
        })
        .await
}
