//! Asynchronous operation handles.
//!
//! An [`Operation`] is a cloneable handle over one [`OperationImpl`]. Every
//! operation reaches exactly one terminal notification:
//!
//! - an explicit `complete*` call, or
//! - implicit cancellation when the last handle is released while still pending.
//!
//! All completion paths funnel through one place that flips the done flag
//! under the per-operation lock, so at most one of them delivers. The
//! per-operation lock is independent of the PV lock.

use crate::channel::SharedChannel;
use crate::requester::Requester;
use parking_lot::Mutex;
use pvas_common::consts::IMPLICIT_CANCEL_MSG;
use pvas_common::pvdata::{ChangeMask, MessageType, PvStructure, Status};
use std::sync::Arc;
use tracing::trace;

#[derive(Debug)]
struct OpState {
    done: bool,
    debug_lvl: i32,
}

/// State common to every operation implementation.
#[derive(Debug)]
pub struct OperationCore {
    pv_request: PvStructure,
    value: PvStructure,
    changed: ChangeMask,
    state: Mutex<OpState>,
}

impl OperationCore {
    /// New pending operation state.
    pub fn new(
        pv_request: PvStructure,
        value: PvStructure,
        changed: ChangeMask,
        debug_lvl: i32,
    ) -> Self {
        Self {
            pv_request,
            value,
            changed,
            state: Mutex::new(OpState {
                done: false,
                debug_lvl,
            }),
        }
    }

    /// Client request descriptor.
    pub fn pv_request(&self) -> &PvStructure {
        &self.pv_request
    }

    /// Value carried by the operation (put value or RPC arguments).
    pub fn value(&self) -> &PvStructure {
        &self.value
    }

    /// Fields of `value` the client set.
    pub fn changed(&self) -> &ChangeMask {
        &self.changed
    }

    /// Whether a terminal notification was delivered.
    pub fn is_done(&self) -> bool {
        self.state.lock().done
    }

    /// Diagnostic level.
    pub fn debug_level(&self) -> i32 {
        self.state.lock().debug_lvl
    }

    /// Flip pending → completed. Returns `false` if already completed.
    fn mark_done(&self) -> bool {
        let mut st = self.state.lock();
        !std::mem::replace(&mut st.done, true)
    }
}

/// Execution context behind an [`Operation`].
pub trait OperationImpl: Send + Sync {
    /// Shared state.
    fn core(&self) -> &OperationCore;

    /// Channel the operation runs on, if still alive.
    fn channel(&self) -> Option<Arc<SharedChannel>>;

    /// Requester to notify, if still alive.
    fn requester(&self) -> Option<Arc<dyn Requester>>;

    /// Deliver the terminal notification. Called at most once.
    ///
    /// `value` is only borrowed for the duration of the call.
    fn deliver(&self, status: Status, value: Option<&PvStructure>);
}

/// Sole owner of an implementation; completes it on release if still pending.
struct ImplOwner {
    imp: Box<dyn OperationImpl>,
}

impl ImplOwner {
    fn finish(&self, status: Status, value: Option<&PvStructure>) {
        if self.imp.core().mark_done() {
            self.imp.deliver(status, value);
        } else {
            trace!(%status, "Operation already complete");
        }
    }
}

impl Drop for ImplOwner {
    fn drop(&mut self) {
        if !self.imp.core().is_done() {
            self.finish(Status::error(IMPLICIT_CANCEL_MSG), None);
        }
    }
}

/// Handle to a pending or completed operation.
///
/// Clones share the implementation; the default handle owns none.
#[derive(Clone, Default)]
pub struct Operation {
    imp: Option<Arc<ImplOwner>>,
}

impl Operation {
    /// Wrap an implementation.
    pub fn new(imp: impl OperationImpl + 'static) -> Self {
        Self {
            imp: Some(Arc::new(ImplOwner { imp: Box::new(imp) })),
        }
    }

    fn core(&self) -> Option<&OperationCore> {
        self.imp.as_ref().map(|o| o.imp.core())
    }

    /// Client request descriptor.
    pub fn pv_request(&self) -> Option<&PvStructure> {
        self.core().map(OperationCore::pv_request)
    }

    /// Put value or RPC arguments.
    pub fn value(&self) -> Option<&PvStructure> {
        self.core().map(OperationCore::value)
    }

    /// Fields of the value set by the client.
    pub fn changed(&self) -> Option<&ChangeMask> {
        self.core().map(OperationCore::changed)
    }

    /// Name of the channel, empty if it is gone.
    pub fn channel_name(&self) -> String {
        self.channel()
            .map(|c| c.channel_name().to_string())
            .unwrap_or_default()
    }

    /// Complete successfully.
    pub fn complete(&self) {
        self.finish(Status::ok(), None);
    }

    /// Complete with the given status.
    pub fn complete_with(&self, status: Status) {
        self.finish(status, None);
    }

    /// Complete successfully with a result value.
    ///
    /// Neither argument is retained; the implementation copies what it needs.
    pub fn complete_value(&self, value: &PvStructure, _changed: &ChangeMask) {
        self.finish(Status::ok(), Some(value));
    }

    fn finish(&self, status: Status, value: Option<&PvStructure>) {
        match &self.imp {
            Some(owner) => owner.finish(status, value),
            None => trace!("complete() on empty operation handle"),
        }
    }

    /// Send an informational message to the requester, if still alive.
    pub fn info(&self, msg: &str) {
        self.message(msg, MessageType::Info);
    }

    /// Send a warning to the requester, if still alive.
    pub fn warn(&self, msg: &str) {
        self.message(msg, MessageType::Warning);
    }

    fn message(&self, msg: &str, kind: MessageType) {
        if let Some(requester) = self.requester() {
            requester.message(msg, kind);
        }
    }

    /// Diagnostic level; 0 for an empty handle.
    pub fn is_debug(&self) -> i32 {
        self.core().map_or(0, OperationCore::debug_level)
    }

    /// Whether a terminal notification was delivered.
    pub fn is_done(&self) -> bool {
        self.core().is_some_and(OperationCore::is_done)
    }

    /// Channel the operation runs on.
    pub fn channel(&self) -> Option<Arc<SharedChannel>> {
        self.imp.as_ref().and_then(|o| o.imp.channel())
    }

    /// Requester of the operation.
    pub fn requester(&self) -> Option<Arc<dyn Requester>> {
        self.imp.as_ref().and_then(|o| o.imp.requester())
    }

    /// Whether the handle owns an implementation.
    pub fn valid(&self) -> bool {
        self.imp.is_some()
    }
}

impl std::fmt::Debug for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operation")
            .field("valid", &self.valid())
            .field("done", &self.is_done())
            .finish()
    }
}
