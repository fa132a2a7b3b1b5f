//! Shared process variable.
//!
//! A `SharedPv` owns one named piece of process state and the sets of
//! channels, put/RPC objects and monitors attached to it. Every mutation of
//! those sets, of the type and of the current value happens under the single
//! state lock. Client callbacks are never made while it is held: values are
//! captured under the lock and the callbacks issued after release.
//!
//! Strong references upgraded under the lock must outlive the guard. Their
//! `Drop` impls re-acquire the same (non-reentrant) lock.

use crate::channel::SharedChannel;
use crate::error::{PvasError, PvasResult};
use crate::monitor::SharedMonitorFifo;
use crate::operation::Operation;
use crate::put::{SharedPut, SharedRpc};
use crate::requester::{ConnectionState, GetFieldRequester};
use parking_lot::{Mutex, MutexGuard};
use pvas_common::consts::{
    DEFAULT_MONITOR_QUEUE_SIZE, MIN_MONITOR_QUEUE_SIZE, PUT_NOT_SUPPORTED_MSG,
    RPC_NOT_IMPLEMENTED_MSG,
};
use pvas_common::pvdata::{ChangeMask, PvStructure, Status, Structure};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info};

/// Application hooks of a shared PV.
///
/// All methods are called without the PV lock held, so they may attach
/// channels, post values or complete operations.
pub trait SharedPvHandler: Send + Sync {
    /// The channel set went from empty to non-empty.
    fn on_first_connect(&self, _pv: &Arc<SharedPv>) {}

    /// The channel set went from non-empty to empty.
    fn on_last_disconnect(&self, _pv: &Arc<SharedPv>) {}

    /// A client put. Default: reject.
    fn on_put(&self, _pv: &Arc<SharedPv>, op: Operation) {
        op.complete_with(Status::error(PUT_NOT_SUPPORTED_MSG));
    }

    /// A client RPC. Default: reject.
    fn on_rpc(&self, _pv: &Arc<SharedPv>, op: Operation) {
        op.complete_with(Status::error(RPC_NOT_IMPLEMENTED_MSG));
    }
}

/// Accepts every put by posting the new value.
#[derive(Debug, Default)]
pub struct MailboxHandler;

impl SharedPvHandler for MailboxHandler {
    fn on_put(&self, pv: &Arc<SharedPv>, op: Operation) {
        let (Some(value), Some(changed)) = (op.value(), op.changed()) else {
            return;
        };
        match pv.post(value, changed) {
            Ok(()) => op.complete(),
            Err(e) => op.complete_with(Status::error(e.to_string())),
        }
    }
}

/// Rejects puts and RPCs with the default statuses.
#[derive(Debug, Default)]
pub struct ReadOnlyHandler;

impl SharedPvHandler for ReadOnlyHandler {}

/// State guarded by the PV lock.
pub(crate) struct PvState {
    pub(crate) handler: Option<Arc<dyn SharedPvHandler>>,
    pub(crate) structure: Option<Arc<Structure>>,
    pub(crate) current: Option<PvStructure>,
    pub(crate) valid: ChangeMask,
    pub(crate) channels: HashMap<u64, Weak<SharedChannel>>,
    pub(crate) puts: HashMap<u64, Weak<SharedPut>>,
    pub(crate) rpcs: HashMap<u64, Weak<SharedRpc>>,
    pub(crate) monitors: HashMap<u64, Weak<SharedMonitorFifo>>,
    pub(crate) getfields: Vec<Arc<dyn GetFieldRequester>>,
}

/// One shared process variable.
pub struct SharedPv {
    name: String,
    state: Mutex<PvState>,
    next_id: AtomicU64,
    debug_lvl: AtomicI32,
    monitor_queue_size: AtomicUsize,
}

impl SharedPv {
    /// Create a closed PV with an optional handler.
    pub fn new(name: impl Into<String>, handler: Option<Arc<dyn SharedPvHandler>>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            state: Mutex::new(PvState {
                handler,
                structure: None,
                current: None,
                valid: ChangeMask::new(),
                channels: HashMap::new(),
                puts: HashMap::new(),
                rpcs: HashMap::new(),
                monitors: HashMap::new(),
                getfields: Vec::new(),
            }),
            next_id: AtomicU64::new(1),
            debug_lvl: AtomicI32::new(0),
            monitor_queue_size: AtomicUsize::new(DEFAULT_MONITOR_QUEUE_SIZE),
        })
    }

    /// PV whose puts overwrite the current value.
    pub fn build_mailbox(name: impl Into<String>) -> Arc<Self> {
        Self::new(name, Some(Arc::new(MailboxHandler)))
    }

    /// PV that rejects puts and RPCs.
    pub fn build_read_only(name: impl Into<String>) -> Arc<Self> {
        Self::new(name, Some(Arc::new(ReadOnlyHandler)))
    }

    /// Name given at construction (diagnostics only).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, PvState> {
        self.state.lock()
    }

    pub(crate) fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Replace the handler. Returns the previous one.
    pub fn set_handler(
        &self,
        handler: Option<Arc<dyn SharedPvHandler>>,
    ) -> Option<Arc<dyn SharedPvHandler>> {
        std::mem::replace(&mut self.lock().handler, handler)
    }

    /// Diagnostic level. Above 5 channel open/close is logged.
    pub fn debug(&self) -> i32 {
        self.debug_lvl.load(Ordering::Relaxed)
    }

    /// Set the diagnostic level; applies to channels and operations created afterwards.
    pub fn set_debug(&self, level: i32) {
        self.debug_lvl.store(level, Ordering::Relaxed);
    }

    /// Queue depth for monitors whose request does not specify one.
    pub fn monitor_queue_size(&self) -> usize {
        self.monitor_queue_size.load(Ordering::Relaxed)
    }

    /// Set the default monitor queue depth (clamped to the minimum).
    pub fn set_monitor_queue_size(&self, size: usize) {
        self.monitor_queue_size
            .store(size.max(MIN_MONITOR_QUEUE_SIZE), Ordering::Relaxed);
    }

    /// Whether a type is known.
    pub fn is_open(&self) -> bool {
        self.lock().structure.is_some()
    }

    /// Current type descriptor.
    pub fn current_type(&self) -> Option<Arc<Structure>> {
        self.lock().structure.clone()
    }

    /// Snapshot of the current value and its valid mask.
    pub fn fetch(&self) -> Option<(PvStructure, ChangeMask)> {
        let st = self.lock();
        st.current.as_ref().map(|v| (v.clone(), st.valid.clone()))
    }

    /// Fresh default value of the current type.
    pub fn build(&self) -> Option<PvStructure> {
        self.current_type().map(PvStructure::new)
    }

    /// Number of attached channels.
    pub fn num_channels(&self) -> usize {
        self.lock().channels.len()
    }

    /// Number of attached monitors.
    pub fn num_monitors(&self) -> usize {
        self.lock().monitors.len()
    }

    /// Number of attached put and RPC objects.
    pub fn num_operations(&self) -> (usize, usize) {
        let st = self.lock();
        (st.puts.len(), st.rpcs.len())
    }

    /// Give the PV its type and initial value.
    ///
    /// Dormant monitors are opened and receive the initial value, queued
    /// field requests are answered and put/RPC objects are connected.
    ///
    /// # Errors
    /// `AlreadyOpen` if the PV already has a type.
    pub fn open(self: &Arc<Self>, value: &PvStructure, valid: &ChangeMask) -> PvasResult<()> {
        let structure = value.structure().clone();
        let field_reqs: Vec<Arc<dyn GetFieldRequester>>;
        let mut puts = Vec::new();
        let mut rpcs = Vec::new();
        let mut monitors = Vec::new();
        {
            let mut st = self.lock();
            if st.structure.is_some() {
                return Err(PvasError::AlreadyOpen {
                    name: self.name.clone(),
                });
            }
            st.structure = Some(structure.clone());
            st.current = Some(value.clone());
            st.valid = valid.clone();

            field_reqs = std::mem::take(&mut st.getfields);
            puts.extend(st.puts.values().filter_map(Weak::upgrade));
            rpcs.extend(st.rpcs.values().filter_map(Weak::upgrade));
            for monitor in st.monitors.values().filter_map(Weak::upgrade) {
                monitor.open(structure.clone());
                monitor.post(value, valid);
                monitors.push(monitor);
            }
        }
        info!(pv = %self.name, type_id = structure.id(), "PV opened");

        for req in field_reqs {
            req.get_done(Status::ok(), Some(structure.clone()));
        }
        for put in &puts {
            if let Some(req) = put.requester() {
                req.channel_put_connect(Status::ok(), put, Some(structure.clone()));
            }
        }
        for rpc in &rpcs {
            if let Some(req) = rpc.requester() {
                req.channel_rpc_connect(Status::ok(), rpc);
            }
        }
        for monitor in &monitors {
            monitor.notify();
        }
        Ok(())
    }

    /// Open with every field marked valid.
    pub fn open_all(self: &Arc<Self>, value: &PvStructure) -> PvasResult<()> {
        self.open(value, &ChangeMask::all(value.structure()))
    }

    /// Merge `changed` fields of `value` into the current value and post to monitors.
    ///
    /// # Errors
    /// `NotOpen` if the PV has no type, `PvData` if `value` has another type.
    pub fn post(self: &Arc<Self>, value: &PvStructure, changed: &ChangeMask) -> PvasResult<()> {
        let mut monitors = Vec::new();
        {
            let mut st = self.lock();
            let PvState {
                current,
                valid,
                monitors: attached,
                ..
            } = &mut *st;
            let current = current.as_mut().ok_or_else(|| PvasError::NotOpen {
                name: self.name.clone(),
            })?;
            current.copy_changed(value, changed)?;
            valid.or_assign(changed);

            for monitor in attached.values().filter_map(Weak::upgrade) {
                monitor.post(current, changed);
                monitors.push(monitor);
            }
        }
        for monitor in &monitors {
            monitor.notify();
        }
        Ok(())
    }

    /// Drop the type and value and disconnect attached clients.
    ///
    /// Attachments stay registered, so a later `open()` reconnects them.
    /// Returns whether the PV was open.
    pub fn close(self: &Arc<Self>) -> bool {
        let mut channels = Vec::new();
        let mut puts = Vec::new();
        let mut rpcs = Vec::new();
        let mut monitors = Vec::new();
        {
            let mut st = self.lock();
            if st.structure.take().is_none() {
                return false;
            }
            st.current = None;
            st.valid.clear_all();

            channels.extend(st.channels.values().filter_map(Weak::upgrade));
            puts.extend(st.puts.values().filter_map(Weak::upgrade));
            rpcs.extend(st.rpcs.values().filter_map(Weak::upgrade));
            for monitor in st.monitors.values().filter_map(Weak::upgrade) {
                monitor.close_queue();
                monitors.push(monitor);
            }
        }
        info!(pv = %self.name, channels = channels.len(), "PV closed");

        for channel in &channels {
            if let Some(req) = channel.requester() {
                req.channel_state_change(channel, ConnectionState::Disconnected);
            }
        }
        for put in &puts {
            if let Some(req) = put.requester() {
                req.channel_disconnect(put);
            }
        }
        for rpc in &rpcs {
            if let Some(req) = rpc.requester() {
                req.channel_disconnect(rpc);
            }
        }
        for monitor in &monitors {
            monitor.notify();
        }
        true
    }
}

impl Drop for SharedPv {
    fn drop(&mut self) {
        debug!(pv = %self.name, "SharedPv released");
    }
}

impl std::fmt::Debug for SharedPv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedPv")
            .field("name", &self.name)
            .field("debug", &self.debug())
            .finish_non_exhaustive()
    }
}
