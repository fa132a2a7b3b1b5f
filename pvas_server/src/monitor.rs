//! Monitor update queues.
//!
//! [`MonitorFifo`] is a bounded queue of value updates. When full, the newest
//! element absorbs further updates: its value takes the changed fields, its
//! change mask is widened and fields changed more than once are recorded in
//! the overrun mask.
//!
//! [`SharedMonitorFifo`] binds a queue to the channel that created it and
//! deregisters from the PV's monitor set on drop. Posting happens under the
//! PV lock (lock order: PV state, then queue); notifications to the requester
//! happen after both are released.

use crate::channel::SharedChannel;
use crate::requester::MonitorRequester;
use parking_lot::Mutex;
use pvas_common::consts::{MIN_MONITOR_QUEUE_SIZE, QUEUE_SIZE_FIELD};
use pvas_common::pvdata::{ChangeMask, PvStructure, ScalarValue, Status, Structure};
use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use tracing::{trace, warn};

/// One queued update.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorElement {
    /// Value snapshot
    pub value: PvStructure,
    /// Fields changed since the previous element
    pub changed: ChangeMask,
    /// Fields changed more than once while the queue was full
    pub overrun: ChangeMask,
}

#[derive(Debug, Default)]
struct FifoState {
    structure: Option<Arc<Structure>>,
    queue: VecDeque<MonitorElement>,
    running: bool,
    need_connect: bool,
    need_unlisten: bool,
}

/// Callbacks owed to the requester, collected under the queue lock.
#[derive(Debug, Default)]
struct Pending {
    connect: Option<Arc<Structure>>,
    event: bool,
    unlisten: bool,
}

/// Bounded update queue.
#[derive(Debug)]
pub struct MonitorFifo {
    capacity: usize,
    state: Mutex<FifoState>,
}

impl MonitorFifo {
    /// Create a closed queue holding at most `capacity` elements.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(MIN_MONITOR_QUEUE_SIZE),
            state: Mutex::new(FifoState::default()),
        }
    }

    /// Queue depth requested by a client, if any.
    pub fn requested_capacity(pv_request: &PvStructure) -> Option<usize> {
        match pv_request.get(QUEUE_SIZE_FIELD) {
            Some(ScalarValue::Int(n)) if *n > 0 => Some(*n as usize),
            _ => None,
        }
    }

    /// Maximum number of queued elements.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Open against a type. Discards anything queued from a previous type.
    pub fn open(&self, structure: Arc<Structure>) {
        let mut st = self.state.lock();
        st.queue.clear();
        st.structure = Some(structure);
        st.need_connect = true;
        st.need_unlisten = false;
    }

    /// Whether the queue has a type.
    pub fn is_open(&self) -> bool {
        self.state.lock().structure.is_some()
    }

    /// Close; the requester is told to unlisten on the next notify.
    pub fn close(&self) {
        let mut st = self.state.lock();
        st.structure = None;
        st.queue.clear();
        st.need_connect = false;
        st.need_unlisten = true;
    }

    /// Queue an update.
    ///
    /// Returns `true` if a new element was queued, `false` if the update was
    /// squashed into the newest element or dropped because the queue is closed.
    pub fn post(&self, value: &PvStructure, changed: &ChangeMask) -> bool {
        let mut st = self.state.lock();
        if st.structure.is_none() {
            return false;
        }
        if st.queue.len() < self.capacity {
            st.queue.push_back(MonitorElement {
                value: value.clone(),
                changed: changed.clone(),
                overrun: ChangeMask::new(),
            });
            return true;
        }

        let Some(last) = st.queue.back_mut() else {
            return false;
        };
        for bit in changed.iter() {
            if last.changed.get(bit) {
                last.overrun.set(bit);
            }
        }
        if let Err(e) = last.value.copy_changed(value, changed) {
            warn!("Monitor squash failed: {e}");
        }
        last.changed.or_assign(changed);
        false
    }

    /// Begin delivering events.
    pub fn start(&self) {
        self.state.lock().running = true;
    }

    /// Stop delivering events. Queued elements are kept.
    pub fn stop(&self) {
        self.state.lock().running = false;
    }

    /// Take the oldest element.
    pub fn poll(&self) -> Option<MonitorElement> {
        self.state.lock().queue.pop_front()
    }

    /// Number of queued elements.
    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn take_pending(&self) -> Pending {
        let mut st = self.state.lock();
        let connect = if st.need_connect {
            st.need_connect = false;
            st.structure.clone()
        } else {
            None
        };
        Pending {
            connect,
            event: st.running && !st.queue.is_empty(),
            unlisten: std::mem::take(&mut st.need_unlisten),
        }
    }
}

/// Monitor queue owned by a channel.
pub struct SharedMonitorFifo {
    id: u64,
    fifo: MonitorFifo,
    channel: Arc<SharedChannel>,
    requester: Weak<dyn MonitorRequester>,
}

impl SharedMonitorFifo {
    pub(crate) fn new(
        channel: Arc<SharedChannel>,
        requester: &Arc<dyn MonitorRequester>,
        pv_request: &PvStructure,
    ) -> Arc<Self> {
        let capacity = MonitorFifo::requested_capacity(pv_request)
            .unwrap_or_else(|| channel.owner().monitor_queue_size());
        Arc::new(Self {
            id: channel.owner().next_id(),
            fifo: MonitorFifo::new(capacity),
            channel,
            requester: Arc::downgrade(requester),
        })
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn open(&self, structure: Arc<Structure>) {
        self.fifo.open(structure);
    }

    pub(crate) fn post(&self, value: &PvStructure, changed: &ChangeMask) -> bool {
        self.fifo.post(value, changed)
    }

    pub(crate) fn close_queue(&self) {
        self.fifo.close();
    }

    /// Deliver owed callbacks: connect, data available, unlisten.
    ///
    /// Must not be called with the PV lock held.
    pub fn notify(self: &Arc<Self>) {
        let pending = self.fifo.take_pending();
        let Some(requester) = self.requester.upgrade() else {
            trace!(channel = %self.channel.channel_name(), "Monitor requester defunct");
            return;
        };
        if let Some(structure) = pending.connect {
            requester.monitor_connect(Status::ok(), self, structure);
        }
        if pending.event {
            requester.monitor_event(self);
        }
        if pending.unlisten {
            requester.unlisten(self);
        }
    }

    /// Start delivery; notifies at once if updates are already queued.
    pub fn start(self: &Arc<Self>) {
        self.fifo.start();
        self.notify();
    }

    /// Stop delivery.
    pub fn stop(&self) {
        self.fifo.stop();
    }

    /// Take the oldest update.
    pub fn poll(&self) -> Option<MonitorElement> {
        self.fifo.poll()
    }

    /// Number of queued updates.
    pub fn len(&self) -> usize {
        self.fifo.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.fifo.is_empty()
    }

    /// Queue depth.
    pub fn capacity(&self) -> usize {
        self.fifo.capacity()
    }

    /// Owning channel.
    pub fn channel(&self) -> &Arc<SharedChannel> {
        &self.channel
    }

    /// Monitor requester, if still alive.
    pub fn requester(&self) -> Option<Arc<dyn MonitorRequester>> {
        self.requester.upgrade()
    }
}

impl Drop for SharedMonitorFifo {
    fn drop(&mut self) {
        self.channel.owner().lock().monitors.remove(&self.id);
    }
}

impl std::fmt::Debug for SharedMonitorFifo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedMonitorFifo")
            .field("id", &self.id)
            .field("channel", &self.channel.channel_name())
            .field("fifo", &self.fifo)
            .finish_non_exhaustive()
    }
}
