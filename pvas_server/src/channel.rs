//! Per-client channel bound to a shared PV.
//!
//! A channel registers itself into its PV's channel set on construction and
//! removes itself on drop. The PV handler's `on_first_connect` and
//! `on_last_disconnect` hooks fire on the empty/non-empty transitions of that
//! set; whether a transition happened is decided under the PV lock, the hook
//! itself runs after release.

use crate::monitor::SharedMonitorFifo;
use crate::provider::ChannelProvider;
use crate::put::{SharedPut, SharedRpc};
use crate::requester::{
    ChannelPutRequester, ChannelRequester, ChannelRpcRequester, GetFieldRequester,
    MonitorRequester,
};
use crate::shared_pv::SharedPv;
use pvas_common::consts::CHANNEL_TRACE_DEBUG_LEVEL;
use pvas_common::pvdata::{PvStructure, Status};
use std::sync::{Arc, Weak};
use tracing::debug;

/// One client's binding to a [`SharedPv`].
pub struct SharedChannel {
    id: u64,
    owner: Arc<SharedPv>,
    channel_name: String,
    requester: Weak<dyn ChannelRequester>,
    provider: Weak<dyn ChannelProvider>,
}

impl SharedChannel {
    /// Attach a new channel to `owner`.
    ///
    /// Fires the PV handler's `on_first_connect` if this is the only channel.
    pub fn new(
        owner: Arc<SharedPv>,
        provider: Weak<dyn ChannelProvider>,
        channel_name: impl Into<String>,
        requester: &Arc<dyn ChannelRequester>,
    ) -> Arc<Self> {
        let channel = Arc::new(Self {
            id: owner.next_id(),
            owner,
            channel_name: channel_name.into(),
            requester: Arc::downgrade(requester),
            provider,
        });

        if channel.owner.debug() > CHANNEL_TRACE_DEBUG_LEVEL {
            debug!(
                requester = %requester.requester_name(),
                channel = %channel.channel_name,
                id = channel.id,
                "Open channel"
            );
        }

        let handler = {
            let mut st = channel.owner.lock();
            let handler = if st.channels.is_empty() {
                st.handler.clone()
            } else {
                None
            };
            st.channels.insert(channel.id, Arc::downgrade(&channel));
            handler
        };
        if let Some(handler) = handler {
            handler.on_first_connect(&channel.owner);
        }
        channel
    }

    /// PV this channel is bound to.
    pub fn owner(&self) -> &Arc<SharedPv> {
        &self.owner
    }

    /// Provider that created the channel, if still alive.
    pub fn provider(&self) -> Option<Arc<dyn ChannelProvider>> {
        self.provider.upgrade()
    }

    /// Channel name.
    pub fn channel_name(&self) -> &str {
        &self.channel_name
    }

    /// Peer address. Local channels have none, so the channel name stands in.
    pub fn remote_address(&self) -> &str {
        &self.channel_name
    }

    /// Channel requester, if still alive.
    pub fn requester(&self) -> Option<Arc<dyn ChannelRequester>> {
        self.requester.upgrade()
    }

    /// Request the PV's type descriptor.
    ///
    /// Delivered immediately when known, otherwise when the PV is opened.
    /// `_sub_field` is accepted for interface compatibility and not interpreted.
    pub fn get_field(&self, requester: Arc<dyn GetFieldRequester>, _sub_field: &str) {
        let desc = {
            let mut st = self.owner.lock();
            match &st.structure {
                Some(structure) => Some(structure.clone()),
                None => {
                    st.getfields.push(requester.clone());
                    None
                }
            }
        };
        if let Some(desc) = desc {
            requester.get_done(Status::ok(), Some(desc));
        }
    }

    /// Create a put object.
    ///
    /// `channel_put_connect` is called before returning if the PV is open,
    /// otherwise when it opens.
    pub fn create_put(
        self: &Arc<Self>,
        requester: &Arc<dyn ChannelPutRequester>,
        pv_request: PvStructure,
    ) -> Arc<SharedPut> {
        let put = SharedPut::new(self.clone(), requester, pv_request);
        let structure = {
            let mut st = self.owner.lock();
            // SharedPut::drop removes
            st.puts.insert(put.id(), Arc::downgrade(&put));
            st.structure.clone()
        };
        if let Some(structure) = structure {
            requester.channel_put_connect(Status::ok(), &put, Some(structure));
        }
        put
    }

    /// Create an RPC object.
    ///
    /// RPC payloads are untyped; the PV being open only gates readiness.
    pub fn create_rpc(
        self: &Arc<Self>,
        requester: &Arc<dyn ChannelRpcRequester>,
        pv_request: PvStructure,
    ) -> Arc<SharedRpc> {
        let rpc = SharedRpc::new(self.clone(), requester, pv_request);
        let opened = {
            let mut st = self.owner.lock();
            st.rpcs.insert(rpc.id(), Arc::downgrade(&rpc));
            st.structure.is_some()
        };
        if opened {
            requester.channel_rpc_connect(Status::ok(), &rpc);
        }
        rpc
    }

    /// Create a monitor.
    ///
    /// On an open PV the queue is opened and the current value posted as the
    /// first update before the requester is notified. Otherwise the monitor
    /// stays dormant until the PV opens.
    pub fn create_monitor(
        self: &Arc<Self>,
        requester: &Arc<dyn MonitorRequester>,
        pv_request: PvStructure,
    ) -> Arc<SharedMonitorFifo> {
        let monitor = SharedMonitorFifo::new(self.clone(), requester, &pv_request);
        let notify = {
            let mut st = self.owner.lock();
            st.monitors.insert(monitor.id(), Arc::downgrade(&monitor));
            match (&st.structure, &st.current) {
                (Some(structure), Some(current)) => {
                    monitor.open(structure.clone());
                    // post initial update
                    monitor.post(current, &st.valid);
                    true
                }
                _ => false,
            }
        };
        if notify {
            monitor.notify();
        }
        monitor
    }
}

impl Drop for SharedChannel {
    fn drop(&mut self) {
        let handler = {
            let mut st = self.owner.lock();
            if st.channels.remove(&self.id).is_some() && st.channels.is_empty() {
                st.handler.clone()
            } else {
                None
            }
        };
        if let Some(handler) = handler {
            handler.on_last_disconnect(&self.owner);
        }

        if self.owner.debug() > CHANNEL_TRACE_DEBUG_LEVEL {
            let requester = self
                .requester
                .upgrade()
                .map(|r| r.requester_name())
                .unwrap_or_else(|| "<Defunct>".to_string());
            debug!(
                %requester,
                channel = %self.channel_name,
                id = self.id,
                "Close channel"
            );
        }
    }
}

impl std::fmt::Debug for SharedChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedChannel")
            .field("id", &self.id)
            .field("channel_name", &self.channel_name)
            .field("pv", &self.owner.name())
            .finish_non_exhaustive()
    }
}
