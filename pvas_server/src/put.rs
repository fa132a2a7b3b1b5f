//! Put and RPC channel objects.
//!
//! Each object registers into its PV's put/RPC set when created by a
//! channel and deregisters on drop. Every client request builds an
//! [`Operation`] and hands it to the PV handler; the operation reports back
//! to the object's requester.

use crate::channel::SharedChannel;
use crate::operation::{Operation, OperationCore, OperationImpl};
use crate::requester::{ChannelPutRequester, ChannelRpcRequester, Requester};
use pvas_common::consts::NOT_OPEN_MSG;
use pvas_common::pvdata::{ChangeMask, PvStructure, Status};
use std::sync::{Arc, Weak};
use tracing::trace;

/// Put object created by [`SharedChannel::create_put`].
pub struct SharedPut {
    id: u64,
    channel: Arc<SharedChannel>,
    requester: Weak<dyn ChannelPutRequester>,
    pv_request: PvStructure,
}

impl SharedPut {
    pub(crate) fn new(
        channel: Arc<SharedChannel>,
        requester: &Arc<dyn ChannelPutRequester>,
        pv_request: PvStructure,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: channel.owner().next_id(),
            channel,
            requester: Arc::downgrade(requester),
            pv_request,
        })
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Owning channel.
    pub fn channel(&self) -> &Arc<SharedChannel> {
        &self.channel
    }

    /// Put requester, if still alive.
    pub fn requester(&self) -> Option<Arc<dyn ChannelPutRequester>> {
        self.requester.upgrade()
    }

    /// Client request descriptor.
    pub fn pv_request(&self) -> &PvStructure {
        &self.pv_request
    }

    /// Write `value` (fields selected by `changed`) through the PV handler.
    ///
    /// The outcome arrives as `put_done`. Without a handler the operation is
    /// released unhandled and completes as an implicit cancel.
    pub fn put(self: &Arc<Self>, value: &PvStructure, changed: &ChangeMask) {
        let pv = self.channel.owner();
        let (handler, structure) = {
            let st = pv.lock();
            (st.handler.clone(), st.structure.clone())
        };

        let status = match structure {
            None => Some(Status::error(NOT_OPEN_MSG)),
            Some(s) if **value.structure() != *s => Some(Status::error(format!(
                "Put type '{}' does not match PV type '{}'",
                value.structure().id(),
                s.id()
            ))),
            Some(_) => None,
        };
        if let Some(status) = status {
            if let Some(req) = self.requester() {
                req.put_done(status, self);
            }
            return;
        }

        let op = Operation::new(PutOp {
            core: OperationCore::new(
                self.pv_request.clone(),
                value.clone(),
                changed.clone(),
                pv.debug(),
            ),
            put: self.clone(),
        });
        match handler {
            Some(handler) => handler.on_put(pv, op),
            None => trace!(pv = %pv.name(), "Put without handler"),
        }
    }

    /// Read the current value; the result arrives as `put_get_done`.
    pub fn get(self: &Arc<Self>) {
        let Some(req) = self.requester() else {
            return;
        };
        match self.channel.owner().fetch() {
            Some((value, valid)) => req.put_get_done(Status::ok(), self, Some(&value), Some(&valid)),
            None => req.put_get_done(Status::error(NOT_OPEN_MSG), self, None, None),
        }
    }
}

impl Drop for SharedPut {
    fn drop(&mut self) {
        self.channel.owner().lock().puts.remove(&self.id);
    }
}

struct PutOp {
    core: OperationCore,
    put: Arc<SharedPut>,
}

impl OperationImpl for PutOp {
    fn core(&self) -> &OperationCore {
        &self.core
    }

    fn channel(&self) -> Option<Arc<SharedChannel>> {
        Some(self.put.channel.clone())
    }

    fn requester(&self) -> Option<Arc<dyn Requester>> {
        self.put.requester().map(|r| r as Arc<dyn Requester>)
    }

    fn deliver(&self, status: Status, _value: Option<&PvStructure>) {
        match self.put.requester() {
            Some(req) => req.put_done(status, &self.put),
            None => trace!(%status, "Put requester defunct"),
        }
    }
}

/// RPC object created by [`SharedChannel::create_rpc`].
pub struct SharedRpc {
    id: u64,
    channel: Arc<SharedChannel>,
    requester: Weak<dyn ChannelRpcRequester>,
    pv_request: PvStructure,
}

impl SharedRpc {
    pub(crate) fn new(
        channel: Arc<SharedChannel>,
        requester: &Arc<dyn ChannelRpcRequester>,
        pv_request: PvStructure,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: channel.owner().next_id(),
            channel,
            requester: Arc::downgrade(requester),
            pv_request,
        })
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Owning channel.
    pub fn channel(&self) -> &Arc<SharedChannel> {
        &self.channel
    }

    /// RPC requester, if still alive.
    pub fn requester(&self) -> Option<Arc<dyn ChannelRpcRequester>> {
        self.requester.upgrade()
    }

    /// Client request descriptor.
    pub fn pv_request(&self) -> &PvStructure {
        &self.pv_request
    }

    /// Issue a request; the response arrives as `request_done`.
    pub fn request(self: &Arc<Self>, arguments: &PvStructure) {
        let pv = self.channel.owner();
        let (handler, opened) = {
            let st = pv.lock();
            (st.handler.clone(), st.structure.is_some())
        };
        if !opened {
            if let Some(req) = self.requester() {
                req.request_done(Status::error(NOT_OPEN_MSG), self, None);
            }
            return;
        }

        let op = Operation::new(RpcOp {
            core: OperationCore::new(
                self.pv_request.clone(),
                arguments.clone(),
                ChangeMask::whole(),
                pv.debug(),
            ),
            rpc: self.clone(),
        });
        match handler {
            Some(handler) => handler.on_rpc(pv, op),
            None => trace!(pv = %pv.name(), "RPC without handler"),
        }
    }
}

impl Drop for SharedRpc {
    fn drop(&mut self) {
        self.channel.owner().lock().rpcs.remove(&self.id);
    }
}

struct RpcOp {
    core: OperationCore,
    rpc: Arc<SharedRpc>,
}

impl OperationImpl for RpcOp {
    fn core(&self) -> &OperationCore {
        &self.core
    }

    fn channel(&self) -> Option<Arc<SharedChannel>> {
        Some(self.rpc.channel.clone())
    }

    fn requester(&self) -> Option<Arc<dyn Requester>> {
        self.rpc.requester().map(|r| r as Arc<dyn Requester>)
    }

    fn deliver(&self, status: Status, value: Option<&PvStructure>) {
        match self.rpc.requester() {
            Some(req) => req.request_done(status, &self.rpc, value),
            None => trace!(%status, "RPC requester defunct"),
        }
    }
}
