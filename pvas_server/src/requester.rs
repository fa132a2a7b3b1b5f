//! Client-side callback interfaces.
//!
//! These traits are implemented by the dispatch layer that represents a
//! client connection. The server core only ever holds them through `Weak`
//! references (or, for pending field requests, until delivery) and never
//! invokes them while a shared PV lock is held.

use crate::channel::SharedChannel;
use crate::monitor::SharedMonitorFifo;
use crate::put::{SharedPut, SharedRpc};
use pvas_common::pvdata::{ChangeMask, MessageType, PvStructure, Status, Structure};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Channel connection state reported to channel requesters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// The PV has a type and accepts operations
    Connected,
    /// The PV was closed
    Disconnected,
}

/// Base of every requester: a name and a message sink.
pub trait Requester: Send + Sync {
    /// Name used in diagnostics.
    fn requester_name(&self) -> String;

    /// Receive a diagnostic message.
    ///
    /// Default: log through `tracing` at the matching level.
    fn message(&self, message: &str, kind: MessageType) {
        let requester = self.requester_name();
        match kind {
            MessageType::Info => info!(%requester, "{message}"),
            MessageType::Warning => warn!(%requester, "{message}"),
            MessageType::Error | MessageType::Fatal => error!(%requester, "{message}"),
        }
    }
}

/// Owner of a channel.
pub trait ChannelRequester: Requester {
    /// Channel connection state changed.
    fn channel_state_change(&self, _channel: &Arc<SharedChannel>, _state: ConnectionState) {}
}

/// Receiver of a type descriptor requested through `get_field`.
pub trait GetFieldRequester: Requester {
    /// Type descriptor available (or request failed).
    fn get_done(&self, status: Status, field: Option<Arc<Structure>>);
}

/// Owner of a put channel object.
pub trait ChannelPutRequester: Requester {
    /// Put object ready for use with the given type.
    fn channel_put_connect(
        &self,
        status: Status,
        put: &Arc<SharedPut>,
        structure: Option<Arc<Structure>>,
    );

    /// A put completed.
    fn put_done(&self, status: Status, put: &Arc<SharedPut>);

    /// Result of a get issued through the put object.
    fn put_get_done(
        &self,
        _status: Status,
        _put: &Arc<SharedPut>,
        _value: Option<&PvStructure>,
        _changed: Option<&ChangeMask>,
    ) {
    }

    /// The PV behind the put object was closed.
    fn channel_disconnect(&self, _put: &Arc<SharedPut>) {}
}

/// Owner of an RPC channel object.
pub trait ChannelRpcRequester: Requester {
    /// RPC object ready for use.
    fn channel_rpc_connect(&self, status: Status, rpc: &Arc<SharedRpc>);

    /// An RPC request completed, with an optional response.
    fn request_done(&self, status: Status, rpc: &Arc<SharedRpc>, response: Option<&PvStructure>);

    /// The PV behind the RPC object was closed.
    fn channel_disconnect(&self, _rpc: &Arc<SharedRpc>) {}
}

/// Owner of a monitor.
pub trait MonitorRequester: Requester {
    /// Monitor opened with the given type.
    fn monitor_connect(
        &self,
        status: Status,
        monitor: &Arc<SharedMonitorFifo>,
        structure: Arc<Structure>,
    );

    /// Updates are waiting in the monitor queue.
    fn monitor_event(&self, monitor: &Arc<SharedMonitorFifo>);

    /// The monitor will deliver no further updates.
    fn unlisten(&self, monitor: &Arc<SharedMonitorFifo>);
}
