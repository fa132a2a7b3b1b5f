//! # PVAS Server Library
//!
//! Server-side channel access core: one shared process variable exposed to
//! many client channels, each opening put, RPC and monitor operations on it.
//!
//! # Module Structure
//!
//! - [`registry`] - Provider factory registration and lookup
//! - [`provider`] - `ChannelProvider` trait and the static PV provider
//! - [`shared_pv`] - Shared PV state, value posting and handler hooks
//! - [`channel`] - Per-client channel bound to a shared PV
//! - [`monitor`] - Bounded monitor update queues
//! - [`operation`] - Operation handles with guaranteed completion
//! - [`put`] - Put and RPC channel objects
//! - [`requester`] - Client callback traits
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐  resolve   ┌──────────────────┐
//! │ ProviderRegistry ├───────────►│  StaticProvider  │
//! └──────────────────┘            └────────┬─────────┘
//!                                          │ create_channel
//!                                          ▼
//! ┌──────────────────┐  Arc       ┌──────────────────┐
//! │     SharedPv     │◄───────────┤  SharedChannel   │ (one per client)
//! │ lock: channels,  │            └──┬──────┬──────┬─┘
//! │ puts, rpcs,      │               │      │      │
//! │ monitors, value  │◄── Weak ──┬───┘      │      │
//! └──────────────────┘           │          │      │
//!                         SharedPut   SharedRpc   SharedMonitorFifo
//!                             │          │
//!                             └── Operation (implicit cancel on drop)
//! ```
//!
//! # Locking
//!
//! Each `SharedPv` has one lock. State changes happen under it; client
//! callbacks and handler hooks are always invoked after it is released.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod channel;
pub mod error;
pub mod monitor;
pub mod operation;
pub mod provider;
pub mod put;
pub mod registry;
pub mod requester;
pub mod shared_pv;

pub use crate::channel::SharedChannel;
pub use crate::error::{PvasError, PvasResult};
pub use crate::monitor::{MonitorElement, MonitorFifo, SharedMonitorFifo};
pub use crate::operation::{Operation, OperationCore, OperationImpl};
pub use crate::provider::{ChannelProvider, StaticProvider};
pub use crate::put::{SharedPut, SharedRpc};
pub use crate::registry::{
    global_registry, ChannelProviderFactory, ProviderRegistry, SimpleProviderFactory,
};
pub use crate::requester::{
    ChannelPutRequester, ChannelRequester, ChannelRpcRequester, ConnectionState,
    GetFieldRequester, MonitorRequester, Requester,
};
pub use crate::shared_pv::{MailboxHandler, ReadOnlyHandler, SharedPv, SharedPvHandler};
