//! Workspace-wide constants.
//!
//! Single source of truth for provider names, monitor queue limits and the
//! fixed status messages delivered to clients.

/// Canonical name of the network channel provider.
pub const PVA_PROVIDER_NAME: &str = "pva";

/// Deprecated provider name, normalized to [`PVA_PROVIDER_NAME`] on lookup.
pub const LEGACY_PVA_PROVIDER_NAME: &str = "pvAccess";

/// Default name of the provider serving locally hosted shared PVs.
pub const DEFAULT_SERVER_PROVIDER_NAME: &str = "pvas";

/// Default monitor queue depth when the request does not ask for one.
pub const DEFAULT_MONITOR_QUEUE_SIZE: usize = 4;

/// Smallest accepted monitor queue depth.
pub const MIN_MONITOR_QUEUE_SIZE: usize = 2;

/// Request field holding the client's requested monitor queue depth.
pub const QUEUE_SIZE_FIELD: &str = "queueSize";

/// Debug level above which channel open/close is logged.
pub const CHANNEL_TRACE_DEBUG_LEVEL: i32 = 5;

/// Message carried by the status of an operation released without completion.
pub const IMPLICIT_CANCEL_MSG: &str = "Implicit Cancel";

/// Default put rejection when a PV has no put handler.
pub const PUT_NOT_SUPPORTED_MSG: &str = "Put not supported";

/// Default RPC rejection when a PV has no RPC handler.
pub const RPC_NOT_IMPLEMENTED_MSG: &str = "RPC not implemented";

/// Status message for operations on a PV that has no type yet.
pub const NOT_OPEN_MSG: &str = "PV not open";

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/pvas/server.toml";
