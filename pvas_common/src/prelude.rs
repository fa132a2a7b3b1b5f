//! Prelude module for common re-exports.
//!
//! ```rust
//! use pvas_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, PvConfig, ServerConfig, SharedConfig};

// ─── Constants ──────────────────────────────────────────────────────
pub use crate::consts::{IMPLICIT_CANCEL_MSG, LEGACY_PVA_PROVIDER_NAME, PVA_PROVIDER_NAME};

// ─── pvData ─────────────────────────────────────────────────────────
pub use crate::pvdata::{
    ChangeMask, MessageType, PvDataError, PvStructure, ScalarType, ScalarValue, Status,
    StatusType, Structure,
};
