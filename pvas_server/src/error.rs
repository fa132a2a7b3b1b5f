//! Error types for shared PV operations

use pvas_common::config::ConfigError;
use pvas_common::pvdata::PvDataError;
use thiserror::Error;

/// Errors returned by the server-side API.
///
/// Protocol-level failures reach clients as [`pvas_common::pvdata::Status`]
/// values instead; this enum covers misuse by the hosting application.
#[derive(Error, Debug, Clone)]
pub enum PvasError {
    /// `open()` on a PV that already has a type
    #[error("PV already open: {name}")]
    AlreadyOpen {
        /// PV name
        name: String,
    },

    /// Value update on a PV that has no type yet
    #[error("PV not open: {name}")]
    NotOpen {
        /// PV name
        name: String,
    },

    /// PV name already served by a provider
    #[error("PV already registered: {name}")]
    DuplicatePv {
        /// PV name
        name: String,
    },

    /// Value does not fit the PV's type
    #[error("pvData error: {0}")]
    PvData(#[from] PvDataError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type for shared PV operations
pub type PvasResult<T> = Result<T, PvasError>;
