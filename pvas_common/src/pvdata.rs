//! pvData value types.
//!
//! The minimal structured-value layer the server core is written against:
//!
//! - [`Structure`] - type descriptor (id + ordered scalar fields)
//! - [`PvStructure`] - a value of a given structure
//! - [`ChangeMask`] - bit-per-field change indicator (bit 0 = whole structure)
//! - [`Status`] / [`MessageType`] - completion statuses and message severities

pub mod mask;
pub mod status;
pub mod structure;
pub mod value;

pub use mask::ChangeMask;
pub use status::{MessageType, Status, StatusType};
pub use structure::{Field, ScalarType, Structure};
pub use value::{PvStructure, ScalarValue};

use thiserror::Error;

/// Errors raised by value manipulation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PvDataError {
    /// Source and destination values have different type descriptors.
    #[error("Type mismatch: expected '{expected}', found '{found}'")]
    TypeMismatch {
        /// Destination structure id
        expected: String,
        /// Source structure id
        found: String,
    },

    /// Field name not present in the structure.
    #[error("No such field: {0}")]
    NoSuchField(String),

    /// Scalar assigned to a field of another scalar type.
    #[error("Field '{field}' expects {expected:?}")]
    WrongScalarType {
        /// Field name
        field: String,
        /// Declared field type
        expected: ScalarType,
    },
}
