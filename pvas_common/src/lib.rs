//! PVAS Common Library
//!
//! This crate provides shared constants, the pvData value types and
//! configuration loading utilities for all pvas workspace crates.
//!
//! # Module Structure
//!
//! - [`consts`] - Provider names, queue limits and status messages
//! - [`pvdata`] - Type descriptors, values, change masks and statuses
//! - [`config`] - Configuration loading traits and types
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```toml
//! [dependencies]
//! pvas_common = { path = "../pvas_common" }
//! ```
//!
//! ```rust
//! use pvas_common::pvdata::{ChangeMask, PvStructure, Status};
//! use pvas_common::config::{ConfigLoader, ServerConfig};
//! ```

pub mod config;
pub mod consts;
pub mod prelude;
pub mod pvdata;
