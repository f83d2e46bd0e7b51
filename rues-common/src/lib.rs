//! # RUES Common Library
//!
//! Shared code for the registry identity resolver and its tools:
//! - Configuration loading (TOML file, `.env`, environment overrides)
//! - Error types
//! - Odoo JSON-RPC record store client

pub mod config;
pub mod error;
pub mod odoo;

pub use error::{Error, Result};
pub use odoo::{OdooClient, Record, RecordStore};
