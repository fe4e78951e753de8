//! # TeamSync Worker Library
//!
//! Background jobs that run beside the API server.
//!
//! ## Modules
//!
//! - `config`: Environment configuration
//! - `reconciler`: Periodic role and membership repair

pub mod config;
pub mod reconciler;
