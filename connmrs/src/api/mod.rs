//! Public API module.
//!
//! This module contains the high-level user-facing API for the `connmrs` crate.

pub mod agent;
pub mod connection_manager;
pub mod models;
pub mod query;
pub mod service;
pub mod technology;
