//! Core internal logic.
//!
//! Enumeration and property primitives, the per-handle service binding, and
//! pending operations that wait on both a method reply and a signal.

pub(crate) mod binding;
pub(crate) mod pending;
pub(crate) mod services;
