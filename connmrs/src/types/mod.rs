//! Type definitions and constants.
//!
//! This module contains ConnMan D-Bus constants.

pub(crate) mod constants;
