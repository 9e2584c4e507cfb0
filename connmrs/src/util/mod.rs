//! Internal helpers.

pub(crate) mod utils;
