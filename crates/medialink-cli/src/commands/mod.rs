//! Command handlers.

pub(crate) mod endpoint;
pub(crate) mod tail;
