//! CLI command implementations

pub(crate) mod common;
pub(crate) mod ls;
pub(crate) mod snapshot;
pub(crate) mod validate;
