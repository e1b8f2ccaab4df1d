//! Data types handed from the extraction engine to the serialization layer.

mod common;
mod workunit;

pub use common::*;
pub use workunit::*;
