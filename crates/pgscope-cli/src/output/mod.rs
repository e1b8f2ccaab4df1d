//! Output formatting modules.

pub mod json;
pub mod summary;

pub use json::{format_json, format_jsonl};
pub use summary::format_summary;
