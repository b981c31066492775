//! Plain-text renderers for diff output.

pub mod text;

pub use text::{format_edit_script, format_structural, format_text_updates};
