//! XML trees, parsing and edit-script diffing.

pub mod edit;
pub mod parser;
pub mod tree;

pub use edit::{edit_script, edit_script_with_options, EditAction, EditOptions};
pub use parser::{parse, ParseError};
pub use tree::XmlNode;
