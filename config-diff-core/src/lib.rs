//! Parsing and diffing primitives for configuration compliance.
//!
//! Three representations are covered, each with its own comparison model:
//!
//! - [`hier`]: indented CLI configuration as an arena tree with ordered and
//!   unordered subtree comparison
//! - [`xml`]: XML documents and edit scripts between them
//! - [`structural`]: nested JSON-like values and path-based structural diffs
//!
//! Nothing here knows about devices, platforms or rules; that lives in the
//! consuming crate.

pub mod format;
pub mod hier;
pub mod structural;
pub mod xml;

pub use format::{format_edit_script, format_structural, format_text_updates};
pub use hier::{subtree_equal, HierTree, NodeId, ParseOptions};
pub use structural::{diff_values, ChangeKind, StructuralDiff, StructuralOptions};
pub use xml::{edit_script, edit_script_with_options, EditAction, EditOptions, XmlNode};
