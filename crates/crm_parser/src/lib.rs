//! Format-preserving parse tree, reader and JSON-Patch editor for v0/v1 conda recipes.
//!
//! - [`format`] — C1, pre-parse text normalization.
//! - [`node`]/[`path`] — the arena tree and its addressing scheme.
//! - [`parse`]/[`render`] — C3, text <-> tree conversion.
//! - [`tables`] — C4, variable and selector tables.
//! - [`reader`] — C5, read-only recipe access.
//! - [`patch`] — C6, JSON-Patch mutation.
//! - [`variant`] — C8, selector-pruned/template-substituted recipe variants.

pub mod error;
pub mod format;
pub mod node;
pub mod parse;
pub mod patch;
pub mod path;
pub mod reader;
pub mod render;
pub mod schema;
pub mod tables;
pub mod variant;

pub use error::ParserError;
pub use node::{MultilineVariant, Node, NodeId, NodeValue, Tree};
pub use parse::SetStatement;
pub use patch::{ConflictMode, Parser, PatchOp};
pub use path::{Path, PathPart};
pub use reader::Reader;
pub use schema::SchemaVersion;
pub use tables::{NodeVar, SelectorInfo, SelectorTable, VariableTable};
pub use variant::{project, RecipeVariant};
