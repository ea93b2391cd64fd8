//! Structural code index and block editor.
//!
//! Source files are parsed with tree-sitter into named, categorized blocks
//! (imports, functions, classes, methods, ...). A [`FileEditor`] looks blocks
//! up by category, name and owning class, replaces or appends them as text,
//! and re-parses so every lookup reflects the current buffer. The same
//! operations are served to MCP clients over stdio by [`mcp::server::McpServer`].

pub mod config;
pub mod editor;
pub mod error;
pub mod handlers;
pub mod mcp;
pub mod parser;

pub use editor::registry::EditorRegistry;
pub use editor::{EditorState, FileEditor};
pub use error::{EditorError, Result};
pub use parser::registry::{LanguagePlugin, Routine};
pub use parser::{CategoryMap, ClassView, Handler};
