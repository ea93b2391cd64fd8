pub mod registry;

use crate::error::{EditorError, Result};
use crate::parser::grammar::Grammar;
use crate::parser::registry::{build_class_view, collect, LanguagePlugin};
use crate::parser::{CategoryMap, ClassView, Handler};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorState {
    Unloaded,
    Loaded,
}

/// In-memory source file with its block index.
///
/// Every mutation re-parses the whole text and rebuilds all handlers; a
/// handler taken before an edit describes the old text and must be fetched
/// again.
pub struct FileEditor {
    plugin: Arc<dyn LanguagePlugin>,
    grammar: Grammar,
    code: String,
    handlers: CategoryMap,
    state: EditorState,
}

impl FileEditor {
    pub fn new(plugin: Arc<dyn LanguagePlugin>) -> Result<Self> {
        let grammar = Grammar::new(plugin.tree_sitter_language())?;
        Ok(Self {
            plugin,
            grammar,
            code: String::new(),
            handlers: CategoryMap::new(),
            state: EditorState::Unloaded,
        })
    }

    pub fn state(&self) -> EditorState {
        self.state
    }

    pub fn language_name(&self) -> &'static str {
        self.plugin.language_name()
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn handlers(&self) -> &CategoryMap {
        &self.handlers
    }

    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let code = std::fs::read_to_string(path)?;
        tracing::debug!("Loaded {} ({} bytes)", path.display(), code.len());
        self.load_str(code)
    }

    /// Replace the text with `code` and index it
    pub fn load_str(&mut self, code: impl Into<String>) -> Result<()> {
        self.code = code.into();
        self.parse()
    }

    /// Write the current text verbatim; does not re-parse
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, &self.code)?;
        tracing::info!("Saved {} ({} bytes)", path.display(), self.code.len());
        Ok(())
    }

    /// Re-parse the current text and rebuild every handler
    pub fn parse(&mut self) -> Result<()> {
        self.grammar.parse(&self.code)?;
        self.handlers = collect(self.plugin.as_ref(), &self.grammar)?;
        self.state = EditorState::Loaded;

        tracing::debug!(
            "Indexed {} handlers in {} categories ({})",
            self.handlers.values().map(Vec::len).sum::<usize>(),
            self.handlers.len(),
            self.plugin.language_name()
        );
        if tracing::enabled!(tracing::Level::TRACE) {
            tracing::trace!("Syntax tree:\n{}", self.grammar.dump_tree(30)?);
        }
        Ok(())
    }

    /// Replace the handler's lines with `new_code`.
    ///
    /// Takes the handler by value: once the text changes it no longer
    /// describes anything.
    pub fn set_code_by_handler(&mut self, handler: Handler, new_code: &str) -> Result<()> {
        self.set_code(handler.start_line, handler.end_line, new_code)
    }

    /// Replace lines `start_line..=end_line` (1-based) with `new_code`
    pub fn set_code(&mut self, start_line: usize, end_line: usize, new_code: &str) -> Result<()> {
        self.code = splice_lines(&self.code, start_line, end_line, new_code);
        self.parse()
    }

    /// Look up a block and replace it; a missing block is an error
    pub fn replace(
        &mut self,
        category: &str,
        name: &str,
        class_name: Option<&str>,
        new_code: &str,
    ) -> Result<()> {
        let handler = self.require_handler(name, category, class_name)?.clone();
        self.set_code_by_handler(handler, new_code)
    }

    /// Insert `new_code` after the last block of `category` (and class), or
    /// at end of file when there is none. Returns the first inserted line.
    pub fn insert_code(
        &mut self,
        category: &str,
        new_code: &str,
        class_name: Option<&str>,
    ) -> Result<usize> {
        let insert_line = self
            .get_handlers_list(category, class_name)
            .iter()
            .map(|h| h.end_line)
            .max()
            .map(|end| end + 1)
            .unwrap_or_else(|| self.code.lines().count() + 1);

        self.set_code(insert_line, insert_line - 1, new_code)?;
        Ok(insert_line)
    }

    /// Full lines covered by the handler, joined with `\n`
    pub fn get_code(&self, handler: &Handler) -> String {
        let start = handler.start_line.max(1);
        if handler.end_line < start {
            return String::new();
        }
        self.code
            .lines()
            .skip(start - 1)
            .take(handler.end_line - start + 1)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn get_handlers_list(&self, category: &str, class_name: Option<&str>) -> Vec<&Handler> {
        let handlers = self.handlers.get(category).map(Vec::as_slice).unwrap_or(&[]);
        match class_name {
            Some(class) => handlers
                .iter()
                .filter(|h| h.class_name.as_deref() == Some(class))
                .collect(),
            None => handlers.iter().collect(),
        }
    }

    /// First handler in `category` named `name` (and owned by `class_name` when given)
    pub fn get_handler(
        &self,
        name: &str,
        category: &str,
        class_name: Option<&str>,
    ) -> Option<&Handler> {
        self.handlers.get(category)?.iter().find(|h| {
            h.name.as_deref() == Some(name)
                && class_name.map_or(true, |class| h.class_name.as_deref() == Some(class))
        })
    }

    pub fn require_handler(
        &self,
        name: &str,
        category: &str,
        class_name: Option<&str>,
    ) -> Result<&Handler> {
        self.get_handler(name, category, class_name)
            .ok_or_else(|| EditorError::NotFound {
                category: category.to_string(),
                name: name.to_string(),
                class_name: class_name.map(str::to_string),
            })
    }

    pub fn get_class_members_list(&self, class_name: &str, category: &str) -> Vec<String> {
        self.get_handlers_list(category, Some(class_name))
            .into_iter()
            .filter_map(|h| h.name.clone())
            .collect()
    }

    pub fn get_class_handler(
        &self,
        class_name: &str,
        name: &str,
        category: &str,
    ) -> Option<&Handler> {
        self.get_handler(name, category, Some(class_name))
    }

    /// Class-structured view of the current index
    pub fn summary(&self) -> ClassView {
        build_class_view(&self.handlers)
    }
}

/// Replace lines `start_line..=end_line` (1-based) of `code` with the lines of
/// `new_code`. An empty range (`end_line < start_line`) inserts before
/// `start_line`. The result ends with a newline iff `code` did (empty text
/// counts as terminated).
pub fn splice_lines(code: &str, start_line: usize, end_line: usize, new_code: &str) -> String {
    let mut lines: Vec<&str> = code.lines().collect();
    let start = start_line.saturating_sub(1).min(lines.len());
    let end = end_line.min(lines.len()).max(start);
    lines.splice(start..end, new_code.lines());

    let mut out = lines.join("\n");
    if !out.is_empty() && (code.is_empty() || code.ends_with('\n')) {
        out.push('\n');
    }
    out
}
