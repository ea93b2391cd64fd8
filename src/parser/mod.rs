pub mod cpp_header;
pub mod cpp_source;
pub mod grammar;
pub mod python;
pub mod registry;

use serde::Serialize;
use std::collections::BTreeMap;

/// Addressable block of source code (function, class, method, field, import, ...)
///
/// Line numbers are 1-based and inclusive. A handler describes the text it was
/// extracted from; after any edit of that text it is stale and must be fetched again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Handler {
    pub category: String,
    pub name: Option<String>,
    pub class_name: Option<String>,
    pub class_level: bool,
    pub start_byte: usize,
    pub end_byte: usize,
    pub start_line: usize,
    pub end_line: usize,
    #[serde(skip)]
    code: String,
}

impl Handler {
    pub(crate) fn new(
        name: Option<String>,
        class_name: Option<String>,
        code: String,
        (start_byte, end_byte): (usize, usize),
        (start_line, end_line): (usize, usize),
    ) -> Self {
        Self {
            category: String::new(),
            name,
            class_name,
            class_level: false,
            start_byte,
            end_byte,
            start_line,
            end_line,
            code,
        }
    }

    /// Exact source text of the block, without reformatting
    pub fn get_code(&self) -> &str {
        &self.code
    }

    pub fn get_start_line(&self) -> usize {
        self.start_line
    }

    pub fn get_end_line(&self) -> usize {
        self.end_line
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn class_name(&self) -> Option<&str> {
        self.class_name.as_deref()
    }
}

/// category -> handlers, in extraction order within each category
pub type CategoryMap = BTreeMap<String, Vec<Handler>>;

/// Category map regrouped by owning class.
///
/// Free-standing categories stay flat (`category -> names`); class-level
/// categories are filed under `class -> category -> names`. Both maps are
/// flattened into one JSON object on serialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClassView {
    #[serde(flatten)]
    pub flat: BTreeMap<String, Vec<String>>,
    #[serde(flatten)]
    pub classes: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

impl ClassView {
    pub fn class(&self, class_name: &str) -> Option<&BTreeMap<String, Vec<String>>> {
        self.classes.get(class_name)
    }

    pub fn names(&self, category: &str) -> &[String] {
        self.flat.get(category).map(Vec::as_slice).unwrap_or(&[])
    }
}
