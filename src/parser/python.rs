//! Python front end.
//!
//! Class membership is lexical: methods and fields belong to the class
//! definition that contains them.

use super::grammar::{enclosing, Grammar};
use super::registry::{LanguagePlugin, Routine};
use super::Handler;
use crate::error::Result;
use tree_sitter::Language;

pub struct PythonPlugin;

static ROUTINES: [Routine; 6] = [
    Routine::flat("imports", imports),
    Routine::flat("vars", global_vars),
    Routine::flat("functions", functions),
    Routine::flat("classes", classes),
    Routine::class_level("fields", class_fields),
    Routine::class_level("methods", methods),
];

impl LanguagePlugin for PythonPlugin {
    fn language_name(&self) -> &'static str {
        "python"
    }

    fn tree_sitter_language(&self) -> Language {
        tree_sitter_python::language()
    }

    fn routines(&self) -> &'static [Routine] {
        &ROUTINES
    }
}

fn imports(grammar: &Grammar) -> Result<Vec<Handler>> {
    let query = r#"
        (import_statement) @def_node
        (import_from_statement) @def_node
        (future_import_statement) @def_node
    "#;
    let mut handlers = grammar.handlers(query, None)?;
    // Imports have no single identifier; the statement text is the name
    for handler in &mut handlers {
        handler.name = Some(handler.get_code().to_string());
    }
    Ok(handlers)
}

fn global_vars(grammar: &Grammar) -> Result<Vec<Handler>> {
    let query = r#"
        (module
            (expression_statement
                (assignment
                    left: (identifier) @name_node
                    right: (_))) @def_node)
    "#;
    grammar.handlers(query, None)
}

fn functions(grammar: &Grammar) -> Result<Vec<Handler>> {
    let query = r#"
        (module
            (function_definition
                name: (identifier) @name_node) @def_node)
        (module
            (decorated_definition
                definition: (function_definition
                    name: (identifier) @name_node) @def_node))
    "#;
    grammar.handlers(query, None)
}

fn classes(grammar: &Grammar) -> Result<Vec<Handler>> {
    let query = r#"
        (class_definition
            name: (identifier) @name_node) @def_node
    "#;
    grammar.handlers(query, None)
}

fn class_fields(grammar: &Grammar) -> Result<Vec<Handler>> {
    let query = r#"
        (class_definition
            name: (identifier) @class_node
            body: (block
                (expression_statement
                    (assignment
                        left: (identifier) @name_node
                        right: (_))) @def_node))
    "#;
    grammar.handlers(query, None)
}

fn methods(grammar: &Grammar) -> Result<Vec<Handler>> {
    let method_query = r#"
        (function_definition
            name: (identifier) @name_node) @def_node
    "#;

    let mut methods = Vec::new();
    for class_match in grammar.query("(class_definition) @class_def", None)? {
        let Some(class_node) = class_match.get("class_def") else {
            continue;
        };
        let class_name = grammar.text_of_opt(class_node.child_by_field_name("name"))?;

        for m in grammar.select(method_query, Some(class_node), &["def_node"])? {
            let Some(def_node) = m.get("def_node") else {
                continue;
            };
            // Nested classes report their own methods
            if enclosing(def_node, &["class_definition"]) != Some(class_node) {
                continue;
            }
            let name = grammar.text_of_opt(m.get("name_node"))?;
            methods.push(grammar.handler(def_node, name, class_name.clone())?);
        }
    }

    Ok(methods)
}
