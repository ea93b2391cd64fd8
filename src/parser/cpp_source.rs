//! C++ translation unit front end.
//!
//! Definitions in a `.cpp` file bind to a class through scope qualification
//! (`Scope::name`) rather than lexical nesting.

use super::cpp_header::includes;
use super::grammar::{is_global_node, Grammar};
use super::registry::{LanguagePlugin, Routine};
use super::Handler;
use crate::error::Result;
use tree_sitter::Language;

pub struct CppSourcePlugin;

static ROUTINES: [Routine; 5] = [
    Routine::flat("includes", includes),
    Routine::flat("functions", functions),
    Routine::class_level("methods", methods),
    Routine::class_level("static_members", static_members),
    Routine::flat("global_vars", global_vars),
];

impl LanguagePlugin for CppSourcePlugin {
    fn language_name(&self) -> &'static str {
        "cpp-source"
    }

    fn tree_sitter_language(&self) -> Language {
        tree_sitter_cpp::language()
    }

    fn routines(&self) -> &'static [Routine] {
        &ROUTINES
    }
}

fn functions(grammar: &Grammar) -> Result<Vec<Handler>> {
    let query = r#"
        (function_definition
            declarator: (function_declarator
                declarator: (identifier) @name_node
                parameters: (parameter_list))) @def_node
        (function_definition
            declarator: (pointer_declarator
                declarator: (function_declarator
                    declarator: (identifier) @name_node
                    parameters: (parameter_list)))) @def_node
    "#;
    grammar.handlers(query, None)
}

fn methods(grammar: &Grammar) -> Result<Vec<Handler>> {
    let query = r#"
        (function_definition
            declarator: (function_declarator
                declarator: (qualified_identifier
                    scope: (namespace_identifier) @class_node
                    name: [(identifier) (destructor_name)] @name_node))) @def_node
        (function_definition
            declarator: (pointer_declarator
                declarator: (function_declarator
                    declarator: (qualified_identifier
                        scope: (namespace_identifier) @class_node
                        name: (identifier) @name_node)))) @def_node
    "#;
    grammar.handlers(query, None)
}

fn static_members(grammar: &Grammar) -> Result<Vec<Handler>> {
    let query = r#"
        (declaration
            declarator: (init_declarator
                declarator: (qualified_identifier
                    scope: (namespace_identifier) @class_node
                    name: (identifier) @name_node))) @def_node
    "#;
    grammar.handlers(query, None)
}

/// File-scope variables with an initializer.
///
/// A declaration in a function body has the same shape as one at file scope,
/// so the ancestor chain decides.
fn global_vars(grammar: &Grammar) -> Result<Vec<Handler>> {
    let query = r#"
        (declaration
            type: (_)
            declarator: (init_declarator
                declarator: (identifier) @name_node)) @def_node
    "#;

    let mut vars = Vec::new();
    for m in grammar.select(query, None, &["def_node", "name_node"])? {
        let Some(def_node) = m.get("def_node") else {
            continue;
        };
        if !is_global_node(def_node) {
            continue;
        }
        let name = grammar.text_of_opt(m.get("name_node"))?;
        vars.push(grammar.handler(def_node, name, None)?);
    }
    Ok(vars)
}
