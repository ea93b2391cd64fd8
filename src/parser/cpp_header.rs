//! C++ header front end.
//!
//! Headers hold declarations: methods, fields and Qt-style property macros are
//! nested in class bodies and keyed to the enclosing class.

use super::grammar::{enclosing, is_global_node, Grammar};
use super::registry::{LanguagePlugin, Routine};
use super::Handler;
use crate::error::Result;
use regex::Regex;
use std::sync::LazyLock;
use tree_sitter::{Language, Node};

/// Macro used to declare properties inside a class body
pub const PROPERTY_MACRO: &str = "Q_PROPERTY";

/// Type then property name: `Q_PROPERTY(int value READ value ...)` -> `value`
static PROPERTY_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Q_PROPERTY\s*\(\s*(?:const\s+)?[\w:]+(?:\s*<[^>]*>)?[\s\*&]+(\w+)").unwrap()
});

const CLASS_KINDS: [&str; 2] = ["class_specifier", "struct_specifier"];

pub struct CppHeaderPlugin;

static ROUTINES: [Routine; 7] = [
    Routine::flat("imports", includes),
    Routine::flat("vars", global_vars),
    Routine::flat("functions", functions),
    Routine::flat("classes", classes),
    Routine::class_level("fields", fields),
    Routine::class_level("properties", properties),
    Routine::class_level("methods", methods),
];

impl LanguagePlugin for CppHeaderPlugin {
    fn language_name(&self) -> &'static str {
        "cpp-header"
    }

    fn tree_sitter_language(&self) -> Language {
        tree_sitter_cpp::language()
    }

    fn routines(&self) -> &'static [Routine] {
        &ROUTINES
    }
}

/// `#include` directives, named by their full text
pub(crate) fn includes(grammar: &Grammar) -> Result<Vec<Handler>> {
    let mut handlers = grammar.handlers("(preproc_include) @def_node", None)?;
    for handler in &mut handlers {
        handler.name = Some(handler.get_code().trim_end().to_string());
    }
    Ok(handlers)
}

fn global_vars(grammar: &Grammar) -> Result<Vec<Handler>> {
    let query = r#"
        (declaration
            declarator: (init_declarator
                declarator: (identifier) @name_node)) @def_node
    "#;

    let mut vars = Vec::new();
    for m in grammar.select(query, None, &["def_node", "name_node"])? {
        let Some(def_node) = m.get("def_node") else {
            continue;
        };
        if is_global_node(def_node) {
            let name = grammar.text_of_opt(m.get("name_node"))?;
            vars.push(grammar.handler(def_node, name, None)?);
        }
    }
    Ok(vars)
}

/// Free function declarations; the property macro and in-class
/// declarations (constructors) are excluded
fn functions(grammar: &Grammar) -> Result<Vec<Handler>> {
    let query = r#"
        (declaration
            declarator: (function_declarator
                declarator: (identifier) @name_node
                parameters: (parameter_list))) @def_node
    "#;

    let mut functions = Vec::new();
    for m in grammar.select(query, None, &["def_node", "name_node"])? {
        let (Some(def_node), Some(name_node)) = (m.get("def_node"), m.get("name_node")) else {
            continue;
        };
        let name = grammar.text_of(name_node)?;
        if name == PROPERTY_MACRO || enclosing(def_node, &["field_declaration_list"]).is_some() {
            continue;
        }
        functions.push(grammar.handler(def_node, Some(name), None)?);
    }
    Ok(functions)
}

fn classes(grammar: &Grammar) -> Result<Vec<Handler>> {
    let query = r#"
        (class_specifier
            name: (type_identifier) @name_node
            body: (field_declaration_list)) @def_node
        (struct_specifier
            name: (type_identifier) @name_node
            body: (field_declaration_list)) @def_node
    "#;
    grammar.handlers(query, None)
}

/// Every named class or struct with a body, as (node, name)
fn class_bodies(grammar: &Grammar) -> Result<Vec<(Node<'_>, Option<String>)>> {
    let query = r#"
        (class_specifier
            name: (type_identifier) @class_name
            body: (field_declaration_list)) @class_node
        (struct_specifier
            name: (type_identifier) @class_name
            body: (field_declaration_list)) @class_node
    "#;

    let mut bodies = Vec::new();
    for m in grammar.select(query, None, &["class_node"])? {
        if let Some(class_node) = m.get("class_node") {
            bodies.push((class_node, grammar.text_of_opt(m.get("class_name"))?));
        }
    }
    Ok(bodies)
}

/// Run `query` inside every class body, keeping matches whose nearest
/// enclosing class is that class
fn class_members(grammar: &Grammar, query: &str) -> Result<Vec<Handler>> {
    let mut members = Vec::new();
    for (class_node, class_name) in class_bodies(grammar)? {
        for m in grammar.select(query, Some(class_node), &["def_node"])? {
            let Some(def_node) = m.get("def_node") else {
                continue;
            };
            if enclosing(def_node, &CLASS_KINDS) != Some(class_node) {
                continue;
            }
            let name = grammar.text_of_opt(m.get("name_node"))?;
            members.push(grammar.handler(def_node, name, class_name.clone())?);
        }
    }
    Ok(members)
}

/// Data members, one handler per declarator.
///
/// `int a, b;` yields two handlers covering the same declaration line, so
/// replacing either one rewrites both.
fn fields(grammar: &Grammar) -> Result<Vec<Handler>> {
    let query = r#"
        (field_declaration
            type: (_)
            declarator: (field_identifier) @name_node) @def_node
        (field_declaration
            type: (_)
            declarator: (pointer_declarator
                declarator: (field_identifier) @name_node)) @def_node
    "#;
    class_members(grammar, query)
}

/// In-class declarations and inline definitions, then free definitions with
/// a body.
///
/// Free definitions are matched by plain identifier and carry no class name;
/// a header may define helpers outside any class and the qualification is not
/// guessed.
fn methods(grammar: &Grammar) -> Result<Vec<Handler>> {
    let in_class = r#"
        (field_declaration
            declarator: (function_declarator
                declarator: (field_identifier) @name_node)) @def_node
        (function_definition
            declarator: (function_declarator
                declarator: [(field_identifier) (identifier) (destructor_name)] @name_node)) @def_node
        (declaration
            declarator: (function_declarator
                declarator: [(identifier) (destructor_name)] @name_node)) @def_node
    "#;
    let out_of_class = r#"
        (function_definition
            declarator: (function_declarator
                declarator: (identifier) @name_node)
            body: (compound_statement)) @def_node
    "#;

    let mut methods = class_members(grammar, in_class)?;
    for m in grammar.select(out_of_class, None, &["def_node"])? {
        let Some(def_node) = m.get("def_node") else {
            continue;
        };
        // inline constructors share this shape and belong to their class
        if enclosing(def_node, &CLASS_KINDS).is_some() {
            continue;
        }
        let name = grammar.text_of_opt(m.get("name_node"))?;
        methods.push(grammar.handler(def_node, name, None)?);
    }
    methods.retain(|h| h.name.as_deref() != Some(PROPERTY_MACRO));
    Ok(methods)
}

/// Property macros in class bodies, named by the macro's second argument
fn properties(grammar: &Grammar) -> Result<Vec<Handler>> {
    let mut properties = Vec::new();
    for (class_node, class_name) in class_bodies(grammar)? {
        let Some(body) = class_node.child_by_field_name("body") else {
            continue;
        };

        let mut nodes = Vec::new();
        macro_invocations(body, grammar.source(), &mut nodes);

        for node in nodes {
            if enclosing(node, &CLASS_KINDS) != Some(class_node) {
                continue;
            }
            let text = grammar.text_of(node)?;
            let name = property_name(&text);
            properties.push(grammar.handler(node, name, class_name.clone())?);
        }
    }
    Ok(properties)
}

/// Topmost nodes under `node` whose text is exactly one property macro call.
///
/// The macro has no grammar rule of its own, so depending on its neighbours it
/// surfaces as a field declarator, a declaration or an error node.
fn macro_invocations<'tree>(node: Node<'tree>, source: &[u8], out: &mut Vec<Node<'tree>>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        let text = &source[child.start_byte()..child.end_byte()];
        if text.starts_with(PROPERTY_MACRO.as_bytes())
            && text.contains(&b'(')
            && macro_count(text) == 1
        {
            out.push(child);
        } else if macro_count(text) > 0 {
            macro_invocations(child, source, out);
        }
    }
}

fn macro_count(text: &[u8]) -> usize {
    let needle = PROPERTY_MACRO.as_bytes();
    text.windows(needle.len()).filter(|w| *w == needle).count()
}

pub fn property_name(text: &str) -> Option<String> {
    PROPERTY_NAME
        .captures(text.trim_start())
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::registry::collect;
    use crate::parser::CategoryMap;

    fn index(source: &str) -> CategoryMap {
        let mut grammar = Grammar::new(CppHeaderPlugin.tree_sitter_language()).unwrap();
        grammar.parse(source).unwrap();
        collect(&CppHeaderPlugin, &grammar).unwrap()
    }

    fn names(map: &CategoryMap, category: &str) -> Vec<String> {
        map[category]
            .iter()
            .filter_map(|h| h.name.clone())
            .collect()
    }

    const HEADER: &str = r#"#ifndef MYCLASS_H
#define MYCLASS_H

#include <QObject>

class MyClass : public QObject {
    Q_OBJECT
    Q_PROPERTY(int value READ value WRITE setValue NOTIFY valueChanged)

public:
    MyClass();

    int value() const;
    void setValue(int val);

    static int staticCounter;

private:
    int m_value;
};

int helper(int x);

#endif // MYCLASS_H
"#;

    #[test]
    fn test_header_class_detection() {
        let map = index(HEADER);
        assert_eq!(names(&map, "classes"), vec!["MyClass"]);

        let methods = names(&map, "methods");
        assert!(methods.contains(&"value".to_string()));
        assert!(methods.contains(&"setValue".to_string()));
        assert!(!methods.contains(&PROPERTY_MACRO.to_string()));

        let fields = names(&map, "fields");
        assert!(fields.contains(&"m_value".to_string()));
        assert!(fields.contains(&"staticCounter".to_string()));
        assert!(map["fields"]
            .iter()
            .all(|h| h.class_name.as_deref() == Some("MyClass")));
    }

    #[test]
    fn test_property_macro_extraction() {
        let map = index(HEADER);
        let properties: Vec<&Handler> = map["properties"]
            .iter()
            .filter(|h| h.class_name.as_deref() == Some("MyClass"))
            .collect();
        assert_eq!(properties.len(), 1);
        assert_eq!(properties[0].name.as_deref(), Some("value"));
        assert_eq!(properties[0].get_start_line(), 8);

        let functions = names(&map, "functions");
        assert!(!functions.contains(&PROPERTY_MACRO.to_string()));
    }

    #[test]
    fn test_free_function_declarations() {
        let map = index(HEADER);
        assert_eq!(names(&map, "functions"), vec!["helper"]);
    }

    #[test]
    fn test_include_named_by_text() {
        let map = index(HEADER);
        assert_eq!(names(&map, "imports"), vec!["#include <QObject>"]);
    }

    #[test]
    fn test_struct_members() {
        let map = index("struct Point {\n    int x;\n    int* next;\n};\n");
        assert_eq!(names(&map, "classes"), vec!["Point"]);
        assert_eq!(names(&map, "fields"), vec!["x", "next"]);
        assert!(map["fields"]
            .iter()
            .all(|h| h.class_name.as_deref() == Some("Point")));
    }

    #[test]
    fn test_free_definition_lands_in_methods_without_class() {
        // Free definitions share the methods category; they have no class name
        let map = index("inline int twice(int x) {\n    return 2 * x;\n}\n");
        let methods = &map["methods"];
        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].name.as_deref(), Some("twice"));
        assert_eq!(methods[0].class_name, None);
        assert!(map["functions"].is_empty());
    }

    #[test]
    fn test_inline_constructor_stays_in_class() {
        let source = "class A {\npublic:\n    A() {}\n    ~A() {}\n    int get() const { return x; }\nprivate:\n    int x;\n};\n";
        let map = index(source);
        let methods = &map["methods"];
        assert_eq!(methods.len(), 3);
        assert!(methods.iter().all(|h| h.class_name.as_deref() == Some("A")));

        let constructor = methods
            .iter()
            .find(|h| h.name.as_deref() == Some("A"))
            .unwrap();
        assert_eq!(constructor.get_start_line(), 3);
        assert!(names(&map, "methods").contains(&"get".to_string()));
    }

    #[test]
    fn test_multi_declarator_fields_share_range() {
        let map = index("struct Pair {\n    int a, b;\n};\n");
        let fields = &map["fields"];
        assert_eq!(names(&map, "fields"), vec!["a", "b"]);
        assert_eq!(fields[0].get_start_line(), 2);
        assert_eq!(
            (fields[0].start_byte, fields[0].end_byte),
            (fields[1].start_byte, fields[1].end_byte)
        );
    }

    #[test]
    fn test_globals_skip_inline_bodies() {
        let source = "int counter = 0;\n\ninline int next() {\n    int local = counter + 1;\n    return local;\n}\n";
        let map = index(source);
        assert_eq!(names(&map, "vars"), vec!["counter"]);
    }

    #[test]
    fn test_property_name_regex() {
        assert_eq!(
            property_name("Q_PROPERTY(int value READ value WRITE setValue)").as_deref(),
            Some("value")
        );
        assert_eq!(
            property_name("Q_PROPERTY(QList<int> items READ items)").as_deref(),
            Some("items")
        );
        assert_eq!(
            property_name("Q_PROPERTY(const QString* title READ title)").as_deref(),
            Some("title")
        );
        assert_eq!(property_name("Q_PROPERTY()"), None);
    }
}
