use super::Handler;
use crate::error::{EditorError, Result};
use tree_sitter::{Language, Node, Parser, Query, QueryCursor, Tree};

/// One query match: capture name -> captured nodes, in capture order
#[derive(Debug, Clone)]
pub struct Captures<'tree> {
    captures: Vec<(String, Node<'tree>)>,
}

impl<'tree> Captures<'tree> {
    /// First node bound to `name`
    pub fn get(&self, name: &str) -> Option<Node<'tree>> {
        self.nodes(name).next()
    }

    /// All nodes bound to `name` (more than one for quantified captures)
    pub fn nodes<'a>(&'a self, name: &'a str) -> impl Iterator<Item = Node<'tree>> + 'a {
        self.captures
            .iter()
            .filter(move |(capture, _)| capture == name)
            .map(|(_, node)| *node)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

/// Tree-sitter parser plus the current source buffer and its syntax tree
pub struct Grammar {
    language: Language,
    parser: Parser,
    source: Vec<u8>,
    tree: Option<Tree>,
}

impl Grammar {
    pub fn new(language: Language) -> Result<Self> {
        let mut parser = Parser::new();
        parser.set_language(language)?;

        Ok(Self {
            language,
            parser,
            source: Vec::new(),
            tree: None,
        })
    }

    /// Parse `text`, replacing any previously held tree.
    ///
    /// Tree-sitter recovers from syntax errors, so malformed input still yields
    /// a tree with ERROR nodes rather than a failure.
    pub fn parse(&mut self, text: &str) -> Result<()> {
        self.source = text.as_bytes().to_vec();
        let tree = self
            .parser
            .parse(&self.source, None)
            .ok_or(EditorError::Parse)?;

        if tree.root_node().has_error() {
            tracing::debug!("Syntax errors present, continuing with recovered tree");
        }

        self.tree = Some(tree);
        Ok(())
    }

    pub fn source(&self) -> &[u8] {
        &self.source
    }

    pub fn root_node(&self) -> Result<Node<'_>> {
        self.tree
            .as_ref()
            .map(|tree| tree.root_node())
            .ok_or(EditorError::Parse)
    }

    /// Run `pattern` over the whole tree, or only under `root` when given
    pub fn query<'tree>(
        &'tree self,
        pattern: &str,
        root: Option<Node<'tree>>,
    ) -> Result<Vec<Captures<'tree>>> {
        let root = match root {
            Some(node) => node,
            None => self.root_node()?,
        };

        let query = Query::new(self.language, pattern)?;
        let names: Vec<String> = query
            .capture_names()
            .iter()
            .map(|name| name.to_string())
            .collect();

        let mut cursor = QueryCursor::new();
        let matches = cursor
            .matches(&query, root, self.source.as_slice())
            .map(|m| Captures {
                captures: m
                    .captures
                    .iter()
                    .map(|c| (names[c.index as usize].clone(), c.node))
                    .collect(),
            })
            .collect();

        Ok(matches)
    }

    /// Query and keep only matches that bind every capture in `required`
    pub fn select<'tree>(
        &'tree self,
        pattern: &str,
        root: Option<Node<'tree>>,
        required: &[&str],
    ) -> Result<Vec<Captures<'tree>>> {
        let mut matches = self.query(pattern, root)?;
        matches.retain(|m| required.iter().all(|key| m.contains(key)));
        Ok(matches)
    }

    /// Decode the node's byte range as UTF-8
    pub fn text_of(&self, node: Node<'_>) -> Result<String> {
        let bytes = &self.source[node.start_byte()..node.end_byte()];
        Ok(std::str::from_utf8(bytes)?.to_string())
    }

    pub fn text_of_opt(&self, node: Option<Node<'_>>) -> Result<Option<String>> {
        node.map(|n| self.text_of(n)).transpose()
    }

    /// Build a handler covering `def_node`.
    ///
    /// Nodes that swallow their terminating newline (preprocessor directives)
    /// end at column 0 of the next row; that row is not part of the block.
    pub fn handler(
        &self,
        def_node: Node<'_>,
        name: Option<String>,
        class_name: Option<String>,
    ) -> Result<Handler> {
        let start = def_node.start_position();
        let end = def_node.end_position();
        let end_line = if end.column == 0 && end.row > start.row {
            end.row
        } else {
            end.row + 1
        };

        Ok(Handler::new(
            name,
            class_name,
            self.text_of(def_node)?,
            (def_node.start_byte(), def_node.end_byte()),
            (start.row + 1, end_line),
        ))
    }

    /// One handler per match of `pattern`.
    ///
    /// The block range comes from `@def_node`, the name from `@name_node` and
    /// the owning class from `@class_node`; the latter two are optional.
    pub fn handlers<'tree>(
        &'tree self,
        pattern: &str,
        root: Option<Node<'tree>>,
    ) -> Result<Vec<Handler>> {
        self.select(pattern, root, &["def_node"])?
            .iter()
            .filter_map(|m| m.get("def_node").map(|def_node| (m, def_node)))
            .map(|(m, def_node)| {
                let name = self.text_of_opt(m.get("name_node"))?;
                let class_name = self.text_of_opt(m.get("class_node"))?;
                self.handler(def_node, name, class_name)
            })
            .collect()
    }

    /// Render the node tree with line ranges and field names
    pub fn dump_tree(&self, max_len: usize) -> Result<String> {
        let mut out = String::new();
        self.dump_node(self.root_node()?, None, 0, max_len, &mut out);
        Ok(out)
    }

    fn dump_node(
        &self,
        node: Node<'_>,
        field: Option<&str>,
        indent: usize,
        max_len: usize,
        out: &mut String,
    ) {
        let prefix = "  ".repeat(indent);
        let text = String::from_utf8_lossy(&self.source[node.start_byte()..node.end_byte()])
            .replace('\n', "\\n");
        let text: String = if text.chars().count() > max_len {
            format!("{}...", text.chars().take(max_len).collect::<String>())
        } else {
            text
        };

        if let Some(field) = field {
            out.push_str(&format!("{}(field: {})\n", prefix, field));
        }
        out.push_str(&format!(
            "{}{} [line {} - {}]: '{}'\n",
            prefix,
            node.kind(),
            node.start_position().row + 1,
            node.end_position().row + 1,
            text
        ));

        let mut cursor = node.walk();
        if cursor.goto_first_child() {
            loop {
                self.dump_node(cursor.node(), cursor.field_name(), indent + 2, max_len, out);
                if !cursor.goto_next_sibling() {
                    break;
                }
            }
        }
    }
}

/// Nearest ancestor whose kind is one of `kinds`
pub fn enclosing<'tree>(node: Node<'tree>, kinds: &[&str]) -> Option<Node<'tree>> {
    let mut parent = node.parent();
    while let Some(p) = parent {
        if kinds.contains(&p.kind()) {
            return Some(p);
        }
        parent = p.parent();
    }
    None
}

/// True unless the node sits inside a function body or block statement
pub fn is_global_node(node: Node<'_>) -> bool {
    enclosing(node, &["function_definition", "compound_statement"]).is_none()
}
