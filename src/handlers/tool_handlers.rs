use crate::config::Config;
use crate::editor::registry::EditorRegistry;
use crate::editor::FileEditor;
use crate::mcp::types::Content;
use anyhow::{Context, Result};
use ignore::WalkBuilder;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

const EXCLUDED_DIRS: [&str; 2] = [".git", "__pycache__"];

/// Tool handlers for MCP server
pub struct ToolHandlers {
    config: Config,
    registry: EditorRegistry,
}

impl ToolHandlers {
    pub fn new(config: Config, registry: EditorRegistry) -> Self {
        Self { config, registry }
    }

    /// Handle get_file_tree tool
    pub async fn handle_get_file_tree(&self, _args: &Value) -> Result<Vec<Content>> {
        let root = &self.config.project_path;
        if !root.is_dir() {
            anyhow::bail!("Project path is not a directory: {}", root.display());
        }

        let tree = file_tree(root);
        Ok(vec![Content::Text {
            text: serde_json::to_string(&tree)?,
        }])
    }

    /// Handle generate_code_summary tool
    pub async fn handle_generate_code_summary(&self, args: &Value) -> Result<Vec<Content>> {
        let filename = str_arg(args, "filename")?;
        let (editor, _) = self.open_existing(filename)?;

        let summary = editor.summary();
        Ok(vec![Content::Text {
            text: serde_json::to_string(&summary)?,
        }])
    }

    /// Handle get_code tool
    pub async fn handle_get_code(&self, args: &Value) -> Result<Vec<Content>> {
        let filename = str_arg(args, "filename")?;
        let category = str_arg(args, "category")?;
        let name = str_arg(args, "name")?;
        let class_name = opt_str_arg(args, "class_name");

        let (editor, _) = self.open_existing(filename)?;

        let text = match editor.get_handler(name, category, class_name) {
            Some(handler) => editor.get_code(handler),
            None => format!(
                "No {} '{}'{} found in {}",
                category,
                name,
                class_name
                    .map(|c| format!(" in class '{}'", c))
                    .unwrap_or_default(),
                filename
            ),
        };

        Ok(vec![Content::Text { text }])
    }

    /// Handle modify_code tool
    pub async fn handle_modify_code(&self, args: &Value) -> Result<Vec<Content>> {
        let filename = str_arg(args, "filename")?;
        let category = str_arg(args, "category")?;
        let name = str_arg(args, "name")?;
        let new_code = str_arg(args, "new_code")?;
        let class_name = opt_str_arg(args, "class_name");

        let (mut editor, path) = self.open_existing(filename)?;
        editor
            .replace(category, name, class_name, new_code)
            .with_context(|| format!("Cannot modify {}", filename))?;
        editor.save(&path)?;

        Ok(vec![Content::Text {
            text: format!("Updated {} '{}' in {}", category, name, filename),
        }])
    }

    /// Handle add_new_code tool
    pub async fn handle_add_new_code(&self, args: &Value) -> Result<Vec<Content>> {
        let filename = str_arg(args, "filename")?;
        let category = str_arg(args, "category")?;
        let name = str_arg(args, "name")?;
        let new_code = str_arg(args, "new_code")?;
        let class_name = opt_str_arg(args, "class_name");

        let path = self.config.resolve(filename);
        let mut editor = self.registry.editor_for(&path)?;

        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, "")?;
            tracing::info!("Created {}", path.display());
        }

        editor.load(&path)?;
        let line = editor.insert_code(category, new_code, class_name)?;
        editor.save(&path)?;

        tracing::debug!("Inserted {} '{}' at line {} of {}", category, name, line, filename);

        Ok(vec![Content::Text {
            text: format!("Added {} '{}' to {} at line {}", category, name, filename, line),
        }])
    }

    fn open_existing(&self, filename: &str) -> Result<(FileEditor, PathBuf)> {
        let path = self.config.resolve(filename);
        if !path.exists() {
            anyhow::bail!("File does not exist: {}", path.display());
        }

        let mut editor = self.registry.editor_for(&path)?;
        editor
            .load(&path)
            .with_context(|| format!("Failed to load {}", path.display()))?;
        Ok((editor, path))
    }
}

fn str_arg<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(|v| v.as_str())
        .with_context(|| format!("Missing '{}' argument", key))
}

fn opt_str_arg<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
}

/// Nested directory listing: directories map to objects, files to null
fn file_tree(root: &Path) -> Value {
    let mut tree = Map::new();

    let walker = WalkBuilder::new(root)
        .standard_filters(false) // Dotfiles and ignored paths are listed
        .filter_entry(|entry| {
            !EXCLUDED_DIRS
                .iter()
                .any(|excluded| entry.file_name() == *excluded)
        })
        .build();

    for entry in walker.flatten() {
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let components: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect();
        let is_dir = entry.file_type().map_or(false, |ft| ft.is_dir());
        insert_path(&mut tree, &components, is_dir);
    }

    Value::Object(tree)
}

fn insert_path(tree: &mut Map<String, Value>, components: &[String], is_dir: bool) {
    match components {
        [] => {}
        [last] if is_dir => {
            tree.entry(last.clone())
                .or_insert_with(|| Value::Object(Map::new()));
        }
        [last] => {
            tree.insert(last.clone(), Value::Null);
        }
        [folder, rest @ ..] => {
            let child = tree
                .entry(folder.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(map) = child {
                insert_path(map, rest, is_dir);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn handlers(dir: &TempDir) -> ToolHandlers {
        ToolHandlers::new(Config::new(dir.path()), EditorRegistry::default())
    }

    fn text(content: Vec<Content>) -> String {
        match content.into_iter().next() {
            Some(Content::Text { text }) => text,
            None => String::new(),
        }
    }

    const MODULE: &str = "import os\n\nclass Greeter:\n    greeting = 'hi'\n\n    def greet(self):\n        return self.greeting\n\ndef main():\n    return Greeter().greet()\n";

    #[tokio::test]
    async fn test_summary_is_class_structured_json() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("app.py"), MODULE).unwrap();

        let out = handlers(&dir)
            .handle_generate_code_summary(&json!({ "filename": "app.py" }))
            .await
            .unwrap();
        let summary: Value = serde_json::from_str(&text(out)).unwrap();

        assert_eq!(summary["functions"], json!(["main"]));
        assert_eq!(summary["imports"], json!(["import os"]));
        assert_eq!(summary["Greeter"]["methods"], json!(["greet"]));
        assert_eq!(summary["Greeter"]["fields"], json!(["greeting"]));
        assert!(summary.get("classes").is_none());
    }

    #[tokio::test]
    async fn test_get_code_found_and_missing() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("app.py"), MODULE).unwrap();
        let tools = handlers(&dir);

        let out = tools
            .handle_get_code(&json!({
                "filename": "app.py",
                "category": "methods",
                "name": "greet",
                "class_name": "Greeter"
            }))
            .await
            .unwrap();
        assert_eq!(
            text(out),
            "    def greet(self):\n        return self.greeting"
        );

        let out = tools
            .handle_get_code(&json!({
                "filename": "app.py",
                "category": "functions",
                "name": "absent"
            }))
            .await
            .unwrap();
        assert!(text(out).starts_with("No functions 'absent'"));
    }

    #[tokio::test]
    async fn test_modify_code_rewrites_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.py");
        fs::write(&path, MODULE).unwrap();
        let tools = handlers(&dir);

        tools
            .handle_modify_code(&json!({
                "filename": "app.py",
                "category": "functions",
                "name": "main",
                "new_code": "def main():\n    print(Greeter().greet())"
            }))
            .await
            .unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.ends_with("def main():\n    print(Greeter().greet())\n"));
        assert!(written.starts_with("import os\n"));
    }

    #[tokio::test]
    async fn test_modify_missing_block_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.py");
        fs::write(&path, MODULE).unwrap();

        let result = handlers(&dir)
            .handle_modify_code(&json!({
                "filename": "app.py",
                "category": "functions",
                "name": "absent",
                "new_code": "def absent():\n    pass"
            }))
            .await;
        assert!(result.is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), MODULE);
    }

    #[tokio::test]
    async fn test_add_new_code_creates_file() {
        let dir = TempDir::new().unwrap();
        let tools = handlers(&dir);

        tools
            .handle_add_new_code(&json!({
                "filename": "pkg/util.py",
                "category": "functions",
                "name": "helper",
                "new_code": "def helper():\n    return 1"
            }))
            .await
            .unwrap();

        let written = fs::read_to_string(dir.path().join("pkg/util.py")).unwrap();
        assert_eq!(written, "def helper():\n    return 1\n");
    }

    #[tokio::test]
    async fn test_add_new_code_after_last_in_class() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.py");
        fs::write(&path, MODULE).unwrap();

        handlers(&dir)
            .handle_add_new_code(&json!({
                "filename": "app.py",
                "category": "fields",
                "name": "farewell",
                "new_code": "    farewell = 'bye'",
                "class_name": "Greeter"
            }))
            .await
            .unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("    greeting = 'hi'\n    farewell = 'bye'\n"));
    }

    #[tokio::test]
    async fn test_unsupported_extension() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("notes.txt"), "hello").unwrap();

        let err = handlers(&dir)
            .handle_generate_code_summary(&json!({ "filename": "notes.txt" }))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unsupported file extension"));
    }

    #[tokio::test]
    async fn test_file_tree_lists_dotfiles() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(".github")).unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join(".github/ci.yml"), "").unwrap();
        fs::write(dir.path().join(".git/HEAD"), "").unwrap();
        fs::write(dir.path().join(".gitignore"), "build/\n").unwrap();
        fs::create_dir_all(dir.path().join("build")).unwrap();
        fs::write(dir.path().join("build/out.py"), "").unwrap();
        fs::write(dir.path().join(".env"), "").unwrap();

        let out = handlers(&dir).handle_get_file_tree(&json!({})).await.unwrap();
        let tree: Value = serde_json::from_str(&text(out)).unwrap();
        assert_eq!(
            tree,
            json!({
                ".env": null,
                ".github": { "ci.yml": null },
                ".gitignore": null,
                "build": { "out.py": null }
            })
        );
    }

    #[tokio::test]
    async fn test_file_tree_skips_excluded_dirs() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src/__pycache__")).unwrap();
        fs::write(dir.path().join("src/app.py"), "x = 1\n").unwrap();
        fs::write(dir.path().join("src/__pycache__/app.pyc"), "").unwrap();
        fs::write(dir.path().join("main.py"), "").unwrap();

        let out = handlers(&dir).handle_get_file_tree(&json!({})).await.unwrap();
        let tree: Value = serde_json::from_str(&text(out)).unwrap();
        assert_eq!(tree, json!({ "main.py": null, "src": { "app.py": null } }));
    }
}
