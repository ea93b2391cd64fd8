use super::FileEditor;
use crate::error::{EditorError, Result};
use crate::parser::cpp_header::CppHeaderPlugin;
use crate::parser::cpp_source::CppSourcePlugin;
use crate::parser::python::PythonPlugin;
use crate::parser::registry::LanguagePlugin;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// File extension -> language plugin.
///
/// Built once at startup and handed to whatever needs to open files.
#[derive(Clone)]
pub struct EditorRegistry {
    plugins: HashMap<String, Arc<dyn LanguagePlugin>>,
}

impl EditorRegistry {
    pub fn empty() -> Self {
        Self {
            plugins: HashMap::new(),
        }
    }

    pub fn register(&mut self, extension: &str, plugin: Arc<dyn LanguagePlugin>) {
        self.plugins
            .insert(extension.trim_start_matches('.').to_string(), plugin);
    }

    pub fn plugin_for(&self, path: &Path) -> Result<Arc<dyn LanguagePlugin>> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_string();

        self.plugins
            .get(&extension)
            .cloned()
            .ok_or(EditorError::UnsupportedLanguage(extension))
    }

    /// Fresh, unloaded editor for the file's language
    pub fn editor_for(&self, path: &Path) -> Result<FileEditor> {
        FileEditor::new(self.plugin_for(path)?)
    }

    pub fn supports(&self, path: &Path) -> bool {
        self.plugin_for(path).is_ok()
    }

    pub fn supported_extensions(&self) -> Vec<&str> {
        let mut extensions: Vec<&str> = self.plugins.keys().map(String::as_str).collect();
        extensions.sort_unstable();
        extensions
    }
}

impl Default for EditorRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();

        let python: Arc<dyn LanguagePlugin> = Arc::new(PythonPlugin);
        let header: Arc<dyn LanguagePlugin> = Arc::new(CppHeaderPlugin);
        let source: Arc<dyn LanguagePlugin> = Arc::new(CppSourcePlugin);

        registry.register("py", python);
        for ext in ["h", "hh", "hpp", "hxx"] {
            registry.register(ext, header.clone());
        }
        for ext in ["cpp", "cc", "cxx"] {
            registry.register(ext, source.clone());
        }

        registry
    }
}
