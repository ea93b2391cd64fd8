use thiserror::Error;

/// Errors raised while indexing or editing a source file
#[derive(Debug, Error)]
pub enum EditorError {
    #[error("unsupported file extension: {0:?}")]
    UnsupportedLanguage(String),

    #[error("{category} '{name}'{} not found", class_suffix(.class_name))]
    NotFound {
        category: String,
        name: String,
        class_name: Option<String>,
    },

    #[error("node text is not valid UTF-8: {0}")]
    Decode(#[from] std::str::Utf8Error),

    #[error("invalid grammar query: {0:?}")]
    Query(#[from] tree_sitter::QueryError),

    #[error("failed to set parser language: {0}")]
    Language(#[from] tree_sitter::LanguageError),

    #[error("parser produced no syntax tree")]
    Parse,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn class_suffix(class_name: &Option<String>) -> String {
    match class_name {
        Some(class) => format!(" in class '{}'", class),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, EditorError>;
