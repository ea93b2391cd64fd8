use std::path::{Path, PathBuf};

/// Runtime configuration read from the environment
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory that tool file names are resolved against
    pub project_path: PathBuf,
}

impl Config {
    pub fn new(project_path: impl Into<PathBuf>) -> Self {
        Self {
            project_path: project_path.into(),
        }
    }

    /// `PROJECT_PATH`, falling back to the current directory
    pub fn from_env() -> Self {
        let project_path = std::env::var_os("PROJECT_PATH")
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));

        Self { project_path }
    }

    pub fn resolve(&self, filename: &str) -> PathBuf {
        let path = Path::new(filename);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_path.join(path)
        }
    }
}
