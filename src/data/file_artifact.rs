use serde::Serialize;

/// A file body ready to be written relative to a target root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileArtifact {
    pub relative_path: String,
    pub content: String,
}

impl FileArtifact {
    pub fn new(relative_path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            relative_path: relative_path.into(),
            content: content.into(),
        }
    }
}
