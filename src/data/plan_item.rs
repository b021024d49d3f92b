use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path};

/// One entry of an implementation plan: a file to generate and what it should contain.
///
/// Plan order is generation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanItem {
    pub path: String,
    pub instruction: String,
}

impl PlanItem {
    pub fn new(path: impl Into<String>, instruction: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            instruction: instruction.into(),
        }
    }

    /// Checks that the item's path can be written under a target root.
    pub fn validate(&self) -> Result<(), PathRejection> {
        validate_relative_path(&self.path)
    }
}

/// Why a relative path was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathRejection {
    Empty,
    /// Bare ".", "/" or "\" once trimmed
    RootAlias(String),
    Absolute(String),
    EscapesRoot(String),
}

impl fmt::Display for PathRejection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PathRejection::Empty => write!(f, "path is empty"),
            PathRejection::RootAlias(p) => write!(f, "path '{}' points at the target root", p),
            PathRejection::Absolute(p) => write!(f, "path '{}' is absolute", p),
            PathRejection::EscapesRoot(p) => {
                write!(f, "path '{}' leaves the target root", p)
            }
        }
    }
}

impl std::error::Error for PathRejection {}

/// Validates a path that is about to be joined onto a target root.
///
/// Rejects empty paths, the bare root aliases, absolute paths and any `..` component.
/// A path must name at least one normal component to be accepted.
pub fn validate_relative_path(raw: &str) -> Result<(), PathRejection> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PathRejection::Empty);
    }
    if matches!(trimmed, "." | "/" | "\\") {
        return Err(PathRejection::RootAlias(trimmed.to_string()));
    }
    if trimmed.starts_with('/') || trimmed.starts_with('\\') || has_drive_prefix(trimmed) {
        return Err(PathRejection::Absolute(trimmed.to_string()));
    }

    let mut normal_components = 0;
    for component in Path::new(&trimmed.replace('\\', "/")).components() {
        match component {
            Component::Normal(_) => normal_components += 1,
            Component::CurDir => {}
            Component::ParentDir => return Err(PathRejection::EscapesRoot(trimmed.to_string())),
            Component::RootDir | Component::Prefix(_) => {
                return Err(PathRejection::Absolute(trimmed.to_string()));
            }
        }
    }

    if normal_components == 0 {
        return Err(PathRejection::RootAlias(trimmed.to_string()));
    }
    Ok(())
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}
