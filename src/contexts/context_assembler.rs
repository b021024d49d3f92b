use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Header written before each file of a directory bundle
pub const FILE_HEADER_PREFIX: &str = "// --- FILE: ";
const FILE_HEADER_SUFFIX: &str = " ---";

static LANGUAGES: &[(&str, &str)] = &[
    ("cs", "C#"),
    ("java", "Java"),
    ("py", "Python"),
    ("js", "JavaScript"),
    ("ts", "TypeScript"),
    ("cpp", "C++"),
    ("c", "C"),
    ("html", "HTML"),
    ("css", "CSS"),
    ("sql", "SQL"),
    ("json", "JSON"),
    ("xml", "XML"),
    ("yaml", "YAML"),
    ("yml", "YAML"),
    ("csproj", "C# Project"),
    ("sln", "Solution"),
    ("md", "Markdown"),
    ("rs", "Rust"),
    ("go", "Go"),
    ("toml", "TOML"),
];

/// Language name for a path, looked up by extension.
pub fn language_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    LANGUAGES
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, name)| *name)
}

/// Which directory entries a bundle leaves out
#[derive(Debug, Clone)]
pub struct ExclusionPolicy {
    pub excluded_dirs: Vec<String>,
    /// Extensions accepted even though they name no language
    pub plain_text_extensions: Vec<String>,
}

impl Default for ExclusionPolicy {
    fn default() -> Self {
        let excluded_dirs = [
            ".git",
            ".svn",
            ".hg",
            "bin",
            "obj",
            "target",
            "build",
            "dist",
            "node_modules",
            ".venv",
            "__pycache__",
            ".vs",
            ".idea",
            ".vscode",
        ];
        Self {
            excluded_dirs: excluded_dirs.iter().map(|s| s.to_string()).collect(),
            plain_text_extensions: vec!["txt".to_string()],
        }
    }
}

impl ExclusionPolicy {
    pub fn excludes_dir(&self, name: &str) -> bool {
        self.excluded_dirs.iter().any(|d| d == name)
    }

    pub fn accepts_file(&self, path: &Path) -> bool {
        if language_for(path).is_some() {
            return true;
        }
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| {
                self.plain_text_extensions
                    .iter()
                    .any(|p| p.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }
}

/// Text gathered for one tool invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextBundle {
    text: String,
    files: Vec<String>,
}

impl ContextBundle {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Relative paths of the files included, in bundle order
    pub fn files(&self) -> &[String] {
        &self.files
    }
}

#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("path '{0}' does not exist")]
    NotFound(PathBuf),
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Builds a [`ContextBundle`] from a file or a directory tree.
///
/// A file yields its full text. A directory yields every accepted file below it,
/// sorted by path, each behind a header naming its path relative to `path`.
/// Unreadable files inside a directory are skipped with a warning.
pub async fn assemble(path: &Path, policy: &ExclusionPolicy) -> Result<ContextBundle, AssembleError> {
    if path.is_file() {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| AssembleError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        return Ok(ContextBundle {
            text,
            files: vec![display_name(path)],
        });
    }
    if !path.is_dir() {
        return Err(AssembleError::NotFound(path.to_path_buf()));
    }

    let mut candidates = Vec::new();
    collect_files(path, policy, &mut candidates);
    candidates.sort();

    let mut bundle = ContextBundle::default();
    for file in candidates {
        let content = match tokio::fs::read_to_string(&file).await {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("Skipping unreadable file {}: {}", file.display(), e);
                continue;
            }
        };
        let relative = relative_display(path, &file);
        bundle.text.push_str(FILE_HEADER_PREFIX);
        bundle.text.push_str(&relative);
        bundle.text.push_str(FILE_HEADER_SUFFIX);
        bundle.text.push('\n');
        bundle.text.push_str(&content);
        bundle.text.push_str("\n\n");
        bundle.files.push(relative);
    }

    tracing::debug!(
        root = %path.display(),
        files = bundle.files.len(),
        "assembled context bundle"
    );
    Ok(bundle)
}

/// Reference material for a fix: one file, or up to `limit` recognized files from
/// the top level of a directory. `exclude` is left out.
///
/// Returns the text and the names of the files it includes.
pub async fn assemble_references(path: &Path, exclude: &Path, limit: usize) -> (String, Vec<String>) {
    let excluded = fs::canonicalize(exclude).unwrap_or_else(|_| exclude.to_path_buf());
    let files: Vec<PathBuf> = if path.is_file() {
        vec![path.to_path_buf()]
    } else if path.is_dir() {
        let mut entries: Vec<PathBuf> = match fs::read_dir(path) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file() && language_for(p).is_some())
                .filter(|p| fs::canonicalize(p).map(|c| c != excluded).unwrap_or(true))
                .collect(),
            Err(e) => {
                tracing::warn!("Cannot list {}: {}", path.display(), e);
                Vec::new()
            }
        };
        entries.sort();
        entries.truncate(limit);
        entries
    } else {
        tracing::warn!("Reference path {} does not exist", path.display());
        Vec::new()
    };

    let mut text = String::new();
    let mut names = Vec::new();
    for file in files {
        match tokio::fs::read_to_string(&file).await {
            Ok(content) => {
                let name = display_name(&file);
                text.push_str(&format!("\n// --- Reference: {} ---\n{}\n", name, content));
                names.push(name);
            }
            Err(e) => tracing::warn!("Skipping unreadable reference {}: {}", file.display(), e),
        }
    }
    (text, names)
}

fn collect_files(dir: &Path, policy: &ExclusionPolicy, files: &mut Vec<PathBuf>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Skipping unreadable directory {}: {}", dir.display(), e);
            return;
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Skipping entry in {}: {}", dir.display(), e);
                continue;
            }
        };
        let path = entry.path();
        let file_type = match entry.file_type() {
            Ok(file_type) => file_type,
            Err(e) => {
                tracing::warn!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };
        if file_type.is_symlink() && path.is_dir() {
            tracing::debug!("Not following directory link {}", path.display());
            continue;
        }
        if file_type.is_dir() {
            let name = entry.file_name();
            if policy.excludes_dir(&name.to_string_lossy()) {
                continue;
            }
            collect_files(&path, policy, files);
        } else if policy.accepts_file(&path) {
            files.push(path);
        }
    }
}

fn relative_display(root: &Path, file: &Path) -> String {
    let relative = file.strip_prefix(root).unwrap_or(file);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, relative: &str, content: &[u8]) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn detects_language_by_extension() {
        assert_eq!(language_for(Path::new("Program.CS")), Some("C#"));
        assert_eq!(language_for(Path::new("src/lib.rs")), Some("Rust"));
        assert_eq!(language_for(Path::new("notes.txt")), None);
        assert_eq!(language_for(Path::new("Makefile")), None);
    }

    #[tokio::test]
    async fn single_file_yields_full_text() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "requirements.txt", b"build a calculator\n");

        let bundle = assemble(&dir.path().join("requirements.txt"), &ExclusionPolicy::default())
            .await
            .unwrap();
        assert_eq!(bundle.as_str(), "build a calculator\n");
        assert_eq!(bundle.files(), ["requirements.txt"]);
    }

    #[tokio::test]
    async fn directory_bundle_filters_noise() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "src/main.py", b"print('hi')");
        write(root, "notes.txt", b"todo list");
        write(root, "logo.png", b"\x89PNG");
        write(root, ".git/config", b"[core]");
        write(root, "node_modules/pkg/index.js", b"module.exports = 1");
        write(root, "app/bin/Debug/out.cs", b"class Out {}");
        write(root, "binary_tools/helper.js", b"helper()");

        let bundle = assemble(root, &ExclusionPolicy::default()).await.unwrap();

        assert_eq!(
            bundle.files(),
            ["binary_tools/helper.js", "notes.txt", "src/main.py"]
        );
        let text = bundle.as_str();
        assert!(text.contains("// --- FILE: src/main.py ---\nprint('hi')\n"));
        assert!(text.contains("// --- FILE: notes.txt ---\ntodo list\n"));
        assert!(!text.contains("[core]"));
        assert!(!text.contains("module.exports"));
        assert!(!text.contains("class Out"));
    }

    #[tokio::test]
    async fn unreadable_file_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "good.rs", b"fn good() {}");
        write(root, "broken.rs", &[0xff, 0xfe, 0x00, 0x80]);

        let bundle = assemble(root, &ExclusionPolicy::default()).await.unwrap();
        assert_eq!(bundle.files(), ["good.rs"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn directory_links_are_not_followed() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "src/main.py", b"print('hi')");
        write(root, "shared/util.py", b"def util(): pass");
        std::os::unix::fs::symlink(root.join("src"), root.join("src/loop")).unwrap();
        std::os::unix::fs::symlink(root.join("shared/util.py"), root.join("src/util.py")).unwrap();

        let bundle = assemble(root, &ExclusionPolicy::default()).await.unwrap();
        assert_eq!(
            bundle.files(),
            ["shared/util.py", "src/main.py", "src/util.py"]
        );
    }

    #[tokio::test]
    async fn missing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = assemble(&dir.path().join("nope"), &ExclusionPolicy::default()).await;
        assert!(matches!(result, Err(AssembleError::NotFound(_))));
    }

    #[tokio::test]
    async fn references_exclude_the_fixed_file_and_respect_limit() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for name in ["a.cs", "b.cs", "c.cs", "d.cs", "e.cs", "f.cs", "target.cs"] {
            write(root, name, format!("// {}", name).as_bytes());
        }
        write(root, "readme.txt", b"ignored");

        let (text, names) = assemble_references(root, &root.join("target.cs"), 5).await;
        assert_eq!(names, ["a.cs", "b.cs", "c.cs", "d.cs", "e.cs"]);
        assert!(!text.contains("// target.cs"));
        assert!(text.contains("// --- Reference: a.cs ---\n// a.cs\n"));

        let (_, names) = assemble_references(root, &root.join("a.cs"), 10).await;
        assert!(!names.contains(&"a.cs".to_string()));
        assert!(names.contains(&"target.cs".to_string()));
    }
}
