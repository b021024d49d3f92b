use super::code_block_extractor::FENCE;
use crate::data::FileArtifact;
use regex::Regex;
use std::sync::OnceLock;

fn marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?://|#)\s*FILE\s*:").expect("valid regex"))
}

/// Path named by a marker line such as `// FILE: src/app.py` or `# FILE: setup.cfg`.
pub fn marker_path(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    if !marker_re().is_match(trimmed) {
        return None;
    }
    trimmed.split_once(':').map(|(_, path)| path.trim())
}

/// Splits one response carrying several files behind marker lines.
///
/// Text before the first marker and stray fence lines are dropped. Body lines keep
/// their original terminators. No markers means no artifacts.
pub fn split_file_markers(text: &str) -> Vec<FileArtifact> {
    let mut artifacts = Vec::new();
    let mut current: Option<String> = None;
    let mut body = String::new();

    for line in text.split_inclusive('\n') {
        if let Some(path) = marker_path(line) {
            if let Some(target) = current.take() {
                artifacts.push(FileArtifact::new(target, std::mem::take(&mut body)));
            }
            body.clear();
            current = Some(path.to_string());
            continue;
        }
        if line.trim().starts_with(FENCE) {
            continue;
        }
        if current.is_some() {
            body.push_str(line);
        }
    }

    if let Some(target) = current {
        artifacts.push(FileArtifact::new(target, body));
    }
    artifacts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_both_marker_styles() {
        assert_eq!(marker_path("// FILE: src/main.rs"), Some("src/main.rs"));
        assert_eq!(marker_path("   # FILE:  setup.cfg  "), Some("setup.cfg"));
        assert_eq!(marker_path("//FILE:a.txt"), Some("a.txt"));
        assert_eq!(marker_path("// --- FILE: ctx.rs ---"), None);
        assert_eq!(marker_path("let file = \"// FILE: x\";"), None);
    }

    #[test]
    fn splits_two_files_without_cross_contamination() {
        let text = "Here are the files.\n\
                    // FILE: a.txt\n\
                    ```\n\
                    alpha one\n\
                    alpha two\n\
                    ```\n\
                    // FILE: b/c.txt\n\
                    ```text\n\
                    gamma\n\
                    ```\n";
        let artifacts = split_file_markers(text);
        assert_eq!(
            artifacts,
            [
                FileArtifact::new("a.txt", "alpha one\nalpha two\n"),
                FileArtifact::new("b/c.txt", "gamma\n"),
            ]
        );
    }

    #[test]
    fn preserves_line_terminators() {
        let text = "# FILE: run.sh\r\necho hi\r\n\r\necho bye";
        let artifacts = split_file_markers(text);
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].content, "echo hi\r\n\r\necho bye");
    }

    #[test]
    fn path_is_everything_after_the_first_colon() {
        let artifacts = split_file_markers("// FILE: docs/notes:v2.md\nbody\n");
        assert_eq!(artifacts[0].relative_path, "docs/notes:v2.md");
    }

    #[test]
    fn no_markers_yields_nothing() {
        assert!(split_file_markers("```\nfn main() {}\n```\n").is_empty());
        assert!(split_file_markers("").is_empty());
    }
}
