use super::artifact_writer::{ArtifactWriter, WriteError};
use super::code_block_extractor::{CodeExtractionError, extract_code_block};
use super::oracle_client::Oracle;
use super::response_extractor::extract_response;
use crate::data::{FileArtifact, GenerationRequest, PathRejection, PlanItem};
use anyhow::{Context, Result};
use serde_json::json;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const REPORT_FILE: &str = "implementation_report.json";

/// Why one plan item or artifact produced no file
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SkipReason {
    #[error("invalid path: {0}")]
    InvalidPath(PathRejection),
    #[error("oracle failure: {0}")]
    Oracle(String),
    #[error("no valid code extracted")]
    NoCode,
    #[error("write failed: {0}")]
    Write(String),
}

impl From<CodeExtractionError> for SkipReason {
    fn from(e: CodeExtractionError) -> Self {
        match e {
            CodeExtractionError::NoValidCode => SkipReason::NoCode,
            CodeExtractionError::OracleFailure(message) => SkipReason::Oracle(message),
        }
    }
}

impl From<WriteError> for SkipReason {
    fn from(e: WriteError) -> Self {
        match e {
            WriteError::InvalidPath(rejection) => SkipReason::InvalidPath(rejection),
            other => SkipReason::Write(other.to_string()),
        }
    }
}

/// Receives per-item progress while a plan is applied.
pub trait ApplyObserver {
    fn item_started(&mut self, _path: &str) {}
    fn item_finished(&mut self, _path: &str, _outcome: Result<&Path, &SkipReason>) {}
}

impl ApplyObserver for () {}

/// What applying a plan or a multi-file response produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyReport {
    /// Target paths written, or that would have been in a dry run
    pub written: Vec<PathBuf>,
    pub skipped: Vec<(String, SkipReason)>,
    pub dry_run: bool,
}

impl ApplyReport {
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "dry_run": self.dry_run,
            "written": self
                .written
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>(),
            "skipped": self
                .skipped
                .iter()
                .map(|(path, reason)| json!({ "path": path, "reason": reason.to_string() }))
                .collect::<Vec<_>>(),
        })
    }

    /// Writes the report into `root` and returns its path.
    pub fn save(&self, root: &Path) -> Result<PathBuf> {
        let path = root.join(REPORT_FILE);
        let content = serde_json::to_string_pretty(&self.to_json())
            .context("Failed to serialize implementation report")?;
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        Ok(path)
    }

    fn record(&mut self, path: &str, outcome: Result<PathBuf, SkipReason>) {
        match outcome {
            Ok(written) => self.written.push(written),
            Err(reason) => {
                tracing::warn!("Skipping {}: {}", path, reason);
                self.skipped.push((path.to_string(), reason));
            }
        }
    }
}

/// Turns plan items into files, one oracle call per item, in plan order.
///
/// A failing item is recorded and the next one proceeds; files already
/// written stay in place.
pub struct PlanExecutor<'a, O> {
    oracle: &'a O,
    writer: ArtifactWriter,
    dry_run: bool,
}

impl<'a, O: Oracle> PlanExecutor<'a, O> {
    pub fn new(oracle: &'a O, target_root: impl Into<PathBuf>, dry_run: bool) -> Self {
        Self {
            oracle,
            writer: ArtifactWriter::new(target_root),
            dry_run,
        }
    }

    pub async fn execute<F>(
        &self,
        items: &[PlanItem],
        build_request: F,
        observer: &mut impl ApplyObserver,
    ) -> ApplyReport
    where
        F: Fn(&PlanItem) -> GenerationRequest,
    {
        let mut report = self.empty_report();
        for item in items {
            observer.item_started(&item.path);
            let outcome = self.generate_item(item, &build_request).await;
            observer.item_finished(&item.path, outcome.as_deref());
            report.record(&item.path, outcome);
        }
        report
    }

    /// Writes artifacts that already carry their content, such as the files of a
    /// single-shot response.
    pub async fn apply_artifacts(
        &self,
        artifacts: &[FileArtifact],
        observer: &mut impl ApplyObserver,
    ) -> ApplyReport {
        let mut report = self.empty_report();
        for artifact in artifacts {
            observer.item_started(&artifact.relative_path);
            let outcome = self.apply(artifact).await;
            observer.item_finished(&artifact.relative_path, outcome.as_deref());
            report.record(&artifact.relative_path, outcome);
        }
        report
    }

    async fn generate_item<F>(&self, item: &PlanItem, build_request: &F) -> Result<PathBuf, SkipReason>
    where
        F: Fn(&PlanItem) -> GenerationRequest,
    {
        item.validate().map_err(SkipReason::InvalidPath)?;

        let raw = self.oracle.generate(&build_request(item)).await;
        let text = extract_response(&raw);
        let lines = extract_code_block(&text)?;

        let mut content = lines.join("\n");
        content.push('\n');
        self.apply(&FileArtifact::new(item.path.trim(), content)).await
    }

    async fn apply(&self, artifact: &FileArtifact) -> Result<PathBuf, SkipReason> {
        if self.dry_run {
            let path = self
                .writer
                .target_path(&artifact.relative_path)
                .map_err(SkipReason::InvalidPath)?;
            tracing::info!(path = %path.display(), bytes = artifact.content.len(), "dry run, not writing");
            return Ok(path);
        }
        Ok(self.writer.write(artifact).await?)
    }

    fn empty_report(&self) -> ApplyReport {
        ApplyReport {
            dry_run: self.dry_run,
            ..ApplyReport::default()
        }
    }
}
