mod artifact_writer;
mod code_block_extractor;
mod context_assembler;
mod file_marker_splitter;
mod oracle_client;
mod plan_executor;
mod plan_parser;
mod response_extractor;

pub use artifact_writer::{ArtifactWriter, WriteError};
pub use code_block_extractor::{
    CodeExtractionError, FENCE, FILLER_PREFIXES, extract_code_block, extract_code_lines,
};
pub use context_assembler::{
    AssembleError, ContextBundle, ExclusionPolicy, FILE_HEADER_PREFIX, assemble,
    assemble_references, language_for,
};
pub use file_marker_splitter::{marker_path, split_file_markers};
pub use oracle_client::{FAILURE_PREFIX, Oracle, OracleClient, OracleSettings, oracle_failure};
pub use plan_executor::{ApplyObserver, ApplyReport, PlanExecutor, REPORT_FILE, SkipReason};
pub use plan_parser::{
    DEFAULT_MAX_ATTEMPTS, DecodeError, PLAN_AUDIT_FILE, PlanOutcome, PlanParser, ValidatedPlan,
    decode_plan, plan_audit_path, validate_plan,
};
pub use response_extractor::{EMPTY_RESPONSE, MISSING_RESPONSE, extract_response};
