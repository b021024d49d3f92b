use anyhow::{Context, Result};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

mod oracle_session;
mod progress;
mod prompts;

use dbt::contexts::{
    ApplyReport, ExclusionPolicy, Oracle, PlanExecutor, PlanOutcome, PlanParser, assemble,
    assemble_references, extract_code_block, extract_response, language_for, oracle_failure,
    plan_audit_path, split_file_markers, validate_plan,
};
use dbt::data::{GenerationRequest, LineRange};
use progress::ProgressIndicator;

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub verbose: bool,
    pub dry_run: bool,
    pub model_override: Option<String>,
}

const SUMMARY_FILE: &str = "summarize.txt";
const REQUIREMENTS_FILE: &str = "requirements.txt";
const FIX_RADIUS: usize = 20;
const MAX_REFERENCE_FILES: usize = 5;
const FIX_TEMPERATURE: f32 = 0.1;
const SINGLE_SHOT_TEMPERATURE: f32 = 0.2;

pub async fn summarize(path: PathBuf, config: &Config) -> Result<()> {
    let bundle = assemble(&path, &ExclusionPolicy::default())
        .await
        .with_context(|| format!("Failed to load {}", path.display()))?;

    if bundle.files().is_empty() {
        println!("No recognized source files found in {}", path.display());
        return Ok(());
    }
    println!("Loaded {} file(s) from {}", bundle.files().len(), path.display());
    if config.verbose {
        for file in bundle.files() {
            println!("  - {}", file);
        }
    }

    let client = oracle_session::connect(config).await?;
    let raw = client
        .generate(&GenerationRequest::new(prompts::summary(&bundle)))
        .await;
    let report = extract_response(&raw);
    if let Some(message) = oracle_failure(&report) {
        eprintln!("✗ Failed to summarize {}: {}", path.display(), message);
        return Ok(());
    }

    println!("\n{}", "=".repeat(60));
    println!("{}", report.trim());
    println!("{}", "=".repeat(60));

    if config.dry_run {
        println!("⊚ Dry run: not saving {}", SUMMARY_FILE);
        return Ok(());
    }
    fs::write(SUMMARY_FILE, &report)
        .with_context(|| format!("Failed to write {}", SUMMARY_FILE))?;
    println!("✓ Summary saved to {}", SUMMARY_FILE);
    Ok(())
}

pub struct FixArgs {
    pub file: PathBuf,
    pub line: Option<usize>,
    pub description: Option<String>,
    pub with: Option<PathBuf>,
}

pub async fn fix(args: FixArgs, config: &Config) -> Result<()> {
    if !args.file.is_file() {
        anyhow::bail!("File {} does not exist", args.file.display());
    }
    let client = oracle_session::connect(config).await?;
    fix_with(&client, args, config).await
}

async fn fix_with<O: Oracle>(oracle: &O, args: FixArgs, config: &Config) -> Result<()> {
    let content = fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let mut lines: Vec<String> = content.lines().map(str::to_string).collect();

    let range = LineRange::around(args.line.unwrap_or(0), FIX_RADIUS, lines.len());
    let block = range.slice(&lines)?.join("\n");
    let described = range.describe(lines.len());
    let language = language_for(&args.file).unwrap_or("source");
    println!(
        "Fixing {} ({}, {} of {} lines)",
        args.file.display(),
        language,
        described,
        lines.len()
    );

    let references = match &args.with {
        Some(path) => {
            let (text, names) = assemble_references(path, &args.file, MAX_REFERENCE_FILES).await;
            if !names.is_empty() {
                println!("Using reference files: {}", names.join(", "));
            }
            text
        }
        None => String::new(),
    };

    let prompt = prompts::fix(&prompts::FixPrompt {
        language,
        code: &block,
        range: &described,
        description: args.description.as_deref(),
        references: &references,
    });

    let raw = oracle
        .generate(&GenerationRequest::new(prompt).with_temperature(FIX_TEMPERATURE))
        .await;
    let replacement = match extract_code_block(&extract_response(&raw)) {
        Ok(replacement) => replacement,
        Err(e) => {
            eprintln!("✗ Fix not applied to {}: {}", args.file.display(), e);
            return Ok(());
        }
    };

    if config.verbose {
        println!("Corrected block ({} lines):", replacement.len());
        for line in &replacement {
            println!("  {}", line);
        }
    }

    range.splice(&mut lines, replacement)?;
    let mut fixed = lines.join("\n");
    fixed.push('\n');

    if config.dry_run {
        println!("⊚ Dry run: {} not modified", args.file.display());
        return Ok(());
    }
    fs::write(&args.file, fixed)
        .with_context(|| format!("Failed to write {}", args.file.display()))?;
    println!("✓ Fixed {} ({})", args.file.display(), described);
    Ok(())
}

pub async fn create(idea: PathBuf, target: PathBuf, yes: bool, config: &Config) -> Result<()> {
    if !idea.is_file() {
        anyhow::bail!("Idea file {} does not exist", idea.display());
    }
    let client = oracle_session::connect(config).await?;
    create_with(&client, idea, target, yes, config).await
}

async fn create_with<O: Oracle>(
    oracle: &O,
    idea: PathBuf,
    target: PathBuf,
    yes: bool,
    config: &Config,
) -> Result<()> {
    let idea_text = fs::read_to_string(&idea)
        .with_context(|| format!("Failed to read idea file {}", idea.display()))?;

    println!("Generating {} from {}", REQUIREMENTS_FILE, idea.display());
    let raw = oracle
        .generate(&GenerationRequest::new(prompts::requirements(&idea_text)))
        .await;
    let text = extract_response(&raw);
    if let Some(message) = oracle_failure(&text) {
        eprintln!("✗ Failed to generate requirements: {}", message);
        return Ok(());
    }
    let requirements = strip_fences(&text);
    if requirements.is_empty() {
        eprintln!("✗ The oracle returned empty requirements");
        return Ok(());
    }

    let requirements_path = target.join(REQUIREMENTS_FILE);
    if config.dry_run {
        println!("⊚ Dry run: would write {}", requirements_path.display());
        println!("{}", requirements);
        return Ok(());
    }
    fs::create_dir_all(&target)
        .with_context(|| format!("Failed to create {}", target.display()))?;
    fs::write(&requirements_path, &requirements)
        .with_context(|| format!("Failed to write {}", requirements_path.display()))?;
    println!("✓ Wrote {}", requirements_path.display());

    if yes || confirm("Proceed with implementation now? (y/n) ")? {
        implement_with(oracle, requirements_path, target, false, config).await
    } else {
        println!("Run `dbt implement {} {}` when ready.", requirements_path.display(), target.display());
        Ok(())
    }
}

pub async fn implement(
    source: PathBuf,
    target: PathBuf,
    single_shot: bool,
    config: &Config,
) -> Result<()> {
    if !source.exists() {
        anyhow::bail!("Source {} does not exist", source.display());
    }
    if !target.is_dir() {
        anyhow::bail!("Target {} is not an existing directory", target.display());
    }
    let client = oracle_session::connect(config).await?;
    implement_with(&client, source, target, single_shot, config).await
}

async fn implement_with<O: Oracle>(
    oracle: &O,
    source: PathBuf,
    target: PathBuf,
    single_shot: bool,
    config: &Config,
) -> Result<()> {
    let policy = ExclusionPolicy::default();
    let source_bundle = assemble(&source, &policy)
        .await
        .with_context(|| format!("Failed to load source {}", source.display()))?;
    let target_bundle = assemble(&target, &policy)
        .await
        .with_context(|| format!("Failed to load target {}", target.display()))?;
    println!(
        "Source: {} file(s), target: {} file(s)",
        source_bundle.files().len(),
        target_bundle.files().len()
    );

    let executor = PlanExecutor::new(oracle, &target, config.dry_run);

    let report = if single_shot {
        let prompt = prompts::single_shot(source_bundle.as_str(), target_bundle.as_str());
        let raw = oracle
            .generate(&GenerationRequest::new(prompt).with_temperature(SINGLE_SHOT_TEMPERATURE))
            .await;
        let text = extract_response(&raw);
        if let Some(message) = oracle_failure(&text) {
            eprintln!("✗ Implementation request failed: {}", message);
            return Ok(());
        }
        let artifacts = split_file_markers(&text);
        if artifacts.is_empty() {
            println!("Nothing to apply: the response named no files");
            return Ok(());
        }
        let mut progress = ProgressIndicator::new(artifacts.len(), config.dry_run);
        let report = executor.apply_artifacts(&artifacts, &mut progress).await;
        progress.finish(&report);
        report
    } else {
        let audit_path = plan_audit_path(&source);
        let request = GenerationRequest::new(prompts::plan(
            source_bundle.as_str(),
            target_bundle.as_str(),
        ))
        .with_format("json");

        println!("Requesting implementation plan");
        let outcome = PlanParser::default()
            .with_audit_path(&audit_path)
            .request_plan(oracle, &request)
            .await;
        if config.verbose {
            println!("Plan response saved to {}", audit_path.display());
        }

        let items = match outcome {
            PlanOutcome::Decoded { items, attempts } => {
                if attempts > 1 {
                    println!("Plan decoded after {} attempts", attempts);
                }
                items
            }
            PlanOutcome::Exhausted {
                attempts,
                last_response,
            } => {
                eprintln!("✗ Could not interpret the plan after {} attempts. Last response:", attempts);
                eprintln!("{}", last_response);
                Vec::new()
            }
        };

        let plan = validate_plan(items);
        for (item, rejection) in &plan.dropped {
            eprintln!("✗ Dropped plan item '{}': {}", item.path, rejection);
        }
        if plan.is_empty() {
            println!("The implementation plan is empty; nothing written");
            return Ok(());
        }
        println!("Plan: {} file(s) to generate", plan.items.len());

        let source_text = source_bundle.as_str();
        let target_text = target_bundle.as_str();
        let mut progress = ProgressIndicator::new(plan.items.len(), config.dry_run);
        let report = executor
            .execute(
                &plan.items,
                |item| GenerationRequest::new(prompts::file(item, source_text, target_text)),
                &mut progress,
            )
            .await;
        progress.finish(&report);
        report
    };

    save_report(&report, &target, config)
}

fn save_report(report: &ApplyReport, target: &Path, config: &Config) -> Result<()> {
    if config.dry_run {
        println!("⊚ Dry run: no report written");
        return Ok(());
    }
    let path = report.save(target)?;
    println!("Report written to {}", path.display());
    Ok(())
}

/// Drops fence lines and surrounding whitespace from free-form text.
fn strip_fences(text: &str) -> String {
    text.lines()
        .filter(|l| !l.trim().starts_with(dbt::contexts::FENCE))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn confirm(question: &str) -> Result<bool> {
    print!("{}", question);
    io::stdout().flush().context("Failed to flush stdout")?;
    let mut answer = String::new();
    io::stdin()
        .read_line(&mut answer)
        .context("Failed to read user input")?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
