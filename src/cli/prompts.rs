//! Prompt templates sent to the oracle, one per tool.

use dbt::contexts::ContextBundle;
use dbt::data::PlanItem;

pub fn summary(bundle: &ContextBundle) -> String {
    format!(
        "[ROLE]: Expert code analyst\n\
         [TASK]: Write a brief, assertive technical report about the code below. \
         Cover its purpose, structure, complexity and dependencies between files.\n\
         [FILES]: {}\n\
         [CODE]:\n{}\n\
         [REPORT]:",
        bundle.files().join(", "),
        bundle.as_str()
    )
}

pub struct FixPrompt<'a> {
    pub language: &'a str,
    pub code: &'a str,
    pub range: &'a str,
    pub description: Option<&'a str>,
    pub references: &'a str,
}

pub fn fix(p: &FixPrompt<'_>) -> String {
    let mut prompt = format!(
        "[ROLE]: Expert {lang} code fixer\n\
         [TASK]: Fix the {lang} code provided below ({range}). Output ONLY the corrected code block.\n\
         [RULES]:\n\
         1. Use a markdown code block (```).\n\
         2. RETURN CODE ONLY. Do NOT add comments at the end of lines (e.g. 'int x = 0; // Fixed').\n\
         3. REMOVE existing error comments from the input.\n\
         4. Maintain original indentation and newlines.\n\
         5. Return the complete block, every line of it, not only the changed lines.\n",
        lang = p.language,
        range = p.range,
    );
    if let Some(description) = p.description.filter(|d| !d.trim().is_empty()) {
        prompt.push_str(&format!("\n[ISSUE DESCRIBED]:\n{}\n", description.trim()));
    }
    if !p.references.is_empty() {
        prompt.push_str(&format!("\n[RELATED FILES]:{}\n", p.references));
    }
    prompt.push_str(&format!("\n[CODE TO FIX]:\n{}\n\n[CORRECTED CODE]:", p.code));
    prompt
}

pub fn requirements(idea: &str) -> String {
    format!(
        "Act as a Senior Software Architect.\n\
         Analyze the following project idea and generate a comprehensive 'requirements.txt' file.\n\
         The file should outline the project structure, necessary files, and a brief description of \
         what each file should contain.\n\
         This output will be used by an automated implementation tool to generate the code.\n\n\
         Idea:\n{}\n\n\
         Output ONLY the content of the requirements.txt file. Do not include markdown code blocks \
         like ```txt. Just the raw content.",
        idea
    )
}

pub fn plan(source: &str, target: &str) -> String {
    format!(
        "[ROLE]: Senior Software Architect\n\
         [TASK]: Analyze the SOURCE requirements and TARGET project structure. Create a detailed plan \
         of files to create or modify.\n\
         [OUTPUT]: A JSON Array where each item represents a file.\n\
         [EXAMPLE]:\n\
         [\n  \
         {{ \"name\": \"src/main.py\", \"instructions\": \"Implement the main entry point. Import math_parser. Initialize the app...\" }},\n  \
         {{ \"name\": \"tests/test_main.py\", \"instructions\": \"Create unit tests for the main module...\" }}\n\
         ]\n\
         [SOURCE]:\n{}\n\
         [TARGET]:\n{}\n\
         [IMPORTANT]:\n\
         1. Return ONLY the JSON array.\n\
         2. Use the programming language and file extensions specified in SOURCE (e.g. .py, .js, .cs).\n\
         3. Use paths relative to the TARGET root.\n\
         4. Do NOT use generic instructions. Extract specific requirements for each file from SOURCE.",
        source, target
    )
}

pub fn file(item: &PlanItem, source: &str, target: &str) -> String {
    format!(
        "[ROLE]: Senior Developer\n\
         [TASK]: Implement the code for the file: '{}'.\n\
         [INSTRUCTION]: {}\n\
         [CONTEXT]:\n\
         Requirements: {}\n\
         Project Structure: {}\n\
         [RULES]:\n\
         1. Output ONLY the code for the file.\n\
         2. Wrap the code in a single markdown code block (```).\n\
         3. Ensure the code is complete, compilable, and follows the instructions.\n",
        item.path.trim(),
        item.instruction,
        source,
        target
    )
}

pub fn single_shot(source: &str, target: &str) -> String {
    format!(
        "[ROLE]: Senior Software Architect & Developer\n\
         [TASK]: Implement the functionality described in the SOURCE into the TARGET project.\n\
         [RULES]:\n\
         1. Analyze the SOURCE (requirements or code) and TARGET (existing project structure).\n\
         2. Output the FULL content of new files or modified files needed for the implementation.\n\
         3. CRITICAL: Start every file block with a comment line exactly like this: \
         `// FILE: path/to/file.ext` (use relative paths).\n\
         4. Use markdown code blocks (```).\n\
         5. Ensure the code is complete, compilable, and integrates with the existing Target structure.\n\
         6. If modifying an existing file, provide the complete new content of that file.\n\n\
         [SOURCE CONTEXT]:\n{}\n\n\
         [TARGET PROJECT CONTEXT]:\n{}\n\n\
         [OUTPUT]:",
        source, target
    )
}
