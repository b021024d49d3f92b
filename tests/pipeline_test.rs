use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;

use dbt::contexts::{
    ExclusionPolicy, Oracle, PLAN_AUDIT_FILE, PlanExecutor, PlanOutcome, PlanParser, REPORT_FILE,
    SkipReason, assemble, extract_code_block, extract_response, plan_audit_path,
    split_file_markers, validate_plan,
};
use dbt::data::{GenerationRequest, LineRange};

/// Replays canned oracle replies in order.
struct ScriptedOracle {
    replies: RefCell<VecDeque<String>>,
    prompts: RefCell<Vec<String>>,
}

impl ScriptedOracle {
    fn new(replies: &[String]) -> Self {
        Self {
            replies: RefCell::new(replies.iter().cloned().collect()),
            prompts: RefCell::new(Vec::new()),
        }
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }
}

impl Oracle for ScriptedOracle {
    async fn generate(&self, request: &GenerationRequest) -> String {
        self.prompts.borrow_mut().push(request.prompt.clone());
        self.replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| "Error: no more replies".to_string())
    }
}

fn envelope(text: &str) -> String {
    serde_json::json!({ "response": text, "done": true }).to_string()
}

#[tokio::test]
async fn plan_mode_writes_valid_items_only() {
    let workspace = tempfile::tempdir().unwrap();
    let requirements = workspace.path().join("requirements.txt");
    fs::write(&requirements, "A greeter in Python with tests.").unwrap();
    let target = workspace.path().join("out");
    fs::create_dir_all(&target).unwrap();

    let plan_text = r#"Here is the plan you asked for:
[
  {"name": "greeter.py", "instructions": "greet(name) function"},
  {"name": "  ", "instructions": "nothing"},
  {"name": "/etc/passwd", "instructions": "absolute"},
  {"name": "tests/test_greeter.py", "instructions": "pytest for greet"}
]
Hope this helps!"#;
    let oracle = ScriptedOracle::new(&[
        envelope(plan_text),
        envelope("```python\ndef greet(name):\n    return f\"Hello, {name}!\"\n```"),
        envelope("```python\nfrom greeter import greet\n\n\ndef test_greet():\n    assert greet('x') == 'Hello, x!'\n```"),
    ]);

    let source = assemble(&requirements, &ExclusionPolicy::default()).await.unwrap();
    let audit = plan_audit_path(&requirements);
    let outcome = PlanParser::default()
        .with_audit_path(&audit)
        .request_plan(&oracle, &GenerationRequest::new(source.as_str()).with_format("json"))
        .await;

    let (items, attempts) = match outcome {
        PlanOutcome::Decoded { items, attempts } => (items, attempts),
        other => panic!("plan did not decode: {:?}", other),
    };
    assert_eq!(attempts, 1);
    assert_eq!(items.len(), 4);
    assert_eq!(fs::read_to_string(workspace.path().join(PLAN_AUDIT_FILE)).unwrap(), plan_text);

    let plan = validate_plan(items);
    assert_eq!(plan.dropped.len(), 2);

    let executor = PlanExecutor::new(&oracle, &target, false);
    let report = executor
        .execute(
            &plan.items,
            |item| GenerationRequest::new(format!("FILE {}", item.path)),
            &mut (),
        )
        .await;

    assert_eq!(
        oracle.prompts()[1..],
        ["FILE greeter.py", "FILE tests/test_greeter.py"]
    );
    assert!(report.skipped.is_empty());
    assert_eq!(
        fs::read_to_string(target.join("greeter.py")).unwrap(),
        "def greet(name):\n    return f\"Hello, {name}!\"\n"
    );
    assert_eq!(
        fs::read_to_string(target.join("tests/test_greeter.py")).unwrap(),
        "from greeter import greet\n\n\ndef test_greet():\n    assert greet('x') == 'Hello, x!'\n"
    );

    let report_path = report.save(&target).unwrap();
    assert_eq!(report_path, target.join(REPORT_FILE));
}

#[tokio::test]
async fn exhausted_plan_writes_nothing() {
    let workspace = tempfile::tempdir().unwrap();
    let target = workspace.path().join("out");
    fs::create_dir_all(&target).unwrap();
    let oracle = ScriptedOracle::new(&[
        envelope("I am not sure what you mean."),
        "not even json".to_string(),
        envelope("Still no plan."),
    ]);

    let outcome = PlanParser::new(3)
        .with_audit_path(workspace.path().join(PLAN_AUDIT_FILE))
        .request_plan(&oracle, &GenerationRequest::new("plan"))
        .await;

    match outcome {
        PlanOutcome::Exhausted {
            attempts,
            last_response,
        } => {
            assert_eq!(attempts, 3);
            assert_eq!(last_response, "Still no plan.");
        }
        other => panic!("expected exhaustion, got {:?}", other),
    }
    assert_eq!(fs::read_dir(&target).unwrap().count(), 0);
}

#[tokio::test]
async fn single_shot_response_is_split_and_applied() {
    let target = tempfile::tempdir().unwrap();
    let response = "I created two files.\n\
                    // FILE: app/main.js\n\
                    ```js\n\
                    console.log('main');\n\
                    ```\n\
                    # FILE: app/config.yml\n\
                    ```yaml\n\
                    port: 8080\n\
                    ```\n\
                    // FILE: ../escape.txt\n\
                    nope\n";
    let oracle = ScriptedOracle::new(&[]);

    let artifacts = split_file_markers(&extract_response(&envelope(response)));
    assert_eq!(artifacts.len(), 3);

    let executor = PlanExecutor::new(&oracle, target.path(), false);
    let report = executor.apply_artifacts(&artifacts, &mut ()).await;

    assert_eq!(
        fs::read_to_string(target.path().join("app/main.js")).unwrap(),
        "console.log('main');\n"
    );
    assert_eq!(
        fs::read_to_string(target.path().join("app/config.yml")).unwrap(),
        "port: 8080\n"
    );
    assert_eq!(report.written.len(), 2);
    assert_eq!(report.skipped.len(), 1);
    assert!(matches!(report.skipped[0].1, SkipReason::InvalidPath(_)));
    assert!(oracle.prompts().is_empty());
}

#[test]
fn fix_splices_the_window_around_a_line() {
    let original: Vec<String> = (1..=100).map(|i| format!("line {}", i)).collect();
    let range = LineRange::around(50, 20, original.len());
    assert_eq!(range, LineRange::new(29, 41));

    let reply = envelope("Here is the fix:\n```\nfixed a\n\nfixed b\n```\n");
    let replacement = extract_code_block(&extract_response(&reply)).unwrap();

    let mut lines = original.clone();
    range.splice(&mut lines, replacement).unwrap();

    assert_eq!(lines.len(), 100 - 41 + 3);
    assert_eq!(lines[..29], original[..29]);
    assert_eq!(lines[29..32], ["fixed a", "", "fixed b"]);
    assert_eq!(lines[32..], original[70..]);
}

#[test]
fn malformed_envelope_yields_no_code() {
    for raw in ["<html>Bad Gateway</html>", r#"{"done": true}"#, "Error: timed out"] {
        assert!(extract_code_block(&extract_response(raw)).is_err(), "{}", raw);
        assert!(split_file_markers(&extract_response(raw)).is_empty());
    }
}
