mod helpers;

use buildscout::detection::{
    AttemptFailure, AttemptHistory, CommandRunner, DetectionOrchestrator, DetectionPhase, Phase1Detector,
    discover_marker_files,
};
use buildscout::error_translation::BuildErrorExtractor;
use buildscout::exec::ShellExecutor;
use buildscout::llm::ContextBuilder;
use buildscout::security::CommandValidator;
use helpers::{MockToolCheck, ScriptedExecutor, ScriptedLLM, create_repo, create_repo_with, orchestrator, test_config};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

fn maven_log() -> String {
    let mut lines = vec!["BEGIN-OF-LOG".to_string()];
    lines.extend((0..300).map(|i| format!("[INFO] Downloading dependency {:03}", i)));
    lines.push("[ERROR] Failed to execute goal maven-compiler-plugin: Compilation failure".to_string());
    lines.extend((0..100).map(|i| format!("[INFO] Cleanup step {:03}", i)));
    lines.join("\n")
}

/// Condensed build output, not the raw log, reaches the collaborator
#[tokio::test]
async fn test_extracted_errors_flow_into_refinement_prompt() {
    let repo = create_repo(&["pom.xml", "src/main/java/App.java"]);
    let executor = ScriptedExecutor::with_failure_output(&[], &maven_log());
    let llm = ScriptedLLM::with_responses(&[]);

    let report = orchestrator(MockToolCheck::all_installed(), executor)
        .with_llm(llm.clone())
        .detect_with_report(repo.path(), None, 2, "xmod")
        .await;

    assert_eq!(report.phase, DetectionPhase::Fallback);
    assert_eq!(report.history.len(), 3);

    let failure = report.history.entries()[0].error();
    assert!(failure.starts_with("BUILD FAILURE - KEY ERRORS:"));
    assert!(failure.contains("Compilation failure"));
    assert!(!failure.contains("BEGIN-OF-LOG"));

    let prompt = &llm.prompts()[0];
    assert!(prompt.contains("- pom.xml (Maven)"));
    assert!(prompt.contains("Command: `mvn test`"));
    assert!(prompt.contains("Compilation failure"));
    assert!(!prompt.contains("BEGIN-OF-LOG"));
}

#[tokio::test]
async fn test_short_failure_output_kept_verbatim() {
    let repo = create_repo(&["package.json", "package-lock.json"]);
    let executor = ScriptedExecutor::with_failure_output(&["npm run test"], "npm ERR! missing script: build");

    let report = orchestrator(MockToolCheck::all_installed(), executor)
        .detect_with_report(repo.path(), None, 6, "xmod")
        .await;

    assert_eq!(report.command, "npm run test");
    assert_eq!(
        report.history.pairs(),
        vec![
            ("npm test".to_string(), "npm ERR! missing script: build".to_string()),
            ("npm run build".to_string(), "npm ERR! missing script: build".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_monorepo_prompt_lists_sub_project_markers() {
    let repo = create_repo(&[
        "backend/pom.xml",
        "frontend/package.json",
        "frontend/yarn.lock",
        "README.md",
    ]);
    let llm = ScriptedLLM::with_responses(&[]);

    orchestrator(MockToolCheck::all_installed(), ScriptedExecutor::failing())
        .with_llm(llm.clone())
        .detect(repo.path(), Some(Path::new("frontend")), 1, "xmod")
        .await;

    let prompt = &llm.prompts()[0];
    assert!(prompt.contains("- frontend/package.json (Node, yarn)"));
    assert!(!prompt.contains("backend/pom.xml (Maven)"));
    // the tree covers the whole repository
    assert!(prompt.contains("backend"));
    assert!(prompt.contains("README.md"));
    assert!(prompt.contains("Command: `npm --prefix frontend test`"));
}

#[test]
fn test_context_builder_with_discovered_markers() {
    let repo = create_repo(&["build.gradle", "gradlew", "settings.gradle", "app/src/Main.kt"]);
    let markers = discover_marker_files(repo.path(), repo.path()).unwrap();

    let mut history = AttemptHistory::new();
    history.record("./gradlew test", AttemptFailure::BuildFailed("Task :app:test FAILED".to_string()));

    let ctx = ContextBuilder::default().build_context(repo.path(), &markers, &history);
    let prompt = ctx.render();

    assert!(prompt.contains("- build.gradle (Gradle, wrapper)"));
    assert!(!prompt.contains("- settings.gradle"));
    assert!(ctx.directory_tree.contains("Main.kt"));
    assert!(prompt.contains("### Attempt 1\nCommand: `./gradlew test`\nError: Task :app:test FAILED\n"));
    assert!(ctx.estimated_tokens > 0);
}

#[tokio::test]
async fn test_phase1_detector_standalone() {
    let repo = create_repo_with(&["composer.json"], &[("Makefile", "test:\n\tphpunit\n")]);
    let executor = ScriptedExecutor::succeeding(&["make test"]);
    let runner = CommandRunner::new(
        Arc::new(CommandValidator::new()),
        executor.clone(),
        Arc::new(BuildErrorExtractor::new()),
        Duration::from_secs(5),
    );
    let detector = Phase1Detector::new(MockToolCheck::missing(&["composer"]), runner);

    let outcome = detector.detect(repo.path(), None).await.unwrap();

    assert_eq!(outcome.command.as_deref(), Some("make test"));
    assert_eq!(outcome.candidate_count, 4);
    // composer skipped, phpunit failed, vendored phpunit rejected
    assert_eq!(outcome.history.len(), 2);
    assert_eq!(executor.runs(), vec!["phpunit", "make test"]);
}

#[tokio::test]
async fn test_phase1_detector_rejects_missing_root() {
    let repo = create_repo(&[]);
    let runner = CommandRunner::new(
        Arc::new(CommandValidator::new()),
        ScriptedExecutor::failing(),
        Arc::new(BuildErrorExtractor::new()),
        Duration::from_secs(5),
    );
    let detector = Phase1Detector::new(MockToolCheck::all_installed(), runner);

    let err = detector.detect(&repo.path().join("gone"), None).await.unwrap_err();
    assert!(err.to_string().contains("not a directory"));
}

/// Real shell execution end to end, with scripted suggestions
#[cfg(unix)]
#[tokio::test]
async fn test_real_shell_pipeline() {
    let repo = create_repo_with(&[], &[("ci/fail.sh", "echo 'error: widget tests broke'\nexit 1\n")]);
    let llm = ScriptedLLM::with_responses(&["sh ci/fail.sh", "echo build ok"]);

    let detector = DetectionOrchestrator::new(
        CommandValidator::new(),
        MockToolCheck::all_installed(),
        Arc::new(ShellExecutor::new()),
        Arc::new(BuildErrorExtractor::new()),
        test_config(),
    )
    .with_llm(llm.clone());

    let report = detector.detect_with_report(repo.path(), None, 3, "xmod").await;

    assert_eq!(report.command, "echo build ok");
    assert_eq!(report.phase, DetectionPhase::Refinement);
    assert_eq!(report.history.len(), 1);
    assert!(report.history.entries()[0].error().contains("error: widget tests broke"));
    assert!(llm.prompts()[1].contains("error: widget tests broke"));
}
