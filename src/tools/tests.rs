//! Tool invocation tests

use super::*;
use tempfile::TempDir;

fn sh_args(script: &str) -> Vec<String> {
    vec!["-c".to_string(), script.to_string()]
}

#[test]
fn test_tool_selection() {
    assert_eq!(
        ToolSelection::All.tools(),
        vec![ToolName::TruffleHog, ToolName::RepoSupervisor]
    );
    assert_eq!(ToolSelection::Thog.tools(), vec![ToolName::TruffleHog]);
    assert!(!ToolSelection::RepoSupervisor.includes(ToolName::TruffleHog));
}

#[test]
fn test_tool_identity() {
    assert_eq!(ToolName::TruffleHog.result_file_name(), "truffleHog");
    assert_eq!(ToolName::RepoSupervisor.result_file_name(), "repo-supervisor");
    assert_eq!(ToolName::TruffleHog.output_family(), OutputFamily::LineJson);
    assert_eq!(ToolName::RepoSupervisor.output_family(), OutputFamily::ResultMap);
}

#[test]
fn test_trufflehog_args() {
    let tool = TruffleHog {
        program: "trufflehog".into(),
        rules: "/rules.json".into(),
        entropy: true,
        json: true,
    };
    assert_eq!(
        tool.args(Path::new("/scratch/repos/org/acme/api")),
        vec![
            "/scratch/repos/org/acme/api",
            "--rules=/rules.json",
            "--regex",
            "--json",
            "--entropy=True",
        ]
    );

    let plain = TruffleHog {
        entropy: false,
        json: false,
        ..tool
    };
    let args = plain.args(Path::new("/clone"));
    assert!(!args.contains(&"--json".to_string()));
    assert_eq!(args.last().unwrap(), "--entropy=False");
}

#[cfg(unix)]
#[tokio::test]
async fn test_findings_exit_code_is_not_a_failure() {
    let temp = TempDir::new().unwrap();
    let output = temp.path().join("truffleHog");

    run_tool(
        ToolName::TruffleHog,
        Path::new("sh"),
        &sh_args("echo '{\"path\":\"a\"}'; exit 1"),
        StdoutTarget::ResultFile(&output),
    )
    .await
    .expect("exit 1 means findings for truffleHog");

    let written = std::fs::read_to_string(&output).unwrap();
    assert_eq!(written, "{\"path\":\"a\"}\n");
}

#[cfg(unix)]
#[tokio::test]
async fn test_other_exit_codes_fail() {
    let temp = TempDir::new().unwrap();
    let output = temp.path().join("truffleHog");

    let err = run_tool(
        ToolName::TruffleHog,
        Path::new("sh"),
        &sh_args("echo broken >&2; exit 2"),
        StdoutTarget::ResultFile(&output),
    )
    .await
    .unwrap_err();
    match err {
        JobError::ExitStatus { stderr, .. } => assert_eq!(stderr, "broken"),
        other => panic!("unexpected error: {other}"),
    }

    // The sentinel belongs to truffleHog only
    let err = run_tool(
        ToolName::RepoSupervisor,
        Path::new("sh"),
        &sh_args("exit 1"),
        StdoutTarget::Discard,
    )
    .await;
    assert!(err.is_err());
}

#[tokio::test]
async fn test_missing_program_is_launch_error() {
    let err = run_tool(
        ToolName::RepoSupervisor,
        Path::new("/nonexistent/reposweep-tool-12345"),
        &[],
        StdoutTarget::Discard,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, JobError::Launch { .. }));
}

#[cfg(unix)]
#[tokio::test]
async fn test_repo_supervisor_leaves_empty_file_when_silent() {
    let temp = TempDir::new().unwrap();
    let output = temp.path().join("repo-supervisor");
    std::fs::write(&output, "stale").unwrap();

    let tool = RepoSupervisor {
        program: "true".into(),
    };
    tool.scan(temp.path(), &output).await.unwrap();
    assert_eq!(std::fs::metadata(&output).unwrap().len(), 0);
}

#[test]
fn test_locate_program() {
    assert!(locate_program(Path::new("reposweep-no-such-program-12345")).is_none());
}
