// tests/integration/cli_run.rs

use std::fs;
use std::path::Path;

use clap::Parser;
use weave::cli::CliArgs;

const REACTOR: &str = r#"
[build]
goals = ["install"]

[project.core]
dir = "core"

[[project.core.plugin]]
id = "org.example.plugins:sh"

[[project.core.plugin.execution]]
id = "default"
goals = ["build", "ship"]

[project.app]
dir = "app"
depends_on = ["core"]

[[project.app.plugin]]
id = "org.example.plugins:sh"

[[project.app.plugin.execution]]
id = "default"
goals = ["build", "ship"]

[plugin."org.example.plugins:sh"]
prefix = "sh"

[plugin."org.example.plugins:sh".mojo.build]
phase = "compile"
cmd = "echo $WEAVE_ARTIFACT_ID > built.txt"

[plugin."org.example.plugins:sh".mojo.ship]
phase = "install"
cmd = "cat built.txt > shipped.txt"
"#;

fn write_reactor(root: &Path, contents: &str) -> String {
    fs::create_dir_all(root.join("core")).unwrap();
    fs::create_dir_all(root.join("app")).unwrap();
    let path = root.join("Weave.toml");
    fs::write(&path, contents).unwrap();
    path.display().to_string()
}

fn args(config: &str, extra: &[&str]) -> CliArgs {
    let mut argv = vec!["weave", "--config", config];
    argv.extend_from_slice(extra);
    CliArgs::try_parse_from(argv).unwrap()
}

#[tokio::test]
async fn runs_configured_goals_in_project_directories() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_reactor(dir.path(), REACTOR);

    weave::run(args(&config, &["-T", "2"])).await.unwrap();

    for project in ["core", "app"] {
        let shipped = fs::read_to_string(dir.path().join(project).join("shipped.txt")).unwrap();
        assert_eq!(shipped.trim(), project);
    }
}

#[tokio::test]
async fn command_line_goals_replace_configured_ones() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_reactor(dir.path(), REACTOR);

    weave::run(args(&config, &["compile"])).await.unwrap();

    assert!(dir.path().join("core/built.txt").exists());
    assert!(!dir.path().join("core/shipped.txt").exists());
}

#[tokio::test]
async fn dry_run_executes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_reactor(dir.path(), REACTOR);

    weave::run(args(&config, &["--dry-run"])).await.unwrap();

    assert!(!dir.path().join("core/built.txt").exists());
}

#[tokio::test]
async fn failing_command_fails_the_build() {
    let dir = tempfile::tempdir().unwrap();
    let failing = REACTOR.replace("cat built.txt > shipped.txt", "exit 3");
    let config = write_reactor(dir.path(), &failing);

    let err = weave::run(args(&config, &[])).await.unwrap_err();
    assert!(err.to_string().contains("build failed"));

    let err = weave::run(args(&config, &["--fail-never"])).await;
    assert!(err.is_ok());
}

#[tokio::test]
async fn missing_goals_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_reactor(dir.path(), &REACTOR.replace("goals = [\"install\"]", ""));

    let err = weave::run(args(&config, &[])).await.unwrap_err();
    assert!(err.to_string().contains("no goals have been specified"));
}

#[tokio::test]
async fn plugin_built_by_a_dependent_project_is_a_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_reactor(
        dir.path(),
        r#"
[build]
goals = ["install"]

[project.app]
dir = "app"

[[project.app.plugin]]
id = "local:tools"

[[project.app.plugin.execution]]
id = "default"
goals = ["check"]

[project.tools]
dir = "core"
depends_on = ["app"]

[plugin."local:tools"]
prefix = "tools"

[plugin."local:tools".mojo.check]
phase = "verify"
cmd = "true"
"#,
    );

    let err = weave::run(args(&config, &[])).await.unwrap_err();
    assert!(err.to_string().contains("cycle detected"), "got: {err}");
}
