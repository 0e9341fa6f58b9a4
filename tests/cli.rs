use std::path::Path;
use std::process::Output;

use pretty_assertions::assert_eq;
use rift_dock::model::persist::SessionState;

fn run(args: &[&str], config: &Path) -> Output {
    test_bin::get_test_bin("rift-dock")
        .arg("--config")
        .arg(config)
        .args(args)
        .output()
        .expect("failed to start rift-dock")
}

fn stdout(output: &Output) -> String {
    assert!(
        output.status.success(),
        "rift-dock failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

struct Workspace {
    dir: tempfile::TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("config.toml"), "[settings.grid]\nmax_icons = 6\n")
            .expect("write config");
        Workspace { dir }
    }

    fn config(&self) -> std::path::PathBuf { self.dir.path().join("config.toml") }

    fn session(&self) -> String { self.dir.path().join("session.ron").display().to_string() }

    fn run(&self, args: &[&str]) -> Output { run(args, &self.config()) }
}

#[test]
fn init_config_prints_parseable_defaults() {
    let ws = Workspace::new();
    let out = stdout(&ws.run(&["init-config"]));
    assert!(out.contains("[settings.grid]"), "{out}");
    assert!(out.contains("max_icons"), "{out}");
}

#[test]
fn placed_icons_survive_a_round_trip() {
    let ws = Workspace::new();
    let session = ws.session();
    stdout(&ws.run(&["new-session", &session, "--workspaces", "2"]));

    let pos = stdout(&ws.run(&["place", &session, "--name", "Terminal", "--target", "dock"]));
    assert_eq!(pos.trim(), "0,1");
    stdout(&ws.run(&["place", &session, "--name", "Editor", "--workspace", "1"]));

    let tree = stdout(&ws.run(&["show", &session]));
    assert!(tree.contains("screen 1920x1080"), "{tree}");
    assert!(tree.contains("0,1 Terminal"), "{tree}");
    assert!(tree.contains("clip 1"), "{tree}");
    assert!(tree.contains("Editor"), "{tree}");

    assert_eq!(stdout(&ws.run(&["check", &session])).trim(), "ok");
}

#[test]
fn full_docks_are_reported() {
    let ws = Workspace::new();
    let session = ws.session();
    stdout(&ws.run(&["new-session", &session]));
    for n in 1..6 {
        let name = format!("app{n}");
        stdout(&ws.run(&["place", &session, "--name", &name, "--target", "dock"]));
    }
    let output = ws.run(&["place", &session, "--name", "overflow", "--target", "dock"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("no free slot"));
}

#[test]
fn unknown_targets_are_rejected() {
    let ws = Workspace::new();
    let session = ws.session();
    stdout(&ws.run(&["new-session", &session]));

    let output = ws.run(&["place", &session, "--name", "x", "--target", "drawer:3"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("no drawer on row 3"));

    let output = ws.run(&["place", &session, "--name", "x", "--target", "shelf"]);
    assert!(!output.status.success());
}

#[test]
fn missing_sessions_fail() {
    let ws = Workspace::new();
    let missing = ws.dir.path().join("nope.ron").display().to_string();
    assert!(!ws.run(&["show", &missing]).status.success());
}

#[test]
fn check_rejects_sessions_that_need_repair() {
    let ws = Workspace::new();
    let session = ws.session();
    stdout(&ws.run(&["new-session", &session]));
    stdout(&ws.run(&["place", &session, "--name", "Terminal", "--target", "dock"]));

    let text = std::fs::read_to_string(&session).expect("read session");
    let mut state: SessionState = ron::from_str(&text).expect("parse session");
    let duplicate = state.dock.applications[0].clone();
    state.dock.applications.push(duplicate);
    let text = ron::ser::to_string_pretty(&state, ron::ser::PrettyConfig::default()).unwrap();
    std::fs::write(&session, text).expect("write session");

    let tree = stdout(&ws.run(&["show", &session]));
    assert!(tree.contains("0,1 Terminal"), "{tree}");

    let output = ws.run(&["check", &session]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("already taken"), "{stderr}");
}
