//! CLI tests driving the `memvault` binary.

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    root: PathBuf,
    config: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("memory");
        let config = dir.path().join("memvault.toml");
        fs::write(
            &config,
            format!(
                "root = {:?}\npush_token = \"cli-token\"\nwrite_lock_timeout_ms = 2000\n",
                root.display().to_string()
            ),
        )
        .unwrap();
        Self {
            _dir: dir,
            root,
            config,
        }
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("memvault").unwrap();
        for var in [
            "MEMVAULT_CONFIG",
            "MEMVAULT_ROOT",
            "MEMVAULT_REMOTE_URL",
            "MEMVAULT_PUSH_TOKEN",
            "MEMVAULT_BRANCH",
            "MEMVAULT_GIT",
            "GITHUB_TOKEN",
            "RUST_LOG",
        ] {
            cmd.env_remove(var);
        }
        cmd.arg("--config").arg(&self.config);
        cmd
    }

    fn json(&self, args: &[&str]) -> Value {
        let output = self.cmd().args(args).output().unwrap();
        assert!(
            output.status.success(),
            "{:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).unwrap()
    }

    fn write_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.root.parent().unwrap_or(Path::new(".")).join(name);
        fs::write(&path, content).unwrap();
        path
    }
}

#[test]
fn write_then_read_raw() {
    let fx = Fixture::new();
    fx.cmd()
        .args(["write", "notes/today", "--content", "# Today\n"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"notes/today.md\""));

    fx.cmd()
        .args(["read", "notes/today", "--raw"])
        .assert()
        .success()
        .stdout("# Today\n");
    assert!(fx.root.join("notes/today.md").exists());
}

#[test]
fn write_reads_stdin_and_file() {
    let fx = Fixture::new();
    fx.cmd()
        .args(["write", "from-stdin"])
        .write_stdin("piped")
        .assert()
        .success();

    let file = fx.write_file("source.md", "from a file");
    fx.cmd()
        .args(["write", "from-file", "--file"])
        .arg(&file)
        .assert()
        .success();

    fx.cmd()
        .args(["read", "from-stdin", "--raw"])
        .assert()
        .stdout("piped");
    fx.cmd()
        .args(["read", "from-file", "--raw"])
        .assert()
        .stdout("from a file");
}

#[test]
fn read_json_carries_version() {
    let fx = Fixture::new();
    let written = fx.json(&["write", "a", "--content", "x"]);
    let read = fx.json(&["read", "a"]);

    let version = read["metadata"]["version"].as_str().unwrap();
    assert_eq!(version.len(), 40);
    assert_eq!(read["metadata"]["version"], written["metadata"]["version"]);
    assert_eq!(read["content"], "x");
    assert_eq!(read["metadata"]["size"], 1);
}

#[test]
fn stale_expect_fails_with_conflict() {
    let fx = Fixture::new();
    let first = fx.json(&["write", "a", "--content", "1"]);
    let v1 = first["metadata"]["version"].as_str().unwrap().to_string();
    fx.json(&["write", "a", "--content", "2", "--expect", &v1]);

    fx.cmd()
        .args(["write", "a", "--content", "3", "--expect", &v1])
        .assert()
        .failure()
        .stderr(predicate::str::contains("version conflict"));
    fx.cmd()
        .args(["read", "a", "--raw"])
        .assert()
        .stdout("2");
}

#[test]
fn malformed_expect_is_rejected() {
    let fx = Fixture::new();
    fx.cmd()
        .args(["write", "a", "--content", "1", "--expect", "not-a-sha"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid --expect version"));
}

#[test]
fn batch_file_commits_once() {
    let fx = Fixture::new();
    let batch = fx.write_file(
        "batch.json",
        r#"{
            "message": "import",
            "operations": [
                {"action": "create", "path": "one", "content": "1"},
                {"action": "create", "path": "two", "content": "2"}
            ]
        }"#,
    );

    let outcomes = fx.json(&["batch", batch.to_str().unwrap()]);
    let outcomes = outcomes.as_array().unwrap();
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0]["result"], "written");
    assert_eq!(
        outcomes[0]["metadata"]["version"],
        outcomes[1]["metadata"]["version"]
    );

    let log = fx.json(&["log"]);
    assert_eq!(log.as_array().unwrap().len(), 1);
    assert_eq!(log[0]["message"], "import");
}

#[test]
fn batch_from_stdin_rejects_bad_json() {
    let fx = Fixture::new();
    fx.cmd()
        .args(["batch", "-"])
        .write_stdin("{not json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a valid batch request"));
}

#[test]
fn list_and_log() {
    let fx = Fixture::new();
    fx.json(&["write", "notes/a", "--content", "a"]);
    fx.json(&["write", "notes/sub/b", "--content", "b"]);
    fx.json(&["write", "top", "--content", "t"]);

    let all = fx.json(&["list"]);
    assert_eq!(all["total"], 3);

    let shallow = fx.json(&["list", "notes", "--shallow", "--content"]);
    let nodes = shallow["nodes"].as_array().unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0]["path"], "notes/a.md");
    assert_eq!(nodes[0]["content"], "a");
    assert_eq!(shallow["directories"][0], "notes/sub/");
    assert!(all.get("directories").is_none());

    let page = fx.json(&["list", "--offset", "1", "--limit", "1"]);
    assert_eq!(page["nodes"].as_array().unwrap().len(), 1);
    assert_eq!(page["nodes"][0]["path"], "notes/sub/b.md");

    let log = fx.json(&["log", "-n", "2"]);
    let log = log.as_array().unwrap();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0]["message"], "create top.md");
    assert_eq!(log[0]["changed_paths"][0], "top.md");
}

#[test]
fn status_reports_writable_local_store() {
    let fx = Fixture::new();
    let status = fx.json(&["status"]);
    assert_eq!(status["mode"], "writable");
    assert_eq!(status["branch"], "main");
    assert!(status["head"].is_null());
    assert!(status["remote_url"].is_null());
}

#[test]
fn root_flag_overrides_config() {
    let fx = Fixture::new();
    let other = fx.root.with_file_name("elsewhere");
    fx.cmd()
        .arg("--root")
        .arg(&other)
        .args(["write", "a", "--content", "x"])
        .assert()
        .success();
    assert!(other.join("a.md").exists());
    assert!(!fx.root.join("a.md").exists());
}

#[test]
fn delete_then_read_fails() {
    let fx = Fixture::new();
    fx.json(&["write", "gone", "--content", "x"]);
    let ack = fx.json(&["delete", "gone"]);
    assert_eq!(ack["path"], "gone.md");

    fx.cmd()
        .args(["read", "gone"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("node not found"));
}

#[test]
fn push_without_remote_fails() {
    let fx = Fixture::new();
    fx.cmd()
        .arg("push")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no remote"));
}

#[test]
fn invalid_path_is_rejected() {
    let fx = Fixture::new();
    fx.cmd()
        .args(["write", "../escape", "--content", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid path"));
    assert!(!fx.root.with_file_name("escape.md").exists());
}

#[test]
fn store_without_token_rejects_writes() {
    let fx = Fixture::new();
    fs::write(
        &fx.config,
        format!("root = {:?}\n", fx.root.display().to_string()),
    )
    .unwrap();

    fx.cmd()
        .args(["write", "a", "--content", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("store is read-only"));
    assert!(!fx.root.join("a.md").exists());

    let status = fx.json(&["status"]);
    assert_eq!(status["mode"], "read_only");
}

#[test]
fn completion_bash() {
    Command::cargo_bin("memvault")
        .unwrap()
        .args(["completion", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("memvault"));
}
