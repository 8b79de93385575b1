//! `town-daemon --once` end to end with fake binaries.

#![cfg(unix)]

use assert_cmd::Command;
use assert_cmd::cargo;
use predicates::prelude::*;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tempfile::TempDir;

fn write_script(path: &Path, body: &str) {
    std::fs::write(path, format!("#!/bin/sh\n{body}")).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

struct Town {
    temp: TempDir,
}

impl Town {
    fn new(agent_state: &str) -> Self {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        let town = root.join("town");
        std::fs::create_dir_all(town.join("myr/polecats/mycat")).unwrap();
        std::fs::create_dir_all(root.join("home")).unwrap();

        write_script(
            &root.join("tmux"),
            "case \"$*\" in\n  *has-session*) echo \"can't find session\" >&2; exit 1;;\n  *) exit 1;;\nesac\n",
        );
        write_script(
            &root.join("bd"),
            &format!(
                "echo '[{{\"id\":\"gt-myr-polecat-mycat\",\"description\":\"agent_state: {agent_state}\",\"agent_state\":\"{agent_state}\"}}]'\n"
            ),
        );

        let config = format!(
            r#"[core]
town_root = "{town}"
identity = "hq-deacon"

[[rigs]]
name = "myr"
prefix = "gt"

[daemon]
file_warrants_on_crash = true

[commands]
tmux = "{tmux}"
bd = "{bd}"
"#,
            town = town.display(),
            tmux = root.join("tmux").display(),
            bd = root.join("bd").display(),
        );
        std::fs::write(root.join("daemon.toml"), config).unwrap();
        Self { temp }
    }

    fn cmd(&self) -> Command {
        let mut cmd = cargo::cargo_bin_cmd!("town-daemon");
        cmd.arg("--once")
            .arg("--config")
            .arg(self.temp.path().join("daemon.toml"))
            .current_dir(self.temp.path())
            .env("TOWN_HOME", self.temp.path().join("home"))
            .env_remove("TOWN_ROOT")
            .env_remove("TOWN_IDENTITY");
        cmd
    }

    fn warrant_path(&self) -> std::path::PathBuf {
        self.temp
            .path()
            .join("town/warrants/myr_polecats_mycat.warrant.json")
    }
}

#[test]
fn test_once_files_warrant_for_crash() {
    let town = Town::new("working");
    town.cmd()
        .assert()
        .success()
        .stdout(predicate::str::contains("crashed=1"))
        .stdout(predicate::str::contains("warrants_filed=1"))
        .stderr(predicate::str::contains("CRASH DETECTED"));

    let raw = std::fs::read_to_string(town.warrant_path()).unwrap();
    let warrant: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(warrant["Target"], "myr/polecats/mycat");
    assert_eq!(warrant["FiledBy"], "hq-deacon");
    assert_eq!(warrant["Executed"], false);
}

#[test]
fn test_once_spawning_is_not_a_crash() {
    let town = Town::new("spawning");
    town.cmd()
        .assert()
        .success()
        .stdout(predicate::str::contains("pending_start=1"))
        .stdout(predicate::str::contains("crashed=0"))
        .stderr(predicate::str::contains("CRASH DETECTED").not());

    assert!(!town.warrant_path().exists());
}
