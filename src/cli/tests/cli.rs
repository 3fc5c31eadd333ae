use assert_cmd::Command;
use predicates::str::contains;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use tempfile::TempDir;

fn perfcap() -> Command {
    Command::cargo_bin("perfcap").unwrap()
}

fn stub_recorder(dir: &TempDir, script: &str) -> PathBuf {
    let path = dir.path().join("recorder.sh");
    std::fs::write(&path, script).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

#[test]
fn prints_version() {
    perfcap().arg("--version").assert().success();
}

#[test]
fn ps_lists_processes() {
    perfcap()
        .arg("ps")
        .assert()
        .success()
        .stdout(contains("PID"));
}

#[test]
fn ps_json_outputs_records() {
    perfcap()
        .args(["ps", "--json"])
        .assert()
        .success()
        .stdout(contains("\"pid\""));
}

#[test]
fn record_with_stub_recorder_finishes() {
    let dir = TempDir::new().unwrap();
    let recorder = stub_recorder(&dir, "#!/bin/sh\necho started\nexit 0\n");
    let output = dir.path().join("profile.data");

    perfcap()
        .env("PERFCAP_SETTINGS_PATH", dir.path().join("settings.toml"))
        .args(["record", "--recorder"])
        .arg(&recorder)
        .arg("--output")
        .arg(&output)
        .args(["--", "/bin/true"])
        .assert()
        .success()
        .stdout(contains("recording saved to"));
}

#[test]
fn record_rejects_unknown_program() {
    let dir = TempDir::new().unwrap();
    let recorder = stub_recorder(&dir, "#!/bin/sh\nexit 0\n");

    perfcap()
        .env("PERFCAP_SETTINGS_PATH", dir.path().join("settings.toml"))
        .args(["record", "--recorder"])
        .arg(&recorder)
        .arg("--output")
        .arg(dir.path().join("x.data"))
        .args(["--", "no-such-binary-blorp"])
        .assert()
        .failure()
        .stderr(contains("cannot be found"));
}

#[test]
fn record_requires_a_target() {
    perfcap()
        .arg("record")
        .assert()
        .failure()
        .stderr(contains("nothing to record"));
}

#[test]
fn record_failure_propagates_recorder_stderr() {
    let dir = TempDir::new().unwrap();
    let recorder = stub_recorder(&dir, "#!/bin/sh\necho 'bad event' >&2\nexit 1\n");

    perfcap()
        .env("PERFCAP_SETTINGS_PATH", dir.path().join("settings.toml"))
        .args(["record", "--recorder"])
        .arg(&recorder)
        .arg("--output")
        .arg(dir.path().join("x.data"))
        .args(["--", "/bin/true"])
        .assert()
        .failure()
        .stderr(contains("recording failed"));
}

#[test]
fn history_shows_remembered_entries() {
    let dir = TempDir::new().unwrap();
    let settings = dir.path().join("settings.toml");
    std::fs::write(
        &settings,
        r#"
recent_applications = ["/bin/true"]
recent_event_types = ["cycles:Pu"]
unwind_method = "dwarf"

[applications."/bin/true"]
params = "--fast"
working_dir = "/"
"#,
    )
    .unwrap();

    perfcap()
        .env("PERFCAP_SETTINGS_PATH", &settings)
        .arg("history")
        .assert()
        .success()
        .stdout(contains("/bin/true"))
        .stdout(contains("cycles:Pu"))
        .stdout(contains("dwarf"));
}
