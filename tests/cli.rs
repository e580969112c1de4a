use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_tar(archive: &Path, members: &[(&str, &[u8])]) {
    let staging = TempDir::new().unwrap();
    for (name, contents) in members {
        fs::write(staging.path().join(name), contents).unwrap();
    }

    let status = std::process::Command::new("tar")
        .arg("-cf")
        .arg(archive)
        .arg("-C")
        .arg(staging.path())
        .args(members.iter().map(|(name, _)| *name))
        .status()
        .unwrap();
    assert!(status.success());
}

fn tar_bytes(members: &[(&str, &[u8])]) -> Vec<u8> {
    let scratch = TempDir::new().unwrap();
    let archive = scratch.path().join("members.tar");
    write_tar(&archive, members);
    fs::read(archive).unwrap()
}

/// Lay out the two default archives: a train split holding two class
/// archives and a test split holding loose images.
fn imagenet_fixture() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let base = temp_dir.path();

    let tench = tar_bytes(&[("n01440764_1.JPEG", b"tench-1"), ("n01440764_2.JPEG", b"tench-2")]);
    let goldfish = tar_bytes(&[("n01443537_1.JPEG", b"goldfish")]);
    write_tar(
        &base.join("ILSVRC2012_img_train.tar"),
        &[
            ("n01440764.tar", tench.as_slice()),
            ("n01443537.tar", goldfish.as_slice()),
        ],
    );
    write_tar(
        &base.join("ILSVRC2012_img_test.tar"),
        &[("ILSVRC2012_test_00000001.JPEG", b"test-1")],
    );

    temp_dir
}

fn unpack_cmd(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("imagenet-unpack").unwrap();
    cmd.current_dir(dir).env_remove("IMAGENET_UNPACK_TAR");
    cmd
}

#[test]
fn bare_invocation_unpacks_default_archives() {
    let fixture = imagenet_fixture();
    let base = fixture.path();

    unpack_cmd(base).arg("--output-format").arg("plain").assert().success();

    let train = base.join("ILSVRC2012_img_train");
    assert_eq!(
        fs::read(train.join("n01440764/n01440764_1.JPEG")).unwrap(),
        b"tench-1"
    );
    assert!(train.join("n01443537/n01443537_1.JPEG").is_file());
    assert!(!train.join("n01440764.tar").exists());
    assert!(!train.join("n01443537.tar").exists());

    let test = base.join("ILSVRC2012_img_test");
    assert!(test.join("ILSVRC2012_test_00000001.JPEG").is_file());
    assert!(!test.join("ILSVRC2012_test_00000001").exists());
}

#[test]
fn second_run_fails_on_existing_directory() {
    let fixture = imagenet_fixture();
    let base = fixture.path();

    unpack_cmd(base).arg("-q").assert().success();
    unpack_cmd(base)
        .arg("-q")
        .assert()
        .code(4)
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn all_splits_mode_fails_on_loose_images() {
    let fixture = imagenet_fixture();
    let base = fixture.path();

    unpack_cmd(base)
        .args(["--nested", "all", "-q"])
        .assert()
        .code(5)
        .stderr(predicate::str::contains("ILSVRC2012_test_00000001.JPEG"));

    assert!(base.join("ILSVRC2012_img_train/n01440764").is_dir());
}

#[test]
fn continue_policy_reports_failures_as_json() {
    let fixture = imagenet_fixture();
    let base = fixture.path();

    let output = unpack_cmd(base)
        .args(["--nested", "all", "--on-error", "continue", "--output-format", "json", "-q"])
        .assert()
        .code(2)
        .get_output()
        .stdout
        .clone();

    let report: serde_json::Value = serde_json::from_slice(&output).unwrap();
    let archives = report["archives"].as_array().unwrap();
    assert_eq!(archives.len(), 2);
    assert_eq!(archives[0]["classes"].as_array().unwrap().len(), 2);
    assert_eq!(archives[1]["failures"].as_array().unwrap().len(), 1);
    assert_eq!(report["errors"].as_array().unwrap().len(), 1);
}

#[test]
fn positional_archives_and_directory_flag() {
    let fixture = imagenet_fixture();
    let base = fixture.path();
    let elsewhere = TempDir::new().unwrap();

    unpack_cmd(elsewhere.path())
        .arg("-C")
        .arg(base)
        .args(["ILSVRC2012_img_train.tar", "--keep-nested", "-q"])
        .assert()
        .success();

    let train = base.join("ILSVRC2012_img_train");
    assert!(train.join("n01440764.tar").is_file());
    assert!(train.join("n01440764").is_dir());
    assert!(!base.join("ILSVRC2012_img_test").exists());
}

#[test]
fn malformed_archive_name_exits_with_name_error() {
    let fixture = imagenet_fixture();

    unpack_cmd(fixture.path())
        .args(["ILSVRC2012_img_train", "-q"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("ILSVRC2012_img_train"));
}

#[test]
fn dry_run_touches_nothing() {
    let fixture = imagenet_fixture();
    let base = fixture.path();

    unpack_cmd(base)
        .args(["--dry-run", "--output-format", "plain"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tar -xf"))
        .stdout(predicate::str::contains("per-class archives unpacked"));

    assert!(!base.join("ILSVRC2012_img_train").exists());
    assert!(!base.join("ILSVRC2012_img_test").exists());
}

#[test]
fn dry_run_json_keeps_stdout_parseable() {
    let fixture = imagenet_fixture();
    let base = fixture.path();

    let output = unpack_cmd(base)
        .args(["--dry-run", "--output-format", "json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let plan: serde_json::Value = serde_json::from_slice(&output).unwrap();
    let archives = plan["archives"].as_array().unwrap();
    assert_eq!(archives.len(), 2);
    assert_eq!(archives[0]["nested"], true);
    assert_eq!(archives[1]["nested"], false);
    assert!(!base.join("ILSVRC2012_img_train").exists());
}

#[test]
fn config_file_found_next_to_archives() {
    let fixture = imagenet_fixture();
    let base = fixture.path();
    let elsewhere = TempDir::new().unwrap();

    fs::write(
        base.join(".imagenet-unpack.toml"),
        r#"
[archives]
names = ["ILSVRC2012_img_train.tar"]
base_directory = "."

[unpack]
nested = "matching-splits"
split_pattern = "train"
on_error = "abort"
delete_nested = false

[tar]
program = "tar"
timeout = 0
"#,
    )
    .unwrap();

    unpack_cmd(elsewhere.path())
        .arg("-C")
        .arg(base)
        .arg("-q")
        .assert()
        .success();

    let train = base.join("ILSVRC2012_img_train");
    assert!(train.join("n01440764").is_dir());
    assert!(train.join("n01440764.tar").is_file());
    assert!(!base.join("ILSVRC2012_img_test").exists());
}

#[test]
fn config_file_in_working_directory_is_used() {
    let fixture = imagenet_fixture();
    let base = fixture.path();

    fs::write(
        base.join("imagenet-unpack.toml"),
        r#"
[archives]
names = ["ILSVRC2012_img_test.tar"]
base_directory = "."

[unpack]
nested = "matching-splits"
split_pattern = "test"
on_error = "abort"
delete_nested = true

[tar]
program = "tar"
timeout = 0
"#,
    )
    .unwrap();

    unpack_cmd(base).arg("-q").assert().code(5);
    assert!(!base.join("ILSVRC2012_img_train").exists());
}

#[test]
fn generate_config_writes_sample() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("sample.toml");

    unpack_cmd(temp_dir.path())
        .arg("--generate-config")
        .arg("--config")
        .arg(&config_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Generated sample configuration"));

    let content = fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("ILSVRC2012_img_train.tar"));
}

#[test]
fn missing_tool_is_reported() {
    let fixture = imagenet_fixture();

    unpack_cmd(fixture.path())
        .args(["--tar", "no-such-extraction-tool", "-q"])
        .assert()
        .code(5)
        .stderr(predicate::str::contains("no-such-extraction-tool"));
}
