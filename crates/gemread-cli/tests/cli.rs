use assert_cmd::Command;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use serde_json::Value;
use tempfile::TempDir;

fn cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("gemread"))
}

fn repo_root() -> std::path::PathBuf {
    let manifest = std::path::Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest
        .parent()
        .and_then(|p| p.parent())
        .expect("repo root")
        .to_path_buf()
}

fn fixture(name: &str) -> std::path::PathBuf {
    repo_root().join("tests").join("fixtures").join(name)
}

#[test]
fn help_lists_every_family() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("readout").and(contains("scan")).and(contains("amc")));
    cmd().arg("readout").arg("--help").assert().success();
}

#[test]
fn missing_input_shows_error_and_hint() {
    let temp = TempDir::new().expect("tempdir");
    let missing = temp.path().join("missing.dat");

    cmd()
        .arg("readout")
        .arg(missing)
        .assert()
        .failure()
        .stderr(contains("error:").and(contains("hint:")));
}

#[test]
fn readout_prints_summary() {
    cmd()
        .arg("readout")
        .arg(fixture("readout.dat"))
        .assert()
        .success()
        .stderr(contains("decoded 3 events (6 chip frames), 1 with control bit mismatches"));
}

#[test]
fn stdout_outputs_json_lines() {
    let assert = cmd()
        .arg("readout")
        .arg(fixture("readout.dat"))
        .arg("--stdout")
        .arg("--quiet")
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8 stdout");
    let lines: Vec<Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("valid json"))
        .collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0]["frame"]["header"]["chamber_id"], 0x0a1);
    assert_eq!(lines[3]["stream_end"], "clean");
}

#[test]
fn stdout_and_output_conflict() {
    let temp = TempDir::new().expect("tempdir");
    let output = temp.path().join("events.jsonl");

    cmd()
        .arg("readout")
        .arg(fixture("readout.dat"))
        .arg("--stdout")
        .arg("-o")
        .arg(output)
        .assert()
        .failure()
        .stderr(contains("error:"));
}

#[test]
fn output_must_differ_from_input() {
    let temp = TempDir::new().expect("tempdir");
    let input = temp.path().join("run.dat");
    std::fs::copy(fixture("readout.dat"), &input).expect("copy fixture");

    cmd()
        .arg("readout")
        .arg(&input)
        .arg("-o")
        .arg(&input)
        .assert()
        .failure()
        .stderr(contains("output path must differ from input"));
}

#[test]
fn truncated_input_fails_with_hint() {
    cmd()
        .arg("readout")
        .arg(fixture("readout_truncated.dat"))
        .assert()
        .failure()
        .stderr(
            contains("readout decode truncated")
                .and(contains("lsData"))
                .and(contains("hint: the input ends in the middle of a frame; the 2 events")),
        );
}

#[test]
fn strict_fails_on_control_mismatch() {
    cmd()
        .arg("readout")
        .arg(fixture("readout.dat"))
        .arg("--strict")
        .assert()
        .failure()
        .stderr(contains("control bit mismatches in 1 of 3 events"));
}

#[test]
fn strict_passes_on_clean_amc_input() {
    cmd()
        .arg("amc")
        .arg(fixture("amc.dat"))
        .arg("--strict")
        .arg("--quiet")
        .assert()
        .success();
}

#[test]
fn print_dumps_first_events() {
    cmd()
        .arg("readout")
        .arg(fixture("readout.dat"))
        .arg("--print")
        .arg("1")
        .assert()
        .success()
        .stderr(contains("event 0").and(contains("event 1").not()));
}

#[test]
fn quiet_suppresses_summary() {
    cmd()
        .arg("readout")
        .arg(fixture("readout.dat"))
        .arg("--quiet")
        .assert()
        .success()
        .stderr(contains("decoded").not().and(contains("chips:").not()));
}

#[test]
fn scan_prints_header_and_curve() {
    cmd()
        .arg("scan")
        .arg(fixture("threshold_scan.dat"))
        .assert()
        .success()
        .stderr(
            contains("scan header: minTh 0 maxTh 3 stepSize 1 (4 bins)")
                .and(contains("decoded 7 events"))
                .and(contains("threshold scan 0..=3 step 1: 4 bins"))
                .and(contains("3: 2 / 2 events with hits")),
        );
}

#[test]
fn oversized_scan_header_fails_with_hint() {
    let temp = TempDir::new().expect("tempdir");
    let input = temp.path().join("wide_scan.dat");
    std::fs::write(&input, "0 4611686018427387903 1\n").expect("write scan");

    cmd()
        .arg("scan")
        .arg(&input)
        .assert()
        .code(2)
        .stderr(
            contains("threshold-scan decode failed")
                .and(contains("exceeds limit 4096"))
                .and(contains("hint:").and(contains("--max-bins"))),
        );
}

#[test]
fn max_bins_override_bounds_the_scan() {
    cmd()
        .arg("scan")
        .arg(fixture("threshold_scan.dat"))
        .arg("--max-bins")
        .arg("3")
        .assert()
        .code(2)
        .stderr(contains("4 exceeds limit 3"));
}

#[test]
fn exclude_chip_and_config_file() {
    let temp = TempDir::new().expect("tempdir");
    let config = temp.path().join("gemread.toml");
    std::fs::write(&config, "max_events = 2\n").expect("write config");

    cmd()
        .arg("readout")
        .arg(fixture("readout.dat"))
        .arg("--config")
        .arg(&config)
        .arg("--exclude-chip")
        .arg("0x0ab")
        .assert()
        .success()
        .stderr(
            contains("decoded 2 events")
                .and(contains("(stopped at --max-events)"))
                .and(contains("chips: 3 seen, 1 excluded")),
        );
}

#[test]
fn output_file_holds_json_lines() {
    let temp = TempDir::new().expect("tempdir");
    let output = temp.path().join("events.jsonl");

    cmd()
        .arg("amc")
        .arg(fixture("amc.dat"))
        .arg("-o")
        .arg(&output)
        .arg("--quiet")
        .assert()
        .success();

    let text = std::fs::read_to_string(&output).expect("read output");
    let lines: Vec<Value> = text
        .lines()
        .map(|line| serde_json::from_str(line).expect("valid json"))
        .collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0]["frame"]["header"]["dav_count"], 2);
    assert_eq!(lines[1]["frame"]["header"]["lv1_id"], 2);
    assert_eq!(lines[2]["events"], 2);
}

#[test]
fn bad_config_reports_hint() {
    let temp = TempDir::new().expect("tempdir");
    let config = temp.path().join("gemread.toml");
    std::fs::write(&config, "max_vfat = 2\n").expect("write config");

    cmd()
        .arg("readout")
        .arg(fixture("readout.dat"))
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(contains("failed to load config").and(contains("hint:")));
}

#[test]
fn glob_with_multiple_matches_is_rejected() {
    let pattern = repo_root()
        .join("tests")
        .join("fixtures")
        .join("readout*.dat");

    cmd()
        .arg("readout")
        .arg(pattern)
        .assert()
        .failure()
        .stderr(contains("multiple files match pattern"));
}
