//! Integration tests for the command line interface

mod common;

use assert_cmd::Command;
use predicates::prelude::*;

const CHECKIN: &str = r#"
usage: Front desk workflows

workflows:
  checkin:
    usage: Check a patient in
    steps:
      - require: customer
      - workflow: select-patient
      - echo: "Checked in ${patient} for ${customer}"

  select-patient:
    private: true
    steps:
      - prompt:
          key: patient
          message: Which patient?

  weigh:
    usage: Record a weight
    steps:
      - prompt: { key: weight, message: Weight }
        skip: true
      - echo: "weighed"

  broken:
    steps:
      - fail: "scale offline"
"#;

fn taskflow() -> Command {
    Command::cargo_bin("taskflow").unwrap()
}

#[test]
fn test_list_hides_private_workflows() {
    let (_dir, config) = common::create_test_config(CHECKIN);

    taskflow()
        .arg("-f")
        .arg(&config)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("checkin"))
        .stdout(predicate::str::contains("Check a patient in"))
        .stdout(predicate::str::contains("select-patient").not());
}

#[test]
fn test_run_with_answers_completes() {
    let (_dir, config) = common::create_test_config(CHECKIN);

    taskflow()
        .arg("-f")
        .arg(&config)
        .args(["run", "checkin", "--set", "customer=J. Smith", "--answer", "patient=Rex"])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("Checked in Rex for J. Smith"));
}

#[test]
fn test_run_reads_answers_from_stdin() {
    let (_dir, config) = common::create_test_config(CHECKIN);

    taskflow()
        .arg("-f")
        .arg(&config)
        .args(["run", "checkin", "--set", "customer=J. Smith"])
        .write_stdin("Rex\n")
        .assert()
        .code(0)
        .stdout(predicate::str::contains("Checked in Rex"));
}

#[test]
fn test_blank_answer_skips_skippable_prompt() {
    let (_dir, config) = common::create_test_config(CHECKIN);

    taskflow()
        .arg("-f")
        .arg(&config)
        .args(["run", "weigh"])
        .write_stdin("\n")
        .assert()
        .code(0)
        .stdout(predicate::str::contains("weighed"));
}

#[test]
fn test_cancel_from_stdin() {
    let (_dir, config) = common::create_test_config(CHECKIN);

    taskflow()
        .arg("-f")
        .arg(&config)
        .args(["run", "checkin", "--set", "customer=J. Smith"])
        .write_stdin(":cancel\n")
        .assert()
        .code(2)
        .stdout(predicate::str::contains("Checked in").not())
        .stderr(predicate::str::contains("Workflow cancelled"));
}

#[test]
fn test_end_of_input_cancels() {
    let (_dir, config) = common::create_test_config(CHECKIN);

    taskflow()
        .arg("-f")
        .arg(&config)
        .args(["run", "checkin", "--set", "customer=J. Smith"])
        .write_stdin("")
        .assert()
        .code(2);
}

#[test]
fn test_missing_requirement_fails() {
    let (_dir, config) = common::create_test_config(CHECKIN);

    taskflow()
        .arg("-f")
        .arg(&config)
        .args(["run", "checkin", "--answer", "patient=Rex"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("customer"));
}

#[test]
fn test_failing_step_reports_cause() {
    let (_dir, config) = common::create_test_config(CHECKIN);

    taskflow()
        .arg("-f")
        .arg(&config)
        .args(["-q", "run", "broken"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("scale offline"));
}

#[test]
fn test_env_file_seeds_context() {
    let (dir, config) = common::create_test_config(CHECKIN);
    let env = common::write_file(dir.path(), "front-desk.env", "customer=\"J. Smith\"\n");

    taskflow()
        .arg("-f")
        .arg(&config)
        .args(["run", "checkin", "--answer", "patient=Rex", "--env-file"])
        .arg(&env)
        .assert()
        .code(0)
        .stdout(predicate::str::contains("for J. Smith"));
}

#[test]
fn test_config_discovered_from_subdir() {
    let (_dir, _config, sub_dir) = common::create_test_config_in_subdir(CHECKIN);

    taskflow()
        .current_dir(&sub_dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("weigh"));
}

#[test]
fn test_unknown_workflow_is_an_error() {
    let (_dir, config) = common::create_test_config(CHECKIN);

    taskflow()
        .arg("-f")
        .arg(&config)
        .args(["run", "nowhere"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error:"))
        .stderr(predicate::str::contains("nowhere"));
}

#[test]
fn test_completions() {
    taskflow()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("taskflow"));
}
