//! CLI tests for `act run` and `act init-config`.
//!
//! Spawns the act binary against scenario files in a temporary directory and
//! checks stdout and exit codes.

use std::process::{Command, Output};

use act::exit_codes;
use act::io::config::load_config;
use act::io::trace::read_trace;
use act::test_support::ScenarioDir;
use serde_json::json;

fn act(dir: &ScenarioDir, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_act"))
        .current_dir(dir.root())
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .expect("act")
}

fn stdout(output: &Output) -> String {
    String::from_utf8(output.stdout.clone()).expect("utf8")
}

fn cup_scenario() -> serde_json::Value {
    json!({
        "goals": [{"objective": "holding", "directObject": "cup"}],
        "plans": [{"actions": ["pickup(cup)"]}]
    })
}

#[test]
fn simple_run_prints_one_line_per_cycle() {
    let dir = ScenarioDir::new(&cup_scenario()).expect("scenario");
    let output = act(&dir, &["run", "--scenario", "scenario.json", "--cycles", "2"]);

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let out = stdout(&output);
    assert!(out.contains("cycle 1: acted: pickup(cup)"), "{out}");
    assert!(out.contains("cycle 2: plan-0 already finished"), "{out}");
    assert!(out.contains("2 cycles, 1 actions"), "{out}");
}

#[test]
fn async_run_waits_on_blocking_step() {
    let dir = ScenarioDir::new(&json!({
        "goals": [{"objective": "holding", "directObject": "cup"}],
        "plans": [{"actions": [
            {"op": "block_until_seen(cup)", "blocks": true, "completes_after": 2},
            "grab(cup)"
        ]}]
    }))
    .expect("scenario");
    let output = act(
        &dir,
        &["run", "--scenario", "scenario.json", "--variant", "async", "--cycles", "4"],
    );

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let out = stdout(&output);
    assert!(
        out.contains("cycle 1: plan-0 waiting on step 0 (started: block_until_seen(cup))"),
        "{out}"
    );
    assert!(out.contains("cycle 2: plan-0 waiting on step 0\n"), "{out}");
    assert!(out.contains("cycle 3: acted: grab(cup)"), "{out}");
    assert!(out.contains("cycle 4: plan-0 already finished"), "{out}");
}

#[test]
fn dispatch_run_exits_terminated_on_land() {
    let dir = ScenarioDir::new(&json!({
        "instructions": {"plan": [
            {"action": "Move", "name": "RPA", "target": {"X": 9, "Y": 8}},
            {"action": "Land"}
        ]}
    }))
    .expect("scenario");
    let output = act(
        &dir,
        &["run", "--scenario", "scenario.json", "--variant", "dispatch"],
    );

    assert_eq!(output.status.code(), Some(exit_codes::TERMINATED));
    let out = stdout(&output);
    let published: Vec<&str> = out
        .lines()
        .filter(|line| line.starts_with("/topic/plan "))
        .collect();
    assert_eq!(published.len(), 1, "{out}");
    let body: serde_json::Value =
        serde_json::from_str(published[0].trim_start_matches("/topic/plan ")).expect("json");
    assert_eq!(
        body,
        json!({"action": "Move", "name": "RPA", "target": {"X": 9, "Y": 8}})
    );
    assert!(out.contains("cycle 2: terminate (Land)"), "{out}");
}

#[test]
fn dispatch_without_instructions_is_invalid() {
    let dir = ScenarioDir::new(&cup_scenario()).expect("scenario");
    let output = act(
        &dir,
        &["run", "--scenario", "scenario.json", "--variant", "dispatch"],
    );
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    let err = String::from_utf8_lossy(&output.stderr);
    assert!(err.contains("no instructions"), "{err}");
}

#[test]
fn trace_flag_writes_jsonl_records() {
    let dir = ScenarioDir::new(&cup_scenario()).expect("scenario");
    let output = act(
        &dir,
        &["run", "--scenario", "scenario.json", "--cycles", "1", "--trace", "trace.jsonl"],
    );
    assert_eq!(output.status.code(), Some(exit_codes::OK));

    let lines = read_trace(&dir.root().join("trace.jsonl")).expect("trace");
    let keys: Vec<&str> = lines.iter().map(|line| line.key.as_str()).collect();
    assert_eq!(keys, vec!["WORLD", "GOALS", "PLAN", "ACTION"]);
    assert!(lines.iter().all(|line| line.cycle == 1 && line.module == "SimpleAct"));
    assert_eq!(lines[3].value["operator"]["name"], "pickup");
}

#[test]
fn config_file_changes_publish_destination() {
    let dir = ScenarioDir::new(&json!({
        "goals": [{"objective": "at", "directObject": "pad"}],
        "plans": [{"actions": ["Move(RPA, 9, 8)", "Land()"]}]
    }))
    .expect("scenario");
    dir.write("custom.toml", "[dispatch]\ndestination = \"/queue/drone\"\n")
        .expect("config");
    let output = act(
        &dir,
        &[
            "run",
            "--scenario",
            "scenario.json",
            "--variant",
            "publish",
            "--config",
            "custom.toml",
        ],
    );

    assert_eq!(output.status.code(), Some(exit_codes::TERMINATED));
    let out = stdout(&output);
    assert!(
        out.contains(r#"/queue/drone {"action":"Move","args":["RPA","9","8"]}"#),
        "{out}"
    );
    assert!(out.contains(r#"/queue/drone {"action":"Land"}"#), "{out}");
}

#[test]
fn malformed_scenario_is_invalid() {
    let dir = ScenarioDir::new(&json!({"plans": [{"actions": ["pickup(cup"]}]})).expect("scenario");
    let output = act(&dir, &["run", "--scenario", "scenario.json"]);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
}

#[test]
fn init_config_refuses_to_overwrite_without_force() {
    let dir = ScenarioDir::new(&cup_scenario()).expect("scenario");

    let first = act(&dir, &["init-config"]);
    assert_eq!(first.status.code(), Some(exit_codes::OK));
    let cfg = load_config(&dir.root().join("act.toml")).expect("config");
    assert_eq!(cfg.max_log_entries, 400);
    assert_eq!(cfg.dispatch.terminate_action, "Land");

    let second = act(&dir, &["init-config"]);
    assert_eq!(second.status.code(), Some(exit_codes::INVALID));

    let forced = act(&dir, &["init-config", "--force"]);
    assert_eq!(forced.status.code(), Some(exit_codes::OK));
}
