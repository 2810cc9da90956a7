use predicates::prelude::*;
use serde_json::Value;

use super::common::TestEnv;

fn plan_json(env: &TestEnv, args: &[&str]) -> Vec<Value> {
  let output = env
    .xcforge_cmd()
    .arg("plan")
    .args(args)
    .args(["-o", "json"])
    .output()
    .unwrap();
  assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
  serde_json::from_slice::<Value>(&output.stdout)
    .unwrap()
    .as_array()
    .unwrap()
    .clone()
}

#[test]
fn plan_on_empty_root_schedules_everything() {
  let env = TestEnv::empty();

  let entries = plan_json(&env, &[]);
  assert_eq!(entries.len(), 66);
  assert!(entries.iter().all(|e| e["reason"] == "output missing"));
  assert_eq!(entries.last().unwrap()["task"], "package");
}

#[test]
fn plan_does_not_create_the_root() {
  let env = TestEnv::empty();

  env.xcforge_cmd().arg("plan").assert().success();
  assert!(!env.root_path().exists());
}

#[test]
fn plan_text_reports_task_count() {
  let env = TestEnv::empty();

  env
    .xcforge_cmd()
    .arg("plan")
    .assert()
    .success()
    .stdout(predicate::str::contains("wave 0"))
    .stdout(predicate::str::contains("fetch openssl"))
    .stdout(predicate::str::contains("66 of 66 tasks would run"));
}

#[test]
fn single_platform_skips_merge_and_package() {
  let env = TestEnv::empty();

  let entries = plan_json(&env, &["--platform", "macosx"]);
  let tasks: Vec<&str> = entries.iter().map(|e| e["task"].as_str().unwrap()).collect();

  assert_eq!(tasks.len(), 13);
  assert!(tasks.contains(&"link [macosx]"));
  assert!(!tasks.iter().any(|t| t.starts_with("merge")));
  assert!(!tasks.contains(&"package"));
}

#[test]
fn platforms_from_config_file() {
  let env = TestEnv::with_config("[build]\nplatforms = [\"iphoneos\", \"iphonesimulator\"]\n");

  let entries = plan_json(&env, &[]);
  assert_eq!(entries.len(), 3 + 2 * 9 + 2);
}

#[test]
fn waves_are_non_decreasing() {
  let env = TestEnv::empty();

  let entries = plan_json(&env, &[]);
  let waves: Vec<u64> = entries.iter().map(|e| e["wave"].as_u64().unwrap()).collect();
  assert!(waves.windows(2).all(|w| w[0] <= w[1]));
  assert_eq!(waves[0], 0);
}
