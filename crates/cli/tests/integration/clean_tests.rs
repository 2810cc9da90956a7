use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn clean_with_no_root_succeeds() {
  let env = TestEnv::empty();

  env
    .xcforge_cmd()
    .arg("clean")
    .assert()
    .success()
    .stdout(predicate::str::contains("Nothing to clean"));
}

#[test]
fn clean_deps_dry_run_keeps_files() {
  let env = TestEnv::empty();
  env.write_file("root/deps/openssl-3.0.13.tar.gz", "archive");

  env
    .xcforge_cmd()
    .args(["clean-deps", "--dry-run"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Dry run"));

  assert!(env.root_path().join("deps/openssl-3.0.13.tar.gz").exists());
}

#[test]
fn clean_deps_removes_downloads_only() {
  let env = TestEnv::empty();
  env.write_file("root/deps/openssl-3.0.13.tar.gz", "archive");
  env.write_file("root/install/macosx/lib/libssl.a", "lib");

  env
    .xcforge_cmd()
    .arg("clean-deps")
    .assert()
    .success()
    .stdout(predicate::str::contains("Clean complete"));

  assert!(!env.root_path().join("deps").exists());
  assert!(env.root_path().join("install/macosx/lib/libssl.a").exists());
}

#[test]
fn clean_json_output_is_valid() {
  let env = TestEnv::empty();
  env.write_file("root/install/macosx/lib/libssl.a", "lib");

  let output = env
    .xcforge_cmd()
    .args(["clean", "--dry-run", "-o", "json"])
    .output()
    .unwrap();
  assert!(output.status.success());

  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(json["scope"], "all");
  assert_eq!(json["dry_run"], true);
  assert!(json["bytes_freed"].as_u64().unwrap() > 0);
}
