use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn missing_tool_fails_before_touching_root() {
  let env = TestEnv::with_config("[tools]\narchiver = \"ar\"\nar = \"xcforge-test-no-such-ar\"\n");

  env
    .xcforge_cmd()
    .arg("build")
    .assert()
    .failure()
    .stderr(predicate::str::contains("xcforge-test-no-such-ar"));

  assert!(!env.root_path().exists());
}

#[test]
fn build_is_the_default_command() {
  let env = TestEnv::with_config("[tools]\narchiver = \"ar\"\nar = \"xcforge-test-no-such-ar\"\n");

  env
    .xcforge_cmd()
    .assert()
    .failure()
    .stderr(predicate::str::contains("required tool"));
}

#[test]
fn unknown_platform_fails_build() {
  let env = TestEnv::empty();

  env
    .xcforge_cmd()
    .args(["build", "-p", "watchos"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("unknown platform"));

  assert!(!env.root_path().exists());
}

/// Cache a minimal source archive for every dependency so no task downloads.
fn seed_sources(env: &TestEnv) {
  let deps = env.root_path().join("deps");
  std::fs::create_dir_all(&deps).unwrap();
  for source in ["openssl-3.0.0", "libssh2-1.11.0", "libgit2-1.7.2"] {
    env.write_file(&format!("src/{source}/README"), "placeholder\n");
    let status = std::process::Command::new("tar")
      .arg("czf")
      .arg(deps.join(format!("{source}.tar.gz")))
      .arg("-C")
      .arg(env.temp.path().join("src"))
      .arg(source)
      .status()
      .unwrap();
    assert!(status.success());
  }
}

#[test]
fn failed_task_output_is_shown() {
  let env = TestEnv::with_config(
    "[build]\nplatforms = [\"macosx\"]\n\n\
     [versions]\nopenssl = \"3.0.0\"\nlibssh2 = \"1.11.0\"\nlibgit2 = \"1.7.2\"\n\n\
     [tools]\narchiver = \"ar\"\nlipo = \"true\"\nxcodebuild = \"true\"\n",
  );
  seed_sources(&env);

  env
    .xcforge_cmd()
    .arg("build")
    .assert()
    .failure()
    .stderr(predicate::str::contains("configure openssl [macosx]: command failed"))
    .stderr(predicate::str::contains("    error: command failed"));

  let log = std::fs::read_to_string(env.root_path().join("build.log")).unwrap();
  assert!(log.contains("==> configure openssl [macosx] (FAILED)"));
}
